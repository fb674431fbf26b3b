use std::sync::Arc;

use crate::path::CanonicalFilePath;
use crate::symbol::{SymbolRef, SymbolRoles};

/// Where an occurrence appears in source.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SymbolLocation {
    pub path: CanonicalFilePath,
    /// 1-based line.
    pub line: u32,
    /// 1-based column.
    pub column: u32,
    /// True when the location comes from a system (non-workspace) unit.
    pub is_system: bool,
}

impl SymbolLocation {
    pub fn new(path: CanonicalFilePath, line: u32, column: u32) -> Self {
        Self {
            path,
            line,
            column,
            is_system: false,
        }
    }

    pub fn system(mut self) -> Self {
        self.is_system = true;
        self
    }
}

/// A relation from one occurrence to another symbol, e.g. the class a dynamic
/// call is received by, or the method a definition overrides.
#[derive(Debug, Clone)]
pub struct SymbolRelation {
    pub roles: SymbolRoles,
    pub symbol: SymbolRef,
}

impl SymbolRelation {
    pub fn new(roles: SymbolRoles, symbol: SymbolRef) -> Self {
        Self { roles, symbol }
    }
}

/// A concrete appearance of a symbol in source.
///
/// The role set is fixed at construction and always includes the union of the
/// relation roles, so `roles().contains_any(SymbolRoles::REL_RECEIVED_BY)`
/// answers "does this occurrence have a received-by relation" without walking
/// the relation list.
#[derive(Debug, Clone)]
pub struct SymbolOccurrence {
    symbol: SymbolRef,
    roles: SymbolRoles,
    location: SymbolLocation,
    relations: Vec<SymbolRelation>,
}

pub type SymbolOccurrenceRef = Arc<SymbolOccurrence>;

impl SymbolOccurrence {
    pub fn new(
        symbol: SymbolRef,
        roles: SymbolRoles,
        location: SymbolLocation,
        relations: Vec<SymbolRelation>,
    ) -> Self {
        let roles = relations
            .iter()
            .fold(roles, |acc, relation| acc | relation.roles);
        Self {
            symbol,
            roles,
            location,
            relations,
        }
    }

    pub fn symbol(&self) -> &SymbolRef {
        &self.symbol
    }

    pub fn roles(&self) -> SymbolRoles {
        self.roles
    }

    pub fn location(&self) -> &SymbolLocation {
        &self.location
    }

    pub fn relations(&self) -> &[SymbolRelation] {
        &self.relations
    }

    /// Invoke `f` for each related symbol whose relation roles intersect
    /// `roles`.
    pub fn foreach_related_symbol(&self, roles: SymbolRoles, mut f: impl FnMut(&SymbolRef)) {
        for relation in &self.relations {
            if relation.roles.contains_any(roles) {
                f(&relation.symbol);
            }
        }
    }
}
