use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// A unified symbol reference: the stable string identity of a symbol across
/// translation units.
///
/// Two symbols with equal USRs are the same symbol, regardless of which unit
/// record they were read from. Cheap to clone and hash.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Usr(Arc<str>);

impl Usr {
    pub fn new(usr: impl Into<Arc<str>>) -> Self {
        Self(usr.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Usr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Usr").field(&self.as_str()).finish()
    }
}

impl fmt::Display for Usr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for Usr {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Usr {
    fn from(value: String) -> Self {
        Self(value.into())
    }
}

impl Serialize for Usr {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Usr {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(Usr::from)
    }
}

/// The language-level classification of a symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SymbolKind {
    Unknown,
    Module,
    Namespace,
    Enum,
    Struct,
    Class,
    Protocol,
    Extension,
    Union,
    TypeAlias,
    Function,
    Variable,
    Field,
    EnumConstant,
    InstanceMethod,
    ClassMethod,
    StaticMethod,
    InstanceProperty,
    ClassProperty,
    StaticProperty,
    Constructor,
    Destructor,
    ConversionFunction,
    Parameter,
    Using,
    Concept,
    CommentTag,
}

bitflags::bitflags! {
    /// What an occurrence is (definition, reference, call, ...) and which
    /// relations it carries, as one bitset. Relation bits on an occurrence are
    /// the union of the roles of its relations.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct SymbolRoles: u32 {
        const DECLARATION             = 1 << 0;
        const DEFINITION              = 1 << 1;
        const REFERENCE               = 1 << 2;
        const READ                    = 1 << 3;
        const WRITE                   = 1 << 4;
        const CALL                    = 1 << 5;
        const DYNAMIC                 = 1 << 6;
        const ADDRESS_OF              = 1 << 7;
        const IMPLICIT                = 1 << 8;
        const RANGE                   = 1 << 9;

        const REL_CHILD_OF            = 1 << 10;
        const REL_BASE_OF             = 1 << 11;
        const REL_OVERRIDE_OF         = 1 << 12;
        const REL_RECEIVED_BY         = 1 << 13;
        const REL_CALLED_BY           = 1 << 14;
        const REL_EXTENDED_BY         = 1 << 15;
        const REL_ACCESSOR_OF         = 1 << 16;
        const REL_CONTAINED_BY        = 1 << 17;
        const REL_IBTYPE_OF           = 1 << 18;
        const REL_SPECIALIZATION_OF   = 1 << 19;

        const CANONICAL               = 1 << 20;
    }
}

impl SymbolRoles {
    /// True if any bit in `other` is also set in `self`.
    pub fn contains_any(self, other: SymbolRoles) -> bool {
        self.intersects(other)
    }
}

impl Serialize for SymbolRoles {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u32(self.bits())
    }
}

impl<'de> Deserialize<'de> for SymbolRoles {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let bits = u32::deserialize(deserializer)?;
        Ok(SymbolRoles::from_bits_truncate(bits))
    }
}

bitflags::bitflags! {
    /// Orthogonal attributes of a symbol, independent of any occurrence.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct SymbolProperties: u32 {
        const GENERIC    = 1 << 0;
        const UNIT_TEST  = 1 << 1;
        const LOCAL      = 1 << 2;
        const GENERATED  = 1 << 3;
    }
}

impl Serialize for SymbolProperties {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u32(self.bits())
    }
}

impl<'de> Deserialize<'de> for SymbolProperties {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let bits = u32::deserialize(deserializer)?;
        Ok(SymbolProperties::from_bits_truncate(bits))
    }
}

/// An identified program entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol {
    usr: Usr,
    name: String,
    kind: SymbolKind,
    properties: SymbolProperties,
}

impl Symbol {
    pub fn new(
        usr: impl Into<Usr>,
        name: impl Into<String>,
        kind: SymbolKind,
        properties: SymbolProperties,
    ) -> Self {
        Self {
            usr: usr.into(),
            name: name.into(),
            kind,
            properties,
        }
    }

    pub fn usr(&self) -> &Usr {
        &self.usr
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> SymbolKind {
        self.kind
    }

    pub fn properties(&self) -> SymbolProperties {
        self.properties
    }

    pub fn is_unit_test(&self) -> bool {
        self.properties.contains(SymbolProperties::UNIT_TEST)
    }

    /// Whether call-site queries make sense for this symbol.
    pub fn is_callable(&self) -> bool {
        matches!(
            self.kind,
            SymbolKind::Function
                | SymbolKind::InstanceMethod
                | SymbolKind::ClassMethod
                | SymbolKind::StaticMethod
                | SymbolKind::Constructor
                | SymbolKind::Destructor
                | SymbolKind::ConversionFunction
        )
    }
}

pub type SymbolRef = Arc<Symbol>;
