//! Primitive symbol queries over the database, visibility-filtered.

use std::collections::{BTreeSet, HashSet};
use std::io::Write;
use std::sync::Arc;

use sigil_db::{Database, OccurrenceEntry};
use sigil_core::{SymbolKind, SymbolOccurrenceRef, SymbolRoles, Usr};

use crate::pattern::PatternMatcher;
use crate::visibility::VisibilityChecker;

pub struct SymbolIndex {
    database: Arc<Database>,
    visibility: Arc<VisibilityChecker>,
}

impl SymbolIndex {
    pub fn new(database: Arc<Database>, visibility: Arc<VisibilityChecker>) -> Self {
        Self {
            database,
            visibility,
        }
    }

    fn is_visible(&self, entry: &OccurrenceEntry) -> bool {
        self.database
            .unit_info(&entry.unit_name)
            .is_some_and(|info| self.visibility.is_unit_visible(&info))
    }

    /// Occurrences of the symbol `usr` whose roles intersect `role_set`.
    pub fn foreach_symbol_occurrence_by_usr(
        &self,
        usr: &Usr,
        role_set: SymbolRoles,
        mut receiver: impl FnMut(&SymbolOccurrenceRef) -> bool,
    ) -> bool {
        for entry in self.database.occurrences_of(usr) {
            if !entry.occurrence.roles().contains_any(role_set) {
                continue;
            }
            if !self.is_visible(&entry) {
                continue;
            }
            if !receiver(&entry.occurrence) {
                return false;
            }
        }
        true
    }

    /// Occurrences holding a relation to the symbol `usr` whose relation roles
    /// intersect `role_set`.
    pub fn foreach_related_symbol_occurrence_by_usr(
        &self,
        usr: &Usr,
        role_set: SymbolRoles,
        mut receiver: impl FnMut(&SymbolOccurrenceRef) -> bool,
    ) -> bool {
        for entry in self.database.occurrences_related_to(usr) {
            let related = entry.occurrence.relations().iter().any(|relation| {
                relation.symbol.usr() == usr && relation.roles.contains_any(role_set)
            });
            if !related || !self.is_visible(&entry) {
                continue;
            }
            if !receiver(&entry.occurrence) {
                return false;
            }
        }
        true
    }

    pub fn foreach_canonical_symbol_occurrence_by_usr(
        &self,
        usr: &Usr,
        mut receiver: impl FnMut(&SymbolOccurrenceRef) -> bool,
    ) -> bool {
        if let Some(entry) = self.database.canonical_occurrence(usr) {
            if self.is_visible(&entry) && !receiver(&entry.occurrence) {
                return false;
            }
        }
        true
    }

    pub fn foreach_canonical_symbol_occurrence_by_name(
        &self,
        name: &str,
        mut receiver: impl FnMut(&SymbolOccurrenceRef) -> bool,
    ) -> bool {
        for usr in self.database.usrs_with_name(name) {
            let Some(entry) = self.database.canonical_occurrence(&usr) else {
                continue;
            };
            if !self.is_visible(&entry) {
                continue;
            }
            if !receiver(&entry.occurrence) {
                return false;
            }
        }
        true
    }

    pub fn foreach_canonical_symbol_occurrence_containing_pattern(
        &self,
        pattern: &str,
        anchor_start: bool,
        anchor_end: bool,
        subsequence: bool,
        ignore_case: bool,
        mut receiver: impl FnMut(&SymbolOccurrenceRef) -> bool,
    ) -> bool {
        let matcher =
            PatternMatcher::new(pattern, anchor_start, anchor_end, subsequence, ignore_case);
        for entry in self.database.canonical_occurrences() {
            if !matcher.is_match(entry.occurrence.symbol().name()) {
                continue;
            }
            if !self.is_visible(&entry) {
                continue;
            }
            if !receiver(&entry.occurrence) {
                return false;
            }
        }
        true
    }

    pub fn foreach_canonical_symbol_occurrence_by_kind(
        &self,
        kind: SymbolKind,
        workspace_only: bool,
        mut receiver: impl FnMut(&SymbolOccurrenceRef) -> bool,
    ) -> bool {
        for usr in self.database.usrs_with_kind(kind) {
            let Some(entry) = self.database.canonical_occurrence(&usr) else {
                continue;
            };
            if workspace_only && entry.occurrence.location().is_system {
                continue;
            }
            if !self.is_visible(&entry) {
                continue;
            }
            if !receiver(&entry.occurrence) {
                return false;
            }
        }
        true
    }

    pub fn count_of_canonical_symbols_with_kind(
        &self,
        kind: SymbolKind,
        workspace_only: bool,
    ) -> usize {
        let mut count = 0;
        self.foreach_canonical_symbol_occurrence_by_kind(kind, workspace_only, |_| {
            count += 1;
            true
        });
        count
    }

    /// Distinct names of visible symbols, in sorted order.
    pub fn foreach_symbol_name(&self, mut receiver: impl FnMut(&str) -> bool) -> bool {
        let mut names: BTreeSet<String> = BTreeSet::new();
        for entry in self.database.canonical_occurrences() {
            if self.is_visible(&entry) {
                names.insert(entry.occurrence.symbol().name().to_owned());
            }
        }
        for name in names {
            if !receiver(&name) {
                return false;
            }
        }
        true
    }

    /// Definitions of unit-test symbols contributed by the units registered
    /// under `out_file_paths`, following unit dependencies. Deduplicated by
    /// USR.
    pub fn foreach_unit_test_symbol_referenced_by_output_paths(
        &self,
        out_file_paths: &[String],
        mut receiver: impl FnMut(&SymbolOccurrenceRef) -> bool,
    ) -> bool {
        let mut pending: Vec<String> = out_file_paths
            .iter()
            .filter_map(|path| self.database.unit_name_for_out_path(path))
            .collect();
        let mut seen_units: HashSet<String> = HashSet::new();
        let mut seen_usrs: HashSet<Usr> = HashSet::new();

        while let Some(unit_name) = pending.pop() {
            if !seen_units.insert(unit_name.clone()) {
                continue;
            }
            pending.extend(self.database.unit_deps(&unit_name));

            let visible = self
                .database
                .unit_info(&unit_name)
                .is_some_and(|info| self.visibility.is_unit_visible(&info));
            if !visible {
                continue;
            }
            for occurrence in self.database.occurrences_of_unit(&unit_name) {
                if !occurrence.symbol().is_unit_test() {
                    continue;
                }
                if !occurrence.roles().contains_any(SymbolRoles::DEFINITION) {
                    continue;
                }
                if !seen_usrs.insert(occurrence.symbol().usr().clone()) {
                    continue;
                }
                if !receiver(&occurrence) {
                    return false;
                }
            }
        }
        true
    }

    pub fn print_stats(&self, out: &mut dyn Write) -> std::io::Result<()> {
        let stats = self.database.stats();
        writeln!(out, "units: {}", stats.unit_count)?;
        writeln!(out, "symbols: {}", stats.symbol_count)?;
        writeln!(out, "occurrences: {}", stats.occurrence_count)?;
        Ok(())
    }

    /// Dump which files each unit contributed, one `unit -> file` line per
    /// association.
    pub fn dump_unit_file_associations(&self, out: &mut dyn Write) -> std::io::Result<()> {
        for unit_name in self.database.unit_names() {
            for file in self.database.files_of_unit(&unit_name) {
                writeln!(out, "{unit_name} -> {file}")?;
            }
        }
        Ok(())
    }
}
