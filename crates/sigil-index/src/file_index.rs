//! File-keyed queries: unit membership, filename search, include graph.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use sigil_core::{CanonicalFilePath, CanonicalPathCache, StoreUnitInfo};
use sigil_db::Database;

use crate::pattern::PatternMatcher;
use crate::visibility::VisibilityChecker;

pub struct FilePathIndex {
    database: Arc<Database>,
    visibility: Arc<VisibilityChecker>,
    canon_cache: Arc<CanonicalPathCache>,
}

impl FilePathIndex {
    pub fn new(
        database: Arc<Database>,
        visibility: Arc<VisibilityChecker>,
        canon_cache: Arc<CanonicalPathCache>,
    ) -> Self {
        Self {
            database,
            visibility,
            canon_cache,
        }
    }

    pub fn canonical_path(&self, path: &Path) -> CanonicalFilePath {
        self.canon_cache.canonicalize(path)
    }

    /// A file is known iff some visible unit compiled it.
    pub fn is_known_file(&self, path: &CanonicalFilePath) -> bool {
        self.database
            .units_containing_file(path)
            .iter()
            .any(|info| self.visibility.is_unit_visible(info))
    }

    pub fn foreach_main_unit_containing_file(
        &self,
        path: &CanonicalFilePath,
        mut receiver: impl FnMut(&StoreUnitInfo) -> bool,
    ) -> bool {
        for info in self.database.units_containing_file(path) {
            if !info.is_main_unit() || !self.visibility.is_unit_visible(&info) {
                continue;
            }
            if !receiver(&info) {
                return false;
            }
        }
        true
    }

    pub fn foreach_file_of_unit(
        &self,
        unit_name: &str,
        follow_dependencies: bool,
        mut receiver: impl FnMut(&CanonicalFilePath) -> bool,
    ) -> bool {
        let mut pending = vec![unit_name.to_owned()];
        let mut seen_units: HashSet<String> = HashSet::new();
        let mut seen_files: HashSet<CanonicalFilePath> = HashSet::new();

        while let Some(unit) = pending.pop() {
            if !seen_units.insert(unit.clone()) {
                continue;
            }
            for file in self.database.files_of_unit(&unit) {
                if seen_files.insert(file.clone()) && !receiver(&file) {
                    return false;
                }
            }
            if follow_dependencies {
                pending.extend(self.database.unit_deps(&unit));
            }
        }
        true
    }

    pub fn foreach_filename_containing_pattern(
        &self,
        pattern: &str,
        anchor_start: bool,
        anchor_end: bool,
        subsequence: bool,
        ignore_case: bool,
        mut receiver: impl FnMut(&CanonicalFilePath) -> bool,
    ) -> bool {
        let matcher =
            PatternMatcher::new(pattern, anchor_start, anchor_end, subsequence, ignore_case);
        for file in self.database.known_files() {
            let Some(name) = file.file_name() else {
                continue;
            };
            if !matcher.is_match(name) {
                continue;
            }
            if !self.is_known_file(&file) {
                continue;
            }
            if !receiver(&file) {
                return false;
            }
        }
        true
    }

    pub fn foreach_file_including_file(
        &self,
        target: &CanonicalFilePath,
        mut receiver: impl FnMut(&CanonicalFilePath, u32) -> bool,
    ) -> bool {
        self.foreach_visible_include(|source, include_target, line| {
            if include_target == target {
                return receiver(source, line);
            }
            true
        })
    }

    pub fn foreach_file_included_by_file(
        &self,
        source: &CanonicalFilePath,
        mut receiver: impl FnMut(&CanonicalFilePath, u32) -> bool,
    ) -> bool {
        self.foreach_visible_include(|include_source, target, line| {
            if include_source == source {
                return receiver(target, line);
            }
            true
        })
    }

    pub fn foreach_include_of_unit(
        &self,
        unit_name: &str,
        mut receiver: impl FnMut(&CanonicalFilePath, &CanonicalFilePath, u32) -> bool,
    ) -> bool {
        for edge in self.database.includes_of_unit(unit_name) {
            if !receiver(&edge.source, &edge.target, edge.line) {
                return false;
            }
        }
        true
    }

    /// Walk each distinct include edge recorded by a visible unit.
    fn foreach_visible_include(
        &self,
        mut f: impl FnMut(&CanonicalFilePath, &CanonicalFilePath, u32) -> bool,
    ) -> bool {
        let mut seen: HashSet<(CanonicalFilePath, u32, CanonicalFilePath)> = HashSet::new();
        for unit_name in self.database.unit_names() {
            let visible = self
                .database
                .unit_info(&unit_name)
                .is_some_and(|info| self.visibility.is_unit_visible(&info));
            if !visible {
                continue;
            }
            for edge in self.database.includes_of_unit(&unit_name) {
                let key = (edge.source.clone(), edge.line, edge.target.clone());
                if !seen.insert(key) {
                    continue;
                }
                if !f(&edge.source, &edge.target, edge.line) {
                    return false;
                }
            }
        }
        true
    }
}
