//! The durable symbol database: in-process tables over ingested unit records,
//! snapshotted to disk as JSON.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use sigil_core::{
    CanonicalFilePath, StoreUnitInfo, SymbolKind, SymbolOccurrence, SymbolOccurrenceRef,
    SymbolRoles, Usr,
};

use crate::error::DatabaseError;
use crate::record::{occurrence_from_record, record_from_occurrence, RecordOccurrence};

pub const DB_SCHEMA_VERSION: u32 = 1;
const SNAPSHOT_FILE: &str = "sigil-db.json";

/// Roles that make an occurrence the canonical one for its symbol.
const CANONICAL_ROLES: SymbolRoles = SymbolRoles::DEFINITION.union(SymbolRoles::CANONICAL);

/// An occurrence together with the unit that contributed it. The unit name is
/// what visibility filtering keys on.
#[derive(Debug, Clone)]
pub struct OccurrenceEntry {
    pub unit_name: Arc<str>,
    pub occurrence: SymbolOccurrenceRef,
}

/// A textual include/import edge recorded by a unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncludeEdge {
    pub source: CanonicalFilePath,
    pub line: u32,
    pub target: CanonicalFilePath,
}

/// Everything ingestion hands the database for one unit.
pub struct UnitImport {
    pub info: StoreUnitInfo,
    pub files: Vec<CanonicalFilePath>,
    pub includes: Vec<IncludeEdge>,
    pub unit_deps: Vec<String>,
    pub occurrences: Vec<SymbolOccurrence>,
}

struct UnitData {
    info: StoreUnitInfo,
    files: Vec<CanonicalFilePath>,
    includes: Vec<IncludeEdge>,
    unit_deps: Vec<String>,
    occurrences: Vec<SymbolOccurrenceRef>,
}

#[derive(Default)]
struct DbTables {
    units: HashMap<Arc<str>, UnitData>,
    units_by_out_path: HashMap<String, Arc<str>>,
    occurrences_by_usr: HashMap<Usr, Vec<OccurrenceEntry>>,
    occurrences_by_related: HashMap<Usr, Vec<OccurrenceEntry>>,
    canonical_by_usr: HashMap<Usr, OccurrenceEntry>,
    usrs_by_name: BTreeMap<String, Vec<Usr>>,
    usrs_by_kind: HashMap<SymbolKind, Vec<Usr>>,
    units_by_file: HashMap<CanonicalFilePath, BTreeSet<Arc<str>>>,
}

/// Counters reported by `print_stats`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DatabaseStats {
    pub unit_count: usize,
    pub symbol_count: usize,
    pub occurrence_count: usize,
}

pub struct Database {
    base_path: PathBuf,
    readonly: bool,
    tables: RwLock<DbTables>,
}

impl Database {
    /// Open or create the database at `base_path`.
    ///
    /// A previously saved snapshot is loaded when present. `initial_size` is a
    /// capacity hint for the symbol tables.
    pub fn open(
        base_path: &Path,
        readonly: bool,
        initial_size: Option<usize>,
    ) -> Result<Arc<Database>, DatabaseError> {
        if !readonly {
            std::fs::create_dir_all(base_path).map_err(|source| DatabaseError::Create {
                path: base_path.to_path_buf(),
                source,
            })?;
        }

        let mut tables = DbTables::default();
        if let Some(capacity) = initial_size {
            tables.occurrences_by_usr.reserve(capacity);
            tables.occurrences_by_related.reserve(capacity);
            tables.canonical_by_usr.reserve(capacity);
        }

        let database = Arc::new(Database {
            base_path: base_path.to_path_buf(),
            readonly,
            tables: RwLock::new(tables),
        });
        database.load_snapshot()?;
        Ok(database)
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    pub fn is_readonly(&self) -> bool {
        self.readonly
    }

    // --- write surface (ingestion) ------------------------------------------

    /// Insert or replace one unit's data, maintaining every secondary table.
    pub fn import_unit(&self, import: UnitImport) {
        let unit_name: Arc<str> = Arc::from(import.info.unit_name.as_str());
        let mut tables = self.tables.write();
        remove_unit_locked(&mut tables, &unit_name);

        let occurrences: Vec<SymbolOccurrenceRef> =
            import.occurrences.into_iter().map(Arc::new).collect();

        for occurrence in &occurrences {
            let entry = OccurrenceEntry {
                unit_name: unit_name.clone(),
                occurrence: occurrence.clone(),
            };
            tables
                .occurrences_by_usr
                .entry(occurrence.symbol().usr().clone())
                .or_default()
                .push(entry.clone());
            for relation in occurrence.relations() {
                tables
                    .occurrences_by_related
                    .entry(relation.symbol.usr().clone())
                    .or_default()
                    .push(entry.clone());
            }
            if occurrence.roles().contains_any(CANONICAL_ROLES) {
                let usr = occurrence.symbol().usr().clone();
                if !tables.canonical_by_usr.contains_key(&usr) {
                    tables.canonical_by_usr.insert(usr.clone(), entry.clone());
                    tables
                        .usrs_by_name
                        .entry(occurrence.symbol().name().to_owned())
                        .or_default()
                        .push(usr.clone());
                    tables
                        .usrs_by_kind
                        .entry(occurrence.symbol().kind())
                        .or_default()
                        .push(usr);
                }
            }
        }

        for file in &import.files {
            tables
                .units_by_file
                .entry(file.clone())
                .or_default()
                .insert(unit_name.clone());
        }

        tables
            .units_by_out_path
            .insert(import.info.out_file_path.clone(), unit_name.clone());
        tables.units.insert(
            unit_name,
            UnitData {
                info: import.info,
                files: import.files,
                includes: import.includes,
                unit_deps: import.unit_deps,
                occurrences,
            },
        );
    }

    /// Drop one unit and everything it contributed. Returns whether the unit
    /// existed.
    pub fn remove_unit(&self, unit_name: &str) -> bool {
        let mut tables = self.tables.write();
        remove_unit_locked(&mut tables, unit_name)
    }

    // --- read surface -------------------------------------------------------

    pub fn unit_info(&self, unit_name: &str) -> Option<StoreUnitInfo> {
        self.tables
            .read()
            .units
            .get(unit_name)
            .map(|data| data.info.clone())
    }

    pub fn unit_names(&self) -> Vec<String> {
        let tables = self.tables.read();
        let mut names: Vec<String> = tables.units.keys().map(|k| k.to_string()).collect();
        names.sort();
        names
    }

    pub fn unit_name_for_out_path(&self, out_file_path: &str) -> Option<String> {
        self.tables
            .read()
            .units_by_out_path
            .get(out_file_path)
            .map(|name| name.to_string())
    }

    pub fn unit_deps(&self, unit_name: &str) -> Vec<String> {
        self.tables
            .read()
            .units
            .get(unit_name)
            .map(|data| data.unit_deps.clone())
            .unwrap_or_default()
    }

    pub fn files_of_unit(&self, unit_name: &str) -> Vec<CanonicalFilePath> {
        self.tables
            .read()
            .units
            .get(unit_name)
            .map(|data| data.files.clone())
            .unwrap_or_default()
    }

    pub fn includes_of_unit(&self, unit_name: &str) -> Vec<IncludeEdge> {
        self.tables
            .read()
            .units
            .get(unit_name)
            .map(|data| data.includes.clone())
            .unwrap_or_default()
    }

    pub fn occurrences_of_unit(&self, unit_name: &str) -> Vec<SymbolOccurrenceRef> {
        self.tables
            .read()
            .units
            .get(unit_name)
            .map(|data| data.occurrences.clone())
            .unwrap_or_default()
    }

    pub fn units_containing_file(&self, file: &CanonicalFilePath) -> Vec<StoreUnitInfo> {
        let tables = self.tables.read();
        tables
            .units_by_file
            .get(file)
            .into_iter()
            .flatten()
            .filter_map(|name| tables.units.get(name).map(|data| data.info.clone()))
            .collect()
    }

    pub fn known_files(&self) -> Vec<CanonicalFilePath> {
        let tables = self.tables.read();
        let mut files: Vec<CanonicalFilePath> = tables.units_by_file.keys().cloned().collect();
        files.sort();
        files
    }

    /// All occurrences of the symbol identified by `usr`, in insertion order.
    pub fn occurrences_of(&self, usr: &Usr) -> Vec<OccurrenceEntry> {
        self.tables
            .read()
            .occurrences_by_usr
            .get(usr)
            .cloned()
            .unwrap_or_default()
    }

    /// All occurrences holding a relation to the symbol identified by `usr`.
    pub fn occurrences_related_to(&self, usr: &Usr) -> Vec<OccurrenceEntry> {
        self.tables
            .read()
            .occurrences_by_related
            .get(usr)
            .cloned()
            .unwrap_or_default()
    }

    pub fn canonical_occurrence(&self, usr: &Usr) -> Option<OccurrenceEntry> {
        self.tables.read().canonical_by_usr.get(usr).cloned()
    }

    /// Every canonical occurrence, ordered by symbol name then USR.
    pub fn canonical_occurrences(&self) -> Vec<OccurrenceEntry> {
        let tables = self.tables.read();
        tables
            .usrs_by_name
            .values()
            .flatten()
            .filter_map(|usr| tables.canonical_by_usr.get(usr).cloned())
            .collect()
    }

    pub fn usrs_with_name(&self, name: &str) -> Vec<Usr> {
        self.tables
            .read()
            .usrs_by_name
            .get(name)
            .cloned()
            .unwrap_or_default()
    }

    /// USRs whose canonical occurrence has the given kind, in insertion order.
    pub fn usrs_with_kind(&self, kind: SymbolKind) -> Vec<Usr> {
        self.tables
            .read()
            .usrs_by_kind
            .get(&kind)
            .cloned()
            .unwrap_or_default()
    }

    /// Distinct symbol names with a canonical occurrence, sorted.
    pub fn symbol_names(&self) -> Vec<String> {
        self.tables.read().usrs_by_name.keys().cloned().collect()
    }

    pub fn stats(&self) -> DatabaseStats {
        let tables = self.tables.read();
        DatabaseStats {
            unit_count: tables.units.len(),
            symbol_count: tables.canonical_by_usr.len(),
            occurrence_count: tables.units.values().map(|d| d.occurrences.len()).sum(),
        }
    }

    // --- persistence --------------------------------------------------------

    /// Write the JSON snapshot. A no-op for readonly databases.
    pub fn save(&self) -> Result<(), DatabaseError> {
        if self.readonly {
            return Ok(());
        }
        let snapshot_path = self.base_path.join(SNAPSHOT_FILE);
        let persisted = {
            let tables = self.tables.read();
            let mut units: Vec<PersistedUnit> = tables
                .units
                .values()
                .map(|data| PersistedUnit {
                    info: data.info.clone(),
                    files: data.files.clone(),
                    includes: data.includes.clone(),
                    unit_deps: data.unit_deps.clone(),
                    occurrences: data
                        .occurrences
                        .iter()
                        .map(|occ| record_from_occurrence(occ))
                        .collect(),
                })
                .collect();
            units.sort_by(|a, b| a.info.unit_name.cmp(&b.info.unit_name));
            PersistedDb {
                schema_version: DB_SCHEMA_VERSION,
                units,
            }
        };
        let text = serde_json::to_string(&persisted).map_err(|err| DatabaseError::SnapshotParse {
            path: snapshot_path.clone(),
            message: err.to_string(),
        })?;
        std::fs::write(&snapshot_path, text).map_err(|source| DatabaseError::SnapshotWrite {
            path: snapshot_path,
            source,
        })
    }

    fn load_snapshot(&self) -> Result<(), DatabaseError> {
        let snapshot_path = self.base_path.join(SNAPSHOT_FILE);
        let text = match std::fs::read_to_string(&snapshot_path) {
            Ok(text) => text,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(source) => {
                return Err(DatabaseError::SnapshotRead {
                    path: snapshot_path,
                    source,
                })
            }
        };
        let persisted: PersistedDb =
            serde_json::from_str(&text).map_err(|err| DatabaseError::SnapshotParse {
                path: snapshot_path.clone(),
                message: err.to_string(),
            })?;
        if persisted.schema_version != DB_SCHEMA_VERSION {
            tracing::warn!(
                path = %snapshot_path.display(),
                found = persisted.schema_version,
                expected = DB_SCHEMA_VERSION,
                "ignoring database snapshot with incompatible schema version"
            );
            return Ok(());
        }

        let assume = |path: &Path| CanonicalFilePath::assume_canonical(path);
        for unit in persisted.units {
            let is_system = unit.info.is_system;
            self.import_unit(UnitImport {
                info: unit.info,
                files: unit.files,
                includes: unit.includes,
                unit_deps: unit.unit_deps,
                occurrences: unit
                    .occurrences
                    .iter()
                    .map(|rec| occurrence_from_record(rec, is_system, &assume))
                    .collect(),
            });
        }
        Ok(())
    }
}

fn remove_unit_locked(tables: &mut DbTables, unit_name: &str) -> bool {
    let Some(data) = tables.units.remove(unit_name) else {
        return false;
    };
    tables.units_by_out_path.remove(&data.info.out_file_path);

    for file in &data.files {
        if let Some(units) = tables.units_by_file.get_mut(file) {
            units.remove(unit_name);
            if units.is_empty() {
                tables.units_by_file.remove(file);
            }
        }
    }

    let mut touched_usrs: BTreeSet<Usr> = BTreeSet::new();
    for occurrence in &data.occurrences {
        touched_usrs.insert(occurrence.symbol().usr().clone());
        for relation in occurrence.relations() {
            if let Some(entries) = tables.occurrences_by_related.get_mut(relation.symbol.usr()) {
                entries.retain(|entry| entry.unit_name.as_ref() != unit_name);
                if entries.is_empty() {
                    tables.occurrences_by_related.remove(relation.symbol.usr());
                }
            }
        }
    }

    for usr in touched_usrs {
        let mut remaining_canonical: Option<OccurrenceEntry> = None;
        if let Some(entries) = tables.occurrences_by_usr.get_mut(&usr) {
            entries.retain(|entry| entry.unit_name.as_ref() != unit_name);
            remaining_canonical = entries
                .iter()
                .find(|entry| entry.occurrence.roles().contains_any(CANONICAL_ROLES))
                .cloned();
            if entries.is_empty() {
                tables.occurrences_by_usr.remove(&usr);
            }
        }

        let held_canonical = tables
            .canonical_by_usr
            .get(&usr)
            .is_some_and(|entry| entry.unit_name.as_ref() == unit_name);
        if !held_canonical {
            continue;
        }
        match remaining_canonical {
            Some(replacement) => {
                tables.canonical_by_usr.insert(usr, replacement);
            }
            None => {
                let removed = tables.canonical_by_usr.remove(&usr);
                if let Some(entry) = removed {
                    let name = entry.occurrence.symbol().name().to_owned();
                    if let Some(usrs) = tables.usrs_by_name.get_mut(&name) {
                        usrs.retain(|candidate| candidate != &usr);
                        if usrs.is_empty() {
                            tables.usrs_by_name.remove(&name);
                        }
                    }
                    let kind = entry.occurrence.symbol().kind();
                    if let Some(usrs) = tables.usrs_by_kind.get_mut(&kind) {
                        usrs.retain(|candidate| candidate != &usr);
                        if usrs.is_empty() {
                            tables.usrs_by_kind.remove(&kind);
                        }
                    }
                }
            }
        }
    }

    true
}

#[derive(Serialize, Deserialize)]
struct PersistedDb {
    schema_version: u32,
    units: Vec<PersistedUnit>,
}

#[derive(Serialize, Deserialize)]
struct PersistedUnit {
    info: StoreUnitInfo,
    files: Vec<CanonicalFilePath>,
    includes: Vec<IncludeEdge>,
    unit_deps: Vec<String>,
    occurrences: Vec<RecordOccurrence>,
}
