//! The compiler-emitted record model: one unit record per compilation plus a
//! set of record files enumerating symbol occurrences, and the library/store
//! abstraction used to read them.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use sigil_core::{
    CanonicalFilePath, Symbol, SymbolKind, SymbolLocation, SymbolOccurrence, SymbolProperties,
    SymbolRelation, SymbolRoles,
};

use crate::error::Result;

/// A compiler-emitted descriptor of one compilation: which source files were
/// compiled, which record files hold its occurrences, and which other units it
/// depends on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitRecord {
    pub name: String,
    /// The compilation output path this unit describes.
    pub out_file: String,
    #[serde(default)]
    pub main_file: Option<PathBuf>,
    #[serde(default)]
    pub is_system: bool,
    #[serde(default)]
    pub files: Vec<PathBuf>,
    #[serde(default)]
    pub record_names: Vec<String>,
    #[serde(default)]
    pub unit_deps: Vec<String>,
    #[serde(default)]
    pub includes: Vec<IncludeRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncludeRecord {
    pub source: PathBuf,
    pub line: u32,
    pub target: PathBuf,
}

/// One record file: the occurrences emitted for a unit (or part of one).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordFile {
    #[serde(default)]
    pub occurrences: Vec<RecordOccurrence>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordOccurrence {
    pub usr: String,
    pub name: String,
    pub kind: SymbolKind,
    #[serde(default)]
    pub properties: SymbolProperties,
    pub roles: SymbolRoles,
    pub file: PathBuf,
    pub line: u32,
    pub column: u32,
    #[serde(default)]
    pub relations: Vec<RecordRelation>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordRelation {
    pub roles: SymbolRoles,
    pub usr: String,
    pub name: String,
    pub kind: SymbolKind,
    #[serde(default)]
    pub properties: SymbolProperties,
}

/// Build a [`SymbolOccurrence`] from its wire form.
///
/// `canonicalize` supplies path identity; ingestion routes it through the
/// process-wide cache, snapshot loading re-wraps already-canonical paths.
pub fn occurrence_from_record(
    record: &RecordOccurrence,
    is_system: bool,
    canonicalize: &dyn Fn(&Path) -> CanonicalFilePath,
) -> SymbolOccurrence {
    let symbol = Arc::new(Symbol::new(
        record.usr.as_str(),
        record.name.as_str(),
        record.kind,
        record.properties,
    ));
    let mut location = SymbolLocation::new(canonicalize(&record.file), record.line, record.column);
    if is_system {
        location = location.system();
    }
    let relations = record
        .relations
        .iter()
        .map(|rel| {
            SymbolRelation::new(
                rel.roles,
                Arc::new(Symbol::new(
                    rel.usr.as_str(),
                    rel.name.as_str(),
                    rel.kind,
                    rel.properties,
                )),
            )
        })
        .collect();
    SymbolOccurrence::new(symbol, record.roles, location, relations)
}

/// Inverse of [`occurrence_from_record`], used when persisting the database.
pub fn record_from_occurrence(occurrence: &SymbolOccurrence) -> RecordOccurrence {
    let symbol = occurrence.symbol();
    RecordOccurrence {
        usr: symbol.usr().as_str().to_owned(),
        name: symbol.name().to_owned(),
        kind: symbol.kind(),
        properties: symbol.properties(),
        roles: occurrence.roles(),
        file: occurrence.location().path.as_path().to_path_buf(),
        line: occurrence.location().line,
        column: occurrence.location().column,
        relations: occurrence
            .relations()
            .iter()
            .map(|rel| RecordRelation {
                roles: rel.roles,
                usr: rel.symbol.usr().as_str().to_owned(),
                name: rel.symbol.name().to_owned(),
                kind: rel.symbol.kind(),
                properties: rel.symbol.properties(),
            })
            .collect(),
    }
}

/// An open record store: the read surface over the on-disk artifacts a
/// compiler toolchain emits.
pub trait RecordStore: Send + Sync {
    fn unit_names(&self) -> Result<Vec<String>>;
    fn unit_mod_time(&self, unit_name: &str) -> Result<SystemTime>;
    fn read_unit(&self, unit_name: &str) -> Result<UnitRecord>;
    fn read_record(&self, record_name: &str) -> Result<RecordFile>;
}

/// A loaded "indexstore library": knows how to open record stores of one
/// on-disk format.
pub trait RecordStoreLibrary: Send + Sync {
    fn open_store(&self, store_path: &Path) -> Result<Arc<dyn RecordStore>>;
}

/// Resolves the record-store library to use for a given store path.
pub trait StoreLibraryProvider: Send + Sync {
    fn library_for_store_path(&self, store_path: &Path) -> Option<Arc<dyn RecordStoreLibrary>>;
}
