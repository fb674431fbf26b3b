//! The default record-store format: one JSON file per unit record under
//! `<store>/units/`, one per record file under `<store>/records/`.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use walkdir::WalkDir;

use crate::error::{Result, StoreError};
use crate::record::{RecordFile, RecordStore, RecordStoreLibrary, StoreLibraryProvider, UnitRecord};

pub const UNITS_DIR: &str = "units";
pub const RECORDS_DIR: &str = "records";

pub struct JsonRecordStore {
    store_path: PathBuf,
}

impl JsonRecordStore {
    pub fn open(store_path: &Path) -> Result<Self> {
        if !store_path.is_dir() {
            return Err(StoreError::StoreMissing {
                path: store_path.to_path_buf(),
            });
        }
        Ok(Self {
            store_path: store_path.to_path_buf(),
        })
    }

    fn unit_path(&self, unit_name: &str) -> PathBuf {
        self.store_path.join(UNITS_DIR).join(format!("{unit_name}.json"))
    }

    fn record_path(&self, record_name: &str) -> PathBuf {
        self.store_path
            .join(RECORDS_DIR)
            .join(format!("{record_name}.json"))
    }

    fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
        let text = std::fs::read_to_string(path)?;
        serde_json::from_str(&text).map_err(|err| StoreError::Malformed {
            path: path.to_path_buf(),
            message: err.to_string(),
        })
    }
}

impl RecordStore for JsonRecordStore {
    fn unit_names(&self) -> Result<Vec<String>> {
        let units_dir = self.store_path.join(UNITS_DIR);
        if !units_dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut names = Vec::new();
        for entry in WalkDir::new(&units_dir).max_depth(1) {
            let entry = entry.map_err(|err| StoreError::Malformed {
                path: units_dir.clone(),
                message: err.to_string(),
            })?;
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    names.push(stem.to_owned());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    fn unit_mod_time(&self, unit_name: &str) -> Result<SystemTime> {
        let path = self.unit_path(unit_name);
        let metadata = std::fs::metadata(&path).map_err(|_| StoreError::UnknownUnit {
            unit_name: unit_name.to_owned(),
        })?;
        Ok(metadata.modified()?)
    }

    fn read_unit(&self, unit_name: &str) -> Result<UnitRecord> {
        let path = self.unit_path(unit_name);
        if !path.is_file() {
            return Err(StoreError::UnknownUnit {
                unit_name: unit_name.to_owned(),
            });
        }
        Self::read_json(&path)
    }

    fn read_record(&self, record_name: &str) -> Result<RecordFile> {
        let path = self.record_path(record_name);
        if !path.is_file() {
            return Err(StoreError::UnknownRecord {
                record_name: record_name.to_owned(),
            });
        }
        Self::read_json(&path)
    }
}

/// The library for JSON-format record stores.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonRecordStoreLibrary;

impl RecordStoreLibrary for JsonRecordStoreLibrary {
    fn open_store(&self, store_path: &Path) -> Result<Arc<dyn RecordStore>> {
        Ok(Arc::new(JsonRecordStore::open(store_path)?))
    }
}

/// A provider that answers every store path with the JSON library.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonStoreLibraryProvider;

impl StoreLibraryProvider for JsonStoreLibraryProvider {
    fn library_for_store_path(&self, _store_path: &Path) -> Option<Arc<dyn RecordStoreLibrary>> {
        Some(Arc::new(JsonRecordStoreLibrary))
    }
}

/// Write `unit` into a store tree rooted at `store_path`.
///
/// This is the producer half of the JSON format; compilers in tests use it to
/// emit fixtures, and tools can use it to mirror foreign stores.
pub fn write_unit(store_path: &Path, unit: &UnitRecord) -> Result<()> {
    let units_dir = store_path.join(UNITS_DIR);
    std::fs::create_dir_all(&units_dir)?;
    let path = units_dir.join(format!("{}.json", unit.name));
    let text = serde_json::to_string_pretty(unit).map_err(|err| StoreError::Malformed {
        path: path.clone(),
        message: err.to_string(),
    })?;
    std::fs::write(&path, text)?;
    Ok(())
}

/// Write one record file into a store tree rooted at `store_path`.
pub fn write_record(store_path: &Path, record_name: &str, record: &RecordFile) -> Result<()> {
    let records_dir = store_path.join(RECORDS_DIR);
    std::fs::create_dir_all(&records_dir)?;
    let path = records_dir.join(format!("{record_name}.json"));
    let text = serde_json::to_string_pretty(record).map_err(|err| StoreError::Malformed {
        path: path.clone(),
        message: err.to_string(),
    })?;
    std::fs::write(&path, text)?;
    Ok(())
}

/// Remove a unit record (and nothing else) from a store tree.
pub fn remove_unit(store_path: &Path, unit_name: &str) -> Result<()> {
    let path = store_path.join(UNITS_DIR).join(format!("{unit_name}.json"));
    match std::fs::remove_file(&path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_units_and_records() {
        let dir = tempfile::tempdir().expect("tempdir");
        let unit = UnitRecord {
            name: "main.o".into(),
            out_file: "/build/main.o".into(),
            main_file: Some("/src/main.x".into()),
            is_system: false,
            files: vec!["/src/main.x".into()],
            record_names: vec!["main.rec".into()],
            unit_deps: vec!["lib.o".into()],
            includes: Vec::new(),
        };
        write_unit(dir.path(), &unit).expect("write unit");
        write_record(dir.path(), "main.rec", &RecordFile::default()).expect("write record");

        let store = JsonRecordStore::open(dir.path()).expect("open");
        assert_eq!(store.unit_names().expect("names"), vec!["main.o".to_string()]);
        assert_eq!(store.read_unit("main.o").expect("unit"), unit);
        assert_eq!(
            store.read_record("main.rec").expect("record"),
            RecordFile::default()
        );
    }

    #[test]
    fn missing_store_path_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let missing = dir.path().join("no-store");
        assert!(matches!(
            JsonRecordStore::open(&missing),
            Err(StoreError::StoreMissing { .. })
        ));
    }

    #[test]
    fn unknown_unit_and_record_are_typed_errors() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = JsonRecordStore::open(dir.path()).expect("open");
        assert!(matches!(
            store.read_unit("ghost.o"),
            Err(StoreError::UnknownUnit { .. })
        ));
        assert!(matches!(
            store.read_record("ghost.rec"),
            Err(StoreError::UnknownRecord { .. })
        ));
    }
}
