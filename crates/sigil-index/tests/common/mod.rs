//! Shared fixture plumbing: builds JSON record stores in a temp tree and
//! spins up an `IndexSystem` over them.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::SystemTime;

use sigil_core::{OutOfDateTriggerHint, StoreUnitInfo, SymbolKind, SymbolProperties, SymbolRoles};
use sigil_db::{
    write_record, write_unit, JsonStoreLibraryProvider, RecordFile, RecordOccurrence,
    RecordRelation, UnitRecord,
};
use sigil_index::{IndexSystem, IndexSystemConfig, IndexSystemDelegate};
use tempfile::TempDir;

pub struct StoreFixture {
    tmp: TempDir,
}

impl StoreFixture {
    pub fn new() -> Self {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
        Self {
            tmp: tempfile::tempdir().expect("tempdir"),
        }
    }

    pub fn store_path(&self) -> PathBuf {
        self.tmp.path().join("store")
    }

    pub fn db_path(&self) -> PathBuf {
        self.tmp.path().join("db")
    }

    /// A source-tree path inside the fixture; the file is created so
    /// canonicalisation resolves through the OS.
    pub fn source_file(&self, name: &str) -> PathBuf {
        let dir = self.tmp.path().join("src");
        std::fs::create_dir_all(&dir).expect("create src dir");
        let path = dir.join(name);
        std::fs::write(&path, format!("// {name}\n")).expect("write source file");
        path.canonicalize().expect("canonicalize source file")
    }

    pub fn write_unit(&self, unit: &UnitRecord) {
        write_unit(&self.store_path(), unit).expect("write unit record");
    }

    pub fn write_record(&self, record_name: &str, occurrences: Vec<RecordOccurrence>) {
        write_record(
            &self.store_path(),
            record_name,
            &RecordFile { occurrences },
        )
        .expect("write record file");
    }

    pub fn config(&self) -> IndexSystemConfig {
        IndexSystemConfig::new(
            self.store_path(),
            self.db_path(),
            Arc::new(JsonStoreLibraryProvider),
        )
    }

    /// An index over the fixture store, fully caught up with its contents.
    pub fn index(&self) -> IndexSystem {
        self.index_with(|_| {})
    }

    pub fn index_with(&self, configure: impl FnOnce(&mut IndexSystemConfig)) -> IndexSystem {
        let mut config = self.config();
        configure(&mut config);
        let index = IndexSystem::create(config).expect("create index system");
        index.poll_for_unit_changes_and_wait();
        index
    }
}

pub fn unit(name: &str, out_file: &str, files: Vec<PathBuf>, records: Vec<&str>) -> UnitRecord {
    UnitRecord {
        name: name.to_owned(),
        out_file: out_file.to_owned(),
        main_file: files.first().cloned(),
        is_system: false,
        files,
        record_names: records.into_iter().map(str::to_owned).collect(),
        unit_deps: Vec::new(),
        includes: Vec::new(),
    }
}

pub fn occurrence(
    usr: &str,
    name: &str,
    kind: SymbolKind,
    roles: SymbolRoles,
    file: &std::path::Path,
    line: u32,
) -> RecordOccurrence {
    RecordOccurrence {
        usr: usr.to_owned(),
        name: name.to_owned(),
        kind,
        properties: SymbolProperties::empty(),
        roles,
        file: file.to_path_buf(),
        line,
        column: 1,
        relations: Vec::new(),
    }
}

pub fn relation(roles: SymbolRoles, usr: &str, name: &str, kind: SymbolKind) -> RecordRelation {
    RecordRelation {
        roles,
        usr: usr.to_owned(),
        name: name.to_owned(),
        kind,
        properties: SymbolProperties::empty(),
    }
}

/// Records every delegate callback as one formatted line.
#[derive(Default)]
pub struct RecordingDelegate {
    events: Mutex<Vec<String>>,
}

impl RecordingDelegate {
    pub fn events(&self) -> Vec<String> {
        self.events.lock().expect("events mutex").clone()
    }
}

impl IndexSystemDelegate for RecordingDelegate {
    fn processing_added_pending(&self, count: usize) {
        self.events
            .lock()
            .expect("events mutex")
            .push(format!("pending({count})"));
    }

    fn processing_completed(&self, count: usize) {
        self.events
            .lock()
            .expect("events mutex")
            .push(format!("completed({count})"));
    }

    fn processed_store_unit(&self, unit_info: StoreUnitInfo) {
        self.events
            .lock()
            .expect("events mutex")
            .push(format!("unit({})", unit_info.unit_name));
    }

    fn unit_is_out_of_date(
        &self,
        unit_info: StoreUnitInfo,
        _out_of_date_mod_time: SystemTime,
        hint: &OutOfDateTriggerHint,
        synchronous: bool,
    ) {
        self.events.lock().expect("events mutex").push(format!(
            "out-of-date({}, {hint}, sync={synchronous})",
            unit_info.unit_name
        ));
    }
}
