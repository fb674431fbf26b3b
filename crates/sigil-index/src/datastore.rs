//! Ingestion: discovers unit records in the store, reads them into the
//! database, and reports progress through the delegate dispatcher.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::SystemTime;

use crossbeam_channel as channel;
use sigil_core::{
    CanonicalFilePath, CanonicalPathCache, OutOfDateTriggerHint, StoreUnitInfo,
};
use sigil_db::{
    occurrence_from_record, Database, IncludeEdge, RecordStore, StoreError, UnitImport, UnitRecord,
};

use crate::delegate::AsyncIndexDelegate;

#[derive(Debug, Clone, Copy)]
pub struct IndexDatastoreOptions {
    pub use_explicit_output_units: bool,
    pub readonly: bool,
    pub enable_out_of_date_file_watching: bool,
    pub listen_to_unit_events: bool,
    pub wait_until_done_initializing: bool,
}

struct IngestContext {
    store: Arc<dyn RecordStore>,
    database: Arc<Database>,
    delegate: Arc<AsyncIndexDelegate>,
    canon_cache: Arc<CanonicalPathCache>,
    options: IndexDatastoreOptions,
}

enum IngestMessage {
    Scan,
    AddOutPaths(Vec<String>),
    RemoveOutPaths(Vec<String>),
    PurgeStale,
    Fence(channel::Sender<()>),
    Stop,
}

/// Owns the ingest worker thread. All mutations of the database funnel
/// through it; callers that need completion enqueue a fence behind their
/// request and block on it.
pub struct IndexDatastore {
    context: Arc<IngestContext>,
    tx: channel::Sender<IngestMessage>,
    worker: Option<thread::JoinHandle<()>>,
}

impl IndexDatastore {
    pub fn create(
        store: Arc<dyn RecordStore>,
        database: Arc<Database>,
        delegate: Arc<AsyncIndexDelegate>,
        canon_cache: Arc<CanonicalPathCache>,
        options: IndexDatastoreOptions,
    ) -> Result<IndexDatastore, StoreError> {
        // Fail construction eagerly when the store cannot be listed at all.
        store.unit_names()?;

        let context = Arc::new(IngestContext {
            store,
            database,
            delegate,
            canon_cache,
            options,
        });
        let (tx, rx) = channel::unbounded();
        let worker_context = context.clone();
        let worker = thread::Builder::new()
            .name("sigil-index-ingest".into())
            .spawn(move || run_worker(&worker_context, rx))
            .map_err(StoreError::Io)?;

        let datastore = IndexDatastore {
            context,
            tx,
            worker: Some(worker),
        };
        if options.listen_to_unit_events {
            let _ = datastore.tx.send(IngestMessage::Scan);
            if options.wait_until_done_initializing {
                datastore.fence();
            }
        }
        Ok(datastore)
    }

    fn fence(&self) {
        let (ack_tx, ack_rx) = channel::bounded(1);
        if self.tx.send(IngestMessage::Fence(ack_tx)).is_ok() {
            let _ = ack_rx.recv();
        }
    }

    /// Process every filesystem-observable unit change, blocking until the
    /// database reflects them.
    pub fn poll_for_unit_changes_and_wait(&self) {
        let _ = self.tx.send(IngestMessage::Scan);
        self.fence();
    }

    pub fn add_unit_out_file_paths(&self, paths: &[String], wait_for_processing: bool) {
        let _ = self.tx.send(IngestMessage::AddOutPaths(paths.to_vec()));
        if wait_for_processing {
            self.fence();
        }
    }

    pub fn remove_unit_out_file_paths(&self, paths: &[String], wait_for_processing: bool) {
        let _ = self.tx.send(IngestMessage::RemoveOutPaths(paths.to_vec()));
        if wait_for_processing {
            self.fence();
        }
    }

    /// Drop database units whose record no longer exists in the store.
    pub fn purge_stale_data(&self) {
        let _ = self.tx.send(IngestMessage::PurgeStale);
        self.fence();
    }

    /// Whether the unit registered under `out_file_path` depends on any of
    /// `dirty_files` (directly or through unit dependencies). Unknown units
    /// are out of date by definition.
    pub fn is_unit_out_of_date(&self, out_file_path: &str, dirty_files: &[CanonicalFilePath]) -> bool {
        let Some(unit_name) = self.context.database.unit_name_for_out_path(out_file_path) else {
            return true;
        };
        let dirty: HashSet<&CanonicalFilePath> = dirty_files.iter().collect();

        let mut pending = vec![unit_name];
        let mut seen: HashSet<String> = HashSet::new();
        while let Some(unit) = pending.pop() {
            if !seen.insert(unit.clone()) {
                continue;
            }
            for file in self.context.database.files_of_unit(&unit) {
                if dirty.contains(&file) {
                    return true;
                }
            }
            pending.extend(self.context.database.unit_deps(&unit));
        }
        false
    }

    /// Whether the unit registered under `out_file_path` was ingested before
    /// `out_of_date_mod_time`.
    pub fn is_unit_out_of_date_mod_time(
        &self,
        out_file_path: &str,
        out_of_date_mod_time: SystemTime,
    ) -> bool {
        let Some(unit_name) = self.context.database.unit_name_for_out_path(out_file_path) else {
            return true;
        };
        match self.context.database.unit_info(&unit_name) {
            Some(info) => info.mod_time < out_of_date_mod_time,
            None => true,
        }
    }

    /// Compare on-disk state of `path` against the units that compiled it and
    /// notify the delegate (asynchronously) for each unit found stale.
    pub fn check_unit_containing_file_is_out_of_date(&self, path: &CanonicalFilePath) {
        let Ok(metadata) = std::fs::metadata(path.as_path()) else {
            return;
        };
        let Ok(file_mod_time) = metadata.modified() else {
            return;
        };

        let mut stale: Vec<(StoreUnitInfo, OutOfDateTriggerHint)> = Vec::new();
        for info in self.context.database.units_containing_file(path) {
            if info.mod_time < file_mod_time {
                stale.push((info, OutOfDateTriggerHint::DependentFile(path.clone())));
            }
        }
        propagate_dependent_unit_staleness(&self.context.database, &mut stale);

        for (info, hint) in stale {
            self.context
                .delegate
                .unit_is_out_of_date(info, file_mod_time, hint, false);
        }
    }

    /// Stop the ingest worker. Idempotent; also run by `Drop`.
    pub fn shutdown(&mut self) {
        let _ = self.tx.send(IngestMessage::Stop);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

impl Drop for IndexDatastore {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Extend `stale` with units that depend (transitively) on an already-stale
/// unit, wrapping the trigger in `DependentUnit` hints.
fn propagate_dependent_unit_staleness(
    database: &Database,
    stale: &mut Vec<(StoreUnitInfo, OutOfDateTriggerHint)>,
) {
    let mut index = 0;
    let mut stale_names: HashSet<String> =
        stale.iter().map(|(info, _)| info.unit_name.clone()).collect();
    while index < stale.len() {
        let (dep_info, dep_hint) = stale[index].clone();
        index += 1;
        for unit_name in database.unit_names() {
            if stale_names.contains(&unit_name) {
                continue;
            }
            if !database.unit_deps(&unit_name).contains(&dep_info.unit_name) {
                continue;
            }
            let Some(info) = database.unit_info(&unit_name) else {
                continue;
            };
            stale_names.insert(unit_name);
            stale.push((
                info,
                OutOfDateTriggerHint::dependent_unit(dep_info.unit_name.clone(), dep_hint.clone()),
            ));
        }
    }
}

fn run_worker(context: &IngestContext, rx: channel::Receiver<IngestMessage>) {
    for message in rx {
        match message {
            IngestMessage::Scan => scan_store(context, None),
            IngestMessage::AddOutPaths(paths) => scan_store(context, Some(&paths)),
            IngestMessage::RemoveOutPaths(paths) => {
                for path in &paths {
                    if let Some(unit_name) = context.database.unit_name_for_out_path(path) {
                        context.database.remove_unit(&unit_name);
                    }
                }
            }
            IngestMessage::PurgeStale => purge_stale(context),
            IngestMessage::Fence(ack) => {
                let _ = ack.send(());
            }
            IngestMessage::Stop => break,
        }
    }
}

/// Scan the store and ingest added or changed units. When `only_out_paths` is
/// set, restrict the scan to units registered under those output paths.
fn scan_store(context: &IngestContext, only_out_paths: Option<&[String]>) {
    if context.options.readonly {
        return;
    }
    let unit_names = match context.store.unit_names() {
        Ok(names) => names,
        Err(err) => {
            tracing::warn!(error = %err, "could not list units in record store");
            return;
        }
    };
    let store_units: HashSet<&String> = unit_names.iter().collect();

    let mut pending: Vec<(UnitRecord, SystemTime)> = Vec::new();
    for unit_name in &unit_names {
        let record = match context.store.read_unit(unit_name) {
            Ok(record) => record,
            Err(err) => {
                tracing::warn!(unit = %unit_name, error = %err, "skipping malformed unit record");
                continue;
            }
        };
        if let Some(out_paths) = only_out_paths {
            if !out_paths.contains(&record.out_file) {
                continue;
            }
        }
        let mod_time = context
            .store
            .unit_mod_time(unit_name)
            .unwrap_or(SystemTime::UNIX_EPOCH);
        let unchanged = context
            .database
            .unit_info(unit_name)
            .is_some_and(|info| info.mod_time == mod_time);
        if !unchanged {
            pending.push((record, mod_time));
        }
    }

    if !pending.is_empty() {
        context.delegate.processing_added_pending(pending.len());
        let count = pending.len();
        for (record, mod_time) in pending {
            let info = ingest_unit(context, record, mod_time);
            context.delegate.processed_store_unit(info);
        }
        context.delegate.processing_completed(count);
    }

    // A full scan also drops units whose record disappeared from the store.
    if only_out_paths.is_none() {
        for unit_name in context.database.unit_names() {
            if !store_units.contains(&unit_name) {
                context.database.remove_unit(&unit_name);
            }
        }
        if context.options.enable_out_of_date_file_watching {
            report_out_of_date_units(context);
        }
    }
}

fn ingest_unit(context: &IngestContext, record: UnitRecord, mod_time: SystemTime) -> StoreUnitInfo {
    let canonicalize = |path: &Path| context.canon_cache.canonicalize(path);

    let info = StoreUnitInfo {
        unit_name: record.name.clone(),
        out_file_path: record.out_file.clone(),
        main_file_path: record.main_file.as_deref().map(|p| canonicalize(p)),
        is_system: record.is_system,
        mod_time,
    };

    let mut occurrences = Vec::new();
    for record_name in &record.record_names {
        match context.store.read_record(record_name) {
            Ok(record_file) => {
                occurrences.extend(record_file.occurrences.iter().map(|occurrence| {
                    occurrence_from_record(occurrence, record.is_system, &canonicalize)
                }));
            }
            Err(err) => {
                tracing::warn!(
                    unit = %record.name,
                    record = %record_name,
                    error = %err,
                    "skipping unreadable record file"
                );
            }
        }
    }

    context.database.import_unit(UnitImport {
        info: info.clone(),
        files: record.files.iter().map(|p| canonicalize(p)).collect(),
        includes: record
            .includes
            .iter()
            .map(|include| IncludeEdge {
                source: canonicalize(&include.source),
                line: include.line,
                target: canonicalize(&include.target),
            })
            .collect(),
        unit_deps: record.unit_deps.clone(),
        occurrences,
    });
    info
}

fn purge_stale(context: &IngestContext) {
    let store_units: HashSet<String> = match context.store.unit_names() {
        Ok(names) => names.into_iter().collect(),
        Err(err) => {
            tracing::warn!(error = %err, "could not list units in record store");
            return;
        }
    };
    for unit_name in context.database.unit_names() {
        if !store_units.contains(&unit_name) {
            context.database.remove_unit(&unit_name);
        }
    }
}

/// Check each ingested unit's dependency files against its record mod time
/// and notify the delegate for every stale unit found.
fn report_out_of_date_units(context: &IngestContext) {
    let mut stale: Vec<(StoreUnitInfo, OutOfDateTriggerHint)> = Vec::new();
    for unit_name in context.database.unit_names() {
        let Some(info) = context.database.unit_info(&unit_name) else {
            continue;
        };
        for file in context.database.files_of_unit(&unit_name) {
            let Ok(metadata) = std::fs::metadata(file.as_path()) else {
                continue;
            };
            let Ok(file_mod_time) = metadata.modified() else {
                continue;
            };
            if info.mod_time < file_mod_time {
                stale.push((info.clone(), OutOfDateTriggerHint::DependentFile(file)));
                break;
            }
        }
    }
    propagate_dependent_unit_staleness(&context.database, &mut stale);
    for (info, hint) in stale {
        let mod_time = info.mod_time;
        context.delegate.unit_is_out_of_date(info, mod_time, hint, false);
    }
}
