//! The index system façade: owns every sub-component and exposes the write
//! and query surface.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use sigil_core::{
    CanonicalFilePath, CanonicalPathCache, StoreUnitInfo, SymbolKind, SymbolOccurrence,
    SymbolOccurrenceRef, SymbolRef, SymbolRoles, Usr,
};
use sigil_db::{Database, DatabaseError, StoreError, StoreLibraryProvider};

use crate::call;
use crate::datastore::{IndexDatastore, IndexDatastoreOptions};
use crate::delegate::{AsyncIndexDelegate, IndexSystemDelegate};
use crate::file_index::FilePathIndex;
use crate::symbol_index::SymbolIndex;
use crate::visibility::VisibilityChecker;

pub type Result<T> = std::result::Result<T, IndexSystemError>;

#[derive(Debug, thiserror::Error)]
pub enum IndexSystemError {
    #[error("could not open index database: {0}")]
    DatabaseOpenFailed(#[from] DatabaseError),

    #[error("could not determine indexstore library for {path}")]
    NoStoreLibrary { path: PathBuf },

    #[error("could not open index store at {path}: {source}")]
    IndexStoreOpenFailed { path: PathBuf, source: StoreError },

    #[error("could not initialize unit ingestion: {0}")]
    IngestionInitFailed(StoreError),
}

pub struct IndexSystemConfig {
    pub store_path: PathBuf,
    pub database_base_path: PathBuf,
    pub library_provider: Arc<dyn StoreLibraryProvider>,
    pub delegate: Option<Arc<dyn IndexSystemDelegate>>,
    pub use_explicit_output_units: bool,
    pub readonly: bool,
    pub enable_out_of_date_file_watching: bool,
    pub listen_to_unit_events: bool,
    pub wait_until_done_initializing: bool,
    pub initial_db_size: Option<usize>,
}

impl IndexSystemConfig {
    pub fn new(
        store_path: impl Into<PathBuf>,
        database_base_path: impl Into<PathBuf>,
        library_provider: Arc<dyn StoreLibraryProvider>,
    ) -> Self {
        Self {
            store_path: store_path.into(),
            database_base_path: database_base_path.into(),
            library_provider,
            delegate: None,
            use_explicit_output_units: false,
            readonly: false,
            enable_out_of_date_file_watching: false,
            listen_to_unit_events: true,
            wait_until_done_initializing: false,
            initial_db_size: None,
        }
    }
}

/// The top-level index: a durable, queryable database of source symbols fed
/// by compiler-emitted unit records.
///
/// Owns the database, the record store handle, the visibility checker, both
/// query indexes, the ingestion pipeline and the delegate dispatcher. Thread
/// safe: queries and mutations may run concurrently with ingestion.
pub struct IndexSystem {
    database: Arc<Database>,
    delegate: Arc<AsyncIndexDelegate>,
    visibility: Arc<VisibilityChecker>,
    symbol_index: SymbolIndex,
    path_index: FilePathIndex,
    datastore: IndexDatastore,
    store_path_warning: Option<String>,
}

impl IndexSystem {
    pub fn create(config: IndexSystemConfig) -> Result<IndexSystem> {
        let delegate = Arc::new(AsyncIndexDelegate::new(config.delegate));

        let database = Database::open(
            &config.database_base_path,
            config.readonly,
            config.initial_db_size,
        )?;

        let library = config
            .library_provider
            .library_for_store_path(&config.store_path)
            .ok_or_else(|| IndexSystemError::NoStoreLibrary {
                path: config.store_path.clone(),
            })?;

        // Store-path creation is best-effort: a failure is recorded and
        // construction continues (opening the store will surface the real
        // problem if there is one).
        let mut store_path_warning = None;
        if !config.readonly {
            if let Err(err) = std::fs::create_dir_all(&config.store_path) {
                let message = format!(
                    "could not create directories for data store path {}: {err}",
                    config.store_path.display()
                );
                tracing::warn!("{message}");
                store_path_warning = Some(message);
            }
        }

        let store =
            library
                .open_store(&config.store_path)
                .map_err(|source| IndexSystemError::IndexStoreOpenFailed {
                    path: config.store_path.clone(),
                    source,
                })?;

        let canon_cache = Arc::new(CanonicalPathCache::new());
        let visibility = Arc::new(VisibilityChecker::new(config.use_explicit_output_units));
        let symbol_index = SymbolIndex::new(database.clone(), visibility.clone());
        let path_index =
            FilePathIndex::new(database.clone(), visibility.clone(), canon_cache.clone());

        let datastore = IndexDatastore::create(
            store,
            database.clone(),
            delegate.clone(),
            canon_cache,
            IndexDatastoreOptions {
                use_explicit_output_units: config.use_explicit_output_units,
                readonly: config.readonly,
                enable_out_of_date_file_watching: config.enable_out_of_date_file_watching,
                listen_to_unit_events: config.listen_to_unit_events,
                wait_until_done_initializing: config.wait_until_done_initializing,
            },
        )
        .map_err(IndexSystemError::IngestionInitFailed)?;

        Ok(IndexSystem {
            database,
            delegate,
            visibility,
            symbol_index,
            path_index,
            datastore,
            store_path_warning,
        })
    }

    /// The recorded (non-fatal) store-path creation failure, if any.
    pub fn store_path_warning(&self) -> Option<&str> {
        self.store_path_warning.as_deref()
    }

    // --- ingestion control --------------------------------------------------

    pub fn is_unit_out_of_date(&self, unit_out_file_path: &str, dirty_files: &[&Path]) -> bool {
        let dirty: Vec<CanonicalFilePath> = dirty_files
            .iter()
            .map(|path| self.path_index.canonical_path(path))
            .collect();
        self.datastore.is_unit_out_of_date(unit_out_file_path, &dirty)
    }

    pub fn is_unit_out_of_date_mod_time(
        &self,
        unit_out_file_path: &str,
        out_of_date_mod_time: SystemTime,
    ) -> bool {
        self.datastore
            .is_unit_out_of_date_mod_time(unit_out_file_path, out_of_date_mod_time)
    }

    pub fn check_unit_containing_file_is_out_of_date(&self, file: &Path) {
        let canonical = self.path_index.canonical_path(file);
        self.datastore
            .check_unit_containing_file_is_out_of_date(&canonical);
    }

    pub fn register_main_files(&self, file_paths: &[&Path], product_name: &str) {
        let canonical: Vec<CanonicalFilePath> = file_paths
            .iter()
            .map(|path| self.path_index.canonical_path(path))
            .collect();
        self.visibility.register_main_files(&canonical, product_name);
    }

    pub fn unregister_main_files(&self, file_paths: &[&Path], product_name: &str) {
        let canonical: Vec<CanonicalFilePath> = file_paths
            .iter()
            .map(|path| self.path_index.canonical_path(path))
            .collect();
        self.visibility
            .unregister_main_files(&canonical, product_name);
    }

    /// Register unit output paths. Visibility is updated before ingestion so
    /// newly-read records classify correctly right away.
    pub fn add_unit_out_file_paths(&self, file_paths: &[String], wait_for_processing: bool) {
        self.visibility.add_unit_out_file_paths(file_paths);
        self.datastore
            .add_unit_out_file_paths(file_paths, wait_for_processing);
    }

    pub fn remove_unit_out_file_paths(&self, file_paths: &[String], wait_for_processing: bool) {
        self.visibility.remove_unit_out_file_paths(file_paths);
        self.datastore
            .remove_unit_out_file_paths(file_paths, wait_for_processing);
    }

    pub fn purge_stale_data(&self) {
        self.datastore.purge_stale_data();
    }

    /// Strong fence: on return, every unit-record change visible on the
    /// filesystem at entry has been ingested and every delegate notification
    /// that ingestion produced has been delivered.
    pub fn poll_for_unit_changes_and_wait(&self) {
        self.datastore.poll_for_unit_changes_and_wait();
        self.delegate.wait();
    }

    // --- symbol queries -----------------------------------------------------

    pub fn foreach_symbol_occurrence_by_usr(
        &self,
        usr: &str,
        role_set: SymbolRoles,
        receiver: impl FnMut(&SymbolOccurrenceRef) -> bool,
    ) -> bool {
        self.symbol_index
            .foreach_symbol_occurrence_by_usr(&Usr::from(usr), role_set, receiver)
    }

    pub fn foreach_related_symbol_occurrence_by_usr(
        &self,
        usr: &str,
        role_set: SymbolRoles,
        receiver: impl FnMut(&SymbolOccurrenceRef) -> bool,
    ) -> bool {
        self.symbol_index
            .foreach_related_symbol_occurrence_by_usr(&Usr::from(usr), role_set, receiver)
    }

    pub fn foreach_canonical_symbol_occurrence_by_usr(
        &self,
        usr: &str,
        receiver: impl FnMut(&SymbolOccurrenceRef) -> bool,
    ) -> bool {
        self.symbol_index
            .foreach_canonical_symbol_occurrence_by_usr(&Usr::from(usr), receiver)
    }

    pub fn foreach_canonical_symbol_occurrence_by_name(
        &self,
        name: &str,
        receiver: impl FnMut(&SymbolOccurrenceRef) -> bool,
    ) -> bool {
        self.symbol_index
            .foreach_canonical_symbol_occurrence_by_name(name, receiver)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn foreach_canonical_symbol_occurrence_containing_pattern(
        &self,
        pattern: &str,
        anchor_start: bool,
        anchor_end: bool,
        subsequence: bool,
        ignore_case: bool,
        receiver: impl FnMut(&SymbolOccurrenceRef) -> bool,
    ) -> bool {
        self.symbol_index
            .foreach_canonical_symbol_occurrence_containing_pattern(
                pattern,
                anchor_start,
                anchor_end,
                subsequence,
                ignore_case,
                receiver,
            )
    }

    pub fn foreach_canonical_symbol_occurrence_by_kind(
        &self,
        kind: SymbolKind,
        workspace_only: bool,
        receiver: impl FnMut(&SymbolOccurrenceRef) -> bool,
    ) -> bool {
        self.symbol_index
            .foreach_canonical_symbol_occurrence_by_kind(kind, workspace_only, receiver)
    }

    pub fn count_of_canonical_symbols_with_kind(
        &self,
        kind: SymbolKind,
        workspace_only: bool,
    ) -> usize {
        self.symbol_index
            .count_of_canonical_symbols_with_kind(kind, workspace_only)
    }

    pub fn foreach_symbol_name(&self, receiver: impl FnMut(&str) -> bool) -> bool {
        self.symbol_index.foreach_symbol_name(receiver)
    }

    /// Enumerate every occurrence that could invoke `callee`, accounting for
    /// dynamic dispatch, protocol conformance and class extensions.
    ///
    /// Returns `false` when the callee is not callable (nothing is
    /// enumerated) or when the receiver aborted.
    pub fn foreach_symbol_call_occurrence(
        &self,
        callee: &SymbolOccurrence,
        mut receiver: impl FnMut(&SymbolOccurrenceRef) -> bool,
    ) -> bool {
        call::foreach_symbol_call_occurrence(&self.symbol_index, callee, &mut receiver)
    }

    /// The transitive base methods (for an instance method) or base classes
    /// (for a type) of `symbol`, deduplicated by USR.
    pub fn get_base_methods_or_classes(&self, symbol: &SymbolRef) -> Vec<SymbolRef> {
        let mut out = Vec::new();
        call::collect_base_methods_or_classes(&self.symbol_index, symbol, &mut out);
        out
    }

    pub fn foreach_unit_test_symbol_referenced_by_output_paths(
        &self,
        out_file_paths: &[String],
        receiver: impl FnMut(&SymbolOccurrenceRef) -> bool,
    ) -> bool {
        self.symbol_index
            .foreach_unit_test_symbol_referenced_by_output_paths(out_file_paths, receiver)
    }

    // --- file queries -------------------------------------------------------

    pub fn is_known_file(&self, file: &Path) -> bool {
        let canonical = self.path_index.canonical_path(file);
        self.path_index.is_known_file(&canonical)
    }

    pub fn foreach_main_unit_containing_file(
        &self,
        file: &Path,
        receiver: impl FnMut(&StoreUnitInfo) -> bool,
    ) -> bool {
        let canonical = self.path_index.canonical_path(file);
        self.path_index
            .foreach_main_unit_containing_file(&canonical, receiver)
    }

    pub fn foreach_file_of_unit(
        &self,
        unit_name: &str,
        follow_dependencies: bool,
        receiver: impl FnMut(&CanonicalFilePath) -> bool,
    ) -> bool {
        self.path_index
            .foreach_file_of_unit(unit_name, follow_dependencies, receiver)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn foreach_filename_containing_pattern(
        &self,
        pattern: &str,
        anchor_start: bool,
        anchor_end: bool,
        subsequence: bool,
        ignore_case: bool,
        receiver: impl FnMut(&CanonicalFilePath) -> bool,
    ) -> bool {
        self.path_index.foreach_filename_containing_pattern(
            pattern,
            anchor_start,
            anchor_end,
            subsequence,
            ignore_case,
            receiver,
        )
    }

    pub fn foreach_file_including_file(
        &self,
        target: &Path,
        receiver: impl FnMut(&CanonicalFilePath, u32) -> bool,
    ) -> bool {
        let canonical = self.path_index.canonical_path(target);
        self.path_index
            .foreach_file_including_file(&canonical, receiver)
    }

    pub fn foreach_file_included_by_file(
        &self,
        source: &Path,
        receiver: impl FnMut(&CanonicalFilePath, u32) -> bool,
    ) -> bool {
        let canonical = self.path_index.canonical_path(source);
        self.path_index
            .foreach_file_included_by_file(&canonical, receiver)
    }

    pub fn foreach_include_of_unit(
        &self,
        unit_name: &str,
        receiver: impl FnMut(&CanonicalFilePath, &CanonicalFilePath, u32) -> bool,
    ) -> bool {
        self.path_index.foreach_include_of_unit(unit_name, receiver)
    }

    // --- diagnostics --------------------------------------------------------

    pub fn print_stats(&self, out: &mut dyn std::io::Write) -> std::io::Result<()> {
        self.symbol_index.print_stats(out)
    }

    pub fn dump_unit_file_associations(&self, out: &mut dyn std::io::Write) -> std::io::Result<()> {
        self.symbol_index.dump_unit_file_associations(out)
    }
}

impl Drop for IndexSystem {
    fn drop(&mut self) {
        // Stop ingestion first so the snapshot below sees its final writes,
        // then drain any pending delegate deliveries.
        self.datastore.shutdown();
        self.delegate.wait();
        if let Err(err) = self.database.save() {
            tracing::warn!(error = %err, "could not persist index database on shutdown");
        }
    }
}
