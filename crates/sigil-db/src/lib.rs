//! Durable symbol database and record-store access for sigil.
//!
//! The database holds what ingestion has read out of a compiler's record
//! store; the record module defines the store abstraction itself plus the
//! default JSON on-disk format.

mod database;
mod error;
mod json_store;
mod record;

pub use database::{
    Database, DatabaseStats, IncludeEdge, OccurrenceEntry, UnitImport, DB_SCHEMA_VERSION,
};
pub use error::{DatabaseError, Result, StoreError};
pub use json_store::{
    remove_unit, write_record, write_unit, JsonRecordStore, JsonRecordStoreLibrary,
    JsonStoreLibraryProvider, RECORDS_DIR, UNITS_DIR,
};
pub use record::{
    occurrence_from_record, record_from_occurrence, IncludeRecord, RecordFile, RecordOccurrence,
    RecordRelation, RecordStore, RecordStoreLibrary, StoreLibraryProvider, UnitRecord,
};
