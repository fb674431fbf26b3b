use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors produced by record-store access.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store path {path} does not exist")]
    StoreMissing { path: PathBuf },

    #[error("unknown unit {unit_name}")]
    UnknownUnit { unit_name: String },

    #[error("unknown record {record_name}")]
    UnknownRecord { record_name: String },

    #[error("malformed store file {path}: {message}")]
    Malformed { path: PathBuf, message: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors produced when opening or persisting the symbol database.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("could not create database directory {path}: {source}")]
    Create {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("could not read database snapshot {path}: {source}")]
    SnapshotRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("malformed database snapshot {path}: {message}")]
    SnapshotParse { path: PathBuf, message: String },

    #[error("could not write database snapshot {path}: {source}")]
    SnapshotWrite {
        path: PathBuf,
        source: std::io::Error,
    },
}
