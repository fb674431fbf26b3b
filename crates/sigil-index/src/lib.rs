//! The sigil index system: a persistent, queryable index of source-code
//! symbols produced by a compiler toolchain.
//!
//! Compilers emit a unit record per compilation plus record files enumerating
//! symbol occurrences; [`IndexSystem`] ingests those artifacts into the
//! database, keeps it consistent as records change on disk, enforces
//! visibility (only symbols reachable from registered units are queryable)
//! and serves the query surface, including call-graph expansion across
//! dynamic dispatch.

mod call;
mod datastore;
mod delegate;
mod file_index;
mod pattern;
mod symbol_index;
mod system;
mod visibility;

pub use datastore::{IndexDatastore, IndexDatastoreOptions};
pub use delegate::{AsyncIndexDelegate, IndexSystemDelegate};
pub use file_index::FilePathIndex;
pub use symbol_index::SymbolIndex;
pub use system::{IndexSystem, IndexSystemConfig, IndexSystemError, Result};
pub use visibility::VisibilityChecker;
