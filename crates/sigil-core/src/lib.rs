//! Shared, dependency-minimized symbol-model types used across sigil.

pub mod occurrence;
pub mod path;
pub mod symbol;
pub mod unit;

pub use occurrence::{SymbolLocation, SymbolOccurrence, SymbolOccurrenceRef, SymbolRelation};
pub use path::{CanonicalFilePath, CanonicalPathCache};
pub use symbol::{Symbol, SymbolKind, SymbolProperties, SymbolRef, SymbolRoles, Usr};
pub use unit::{OutOfDateTriggerHint, StoreUnitInfo};
