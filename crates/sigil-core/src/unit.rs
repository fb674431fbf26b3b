use std::fmt;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::path::CanonicalFilePath;

/// Ingestion-status descriptor for one compilation unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreUnitInfo {
    pub unit_name: String,
    /// The compilation output this unit record describes, e.g. an object file
    /// path. Identity for registration and out-of-date tracking.
    pub out_file_path: String,
    /// The main source file, when the unit has one.
    pub main_file_path: Option<CanonicalFilePath>,
    /// System units hold symbols from external dependencies, not the
    /// workspace.
    pub is_system: bool,
    /// Modification time of the unit record when it was ingested.
    pub mod_time: SystemTime,
}

impl StoreUnitInfo {
    pub fn has_main_file(&self) -> bool {
        self.main_file_path.is_some()
    }

    /// Main units are visibility roots for a product.
    pub fn is_main_unit(&self) -> bool {
        self.has_main_file() && !self.is_system
    }
}

/// Why a unit was flagged out-of-date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutOfDateTriggerHint {
    /// A file the unit depends on changed.
    DependentFile(CanonicalFilePath),
    /// A unit this unit depends on is itself out of date.
    DependentUnit {
        unit_name: String,
        dep: Box<OutOfDateTriggerHint>,
    },
}

impl OutOfDateTriggerHint {
    pub fn dependent_unit(unit_name: impl Into<String>, dep: OutOfDateTriggerHint) -> Self {
        Self::DependentUnit {
            unit_name: unit_name.into(),
            dep: Box::new(dep),
        }
    }

    /// The file change at the root of the trigger chain.
    pub fn original_file_trigger(&self) -> &CanonicalFilePath {
        match self {
            Self::DependentFile(path) => path,
            Self::DependentUnit { dep, .. } => dep.original_file_trigger(),
        }
    }
}

impl fmt::Display for OutOfDateTriggerHint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DependentFile(path) => path.fmt(f),
            Self::DependentUnit { unit_name, dep } => {
                write!(f, "unit({unit_name}) -> {dep}")
            }
        }
    }
}
