//! Decides which ingested units are visible to queries.

use std::collections::{HashMap, HashSet};

use parking_lot::Mutex;
use sigil_core::{CanonicalFilePath, StoreUnitInfo};

#[derive(Default)]
struct VisibilityState {
    unit_out_paths: HashSet<String>,
    /// product name -> main files that are visibility roots for it.
    products: HashMap<String, HashSet<CanonicalFilePath>>,
}

/// Tracks registered unit-output paths and per-product main-file sets.
///
/// In explicit-output-units mode only units whose output path has been
/// registered are visible. Otherwise, once any product registers main files,
/// main units are filtered down to the registered roots; dependency units
/// (those without a main file) stay visible.
pub struct VisibilityChecker {
    use_explicit_output_units: bool,
    state: Mutex<VisibilityState>,
}

impl VisibilityChecker {
    pub fn new(use_explicit_output_units: bool) -> Self {
        Self {
            use_explicit_output_units,
            state: Mutex::new(VisibilityState::default()),
        }
    }

    pub fn register_main_files(&self, file_paths: &[CanonicalFilePath], product_name: &str) {
        let mut state = self.state.lock();
        let files = state.products.entry(product_name.to_owned()).or_default();
        for path in file_paths {
            files.insert(path.clone());
        }
    }

    pub fn unregister_main_files(&self, file_paths: &[CanonicalFilePath], product_name: &str) {
        let mut state = self.state.lock();
        if let Some(files) = state.products.get_mut(product_name) {
            for path in file_paths {
                files.remove(path);
            }
            if files.is_empty() {
                state.products.remove(product_name);
            }
        }
    }

    pub fn add_unit_out_file_paths(&self, file_paths: &[String]) {
        let mut state = self.state.lock();
        for path in file_paths {
            state.unit_out_paths.insert(path.clone());
        }
    }

    pub fn remove_unit_out_file_paths(&self, file_paths: &[String]) {
        let mut state = self.state.lock();
        for path in file_paths {
            state.unit_out_paths.remove(path);
        }
    }

    pub fn is_unit_visible(&self, info: &StoreUnitInfo) -> bool {
        let state = self.state.lock();
        if self.use_explicit_output_units {
            return state.unit_out_paths.contains(&info.out_file_path);
        }
        if state.products.is_empty() || !info.is_main_unit() {
            return true;
        }
        let Some(main_file) = &info.main_file_path else {
            return true;
        };
        state
            .products
            .values()
            .any(|files| files.contains(main_file))
    }
}
