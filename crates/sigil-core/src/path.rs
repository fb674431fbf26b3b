use std::collections::HashMap;
use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;

/// A normalised absolute path, used as identity for every file-keyed query.
///
/// Values are only produced by [`CanonicalPathCache`] (or by storage layers
/// re-hydrating paths that were canonicalised before being persisted), so two
/// `CanonicalFilePath`s compare equal iff they name the same file after
/// OS-level normalisation.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CanonicalFilePath(Arc<Path>);

impl CanonicalFilePath {
    /// Wrap a path that is already canonical.
    ///
    /// The caller guarantees normalisation; use [`CanonicalPathCache`] for
    /// arbitrary input paths.
    pub fn assume_canonical(path: impl Into<PathBuf>) -> Self {
        Self(Arc::from(path.into().as_path()))
    }

    pub fn as_path(&self) -> &Path {
        &self.0
    }

    pub fn file_name(&self) -> Option<&str> {
        self.0.file_name().and_then(|n| n.to_str())
    }
}

impl fmt::Debug for CanonicalFilePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CanonicalFilePath").field(&self.0).finish()
    }
}

impl fmt::Display for CanonicalFilePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.display().fmt(f)
    }
}

impl AsRef<Path> for CanonicalFilePath {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

impl serde::Serialize for CanonicalFilePath {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

impl<'de> serde::Deserialize<'de> for CanonicalFilePath {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        PathBuf::deserialize(deserializer).map(CanonicalFilePath::assume_canonical)
    }
}

/// Process-wide memoising path normaliser.
///
/// Paths that exist are resolved through the OS (`std::fs::canonicalize`);
/// paths that do not are normalised lexically so they still get a stable
/// identity. Cached entries are never evicted, which gives referential
/// stability for the lifetime of the cache.
#[derive(Default)]
pub struct CanonicalPathCache {
    cache: RwLock<HashMap<PathBuf, CanonicalFilePath>>,
}

impl CanonicalPathCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn canonicalize(&self, path: &Path) -> CanonicalFilePath {
        if let Some(found) = self.cache.read().get(path) {
            return found.clone();
        }

        let resolved = match std::fs::canonicalize(path) {
            Ok(resolved) => resolved,
            Err(_) => normalize_lexically(path),
        };
        let canonical = CanonicalFilePath(Arc::from(resolved.as_path()));

        let mut cache = self.cache.write();
        cache
            .entry(path.to_path_buf())
            .or_insert(canonical)
            .clone()
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.cache.read().len()
    }
}

/// Strip `.` components and fold `..` against preceding normal components,
/// without touching the filesystem.
fn normalize_lexically(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push(Component::ParentDir);
                }
            }
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn lexical_normalisation_strips_dots() {
        let cache = CanonicalPathCache::new();
        let a = cache.canonicalize(Path::new("/work/src/./lib/../main.rs"));
        let b = cache.canonicalize(Path::new("/work/src/main.rs"));
        assert_eq!(a, b);
    }

    #[test]
    fn existing_paths_resolve_through_the_os() {
        let dir = tempfile::tempdir().expect("tempdir");
        let file = dir.path().join("f.txt");
        std::fs::write(&file, "x").expect("write");

        let cache = CanonicalPathCache::new();
        let direct = cache.canonicalize(&file);
        let dotted = cache.canonicalize(&dir.path().join("./f.txt"));
        assert_eq!(direct, dotted);
    }

    #[test]
    fn repeated_lookups_hit_the_cache() {
        let cache = CanonicalPathCache::new();
        let p = Path::new("/work/a.rs");
        let first = cache.canonicalize(p);
        let second = cache.canonicalize(p);
        assert_eq!(first, second);
        assert_eq!(cache.len(), 1);
    }
}
