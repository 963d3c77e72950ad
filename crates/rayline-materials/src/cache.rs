//! Load-once storage for parsed tables.
//!
//! A [`TableCache`] is owned by (or shared between) optical elements. Each
//! file is parsed the first time it is requested and handed out as an
//! `Arc` afterwards; cached tables are never mutated.

use std::collections::HashMap;
use std::hash::Hash;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use crate::prerefl::PreReflTable;
use crate::provider::MaterialError;
use crate::table::{CurveAxis, Interpolation, ReflectivityCurve, ReflectivityMap};

type Store<K, T> = Mutex<HashMap<K, Arc<T>>>;

/// Cache of parsed PreRefl files and reflectivity tables keyed by path.
#[derive(Debug, Default)]
pub struct TableCache {
    prerefl: Store<PathBuf, PreReflTable>,
    curves: Store<(PathBuf, CurveAxis), ReflectivityCurve>,
    maps: Store<(PathBuf, Interpolation), ReflectivityMap>,
}

fn get_or_load<K, T, F>(store: &Store<K, T>, key: K, load: F) -> Result<Arc<T>, MaterialError>
where
    K: Eq + Hash,
    F: FnOnce() -> Result<T, MaterialError>,
{
    // A panic while loading leaves the map itself consistent.
    let mut map = store.lock().unwrap_or_else(PoisonError::into_inner);
    if let Some(table) = map.get(&key) {
        return Ok(Arc::clone(table));
    }
    let table = Arc::new(load()?);
    map.insert(key, Arc::clone(&table));
    Ok(table)
}

impl TableCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn prerefl(&self, path: &Path) -> Result<Arc<PreReflTable>, MaterialError> {
        get_or_load(&self.prerefl, path.to_path_buf(), || PreReflTable::from_file(path))
    }

    pub fn curve(&self, path: &Path, axis: CurveAxis) -> Result<Arc<ReflectivityCurve>, MaterialError> {
        get_or_load(&self.curves, (path.to_path_buf(), axis), || {
            ReflectivityCurve::from_file(axis, path)
        })
    }

    pub fn map(&self, path: &Path, interpolation: Interpolation) -> Result<Arc<ReflectivityMap>, MaterialError> {
        get_or_load(&self.maps, (path.to_path_buf(), interpolation), || {
            ReflectivityMap::from_file(path, interpolation)
        })
    }

    /// Number of tables currently held.
    pub fn len(&self) -> usize {
        self.prerefl.lock().unwrap_or_else(PoisonError::into_inner).len()
            + self.curves.lock().unwrap_or_else(PoisonError::into_inner).len()
            + self.maps.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tables_are_loaded_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("r.dat");
        std::fs::write(&path, "1 0.9\n2 0.8\n").unwrap();

        let cache = TableCache::new();
        let a = cache.curve(&path, CurveAxis::GrazingAngle).unwrap();
        // Changing the file does not affect the cached copy.
        std::fs::write(&path, "1 0.1\n2 0.1\n").unwrap();
        let b = cache.curve(&path, CurveAxis::GrazingAngle).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(cache.len(), 1);

        // A different axis is a different table.
        let c = cache.curve(&path, CurveAxis::PhotonEnergy).unwrap();
        assert!(!Arc::ptr_eq(&a, &c));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_failed_load_is_not_cached() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.dat");
        let cache = TableCache::new();
        assert!(cache.prerefl(&path).is_err());
        assert!(cache.is_empty());
    }
}
