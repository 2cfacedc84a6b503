//! Iteration over all cataloged segments, evicting the ones that fail to load.

use crate::catalog::{Catalog, CatalogEntry};
use crate::encoding::{Key, Value};
use crate::error::{Error, Result};
use crate::range::RangeSet;
use crate::segment::{self, Segment};
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

/// Values of every cataloged segment in catalog order, and within a segment
/// in key order, optionally restricted to a set of key ranges.
///
/// Segments are opened lazily. One that cannot be opened or read is treated
/// as corrupt: its file is deleted, its catalog entry removed and iteration
/// moves on. After `max_errors` such failures the iterator stops early.
/// Results across segments are not deduplicated.
pub struct RangeIterator<K, V> {
    dir: PathBuf,
    catalog: Arc<Mutex<Catalog>>,
    pending: VecDeque<CatalogEntry>,
    ranges: Option<RangeSet<K>>,
    current: VecDeque<V>,
    errors: usize,
    max_errors: usize,
}

impl<K, V> RangeIterator<K, V>
where
    K: Key + Ord + Clone,
    V: Value + Clone,
{
    /// Snapshots the catalog after refreshing it from disk. A failed refresh
    /// falls back to the in-memory entries.
    pub fn new(
        dir: PathBuf,
        catalog: Arc<Mutex<Catalog>>,
        ranges: Option<RangeSet<K>>,
        max_errors: usize,
    ) -> Result<Self> {
        let pending = {
            let mut catalog = catalog.lock()?;
            if let Err(e) = catalog.reload() {
                tracing::warn!(path = %catalog.path().display(), error = %e, "Catalog reload failed, using cached entries");
            }
            catalog.entries().iter().cloned().collect()
        };

        Ok(Self {
            dir,
            catalog,
            pending,
            ranges,
            current: VecDeque::new(),
            errors: 0,
            max_errors,
        })
    }

    pub fn has_next(&mut self) -> bool {
        loop {
            if !self.current.is_empty() {
                return true;
            }
            let Some(entry) = self.pending.pop_front() else {
                return false;
            };

            match self.load(&entry) {
                Ok(values) => self.current = values,
                Err(e) => {
                    self.evict(&entry, &e);
                    self.errors += 1;
                    if self.errors >= self.max_errors {
                        tracing::error!(
                            errors = self.errors,
                            skipped = self.pending.len(),
                            "Too many corrupt segments, stopping iteration"
                        );
                        self.pending.clear();
                        return false;
                    }
                }
            }
        }
    }

    /// Number of segments evicted so far.
    pub fn errors(&self) -> usize {
        self.errors
    }

    fn load(&self, entry: &CatalogEntry) -> Result<VecDeque<V>> {
        let segment: Segment<K, V> = Segment::open(&self.dir, &entry.name, entry.start, entry.end)?;
        let values = match &self.ranges {
            Some(ranges) => segment.range(ranges).map(|(_, v)| v.clone()).collect(),
            None => segment.iter().map(|(_, v)| v.clone()).collect(),
        };
        Ok(values)
    }

    fn evict(&self, entry: &CatalogEntry, cause: &Error) {
        tracing::error!(segment = %entry.name, start = entry.start, end = entry.end, error = %cause, "Evicting corrupt segment");

        if let Err(e) = segment::delete(&self.dir, &entry.name) {
            tracing::warn!(segment = %entry.name, error = %e, "Failed to delete corrupt segment");
        }

        // Re-read first so segments registered since the snapshot survive.
        let result = self.catalog.lock().map_err(Error::from).and_then(|mut catalog| {
            catalog.reload()?;
            catalog.remove(&entry.name);
            catalog.persist()
        });
        if let Err(e) = result {
            tracing::warn!(segment = %entry.name, error = %e, "Failed to drop corrupt segment from catalog");
        }
    }
}

impl<K, V> Iterator for RangeIterator<K, V>
where
    K: Key + Ord + Clone,
    V: Value + Clone,
{
    type Item = V;

    fn next(&mut self) -> Option<V> {
        if !self.has_next() {
            return None;
        }
        self.current.pop_front()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::range::KeyRange;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    fn add_segment(dir: &Path, catalog: &Arc<Mutex<Catalog>>, keys: std::ops::Range<i64>) -> String {
        let entries = keys.clone().map(|k| (k, k as u64 * 10)).collect();
        let span = (keys.start as u64 * 10, keys.end as u64 * 10 - 1);
        let segment = Segment::create(dir, "0", entries, span, 4, 3).unwrap();

        let mut catalog = catalog.lock().unwrap();
        catalog.insert(CatalogEntry::new(segment.name(), span.0, span.1));
        catalog.persist().unwrap();
        segment.name().to_string()
    }

    fn setup() -> (TempDir, Arc<Mutex<Catalog>>) {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let catalog = Catalog::load_or_create(dir.path()).expect("Failed to create catalog");
        (dir, Arc::new(Mutex::new(catalog)))
    }

    fn iter(dir: &Path, catalog: &Arc<Mutex<Catalog>>, ranges: Option<RangeSet<i64>>) -> RangeIterator<i64, u64> {
        RangeIterator::new(dir.to_path_buf(), catalog.clone(), ranges, 5).unwrap()
    }

    #[test]
    fn test_empty_catalog() {
        let (dir, catalog) = setup();
        let mut it = iter(dir.path(), &catalog, None);
        assert!(!it.has_next());
        assert_eq!(it.next(), None);
    }

    #[test]
    fn test_segments_in_catalog_order() {
        let (dir, catalog) = setup();
        add_segment(dir.path(), &catalog, 50..60);
        add_segment(dir.path(), &catalog, 0..10);

        let values: Vec<u64> = iter(dir.path(), &catalog, None).collect();
        let expected: Vec<u64> = (50..60).chain(0..10).map(|k| k * 10).collect();
        assert_eq!(values, expected);
    }

    #[test]
    fn test_range_filter() {
        let (dir, catalog) = setup();
        add_segment(dir.path(), &catalog, 0..50);
        add_segment(dir.path(), &catalog, 50..100);

        let ranges = RangeSet::merge(vec![KeyRange::new(0, 10), KeyRange::new(50, 55)]);
        let keys: Vec<u64> = iter(dir.path(), &catalog, Some(ranges)).map(|v| v / 10).collect();
        let expected: Vec<u64> = (0..=10).chain(50..=55).collect();
        assert_eq!(keys, expected);
    }

    #[test]
    fn test_has_next_is_idempotent() {
        let (dir, catalog) = setup();
        add_segment(dir.path(), &catalog, 0..1);

        let mut it = iter(dir.path(), &catalog, None);
        assert!(it.has_next());
        assert!(it.has_next());
        assert_eq!(it.next(), Some(0));
        assert!(!it.has_next());
        assert_eq!(it.next(), None);
    }

    #[test]
    fn test_corrupt_segment_evicted() {
        let (dir, catalog) = setup();
        add_segment(dir.path(), &catalog, 0..10);
        let corrupt = add_segment(dir.path(), &catalog, 10..20);
        add_segment(dir.path(), &catalog, 20..30);

        let path = dir.path().join(&corrupt);
        let bytes = fs::read(&path).unwrap();
        fs::write(&path, &bytes[..bytes.len() - 7]).unwrap();

        let mut it = iter(dir.path(), &catalog, None);
        let values: Vec<u64> = it.by_ref().collect();
        let expected: Vec<u64> = (0..10).chain(20..30).map(|k| k * 10).collect();
        assert_eq!(values, expected);
        assert_eq!(it.errors(), 1);

        assert!(!path.exists());
        let reloaded = Catalog::load_or_create(dir.path()).unwrap();
        assert_eq!(reloaded.len(), 2);
        assert!(reloaded.entries().iter().all(|e| e.name != corrupt));
    }

    #[test]
    fn test_gives_up_after_max_errors() {
        let (dir, catalog) = setup();
        {
            let mut catalog = catalog.lock().unwrap();
            for i in 0..7 {
                catalog.insert(CatalogEntry::new(format!("0_missing{}", i), i * 10, i * 10 + 9));
            }
            catalog.persist().unwrap();
        }
        add_segment(dir.path(), &catalog, 100..110);

        let mut it = iter(dir.path(), &catalog, None);
        assert!(!it.has_next());
        assert_eq!(it.errors(), 5);

        // Two unreadable entries and the valid segment were never visited.
        assert_eq!(catalog.lock().unwrap().len(), 3);
        let values: Vec<u64> = iter(dir.path(), &catalog, None).collect();
        assert_eq!(values, (100..110).map(|k| k * 10).collect::<Vec<_>>());
        assert_eq!(catalog.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_sees_segments_written_elsewhere() {
        let (dir, catalog) = setup();

        // Another process writes through its own catalog handle.
        let other = Arc::new(Mutex::new(Catalog::load_or_create(dir.path()).unwrap()));
        add_segment(dir.path(), &other, 0..3);

        let values: Vec<u64> = iter(dir.path(), &catalog, None).collect();
        assert_eq!(values, vec![0, 10, 20]);
    }

    #[test]
    fn test_eviction_keeps_segments_registered_later() {
        let (dir, reader) = setup();
        let first = add_segment(dir.path(), &reader, 0..10);
        let mut it = iter(dir.path(), &reader, None);

        let writer = Arc::new(Mutex::new(Catalog::load_or_create(dir.path()).unwrap()));
        let second = add_segment(dir.path(), &writer, 10..20);

        let path = dir.path().join(&first);
        fs::write(&path, b"garbage").unwrap();

        assert_eq!(it.by_ref().count(), 0);
        assert_eq!(it.errors(), 1);

        let on_disk = Catalog::load_or_create(dir.path()).unwrap();
        let names: Vec<&str> = on_disk.entries().iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec![second.as_str()]);
        assert!(dir.path().join(&second).exists());
    }
}
