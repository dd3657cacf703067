//! Which on-disk tables make up a level.
//!
//! Manifests themselves (crash-safe persistence of the level topology,
//! compaction bookkeeping) are out of scope here. [Manifest] is the read
//! contract the scan engine needs: for a given level, which tables exist
//! and what key range each one covers, so a scan can skip tables that
//! cannot intersect its range before issuing a single block read.

use std::ops::Bound;

/// One on-disk table within a level.
#[derive(Clone, Debug)]
pub struct TableInfo<K> {
    pub table_id: u64,
    pub low_key: Bound<K>,
    pub high_key: Bound<K>,
}

impl<K> TableInfo<K>
where
    K: Ord,
{
    /// Whether this table can possibly contain a key in `range`.
    pub fn overlaps(&self, range: &(Bound<K>, Bound<K>)) -> bool {
        let after_range_end = match (&self.low_key, &range.1) {
            (Bound::Included(lo), Bound::Included(hi)) => lo > hi,
            (Bound::Included(lo), Bound::Excluded(hi)) => lo >= hi,
            (Bound::Excluded(lo), Bound::Included(hi)) => lo >= hi,
            (Bound::Excluded(lo), Bound::Excluded(hi)) => lo >= hi,
            (_, Bound::Unbounded) => false,
            (Bound::Unbounded, _) => false,
        };
        let before_range_start = match (&self.high_key, &range.0) {
            (Bound::Included(hi), Bound::Included(lo)) => hi < lo,
            (Bound::Included(hi), Bound::Excluded(lo)) => hi <= lo,
            (Bound::Excluded(hi), Bound::Included(lo)) => hi <= lo,
            (Bound::Excluded(hi), Bound::Excluded(lo)) => hi <= lo,
            (_, Bound::Unbounded) => false,
            (Bound::Unbounded, _) => false,
        };
        !after_range_end && !before_range_start
    }
}

/// Per-level table listing, ordered oldest-to-newest within a level.
pub trait Manifest<K> {
    fn num_levels(&self) -> usize;

    fn tables(&self, level: usize) -> Vec<TableInfo<K>>;
}

/// Static, in-memory [Manifest] used by this crate's own tests.
pub struct StaticManifest<K> {
    levels: Vec<Vec<TableInfo<K>>>,
}

impl<K> StaticManifest<K> {
    pub fn new(levels: Vec<Vec<TableInfo<K>>>) -> Self {
        StaticManifest { levels }
    }
}

impl<K> Manifest<K> for StaticManifest<K>
where
    K: Clone,
{
    fn num_levels(&self) -> usize {
        self.levels.len()
    }

    fn tables(&self, level: usize) -> Vec<TableInfo<K>> {
        self.levels
            .get(level)
            .cloned()
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod manifest_test {
    use super::*;

    #[test]
    fn test_overlaps() {
        let t = TableInfo {
            table_id: 1,
            low_key: Bound::Included(10),
            high_key: Bound::Included(20),
        };
        assert!(t.overlaps(&(Bound::Included(15), Bound::Included(25))));
        assert!(t.overlaps(&(Bound::Unbounded, Bound::Unbounded)));
        assert!(!t.overlaps(&(Bound::Included(21), Bound::Unbounded)));
        assert!(!t.overlaps(&(Bound::Unbounded, Bound::Excluded(10))));
        assert!(t.overlaps(&(Bound::Unbounded, Bound::Included(10))));
    }

    #[test]
    fn test_static_manifest() {
        let m = StaticManifest::new(vec![
            vec![TableInfo {
                table_id: 1,
                low_key: Bound::Unbounded,
                high_key: Bound::Unbounded,
            }],
            vec![],
        ]);
        assert_eq!(m.num_levels(), 2);
        assert_eq!(m.tables(0).len(), 1);
        assert_eq!(m.tables(1).len(), 0);
    }
}
