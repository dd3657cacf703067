//! Row handle yielded by a [crate::scan::scan::Scan].
//!
//! A [Cursor] is a snapshot of one merged entry: the key, its latest value
//! (or tombstone), and the seqno it was last written at. It owns no
//! reference into scan-internal state, so callers can hold onto it past the
//! next `fetch` call.

use crate::db::{Diff, Entry};

/// One row of a scan's output.
#[derive(Clone, Debug)]
pub struct Cursor<K, V, D = <V as Diff>::Delta>
where
    V: Diff<Delta = D>,
{
    entry: Entry<K, V, D>,
}

impl<K, V, D> Cursor<K, V, D>
where
    V: Diff<Delta = D>,
{
    pub(crate) fn new(entry: Entry<K, V, D>) -> Self {
        Cursor { entry }
    }

    pub fn key(&self) -> &K {
        self.entry.as_key()
    }

    pub fn value(&self) -> Option<V>
    where
        V: Clone,
    {
        self.entry.to_value()
    }

    pub fn seqno(&self) -> u64 {
        self.entry.to_seqno()
    }

    pub fn is_deleted(&self) -> bool {
        self.entry.is_deleted()
    }

    /// The underlying merged entry, deltas included.
    pub fn entry(&self) -> &Entry<K, V, D> {
        &self.entry
    }
}
