//! Binary search over a table's index-block to refine a key range down to
//! the data-blocks that can hold it.
//!
//! Index entries carry each data-block's **maximum** key, ascending. A data
//! block can hold `key` iff its boundary key is `>= key`; the first such
//! block is therefore the lower-bound search over boundary keys. If no
//! boundary key is `>= key`, every entry in the level sorts below `key` and
//! no block can contain it.

use std::ops::Bound;

use crate::robt::BlockIndex;

/// Return the index, into `blocks`, of the block that may contain `key`, or
/// `None` if every block's maximum key sorts below `key`.
pub fn search_block<K>(blocks: &[BlockIndex<K>], key: &K) -> Option<usize>
where
    K: Ord,
{
    let idx = lower_bound_block(blocks, key);
    if idx < blocks.len() {
        Some(idx)
    } else {
        None
    }
}

/// Return the index of the first block whose boundary (maximum) key is
/// `>= key`, or `blocks.len()` if every block's boundary sorts below `key`.
pub fn lower_bound_block<K>(blocks: &[BlockIndex<K>], key: &K) -> usize
where
    K: Ord,
{
    blocks.partition_point(|b| b.boundary_key < *key)
}

/// Whether `key` satisfies `bound` used as a range's lower bound.
pub fn above_lower<K>(bound: &Bound<K>, key: &K) -> bool
where
    K: Ord,
{
    match bound {
        Bound::Included(b) => key >= b,
        Bound::Excluded(b) => key > b,
        Bound::Unbounded => true,
    }
}

/// Whether `key` satisfies `bound` used as a range's upper bound.
pub fn below_upper<K>(bound: &Bound<K>, key: &K) -> bool
where
    K: Ord,
{
    match bound {
        Bound::Included(b) => key <= b,
        Bound::Excluded(b) => key < b,
        Bound::Unbounded => true,
    }
}

/// The key carried by `bound`, or `None` for `Bound::Unbounded`.
pub fn bound_key<K>(bound: &Bound<K>) -> Option<&K> {
    match bound {
        Bound::Included(k) | Bound::Excluded(k) => Some(k),
        Bound::Unbounded => None,
    }
}
