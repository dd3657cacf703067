//! Walks the data-blocks of one level in key order, decoding blocks lazily
//! and lazily fetching the next one only once the current block is spent.
//! Symmetric in both directions: a [Direction::Reverse] iterator starts at
//! the highest-keyed table and block and walks backward, block by block and
//! table by table, the mirror image of [Direction::Forward].
//!
//! Every step re-checks the scan's own range, not just the block/table
//! boundaries: a level must stop at its *stop* bound (the range's upper
//! bound walking forward, lower bound walking in reverse) even mid-block,
//! since a data block's span is rarely aligned with the requested range.

use std::{cell::RefCell, ops::Bound, rc::Rc};

use crate::{
    db::{Diff, Entry},
    robt::BlockIndex,
    scan::{
        buffer::ScanBuffer,
        event_loop::EventLoop,
        level_index_iter::LevelIndexIterator,
        manifest::TableInfo,
        range_search::{above_lower, below_upper, bound_key, lower_bound_block, search_block},
        storage::BlockStore,
    },
    Result,
};

/// Direction a [LevelIterator] walks its level in.
#[derive(Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Reverse,
}

struct Inner<K, V, D>
where
    V: Diff<Delta = D>,
{
    tables: LevelIndexIterator<K>,
    direction: Direction,
    range: (Bound<K>, Bound<K>),
    block: Vec<Entry<K, V, D>>,
    /// Entry count of the currently loaded block, used as the unit
    /// [ScanBuffer] tracks usage in once the block is spent.
    block_len: usize,
    /// Index, into the current table's index-block, of the block currently
    /// loaded. Lets [LevelIterator::advance] step to the next (or previous)
    /// block within the same table before falling back to the next table.
    block_idx: usize,
    pos: usize,
    eof: bool,
}

/// Set `eof` once the entry at `pos` has crossed the range's stop bound:
/// the upper bound walking forward, the lower bound walking in reverse.
/// Block/table exhaustion is handled separately in [LevelIterator::advance];
/// this only catches a range boundary landing inside a block.
fn enforce_range<K, V, D>(inner: &mut Inner<K, V, D>)
where
    K: Ord,
    V: Diff<Delta = D>,
{
    if inner.eof {
        return;
    }
    if let Some(entry) = inner.block.get(inner.pos) {
        let key = entry.as_key();
        let in_range = match inner.direction {
            Direction::Forward => below_upper(&inner.range.1, key),
            Direction::Reverse => above_lower(&inner.range.0, key),
        };
        if !in_range {
            inner.eof = true;
            inner.block.clear();
            inner.pos = 0;
        }
    }
}

/// Ordered view onto a single level's entries, restricted to a range. Shared
/// via `Rc<RefCell<_>>` because every method that touches storage must defer
/// through the event loop, so control returns to the caller long before the
/// state it mutates is next read.
pub struct LevelIterator<K, V, D = <V as Diff>::Delta>
where
    V: Diff<Delta = D>,
{
    inner: Rc<RefCell<Inner<K, V, D>>>,
    store: Rc<dyn BlockStore<K, V, D>>,
}

impl<K, V, D> Clone for LevelIterator<K, V, D>
where
    V: Diff<Delta = D>,
{
    fn clone(&self) -> Self {
        LevelIterator {
            inner: self.inner.clone(),
            store: self.store.clone(),
        }
    }
}

impl<K, V, D> LevelIterator<K, V, D>
where
    K: Clone + Ord + 'static,
    V: Clone + Diff<Delta = D> + 'static,
    D: Clone + 'static,
{
    /// Open a level for `range`, positioned before the first qualifying
    /// entry (or after the last one, for [Direction::Reverse]). `buffer`,
    /// when given, is charged for every data block loaded from here on.
    pub fn open(
        tables: Vec<TableInfo<K>>,
        range: (Bound<K>, Bound<K>),
        direction: Direction,
        store: Rc<dyn BlockStore<K, V, D>>,
        buffer: Option<Rc<RefCell<ScanBuffer>>>,
        el: &mut EventLoop,
        on_done: Box<dyn FnOnce(&mut EventLoop, Result<LevelIterator<K, V, D>>)>,
    ) {
        let store_cb = store.clone();
        let range_cb = range.clone();
        LevelIndexIterator::open(
            tables,
            range.clone(),
            direction,
            store.clone(),
            el,
            Box::new(move |el, res| match res {
                Ok(tables) => {
                    let eof = tables.is_eof();
                    let iter = LevelIterator {
                        inner: Rc::new(RefCell::new(Inner {
                            tables,
                            direction,
                            range: range_cb,
                            block: Vec::new(),
                            block_len: 0,
                            block_idx: 0,
                            pos: 0,
                            eof,
                        })),
                        store: store_cb,
                    };
                    if eof {
                        el.schedule(move |el| on_done(el, Ok(iter)));
                    } else {
                        let seek_bound = iter.initial_seek_bound();
                        iter.load_block(Some(seek_bound), buffer, el, on_done);
                    }
                }
                Err(err) => on_done(el, Err(err)),
            }),
        );
    }

    /// The bound a fresh iterator should position against: the range's
    /// lower bound when walking forward, its upper bound when walking in
    /// reverse.
    fn initial_seek_bound(&self) -> Bound<K> {
        let inner = self.inner.borrow();
        match inner.direction {
            Direction::Forward => inner.range.0.clone(),
            Direction::Reverse => inner.range.1.clone(),
        }
    }

    /// Load the block in the current table that should hold `seek_bound`'s
    /// key (or, with no `seek_bound`, the first block a scan of this
    /// direction should start at). Block selection is a lower-bound search
    /// over each block's boundary (maximum) key: the first block whose
    /// boundary is `>=` the sought key might hold it. Walking forward that
    /// selects nothing once every boundary sorts below the key; walking in
    /// reverse (seeking the range's upper bound) the same search is clamped
    /// to the last block instead, since a reverse scan with no block whose
    /// max reaches that high still starts from the level's actual last block.
    fn load_block(
        &self,
        seek_bound: Option<Bound<K>>,
        buffer: Option<Rc<RefCell<ScanBuffer>>>,
        el: &mut EventLoop,
        on_done: Box<dyn FnOnce(&mut EventLoop, Result<LevelIterator<K, V, D>>)>,
    ) {
        let this = self.clone();
        let seek_key = seek_bound.as_ref().and_then(bound_key);
        let info = {
            let inner = self.inner.borrow();
            let direction = inner.direction;
            inner.tables.current().and_then(|ti| {
                let blocks = &ti.blocks;
                let idx = match (seek_key, direction) {
                    (Some(k), Direction::Forward) => search_block(blocks, k),
                    (Some(k), Direction::Reverse) => {
                        if blocks.is_empty() {
                            None
                        } else {
                            Some(lower_bound_block(blocks, k).min(blocks.len() - 1))
                        }
                    }
                    (None, _) => match (blocks.is_empty(), direction) {
                        (true, _) => None,
                        (false, Direction::Forward) => Some(0),
                        (false, Direction::Reverse) => Some(blocks.len() - 1),
                    },
                };
                idx.and_then(|i| blocks.get(i).cloned().map(|b| (ti.table.table_id, i, b)))
            })
        };

        match info {
            None => {
                self.inner.borrow_mut().eof = true;
                el.schedule(move |el| on_done(el, Ok(this)));
            }
            Some((table_id, block_idx, block)) => {
                self.fetch_block(table_id, block_idx, block, seek_bound, buffer, el, on_done)
            }
        }
    }

    fn fetch_block(
        &self,
        table_id: u64,
        block_idx: usize,
        block: BlockIndex<K>,
        seek_bound: Option<Bound<K>>,
        buffer: Option<Rc<RefCell<ScanBuffer>>>,
        el: &mut EventLoop,
        on_done: Box<dyn FnOnce(&mut EventLoop, Result<LevelIterator<K, V, D>>)>,
    ) {
        let this = self.clone();
        self.store.fetch_data_block(
            table_id,
            block,
            el,
            Box::new(move |el, res| match res {
                Ok(entries) => {
                    let block_len = entries.len();
                    if let Some(buf) = &buffer {
                        if let Err(err) = buf.borrow_mut().reserve(block_len) {
                            on_done(el, Err(err));
                            return;
                        }
                    }
                    {
                        let mut inner = this.inner.borrow_mut();
                        let direction = inner.direction;
                        inner.block = (*entries).clone();
                        inner.block_len = block_len;
                        inner.block_idx = block_idx;
                        inner.pos = match (&seek_bound, direction, inner.block.is_empty()) {
                            (_, _, true) => 0,
                            (Some(bound), Direction::Forward, false) => inner
                                .block
                                .iter()
                                .position(|e| above_lower(bound, e.as_key()))
                                .unwrap_or(inner.block.len()),
                            (Some(bound), Direction::Reverse, false) => inner
                                .block
                                .iter()
                                .rposition(|e| below_upper(bound, e.as_key()))
                                .unwrap_or(0),
                            (None, Direction::Forward, false) => 0,
                            (None, Direction::Reverse, false) => inner.block.len() - 1,
                        };
                        enforce_range(&mut inner);
                    }
                    on_done(el, Ok(this))
                }
                Err(err) => on_done(el, Err(err)),
            }),
        );
    }

    /// Entry the iterator is currently positioned on, without consuming it.
    pub fn current(&self) -> Option<Entry<K, V, D>> {
        let inner = self.inner.borrow();
        if inner.eof {
            None
        } else {
            inner.block.get(inner.pos).cloned()
        }
    }

    pub fn is_eof(&self) -> bool {
        self.inner.borrow().eof
    }

    /// Move past the entry returned by [LevelIterator::current], loading the
    /// next block (and table) as needed, walking backward instead of
    /// forward for a [Direction::Reverse] iterator. `buffer`, when given, is
    /// released for the block just spent and charged again for whatever
    /// block is loaded next.
    pub fn advance(
        &self,
        el: &mut EventLoop,
        buffer: Option<&Rc<RefCell<ScanBuffer>>>,
        on_done: Box<dyn FnOnce(&mut EventLoop, Result<LevelIterator<K, V, D>>)>,
    ) {
        if self.inner.borrow().eof {
            let this = self.clone();
            el.schedule(move |el| on_done(el, Ok(this)));
            return;
        }

        let still_in_block = {
            let mut inner = self.inner.borrow_mut();
            let moved = match inner.direction {
                Direction::Forward => {
                    if inner.pos + 1 < inner.block.len() {
                        inner.pos += 1;
                        true
                    } else {
                        false
                    }
                }
                Direction::Reverse => {
                    if inner.pos > 0 {
                        inner.pos -= 1;
                        true
                    } else {
                        false
                    }
                }
            };
            if moved {
                enforce_range(&mut inner);
            }
            moved
        };

        if still_in_block {
            let this = self.clone();
            el.schedule(move |el| on_done(el, Ok(this)));
            return;
        }

        if let Some(buf) = buffer {
            let freed = self.inner.borrow().block_len;
            buf.borrow_mut().release(freed);
        }
        let buffer = buffer.cloned();

        let next_block_idx = {
            let inner = self.inner.borrow();
            match inner.direction {
                Direction::Forward => Some(inner.block_idx + 1),
                Direction::Reverse => inner.block_idx.checked_sub(1),
            }
        };

        let next_block = {
            let inner = self.inner.borrow();
            next_block_idx.and_then(|idx| {
                inner
                    .tables
                    .current()
                    .and_then(|ti| ti.blocks.get(idx).cloned().map(|b| (ti.table.table_id, idx, b)))
            })
        };

        {
            let mut inner = self.inner.borrow_mut();
            inner.block.clear();
            inner.pos = 0;
        }

        match next_block {
            Some((table_id, block_idx, block)) => {
                self.fetch_block(table_id, block_idx, block, None, buffer, el, on_done)
            }
            None => {
                let next_table = {
                    let mut inner = self.inner.borrow_mut();
                    inner.tables.advance();
                    !inner.tables.is_eof()
                };
                if next_table {
                    self.load_block(None, buffer, el, on_done);
                } else {
                    self.inner.borrow_mut().eof = true;
                    let this = self.clone();
                    el.schedule(move |el| on_done(el, Ok(this)));
                }
            }
        }
    }
}

#[cfg(test)]
mod level_iter_test {
    use super::*;
    use crate::scan::storage::MockBlockStore;

    fn setup(block_len: usize) -> (Rc<dyn BlockStore<i32, u64>>, Vec<TableInfo<i32>>) {
        let mut store = MockBlockStore::<i32, u64>::new();
        let entries: Vec<_> = (0..20).map(|i| Entry::new(i, i as u64, 1)).collect();
        store.add_table(1, entries, block_len);
        let tables = vec![TableInfo {
            table_id: 1,
            low_key: Bound::Unbounded,
            high_key: Bound::Unbounded,
        }];
        (Rc::new(store), tables)
    }

    fn run(
        store: Rc<dyn BlockStore<i32, u64>>,
        tables: Vec<TableInfo<i32>>,
        range: (Bound<i32>, Bound<i32>),
        direction: Direction,
    ) -> Vec<i32> {
        let mut el = EventLoop::new();
        let collected = Rc::new(RefCell::new(Vec::new()));

        LevelIterator::open(
            tables,
            range,
            direction,
            store,
            None,
            &mut el,
            Box::new({
                let collected = collected.clone();
                move |el, res| drive(el, res.unwrap(), collected)
            }),
        );
        el.run_until_idle();

        collected.borrow().clone()
    }

    #[test]
    fn test_forward_walk_collects_all_across_many_blocks() {
        let (store, tables) = setup(4);
        let keys = run(store, tables, (Bound::Unbounded, Bound::Unbounded), Direction::Forward);
        assert_eq!(keys, (0..20).collect::<Vec<i32>>());
    }

    #[test]
    fn test_reverse_walk_collects_all_descending_across_many_blocks() {
        let (store, tables) = setup(4);
        let keys = run(store, tables, (Bound::Unbounded, Bound::Unbounded), Direction::Reverse);
        assert_eq!(keys, (0..20).rev().collect::<Vec<i32>>());
    }

    #[test]
    fn test_forward_walk_single_block_per_table() {
        let (store, tables) = setup(100);
        let keys = run(store, tables, (Bound::Unbounded, Bound::Unbounded), Direction::Forward);
        assert_eq!(keys, (0..20).collect::<Vec<i32>>());
    }

    #[test]
    fn test_forward_walk_stops_at_excluded_upper_bound_mid_block() {
        let (store, tables) = setup(4);
        let keys = run(
            store,
            tables,
            (Bound::Included(5), Bound::Excluded(9)),
            Direction::Forward,
        );
        assert_eq!(keys, vec![5, 6, 7, 8]);
    }

    #[test]
    fn test_reverse_walk_stops_at_excluded_lower_bound_mid_block() {
        let (store, tables) = setup(4);
        let keys = run(
            store,
            tables,
            (Bound::Excluded(5), Bound::Included(9)),
            Direction::Reverse,
        );
        assert_eq!(keys, vec![9, 8, 7, 6]);
    }

    #[test]
    fn test_narrow_window_reads_single_block() {
        let (store, tables) = setup(4);
        let keys = run(
            store,
            tables,
            (Bound::Included(9), Bound::Included(10)),
            Direction::Forward,
        );
        assert_eq!(keys, vec![9, 10]);
    }

    fn drive(el: &mut EventLoop, iter: LevelIterator<i32, u64>, collected: Rc<RefCell<Vec<i32>>>) {
        match iter.current() {
            Some(entry) => {
                collected.borrow_mut().push(*entry.as_key());
                let collected2 = collected.clone();
                iter.advance(
                    el,
                    None,
                    Box::new(move |el, res| drive(el, res.unwrap(), collected2)),
                );
            }
            None => (),
        }
    }
}
