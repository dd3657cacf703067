//! Walks the set of on-disk tables that make up one level, restricted to
//! those whose key range can intersect a scan's range, and hands back their
//! already-fetched index-blocks in table order, forward or reverse depending
//! on the scan's direction.

use std::{ops::Bound, rc::Rc};

use crate::{
    robt::BlockIndex,
    scan::{event_loop::EventLoop, level_iter::Direction, manifest::TableInfo, storage::BlockStore},
    Result,
};

/// One table's index-block, paired with the table it came from.
pub struct TableIndex<K> {
    pub table: TableInfo<K>,
    pub blocks: Rc<Vec<BlockIndex<K>>>,
}

/// Ordered, already-resolved view of every table in a level that overlaps
/// a scan's range. Built once per (level, range) via [LevelIndexIterator::open].
/// Tables are stored ascending by key regardless of direction; `pos` walks
/// them forward or backward so [Direction::Reverse] scans start at the
/// highest-keyed table.
pub struct LevelIndexIterator<K> {
    tables: Vec<TableIndex<K>>,
    direction: Direction,
    pos: usize,
    eof: bool,
}

impl<K> LevelIndexIterator<K>
where
    K: Clone + Ord + 'static,
{
    /// Fetch the index-block for every table in `tables` that overlaps
    /// `range`, in ascending table order, then invoke `on_done` positioned
    /// at the first table a scan in `direction` would visit.
    pub fn open<V, D>(
        tables: Vec<TableInfo<K>>,
        range: (Bound<K>, Bound<K>),
        direction: Direction,
        store: Rc<dyn BlockStore<K, V, D>>,
        el: &mut EventLoop,
        on_done: Box<dyn FnOnce(&mut EventLoop, Result<LevelIndexIterator<K>>)>,
    ) where
        V: crate::db::Diff<Delta = D> + 'static,
        D: 'static,
    {
        let overlapping: Vec<TableInfo<K>> =
            tables.into_iter().filter(|t| t.overlaps(&range)).collect();

        fetch_next(overlapping, 0, Vec::new(), direction, store, el, on_done)
    }

    pub fn is_eof(&self) -> bool {
        self.eof
    }

    pub fn current(&self) -> Option<&TableIndex<K>> {
        if self.eof {
            None
        } else {
            self.tables.get(self.pos)
        }
    }

    pub fn advance(&mut self) {
        if self.eof {
            return;
        }
        match self.direction {
            Direction::Forward => {
                if self.pos + 1 < self.tables.len() {
                    self.pos += 1;
                } else {
                    self.eof = true;
                }
            }
            Direction::Reverse => {
                if self.pos > 0 {
                    self.pos -= 1;
                } else {
                    self.eof = true;
                }
            }
        }
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

fn fetch_next<K, V, D>(
    remaining: Vec<TableInfo<K>>,
    idx: usize,
    acc: Vec<TableIndex<K>>,
    direction: Direction,
    store: Rc<dyn BlockStore<K, V, D>>,
    el: &mut EventLoop,
    on_done: Box<dyn FnOnce(&mut EventLoop, Result<LevelIndexIterator<K>>)>,
) where
    K: Clone + Ord + 'static,
    V: crate::db::Diff<Delta = D> + 'static,
    D: 'static,
{
    if idx >= remaining.len() {
        let eof = acc.is_empty();
        let pos = match direction {
            Direction::Forward => 0,
            Direction::Reverse => acc.len().saturating_sub(1),
        };
        let _ = store;
        el.schedule(move |el| {
            on_done(
                el,
                Ok(LevelIndexIterator {
                    tables: acc,
                    direction,
                    pos,
                    eof,
                }),
            )
        });
        return;
    }

    let table = remaining[idx].clone();
    let table_id = table.table_id;
    let store_cb = store.clone();
    store.fetch_index(
        table_id,
        el,
        Box::new(move |el, res| match res {
            Ok(blocks) => {
                acc.push(TableIndex { table, blocks });
                fetch_next(remaining, idx + 1, acc, direction, store_cb, el, on_done)
            }
            Err(err) => on_done(el, Err(err)),
        }),
    );
}
