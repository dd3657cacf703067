//! K-way merge across every source feeding a single scan.
//!
//! Sources are supplied already ordered by precedence: the mutable memtable
//! first, then immutable memtables newest-to-oldest, then on-disk levels
//! shallowest-to-deepest. When two or more sources hold the same key, the
//! one earliest in that order wins and every tied source is advanced past
//! it; a winning tombstone is dropped rather than yielded, and the merge
//! keeps looking for the next live key.

use std::{cell::RefCell, rc::Rc};

use crate::{
    db::{Diff, Entry},
    scan::{
        buffer::ScanBuffer,
        event_loop::EventLoop,
        level_iter::Direction,
        level_scan::LevelScan,
    },
    Result,
};

/// One contributor to a merge: either an eagerly-materialized slice of a
/// memtable's range, or an async per-level scan.
#[derive(Clone)]
pub enum Source<K, V, D = <V as Diff>::Delta>
where
    V: Diff<Delta = D>,
{
    Memtable(VecCursor<K, V, D>),
    Level(LevelScan<K, V, D>),
}

impl<K, V, D> Source<K, V, D>
where
    K: Clone + Ord + 'static,
    V: Clone + Diff<Delta = D> + 'static,
    D: Clone + 'static,
{
    pub fn current(&self) -> Option<Entry<K, V, D>> {
        match self {
            Source::Memtable(c) => c.current(),
            Source::Level(s) => s.current(),
        }
    }

    fn advance(
        &self,
        el: &mut EventLoop,
        buffer: Option<&Rc<RefCell<ScanBuffer>>>,
        on_done: Box<dyn FnOnce(&mut EventLoop, Result<Source<K, V, D>>)>,
    ) {
        match self {
            Source::Memtable(c) => {
                let c = c.clone();
                c.advance(el, Box::new(move |el, res| on_done(el, res.map(Source::Memtable))))
            }
            Source::Level(s) => {
                let s = s.clone();
                s.advance(
                    el,
                    buffer,
                    Box::new(move |el, res| on_done(el, res.map(Source::Level))),
                )
            }
        }
    }
}

/// A pre-materialized, already-range-filtered slice of a memtable, exposed
/// through the same peek-before-advance shape as [LevelScan] so
/// [KWayMerge] doesn't need to special-case it.
pub struct VecCursor<K, V, D = <V as Diff>::Delta>
where
    V: Diff<Delta = D>,
{
    entries: Rc<Vec<Entry<K, V, D>>>,
    pos: Rc<RefCell<usize>>,
}

impl<K, V, D> Clone for VecCursor<K, V, D>
where
    V: Diff<Delta = D>,
{
    fn clone(&self) -> Self {
        VecCursor {
            entries: self.entries.clone(),
            pos: self.pos.clone(),
        }
    }
}

impl<K, V, D> VecCursor<K, V, D>
where
    V: Diff<Delta = D>,
{
    pub fn new(entries: Vec<Entry<K, V, D>>) -> Self {
        VecCursor {
            entries: Rc::new(entries),
            pos: Rc::new(RefCell::new(0)),
        }
    }

    pub fn current(&self) -> Option<Entry<K, V, D>>
    where
        K: Clone,
        V: Clone,
        D: Clone,
    {
        self.entries.get(*self.pos.borrow()).cloned()
    }

    fn advance(
        &self,
        el: &mut EventLoop,
        on_done: Box<dyn FnOnce(&mut EventLoop, Result<VecCursor<K, V, D>>)>,
    ) {
        let at_end = *self.pos.borrow() >= self.entries.len();
        if !at_end {
            *self.pos.borrow_mut() += 1;
        }
        let this = self.clone();
        el.schedule(move |el| on_done(el, Ok(this)));
    }
}

/// Merges every [Source] into a single ascending or descending stream.
pub struct KWayMerge<K, V, D = <V as Diff>::Delta>
where
    V: Diff<Delta = D>,
{
    sources: Vec<Source<K, V, D>>,
    direction: Direction,
    buffer: Option<Rc<RefCell<ScanBuffer>>>,
}

impl<K, V, D> Clone for KWayMerge<K, V, D>
where
    V: Diff<Delta = D>,
{
    fn clone(&self) -> Self {
        KWayMerge {
            sources: self.sources.clone(),
            direction: self.direction,
            buffer: self.buffer.clone(),
        }
    }
}

impl<K, V, D> KWayMerge<K, V, D>
where
    K: Clone + Ord + 'static,
    V: Clone + Diff<Delta = D> + 'static,
    D: Clone + 'static,
{
    /// `sources` must already be ordered highest-precedence first.
    pub fn new(
        sources: Vec<Source<K, V, D>>,
        direction: Direction,
        buffer: Option<Rc<RefCell<ScanBuffer>>>,
    ) -> Self {
        KWayMerge {
            sources,
            direction,
            buffer,
        }
    }

    fn winning_key(&self) -> Option<K> {
        let keys = self.sources.iter().filter_map(|s| s.current().map(|e| e.to_key()));
        match self.direction {
            Direction::Forward => keys.min(),
            Direction::Reverse => keys.max(),
        }
    }

    /// Produce the next live entry, or `None` once every source is
    /// exhausted. Returns the merge's new state alongside the result so the
    /// caller can keep driving it.
    pub fn next(
        self,
        el: &mut EventLoop,
        on_done: Box<dyn FnOnce(&mut EventLoop, Result<(KWayMerge<K, V, D>, Option<Entry<K, V, D>>)>)>,
    ) {
        let key = match self.winning_key() {
            Some(key) => key,
            None => {
                el.schedule(move |el| on_done(el, Ok((self, None))));
                return;
            }
        };

        let tied: Vec<usize> = self
            .sources
            .iter()
            .enumerate()
            .filter(|(_, s)| s.current().map(|e| *e.as_key() == key).unwrap_or(false))
            .map(|(i, _)| i)
            .collect();
        let winner_idx = *tied.iter().min().expect("winning key implies a tied source");
        let winning_entry = self.sources[winner_idx].current().expect("tied source has a current entry");
        let yield_entry = if winning_entry.is_deleted() {
            None
        } else {
            Some(winning_entry)
        };

        advance_tied(self, tied, 0, el, yield_entry, on_done)
    }
}

fn advance_tied<K, V, D>(
    mut merge: KWayMerge<K, V, D>,
    tied: Vec<usize>,
    pos: usize,
    el: &mut EventLoop,
    yield_entry: Option<Entry<K, V, D>>,
    on_done: Box<dyn FnOnce(&mut EventLoop, Result<(KWayMerge<K, V, D>, Option<Entry<K, V, D>>)>)>,
) where
    K: Clone + Ord + 'static,
    V: Clone + Diff<Delta = D> + 'static,
    D: Clone + 'static,
{
    if pos >= tied.len() {
        match yield_entry {
            Some(entry) => el.schedule(move |el| on_done(el, Ok((merge, Some(entry))))),
            None => merge.next(el, on_done),
        }
        return;
    }

    let idx = tied[pos];
    let source = merge.sources[idx].clone();
    source.advance(
        el,
        merge.buffer.as_ref(),
        Box::new(move |el, res| match res {
            Ok(new_source) => {
                merge.sources[idx] = new_source;
                advance_tied(merge, tied, pos + 1, el, yield_entry, on_done)
            }
            Err(err) => on_done(el, Err(err)),
        }),
    );
}

#[cfg(test)]
mod merge_test {
    use super::*;
    use crate::scan::{manifest::TableInfo, storage::MockBlockStore};
    use std::ops::Bound;

    fn run_merge(sources: Vec<Source<i32, u64>>) -> Vec<(i32, Option<u64>)> {
        let mut el = EventLoop::new();
        let merge = KWayMerge::new(sources, Direction::Forward, None);
        let collected = Rc::new(RefCell::new(Vec::new()));
        drive(&mut el, merge, collected.clone());
        el.run_until_idle();
        collected.borrow().clone()
    }

    fn drive(
        el: &mut EventLoop,
        merge: KWayMerge<i32, u64>,
        collected: Rc<RefCell<Vec<(i32, Option<u64>)>>>,
    ) {
        merge.next(
            el,
            Box::new(move |el, res| {
                let (merge, entry) = res.unwrap();
                match entry {
                    Some(e) => {
                        collected.borrow_mut().push((*e.as_key(), e.to_value()));
                        drive(el, merge, collected)
                    }
                    None => (),
                }
            }),
        );
    }

    #[test]
    fn test_memtable_shadows_level() {
        // memtable overrides key 1 with a newer value; level alone supplies 0 and 2.
        let mem = VecCursor::new(vec![Entry::new(1, 100_u64, 5)]);

        let mut store = MockBlockStore::<i32, u64>::new();
        let entries = vec![
            Entry::new(0, 10_u64, 1),
            Entry::new(1, 11_u64, 1),
            Entry::new(2, 12_u64, 1),
        ];
        store.add_table(1, entries, 2);
        let tables = vec![TableInfo {
            table_id: 1,
            low_key: Bound::Unbounded,
            high_key: Bound::Unbounded,
        }];

        let mut el = EventLoop::new();
        let level_scan = Rc::new(RefCell::new(None));
        let level_scan2 = level_scan.clone();
        LevelScan::open(
            tables,
            (Bound::Unbounded, Bound::Unbounded),
            Direction::Forward,
            Rc::new(store),
            None,
            &mut el,
            Box::new(move |_, res| *level_scan2.borrow_mut() = Some(res.unwrap())),
        );
        el.run_until_idle();
        let level_scan = level_scan.borrow().clone().unwrap();

        let result = run_merge(vec![Source::Memtable(mem), Source::Level(level_scan)]);
        assert_eq!(result, vec![(0, Some(10)), (1, Some(100)), (2, Some(12))]);
    }

    #[test]
    fn test_tombstone_in_higher_precedence_hides_lower() {
        let mem = VecCursor::new(vec![Entry::new_delete(1, 5)]);

        let mut store = MockBlockStore::<i32, u64>::new();
        let entries = vec![Entry::new(0, 10_u64, 1), Entry::new(1, 11_u64, 1)];
        store.add_table(1, entries, 2);
        let tables = vec![TableInfo {
            table_id: 1,
            low_key: Bound::Unbounded,
            high_key: Bound::Unbounded,
        }];

        let mut el = EventLoop::new();
        let level_scan = Rc::new(RefCell::new(None));
        let level_scan2 = level_scan.clone();
        LevelScan::open(
            tables,
            (Bound::Unbounded, Bound::Unbounded),
            Direction::Forward,
            Rc::new(store),
            None,
            &mut el,
            Box::new(move |_, res| *level_scan2.borrow_mut() = Some(res.unwrap())),
        );
        el.run_until_idle();
        let level_scan = level_scan.borrow().clone().unwrap();

        let result = run_merge(vec![Source::Memtable(mem), Source::Level(level_scan)]);
        assert_eq!(result, vec![(0, Some(10))]);
    }
}
