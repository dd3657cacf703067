//! Top-level range-scan driver.
//!
//! [Scan] wires together every source an LSM-tree read needs to cover: the
//! mutable memtable, any immutable memtables pending flush, and every
//! on-disk level named by a [Manifest], merged through [KWayMerge] under a
//! [ScanBuffer] budget. `seek`/`fetch`/`reset` are the only entry points;
//! everything else is driven internally through the [EventLoop].

use std::{cell::RefCell, ops::Bound, rc::Rc};

use crate::{
    db::{Diff, Entry},
    scan::{
        buffer::ScanBuffer,
        cursor::Cursor,
        event_loop::EventLoop,
        level_iter::Direction,
        level_scan::LevelScan,
        manifest::{Manifest, TableInfo},
        memtable::MemtableSource,
        merge::{KWayMerge, Source, VecCursor},
        storage::BlockStore,
    },
    Result,
};

/// Static configuration a [Scan] was opened with; kept around so `seek` and
/// `reset` can rebuild the merge without the caller re-supplying anything.
struct ScanConfig<K, V, D>
where
    V: Diff<Delta = D>,
{
    mutable: Option<Rc<dyn MemtableSource<K, V, D>>>,
    immutables: Vec<Rc<dyn MemtableSource<K, V, D>>>,
    levels: Vec<Vec<TableInfo<K>>>,
    store: Rc<dyn BlockStore<K, V, D>>,
    buffer_budget: Option<usize>,
}

enum State<K, V, D>
where
    V: Diff<Delta = D>,
{
    /// Needs (re)opening before the next `fetch`.
    Idle,
    Active { merge: KWayMerge<K, V, D> },
    Eof,
}

/// A single range scan over a snapshot of an LSM tree.
pub struct Scan<K, V, D = <V as Diff>::Delta>
where
    V: Diff<Delta = D>,
{
    config: ScanConfig<K, V, D>,
    range: (Bound<K>, Bound<K>),
    direction: Direction,
    state: State<K, V, D>,
}

impl<K, V, D> Scan<K, V, D>
where
    K: Clone + Ord + 'static,
    V: Clone + Diff<Delta = D> + 'static,
    D: Clone + 'static,
{
    /// Build a scan reading `manifest`'s levels and the given memtables,
    /// restricted to `range`. No I/O happens until the first `fetch`.
    pub fn new<M>(
        mutable: Option<Rc<dyn MemtableSource<K, V, D>>>,
        immutables: Vec<Rc<dyn MemtableSource<K, V, D>>>,
        manifest: &M,
        store: Rc<dyn BlockStore<K, V, D>>,
        range: (Bound<K>, Bound<K>),
        direction: Direction,
        buffer_budget: Option<usize>,
    ) -> Self
    where
        M: Manifest<K>,
    {
        let levels = (0..manifest.num_levels()).map(|l| manifest.tables(l)).collect();
        Scan {
            config: ScanConfig {
                mutable,
                immutables,
                levels,
                store,
                buffer_budget,
            },
            range,
            direction,
            state: State::Idle,
        }
    }

    /// Reposition the scan to a new range, discarding any in-flight merge
    /// state. The next `fetch` reopens every source against the new range.
    pub fn seek(&mut self, range: (Bound<K>, Bound<K>)) {
        self.range = range;
        self.state = State::Idle;
    }

    /// Restart the scan from the beginning of its current range.
    pub fn reset(&mut self) {
        self.state = State::Idle;
    }

    /// Fetch the next row in the scan's direction, opening sources on the
    /// first call or after a `seek`/`reset`.
    pub fn fetch(
        self,
        el: &mut EventLoop,
        on_done: Box<dyn FnOnce(&mut EventLoop, Result<(Scan<K, V, D>, Option<Cursor<K, V, D>>)>)>,
    ) {
        match self.state {
            State::Eof => {
                el.schedule(move |el| on_done(el, Ok((self, None))));
            }
            State::Active { merge } => {
                let Scan {
                    config,
                    range,
                    direction,
                    ..
                } = self;
                fetch_from_merge(config, range, direction, merge, el, on_done)
            }
            State::Idle => {
                let Scan {
                    config,
                    range,
                    direction,
                    ..
                } = self;
                open_merge(
                    config,
                    range.clone(),
                    direction,
                    el,
                    Box::new(move |el, res| match res {
                        Ok((config, merge)) => {
                            fetch_from_merge(config, range, direction, merge, el, on_done)
                        }
                        Err(err) => on_done(el, Err(err)),
                    }),
                )
            }
        }
    }
}

fn fetch_from_merge<K, V, D>(
    config: ScanConfig<K, V, D>,
    range: (Bound<K>, Bound<K>),
    direction: Direction,
    merge: KWayMerge<K, V, D>,
    el: &mut EventLoop,
    on_done: Box<dyn FnOnce(&mut EventLoop, Result<(Scan<K, V, D>, Option<Cursor<K, V, D>>)>)>,
) where
    K: Clone + Ord + 'static,
    V: Clone + Diff<Delta = D> + 'static,
    D: Clone + 'static,
{
    merge.next(
        el,
        Box::new(move |el, res| match res {
            Ok((merge, entry)) => {
                let (state, cursor) = match entry {
                    Some(entry) => (State::Active { merge }, Some(Cursor::new(entry))),
                    None => (State::Eof, None),
                };
                let scan = Scan {
                    config,
                    range,
                    direction,
                    state,
                };
                on_done(el, Ok((scan, cursor)))
            }
            Err(err) => on_done(el, Err(err)),
        }),
    );
}

fn open_merge<K, V, D>(
    config: ScanConfig<K, V, D>,
    range: (Bound<K>, Bound<K>),
    direction: Direction,
    el: &mut EventLoop,
    on_done: Box<dyn FnOnce(&mut EventLoop, Result<(ScanConfig<K, V, D>, KWayMerge<K, V, D>)>)>,
) where
    K: Clone + Ord + 'static,
    V: Clone + Diff<Delta = D> + 'static,
    D: Clone + 'static,
{
    let mut memtable_sources = Vec::new();
    if let Some(mt) = &config.mutable {
        memtable_sources.push(memtable_to_source(mt.as_ref(), &range, direction));
    }
    for mt in &config.immutables {
        memtable_sources.push(memtable_to_source(mt.as_ref(), &range, direction));
    }

    let buffer = config
        .buffer_budget
        .map(|budget| Rc::new(RefCell::new(ScanBuffer::new(budget))));

    let levels = config.levels.clone();
    let store = config.store.clone();
    let buffer_cb = buffer.clone();
    open_levels(
        levels,
        0,
        range.clone(),
        direction,
        store,
        buffer_cb,
        Vec::new(),
        el,
        Box::new(move |el, res| match res {
            Ok(level_sources) => {
                let mut sources = memtable_sources;
                sources.extend(level_sources);
                let merge = KWayMerge::new(sources, direction, buffer);
                on_done(el, Ok((config, merge)))
            }
            Err(err) => on_done(el, Err(err)),
        }),
    );
}

fn memtable_to_source<K, V, D>(
    mt: &dyn MemtableSource<K, V, D>,
    range: &(Bound<K>, Bound<K>),
    direction: Direction,
) -> Source<K, V, D>
where
    K: Clone + Ord + 'static,
    V: Clone + Diff<Delta = D> + 'static,
    D: Clone + 'static,
{
    let entries = match direction {
        Direction::Forward => mt.range(range.clone()),
        Direction::Reverse => mt.range_rev(range.clone()),
    };
    Source::Memtable(VecCursor::new(entries))
}

fn open_levels<K, V, D>(
    levels: Vec<Vec<TableInfo<K>>>,
    idx: usize,
    range: (Bound<K>, Bound<K>),
    direction: Direction,
    store: Rc<dyn BlockStore<K, V, D>>,
    buffer: Option<Rc<RefCell<ScanBuffer>>>,
    mut acc: Vec<Source<K, V, D>>,
    el: &mut EventLoop,
    on_done: Box<dyn FnOnce(&mut EventLoop, Result<Vec<Source<K, V, D>>>)>,
) where
    K: Clone + Ord + 'static,
    V: Clone + Diff<Delta = D> + 'static,
    D: Clone + 'static,
{
    if idx >= levels.len() {
        el.schedule(move |el| on_done(el, Ok(acc)));
        return;
    }

    let tables = levels[idx].clone();
    let store_cb = store.clone();
    let range_cb = range.clone();
    let buffer_cb = buffer.clone();
    LevelScan::open(
        tables,
        range.clone(),
        direction,
        store.clone(),
        buffer,
        el,
        Box::new(move |el, res| match res {
            Ok(scan) => {
                acc.push(Source::Level(scan));
                open_levels(
                    levels, idx + 1, range_cb, direction, store_cb, buffer_cb, acc, el, on_done,
                )
            }
            Err(err) => on_done(el, Err(err)),
        }),
    );
}

#[cfg(test)]
mod scan_test {
    use super::*;
    use crate::scan::{manifest::StaticManifest, memtable::BTreeMemtable, storage::MockBlockStore};

    fn collect_all(scan: Scan<i32, u64>) -> Vec<(i32, Option<u64>)> {
        let mut el = EventLoop::new();
        let out = Rc::new(RefCell::new(Vec::new()));
        drive(scan, &mut el, out.clone());
        el.run_until_idle();
        Rc::try_unwrap(out).ok().unwrap().into_inner()
    }

    fn drive(scan: Scan<i32, u64>, el: &mut EventLoop, out: Rc<RefCell<Vec<(i32, Option<u64>)>>>) {
        scan.fetch(
            el,
            Box::new(move |el, res| {
                let (scan, cursor) = res.unwrap();
                match cursor {
                    Some(c) => {
                        out.borrow_mut().push((*c.key(), c.value()));
                        drive(scan, el, out)
                    }
                    None => (),
                }
            }),
        );
    }

    #[test]
    fn test_scan_merges_memtable_and_single_level() {
        let mut mt = BTreeMemtable::<i32, u64>::new();
        mt.insert(Entry::new(1, 999_u64, 9));
        let mutable: Rc<dyn MemtableSource<i32, u64>> = Rc::new(mt);

        let mut store = MockBlockStore::<i32, u64>::new();
        let entries = vec![
            Entry::new(0, 10_u64, 1),
            Entry::new(1, 11_u64, 1),
            Entry::new(2, 12_u64, 1),
            Entry::new(3, 13_u64, 1),
        ];
        store.add_table(1, entries, 2);
        let manifest = StaticManifest::new(vec![vec![TableInfo {
            table_id: 1,
            low_key: Bound::Unbounded,
            high_key: Bound::Unbounded,
        }]]);

        let scan = Scan::new(
            Some(mutable),
            Vec::new(),
            &manifest,
            Rc::new(store),
            (Bound::Unbounded, Bound::Unbounded),
            Direction::Forward,
            Some(1024),
        );

        let result = collect_all(scan);
        assert_eq!(
            result,
            vec![(0, Some(10)), (1, Some(999)), (2, Some(12)), (3, Some(13))]
        );
    }

    #[test]
    fn test_scan_seek_narrows_range() {
        let mut store = MockBlockStore::<i32, u64>::new();
        let entries: Vec<_> = (0..10).map(|i| Entry::new(i, i as u64, 1)).collect();
        store.add_table(1, entries, 3);
        let manifest = StaticManifest::new(vec![vec![TableInfo {
            table_id: 1,
            low_key: Bound::Unbounded,
            high_key: Bound::Unbounded,
        }]]);

        let mut scan = Scan::new(
            None,
            Vec::new(),
            &manifest,
            Rc::new(store),
            (Bound::Unbounded, Bound::Unbounded),
            Direction::Forward,
            None,
        );
        scan.seek((Bound::Included(4), Bound::Excluded(7)));

        let result = collect_all(scan);
        assert_eq!(result, vec![(4, Some(4)), (5, Some(5)), (6, Some(6))]);
    }

    #[test]
    fn test_scan_reverse_merges_memtable_and_level_descending() {
        let mut mt = BTreeMemtable::<i32, u64>::new();
        mt.insert(Entry::new(1, 999_u64, 9));
        let mutable: Rc<dyn MemtableSource<i32, u64>> = Rc::new(mt);

        let mut store = MockBlockStore::<i32, u64>::new();
        let entries: Vec<_> = (0..12).map(|i| Entry::new(i, i as u64 * 10, 1)).collect();
        store.add_table(1, entries, 3);
        let manifest = StaticManifest::new(vec![vec![TableInfo {
            table_id: 1,
            low_key: Bound::Unbounded,
            high_key: Bound::Unbounded,
        }]]);

        let scan = Scan::new(
            Some(mutable),
            Vec::new(),
            &manifest,
            Rc::new(store),
            (Bound::Unbounded, Bound::Unbounded),
            Direction::Reverse,
            None,
        );

        let result = collect_all(scan);
        let expected: Vec<(i32, Option<u64>)> = (0..12)
            .rev()
            .map(|i| if i == 1 { (1, Some(999)) } else { (i, Some(i as u64 * 10)) })
            .collect();
        assert_eq!(result, expected);
    }
}
