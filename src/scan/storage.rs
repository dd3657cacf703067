//! Asynchronous block I/O contract the level iterators read through.
//!
//! Real disk block storage is out of scope for this crate: [BlockStore] is
//! the seam an embedder's actual I/O subsystem plugs into. [MockBlockStore]
//! is an in-memory stand-in used by this crate's own tests;
//! [crate::scan::robt_adapter::RobtBlockStore] is a thin, synchronous-under
//! the-hood adapter onto [crate::robt::TableReader] for anyone who wants to
//! exercise the scan engine against real files without writing their own
//! I/O layer.

use std::{collections::HashMap, rc::Rc};

use crate::{
    db::{Diff, Entry},
    robt::BlockIndex,
    scan::event_loop::EventLoop,
    Result,
};

pub type IndexCallback<K> = Box<dyn FnOnce(&mut EventLoop, Result<Rc<Vec<BlockIndex<K>>>>)>;
pub type DataCallback<K, V, D> = Box<dyn FnOnce(&mut EventLoop, Result<Rc<Vec<Entry<K, V, D>>>>)>;

/// Non-blocking access to one level's on-disk tables. Every method defers
/// its callback through the [EventLoop] rather than calling it inline.
pub trait BlockStore<K, V, D = <V as Diff>::Delta>
where
    V: Diff<Delta = D>,
{
    /// Fetch the index-block (boundary keys) for `table_id`.
    fn fetch_index(&self, table_id: u64, el: &mut EventLoop, on_done: IndexCallback<K>);

    /// Fetch and decode the data-block described by `block`.
    fn fetch_data_block(
        &self,
        table_id: u64,
        block: BlockIndex<K>,
        el: &mut EventLoop,
        on_done: DataCallback<K, V, D>,
    );
}

/// In-memory [BlockStore] used by this crate's tests: every "table" is just
/// a `Vec<Entry>` sliced into fixed-size blocks ahead of time.
pub struct MockBlockStore<K, V, D = <V as Diff>::Delta>
where
    V: Diff<Delta = D>,
{
    tables: HashMap<u64, (Vec<BlockIndex<K>>, Vec<Vec<Entry<K, V, D>>>)>,
}

impl<K, V, D> MockBlockStore<K, V, D>
where
    K: Clone + Ord,
    V: Diff<Delta = D>,
{
    pub fn new() -> Self {
        MockBlockStore {
            tables: HashMap::new(),
        }
    }

    /// Register `table_id` as holding `entries`, pre-sorted ascending,
    /// sliced into blocks of at most `block_len` entries each.
    pub fn add_table(&mut self, table_id: u64, entries: Vec<Entry<K, V, D>>, block_len: usize)
    where
        K: Clone,
    {
        let block_len = block_len.max(1);
        let mut index = Vec::new();
        let mut blocks = Vec::new();
        for (addr, chunk) in entries.chunks(block_len).enumerate() {
            let boundary_key = chunk.last().expect("chunks() never yields an empty slice").as_key().clone();
            index.push(BlockIndex {
                boundary_key,
                address: addr as u64,
                length: chunk.len() as u64,
                checksum: 0,
            });
            blocks.push(chunk.to_vec());
        }
        self.tables.insert(table_id, (index, blocks));
    }
}

impl<K, V, D> BlockStore<K, V, D> for MockBlockStore<K, V, D>
where
    K: Clone + Ord + 'static,
    V: Clone + Diff<Delta = D> + 'static,
    D: Clone + 'static,
{
    fn fetch_index(&self, table_id: u64, el: &mut EventLoop, on_done: IndexCallback<K>) {
        let result = match self.tables.get(&table_id) {
            Some((index, _)) => Ok(Rc::new(index.clone())),
            None => Ok(Rc::new(Vec::new())),
        };
        el.schedule(move |el| on_done(el, result));
    }

    fn fetch_data_block(
        &self,
        table_id: u64,
        block: BlockIndex<K>,
        el: &mut EventLoop,
        on_done: DataCallback<K, V, D>,
    ) {
        let result = match self.tables.get(&table_id) {
            Some((_, blocks)) => match blocks.get(block.address as usize) {
                Some(entries) => Ok(Rc::new(entries.clone())),
                None => Ok(Rc::new(Vec::new())),
            },
            None => Ok(Rc::new(Vec::new())),
        };
        el.schedule(move |el| on_done(el, result));
    }
}

#[cfg(test)]
mod storage_test {
    use super::*;
    use std::cell::RefCell;

    #[test]
    fn test_mock_store_roundtrip() {
        let mut store = MockBlockStore::<i32, u64>::new();
        let entries: Vec<_> = (0..10).map(|i| Entry::new(i, i as u64, 1)).collect();
        store.add_table(1, entries, 3);

        let mut el = EventLoop::new();
        let index = Rc::new(RefCell::new(None));
        let index2 = index.clone();
        store.fetch_index(1, &mut el, Box::new(move |_, res| *index2.borrow_mut() = Some(res.unwrap())));
        el.run_until_idle();
        let index = index.borrow().clone().unwrap();
        assert_eq!(index.len(), 4); // ceil(10/3)

        let block = Rc::new(RefCell::new(None));
        let block2 = block.clone();
        let first = index[0].clone();
        store.fetch_data_block(1, first, &mut el, Box::new(move |_, res| *block2.borrow_mut() = Some(res.unwrap())));
        el.run_until_idle();
        let block = block.borrow().clone().unwrap();
        assert_eq!(block.len(), 3);
        assert_eq!(*block[0].as_key(), 0);
    }
}
