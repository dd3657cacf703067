//! [BlockStore] backed by real [TableReader] files on disk.
//!
//! Table-id to file-path resolution belongs to whatever manifest
//! implementation an embedder has; that persistence layer is out of scope
//! here; [RobtBlockStore] only opens and caches [TableReader] handles and
//! defers every read through the [EventLoop], even though the reads
//! themselves are ordinary synchronous file I/O under the hood.

use cbordata::FromCbor;

use std::{cell::RefCell, collections::HashMap, ffi, rc::Rc};

use crate::{
    db::{Diff, Entry},
    robt::{BlockIndex, TableReader},
    scan::{
        event_loop::EventLoop,
        storage::{BlockStore, DataCallback, IndexCallback},
    },
    Result,
};

pub struct RobtBlockStore<K> {
    locations: HashMap<u64, ffi::OsString>,
    readers: RefCell<HashMap<u64, TableReader<K>>>,
}

impl<K> RobtBlockStore<K>
where
    K: Clone + FromCbor,
{
    /// `locations` maps a table's id to the file it was written to by
    /// [crate::robt::TableBuilder].
    pub fn new(locations: HashMap<u64, ffi::OsString>) -> Self {
        RobtBlockStore {
            locations,
            readers: RefCell::new(HashMap::new()),
        }
    }

    fn with_reader<F, T>(&self, table_id: u64, f: F) -> Result<T>
    where
        F: FnOnce(&mut TableReader<K>) -> Result<T>,
    {
        let mut readers = self.readers.borrow_mut();
        if !readers.contains_key(&table_id) {
            let loc = err_at!(InvalidInput, self.locations.get(&table_id).cloned().ok_or(table_id))?;
            log::debug!(target: "scan  ", "table {}, opening {:?}", table_id, loc);
            let reader = TableReader::open(&loc)?;
            readers.insert(table_id, reader);
        }
        f(readers.get_mut(&table_id).expect("just inserted"))
    }
}

impl<K, V, D> BlockStore<K, V, D> for RobtBlockStore<K>
where
    K: Clone + Ord + FromCbor + 'static,
    V: Diff<Delta = D> + 'static,
    D: 'static,
    Entry<K, V, D>: FromCbor,
{
    fn fetch_index(&self, table_id: u64, el: &mut EventLoop, on_done: IndexCallback<K>) {
        let result = self
            .with_reader(table_id, |r| Ok(r.index().to_vec()))
            .map(Rc::new);
        el.schedule(move |el| on_done(el, result));
    }

    fn fetch_data_block(
        &self,
        table_id: u64,
        block: BlockIndex<K>,
        el: &mut EventLoop,
        on_done: DataCallback<K, V, D>,
    ) {
        let result = self
            .with_reader(table_id, |r| r.read_data_block(&block))
            .map(Rc::new);
        el.schedule(move |el| on_done(el, result));
    }
}

#[cfg(test)]
mod robt_adapter_test {
    use super::*;
    use crate::robt::{Config, TableBuilder};

    #[test]
    fn test_robt_block_store_roundtrip() {
        let dir = std::env::temp_dir().join("lsmwalk-robt-adapter-test");
        std::fs::create_dir_all(&dir).unwrap();
        let config = Config::new(dir.as_os_str(), "level0-t1");

        let entries: Vec<Entry<i32, u64>> = (0..30).map(|i| Entry::new(i, i as u64, 1)).collect();
        let builder = TableBuilder::initial(config.clone()).unwrap();
        builder.build_index(entries.clone().into_iter()).unwrap();

        let mut locations = HashMap::new();
        locations.insert(1u64, config.to_table_location());
        let store = RobtBlockStore::<i32>::new(locations);

        let mut el = EventLoop::new();
        let index = Rc::new(RefCell::new(None));
        let index2 = index.clone();
        BlockStore::<i32, u64>::fetch_index(
            &store,
            1,
            &mut el,
            Box::new(move |_, res| *index2.borrow_mut() = Some(res.unwrap())),
        );
        el.run_until_idle();
        let index = index.borrow().clone().unwrap();
        assert!(!index.is_empty());

        let block = index[0].clone();
        let data = Rc::new(RefCell::new(None));
        let data2 = data.clone();
        BlockStore::<i32, u64>::fetch_data_block(
            &store,
            1,
            block,
            &mut el,
            Box::new(move |_, res| *data2.borrow_mut() = Some(res.unwrap())),
        );
        el.run_until_idle();
        let data = data.borrow().clone().unwrap();
        assert_eq!(*data[0].as_key(), 0);

        std::fs::remove_dir_all(&dir).ok();
    }
}
