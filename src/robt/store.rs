//! On-disk layout for a single level table: a run of sorted data-blocks
//! followed by one index-block of boundary keys, addresses and checksums.
//!
//! ```text
//! | data-block-0 | data-block-1 | ... | index-block | footer |
//! ```
//!
//! The footer is a fixed 20-byte trailer: 8-byte index-block offset, 8-byte
//! index-block length, 4-byte crc32 of the index-block. A table is written
//! once by [TableBuilder] and is read-only ever after, opened through
//! [TableReader].

use cbordata::{Cborize, FromCbor, IntoCbor};
use fs2::FileExt;
use lazy_static::lazy_static;

use std::{
    convert::{TryFrom, TryInto},
    ffi, fs,
    io::{Read, Seek},
};

use crate::{
    db::{Diff, Entry},
    read_file,
    robt::config::{Config, Stats},
    write_file, Result,
};

const FOOTER_LEN: u64 = 20;
const BLOCK_INDEX_VER: u32 = 0x00010001;

/// One entry in the index-block: the highest key in a data-block, the byte
/// offset of that block within the file, and a crc32 checksum of its bytes.
#[derive(Clone, Debug, Cborize)]
pub struct BlockIndex<K> {
    pub boundary_key: K,
    pub address: u64,
    pub length: u64,
    pub checksum: u32,
}

impl<K> BlockIndex<K> {
    pub const ID: u32 = BLOCK_INDEX_VER;
}

/// Builds a table file from a pre-sorted iterator of entries.
pub struct TableBuilder<K, V, D = <V as Diff>::Delta>
where
    V: Diff<Delta = D>,
{
    config: Config,
    fd: fs::File,
    fpos: u64,
    blocks: Vec<BlockIndex<K>>,
    batch: Vec<Entry<K, V, D>>,
    batch_size: usize,
    n_count: u64,
    n_deleted: usize,
    seqno: u64,
}

impl<K, V, D> TableBuilder<K, V, D>
where
    K: Clone + Ord + IntoCbor,
    V: Diff<Delta = D>,
    Entry<K, V, D>: IntoCbor,
{
    pub fn initial(config: Config) -> Result<Self> {
        let loc = config.to_table_location();
        let fd = crate::util::create_file_a(&loc)?;
        Ok(TableBuilder {
            config,
            fd,
            fpos: 0,
            blocks: Vec::default(),
            batch: Vec::default(),
            batch_size: 0,
            n_count: 0,
            n_deleted: 0,
            seqno: 0,
        })
    }

    /// Feed entries, pre-sorted by key ascending. Deltas are carried as-is.
    /// Returns the stats of the table just written, for the caller's manifest.
    pub fn build_index<I>(mut self, iter: I) -> Result<Stats>
    where
        I: Iterator<Item = Entry<K, V, D>>,
    {
        err_at!(IOError, self.fd.lock_exclusive(), "fail lock for build")?;

        for entry in iter {
            self.n_count += 1;
            if entry.is_deleted() {
                self.n_deleted += 1;
            }
            self.seqno = std::cmp::max(self.seqno, entry.to_seqno());

            let approx_size = self.config.d_blocksize / 8; // rough per-entry estimate
            if !self.batch.is_empty() && self.batch_size + approx_size > self.config.d_blocksize {
                self.flush_data_block()?;
            }
            self.batch.push(entry);
            self.batch_size += approx_size;
        }

        if !self.batch.is_empty() {
            self.flush_data_block()?;
        }

        self.flush_index_block()?;

        err_at!(IOError, self.fd.sync_all())?;
        err_at!(IOError, self.fd.unlock())?;

        let mut stats = Stats::from(self.config.clone());
        stats.n_count = self.n_count;
        stats.n_deleted = self.n_deleted;
        stats.seqno = self.seqno;
        log::info!(
            target: "store ",
            "{:?}, built with {} entries, {} deleted",
            self.config.name,
            stats.n_count,
            stats.n_deleted
        );
        Ok(stats)
    }

    fn flush_data_block(&mut self) -> Result<()> {
        let boundary_key = self.batch.last().expect("flush only runs on a non-empty batch").as_key().clone();
        let batch = std::mem::take(&mut self.batch);
        let data = crate::util::into_cbor_bytes(batch)?;
        let checksum = crc32(&data);
        let length = u64::try_from(data.len()).unwrap();

        write_file!(self.fd, &data, &self.config.to_table_location(), "data-block")?;

        self.blocks.push(BlockIndex {
            boundary_key,
            address: self.fpos,
            length,
            checksum,
        });
        self.fpos += length;
        self.batch_size = 0;
        Ok(())
    }

    fn flush_index_block(&mut self) -> Result<()> {
        let index_addr = self.fpos;

        let entries: Vec<BlockIndex<K>> = self.blocks.drain(..).collect();
        let data = crate::util::into_cbor_bytes(entries)?;
        let checksum = crc32(&data);
        let index_len = u64::try_from(data.len()).unwrap();

        write_file!(self.fd, &data, &self.config.to_table_location(), "index-block")?;
        self.fpos += index_len;

        let mut footer = Vec::with_capacity(usize::try_from(FOOTER_LEN).unwrap());
        footer.extend_from_slice(&index_addr.to_be_bytes());
        footer.extend_from_slice(&index_len.to_be_bytes());
        footer.extend_from_slice(&checksum.to_be_bytes());
        write_file!(self.fd, &footer, &self.config.to_table_location(), "footer")?;

        Ok(())
    }
}

lazy_static! {
    static ref CRC32: crc::Crc<u32> = crc::Crc::<u32>::new(&crc::CRC_32_ISO_HDLC);
}

fn crc32(data: &[u8]) -> u32 {
    CRC32.checksum(data)
}

/// A read-only handle onto a table file, opened once and reused by every
/// [crate::scan] component that touches its level.
pub struct TableReader<K> {
    fd: fs::File,
    index: Vec<BlockIndex<K>>,
}

impl<K> TableReader<K>
where
    K: Clone + FromCbor,
{
    pub fn open(loc: &ffi::OsStr) -> Result<Self> {
        let mut fd = crate::util::open_file_r(loc)?;
        let file_len = err_at!(IOError, fd.metadata())?.len();
        if file_len < FOOTER_LEN {
            err_at!(InvalidFile, msg: "truncated table {:?}", loc)?;
        }

        let footer = read_file!(
            fd,
            std::io::SeekFrom::Start(file_len - FOOTER_LEN),
            FOOTER_LEN,
            "read footer"
        )?;
        let index_addr = u64::from_be_bytes(footer[0..8].try_into().unwrap());
        let index_len = u64::from_be_bytes(footer[8..16].try_into().unwrap());
        let stored_checksum = u32::from_be_bytes(footer[16..20].try_into().unwrap());

        let data = read_file!(
            fd,
            std::io::SeekFrom::Start(index_addr),
            index_len,
            "read index-block"
        )?;
        if crc32(&data) != stored_checksum {
            err_at!(InvalidFile, msg: "index-block checksum mismatch {:?}", loc)?;
        }

        let (index, _): (Vec<BlockIndex<K>>, usize) = crate::util::from_cbor_bytes(&data)?;

        Ok(TableReader { fd, index })
    }

    /// Boundary keys of every data-block, in ascending order.
    pub fn index(&self) -> &[BlockIndex<K>] {
        &self.index
    }

    /// Read and validate the data-block at `address`, returning its decoded
    /// entries. This is a blocking call; async callers invoke it from within
    /// a scheduled callback rather than on the event-loop thread directly.
    pub fn read_data_block<V, D>(&mut self, block: &BlockIndex<K>) -> Result<Vec<Entry<K, V, D>>>
    where
        V: Diff<Delta = D>,
        Entry<K, V, D>: FromCbor,
    {
        let data = read_file!(
            self.fd,
            std::io::SeekFrom::Start(block.address),
            block.length,
            "read data-block"
        )?;
        if crc32(&data) != block.checksum {
            err_at!(InvalidFile, msg: "data-block checksum mismatch at {}", block.address)?;
        }
        let (entries, _): (Vec<Entry<K, V, D>>, usize) = crate::util::from_cbor_bytes(&data)?;
        Ok(entries)
    }
}

#[cfg(test)]
mod store_test {
    use super::*;
    use crate::db::Entry;

    #[test]
    fn test_build_and_read_roundtrip() {
        let dir = std::env::temp_dir().join("lsmwalk-store-test");
        std::fs::create_dir_all(&dir).unwrap();
        let config = Config::new(dir.as_os_str(), "level0");

        let entries: Vec<Entry<i32, u64>> = (0..50)
            .map(|i| Entry::new(i, i as u64 * 10, 1))
            .collect();

        let builder = TableBuilder::initial(config.clone()).unwrap();
        let stats = builder.build_index(entries.clone().into_iter()).unwrap();
        assert_eq!(stats.n_count, entries.len() as u64);
        assert_eq!(stats.n_deleted, 0);

        let mut reader = TableReader::<i32>::open(&config.to_table_location()).unwrap();
        assert!(!reader.index().is_empty());

        let mut seen = Vec::new();
        let blocks: Vec<_> = reader.index().to_vec();
        for block in &blocks {
            let decoded: Vec<Entry<i32, u64>> = reader.read_data_block(block).unwrap();
            seen.extend(decoded);
        }
        assert_eq!(seen.len(), entries.len());
        for (a, b) in seen.iter().zip(entries.iter()) {
            assert_eq!(a.as_key(), b.as_key());
            assert_eq!(a.to_value(), b.to_value());
        }

        std::fs::remove_dir_all(&dir).ok();
    }
}
