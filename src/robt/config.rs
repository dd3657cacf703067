use cbordata::Cborize;

use std::ffi;

use crate::robt::files::IndexFileName;

/// Default value for data-block-size, 4 * 1024 bytes.
pub const DBLOCKSIZE: usize = 4 * 1024;
/// Default value for index-block-size, 4 * 1024 bytes.
pub const IBLOCKSIZE: usize = 4 * 1024;

const STATS_VER: u32 = 0x000b0001;

/// Compose a path to the on-disk table identified by unique `name` under `dir`.
pub fn to_table_location(dir: &ffi::OsStr, name: &str) -> ffi::OsString {
    use std::path;

    let loc: path::PathBuf = [
        dir.to_os_string(),
        IndexFileName::from(name.to_string()).into(),
    ]
    .iter()
    .collect();
    loc.into_os_string()
}

/// Configuration for an on-disk level table.
///
/// Used only while building a table. Subsequently the relevant parameters
/// are persisted alongside the table as [Stats].
#[derive(Clone, Debug)]
pub struct Config {
    /// Location where the table file is created.
    pub dir: ffi::OsString,
    /// Name of the table, unique within a level.
    pub name: String,
    /// Target size for each flushed data-block.
    ///
    /// Default: [DBLOCKSIZE]
    pub d_blocksize: usize,
    /// Target size for each flushed index-block.
    ///
    /// Default: [IBLOCKSIZE]
    pub i_blocksize: usize,
}

impl Config {
    /// Create a new configuration, use the `set_*` methods to customize further.
    pub fn new(dir: &ffi::OsStr, name: &str) -> Config {
        Config {
            dir: dir.to_os_string(),
            name: name.to_string(),
            d_blocksize: DBLOCKSIZE,
            i_blocksize: IBLOCKSIZE,
        }
    }

    /// Configure block sizes for data-blocks and index-blocks.
    pub fn set_blocksize(&mut self, d: usize, i: usize) -> &mut Self {
        self.d_blocksize = d;
        self.i_blocksize = i;
        self
    }

    pub fn to_table_location(&self) -> ffi::OsString {
        to_table_location(&self.dir, &self.name)
    }
}

/// Statistics persisted alongside a table, describing the level snapshot it
/// belongs to.
#[derive(Clone, Default, Debug, Cborize)]
pub struct Stats {
    /// Comes from [Config] type.
    pub name: String,
    /// Comes from [Config] type.
    pub d_blocksize: usize,
    /// Comes from [Config] type.
    pub i_blocksize: usize,

    /// Number of entries indexed, including tombstones.
    pub n_count: u64,
    /// Number of entries that are marked as deleted.
    pub n_deleted: usize,
    /// Sequence number of the newest entry in this table.
    pub seqno: u64,

    /// Timestamp when this table was built, seconds since UNIX EPOCH, UTC.
    pub epoch: u64,
}

impl Stats {
    pub const ID: u32 = STATS_VER;
}

impl From<Config> for Stats {
    fn from(config: Config) -> Stats {
        Stats {
            name: config.name,
            d_blocksize: config.d_blocksize,
            i_blocksize: config.i_blocksize,
            n_count: u64::default(),
            n_deleted: usize::default(),
            seqno: u64::default(),
            epoch: u64::default(),
        }
    }
}
