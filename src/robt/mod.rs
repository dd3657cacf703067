//! On-disk storage format for a single immutable level table.
//!
//! A table is a flat sequence of CBOR-encoded data-blocks holding sorted
//! [Entry][crate::db::Entry] values, trailed by a single index-block of
//! boundary-key/address/checksum triples and a fixed footer. There is no
//! recursive intermediate-node layer: a level's index fits comfortably in
//! one block because level fan-out is bounded by the compaction policy, not
//! implemented here (see [crate::scan] for the module that reads these
//! tables back during a range-scan).
//!
//! Tables are written once, by [store::TableBuilder], from a pre-sorted
//! iterator, and subsequently opened read-only through [store::TableReader].
//! [config::Config] carries the block-size knobs; [marker] holds the byte
//! marker stamped ahead of every table so a partially written file can be
//! told apart from garbage.

mod config;
mod files;
mod marker;
mod store;

pub use config::{to_table_location, Config, Stats, DBLOCKSIZE, IBLOCKSIZE};
pub use files::IndexFileName;
pub use marker::ROOT_MARKER;
pub use store::{BlockIndex, TableBuilder, TableReader};
