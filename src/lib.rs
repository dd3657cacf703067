//! `lsmwalk` implements the range-scan engine of a log-structured-merge
//! index: given a key range and a snapshot sequence-number, it walks every
//! live version across the mutable memtable, immutable memtables and the
//! on-disk levels, merging them into a single ascending or descending
//! stream under a bounded memory budget.
//!
//! Building, compacting and replicating the index are out of scope; this
//! crate only reads. [db] carries the shared multi-versioned entry type,
//! [robt] the on-disk table format levels are stored in, and [scan] the
//! actual cursor/merge machinery.

#[macro_use]
mod error;

pub mod db;
pub mod robt;
pub mod scan;
mod util;

pub use crate::error::{Error, Result};
