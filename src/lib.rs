//! Disk-resident B-tree for counting DNA k-mers.
//!
//! A [`BTree`] stores `u64` keys with an occurrence count in a single file
//! of fixed-size node records. The [`kmer`] module packs DNA text into keys,
//! [`genbank`] streams k-mers out of GenBank files and [`admin`] inspects
//! finished trees.

#![warn(missing_docs)]

pub mod admin;
pub mod config;
pub mod error;
pub mod genbank;
pub mod kmer;
pub mod logging;
pub mod primitives;
pub mod storage;

pub use config::TreeOptions;
pub use error::{GeneBankError, Result};
pub use storage::btree::{BTree, CacheStats, InsertOutcome, Record, TreeStatsSnapshot};
