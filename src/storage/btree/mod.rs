#![forbid(unsafe_code)]

//! Disk-resident B-tree of counted `u64` keys.
//!
//! The file starts with a fixed header (root offset and order) followed by
//! one fixed-size record per node. Nodes are addressed by byte offset and
//! never move once written.

mod backend;
mod cache;
mod node;
mod record;
mod source;
mod stats;
mod tree;

pub use backend::{NodeLayout, StorageBackend, HEADER_LEN, MAX_ORDER, MIN_ORDER};
pub use cache::{CacheStats, PageCache, MAX_CACHE_CAPACITY};
pub use node::{Node, SearchPosition, NULL_OFFSET};
pub use record::{Record, RECORD_LEN};
pub use source::{CachedSource, DirectSource, NodeSource};
pub use stats::TreeStatsSnapshot;
pub use tree::{BTree, InsertOutcome};
