use std::path::Path;

use serde::Serialize;

use crate::error::Result;
use crate::storage::btree::{BTree, CacheStats, TreeStatsSnapshot, NULL_OFFSET};

/// Geometry and content summary of one tree file.
#[derive(Debug, Clone, Serialize)]
pub struct StatsReport {
    /// Tree file that was inspected.
    pub path: String,
    /// Length of the file in bytes, header included.
    pub file_size_bytes: u64,
    /// Order stored in the header.
    pub order: u32,
    /// Encoded size of one node record.
    pub record_len: usize,
    /// Minimum degree `t = order / 2`.
    pub min_degree: usize,
    /// Byte offset of the root node, 0 for an empty tree.
    pub root_offset: u64,
    /// Node records in the file.
    pub node_count: u64,
    /// Levels from the root down to the leaves.
    pub height: u32,
    /// Distinct k-mers stored.
    pub distinct_keys: u64,
    /// Sum of all counts.
    pub total_occurrences: u64,
    /// Cache counters after the walk, if a cache was used.
    pub cache: Option<CacheStats>,
    /// Node reads and writes performed while gathering the report.
    pub io: TreeStatsSnapshot,
}

/// Opens the tree at `path` and walks every record.
pub fn stats(path: impl AsRef<Path>, cache_capacity: Option<usize>) -> Result<StatsReport> {
    let path = path.as_ref();
    let mut tree = BTree::open(path, cache_capacity)?;

    let mut height = 0u32;
    let mut offset = tree.root_offset();
    while let Some(node) = tree.node(offset)? {
        height += 1;
        offset = node.child(0).unwrap_or(NULL_OFFSET);
    }

    let mut distinct_keys = 0u64;
    let mut total_occurrences = 0u64;
    tree.for_each(|rec| {
        distinct_keys += 1;
        total_occurrences += u64::from(rec.count);
        Ok(())
    })?;

    Ok(StatsReport {
        path: path.display().to_string(),
        file_size_bytes: tree.file_len(),
        order: tree.order(),
        record_len: tree.record_len(),
        min_degree: tree.min_degree(),
        root_offset: tree.root_offset(),
        node_count: tree.node_count(),
        height,
        distinct_keys,
        total_occurrences,
        cache: tree.cache_stats(),
        io: tree.stats(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TreeOptions;
    use tempfile::tempdir;

    #[test]
    fn reports_shape_and_totals() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t.bt");
        {
            let mut tree = BTree::create(&path, &TreeOptions::new(4)).unwrap();
            for k in 1..=4u64 {
                tree.insert(k).unwrap();
            }
            tree.insert(4).unwrap();
        }
        let report = stats(&path, Some(8)).unwrap();
        assert_eq!(report.order, 4);
        assert_eq!(report.record_len, 73);
        assert_eq!(report.node_count, 3);
        assert_eq!(report.height, 2);
        assert_eq!(report.distinct_keys, 4);
        assert_eq!(report.total_occurrences, 5);
        assert_eq!(report.file_size_bytes, 12 + 3 * 73);
        assert_eq!(report.cache.map(|c| c.capacity), Some(8));
    }

    #[test]
    fn empty_tree_has_zero_height() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t.bt");
        BTree::create(&path, &TreeOptions::new(4)).unwrap();
        let report = stats(&path, None).unwrap();
        assert_eq!(report.height, 0);
        assert_eq!(report.distinct_keys, 0);
        assert!(report.cache.is_none());
    }
}
