use serde::Serialize;

/// Snapshot of tree statistics at a point in time.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TreeStatsSnapshot {
    /// Keys inserted for the first time
    pub inserts: u64,
    /// Inserts that bumped the count of an existing key
    pub increments: u64,
    /// Leaf splits performed
    pub leaf_splits: u64,
    /// Internal node splits performed
    pub internal_splits: u64,
    /// Splits of the root (each grows the tree by one level)
    pub root_splits: u64,
    /// Node records read from the file
    pub node_reads: u64,
    /// Node records written to the file
    pub node_writes: u64,
}

/// Structural event counters for one open tree.
#[derive(Default, Debug)]
pub struct TreeStats {
    inserts: u64,
    increments: u64,
    leaf_splits: u64,
    internal_splits: u64,
    root_splits: u64,
}

impl TreeStats {
    pub(crate) fn inc_inserts(&mut self) {
        self.inserts += 1;
    }

    pub(crate) fn inc_increments(&mut self) {
        self.increments += 1;
    }

    pub(crate) fn inc_splits(&mut self, leaf: bool) {
        if leaf {
            self.leaf_splits += 1;
        } else {
            self.internal_splits += 1;
        }
    }

    pub(crate) fn inc_root_splits(&mut self) {
        self.root_splits += 1;
    }

    /// Combines the counters with the backend's I/O totals.
    pub fn snapshot(&self, node_reads: u64, node_writes: u64) -> TreeStatsSnapshot {
        TreeStatsSnapshot {
            inserts: self.inserts,
            increments: self.increments,
            leaf_splits: self.leaf_splits,
            internal_splits: self.internal_splits,
            root_splits: self.root_splits,
            node_reads,
            node_writes,
        }
    }
}
