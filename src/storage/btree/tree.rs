use std::cmp::Ordering;
use std::path::Path;

use super::backend::{NodeLayout, StorageBackend, HEADER_LEN};
use super::cache::{CacheStats, PageCache};
use super::node::{Node, SearchPosition, NULL_OFFSET};
use super::record::Record;
use super::source::{CachedSource, DirectSource, NodeSource};
use super::stats::{TreeStats, TreeStatsSnapshot};
use crate::config::TreeOptions;
use crate::error::{GeneBankError, Result};

/// Result of a single [`BTree::insert`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InsertOutcome {
    /// The key was not present and now has count 1.
    Inserted,
    /// The key was present; carries its new count.
    Incremented(u32),
}

impl InsertOutcome {
    /// Count of the key after the insert.
    pub fn count(&self) -> u32 {
        match self {
            InsertOutcome::Inserted => 1,
            InsertOutcome::Incremented(count) => *count,
        }
    }
}

/// Disk-resident B-tree counting occurrences of `u64` keys.
///
/// Nodes are split on the way down, so an insert never has to revisit an
/// ancestor. Inserting a key already in the tree increments its count and
/// rewrites exactly one node. The tree never deletes keys.
///
/// Every mutation is written to the file before the call returns. Call
/// [`BTree::sync`] to force it to stable storage.
pub struct BTree {
    pub(super) source: Box<dyn NodeSource>,
    layout: NodeLayout,
    root_offset: u64,
    stats: TreeStats,
}

impl BTree {
    /// Creates a new tree at `path`, discarding any existing contents.
    pub fn create(path: impl AsRef<Path>, options: &TreeOptions) -> Result<Self> {
        options.validate()?;
        let path = path.as_ref();
        let mut backend = StorageBackend::create_or_open(path, HEADER_LEN)?;
        backend.reset()?;
        backend.write_header(NULL_OFFSET, options.order)?;
        let layout = backend.layout()?;
        tracing::debug!(
            path = %path.display(),
            order = options.order,
            cache = ?options.cache_capacity,
            "btree.create"
        );
        Self::assemble(backend, layout, NULL_OFFSET, options.cache_capacity)
    }

    /// Opens an existing tree, taking the order from the header.
    ///
    /// The root record is read and validated before this returns. New keys
    /// may still be inserted; they are appended after the existing records.
    pub fn open(path: impl AsRef<Path>, cache_capacity: Option<usize>) -> Result<Self> {
        let path = path.as_ref();
        let mut backend = StorageBackend::open_existing(path, HEADER_LEN)?;
        let order = backend.read_order()?;
        let root_offset = backend.read_root_offset()?;
        let layout = backend.layout()?;
        tracing::debug!(
            path = %path.display(),
            order,
            root_offset,
            nodes = backend.node_count(),
            "btree.open"
        );
        let mut tree = Self::assemble(backend, layout, root_offset, cache_capacity)?;
        if root_offset != NULL_OFFSET {
            tree.load(root_offset)?;
        } else if tree.node_count() != 0 {
            return Err(GeneBankError::corruption(
                "header has no root but the file holds node records",
            ));
        }
        Ok(tree)
    }

    fn assemble(
        backend: StorageBackend,
        layout: NodeLayout,
        root_offset: u64,
        cache_capacity: Option<usize>,
    ) -> Result<Self> {
        let source: Box<dyn NodeSource> = match cache_capacity {
            Some(capacity) => Box::new(CachedSource::new(backend, PageCache::new(capacity)?)),
            None => Box::new(DirectSource::new(backend)),
        };
        Ok(Self {
            source,
            layout,
            root_offset,
            stats: TreeStats::default(),
        })
    }

    /// Adds one occurrence of `key`.
    pub fn insert(&mut self, key: u64) -> Result<InsertOutcome> {
        if self.root_offset == NULL_OFFSET {
            let mut leaf = Node::new_leaf(self.layout.capacity());
            leaf.insert_record(0, Record::new(key));
            let offset = self.source.append_node(&mut leaf)?;
            self.set_root(offset)?;
            self.stats.inc_inserts();
            return Ok(InsertOutcome::Inserted);
        }

        if let Some((mut node, i)) = self.find_containing(key)? {
            let count = node.record_mut(i).increment();
            self.source.update_node(&node)?;
            self.stats.inc_increments();
            return Ok(InsertOutcome::Incremented(count));
        }

        let mut root = self.load(self.root_offset)?;
        if root.is_full() {
            let mut new_root = Node::new_internal(self.layout.capacity(), root.offset());
            self.source.append_node(&mut new_root)?;
            self.split_loaded_child(&mut new_root, 0, root)?;
            self.set_root(new_root.offset())?;
            self.stats.inc_root_splits();
            root = new_root;
        }
        let outcome = self.insert_nonfull(root, key)?;
        match outcome {
            InsertOutcome::Inserted => self.stats.inc_inserts(),
            InsertOutcome::Incremented(_) => self.stats.inc_increments(),
        }
        Ok(outcome)
    }

    /// Count stored for `key`, or `None` if it was never inserted.
    pub fn get(&mut self, key: u64) -> Result<Option<u32>> {
        Ok(self
            .find_containing(key)?
            .map(|(node, i)| node.keys()[i].count))
    }

    /// True if `key` has been inserted at least once.
    pub fn contains(&mut self, key: u64) -> Result<bool> {
        Ok(self.find_containing(key)?.is_some())
    }

    /// Node holding `key` and the slot it occupies.
    pub(crate) fn find_containing(&mut self, key: u64) -> Result<Option<(Node, usize)>> {
        let mut offset = self.root_offset;
        loop {
            let Some(node) = self.source.get_node(offset)? else {
                return Ok(None);
            };
            match node.search(key) {
                SearchPosition::Found(i) => return Ok(Some((node, i))),
                SearchPosition::Descend(i) => {
                    if node.is_leaf() {
                        return Ok(None);
                    }
                    offset = node.child(i).ok_or_else(|| {
                        GeneBankError::corruption(format!(
                            "internal node at {} has no child {i}",
                            node.offset()
                        ))
                    })?;
                }
            }
        }
    }

    /// Splits the full child at `index` of `parent`.
    ///
    /// Writes the shrunk child, its new sibling and the updated parent.
    /// Returns the child and sibling as persisted.
    pub(crate) fn split_child(&mut self, parent: &mut Node, index: usize) -> Result<(Node, Node)> {
        let offset = parent.child(index).ok_or_else(|| {
            GeneBankError::invalid_arg(format!(
                "node at {} has no child {index}",
                parent.offset()
            ))
        })?;
        let child = self.load(offset)?;
        self.split_loaded_child(parent, index, child)
    }

    fn split_loaded_child(
        &mut self,
        parent: &mut Node,
        index: usize,
        mut child: Node,
    ) -> Result<(Node, Node)> {
        if parent.is_leaf() || parent.is_full() {
            return Err(GeneBankError::invalid_arg(format!(
                "node at {} cannot take a separator",
                parent.offset()
            )));
        }
        if !child.is_full() {
            return Err(GeneBankError::invalid_arg(format!(
                "node at {} is not full",
                child.offset()
            )));
        }
        let (median, mut sibling) = child.split(self.min_degree());
        self.source.append_node(&mut sibling)?;
        self.source.update_node(&child)?;
        parent.insert_separator(index, median, sibling.offset());
        self.source.update_node(parent)?;
        self.stats.inc_splits(child.is_leaf());
        tracing::trace!(
            target: "genebank::split",
            parent = parent.offset(),
            left = child.offset(),
            right = sibling.offset(),
            median = median.key,
            leaf = child.is_leaf(),
            "split node"
        );
        Ok((child, sibling))
    }

    fn insert_nonfull(&mut self, mut node: Node, key: u64) -> Result<InsertOutcome> {
        loop {
            let pos = match node.search(key) {
                SearchPosition::Descend(pos) => pos,
                SearchPosition::Found(i) => return self.bump(node, i),
            };
            if node.is_leaf() {
                node.insert_record(pos, Record::new(key));
                self.source.update_node(&node)?;
                return Ok(InsertOutcome::Inserted);
            }
            let child_offset = node.child(pos).ok_or_else(|| {
                GeneBankError::corruption(format!(
                    "internal node at {} has no child {pos}",
                    node.offset()
                ))
            })?;
            let child = self.load(child_offset)?;
            node = if child.is_full() {
                let (left, right) = self.split_loaded_child(&mut node, pos, child)?;
                match key.cmp(&node.keys()[pos].key) {
                    Ordering::Less => left,
                    Ordering::Greater => right,
                    Ordering::Equal => return self.bump(node, pos),
                }
            } else {
                child
            };
        }
    }

    fn bump(&mut self, mut node: Node, i: usize) -> Result<InsertOutcome> {
        let count = node.record_mut(i).increment();
        self.source.update_node(&node)?;
        Ok(InsertOutcome::Incremented(count))
    }

    /// Visits every record in ascending key order.
    pub fn for_each<F>(&mut self, mut visit: F) -> Result<()>
    where
        F: FnMut(Record) -> Result<()>,
    {
        if self.root_offset == NULL_OFFSET {
            return Ok(());
        }
        self.walk(self.root_offset, &mut visit)
    }

    fn walk<F>(&mut self, offset: u64, visit: &mut F) -> Result<()>
    where
        F: FnMut(Record) -> Result<()>,
    {
        let node = self.load(offset)?;
        if node.is_leaf() {
            for &rec in node.keys() {
                visit(rec)?;
            }
            return Ok(());
        }
        for (i, &rec) in node.keys().iter().enumerate() {
            self.walk(node.children()[i], visit)?;
            visit(rec)?;
        }
        self.walk(node.children()[node.entry_count()], visit)
    }

    /// All records in ascending key order.
    pub fn records(&mut self) -> Result<Vec<Record>> {
        let mut out = Vec::new();
        self.for_each(|rec| {
            out.push(rec);
            Ok(())
        })?;
        Ok(out)
    }

    /// Reads one node through the cache, if any.
    pub fn node(&mut self, offset: u64) -> Result<Option<Node>> {
        self.source.get_node(offset)
    }

    fn load(&mut self, offset: u64) -> Result<Node> {
        self.source.get_node(offset)?.ok_or_else(|| {
            GeneBankError::corruption(format!("expected a node at offset {offset}"))
        })
    }

    fn set_root(&mut self, offset: u64) -> Result<()> {
        self.source.backend_mut().set_root(offset)?;
        tracing::debug!(old = self.root_offset, new = offset, "btree.root_changed");
        self.root_offset = offset;
        Ok(())
    }

    /// Flushes the tree file to stable storage.
    pub fn sync(&self) -> Result<()> {
        self.source.backend().sync()
    }

    /// Maximum children per node.
    pub fn order(&self) -> u32 {
        self.layout.order()
    }

    /// Maximum records per node.
    pub fn capacity(&self) -> usize {
        self.layout.capacity()
    }

    /// `order / 2`; the split point and the per-node lower bound plus one.
    pub fn min_degree(&self) -> usize {
        (self.layout.order() / 2) as usize
    }

    /// Byte size of one node record.
    pub fn record_len(&self) -> usize {
        self.layout.record_len()
    }

    /// Offset of the root record, 0 while the tree is empty.
    pub fn root_offset(&self) -> u64 {
        self.root_offset
    }

    /// True until the first insert.
    pub fn is_empty(&self) -> bool {
        self.root_offset == NULL_OFFSET
    }

    /// Number of node records in the file.
    pub fn node_count(&self) -> u64 {
        self.source.backend().node_count()
    }

    /// File length in bytes.
    pub fn file_len(&self) -> u64 {
        self.source.backend().file_len()
    }

    /// Structural and I/O counters since the tree was opened.
    pub fn stats(&self) -> TreeStatsSnapshot {
        let backend = self.source.backend();
        self.stats.snapshot(backend.reads(), backend.writes())
    }

    /// Cache counters, `None` when the tree runs without a cache.
    pub fn cache_stats(&self) -> Option<CacheStats> {
        self.source.cache_stats()
    }
}
