use tracing::trace;

use super::backend::StorageBackend;
use super::cache::{CacheStats, PageCache};
use super::node::Node;
use crate::error::Result;

/// Where the tree gets nodes from and sends them to.
///
/// Chosen once when a tree is opened so the algorithms never branch on
/// whether caching is enabled.
pub trait NodeSource {
    /// Node stored at `offset`; offset 0 yields `None`.
    fn get_node(&mut self, offset: u64) -> Result<Option<Node>>;
    /// Persists a new node and assigns its offset.
    fn append_node(&mut self, node: &mut Node) -> Result<u64>;
    /// Persists changes to an already appended node.
    fn update_node(&mut self, node: &Node) -> Result<()>;
    /// Cache counters, when a cache sits in front of the backend.
    fn cache_stats(&self) -> Option<CacheStats>;
    /// The backend this source writes through to.
    fn backend(&self) -> &StorageBackend;
    /// Mutable access for header updates.
    fn backend_mut(&mut self) -> &mut StorageBackend;
}

/// Reads and writes straight through the backend.
pub struct DirectSource {
    backend: StorageBackend,
}

impl DirectSource {
    /// Wraps `backend` without a cache.
    pub fn new(backend: StorageBackend) -> Self {
        Self { backend }
    }
}

impl NodeSource for DirectSource {
    fn get_node(&mut self, offset: u64) -> Result<Option<Node>> {
        self.backend.read_node(offset)
    }

    fn append_node(&mut self, node: &mut Node) -> Result<u64> {
        self.backend.append_node(node)
    }

    fn update_node(&mut self, node: &Node) -> Result<()> {
        self.backend.update_node(node)
    }

    fn cache_stats(&self) -> Option<CacheStats> {
        None
    }

    fn backend(&self) -> &StorageBackend {
        &self.backend
    }

    fn backend_mut(&mut self) -> &mut StorageBackend {
        &mut self.backend
    }
}

/// Serves reads from a [`PageCache`] and falls back to the backend on miss.
///
/// Writes go to the backend first and then refresh the cached copy.
pub struct CachedSource {
    backend: StorageBackend,
    cache: PageCache,
}

impl CachedSource {
    /// Puts `cache` in front of `backend`.
    pub fn new(backend: StorageBackend, cache: PageCache) -> Self {
        Self { backend, cache }
    }

    /// The cache itself, for inspection.
    pub fn cache(&self) -> &PageCache {
        &self.cache
    }
}

impl NodeSource for CachedSource {
    fn get_node(&mut self, offset: u64) -> Result<Option<Node>> {
        if let Some(node) = self.cache.get(offset) {
            trace!(offset, "cache.hit");
            return Ok(Some(node));
        }
        let node = self.backend.read_node(offset)?;
        if let Some(node) = &node {
            self.cache.put(offset, node.clone());
        }
        Ok(node)
    }

    fn append_node(&mut self, node: &mut Node) -> Result<u64> {
        let offset = self.backend.append_node(node)?;
        self.cache.put(offset, node.clone());
        Ok(offset)
    }

    fn update_node(&mut self, node: &Node) -> Result<()> {
        if let Err(err) = self.backend.update_node(node) {
            self.cache.invalidate(node.offset());
            return Err(err);
        }
        self.cache.put(node.offset(), node.clone());
        Ok(())
    }

    fn cache_stats(&self) -> Option<CacheStats> {
        Some(self.cache.stats())
    }

    fn backend(&self) -> &StorageBackend {
        &self.backend
    }

    fn backend_mut(&mut self) -> &mut StorageBackend {
        &mut self.backend
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GeneBankError;
    use crate::primitives::io::{FlakyIo, StdFileIo};
    use crate::storage::btree::backend::HEADER_LEN;
    use crate::storage::btree::node::NULL_OFFSET;
    use crate::storage::btree::record::Record;
    use std::sync::atomic::Ordering;
    use tempfile::tempdir;

    #[test]
    fn failed_update_leaves_no_stale_cached_node() {
        let dir = tempdir().unwrap();
        let io = FlakyIo::new(StdFileIo::open(dir.path().join("t.bin")).unwrap());
        let fail = io.write_switch();
        let mut backend = StorageBackend::with_io(Box::new(io), HEADER_LEN).unwrap();
        backend.write_header(NULL_OFFSET, 4).unwrap();
        let capacity = backend.layout().unwrap().capacity();
        let mut source = CachedSource::new(backend, PageCache::new(4).unwrap());

        let mut node = Node::new_leaf(capacity);
        node.insert_record(0, Record::new(9));
        let offset = source.append_node(&mut node).unwrap();
        assert!(source.cache().contains(offset));

        let mut changed = node.clone();
        changed.record_mut(0).increment();
        fail.store(true, Ordering::SeqCst);
        assert!(matches!(
            source.update_node(&changed),
            Err(GeneBankError::Io(_))
        ));
        assert!(!source.cache().contains(offset));

        fail.store(false, Ordering::SeqCst);
        let reads = source.backend().reads();
        let stored = source.get_node(offset).unwrap().unwrap();
        assert_eq!(stored.keys(), &[Record::new(9)]);
        assert_eq!(source.backend().reads(), reads + 1);
    }

    #[test]
    fn successful_update_refreshes_cached_copy() {
        let dir = tempdir().unwrap();
        let mut backend =
            StorageBackend::create_or_open(dir.path().join("t.bin"), HEADER_LEN).unwrap();
        backend.write_header(NULL_OFFSET, 4).unwrap();
        let capacity = backend.layout().unwrap().capacity();
        let mut source = CachedSource::new(backend, PageCache::new(4).unwrap());

        let mut node = Node::new_leaf(capacity);
        node.insert_record(0, Record::new(3));
        let offset = source.append_node(&mut node).unwrap();
        node.record_mut(0).increment();
        source.update_node(&node).unwrap();

        let reads = source.backend().reads();
        let cached = source.get_node(offset).unwrap().unwrap();
        assert_eq!(cached.keys(), &[Record::with_count(3, 2)]);
        assert_eq!(source.backend().reads(), reads);
    }
}
