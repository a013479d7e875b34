use std::num::NonZeroUsize;

use lru::LruCache;
use serde::Serialize;

use super::node::Node;
use crate::error::{GeneBankError, Result};

/// Largest cache the tree accepts, in nodes.
pub const MAX_CACHE_CAPACITY: usize = 1 << 20;

/// Point-in-time view of cache counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct CacheStats {
    /// Maximum number of cached nodes.
    pub capacity: usize,
    /// Nodes currently cached.
    pub len: usize,
    /// Lookups performed through [`PageCache::get`].
    pub accesses: u64,
    /// Lookups that found their node.
    pub hits: u64,
    /// Entries dropped to make room for new offsets.
    pub evictions: u64,
    /// `hits / accesses`, or 0 before the first lookup.
    pub hit_rate: f64,
}

/// Bounded least-recently-used cache of decoded nodes keyed by file offset.
///
/// Hit and access counters survive [`PageCache::clear`].
pub struct PageCache {
    entries: LruCache<u64, Node>,
    accesses: u64,
    hits: u64,
    evictions: u64,
}

impl PageCache {
    /// Creates a cache holding at most `capacity` nodes.
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity > MAX_CACHE_CAPACITY {
            return Err(GeneBankError::invalid_config(format!(
                "cache capacity {capacity} exceeds the maximum of {MAX_CACHE_CAPACITY}"
            )));
        }
        let capacity = NonZeroUsize::new(capacity)
            .ok_or_else(|| GeneBankError::invalid_config("cache capacity must be positive"))?;
        Ok(Self {
            entries: LruCache::new(capacity),
            accesses: 0,
            hits: 0,
            evictions: 0,
        })
    }

    /// Returns a copy of the node at `offset`, promoting it to most recent.
    pub fn get(&mut self, offset: u64) -> Option<Node> {
        self.accesses += 1;
        let node = self.entries.get(&offset).cloned();
        if node.is_some() {
            self.hits += 1;
        }
        node
    }

    /// Caches `node` at `offset` as the most recently used entry.
    ///
    /// A new offset inserted at capacity evicts the least recently used entry.
    pub fn put(&mut self, offset: u64, node: Node) {
        if let Some((displaced, _)) = self.entries.push(offset, node) {
            if displaced != offset {
                self.evictions += 1;
            }
        }
    }

    /// Drops the entry for `offset` if present.
    pub fn invalidate(&mut self, offset: u64) -> Option<Node> {
        self.entries.pop(&offset)
    }

    /// Drops every entry; hit/access counters are kept.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// True if `offset` is cached. Does not touch recency or counters.
    pub fn contains(&self, offset: u64) -> bool {
        self.entries.contains(&offset)
    }

    /// Cached offsets from most to least recently used.
    pub fn offsets_by_recency(&self) -> Vec<u64> {
        self.entries.iter().map(|(&off, _)| off).collect()
    }

    /// Nodes currently cached.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Maximum number of cached nodes.
    pub fn capacity(&self) -> usize {
        self.entries.cap().get()
    }

    /// Total lookups.
    pub fn accesses(&self) -> u64 {
        self.accesses
    }

    /// Successful lookups.
    pub fn hits(&self) -> u64 {
        self.hits
    }

    /// `hits / accesses`, 0 when nothing has been looked up.
    pub fn hit_rate(&self) -> f64 {
        if self.accesses == 0 {
            0.0
        } else {
            self.hits as f64 / self.accesses as f64
        }
    }

    /// Snapshot of counters and occupancy.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            capacity: self.capacity(),
            len: self.len(),
            accesses: self.accesses,
            hits: self.hits,
            evictions: self.evictions,
            hit_rate: self.hit_rate(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::btree::record::Record;

    fn node_at(offset: u64) -> Node {
        let mut node = Node::new_leaf(3);
        node.offset = offset;
        node.insert_record(0, Record::new(offset));
        node
    }

    #[test]
    fn zero_capacity_is_rejected() {
        assert!(matches!(
            PageCache::new(0),
            Err(GeneBankError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn oversized_capacity_is_rejected() {
        assert!(matches!(
            PageCache::new(MAX_CACHE_CAPACITY + 1),
            Err(GeneBankError::InvalidConfiguration(_))
        ));
        assert!(matches!(
            PageCache::new(usize::MAX),
            Err(GeneBankError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn invalidate_drops_present_entry() {
        let mut cache = PageCache::new(4).unwrap();
        cache.put(1, node_at(1));
        cache.put(2, node_at(2));
        assert_eq!(cache.invalidate(1), Some(node_at(1)));
        assert!(!cache.contains(1));
        assert!(cache.contains(2));
        assert_eq!(cache.len(), 1);
        assert!(cache.get(1).is_none());
        assert_eq!(cache.stats().evictions, 0);
    }

    #[test]
    fn hit_rate_starts_at_zero_and_counts_hits() {
        let mut cache = PageCache::new(2).unwrap();
        assert_eq!(cache.hit_rate(), 0.0);
        assert!(cache.get(12).is_none());
        cache.put(12, node_at(12));
        assert_eq!(cache.get(12), Some(node_at(12)));
        assert_eq!(cache.accesses(), 2);
        assert_eq!(cache.hits(), 1);
        assert_eq!(cache.hit_rate(), 0.5);
    }

    #[test]
    fn evicts_least_recently_used() {
        let mut cache = PageCache::new(2).unwrap();
        cache.put(1, node_at(1));
        cache.put(2, node_at(2));
        assert!(cache.get(1).is_some());
        cache.put(3, node_at(3));
        assert!(cache.contains(1));
        assert!(!cache.contains(2));
        assert!(cache.contains(3));
        assert_eq!(cache.offsets_by_recency(), vec![3, 1]);
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn put_of_existing_key_refreshes_without_eviction() {
        let mut cache = PageCache::new(2).unwrap();
        cache.put(1, node_at(1));
        cache.put(2, node_at(2));
        let mut updated = node_at(1);
        updated.record_mut(0).increment();
        cache.put(1, updated.clone());
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.offsets_by_recency(), vec![1, 2]);
        assert_eq!(cache.get(1), Some(updated));
        assert_eq!(cache.stats().evictions, 0);
    }

    #[test]
    fn returned_nodes_are_independent_copies() {
        let mut cache = PageCache::new(1).unwrap();
        cache.put(7, node_at(7));
        let mut copy = cache.get(7).unwrap();
        copy.record_mut(0).increment();
        assert_eq!(cache.get(7).unwrap().keys()[0].count, 1);
    }

    #[test]
    fn clear_keeps_counters() {
        let mut cache = PageCache::new(4).unwrap();
        cache.put(1, node_at(1));
        cache.get(1);
        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.hits(), 1);
        assert_eq!(cache.accesses(), 1);
        assert!(cache.invalidate(1).is_none());
    }
}
