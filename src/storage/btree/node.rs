use super::record::Record;

/// Sentinel offset meaning "no node".
///
/// The file header lives at offset 0, so no node record is ever written there.
pub const NULL_OFFSET: u64 = 0;

/// Where a key falls inside one node.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SearchPosition {
    /// `keys[i]` holds the key.
    Found(usize),
    /// The key is absent here; it belongs under `children[i]` (or at slot `i`
    /// of a leaf).
    Descend(usize),
}

/// In-memory image of one tree node.
///
/// `keys.len()` is the entry count. An internal node always carries
/// `keys.len() + 1` children; a leaf carries none.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Node {
    pub(crate) offset: u64,
    pub(crate) is_leaf: bool,
    pub(crate) capacity: usize,
    pub(crate) keys: Vec<Record>,
    pub(crate) children: Vec<u64>,
}

impl Node {
    /// An empty leaf that can hold `capacity` records.
    pub fn new_leaf(capacity: usize) -> Self {
        Self {
            offset: NULL_OFFSET,
            is_leaf: true,
            capacity,
            keys: Vec::with_capacity(capacity),
            children: Vec::new(),
        }
    }

    /// An internal node with no keys and `first_child` as its only child.
    pub fn new_internal(capacity: usize, first_child: u64) -> Self {
        let mut children = Vec::with_capacity(capacity + 1);
        children.push(first_child);
        Self {
            offset: NULL_OFFSET,
            is_leaf: false,
            capacity,
            keys: Vec::with_capacity(capacity),
            children,
        }
    }

    /// File offset of this node's record, or [`NULL_OFFSET`] before first write.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// True for leaf nodes.
    pub fn is_leaf(&self) -> bool {
        self.is_leaf
    }

    /// Number of records stored.
    pub fn entry_count(&self) -> usize {
        self.keys.len()
    }

    /// Maximum number of records (`order - 1`).
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// True when another record would exceed the capacity.
    pub fn is_full(&self) -> bool {
        self.keys.len() >= self.capacity
    }

    /// Records in ascending key order.
    pub fn keys(&self) -> &[Record] {
        &self.keys
    }

    /// Child offsets; empty for leaves.
    pub fn children(&self) -> &[u64] {
        &self.children
    }

    /// Offset of child `i`, or `None` for leaves and out-of-range slots.
    pub fn child(&self, i: usize) -> Option<u64> {
        self.children.get(i).copied().filter(|&off| off != NULL_OFFSET)
    }

    /// Locates `key` among this node's records.
    pub fn search(&self, key: u64) -> SearchPosition {
        match self.keys.binary_search_by_key(&key, |rec| rec.key) {
            Ok(i) => SearchPosition::Found(i),
            Err(i) => SearchPosition::Descend(i),
        }
    }

    pub(crate) fn record_mut(&mut self, i: usize) -> &mut Record {
        &mut self.keys[i]
    }

    /// Places `record` at slot `pos`, shifting larger keys right.
    pub(crate) fn insert_record(&mut self, pos: usize, record: Record) {
        debug_assert!(!self.is_full(), "insert into full node");
        debug_assert!(self.is_leaf);
        self.keys.insert(pos, record);
    }

    /// Installs a promoted separator at `index` with `right_child` to its right.
    pub(crate) fn insert_separator(&mut self, index: usize, separator: Record, right_child: u64) {
        debug_assert!(!self.is_leaf);
        debug_assert!(!self.is_full(), "separator into full node");
        self.keys.insert(index, separator);
        self.children.insert(index + 1, right_child);
    }

    /// Splits a full node around the record at `t - 1`.
    ///
    /// `self` keeps `t - 1` records (and `t` children when internal). Returns
    /// the median and a new unwritten sibling holding everything above it.
    pub(crate) fn split(&mut self, t: usize) -> (Record, Node) {
        debug_assert!(t >= 1 && t <= self.keys.len());
        let upper_keys = self.keys.split_off(t);
        let median = self.keys.remove(t - 1);
        let upper_children = if self.is_leaf {
            Vec::new()
        } else {
            self.children.split_off(t)
        };
        let sibling = Node {
            offset: NULL_OFFSET,
            is_leaf: self.is_leaf,
            capacity: self.capacity,
            keys: upper_keys,
            children: upper_children,
        };
        (median, sibling)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf_with(capacity: usize, keys: &[u64]) -> Node {
        let mut node = Node::new_leaf(capacity);
        for (i, &k) in keys.iter().enumerate() {
            node.insert_record(i, Record::new(k));
        }
        node
    }

    #[test]
    fn search_reports_slot_or_descent() {
        let node = leaf_with(4, &[10, 20, 30]);
        assert_eq!(node.search(20), SearchPosition::Found(1));
        assert_eq!(node.search(5), SearchPosition::Descend(0));
        assert_eq!(node.search(25), SearchPosition::Descend(2));
        assert_eq!(node.search(99), SearchPosition::Descend(3));
    }

    #[test]
    fn split_leaf_even_order() {
        // order 4: capacity 3, t 2
        let mut node = leaf_with(3, &[1, 2, 3]);
        let (median, right) = node.split(2);
        assert_eq!(median.key, 2);
        assert_eq!(node.keys().iter().map(|r| r.key).collect::<Vec<_>>(), vec![1]);
        assert_eq!(right.keys().iter().map(|r| r.key).collect::<Vec<_>>(), vec![3]);
        assert!(right.is_leaf());
        assert_eq!(right.offset(), NULL_OFFSET);
    }

    #[test]
    fn split_internal_moves_upper_children() {
        // order 5: capacity 4, t 2
        let mut node = Node::new_internal(4, 100);
        for (i, k) in [10u64, 20, 30, 40].into_iter().enumerate() {
            node.insert_separator(i, Record::new(k), 200 + i as u64);
        }
        let (median, right) = node.split(2);
        assert_eq!(median.key, 20);
        assert_eq!(node.keys().len(), 1);
        assert_eq!(node.children(), &[100, 200]);
        assert_eq!(right.keys().iter().map(|r| r.key).collect::<Vec<_>>(), vec![30, 40]);
        assert_eq!(right.children(), &[201, 202, 203]);
        assert!(!right.is_leaf());
    }

    #[test]
    fn leaf_child_lookup_is_none() {
        let node = leaf_with(3, &[1]);
        assert_eq!(node.child(0), None);
        let internal = Node::new_internal(3, 48);
        assert_eq!(internal.child(0), Some(48));
        assert_eq!(internal.child(1), None);
    }
}
