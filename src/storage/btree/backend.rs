use std::path::Path;

use tracing::{debug, trace};

use super::node::{Node, NULL_OFFSET};
use super::record::{Record, RECORD_LEN};
use crate::error::{GeneBankError, Result};
use crate::primitives::bytes::{be, buf::Cursor};
use crate::primitives::io::{FileIo, StdFileIo};

/// Size of the file header: `root_offset:u64 | order:u32`.
pub const HEADER_LEN: u64 = 8 + 4;

/// Smallest order that can be split.
pub const MIN_ORDER: u32 = 3;

/// Largest order a header may store; one record stays near 1.3 MB.
pub const MAX_ORDER: u32 = u16::MAX as u32;

const ROOT_FIELD: u64 = 0;
const ORDER_FIELD: u64 = 8;
const NODE_META_LEN: usize = 4 + 1;
const CHILD_LEN: usize = 8;

/// Fixed record geometry derived from the tree order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NodeLayout {
    order: u32,
    record_len: usize,
}

impl NodeLayout {
    /// Validates `order` and computes the record size.
    pub fn new(order: u32) -> Result<Self> {
        if order < MIN_ORDER {
            return Err(GeneBankError::invalid_config(format!(
                "tree order {order} is below the minimum of {MIN_ORDER}"
            )));
        }
        if order > MAX_ORDER {
            return Err(GeneBankError::invalid_config(format!(
                "tree order {order} exceeds the maximum of {MAX_ORDER}"
            )));
        }
        let record_len = Self::record_len_for(order).ok_or_else(|| {
            GeneBankError::invalid_config(format!("tree order {order} is too large"))
        })?;
        Ok(Self { order, record_len })
    }

    /// `5 + (order - 1) * 12 + order * 8`, or `None` on overflow.
    pub fn record_len_for(order: u32) -> Option<usize> {
        let order = usize::try_from(order).ok()?;
        let keys = order.checked_sub(1)?.checked_mul(RECORD_LEN)?;
        let children = order.checked_mul(CHILD_LEN)?;
        NODE_META_LEN.checked_add(keys)?.checked_add(children)
    }

    /// Maximum number of children per node.
    pub fn order(&self) -> u32 {
        self.order
    }

    /// Maximum number of records per node.
    pub fn capacity(&self) -> usize {
        self.order as usize - 1
    }

    /// Encoded size of one node record in bytes.
    pub fn record_len(&self) -> usize {
        self.record_len
    }

    fn children_start(&self) -> usize {
        NODE_META_LEN + self.capacity() * RECORD_LEN
    }

    /// Serializes `node` into `dst`, zero-filling unused slots.
    pub fn encode(&self, node: &Node, dst: &mut [u8]) {
        debug_assert_eq!(dst.len(), self.record_len);
        dst.fill(0);
        be::put_u32(dst, 0, node.entry_count() as u32);
        dst[4] = u8::from(node.is_leaf());
        let mut at = NODE_META_LEN;
        for rec in node.keys() {
            be::put_u64(dst, at, rec.key);
            be::put_u32(dst, at + 8, rec.count);
            at += RECORD_LEN;
        }
        let mut at = self.children_start();
        for &child in node.children() {
            be::put_u64(dst, at, child);
            at += CHILD_LEN;
        }
    }

    /// Decodes one record read from `offset`.
    ///
    /// Child offsets are returned as stored; the caller validates them
    /// against the file extent.
    pub fn decode(&self, offset: u64, src: &[u8]) -> Result<Node> {
        let capacity = self.capacity();
        let mut cur = Cursor::new(src);
        let entry_count = cur.get_u32()? as usize;
        if entry_count > capacity {
            return Err(GeneBankError::corruption(format!(
                "node at {offset} claims {entry_count} entries (capacity {capacity})"
            )));
        }
        let is_leaf = match cur.get_u8()? {
            0 => false,
            1 => true,
            other => {
                return Err(GeneBankError::corruption(format!(
                    "node at {offset} has invalid leaf flag {other}"
                )))
            }
        };
        let mut node = if is_leaf {
            Node::new_leaf(capacity)
        } else {
            Node::new_internal(capacity, NULL_OFFSET)
        };
        node.offset = offset;
        for _ in 0..entry_count {
            let key = cur.get_u64()?;
            let count = cur.get_u32()?;
            if count == 0 {
                return Err(GeneBankError::corruption(format!(
                    "node at {offset} stores key {key} with zero count"
                )));
            }
            if node.keys.last().is_some_and(|prev| prev.key >= key) {
                return Err(GeneBankError::corruption(format!(
                    "node at {offset} keys are not strictly ascending"
                )));
            }
            node.keys.push(Record::with_count(key, count));
        }
        cur.skip((capacity - entry_count) * RECORD_LEN)?;
        if !is_leaf {
            node.children.clear();
            for _ in 0..=entry_count {
                node.children.push(cur.get_u64()?);
            }
        }
        Ok(node)
    }
}

/// Owns the tree file and translates between nodes and fixed-size records.
///
/// The header holds the root offset and order; node records follow it in
/// creation order and are addressed by their byte offset.
pub struct StorageBackend {
    io: Box<dyn FileIo>,
    header_len: u64,
    layout: Option<NodeLayout>,
    append_cursor: u64,
    file_len: u64,
    scratch: Vec<u8>,
    reads: u64,
    writes: u64,
}

impl StorageBackend {
    /// Opens `path` for random access, creating the file if absent.
    pub fn create_or_open(path: impl AsRef<Path>, header_len: u64) -> Result<Self> {
        let path = path.as_ref();
        let io = StdFileIo::open(path)?;
        debug!(path = %path.display(), "backend.open");
        Self::with_io(Box::new(io), header_len)
    }

    /// Opens an existing tree file; a missing file is an I/O error.
    pub fn open_existing(path: impl AsRef<Path>, header_len: u64) -> Result<Self> {
        let path = path.as_ref();
        let io = StdFileIo::open_existing(path)?;
        debug!(path = %path.display(), "backend.open_existing");
        Self::with_io(Box::new(io), header_len)
    }

    /// Builds a backend over an arbitrary [`FileIo`].
    pub fn with_io(io: Box<dyn FileIo>, header_len: u64) -> Result<Self> {
        if header_len < HEADER_LEN {
            return Err(GeneBankError::invalid_config(format!(
                "header length {header_len} is smaller than {HEADER_LEN}"
            )));
        }
        let file_len = io.len()?;
        Ok(Self {
            io,
            header_len,
            layout: None,
            append_cursor: header_len,
            file_len,
            scratch: Vec::new(),
            reads: 0,
            writes: 0,
        })
    }

    /// Discards the file contents and forgets the layout.
    pub fn reset(&mut self) -> Result<()> {
        self.io.truncate(0)?;
        self.file_len = 0;
        self.append_cursor = self.header_len;
        self.layout = None;
        Ok(())
    }

    /// Writes a fresh header and positions the append cursor after it.
    pub fn write_header(&mut self, root_offset: u64, order: u32) -> Result<()> {
        let layout = NodeLayout::new(order)?;
        self.install_layout(layout);
        let mut header = vec![0u8; self.header_len as usize];
        be::put_u64(&mut header, ROOT_FIELD as usize, root_offset);
        be::put_u32(&mut header, ORDER_FIELD as usize, order);
        self.io.write_at(0, &header)?;
        self.append_cursor = self.header_len;
        self.file_len = self.file_len.max(self.header_len);
        debug!(
            root_offset,
            order,
            record_len = layout.record_len(),
            "backend.write_header"
        );
        Ok(())
    }

    /// Reads the header's root offset.
    pub fn read_root_offset(&self) -> Result<u64> {
        self.ensure_header_present()?;
        let mut raw = [0u8; 8];
        self.io.read_at(ROOT_FIELD, &mut raw)?;
        Ok(u64::from_be_bytes(raw))
    }

    /// Reads the header's order and adopts its record layout.
    ///
    /// Appends continue at the current end of the file.
    pub fn read_order(&mut self) -> Result<u32> {
        self.ensure_header_present()?;
        let mut raw = [0u8; 4];
        self.io.read_at(ORDER_FIELD, &mut raw)?;
        let order = u32::from_be_bytes(raw);
        let layout = NodeLayout::new(order).map_err(|_| {
            GeneBankError::corruption(format!("header stores unusable order {order}"))
        })?;
        self.file_len = self.io.len()?;
        let body = self.file_len - self.header_len;
        if body % layout.record_len() as u64 != 0 {
            return Err(GeneBankError::corruption(format!(
                "file body of {body} bytes is not a whole number of {}-byte records",
                layout.record_len()
            )));
        }
        self.install_layout(layout);
        self.append_cursor = self.file_len;
        Ok(order)
    }

    /// Rewrites only the root offset field of the header.
    pub fn set_root(&mut self, offset: u64) -> Result<()> {
        self.io.write_at(ROOT_FIELD, &offset.to_be_bytes())?;
        debug!(root_offset = offset, "backend.set_root");
        Ok(())
    }

    /// Writes `node` at the end of the file and assigns its offset.
    pub fn append_node(&mut self, node: &mut Node) -> Result<u64> {
        let layout = self.layout()?;
        self.check_geometry(&layout, node)?;
        let offset = self.append_cursor;
        node.offset = offset;
        self.write_record(&layout, node)?;
        self.append_cursor += layout.record_len() as u64;
        self.file_len = self.file_len.max(self.append_cursor);
        trace!(offset, entries = node.entry_count(), "backend.append_node");
        Ok(offset)
    }

    /// Rewrites an existing record in place.
    pub fn update_node(&mut self, node: &Node) -> Result<()> {
        let layout = self.layout()?;
        self.check_geometry(&layout, node)?;
        if node.offset() == NULL_OFFSET {
            return Err(GeneBankError::invalid_arg(
                "update of a node that was never appended",
            ));
        }
        self.check_offset(&layout, node.offset())?;
        self.write_record(&layout, node)?;
        trace!(
            offset = node.offset(),
            entries = node.entry_count(),
            "backend.update_node"
        );
        Ok(())
    }

    /// Reads the node stored at `offset`; offset 0 yields `None`.
    pub fn read_node(&mut self, offset: u64) -> Result<Option<Node>> {
        if offset == NULL_OFFSET {
            return Ok(None);
        }
        let layout = self.layout()?;
        self.check_offset(&layout, offset)?;
        self.scratch.resize(layout.record_len(), 0);
        self.io.read_at(offset, &mut self.scratch)?;
        self.reads += 1;
        let node = layout.decode(offset, &self.scratch)?;
        for &child in node.children() {
            self.check_offset(&layout, child).map_err(|_| {
                GeneBankError::corruption(format!(
                    "node at {offset} references invalid child offset {child}"
                ))
            })?;
        }
        trace!(offset, entries = node.entry_count(), "backend.read_node");
        Ok(Some(node))
    }

    /// Flushes file data to disk.
    pub fn sync(&self) -> Result<()> {
        self.io.sync_all()
    }

    /// Record geometry, once a header has been written or read.
    pub fn layout(&self) -> Result<NodeLayout> {
        self.layout
            .ok_or_else(|| GeneBankError::invalid_arg("tree header has not been initialized"))
    }

    /// Size of the header region in bytes.
    pub fn header_len(&self) -> u64 {
        self.header_len
    }

    /// Current file length as tracked by the backend.
    pub fn file_len(&self) -> u64 {
        self.file_len
    }

    /// Number of node records currently in the file.
    pub fn node_count(&self) -> u64 {
        match self.layout {
            Some(layout) => {
                self.append_cursor.saturating_sub(self.header_len) / layout.record_len() as u64
            }
            None => 0,
        }
    }

    /// Node records read so far.
    pub fn reads(&self) -> u64 {
        self.reads
    }

    /// Node records written (appended or updated) so far.
    pub fn writes(&self) -> u64 {
        self.writes
    }

    fn install_layout(&mut self, layout: NodeLayout) {
        self.scratch = vec![0u8; layout.record_len()];
        self.layout = Some(layout);
    }

    fn ensure_header_present(&self) -> Result<()> {
        let len = self.io.len()?;
        if len < self.header_len {
            return Err(GeneBankError::corruption(format!(
                "file of {len} bytes is too short for the {}-byte header",
                self.header_len
            )));
        }
        Ok(())
    }

    fn check_geometry(&self, layout: &NodeLayout, node: &Node) -> Result<()> {
        if node.capacity() != layout.capacity() {
            return Err(GeneBankError::invalid_arg(format!(
                "node capacity {} does not match tree capacity {}",
                node.capacity(),
                layout.capacity()
            )));
        }
        Ok(())
    }

    fn check_offset(&self, layout: &NodeLayout, offset: u64) -> Result<()> {
        let record_len = layout.record_len() as u64;
        let aligned = offset >= self.header_len && (offset - self.header_len) % record_len == 0;
        let inside = offset
            .checked_add(record_len)
            .is_some_and(|end| end <= self.file_len);
        if !aligned || !inside {
            return Err(GeneBankError::corruption(format!(
                "node offset {offset} is outside the record area"
            )));
        }
        Ok(())
    }

    fn write_record(&mut self, layout: &NodeLayout, node: &Node) -> Result<()> {
        self.scratch.resize(layout.record_len(), 0);
        layout.encode(node, &mut self.scratch);
        self.io.write_at(node.offset(), &self.scratch)?;
        self.writes += 1;
        Ok(())
    }
}
