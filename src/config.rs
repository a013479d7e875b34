//! Tree construction options.
//!
//! # Example
//!
//! ```rust
//! use genebank::TreeOptions;
//!
//! let opts = TreeOptions::new(64).with_cache(500);
//! assert!(opts.validate().is_ok());
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{GeneBankError, Result};
use crate::storage::btree::{NodeLayout, MAX_CACHE_CAPACITY, MAX_ORDER, MIN_ORDER};

/// Order used when none is given.
pub const DEFAULT_ORDER: u32 = 128;

/// Disk block size that [`TreeOptions::optimal_order`] targets by default.
pub const DEFAULT_BLOCK_SIZE: usize = 4096;

/// Parameters fixed when a tree file is created or opened.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TreeOptions {
    /// Maximum number of children per node; stored in the file header.
    pub order: u32,
    /// Page cache capacity in nodes, or `None` to read every node from disk.
    pub cache_capacity: Option<usize>,
}

impl Default for TreeOptions {
    fn default() -> Self {
        Self {
            order: DEFAULT_ORDER,
            cache_capacity: None,
        }
    }
}

impl TreeOptions {
    /// Options for a tree of `order` without a cache.
    pub fn new(order: u32) -> Self {
        Self {
            order,
            cache_capacity: None,
        }
    }

    /// Enables a page cache of `capacity` nodes.
    pub fn with_cache(mut self, capacity: usize) -> Self {
        self.cache_capacity = Some(capacity);
        self
    }

    /// Disables the page cache.
    pub fn without_cache(mut self) -> Self {
        self.cache_capacity = None;
        self
    }

    /// Rejects orders outside `[3, MAX_ORDER]` and cache capacities that are
    /// zero or above [`MAX_CACHE_CAPACITY`].
    pub fn validate(&self) -> Result<()> {
        NodeLayout::new(self.order)?;
        match self.cache_capacity {
            Some(0) => Err(GeneBankError::invalid_config(
                "cache capacity must be positive when caching is enabled",
            )),
            Some(cap) if cap > MAX_CACHE_CAPACITY => Err(GeneBankError::invalid_config(format!(
                "cache capacity {cap} exceeds the maximum of {MAX_CACHE_CAPACITY}"
            ))),
            _ => Ok(()),
        }
    }

    /// Largest order whose node record fits in `block_size` bytes.
    pub fn optimal_order(block_size: usize) -> Result<u32> {
        // record_len = 5 + 12 * (order - 1) + 8 * order = 20 * order - 7
        let order = u32::try_from(block_size.saturating_add(7) / 20)
            .unwrap_or(u32::MAX)
            .min(MAX_ORDER);
        if order < MIN_ORDER {
            return Err(GeneBankError::invalid_config(format!(
                "block size {block_size} cannot hold a node of order {MIN_ORDER}"
            )));
        }
        Ok(order)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn optimal_order_fills_block() {
        let order = TreeOptions::optimal_order(DEFAULT_BLOCK_SIZE).unwrap();
        assert_eq!(order, 205);
        let fits = NodeLayout::new(order).unwrap().record_len();
        let next = NodeLayout::new(order + 1).unwrap().record_len();
        assert!(fits <= DEFAULT_BLOCK_SIZE);
        assert!(next > DEFAULT_BLOCK_SIZE);
        assert!(TreeOptions::optimal_order(40).is_err());
        assert_eq!(TreeOptions::optimal_order(usize::MAX).unwrap(), MAX_ORDER);
    }

    #[test]
    fn validation_rules() {
        assert!(TreeOptions::new(3).validate().is_ok());
        assert!(matches!(
            TreeOptions::new(2).validate(),
            Err(GeneBankError::InvalidConfiguration(_))
        ));
        assert!(matches!(
            TreeOptions::new(4).with_cache(0).validate(),
            Err(GeneBankError::InvalidConfiguration(_))
        ));
        assert!(TreeOptions::new(4).with_cache(1).validate().is_ok());
        assert!(matches!(
            TreeOptions::new(4_000_000_000).validate(),
            Err(GeneBankError::InvalidConfiguration(_))
        ));
        assert!(matches!(
            TreeOptions::new(4).with_cache(usize::MAX).validate(),
            Err(GeneBankError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn deserializes_partial_toml() {
        let opts: TreeOptions = toml::from_str("cache_capacity = 10").unwrap();
        assert_eq!(opts.order, DEFAULT_ORDER);
        assert_eq!(opts.cache_capacity, Some(10));
    }
}
