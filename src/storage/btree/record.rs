use serde::Serialize;

/// Encoded size of one record on disk: `key:u64 | count:u32`.
pub const RECORD_LEN: usize = 8 + 4;

/// One stored key with its occurrence count.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Record {
    /// Packed k-mer.
    pub key: u64,
    /// Number of times `key` was inserted.
    pub count: u32,
}

impl Record {
    /// A record seen for the first time.
    pub fn new(key: u64) -> Self {
        Self { key, count: 1 }
    }

    /// A record with an explicit count, as decoded from disk.
    pub fn with_count(key: u64, count: u32) -> Self {
        Self { key, count }
    }

    /// Bumps the occurrence count, saturating at `u32::MAX`.
    pub fn increment(&mut self) -> u32 {
        self.count = self.count.saturating_add(1);
        self.count
    }
}

#[cfg(test)]
mod tests {
    use super::Record;

    #[test]
    fn increment_saturates() {
        let mut rec = Record::with_count(9, u32::MAX - 1);
        assert_eq!(rec.increment(), u32::MAX);
        assert_eq!(rec.increment(), u32::MAX);
    }
}
