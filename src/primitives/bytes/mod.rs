#![forbid(unsafe_code)]
//! Fixed-width big-endian encoding helpers shared by header and node codecs.

pub mod be {
    //! Writers for big-endian fields at explicit positions.

    /// Writes `v` big-endian into `dst[at..at + 8]`.
    pub fn put_u64(dst: &mut [u8], at: usize, v: u64) {
        dst[at..at + 8].copy_from_slice(&v.to_be_bytes());
    }

    /// Writes `v` big-endian into `dst[at..at + 4]`.
    pub fn put_u32(dst: &mut [u8], at: usize, v: u32) {
        dst[at..at + 4].copy_from_slice(&v.to_be_bytes());
    }
}

pub mod buf {
    //! A slice-backed read cursor that reports truncation instead of panicking.

    use crate::error::{GeneBankError, Result};

    /// Sequential reader over a byte slice with offset tracking.
    pub struct Cursor<'a> {
        buf: &'a [u8],
        off: usize,
    }

    impl<'a> Cursor<'a> {
        /// Creates a cursor positioned at the start of `buf`.
        pub fn new(buf: &'a [u8]) -> Self {
            Self { buf, off: 0 }
        }

        /// Current read offset.
        pub fn position(&self) -> usize {
            self.off
        }

        /// Bytes left to read.
        pub fn remaining(&self) -> usize {
            self.buf.len() - self.off
        }

        /// Takes the next `n` bytes, advancing the cursor.
        pub fn take(&mut self, n: usize) -> Result<&'a [u8]> {
            if n > self.remaining() {
                return Err(GeneBankError::corruption(format!(
                    "record truncated: need {n} bytes at {}, have {}",
                    self.off,
                    self.remaining()
                )));
            }
            let start = self.off;
            self.off += n;
            Ok(&self.buf[start..self.off])
        }

        /// Advances past `n` bytes without decoding them.
        pub fn skip(&mut self, n: usize) -> Result<()> {
            self.take(n).map(|_| ())
        }

        /// Reads one byte.
        pub fn get_u8(&mut self) -> Result<u8> {
            Ok(self.take(1)?[0])
        }

        /// Reads a big-endian `u32`.
        pub fn get_u32(&mut self) -> Result<u32> {
            let mut arr = [0u8; 4];
            arr.copy_from_slice(self.take(4)?);
            Ok(u32::from_be_bytes(arr))
        }

        /// Reads a big-endian `u64`.
        pub fn get_u64(&mut self) -> Result<u64> {
            let mut arr = [0u8; 8];
            arr.copy_from_slice(self.take(8)?);
            Ok(u64::from_be_bytes(arr))
        }
    }
}
