//! Two-bit packing of DNA k-mers into tree keys.
//!
//! Bases map to `a=0, c=1, g=2, t=3` and the first base lands in the most
//! significant occupied bits, so key order equals lexicographic k-mer order.

use crate::error::{GeneBankError, Result};

/// Longest k-mer a key can hold.
pub const MAX_KMER_LEN: usize = 31;

const BASES: [char; 4] = ['a', 'c', 'g', 't'];

/// Two-bit code of a base, case-insensitive.
pub fn base_code(base: u8) -> Option<u64> {
    match base.to_ascii_lowercase() {
        b'a' => Some(0),
        b'c' => Some(1),
        b'g' => Some(2),
        b't' => Some(3),
        _ => None,
    }
}

/// Rejects k-mer lengths outside `1..=MAX_KMER_LEN`.
pub fn check_len(len: usize) -> Result<()> {
    if len == 0 || len > MAX_KMER_LEN {
        return Err(GeneBankError::invalid_arg(format!(
            "k-mer length {len} is outside 1..={MAX_KMER_LEN}"
        )));
    }
    Ok(())
}

/// Mask covering the low `2 * len` bits.
pub(crate) fn mask(len: usize) -> u64 {
    if len >= 32 {
        u64::MAX
    } else {
        (1u64 << (2 * len)) - 1
    }
}

/// Packs `seq` into a key.
pub fn encode(seq: &str) -> Result<u64> {
    check_len(seq.len())?;
    seq.bytes().try_fold(0u64, |acc, b| -> Result<u64> {
        let code = base_code(b).ok_or_else(|| {
            GeneBankError::invalid_arg(format!(
                "{:?} is not a DNA base in {seq:?}",
                char::from(b)
            ))
        })?;
        Ok((acc << 2) | code)
    })
}

/// Unpacks the low `len` bases of `key` as lowercase text.
pub fn decode(key: u64, len: usize) -> String {
    (0..len)
        .map(|i| {
            let shift = 2 * (len - 1 - i);
            let code = if shift < 64 { (key >> shift) & 3 } else { 0 };
            BASES[code as usize]
        })
        .collect()
}
