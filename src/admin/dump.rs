use std::io::Write;

use crate::error::Result;
use crate::kmer;
use crate::storage::btree::BTree;

/// Writes `"<kmer>: <count>"` per record in ascending key order.
///
/// Returns the number of lines written.
pub fn dump<W: Write>(tree: &mut BTree, kmer_len: usize, out: &mut W) -> Result<u64> {
    kmer::check_len(kmer_len)?;
    let mut written = 0u64;
    tree.for_each(|rec| {
        writeln!(out, "{}: {}", kmer::decode(rec.key, kmer_len), rec.count)?;
        written += 1;
        Ok(())
    })?;
    out.flush()?;
    tracing::debug!(records = written, "admin.dump");
    Ok(written)
}
