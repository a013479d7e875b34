use std::collections::HashSet;
use std::path::Path;

use serde::Serialize;
use tracing::warn;

use crate::error::{GeneBankError, Result};
use crate::storage::btree::{BTree, NULL_OFFSET};

const MAX_FINDINGS: usize = 32;

/// Indicates the severity level of a verification finding.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VerifySeverity {
    /// Non-critical issue that may indicate a problem.
    Warning,
    /// The tree violates a structural invariant.
    Error,
}

/// Represents a single issue discovered during verification.
#[derive(Clone, Debug, Serialize)]
pub struct VerifyFinding {
    /// The severity level of this finding.
    pub severity: VerifySeverity,
    /// Human-readable description of the issue.
    pub message: String,
}

impl VerifyFinding {
    fn error(message: impl Into<String>) -> Self {
        Self {
            severity: VerifySeverity::Error,
            message: message.into(),
        }
    }
}

/// What the walk saw.
#[derive(Clone, Debug, Default, Serialize)]
pub struct VerifyCounts {
    /// Node records in the file.
    pub records_in_file: u64,
    /// Distinct nodes reached from the root.
    pub nodes_reached: u64,
    /// Leaves among them.
    pub leaves: u64,
    /// Keys stored across all reached nodes.
    pub keys: u64,
    /// Sum of all counts.
    pub occurrences: u64,
}

/// Complete report of a verification operation.
#[derive(Clone, Debug, Serialize)]
pub struct VerifyReport {
    /// Whether verification passed without finding any issues.
    pub success: bool,
    /// List of issues discovered during verification.
    pub findings: Vec<VerifyFinding>,
    /// Statistics about the nodes examined.
    pub counts: VerifyCounts,
}

struct Pending {
    offset: u64,
    depth: u32,
    lo: Option<u64>,
    hi: Option<u64>,
}

/// Walks the tree at `path` and checks every reachable node.
///
/// Checked: key order inside nodes, separator bounds between levels, the
/// `t - 1` lower bound on non-root nodes, uniform leaf depth, and that every
/// record in the file is reached exactly once.
///
/// # Errors
///
/// Only I/O failures are returned as errors. Corruption found while opening
/// or walking becomes a finding.
pub fn verify(path: impl AsRef<Path>) -> Result<VerifyReport> {
    let mut findings = Vec::new();
    let mut counts = VerifyCounts::default();

    let mut tree = match BTree::open(path.as_ref(), None) {
        Ok(tree) => tree,
        Err(GeneBankError::Corruption(msg)) => {
            push_error(&mut findings, format!("cannot open tree: {msg}"));
            return Ok(finish(findings, counts));
        }
        Err(err) => return Err(err),
    };
    counts.records_in_file = tree.node_count();
    let min_keys = tree.min_degree().saturating_sub(1);
    let root = tree.root_offset();

    let mut seen = HashSet::new();
    let mut leaf_depth: Option<u32> = None;
    let mut stack = Vec::new();
    if root != NULL_OFFSET {
        stack.push(Pending {
            offset: root,
            depth: 0,
            lo: None,
            hi: None,
        });
    }

    while let Some(item) = stack.pop() {
        if !seen.insert(item.offset) {
            push_error(
                &mut findings,
                format!("node at {} is reachable more than once", item.offset),
            );
            continue;
        }
        let node = match tree.node(item.offset) {
            Ok(Some(node)) => node,
            Ok(None) => continue,
            Err(GeneBankError::Corruption(msg)) => {
                push_error(&mut findings, msg);
                continue;
            }
            Err(err) => return Err(err),
        };
        counts.nodes_reached += 1;
        counts.keys += node.entry_count() as u64;
        counts.occurrences += node.keys().iter().map(|r| u64::from(r.count)).sum::<u64>();

        if item.offset == root && node.entry_count() == 0 {
            push_error(&mut findings, format!("root at {} holds no keys", item.offset));
        }
        if item.offset != root && node.entry_count() < min_keys {
            push_error(
                &mut findings,
                format!(
                    "node at {} holds {} keys, below the minimum of {min_keys}",
                    item.offset,
                    node.entry_count()
                ),
            );
        }
        let out_of_bounds = node.keys().iter().any(|rec| {
            item.lo.is_some_and(|lo| rec.key <= lo) || item.hi.is_some_and(|hi| rec.key >= hi)
        });
        if out_of_bounds {
            push_error(
                &mut findings,
                format!(
                    "node at {} holds keys outside its parent's separators",
                    item.offset
                ),
            );
        }

        if node.is_leaf() {
            counts.leaves += 1;
            match leaf_depth {
                None => leaf_depth = Some(item.depth),
                Some(depth) if depth != item.depth => push_error(
                    &mut findings,
                    format!(
                        "leaf at {} has depth {} but other leaves have depth {depth}",
                        item.offset, item.depth
                    ),
                ),
                Some(_) => {}
            }
            continue;
        }
        for (i, &child) in node.children().iter().enumerate().rev() {
            let lo = if i == 0 {
                item.lo
            } else {
                Some(node.keys()[i - 1].key)
            };
            let hi = node.keys().get(i).map(|r| r.key).or(item.hi);
            stack.push(Pending {
                offset: child,
                depth: item.depth + 1,
                lo,
                hi,
            });
        }
    }

    if counts.nodes_reached < counts.records_in_file {
        push_error(
            &mut findings,
            format!(
                "{} of {} node records are unreachable from the root",
                counts.records_in_file - counts.nodes_reached,
                counts.records_in_file
            ),
        );
    }

    Ok(finish(findings, counts))
}

fn finish(findings: Vec<VerifyFinding>, counts: VerifyCounts) -> VerifyReport {
    VerifyReport {
        success: findings
            .iter()
            .all(|f| f.severity != VerifySeverity::Error),
        findings,
        counts,
    }
}

fn push_error(findings: &mut Vec<VerifyFinding>, message: impl Into<String>) {
    if findings.len() == MAX_FINDINGS {
        findings.push(VerifyFinding {
            severity: VerifySeverity::Warning,
            message: format!("stopped recording after {MAX_FINDINGS} findings"),
        });
    }
    if findings.len() > MAX_FINDINGS {
        return;
    }
    let finding = VerifyFinding::error(message);
    warn!(message = %finding.message, "verify.finding");
    findings.push(finding);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TreeOptions;
    use crate::primitives::io::{FileIo, StdFileIo};
    use tempfile::tempdir;

    fn build(path: &Path, order: u32, keys: impl IntoIterator<Item = u64>) -> u64 {
        let mut tree = BTree::create(path, &TreeOptions::new(order)).unwrap();
        for k in keys {
            tree.insert(k).unwrap();
        }
        tree.root_offset()
    }

    #[test]
    fn healthy_tree_passes() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t.bt");
        build(&path, 5, (0..400u64).map(|k| (k * 7919) % 401));
        let report = verify(&path).unwrap();
        assert!(report.success, "{:?}", report.findings);
        assert_eq!(report.counts.keys, 400);
        assert_eq!(report.counts.occurrences, 400);
        assert_eq!(report.counts.nodes_reached, report.counts.records_in_file);
    }

    #[test]
    fn order_three_tree_passes() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t.bt");
        build(&path, 3, 0..100u64);
        assert!(verify(&path).unwrap().success);
    }

    #[test]
    fn swapped_separator_is_reported() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t.bt");
        let root = build(&path, 4, 1..=4u64);
        // root holds the single separator 2; move it above its right child
        let raw = StdFileIo::open(&path).unwrap();
        raw.write_at(root + 5, &10u64.to_be_bytes()).unwrap();
        drop(raw);
        let report = verify(&path).unwrap();
        assert!(!report.success);
        assert!(report
            .findings
            .iter()
            .any(|f| f.message.contains("outside its parent's separators")));
    }

    #[test]
    fn orphaned_record_is_reported() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t.bt");
        build(&path, 4, 1..=4u64);
        // point the root at the first leaf, leaving two records unreachable
        let raw = StdFileIo::open(&path).unwrap();
        raw.write_at(0, &12u64.to_be_bytes()).unwrap();
        drop(raw);
        let report = verify(&path).unwrap();
        assert!(!report.success);
        assert_eq!(report.counts.nodes_reached, 1);
        assert_eq!(report.counts.records_in_file, 3);
    }

    #[test]
    fn corrupt_header_becomes_finding() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t.bt");
        build(&path, 4, 1..=2u64);
        let raw = StdFileIo::open(&path).unwrap();
        raw.write_at(8, &1u32.to_be_bytes()).unwrap();
        drop(raw);
        let report = verify(&path).unwrap();
        assert!(!report.success);
        assert_eq!(report.findings.len(), 1);
    }

    #[test]
    fn huge_header_order_becomes_finding() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t.bt");
        let raw = StdFileIo::open(&path).unwrap();
        raw.write_at(0, &NULL_OFFSET.to_be_bytes()).unwrap();
        raw.write_at(8, &u32::MAX.to_be_bytes()).unwrap();
        drop(raw);
        let report = verify(&path).unwrap();
        assert!(!report.success);
        assert!(report.findings[0].message.contains("unusable order"));
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = tempdir().unwrap();
        assert!(verify(dir.path().join("nope.bt")).is_err());
    }
}
