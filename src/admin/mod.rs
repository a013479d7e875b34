#![forbid(unsafe_code)]

//! Inspection utilities for tree files.
//!
//! These open a finished tree, walk it and report on what they find. They
//! back the `dump`, `stats` and `verify` commands of the CLI.

mod dump;
mod stats;
mod verify;

/// Text export of every stored k-mer with its count.
pub use dump::dump;

/// Summary of a tree file's geometry and contents.
pub use stats::{stats, StatsReport};

/// Structural integrity checks.
///
/// Problems found in the tree are returned as findings rather than errors.
pub use verify::{verify, VerifyCounts, VerifyFinding, VerifyReport, VerifySeverity};
