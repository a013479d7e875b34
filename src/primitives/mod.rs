//! Low-level primitives for the storage engine.
//!
//! Includes byte encoding helpers and positioned file I/O.

/// Big-endian field encoding and a bounds-checked read cursor.
pub mod bytes;

/// Positioned read/write access to the tree file.
pub mod io;
