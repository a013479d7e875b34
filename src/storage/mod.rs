//! On-disk storage structures.

pub mod btree;
