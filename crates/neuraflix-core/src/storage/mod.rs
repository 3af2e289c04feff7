//! # Storage Module
//!
//! Disk-backed `GraphStore` implementations.

pub mod redb_graph;

pub use redb_graph::RedbGraph;
