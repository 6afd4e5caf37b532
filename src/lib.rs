//! Record-traversal core of a graph store: relationship chain cursors over
//! sparse and dense nodes, a transaction-state overlay, parallel store scans
//! and cursor pooling.

#![warn(missing_docs)]

/// Record stores, cursors, transaction state and scans.
pub mod storage;
/// Identifiers, directions, type filters and errors.
pub mod types;
