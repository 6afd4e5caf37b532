//! Record storage and traversal core.
//!
//! Holds the node, relationship and relationship-group record stores, the
//! cursors that walk them, the transaction-state overlay merged into every
//! traversal, and the progressions that split store scans across workers.

/// Cursors over relationship chains, id sequences and store scans, plus the
/// cursor pool.
pub mod cursor;

/// Scan batch claiming for sequential and parallel scans.
pub mod progression;

/// Worker orchestration for parallel scans.
pub mod scan;

/// Record accessors, in-memory stores and the graph write path.
pub mod store;

/// Transaction-state overlay.
pub mod txstate;

mod group_chain;
mod metrics;
mod options;
mod record;

pub use cursor::{
    CursorPool, IteratorRelationshipCursor, NodeItem, NodeRelationshipCursor, NodeScanCursor,
    PoolStatus, Poolable, PooledCursor, RelationshipItem, RelationshipScanCursor,
    RelationshipSource,
};

/// Dense node chain selection.
pub use group_chain::GroupChain;

/// Metrics and profiling.
pub use metrics::{default_metrics, CounterMetrics, NoopMetrics, StorageMetrics};

/// Store configuration options.
pub use options::{
    StoreOptions, DEFAULT_CURSOR_POOL_CAPACITY, DEFAULT_DENSE_NODE_THRESHOLD,
    DEFAULT_SCAN_BATCH_SIZE,
};

pub use progression::{
    ParallelProgression, Progression, ProgressionFactory, ProgressionMode, ScanBatch,
    SequentialProgression,
};

/// Fixed-size records and load modes.
pub use record::{
    ChainHead, NodeRecord, Record, RecordLoad, RelationshipGroupRecord, RelationshipRecord,
};

pub use store::{GraphStore, MemRecordStore, ReadHandle, RecordAccessor};

pub use txstate::{DiffSet, EmptyTxState, ReadableTxState, TxState};
