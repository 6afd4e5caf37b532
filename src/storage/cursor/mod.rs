//! Cursors over relationship chains, explicit id sequences and whole stores.
//!
//! Every cursor owns its record buffers and read handles, so a cursor is never
//! shared between workers. `init` fully resets traversal state, `close` drops
//! the transaction-state view and `dispose` releases the read handles.

use std::fmt;
use std::sync::Arc;

use crate::storage::record::{Record, RecordLoad, RelationshipRecord};
use crate::storage::store::{ReadHandle, RecordAccessor};
use crate::storage::txstate::ReadableTxState;
use crate::types::{NodeId, RelId, Result, StoreError, TypeId};

mod iterator;
mod pool;
mod relationship;
mod scan;

pub use iterator::IteratorRelationshipCursor;
pub use pool::{CursorPool, PoolStatus, Poolable, PooledCursor};
pub use relationship::{NodeRelationshipCursor, RelationshipSource};
pub use scan::{NodeScan, NodeScanCursor, RelationshipScan, RelationshipScanCursor, ScanEntity, StoreScanCursor};

/// Relationship exposed by a cursor.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct RelationshipItem {
    /// Relationship id.
    pub id: RelId,
    /// Relationship type.
    pub rel_type: TypeId,
    /// Start node.
    pub start_node: NodeId,
    /// End node.
    pub end_node: NodeId,
}

impl RelationshipItem {
    /// Endpoint opposite to `node`.
    pub fn other_node(&self, node: NodeId) -> NodeId {
        if self.start_node == node {
            self.end_node
        } else {
            self.start_node
        }
    }
}

impl From<&RelationshipRecord> for RelationshipItem {
    fn from(record: &RelationshipRecord) -> Self {
        Self {
            id: record.id,
            rel_type: record.rel_type,
            start_node: record.first_node,
            end_node: record.second_node,
        }
    }
}

impl fmt::Display for RelationshipItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "RelationshipItem[id={}, type={}, start={}, end={}]",
            self.id, self.rel_type, self.start_node, self.end_node
        )
    }
}

/// Node exposed by a scan cursor.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct NodeItem {
    /// Node id.
    pub id: NodeId,
}

/// Record buffer plus the read handle used to fill it.
pub(crate) struct RecordReader<R: Record> {
    store: Arc<dyn RecordAccessor<R>>,
    handle: Option<ReadHandle>,
    pub(crate) record: R,
}

impl<R: Record> RecordReader<R> {
    pub(crate) fn new(store: Arc<dyn RecordAccessor<R>>) -> Self {
        let handle = store.open_read_handle();
        Self {
            store,
            handle: Some(handle),
            record: R::new_unused(0),
        }
    }

    pub(crate) fn load(&mut self, id: u64, mode: RecordLoad) -> Result<()> {
        if self.handle.is_none() {
            return Err(StoreError::CursorDisposed);
        }
        self.store.read_record(id, &mut self.record, mode)
    }

    pub(crate) fn high_id(&self) -> u64 {
        self.store.high_id()
    }

    pub(crate) fn dispose(&mut self) {
        self.handle = None;
    }
}

/// Merges a transaction's added relationships after the committed ones and
/// hides committed relationships the transaction deleted.
#[derive(Default)]
pub(crate) struct TxMerge {
    tx: Option<Arc<dyn ReadableTxState>>,
    added: Vec<RelId>,
    pos: usize,
}

impl TxMerge {
    pub(crate) fn init(
        &mut self,
        tx: Arc<dyn ReadableTxState>,
        fill: impl FnOnce(&dyn ReadableTxState, &mut Vec<RelId>),
    ) {
        self.added.clear();
        self.pos = 0;
        fill(tx.as_ref(), &mut self.added);
        self.tx = Some(tx);
    }

    /// Whether a committed relationship must not be yielded. Ids claimed as
    /// added are yielded from the added phase only.
    pub(crate) fn hides_committed(&self, rel: RelId) -> bool {
        match &self.tx {
            Some(tx) => {
                tx.relationship_is_deleted_in_this_tx(rel)
                    || tx.relationship_is_added_in_this_tx(rel)
            }
            None => false,
        }
    }

    pub(crate) fn next_added(&mut self) -> Option<RelationshipItem> {
        let tx = self.tx.as_ref()?;
        while self.pos < self.added.len() {
            let rel = self.added[self.pos];
            self.pos += 1;
            if let Some(item) = tx.added_relationship(rel) {
                return Some(item);
            }
        }
        None
    }

    pub(crate) fn close(&mut self) {
        self.tx = None;
        self.added.clear();
        self.pos = 0;
    }
}
