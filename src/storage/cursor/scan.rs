use std::marker::PhantomData;
use std::sync::Arc;

use crate::storage::metrics::StorageMetrics;
use crate::storage::progression::{Progression, ScanBatch};
use crate::storage::record::{NodeRecord, Record, RecordLoad, RelationshipRecord};
use crate::storage::store::RecordAccessor;
use crate::storage::txstate::ReadableTxState;
use crate::types::{NodeId, RelId, Result};

use super::{NodeItem, Poolable, RecordReader, RelationshipItem};

/// Entity kind walked by a [`StoreScanCursor`].
pub trait ScanEntity: Send + 'static {
    /// Record type read from the scanned store.
    type Record: Record;
    /// Item exposed for the current position.
    type Item: Copy + Send;

    /// Projects a committed record onto the cursor item.
    fn item(record: &Self::Record) -> Self::Item;

    /// Whether the committed record with `id` must be hidden from the scan.
    fn hidden(tx: &dyn ReadableTxState, id: u64) -> bool;

    /// Ids added in the transaction, ascending.
    fn added(tx: &dyn ReadableTxState) -> Vec<u64>;

    /// Item for an entity added in the transaction, if it is still live.
    fn added_item(tx: &dyn ReadableTxState, id: u64) -> Option<Self::Item>;
}

/// Node store scans.
pub struct NodeScan;

impl ScanEntity for NodeScan {
    type Record = NodeRecord;
    type Item = NodeItem;

    fn item(record: &NodeRecord) -> NodeItem {
        NodeItem { id: record.id }
    }

    fn hidden(tx: &dyn ReadableTxState, id: u64) -> bool {
        tx.node_is_deleted_in_this_tx(NodeId(id)) || tx.node_is_added_in_this_tx(NodeId(id))
    }

    fn added(tx: &dyn ReadableTxState) -> Vec<u64> {
        tx.added_and_removed_nodes()
            .added()
            .into_iter()
            .map(|node| node.0)
            .collect()
    }

    fn added_item(_tx: &dyn ReadableTxState, id: u64) -> Option<NodeItem> {
        Some(NodeItem { id: NodeId(id) })
    }
}

/// Relationship store scans.
pub struct RelationshipScan;

impl ScanEntity for RelationshipScan {
    type Record = RelationshipRecord;
    type Item = RelationshipItem;

    fn item(record: &RelationshipRecord) -> RelationshipItem {
        RelationshipItem::from(record)
    }

    fn hidden(tx: &dyn ReadableTxState, id: u64) -> bool {
        tx.relationship_is_deleted_in_this_tx(RelId(id))
            || tx.relationship_is_added_in_this_tx(RelId(id))
    }

    fn added(tx: &dyn ReadableTxState) -> Vec<u64> {
        tx.added_and_removed_relationships()
            .added()
            .into_iter()
            .map(|rel| rel.0)
            .collect()
    }

    fn added_item(tx: &dyn ReadableTxState, id: u64) -> Option<RelationshipItem> {
        tx.added_relationship(RelId(id))
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Phase {
    Committed,
    Added,
    Done,
}

/// Cursor draining batches from a shared [`Progression`].
///
/// Several cursors may share one progression; each id is visited by exactly
/// one of them and the transaction's added entities by exactly one.
pub struct StoreScanCursor<E: ScanEntity> {
    records: RecordReader<E::Record>,
    metrics: Arc<dyn StorageMetrics>,
    progression: Option<Arc<dyn Progression>>,
    tx: Option<Arc<dyn ReadableTxState>>,
    batch: ScanBatch,
    next_id: u64,
    added: Vec<u64>,
    added_pos: usize,
    phase: Phase,
    current: Option<E::Item>,
    _entity: PhantomData<E>,
}

impl<E: ScanEntity> std::fmt::Debug for StoreScanCursor<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreScanCursor")
            .field("next_id", &self.next_id)
            .field("added_pos", &self.added_pos)
            .field("phase", &self.phase)
            .finish_non_exhaustive()
    }
}

/// Scan over every node.
pub type NodeScanCursor = StoreScanCursor<NodeScan>;

/// Scan over every relationship.
pub type RelationshipScanCursor = StoreScanCursor<RelationshipScan>;

impl<E: ScanEntity> StoreScanCursor<E> {
    /// Creates an uninitialised scan cursor over `store`.
    pub fn new(store: Arc<dyn RecordAccessor<E::Record>>, metrics: Arc<dyn StorageMetrics>) -> Self {
        Self {
            records: RecordReader::new(store),
            metrics,
            progression: None,
            tx: None,
            batch: ScanBatch { start: 0, end: 0 },
            next_id: 0,
            added: Vec::new(),
            added_pos: 0,
            phase: Phase::Done,
            current: None,
            _entity: PhantomData,
        }
    }

    /// Starts claiming batches from `progression`, filtering through `tx`.
    pub fn init(&mut self, progression: Arc<dyn Progression>, tx: Arc<dyn ReadableTxState>) -> &mut Self {
        self.progression = Some(progression);
        self.tx = Some(tx);
        self.batch = ScanBatch { start: 0, end: 0 };
        self.next_id = 0;
        self.added.clear();
        self.added_pos = 0;
        self.phase = Phase::Committed;
        self.current = None;
        self
    }

    /// Advances to the next visible entity.
    pub fn next(&mut self) -> Result<bool> {
        loop {
            match self.phase {
                Phase::Committed => {
                    if self.next_id < self.batch.end {
                        let id = self.next_id;
                        self.next_id += 1;
                        if self.load_visible(id)? {
                            self.current = Some(E::item(&self.records.record));
                            return Ok(true);
                        }
                        continue;
                    }
                    self.advance_batch();
                }
                Phase::Added => {
                    while self.added_pos < self.added.len() {
                        let id = self.added[self.added_pos];
                        self.added_pos += 1;
                        let item = self.tx.as_deref().and_then(|tx| E::added_item(tx, id));
                        if item.is_some() {
                            self.current = item;
                            return Ok(true);
                        }
                    }
                    self.phase = Phase::Done;
                }
                Phase::Done => {
                    self.current = None;
                    return Ok(false);
                }
            }
        }
    }

    /// Entity the cursor is positioned on.
    pub fn get(&self) -> Option<&E::Item> {
        self.current.as_ref()
    }

    /// Highest id of the underlying store at the time of the call.
    pub fn store_high_id(&self) -> u64 {
        self.records.high_id()
    }

    fn load_visible(&mut self, id: u64) -> Result<bool> {
        self.records.load(id, RecordLoad::Force)?;
        if !self.records.record.in_use() {
            self.metrics.unused_record_skipped();
            return Ok(false);
        }
        Ok(match self.tx.as_deref() {
            Some(tx) => !E::hidden(tx, id),
            None => true,
        })
    }

    fn advance_batch(&mut self) {
        let Some(progression) = self.progression.as_deref() else {
            self.phase = Phase::Done;
            return;
        };
        match progression.next_batch() {
            Some(batch) => {
                self.batch = batch;
                self.next_id = batch.start;
            }
            None if progression.append_added() => {
                self.added = self.tx.as_deref().map(|tx| E::added(tx)).unwrap_or_default();
                self.added_pos = 0;
                self.phase = Phase::Added;
            }
            None => self.phase = Phase::Done,
        }
    }
}

impl<E: ScanEntity> Poolable for StoreScanCursor<E> {
    fn close(&mut self) {
        self.progression = None;
        self.tx = None;
        self.added.clear();
        self.phase = Phase::Done;
        self.current = None;
    }

    fn dispose(&mut self) {
        self.records.dispose();
    }
}
