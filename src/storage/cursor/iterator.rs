use std::sync::Arc;

use crate::storage::metrics::StorageMetrics;
use crate::storage::record::{RecordLoad, RelationshipRecord};
use crate::storage::store::RecordAccessor;
use crate::storage::txstate::ReadableTxState;
use crate::types::{RelId, Result};

use super::{Poolable, RecordReader, RelationshipItem, TxMerge};

/// Cursor over an explicit sequence of relationship ids, typically produced by
/// an index lookup. Relationships added in the transaction follow the
/// committed ones.
pub struct IteratorRelationshipCursor {
    relationships: RecordReader<RelationshipRecord>,
    metrics: Arc<dyn StorageMetrics>,
    merge: TxMerge,
    ids: Vec<RelId>,
    pos: usize,
    current: Option<RelationshipItem>,
}

impl IteratorRelationshipCursor {
    /// Creates a cursor holding a read handle on `relationships`.
    pub fn new(
        relationships: Arc<dyn RecordAccessor<RelationshipRecord>>,
        metrics: Arc<dyn StorageMetrics>,
    ) -> Self {
        Self {
            relationships: RecordReader::new(relationships),
            metrics,
            merge: TxMerge::default(),
            ids: Vec::new(),
            pos: 0,
            current: None,
        }
    }

    /// Positions the cursor before the first id of `ids`.
    pub fn init(
        &mut self,
        ids: impl IntoIterator<Item = RelId>,
        tx: Arc<dyn ReadableTxState>,
    ) -> &mut Self {
        self.merge.init(tx, |tx, out| {
            out.extend(tx.added_and_removed_relationships().added())
        });
        self.ids.clear();
        self.ids.extend(ids);
        self.pos = 0;
        self.current = None;
        self
    }

    /// Advances to the next in-use relationship.
    ///
    /// Ids outside the store fail with [`crate::types::StoreError::InvalidRecordId`].
    pub fn next(&mut self) -> Result<bool> {
        while self.fetch_committed()? {
            let record = &self.relationships.record;
            if self.merge.hides_committed(record.id) {
                continue;
            }
            self.current = Some(RelationshipItem::from(record));
            return Ok(true);
        }
        self.current = self.merge.next_added();
        Ok(self.current.is_some())
    }

    /// Relationship the cursor is positioned on.
    pub fn get(&self) -> Option<&RelationshipItem> {
        self.current.as_ref()
    }

    fn fetch_committed(&mut self) -> Result<bool> {
        while self.pos < self.ids.len() {
            let id = self.ids[self.pos];
            self.pos += 1;
            self.relationships.load(id.0, RecordLoad::Check)?;
            if self.relationships.record.in_use {
                return Ok(true);
            }
            self.metrics.unused_record_skipped();
        }
        Ok(false)
    }
}

impl Poolable for IteratorRelationshipCursor {
    fn close(&mut self) {
        self.merge.close();
        self.ids.clear();
        self.pos = 0;
        self.current = None;
    }

    fn dispose(&mut self) {
        self.relationships.dispose();
    }
}
