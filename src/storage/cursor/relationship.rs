use std::sync::Arc;

use tracing::warn;

use crate::storage::group_chain::GroupChain;
use crate::storage::metrics::StorageMetrics;
use crate::storage::record::{ChainHead, RecordLoad, RelationshipGroupRecord, RelationshipRecord};
use crate::storage::store::RecordAccessor;
use crate::storage::txstate::ReadableTxState;
use crate::types::{Direction, NodeId, RelId, Result, StoreError, TypeFilter};

use super::{Poolable, RecordReader, RelationshipItem, TxMerge};

/// Node whose relationship chain a [`NodeRelationshipCursor`] walks.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RelationshipSource {
    /// Node whose relationships are traversed.
    pub node: NodeId,
    /// First relationship or first group of the chain.
    pub head: ChainHead,
}

/// Cursor over the relationship chain of one node, sparse or dense.
///
/// Unused records met during the walk are treated as concurrent deletions:
/// ids are never reused, so their pointers still lead further down the chain.
pub struct NodeRelationshipCursor {
    relationships: RecordReader<RelationshipRecord>,
    groups: RecordReader<RelationshipGroupRecord>,
    metrics: Arc<dyn StorageMetrics>,
    merge: TxMerge,
    current: Option<RelationshipItem>,
    dense: bool,
    next_rel: RelId,
    node: NodeId,
    direction: Direction,
    types: TypeFilter,
    chain_index: usize,
    end: bool,
}

impl NodeRelationshipCursor {
    /// Creates a cursor holding read handles on both stores.
    pub fn new(
        relationships: Arc<dyn RecordAccessor<RelationshipRecord>>,
        groups: Arc<dyn RecordAccessor<RelationshipGroupRecord>>,
        metrics: Arc<dyn StorageMetrics>,
    ) -> Self {
        Self {
            relationships: RecordReader::new(relationships),
            groups: RecordReader::new(groups),
            metrics,
            merge: TxMerge::default(),
            current: None,
            dense: false,
            next_rel: RelId::NULL,
            node: NodeId::default(),
            direction: Direction::Both,
            types: TypeFilter::Any,
            chain_index: 0,
            end: true,
        }
    }

    /// Positions the cursor before the first relationship of `source` that
    /// satisfies `direction` and `types`, discarding any earlier traversal.
    pub fn init(
        &mut self,
        source: RelationshipSource,
        direction: Direction,
        types: TypeFilter,
        tx: Arc<dyn ReadableTxState>,
    ) -> Result<&mut Self> {
        let node = source.node;
        self.merge.init(tx, |tx, out| {
            tx.node_added_relationships(node, direction, &types, out)
        });
        self.current = None;
        self.node = node;
        self.direction = direction;
        self.types = types;
        self.chain_index = 0;
        self.end = false;
        match source.head {
            ChainHead::Sparse(first) => {
                self.dense = false;
                self.next_rel = first;
            }
            ChainHead::Dense(first_group) => {
                self.dense = true;
                self.next_rel = RelId::NULL;
                if first_group.is_null() {
                    self.end = true;
                } else {
                    self.groups.load(first_group.0, RecordLoad::Force)?;
                    self.next_rel = self.next_chain_start()?;
                }
            }
        }
        Ok(self)
    }

    /// Advances to the next matching relationship.
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

    /// Node whose chain is being walked.
    pub fn node(&self) -> NodeId {
        self.node
    }

    fn fetch_committed(&mut self) -> Result<bool> {
        while !self.next_rel.is_null() {
            self.relationships
                .load(self.next_rel.0, RecordLoad::Force)?;
            let record = &self.relationships.record;
            let matched = if record.in_use {
                self.direction
                    .matches(self.node, record.first_node, record.second_node)
                    && self.types.allows(record.rel_type)
            } else {
                self.metrics.unused_record_skipped();
                false
            };

            self.next_rel = match record.next_rel_for(self.node) {
                Some(next) => next,
                None => {
                    warn!(
                        node = self.node.0,
                        rel = record.id.0,
                        first = record.first_node.0,
                        second = record.second_node.0,
                        "chain.corruption"
                    );
                    return Err(StoreError::InvalidRecord {
                        node: self.node,
                        rel: record.id,
                        first_node: record.first_node,
                        second_node: record.second_node,
                    });
                }
            };
            if self.next_rel.is_null() && self.dense {
                self.next_rel = self.next_chain_start()?;
            }
            if matched {
                return Ok(true);
            }
        }
        Ok(false)
    }

    // Group records are followed even when unused, which rides over
    // concurrent deletes in the group chain.
    fn next_chain_start(&mut self) -> Result<RelId> {
        while !self.end {
            let group = &self.groups.record;
            if group.in_use && self.types.allows(group.rel_type) {
                while self.chain_index < GroupChain::ALL.len() {
                    let chain = GroupChain::ALL[self.chain_index];
                    self.chain_index += 1;
                    let start = chain.chain_start(group);
                    if !start.is_null()
                        && (self.direction == Direction::Both
                            || chain.matches_direction(self.direction))
                    {
                        return Ok(start);
                    }
                }
            }
            let next = group.next;
            if next.is_null() {
                self.end = true;
            } else {
                self.groups.load(next.0, RecordLoad::Force)?;
            }
            self.chain_index = 0;
        }
        Ok(RelId::NULL)
    }
}

impl Poolable for NodeRelationshipCursor {
    fn close(&mut self) {
        self.merge.close();
        self.current = None;
        self.next_rel = RelId::NULL;
        self.chain_index = 0;
        self.end = true;
    }

    fn dispose(&mut self) {
        self.relationships.dispose();
        self.groups.dispose();
    }
}
