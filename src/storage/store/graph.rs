use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::storage::cursor::{
    CursorPool, IteratorRelationshipCursor, NodeRelationshipCursor, NodeScanCursor,
    RelationshipItem, RelationshipScanCursor, RelationshipSource,
};
use crate::storage::group_chain::GroupChain;
use crate::storage::metrics::StorageMetrics;
use crate::storage::options::StoreOptions;
use crate::storage::progression::ProgressionFactory;
use crate::storage::record::{NodeRecord, Record, RelationshipGroupRecord, RelationshipRecord};
use crate::storage::scan::run_workers;
use crate::storage::txstate::ReadableTxState;
use crate::types::{Direction, GroupId, NodeId, RelId, Result, StoreError, TypeFilter, TypeId};

use super::{MemRecordStore, RecordAccessor};

/// Where a relationship is linked into a node's chains.
#[derive(Clone, Copy, Debug)]
enum LinkSlot {
    Node(NodeId),
    Group(GroupId, GroupChain),
}

/// Node, relationship and relationship-group stores plus the single-writer
/// mutation path that keeps their chains linked.
///
/// Readers never take the writer lock; they observe committed records through
/// cursors built by this type.
pub struct GraphStore {
    nodes: Arc<MemRecordStore<NodeRecord>>,
    relationships: Arc<MemRecordStore<RelationshipRecord>>,
    groups: Arc<MemRecordStore<RelationshipGroupRecord>>,
    options: StoreOptions,
    progressions: ProgressionFactory,
    writer: Mutex<()>,
}

impl GraphStore {
    /// Creates empty stores configured by `options`.
    pub fn open(options: StoreOptions) -> Self {
        let metrics = Arc::clone(&options.metrics);
        debug!(
            dense_node_threshold = options.dense_node_threshold,
            scan_batch_size = options.scan_batch_size,
            cursor_pool_capacity = options.cursor_pool_capacity,
            "store.open"
        );
        Self {
            nodes: Arc::new(MemRecordStore::new(Arc::clone(&metrics))),
            relationships: Arc::new(MemRecordStore::new(Arc::clone(&metrics))),
            groups: Arc::new(MemRecordStore::new(Arc::clone(&metrics))),
            progressions: ProgressionFactory::new(options.scan_batch_size, metrics),
            options,
            writer: Mutex::new(()),
        }
    }

    /// Options the store was opened with.
    pub fn options(&self) -> &StoreOptions {
        &self.options
    }

    /// Metrics sink shared by the stores.
    pub fn metrics(&self) -> &Arc<dyn StorageMetrics> {
        &self.options.metrics
    }

    /// Node record store.
    pub fn node_store(&self) -> &Arc<MemRecordStore<NodeRecord>> {
        &self.nodes
    }

    /// Relationship record store.
    pub fn relationship_store(&self) -> &Arc<MemRecordStore<RelationshipRecord>> {
        &self.relationships
    }

    /// Relationship group record store.
    pub fn group_store(&self) -> &Arc<MemRecordStore<RelationshipGroupRecord>> {
        &self.groups
    }

    /// Progression factory for scans.
    pub fn progressions(&self) -> &ProgressionFactory {
        &self.progressions
    }

    // ---- writes ----

    /// Creates a sparse node without relationships.
    pub fn create_node(&self) -> NodeId {
        let _guard = self.writer.lock();
        NodeId(self.nodes.allocate(|id| NodeRecord {
            id: NodeId(id),
            in_use: true,
            dense: false,
            next_rel: RelId::NULL.0,
        }))
    }

    /// Creates a node whose relationships are grouped by type from the start.
    pub fn create_dense_node(&self) -> NodeId {
        let _guard = self.writer.lock();
        NodeId(self.nodes.allocate(|id| NodeRecord {
            id: NodeId(id),
            in_use: true,
            dense: true,
            next_rel: GroupId::NULL.0,
        }))
    }

    /// Creates a relationship and prepends it to the chains of both endpoints.
    ///
    /// Sparse nodes reaching the configured degree are converted to groups.
    pub fn create_relationship(&self, start: NodeId, end: NodeId, rel_type: TypeId) -> Result<RelId> {
        let _guard = self.writer.lock();
        self.nodes.get(start.0)?;
        self.nodes.get(end.0)?;
        let loop_rel = start == end;

        let (start_slot, start_prev) =
            self.prepare_link(start, rel_type, GroupChain::for_endpoints(loop_rel, true))?;
        let end_link = if loop_rel {
            None
        } else {
            Some(self.prepare_link(end, rel_type, GroupChain::for_endpoints(false, false))?)
        };
        let end_prev = end_link.map_or(start_prev, |(_, prev)| prev);

        // Links are written before the new head is published.
        let rel = RelId(self.relationships.allocate(|id| RelationshipRecord {
            id: RelId(id),
            first_node: start,
            second_node: end,
            rel_type,
            first_next_rel: start_prev,
            second_next_rel: end_prev,
            in_use: true,
        }));
        self.publish(start_slot, rel)?;
        if let Some((slot, _)) = end_link {
            self.publish(slot, rel)?;
        }

        self.convert_if_dense(start)?;
        if !loop_rel {
            self.convert_if_dense(end)?;
        }
        Ok(rel)
    }

    /// Unlinks a relationship from both endpoint chains and marks it unused.
    /// Its own chain pointers are left intact for readers positioned on it.
    pub fn delete_relationship(&self, rel: RelId) -> Result<()> {
        let _guard = self.writer.lock();
        let record = self.relationships.get(rel.0)?;
        self.unlink(record.first_node, &record)?;
        if !record.is_loop() {
            self.unlink(record.second_node, &record)?;
        }
        self.relationships.mark_unused(rel.0)
    }

    /// Deletes a node that has no remaining relationships.
    pub fn delete_node(&self, node: NodeId) -> Result<()> {
        let _guard = self.writer.lock();
        let record = self.nodes.get(node.0)?;
        if !record.dense {
            if !RelId(record.next_rel).is_null() {
                return Err(StoreError::NodeHasRelationships(node));
            }
            return self.nodes.mark_unused(node.0);
        }

        let groups = self.group_chain(&record)?;
        let linked = groups.iter().any(|group| {
            GroupChain::ALL
                .iter()
                .any(|chain| !chain.chain_start(group).is_null())
        });
        if linked {
            return Err(StoreError::NodeHasRelationships(node));
        }
        self.nodes.mark_unused(node.0)?;
        for group in groups {
            self.groups.mark_unused(group.id.0)?;
        }
        Ok(())
    }

    /// Endpoints and type of a committed relationship.
    pub fn relationship(&self, rel: RelId) -> Result<RelationshipItem> {
        let record = self.relationships.get(rel.0)?;
        Ok(RelationshipItem::from(&record))
    }

    fn prepare_link(&self, node: NodeId, rel_type: TypeId, chain: GroupChain) -> Result<(LinkSlot, RelId)> {
        let record = self.nodes.get(node.0)?;
        if !record.dense {
            return Ok((LinkSlot::Node(node), RelId(record.next_rel)));
        }
        let group = self.find_or_create_group(record, rel_type)?;
        Ok((LinkSlot::Group(group.id, chain), chain.chain_start(&group)))
    }

    fn publish(&self, slot: LinkSlot, head: RelId) -> Result<()> {
        match slot {
            LinkSlot::Node(node) => {
                let mut record = self.nodes.get(node.0)?;
                record.next_rel = head.0;
                self.nodes.update(record)
            }
            LinkSlot::Group(group, chain) => {
                let mut record = self.groups.get(group.0)?;
                *chain.head_mut(&mut record) = head;
                self.groups.update(record)
            }
        }
    }

    fn head_of(&self, node: &NodeRecord, record: &RelationshipRecord) -> Result<Option<(LinkSlot, RelId)>> {
        if !node.dense {
            return Ok(Some((LinkSlot::Node(node.id), RelId(node.next_rel))));
        }
        let chain = GroupChain::for_endpoints(record.is_loop(), record.first_node == node.id);
        let group = self
            .group_chain(node)?
            .into_iter()
            .find(|group| group.rel_type == record.rel_type);
        Ok(group.map(|group| (LinkSlot::Group(group.id, chain), chain.chain_start(&group))))
    }

    fn unlink(&self, node: NodeId, record: &RelationshipRecord) -> Result<()> {
        let next = chain_link(record, node)?;
        let owner = self.nodes.get(node.0)?;
        let Some((slot, head)) = self.head_of(&owner, record)? else {
            return Err(StoreError::NotFound {
                store: RelationshipRecord::STORE,
                id: record.id.0,
            });
        };
        if head == record.id {
            return self.publish(slot, next);
        }

        let mut cursor = head;
        while !cursor.is_null() {
            let mut prev = self.relationships.get(cursor.0)?;
            let after = chain_link(&prev, node)?;
            if after == record.id {
                prev.set_next_rel_for(node, next);
                return self.relationships.update(prev);
            }
            cursor = after;
        }
        Err(StoreError::NotFound {
            store: RelationshipRecord::STORE,
            id: record.id.0,
        })
    }

    fn group_chain(&self, node: &NodeRecord) -> Result<Vec<RelationshipGroupRecord>> {
        let mut out = Vec::new();
        let mut cursor = GroupId(node.next_rel);
        while !cursor.is_null() {
            let group = self.groups.get(cursor.0)?;
            cursor = group.next;
            out.push(group);
        }
        Ok(out)
    }

    /// Returns the group of `rel_type`, inserting one in type order when missing.
    fn find_or_create_group(&self, mut node: NodeRecord, rel_type: TypeId) -> Result<RelationshipGroupRecord> {
        let mut prev: Option<RelationshipGroupRecord> = None;
        let mut cursor = GroupId(node.next_rel);
        while !cursor.is_null() {
            let group = self.groups.get(cursor.0)?;
            if group.rel_type == rel_type {
                return Ok(group);
            }
            if group.rel_type > rel_type {
                break;
            }
            cursor = group.next;
            prev = Some(group);
        }

        let owner = node.id;
        let id = GroupId(self.groups.allocate(|id| RelationshipGroupRecord {
            id: GroupId(id),
            owning_node: owner,
            rel_type,
            first_out: RelId::NULL,
            first_in: RelId::NULL,
            first_loop: RelId::NULL,
            next: cursor,
            in_use: true,
        }));
        match prev {
            Some(mut prev) => {
                prev.next = id;
                self.groups.update(prev)?;
            }
            None => {
                node.next_rel = id.0;
                self.nodes.update(node)?;
            }
        }
        self.groups.get(id.0)
    }

    fn convert_if_dense(&self, node: NodeId) -> Result<()> {
        let mut record = self.nodes.get(node.0)?;
        if record.dense {
            return Ok(());
        }
        let mut chain = Vec::new();
        let mut cursor = RelId(record.next_rel);
        while !cursor.is_null() {
            let rel = self.relationships.get(cursor.0)?;
            cursor = chain_link(&rel, node)?;
            chain.push(rel);
        }
        if chain.len() < self.options.dense_node_threshold {
            return Ok(());
        }

        record.dense = true;
        record.next_rel = GroupId::NULL.0;
        self.nodes.update(record)?;
        // Prepending in reverse keeps each group chain in the sparse order.
        for mut rel in chain.into_iter().rev() {
            let group_chain = GroupChain::for_endpoints(rel.is_loop(), rel.first_node == node);
            let owner = self.nodes.get(node.0)?;
            let group = self.find_or_create_group(owner, rel.rel_type)?;
            rel.set_next_rel_for(node, group_chain.chain_start(&group));
            let id = rel.id;
            self.relationships.update(rel)?;
            self.publish(LinkSlot::Group(group.id, group_chain), id)?;
        }
        debug!(node = node.0, threshold = self.options.dense_node_threshold, "store.dense.converted");
        Ok(())
    }

    // ---- reads ----

    /// Chain head of `node`, ready to initialise a [`NodeRelationshipCursor`].
    pub fn node_source(&self, node: NodeId) -> Result<RelationshipSource> {
        let record = self.nodes.get(node.0)?;
        Ok(RelationshipSource {
            node,
            head: record.chain_head(),
        })
    }

    /// Unpooled chain cursor.
    pub fn relationship_cursor(&self) -> NodeRelationshipCursor {
        NodeRelationshipCursor::new(
            self.relationships.clone(),
            self.groups.clone(),
            Arc::clone(&self.options.metrics),
        )
    }

    /// New cursor over explicit relationship id sequences.
    pub fn iterator_cursor(&self) -> IteratorRelationshipCursor {
        IteratorRelationshipCursor::new(self.relationships.clone(), Arc::clone(&self.options.metrics))
    }

    /// New node store scan cursor.
    pub fn node_scan_cursor(&self) -> NodeScanCursor {
        NodeScanCursor::new(self.nodes.clone(), Arc::clone(&self.options.metrics))
    }

    /// New relationship store scan cursor.
    pub fn relationship_scan_cursor(&self) -> RelationshipScanCursor {
        RelationshipScanCursor::new(self.relationships.clone(), Arc::clone(&self.options.metrics))
    }

    /// Pool of chain cursors sized by [`StoreOptions::cursor_pool_capacity`].
    pub fn relationship_cursor_pool(&self) -> CursorPool<NodeRelationshipCursor> {
        let relationships: Arc<dyn RecordAccessor<RelationshipRecord>> = self.relationships.clone();
        let groups: Arc<dyn RecordAccessor<RelationshipGroupRecord>> = self.groups.clone();
        let metrics = Arc::clone(&self.options.metrics);
        CursorPool::new(
            self.options.cursor_pool_capacity,
            Arc::clone(&metrics),
            move || {
                NodeRelationshipCursor::new(
                    Arc::clone(&relationships),
                    Arc::clone(&groups),
                    Arc::clone(&metrics),
                )
            },
        )
    }

    /// Pool of id-sequence cursors.
    pub fn iterator_cursor_pool(&self) -> CursorPool<IteratorRelationshipCursor> {
        let relationships: Arc<dyn RecordAccessor<RelationshipRecord>> = self.relationships.clone();
        let metrics = Arc::clone(&self.options.metrics);
        CursorPool::new(
            self.options.cursor_pool_capacity,
            Arc::clone(&metrics),
            move || IteratorRelationshipCursor::new(Arc::clone(&relationships), Arc::clone(&metrics)),
        )
    }

    /// Collects the relationships of `node` matching `direction` and `types`.
    pub fn node_relationships(
        &self,
        node: NodeId,
        direction: Direction,
        types: TypeFilter,
        tx: Arc<dyn ReadableTxState>,
    ) -> Result<Vec<RelationshipItem>> {
        let source = self.node_source(node)?;
        let mut cursor = self.relationship_cursor();
        cursor.init(source, direction, types, tx)?;
        let mut out = Vec::new();
        while cursor.next()? {
            out.extend(cursor.get().copied());
        }
        Ok(out)
    }

    /// Single cursor over every node.
    pub fn sequential_node_scan(&self, tx: Arc<dyn ReadableTxState>) -> NodeScanCursor {
        let progression = self.progressions.all_scan::<NodeRecord>(self.nodes.as_ref());
        let mut cursor = self.node_scan_cursor();
        cursor.init(progression, tx);
        cursor
    }

    /// Cursors sharing one parallel progression over the node store, one per worker.
    pub fn parallel_node_scan(&self, tx: Arc<dyn ReadableTxState>, workers: usize) -> Result<Vec<NodeScanCursor>> {
        check_workers(workers)?;
        let progression = self.progressions.parallel_all_scan::<NodeRecord>(self.nodes.as_ref());
        debug!(workers, high_id = self.nodes.high_id(), "scan.parallel.setup");
        Ok((0..workers)
            .map(|_| {
                let mut cursor = self.node_scan_cursor();
                cursor.init(Arc::clone(&progression), Arc::clone(&tx));
                cursor
            })
            .collect())
    }

    /// Single cursor over every relationship.
    pub fn sequential_relationship_scan(&self, tx: Arc<dyn ReadableTxState>) -> RelationshipScanCursor {
        let progression = self
            .progressions
            .all_scan::<RelationshipRecord>(self.relationships.as_ref());
        let mut cursor = self.relationship_scan_cursor();
        cursor.init(progression, tx);
        cursor
    }

    /// Cursors sharing one parallel progression over the relationship store.
    pub fn parallel_relationship_scan(
        &self,
        tx: Arc<dyn ReadableTxState>,
        workers: usize,
    ) -> Result<Vec<RelationshipScanCursor>> {
        check_workers(workers)?;
        let progression = self
            .progressions
            .parallel_all_scan::<RelationshipRecord>(self.relationships.as_ref());
        debug!(workers, high_id = self.relationships.high_id(), "scan.parallel.setup");
        Ok((0..workers)
            .map(|_| {
                let mut cursor = self.relationship_scan_cursor();
                cursor.init(Arc::clone(&progression), Arc::clone(&tx));
                cursor
            })
            .collect())
    }

    /// Scans the node store with `workers` threads and returns each worker's ids.
    pub fn collect_node_ids_parallel(
        &self,
        tx: Arc<dyn ReadableTxState>,
        workers: usize,
    ) -> Result<Vec<Vec<NodeId>>> {
        let cursors = self.parallel_node_scan(tx, workers)?;
        run_workers(cursors, |mut cursor| {
            let mut ids = Vec::new();
            while cursor.next()? {
                ids.extend(cursor.get().map(|item| item.id));
            }
            Ok(ids)
        })
    }
}

fn check_workers(workers: usize) -> Result<()> {
    if workers == 0 {
        return Err(StoreError::IllegalConfiguration(
            "parallel scan needs at least one worker".to_string(),
        ));
    }
    Ok(())
}

fn chain_link(record: &RelationshipRecord, node: NodeId) -> Result<RelId> {
    record.next_rel_for(node).ok_or(StoreError::InvalidRecord {
        node,
        rel: record.id,
        first_node: record.first_node,
        second_node: record.second_node,
    })
}
