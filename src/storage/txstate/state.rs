use rustc_hash::{FxHashMap, FxHashSet};

use crate::storage::cursor::RelationshipItem;
use crate::types::{
    Direction, LabelId, NodeId, PropId, RelId, Result, StoreError, TypeFilter, TypeId,
};

use super::{DiffSet, ReadableTxState};

/// Property changes of one entity. Values are opaque to the traversal core.
#[derive(Debug, Clone, Default)]
pub struct PropertyDiff {
    set: FxHashMap<PropId, Vec<u8>>,
    removed: FxHashSet<PropId>,
}

impl PropertyDiff {
    /// Sets `prop` to `value`.
    pub fn set(&mut self, prop: PropId, value: Vec<u8>) {
        self.removed.remove(&prop);
        self.set.insert(prop, value);
    }

    /// Marks `prop` removed.
    pub fn remove(&mut self, prop: PropId) {
        self.set.remove(&prop);
        self.removed.insert(prop);
    }

    /// Value written in this transaction.
    pub fn get(&self, prop: PropId) -> Option<&[u8]> {
        self.set.get(&prop).map(Vec::as_slice)
    }

    /// Whether `prop` is removed.
    pub fn is_removed(&self, prop: PropId) -> bool {
        self.removed.contains(&prop)
    }

    /// Whether no property changed.
    pub fn is_empty(&self) -> bool {
        self.set.is_empty() && self.removed.is_empty()
    }
}

/// Pending changes for one node.
#[derive(Debug, Clone, Default)]
pub struct NodeState {
    labels: DiffSet<LabelId>,
    properties: PropertyDiff,
    added_out: Vec<(RelId, TypeId)>,
    added_in: Vec<(RelId, TypeId)>,
    added_loop: Vec<(RelId, TypeId)>,
}

impl NodeState {
    /// Labels added and removed in this transaction.
    pub fn labels(&self) -> &DiffSet<LabelId> {
        &self.labels
    }

    /// Property changes.
    pub fn properties(&self) -> &PropertyDiff {
        &self.properties
    }

    fn added_relationships(&self, direction: Direction, types: &TypeFilter, out: &mut Vec<RelId>) {
        let start = out.len();
        let lists: [&[(RelId, TypeId)]; 3] = match direction {
            Direction::Outgoing => [self.added_out.as_slice(), self.added_loop.as_slice(), &[]],
            Direction::Incoming => [self.added_in.as_slice(), self.added_loop.as_slice(), &[]],
            Direction::Both => [
                self.added_out.as_slice(),
                self.added_in.as_slice(),
                self.added_loop.as_slice(),
            ],
        };
        for (rel, ty) in lists.into_iter().flatten() {
            if types.allows(*ty) {
                out.push(*rel);
            }
        }
        out[start..].sort_unstable();
    }

    fn forget_relationship(&mut self, rel: RelId) {
        for list in [&mut self.added_out, &mut self.added_in, &mut self.added_loop] {
            list.retain(|(id, _)| *id != rel);
        }
    }
}

/// Pending changes for one relationship.
#[derive(Debug, Clone)]
pub struct RelationshipState {
    /// Relationship id.
    pub id: RelId,
    /// Relationship type.
    pub rel_type: TypeId,
    /// Start node.
    pub start_node: NodeId,
    /// End node.
    pub end_node: NodeId,
    properties: PropertyDiff,
}

impl RelationshipState {
    /// Property changes.
    pub fn properties(&self) -> &PropertyDiff {
        &self.properties
    }
}

/// Populated transaction-state overlay.
///
/// Mutated only by the owning transaction; once shared with cursors it must not
/// change until every scan reading it has finished.
#[derive(Debug, Default)]
pub struct TxState {
    nodes: DiffSet<NodeId>,
    relationships: DiffSet<RelId>,
    node_states: FxHashMap<NodeId, NodeState>,
    rel_states: FxHashMap<RelId, RelationshipState>,
    // Committed relationships get no RelationshipState until a property changes,
    // so added endpoints are tracked here.
    added_rel_items: FxHashMap<RelId, RelationshipItem>,
}

impl TxState {
    /// Creates an empty transaction state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a node creation. Fails if `node` was already created or deleted in this transaction.
    pub fn node_do_create(&mut self, node: NodeId) -> Result<()> {
        if self.nodes.is_added(node) {
            return Err(StoreError::TxStateViolation(format!(
                "node {node} created twice in one transaction"
            )));
        }
        if !self.nodes.add(node) {
            return Err(StoreError::TxStateViolation(format!(
                "node {node} was deleted in this transaction and cannot be created again"
            )));
        }
        Ok(())
    }

    /// Records a node deletion, dropping any pending changes to it.
    pub fn node_do_delete(&mut self, node: NodeId) {
        self.nodes.remove(node);
        self.node_states.remove(&node);
    }

    /// Records a relationship creation under the same rules as [`TxState::node_do_create`].
    pub fn relationship_do_create(
        &mut self,
        rel: RelId,
        rel_type: TypeId,
        start_node: NodeId,
        end_node: NodeId,
    ) -> Result<()> {
        if self.relationships.is_added(rel) {
            return Err(StoreError::TxStateViolation(format!(
                "relationship {rel} created twice in one transaction"
            )));
        }
        if !self.relationships.add(rel) {
            return Err(StoreError::TxStateViolation(format!(
                "relationship {rel} was deleted in this transaction and cannot be created again"
            )));
        }
        let entry = (rel, rel_type);
        if start_node == end_node {
            self.node_state_mut(start_node).added_loop.push(entry);
        } else {
            self.node_state_mut(start_node).added_out.push(entry);
            self.node_state_mut(end_node).added_in.push(entry);
        }
        self.added_rel_items.insert(
            rel,
            RelationshipItem {
                id: rel,
                rel_type,
                start_node,
                end_node,
            },
        );
        Ok(())
    }

    /// Records a relationship deletion.
    pub fn relationship_do_delete(&mut self, rel: RelId) {
        self.relationships.remove(rel);
        self.rel_states.remove(&rel);
        if let Some(item) = self.added_rel_items.remove(&rel) {
            for node in [item.start_node, item.end_node] {
                if let Some(state) = self.node_states.get_mut(&node) {
                    state.forget_relationship(rel);
                }
            }
        }
    }

    /// Adds `label` to `node`; re-adding a removed label cancels the removal.
    pub fn node_do_add_label(&mut self, node: NodeId, label: LabelId) {
        let labels = &mut self.node_state_mut(node).labels;
        if !labels.cancel_removal(label) {
            labels.add(label);
        }
    }

    /// Removes `label` from `node`.
    pub fn node_do_remove_label(&mut self, node: NodeId, label: LabelId) {
        self.node_state_mut(node).labels.remove(label);
    }

    /// Sets property `prop` on `node`.
    pub fn node_do_set_property(&mut self, node: NodeId, prop: PropId, value: Vec<u8>) {
        self.node_state_mut(node).properties.set(prop, value);
    }

    /// Removes property `prop` from `node`.
    pub fn node_do_remove_property(&mut self, node: NodeId, prop: PropId) {
        self.node_state_mut(node).properties.remove(prop);
    }

    /// Records a property write; `item` describes the relationship's endpoints.
    pub fn relationship_do_set_property(
        &mut self,
        item: RelationshipItem,
        prop: PropId,
        value: Vec<u8>,
    ) {
        self.rel_states
            .entry(item.id)
            .or_insert_with(|| RelationshipState {
                id: item.id,
                rel_type: item.rel_type,
                start_node: item.start_node,
                end_node: item.end_node,
                properties: PropertyDiff::default(),
            })
            .properties
            .set(prop, value);
    }

    fn node_state_mut(&mut self, node: NodeId) -> &mut NodeState {
        self.node_states.entry(node).or_default()
    }
}

impl ReadableTxState for TxState {
    fn has_changes(&self) -> bool {
        self.has_data_changes()
            || !self.rel_states.is_empty()
            || self
                .node_states
                .values()
                .any(|state| !state.labels.is_empty() || !state.properties.is_empty())
    }

    fn has_data_changes(&self) -> bool {
        !self.nodes.is_empty() || !self.relationships.is_empty()
    }

    fn added_and_removed_nodes(&self) -> &DiffSet<NodeId> {
        &self.nodes
    }

    fn added_and_removed_relationships(&self) -> &DiffSet<RelId> {
        &self.relationships
    }

    fn node_is_added_in_this_tx(&self, node: NodeId) -> bool {
        self.nodes.is_added(node)
    }

    fn node_is_deleted_in_this_tx(&self, node: NodeId) -> bool {
        self.nodes.is_removed(node)
    }

    fn relationship_is_added_in_this_tx(&self, rel: RelId) -> bool {
        self.relationships.is_added(rel)
    }

    fn relationship_is_deleted_in_this_tx(&self, rel: RelId) -> bool {
        self.relationships.is_removed(rel)
    }

    fn node_added_relationships(
        &self,
        node: NodeId,
        direction: Direction,
        types: &TypeFilter,
        out: &mut Vec<RelId>,
    ) {
        if let Some(state) = self.node_states.get(&node) {
            state.added_relationships(direction, types, out);
        }
    }

    fn added_relationship(&self, rel: RelId) -> Option<RelationshipItem> {
        if !self.relationships.is_added(rel) {
            return None;
        }
        self.added_rel_items.get(&rel).copied()
    }

    fn node_state(&self, node: NodeId) -> Option<&NodeState> {
        self.node_states.get(&node)
    }

    fn relationship_state(&self, rel: RelId) -> Option<&RelationshipState> {
        self.rel_states.get(&rel)
    }

    fn augment_nodes<'a>(
        &'a self,
        committed: Box<dyn Iterator<Item = NodeId> + 'a>,
    ) -> Box<dyn Iterator<Item = NodeId> + 'a> {
        Box::new(self.nodes.augment(committed))
    }

    fn augment_relationships<'a>(
        &'a self,
        committed: Box<dyn Iterator<Item = RelId> + 'a>,
    ) -> Box<dyn Iterator<Item = RelId> + 'a> {
        Box::new(self.relationships.augment(committed))
    }
}
