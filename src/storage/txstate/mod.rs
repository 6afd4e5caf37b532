//! Transaction-state overlay consumed by cursors.
//!
//! Cursors read committed records from the stores and reconcile them with an
//! immutable [`ReadableTxState`] snapshot: entities deleted in the transaction
//! are hidden and entities created in it are appended. [`EmptyTxState`] is the
//! neutral overlay and is accepted anywhere a populated [`TxState`] is.

use std::sync::Arc;

use crate::storage::cursor::RelationshipItem;
use crate::types::{Direction, NodeId, RelId, TypeFilter};

mod diffset;
mod state;

pub use diffset::DiffSet;
pub use state::{NodeState, PropertyDiff, RelationshipState, TxState};

/// Read-only view of one transaction's pending changes.
pub trait ReadableTxState: Send + Sync {
    /// Whether the transaction has changed anything at all.
    fn has_changes(&self) -> bool;

    /// Whether the transaction has changed nodes or relationships.
    fn has_data_changes(&self) -> bool;

    /// Nodes created and deleted in this transaction.
    fn added_and_removed_nodes(&self) -> &DiffSet<NodeId>;

    /// Relationships created and deleted in this transaction.
    fn added_and_removed_relationships(&self) -> &DiffSet<RelId>;

    /// Whether `node` was created in this transaction.
    fn node_is_added_in_this_tx(&self, node: NodeId) -> bool;

    /// Whether `node` was deleted in this transaction.
    fn node_is_deleted_in_this_tx(&self, node: NodeId) -> bool;

    /// Whether `rel` was created in this transaction.
    fn relationship_is_added_in_this_tx(&self, rel: RelId) -> bool;

    /// Whether `rel` was deleted in this transaction.
    fn relationship_is_deleted_in_this_tx(&self, rel: RelId) -> bool;

    /// Appends, in ascending id order, the relationships added to `node` that
    /// satisfy `direction` and `types`.
    fn node_added_relationships(
        &self,
        node: NodeId,
        direction: Direction,
        types: &TypeFilter,
        out: &mut Vec<RelId>,
    );

    /// Endpoints and type of a relationship added in this transaction.
    fn added_relationship(&self, rel: RelId) -> Option<RelationshipItem>;

    /// Label and property changes for `node`, if any.
    fn node_state(&self, node: NodeId) -> Option<&NodeState>;

    /// Property changes for `rel`, if any.
    fn relationship_state(&self, rel: RelId) -> Option<&RelationshipState>;

    /// Merges the transaction's node changes into a committed id sequence.
    fn augment_nodes<'a>(
        &'a self,
        committed: Box<dyn Iterator<Item = NodeId> + 'a>,
    ) -> Box<dyn Iterator<Item = NodeId> + 'a>;

    /// Merges the transaction's relationship changes into a committed id sequence.
    fn augment_relationships<'a>(
        &'a self,
        committed: Box<dyn Iterator<Item = RelId> + 'a>,
    ) -> Box<dyn Iterator<Item = RelId> + 'a>;
}

/// Overlay of a transaction without changes.
#[derive(Debug, Default)]
pub struct EmptyTxState {
    nodes: DiffSet<NodeId>,
    relationships: DiffSet<RelId>,
}

impl EmptyTxState {
    /// Creates an overlay without changes.
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared instance suitable for passing to cursors.
    pub fn shared() -> Arc<dyn ReadableTxState> {
        Arc::new(Self::new())
    }
}

impl ReadableTxState for EmptyTxState {
    fn has_changes(&self) -> bool {
        false
    }

    fn has_data_changes(&self) -> bool {
        false
    }

    fn added_and_removed_nodes(&self) -> &DiffSet<NodeId> {
        &self.nodes
    }

    fn added_and_removed_relationships(&self) -> &DiffSet<RelId> {
        &self.relationships
    }

    fn node_is_added_in_this_tx(&self, _node: NodeId) -> bool {
        false
    }

    fn node_is_deleted_in_this_tx(&self, _node: NodeId) -> bool {
        false
    }

    fn relationship_is_added_in_this_tx(&self, _rel: RelId) -> bool {
        false
    }

    fn relationship_is_deleted_in_this_tx(&self, _rel: RelId) -> bool {
        false
    }

    fn node_added_relationships(
        &self,
        _node: NodeId,
        _direction: Direction,
        _types: &TypeFilter,
        _out: &mut Vec<RelId>,
    ) {
    }

    fn added_relationship(&self, _rel: RelId) -> Option<RelationshipItem> {
        None
    }

    fn node_state(&self, _node: NodeId) -> Option<&NodeState> {
        None
    }

    fn relationship_state(&self, _rel: RelId) -> Option<&RelationshipState> {
        None
    }

    fn augment_nodes<'a>(
        &'a self,
        committed: Box<dyn Iterator<Item = NodeId> + 'a>,
    ) -> Box<dyn Iterator<Item = NodeId> + 'a> {
        committed
    }

    fn augment_relationships<'a>(
        &'a self,
        committed: Box<dyn Iterator<Item = RelId> + 'a>,
    ) -> Box<dyn Iterator<Item = RelId> + 'a> {
        committed
    }
}
