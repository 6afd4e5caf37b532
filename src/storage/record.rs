use crate::types::{GroupId, NodeId, RelId, TypeId, NULL_REF};

/// How a record load treats ids and unused records.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum RecordLoad {
    /// Fail when the id is structurally invalid for the store.
    Check,
    /// Best-effort load regardless of id validity or in-use status.
    Force,
}

/// Fixed-size record held in a record store.
pub trait Record: Clone + Send + Sync + 'static {
    /// Human readable store name used in errors and logs.
    const STORE: &'static str;

    /// Creates a cleared, not-in-use record carrying `id`.
    fn new_unused(id: u64) -> Self;

    /// Raw record id.
    fn raw_id(&self) -> u64;

    /// Whether the record is live.
    fn in_use(&self) -> bool;

    /// Marks the record as deleted without touching any other field.
    fn mark_unused(&mut self);
}

/// Start of a node's relationship chain.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ChainHead {
    /// Single linked relationship chain.
    Sparse(RelId),
    /// Linked list of per-type relationship groups.
    Dense(GroupId),
}

/// Node record: density flag plus the head of its relationship chain.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct NodeRecord {
    /// Record id.
    pub id: NodeId,
    /// Whether the record holds a live node.
    pub in_use: bool,
    /// Whether the chain head is a group id.
    pub dense: bool,
    /// First relationship id for sparse nodes, first group id for dense ones.
    pub next_rel: u64,
}

impl NodeRecord {
    /// Interprets `next_rel` according to the density flag.
    pub fn chain_head(&self) -> ChainHead {
        if self.dense {
            ChainHead::Dense(GroupId(self.next_rel))
        } else {
            ChainHead::Sparse(RelId(self.next_rel))
        }
    }
}

impl Record for NodeRecord {
    const STORE: &'static str = "node";

    fn new_unused(id: u64) -> Self {
        Self {
            id: NodeId(id),
            in_use: false,
            dense: false,
            next_rel: NULL_REF,
        }
    }

    fn raw_id(&self) -> u64 {
        self.id.0
    }

    fn in_use(&self) -> bool {
        self.in_use
    }

    fn mark_unused(&mut self) {
        self.in_use = false;
    }
}

/// A relationship linked into the chains of both of its endpoints.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct RelationshipRecord {
    /// Record id.
    pub id: RelId,
    /// Start node.
    pub first_node: NodeId,
    /// End node.
    pub second_node: NodeId,
    /// Relationship type.
    pub rel_type: TypeId,
    /// Next relationship in the start node's chain.
    pub first_next_rel: RelId,
    /// Next relationship in the end node's chain.
    pub second_next_rel: RelId,
    /// Whether the record holds a live relationship.
    pub in_use: bool,
}

impl RelationshipRecord {
    /// Chain link to follow when walking `node`'s chain, or `None` when the
    /// record does not belong to that node.
    pub fn next_rel_for(&self, node: NodeId) -> Option<RelId> {
        if self.first_node == node {
            Some(self.first_next_rel)
        } else if self.second_node == node {
            Some(self.second_next_rel)
        } else {
            None
        }
    }

    /// Rewrites the link used by `node`'s chain. Returns false when the record
    /// does not belong to `node`.
    pub(crate) fn set_next_rel_for(&mut self, node: NodeId, next: RelId) -> bool {
        let mut touched = false;
        if self.first_node == node {
            self.first_next_rel = next;
            touched = true;
        }
        if self.second_node == node {
            self.second_next_rel = next;
            touched = true;
        }
        touched
    }

    /// Whether both endpoints are the same node.
    pub fn is_loop(&self) -> bool {
        self.first_node == self.second_node
    }
}

impl Record for RelationshipRecord {
    const STORE: &'static str = "relationship";

    fn new_unused(id: u64) -> Self {
        Self {
            id: RelId(id),
            first_node: NodeId(NULL_REF),
            second_node: NodeId(NULL_REF),
            rel_type: TypeId::default(),
            first_next_rel: RelId::NULL,
            second_next_rel: RelId::NULL,
            in_use: false,
        }
    }

    fn raw_id(&self) -> u64 {
        self.id.0
    }

    fn in_use(&self) -> bool {
        self.in_use
    }

    fn mark_unused(&mut self) {
        self.in_use = false;
    }
}

/// Per-(node, type) record holding the OUT, IN and LOOP chain heads of a dense node.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct RelationshipGroupRecord {
    /// Record id.
    pub id: GroupId,
    /// Dense node owning the group.
    pub owning_node: NodeId,
    /// Relationship type shared by the group's chains.
    pub rel_type: TypeId,
    /// Head of the outgoing chain.
    pub first_out: RelId,
    /// Head of the incoming chain.
    pub first_in: RelId,
    /// Head of the loop chain.
    pub first_loop: RelId,
    /// Next group, in ascending type order.
    pub next: GroupId,
    /// Whether the group is live.
    pub in_use: bool,
}

impl Record for RelationshipGroupRecord {
    const STORE: &'static str = "relationship_group";

    fn new_unused(id: u64) -> Self {
        Self {
            id: GroupId(id),
            owning_node: NodeId(NULL_REF),
            rel_type: TypeId::default(),
            first_out: RelId::NULL,
            first_in: RelId::NULL,
            first_loop: RelId::NULL,
            next: GroupId::NULL,
            in_use: false,
        }
    }

    fn raw_id(&self) -> u64 {
        self.id.0
    }

    fn in_use(&self) -> bool {
        self.in_use
    }

    fn mark_unused(&mut self) {
        self.in_use = false;
    }
}
