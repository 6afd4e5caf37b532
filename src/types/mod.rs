#![forbid(unsafe_code)]
//! Identifier newtypes, traversal direction and the crate-wide error type.

use std::fmt;
use std::path::PathBuf;

use smallvec::SmallVec;

/// Identifier of a node record.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Default)]
pub struct NodeId(pub u64);
/// Identifier of a relationship record.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Default)]
pub struct RelId(pub u64);
/// Identifier of a relationship group record.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Default)]
pub struct GroupId(pub u64);
/// Relationship type token.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Default)]
pub struct TypeId(pub u32);
/// Node label token.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct LabelId(pub u32);
/// Property key token.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct PropId(pub u32);

/// Raw value of the null chain reference.
pub const NULL_REF: u64 = u64::MAX;

impl RelId {
    /// End-of-chain sentinel.
    pub const NULL: RelId = RelId(NULL_REF);

    /// Returns true when this reference terminates a chain.
    pub const fn is_null(self) -> bool {
        self.0 == NULL_REF
    }
}

impl GroupId {
    /// End-of-group-chain sentinel.
    pub const NULL: GroupId = GroupId(NULL_REF);

    /// Returns true when this reference terminates a group chain.
    pub const fn is_null(self) -> bool {
        self.0 == NULL_REF
    }
}

macro_rules! display_id {
    ($($ty:ident),*) => {
        $(
            impl fmt::Display for $ty {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    write!(f, "{}", self.0)
                }
            }
        )*
    };
}

display_id!(NodeId, RelId, GroupId, TypeId, LabelId, PropId);

impl From<u32> for TypeId {
    fn from(value: u32) -> Self {
        TypeId(value)
    }
}

impl From<TypeId> for u32 {
    fn from(value: TypeId) -> Self {
        value.0
    }
}

/// Direction of relationships relative to the node being traversed.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum Direction {
    /// Relationships whose start node is the traversed node.
    Outgoing,
    /// Relationships whose end node is the traversed node.
    Incoming,
    /// Every relationship touching the traversed node.
    Both,
}

impl Direction {
    /// Wire value used by callers that carry directions as raw bytes.
    pub const fn as_u8(self) -> u8 {
        match self {
            Direction::Outgoing => 0,
            Direction::Incoming => 1,
            Direction::Both => 2,
        }
    }

    /// Applies the direction filter to a relationship's endpoints as seen from `node`.
    pub fn matches(self, node: NodeId, start: NodeId, end: NodeId) -> bool {
        match self {
            Direction::Outgoing => start == node,
            Direction::Incoming => end == node,
            Direction::Both => true,
        }
    }
}

impl TryFrom<u8> for Direction {
    type Error = StoreError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(Direction::Outgoing),
            1 => Ok(Direction::Incoming),
            2 => Ok(Direction::Both),
            other => Err(StoreError::IllegalConfiguration(format!(
                "unknown direction: {other}"
            ))),
        }
    }
}

/// Predicate over relationship types.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub enum TypeFilter {
    /// Admits every type.
    #[default]
    Any,
    /// Admits only the listed types.
    Only(SmallVec<[TypeId; 4]>),
}

impl TypeFilter {
    /// Builds a filter admitting exactly `types`.
    pub fn only(types: &[TypeId]) -> Self {
        TypeFilter::Only(types.iter().copied().collect())
    }

    /// Tests a relationship type against the filter.
    pub fn allows(&self, ty: TypeId) -> bool {
        match self {
            TypeFilter::Any => true,
            TypeFilter::Only(types) => types.contains(&ty),
        }
    }
}

/// Errors raised while loading configuration.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// Configuration file could not be read.
    #[error("failed to read config {}: {source}", .path.display())]
    Read {
        /// Path that failed to load.
        path: PathBuf,
        /// Underlying I/O failure.
        source: std::io::Error,
    },
    /// Configuration file is not valid TOML for the expected shape.
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    /// A value parsed but is outside its permitted range.
    #[error("invalid config value for {field}: {reason}")]
    Invalid {
        /// Offending field.
        field: &'static str,
        /// Why the value was rejected.
        reason: &'static str,
    },
}

/// Errors surfaced by record stores, cursors, transaction state and scans.
#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    /// A relationship in a node's chain has neither endpoint equal to that node.
    #[error(
        "while loading relationships for node {node} relationship {rel} was encountered with start node {first_node} and end node {second_node}, neither of which is the node being loaded"
    )]
    InvalidRecord {
        /// Node whose chain was being walked.
        node: NodeId,
        /// Offending relationship record.
        rel: RelId,
        /// Recorded start node.
        first_node: NodeId,
        /// Recorded end node.
        second_node: NodeId,
    },
    /// A checked load addressed an id outside the store.
    #[error("invalid {store} record id {id}")]
    InvalidRecordId {
        /// Store name.
        store: &'static str,
        /// Requested id.
        id: u64,
    },
    /// A record that must exist is not in use.
    #[error("{store} record {id} not found")]
    NotFound {
        /// Store name.
        store: &'static str,
        /// Requested id.
        id: u64,
    },
    /// Caller supplied a value the core cannot interpret.
    #[error("illegal configuration: {0}")]
    IllegalConfiguration(String),
    /// Transaction-state mutation would break the never-reuse invariant.
    #[error("transaction state violation: {0}")]
    TxStateViolation(String),
    /// Node still has relationships and cannot be deleted.
    #[error("node {0} still has relationships")]
    NodeHasRelationships(NodeId),
    /// A cursor was used after its page resources were released.
    #[error("cursor used after dispose")]
    CursorDisposed,
    /// A scan worker panicked.
    #[error("scan worker panicked: {0}")]
    WorkerPanicked(String),
    /// Several scan workers failed; every cause is kept.
    #[error("{} scan workers failed: {}", .0.len(), join_causes(.0))]
    Aggregate(Vec<StoreError>),
    /// Configuration failure.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl StoreError {
    /// Returns the individual failures, flattening an aggregate.
    pub fn causes(&self) -> Vec<&StoreError> {
        match self {
            StoreError::Aggregate(inner) => inner.iter().flat_map(StoreError::causes).collect(),
            other => vec![other],
        }
    }

    /// Returns true for structural-integrity failures.
    pub fn is_corruption(&self) -> bool {
        matches!(self, StoreError::InvalidRecord { .. })
    }
}

fn join_causes(causes: &[StoreError]) -> String {
    causes
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, StoreError>;
