use crate::types::{Direction, RelId};

use super::record::RelationshipGroupRecord;

/// One of the three relationship chains held by a relationship group.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum GroupChain {
    /// Relationships starting at the owning node.
    Out,
    /// Relationships ending at the owning node.
    In,
    /// Relationships starting and ending at the owning node.
    Loop,
}

impl GroupChain {
    /// Chains in traversal order.
    pub const ALL: [GroupChain; 3] = [GroupChain::Out, GroupChain::In, GroupChain::Loop];

    /// Head of this chain in `group`.
    pub fn chain_start(self, group: &RelationshipGroupRecord) -> RelId {
        match self {
            GroupChain::Out => group.first_out,
            GroupChain::In => group.first_in,
            GroupChain::Loop => group.first_loop,
        }
    }

    /// Whether relationships in this chain can satisfy a non-`Both` direction.
    pub fn matches_direction(self, direction: Direction) -> bool {
        match self {
            GroupChain::Out => direction == Direction::Outgoing,
            GroupChain::In => direction == Direction::Incoming,
            GroupChain::Loop => true,
        }
    }

    /// Chain a new relationship belongs to, as seen from the owning node.
    pub(crate) fn for_endpoints(loop_rel: bool, owner_is_start: bool) -> Self {
        if loop_rel {
            GroupChain::Loop
        } else if owner_is_start {
            GroupChain::Out
        } else {
            GroupChain::In
        }
    }

    pub(crate) fn head_mut(self, group: &mut RelationshipGroupRecord) -> &mut RelId {
        match self {
            GroupChain::Out => &mut group.first_out,
            GroupChain::In => &mut group.first_in,
            GroupChain::Loop => &mut group.first_loop,
        }
    }
}
