//! Friend-request state machine.
//!
//! Requests are directed edges stored on the *receiver* (`pending_inbound`);
//! friendship is a pair of mirrored edges, one in each identity's `friends`.
//! Every transition here is pure: it takes the [`Edges`] of the identities
//! involved, validates the current [`RelationshipState`], and mutates the
//! edge sets in memory. The store is responsible for loading and persisting
//! both sides inside one transaction.

use serde::{Deserialize, Serialize};

use crate::error::RelationshipError;
use crate::types::UserId;

/// Relationship edges owned by a single identity, in insertion order.
///
/// Mutators keep set semantics (no duplicates) and never let the owner
/// appear in its own sets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Edges {
    owner: UserId,
    friends: Vec<UserId>,
    pending_inbound: Vec<UserId>,
}

impl Edges {
    pub fn empty(owner: UserId) -> Self {
        Self {
            owner,
            friends: Vec::new(),
            pending_inbound: Vec::new(),
        }
    }

    /// Build from stored rows, dropping duplicates and self references.
    pub fn from_parts(
        owner: UserId,
        friends: impl IntoIterator<Item = UserId>,
        pending_inbound: impl IntoIterator<Item = UserId>,
    ) -> Self {
        let mut edges = Self::empty(owner);
        for id in friends {
            edges.insert_friend(id);
        }
        for id in pending_inbound {
            edges.insert_pending(id);
        }
        edges
    }

    pub fn owner(&self) -> UserId {
        self.owner
    }

    pub fn friends(&self) -> &[UserId] {
        &self.friends
    }

    pub fn pending_inbound(&self) -> &[UserId] {
        &self.pending_inbound
    }

    pub fn is_friend(&self, id: UserId) -> bool {
        self.friends.contains(&id)
    }

    pub fn has_pending_from(&self, id: UserId) -> bool {
        self.pending_inbound.contains(&id)
    }

    /// Returns `true` if the set changed.
    pub fn insert_friend(&mut self, id: UserId) -> bool {
        if id == self.owner || self.friends.contains(&id) {
            return false;
        }
        self.friends.push(id);
        true
    }

    pub fn insert_pending(&mut self, id: UserId) -> bool {
        if id == self.owner || self.pending_inbound.contains(&id) {
            return false;
        }
        self.pending_inbound.push(id);
        true
    }

    pub fn remove_pending(&mut self, id: UserId) -> bool {
        let before = self.pending_inbound.len();
        self.pending_inbound.retain(|p| *p != id);
        self.pending_inbound.len() != before
    }

    /// Row-level changes needed to turn `self` into `newer`.
    pub fn diff(&self, newer: &Edges) -> EdgeDiff {
        EdgeDiff {
            friends_added: added(&self.friends, &newer.friends),
            friends_removed: added(&newer.friends, &self.friends),
            pending_added: added(&self.pending_inbound, &newer.pending_inbound),
            pending_removed: added(&newer.pending_inbound, &self.pending_inbound),
        }
    }
}

fn added(old: &[UserId], new: &[UserId]) -> Vec<UserId> {
    new.iter().filter(|id| !old.contains(id)).copied().collect()
}

/// Row inserts/deletes produced by [`Edges::diff`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EdgeDiff {
    pub friends_added: Vec<UserId>,
    pub friends_removed: Vec<UserId>,
    pub pending_added: Vec<UserId>,
    pub pending_removed: Vec<UserId>,
}

impl EdgeDiff {
    pub fn is_empty(&self) -> bool {
        self.friends_added.is_empty()
            && self.friends_removed.is_empty()
            && self.pending_added.is_empty()
            && self.pending_removed.is_empty()
    }
}

/// State of the relationship between two identities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum RelationshipState {
    None,
    Pending { from: UserId, to: UserId },
    Friends,
    /// Friendship recorded on one side only. Never produced by these
    /// transitions; [`accept_request`] repairs it.
    HalfLinked,
}

pub fn state_between(a: &Edges, b: &Edges) -> RelationshipState {
    match (a.is_friend(b.owner), b.is_friend(a.owner)) {
        (true, true) => return RelationshipState::Friends,
        (true, false) | (false, true) => return RelationshipState::HalfLinked,
        (false, false) => {}
    }
    if b.has_pending_from(a.owner) {
        RelationshipState::Pending {
            from: a.owner,
            to: b.owner,
        }
    } else if a.has_pending_from(b.owner) {
        RelationshipState::Pending {
            from: b.owner,
            to: a.owner,
        }
    } else {
        RelationshipState::None
    }
}

/// `NONE -> PENDING(sender -> receiver)`.
pub fn send_request(sender: &Edges, receiver: &mut Edges) -> Result<(), RelationshipError> {
    if sender.owner == receiver.owner {
        return Err(RelationshipError::SelfRequest);
    }
    match state_between(sender, receiver) {
        RelationshipState::Friends | RelationshipState::HalfLinked => {
            Err(RelationshipError::AlreadyFriends)
        }
        RelationshipState::Pending { from, .. } if from == sender.owner => {
            Err(RelationshipError::AlreadyRequested)
        }
        RelationshipState::Pending { .. } => Err(RelationshipError::ReversePending),
        RelationshipState::None => {
            receiver.insert_pending(sender.owner);
            Ok(())
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcceptOutcome {
    /// The pending request was consumed and friendship recorded.
    Accepted,
    /// Both sides were already friends; nothing changed.
    AlreadyFriends,
    /// One half of the friendship was missing and has been restored.
    Repaired,
}

/// `PENDING(sender -> receiver) -> FRIENDS`.
///
/// A retry after the pending edge is gone still succeeds when the pair is
/// (partially) friends, so the call is safe to repeat.
pub fn accept_request(
    sender: &mut Edges,
    receiver: &mut Edges,
) -> Result<AcceptOutcome, RelationshipError> {
    if sender.owner == receiver.owner {
        return Err(RelationshipError::NoSuchRequest);
    }
    if receiver.remove_pending(sender.owner) {
        sender.remove_pending(receiver.owner);
        receiver.insert_friend(sender.owner);
        sender.insert_friend(receiver.owner);
        return Ok(AcceptOutcome::Accepted);
    }
    match state_between(sender, receiver) {
        RelationshipState::Friends => Ok(AcceptOutcome::AlreadyFriends),
        RelationshipState::HalfLinked => {
            receiver.insert_friend(sender.owner);
            sender.insert_friend(receiver.owner);
            Ok(AcceptOutcome::Repaired)
        }
        _ => Err(RelationshipError::NoSuchRequest),
    }
}

/// Drop pending requests in both directions. Returns `true` if anything was
/// removed; removing nothing is not an error.
pub fn cancel_request(a: &mut Edges, b: &mut Edges) -> bool {
    let from_b = a.remove_pending(b.owner);
    let from_a = b.remove_pending(a.owner);
    from_a || from_b
}
