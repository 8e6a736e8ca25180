//! Dirty Tracker
//!
//! Tracks which nodes need to recompute before their values can be trusted.
//! Feedback (recursive) nodes go to a separate deferred set: they read values
//! from the previous cycle, so they are never gated on dependency order.

use indexmap::IndexSet;

use crate::graph::NodeId;

/// Dirty state of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirtyState {
    /// The node's value is up-to-date.
    Clean,

    /// The node must recompute, after its dirty predecessors.
    Dirty,

    /// The node must recompute, with no ordering constraint.
    Deferred,
}

/// The immediate and deferred dirty sets.
///
/// Both sets keep insertion order, which becomes the discovery order the
/// scheduler preserves among equally-ready nodes.
#[derive(Debug, Default, Clone)]
pub struct DirtyTracker {
    dirty: IndexSet<NodeId>,
    deferred: IndexSet<NodeId>,
}

impl DirtyTracker {
    /// Create an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a node dirty.
    ///
    /// Recursive nodes land in the deferred set, everything else in the
    /// immediate set. Marking twice is the same as marking once. A node is
    /// moved if its recursion flag changed since it was last marked, so it is
    /// never in both sets.
    ///
    /// Returns `true` if the node was not already in the right set.
    pub fn mark(&mut self, node: NodeId, recursive: bool) -> bool {
        if recursive {
            self.dirty.shift_remove(&node);
            self.deferred.insert(node)
        } else {
            self.deferred.shift_remove(&node);
            self.dirty.insert(node)
        }
    }

    /// Get the dirty state of a node.
    pub fn state(&self, node: NodeId) -> DirtyState {
        if self.dirty.contains(&node) {
            DirtyState::Dirty
        } else if self.deferred.contains(&node) {
            DirtyState::Deferred
        } else {
            DirtyState::Clean
        }
    }

    /// Forget a node entirely (used on removal).
    pub fn purge(&mut self, node: NodeId) {
        self.dirty.shift_remove(&node);
        self.deferred.shift_remove(&node);
    }

    /// The immediate dirty set.
    pub fn dirty(&self) -> &IndexSet<NodeId> {
        &self.dirty
    }

    /// The deferred dirty set.
    pub fn deferred(&self) -> &IndexSet<NodeId> {
        &self.deferred
    }

    /// Check if nothing is pending.
    pub fn is_clean(&self) -> bool {
        self.dirty.is_empty() && self.deferred.is_empty()
    }

    /// Drain both sets, returning `(dirty, deferred)`.
    pub fn take(&mut self) -> (IndexSet<NodeId>, IndexSet<NodeId>) {
        (
            std::mem::take(&mut self.dirty),
            std::mem::take(&mut self.deferred),
        )
    }

    /// Empty both sets.
    pub fn clear(&mut self) {
        self.dirty.clear();
        self.deferred.clear();
    }
}
