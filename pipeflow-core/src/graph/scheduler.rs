//! Topological Scheduler
//!
//! The scheduler determines the order in which nodes run. It ensures that
//! every non-recursive node runs after the non-recursive nodes feeding it.
//!
//! # Algorithm
//!
//! Nodes are ordered in sweeps rather than one at a time:
//!
//! 1. Partition the requested nodes into recursive and non-recursive ones
//! 2. Scan the pending non-recursive nodes; a node is ready when none of its
//!    linked inputs comes from a node that is still pending
//! 3. Move every ready node of the sweep to the output, in discovery order
//! 4. Repeat until nothing is pending
//! 5. Append the recursive nodes in graph-storage order
//!
//! Readiness only looks at pending nodes, so an input coming from a node
//! outside the requested set never blocks. That is what lets the Update Pass
//! schedule just the dirty part of the graph.
//!
//! A sweep that makes no progress means the pending nodes form a cycle that
//! does not pass through a recursive node. That is a modeling error and is
//! reported instead of being broken arbitrarily.

use std::collections::HashSet;

use indexmap::IndexSet;
use tracing::trace;

use super::node::NodeId;
use super::store::Graph;

/// Default upper bound on sweeps per scheduling attempt.
pub const DEFAULT_MAX_SWEEPS: usize = 10_000;

/// Error when no valid order exists.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScheduleError {
    /// The remaining nodes depend on each other without a feedback node.
    #[error("dependency cycle among {} non-recursive nodes: {nodes:?}", nodes.len())]
    Cycle {
        /// Nodes that could not be ordered, in discovery order.
        nodes: Vec<NodeId>,
        /// Sweeps completed before the stall.
        sweeps: usize,
    },

    /// The sweep cap was reached with nodes still pending.
    #[error("scheduling gave up after {cap} sweeps with {pending} nodes pending")]
    IterationCap {
        /// Configured cap.
        cap: usize,
        /// Nodes left unordered.
        pending: usize,
    },
}

/// Orders nodes by dependency readiness.
#[derive(Debug, Clone)]
pub struct Scheduler {
    max_sweeps: usize,
}

impl Scheduler {
    /// Create a scheduler with the given sweep cap.
    pub fn new(max_sweeps: usize) -> Self {
        Self {
            max_sweeps: max_sweeps.max(1),
        }
    }

    /// The configured sweep cap.
    pub fn max_sweeps(&self) -> usize {
        self.max_sweeps
    }

    /// Order every node in the graph.
    pub fn order_all<G: 'static>(&self, graph: &Graph<G>) -> Result<Vec<NodeId>, ScheduleError> {
        let members: IndexSet<NodeId> = graph.node_ids().collect();
        self.order(graph, &members)
    }

    /// Order a subset of the graph.
    ///
    /// Non-recursive members come first in dependency order, followed by the
    /// recursive members in graph-storage order. IDs that are not in the graph
    /// are ignored.
    pub fn order<G: 'static>(
        &self,
        graph: &Graph<G>,
        members: &IndexSet<NodeId>,
    ) -> Result<Vec<NodeId>, ScheduleError> {
        let mut pending = Vec::with_capacity(members.len());
        for &id in members {
            match graph.node(id) {
                Some(node) if !node.is_recursive() => pending.push(id),
                _ => {}
            }
        }

        let mut ordered = self.sweep(graph, pending)?;

        ordered.extend(graph.nodes().filter_map(|(id, node)| {
            (node.is_recursive() && members.contains(&id)).then_some(id)
        }));

        Ok(ordered)
    }

    fn sweep<G: 'static>(
        &self,
        graph: &Graph<G>,
        mut pending: Vec<NodeId>,
    ) -> Result<Vec<NodeId>, ScheduleError> {
        let mut pending_set: HashSet<NodeId> = pending.iter().copied().collect();
        let mut ordered = Vec::with_capacity(pending.len());
        let mut sweeps = 0;

        while !pending.is_empty() {
            if sweeps == self.max_sweeps {
                return Err(ScheduleError::IterationCap {
                    cap: self.max_sweeps,
                    pending: pending.len(),
                });
            }
            sweeps += 1;

            // Readiness is judged against the pending set as it was at the
            // start of the sweep, so a whole dependency level moves at once.
            let (ready, blocked): (Vec<NodeId>, Vec<NodeId>) =
                pending.iter().copied().partition(|&id| {
                    graph
                        .origins_of(id)
                        .all(|origin| origin == id || !pending_set.contains(&origin))
                });

            if ready.is_empty() {
                return Err(ScheduleError::Cycle {
                    nodes: blocked,
                    sweeps,
                });
            }

            trace!(sweep = sweeps, ready = ready.len(), blocked = blocked.len(), "schedule sweep");

            for id in &ready {
                pending_set.remove(id);
            }
            ordered.extend(ready);
            pending = blocked;
        }

        Ok(ordered)
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_SWEEPS)
    }
}
