//! Dirty Propagation
//!
//! A change to an upstream node invalidates every downstream consumer,
//! transitively. The propagator computes that closure before scheduling.
//!
//! # Algorithm
//!
//! Breadth-first over output links, frontier by frontier:
//!
//! 1. Start with the seed nodes as the frontier
//! 2. Follow every output link of the frontier to its target
//! 3. A non-recursive target not seen yet joins the closure and the next
//!    frontier
//! 4. A recursive target joins the deferred set and is not expanded through;
//!    its consumers are marked once it has recomputed, one pass later
//! 5. Stop when a frontier adds nothing
//!
//! The graph may contain cycles through feedback nodes; step 4 is what keeps
//! the closure finite and the immediate set acyclic.

use indexmap::IndexSet;
use tracing::trace;

use crate::graph::{Graph, NodeId};

/// Result of expanding a dirty set.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Expansion {
    /// Seeds plus every non-recursive downstream consumer, in discovery order.
    pub immediate: IndexSet<NodeId>,

    /// Recursive nodes reached along the way.
    pub deferred: IndexSet<NodeId>,
}

/// Expand `seeds` forward along links.
///
/// Seeds that no longer exist in the graph are dropped. Recursive seeds are
/// reported as deferred.
pub fn expand<G: 'static>(graph: &Graph<G>, seeds: impl IntoIterator<Item = NodeId>) -> Expansion {
    let mut expansion = Expansion::default();
    let mut frontier = Vec::new();

    for id in seeds {
        match graph.node(id) {
            Some(node) if node.is_recursive() => {
                expansion.deferred.insert(id);
            }
            Some(_) => {
                if expansion.immediate.insert(id) {
                    frontier.push(id);
                }
            }
            None => {}
        }
    }

    let mut rounds = 0;
    while !frontier.is_empty() {
        rounds += 1;
        let mut next = Vec::new();

        for &id in &frontier {
            for target in graph.targets_of(id) {
                let Some(node) = graph.node(target) else {
                    continue;
                };
                if node.is_recursive() {
                    expansion.deferred.insert(target);
                } else if expansion.immediate.insert(target) {
                    next.push(target);
                }
            }
        }

        trace!(round = rounds, added = next.len(), "dirty propagation");
        frontier = next;
    }

    expansion
}
