//! Update Pass
//!
//! Brings every invalidated node up to date with its inputs:
//!
//! 1. Expand the dirty set forward along links
//! 2. Order the expanded set topologically
//! 3. Recompute each node in order and notify its subscribers
//! 4. Recompute the deferred (feedback) nodes and mark their consumers for
//!    the next pass, so feedback lags by exactly one pass
//!
//! Both dirty sets are drained when the pass starts, so anything marked dirty
//! while the pass runs is picked up by the next pass.

use indexmap::IndexSet;
use tracing::{debug, debug_span, error, trace, warn};

use super::events::Event;
use super::propagate::expand;
use crate::engine::Engine;
use crate::graph::{NodeFault, NodeId, Phase, ScheduleError};
use crate::sources::SourceStore;
use crate::value::{Inputs, PortValues, Value};

/// What a node sees while recomputing.
pub struct UpdateContext<'a> {
    node: NodeId,
    inputs: Inputs,
    values: &'a mut PortValues,
    sources: &'a SourceStore,
    frame: u64,
}

impl<'a> UpdateContext<'a> {
    pub(crate) fn new(
        node: NodeId,
        inputs: Inputs,
        values: &'a mut PortValues,
        sources: &'a SourceStore,
        frame: u64,
    ) -> Self {
        Self {
            node,
            inputs,
            values,
            sources,
            frame,
        }
    }

    /// The node being recomputed.
    pub fn node_id(&self) -> NodeId {
        self.node
    }

    /// Value arriving at an input slot.
    pub fn input(&self, slot: usize) -> Option<&Value> {
        self.inputs.get(slot)
    }

    /// Value arriving at the input slot with this name.
    pub fn input_named(&self, name: &str) -> Option<&Value> {
        self.inputs.get_named(name)
    }

    /// Number of declared input slots.
    pub fn input_count(&self) -> usize {
        self.inputs.len()
    }

    /// All resolved inputs.
    pub fn inputs(&self) -> &Inputs {
        &self.inputs
    }

    /// The value this node last published on an output slot.
    pub fn output(&self, slot: usize) -> Option<&Value> {
        self.values.get(self.node, slot)
    }

    /// Publish a value on an output slot.
    pub fn set_output(&mut self, slot: usize, value: Value) {
        self.values.set(self.node, slot, value);
    }

    /// Withdraw the value on an output slot.
    pub fn clear_output(&mut self, slot: usize) {
        self.values.unset(self.node, slot);
    }

    /// Text of a named source.
    pub fn source(&self, name: &str) -> Option<&str> {
        self.sources.get(name)
    }

    /// Frames rendered so far.
    pub fn frame(&self) -> u64 {
        self.frame
    }
}

/// Outcome of one Update Pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateReport {
    /// Non-recursive nodes recomputed, in execution order.
    pub recomputed: Vec<NodeId>,

    /// Recursive nodes recomputed after the ordered ones.
    pub deferred: Vec<NodeId>,

    /// Nodes whose `recompute` returned an error.
    pub failed: Vec<NodeId>,
}

impl UpdateReport {
    /// Check if the pass did nothing.
    pub fn is_empty(&self) -> bool {
        self.recomputed.is_empty() && self.deferred.is_empty() && self.failed.is_empty()
    }
}

impl<G: 'static> Engine<G> {
    /// Run one Update Pass.
    ///
    /// A scheduling error aborts the pass before any node runs and leaves the
    /// dirty sets as they were.
    pub fn run_update(&mut self) -> Result<UpdateReport, ScheduleError> {
        if self.dirty.is_clean() {
            return Ok(UpdateReport::default());
        }

        let span = debug_span!(
            "update_pass",
            dirty = self.dirty.dirty().len(),
            deferred = self.dirty.deferred().len()
        );
        let _enter = span.enter();

        let expansion = expand(&self.graph, self.dirty.dirty().iter().copied());
        let order = match self.scheduler.order(&self.graph, &expansion.immediate) {
            Ok(order) => order,
            Err(err) => {
                error!(%err, "update pass aborted");
                return Err(err);
            }
        };

        let (_, mut deferred) = self.dirty.take();
        deferred.extend(expansion.deferred);

        let mut report = UpdateReport::default();
        for id in order {
            if self.recompute_node(id) {
                report.recomputed.push(id);
            } else {
                report.failed.push(id);
            }
        }
        for id in deferred.iter().copied() {
            if !self.graph.contains(id) {
                continue;
            }
            if self.recompute_node(id) {
                // Consumers of a feedback node pick up its new value next pass.
                let consumers: Vec<NodeId> =
                    self.graph.targets_of(id).filter(|&target| target != id).collect();
                for target in consumers {
                    self.mark_dirty(target);
                }
                report.deferred.push(id);
            } else {
                report.failed.push(id);
            }
        }

        debug!(
            recomputed = report.recomputed.len(),
            deferred = report.deferred.len(),
            failed = report.failed.len(),
            "update pass complete"
        );
        Ok(report)
    }

    /// Recompute one node and deliver its event. Returns false on failure.
    fn recompute_node(&mut self, id: NodeId) -> bool {
        let inputs = Inputs::resolve(&self.graph, &self.values, id);
        let Some(slot) = self.graph.slot_mut(id) else {
            return false;
        };

        let mut ctx = UpdateContext::new(id, inputs, &mut self.values, &self.sources, self.frame_count);
        let result = slot.node.recompute(&mut ctx);

        let event = match result {
            Ok(()) => {
                if slot.fault.as_ref().is_some_and(|f| f.phase == Phase::Recompute) {
                    slot.fault = None;
                }
                trace!(node = %id, "recomputed");
                Event::NodeChanged(id)
            }
            Err(err) => {
                warn!(node = %id, %err, "recompute failed");
                let message = err.to_string();
                slot.fault = Some(NodeFault::new(Phase::Recompute, message.clone()));
                Event::NodeFaulted {
                    node: id,
                    phase: Phase::Recompute,
                    message,
                }
            }
        };
        let ok = matches!(event, Event::NodeChanged(_));

        // Ports may have changed shape; links that no longer fit are dropped
        // and whoever lost an input has to recompute.
        let severed: IndexSet<NodeId> = self
            .graph
            .retain_valid_links(id)
            .into_iter()
            .filter(|link| link.target != id)
            .map(|link| link.target)
            .collect();
        for target in severed {
            self.mark_dirty(target);
        }

        self.emit(event);
        ok
    }
}
