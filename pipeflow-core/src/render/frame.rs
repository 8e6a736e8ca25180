//! Frame Render Pass
//!
//! Renders one frame over the whole graph:
//!
//! 1. Snapshot the graph (MessagePack) for post-mortem logging
//! 2. Order every node topologically, feedback nodes last
//! 3. `render_acquire` each valid node without a recompute fault; a failure
//!    disables it for this frame
//! 4. `render_draw` each acquired node
//! 5. `render_release` each acquired node in reverse order
//! 6. Sweep frame resources nobody released
//! 7. Count the frame
//!
//! # Panics
//!
//! Node callbacks run behind `catch_unwind`. A panic aborts the frame: the
//! remaining acquire and draw calls are skipped, nodes that were already
//! acquired are still released, the snapshot is logged and the frame is not
//! counted.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use tracing::{debug, debug_span, error, warn};

use super::context::{FrameInfo, RenderContext};
use crate::engine::Engine;
use crate::graph::{NodeFault, NodeId, Phase, ScheduleError};
use crate::persist::GraphDocument;
use crate::reactive::Event;
use crate::value::Inputs;

/// Outcome of a completed frame.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrameReport {
    /// Index of the frame.
    pub frame: u64,

    /// Execution order used for the frame.
    pub order: Vec<NodeId>,

    /// Nodes whose draw call succeeded.
    pub drawn: Vec<NodeId>,

    /// Nodes that were invalid or failed to acquire.
    pub disabled: Vec<NodeId>,

    /// Frame resources destroyed by the end-of-frame sweep.
    pub leaked: usize,
}

/// Error when a frame could not be rendered.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// No valid execution order.
    #[error(transparent)]
    Schedule(#[from] ScheduleError),

    /// A node callback panicked.
    #[error("frame {frame} aborted: {phase} of node {node} panicked: {message}")]
    Aborted {
        /// Index of the aborted frame.
        frame: u64,
        /// Node whose callback panicked.
        node: NodeId,
        /// Callback that panicked.
        phase: Phase,
        /// Panic payload, if it was a string.
        message: String,
        /// JSON of the graph as it was when the frame started.
        snapshot: Option<String>,
    },
}

enum Outcome {
    Done,
    Failed,
    Panicked(String),
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

impl<G: 'static> Engine<G> {
    /// Render one frame.
    pub fn render_frame(&mut self) -> Result<FrameReport, FrameError> {
        let frame = self.frame_count;
        let span = debug_span!("frame", frame);
        let _enter = span.enter();

        let snapshot = if self.config.snapshot_frames {
            match self.document().to_msgpack() {
                Ok(bytes) => Some(bytes),
                Err(err) => {
                    warn!(%err, "frame snapshot failed");
                    None
                }
            }
        } else {
            None
        };

        let order = match self.scheduler.order_all(&self.graph) {
            Ok(order) => order,
            Err(err) => {
                error!(%err, "frame halted");
                return Err(err.into());
            }
        };

        let mut report = FrameReport {
            frame,
            order,
            ..FrameReport::default()
        };
        let mut acquired = Vec::with_capacity(report.order.len());
        let mut abort: Option<(NodeId, Phase, String)> = None;

        for &id in &report.order {
            // Nodes whose last recompute failed sit the frame out.
            let stale = self
                .graph
                .fault(id)
                .is_some_and(|f| f.phase == Phase::Recompute);
            if stale || !self.graph.node(id).is_some_and(|n| n.is_valid()) {
                report.disabled.push(id);
                continue;
            }
            match self.call_render(id, Phase::Acquire) {
                Outcome::Done => acquired.push(id),
                Outcome::Failed => report.disabled.push(id),
                Outcome::Panicked(message) => {
                    abort = Some((id, Phase::Acquire, message));
                    break;
                }
            }
        }

        if abort.is_none() {
            for &id in &acquired {
                match self.call_render(id, Phase::Draw) {
                    Outcome::Done => report.drawn.push(id),
                    Outcome::Failed => {}
                    Outcome::Panicked(message) => {
                        abort = Some((id, Phase::Draw, message));
                        break;
                    }
                }
            }
        }

        for &id in acquired.iter().rev() {
            if let Outcome::Panicked(message) = self.call_render(id, Phase::Release) {
                if abort.is_none() {
                    abort = Some((id, Phase::Release, message));
                } else {
                    error!(node = %id, %message, "release panicked during abort");
                }
            }
        }

        report.leaked = self.resources.sweep_frame(&mut self.gpu);

        if let Some((node, phase, message)) = abort {
            let snapshot = snapshot.and_then(|bytes| {
                GraphDocument::from_msgpack(&bytes)
                    .and_then(|doc| doc.to_json())
                    .ok()
            });
            error!(
                frame,
                node = %node,
                %phase,
                %message,
                snapshot = snapshot.as_deref().unwrap_or("<none>"),
                "frame aborted"
            );
            self.emit(Event::FrameAborted { frame, node });
            return Err(FrameError::Aborted {
                frame,
                node,
                phase,
                message,
                snapshot,
            });
        }

        self.frame_count += 1;
        debug!(
            drawn = report.drawn.len(),
            disabled = report.disabled.len(),
            leaked = report.leaked,
            "frame complete"
        );
        self.emit(Event::FrameRendered { frame });
        Ok(report)
    }

    /// Frames rendered since creation or the last reset.
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Restart frame numbering at zero.
    pub fn reset_frame_count(&mut self) {
        self.frame_count = 0;
    }

    fn call_render(&mut self, id: NodeId, phase: Phase) -> Outcome {
        let inputs = Inputs::resolve(&self.graph, &self.values, id);
        let frame = FrameInfo {
            index: self.frame_count,
            viewport: self.config.viewport,
        };
        let Some(slot) = self.graph.slot_mut(id) else {
            return Outcome::Failed;
        };

        let mut ctx = RenderContext::new(
            id,
            phase,
            frame,
            &mut self.gpu,
            inputs,
            &mut self.values,
            &mut self.resources,
            &self.sources,
        );
        let node = &mut slot.node;
        let result = panic::catch_unwind(AssertUnwindSafe(|| match phase {
            Phase::Acquire => node.render_acquire(&mut ctx),
            Phase::Draw => node.render_draw(&mut ctx),
            Phase::Release => node.render_release(&mut ctx),
            Phase::Recompute => Ok(()),
        }));

        match result {
            Ok(Ok(())) => {
                if slot.fault.as_ref().is_some_and(|f| f.phase == phase) {
                    slot.fault = None;
                }
                Outcome::Done
            }
            Ok(Err(err)) => {
                warn!(node = %id, %phase, %err, "render callback failed");
                let message = err.to_string();
                slot.fault = Some(NodeFault::new(phase, message.clone()));
                self.emit(Event::NodeFaulted {
                    node: id,
                    phase,
                    message,
                });
                Outcome::Failed
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                slot.fault = Some(NodeFault::new(phase, format!("panicked: {message}")));
                Outcome::Panicked(message)
            }
        }
    }
}
