//! Graph Nodes
//!
//! This module defines node identity and the capability contract every node
//! type implements.
//!
//! # Capabilities
//!
//! Only identity and the port lists are mandatory. Everything else has a
//! default that makes the node inert for that phase:
//!
//! - `is_recursive`: the node reads values written in a previous cycle
//!   (feedback). Recursive nodes are exempt from dependency ordering.
//! - `is_valid`: the node can take part in the current frame.
//! - `recompute`: derive node state from current inputs (Update Pass).
//! - `render_acquire` / `render_draw` / `render_release`: the per-frame GPU
//!   resource lifecycle (Frame Render Pass).
//!
//! The engine calls into nodes with a context object, never with a global.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::port::Port;
use crate::reactive::UpdateContext;
use crate::render::RenderContext;

/// Unique identifier for a node in the graph.
///
/// Identifiers are allocated by the graph store and preserved across
/// serialization, so they stay stable for the lifetime of a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(u64);

impl NodeId {
    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl From<u64> for NodeId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The pass in which a node callback ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Phase {
    /// Update Pass recomputation.
    Recompute,

    /// GPU object allocation at the start of a frame.
    Acquire,

    /// Draw submission.
    Draw,

    /// GPU object teardown at the end of a frame.
    Release,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Recompute => "recompute",
            Phase::Acquire => "acquire",
            Phase::Draw => "draw",
            Phase::Release => "release",
        };
        f.write_str(name)
    }
}

/// A recoverable failure reported by a node callback.
///
/// These never stop a pass: the engine records a [`NodeFault`] on the node
/// and continues with the remaining nodes.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NodeError {
    /// Shader compilation failed.
    #[error("compile error: {0}")]
    Compile(String),

    /// Program linking failed.
    #[error("link error: {0}")]
    Link(String),

    /// A required input slot has no value.
    #[error("missing input: {0}")]
    MissingInput(String),

    /// Input data could not be interpreted (e.g. malformed buffer JSON).
    #[error("malformed input: {0}")]
    Malformed(String),

    /// Anything else.
    #[error("{0}")]
    Custom(String),
}

/// The last failure recorded against a node.
///
/// UI collaborators use this to draw a placeholder instead of the node's
/// normal preview.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeFault {
    /// Where the failure happened.
    pub phase: Phase,

    /// Human readable description.
    pub message: String,
}

impl NodeFault {
    /// Create a fault for the given phase.
    pub fn new(phase: Phase, message: impl Into<String>) -> Self {
        Self {
            phase,
            message: message.into(),
        }
    }
}

/// The capability contract between the engine and a node implementation.
///
/// `G` is the GPU context handed to the render callbacks. The engine owns it
/// and passes it by reference; nodes never keep it beyond a call.
pub trait Node<G>: Send {
    /// Type name used for registry lookup and `find_nodes_by_type`.
    fn type_name(&self) -> &str;

    /// Declared input ports, addressed by slot index.
    fn inputs(&self) -> &[Port];

    /// Declared output ports, addressed by slot index.
    fn outputs(&self) -> &[Port];

    /// Whether this node intentionally consumes values from a previous cycle.
    fn is_recursive(&self) -> bool {
        false
    }

    /// Whether this node may take part in the current frame.
    fn is_valid(&self) -> bool {
        true
    }

    /// Whether this node reads the named text source.
    fn uses_source(&self, _name: &str) -> bool {
        false
    }

    /// Recompute derived state from the current inputs.
    fn recompute(&mut self, _ctx: &mut UpdateContext<'_>) -> Result<(), NodeError> {
        Ok(())
    }

    /// Allocate the GPU objects needed for this frame.
    fn render_acquire(&mut self, _ctx: &mut RenderContext<'_, G>) -> Result<(), NodeError> {
        Ok(())
    }

    /// Submit draw work.
    fn render_draw(&mut self, _ctx: &mut RenderContext<'_, G>) -> Result<(), NodeError> {
        Ok(())
    }

    /// Free the GPU objects acquired for this frame.
    fn render_release(&mut self, _ctx: &mut RenderContext<'_, G>) -> Result<(), NodeError> {
        Ok(())
    }

    /// Node-private state to persist in the graph document.
    fn properties(&self) -> serde_json::Value {
        serde_json::Value::Null
    }
}
