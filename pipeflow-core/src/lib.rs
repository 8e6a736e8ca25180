//! Pipeflow Core
//!
//! This crate provides the execution engine behind a node-based GPU pipeline
//! editor. A user wires meshes, shader programs, textures and draw calls into
//! a graph; the engine keeps that graph's derived state up to date and renders
//! it frame by frame. It implements:
//!
//! - A graph store of nodes, typed ports and links
//! - Incremental recomputation driven by dirty tracking
//! - Topological scheduling with explicit feedback (recursive) nodes
//! - A per-frame acquire / draw / release render pass
//! - Graph persistence in the litegraph JSON layout
//!
//! The engine does not know what a shader or a texture is. Node types bring
//! that knowledge through the [`Node`] trait, and the GPU context is a type
//! parameter the engine only lends out.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `graph`: Nodes, ports, links, the graph store and the scheduler
//! - `reactive`: Dirty sets, propagation, events and the Update Pass
//! - `render`: Render context, GPU resource table and the Frame Render Pass
//! - `persist`: Graph documents, snapshots and the node registry
//! - `driver`: Timer-driven update and frame loop
//!
//! # Example
//!
//! ```rust,ignore
//! use pipeflow_core::{Engine, EngineConfig};
//!
//! let mut engine = Engine::new(gpu, EngineConfig::default());
//!
//! let mesh = engine.add_node(Box::new(MeshNode::quad()));
//! let draw = engine.add_node(Box::new(DrawCallNode::default()));
//! engine.add_link(mesh, 0, draw, 0)?;
//!
//! // Bring derived state up to date, then render.
//! engine.run_update()?;
//! engine.render_frame()?;
//! ```

pub mod config;
pub mod driver;
pub mod engine;
pub mod graph;
pub mod persist;
pub mod reactive;
pub mod render;
pub mod sources;
pub mod value;

#[cfg(test)]
pub(crate) mod test_support;

pub use config::{ConfigError, EngineConfig, Viewport};
pub use driver::{drive, TickStats};
pub use engine::Engine;
pub use graph::{
    Graph, GraphError, Link, LinkId, Node, NodeError, NodeFault, NodeId, Phase, Port, PortType,
    ScheduleError, Scheduler,
};
pub use persist::{GraphDocument, NodeRecord, NodeRegistry, PersistError};
pub use reactive::{DirtyState, Event, EventKind, SubscriberId, Topic, UpdateContext, UpdateReport};
pub use render::{FrameError, FrameInfo, FrameReport, GpuResource, RenderContext, ResourceKey, Scope};
pub use sources::{SourceError, SourceStore};
pub use value::{Inputs, Value};
