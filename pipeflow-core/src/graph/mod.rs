//! Dependency Graph
//!
//! This module implements the graph store and the scheduler that orders its
//! nodes.
//!
//! # Overview
//!
//! The graph is a directed graph where:
//!
//! - Nodes are pipeline stages (passes, draw calls, pipelines, buffers)
//! - Links connect an output slot of one node to an input slot of another
//!
//! Links are the only carriers of dependency information. Creation order
//! never implies a dependency.
//!
//! # Design Decisions
//!
//! 1. Cycles are allowed in the structure. A cycle is only legal at run time
//!    when it passes through a recursive (feedback) node, and that is checked
//!    by the scheduler rather than at link time.
//!
//! 2. The store keeps both incoming and outgoing adjacency per node so the
//!    propagator can walk forward and the scheduler can walk backward without
//!    scanning every link.
//!
//! 3. Nodes and links are indexed by ID with insertion order preserved.

mod node;
mod port;
mod scheduler;
mod store;

pub use node::{Node, NodeError, NodeFault, NodeId, Phase};
pub use port::{Link, LinkId, Port, PortType};
pub use scheduler::{ScheduleError, Scheduler, DEFAULT_MAX_SWEEPS};
pub use store::{Graph, GraphError};
