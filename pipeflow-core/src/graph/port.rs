//! Ports and Links
//!
//! Ports are the typed slots on a node; links connect an output slot of one
//! node to an input slot of another. Port types only decide whether a link
//! may be made. The engine never branches on them otherwise.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::node::NodeId;

/// Declared type tag of a port, e.g. `"mesh_t"` or `"texture_t"`.
///
/// The empty tag and `"*"` are wildcards.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PortType(String);

impl PortType {
    /// Create a port type from its tag.
    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }

    /// The wildcard type.
    pub fn any() -> Self {
        Self(String::new())
    }

    /// Get the tag.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Check if this is a wildcard.
    pub fn is_any(&self) -> bool {
        self.0.is_empty() || self.0 == "*"
    }

    /// Check if a value of this type may flow into a port of type `other`.
    pub fn can_connect_to(&self, other: &PortType) -> bool {
        self.is_any() || other.is_any() || self == other
    }
}

impl From<&str> for PortType {
    fn from(tag: &str) -> Self {
        Self::new(tag)
    }
}

impl fmt::Display for PortType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_any() {
            f.write_str("*")
        } else {
            f.write_str(&self.0)
        }
    }
}

/// A named, typed slot on a node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Port {
    /// Slot name, unique per direction on a node.
    pub name: String,

    /// Declared type tag.
    #[serde(rename = "type")]
    pub ty: PortType,
}

impl Port {
    /// Create a port.
    pub fn new(name: impl Into<String>, ty: impl Into<PortType>) -> Self {
        Self {
            name: name.into(),
            ty: ty.into(),
        }
    }
}

/// Unique identifier for a link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LinkId(u64);

impl LinkId {
    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl From<u64> for LinkId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// A directed edge from an output slot to an input slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    /// Unique link ID.
    pub id: LinkId,
    /// Node producing the value.
    pub origin: NodeId,
    /// Output slot on the origin node.
    pub origin_slot: usize,
    /// Node consuming the value.
    pub target: NodeId,
    /// Input slot on the target node.
    pub target_slot: usize,
    /// Type of the origin port when the link was made.
    pub ty: PortType,
}

impl Link {
    /// Check if this link touches a specific node.
    pub fn involves_node(&self, node_id: NodeId) -> bool {
        self.origin == node_id || self.target == node_id
    }
}
