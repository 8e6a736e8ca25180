//! Graph Persistence
//!
//! Graphs are saved as JSON documents in the litegraph layout the node editor
//! front-end reads and writes:
//!
//! ```json
//! {
//!   "last_node_id": 2,
//!   "last_link_id": 1,
//!   "nodes": [
//!     { "id": 1, "type": "mesh", "title": "quad", "inputs": [],
//!       "outputs": [{ "name": "mesh", "type": "mesh_t", "links": [1] }],
//!       "properties": null }
//!   ],
//!   "links": [[1, 1, 0, 2, 0, "mesh_t"]],
//!   "config": { "srcs": { "vs": { "code": "..." } } }
//! }
//! ```
//!
//! Nodes are rebuilt through a [`NodeRegistry`] keyed by type name. The same
//! document, encoded as MessagePack, is the compact snapshot taken before each
//! frame.
//!
//! Loading is all-or-nothing: the new graph is built on the side and only
//! swapped in once every node and link was accepted.

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::engine::Engine;
use crate::graph::{Graph, GraphError, Link, LinkId, Node, NodeError, NodeId, PortType};
use crate::reactive::Event;
use crate::sources::SourceStore;

/// Error saving or loading a graph.
#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    /// The JSON document is malformed.
    #[error("invalid graph document: {0}")]
    Json(#[from] serde_json::Error),

    /// MessagePack encoding failed.
    #[error("failed to encode snapshot: {0}")]
    Encode(#[from] rmp_serde::encode::Error),

    /// MessagePack decoding failed.
    #[error("failed to decode snapshot: {0}")]
    Decode(#[from] rmp_serde::decode::Error),

    /// No factory is registered for a node type.
    #[error("unknown node type '{0}'")]
    UnknownNodeType(String),

    /// A factory rejected its record.
    #[error("node {id} could not be created: {source}")]
    Node {
        /// Record that failed.
        id: NodeId,
        /// Factory error.
        #[source]
        source: NodeError,
    },

    /// The rebuilt graph is inconsistent (bad link, duplicate ID).
    #[error(transparent)]
    Graph(#[from] GraphError),
}

/// A saved input slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputRecord {
    /// Port name.
    pub name: String,
    /// Port type tag.
    #[serde(rename = "type", default)]
    pub ty: PortType,
    /// Link feeding the slot.
    #[serde(default)]
    pub link: Option<LinkId>,
}

/// A saved output slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputRecord {
    /// Port name.
    pub name: String,
    /// Port type tag.
    #[serde(rename = "type", default)]
    pub ty: PortType,
    /// Links leaving the slot.
    #[serde(default)]
    pub links: Vec<LinkId>,
}

/// A saved node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    /// Stable node ID.
    pub id: NodeId,
    /// Registry key.
    #[serde(rename = "type")]
    pub node_type: String,
    /// Display title.
    #[serde(default)]
    pub title: String,
    /// Input slots as they were saved.
    #[serde(default)]
    pub inputs: Vec<InputRecord>,
    /// Output slots as they were saved.
    #[serde(default)]
    pub outputs: Vec<OutputRecord>,
    /// Node-private state.
    #[serde(default)]
    pub properties: serde_json::Value,
}

/// A saved link: `[id, origin, origin_slot, target, target_slot, type]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkRecord(
    pub LinkId,
    pub NodeId,
    pub usize,
    pub NodeId,
    pub usize,
    pub PortType,
);

impl From<&Link> for LinkRecord {
    fn from(link: &Link) -> Self {
        Self(
            link.id,
            link.origin,
            link.origin_slot,
            link.target,
            link.target_slot,
            link.ty.clone(),
        )
    }
}

impl From<LinkRecord> for Link {
    fn from(record: LinkRecord) -> Self {
        let LinkRecord(id, origin, origin_slot, target, target_slot, ty) = record;
        Link {
            id,
            origin,
            origin_slot,
            target,
            target_slot,
            ty,
        }
    }
}

/// A saved text source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRecord {
    /// Source text.
    #[serde(default)]
    pub code: String,
}

/// Document-level settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentConfig {
    /// Named text sources.
    #[serde(default)]
    pub srcs: IndexMap<String, SourceRecord>,
}

/// A complete saved graph.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphDocument {
    /// Highest node ID handed out.
    #[serde(default)]
    pub last_node_id: u64,
    /// Highest link ID handed out.
    #[serde(default)]
    pub last_link_id: u64,
    /// Nodes in storage order.
    #[serde(default)]
    pub nodes: Vec<NodeRecord>,
    /// Links in creation order.
    #[serde(default)]
    pub links: Vec<LinkRecord>,
    /// Sources and other settings.
    #[serde(default)]
    pub config: DocumentConfig,
}

impl GraphDocument {
    /// Parse a JSON document.
    pub fn from_json(json: &str) -> Result<Self, PersistError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Render as pretty-printed JSON.
    pub fn to_json(&self) -> Result<String, PersistError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Encode as MessagePack.
    pub fn to_msgpack(&self) -> Result<Vec<u8>, PersistError> {
        Ok(rmp_serde::to_vec_named(self)?)
    }

    /// Decode from MessagePack.
    pub fn from_msgpack(bytes: &[u8]) -> Result<Self, PersistError> {
        Ok(rmp_serde::from_slice(bytes)?)
    }
}

/// Builds a node from its saved record.
pub type NodeFactory<G> = Box<dyn Fn(&NodeRecord) -> Result<Box<dyn Node<G>>, NodeError> + Send + Sync>;

/// Registry of node types that can be loaded from a document.
pub struct NodeRegistry<G> {
    factories: IndexMap<String, NodeFactory<G>>,
}

impl<G> NodeRegistry<G> {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            factories: IndexMap::new(),
        }
    }

    /// Register a factory for a type name, replacing any previous one.
    pub fn register<F>(&mut self, type_name: impl Into<String>, factory: F)
    where
        F: Fn(&NodeRecord) -> Result<Box<dyn Node<G>>, NodeError> + Send + Sync + 'static,
    {
        self.factories.insert(type_name.into(), Box::new(factory));
    }

    /// Check if a type name is registered.
    pub fn contains(&self, type_name: &str) -> bool {
        self.factories.contains_key(type_name)
    }

    /// Registered type names, in registration order.
    pub fn type_names(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    /// Build a node from its record.
    pub fn create(&self, record: &NodeRecord) -> Result<Box<dyn Node<G>>, PersistError> {
        let factory = self
            .factories
            .get(&record.node_type)
            .ok_or_else(|| PersistError::UnknownNodeType(record.node_type.clone()))?;
        factory(record).map_err(|source| PersistError::Node {
            id: record.id,
            source,
        })
    }
}

impl<G> Default for NodeRegistry<G> {
    fn default() -> Self {
        Self::new()
    }
}

impl<G> fmt::Debug for NodeRegistry<G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.factories.keys()).finish()
    }
}

impl<G: 'static> Engine<G> {
    /// Capture the graph and its sources as a document.
    pub fn document(&self) -> GraphDocument {
        let graph = &self.graph;
        let (next_node, next_link) = graph.next_ids();

        let nodes = graph
            .nodes()
            .map(|(id, node)| NodeRecord {
                id,
                node_type: node.type_name().to_string(),
                title: graph.title(id).unwrap_or_default().to_string(),
                inputs: node
                    .inputs()
                    .iter()
                    .enumerate()
                    .map(|(slot, port)| InputRecord {
                        name: port.name.clone(),
                        ty: port.ty.clone(),
                        link: graph.input_link(id, slot).map(|link| link.id),
                    })
                    .collect(),
                outputs: node
                    .outputs()
                    .iter()
                    .enumerate()
                    .map(|(slot, port)| OutputRecord {
                        name: port.name.clone(),
                        ty: port.ty.clone(),
                        links: graph.links_from(id, slot).map(|link| link.id).collect(),
                    })
                    .collect(),
                properties: node.properties(),
            })
            .collect();

        let srcs = self
            .sources
            .iter()
            .map(|(name, code)| {
                (
                    name.to_string(),
                    SourceRecord {
                        code: code.to_string(),
                    },
                )
            })
            .collect();

        GraphDocument {
            last_node_id: next_node - 1,
            last_link_id: next_link - 1,
            nodes,
            links: graph.links().map(LinkRecord::from).collect(),
            config: DocumentConfig { srcs },
        }
    }

    /// Save the graph as JSON.
    pub fn serialize(&self) -> Result<String, PersistError> {
        self.document().to_json()
    }

    /// Replace the graph with one loaded from JSON.
    pub fn deserialize(&mut self, json: &str, registry: &NodeRegistry<G>) -> Result<(), PersistError> {
        let document = GraphDocument::from_json(json)?;
        self.load_document(document, registry)
    }

    /// Replace the graph with a document.
    ///
    /// On error the current graph is left untouched. On success every node
    /// starts dirty and [`Event::GraphReset`] is emitted.
    pub fn load_document(&mut self, document: GraphDocument, registry: &NodeRegistry<G>) -> Result<(), PersistError> {
        let mut graph = Graph::new();
        for record in &document.nodes {
            let node = registry.create(record)?;
            graph.insert_node(record.id, record.title.clone(), node)?;
        }
        for record in document.links {
            graph.insert_link(record.into())?;
        }
        graph.reserve_ids(document.last_node_id, document.last_link_id);

        let sources: SourceStore = document
            .config
            .srcs
            .into_iter()
            .map(|(name, record)| (name, record.code))
            .collect();

        let freed = self.resources.clear(&mut self.gpu);
        self.graph = graph;
        self.sources = sources;
        self.values.clear();
        self.dirty.clear();
        self.events.clear_node_subscriptions();

        let ids: Vec<NodeId> = self.graph.node_ids().collect();
        for id in ids {
            self.mark_dirty(id);
        }
        info!(
            nodes = self.graph.node_count(),
            links = self.graph.link_count(),
            sources = self.sources.len(),
            resources = freed,
            "graph loaded"
        );
        self.emit(Event::GraphReset);
        Ok(())
    }

    /// Rebuild every node from its own saved state.
    ///
    /// Equivalent to serialize, clear and load. Useful after node types were
    /// re-registered with new code.
    pub fn reload(&mut self, registry: &NodeRegistry<G>) -> Result<(), PersistError> {
        let document = self.document();
        self.load_document(document, registry)
    }
}
