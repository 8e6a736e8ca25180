//! Graph Store
//!
//! Holds nodes, links and the adjacency indices derived from links. Nodes are
//! kept in insertion order: that order is the "graph-storage order" used to
//! place recursive nodes at the end of a schedule.

use std::collections::HashMap;

use indexmap::IndexMap;
use smallvec::SmallVec;
use tracing::debug;

use super::node::{Node, NodeFault, NodeId};
use super::port::{Link, LinkId, PortType};

/// A node together with the bookkeeping the engine keeps for it.
pub(crate) struct NodeSlot<G> {
    pub(crate) node: Box<dyn Node<G>>,
    pub(crate) title: String,
    pub(crate) fault: Option<NodeFault>,
}

/// Error when editing the graph structure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphError {
    /// Node not found
    #[error("node not found: {0}")]
    NodeNotFound(NodeId),

    /// Slot index out of range for the node
    #[error("node {node} has no {direction} slot {slot}")]
    SlotNotFound {
        /// Node that was addressed.
        node: NodeId,
        /// `"input"` or `"output"`.
        direction: &'static str,
        /// Requested slot index.
        slot: usize,
    },

    /// Port types do not match
    #[error("cannot connect {from} output to {to} input")]
    IncompatiblePorts {
        /// Origin port type.
        from: String,
        /// Target port type.
        to: String,
    },

    /// A node linking to itself without being recursive
    #[error("node {0} cannot link to itself")]
    SelfLink(NodeId),

    /// A node with this ID already exists
    #[error("duplicate node id: {0}")]
    DuplicateNode(NodeId),

    /// A link with this ID already exists
    #[error("duplicate link id: {0:?}")]
    DuplicateLink(LinkId),
}

/// The node graph: nodes, links and adjacency.
pub struct Graph<G> {
    nodes: IndexMap<NodeId, NodeSlot<G>>,
    links: IndexMap<LinkId, Link>,

    /// Links arriving at each node.
    incoming: HashMap<NodeId, SmallVec<[LinkId; 4]>>,

    /// Links leaving each node.
    outgoing: HashMap<NodeId, SmallVec<[LinkId; 4]>>,

    next_node: u64,
    next_link: u64,
}

impl<G: 'static> Graph<G> {
    /// Create a new empty graph.
    pub fn new() -> Self {
        Self {
            nodes: IndexMap::new(),
            links: IndexMap::new(),
            incoming: HashMap::new(),
            outgoing: HashMap::new(),
            next_node: 1,
            next_link: 1,
        }
    }

    /// Add a node, allocating a fresh ID. The title defaults to the type name.
    pub fn add_node(&mut self, node: Box<dyn Node<G>>) -> NodeId {
        let id = NodeId::from(self.next_node);
        self.next_node += 1;
        let title = node.type_name().to_string();
        self.nodes.insert(
            id,
            NodeSlot {
                node,
                title,
                fault: None,
            },
        );
        id
    }

    /// Insert a node under a known ID (used when loading a document).
    pub fn insert_node(
        &mut self,
        id: NodeId,
        title: impl Into<String>,
        node: Box<dyn Node<G>>,
    ) -> Result<(), GraphError> {
        if self.nodes.contains_key(&id) {
            return Err(GraphError::DuplicateNode(id));
        }
        self.next_node = self.next_node.max(id.raw() + 1);
        self.nodes.insert(
            id,
            NodeSlot {
                node,
                title: title.into(),
                fault: None,
            },
        );
        Ok(())
    }

    /// Remove a node and every link touching it.
    ///
    /// Returns the node and the links that were severed.
    pub fn remove_node(&mut self, node_id: NodeId) -> Option<(Box<dyn Node<G>>, Vec<Link>)> {
        if !self.nodes.contains_key(&node_id) {
            return None;
        }

        let mut link_ids: Vec<LinkId> = self
            .incoming
            .get(&node_id)
            .into_iter()
            .chain(self.outgoing.get(&node_id))
            .flatten()
            .copied()
            .collect();
        link_ids.sort_unstable();
        link_ids.dedup();

        let severed = link_ids
            .into_iter()
            .filter_map(|id| self.remove_link(id))
            .collect();

        self.incoming.remove(&node_id);
        self.outgoing.remove(&node_id);

        // shift_remove keeps storage order intact for the remaining nodes
        let slot = self.nodes.shift_remove(&node_id)?;
        Some((slot.node, severed))
    }

    /// Check if a node exists.
    pub fn contains(&self, node_id: NodeId) -> bool {
        self.nodes.contains_key(&node_id)
    }

    /// Get a node by ID.
    pub fn node(&self, node_id: NodeId) -> Option<&dyn Node<G>> {
        self.nodes.get(&node_id).map(|slot| slot.node.as_ref())
    }

    /// Get a mutable node by ID.
    pub fn node_mut(&mut self, node_id: NodeId) -> Option<&mut (dyn Node<G> + 'static)> {
        self.nodes.get_mut(&node_id).map(|slot| slot.node.as_mut())
    }

    pub(crate) fn slot_mut(&mut self, node_id: NodeId) -> Option<&mut NodeSlot<G>> {
        self.nodes.get_mut(&node_id)
    }

    /// Display title of a node.
    pub fn title(&self, node_id: NodeId) -> Option<&str> {
        self.nodes.get(&node_id).map(|slot| slot.title.as_str())
    }

    /// Change the display title of a node.
    pub fn set_title(&mut self, node_id: NodeId, title: impl Into<String>) -> bool {
        match self.nodes.get_mut(&node_id) {
            Some(slot) => {
                slot.title = title.into();
                true
            }
            None => false,
        }
    }

    /// Last fault recorded against a node, if any.
    pub fn fault(&self, node_id: NodeId) -> Option<&NodeFault> {
        self.nodes.get(&node_id).and_then(|slot| slot.fault.as_ref())
    }

    /// Iterate nodes in storage order.
    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &dyn Node<G>)> + '_ {
        self.nodes.iter().map(|(id, slot)| (*id, slot.node.as_ref()))
    }

    /// Iterate node IDs in storage order.
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.keys().copied()
    }

    /// Get the number of nodes.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Check if the graph has no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// IDs of every node with the given type name, in storage order.
    pub fn find_nodes_by_type(&self, type_name: &str) -> Vec<NodeId> {
        self.nodes
            .iter()
            .filter(|(_, slot)| slot.node.type_name() == type_name)
            .map(|(id, _)| *id)
            .collect()
    }

    /// Connect an output slot to an input slot.
    ///
    /// An input holds at most one link: connecting an occupied input replaces
    /// the existing link.
    pub fn add_link(
        &mut self,
        origin: NodeId,
        origin_slot: usize,
        target: NodeId,
        target_slot: usize,
    ) -> Result<LinkId, GraphError> {
        let id = LinkId::from(self.next_link);
        let ty = self.validate(origin, origin_slot, target, target_slot)?;
        self.next_link += 1;
        self.attach(Link {
            id,
            origin,
            origin_slot,
            target,
            target_slot,
            ty,
        });
        Ok(id)
    }

    /// Insert a link under a known ID (used when loading a document).
    ///
    /// The link type is taken from the origin port, not from the record.
    pub fn insert_link(&mut self, link: Link) -> Result<(), GraphError> {
        if self.links.contains_key(&link.id) {
            return Err(GraphError::DuplicateLink(link.id));
        }
        let ty = self.validate(link.origin, link.origin_slot, link.target, link.target_slot)?;
        self.next_link = self.next_link.max(link.id.raw() + 1);
        self.attach(Link { ty, ..link });
        Ok(())
    }

    fn validate(
        &self,
        origin: NodeId,
        origin_slot: usize,
        target: NodeId,
        target_slot: usize,
    ) -> Result<PortType, GraphError> {
        let source_node = self.node(origin).ok_or(GraphError::NodeNotFound(origin))?;
        let target_node = self.node(target).ok_or(GraphError::NodeNotFound(target))?;

        let source_port = source_node
            .outputs()
            .get(origin_slot)
            .ok_or(GraphError::SlotNotFound {
                node: origin,
                direction: "output",
                slot: origin_slot,
            })?;
        let target_port = target_node
            .inputs()
            .get(target_slot)
            .ok_or(GraphError::SlotNotFound {
                node: target,
                direction: "input",
                slot: target_slot,
            })?;

        if !source_port.ty.can_connect_to(&target_port.ty) {
            return Err(GraphError::IncompatiblePorts {
                from: source_port.ty.to_string(),
                to: target_port.ty.to_string(),
            });
        }

        // Only feedback nodes may read their own output
        if origin == target && !source_node.is_recursive() {
            return Err(GraphError::SelfLink(origin));
        }

        Ok(source_port.ty.clone())
    }

    fn attach(&mut self, link: Link) {
        if let Some(existing) = self.input_link(link.target, link.target_slot).map(|l| l.id) {
            debug!(link = ?existing, node = %link.target, slot = link.target_slot, "replacing input link");
            self.remove_link(existing);
        }
        self.outgoing.entry(link.origin).or_default().push(link.id);
        self.incoming.entry(link.target).or_default().push(link.id);
        self.links.insert(link.id, link);
    }

    /// Remove a link.
    pub fn remove_link(&mut self, link_id: LinkId) -> Option<Link> {
        let link = self.links.shift_remove(&link_id)?;
        if let Some(ids) = self.outgoing.get_mut(&link.origin) {
            ids.retain(|id| *id != link_id);
        }
        if let Some(ids) = self.incoming.get_mut(&link.target) {
            ids.retain(|id| *id != link_id);
        }
        Some(link)
    }

    /// Get a link by ID.
    pub fn link(&self, link_id: LinkId) -> Option<&Link> {
        self.links.get(&link_id)
    }

    /// Iterate all links in insertion order.
    pub fn links(&self) -> impl Iterator<Item = &Link> {
        self.links.values()
    }

    /// Get the number of links.
    pub fn link_count(&self) -> usize {
        self.links.len()
    }

    /// Links leaving a specific output slot.
    pub fn links_from(&self, node_id: NodeId, slot: usize) -> impl Iterator<Item = &Link> + '_ {
        self.outgoing_links(node_id)
            .filter(move |link| link.origin_slot == slot)
    }

    /// Links arriving at any input of a node.
    pub fn links_into(&self, node_id: NodeId) -> impl Iterator<Item = &Link> + '_ {
        self.incoming
            .get(&node_id)
            .into_iter()
            .flatten()
            .filter_map(move |id| self.links.get(id))
    }

    /// The link feeding a specific input slot, if connected.
    pub fn input_link(&self, node_id: NodeId, slot: usize) -> Option<&Link> {
        self.links_into(node_id).find(|link| link.target_slot == slot)
    }

    fn outgoing_links(&self, node_id: NodeId) -> impl Iterator<Item = &Link> + '_ {
        self.outgoing
            .get(&node_id)
            .into_iter()
            .flatten()
            .filter_map(move |id| self.links.get(id))
    }

    /// Nodes feeding this node's inputs.
    pub(crate) fn origins_of(&self, node_id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.links_into(node_id).map(|link| link.origin)
    }

    /// Nodes consuming this node's outputs.
    pub(crate) fn targets_of(&self, node_id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.outgoing_links(node_id).map(|link| link.target)
    }

    /// Drop links touching `node_id` whose slots disappeared or whose types no
    /// longer match, e.g. after the node rebuilt its ports.
    pub fn retain_valid_links(&mut self, node_id: NodeId) -> Vec<Link> {
        let candidates: Vec<LinkId> = self
            .incoming
            .get(&node_id)
            .into_iter()
            .chain(self.outgoing.get(&node_id))
            .flatten()
            .copied()
            .collect();

        let stale: Vec<LinkId> = candidates
            .into_iter()
            .filter(|id| {
                self.links.get(id).is_some_and(|link| {
                    self.validate(link.origin, link.origin_slot, link.target, link.target_slot)
                        .is_err()
                })
            })
            .collect();

        stale
            .into_iter()
            .filter_map(|id| self.remove_link(id))
            .collect()
    }

    /// Remove every node and link.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.links.clear();
        self.incoming.clear();
        self.outgoing.clear();
        self.next_node = 1;
        self.next_link = 1;
    }

    pub(crate) fn next_ids(&self) -> (u64, u64) {
        (self.next_node, self.next_link)
    }

    /// Make sure future IDs come after the given ones.
    pub(crate) fn reserve_ids(&mut self, last_node: u64, last_link: u64) {
        self.next_node = self.next_node.max(last_node + 1);
        self.next_link = self.next_link.max(last_link + 1);
    }
}

impl<G: 'static> Default for Graph<G> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    use crate::test_support::TestNode;

    fn graph() -> Graph<()> {
        Graph::new()
    }

    #[test]
    fn add_and_remove_nodes() {
        let mut graph = graph();
        let a = graph.add_node(TestNode::new("source").build());
        let b = graph.add_node(TestNode::new("sink").build());

        assert_eq!(graph.node_count(), 2);
        assert_ne!(a, b);

        let (node, severed) = graph.remove_node(a).unwrap();
        assert_eq!(node.type_name(), "source");
        assert!(severed.is_empty());
        assert_eq!(graph.node_count(), 1);
        assert!(graph.node(a).is_none());
        assert!(graph.node(b).is_some());
    }

    #[test]
    fn removal_keeps_storage_order() {
        let mut graph = graph();
        let a = graph.add_node(TestNode::new("a").build());
        let b = graph.add_node(TestNode::new("b").build());
        let c = graph.add_node(TestNode::new("c").build());

        graph.remove_node(a);
        assert_eq!(graph.node_ids().collect::<Vec<_>>(), vec![b, c]);
    }

    #[test]
    fn link_validation() {
        let mut graph = graph();
        let mesh = graph.add_node(TestNode::new("model").output("mesh", "mesh_t").build());
        let tex = graph.add_node(TestNode::new("texture").output("tex", "texture_t").build());
        let draw = graph.add_node(TestNode::new("drawcall").input("mesh", "mesh_t").build());

        assert!(graph.add_link(mesh, 0, draw, 0).is_ok());
        assert!(matches!(
            graph.add_link(tex, 0, draw, 0),
            Err(GraphError::IncompatiblePorts { .. })
        ));
        assert!(matches!(
            graph.add_link(mesh, 3, draw, 0),
            Err(GraphError::SlotNotFound { direction: "output", .. })
        ));
        assert!(matches!(
            graph.add_link(mesh, 0, NodeId::from(99), 0),
            Err(GraphError::NodeNotFound(_))
        ));
    }

    #[test]
    fn connecting_occupied_input_replaces_link() {
        let mut graph = graph();
        let a = graph.add_node(TestNode::new("a").output("out", "*").build());
        let b = graph.add_node(TestNode::new("b").output("out", "*").build());
        let sink = graph.add_node(TestNode::new("sink").input("in", "*").build());

        let first = graph.add_link(a, 0, sink, 0).unwrap();
        let second = graph.add_link(b, 0, sink, 0).unwrap();

        assert!(graph.link(first).is_none());
        assert_eq!(graph.input_link(sink, 0).unwrap().id, second);
        assert_eq!(graph.links_from(a, 0).count(), 0);
        assert_eq!(graph.link_count(), 1);
    }

    #[test]
    fn self_links_need_recursive_node() {
        let mut graph = graph();
        let plain = graph.add_node(TestNode::new("plain").input("in", "*").output("out", "*").build());
        let feedback = graph.add_node(
            TestNode::new("feedback")
                .input("in", "*")
                .output("out", "*")
                .recursive()
                .build(),
        );

        assert_eq!(graph.add_link(plain, 0, plain, 0), Err(GraphError::SelfLink(plain)));
        assert!(graph.add_link(feedback, 0, feedback, 0).is_ok());
    }

    #[test]
    fn removing_node_severs_links() {
        let mut graph = graph();
        let a = graph.add_node(TestNode::new("a").output("out", "*").build());
        let b = graph.add_node(TestNode::new("b").input("in", "*").output("out", "*").build());
        let c = graph.add_node(TestNode::new("c").input("in", "*").build());
        graph.add_link(a, 0, b, 0).unwrap();
        graph.add_link(b, 0, c, 0).unwrap();

        let (_, severed) = graph.remove_node(b).unwrap();
        assert_eq!(severed.len(), 2);
        assert_eq!(graph.link_count(), 0);
        assert_eq!(graph.targets_of(a).count(), 0);
        assert_eq!(graph.origins_of(c).count(), 0);
    }

    #[test]
    fn adjacency_follows_links() {
        let mut graph = graph();
        let a = graph.add_node(TestNode::new("a").output("x", "*").output("y", "*").build());
        let b = graph.add_node(TestNode::new("b").input("in", "*").build());
        let c = graph.add_node(TestNode::new("c").input("in", "*").build());
        graph.add_link(a, 0, b, 0).unwrap();
        graph.add_link(a, 1, c, 0).unwrap();

        assert_eq!(graph.targets_of(a).collect::<Vec<_>>(), vec![b, c]);
        assert_eq!(graph.origins_of(c).collect::<Vec<_>>(), vec![a]);
        assert_eq!(graph.links_from(a, 1).map(|l| l.target).collect::<Vec<_>>(), vec![c]);
    }

    #[test]
    fn find_nodes_by_type_in_storage_order() {
        let mut graph = graph();
        let p1 = graph.add_node(TestNode::new("pipeline").build());
        graph.add_node(TestNode::new("pass").build());
        let p2 = graph.add_node(TestNode::new("pipeline").build());

        assert_eq!(graph.find_nodes_by_type("pipeline"), vec![p1, p2]);
        assert!(graph.find_nodes_by_type("texture").is_empty());
    }

    #[test]
    fn insert_node_rejects_duplicates_and_bumps_ids() {
        let mut graph = graph();
        graph.insert_node(NodeId::from(10), "ten", TestNode::new("a").build()).unwrap();
        assert_eq!(
            graph.insert_node(NodeId::from(10), "again", TestNode::new("a").build()),
            Err(GraphError::DuplicateNode(NodeId::from(10)))
        );
        let next = graph.add_node(TestNode::new("b").build());
        assert_eq!(next.raw(), 11);
        assert_eq!(graph.title(NodeId::from(10)), Some("ten"));
    }

    #[test]
    fn retain_valid_links_drops_stale_slots() {
        let hidden = Arc::new(AtomicBool::new(false));
        let mut graph = graph();
        let a = graph.add_node(TestNode::new("a").output("out", "*").build());
        let b = graph.add_node(
            TestNode::new("b")
                .input("in", "*")
                .hide_ports_when(hidden.clone())
                .build(),
        );
        let link = graph.add_link(a, 0, b, 0).unwrap();
        assert!(graph.retain_valid_links(b).is_empty());

        // The consumer drops its input port
        hidden.store(true, Ordering::SeqCst);
        let dropped = graph.retain_valid_links(b);
        assert_eq!(dropped.len(), 1);
        assert_eq!(dropped[0].id, link);
        assert!(graph.input_link(b, 0).is_none());
        assert_eq!(graph.targets_of(a).count(), 0);
    }
}
