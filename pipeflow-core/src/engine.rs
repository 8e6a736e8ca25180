//! The Engine
//!
//! [`Engine`] owns everything the passes touch: the graph, the dirty sets, the
//! published port values, the text sources, the event dispatcher, the GPU
//! resource table and the GPU context itself. There are no process-wide
//! statics; two engines never share state.
//!
//! Every mutation that can change a node's result marks the affected nodes
//! dirty, so the next [`Engine::run_update`] brings them up to date.

use tracing::{debug, info};

use crate::config::EngineConfig;
use crate::graph::{Graph, GraphError, Link, LinkId, Node, NodeFault, NodeId, Scheduler};
use crate::reactive::{DirtyState, DirtyTracker, Dispatcher, Event, SubscriberId, Topic};
use crate::render::ResourceTable;
use crate::sources::{SourceError, SourceStore};
use crate::value::{PortValues, Value};

/// Dataflow engine over a graph of nodes rendering through `G`.
pub struct Engine<G> {
    pub(crate) graph: Graph<G>,
    pub(crate) dirty: DirtyTracker,
    pub(crate) values: PortValues,
    pub(crate) sources: SourceStore,
    pub(crate) events: Dispatcher,
    pub(crate) resources: ResourceTable<G>,
    pub(crate) scheduler: Scheduler,
    pub(crate) config: EngineConfig,
    pub(crate) gpu: G,
    pub(crate) frame_count: u64,
}

impl<G: 'static> Engine<G> {
    /// Create an empty engine around a GPU context.
    pub fn new(gpu: G, config: EngineConfig) -> Self {
        Self {
            graph: Graph::new(),
            dirty: DirtyTracker::new(),
            values: PortValues::new(),
            sources: SourceStore::new(),
            events: Dispatcher::new(),
            resources: ResourceTable::new(),
            scheduler: Scheduler::new(config.max_schedule_sweeps),
            config,
            gpu,
            frame_count: 0,
        }
    }

    /// The engine settings.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Read-only view of the graph.
    pub fn graph(&self) -> &Graph<G> {
        &self.graph
    }

    /// The GPU context.
    pub fn gpu(&self) -> &G {
        &self.gpu
    }

    /// The GPU context, mutably.
    pub fn gpu_mut(&mut self) -> &mut G {
        &mut self.gpu
    }

    /// Live GPU resources.
    pub fn resources(&self) -> &ResourceTable<G> {
        &self.resources
    }

    // Nodes and links

    /// Add a node. New nodes start dirty.
    pub fn add_node(&mut self, node: Box<dyn Node<G>>) -> NodeId {
        let id = self.graph.add_node(node);
        debug!(node = %id, "node added");
        self.mark_dirty(id);
        id
    }

    /// Remove a node.
    ///
    /// The node is purged from the dirty sets, the value table, the resource
    /// table and every subscription. Nodes that lost an input become dirty.
    pub fn remove_node(&mut self, id: NodeId) -> Option<Box<dyn Node<G>>> {
        if !self.graph.contains(id) {
            return None;
        }
        self.emit(Event::NodeRemoved(id));

        let (node, severed) = self.graph.remove_node(id)?;
        self.dirty.purge(id);
        self.values.clear_node(id);
        self.events.purge_node(id);
        let freed = self.resources.purge_owner(id, &mut self.gpu);
        debug!(node = %id, links = severed.len(), resources = freed, "node removed");

        for link in severed {
            if link.target != id {
                self.mark_dirty(link.target);
            }
        }
        Some(node)
    }

    /// Connect an output slot to an input slot. The target becomes dirty.
    pub fn add_link(
        &mut self,
        origin: NodeId,
        origin_slot: usize,
        target: NodeId,
        target_slot: usize,
    ) -> Result<LinkId, GraphError> {
        let id = self.graph.add_link(origin, origin_slot, target, target_slot)?;
        self.mark_dirty(target);
        Ok(id)
    }

    /// Remove a link. The former target becomes dirty.
    pub fn remove_link(&mut self, id: LinkId) -> Option<Link> {
        let link = self.graph.remove_link(id)?;
        self.mark_dirty(link.target);
        Some(link)
    }

    /// Get a node by ID.
    pub fn node(&self, id: NodeId) -> Option<&dyn Node<G>> {
        self.graph.node(id)
    }

    /// Change a node's state from outside a pass, e.g. from a UI widget.
    ///
    /// The node is marked dirty afterwards and links its new ports no longer
    /// support are dropped.
    pub fn edit_node<R>(&mut self, id: NodeId, edit: impl FnOnce(&mut dyn Node<G>) -> R) -> Option<R> {
        let node = self.graph.node_mut(id)?;
        let result = edit(node);

        for link in self.graph.retain_valid_links(id) {
            if link.target != id {
                self.mark_dirty(link.target);
            }
        }
        self.mark_dirty(id);
        Some(result)
    }

    /// Display title of a node.
    pub fn title(&self, id: NodeId) -> Option<&str> {
        self.graph.title(id)
    }

    /// Rename a node.
    pub fn set_title(&mut self, id: NodeId, title: impl Into<String>) -> bool {
        self.graph.set_title(id, title)
    }

    /// All nodes of a type, in storage order.
    pub fn find_nodes_by_type(&self, type_name: &str) -> Vec<NodeId> {
        self.graph.find_nodes_by_type(type_name)
    }

    /// Links leaving an output slot.
    pub fn links_from(&self, id: NodeId, slot: usize) -> Vec<Link> {
        self.graph.links_from(id, slot).cloned().collect()
    }

    /// Remove every node, link and source.
    ///
    /// Event-kind subscriptions survive; node subscriptions and GPU resources
    /// do not.
    pub fn clear(&mut self) {
        let freed = self.resources.clear(&mut self.gpu);
        self.graph.clear();
        self.sources.clear();
        self.dirty.clear();
        self.values.clear();
        self.events.clear_node_subscriptions();
        info!(resources = freed, "graph cleared");
        self.emit(Event::GraphReset);
    }

    // Dirty tracking

    /// Mark a node dirty. Returns `false` for unknown nodes and for nodes that
    /// were already pending.
    pub fn mark_dirty(&mut self, id: NodeId) -> bool {
        match self.graph.node(id) {
            Some(node) => {
                let recursive = node.is_recursive();
                self.dirty.mark(id, recursive)
            }
            None => false,
        }
    }

    /// Dirty state of a node.
    pub fn dirty_state(&self, id: NodeId) -> DirtyState {
        self.dirty.state(id)
    }

    /// Check if an Update Pass has work to do.
    pub fn has_pending_updates(&self) -> bool {
        !self.dirty.is_clean()
    }

    // Values and faults

    /// Value a node last published on an output slot.
    pub fn value(&self, id: NodeId, slot: usize) -> Option<&Value> {
        self.values.get(id, slot)
    }

    /// Last failure recorded against a node.
    pub fn fault(&self, id: NodeId) -> Option<&NodeFault> {
        self.graph.fault(id)
    }

    // Events

    /// Call `callback` whenever an event matching `topic` fires.
    pub fn subscribe<F>(&mut self, topic: Topic, callback: F) -> SubscriberId
    where
        F: FnMut(&Event) + Send + 'static,
    {
        self.events.subscribe(topic, callback)
    }

    /// Mark `observer` dirty whenever `observed` changes.
    pub fn subscribe_node(&mut self, observed: NodeId, observer: NodeId) -> SubscriberId {
        self.events.subscribe_node(Topic::Node(observed), observer)
    }

    /// Cancel a subscription.
    pub fn unsubscribe(&mut self, id: SubscriberId) -> bool {
        self.events.unsubscribe(id)
    }

    pub(crate) fn emit(&mut self, event: Event) {
        for node in self.events.dispatch(&event) {
            self.mark_dirty(node);
        }
    }

    // Sources

    /// The text sources.
    pub fn sources(&self) -> &SourceStore {
        &self.sources
    }

    /// Text of a source.
    pub fn source(&self, name: &str) -> Option<&str> {
        self.sources.get(name)
    }

    /// Create a source. Nodes already referring to the name become dirty.
    pub fn add_source(&mut self, name: impl Into<String>, text: impl Into<String>) -> Result<(), SourceError> {
        let name = name.into();
        self.sources.add(name.clone(), text)?;
        self.mark_source_users(&name);
        self.emit(Event::SourceAdded(name));
        Ok(())
    }

    /// Delete a source. Nodes using it become dirty.
    pub fn remove_source(&mut self, name: &str) -> Result<String, SourceError> {
        let text = self.sources.remove(name)?;
        self.mark_source_users(name);
        self.emit(Event::SourceRemoved(name.to_string()));
        Ok(text)
    }

    /// Replace a source's text. Nodes using it become dirty if it changed.
    pub fn set_source(&mut self, name: &str, text: impl Into<String>) -> Result<bool, SourceError> {
        let changed = self.sources.set(name, text)?;
        if changed {
            self.mark_source_users(name);
            self.emit(Event::SourceChanged(name.to_string()));
        }
        Ok(changed)
    }

    fn mark_source_users(&mut self, name: &str) {
        let users: Vec<NodeId> = self
            .graph
            .nodes()
            .filter(|(_, node)| node.uses_source(name))
            .map(|(id, _)| id)
            .collect();
        for id in users {
            self.mark_dirty(id);
        }
    }
}

impl<G: Default + 'static> Default for Engine<G> {
    fn default() -> Self {
        Self::new(G::default(), EngineConfig::default())
    }
}
