//! Event Dispatch
//!
//! A typed replacement for string-keyed callback tables. Subscribers register
//! for a [`Topic`]: either every event about one node, or every event of one
//! [`EventKind`]. Delivery order is subscription order within a topic, node
//! topics first.

use std::collections::HashMap;

use indexmap::IndexMap;
use smallvec::SmallVec;

use crate::graph::{NodeId, Phase};

use super::subscriber::{Subscriber, SubscriberId, Target};

/// Discriminant of [`Event`], used as a dispatch key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// A node recomputed successfully.
    NodeChanged,
    /// A node callback failed.
    NodeFaulted,
    /// A node was removed from the graph.
    NodeRemoved,
    /// A named source was created.
    SourceAdded,
    /// A named source was deleted.
    SourceRemoved,
    /// A named source's text changed.
    SourceChanged,
    /// The graph was cleared or reloaded.
    GraphReset,
    /// A frame completed.
    FrameRendered,
    /// A frame was aborted by a panic.
    FrameAborted,
}

/// Something observers may care about.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// A node recomputed and published new values.
    NodeChanged(NodeId),

    /// A node callback returned an error.
    NodeFaulted {
        /// Failing node.
        node: NodeId,
        /// Where it failed.
        phase: Phase,
        /// Error text.
        message: String,
    },

    /// A node is being removed.
    NodeRemoved(NodeId),

    /// A source was added.
    SourceAdded(String),

    /// A source was removed.
    SourceRemoved(String),

    /// A source's text changed.
    SourceChanged(String),

    /// The graph was cleared or reloaded.
    GraphReset,

    /// A frame completed.
    FrameRendered {
        /// Index of the completed frame.
        frame: u64,
    },

    /// A frame was aborted.
    FrameAborted {
        /// Index of the aborted frame.
        frame: u64,
        /// Node whose callback panicked.
        node: NodeId,
    },
}

impl Event {
    /// The dispatch key of this event.
    pub fn kind(&self) -> EventKind {
        match self {
            Event::NodeChanged(_) => EventKind::NodeChanged,
            Event::NodeFaulted { .. } => EventKind::NodeFaulted,
            Event::NodeRemoved(_) => EventKind::NodeRemoved,
            Event::SourceAdded(_) => EventKind::SourceAdded,
            Event::SourceRemoved(_) => EventKind::SourceRemoved,
            Event::SourceChanged(_) => EventKind::SourceChanged,
            Event::GraphReset => EventKind::GraphReset,
            Event::FrameRendered { .. } => EventKind::FrameRendered,
            Event::FrameAborted { .. } => EventKind::FrameAborted,
        }
    }

    /// The node this event is about, if any.
    pub fn node(&self) -> Option<NodeId> {
        match self {
            Event::NodeChanged(node)
            | Event::NodeRemoved(node)
            | Event::NodeFaulted { node, .. }
            | Event::FrameAborted { node, .. } => Some(*node),
            _ => None,
        }
    }
}

/// What a subscriber listens to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    /// Every event about one node.
    Node(NodeId),

    /// Every event of one kind.
    Kind(EventKind),
}

/// Enum-keyed multimap of subscribers.
#[derive(Debug, Default)]
pub struct Dispatcher {
    next_id: u64,
    subscribers: IndexMap<SubscriberId, Subscriber>,
    by_topic: HashMap<Topic, SmallVec<[SubscriberId; 4]>>,
}

impl Dispatcher {
    /// Create an empty dispatcher.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback.
    pub fn subscribe<F>(&mut self, topic: Topic, callback: F) -> SubscriberId
    where
        F: FnMut(&Event) + Send + 'static,
    {
        self.insert(topic, Target::Callback(Box::new(callback)))
    }

    /// Register a node that should be marked dirty when `topic` fires.
    pub fn subscribe_node(&mut self, topic: Topic, observer: NodeId) -> SubscriberId {
        self.insert(topic, Target::Node(observer))
    }

    fn insert(&mut self, topic: Topic, target: Target) -> SubscriberId {
        self.next_id += 1;
        let id = SubscriberId::from_raw(self.next_id);
        self.subscribers.insert(id, Subscriber::new(id, topic, target));
        self.by_topic.entry(topic).or_default().push(id);
        id
    }

    /// Remove a subscription.
    pub fn unsubscribe(&mut self, id: SubscriberId) -> bool {
        let Some(subscriber) = self.subscribers.shift_remove(&id) else {
            return false;
        };
        let topic = subscriber.topic();
        if let Some(ids) = self.by_topic.get_mut(&topic) {
            ids.retain(|s| *s != id);
            if ids.is_empty() {
                self.by_topic.remove(&topic);
            }
        }
        true
    }

    /// Deliver an event to every interested subscriber.
    ///
    /// Returns the nodes that node-subscribers asked to mark dirty.
    pub fn dispatch(&mut self, event: &Event) -> Vec<NodeId> {
        let mut ids: SmallVec<[SubscriberId; 8]> = SmallVec::new();
        if let Some(node) = event.node() {
            if let Some(list) = self.by_topic.get(&Topic::Node(node)) {
                ids.extend(list.iter().copied());
            }
        }
        if let Some(list) = self.by_topic.get(&Topic::Kind(event.kind())) {
            ids.extend(list.iter().copied());
        }

        let mut marks = Vec::new();
        for id in ids {
            if let Some(subscriber) = self.subscribers.get_mut(&id) {
                if let Some(node) = subscriber.notify(event) {
                    marks.push(node);
                }
            }
        }
        marks
    }

    /// Drop every subscription on `node` and every subscription that would
    /// mark `node` dirty.
    pub fn purge_node(&mut self, node: NodeId) {
        let doomed: Vec<SubscriberId> = self
            .subscribers
            .values()
            .filter(|s| s.topic() == Topic::Node(node) || s.target_node() == Some(node))
            .map(Subscriber::id)
            .collect();
        for id in doomed {
            self.unsubscribe(id);
        }
    }

    /// Drop every node-scoped subscription, keeping event-kind listeners.
    pub fn clear_node_subscriptions(&mut self) {
        let doomed: Vec<SubscriberId> = self
            .subscribers
            .values()
            .filter(|s| matches!(s.topic(), Topic::Node(_)) || s.target_node().is_some())
            .map(Subscriber::id)
            .collect();
        for id in doomed {
            self.unsubscribe(id);
        }
    }

    /// Number of live subscriptions.
    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    /// Check if there are no subscriptions.
    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }
}
