//! Subscriber types for the event system.
//!
//! A Subscriber is anything that wants to hear about node changes: typically a
//! UI panel showing a node's value, or another node that derives state from
//! it.

use std::fmt;

use crate::graph::NodeId;

use super::events::{Event, Topic};

/// Unique identifier for a subscriber.
///
/// IDs are allocated by the dispatcher that owns the subscription, so they are
/// unique per engine rather than per process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(u64);

impl SubscriberId {
    pub(crate) fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// What happens when a subscriber is notified.
pub enum Target {
    /// Invoke a callback with the event.
    Callback(Box<dyn FnMut(&Event) + Send>),

    /// Mark another node dirty so it recomputes in the next Update Pass.
    Node(NodeId),
}

impl fmt::Debug for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Callback(_) => f.write_str("Callback(..)"),
            Target::Node(id) => f.debug_tuple("Node").field(id).finish(),
        }
    }
}

/// A subscription to a topic.
#[derive(Debug)]
pub struct Subscriber {
    id: SubscriberId,
    topic: Topic,
    target: Target,
}

impl Subscriber {
    pub(crate) fn new(id: SubscriberId, topic: Topic, target: Target) -> Self {
        Self { id, topic, target }
    }

    /// Get the subscriber's unique ID.
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// The topic this subscriber listens to.
    pub fn topic(&self) -> Topic {
        self.topic
    }

    /// The node this subscriber marks dirty, if it is a node subscription.
    pub fn target_node(&self) -> Option<NodeId> {
        match self.target {
            Target::Node(id) => Some(id),
            Target::Callback(_) => None,
        }
    }

    /// Deliver an event.
    ///
    /// Callbacks run immediately. Node targets are returned so the caller can
    /// mark them dirty once it is safe to touch the dirty sets.
    pub fn notify(&mut self, event: &Event) -> Option<NodeId> {
        match &mut self.target {
            Target::Callback(callback) => {
                callback(event);
                None
            }
            Target::Node(id) => Some(*id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[test]
    fn subscriber_notify_calls_callback() {
        let called = Arc::new(AtomicBool::new(false));
        let called_clone = called.clone();

        let mut subscriber = Subscriber::new(
            SubscriberId::from_raw(1),
            Topic::Node(NodeId::from(1)),
            Target::Callback(Box::new(move |_| {
                called_clone.store(true, Ordering::SeqCst);
            })),
        );

        assert!(!called.load(Ordering::SeqCst));
        assert_eq!(subscriber.notify(&Event::NodeChanged(NodeId::from(1))), None);
        assert!(called.load(Ordering::SeqCst));
    }

    #[test]
    fn node_target_is_returned() {
        let mut subscriber = Subscriber::new(
            SubscriberId::from_raw(2),
            Topic::Node(NodeId::from(1)),
            Target::Node(NodeId::from(9)),
        );

        assert_eq!(subscriber.target_node(), Some(NodeId::from(9)));
        assert_eq!(
            subscriber.notify(&Event::NodeChanged(NodeId::from(1))),
            Some(NodeId::from(9))
        );
    }
}
