//! Port Values
//!
//! Values are what flow across links at run time. The engine stores the last
//! value each node published on each output slot and hands a node the values
//! of its linked inputs. It never looks inside them.

use std::collections::HashMap;
use std::sync::Arc;

use smallvec::SmallVec;

use crate::graph::{Graph, NodeId};
use crate::render::ResourceKey;

/// A value published on an output slot.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Integer scalar (e.g. a frame counter).
    Int(i64),

    /// Floating point scalar.
    Float(f64),

    /// Small float vector (uniform values, colors).
    Vector(SmallVec<[f32; 4]>),

    /// Shared text.
    Text(Arc<str>),

    /// Structured data such as a parsed buffer description.
    Json(Arc<serde_json::Value>),

    /// Handle into the engine's GPU resource table.
    Resource(ResourceKey),
}

impl Value {
    /// Get the integer, if this is an `Int`.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Get the float, widening integers.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(v) => Some(*v),
            Value::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    /// Get the text, if this is `Text`.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(v) => Some(v),
            _ => None,
        }
    }

    /// Get the resource handle, if this is a `Resource`.
    pub fn as_resource(&self) -> Option<ResourceKey> {
        match self {
            Value::Resource(key) => Some(*key),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(text: &str) -> Self {
        Value::Text(Arc::from(text))
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        Value::Json(Arc::new(json))
    }
}

/// The last published value of every `(node, output slot)`.
#[derive(Debug, Default)]
pub struct PortValues {
    values: HashMap<(NodeId, usize), Value>,
}

impl PortValues {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a published value.
    pub fn get(&self, node: NodeId, slot: usize) -> Option<&Value> {
        self.values.get(&(node, slot))
    }

    /// Publish a value, replacing the previous one.
    pub fn set(&mut self, node: NodeId, slot: usize, value: Value) {
        self.values.insert((node, slot), value);
    }

    /// Withdraw a published value.
    pub fn unset(&mut self, node: NodeId, slot: usize) -> Option<Value> {
        self.values.remove(&(node, slot))
    }

    /// Forget everything a node published.
    pub fn clear_node(&mut self, node: NodeId) {
        self.values.retain(|(owner, _), _| *owner != node);
    }

    /// Forget everything.
    pub fn clear(&mut self) {
        self.values.clear();
    }
}

/// One resolved input slot.
#[derive(Debug, Clone)]
pub struct InputValue {
    /// Port name.
    pub name: String,

    /// Node and output slot the link comes from, if connected.
    pub origin: Option<(NodeId, usize)>,

    /// Value currently published by the origin, if any.
    pub value: Option<Value>,
}

/// A node's inputs resolved against the value table.
///
/// Built before a node callback runs so the callback can borrow the node
/// mutably while reading its inputs.
#[derive(Debug, Clone, Default)]
pub struct Inputs {
    slots: SmallVec<[InputValue; 4]>,
}

impl Inputs {
    /// Resolve every input slot of `node` by following its links.
    pub fn resolve<G: 'static>(graph: &Graph<G>, values: &PortValues, node: NodeId) -> Self {
        let Some(declared) = graph.node(node).map(|n| n.inputs()) else {
            return Self::default();
        };

        let slots = declared
            .iter()
            .enumerate()
            .map(|(slot, port)| {
                let origin = graph
                    .input_link(node, slot)
                    .map(|link| (link.origin, link.origin_slot));
                let value = origin.and_then(|(n, s)| values.get(n, s).cloned());
                InputValue {
                    name: port.name.clone(),
                    origin,
                    value,
                }
            })
            .collect();

        Self { slots }
    }

    /// Number of declared input slots.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Check if the node has no inputs.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Value arriving at a slot.
    pub fn get(&self, slot: usize) -> Option<&Value> {
        self.slots.get(slot).and_then(|s| s.value.as_ref())
    }

    /// Value arriving at the slot with this name.
    pub fn get_named(&self, name: &str) -> Option<&Value> {
        self.slots
            .iter()
            .find(|s| s.name == name)
            .and_then(|s| s.value.as_ref())
    }

    /// Full resolution record of a slot.
    pub fn slot(&self, slot: usize) -> Option<&InputValue> {
        self.slots.get(slot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::TestNode;

    #[test]
    fn value_accessors() {
        assert_eq!(Value::Int(3).as_int(), Some(3));
        assert_eq!(Value::Int(3).as_float(), Some(3.0));
        assert_eq!(Value::from("vs_main").as_text(), Some("vs_main"));
        assert_eq!(Value::Float(1.5).as_int(), None);
    }

    #[test]
    fn clear_node_only_drops_that_node() {
        let mut values = PortValues::new();
        let a = NodeId::from(1);
        let b = NodeId::from(2);
        values.set(a, 0, Value::Int(1));
        values.set(a, 1, Value::Int(2));
        values.set(b, 0, Value::Int(3));

        values.clear_node(a);
        assert!(values.get(a, 0).is_none());
        assert!(values.get(a, 1).is_none());
        assert_eq!(values.get(b, 0), Some(&Value::Int(3)));
    }

    #[test]
    fn inputs_follow_links() {
        let mut graph: Graph<()> = Graph::new();
        let src = graph.add_node(TestNode::new("src").output("a", "*").output("b", "*").build());
        let dst = graph.add_node(
            TestNode::new("dst")
                .input("first", "*")
                .input("second", "*")
                .input("loose", "*")
                .build(),
        );
        graph.add_link(src, 1, dst, 0).unwrap();
        graph.add_link(src, 0, dst, 1).unwrap();

        let mut values = PortValues::new();
        values.set(src, 0, Value::Int(10));
        values.set(src, 1, Value::Int(20));

        let inputs = Inputs::resolve(&graph, &values, dst);
        assert_eq!(inputs.len(), 3);
        assert_eq!(inputs.get(0), Some(&Value::Int(20)));
        assert_eq!(inputs.get_named("second"), Some(&Value::Int(10)));
        assert!(inputs.get(2).is_none());
        assert!(inputs.slot(2).unwrap().origin.is_none());
        assert_eq!(inputs.slot(0).unwrap().origin, Some((src, 1)));
    }
}
