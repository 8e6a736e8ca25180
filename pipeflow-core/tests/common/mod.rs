//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use parking_lot::Mutex;
use pipeflow_core::{
    GpuResource, Node, NodeError, NodeRecord, NodeRegistry, Phase, Port, RenderContext, ResourceKey,
    UpdateContext, Value,
};

/// Ordered record of everything the scripted nodes did.
pub type Log = Arc<Mutex<Vec<String>>>;

pub fn log() -> Log {
    Arc::new(Mutex::new(Vec::new()))
}

/// Stand-in GPU that remembers what was destroyed.
#[derive(Debug, Default)]
pub struct RecordingGpu {
    pub created: usize,
    pub destroyed: Vec<String>,
}

/// A fake texture.
pub struct Texture {
    pub label: String,
}

impl GpuResource<RecordingGpu> for Texture {
    fn destroy(self: Box<Self>, gpu: &mut RecordingGpu) {
        gpu.destroyed.push(self.label);
    }
}

/// Configurable node that logs every callback.
pub struct ScriptedNode {
    name: String,
    inputs: Vec<Port>,
    outputs: Vec<Port>,
    recursive: bool,
    valid: bool,
    log: Log,
    fail_on: Option<Phase>,
    panic_on: Option<Phase>,
    leak: bool,
    keep_history: bool,
    properties: serde_json::Value,
    scratch: Option<ResourceKey>,
    history: Option<ResourceKey>,
}

impl ScriptedNode {
    pub fn new(name: &str, log: &Log) -> Self {
        Self {
            name: name.to_string(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            recursive: false,
            valid: true,
            log: log.clone(),
            fail_on: None,
            panic_on: None,
            leak: false,
            keep_history: false,
            properties: serde_json::Value::Null,
            scratch: None,
            history: None,
        }
    }

    /// One wildcard input and one wildcard output.
    pub fn stage(name: &str, log: &Log) -> Self {
        Self::new(name, log).input("in", "*").output("out", "*")
    }

    pub fn input(mut self, name: &str, ty: &str) -> Self {
        self.inputs.push(Port::new(name, ty));
        self
    }

    pub fn output(mut self, name: &str, ty: &str) -> Self {
        self.outputs.push(Port::new(name, ty));
        self
    }

    pub fn recursive(mut self) -> Self {
        self.recursive = true;
        self
    }

    pub fn invalid(mut self) -> Self {
        self.valid = false;
        self
    }

    pub fn fail_on(mut self, phase: Phase) -> Self {
        self.fail_on = Some(phase);
        self
    }

    pub fn panic_on(mut self, phase: Phase) -> Self {
        self.panic_on = Some(phase);
        self
    }

    /// Never release the per-frame texture.
    pub fn leaking(mut self) -> Self {
        self.leak = true;
        self
    }

    /// Keep a texture alive across frames, like a feedback buffer.
    pub fn keeping_history(mut self) -> Self {
        self.keep_history = true;
        self
    }

    pub fn with_properties(mut self, properties: serde_json::Value) -> Self {
        self.properties = properties;
        self
    }

    pub fn boxed(self) -> Box<dyn Node<RecordingGpu>> {
        Box::new(self)
    }

    fn enter(&self, phase: Phase) -> Result<(), NodeError> {
        self.log.lock().push(format!("{phase}:{}", self.name));
        if self.panic_on == Some(phase) {
            panic!("{} exploded during {phase}", self.name);
        }
        if self.fail_on == Some(phase) {
            return Err(NodeError::Custom(format!("{} refused {phase}", self.name)));
        }
        Ok(())
    }
}

impl Node<RecordingGpu> for ScriptedNode {
    fn type_name(&self) -> &str {
        &self.name
    }

    fn inputs(&self) -> &[Port] {
        &self.inputs
    }

    fn outputs(&self) -> &[Port] {
        &self.outputs
    }

    fn is_recursive(&self) -> bool {
        self.recursive
    }

    fn is_valid(&self) -> bool {
        self.valid
    }

    fn recompute(&mut self, ctx: &mut UpdateContext<'_>) -> Result<(), NodeError> {
        self.enter(Phase::Recompute)?;
        let sum: i64 = (0..ctx.input_count())
            .filter_map(|slot| ctx.input(slot).and_then(Value::as_int))
            .sum();
        for slot in 0..self.outputs.len() {
            ctx.set_output(slot, Value::Int(sum + 1));
        }
        Ok(())
    }

    fn render_acquire(&mut self, ctx: &mut RenderContext<'_, RecordingGpu>) -> Result<(), NodeError> {
        self.enter(Phase::Acquire)?;
        ctx.gpu().created += 1;
        self.scratch = Some(ctx.acquire(Texture {
            label: self.name.clone(),
        }));
        if self.keep_history && self.history.is_none() {
            self.history = Some(ctx.retain(Texture {
                label: format!("{}:history", self.name),
            }));
        }
        Ok(())
    }

    fn render_draw(&mut self, ctx: &mut RenderContext<'_, RecordingGpu>) -> Result<(), NodeError> {
        self.enter(Phase::Draw)?;
        match self.scratch {
            Some(key) if ctx.resource::<Texture>(key).is_some() => Ok(()),
            _ => Err(NodeError::MissingInput("scratch texture".into())),
        }
    }

    fn render_release(&mut self, ctx: &mut RenderContext<'_, RecordingGpu>) -> Result<(), NodeError> {
        self.enter(Phase::Release)?;
        if let Some(key) = self.scratch.take() {
            if !self.leak {
                ctx.release(key);
            }
        }
        Ok(())
    }

    fn properties(&self) -> serde_json::Value {
        self.properties.clone()
    }
}

/// Registry that rebuilds scripted nodes as single-stage nodes, keeping properties.
pub fn scripted_registry(log: &Log, types: &[&str]) -> NodeRegistry<RecordingGpu> {
    let mut registry = NodeRegistry::new();
    for &name in types {
        let log = log.clone();
        registry.register(name, move |record: &NodeRecord| {
            Ok(ScriptedNode::stage(&record.node_type, &log)
                .with_properties(record.properties.clone())
                .boxed())
        });
    }
    registry
}
