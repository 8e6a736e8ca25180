//! Render Context
//!
//! The handle a node gets during `render_acquire`, `render_draw` and
//! `render_release`. It lends out the GPU context and the resource table for
//! the duration of one call.

use crate::config::Viewport;
use crate::graph::{NodeId, Phase};
use crate::sources::SourceStore;
use crate::value::{Inputs, PortValues, Value};

use super::resource::{GpuResource, ResourceKey, ResourceTable, Scope};

/// Per-frame information.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameInfo {
    /// Index of the frame being rendered.
    pub index: u64,

    /// Output size.
    pub viewport: Viewport,
}

/// What a node sees during a render callback.
pub struct RenderContext<'a, G> {
    node: NodeId,
    phase: Phase,
    frame: FrameInfo,
    gpu: &'a mut G,
    inputs: Inputs,
    values: &'a mut PortValues,
    resources: &'a mut ResourceTable<G>,
    sources: &'a SourceStore,
}

impl<'a, G> RenderContext<'a, G> {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        node: NodeId,
        phase: Phase,
        frame: FrameInfo,
        gpu: &'a mut G,
        inputs: Inputs,
        values: &'a mut PortValues,
        resources: &'a mut ResourceTable<G>,
        sources: &'a SourceStore,
    ) -> Self {
        Self {
            node,
            phase,
            frame,
            gpu,
            inputs,
            values,
            resources,
            sources,
        }
    }

    /// The node being called.
    pub fn node_id(&self) -> NodeId {
        self.node
    }

    /// The callback being run.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Frame index and viewport.
    pub fn frame(&self) -> FrameInfo {
        self.frame
    }

    /// The GPU context.
    pub fn gpu(&mut self) -> &mut G {
        &mut *self.gpu
    }

    /// Value arriving at an input slot.
    pub fn input(&self, slot: usize) -> Option<&Value> {
        self.inputs.get(slot)
    }

    /// Value arriving at the input slot with this name.
    pub fn input_named(&self, name: &str) -> Option<&Value> {
        self.inputs.get_named(name)
    }

    /// Number of declared input slots.
    pub fn input_count(&self) -> usize {
        self.inputs.len()
    }

    /// The value this node last published on an output slot.
    pub fn output(&self, slot: usize) -> Option<&Value> {
        self.values.get(self.node, slot)
    }

    /// Publish a value on an output slot.
    pub fn set_output(&mut self, slot: usize, value: Value) {
        self.values.set(self.node, slot, value);
    }

    /// Store a resource that lives until the end of this frame.
    pub fn acquire<T: GpuResource<G>>(&mut self, resource: T) -> ResourceKey {
        self.resources.insert(self.node, Scope::Frame, resource)
    }

    /// Store a resource that survives across frames.
    pub fn retain<T: GpuResource<G>>(&mut self, resource: T) -> ResourceKey {
        self.resources.insert(self.node, Scope::Persistent, resource)
    }

    /// Destroy a resource this node owns.
    ///
    /// Returns `false` if the key is stale or belongs to another node.
    pub fn release(&mut self, key: ResourceKey) -> bool {
        if self.resources.owner(key) != Some(self.node) {
            return false;
        }
        self.resources.release(key, &mut *self.gpu)
    }

    /// Look up any live resource, including ones owned by upstream nodes.
    pub fn resource<T: 'static>(&self, key: ResourceKey) -> Option<&T> {
        self.resources.get(key)
    }

    /// Look up a live resource mutably.
    pub fn resource_mut<T: 'static>(&mut self, key: ResourceKey) -> Option<&mut T> {
        self.resources.get_mut(key)
    }

    /// Text of a named source.
    pub fn source(&self, name: &str) -> Option<&str> {
        self.sources.get(name)
    }
}
