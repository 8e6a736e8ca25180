//! GPU Resource Table
//!
//! Nodes never hold raw GPU objects across frames by themselves. They hand
//! them to the engine's resource table and keep a [`ResourceKey`]. Keys are
//! generation-checked, so a key whose resource was destroyed resolves to
//! `None` instead of to whatever reused the slot.
//!
//! # Scopes
//!
//! - [`Scope::Frame`]: lives between `render_acquire` and `render_release`.
//!   Anything still alive when the frame ends is destroyed by the sweep.
//! - [`Scope::Persistent`]: survives frames (e.g. the previous-frame texture of
//!   a feedback node). Destroyed when released or when its owner is removed.

use std::any::Any;
use std::fmt;

use slotmap::SlotMap;
use tracing::{trace, warn};

use crate::graph::NodeId;

slotmap::new_key_type! {
    /// Generation-checked handle to a GPU resource.
    pub struct ResourceKey;
}

/// A GPU object that knows how to free itself.
pub trait GpuResource<G>: Send + 'static {
    /// Free the underlying GPU object.
    fn destroy(self: Box<Self>, gpu: &mut G);
}

/// How long a resource is expected to live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// One acquire/release window.
    Frame,

    /// Until released or until the owner is removed.
    Persistent,
}

struct Entry<G> {
    owner: NodeId,
    scope: Scope,
    resource: Box<dyn Any + Send>,
    destroy: fn(Box<dyn Any + Send>, &mut G),
}

fn destroy_as<G, T: GpuResource<G>>(resource: Box<dyn Any + Send>, gpu: &mut G) {
    if let Ok(resource) = resource.downcast::<T>() {
        resource.destroy(gpu);
    }
}

impl<G> Entry<G> {
    fn destroy(self, gpu: &mut G) {
        (self.destroy)(self.resource, gpu);
    }
}

/// Owner-tracked store of live GPU objects.
pub struct ResourceTable<G> {
    entries: SlotMap<ResourceKey, Entry<G>>,
}

impl<G> ResourceTable<G> {
    /// Create an empty table.
    pub fn new() -> Self {
        Self {
            entries: SlotMap::with_key(),
        }
    }

    /// Store a resource on behalf of `owner`.
    pub fn insert<T: GpuResource<G>>(&mut self, owner: NodeId, scope: Scope, resource: T) -> ResourceKey {
        let key = self.entries.insert(Entry {
            owner,
            scope,
            resource: Box::new(resource),
            destroy: destroy_as::<G, T>,
        });
        trace!(node = %owner, ?scope, ?key, "resource acquired");
        key
    }

    /// Look up a resource by key and type.
    pub fn get<T: 'static>(&self, key: ResourceKey) -> Option<&T> {
        self.entries.get(key).and_then(|e| e.resource.downcast_ref::<T>())
    }

    /// Look up a resource mutably by key and type.
    pub fn get_mut<T: 'static>(&mut self, key: ResourceKey) -> Option<&mut T> {
        self.entries
            .get_mut(key)
            .and_then(|e| e.resource.downcast_mut::<T>())
    }

    /// Node that owns a resource.
    pub fn owner(&self, key: ResourceKey) -> Option<NodeId> {
        self.entries.get(key).map(|e| e.owner)
    }

    /// Scope of a resource.
    pub fn scope(&self, key: ResourceKey) -> Option<Scope> {
        self.entries.get(key).map(|e| e.scope)
    }

    /// Check if a key still resolves.
    pub fn contains(&self, key: ResourceKey) -> bool {
        self.entries.contains_key(key)
    }

    /// Destroy one resource. Returns `false` for stale keys.
    pub fn release(&mut self, key: ResourceKey, gpu: &mut G) -> bool {
        match self.entries.remove(key) {
            Some(entry) => {
                entry.destroy(gpu);
                true
            }
            None => false,
        }
    }

    /// Destroy everything a node owns, whatever the scope.
    pub fn purge_owner(&mut self, owner: NodeId, gpu: &mut G) -> usize {
        self.drain_where(gpu, |e| e.owner == owner)
    }

    /// Destroy frame-scoped resources that survived their frame.
    ///
    /// Returns how many were swept; each one is logged as a leak.
    pub fn sweep_frame(&mut self, gpu: &mut G) -> usize {
        let leaked: Vec<(ResourceKey, NodeId)> = self
            .entries
            .iter()
            .filter(|(_, e)| e.scope == Scope::Frame)
            .map(|(key, e)| (key, e.owner))
            .collect();
        for (key, owner) in &leaked {
            warn!(node = %owner, ?key, "frame resource not released");
            if let Some(entry) = self.entries.remove(*key) {
                entry.destroy(gpu);
            }
        }
        leaked.len()
    }

    /// Destroy everything.
    pub fn clear(&mut self, gpu: &mut G) -> usize {
        self.drain_where(gpu, |_| true)
    }

    fn drain_where(&mut self, gpu: &mut G, pred: impl Fn(&Entry<G>) -> bool) -> usize {
        let keys: Vec<ResourceKey> = self
            .entries
            .iter()
            .filter(|(_, e)| pred(e))
            .map(|(key, _)| key)
            .collect();
        for key in &keys {
            if let Some(entry) = self.entries.remove(*key) {
                entry.destroy(gpu);
            }
        }
        keys.len()
    }

    /// Number of live resources.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if no resources are live.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<G> Default for ResourceTable<G> {
    fn default() -> Self {
        Self::new()
    }
}

impl<G> fmt::Debug for ResourceTable<G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceTable")
            .field("live", &self.entries.len())
            .finish()
    }
}
