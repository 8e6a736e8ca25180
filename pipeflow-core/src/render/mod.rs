//! Frame Rendering
//!
//! Everything the Frame Render Pass needs: the per-call [`RenderContext`],
//! the generation-checked [`ResourceTable`] that owns GPU objects, and the
//! pass itself.
//!
//! The engine is generic over the GPU context `G`. It never calls into `G`
//! itself; it only lends it to node callbacks and to [`GpuResource::destroy`].

mod context;
mod frame;
mod resource;

pub use context::{FrameInfo, RenderContext};
pub use frame::{FrameError, FrameReport};
pub use resource::{GpuResource, ResourceKey, ResourceTable, Scope};
