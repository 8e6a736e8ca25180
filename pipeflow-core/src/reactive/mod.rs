//! Change Propagation
//!
//! This module implements the incremental side of the engine: deciding which
//! nodes are stale, in what order they recompute, and who hears about it.
//!
//! # Concepts
//!
//! ## Dirty Sets
//!
//! Invalidated nodes wait in one of two sets. Ordinary nodes go into the dirty
//! set and are recomputed in dependency order. Recursive (feedback) nodes go
//! into the deferred set and recompute after everything else, reading what
//! their inputs produced in the previous cycle.
//!
//! ## Propagation
//!
//! Before a pass, the dirty set is expanded along output links so that every
//! downstream consumer of a changed node is recomputed too. Expansion stops at
//! feedback nodes.
//!
//! ## Events
//!
//! After a node recomputes, subscribers to that node (or to the event kind)
//! are notified. A subscriber may be a callback or another node; node
//! subscribers are marked dirty and run in the next pass.

mod dirty;
mod events;
mod propagate;
mod subscriber;
mod update;

pub use dirty::{DirtyState, DirtyTracker};
pub use events::{Dispatcher, Event, EventKind, Topic};
pub use propagate::{expand, Expansion};
pub use subscriber::{Subscriber, SubscriberId, Target};
pub use update::{UpdateContext, UpdateReport};
