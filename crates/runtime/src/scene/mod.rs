//! Scene store abstraction.
//!
//! The shared scene (items, scene metadata, viewport, viewer identity) is an
//! external collaborator. This module defines the contract the tracker
//! consumes and an in-memory implementation used by tests and the demo
//! binary.
//!
//! # Architecture
//!
//! ```text
//! Scene (composite)
//!   ├── SceneItems        item query / batched update / add / delete / changes
//!   ├── SceneMetadata     scene-wide metadata blob
//!   └── SceneEnvironment  grid, viewer role, viewport, notifications, panel
//! ```

mod memory;
mod traits;

pub use memory::InMemoryScene;
pub use traits::{
    Bounds, ItemFilter, ItemMutator, Scene, SceneEnvironment, SceneItems, SceneMetadata, Snapshot,
    Viewport,
};
