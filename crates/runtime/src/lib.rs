//! Async orchestration for the shared initiative tracker.
//!
//! This crate runs the turn-order engines against a shared [`Scene`] store.
//! Consumers build a [`Tracker`], spawn its change listener, and drive it
//! through commands while watching the published [`InitiativeOrder`].
//!
//! Modules are organized by responsibility:
//! - [`scene`] defines the store contract and an in-memory implementation
//! - [`aggregator`] rebuilds the order on every scene change
//! - [`advance`] moves the turn and rolls rounds over
//! - [`effects`] and [`highlighter`] keep the tracker's visuals in step
//! - [`groups`] owns the scene-wide group collection
//! - [`tracker`] is the façade that catches and logs every failure
//!
//! [`InitiativeOrder`]: tracker_core::InitiativeOrder
pub mod advance;
pub mod aggregator;
pub mod config;
pub mod effects;
pub mod error;
pub mod groups;
pub mod highlighter;
pub mod scene;
pub mod store;
pub mod sync;
pub mod tracker;

pub use advance::{AdvanceOutcome, RoundAdvancer, active_entity, center_on};
pub use aggregator::{RefreshReport, TurnOrderAggregator};
pub use config::TrackerConfig;
pub use effects::{EffectLifecycle, EffectReport};
pub use error::{Result, StoreError, StoreResult, TrackerError};
pub use groups::GroupRegistry;
pub use highlighter::HighlighterSync;
pub use scene::{
    Bounds, InMemoryScene, Scene, SceneEnvironment, SceneItems, SceneMetadata, Snapshot, Viewport,
};
pub use store::RecordStore;
pub use sync::{Debouncer, SingleFlight};
pub use tracker::{Tracker, TrackerBuilder};
