//! Scene store traits.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::broadcast;

use tracker_core::{ItemId, Metadata, SceneItem, Vector2, ViewerRole};

use crate::error::StoreResult;

/// Full item set delivered with every change notification.
pub type Snapshot = Arc<Vec<SceneItem>>;

/// Predicate selecting items for a query or batched update.
pub type ItemFilter<'a> = &'a (dyn Fn(&SceneItem) -> bool + Send + Sync);

/// Mutator applied once to every item matched by a batched update.
pub type ItemMutator<'a> = &'a mut (dyn FnMut(&mut [SceneItem]) + Send);

/// Viewport geometry in screen pixels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
    pub scale: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1280.0,
            height: 720.0,
            scale: 1.0,
        }
    }
}

/// Scene-space rectangle the viewport can animate to.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Bounds {
    pub center: Vector2,
    pub width: f64,
    pub height: f64,
    pub min: Vector2,
    pub max: Vector2,
}

impl Bounds {
    /// Rectangle of `width` × `height` centred on `center`.
    pub fn centered(center: Vector2, width: f64, height: f64) -> Self {
        Self {
            center,
            width,
            height,
            min: Vector2::new(center.x - width / 2.0, center.y - height / 2.0),
            max: Vector2::new(center.x + width / 2.0, center.y + height / 2.0),
        }
    }
}

/// Item storage of the shared scene.
///
/// A batched update applies its mutator to all matched items at once; later
/// reads observe either none or all of it. Nothing orders separate calls
/// against writes from other clients.
#[async_trait]
pub trait SceneItems: Send + Sync {
    /// Items matching `filter`, in scene order.
    async fn items(&self, filter: ItemFilter<'_>) -> StoreResult<Vec<SceneItem>>;

    /// Applies `mutate` to every item matching `filter` as one batch.
    async fn update_items(&self, filter: ItemFilter<'_>, mutate: ItemMutator<'_>) -> StoreResult<()>;

    async fn add_items(&self, items: Vec<SceneItem>) -> StoreResult<()>;

    async fn delete_items(&self, ids: &[ItemId]) -> StoreResult<()>;

    /// Subscribes to item changes made by any client, this one included.
    fn subscribe(&self) -> broadcast::Receiver<Snapshot>;
}

/// Scene-wide metadata, stored as one blob per namespaced key.
#[async_trait]
pub trait SceneMetadata: Send + Sync {
    async fn metadata(&self) -> StoreResult<Metadata>;

    /// Merges `update` into the scene metadata. Null values remove their key.
    async fn set_metadata(&self, update: Metadata) -> StoreResult<()>;
}

/// Everything else the tracker needs from the host.
#[async_trait]
pub trait SceneEnvironment: Send + Sync {
    /// Grid resolution in pixels per cell.
    async fn grid_dpi(&self) -> StoreResult<f64>;

    async fn viewer_role(&self) -> StoreResult<ViewerRole>;

    async fn viewport(&self) -> StoreResult<Viewport>;

    async fn animate_to_bounds(&self, bounds: Bounds) -> StoreResult<()>;

    /// Shows a transient notification to the local user.
    async fn notify(&self, message: &str) -> StoreResult<()>;

    /// Resizes the panel hosting the initiative list.
    async fn set_panel_height(&self, height: u32) -> StoreResult<()>;
}

/// Complete scene store interface.
pub trait Scene: SceneItems + SceneMetadata + SceneEnvironment {}

impl<T> Scene for T where T: SceneItems + SceneMetadata + SceneEnvironment + ?Sized {}
