//! In-memory scene store for tests and offline demos.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tokio::sync::broadcast;

use tracker_core::{ItemId, Metadata, SceneItem, ViewerRole};

use super::traits::{
    Bounds, ItemFilter, ItemMutator, SceneEnvironment, SceneItems, SceneMetadata, Snapshot,
    Viewport,
};
use crate::error::{StoreError, StoreResult};

const DEFAULT_GRID_DPI: f64 = 150.0;
const DEFAULT_CHANGE_BUFFER: usize = 64;

struct SceneData {
    items: Vec<SceneItem>,
    metadata: Metadata,
    grid_dpi: f64,
    role: ViewerRole,
    viewport: Viewport,
    notifications: Vec<String>,
    animations: Vec<Bounds>,
    panel_height: Option<u32>,
}

/// Scene store kept entirely in process memory.
///
/// Behaves like the shared host store: item order is insertion order,
/// deleting an item also deletes everything attached to it, and every item
/// mutation that changes something is broadcast to subscribers. The store can
/// be switched offline to simulate a lost connection.
pub struct InMemoryScene {
    data: Mutex<SceneData>,
    changes: broadcast::Sender<Snapshot>,
    offline: AtomicBool,
}

impl InMemoryScene {
    pub fn new(role: ViewerRole) -> Self {
        Self::with_capacity(role, DEFAULT_CHANGE_BUFFER)
    }

    /// Store whose change channel buffers `buffer` notifications per
    /// subscriber.
    pub fn with_capacity(role: ViewerRole, buffer: usize) -> Self {
        let (changes, _) = broadcast::channel(buffer.max(1));
        Self {
            data: Mutex::new(SceneData {
                items: Vec::new(),
                metadata: Metadata::new(),
                grid_dpi: DEFAULT_GRID_DPI,
                role,
                viewport: Viewport::default(),
                notifications: Vec::new(),
                animations: Vec::new(),
                panel_height: None,
            }),
            changes,
            offline: AtomicBool::new(false),
        }
    }

    pub fn with_items(self, items: impl IntoIterator<Item = SceneItem>) -> Self {
        self.inspect().items.extend(items);
        self
    }

    pub fn set_role(&self, role: ViewerRole) {
        self.inspect().role = role;
    }

    pub fn set_grid_dpi(&self, dpi: f64) {
        self.inspect().grid_dpi = dpi;
    }

    pub fn set_viewport(&self, viewport: Viewport) {
        self.inspect().viewport = viewport;
    }

    /// While offline every store call fails with [`StoreError::Unavailable`].
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Current items in scene order.
    pub fn snapshot(&self) -> Vec<SceneItem> {
        self.inspect().items.clone()
    }

    pub fn item(&self, id: &ItemId) -> Option<SceneItem> {
        self.inspect().items.iter().find(|item| &item.id == id).cloned()
    }

    pub fn contains(&self, id: &ItemId) -> bool {
        self.inspect().items.iter().any(|item| &item.id == id)
    }

    pub fn len(&self) -> usize {
        self.inspect().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Notifications shown so far, oldest first.
    pub fn notifications(&self) -> Vec<String> {
        self.inspect().notifications.clone()
    }

    /// Viewport animations requested so far, oldest first.
    pub fn animations(&self) -> Vec<Bounds> {
        self.inspect().animations.clone()
    }

    pub fn panel_height(&self) -> Option<u32> {
        self.inspect().panel_height
    }

    pub fn scene_metadata(&self) -> Metadata {
        self.inspect().metadata.clone()
    }

    /// Edits one item the way another client would, bypassing the offline
    /// switch. Returns false if the item does not exist.
    pub fn edit_item(&self, id: &ItemId, edit: impl FnOnce(&mut SceneItem)) -> bool {
        let mut data = self.inspect();
        let Some(item) = data.items.iter_mut().find(|item| &item.id == id) else {
            return false;
        };
        edit(item);
        let snapshot = Arc::new(data.items.clone());
        drop(data);
        self.publish(snapshot);
        true
    }

    /// Inspection access that tolerates a poisoned lock.
    fn inspect(&self) -> MutexGuard<'_, SceneData> {
        self.data.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, SceneData>> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable);
        }
        self.data.lock().map_err(|_| StoreError::LockPoisoned)
    }

    fn publish(&self, snapshot: Snapshot) {
        // No subscribers is not an error.
        let _ = self.changes.send(snapshot);
    }
}

impl Default for InMemoryScene {
    fn default() -> Self {
        Self::new(ViewerRole::GameMaster)
    }
}

#[async_trait]
impl SceneItems for InMemoryScene {
    async fn items(&self, filter: ItemFilter<'_>) -> StoreResult<Vec<SceneItem>> {
        let data = self.lock()?;
        Ok(data.items.iter().filter(|item| filter(*item)).cloned().collect())
    }

    async fn update_items(&self, filter: ItemFilter<'_>, mutate: ItemMutator<'_>) -> StoreResult<()> {
        let mut data = self.lock()?;

        let indices: Vec<usize> = data
            .items
            .iter()
            .enumerate()
            .filter(|(_, item)| filter(*item))
            .map(|(index, _)| index)
            .collect();
        if indices.is_empty() {
            return Ok(());
        }

        let mut batch: Vec<SceneItem> = indices.iter().map(|&index| data.items[index].clone()).collect();
        mutate(batch.as_mut_slice());

        let mut changed = false;
        for (index, updated) in indices.into_iter().zip(batch) {
            if data.items[index] != updated {
                data.items[index] = updated;
                changed = true;
            }
        }

        if changed {
            let snapshot = Arc::new(data.items.clone());
            drop(data);
            self.publish(snapshot);
        }
        Ok(())
    }

    async fn add_items(&self, items: Vec<SceneItem>) -> StoreResult<()> {
        if items.is_empty() {
            return Ok(());
        }

        let mut data = self.lock()?;
        let mut ids: HashSet<&ItemId> = data.items.iter().map(|item| &item.id).collect();
        if let Some(duplicate) = items.iter().find(|item| !ids.insert(&item.id)) {
            return Err(StoreError::Rejected(format!("duplicate item id {}", duplicate.id)));
        }
        drop(ids);
        data.items.extend(items);

        let snapshot = Arc::new(data.items.clone());
        drop(data);
        self.publish(snapshot);
        Ok(())
    }

    async fn delete_items(&self, ids: &[ItemId]) -> StoreResult<()> {
        let mut data = self.lock()?;

        // Attachments go with their parent, transitively.
        let mut doomed: HashSet<ItemId> = ids.iter().cloned().collect();
        loop {
            let before = doomed.len();
            for item in &data.items {
                if let Some(parent) = &item.attached_to
                    && doomed.contains(parent)
                {
                    doomed.insert(item.id.clone());
                }
            }
            if doomed.len() == before {
                break;
            }
        }

        let before = data.items.len();
        data.items.retain(|item| !doomed.contains(&item.id));
        if data.items.len() == before {
            return Ok(());
        }

        let snapshot = Arc::new(data.items.clone());
        drop(data);
        self.publish(snapshot);
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<Snapshot> {
        self.changes.subscribe()
    }
}

#[async_trait]
impl SceneMetadata for InMemoryScene {
    async fn metadata(&self) -> StoreResult<Metadata> {
        Ok(self.lock()?.metadata.clone())
    }

    async fn set_metadata(&self, update: Metadata) -> StoreResult<()> {
        let mut data = self.lock()?;
        for (key, value) in update {
            if value.is_null() {
                data.metadata.remove(&key);
            } else {
                data.metadata.insert(key, value);
            }
        }
        Ok(())
    }
}

#[async_trait]
impl SceneEnvironment for InMemoryScene {
    async fn grid_dpi(&self) -> StoreResult<f64> {
        Ok(self.lock()?.grid_dpi)
    }

    async fn viewer_role(&self) -> StoreResult<ViewerRole> {
        Ok(self.lock()?.role)
    }

    async fn viewport(&self) -> StoreResult<Viewport> {
        Ok(self.lock()?.viewport)
    }

    async fn animate_to_bounds(&self, bounds: Bounds) -> StoreResult<()> {
        self.lock()?.animations.push(bounds);
        Ok(())
    }

    async fn notify(&self, message: &str) -> StoreResult<()> {
        self.lock()?.notifications.push(message.to_owned());
        Ok(())
    }

    async fn set_panel_height(&self, height: u32) -> StoreResult<()> {
        self.lock()?.panel_height = Some(height);
        Ok(())
    }
}
