//! Round Advancement: the user-triggered "next turn" step.
//!
//! Not reentrant: two concurrent advances race on the store's
//! read-modify-write cycle and are not deduplicated here.

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use tracker_core::{
    EffectRecord, GroupId, ItemId, SceneItem, apply_turn, collect_tracked, plan_next_turn,
};

use crate::aggregator::TurnOrderAggregator;
use crate::config::TrackerConfig;
use crate::error::{Result, TrackerError};
use crate::highlighter::HighlighterSync;
use crate::scene::Bounds;
use crate::store::RecordStore;

/// Result of one advance.
#[derive(Clone, Debug, PartialEq)]
pub struct AdvanceOutcome {
    pub active: ItemId,
    pub group: Option<GroupId>,
    pub rollover: bool,
    pub round: u32,
    /// Effects that ran out on this step. Their indicators go away on the
    /// next aggregation cycle.
    pub expired: Vec<EffectRecord>,
    /// Entities the highlighters were moved to.
    pub highlighted: Vec<ItemId>,
}

pub struct RoundAdvancer {
    store: RecordStore,
    config: TrackerConfig,
    highlighter: Arc<HighlighterSync>,
    aggregator: Arc<TurnOrderAggregator>,
}

impl RoundAdvancer {
    pub fn new(
        store: RecordStore,
        config: TrackerConfig,
        highlighter: Arc<HighlighterSync>,
        aggregator: Arc<TurnOrderAggregator>,
    ) -> Self {
        Self {
            store,
            config,
            highlighter,
            aggregator,
        }
    }

    /// Moves the turn to the next slot. Returns `None` when nothing is
    /// tracked.
    pub async fn advance(&self) -> Result<Option<AdvanceOutcome>> {
        let items = self.store.tracked_items().await?;
        let groups = self.store.scene_state().await?.groups;

        let (tracked, malformed) = collect_tracked(&items, self.store.key());
        for error in &malformed {
            warn!(target: "tracker::advance", error = %error, "skipping malformed combatant record");
        }

        let Some(plan) = plan_next_turn(&tracked, &groups) else {
            debug!(target: "tracker::advance", "nothing tracked, advance ignored");
            return Ok(None);
        };

        let highlighted: Vec<ItemId> = match &plan.next_group {
            Some(group) => tracked
                .iter()
                .filter(|entry| entry.resolve_group(&groups).is_some_and(|g| &g.id == group))
                .map(|entry| entry.item.id.clone())
                .collect(),
            None => vec![plan.next_active.clone()],
        };

        let mut expired = Vec::new();
        self.store
            .update_records(|_, _| true, |_, record| expired.extend(apply_turn(record, &plan)))
            .await?;

        self.aggregator.publish_round(plan.round);

        info!(
            target: "tracker::advance",
            entity = %plan.next_active,
            round = plan.round,
            rollover = plan.rollover,
            expired = expired.len(),
            "turn advanced"
        );

        // Follows a discrete user action, so it bypasses the debounce.
        if self
            .highlighter
            .sync(&highlighted, plan.next_group.is_some())
            .await?
            .is_none()
        {
            debug!(target: "tracker::advance", "highlighter busy, next cycle repositions");
        }

        if self.config.auto_center {
            self.schedule_center();
        }

        Ok(Some(AdvanceOutcome {
            active: plan.next_active,
            group: plan.next_group,
            rollover: plan.rollover,
            round: plan.round,
            expired,
            highlighted,
        }))
    }

    /// Recenters the viewport once the configured delay passed, on whatever
    /// is active by then.
    fn schedule_center(&self) {
        let store = self.store.clone();
        let delay = self.config.center_delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let result = async {
                let Some(entity) = active_entity(&store).await? else {
                    debug!(target: "tracker::advance", "nothing active, not centering");
                    return Ok(false);
                };
                center_on(&store, &entity).await
            }
            .await;
            match result {
                Ok(_) => {}
                Err(e) if e.is_not_found() => {
                    warn!(target: "tracker::advance", error = %e, "center target vanished");
                }
                Err(e) => {
                    error!(target: "tracker::advance", error = %e, "viewport recenter failed");
                }
            }
        });
    }
}

/// The first tracked entity whose record is active, in scene order.
pub async fn active_entity(store: &RecordStore) -> Result<Option<ItemId>> {
    let items = store.tracked_items().await?;
    let (tracked, _) = collect_tracked(&items, store.key());
    Ok(tracked
        .into_iter()
        .find(|entry| entry.record.active)
        .map(|entry| entry.record.id))
}

/// Animates the viewport to center `entity`. Invisible entities are skipped.
pub async fn center_on(store: &RecordStore, entity: &ItemId) -> Result<bool> {
    let scene = store.scene();
    let filter = |item: &SceneItem| &item.id == entity;
    let item = scene
        .items(&filter)
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| TrackerError::CombatantNotFound(entity.clone()))?;

    if !item.visible {
        debug!(target: "tracker::advance", entity = %entity, "active entity hidden, not centering");
        return Ok(false);
    }

    let viewport = scene.viewport().await?;
    let scale = if viewport.scale > 0.0 { viewport.scale } else { 1.0 };
    let bounds = Bounds::centered(item.position, viewport.width / scale, viewport.height / scale);
    scene.animate_to_bounds(bounds).await?;
    Ok(true)
}
