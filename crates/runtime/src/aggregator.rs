//! Turn-Order Aggregator: the reactive core.
//!
//! Every scene change runs one [`refresh`](TurnOrderAggregator::refresh)
//! cycle over the full item set. The cycle is idempotent: the tracker's own
//! writes trigger it again, so every side effect is gated on an actual
//! change.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::watch;
use tracing::{debug, error, warn};

use tracker_core::{
    GroupId, GroupRecord, InitiativeOrder, ItemId, SceneItem, Tracked, Vector2, ViewerRole,
    build_order, collect_effects, collect_tracked,
};

use crate::config::TrackerConfig;
use crate::effects::{EffectLifecycle, EffectReport};
use crate::error::Result;
use crate::highlighter::HighlighterSync;
use crate::store::RecordStore;
use crate::sync::Debouncer;

/// Entities that should carry a highlighter, with the scales last seen.
#[derive(Clone, Debug, Default, PartialEq)]
struct Selection {
    group: Option<GroupId>,
    targets: Vec<(ItemId, Vector2)>,
}

impl Selection {
    fn ids(&self) -> Vec<ItemId> {
        self.targets.iter().map(|(id, _)| id.clone()).collect()
    }
}

/// What one refresh cycle did.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RefreshReport {
    pub rows: usize,
    pub round: u32,
    pub effects: EffectReport,
    pub pruned: usize,
    pub reposition_scheduled: bool,
}

pub struct TurnOrderAggregator {
    store: RecordStore,
    config: TrackerConfig,
    effects: Arc<EffectLifecycle>,
    highlighter: Arc<HighlighterSync>,
    order: watch::Sender<InitiativeOrder>,
    last_selection: Arc<Mutex<Selection>>,
    reposition: Debouncer,
    /// Bumped when a reset starts and again when it ends; odd while the
    /// tracker is clearing the scene.
    epoch: AtomicU64,
}

impl TurnOrderAggregator {
    pub fn new(
        store: RecordStore,
        config: TrackerConfig,
        effects: Arc<EffectLifecycle>,
        highlighter: Arc<HighlighterSync>,
    ) -> Self {
        let (order, _) = watch::channel(InitiativeOrder::default());
        let reposition = Debouncer::new(config.highlight_debounce);
        Self {
            store,
            config,
            effects,
            highlighter,
            order,
            last_selection: Arc::new(Mutex::new(Selection::default())),
            reposition,
            epoch: AtomicU64::new(0),
        }
    }

    /// Receiver of the published order; always holds the latest value.
    pub fn subscribe(&self) -> watch::Receiver<InitiativeOrder> {
        self.order.subscribe()
    }

    pub fn current(&self) -> InitiativeOrder {
        self.order.borrow().clone()
    }

    /// Overrides the published round until the next cycle recomputes it.
    pub fn publish_round(&self, round: u32) {
        self.order.send_if_modified(|order| {
            let changed = order.round != round;
            order.round = round;
            changed
        });
    }

    /// Suspends aggregation while the tracker clears the scene. Cycles
    /// running across the boundary are dropped.
    pub fn begin_reset(&self) {
        self.epoch.fetch_add(1, Ordering::SeqCst);
        self.reposition.cancel();
    }

    /// Resumes aggregation. After a completed reset it starts from a clean
    /// slate: no previous effects, no previous selection, an empty order.
    /// A failed reset keeps what was published.
    pub fn finish_reset(&self, completed: bool) {
        self.reposition.cancel();
        *self.last_selection.lock().unwrap_or_else(PoisonError::into_inner) = Selection::default();
        if completed {
            self.effects.forget();
            self.order.send_if_modified(|published| {
                let empty = InitiativeOrder::default();
                if *published == empty {
                    return false;
                }
                *published = empty;
                true
            });
        }
        self.epoch.fetch_add(1, Ordering::SeqCst);
    }

    fn is_stale(&self, epoch: u64) -> bool {
        epoch % 2 == 1 || self.epoch.load(Ordering::SeqCst) != epoch
    }

    /// Runs one aggregation cycle over `items`, which must come from a fresh
    /// store read.
    ///
    /// Returns `None` when a reset started or was in progress during the
    /// cycle; nothing is published then.
    pub async fn refresh(&self, items: &[SceneItem]) -> Result<Option<RefreshReport>> {
        let epoch = self.epoch.load(Ordering::SeqCst);
        if self.is_stale(epoch) {
            debug!(target: "tracker::aggregator", "reset in progress, cycle skipped");
            return Ok(None);
        }

        let scene = self.store.scene();
        let groups = self.store.scene_state().await?.groups;
        let role = scene.viewer_role().await?;

        let (tracked, malformed) = collect_tracked(items, self.store.key());
        for error in &malformed {
            warn!(target: "tracker::aggregator", error = %error, "skipping malformed combatant record");
        }

        let order = build_order(&tracked, &groups, role);
        let mut report = RefreshReport {
            rows: order.items.len(),
            round: order.round,
            ..RefreshReport::default()
        };

        let effects = collect_effects(&order, &tracked);
        let selection = active_selection(&order, &tracked, &groups);

        if self.is_stale(epoch) {
            debug!(target: "tracker::aggregator", "reset started mid-cycle, cycle dropped");
            return Ok(None);
        }

        self.order.send_if_modified(|published| {
            if *published == order {
                return false;
            }
            *published = order.clone();
            true
        });

        report.effects = self.effects.reconcile(effects, role).await?;

        scene
            .set_panel_height(self.config.panel.height_for(report.rows))
            .await?;

        report.pruned = self.highlighter.prune().await?;

        report.reposition_scheduled = self.schedule_reposition(selection, role);

        debug!(
            target: "tracker::aggregator",
            rows = report.rows,
            round = report.round,
            "initiative order refreshed"
        );
        Ok(Some(report))
    }

    /// Debounces a highlighter pass when the selection or a target's scale
    /// changed since the previous cycle.
    fn schedule_reposition(&self, selection: Selection, role: ViewerRole) -> bool {
        if !role.is_privileged() {
            return false;
        }

        {
            let mut last = self.last_selection.lock().unwrap_or_else(PoisonError::into_inner);
            let previous: HashMap<&ItemId, Vector2> =
                last.targets.iter().map(|(id, scale)| (id, *scale)).collect();
            let unchanged = last.group == selection.group
                && last.targets.len() == selection.targets.len()
                && selection
                    .targets
                    .iter()
                    .all(|(id, scale)| previous.get(id) == Some(scale));
            if unchanged {
                return false;
            }
            *last = selection.clone();
        }

        if selection.targets.is_empty() {
            // Nobody active: markers stay where they are.
            self.reposition.cancel();
            return false;
        }

        let highlighter = Arc::clone(&self.highlighter);
        let last_selection = Arc::clone(&self.last_selection);
        let targets = selection.ids();
        let grouped = selection.group.is_some();
        self.reposition.schedule(async move {
            let placed = match highlighter.sync(&targets, grouped).await {
                Ok(placed) => placed,
                Err(e) => {
                    error!(target: "tracker::highlighter", error = %e, "highlighter reposition failed");
                    None
                }
            };
            if placed.is_none() {
                // Forget the selection so the next cycle schedules again.
                *last_selection.lock().unwrap_or_else(PoisonError::into_inner) = Selection::default();
            }
        });
        debug!(target: "tracker::aggregator", targets = selection.targets.len(), "highlighter reposition scheduled");
        true
    }
}

/// The active selection of `order`: the active combatant, or every
/// member of the active group.
fn active_selection(order: &InitiativeOrder, tracked: &[Tracked<'_>], groups: &[GroupRecord]) -> Selection {
    let Some(active) = order.active() else {
        return Selection::default();
    };

    match active.group() {
        Some(group) => Selection {
            group: Some(group.clone()),
            targets: tracked
                .iter()
                .filter(|entry| entry.resolve_group(groups).is_some_and(|g| &g.id == group))
                .map(|entry| (entry.item.id.clone(), entry.item.scale))
                .collect(),
        },
        None => Selection {
            group: None,
            targets: tracked
                .iter()
                .find(|entry| entry.item.id == active.character_id)
                .map(|entry| vec![(entry.item.id.clone(), entry.item.scale)])
                .unwrap_or_default(),
        },
    }
}
