use std::sync::Arc;
use std::time::Duration;

use tracker_core::visuals::HIGHLIGHTER_NAME;
use tracker_core::{CombatantRecord, ItemId, MetadataKey, SceneItem, TrackerSceneState, Vector2};
use tracker_runtime::{InMemoryScene, Tracker, TrackerConfig};

fn marker_of(scene: &InMemoryScene) -> SceneItem {
    let state = TrackerSceneState::read(&scene.scene_metadata(), &MetadataKey::default())
        .expect("blob should decode")
        .expect("blob should exist");
    let id = state.highlighters.first().expect("one marker").clone();
    scene.item(&id).expect("marker should exist")
}

fn persisted_markers(scene: &InMemoryScene) -> Vec<ItemId> {
    TrackerSceneState::read(&scene.scene_metadata(), &MetadataKey::default())
        .expect("blob should decode")
        .map(|state| state.highlighters)
        .unwrap_or_default()
}

/// Markers present in the scene, with the entity each one is attached to.
fn markers_in_scene(scene: &InMemoryScene) -> Vec<(ItemId, Option<ItemId>)> {
    scene
        .snapshot()
        .into_iter()
        .filter(|item| item.name == HIGHLIGHTER_NAME)
        .map(|item| (item.id, item.attached_to))
        .collect()
}

fn ids(raw: &[&str]) -> Vec<ItemId> {
    raw.iter().map(|id| ItemId::from(*id)).collect()
}

async fn settle(ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
}

/// Scene edits reach the published order through the change listener.
#[tokio::test(start_paused = true)]
async fn listener_publishes_order_changes() {
    let scene = Arc::new(InMemoryScene::default().with_items([
        SceneItem::token("hero", "Hero"),
        SceneItem::token("orc", "Orc"),
    ]));
    let tracker = Tracker::builder(scene.clone()).build();
    let listener = tracker.spawn_listener();
    let mut orders = tracker.subscribe();

    tracker.track(&[ItemId::from("hero"), ItemId::from("orc")], 5).await;
    orders.changed().await.expect("order should be published");
    settle(10).await;

    let order = tracker.order();
    assert_eq!(order.items.len(), 2);
    assert_eq!(scene.panel_height(), Some(225));

    // Another client renames a token.
    assert!(scene.edit_item(&ItemId::from("orc"), |item| item.name = "Warlord".into()));
    settle(10).await;
    let labels: Vec<String> = tracker.order().items.iter().map(|row| row.label().to_owned()).collect();
    assert!(labels.contains(&"Warlord".to_owned()));

    listener.abort();
}

/// Resizing the active token moves its marker once the debounce elapsed.
#[tokio::test(start_paused = true)]
async fn marker_follows_scale_after_debounce() {
    let hero = ItemId::from("hero");
    let scene = Arc::new(InMemoryScene::default().with_items([SceneItem::token("hero", "Hero").at(500.0, 500.0)]));
    let tracker = Tracker::builder(scene.clone()).build();
    let listener = tracker.spawn_listener();

    tracker.track(std::slice::from_ref(&hero), 12).await;
    let outcome = tracker.advance_turn().await.expect("advance should succeed");
    assert_eq!(outcome.highlighted, vec![hero.clone()]);
    settle(200).await;

    // 150 dpi grid: half a cell above a 1x token plus the lift.
    let marker = marker_of(&scene);
    assert_eq!(marker.position, Vector2::new(500.0, 325.0));
    assert_eq!(marker.scale, Vector2::splat(0.5));
    assert_eq!(marker.attached_to, Some(hero.clone()));

    assert!(scene.edit_item(&hero, |item| item.scale = Vector2::splat(2.0)));
    settle(100).await;
    assert_eq!(marker_of(&scene).position.y, 325.0, "still debouncing");

    settle(100).await;
    assert_eq!(marker_of(&scene).position.y, 250.0);

    listener.abort();
}

/// A burst of edits collapses into one reposition.
#[tokio::test(start_paused = true)]
async fn bursts_collapse_into_one_reposition() {
    let hero = ItemId::from("hero");
    let scene = Arc::new(InMemoryScene::default().with_items([SceneItem::token("hero", "Hero").at(0.0, 400.0)]));
    let tracker = Tracker::builder(scene.clone()).build();
    let listener = tracker.spawn_listener();

    tracker.track(std::slice::from_ref(&hero), 1).await;
    tracker.advance_turn().await.expect("advance should succeed");
    settle(200).await;

    for step in 1..=3 {
        let scale = 1.0 + f64::from(step);
        assert!(scene.edit_item(&hero, |item| item.scale = Vector2::splat(scale)));
        settle(100).await;
        assert_eq!(marker_of(&scene).position.y, 225.0, "edit {step} restarted the debounce");
    }

    settle(100).await;
    // 4x token: 4 * 0.5 * 150 + 100 = 400 above the token.
    assert_eq!(marker_of(&scene).position.y, 0.0);

    listener.abort();
}

/// Marker count tracks the active slot across solo and group turns while
/// the listener reacts to every write the advance makes.
#[tokio::test(start_paused = true)]
async fn markers_match_active_slot_under_listener() {
    let scene = Arc::new(InMemoryScene::default().with_items([
        SceneItem::token("a", "A").at(0.0, 400.0),
        SceneItem::token("m1", "M1").at(200.0, 400.0),
        SceneItem::token("m2", "M2").at(300.0, 400.0),
        SceneItem::token("b", "B").at(500.0, 400.0),
    ]));
    let tracker = Tracker::builder(scene.clone()).build();
    let listener = tracker.spawn_listener();

    tracker.track(&ids(&["a"]), 15).await;
    tracker.track_group(&ids(&["m1", "m2"]), "Pack", 10).await.expect("group");
    tracker.track(&ids(&["b"]), 5).await;
    settle(300).await;

    // ================================================================
    // A -> Pack -> B -> A (rollover), settling after each step
    // ================================================================
    let turns: [&[&str]; 4] = [&["a"], &["m1", "m2"], &["b"], &["a"]];
    for expected in turns {
        let outcome = tracker.advance_turn().await.expect("advance should succeed");
        settle(300).await;

        let in_scene = markers_in_scene(&scene);
        let persisted = persisted_markers(&scene);
        assert_eq!(in_scene.len(), expected.len(), "turn of {}", outcome.active);
        assert_eq!(persisted.len(), expected.len(), "turn of {}", outcome.active);
        for (marker, target) in &in_scene {
            assert!(persisted.contains(marker), "marker {marker} is not persisted");
            let target = target.as_ref().expect("marker should be attached");
            assert!(expected.contains(&target.as_str()), "marker on {target}");
        }
    }

    listener.abort();
}

/// Reset under a running listener deletes indicators silently.
#[tokio::test(start_paused = true)]
async fn reset_under_listener_sends_no_fade_notice() {
    let scene = Arc::new(InMemoryScene::default().with_items([
        SceneItem::token("a", "A"),
        SceneItem::token("b", "B"),
    ]));
    let tracker = Tracker::builder(scene.clone()).build();
    let listener = tracker.spawn_listener();

    tracker.track(&ids(&["a", "b"]), 3).await;
    tracker.add_effect(&ids(&["a"]), "Rage", 3).await;
    settle(300).await;
    // The advance's writes give the listener the cycle that builds the
    // indicator.
    tracker.advance_turn().await.expect("advance should succeed");
    settle(300).await;

    let item = scene.item(&ItemId::from("a")).expect("token");
    let record = CombatantRecord::read(&item, &MetadataKey::default())
        .expect("record should decode")
        .expect("a is tracked");
    assert!(record.effects[0].process_bar.is_some(), "indicator should be built");
    assert!(scene.len() > 2);

    assert!(tracker.reset().await);
    settle(300).await;

    assert!(scene.notifications().is_empty(), "{:?}", scene.notifications());
    assert_eq!(scene.len(), 2);
    assert!(tracker.order().is_empty());
    assert!(tracker.effects().is_empty());

    listener.abort();
}

/// Losing the active combatant leaves the markers alone.
#[tokio::test(start_paused = true)]
async fn empty_selection_keeps_markers() {
    let scene = Arc::new(InMemoryScene::default().with_items([
        SceneItem::token("a", "A"),
        SceneItem::token("b", "B"),
    ]));
    let tracker = Tracker::builder(scene.clone()).build();
    let listener = tracker.spawn_listener();

    tracker.track(&ids(&["a"]), 10).await;
    tracker.track(&ids(&["b"]), 5).await;
    tracker.advance_turn().await.expect("advance should succeed");
    settle(300).await;
    let before = persisted_markers(&scene);
    assert_eq!(before.len(), 1);

    assert_eq!(tracker.untrack(&ids(&["a"])).await, 1);
    settle(300).await;

    assert!(tracker.order().active().is_none());
    assert_eq!(persisted_markers(&scene), before);
    assert_eq!(markers_in_scene(&scene).len(), 1);

    listener.abort();
}

/// The delayed recenter targets whoever is active when it fires.
#[tokio::test(start_paused = true)]
async fn recenter_follows_the_active_entity_at_fire_time() {
    let scene = Arc::new(InMemoryScene::default().with_items([
        SceneItem::token("a", "A").at(100.0, 100.0),
        SceneItem::token("b", "B").at(900.0, 700.0),
    ]));
    let centering = Tracker::builder(scene.clone())
        .config(TrackerConfig::default().with_auto_center(true))
        .build();
    let other_client = Tracker::builder(scene.clone()).build();

    centering.track(&ids(&["a"]), 10).await;
    centering.track(&ids(&["b"]), 5).await;

    let first = centering.advance_turn().await.expect("advance should succeed");
    assert_eq!(first.active, ItemId::from("a"));
    let second = other_client.advance_turn().await.expect("advance should succeed");
    assert_eq!(second.active, ItemId::from("b"));

    settle(150).await;
    let animations = scene.animations();
    assert_eq!(animations.len(), 1);
    assert_eq!(animations[0].center, Vector2::new(900.0, 700.0));
}
