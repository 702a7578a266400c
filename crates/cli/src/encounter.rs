use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use tracker_core::{InitiativeOrder, ItemId, RowKey, SceneItem, Vector2, ViewerRole};
use tracker_runtime::{InMemoryScene, Tracker, TrackerConfig, Viewport};

/// Lets the listener and debounced tasks catch up.
async fn settle(config: &TrackerConfig) {
    let wait = config.highlight_debounce.max(config.center_delay) + Duration::from_millis(50);
    tokio::time::sleep(wait).await;
}

fn print_order(step: &str, order: &InitiativeOrder) {
    println!("== {step} (round {})", order.round);
    for row in &order.items {
        let marker = if row.active { ">" } else { " " };
        let hidden = if row.visible { "" } else { " [hidden]" };
        let effects: Vec<String> = row
            .effects
            .iter()
            .map(|effect| format!("{} {}", effect.description, effect.rounds))
            .collect();
        println!(
            "{marker} {:>3}  {}{hidden}  {}",
            row.initiative,
            row.label(),
            effects.join(", ")
        );
    }
}

fn ids(raw: &[&str]) -> Vec<ItemId> {
    raw.iter().map(|id| ItemId::from(*id)).collect()
}

pub async fn run(config: TrackerConfig) -> Result<()> {
    let scene = Arc::new(
        InMemoryScene::with_capacity(ViewerRole::GameMaster, config.change_buffer).with_items([
            SceneItem::token("aria", "Aria").at(150.0, 300.0),
            SceneItem::token("brom", "Brom").at(300.0, 300.0),
            SceneItem::token("gob-1", "Goblin").at(600.0, 150.0),
            SceneItem::token("gob-2", "Goblin").at(750.0, 150.0),
            SceneItem::token("ogre", "Ogre")
                .at(900.0, 450.0)
                .scaled(Vector2::splat(2.0)),
        ]),
    );
    scene.set_viewport(Viewport {
        width: 1920.0,
        height: 1080.0,
        scale: 1.0,
    });

    let tracker = Tracker::builder(scene.clone()).config(config.clone()).build();
    let listener = tracker.spawn_listener();

    if tracker.track(&ids(&["aria"]), 17).await != 1 || tracker.track(&ids(&["brom"]), 9).await != 1 {
        bail!("party could not be tracked");
    }
    let goblins = tracker
        .track_group(&ids(&["gob-1", "gob-2"]), "Goblins", 12)
        .await
        .context("goblin group could not be created")?;
    tracker.track(&ids(&["ogre"]), 5).await;
    tracker.toggle_hidden(&ids(&["ogre"])).await;
    tracker
        .set_display_name(&RowKey::Combatant(ItemId::from("brom")), "Brom the Bold")
        .await;
    settle(&config).await;
    print_order("tracked", &tracker.order());

    for _ in 0..4 {
        let outcome = tracker.advance_turn().await.context("turn did not advance")?;
        if outcome.active == ItemId::from("aria") && outcome.round == 2 {
            tracker.add_effect(&ids(&["gob-1", "gob-2"]), "Entangled", 2).await;
            tracker.add_effect(&ids(&["ogre"]), "Bless", 1).await;
        }
        for effect in &outcome.expired {
            tracing::info!(effect = %effect.description, owner = %effect.name, "effect expired");
        }
        settle(&config).await;
        print_order(&format!("turn of {}", outcome.active), &tracker.order());
    }

    tracker.set_initiative(&RowKey::Group(goblins.clone()), 20).await;
    tracker.toggle_group_hidden(&goblins).await;
    settle(&config).await;
    print_order("goblins hide and rush", &tracker.order());

    for _ in 0..5 {
        tracker.advance_turn().await.context("turn did not advance")?;
        settle(&config).await;
    }
    print_order("later", &tracker.order());

    for notice in scene.notifications() {
        println!("notice: {notice}");
    }
    println!("viewport moves: {}", scene.animations().len());

    tracker.untrack_group(&goblins).await;
    if !tracker.reset().await {
        bail!("tracker reset failed");
    }
    settle(&config).await;
    print_order("reset", &tracker.order());
    println!("scene items left: {}", scene.len());

    listener.abort();
    Ok(())
}
