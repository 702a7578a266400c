//! Builders for the scene items the tracker creates.

use crate::geometry::{ARC_RADIUS, arc_path, arc_sweep, effect_anchor};
use crate::record::{EffectRecord, ProcessBar};
use crate::scene::{
    AttachmentBehavior, ImageContent, ItemContent, ItemId, Layer, PathContent, SceneItem,
    ShapeContent, ShapeKind, TextContent, Vector2,
};

pub const HIGHLIGHTER_NAME: &str = "initiative-highlighter";
const HIGHLIGHTER_URL: &str = "https://i.ibb.co/Q3w3Sp6x/Select-Arrow.png";
const HIGHLIGHTER_WIDTH: u32 = 635;
const HIGHLIGHTER_HEIGHT: u32 = 405;

const INDICATOR_STROKE: f64 = 7.0;
const INDICATOR_Z: i32 = 1000;
const RING_SIZE: f64 = 40.0;
const LABEL_WIDTH: f64 = 100.0;
const LABEL_FONT_SIZE: f64 = 18.0;

fn visual(name: &str, layer: Layer, content: ItemContent) -> SceneItem {
    SceneItem {
        id: ItemId::generate(),
        name: name.to_owned(),
        label: String::new(),
        layer,
        position: Vector2::default(),
        scale: Vector2::ONE,
        rotation: 0.0,
        visible: true,
        locked: true,
        z_index: 0,
        attached_to: None,
        disabled_attachment: AttachmentBehavior::empty(),
        content,
        metadata: Default::default(),
    }
}

/// Unplaced "active turn" marker. Positioning happens on every sync.
pub fn build_highlighter() -> SceneItem {
    let mut marker = visual(
        HIGHLIGHTER_NAME,
        Layer::Attachment,
        ItemContent::Image(ImageContent {
            url: HIGHLIGHTER_URL.to_owned(),
            width: HIGHLIGHTER_WIDTH,
            height: HIGHLIGHTER_HEIGHT,
            dpi: 300,
            offset: Vector2::new(
                f64::from(HIGHLIGHTER_WIDTH) / 2.0,
                f64::from(HIGHLIGHTER_HEIGHT) / 2.0,
            ),
        }),
    );
    marker.rotation = 90.0;
    marker.scale = Vector2::splat(0.5);
    marker.disabled_attachment = AttachmentBehavior::SCALE | AttachmentBehavior::ROTATION;
    marker
}

/// Text rendered inside a countdown indicator.
pub fn label_text(rounds: i32) -> String {
    rounds.to_string()
}

/// The three items that make up one countdown indicator.
#[derive(Clone, Debug)]
pub struct EffectIndicator {
    pub path: SceneItem,
    pub ring: SceneItem,
    pub label: SceneItem,
}

impl EffectIndicator {
    pub fn handle(&self) -> ProcessBar {
        ProcessBar {
            path: self.path.id.clone(),
            background: self.ring.id.clone(),
            text: self.label.id.clone(),
        }
    }

    pub fn into_items(self) -> Vec<SceneItem> {
        vec![self.path, self.ring, self.label]
    }
}

/// Builds the radial countdown for `effect`, anchored next to `owner`.
pub fn build_effect_indicator(effect: &EffectRecord, owner: &SceneItem, grid_dpi: f64) -> EffectIndicator {
    let anchor = effect_anchor(owner, grid_dpi);

    let mut path = visual(
        "effect-countdown",
        Layer::Attachment,
        ItemContent::Path(PathContent {
            commands: arc_path(arc_sweep(effect.rounds, effect.total_rounds), ARC_RADIUS),
            stroke_color: "#FFFFFF".to_owned(),
            stroke_width: INDICATOR_STROKE,
            fill_opacity: 0.0,
        }),
    );
    path.position = anchor;
    path.z_index = INDICATOR_Z;
    path.attached_to = Some(owner.id.clone());
    path.disabled_attachment = AttachmentBehavior::SCALE | AttachmentBehavior::ROTATION;

    let mut ring = visual(
        "effect-countdown-ring",
        Layer::Drawing,
        ItemContent::Shape(ShapeContent {
            kind: ShapeKind::Circle,
            width: RING_SIZE,
            height: RING_SIZE,
            stroke_color: "#d6d6d6".to_owned(),
            stroke_opacity: 0.5,
            stroke_width: INDICATOR_STROKE,
            fill_opacity: 0.0,
        }),
    );
    ring.position = anchor;
    ring.attached_to = Some(path.id.clone());

    let mut label = visual(
        "effect-countdown-label",
        Layer::Attachment,
        ItemContent::Text(TextContent {
            text: label_text(effect.rounds),
            bold: true,
            font_size: LABEL_FONT_SIZE,
            width: LABEL_WIDTH,
            centered: true,
        }),
    );
    label.position = Vector2::new(anchor.x - LABEL_WIDTH / 2.0, anchor.y - LABEL_FONT_SIZE / 2.0);
    label.attached_to = Some(path.id.clone());

    EffectIndicator { path, ring, label }
}

#[cfg(test)]
mod tests {
    use std::f64::consts::TAU;

    use super::*;

    #[test]
    fn indicator_parts_are_chained_to_the_owner() {
        let owner = SceneItem::token("hero", "Hero").at(100.0, 100.0);
        let effect = EffectRecord::new(owner.id.clone(), "Hero", "Poison", 3);

        let indicator = build_effect_indicator(&effect, &owner, 150.0);
        assert_eq!(indicator.path.attached_to.as_ref(), Some(&owner.id));
        assert_eq!(indicator.ring.attached_to.as_ref(), Some(&indicator.path.id));
        assert_eq!(indicator.label.attached_to.as_ref(), Some(&indicator.path.id));

        let ItemContent::Path(path) = &indicator.path.content else {
            panic!("countdown must be a path");
        };
        assert_eq!(path.commands, arc_path(TAU, ARC_RADIUS));

        let ItemContent::Text(text) = &indicator.label.content else {
            panic!("label must be text");
        };
        assert_eq!(text.text, "3");

        let handle = indicator.handle();
        assert_eq!(handle.path, indicator.path.id);
        assert_eq!(indicator.into_items().len(), 3);
    }

    #[test]
    fn highlighter_is_locked_half_scale_marker() {
        let marker = build_highlighter();
        assert!(marker.locked);
        assert_eq!(marker.scale, Vector2::splat(0.5));
        assert!(marker.disabled_attachment.contains(AttachmentBehavior::SCALE));
        assert!(marker.disabled_attachment.contains(AttachmentBehavior::ROTATION));
        assert_eq!(marker.layer, Layer::Attachment);
    }
}
