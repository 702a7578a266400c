//! Scene item model as seen by the tracker.
//!
//! The shared scene is owned by an external store; these types describe the
//! subset of an item the tracker reads (identity, transform, visibility) and
//! the visual content it creates (markers, arcs, rings, labels). Tracker state
//! is attached to items through the namespaced [`Metadata`] map.
use std::fmt;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

/// Namespaced metadata blob attached to items and to the scene.
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// Identifier of a scene item.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(pub String);

impl ItemId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a fresh random identifier (128 bits, hex encoded).
    pub fn generate() -> Self {
        Self(hex::encode(rand::random::<[u8; 16]>()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ItemId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

/// 2D vector used for positions and scales.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Vector2 {
    pub x: f64,
    pub y: f64,
}

impl Vector2 {
    pub const ONE: Self = Self { x: 1.0, y: 1.0 };

    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub const fn splat(v: f64) -> Self {
        Self { x: v, y: v }
    }
}

/// Privilege of the client viewing the scene.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, strum::Display, strum::EnumString)]
#[strum(serialize_all = "UPPERCASE")]
pub enum ViewerRole {
    /// Game master: sees hidden combatants and may create visuals.
    #[strum(serialize = "GM")]
    GameMaster,
    Player,
}

impl ViewerRole {
    pub const fn is_privileged(self) -> bool {
        matches!(self, Self::GameMaster)
    }
}

/// Rendering layer of an item.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum Layer {
    #[default]
    Character,
    Attachment,
    Drawing,
}

bitflags! {
    /// Attachment behaviours an item opts out of when attached to a parent.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct AttachmentBehavior: u8 {
        const SCALE    = 0b0001;
        const ROTATION = 0b0010;
        const POSITION = 0b0100;
        const VISIBLE  = 0b1000;
    }
}

/// A single drawing instruction of a path item.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PathCommand {
    Move(f64, f64),
    Line(f64, f64),
}

#[derive(Clone, Debug, PartialEq)]
pub struct ImageContent {
    pub url: String,
    pub width: u32,
    pub height: u32,
    pub dpi: u32,
    pub offset: Vector2,
}

#[derive(Clone, Debug, PartialEq)]
pub struct PathContent {
    pub commands: Vec<PathCommand>,
    pub stroke_color: String,
    pub stroke_width: f64,
    pub fill_opacity: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShapeKind {
    Circle,
    Rectangle,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ShapeContent {
    pub kind: ShapeKind,
    pub width: f64,
    pub height: f64,
    pub stroke_color: String,
    pub stroke_opacity: f64,
    pub stroke_width: f64,
    pub fill_opacity: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TextContent {
    pub text: String,
    pub bold: bool,
    pub font_size: f64,
    pub width: f64,
    pub centered: bool,
}

/// What an item renders as.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum ItemContent {
    /// Character token placed by users.
    #[default]
    Token,
    Image(ImageContent),
    Path(PathContent),
    Shape(ShapeContent),
    Text(TextContent),
}

/// An item in the shared scene.
#[derive(Clone, Debug, PartialEq)]
pub struct SceneItem {
    pub id: ItemId,
    pub name: String,
    /// Plain text written on the item, preferred over `name` for display.
    pub label: String,
    pub layer: Layer,
    pub position: Vector2,
    pub scale: Vector2,
    pub rotation: f64,
    pub visible: bool,
    pub locked: bool,
    pub z_index: i32,
    pub attached_to: Option<ItemId>,
    pub disabled_attachment: AttachmentBehavior,
    pub content: ItemContent,
    pub metadata: Metadata,
}

impl SceneItem {
    /// Creates a visible character token at the origin.
    pub fn token(id: impl Into<ItemId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            label: String::new(),
            layer: Layer::Character,
            position: Vector2::default(),
            scale: Vector2::ONE,
            rotation: 0.0,
            visible: true,
            locked: false,
            z_index: 0,
            attached_to: None,
            disabled_attachment: AttachmentBehavior::empty(),
            content: ItemContent::Token,
            metadata: Metadata::new(),
        }
    }

    pub fn at(mut self, x: f64, y: f64) -> Self {
        self.position = Vector2::new(x, y);
        self
    }

    pub fn scaled(mut self, scale: Vector2) -> Self {
        self.scale = scale;
        self
    }

    pub fn labelled(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn invisible(mut self) -> Self {
        self.visible = false;
        self
    }

    /// Text shown for this item: its label, or its name when unlabelled.
    pub fn display_text(&self) -> &str {
        if self.label.is_empty() {
            &self.name
        } else {
            &self.label
        }
    }
}

impl From<String> for ItemId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_text_prefers_label() {
        let token = SceneItem::token("a", "Goblin");
        assert_eq!(token.display_text(), "Goblin");

        let labelled = token.labelled("Gobbo");
        assert_eq!(labelled.display_text(), "Gobbo");
    }

    #[test]
    fn generated_ids_are_distinct() {
        let a = ItemId::generate();
        let b = ItemId::generate();
        assert_eq!(a.as_str().len(), 32);
        assert_ne!(a, b);
    }

    #[test]
    fn viewer_role_parses_store_names() {
        assert_eq!("GM".parse::<ViewerRole>().ok(), Some(ViewerRole::GameMaster));
        assert_eq!("PLAYER".parse::<ViewerRole>().ok(), Some(ViewerRole::Player));
        assert!(ViewerRole::GameMaster.is_privileged());
        assert!(!ViewerRole::Player.is_privileged());
    }
}
