//! Deterministic turn-order logic and data types for the initiative tracker.
//!
//! `tracker-core` defines the shape of the shared scene as this tracker sees
//! it, the records persisted into entity and scene metadata, and the pure
//! computations layered on top of them: the derived initiative order, the
//! next-turn plan, and the placement of countdown indicators and turn
//! highlighters. The async runtime feeds store snapshots into these functions
//! and writes the results back.
pub mod error;
pub mod geometry;
pub mod order;
pub mod record;
pub mod rotation;
pub mod scene;
pub mod visuals;

pub use error::RecordError;
pub use geometry::{
    ARC_RADIUS, HighlighterPlacement, arc_path, arc_sweep, effect_anchor,
    highlighter_placement,
};
pub use order::{
    InitiativeItem, InitiativeOrder, PanelLayout, RowKey, Tracked, build_order, collect_effects,
    collect_tracked,
};
pub use record::{
    CombatantRecord, EffectRecord, GroupId, GroupRecord, MetadataKey, ProcessBar, TrackerSceneState,
};
pub use rotation::{TurnPlan, apply_turn, plan_next_turn};
pub use scene::{
    AttachmentBehavior, ImageContent, ItemContent, ItemId, Layer, Metadata, PathCommand,
    PathContent, SceneItem, ShapeContent, ShapeKind, TextContent, Vector2, ViewerRole,
};
pub use visuals::{EffectIndicator, build_effect_indicator, build_highlighter, label_text};
