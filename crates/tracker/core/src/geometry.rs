//! Placement math for countdown indicators and turn highlighters.

use std::f64::consts::{FRAC_PI_2, TAU};

use crate::scene::{PathCommand, SceneItem, Vector2};

/// Radius of the countdown arc.
pub const ARC_RADIUS: f64 = 20.0;

/// Arc segments drawn for a full circle.
const ARC_SEGMENTS_PER_TURN: f64 = 50.0;

/// Gap between an entity's edge and its countdown indicator.
const INDICATOR_GAP: f64 = 30.0;

/// Direction of the indicator relative to its owner (135°).
const INDICATOR_ANGLE: f64 = 3.0 * std::f64::consts::FRAC_PI_4;

/// Lift of a highlighter above its target's top edge.
const HIGHLIGHTER_LIFT: f64 = 100.0;

/// Group members carry smaller markers drawn closer to the token.
const GROUP_LIFT_REDUCTION: f64 = 50.0;

const SOLO_MARKER_SCALE: f64 = 0.5;
const GROUP_MARKER_SCALE: f64 = 0.25;

/// Sweep angle of a countdown arc in radians.
///
/// A missing or non-positive `total_rounds` falls back to `rounds`, which
/// draws a full circle. Rounds beyond the total still draw one full circle.
pub fn arc_sweep(rounds: i32, total_rounds: Option<i32>) -> f64 {
    let total = total_rounds.filter(|total| *total > 0).unwrap_or(rounds);
    if total <= 0 {
        return 0.0;
    }
    TAU * f64::from(rounds.clamp(0, total)) / f64::from(total)
}

/// Path commands drawing an arc of `angle` radians clockwise from 12 o'clock.
/// Angles outside `0..=2π` are clamped.
pub fn arc_path(angle: f64, radius: f64) -> Vec<PathCommand> {
    let angle = angle.clamp(0.0, TAU);
    let steps = (ARC_SEGMENTS_PER_TURN / TAU * angle).round().max(0.0) as usize;

    let mut commands = Vec::with_capacity(steps + 2);
    commands.push(PathCommand::Move(0.0, -radius));
    for i in 0..=steps {
        let t = if steps == 0 { 0.0 } else { i as f64 / steps as f64 };
        let theta = angle * t - FRAC_PI_2;
        commands.push(PathCommand::Line(radius * theta.cos(), radius * theta.sin()));
    }
    commands
}

/// Where a countdown indicator sits relative to its owner.
pub fn effect_anchor(owner: &SceneItem, grid_dpi: f64) -> Vector2 {
    let reach_x = owner.scale.x * 0.5 * grid_dpi + INDICATOR_GAP;
    let reach_y = owner.scale.y * 0.5 * grid_dpi + INDICATOR_GAP;
    Vector2::new(
        owner.position.x - INDICATOR_ANGLE.cos() * reach_x,
        owner.position.y - INDICATOR_ANGLE.sin() * reach_y,
    )
}

/// Resolved transform for one highlighter marker.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HighlighterPlacement {
    pub position: Vector2,
    pub scale: Vector2,
}

/// Places a highlighter above `target`. Group members get smaller markers
/// closer to the token so neighbouring members' markers do not overlap.
pub fn highlighter_placement(target: &SceneItem, grid_dpi: f64, grouped: bool) -> HighlighterPlacement {
    let mut lift = target.scale.y * 0.5 * grid_dpi + HIGHLIGHTER_LIFT;
    if grouped {
        lift -= GROUP_LIFT_REDUCTION;
    }

    HighlighterPlacement {
        position: Vector2::new(target.position.x, target.position.y - lift),
        scale: Vector2::splat(if grouped {
            GROUP_MARKER_SCALE
        } else {
            SOLO_MARKER_SCALE
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    #[test]
    fn sweep_scales_with_remaining_rounds() {
        assert!((arc_sweep(3, Some(3)) - TAU).abs() < EPS);
        assert!((arc_sweep(2, Some(3)) - TAU * 2.0 / 3.0).abs() < EPS);
        assert!((arc_sweep(4, None) - TAU).abs() < EPS);
        assert!((arc_sweep(4, Some(0)) - TAU).abs() < EPS);
        assert_eq!(arc_sweep(0, None), 0.0);
    }

    #[test]
    fn sweep_never_exceeds_a_full_circle() {
        assert!((arc_sweep(2_000_000_000, Some(1)) - TAU).abs() < EPS);
        assert!((arc_sweep(7, Some(3)) - TAU).abs() < EPS);
        assert_eq!(arc_sweep(-2, Some(3)), 0.0);

        assert_eq!(arc_path(1e12, ARC_RADIUS), arc_path(TAU, ARC_RADIUS));
        assert_eq!(arc_path(-1.0, ARC_RADIUS).len(), 2);
    }

    #[test]
    fn full_arc_closes_at_the_top() {
        let commands = arc_path(TAU, ARC_RADIUS);
        assert_eq!(commands.len(), 52);
        assert_eq!(commands[0], PathCommand::Move(0.0, -ARC_RADIUS));

        let PathCommand::Line(x, y) = commands[commands.len() - 1] else {
            panic!("arc must end with a line");
        };
        assert!(x.abs() < EPS);
        assert!((y + ARC_RADIUS).abs() < EPS);
    }

    #[test]
    fn empty_arc_is_a_single_point() {
        let commands = arc_path(0.0, ARC_RADIUS);
        assert_eq!(commands.len(), 2);
    }

    #[test]
    fn anchor_sits_up_and_right_of_owner() {
        let owner = SceneItem::token("a", "A").at(1000.0, 1000.0);
        let anchor = effect_anchor(&owner, 150.0);
        let reach = 0.5 * 150.0 + 30.0;
        let diag = std::f64::consts::FRAC_1_SQRT_2 * reach;
        assert!((anchor.x - (1000.0 + diag)).abs() < 1e-6);
        assert!((anchor.y - (1000.0 - diag)).abs() < 1e-6);
    }

    #[test]
    fn group_markers_are_smaller_and_lower() {
        let target = SceneItem::token("a", "A")
            .at(500.0, 500.0)
            .scaled(Vector2::new(1.0, 2.0));

        let solo = highlighter_placement(&target, 150.0, false);
        assert_eq!(solo.position, Vector2::new(500.0, 500.0 - (2.0 * 0.5 * 150.0 + 100.0)));
        assert_eq!(solo.scale, Vector2::splat(0.5));

        let grouped = highlighter_placement(&target, 150.0, true);
        assert_eq!(grouped.position.y, solo.position.y + 50.0);
        assert_eq!(grouped.scale, Vector2::splat(0.25));
    }
}
