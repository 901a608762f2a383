//! Per-axis movement resolution against room obstacles.
//!
//! Each cardinal direction is tested independently with a one-step
//! hypothetical displacement; a blocked step clamps the relevant coordinate
//! to the obstacle's boundary. The clamp side is chosen by minimum
//! penetration depth, evaluated in the fixed order Left, Right, Top,
//! Bottom (earlier side wins ties).

use crate::{GameObject, ObjectKind, Rect, BUBBLE_MARGIN};

/// Cardinal movement direction. North is -y (screen coordinates).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dir {
    North,
    South,
    East,
    West,
}

/// Which side of an obstacle a mover penetrated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Left,
    Right,
    Top,
    Bottom,
}

/// Outcome of a one-step hypothetical displacement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepOutcome {
    pub blocked: bool,
    pub x: i32,
    pub y: i32,
}

/// Picks the obstacle side with minimum penetration depth.
/// Ties break by evaluation order: Left, Right, Top, Bottom.
pub fn penetration_side(mover: &Rect, obstacle: &Rect) -> Side {
    let pen_left = mover.x + mover.w - obstacle.x;
    let pen_right = obstacle.x + obstacle.w - mover.x;
    let pen_top = mover.y + mover.h - obstacle.y;
    let pen_bottom = obstacle.y + obstacle.h - mover.y;

    let mut side = Side::Left;
    let mut min = pen_left;
    if pen_right < min {
        side = Side::Right;
        min = pen_right;
    }
    if pen_top < min {
        side = Side::Top;
        min = pen_top;
    }
    if pen_bottom < min {
        side = Side::Bottom;
    }
    side
}

/// Tests a one-step displacement of `rect` in `dir` against every obstacle.
/// Returns whether the step was blocked and the clamped position.
pub fn step(rect: &Rect, dir: Dir, speed: i32, obstacles: &[Rect]) -> StepOutcome {
    let mut moved = *rect;
    match dir {
        Dir::North => moved.y -= speed,
        Dir::South => moved.y += speed,
        Dir::East => moved.x += speed,
        Dir::West => moved.x -= speed,
    }

    let mut blocked = false;
    for obstacle in obstacles {
        if moved.intersects(obstacle) {
            blocked = true;
            match penetration_side(&moved, obstacle) {
                Side::Left => moved.x = obstacle.x - moved.w,
                Side::Right => moved.x = obstacle.x + obstacle.w,
                Side::Top => moved.y = obstacle.y - moved.h,
                Side::Bottom => moved.y = obstacle.y + obstacle.h,
            }
        }
    }

    StepOutcome {
        blocked,
        x: moved.x,
        y: moved.y,
    }
}

/// The margin-expanded box around a locally controlled entity, used to
/// decide which nearby entities are worth treating as obstacles.
pub fn bubble(rect: &Rect) -> Rect {
    rect.expand(BUBBLE_MARGIN)
}

/// Promotes every entity box intersecting both the owner's personal-space
/// bubble and the owner's own box into a synthetic obstacle, so overlapping
/// movers get clamped apart instead of passing through each other. The
/// result is a per-frame transient list, recomputed from the latest
/// interpolated positions; it is never appended to the room's permanent
/// object set.
pub fn promote_nearby(owner: &Rect, others: &[Rect]) -> Vec<GameObject> {
    let zone = bubble(owner);
    others
        .iter()
        .filter(|other| other.intersects(&zone) && other.intersects(owner))
        // Transient promotions never enter a room's stored set; the room
        // tag is a placeholder.
        .map(|r| GameObject::new(r.x, r.y, r.w, r.h, ObjectKind::Synthetic, 0))
        .collect()
}

/// Obstacle rects for a mover: blocking room objects plus this frame's
/// synthetic promotions.
pub fn obstacle_rects(objects: &[GameObject], synthetic: &[GameObject]) -> Vec<Rect> {
    objects
        .iter()
        .filter(|o| o.blocks_movement())
        .chain(synthetic.iter())
        .map(|o| o.rect())
        .collect()
}
