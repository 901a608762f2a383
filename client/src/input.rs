//! Turns desired movement flags into a collision-resolved input intent.
//!
//! Raw key polling is the embedder's job; this module takes the flags it
//! produces, runs the one-step displacement through the movement resolver
//! against the room's objects plus this frame's personal-space promotions,
//! and yields the candidate position and sprite state to send upstream.

use shared::collision::{self, Dir};
use shared::messages::ClientMessage;
use shared::{Facing, GameObject, Rect};

/// Desired movement for one frame.
#[derive(Debug, Clone, Copy, Default)]
pub struct MoveFlags {
    pub up: bool,
    pub down: bool,
    pub left: bool,
    pub right: bool,
    pub crouch: bool,
}

/// A collision-resolved movement decision, ready to become an update
/// message.
#[derive(Debug, Clone, Copy)]
pub struct InputIntent {
    pub x: i32,
    pub y: i32,
    pub sprite: Facing,
    pub moved: bool,
}

impl InputIntent {
    pub fn into_message(self, room: u32) -> ClientMessage {
        ClientMessage::Update {
            x: self.x,
            y: self.y,
            sprite: self.sprite,
            room,
        }
    }
}

/// Resolves one frame of movement. Each cardinal direction is tested
/// independently; opposing flags cancel through their individual clamps.
/// `nearby` holds the latest interpolated boxes of other entities; those
/// intersecting both the personal-space bubble and our own box act as
/// obstacles for this frame only.
pub fn build_intent(
    rect: &Rect,
    speed: i32,
    flags: MoveFlags,
    objects: &[GameObject],
    nearby: &[Rect],
) -> InputIntent {
    let synthetic = collision::promote_nearby(rect, nearby);
    let obstacles = collision::obstacle_rects(objects, &synthetic);

    let mut x = rect.x;
    let mut y = rect.y;
    let mut sprite = None;

    if flags.up {
        let out = collision::step(rect, Dir::North, speed, &obstacles);
        y = out.y;
        sprite = Some(Facing::North);
    }
    if flags.down {
        let out = collision::step(rect, Dir::South, speed, &obstacles);
        y = out.y;
        sprite = Some(Facing::South);
    }
    if flags.left {
        let out = collision::step(rect, Dir::West, speed, &obstacles);
        x = out.x;
        sprite = Some(Facing::West);
    }
    if flags.right {
        let out = collision::step(rect, Dir::East, speed, &obstacles);
        x = out.x;
        sprite = Some(Facing::East);
    }
    if flags.crouch {
        sprite = Some(Facing::Crouch);
    }

    let moved = x != rect.x || y != rect.y || flags.crouch;
    InputIntent {
        x,
        y,
        sprite: sprite.unwrap_or(Facing::South),
        moved,
    }
}
