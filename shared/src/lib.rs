use serde::{Deserialize, Serialize};

pub mod collision;
pub mod framer;
pub mod messages;

pub const ROOM_WIDTH: i32 = 800;
pub const ROOM_HEIGHT: i32 = 600;
pub const PLAYER_SIZE: i32 = 32;
pub const ENEMY_SIZE: i32 = 32;
pub const PLAYER_SPEED: i32 = 5;
pub const ENEMY_SPEED: i32 = 3;
pub const BUBBLE_MARGIN: i32 = 8;
pub const MAX_ENEMIES_PER_ROOM: usize = 4;
pub const MAX_SPAWN_ATTEMPTS: u32 = 32;
pub const FALLBACK_SPAWN: (i32, i32) = (64, 64);
pub const STARTING_SHIELDS: i32 = 3;
pub const INTERP_RATE: f32 = 10.0;

/// Axis-aligned bounding box in integer pixel units.
/// Screen coordinates: y grows downward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
}

impl Rect {
    pub fn new(x: i32, y: i32, w: i32, h: i32) -> Self {
        Self { x, y, w, h }
    }

    pub fn intersects(&self, other: &Rect) -> bool {
        !(self.x + self.w <= other.x
            || other.x + other.w <= self.x
            || self.y + self.h <= other.y
            || other.y + other.h <= self.y)
    }

    /// The rect grown by `margin` on all four sides.
    pub fn expand(&self, margin: i32) -> Rect {
        Rect {
            x: self.x - margin,
            y: self.y - margin,
            w: self.w + 2 * margin,
            h: self.h + 2 * margin,
        }
    }

    pub fn center(&self) -> (i32, i32) {
        (self.x + self.w / 2, self.y + self.h / 2)
    }
}

/// Sprite/facing state carried in position updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Facing {
    North,
    East,
    South,
    West,
    Crouch,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Player {
    pub id: u32,
    pub name: String,
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
    pub sprite: Facing,
    pub room: u32,
    pub speed: i32,
    pub shields: i32,
    pub potions: i32,
    pub score: i32,
}

impl Player {
    pub fn new(id: u32, name: String, x: i32, y: i32) -> Self {
        Self {
            id,
            name,
            x,
            y,
            width: PLAYER_SIZE,
            height: PLAYER_SIZE,
            sprite: Facing::South,
            room: 1,
            speed: PLAYER_SPEED,
            shields: STARTING_SHIELDS,
            potions: 0,
            score: 0,
        }
    }

    pub fn rect(&self) -> Rect {
        Rect::new(self.x, self.y, self.width, self.height)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Enemy {
    pub id: u32,
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
    pub speed: i32,
    pub room: u32,
}

impl Enemy {
    pub fn new(id: u32, x: i32, y: i32, room: u32) -> Self {
        Self {
            id,
            x,
            y,
            width: ENEMY_SIZE,
            height: ENEMY_SIZE,
            speed: ENEMY_SPEED,
            room,
        }
    }

    pub fn rect(&self) -> Rect {
        Rect::new(self.x, self.y, self.width, self.height)
    }
}

/// Semantic tag on a static or promoted obstacle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectKind {
    Boundary,
    Door { target: u32 },
    Pickup,
    Synthetic,
}

/// A static or promoted obstacle, tagged with the room that owns it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameObject {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
    pub kind: ObjectKind,
    pub room: u32,
}

impl GameObject {
    pub fn new(x: i32, y: i32, width: i32, height: i32, kind: ObjectKind, room: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
            kind,
            room,
        }
    }

    pub fn rect(&self) -> Rect {
        Rect::new(self.x, self.y, self.width, self.height)
    }

    /// Doors and pickups let a mover pass through; everything else blocks.
    pub fn blocks_movement(&self) -> bool {
        !matches!(self.kind, ObjectKind::Door { .. } | ObjectKind::Pickup)
    }
}
