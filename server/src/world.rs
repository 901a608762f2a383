//! Authoritative world state: room -> {players, objects, enemies}.
//!
//! A single `tokio::sync::Mutex<World>` (owned by the server context)
//! guards all mutation across every room. Consumers needing a consistent
//! snapshot take the same lock. Rooms are created lazily on first
//! reference and never destroyed; enemies are never removed once spawned.

use log::info;
use rand::Rng;
use shared::{
    Enemy, Facing, GameObject, ObjectKind, Player, Rect, ENEMY_SIZE, FALLBACK_SPAWN,
    MAX_SPAWN_ATTEMPTS, PLAYER_SIZE, ROOM_HEIGHT, ROOM_WIDTH,
};

const WALL: i32 = 16;
const DOOR_SIZE: i32 = 64;

#[derive(Debug, Default)]
pub struct Room {
    pub players: Vec<Player>,
    pub objects: Vec<GameObject>,
    pub enemies: Vec<Enemy>,
}

#[derive(Debug, Default)]
pub struct World {
    rooms: std::collections::HashMap<u32, Room>,
    next_enemy_id: u32,
}

/// Static object layout for a room: boundary walls on all four edges and
/// a door in the east or west wall linking to the neighboring room.
pub fn static_objects(room: u32) -> Vec<GameObject> {
    let mut objects = vec![
        GameObject::new(0, 0, ROOM_WIDTH, WALL, ObjectKind::Boundary, room),
        GameObject::new(0, ROOM_HEIGHT - WALL, ROOM_WIDTH, WALL, ObjectKind::Boundary, room),
        GameObject::new(0, 0, WALL, ROOM_HEIGHT, ObjectKind::Boundary, room),
        GameObject::new(ROOM_WIDTH - WALL, 0, WALL, ROOM_HEIGHT, ObjectKind::Boundary, room),
    ];
    let door_y = (ROOM_HEIGHT - DOOR_SIZE) / 2;
    objects.push(GameObject::new(
        ROOM_WIDTH - WALL,
        door_y,
        WALL,
        DOOR_SIZE,
        ObjectKind::Door { target: room + 1 },
        room,
    ));
    if room > 1 {
        objects.push(GameObject::new(
            0,
            door_y,
            WALL,
            DOOR_SIZE,
            ObjectKind::Door { target: room - 1 },
            room,
        ));
    }
    objects
}

/// Fixed arrival coordinate when entering a room through a transition.
pub fn room_spawn(_room: u32) -> (i32, i32) {
    (WALL + PLAYER_SIZE, (ROOM_HEIGHT - PLAYER_SIZE) / 2)
}

/// Finds a random position for a `w`x`h` box that collides with none of
/// `obstacles`. Bounded to `MAX_SPAWN_ATTEMPTS` tries; falls back to a
/// deterministic position rather than retrying forever.
pub fn find_clear_position<R: Rng>(rng: &mut R, w: i32, h: i32, obstacles: &[Rect]) -> (i32, i32) {
    for _ in 0..MAX_SPAWN_ATTEMPTS {
        let x = rng.gen_range(WALL..ROOM_WIDTH - WALL - w);
        let y = rng.gen_range(WALL..ROOM_HEIGHT - WALL - h);
        let candidate = Rect::new(x, y, w, h);
        if !obstacles.iter().any(|o| candidate.intersects(o)) {
            return (x, y);
        }
    }
    FALLBACK_SPAWN
}

impl World {
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up a room, creating it with its static layout on first use.
    pub fn room_mut(&mut self, id: u32) -> &mut Room {
        self.rooms.entry(id).or_insert_with(|| {
            info!("Creating room {}", id);
            Room {
                players: Vec::new(),
                objects: static_objects(id),
                enemies: Vec::new(),
            }
        })
    }

    pub fn room(&self, id: u32) -> Option<&Room> {
        self.rooms.get(&id)
    }

    pub fn room_ids(&self) -> Vec<u32> {
        self.rooms.keys().copied().collect()
    }

    pub fn find_player(&self, id: u32) -> Option<&Player> {
        self.rooms
            .values()
            .flat_map(|r| r.players.iter())
            .find(|p| p.id == id)
    }

    pub fn insert_player(&mut self, player: Player) {
        let room = player.room;
        self.room_mut(room).players.push(player);
    }

    /// Applies a position/sprite report to a player already in `room`.
    /// Returns false on a lookup miss (stale update, not fatal).
    pub fn update_player(&mut self, id: u32, x: i32, y: i32, sprite: Facing) -> bool {
        for room in self.rooms.values_mut() {
            if let Some(player) = room.players.iter_mut().find(|p| p.id == id) {
                player.x = x;
                player.y = y;
                player.sprite = sprite;
                return true;
            }
        }
        false
    }

    /// Removes a player from whichever room holds it.
    pub fn remove_player(&mut self, id: u32) -> Option<Player> {
        for room in self.rooms.values_mut() {
            if let Some(idx) = room.players.iter().position(|p| p.id == id) {
                return Some(room.players.remove(idx));
            }
        }
        None
    }

    /// Moves a player to `dest` under the caller's single lock acquisition:
    /// removed from the old room's set, updated with the new room id and
    /// the destination's fixed arrival coordinate, appended to the new
    /// room's set. At no point is the player in zero or two rooms once the
    /// lock is released.
    pub fn move_player(&mut self, id: u32, dest: u32) -> Option<(i32, i32)> {
        let mut player = self.remove_player(id)?;
        let (x, y) = room_spawn(dest);
        player.room = dest;
        player.x = x;
        player.y = y;
        self.room_mut(dest).players.push(player);
        Some((x, y))
    }

    /// Spawns one enemy in `room` at a random non-colliding position.
    /// Enemy ids are monotonic for the process lifetime.
    pub fn spawn_enemy<R: Rng>(&mut self, rng: &mut R, room_id: u32) -> Enemy {
        self.next_enemy_id += 1;
        let id = self.next_enemy_id;

        let room = self.room_mut(room_id);
        let mut obstacles: Vec<Rect> = room
            .objects
            .iter()
            .filter(|o| o.blocks_movement())
            .map(|o| o.rect())
            .collect();
        obstacles.extend(room.players.iter().map(|p| p.rect()));
        obstacles.extend(room.enemies.iter().map(|e| e.rect()));

        let (x, y) = find_clear_position(rng, ENEMY_SIZE, ENEMY_SIZE, &obstacles);
        let enemy = Enemy::new(id, x, y, room_id);
        room.enemies.push(enemy.clone());
        info!("Spawned enemy {} in room {} at ({}, {})", id, room_id, x, y);
        enemy
    }

    /// Consistent snapshot of every room, taken under the store lock.
    pub fn snapshot(&self) -> (Vec<Player>, Vec<Enemy>, Vec<GameObject>) {
        let mut players = Vec::new();
        let mut enemies = Vec::new();
        let mut objects = Vec::new();
        for room in self.rooms.values() {
            players.extend(room.players.iter().cloned());
            enemies.extend(room.enemies.iter().cloned());
            objects.extend(room.objects.iter().cloned());
        }
        (players, enemies, objects)
    }

    pub fn player_names(&self) -> Vec<String> {
        self.rooms
            .values()
            .flat_map(|r| r.players.iter())
            .map(|p| p.name.clone())
            .collect()
    }

    /// Number of rooms whose set contains the player. Exists for the room
    /// membership invariant checks.
    pub fn rooms_holding(&self, id: u32) -> usize {
        self.rooms
            .values()
            .filter(|r| r.players.iter().any(|p| p.id == id))
            .count()
    }
}

/// Resolves a requested display name against the names already taken:
/// the base name first, then suffixes 1..=99, then the session id.
pub fn resolve_name(base: &str, taken: &[String], session_id: u32) -> String {
    if !taken.iter().any(|n| n == base) {
        return base.to_string();
    }
    for i in 1..=99 {
        let candidate = format!("{}{}", base, i);
        if !taken.iter().any(|n| *n == candidate) {
            return candidate;
        }
    }
    format!("{}{}", base, session_id)
}
