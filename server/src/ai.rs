//! Pursuit AI: per-tick nearest-player targeting with compass-quantized
//! stepping, plus the enemy spawner.

use crate::net;
use crate::world::Room;
use crate::ServerContext;
use log::debug;
use shared::messages::ServerMessage;
use shared::{MAX_ENEMIES_PER_ROOM, ROOM_HEIGHT, ROOM_WIDTH};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;

/// One step toward `to`, quantized to the nearest of eight compass
/// directions (45 degree increments). Diagonal steps advance BOTH axes by
/// the full speed value rather than speed/sqrt(2); that asymmetry is part
/// of the protocol's observed behavior and is kept as-is.
pub fn compass_step(from: (i32, i32), to: (i32, i32), speed: i32) -> (i32, i32) {
    let dx = (to.0 - from.0) as f32;
    let dy = (to.1 - from.1) as f32;
    let angle = dy.atan2(dx).to_degrees();
    let octant = (((angle + 382.5) / 45.0) as i32) % 8;
    match octant {
        0 => (speed, 0),
        1 => (speed, speed),
        2 => (0, speed),
        3 => (-speed, speed),
        4 => (-speed, 0),
        5 => (-speed, -speed),
        6 => (0, -speed),
        _ => (speed, -speed),
    }
}

/// Spawn gate: a room breeds enemies only while it holds at least one
/// player and sits below the enemy cap.
pub fn wants_enemy(room: &Room) -> bool {
    !room.players.is_empty() && room.enemies.len() < MAX_ENEMIES_PER_ROOM
}

fn distance_sq(a: (i32, i32), b: (i32, i32)) -> i64 {
    let dx = (a.0 - b.0) as i64;
    let dy = (a.1 - b.1) as i64;
    dx * dx + dy * dy
}

/// Advances every enemy in the room by one tick and resolves hits.
/// Returns the events to broadcast once the world lock is released.
pub fn tick_room(room: &mut Room) -> Vec<ServerMessage> {
    let mut events = Vec::new();

    for i in 0..room.enemies.len() {
        let enemy_pos = room.enemies[i].rect().center();
        let target = room
            .players
            .iter()
            .min_by_key(|p| distance_sq(enemy_pos, p.rect().center()))
            .map(|p| p.rect().center());
        let Some(target) = target else { continue };

        let speed = room.enemies[i].speed;
        let (dx, dy) = compass_step(enemy_pos, target, speed);
        {
            let enemy = &mut room.enemies[i];
            enemy.x = (enemy.x + dx).clamp(0, ROOM_WIDTH - enemy.width);
            enemy.y = (enemy.y + dy).clamp(0, ROOM_HEIGHT - enemy.height);
            events.push(ServerMessage::EnemyMoved {
                id: enemy.id,
                x: enemy.x,
                y: enemy.y,
                room: enemy.room,
            });
        }

        // Only the first overlapping player, in iteration order, is resolved.
        let enemy_rect = room.enemies[i].rect();
        if let Some(player) = room
            .players
            .iter_mut()
            .find(|p| p.rect().intersects(&enemy_rect))
        {
            if player.shields <= 0 {
                events.push(ServerMessage::PlayerDefeated { id: player.id });
            } else {
                player.shields -= 1;
                events.push(ServerMessage::PlayerHit {
                    id: player.id,
                    shields: player.shields,
                });
            }
        }
    }

    events
}

/// Enemy tick task: advances pursuit state on a fixed interval, then
/// broadcasts the resulting events outside the world lock.
pub async fn run_enemy_tick(ctx: Arc<ServerContext>, tick: Duration) {
    let mut ticker = interval(tick);
    while !ctx.shutdown.load(Ordering::Relaxed) {
        ticker.tick().await;

        let events = {
            let mut world = ctx.world.lock().await;
            let mut events = Vec::new();
            for room_id in world.room_ids() {
                events.extend(tick_room(world.room_mut(room_id)));
            }
            events
        };

        for event in events {
            net::broadcast_event(&ctx, &event).await;
        }
    }
    debug!("Enemy tick task stopped");
}

/// Spawner task: while a room holds at least one player and fewer than the
/// enemy cap, creates one enemy per pass at a random non-colliding spot.
pub async fn run_spawner(ctx: Arc<ServerContext>, tick: Duration) {
    let mut ticker = interval(tick);
    while !ctx.shutdown.load(Ordering::Relaxed) {
        ticker.tick().await;

        let spawned = {
            let mut world = ctx.world.lock().await;
            let mut spawned = Vec::new();
            for room_id in world.room_ids() {
                if world.room(room_id).map(wants_enemy).unwrap_or(false) {
                    let mut rng = rand::thread_rng();
                    spawned.push(world.spawn_enemy(&mut rng, room_id));
                }
            }
            spawned
        };

        for enemy in spawned {
            net::broadcast_event(&ctx, &ServerMessage::EnemyUpdate { enemy }).await;
        }
    }
    debug!("Spawner task stopped");
}
