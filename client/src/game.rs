//! Client-side world model: remote entities with interpolated motion,
//! updated from server broadcasts.

use crate::interp::Motion;
use log::{debug, info};
use shared::messages::ServerMessage;
use shared::{Enemy, GameObject, Player};
use std::collections::HashMap;

/// A remote player paired with its smoothed motion state.
#[derive(Debug, Clone)]
pub struct PlayerView {
    pub player: Player,
    pub motion: Motion,
}

#[derive(Debug, Clone)]
pub struct EnemyView {
    pub enemy: Enemy,
    pub motion: Motion,
}

/// Everything the client knows about the world, keyed by server ids.
/// Rendering (out of scope here) reads the interpolated positions.
#[derive(Debug, Default)]
pub struct ClientWorld {
    pub local_id: Option<u32>,
    pub local_player: Option<Player>,
    pub players: HashMap<u32, PlayerView>,
    pub enemies: HashMap<u32, EnemyView>,
    pub objects: Vec<GameObject>,
    pub room: u32,
    pub quit_received: bool,
}

impl ClientWorld {
    pub fn new() -> Self {
        Self {
            room: 1,
            ..Self::default()
        }
    }

    fn upsert_player(&mut self, player: Player) {
        match self.players.get_mut(&player.id) {
            Some(view) => {
                view.motion.set_target(player.x, player.y);
                view.player = player;
            }
            None => {
                let motion = Motion::new(player.x, player.y);
                self.players.insert(player.id, PlayerView { player, motion });
            }
        }
    }

    fn upsert_enemy(&mut self, enemy: Enemy) {
        match self.enemies.get_mut(&enemy.id) {
            Some(view) => {
                view.motion.set_target(enemy.x, enemy.y);
                view.enemy = enemy;
            }
            None => {
                let motion = Motion::new(enemy.x, enemy.y);
                self.enemies.insert(enemy.id, EnemyView { enemy, motion });
            }
        }
    }

    /// Applies one server message. Messages about entities we do not know
    /// yet become inserts; messages of no interest are ignored.
    pub fn apply(&mut self, msg: ServerMessage) {
        match msg {
            ServerMessage::Joined { player, local } => {
                if local {
                    info!("Joined as {} (id {})", player.name, player.id);
                    self.local_id = Some(player.id);
                    self.room = player.room;
                    self.local_player = Some(player);
                } else {
                    self.upsert_player(player);
                }
            }
            ServerMessage::FullState {
                players,
                enemies,
                objects,
            } => {
                self.players.clear();
                self.enemies.clear();
                // Only the current room's objects feed local collision.
                self.objects = objects
                    .into_iter()
                    .filter(|o| o.room == self.room)
                    .collect();
                for player in players {
                    if Some(player.id) == self.local_id {
                        self.local_player = Some(player);
                    } else {
                        self.upsert_player(player);
                    }
                }
                for enemy in enemies {
                    self.upsert_enemy(enemy);
                }
            }
            ServerMessage::RoomState {
                room,
                players,
                enemies,
                objects,
            } => {
                if room != self.room {
                    return;
                }
                self.players.retain(|_, v| v.player.room != room);
                self.enemies.retain(|_, v| v.enemy.room != room);
                self.objects = objects;
                for player in players {
                    if Some(player.id) != self.local_id {
                        self.upsert_player(player);
                    }
                }
                for enemy in enemies {
                    self.upsert_enemy(enemy);
                }
            }
            ServerMessage::RoomSwitch { id, room, x, y } => {
                if Some(id) == self.local_id {
                    self.room = room;
                    if let Some(local) = self.local_player.as_mut() {
                        local.room = room;
                        local.x = x;
                        local.y = y;
                    }
                } else if let Some(view) = self.players.get_mut(&id) {
                    view.player.room = room;
                    view.player.x = x;
                    view.player.y = y;
                    // Arrival in another room is a discontinuity, not motion.
                    view.motion.snap(x, y);
                }
            }
            ServerMessage::PlayerLeft { id } => {
                self.players.remove(&id);
            }
            ServerMessage::PlayerUpdate {
                id,
                x,
                y,
                sprite,
                room,
            } => {
                if Some(id) == self.local_id {
                    return;
                }
                match self.players.get_mut(&id) {
                    Some(view) => {
                        view.player.sprite = sprite;
                        view.player.room = room;
                        view.player.x = x;
                        view.player.y = y;
                        view.motion.set_target(x, y);
                    }
                    None => debug!("Update for unknown player {}", id),
                }
            }
            ServerMessage::EnemyUpdate { enemy } => self.upsert_enemy(enemy),
            ServerMessage::EnemyMoved { id, x, y, room } => {
                if let Some(view) = self.enemies.get_mut(&id) {
                    view.enemy.x = x;
                    view.enemy.y = y;
                    view.enemy.room = room;
                    view.motion.set_target(x, y);
                }
            }
            ServerMessage::PlayerHit { id, shields } => {
                if Some(id) == self.local_id {
                    if let Some(local) = self.local_player.as_mut() {
                        local.shields = shields;
                    }
                } else if let Some(view) = self.players.get_mut(&id) {
                    view.player.shields = shields;
                }
            }
            ServerMessage::PlayerDefeated { id } => {
                info!("Player {} defeated", id);
            }
            ServerMessage::Quit => {
                self.quit_received = true;
            }
        }
    }

    /// Advances every smoothed motion by one frame.
    pub fn frame(&mut self, dt: f32) {
        for view in self.players.values_mut() {
            view.motion.advance(dt);
        }
        for view in self.enemies.values_mut() {
            view.motion.advance(dt);
        }
    }

    /// Interpolated position of a remote player, if known.
    pub fn rendered_position(&self, id: u32) -> Option<(f32, f32)> {
        self.players.get(&id).map(|v| v.motion.position())
    }
}
