//! Wire protocol between client and server.
//!
//! Messages travel as UTF-8 JSON objects tagged with a `type` field,
//! newline-terminated on the stream transport and self-delimited on the
//! message transport. Unrecognized fields are ignored on receipt; there
//! is no version negotiation.

use crate::{Enemy, Facing, GameObject, Player};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Handshake carrying the requested display name.
    Join { name: String },
    /// Explicit leave notice.
    Quit,
    /// Position/sprite/room report for the session's own player.
    Update {
        x: i32,
        y: i32,
        sprite: Facing,
        room: u32,
    },
    /// Ask the server for a full-state snapshot.
    RequestState,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Handshake acknowledgement and new-player broadcast. The originating
    /// session's copy carries `local: true`; everyone else sees `false`.
    Joined { player: Player, local: bool },
    /// Snapshot of every room's players, enemies and objects.
    FullState {
        players: Vec<Player>,
        enemies: Vec<Enemy>,
        objects: Vec<GameObject>,
    },
    /// Snapshot of a single room, sent to a player entering it.
    RoomState {
        room: u32,
        players: Vec<Player>,
        enemies: Vec<Enemy>,
        objects: Vec<GameObject>,
    },
    /// A player moved between rooms.
    RoomSwitch { id: u32, room: u32, x: i32, y: i32 },
    PlayerLeft { id: u32 },
    PlayerUpdate {
        id: u32,
        x: i32,
        y: i32,
        sprite: Facing,
        room: u32,
    },
    /// Single-enemy upsert (spawn or full refresh).
    EnemyUpdate { enemy: Enemy },
    EnemyMoved { id: u32, x: i32, y: i32, room: u32 },
    PlayerHit { id: u32, shields: i32 },
    PlayerDefeated { id: u32 },
    /// Server-initiated quit notice.
    Quit,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_message_roundtrip() {
        let msg = ClientMessage::Update {
            x: 140,
            y: 100,
            sprite: Facing::East,
            room: 1,
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"type\":\"update\""));

        match serde_json::from_str::<ClientMessage>(&json).unwrap() {
            ClientMessage::Update { x, y, sprite, room } => {
                assert_eq!((x, y, room), (140, 100, 1));
                assert_eq!(sprite, Facing::East);
            }
            other => panic!("wrong message type: {:?}", other),
        }
    }

    #[test]
    fn test_unknown_fields_are_ignored() {
        let json = r#"{"type":"join","name":"bob","color":"red","hat":7}"#;
        match serde_json::from_str::<ClientMessage>(json).unwrap() {
            ClientMessage::Join { name } => assert_eq!(name, "bob"),
            other => panic!("wrong message type: {:?}", other),
        }
    }

    #[test]
    fn test_unknown_message_type_is_an_error() {
        let json = r#"{"type":"teleport","x":1}"#;
        assert!(serde_json::from_str::<ClientMessage>(json).is_err());
    }

    #[test]
    fn test_joined_local_marker() {
        let player = Player::new(3, "carol".to_string(), 50, 60);
        let local = serde_json::to_string(&ServerMessage::Joined {
            player: player.clone(),
            local: true,
        })
        .unwrap();
        let remote = serde_json::to_string(&ServerMessage::Joined {
            player,
            local: false,
        })
        .unwrap();

        assert!(local.contains("\"local\":true"));
        assert!(remote.contains("\"local\":false"));
    }
}
