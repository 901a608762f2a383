//! Integration tests for the room-partitioned multiplayer core.
//!
//! These tests wire the real server context, session registry, world
//! store, and client-side world model together in-process.

use client::game::ClientWorld;
use server::net::{handle_message, teardown};
use server::registry::{Session, TransportKind};
use server::{ai, ServerContext};
use shared::messages::{ClientMessage, ServerMessage};
use shared::{Facing, Player};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Registers a session and returns its outbound receiver.
async fn add_session(ctx: &Arc<ServerContext>, id: u32) -> mpsc::UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();
    ctx.sessions
        .lock()
        .await
        .insert(Session::new(id, TransportKind::Stream, tx));
    rx
}

fn drain(rx: &mut mpsc::UnboundedReceiver<String>) -> Vec<ServerMessage> {
    let mut out = Vec::new();
    while let Ok(payload) = rx.try_recv() {
        out.push(serde_json::from_str(&payload).expect("valid server message"));
    }
    out
}

/// SESSION LIFECYCLE TESTS
mod session_tests {
    use super::*;

    #[tokio::test]
    async fn join_marks_originator_local_and_peers_remote() {
        let ctx = Arc::new(ServerContext::new());
        let mut rx_a = add_session(&ctx, 1).await;
        let mut rx_b = add_session(&ctx, 2).await;

        handle_message(
            &ctx,
            1,
            ClientMessage::Join {
                name: "alice".to_string(),
            },
        )
        .await;

        let a_msgs = drain(&mut rx_a);
        assert!(a_msgs
            .iter()
            .any(|m| matches!(m, ServerMessage::Joined { local: true, .. })));
        assert!(a_msgs
            .iter()
            .any(|m| matches!(m, ServerMessage::FullState { .. })));

        let b_msgs = drain(&mut rx_b);
        assert!(b_msgs
            .iter()
            .any(|m| matches!(m, ServerMessage::Joined { local: false, .. })));
    }

    #[tokio::test]
    async fn name_collisions_get_suffixes() {
        let ctx = Arc::new(ServerContext::new());
        for id in 1..=3 {
            let _rx = add_session(&ctx, id).await;
            handle_message(
                &ctx,
                id,
                ClientMessage::Join {
                    name: "bob".to_string(),
                },
            )
            .await;
        }

        let world = ctx.world.lock().await;
        let mut names = world.player_names();
        names.sort();
        assert_eq!(names, vec!["bob", "bob1", "bob2"]);
    }

    #[tokio::test]
    async fn concurrent_teardowns_remove_exactly_those_players() {
        let ctx = Arc::new(ServerContext::new());
        for id in 1..=8u32 {
            let rx = add_session(&ctx, id).await;
            // Keep the writer side alive for the duration of the test.
            std::mem::forget(rx);
            ctx.world
                .lock()
                .await
                .insert_player(Player::new(id, format!("p{}", id), 100, 100));
            ctx.sessions.lock().await.set_player(id, id);
        }

        // Tear down sessions 1..=4 concurrently, some of them twice.
        let mut handles = Vec::new();
        for id in 1..=4u32 {
            for _ in 0..2 {
                let ctx = Arc::clone(&ctx);
                handles.push(tokio::spawn(async move {
                    teardown(&ctx, id).await;
                }));
            }
        }
        for handle in handles {
            handle.await.expect("teardown task");
        }

        let world = ctx.world.lock().await;
        let (players, _, _) = world.snapshot();
        let mut remaining: Vec<u32> = players.iter().map(|p| p.id).collect();
        remaining.sort();
        assert_eq!(remaining, vec![5, 6, 7, 8]);
        assert_eq!(ctx.sessions.lock().await.len(), 4);
    }

    #[tokio::test]
    async fn quit_message_triggers_player_left_broadcast() {
        let ctx = Arc::new(ServerContext::new());
        let mut rx_a = add_session(&ctx, 1).await;
        let mut rx_b = add_session(&ctx, 2).await;
        handle_message(
            &ctx,
            1,
            ClientMessage::Join {
                name: "alice".to_string(),
            },
        )
        .await;
        drain(&mut rx_a);
        drain(&mut rx_b);

        handle_message(&ctx, 1, ClientMessage::Quit).await;

        // The leaving session gets a best-effort quit notice.
        assert!(drain(&mut rx_a)
            .iter()
            .any(|m| matches!(m, ServerMessage::Quit)));
        // The remaining session learns the player left.
        assert!(drain(&mut rx_b)
            .iter()
            .any(|m| matches!(m, ServerMessage::PlayerLeft { id: 1 })));
        assert!(ctx.world.lock().await.find_player(1).is_none());
    }
}

/// ROOM TRANSITION TESTS
mod room_tests {
    use super::*;

    #[tokio::test]
    async fn transition_is_atomic_and_broadcast() {
        let ctx = Arc::new(ServerContext::new());
        let mut rx_a = add_session(&ctx, 1).await;
        let mut rx_b = add_session(&ctx, 2).await;
        handle_message(
            &ctx,
            1,
            ClientMessage::Join {
                name: "alice".to_string(),
            },
        )
        .await;
        drain(&mut rx_a);
        drain(&mut rx_b);

        handle_message(
            &ctx,
            1,
            ClientMessage::Update {
                x: 780,
                y: 284,
                sprite: Facing::East,
                room: 2,
            },
        )
        .await;

        {
            let world = ctx.world.lock().await;
            assert_eq!(world.rooms_holding(1), 1);
            assert_eq!(world.find_player(1).map(|p| p.room), Some(2));
        }

        assert!(drain(&mut rx_b)
            .iter()
            .any(|m| matches!(m, ServerMessage::RoomSwitch { id: 1, room: 2, .. })));
        // The switching player also receives the destination room snapshot.
        assert!(drain(&mut rx_a)
            .iter()
            .any(|m| matches!(m, ServerMessage::RoomState { room: 2, .. })));
    }
}

/// END-TO-END STATE PROPAGATION
mod propagation_tests {
    use super::*;

    /// Player A's update lands in the store, reaches session B as a
    /// broadcast, and B's interpolated rendering converges on it.
    #[tokio::test]
    async fn update_propagates_and_client_converges() {
        let ctx = Arc::new(ServerContext::new());
        let mut rx_a = add_session(&ctx, 1).await;
        let mut rx_b = add_session(&ctx, 2).await;

        handle_message(
            &ctx,
            1,
            ClientMessage::Join {
                name: "alice".to_string(),
            },
        )
        .await;
        handle_message(
            &ctx,
            2,
            ClientMessage::Join {
                name: "bob".to_string(),
            },
        )
        .await;
        drain(&mut rx_a);

        // B mirrors everything it has been sent so far.
        let mut b_world = ClientWorld::new();
        for msg in drain(&mut rx_b) {
            b_world.apply(msg);
        }
        assert_eq!(b_world.local_id, Some(2));

        // A settles at (100, 100), then moves to (140, 100).
        for (x, y) in [(100, 100), (140, 100)] {
            handle_message(
                &ctx,
                1,
                ClientMessage::Update {
                    x,
                    y,
                    sprite: Facing::East,
                    room: 1,
                },
            )
            .await;
        }

        let stored = ctx.world.lock().await.find_player(1).cloned().unwrap();
        assert_eq!((stored.x, stored.y), (140, 100));

        for msg in drain(&mut rx_b) {
            b_world.apply(msg);
        }

        // Converges within the smoothing window: a handful of 16ms frames.
        for _ in 0..20 {
            b_world.frame(0.016);
        }
        let (x, y) = b_world.rendered_position(1).expect("knows player A");
        assert!((x - 140.0).abs() < 0.001, "x converged to {}", x);
        assert!((y - 100.0).abs() < 0.001, "y converged to {}", y);
    }

    #[tokio::test]
    async fn request_state_returns_snapshot() {
        let ctx = Arc::new(ServerContext::new());
        let mut rx_a = add_session(&ctx, 1).await;
        handle_message(
            &ctx,
            1,
            ClientMessage::Join {
                name: "alice".to_string(),
            },
        )
        .await;
        drain(&mut rx_a);

        handle_message(&ctx, 1, ClientMessage::RequestState).await;
        let msgs = drain(&mut rx_a);
        match msgs.iter().find(|m| matches!(m, ServerMessage::FullState { .. })) {
            Some(ServerMessage::FullState { players, objects, .. }) => {
                assert_eq!(players.len(), 1);
                assert!(!objects.is_empty());
            }
            _ => panic!("expected a full state snapshot"),
        }
    }
}

/// PURSUIT AI INTEGRATION
mod ai_tests {
    use super::*;
    use shared::MAX_ENEMIES_PER_ROOM;

    #[tokio::test]
    async fn spawner_gate_caps_enemies_and_skips_empty_rooms() {
        let ctx = Arc::new(ServerContext::new());
        let _rx = add_session(&ctx, 1).await;
        handle_message(
            &ctx,
            1,
            ClientMessage::Join {
                name: "alice".to_string(),
            },
        )
        .await;

        let mut world = ctx.world.lock().await;
        // Room 2 exists but holds no players.
        world.room_mut(2);

        // Run gate-checked spawn passes well past the cap, the way the
        // spawner task does.
        let mut rng = rand::rngs::mock::StepRng::new(0, 1);
        for _ in 0..MAX_ENEMIES_PER_ROOM + 3 {
            for room_id in world.room_ids() {
                if world.room(room_id).map(ai::wants_enemy).unwrap_or(false) {
                    world.spawn_enemy(&mut rng, room_id);
                }
            }
        }

        // The populated room fills to the cap and no further; the empty
        // room never breeds.
        assert_eq!(world.room(1).unwrap().enemies.len(), MAX_ENEMIES_PER_ROOM);
        assert!(!ai::wants_enemy(world.room(1).unwrap()));
        assert!(world.room(2).unwrap().enemies.is_empty());

        let room = world.room_mut(1);
        let before: Vec<(i32, i32)> = room.enemies.iter().map(|e| (e.x, e.y)).collect();
        let events = ai::tick_room(room);
        let after: Vec<(i32, i32)> = room.enemies.iter().map(|e| (e.x, e.y)).collect();
        assert_ne!(before, after);
        assert!(events
            .iter()
            .any(|e| matches!(e, ServerMessage::EnemyMoved { .. })));
    }
}
