//! Network layer: accept loops for both transports, per-connection
//! reader/writer tasks, message handling, and session teardown.
//!
//! Each connection gets a writer task draining the session's outbound
//! queue (newline-terminated on the stream transport, text frames on the
//! message transport) and a reader loop feeding the message handler. The
//! world and registry locks are taken one at a time, never together.

use crate::registry::{Session, TransportKind};
use crate::world::{find_clear_position, resolve_name};
use crate::ServerContext;
use futures_util::{SinkExt, StreamExt};
use log::{info, warn};
use shared::framer::MessageFramer;
use shared::messages::{ClientMessage, ServerMessage};
use shared::{Facing, Player, Rect, PLAYER_SIZE};
use std::net::SocketAddr;
use std::os::unix::io::AsRawFd;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;

/// Sessions with no traffic for this long fail the heartbeat.
pub const SESSION_TIMEOUT: Duration = Duration::from_secs(15);

fn encode(msg: &ServerMessage) -> Option<String> {
    match serde_json::to_string(msg) {
        Ok(payload) => Some(payload),
        Err(e) => {
            warn!("Failed to serialize outbound message: {}", e);
            None
        }
    }
}

/// Queues dead sessions for removal after a fan-out pass; the session
/// collection is never mutated mid-iteration.
fn reap(ctx: &Arc<ServerContext>, failed: Vec<u32>) {
    for id in failed {
        let ctx = Arc::clone(ctx);
        tokio::spawn(async move {
            teardown(&ctx, id).await;
        });
    }
}

/// Serializes an event once and fans it out to every live session.
pub async fn broadcast_event(ctx: &Arc<ServerContext>, event: &ServerMessage) {
    if let Some(payload) = encode(event) {
        let failed = { ctx.sessions.lock().await.broadcast(&payload) };
        reap(ctx, failed);
    }
}

async fn broadcast_event_except(ctx: &Arc<ServerContext>, event: &ServerMessage, except: u32) {
    if let Some(payload) = encode(event) {
        let failed = { ctx.sessions.lock().await.broadcast_except(&payload, except) };
        reap(ctx, failed);
    }
}

async fn send_event(ctx: &Arc<ServerContext>, session_id: u32, event: &ServerMessage) {
    if let Some(payload) = encode(event) {
        let delivered = { ctx.sessions.lock().await.send_to(session_id, &payload) };
        if !delivered {
            reap(ctx, vec![session_id]);
        }
    }
}

/// Tears a session down: best-effort quit notice, player removal from its
/// room, transport close, registry removal, then a player-left broadcast.
/// The registry `take` comes first internally, which makes concurrent or
/// repeated teardown of the same id a no-op after the first.
pub async fn teardown(ctx: &Arc<ServerContext>, session_id: u32) {
    let session = { ctx.sessions.lock().await.take(session_id) };
    let Some(session) = session else {
        return;
    };

    if let Some(payload) = encode(&ServerMessage::Quit) {
        let _ = session.outbound.send(payload);
    }

    let player = match session.player_id {
        Some(player_id) => ctx.world.lock().await.remove_player(player_id),
        None => None,
    };

    // Dropping the outbound sender closes the transport: the writer task
    // drains what is queued and exits.
    drop(session);
    info!("Session {} torn down", session_id);

    if let Some(player) = player {
        info!("Player {} ({}) left room {}", player.id, player.name, player.room);
        broadcast_event(ctx, &ServerMessage::PlayerLeft { id: player.id }).await;
    }
}

async fn handle_join(ctx: &Arc<ServerContext>, session_id: u32, requested: String) {
    let (player, players, enemies, objects) = {
        let mut world = ctx.world.lock().await;
        let taken = world.player_names();
        let name = resolve_name(&requested, &taken, session_id);

        let room = world.room_mut(1);
        let mut obstacles: Vec<Rect> = room
            .objects
            .iter()
            .filter(|o| o.blocks_movement())
            .map(|o| o.rect())
            .collect();
        obstacles.extend(room.players.iter().map(|p| p.rect()));
        obstacles.extend(room.enemies.iter().map(|e| e.rect()));
        let (x, y) = {
            let mut rng = rand::thread_rng();
            find_clear_position(&mut rng, PLAYER_SIZE, PLAYER_SIZE, &obstacles)
        };

        let player = Player::new(session_id, name, x, y);
        world.insert_player(player.clone());
        let (players, enemies, objects) = world.snapshot();
        (player, players, enemies, objects)
    };

    info!(
        "Player {} ({}) joined at ({}, {})",
        player.id, player.name, player.x, player.y
    );

    {
        let mut sessions = ctx.sessions.lock().await;
        sessions.set_player(session_id, player.id);
    }

    // The originating session's copy is marked local; everyone else gets
    // the same player as remote.
    send_event(
        ctx,
        session_id,
        &ServerMessage::Joined {
            player: player.clone(),
            local: true,
        },
    )
    .await;
    send_event(
        ctx,
        session_id,
        &ServerMessage::FullState {
            players,
            enemies,
            objects,
        },
    )
    .await;
    broadcast_event_except(
        ctx,
        &ServerMessage::Joined {
            player,
            local: false,
        },
        session_id,
    )
    .await;
}

enum UpdateOutcome {
    Moved {
        x: i32,
        y: i32,
    },
    Switched {
        room: u32,
        x: i32,
        y: i32,
    },
    Miss,
}

async fn handle_update(
    ctx: &Arc<ServerContext>,
    session_id: u32,
    x: i32,
    y: i32,
    sprite: Facing,
    room: u32,
) {
    let player_id = { ctx.sessions.lock().await.player_of(session_id) };
    let Some(player_id) = player_id else {
        warn!("Update from session {} before handshake, skipped", session_id);
        return;
    };

    let outcome = {
        let mut world = ctx.world.lock().await;
        match world.find_player(player_id).map(|p| p.room) {
            None => UpdateOutcome::Miss,
            Some(current) if current != room => match world.move_player(player_id, room) {
                Some((x, y)) => UpdateOutcome::Switched { room, x, y },
                None => UpdateOutcome::Miss,
            },
            Some(_) => {
                world.update_player(player_id, x, y, sprite);
                UpdateOutcome::Moved { x, y }
            }
        }
    };

    match outcome {
        UpdateOutcome::Moved { x, y } => {
            broadcast_event_except(
                ctx,
                &ServerMessage::PlayerUpdate {
                    id: player_id,
                    x,
                    y,
                    sprite,
                    room,
                },
                session_id,
            )
            .await;
        }
        UpdateOutcome::Switched { room, x, y } => {
            info!("Player {} switched to room {}", player_id, room);
            broadcast_event(
                ctx,
                &ServerMessage::RoomSwitch {
                    id: player_id,
                    room,
                    x,
                    y,
                },
            )
            .await;
            let snapshot = {
                let world = ctx.world.lock().await;
                world.room(room).map(|r| ServerMessage::RoomState {
                    room,
                    players: r.players.clone(),
                    enemies: r.enemies.clone(),
                    objects: r.objects.clone(),
                })
            };
            if let Some(snapshot) = snapshot {
                send_event(ctx, session_id, &snapshot).await;
            }
        }
        UpdateOutcome::Miss => {
            warn!("Update for unknown player {}, skipped", player_id);
        }
    }
}

/// Dispatches one decoded message from either transport.
pub async fn handle_message(ctx: &Arc<ServerContext>, session_id: u32, msg: ClientMessage) {
    {
        ctx.sessions.lock().await.touch(session_id);
    }

    match msg {
        ClientMessage::Join { name } => handle_join(ctx, session_id, name).await,
        ClientMessage::Update { x, y, sprite, room } => {
            handle_update(ctx, session_id, x, y, sprite, room).await
        }
        ClientMessage::RequestState => {
            let (players, enemies, objects) = { ctx.world.lock().await.snapshot() };
            send_event(
                ctx,
                session_id,
                &ServerMessage::FullState {
                    players,
                    enemies,
                    objects,
                },
            )
            .await;
        }
        ClientMessage::Quit => teardown(ctx, session_id).await,
    }
}

async fn handle_stream_conn(ctx: Arc<ServerContext>, stream: TcpStream, addr: SocketAddr) {
    // Session identity derives from the raw connection handle; the kernel
    // may reuse it after close, which is unguarded (see DESIGN.md).
    let session_id = stream.as_raw_fd() as u32;
    let (mut reader, mut writer) = stream.into_split();
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    {
        ctx.sessions
            .lock()
            .await
            .insert(Session::new(session_id, TransportKind::Stream, tx));
    }
    info!("Stream connection from {} as session {}", addr, session_id);

    tokio::spawn(async move {
        while let Some(payload) = rx.recv().await {
            if writer.write_all(payload.as_bytes()).await.is_err() {
                break;
            }
            if writer.write_all(b"\n").await.is_err() {
                break;
            }
        }
        let _ = writer.shutdown().await;
    });

    let mut framer = MessageFramer::new();
    let mut buf = [0u8; 2048];
    'read: loop {
        match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => {
                framer.push(&buf[..n]);
                for msg in framer.drain_messages::<ClientMessage>() {
                    let quitting = matches!(msg, ClientMessage::Quit);
                    handle_message(&ctx, session_id, msg).await;
                    if quitting {
                        break 'read;
                    }
                }
            }
            Err(e) => {
                warn!("Session {} transport error: {}", session_id, e);
                break;
            }
        }
    }

    teardown(&ctx, session_id).await;
}

async fn handle_ws_conn(ctx: Arc<ServerContext>, stream: TcpStream, addr: SocketAddr) {
    let session_id = stream.as_raw_fd() as u32;
    let ws = match accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            warn!("WebSocket handshake with {} failed: {}", addr, e);
            return;
        }
    };
    let (mut sink, mut source) = ws.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    {
        ctx.sessions
            .lock()
            .await
            .insert(Session::new(session_id, TransportKind::Message, tx));
    }
    info!("Message connection from {} as session {}", addr, session_id);

    tokio::spawn(async move {
        while let Some(payload) = rx.recv().await {
            if sink.send(Message::Text(payload)).await.is_err() {
                break;
            }
        }
        let _ = sink.close().await;
    });

    'read: while let Some(item) = source.next().await {
        match item {
            // Discrete messages are self-delimited; no framer needed.
            Ok(Message::Text(text)) => match serde_json::from_str::<ClientMessage>(&text) {
                Ok(msg) => {
                    let quitting = matches!(msg, ClientMessage::Quit);
                    handle_message(&ctx, session_id, msg).await;
                    if quitting {
                        break 'read;
                    }
                }
                Err(e) => warn!(
                    "Dropping malformed message from session {}: {}",
                    session_id, e
                ),
            },
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                warn!("Session {} transport error: {}", session_id, e);
                break;
            }
        }
    }

    teardown(&ctx, session_id).await;
}

/// Accept loop for the newline-delimited stream transport.
pub async fn run_stream_listener(ctx: Arc<ServerContext>, addr: &str) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!("Stream transport listening on {}", addr);

    while !ctx.shutdown.load(Ordering::Relaxed) {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    tokio::spawn(handle_stream_conn(Arc::clone(&ctx), stream, peer));
                }
                Err(e) => warn!("Accept failed: {}", e),
            },
            _ = tokio::time::sleep(Duration::from_secs(1)) => {}
        }
    }
    Ok(())
}

/// Accept loop for the discrete-message (WebSocket) transport.
pub async fn run_message_listener(ctx: Arc<ServerContext>, addr: &str) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!("Message transport listening on {}", addr);

    while !ctx.shutdown.load(Ordering::Relaxed) {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    tokio::spawn(handle_ws_conn(Arc::clone(&ctx), stream, peer));
                }
                Err(e) => warn!("Accept failed: {}", e),
            },
            _ = tokio::time::sleep(Duration::from_secs(1)) => {}
        }
    }
    Ok(())
}

/// Heartbeat task: tears down sessions idle past the timeout, checking
/// once per second.
pub async fn run_heartbeat(ctx: Arc<ServerContext>) {
    let mut ticker = tokio::time::interval(Duration::from_secs(1));
    while !ctx.shutdown.load(Ordering::Relaxed) {
        ticker.tick().await;

        let stale = { ctx.sessions.lock().await.timed_out(SESSION_TIMEOUT) };
        for session_id in stale {
            info!("Session {} failed heartbeat", session_id);
            teardown(&ctx, session_id).await;
        }
    }
}
