use clap::Parser;
use client::game::ClientWorld;
use client::input::{build_intent, MoveFlags};
use client::network::Connection;
use log::{error, info};
use shared::messages::ClientMessage;
use shared::Rect;
use std::time::{Duration, Instant};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value = "127.0.0.1:8080")]
    server: String,

    /// Requested display name
    #[arg(short, long, default_value = "player")]
    name: String,
}

/// Headless frame loop: rendering and key polling are the embedder's job,
/// so this binary joins, mirrors the world, and keeps the session alive.
fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();

    let mut conn = Connection::connect(&args.server)?;
    conn.send(&ClientMessage::Join { name: args.name })?;

    let mut world = ClientWorld::new();
    let frame = Duration::from_millis(16);
    let mut last_frame = Instant::now();
    let mut last_keepalive = Instant::now();

    loop {
        let now = Instant::now();
        let dt = now.duration_since(last_frame).as_secs_f32();
        last_frame = now;

        // One non-blocking network pass per frame.
        match conn.poll() {
            Ok(msgs) => {
                for msg in msgs {
                    world.apply(msg);
                }
            }
            Err(e) => {
                error!("Connection lost: {}", e);
                break;
            }
        }
        if world.quit_received || conn.is_closed() {
            info!("Server closed the session");
            break;
        }

        world.frame(dt);

        // No input source is attached, so the resolved intent never moves;
        // it still goes out periodically as a keep-alive.
        if let Some(local) = world.local_player.clone() {
            let rect = Rect::new(local.x, local.y, local.width, local.height);
            let nearby: Vec<Rect> = world
                .players
                .values()
                .filter(|v| v.player.room == world.room)
                .map(|v| v.player.rect())
                .collect();
            let intent = build_intent(&rect, local.speed, MoveFlags::default(), &world.objects, &nearby);

            if intent.moved || last_keepalive.elapsed() >= Duration::from_secs(5) {
                conn.send(&intent.into_message(world.room))?;
                last_keepalive = Instant::now();
            }
        }

        std::thread::sleep(frame);
    }

    let _ = conn.send(&ClientMessage::Quit);
    let _ = conn.poll();
    Ok(())
}
