use clap::Parser;
use log::{error, info};
use server::{ai, net, ServerContext};
use shared::messages::ServerMessage;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Address to bind both transports to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Port for the newline-delimited stream transport
    #[arg(short, long, default_value = "8080")]
    port: u16,

    /// Port for the discrete-message (WebSocket) transport
    #[arg(long, default_value = "8081")]
    ws_port: u16,

    /// Enemy tick interval in milliseconds
    #[arg(short, long, default_value = "100")]
    tick_ms: u64,

    /// Enemy spawner interval in milliseconds
    #[arg(short, long, default_value = "2000")]
    spawn_ms: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();

    let ctx = Arc::new(ServerContext::new());

    let stream_addr = format!("{}:{}", args.host, args.port);
    let message_addr = format!("{}:{}", args.host, args.ws_port);

    {
        let ctx = Arc::clone(&ctx);
        tokio::spawn(async move {
            if let Err(e) = net::run_stream_listener(ctx, &stream_addr).await {
                error!("Stream listener failed: {}", e);
            }
        });
    }
    {
        let ctx = Arc::clone(&ctx);
        tokio::spawn(async move {
            if let Err(e) = net::run_message_listener(ctx, &message_addr).await {
                error!("Message listener failed: {}", e);
            }
        });
    }
    tokio::spawn(ai::run_enemy_tick(
        Arc::clone(&ctx),
        Duration::from_millis(args.tick_ms),
    ));
    tokio::spawn(ai::run_spawner(
        Arc::clone(&ctx),
        Duration::from_millis(args.spawn_ms),
    ));
    tokio::spawn(net::run_heartbeat(Arc::clone(&ctx)));

    info!("Server started");
    tokio::signal::ctrl_c().await?;

    info!("Shutting down");
    ctx.shutdown.store(true, Ordering::Relaxed);

    // Best-effort quit notice, then a grace period for tasks to observe
    // the flag before the process exits.
    if let Ok(payload) = serde_json::to_string(&ServerMessage::Quit) {
        let _ = ctx.sessions.lock().await.broadcast(&payload);
    }
    tokio::time::sleep(Duration::from_secs(1)).await;

    Ok(())
}
