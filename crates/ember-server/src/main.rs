mod config;
mod interfaces;
mod network;
mod world;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use ember_stats::PacketStatsRecorder;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use config::ServerConfig;
use interfaces::{AuthClient, OfflineAuthClient};
use world::{run_world_executor, WorldCommand};

const TICK_INTERVAL: Duration = Duration::from_millis(50);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = ServerConfig::load(Path::new("config/server.toml"))?;
    let config = Arc::new(config);
    let auth: Arc<dyn AuthClient> = Arc::new(OfflineAuthClient);
    let stats = Arc::new(PacketStatsRecorder::new());

    let mut world_senders = Vec::with_capacity(config.worlds.len());
    let mut world_handles = Vec::with_capacity(config.worlds.len());
    for world_config in &config.worlds {
        let (tx, rx) = mpsc::unbounded_channel::<WorldCommand>();
        info!(world = %world_config.name, "starting world executor");
        let handle = tokio::spawn(run_world_executor(world_config.clone(), rx));
        world_senders.push(tx);
        world_handles.push(handle);
    }

    // Player-to-world assignment isn't specified, so new connections join the
    // first configured world.
    let default_world = world_senders[0].clone();

    let listener = TcpListener::bind((config.bind.as_str(), config.port)).await?;
    info!("listening on {}:{}", config.bind, config.port);

    let tick_senders = world_senders.clone();
    let tick_task = tokio::spawn(async move {
        let mut last = tokio::time::Instant::now();
        let mut ticker = tokio::time::interval(TICK_INTERVAL);
        loop {
            ticker.tick().await;
            let now = tokio::time::Instant::now();
            let dt_millis = now.duration_since(last).as_millis() as u64;
            last = now;
            let now_millis = network::now_millis();
            for tx in &tick_senders {
                let _ = tx.send(WorldCommand::Tick { dt_millis, now_millis });
            }
        }
    });

    tokio::select! {
        _ = network::accept_loop(listener, config.clone(), auth, stats, default_world) => {}
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                warn!("failed to listen for ctrl-c: {}", e);
            }
            info!("shutting down");
        }
    }

    tick_task.abort();
    for tx in &world_senders {
        let _ = tx.send(WorldCommand::Shutdown);
    }
    for handle in world_handles {
        let _ = handle.await;
    }

    Ok(())
}
