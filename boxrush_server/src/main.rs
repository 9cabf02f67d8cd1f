//! Standalone server binary.
//!
//! Usage:
//!   cargo run -p boxrush_server -- [--addr 127.0.0.1:40000] [--tick-hz 60] [--seed 7]
//!
//! The server accepts clients, keeps their rooms and relays state between
//! members while spawning enemies for every open room.

use std::env;
use std::time::Duration;

use anyhow::Context;
use boxrush_server::RoomServer;
use boxrush_shared::config::GameConfig;
use tracing::{info, warn};

fn parse_args() -> GameConfig {
    let mut cfg = GameConfig::default();
    let args: Vec<String> = env::args().collect();
    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--addr" if i + 1 < args.len() => {
                cfg.server_addr = args[i + 1].clone();
                i += 2;
            }
            "--tick-hz" if i + 1 < args.len() => {
                cfg.tick_hz = args[i + 1].parse().unwrap_or(60);
                i += 2;
            }
            "--seed" if i + 1 < args.len() => {
                cfg.seed = args[i + 1].parse().ok();
                i += 2;
            }
            _ => i += 1,
        }
    }
    cfg
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cfg = parse_args();
    info!(addr = %cfg.server_addr, tick_hz = cfg.tick_hz, seed = ?cfg.seed, "Starting server");

    let mut server = RoomServer::bind(cfg.clone()).await.context("create server")?;
    let local = server.local_addr()?;
    info!(%local, "Server listening");

    let tick_interval = Duration::from_secs_f32(1.0 / cfg.tick_hz.max(1) as f32);
    let mut next_tick = tokio::time::Instant::now();

    loop {
        // Accept new clients (non-blocking). A bad handshake only drops that peer.
        match server.try_accept(Duration::from_millis(1)).await {
            Ok(Some(cid)) => info!(client_id = ?cid, "New client accepted"),
            Ok(None) => {}
            Err(e) => warn!(error = %e, "Rejected connection"),
        }

        server.step();

        next_tick += tick_interval;
        tokio::time::sleep_until(next_tick).await;
    }
}
