//! Standalone headless client binary.
//!
//! Usage:
//!   cargo run -p boxrush_client -- [--addr 127.0.0.1:40000] [--room <name>]
//!   cargo run -p boxrush_client -- --local [--seed 7] [--companion] [--frames 600]
//!
//! Without `--room` the client asks the server for a new room and logs its
//! name so a second client can join with `--room`. The self cube has no
//! input here: it keeps its own velocity and the session ends at the first
//! crash, on disconnect, or after `--frames` frames.

use std::env;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use boxrush_client::{GameClient, LocalObjectManager, LocalOptions, ObjectManager};
use boxrush_shared::{
    config::GameConfig,
    entity::PhysicsBox,
    event::{CubeKind, CubeListener},
    math::Vec3,
    render::NullRenderer,
};
use tracing::{debug, info};

const JOIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Reads `--config <file>` if given; a missing or bad file leaves defaults.
fn base_config(args: &[String]) -> GameConfig {
    let Some(path) = args
        .windows(2)
        .find(|w| w[0] == "--config")
        .map(|w| w[1].as_str())
    else {
        return GameConfig::default();
    };
    match std::fs::read_to_string(path) {
        Ok(text) => match GameConfig::from_json_str(&text) {
            Ok(parsed) => parsed,
            Err(e) => {
                eprintln!("ignoring bad config {path}: {e}");
                GameConfig::default()
            }
        },
        Err(e) => {
            eprintln!("cannot read {path}: {e}");
            GameConfig::default()
        }
    }
}

/// Command-line flags override the config file wherever they appear.
fn parse_args_from(args: &[String]) -> GameConfig {
    let mut cfg = base_config(args);
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
            "--room" if i + 1 < args.len() => {
                cfg.room = Some(args[i + 1].clone());
                i += 2;
            }
            "--seed" if i + 1 < args.len() => {
                cfg.seed = args[i + 1].parse().ok();
                i += 2;
            }
            "--frames" if i + 1 < args.len() => {
                cfg.max_frames = args[i + 1].parse().unwrap_or(0);
                i += 2;
            }
            "--config" if i + 1 < args.len() => i += 2,
            "--local" => {
                cfg.local = true;
                i += 1;
            }
            "--companion" => {
                cfg.local_companion = true;
                i += 1;
            }
            _ => i += 1,
        }
    }
    cfg
}

fn parse_args() -> GameConfig {
    let args: Vec<String> = env::args().collect();
    parse_args_from(&args)
}

fn log_creations() -> CubeListener {
    Arc::new(|kind: CubeKind, cube: &PhysicsBox| {
        debug!(
            %kind,
            x = cube.position.x,
            z = cube.position.z,
            color = %cube.appearance().color,
            "Cube created"
        );
    })
}

fn current_velocity(manager: &dyn ObjectManager) -> Vec3 {
    manager
        .roster()
        .self_cube()
        .map(|c| c.velocity)
        .unwrap_or_default()
}

fn frame_limit_reached(cfg: &GameConfig, frame: u64) -> bool {
    cfg.max_frames != 0 && frame >= cfg.max_frames
}

fn run_local(cfg: &GameConfig) -> anyhow::Result<()> {
    let mut manager = LocalObjectManager::new(LocalOptions {
        with_companion: cfg.local_companion,
        seed: cfg.seed,
    });
    manager.on_cube_created(log_creations());
    manager.init().context("init local session")?;

    let mut renderer = NullRenderer;
    let mut frame = 0u64;
    loop {
        let velocity = current_velocity(&manager);
        if manager.update_cube(CubeKind::SelfCube, velocity)? {
            info!(frame, enemies = manager.roster().enemies().len(), "Crashed");
            break;
        }
        manager.roster().draw(&mut renderer);

        frame += 1;
        if frame_limit_reached(cfg, frame) {
            info!(frame, "Frame limit reached");
            break;
        }
    }
    Ok(())
}

async fn run_networked(cfg: &GameConfig) -> anyhow::Result<()> {
    let mut client = GameClient::connect(cfg).await.context("connect")?;
    client.manager.on_cube_created(log_creations());
    client
        .wait_until_ready(JOIN_TIMEOUT)
        .await
        .context("join room")?;

    if let Some(room) = client.manager.room_id() {
        println!("Joined room {room}. Share it with: --room {room}");
    }

    let tick_interval = Duration::from_secs_f32(1.0 / cfg.tick_hz.max(1) as f32);
    let mut renderer = NullRenderer;
    let mut frame = 0u64;

    loop {
        client.poll()?;
        if !client.is_connected() {
            println!("Disconnected from server.");
            break;
        }

        let velocity = current_velocity(&client.manager);
        if client.tick(velocity)? {
            info!(
                frame,
                enemies = client.manager.roster().enemies().len(),
                "Crashed"
            );
            break;
        }
        client.manager.roster().draw(&mut renderer);

        frame += 1;
        if frame_limit_reached(cfg, frame) {
            info!(frame, "Frame limit reached");
            break;
        }

        tokio::time::sleep(tick_interval).await;
    }

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cfg = parse_args();
    info!(server = %cfg.server_addr, local = cfg.local, room = ?cfg.room, "Starting client");

    if cfg.local {
        run_local(&cfg)
    } else {
        run_networked(&cfg).await
    }
}
