//! Helpers shared by the integration tests.

use std::time::Duration;

use boxrush_client::{GameClient, ObjectManager};
use boxrush_server::RoomServer;
use boxrush_shared::config::GameConfig;
use tokio::{sync::oneshot, task::JoinHandle};
use tracing::warn;

/// Client frame period used by [`drive`].
pub const FRAME: Duration = Duration::from_millis(5);

/// Server loop period used by [`spawn_server`].
const SERVER_STEP: Duration = Duration::from_millis(2);

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("info")
        .with_test_writer()
        .try_init();
}

/// A server accept + step loop running in the background.
pub struct ServerHandle {
    stop: oneshot::Sender<()>,
    task: JoinHandle<RoomServer>,
}

impl ServerHandle {
    /// Stops the loop and hands the server back for inspection.
    pub async fn shutdown(self) -> anyhow::Result<RoomServer> {
        let _ = self.stop.send(());
        Ok(self.task.await?)
    }
}

pub fn spawn_server(mut server: RoomServer) -> ServerHandle {
    let (stop, mut stop_rx) = oneshot::channel();
    let task = tokio::spawn(async move {
        while let Err(oneshot::error::TryRecvError::Empty) = stop_rx.try_recv() {
            if let Err(e) = server.try_accept(Duration::from_millis(1)).await {
                warn!(error = %e, "Rejected connection");
            }
            server.step();
            tokio::time::sleep(SERVER_STEP).await;
        }
        server
    });
    ServerHandle { stop, task }
}

pub fn client_config(server_addr: &str, room: Option<&str>) -> GameConfig {
    GameConfig {
        server_addr: server_addr.to_string(),
        room: room.map(str::to_string),
        ..Default::default()
    }
}

/// Runs `frames` client frames: apply inbound messages, then advance the
/// self cube at its current velocity. Crashes are ignored.
pub async fn drive(client: &mut GameClient, frames: usize) -> anyhow::Result<()> {
    for _ in 0..frames {
        client.poll()?;
        let velocity = client
            .manager
            .roster()
            .self_cube()
            .map(|c| c.velocity)
            .unwrap_or_default();
        client.tick(velocity)?;
        tokio::time::sleep(FRAME).await;
    }
    Ok(())
}

/// Polls `client` without ticking until `done` holds or `timeout` elapses.
pub async fn poll_until<F>(client: &mut GameClient, timeout: Duration, mut done: F) -> bool
where
    F: FnMut(&GameClient) -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if client.poll().is_err() {
            return false;
        }
        if done(client) {
            return true;
        }
        tokio::time::sleep(FRAME).await;
    }
    false
}
