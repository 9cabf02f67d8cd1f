//! Client implementation.
//!
//! The client maintains:
//! - A reliable stream to the room server, split into a reader task and a
//!   writer task
//! - An inbound queue the frame loop drains into the object manager
//! - The networked object manager itself

use std::{net::SocketAddr, time::Duration};

use anyhow::Context;
use boxrush_shared::{
    config::GameConfig,
    event::CubeKind,
    math::Vec3,
    net::{pump_inbound, pump_outbound, ReliableConn, RoomId, SyncMsg, PROTOCOL_VERSION},
};
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{debug, info, warn};

use crate::{
    manager::ObjectManager,
    networked::{NetworkObjectManager, SyncState},
};

/// How often `wait_until_ready` re-checks the inbound queue.
const READY_POLL: Duration = Duration::from_millis(5);

/// High-level networked game client.
pub struct GameClient {
    pub manager: NetworkObjectManager,
    inbound: mpsc::UnboundedReceiver<SyncMsg>,
    server: SocketAddr,
    connected: bool,
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
}

impl GameClient {
    /// Connects to the room server and starts the handshake.
    ///
    /// Returns once `Hello` is sent; the room is joined as messages arrive
    /// through [`poll`](Self::poll).
    pub async fn connect(cfg: &GameConfig) -> anyhow::Result<Self> {
        let server: SocketAddr = cfg.server_addr.parse().context("parse server_addr")?;

        info!(server = %server, room = ?cfg.room, "Connecting to server");

        let mut conn = ReliableConn::connect(server).await?;
        conn.send(&SyncMsg::Hello {
            protocol: PROTOCOL_VERSION,
        })
        .await?;

        let (read_half, write_half) = conn.into_split();
        let (in_tx, inbound) = mpsc::unbounded_channel();
        let (out_tx, out_rx) = mpsc::unbounded_channel();

        let reader = tokio::spawn(async move {
            let result = pump_inbound(read_half, |msg| in_tx.send(msg).is_ok()).await;
            if let Err(e) = result {
                debug!(error = %e, "Inbound stream ended");
            }
        });
        let writer = tokio::spawn(async move {
            if let Err(e) = pump_outbound(write_half, out_rx).await {
                warn!(error = %e, "Outbound stream failed");
            }
        });

        let requested = cfg.room.clone().map(RoomId);
        Ok(Self {
            manager: NetworkObjectManager::new(requested, out_tx),
            inbound,
            server,
            connected: true,
            reader,
            writer,
        })
    }

    pub fn server_addr(&self) -> SocketAddr {
        self.server
    }

    /// False once the server side of the stream has gone away.
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn state(&self) -> SyncState {
        self.manager.state()
    }

    /// Applies every message received since the last poll, in arrival order.
    ///
    /// Returns how many were applied.
    pub fn poll(&mut self) -> anyhow::Result<usize> {
        let mut handled = 0;
        loop {
            match self.inbound.try_recv() {
                Ok(msg) => {
                    self.manager
                        .handle_message(msg)
                        .context("apply sync message")?;
                    handled += 1;
                }
                Err(mpsc::error::TryRecvError::Empty) => break,
                Err(mpsc::error::TryRecvError::Disconnected) => {
                    if self.connected {
                        info!("Disconnected from server");
                    }
                    self.connected = false;
                    break;
                }
            }
        }
        Ok(handled)
    }

    /// Polls until the room is joined or `timeout` elapses.
    pub async fn wait_until_ready(&mut self, timeout: Duration) -> anyhow::Result<()> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            self.poll()?;
            if self.manager.ready() {
                return Ok(());
            }
            if !self.connected {
                anyhow::bail!("disconnected while in {:?}", self.manager.state());
            }
            if tokio::time::Instant::now() >= deadline {
                anyhow::bail!("no room confirmation within {timeout:?}");
            }
            tokio::time::sleep(READY_POLL).await;
        }
    }

    /// Advances the self cube one frame. Returns whether it hit an enemy.
    pub fn tick(&mut self, velocity: Vec3) -> anyhow::Result<bool> {
        let crashed = self
            .manager
            .update_cube(CubeKind::SelfCube, velocity)
            .context("advance self cube")?;
        Ok(crashed)
    }
}

impl Drop for GameClient {
    fn drop(&mut self) {
        self.reader.abort();
        self.writer.abort();
    }
}
