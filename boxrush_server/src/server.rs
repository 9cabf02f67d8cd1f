//! Room relay server.
//!
//! The server is authoritative for room membership, peer state relay and
//! enemy spawns; it runs no physics of its own. It supports:
//! - Handshake with protocol version check and identity assignment
//! - Room creation (random names) and join-by-name
//! - Relaying each client's per-frame state to its room
//! - One enemy spawner per room, ticked once per server step
//!
//! Relays go to every room member, the sender included; clients drop their
//! own echoes by comparing identities.

use std::{
    collections::HashMap,
    net::{IpAddr, Ipv4Addr, SocketAddr},
    time::Duration,
};

use anyhow::Context;
use boxrush_shared::{
    config::GameConfig,
    entity::player_cube,
    math::Vec3,
    net::{
        pump_inbound, pump_outbound, ClientId, ReliableConn, ReliableListener, RoomId, SyncMsg,
        PROTOCOL_VERSION,
    },
    room::RoomRegistry,
    spawner::EnemySpawner,
};
use tokio::{sync::mpsc, task::JoinHandle, time::Instant};
use tracing::{debug, info, warn};

/// How long a new connection has to send `Hello`.
pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(2);

/// Horizontal gap between the starting cubes of room members.
pub const SPAWN_SPACING: f32 = 2.0;

/// Inbound event from a client reader task. `None` means the stream closed.
type Inbound = (ClientId, Option<SyncMsg>);

/// Connected client state.
struct ClientConn {
    outbox: mpsc::UnboundedSender<SyncMsg>,
    peer: SocketAddr,
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
}

impl Drop for ClientConn {
    fn drop(&mut self) {
        self.reader.abort();
        self.writer.abort();
    }
}

/// Room relay server.
pub struct RoomServer {
    pub cfg: GameConfig,
    tcp: ReliableListener,
    clients: HashMap<ClientId, ClientConn>,
    rooms: RoomRegistry,
    spawners: HashMap<RoomId, EnemySpawner>,

    inbound_tx: mpsc::UnboundedSender<Inbound>,
    inbound_rx: mpsc::UnboundedReceiver<Inbound>,

    next_client_id: u32,
    tick: u64,
}

impl RoomServer {
    /// Binds the listener at `cfg.server_addr`.
    pub async fn bind(cfg: GameConfig) -> anyhow::Result<Self> {
        let addr: SocketAddr = cfg.server_addr.parse().context("parse server_addr")?;
        let tcp = ReliableListener::bind(addr).await?;
        Ok(Self::from_listener(cfg, tcp))
    }

    fn from_listener(cfg: GameConfig, tcp: ReliableListener) -> Self {
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        Self {
            cfg,
            tcp,
            clients: HashMap::new(),
            rooms: RoomRegistry::new(),
            spawners: HashMap::new(),
            inbound_tx,
            inbound_rx,
            next_client_id: 1,
            tick: 0,
        }
    }

    /// Returns the local address (after binding).
    pub fn local_addr(&self) -> anyhow::Result<SocketAddr> {
        self.tcp.local_addr()
    }

    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    pub fn rooms(&self) -> &RoomRegistry {
        &self.rooms
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// Accepts exactly one client and completes its handshake.
    pub async fn accept_one(&mut self) -> anyhow::Result<ClientId> {
        let (conn, peer) = self.tcp.accept().await?;
        self.handle_new_connection(conn, peer).await
    }

    /// Accepts a client with timeout (non-blocking).
    pub async fn try_accept(&mut self, timeout: Duration) -> anyhow::Result<Option<ClientId>> {
        match tokio::time::timeout(timeout, self.tcp.accept()).await {
            Ok(Ok((conn, peer))) => self.handle_new_connection(conn, peer).await.map(Some),
            Ok(Err(e)) => Err(e),
            Err(_) => Ok(None),
        }
    }

    async fn handle_new_connection(
        &mut self,
        mut conn: ReliableConn,
        peer: SocketAddr,
    ) -> anyhow::Result<ClientId> {
        let hello = tokio::time::timeout(HANDSHAKE_TIMEOUT, conn.recv())
            .await
            .context("handshake timed out")??;
        match hello {
            SyncMsg::Hello { protocol } if protocol == PROTOCOL_VERSION => {}
            other => anyhow::bail!("unexpected handshake msg from {peer}: {other:?}"),
        }

        let Some(next) = self.next_client_id.checked_add(1) else {
            anyhow::bail!("client ids exhausted, rejecting {peer}");
        };
        let id = ClientId(self.next_client_id);
        self.next_client_id = next;
        conn.send(&SyncMsg::IdentityAssigned { id }).await?;

        let (read_half, write_half) = conn.into_split();
        let (outbox, out_rx) = mpsc::unbounded_channel();

        let inbound = self.inbound_tx.clone();
        let reader = tokio::spawn(async move {
            let result = pump_inbound(read_half, |msg| inbound.send((id, Some(msg))).is_ok()).await;
            if let Err(e) = result {
                debug!(client_id = ?id, error = %e, "Client stream ended");
            }
            let _ = inbound.send((id, None));
        });
        let writer = tokio::spawn(async move {
            if let Err(e) = pump_outbound(write_half, out_rx).await {
                debug!(client_id = ?id, error = %e, "Client write failed");
            }
        });

        self.clients.insert(
            id,
            ClientConn {
                outbox,
                peer,
                reader,
                writer,
            },
        );

        info!(client_id = ?id, %peer, "Client connected");
        Ok(id)
    }

    /// Runs the server for a number of ticks.
    pub async fn run_for_ticks(&mut self, ticks: u32) -> anyhow::Result<()> {
        let dt = Duration::from_secs_f32(1.0 / self.cfg.tick_hz.max(1) as f32);
        let mut next = Instant::now();

        for _ in 0..ticks {
            next += dt;
            self.step();
            tokio::time::sleep_until(next).await;
        }
        Ok(())
    }

    /// Executes one server step: apply client messages, then spawn enemies.
    pub fn step(&mut self) {
        while let Ok((client, msg)) = self.inbound_rx.try_recv() {
            match msg {
                Some(msg) => self.handle_message(client, msg),
                None => self.disconnect(client),
            }
        }

        let spawns: Vec<_> = self
            .spawners
            .iter_mut()
            .filter_map(|(room, spawner)| spawner.tick().map(|enemy| (room.clone(), enemy)))
            .collect();
        for (room, enemy) in spawns {
            debug!(room = %room, x = enemy.position.x, "Enemy spawned");
            self.broadcast(
                &room,
                SyncMsg::EnemySpawned {
                    enemy: enemy.snapshot(),
                },
            );
        }

        self.tick += 1;
    }

    fn handle_message(&mut self, client: ClientId, msg: SyncMsg) {
        match msg {
            SyncMsg::CreateRoom => match self.rooms.create_room(client) {
                Ok(room) => self.on_joined(client, room, 0),
                Err(e) => warn!(client_id = ?client, error = %e, "Create room failed"),
            },
            SyncMsg::JoinRoom { id } => match self.rooms.join_room(client, &id) {
                Ok(index) => self.on_joined(client, id, index),
                Err(e) => warn!(client_id = ?client, room = %id, error = %e, "Join room failed"),
            },
            SyncMsg::SelfPosition { velocity, cube } => {
                let Some(room) = self.rooms.room_of(client).map(|r| r.id.clone()) else {
                    debug!(client_id = ?client, "Position from client outside any room");
                    return;
                };
                self.broadcast(
                    &room,
                    SyncMsg::PeerPosition {
                        id: client,
                        velocity,
                        cube,
                    },
                );
            }
            other => {
                debug!(client_id = ?client, ?other, "Ignoring message not meant for server");
            }
        }
    }

    fn on_joined(&mut self, client: ClientId, room: RoomId, index: usize) {
        let seed = self.cfg.seed;
        self.spawners
            .entry(room.clone())
            .or_insert_with(|| EnemySpawner::new(seed));

        let cube = player_cube()
            .with_position(Vec3::new(SPAWN_SPACING * index as f32, 0.0, 0.0))
            .snapshot();

        info!(client_id = ?client, room = %room, index, "Client joined room");
        self.send_to(
            client,
            SyncMsg::RoomConfirmed {
                room_id: room.clone(),
                cube: cube.clone(),
            },
        );
        self.broadcast(&room, SyncMsg::PeerJoined { id: client, cube });
    }

    fn disconnect(&mut self, client: ClientId) {
        let Some(conn) = self.clients.remove(&client) else {
            return;
        };
        info!(client_id = ?client, peer = %conn.peer, "Client disconnected");

        if let Ok(room) = self.rooms.leave(client) {
            if self.rooms.get_room(&room).is_none() {
                debug!(room = %room, "Room closed");
                self.spawners.remove(&room);
            }
        }
    }

    fn send_to(&self, client: ClientId, msg: SyncMsg) {
        if let Some(conn) = self.clients.get(&client) {
            if conn.outbox.send(msg).is_err() {
                debug!(client_id = ?client, "Dropping message for closed client");
            }
        }
    }

    fn broadcast(&self, room: &RoomId, msg: SyncMsg) {
        for member in self.rooms.members(room) {
            self.send_to(*member, msg.clone());
        }
    }
}

/// Helper for tests: bind to an ephemeral port.
pub async fn bind_ephemeral(tick_hz: u32) -> anyhow::Result<(RoomServer, GameConfig)> {
    let cfg = GameConfig {
        server_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 0).to_string(),
        tick_hz,
        ..Default::default()
    };

    let tcp = ReliableListener::bind(cfg.server_addr.parse()?).await?;
    let mut cfg = cfg;
    cfg.server_addr = tcp.local_addr()?.to_string();

    Ok((RoomServer::from_listener(cfg.clone(), tcp), cfg))
}

#[cfg(test)]
mod tests {
    use super::*;
    use boxrush_shared::net::BoxSnapshot;

    async fn connect(addr: &str) -> anyhow::Result<ReliableConn> {
        let mut conn = ReliableConn::connect(addr.parse()?).await?;
        conn.send(&SyncMsg::Hello {
            protocol: PROTOCOL_VERSION,
        })
        .await?;
        Ok(conn)
    }

    async fn recv(conn: &mut ReliableConn) -> anyhow::Result<SyncMsg> {
        tokio::time::timeout(Duration::from_secs(2), conn.recv())
            .await
            .context("recv timed out")?
    }

    /// Gives reader tasks time to queue client messages, stepping in between.
    async fn settle(server: &mut RoomServer) {
        for _ in 0..5 {
            tokio::time::sleep(Duration::from_millis(10)).await;
            server.step();
        }
    }

    async fn next_non_enemy(conn: &mut ReliableConn) -> anyhow::Result<SyncMsg> {
        loop {
            match recv(conn).await? {
                SyncMsg::EnemySpawned { .. } => continue,
                other => return Ok(other),
            }
        }
    }

    #[tokio::test]
    async fn handshake_assigns_sequential_ids() -> anyhow::Result<()> {
        let (mut server, cfg) = bind_ephemeral(64).await?;

        let mut a = connect(&cfg.server_addr).await?;
        assert_eq!(server.accept_one().await?, ClientId(1));
        assert_eq!(recv(&mut a).await?, SyncMsg::IdentityAssigned { id: ClientId(1) });

        let mut b = connect(&cfg.server_addr).await?;
        assert_eq!(server.accept_one().await?, ClientId(2));
        assert_eq!(recv(&mut b).await?, SyncMsg::IdentityAssigned { id: ClientId(2) });
        assert_eq!(server.client_count(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn exhausted_ids_reject_connection() -> anyhow::Result<()> {
        let (mut server, cfg) = bind_ephemeral(64).await?;
        server.next_client_id = u32::MAX;

        let _conn = connect(&cfg.server_addr).await?;
        assert!(server.accept_one().await.is_err());
        assert_eq!(server.client_count(), 0);
        assert_eq!(server.next_client_id, u32::MAX);
        Ok(())
    }

    #[tokio::test]
    async fn third_join_is_refused() -> anyhow::Result<()> {
        let (mut server, cfg) = bind_ephemeral(64).await?;
        let name = RoomId("trio".into());

        let mut conns = Vec::new();
        for _ in 0..3 {
            let mut conn = connect(&cfg.server_addr).await?;
            server.accept_one().await?;
            recv(&mut conn).await?;
            conn.send(&SyncMsg::JoinRoom { id: name.clone() }).await?;
            settle(&mut server).await;
            conns.push(conn);
        }

        assert_eq!(server.rooms().members(&name), &[ClientId(1), ClientId(2)]);
        assert!(server.rooms().room_of(ClientId(3)).is_none());
        assert_eq!(server.client_count(), 3);
        Ok(())
    }

    #[tokio::test]
    async fn wrong_protocol_is_rejected() -> anyhow::Result<()> {
        let (mut server, cfg) = bind_ephemeral(64).await?;

        let mut conn = ReliableConn::connect(cfg.server_addr.parse()?).await?;
        conn.send(&SyncMsg::Hello { protocol: 999 }).await?;

        assert!(server.accept_one().await.is_err());
        assert_eq!(server.client_count(), 0);
        Ok(())
    }

    #[tokio::test]
    async fn create_room_confirms_and_echoes_join() -> anyhow::Result<()> {
        let (mut server, cfg) = bind_ephemeral(64).await?;
        let mut conn = connect(&cfg.server_addr).await?;
        let id = server.accept_one().await?;
        recv(&mut conn).await?;

        conn.send(&SyncMsg::CreateRoom).await?;
        settle(&mut server).await;

        let (room_id, cube) = match next_non_enemy(&mut conn).await? {
            SyncMsg::RoomConfirmed { room_id, cube } => (room_id, cube),
            other => panic!("expected RoomConfirmed, got {other:?}"),
        };
        assert_eq!(cube, player_cube().snapshot());
        assert_eq!(server.rooms().members(&room_id), &[id]);

        match next_non_enemy(&mut conn).await? {
            SyncMsg::PeerJoined { id: joined, .. } => assert_eq!(joined, id),
            other => panic!("expected PeerJoined, got {other:?}"),
        }
        Ok(())
    }

    #[tokio::test]
    async fn position_is_relayed_to_room() -> anyhow::Result<()> {
        let (mut server, cfg) = bind_ephemeral(64).await?;
        let mut conn = connect(&cfg.server_addr).await?;
        let id = server.accept_one().await?;
        recv(&mut conn).await?;

        conn.send(&SyncMsg::JoinRoom {
            id: RoomId("lobby1".into()),
        })
        .await?;
        settle(&mut server).await;
        next_non_enemy(&mut conn).await?;
        next_non_enemy(&mut conn).await?;

        let cube: BoxSnapshot = player_cube().snapshot();
        let velocity = Vec3::new(0.05, 0.0, 0.0);
        conn.send(&SyncMsg::SelfPosition {
            velocity,
            cube: cube.clone(),
        })
        .await?;
        settle(&mut server).await;

        assert_eq!(
            next_non_enemy(&mut conn).await?,
            SyncMsg::PeerPosition { id, velocity, cube }
        );
        Ok(())
    }

    #[tokio::test]
    async fn disconnect_closes_empty_room() -> anyhow::Result<()> {
        let (mut server, cfg) = bind_ephemeral(64).await?;
        let mut conn = connect(&cfg.server_addr).await?;
        server.accept_one().await?;
        recv(&mut conn).await?;

        conn.send(&SyncMsg::CreateRoom).await?;
        settle(&mut server).await;
        assert_eq!(server.rooms().len(), 1);

        drop(conn);
        for _ in 0..100 {
            server.step();
            if server.client_count() == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        assert_eq!(server.client_count(), 0);
        assert!(server.rooms().is_empty());
        Ok(())
    }
}
