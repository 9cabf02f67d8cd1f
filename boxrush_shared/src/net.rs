//! Networking primitives.
//!
//! Goals:
//! - Define the room/sync protocol spoken between clients and the relay server.
//! - Provide a reliable (TCP) channel with length-prefixed JSON frames.
//! - Keep serialization explicit and versionable.
//!
//! The channel is split into a [`SyncSource`] (inbound frames) and a
//! [`SyncSink`] (outbound messages) so reads and writes can run on separate
//! tasks; a TCP read is not cancel-safe, so the two are never `select!`ed on
//! one stream.

use anyhow::Context;
use async_trait::async_trait;
use bytes::{BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt},
    net::{
        tcp::{OwnedReadHalf, OwnedWriteHalf},
        TcpListener, TcpStream,
    },
    sync::mpsc,
};
use tracing::debug;

use crate::math::Vec3;

/// Protocol version for compatibility checks.
pub const PROTOCOL_VERSION: u32 = 1;

/// Upper bound on a single frame; anything larger is treated as a broken stream.
pub const MAX_FRAME_LEN: usize = 64 * 1024;

/// Identity the server assigns to a connected client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClientId(pub u32);

/// Room name. Shared out of band so a second player can join.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoomId(pub String);

impl std::fmt::Display for RoomId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Plain wire form of a box.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BoxSnapshot {
    pub width: f32,
    pub height: f32,
    pub depth: f32,
    pub position: Vec3,
    pub velocity: Vec3,
    pub color: String,
}

/// High-level message envelope.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum SyncMsg {
    // ─── Connection handshake ───
    /// Client -> server, first frame on a new connection.
    Hello {
        protocol: u32,
    },
    /// Server -> client: the identity used for self-echo filtering.
    IdentityAssigned {
        id: ClientId,
    },

    // ─── Rooms ───
    CreateRoom,
    JoinRoom {
        id: RoomId,
    },
    /// Server -> client: joined, with the starting state of the client's cube.
    RoomConfirmed {
        room_id: RoomId,
        cube: BoxSnapshot,
    },

    // ─── Entity replication ───
    EnemySpawned {
        enemy: BoxSnapshot,
    },
    PeerJoined {
        id: ClientId,
        cube: BoxSnapshot,
    },
    PeerPosition {
        id: ClientId,
        velocity: Vec3,
        cube: BoxSnapshot,
    },
    /// Client -> server: this client's per-frame state.
    SelfPosition {
        velocity: Vec3,
        cube: BoxSnapshot,
    },
}

/// Inbound half of a sync channel.
#[async_trait]
pub trait SyncSource: Send {
    /// Reads one raw frame. An error means the channel is gone.
    async fn recv_frame(&mut self) -> anyhow::Result<Bytes>;
}

/// Outbound half of a sync channel.
#[async_trait]
pub trait SyncSink: Send {
    async fn send(&mut self, msg: &SyncMsg) -> anyhow::Result<()>;
}

async fn write_frame<W: AsyncWrite + Unpin>(w: &mut W, msg: &SyncMsg) -> anyhow::Result<()> {
    let payload = serde_json::to_vec(msg).context("serialize msg")?;
    let mut buf = BytesMut::with_capacity(4 + payload.len());
    buf.put_u32(payload.len() as u32);
    buf.extend_from_slice(&payload);
    w.write_all(&buf).await.context("tcp write")?;
    Ok(())
}

async fn read_frame<R: AsyncRead + Unpin>(r: &mut R) -> anyhow::Result<Bytes> {
    let mut len_buf = [0u8; 4];
    r.read_exact(&mut len_buf).await.context("tcp read len")?;
    let len = u32::from_be_bytes(len_buf) as usize;
    if len > MAX_FRAME_LEN {
        anyhow::bail!("frame of {len} bytes exceeds {MAX_FRAME_LEN}");
    }
    let mut payload = vec![0u8; len];
    r.read_exact(&mut payload)
        .await
        .context("tcp read payload")?;
    Ok(Bytes::from(payload))
}

/// Reliable connection over TCP with length-prefixed frames.
#[derive(Debug)]
pub struct ReliableConn {
    stream: TcpStream,
}

impl ReliableConn {
    pub fn new(stream: TcpStream) -> Self {
        Self { stream }
    }

    pub async fn connect(addr: SocketAddr) -> anyhow::Result<Self> {
        let stream = TcpStream::connect(addr).await.context("tcp connect")?;
        Ok(Self::new(stream))
    }

    pub async fn send(&mut self, msg: &SyncMsg) -> anyhow::Result<()> {
        write_frame(&mut self.stream, msg).await
    }

    pub async fn recv(&mut self) -> anyhow::Result<SyncMsg> {
        let frame = read_frame(&mut self.stream).await?;
        decode_from_bytes(&frame)
    }

    pub fn peer_addr(&self) -> anyhow::Result<SocketAddr> {
        Ok(self.stream.peer_addr()?)
    }

    /// Splits into independently owned read and write halves.
    pub fn into_split(self) -> (ReliableReader, ReliableWriter) {
        let (read, write) = self.stream.into_split();
        (ReliableReader { read }, ReliableWriter { write })
    }
}

/// Read half of a [`ReliableConn`].
#[derive(Debug)]
pub struct ReliableReader {
    read: OwnedReadHalf,
}

#[async_trait]
impl SyncSource for ReliableReader {
    async fn recv_frame(&mut self) -> anyhow::Result<Bytes> {
        read_frame(&mut self.read).await
    }
}

/// Write half of a [`ReliableConn`].
#[derive(Debug)]
pub struct ReliableWriter {
    write: OwnedWriteHalf,
}

#[async_trait]
impl SyncSink for ReliableWriter {
    async fn send(&mut self, msg: &SyncMsg) -> anyhow::Result<()> {
        write_frame(&mut self.write, msg).await
    }
}

/// TCP server listener.
pub struct ReliableListener {
    listener: TcpListener,
}

impl ReliableListener {
    pub async fn bind(addr: SocketAddr) -> anyhow::Result<Self> {
        let listener = TcpListener::bind(addr).await.context("tcp bind")?;
        Ok(Self { listener })
    }

    pub async fn accept(&self) -> anyhow::Result<(ReliableConn, SocketAddr)> {
        let (stream, addr) = self.listener.accept().await.context("tcp accept")?;
        Ok((ReliableConn::new(stream), addr))
    }

    pub fn local_addr(&self) -> anyhow::Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }
}

/// Drains `rx` into `sink` until either side closes.
///
/// Returns the sink error if a write failed; a closed `rx` ends cleanly.
pub async fn pump_outbound<S: SyncSink>(
    mut sink: S,
    mut rx: mpsc::UnboundedReceiver<SyncMsg>,
) -> anyhow::Result<()> {
    while let Some(msg) = rx.recv().await {
        sink.send(&msg).await?;
    }
    debug!("outbound queue closed");
    Ok(())
}

/// Reads frames from `source` and hands every decodable message to `deliver`.
///
/// Undecodable frames are skipped. Stops when the source fails or `deliver`
/// returns `false`; the source error is returned in the first case.
pub async fn pump_inbound<S, F>(mut source: S, mut deliver: F) -> anyhow::Result<()>
where
    S: SyncSource,
    F: FnMut(SyncMsg) -> bool + Send,
{
    loop {
        let frame = source.recv_frame().await?;
        match decode_from_bytes(&frame) {
            Ok(msg) => {
                if !deliver(msg) {
                    return Ok(());
                }
            }
            Err(e) => debug!(error = %e, "dropping malformed frame"),
        }
    }
}

/// Convenience codec helpers.
pub fn encode_to_bytes(msg: &SyncMsg) -> anyhow::Result<Bytes> {
    let payload = serde_json::to_vec(msg).context("serialize")?;
    Ok(Bytes::from(payload))
}

pub fn decode_from_bytes(b: &[u8]) -> anyhow::Result<SyncMsg> {
    serde_json::from_slice(b).context("deserialize")
}
