//! `boxrush_server`
//!
//! Server-side systems:
//! - Identity assignment on handshake
//! - Room creation and join-by-name
//! - Relays each member's per-frame state to its room
//! - Ticks one enemy spawner per room and broadcasts the spawns
//!
//! Networking model:
//! - TCP only: length-prefixed JSON frames, one reader and one writer task
//!   per client

pub mod server;

pub use server::{bind_ephemeral, RoomServer};
