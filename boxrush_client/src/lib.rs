//! `boxrush_client`
//!
//! Client-side systems:
//! - Object manager owning the self cube, companion and enemies
//! - Local play with a client-side enemy spawner
//! - Networked play: room join flow, peer replay, self state reporting
//! - Connection driver over the reliable sync channel

pub mod client;
pub mod local;
pub mod manager;
pub mod networked;

pub use client::GameClient;
pub use local::{LocalObjectManager, LocalOptions};
pub use manager::{ManagerError, ObjectManager, Roster};
pub use networked::{NetworkObjectManager, SyncState};
