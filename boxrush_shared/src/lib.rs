//! `boxrush_shared`
//!
//! Shared libraries used by both client and server.
//!
//! Design goals:
//! - Deterministic, frame-based physics with no wall-clock input.
//! - Clear separation of concerns (physics, spawning, events, net, rooms).
//! - Traits at the seams (sync channel halves, renderer).
//! - No `unsafe`.

pub mod config;
pub mod entity;
pub mod event;
pub mod math;
pub mod net;
pub mod physics;
pub mod render;
pub mod room;
pub mod spawner;

pub mod prelude {
    //! Commonly used exports.

    pub use crate::config::*;
    pub use crate::entity::*;
    pub use crate::event::*;
    pub use crate::math::*;
    pub use crate::net::*;
    pub use crate::physics::*;
}
