//! Cube creation notifications.
//!
//! Whoever renders the game registers listeners here and builds a mesh for
//! every cube the manager creates. Notification is synchronous: when
//! [`CreationListeners::fire`] returns, every listener has seen the cube.
//!
//! Listeners form an identity set. Registering the same `Arc` twice is a
//! no-op; two distinct `Arc`s wrapping equal closures are two listeners.
//! Each `fire` iterates a snapshot of the registry taken when it starts.
//! Listeners get no handle back to the registry, so registration during a
//! notification pass cannot happen by construction; a listener added between
//! two passes sees only the cubes of later passes.

use std::{fmt, sync::Arc};

use crate::entity::PhysicsBox;

/// Which roster slot a cube belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CubeKind {
    /// The cube this session controls.
    SelfCube,
    /// The remote peer's cube (or the local sidekick).
    Companion,
    Enemy,
}

impl fmt::Display for CubeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CubeKind::SelfCube => write!(f, "self"),
            CubeKind::Companion => write!(f, "companion"),
            CubeKind::Enemy => write!(f, "enemy"),
        }
    }
}

/// Creation callback.
pub type CubeListener = Arc<dyn Fn(CubeKind, &PhysicsBox) + Send + Sync>;

/// Ordered identity set of creation listeners.
#[derive(Default, Clone)]
pub struct CreationListeners {
    listeners: Vec<CubeListener>,
}

impl CreationListeners {
    /// Adds `listener` unless that exact `Arc` is already registered.
    ///
    /// Returns whether it was added.
    pub fn register(&mut self, listener: CubeListener) -> bool {
        if self.listeners.iter().any(|l| Arc::ptr_eq(l, &listener)) {
            return false;
        }
        self.listeners.push(listener);
        true
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    /// Notifies every listener, in registration order.
    pub fn fire(&self, kind: CubeKind, cube: &PhysicsBox) {
        let snapshot = self.listeners.clone();
        for listener in &snapshot {
            listener(kind, cube);
        }
    }
}

impl fmt::Debug for CreationListeners {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CreationListeners")
            .field("len", &self.listeners.len())
            .finish()
    }
}
