//! Physics box entity.
//!
//! A `PhysicsBox` carries the physics fields of one cube (extents, position,
//! velocity, derived bounds) plus an [`Appearance`] that is handed through to
//! whoever renders it. Physics never looks at the appearance.

use serde::{Deserialize, Serialize};

use crate::{
    math::Vec3,
    net::BoxSnapshot,
    physics::{boxes_collide, BOUNCE_DAMPING, FORWARD_ACCEL, GRAVITY},
};

/// Default color of a box built without one; also the player's color.
pub const DEFAULT_COLOR: &str = "#00ff00";
/// Color a remote peer's cube is drawn with, whatever it reports.
pub const COMPANION_COLOR: &str = "#ffa500";
pub const GROUND_COLOR: &str = "#0369a1";

/// The cube a player starts a session with.
pub fn player_cube() -> PhysicsBox {
    PhysicsBox::new(1.0, 1.0, 1.0)
        .with_velocity(Vec3::new(0.0, -0.01, 0.0))
        .with_shadow(true)
}

/// The track everything falls onto.
pub fn ground_box() -> PhysicsBox {
    PhysicsBox::new(10.0, 0.5, 50.0)
        .with_position(Vec3::new(0.0, -2.0, 0.0))
        .with_color(GROUND_COLOR)
}

/// Render-only attributes. Forwarded at construction, never read by physics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Appearance {
    pub color: String,
    pub cast_shadow: bool,
}

impl Default for Appearance {
    fn default() -> Self {
        Self {
            color: DEFAULT_COLOR.to_string(),
            cast_shadow: false,
        }
    }
}

/// Axis-aligned faces of a box, derived from position and extents.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Bounds {
    pub left: f32,
    pub right: f32,
    pub bottom: f32,
    pub top: f32,
    pub back: f32,
    pub front: f32,
}

/// A cube with frame-based physics.
#[derive(Debug, Clone, PartialEq)]
pub struct PhysicsBox {
    width: f32,
    height: f32,
    depth: f32,
    pub position: Vec3,
    pub velocity: Vec3,
    /// Adds [`FORWARD_ACCEL`] to `velocity.z` every update.
    pub forward_accel: bool,
    gravity: f32,
    bounds: Bounds,
    appearance: Appearance,
}

impl PhysicsBox {
    /// Creates a box at the origin, at rest, with the default appearance.
    pub fn new(width: f32, height: f32, depth: f32) -> Self {
        let mut b = Self {
            width,
            height,
            depth,
            position: Vec3::ZERO,
            velocity: Vec3::ZERO,
            forward_accel: false,
            gravity: GRAVITY,
            bounds: Bounds::default(),
            appearance: Appearance::default(),
        };
        b.recompute_bounds();
        b
    }

    pub fn with_position(mut self, position: Vec3) -> Self {
        self.position = position;
        self.recompute_bounds();
        self
    }

    pub fn with_velocity(mut self, velocity: Vec3) -> Self {
        self.velocity = velocity;
        self
    }

    pub fn with_forward_accel(mut self, enabled: bool) -> Self {
        self.forward_accel = enabled;
        self
    }

    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.appearance.color = color.into();
        self
    }

    pub fn with_shadow(mut self, cast_shadow: bool) -> Self {
        self.appearance.cast_shadow = cast_shadow;
        self
    }

    /// Builds a shadow-casting box from a wire snapshot.
    pub fn from_snapshot(snap: &BoxSnapshot) -> Self {
        Self::new(snap.width, snap.height, snap.depth)
            .with_position(snap.position)
            .with_velocity(snap.velocity)
            .with_color(snap.color.clone())
            .with_shadow(true)
    }

    /// Captures extents, position, velocity and color for the wire.
    pub fn snapshot(&self) -> BoxSnapshot {
        BoxSnapshot {
            width: self.width,
            height: self.height,
            depth: self.depth,
            position: self.position,
            velocity: self.velocity,
            color: self.appearance.color.clone(),
        }
    }

    pub fn width(&self) -> f32 {
        self.width
    }

    pub fn height(&self) -> f32 {
        self.height
    }

    pub fn depth(&self) -> f32 {
        self.depth
    }

    pub fn gravity(&self) -> f32 {
        self.gravity
    }

    /// Bounds as of the last [`recompute_bounds`](Self::recompute_bounds).
    pub fn bounds(&self) -> &Bounds {
        &self.bounds
    }

    pub fn appearance(&self) -> &Appearance {
        &self.appearance
    }

    /// Derives the six faces from the current position and extents.
    pub fn recompute_bounds(&mut self) {
        let (hw, hh, hd) = (self.width / 2.0, self.height / 2.0, self.depth / 2.0);
        self.bounds = Bounds {
            left: self.position.x - hw,
            right: self.position.x + hw,
            bottom: self.position.y - hh,
            top: self.position.y + hh,
            back: self.position.z - hd,
            front: self.position.z + hd,
        };
    }

    /// Advances one frame against `ground`.
    ///
    /// Bounds are recomputed first, so the ground test inside
    /// [`apply_gravity`](Self::apply_gravity) sees this frame's starting
    /// position. Horizontal motion is committed before the vertical step.
    pub fn update(&mut self, ground: &PhysicsBox) {
        self.recompute_bounds();

        if self.forward_accel {
            self.velocity.z += FORWARD_ACCEL;
        }

        self.position.x += self.velocity.x;
        self.position.z += self.velocity.z;

        self.apply_gravity(ground);
    }

    /// Adds gravity, then either bounces off `ground` or falls.
    ///
    /// A bounce flips the vertical velocity and damps it; the position is
    /// left untouched that frame.
    pub fn apply_gravity(&mut self, ground: &PhysicsBox) {
        self.velocity.y += self.gravity;

        if boxes_collide(self, ground) {
            self.velocity.y = -(self.velocity.y * BOUNCE_DAMPING);
        } else {
            self.position.y += self.velocity.y;
        }
    }
}
