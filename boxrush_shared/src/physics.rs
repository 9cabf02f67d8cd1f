//! Box physics constants and the collision predicate.
//!
//! Per-frame integration lives on [`PhysicsBox`](crate::entity::PhysicsBox);
//! this module holds the numbers it integrates with and the AABB test.
//! Everything here is frame-based: velocities are units per frame and there
//! is no `dt`.

use crate::entity::PhysicsBox;

/// Vertical velocity added every frame.
pub const GRAVITY: f32 = -0.002;

/// Per-frame z velocity increment for boxes with forward acceleration.
pub const FORWARD_ACCEL: f32 = 0.0003;

/// Fraction of vertical speed kept after a ground bounce.
pub const BOUNCE_DAMPING: f32 = 0.5;

/// AABB overlap test between `first` and `second`.
///
/// The x and z axes compare current bounds only. The y axis projects
/// `first` one frame ahead using its own vertical velocity, so the predicate
/// is not symmetric: pass the moving box first and the reference surface (or
/// the crash target) second.
///
/// Bounds must have been recomputed for both boxes this frame.
pub fn boxes_collide(first: &PhysicsBox, second: &PhysicsBox) -> bool {
    let a = first.bounds();
    let b = second.bounds();

    let x = a.right >= b.left && a.left <= b.right;
    let y = a.bottom + first.velocity.y <= b.top && a.top >= b.bottom;
    let z = a.front >= b.back && a.back <= b.front;

    x && y && z
}
