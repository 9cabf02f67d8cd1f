//! Rendering abstraction.
//!
//! This crate intentionally does not depend on a graphics backend. A renderer
//! owns its meshes; each frame it is handed every live cube and copies the
//! physics fields (position, extents) onto them. Color and shadow come from
//! the cube's pass-through [`Appearance`](crate::entity::Appearance).

use crate::{entity::PhysicsBox, event::CubeKind};

/// A minimal rendering API.
pub trait RenderBackend: Send + Sync {
    fn begin_frame(&mut self);
    fn draw_cube(&mut self, kind: CubeKind, cube: &PhysicsBox);
    fn end_frame(&mut self);
}

/// A no-op renderer useful for headless runs and tests.
#[derive(Default)]
pub struct NullRenderer;

impl RenderBackend for NullRenderer {
    fn begin_frame(&mut self) {}
    fn draw_cube(&mut self, _kind: CubeKind, _cube: &PhysicsBox) {}
    fn end_frame(&mut self) {}
}
