//! Object manager: the roster of live cubes and the interface both play
//! modes share.
//!
//! The roster holds up to one self cube, up to one companion and an
//! append-only list of enemies, all advanced against a fixed ground box. The
//! two modes differ only in where cubes come from:
//! - [`LocalObjectManager`](crate::local::LocalObjectManager) creates them
//!   itself and schedules enemies with a spawner.
//! - [`NetworkObjectManager`](crate::networked::NetworkObjectManager) builds
//!   them from sync messages and reports its own state back.

use std::fmt;

use boxrush_shared::{
    entity::{ground_box, PhysicsBox},
    event::{CreationListeners, CubeKind, CubeListener},
    math::Vec3,
    physics::boxes_collide,
    render::RenderBackend,
};

/// Object manager failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManagerError {
    /// The self cube does not exist yet (before `init` or room confirmation).
    NotReady,
    /// `init` was called on a session that already has a self cube.
    AlreadyInitialized,
    /// The outbound sync channel is gone.
    ChannelClosed,
}

impl fmt::Display for ManagerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ManagerError::NotReady => write!(f, "self cube has not been created yet"),
            ManagerError::AlreadyInitialized => write!(f, "session is already initialized"),
            ManagerError::ChannelClosed => write!(f, "sync channel closed"),
        }
    }
}

impl std::error::Error for ManagerError {}

/// Capabilities shared by local and networked play.
pub trait ObjectManager {
    fn roster(&self) -> &Roster;

    /// True once the self cube exists.
    fn ready(&self) -> bool {
        self.roster().self_cube().is_some()
    }

    /// Registers a creation listener. Returns `false` if that exact listener
    /// was already registered.
    fn on_cube_created(&mut self, listener: CubeListener) -> bool;

    /// Advances one frame for `which` and reports whether the self cube hit
    /// an enemy.
    ///
    /// Only [`CubeKind::SelfCube`] drives the simulation; other kinds are
    /// accepted and ignored. Fails with [`ManagerError::NotReady`] before the
    /// self cube exists.
    fn update_cube(&mut self, which: CubeKind, velocity: Vec3) -> Result<bool, ManagerError>;
}

/// Live cubes of one session.
#[derive(Debug)]
pub struct Roster {
    ground: PhysicsBox,
    self_cube: Option<PhysicsBox>,
    companion: Option<PhysicsBox>,
    enemies: Vec<PhysicsBox>,
    listeners: CreationListeners,
}

impl Default for Roster {
    fn default() -> Self {
        Self::new(ground_box())
    }
}

impl Roster {
    pub fn new(ground: PhysicsBox) -> Self {
        Self {
            ground,
            self_cube: None,
            companion: None,
            enemies: Vec::new(),
            listeners: CreationListeners::default(),
        }
    }

    pub fn ground(&self) -> &PhysicsBox {
        &self.ground
    }

    pub fn self_cube(&self) -> Option<&PhysicsBox> {
        self.self_cube.as_ref()
    }

    pub fn companion(&self) -> Option<&PhysicsBox> {
        self.companion.as_ref()
    }

    /// Enemies in creation order.
    pub fn enemies(&self) -> &[PhysicsBox] {
        &self.enemies
    }

    pub(crate) fn register(&mut self, listener: CubeListener) -> bool {
        self.listeners.register(listener)
    }

    pub(crate) fn set_self_cube(&mut self, cube: PhysicsBox) {
        self.listeners.fire(CubeKind::SelfCube, &cube);
        self.self_cube = Some(cube);
    }

    pub(crate) fn set_companion(&mut self, cube: PhysicsBox) {
        self.listeners.fire(CubeKind::Companion, &cube);
        self.companion = Some(cube);
    }

    pub(crate) fn push_enemy(&mut self, enemy: PhysicsBox) {
        self.listeners.fire(CubeKind::Enemy, &enemy);
        self.enemies.push(enemy);
    }

    pub(crate) fn companion_mut(&mut self) -> Option<&mut PhysicsBox> {
        self.companion.as_mut()
    }

    /// Advances the companion one frame, if there is one.
    pub(crate) fn advance_companion(&mut self) {
        if let Some(companion) = self.companion.as_mut() {
            companion.update(&self.ground);
        }
    }

    /// Sets the self cube's velocity and advances it one frame.
    pub(crate) fn advance_self(&mut self, velocity: Vec3) -> Result<&PhysicsBox, ManagerError> {
        let cube = self.self_cube.as_mut().ok_or(ManagerError::NotReady)?;
        cube.velocity = velocity;
        cube.update(&self.ground);
        Ok(cube)
    }

    /// Advances every enemy one frame and tests each against the self cube.
    ///
    /// Every enemy moves even after a hit is found. Bounds of both boxes are
    /// refreshed before each test.
    pub(crate) fn advance_enemies(&mut self) -> Result<bool, ManagerError> {
        let me = self.self_cube.as_mut().ok_or(ManagerError::NotReady)?;
        me.recompute_bounds();

        let mut crashed = false;
        for enemy in &mut self.enemies {
            enemy.update(&self.ground);
            enemy.recompute_bounds();
            if boxes_collide(me, enemy) {
                crashed = true;
            }
        }
        Ok(crashed)
    }

    /// Draws every live cube, ground excluded.
    pub fn draw(&self, renderer: &mut dyn RenderBackend) {
        renderer.begin_frame();
        if let Some(cube) = &self.self_cube {
            renderer.draw_cube(CubeKind::SelfCube, cube);
        }
        if let Some(cube) = &self.companion {
            renderer.draw_cube(CubeKind::Companion, cube);
        }
        for enemy in &self.enemies {
            renderer.draw_cube(CubeKind::Enemy, enemy);
        }
        renderer.end_frame();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct CountingRenderer {
        frames: usize,
        drawn: Vec<CubeKind>,
    }

    impl RenderBackend for CountingRenderer {
        fn begin_frame(&mut self) {
            self.frames += 1;
        }
        fn draw_cube(&mut self, kind: CubeKind, _cube: &PhysicsBox) {
            self.drawn.push(kind);
        }
        fn end_frame(&mut self) {}
    }

    #[test]
    fn empty_roster_is_not_ready_for_updates() {
        let mut roster = Roster::default();
        assert_eq!(
            roster.advance_self(Vec3::ZERO).unwrap_err(),
            ManagerError::NotReady
        );
        assert_eq!(roster.advance_enemies(), Err(ManagerError::NotReady));
    }

    #[test]
    fn enemy_on_top_of_player_is_a_crash() {
        let mut roster = Roster::default();
        roster.set_self_cube(PhysicsBox::new(1.0, 1.0, 1.0));
        roster.push_enemy(PhysicsBox::new(1.0, 1.0, 1.0));
        roster.push_enemy(PhysicsBox::new(1.0, 1.0, 1.0).with_position(Vec3::new(4.0, 0.0, 0.0)));

        assert_eq!(roster.advance_enemies(), Ok(true));
        // Both enemies fell one frame.
        assert!(roster.enemies().iter().all(|e| e.position.y < 0.0));
    }

    #[test]
    fn distant_enemy_is_not_a_crash() {
        let mut roster = Roster::default();
        roster.set_self_cube(PhysicsBox::new(1.0, 1.0, 1.0));
        roster.push_enemy(PhysicsBox::new(1.0, 1.0, 1.0).with_position(Vec3::new(0.0, 0.0, -20.0)));

        assert_eq!(roster.advance_enemies(), Ok(false));
    }

    #[test]
    fn draw_visits_every_cube() {
        let mut roster = Roster::default();
        roster.set_self_cube(PhysicsBox::new(1.0, 1.0, 1.0));
        roster.set_companion(PhysicsBox::new(1.0, 1.0, 1.0));
        roster.push_enemy(PhysicsBox::new(1.0, 1.0, 1.0));

        let mut renderer = CountingRenderer {
            frames: 0,
            drawn: Vec::new(),
        };
        roster.draw(&mut renderer);

        assert_eq!(renderer.frames, 1);
        assert_eq!(
            renderer.drawn,
            vec![CubeKind::SelfCube, CubeKind::Companion, CubeKind::Enemy]
        );
    }
}
