//! Single-player session.
//!
//! `init` creates the player (and optionally a companion); enemies come from
//! an [`EnemySpawner`] ticked once per self update.

use boxrush_shared::{
    entity::{ground_box, player_cube, PhysicsBox, COMPANION_COLOR},
    event::{CubeKind, CubeListener},
    math::Vec3,
    spawner::EnemySpawner,
};
use tracing::{debug, info};

use crate::manager::{ManagerError, ObjectManager, Roster};

/// Where the local companion starts.
const COMPANION_OFFSET_X: f32 = 2.0;

/// Local session options.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalOptions {
    /// Create a companion cube alongside the player on `init`.
    pub with_companion: bool,
    /// Spawner seed; random when `None`.
    pub seed: Option<u64>,
}

/// Object manager for offline play.
#[derive(Debug)]
pub struct LocalObjectManager {
    roster: Roster,
    spawner: EnemySpawner,
    options: LocalOptions,
}

impl LocalObjectManager {
    pub fn new(options: LocalOptions) -> Self {
        Self::with_ground(ground_box(), options)
    }

    pub fn with_ground(ground: PhysicsBox, options: LocalOptions) -> Self {
        Self {
            roster: Roster::new(ground),
            spawner: EnemySpawner::new(options.seed),
            options,
        }
    }

    pub fn spawner(&self) -> &EnemySpawner {
        &self.spawner
    }

    /// Creates the player cube (and companion) and notifies listeners.
    pub fn init(&mut self) -> Result<(), ManagerError> {
        if self.roster.self_cube().is_some() {
            return Err(ManagerError::AlreadyInitialized);
        }

        self.roster.set_self_cube(player_cube());

        if self.options.with_companion {
            let companion = player_cube()
                .with_position(Vec3::new(COMPANION_OFFSET_X, 0.0, 0.0))
                .with_color(COMPANION_COLOR);
            self.roster.set_companion(companion);
        }

        info!(companion = self.options.with_companion, "Local session initialized");
        Ok(())
    }
}

impl ObjectManager for LocalObjectManager {
    fn roster(&self) -> &Roster {
        &self.roster
    }

    fn on_cube_created(&mut self, listener: CubeListener) -> bool {
        self.roster.register(listener)
    }

    fn update_cube(&mut self, which: CubeKind, velocity: Vec3) -> Result<bool, ManagerError> {
        if which != CubeKind::SelfCube {
            return Ok(false);
        }

        self.roster.advance_self(velocity)?;
        let crashed = self.roster.advance_enemies()?;

        if let Some(enemy) = self.spawner.tick() {
            debug!(
                x = enemy.position.x,
                frame = self.spawner.frame(),
                spawn_rate = self.spawner.spawn_rate(),
                "Enemy spawned"
            );
            self.roster.push_enemy(enemy);
        }

        Ok(crashed)
    }
}
