//! Enemy spawn schedule.
//!
//! One enemy every `spawn_rate` frames, where `spawn_rate` starts at
//! [`INITIAL_SPAWN_RATE`] and drops by [`SPAWN_RATE_STEP`] after each spawn
//! until it reaches [`MIN_SPAWN_RATE`]. The frame counter is checked before it
//! is incremented, so the first tick of a session always spawns.

use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::{entity::PhysicsBox, math::Vec3};

pub const INITIAL_SPAWN_RATE: u32 = 200;
pub const SPAWN_RATE_STEP: u32 = 20;
pub const MIN_SPAWN_RATE: u32 = 20;

/// Enemies appear this far down the track (negative z) and roll forward.
pub const ENEMY_SPAWN_Z: f32 = -20.0;
/// Half-width of the lane enemies spawn in.
pub const ENEMY_SPAWN_HALF_WIDTH: f32 = 5.0;
pub const ENEMY_COLOR: &str = "#ff0000";

/// Frame-driven enemy scheduler.
#[derive(Debug)]
pub struct EnemySpawner {
    frame: u64,
    spawn_rate: u32,
    rng: StdRng,
}

impl Default for EnemySpawner {
    fn default() -> Self {
        Self::new(None)
    }
}

impl EnemySpawner {
    /// Creates a scheduler; `seed` makes spawn positions reproducible.
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            frame: 0,
            spawn_rate: INITIAL_SPAWN_RATE,
            rng,
        }
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn spawn_rate(&self) -> u32 {
        self.spawn_rate
    }

    /// Advances one frame, returning the enemy spawned on it, if any.
    pub fn tick(&mut self) -> Option<PhysicsBox> {
        let enemy = if self.frame % u64::from(self.spawn_rate) == 0 {
            if self.spawn_rate > MIN_SPAWN_RATE {
                self.spawn_rate = self
                    .spawn_rate
                    .saturating_sub(SPAWN_RATE_STEP)
                    .max(MIN_SPAWN_RATE);
            }
            Some(self.make_enemy())
        } else {
            None
        };
        self.frame += 1;
        enemy
    }

    fn make_enemy(&mut self) -> PhysicsBox {
        let x = self
            .rng
            .gen_range(-ENEMY_SPAWN_HALF_WIDTH..=ENEMY_SPAWN_HALF_WIDTH);
        PhysicsBox::new(1.0, 1.0, 1.0)
            .with_position(Vec3::new(x, 0.0, ENEMY_SPAWN_Z))
            .with_velocity(Vec3::new(0.0, -0.01, 0.005))
            .with_forward_accel(true)
            .with_color(ENEMY_COLOR)
            .with_shadow(true)
    }
}
