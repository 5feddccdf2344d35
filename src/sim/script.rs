//! Control sources
//!
//! A control source is sampled once per car per tick, before the
//! drivetrain and body update. Seeded scripts stand in for a driver in the
//! demo binary and in replay tests.

use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;

use super::drivetrain::GearCommand;
use super::state::{CarSnapshot, Controls, MAX_STEER};

/// Produces controls for one car from its latest snapshot
pub trait ControlSource {
    fn sample(&mut self, snapshot: &CarSnapshot) -> Controls;
}

impl<F> ControlSource for F
where
    F: FnMut(&CarSnapshot) -> Controls,
{
    fn sample(&mut self, snapshot: &CarSnapshot) -> Controls {
        self(snapshot)
    }
}

/// Ticks between new steering targets
const WANDER_PERIOD: u32 = 45;
/// Steering slew per tick (rad)
const STEER_RATE: f32 = 0.02;
/// Speed (ft/s) above which the script may lift and brake
const BRAKE_SPEED: f32 = 120.0;

/// Seeded driver: full throttle, wandering steering, brakes when fast
///
/// Two scripts with the same seed emit the same control sequence.
#[derive(Debug, Clone)]
pub struct ControlScript {
    pub seed: u64,
    rng: Pcg32,
    tick: u32,
    steer: f32,
    steer_target: f32,
    braking: bool,
}

impl ControlScript {
    pub fn wander(seed: u64) -> Self {
        Self {
            seed,
            rng: Pcg32::seed_from_u64(seed),
            tick: 0,
            steer: 0.0,
            steer_target: 0.0,
            braking: false,
        }
    }

    /// Ticks sampled so far
    pub fn ticks(&self) -> u32 {
        self.tick
    }
}

impl ControlSource for ControlScript {
    fn sample(&mut self, snapshot: &CarSnapshot) -> Controls {
        if self.tick % WANDER_PERIOD == 0 {
            let reach = MAX_STEER * 0.5;
            self.steer_target = self.rng.random_range(-reach..=reach);
            self.braking = snapshot.speed > BRAKE_SPEED && self.rng.random_bool(0.3);
        }
        self.tick += 1;

        let delta = (self.steer_target - self.steer).clamp(-STEER_RATE, STEER_RATE);
        self.steer += delta;

        Controls {
            throttle: if self.braking { 0.0 } else { 1.0 },
            brake: if self.braking { 1.0 } else { 0.0 },
            steer: self.steer,
            gear: GearCommand::Hold,
            ..Default::default()
        }
    }
}
