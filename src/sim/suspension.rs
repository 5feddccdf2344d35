//! Per-wheel suspension: linear spring, anti-roll bar, asymmetric damping
//! and a bump stop near the end of travel.

use serde::{Deserialize, Serialize};

/// Compression is clamped to ±this many feet
pub const MAX_TRAVEL: f32 = 1.0;
/// Compression (ft) past which the bump stop takes over from the spring
pub const BUMP_STOP: f32 = 0.75;
/// Rebound speed (ft/s) at which the bump stop lets go
const BUMP_STOP_RELEASE: f32 = 1.0;
/// Fraction of the car's momentum the bump stop removes per second of dt
const BUMP_STOP_GAIN: f32 = 0.25;

/// Static suspension tuning for one corner
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SuspensionParameters {
    /// Spring rate (lb/ft)
    pub spring_rate: f32,
    /// Damping while compressing (lb·s/ft)
    pub compression_damping: f32,
    /// Damping while extending (lb·s/ft)
    pub rebound_damping: f32,
}

/// Inputs shared by every corner of a car for one tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SuspensionContext {
    /// Anti-roll rate of this corner's axle (lb/ft)
    pub anti_roll_rate: f32,
    /// Compression of the opposite corner on the same axle
    pub other_compression: f32,
    /// Car mass (slugs)
    pub mass: f32,
    /// Car weight (lb); caps the load one corner can carry
    pub weight: f32,
    pub dt: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SuspensionState {
    /// Compression (ft); zero or below means the tire is off the ground
    pub compression: f32,
    /// Compression rate (ft/s, + compressing)
    pub velocity: f32,
    pub previous_compression: f32,
}

impl SuspensionState {
    /// Record this tick's geometric compression and compression rate
    pub fn update(&mut self, compression: f32, velocity: f32) {
        self.previous_compression = self.compression;
        self.compression = if compression.is_finite() {
            compression.clamp(-MAX_TRAVEL, MAX_TRAVEL)
        } else {
            0.0
        };
        self.velocity = if velocity.is_finite() { velocity } else { 0.0 };
    }

    pub fn is_grounded(&self) -> bool {
        self.compression > 0.0
    }

    /// Load pushed into the ground (lb), clamped to `[0, weight]`
    pub fn normal_force(&self, params: &SuspensionParameters, ctx: &SuspensionContext) -> f32 {
        let c = self.compression;
        if c <= 0.0 {
            return 0.0;
        }

        let anti_roll = if ctx.other_compression > 0.0 {
            (c - ctx.other_compression) * ctx.anti_roll_rate
        } else {
            0.0
        };
        let damping = if self.velocity > 0.0 {
            params.compression_damping
        } else {
            params.rebound_damping
        };

        let force = if c > BUMP_STOP && self.velocity > -BUMP_STOP_RELEASE {
            (self.velocity + BUMP_STOP_RELEASE) * ctx.mass * BUMP_STOP_GAIN / ctx.dt
        } else {
            anti_roll + c * params.spring_rate + damping * self.velocity
        };

        if force.is_nan() {
            return 0.0;
        }
        force.clamp(0.0, ctx.weight)
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
