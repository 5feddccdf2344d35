//! Arcade Dynamics - vehicle simulation core for an arcade racer
//!
//! Core modules:
//! - `sim`: Deterministic simulation (tires, drivetrain, body integration)
//! - `settings`: Tunables loaded from JSON
//! - `error`: Setup/boundary errors (the tick itself never fails)

pub mod error;
pub mod settings;
pub mod sim;

pub use error::{Error, Result};
pub use settings::{Difficulty, SanityEnvelope, Settings};

use glam::{Mat3, Vec3};

/// Simulation configuration constants
pub mod consts {
    /// Fixed simulation timestep (60 Hz)
    pub const SIM_DT: f32 = 1.0 / 60.0;
    /// Maximum substeps per frame to prevent spiral of death
    pub const MAX_SUBSTEPS: u32 = 4;

    /// Gravitational acceleration (ft/s²)
    pub const GRAVITY: f32 = 32.174;
    /// Hard ceiling on body speed (ft/s, "speed of sound")
    pub const MAX_VELOCITY: f32 = 1000.0;

    /// RPM to rad/s
    pub const RPM_TO_RDPS: f32 = 2.0 * std::f32::consts::PI / 60.0;
    /// rad/s to RPM
    pub const RDPS_TO_RPM: f32 = 60.0 / (2.0 * std::f32::consts::PI);
    /// ft/s to mph
    pub const FPS_TO_MPH: f32 = 3600.0 / 5280.0;

    /// Wheel indices
    pub const FRONT_LEFT: usize = 0;
    pub const FRONT_RIGHT: usize = 1;
    pub const REAR_LEFT: usize = 2;
    pub const REAR_RIGHT: usize = 3;
    pub const NUM_WHEELS: usize = 4;
}

/// Normalized angle to [-π, π)
#[inline]
pub fn normalize_angle(mut angle: f32) -> f32 {
    use std::f32::consts::PI;
    while angle >= PI {
        angle -= 2.0 * PI;
    }
    while angle < -PI {
        angle += 2.0 * PI;
    }
    angle
}

/// Heading (yaw about world Z) of a body basis whose first column is forward
#[inline]
pub fn heading_of(basis: &Mat3) -> f32 {
    let forward = basis.x_axis;
    normalize_angle(forward.y.atan2(forward.x))
}

/// Largest deviation of `basis` from orthonormality
///
/// Zero for a perfect rotation matrix; compares column lengths to 1 and
/// pairwise dot products to 0.
pub fn orthonormal_error(basis: &Mat3) -> f32 {
    let (x, y, z) = (basis.x_axis, basis.y_axis, basis.z_axis);
    let lengths = [x.length() - 1.0, y.length() - 1.0, z.length() - 1.0];
    let dots = [x.dot(y), y.dot(z), z.dot(x)];
    lengths
        .iter()
        .chain(dots.iter())
        .fold(0.0_f32, |acc, v| acc.max(v.abs()))
}

/// Gram-Schmidt re-orthonormalization keeping the forward axis
pub fn orthonormalize(basis: &Mat3) -> Mat3 {
    let x = basis.x_axis.normalize_or(Vec3::X);
    let y = (basis.y_axis - x * x.dot(basis.y_axis)).normalize_or(Vec3::Y);
    let z = x.cross(y);
    Mat3::from_cols(x, y, z)
}
