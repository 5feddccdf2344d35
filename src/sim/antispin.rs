//! Synthetic yaw stabilization
//!
//! Adds a yaw moment that swings the nose back toward the direction of
//! travel, but only while the car is rotating further away from it. A
//! drift the driver is already catching is left alone.

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::settings::Difficulty;

/// Below this speed (ft/s) a car pressed backward into something is stuck
pub const STUCK_SPEED: f32 = 5.0;
/// Backward push (lb, body X) that counts as pressed against an obstacle
pub const STUCK_PUSH: f32 = 300.0;
/// Body-up · world-up needed to count as upright
pub const UPRIGHT_COS: f32 = 0.7;
/// Yaw kick per slug of mass (ft²/s²) when stuck
pub const STUCK_KICK: f32 = 60.0;
/// Lateral speed (ft/s) under which AI cars get no correction
pub const AI_DEADBAND: f32 = 1.0;

/// Who is driving a car
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Controller {
    #[default]
    Human,
    Ai,
}

/// Anti-spin gains for one difficulty
///
/// Human gains are ft/s (moment = mass × lateral speed × gain); the AI value
/// is ft/s² (moment = mass × gain, fixed magnitude).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AntiSpinGains {
    /// Gain at closed throttle
    pub low_slip: f32,
    /// Gain at full throttle
    pub high_slip: f32,
    /// Gain with no wheel on the ground
    pub airborne: f32,
    /// Fixed correction for AI cars
    pub ai: f32,
}

impl AntiSpinGains {
    pub fn for_difficulty(difficulty: Difficulty) -> Self {
        match difficulty {
            Difficulty::Easy => Self {
                low_slip: 2.0,
                high_slip: 6.0,
                airborne: 0.5,
                ai: 40.0,
            },
            Difficulty::Medium => Self {
                low_slip: 1.5,
                high_slip: 4.0,
                airborne: 0.3,
                ai: 40.0,
            },
            Difficulty::Hard => Self {
                low_slip: 0.75,
                high_slip: 2.0,
                airborne: 0.0,
                ai: 40.0,
            },
        }
    }

    /// Human gain: quartic blend from low- to high-slip with throttle
    pub fn human_gain(&self, throttle: f32) -> f32 {
        let t = throttle.clamp(0.0, 1.0);
        let w = t * t * t * t;
        self.low_slip + (self.high_slip - self.low_slip) * w
    }
}

/// Car state the stabilizer looks at
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AntiSpinInput {
    pub controller: Controller,
    pub throttle: f32,
    /// Steer angle (rad, + left)
    pub steer: f32,
    /// Body-frame linear velocity
    pub velocity: Vec3,
    /// Body-frame angular velocity
    pub angular_velocity: Vec3,
    pub mass: f32,
    pub any_wheel_loaded: bool,
    /// Body up axis · world up
    pub up_z: f32,
    /// Last tick's external push along body X (lb)
    pub front_push: f32,
    /// Per-car-type multiplier on human gains
    pub car_scale: f32,
}

/// Corrective yaw moment (ft·lb about body Z)
pub fn yaw_moment(gains: &AntiSpinGains, input: &AntiSpinInput) -> f32 {
    let v = input.velocity;

    if is_stuck(input) {
        return STUCK_KICK * input.mass * input.steer.signum();
    }

    if v.x <= 0.0 {
        return 0.0;
    }
    // Yaw rate reducing the slip angle is the driver's own correction
    if input.angular_velocity.z * v.y >= 0.0 {
        return 0.0;
    }

    match input.controller {
        Controller::Ai => {
            if v.y.abs() < AI_DEADBAND {
                0.0
            } else {
                input.mass * gains.ai * v.y.signum()
            }
        }
        Controller::Human => {
            let gain = if input.any_wheel_loaded {
                gains.human_gain(input.throttle)
            } else {
                gains.airborne
            };
            input.mass * v.y * gain * input.car_scale
        }
    }
}

fn is_stuck(input: &AntiSpinInput) -> bool {
    input.velocity.length() < STUCK_SPEED
        && input.velocity.x < 0.0
        && input.up_z > UPRIGHT_COS
        && input.front_push < -STUCK_PUSH
        && input.steer != 0.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(vx: f32, vy: f32, wz: f32) -> AntiSpinInput {
        AntiSpinInput {
            controller: Controller::Human,
            throttle: 0.0,
            steer: 0.0,
            velocity: Vec3::new(vx, vy, 0.0),
            angular_velocity: Vec3::new(0.0, 0.0, wz),
            mass: 100.0,
            any_wheel_loaded: true,
            up_z: 1.0,
            front_push: 0.0,
            car_scale: 1.0,
        }
    }

    fn gains() -> AntiSpinGains {
        AntiSpinGains::for_difficulty(Difficulty::Medium)
    }

    #[test]
    fn test_opposes_growing_slip() {
        // Sliding left while yawing right: nose swings away from travel
        let m = yaw_moment(&gains(), &input(60.0, 5.0, -0.5));
        assert!((m - 100.0 * 5.0 * 1.5).abs() < 1e-3);
        let m = yaw_moment(&gains(), &input(60.0, -5.0, 0.5));
        assert!(m < 0.0);
    }

    #[test]
    fn test_leaves_recovering_drift_alone() {
        assert_eq!(yaw_moment(&gains(), &input(60.0, 5.0, 0.5)), 0.0);
        assert_eq!(yaw_moment(&gains(), &input(60.0, 5.0, 0.0)), 0.0);
        assert_eq!(yaw_moment(&gains(), &input(-20.0, 5.0, -0.5)), 0.0);
    }

    #[test]
    fn test_throttle_blend_is_quartic() {
        let g = gains();
        assert_eq!(g.human_gain(0.0), g.low_slip);
        assert_eq!(g.human_gain(1.0), g.high_slip);
        let half = g.human_gain(0.5);
        assert!((half - (g.low_slip + (g.high_slip - g.low_slip) / 16.0)).abs() < 1e-6);
    }

    #[test]
    fn test_airborne_and_car_scale() {
        let mut inp = input(60.0, 4.0, -1.0);
        inp.any_wheel_loaded = false;
        inp.car_scale = 2.0;
        let m = yaw_moment(&gains(), &inp);
        assert!((m - 100.0 * 4.0 * 0.3 * 2.0).abs() < 1e-3);
    }

    #[test]
    fn test_ai_fixed_magnitude() {
        let mut inp = input(60.0, 3.0, -1.0);
        inp.controller = Controller::Ai;
        inp.car_scale = 5.0;
        let small = yaw_moment(&gains(), &inp);
        inp.velocity.y = 12.0;
        let large = yaw_moment(&gains(), &inp);
        assert_eq!(small, large);
        assert_eq!(small, 100.0 * 40.0);
        inp.velocity.y = 0.5;
        assert_eq!(yaw_moment(&gains(), &inp), 0.0);
    }

    #[test]
    fn test_stuck_kick_follows_steering() {
        let mut inp = input(-1.0, 0.0, 0.0);
        inp.front_push = -800.0;
        inp.steer = -0.3;
        assert_eq!(yaw_moment(&gains(), &inp), -STUCK_KICK * 100.0);
        // Upside down: no kick
        inp.up_z = -1.0;
        assert_eq!(yaw_moment(&gains(), &inp), 0.0);
        // No steering: no kick
        inp.up_z = 1.0;
        inp.steer = 0.0;
        assert_eq!(yaw_moment(&gains(), &inp), 0.0);
    }
}
