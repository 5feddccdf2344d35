//! Tire force model
//!
//! Friction-circle tire: traction and side force share a budget of
//! `max_friction × normal_force`. Lateral force follows a cubic in slip
//! angle up to the peak slip angle, beyond which the contact patch slides.
//! Velocities are in tire coordinates (X rolling direction, Y left, Z up).

use glam::Vec3;
use serde::{Deserialize, Serialize};

use super::surface::SurfaceCode;
use crate::error::{Error, Result};

/// Longitudinal speed (ft/s) below which slip angle is computed against
/// this speed instead, so a crawling car does not see huge angles
pub const DAMP_SPEED: f32 = 10.0;

/// Contact patch dynamics switch from transient to steady state when the
/// patch relaxation rate times dt reaches this value
pub const TRANSIENT_LIMIT: f32 = 0.5;

/// Static tire description (shared by every car of a type)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TireParameters {
    /// Rolling radius (ft)
    pub radius: f32,
    /// Lateral stiffness of the contact patch (lb/ft)
    pub lateral_stiffness: f32,
    /// Lateral rubber damping (lb·s/ft)
    pub rubber_damping: f32,
    /// Cornering stiffness on pavement (lb/rad)
    pub cornering_stiffness: f32,
    /// Peak friction coefficient on pavement
    pub max_friction: f32,
    /// 1 / wheel moment of inertia (1/(slug·ft²))
    pub inverse_inertia: f32,
}

impl TireParameters {
    /// Stock front tire
    pub const fn front() -> Self {
        Self {
            radius: 1.0,
            lateral_stiffness: 340.0 * 12.0,
            rubber_damping: 200.0,
            cornering_stiffness: 16_000.0,
            max_friction: 1.15,
            inverse_inertia: 0.1,
        }
    }

    /// Stock rear tire
    pub const fn rear() -> Self {
        Self {
            radius: 1.0,
            lateral_stiffness: 340.0 * 12.0,
            rubber_damping: 200.0,
            cornering_stiffness: 50_000.0,
            max_friction: 1.3,
            inverse_inertia: 0.1,
        }
    }

    /// Reject values that would leave the friction-circle solver undefined
    pub fn validate(&self, wheel: usize) -> Result<()> {
        let positive = |v: f32| v.is_finite() && v > 0.0;
        let reason = if !positive(self.cornering_stiffness) {
            "cornering stiffness must be positive"
        } else if !positive(self.max_friction) {
            "max friction must be positive"
        } else if !positive(self.radius) {
            "radius must be positive"
        } else if !positive(self.inverse_inertia) {
            "inverse inertia must be positive"
        } else if !positive(self.lateral_stiffness) {
            "lateral stiffness must be positive"
        } else if !(self.rubber_damping.is_finite() && self.rubber_damping >= 0.0) {
            "rubber damping must be non-negative"
        } else {
            return Ok(());
        };
        Err(Error::InvalidTire { wheel, reason })
    }
}

/// Cubic lateral-force curve `Cf(a) = k1·a − k2·a² + k3·a³`
///
/// Coefficients are chosen so the curve peaks at exactly `max_friction`
/// when `a == peak_slip_angle`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TireCurve {
    pub k1: f32,
    pub k2: f32,
    pub k3: f32,
    pub max_friction: f32,
    pub peak_slip_angle: f32,
}

impl TireCurve {
    /// Derive the curve from normalized stiffness and friction
    pub fn new(k1: f32, max_friction: f32) -> Self {
        if !(k1 > 0.0 && max_friction > 0.0) {
            // No grip left: every slip angle is past the peak
            return Self {
                k1: k1.max(0.0),
                max_friction: max_friction.max(0.0),
                ..Self::default()
            };
        }
        Self {
            k1,
            k2: k1 * k1 / (3.0 * max_friction),
            k3: k1 * k1 * k1 / (27.0 * max_friction * max_friction),
            max_friction,
            peak_slip_angle: 3.0 * max_friction / k1,
        }
    }

    /// Friction coefficient at slip angle `alpha` (odd in alpha)
    pub fn coefficient(&self, alpha: f32) -> f32 {
        let a = alpha.abs();
        let cf = self.k1 * a - self.k2 * a * a + self.k3 * a * a * a;
        cf.copysign(alpha)
    }

    /// `Cf(a) / a`, the secant stiffness at magnitude `a`
    fn secant(&self, a: f32) -> f32 {
        self.k1 - self.k2 * a + self.k3 * a * a
    }
}

/// What the tire was doing on its last solve (sound, debugging, telemetry)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SlipState {
    /// No normal load
    Airborne,
    /// Wheel turning faster than the road and road friction cannot pull it back
    WheelSpin,
    /// Wheel turning slower than the road (locked brakes)
    WheelLock,
    /// Drive torque alone saturates the friction circle
    TractionLimit,
    /// Brake torque alone saturates the friction circle
    BrakeLimit,
    /// Past the peak slip angle: the patch slides sideways
    Sliding,
    /// Gripping, patch deflection still relaxing
    Transient,
    /// Gripping on the steady-state curve
    #[default]
    SteadyState,
}

impl SlipState {
    /// Wheel speed disagrees with road speed
    pub fn is_spinning(self) -> bool {
        matches!(self, SlipState::WheelSpin | SlipState::WheelLock)
    }

    /// Any state where the tire is at its friction limit
    pub fn is_slipping(self) -> bool {
        !matches!(
            self,
            SlipState::Airborne | SlipState::Transient | SlipState::SteadyState
        )
    }
}

/// Car-level quantities the tire solve needs
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TireContext {
    /// Car mass (slugs)
    pub mass: f32,
    /// Timestep (s)
    pub dt: f32,
}

/// Solver output in tire coordinates
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TireForce {
    /// Longitudinal force (+ forward)
    pub traction: f32,
    /// Lateral force (+ left)
    pub side: f32,
}

/// Per-wheel mutable tire state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TireRuntimeState {
    /// Surface-adjusted cornering stiffness (lb/rad)
    pub cornering_stiffness: f32,
    /// Surface-adjusted max friction
    pub max_friction: f32,
    /// Load the cornering stiffness is normalized against (lb)
    pub reference_load: f32,
    /// Curve derived from the two values above
    pub curve: TireCurve,
    /// Surface the current values were derived for
    pub surface: SurfaceCode,
    /// Lateral deflection of the contact patch (ft)
    pub patch_deflection: f32,
    /// Wheel spin rate (rad/s, + rolling forward)
    pub angular_velocity: f32,
    /// Torque the road exerted on the wheel last solve
    pub slip_torque: f32,
    pub slip: SlipState,
    pub longitudinal_force: f32,
    pub lateral_force: f32,
    pub normal_force: f32,
}

impl TireRuntimeState {
    /// Fresh tire on pavement
    pub fn new(params: &TireParameters, reference_load: f32) -> Self {
        let mut tire = Self {
            cornering_stiffness: params.cornering_stiffness,
            max_friction: params.max_friction,
            reference_load: reference_load.max(1.0),
            curve: TireCurve::default(),
            surface: SurfaceCode::Pavement,
            patch_deflection: 0.0,
            angular_velocity: 0.0,
            slip_torque: 0.0,
            slip: SlipState::default(),
            longitudinal_force: 0.0,
            lateral_force: 0.0,
            normal_force: 0.0,
        };
        tire.recompute_curve();
        tire
    }

    /// Adjust stiffness/friction for the surface under the wheel
    ///
    /// The polynomial is only rebuilt when the surface actually changes.
    pub fn set_surface(&mut self, params: &TireParameters, surface: SurfaceCode) {
        if surface == self.surface {
            return;
        }
        let scale = surface.friction_scale();
        self.surface = surface;
        self.cornering_stiffness = params.cornering_stiffness * scale;
        self.max_friction = params.max_friction * scale;
        self.recompute_curve();
    }

    fn recompute_curve(&mut self) {
        self.curve = TireCurve::new(
            self.cornering_stiffness / self.reference_load,
            self.max_friction,
        );
    }

    /// Solve the friction circle for one tick
    ///
    /// `velocity` is the contact point velocity in tire coordinates,
    /// `torque` the drive plus brake torque on the wheel, and
    /// `inverse_inertia` the inverse inertia the wheel spins against (driven
    /// wheels see the driveline). Updates wheel spin and patch deflection.
    pub fn solve(
        &mut self,
        params: &TireParameters,
        ctx: &TireContext,
        velocity: Vec3,
        torque: f32,
        normal_force: f32,
        inverse_inertia: f32,
    ) -> TireForce {
        let dt = ctx.dt;
        let finite = |v: f32| if v.is_finite() { v } else { 0.0 };
        let (vx, vy) = (finite(velocity.x), finite(velocity.y));
        let torque = finite(torque);
        let normal = finite(normal_force);

        self.slip_torque = 0.0;

        if normal <= 0.0 {
            // Airborne: wheel free-spins under whatever torque it gets
            self.slip = SlipState::Airborne;
            self.angular_velocity += torque * inverse_inertia * dt;
            self.patch_deflection = 0.0;
            return self.store(TireForce::default(), 0.0);
        }

        let r = params.radius;
        let wheel_inertia = 1.0 / inverse_inertia;
        let body_inertia = ctx.mass * r * r;
        // Share of the torque that reaches the road while the wheel tracks it
        let road_torque = torque * body_inertia / (body_inertia + wheel_inertia);

        let max_traction = self.max_friction * normal;
        let max_torque = max_traction * r;
        let road_angvel = vx / r;

        if self.angular_velocity > road_angvel {
            self.angular_velocity += (torque - max_torque) * inverse_inertia * dt;
            if self.angular_velocity > road_angvel {
                let force = self.spin_force(r, vx, vy, max_traction, SlipState::WheelSpin);
                self.slip_torque = max_torque;
                return self.store(force, normal);
            }
            self.angular_velocity = road_angvel;
        } else if self.angular_velocity < road_angvel {
            self.angular_velocity += (torque + max_torque) * inverse_inertia * dt;
            if self.angular_velocity < road_angvel {
                let force = self.spin_force(r, vx, vy, max_traction, SlipState::WheelLock);
                self.slip_torque = -max_torque;
                return self.store(force, normal);
            }
            self.angular_velocity = road_angvel;
        }

        let (traction, curve) = if torque != 0.0 {
            if road_torque >= max_torque || road_torque <= -max_torque {
                let sign = road_torque.signum();
                self.slip = if sign > 0.0 {
                    SlipState::TractionLimit
                } else {
                    SlipState::BrakeLimit
                };
                self.slip_torque = sign * max_torque;
                self.angular_velocity += (torque - self.slip_torque) * inverse_inertia * dt;
                self.patch_deflection = 0.0;
                let force = TireForce {
                    traction: sign * max_traction,
                    side: 0.0,
                };
                return self.store(force, normal);
            }

            // Traction eats into the friction budget left for cornering
            let traction = road_torque / r;
            let used = traction / normal;
            let remaining = (self.max_friction * self.max_friction - used * used)
                .max(0.0)
                .sqrt();
            (traction, TireCurve::new(self.curve.k1, remaining))
        } else {
            (0.0, self.curve)
        };

        let max_side = curve.max_friction * normal;
        let alpha = slip_angle(vx, vy);
        let k = params.lateral_stiffness;
        let damping = params.rubber_damping;

        let mut side = if alpha.abs() >= curve.peak_slip_angle {
            let ydot = -vy;
            self.patch_deflection += ydot * dt;
            self.slip = SlipState::Sliding;
            self.slip_torque = traction * r;
            self.angular_velocity += (torque - self.slip_torque) * inverse_inertia * dt;
            k * self.patch_deflection + damping * ydot
        } else {
            let secant = curve.secant(alpha.abs()).max(f32::EPSILON);
            let relaxation = (vx * k / (normal * secant)).abs();
            if relaxation * dt < TRANSIENT_LIMIT {
                let ydot = -relaxation * self.patch_deflection - vy;
                self.patch_deflection += ydot * dt;
                self.slip = SlipState::Transient;
                k * self.patch_deflection + damping * ydot
            } else {
                let side = -curve.coefficient(alpha) * normal;
                self.patch_deflection = side / k;
                self.slip = SlipState::SteadyState;
                side
            }
        };

        if side.abs() > max_side {
            side = max_side.copysign(side);
            self.patch_deflection = side / k;
        }

        self.store(TireForce { traction, side }, normal)
    }

    /// Force while the wheel slips against the road: the whole friction
    /// circle opposes the contact patch velocity
    fn spin_force(
        &mut self,
        r: f32,
        vx: f32,
        vy: f32,
        max_traction: f32,
        state: SlipState,
    ) -> TireForce {
        self.slip = state;
        let patch_vel = vx - self.angular_velocity * r;
        let patch_speed = (patch_vel * patch_vel + vy * vy).sqrt();
        if patch_speed <= f32::EPSILON {
            let traction = if state == SlipState::WheelSpin {
                max_traction
            } else {
                -max_traction
            };
            return TireForce {
                traction,
                side: 0.0,
            };
        }
        TireForce {
            traction: -max_traction * patch_vel / patch_speed,
            side: -max_traction * vy / patch_speed,
        }
    }

    fn store(&mut self, force: TireForce, normal: f32) -> TireForce {
        self.longitudinal_force = force.traction;
        self.lateral_force = force.side;
        self.normal_force = normal;
        force
    }

    /// Tire squeal loudness 0..=100
    pub fn screech_level(&self) -> u8 {
        let capacity = self.max_friction * self.normal_force;
        if capacity <= 0.0 {
            return 0;
        }
        ((self.lateral_force.abs() / capacity) * 100.0).min(100.0) as u8
    }

    /// Forget all dynamic state, keep surface-derived constants
    pub fn reset(&mut self) {
        self.patch_deflection = 0.0;
        self.angular_velocity = 0.0;
        self.slip_torque = 0.0;
        self.slip = SlipState::default();
        self.longitudinal_force = 0.0;
        self.lateral_force = 0.0;
        self.normal_force = 0.0;
    }
}

/// Slip angle (tangent form) from tire-local velocity
pub fn slip_angle(vx: f32, vy: f32) -> f32 {
    vy / vx.abs().max(DAMP_SPEED)
}
