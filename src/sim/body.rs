//! Rigid body state and integration
//!
//! Forces and moments accumulate in the body frame (X forward, Y left,
//! Z up) and are integrated with semi-implicit Euler once per tick. Body
//! velocities carry the rotating-frame terms, so the equations are the
//! Euler equations about the principal axes.

use glam::{Mat3, Quat, Vec3};
use serde::{Deserialize, Serialize};

use super::cartype::CarType;
use crate::consts::{GRAVITY, MAX_VELOCITY, NUM_WHEELS};
use crate::orthonormalize;

/// Forward speed (ft/s) below which rolling resistance fades out
pub const ROLLING_FADE_SPEED: f32 = 1.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BodyState {
    /// Center of mass in world coordinates (ft)
    pub position: Vec3,
    /// Body axes as columns in world coordinates
    pub orientation: Mat3,
    /// Body-frame linear velocity (ft/s)
    pub velocity: Vec3,
    /// Body-frame angular velocity (rad/s)
    pub angular_velocity: Vec3,
    /// Force accumulated this tick (body frame, lb)
    pub force: Vec3,
    /// Moment accumulated this tick (body frame, ft·lb)
    pub moment: Vec3,
    pub mass: f32,
    pub inv_mass: f32,
    /// Principal moments of inertia (slug·ft²)
    pub inertia: Vec3,
    /// Wheel hubs relative to the center of mass (body frame)
    pub wheel_offsets: [Vec3; NUM_WHEELS],
    /// Simulated time (s)
    pub clock: f32,
    pub dt: f32,
    /// Ticks integrated so far
    pub ticks: u64,
}

impl BodyState {
    /// Body at rest with the wheels sitting at their static sag
    ///
    /// `ground` is the terrain height under `position`; the car is pitched
    /// so that front and rear springs each carry their static share.
    pub fn at_rest(car: &CarType, position: Vec3, heading: f32, ground: f32, dt: f32) -> Self {
        let loads = car.static_loads();
        let sag: [f32; NUM_WHEELS] =
            std::array::from_fn(|i| loads[i] / car.suspension[i].spring_rate);
        let contact_z: [f32; NUM_WHEELS] =
            std::array::from_fn(|i| car.wheel_offsets[i].z - car.tires[i].radius);

        let (front, rear) = (0, 2);
        let front_x = car.wheel_offsets[front].x;
        let rear_x = car.wheel_offsets[rear].x;
        let sin_pitch = ((sag[front] - sag[rear]) + (contact_z[front] - contact_z[rear]))
            / (front_x - rear_x);
        let pitch = sin_pitch.clamp(-0.5, 0.5).asin();
        let height = ground - sag[front] - contact_z[front] * pitch.cos() + front_x * pitch.sin();

        let orientation = Mat3::from_rotation_z(heading) * Mat3::from_rotation_y(pitch);

        Self {
            position: Vec3::new(position.x, position.y, height),
            orientation,
            velocity: Vec3::ZERO,
            angular_velocity: Vec3::ZERO,
            force: Vec3::ZERO,
            moment: Vec3::ZERO,
            mass: car.mass,
            inv_mass: 1.0 / car.mass,
            inertia: car.inertia,
            wheel_offsets: car.wheel_offsets,
            clock: 0.0,
            dt,
            ticks: 0,
        }
    }

    /// World vector into body frame
    pub fn to_body(&self, world: Vec3) -> Vec3 {
        self.orientation.transpose() * world
    }

    /// Body vector into world frame
    pub fn to_world(&self, body: Vec3) -> Vec3 {
        self.orientation * body
    }

    pub fn world_velocity(&self) -> Vec3 {
        self.to_world(self.velocity)
    }

    pub fn speed(&self) -> f32 {
        self.velocity.length()
    }

    /// Body up axis · world up
    pub fn up_z(&self) -> f32 {
        self.orientation.z_axis.z
    }

    /// Body-frame velocity of a point fixed to the body
    pub fn point_velocity(&self, point: Vec3) -> Vec3 {
        self.velocity + self.angular_velocity.cross(point)
    }

    /// World position of a body-frame point
    pub fn point_position(&self, point: Vec3) -> Vec3 {
        self.position + self.to_world(point)
    }

    pub fn clear_accumulators(&mut self) {
        self.force = Vec3::ZERO;
        self.moment = Vec3::ZERO;
    }

    /// Body-frame force applied at a body-frame point
    pub fn add_force_at(&mut self, force: Vec3, point: Vec3) {
        self.force += force;
        self.moment += point.cross(force);
    }

    pub fn add_force(&mut self, force: Vec3) {
        self.force += force;
    }

    pub fn add_moment(&mut self, moment: Vec3) {
        self.moment += moment;
    }

    pub fn add_gravity(&mut self) {
        let weight = Vec3::new(0.0, 0.0, -self.mass * GRAVITY);
        self.force += self.to_body(weight);
    }

    /// Aerodynamic drag, rolling resistance and loose-surface drag
    pub fn add_drag(&mut self, car: &CarType, grounded: bool, on_loose_ground: bool) {
        let vx = self.velocity.x;
        let mut drag = Vec3::new(-car.drag * vx * vx.abs(), 0.0, 0.0);
        if grounded {
            let fade = (vx / ROLLING_FADE_SPEED).clamp(-1.0, 1.0);
            drag.x -= car.rolling_resistance * fade;
        }
        if on_loose_ground {
            drag.x -= car.dirt_drag * vx;
            drag.y -= car.dirt_drag * self.velocity.y;
        }
        self.force += drag;
    }

    /// Integrate one tick from the accumulated force and moment
    pub fn integrate(&mut self, renormalize_interval: u32) {
        let dt = self.dt;
        let w = self.angular_velocity;

        let accel = self.force * self.inv_mass - w.cross(self.velocity);
        let gyro = w.cross(self.inertia * w);
        let angular_accel = (self.moment - gyro) / self.inertia;

        self.velocity += accel * dt;
        let speed = self.velocity.length();
        if speed > MAX_VELOCITY {
            self.velocity *= MAX_VELOCITY / speed;
        }
        self.angular_velocity += angular_accel * dt;

        self.position += self.to_world(self.velocity) * dt;
        let spin = Quat::from_scaled_axis(self.angular_velocity * dt);
        self.orientation *= Mat3::from_quat(spin);

        self.ticks += 1;
        if self.ticks % u64::from(renormalize_interval.max(1)) == 0 {
            self.orientation = orthonormalize(&self.orientation);
        }
        self.clock += dt;
    }
}
