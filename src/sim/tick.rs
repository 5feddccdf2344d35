//! Fixed timestep simulation tick
//!
//! Each car advances independently through the same pipeline: sample the
//! ground under each wheel, spring loads, drivetrain, brakes, tire forces,
//! body forces, anti-spin, integration, then the sanity check. Cars are
//! visited in id order so the result is deterministic.

use glam::Vec3;

use super::antispin::{AntiSpinGains, AntiSpinInput, yaw_moment};
use super::cartype::CarType;
use super::drivetrain::DrivetrainInput;
use super::state::{Car, Controls, Simulation};
use super::surface::SurfaceQuery;
use super::suspension::SuspensionContext;
use super::tire::TireContext;
use crate::consts::{FRONT_LEFT, FRONT_RIGHT, NUM_WHEELS, REAR_LEFT, REAR_RIGHT};
use crate::settings::Settings;

/// Longest frame `advance` will try to catch up on (s)
pub const MAX_FRAME_TIME: f32 = 0.1;

impl Simulation {
    /// Advance every car by one fixed timestep
    ///
    /// `controls[i]` drives car `i`; cars without an entry coast with
    /// neutral controls.
    pub fn tick(&mut self, controls: &[Controls], surface: &impl SurfaceQuery) {
        let neutral = Controls::default();
        for (i, car) in self.cars.iter_mut().enumerate() {
            let input = controls.get(i).unwrap_or(&neutral);
            step_car(car, input, surface, &self.settings, &self.gains);
        }
        self.ticks += 1;
        log::trace!("Tick {} ({} cars)", self.ticks, self.cars.len());
    }

    /// Run as many fixed ticks as `frame_dt` covers, up to the substep cap
    ///
    /// Leftover time is carried into the next call. Returns the number of
    /// ticks run.
    pub fn advance(
        &mut self,
        frame_dt: f32,
        controls: &[Controls],
        surface: &impl SurfaceQuery,
    ) -> u32 {
        if frame_dt.is_finite() && frame_dt > 0.0 {
            self.accumulator += frame_dt.min(MAX_FRAME_TIME);
        }
        let dt = self.settings.timestep;

        let mut substeps = 0;
        while self.accumulator >= dt && substeps < self.settings.max_substeps {
            self.tick(controls, surface);
            self.accumulator -= dt;
            substeps += 1;
        }
        substeps
    }
}

/// Advance one car by one timestep
pub(crate) fn step_car(
    car: &mut Car,
    controls: &Controls,
    surface: &impl SurfaceQuery,
    settings: &Settings,
    gains: &AntiSpinGains,
) {
    let car_type = std::sync::Arc::clone(&car.car_type);
    let ct: &CarType = &car_type;
    let controls = controls.sanitized();
    let dt = settings.timestep;
    car.controls = controls;
    car.body.dt = dt;
    car.body.clear_accumulators();

    let gear_before = car.drivetrain.gear;
    car.drivetrain.command(&ct.drivetrain, controls.gear);

    sample_ground(car, ct, surface);
    spring_loads(car, ct, dt);

    let loads: [f32; NUM_WHEELS] = std::array::from_fn(|i| car.wheels[i].normal_force);
    let drive = car.drivetrain.update(
        &ct.drivetrain,
        &DrivetrainInput {
            throttle: controls.throttle,
            clutch_pedal: controls.clutch,
            switches: controls.switches,
            rear_wheel_angvel: [
                car.wheels[REAR_LEFT].tire.angular_velocity,
                car.wheels[REAR_RIGHT].tire.angular_velocity,
            ],
            wheel_loads: loads,
            rear_surfaces: [car.wheels[REAR_LEFT].surface, car.wheels[REAR_RIGHT].surface],
            speed: car.body.speed(),
            dt,
        },
    );
    if car.drivetrain.gear != gear_before {
        log::debug!(
            "Car {} shifted {:?} -> {:?} at {:.0} rpm",
            car.id.0,
            gear_before,
            car.drivetrain.gear,
            car.drivetrain.engine_rpm()
        );
    }

    tire_forces(car, ct, &controls, drive, dt);

    // Body forces
    let grounded = car.any_wheel_grounded();
    let rear_loose = [REAR_LEFT, REAR_RIGHT].iter().all(|&i| {
        let w = &car.wheels[i];
        w.is_grounded() && w.surface.is_loose()
    });
    car.body.add_gravity();
    car.body.add_drag(ct, grounded, rear_loose);

    let external_force = car.body.to_body(car.queued_force);
    let external_moment = car.body.to_body(car.queued_moment);
    car.body.add_force(external_force);
    car.body.add_moment(external_moment);
    car.queued_force = Vec3::ZERO;
    car.queued_moment = Vec3::ZERO;

    let yaw = yaw_moment(
        gains,
        &AntiSpinInput {
            controller: car.controller,
            throttle: controls.throttle,
            steer: controls.steer,
            velocity: car.body.velocity,
            angular_velocity: car.body.angular_velocity,
            mass: ct.mass,
            any_wheel_loaded: grounded,
            up_z: car.body.up_z(),
            front_push: car.last_external_force.x,
            car_scale: ct.antispin_scale,
        },
    );
    car.body.add_moment(Vec3::new(0.0, 0.0, yaw));
    car.last_external_force = external_force;

    car.body.integrate(settings.renormalize_interval);

    if car.body.up_z() < 0.0 {
        car.inverted_time += dt;
    } else {
        car.inverted_time = 0.0;
    }

    match car.sanity_violation(settings) {
        // Only upright states are worth going back to
        None if car.body.up_z() >= settings.sanity.min_checkpoint_up_z => car.save_checkpoint(),
        None => {}
        Some(reason) => {
            log::warn!(
                "Car {} failed sanity check ({}) at t={:.2}; restoring last good state",
                car.id.0,
                reason,
                car.body.clock
            );
            car.restore_checkpoint();
        }
    }
}

/// Body-frame point where wheel `i` touches level ground at zero compression
fn rest_contact(ct: &CarType, i: usize) -> Vec3 {
    ct.wheel_offsets[i] - Vec3::new(0.0, 0.0, ct.tires[i].radius)
}

/// Query the ground under each wheel and update spring compression
fn sample_ground(car: &mut Car, ct: &CarType, surface: &impl SurfaceQuery) {
    for i in 0..NUM_WHEELS {
        let point = rest_contact(ct, i);
        let world = car.body.point_position(point);
        let contact = surface.query(world);
        let normal = contact.normal.normalize_or(Vec3::Z);

        // Depth of the rest contact point below the ground plane, and how
        // fast it is sinking into it. Ground on the roof side is no contact.
        let depth = normal.z * (contact.height - world.z);
        let compression = if car.body.orientation.z_axis.dot(normal) > 0.0 {
            depth
        } else {
            depth.min(0.0)
        };
        let velocity = car.body.to_world(car.body.point_velocity(point));
        let rate = -normal.dot(velocity);

        let wheel = &mut car.wheels[i];
        wheel.suspension.update(compression, rate);
        wheel.ground_normal = normal;
        wheel.surface = contact.surface;
        wheel.tire.set_surface(&ct.tires[i], contact.surface);
    }
}

/// Spring, damper and anti-roll loads
fn spring_loads(car: &mut Car, ct: &CarType, dt: f32) {
    let compressions: [f32; NUM_WHEELS] =
        std::array::from_fn(|i| car.wheels[i].suspension.compression);
    for i in 0..NUM_WHEELS {
        let anti_roll_rate = if i == FRONT_LEFT || i == FRONT_RIGHT {
            ct.front_anti_roll
        } else {
            ct.rear_anti_roll
        };
        let ctx = SuspensionContext {
            anti_roll_rate,
            // Partner on the same axle
            other_compression: compressions[i ^ 1],
            mass: ct.mass,
            weight: ct.weight(),
            dt,
        };
        let wheel = &mut car.wheels[i];
        wheel.normal_force = wheel.suspension.normal_force(&ct.suspension[i], &ctx);
    }
}

/// Brake torque on a wheel, opposing its spin
///
/// Never more than it takes to stop the wheel this tick, so brakes alone
/// cannot turn a wheel backwards.
pub fn brake_torque(
    ct: &CarType,
    wheel: usize,
    brake: f32,
    angular_velocity: f32,
    inverse_inertia: f32,
    dt: f32,
) -> f32 {
    let share = if wheel == FRONT_LEFT || wheel == FRONT_RIGHT {
        ct.brake_balance
    } else {
        1.0 - ct.brake_balance
    };
    let max = ct.max_brake_torque * brake * share * 0.5;
    let stop = angular_velocity.abs() / (inverse_inertia * dt);
    -angular_velocity.signum() * max.min(stop)
}

/// Solve each tire in its road-plane frame and push the result on the body
fn tire_forces(
    car: &mut Car,
    ct: &CarType,
    controls: &Controls,
    drive: [f32; NUM_WHEELS],
    dt: f32,
) {
    let ctx = TireContext { mass: ct.mass, dt };
    let driven_inverse_inertia = car.drivetrain.wheel_inverse_inertia();

    for i in 0..NUM_WHEELS {
        let params = &ct.tires[i];
        let steered = i == FRONT_LEFT || i == FRONT_RIGHT;
        let steer = if steered { controls.steer } else { 0.0 };
        let inverse_inertia = if steered {
            params.inverse_inertia
        } else {
            driven_inverse_inertia
        };

        let wheel = &mut car.wheels[i];
        let brake = brake_torque(
            ct,
            i,
            controls.brake,
            wheel.tire.angular_velocity,
            inverse_inertia,
            dt,
        );
        wheel.drive_torque = drive[i];
        wheel.brake_torque = brake;

        // Tire axes: rolling direction projected onto the road, left = n × f
        let normal = car.body.to_body(wheel.ground_normal);
        let heading = Vec3::new(steer.cos(), steer.sin(), 0.0);
        let forward = (heading - normal * heading.dot(normal)).normalize_or(heading);
        let left = normal.cross(forward);

        // Forces act at the wheel mount, raised by the spring travel
        let lever = ct.wheel_offsets[i] + Vec3::Z * wheel.suspension.compression.max(0.0);
        let contact = rest_contact(ct, i) + Vec3::Z * wheel.suspension.compression.max(0.0);
        let v = car.body.point_velocity(contact);
        let local = Vec3::new(v.dot(forward), v.dot(left), v.dot(normal));

        let force = wheel.tire.solve(
            params,
            &ctx,
            local,
            drive[i] + brake,
            wheel.normal_force,
            inverse_inertia,
        );
        let body_force =
            forward * force.traction + left * force.side + normal * wheel.normal_force;
        car.body.add_force_at(body_force, lever);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::SIM_DT;
    use crate::sim::antispin::Controller;
    use crate::sim::cartype::stock_car;
    use crate::sim::drivetrain::Gear;
    use crate::sim::state::SpawnRequest;
    use crate::sim::surface::FlatGround;

    fn sim_with(car: &str) -> Simulation {
        let mut sim = Simulation::new(Settings::default());
        sim.spawn(&SpawnRequest::new(car), &FlatGround::pavement())
            .unwrap();
        sim
    }

    #[test]
    fn test_parked_car_stays_put() {
        let mut sim = sim_with("Venom");
        let ground = FlatGround::pavement();
        let start = sim.cars()[0].body.position;
        for _ in 0..120 {
            sim.tick(&[], &ground);
        }
        let car = &sim.cars()[0];
        assert!((car.body.position - start).length() < 0.1);
        assert!(car.body.speed() < 0.5);
        assert_eq!(car.resets, 0);
        let total: f32 = car.wheels.iter().map(|w| w.normal_force).sum();
        assert!((total - car.car_type.weight()).abs() < car.car_type.weight() * 0.1);
    }

    #[test]
    fn test_brake_torque_cannot_reverse_wheel() {
        let ct = stock_car("Venom").unwrap();
        let t = brake_torque(&ct, FRONT_LEFT, 1.0, 0.5, 0.1, SIM_DT);
        assert!((t + 0.5 / (0.1 * SIM_DT)).abs() < 1e-3);
        let t = brake_torque(&ct, REAR_LEFT, 1.0, 100.0, 0.1, SIM_DT);
        let expected = ct.max_brake_torque * (1.0 - ct.brake_balance) * 0.5;
        assert!((t + expected).abs() < 1e-3);
        assert_eq!(brake_torque(&ct, REAR_RIGHT, 0.0, 100.0, 0.1, SIM_DT), 0.0);
    }

    #[test]
    fn test_collision_applies_once() {
        let mut sim = sim_with("Rocket");
        let ground = FlatGround::pavement();
        let id = sim.cars()[0].id;
        sim.queue_collision(id, Vec3::new(0.0, 20_000.0, 0.0), Vec3::ZERO)
            .unwrap();
        sim.tick(&[], &ground);
        let vy = sim.cars()[0].body.world_velocity().y;
        assert!(vy > 1.0, "pushed sideways: {vy}");
        assert_eq!(sim.cars()[0].queued_force, Vec3::ZERO);
        assert!(sim.cars()[0].last_external_force.length() > 1000.0);
        sim.tick(&[], &ground);
        assert_eq!(sim.cars()[0].last_external_force, Vec3::ZERO);
    }

    #[test]
    fn test_advance_caps_substeps() {
        let mut sim = sim_with("Rocket");
        let ground = FlatGround::pavement();
        assert_eq!(sim.advance(SIM_DT * 2.5, &[], &ground), 2);
        assert_eq!(sim.advance(SIM_DT * 0.6, &[], &ground), 1);
        // A long stall only catches up a few ticks
        let n = sim.advance(5.0, &[], &ground);
        assert_eq!(n, sim.settings().max_substeps);
        // Backlog left over from the stall drains on later frames
        assert_eq!(sim.advance(f32::NAN, &[], &ground), 2);
        assert_eq!(sim.ticks(), 9);
    }

    #[test]
    fn test_nan_resets_to_checkpoint() {
        let mut sim = sim_with("Wraith");
        let ground = FlatGround::pavement();
        for _ in 0..10 {
            sim.tick(&[], &ground);
        }
        let good = sim.cars()[0].body.position;
        sim.cars[0].body.velocity = Vec3::new(f32::NAN, 0.0, 0.0);
        sim.tick(&[], &ground);
        let car = &sim.cars()[0];
        assert_eq!(car.resets, 1);
        assert!(car.body.position.is_finite());
        assert!((car.body.position - good).length() < 0.1);
        assert_eq!(car.body.velocity, Vec3::ZERO);
    }

    /// Flip the car onto its roof with the wheel points below the road
    fn sink_upside_down(sim: &mut Simulation) {
        let body = &mut sim.cars[0].body;
        body.orientation = body.orientation * glam::Mat3::from_rotation_x(std::f32::consts::PI);
        body.position.z = -3.0;
        body.velocity = Vec3::new(40.0, 0.0, 0.0);
    }

    #[test]
    fn test_ground_on_roof_side_is_no_contact() {
        let mut sim = sim_with("Venom");
        let ground = FlatGround::pavement();
        for _ in 0..10 {
            sim.tick(&[], &ground);
        }
        sink_upside_down(&mut sim);
        let throttle = Controls {
            throttle: 1.0,
            ..Default::default()
        };
        sim.tick(&[throttle], &ground);

        let car = &sim.cars()[0];
        assert!(car.body.up_z() < -0.9);
        for wheel in &car.wheels {
            assert!(!wheel.suspension.is_grounded());
            assert_eq!(wheel.normal_force, 0.0);
            assert_eq!(wheel.tire.longitudinal_force, 0.0);
        }
        assert_eq!(car.resets, 0);
    }

    #[test]
    fn test_upside_down_car_is_put_back() {
        let mut sim = sim_with("Venom");
        let ground = FlatGround::pavement();
        for _ in 0..10 {
            sim.tick(&[], &ground);
        }
        let upright = sim.cars()[0].body.position;
        sink_upside_down(&mut sim);

        for _ in 0..30 {
            sim.tick(&[], &ground);
        }
        assert_eq!(sim.cars()[0].resets, 0);
        assert!(sim.cars()[0].inverted_time > 0.0);

        for _ in 0..40 {
            sim.tick(&[], &ground);
        }
        let car = &sim.cars()[0];
        assert_eq!(car.resets, 1);
        assert!(car.body.up_z() > 0.9);
        assert!(car.body.position.z > 0.0);
        assert!((car.body.position - upright).length() < 0.5);
    }

    #[test]
    fn test_ai_car_drives_forward() {
        let mut sim = Simulation::new(Settings::default());
        let ground = FlatGround::pavement();
        sim.spawn(
            &SpawnRequest::new("Banshee").controller(Controller::Ai),
            &ground,
        )
        .unwrap();
        let throttle = Controls {
            throttle: 1.0,
            ..Default::default()
        };
        for _ in 0..120 {
            sim.tick(&[throttle], &ground);
        }
        let car = &sim.cars()[0];
        assert!(car.body.velocity.x > 10.0);
        assert!(car.drivetrain.gear.is_forward());
        assert_ne!(car.drivetrain.gear, Gear::Reverse);
    }
}
