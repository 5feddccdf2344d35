//! Simulation state and core types
//!
//! Each car exclusively owns its body, drivetrain and wheels. Car types
//! are shared read-only behind `Arc`. Everything a replay or network peer
//! needs per tick is published through `CarSnapshot`.

use std::sync::Arc;

use glam::{Mat3, Vec3};
use serde::{Deserialize, Serialize};

use super::antispin::{AntiSpinGains, Controller};
use super::body::BodyState;
use super::cartype::{CarType, stock_cars};
use super::drivetrain::{ClutchState, Drivetrain, Gear, GearCommand, Transmission};
use super::surface::{SurfaceCode, SurfaceQuery};
use super::tire::{SlipState, TireRuntimeState};
use super::suspension::SuspensionState;
use super::torque::{EngineSwitches, Gauges};
use crate::consts::{FPS_TO_MPH, NUM_WHEELS};
use crate::error::{Error, Result};
use crate::settings::Settings;
use crate::{heading_of, orthonormal_error};

/// Largest steer angle accepted from a control source (rad)
pub const MAX_STEER: f32 = 0.6;

/// Dense car handle, assigned in spawn order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CarId(pub u32);

/// Control inputs for one car for one tick
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Controls {
    /// 0..=1
    pub throttle: f32,
    /// 0..=1
    pub brake: f32,
    /// Front tire steer angle (rad, + left)
    pub steer: f32,
    /// Clutch pedal 0..=1 (manual transmission only)
    pub clutch: f32,
    pub gear: GearCommand,
    pub switches: EngineSwitches,
}

impl Default for Controls {
    fn default() -> Self {
        Self {
            throttle: 0.0,
            brake: 0.0,
            steer: 0.0,
            clutch: 0.0,
            gear: GearCommand::Hold,
            switches: EngineSwitches::default(),
        }
    }
}

impl Controls {
    /// Clamp to valid ranges, replacing non-finite values with zero
    pub fn sanitized(&self) -> Self {
        let unit = |v: f32| if v.is_finite() { v.clamp(0.0, 1.0) } else { 0.0 };
        Self {
            throttle: unit(self.throttle),
            brake: unit(self.brake),
            steer: if self.steer.is_finite() {
                self.steer.clamp(-MAX_STEER, MAX_STEER)
            } else {
                0.0
            },
            clutch: unit(self.clutch),
            gear: self.gear,
            switches: self.switches,
        }
    }
}

/// One corner of a car
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Wheel {
    pub tire: TireRuntimeState,
    pub suspension: SuspensionState,
    /// Ground normal under the wheel (world frame)
    pub ground_normal: Vec3,
    pub surface: SurfaceCode,
    /// Load on the tire this tick (lb)
    pub normal_force: f32,
    pub drive_torque: f32,
    pub brake_torque: f32,
}

impl Wheel {
    fn new(car: &CarType, index: usize, reference_load: f32) -> Self {
        Self {
            tire: TireRuntimeState::new(&car.tires[index], reference_load),
            suspension: SuspensionState::default(),
            ground_normal: Vec3::Z,
            surface: SurfaceCode::Pavement,
            normal_force: 0.0,
            drive_torque: 0.0,
            brake_torque: 0.0,
        }
    }

    pub fn is_grounded(&self) -> bool {
        self.normal_force > 0.0
    }
}

/// Last state that passed the sanity check
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Checkpoint {
    pub body: BodyState,
    pub drivetrain: Drivetrain,
    pub wheels: [Wheel; NUM_WHEELS],
}

/// A simulated car
#[derive(Debug, Clone)]
pub struct Car {
    pub id: CarId,
    pub car_type: Arc<CarType>,
    pub controller: Controller,
    /// Controls applied on the last tick (after sanitizing)
    pub controls: Controls,
    pub body: BodyState,
    pub drivetrain: Drivetrain,
    pub wheels: [Wheel; NUM_WHEELS],
    /// Collision force queued for the next tick (world frame)
    pub(crate) queued_force: Vec3,
    /// Collision moment queued for the next tick (world frame)
    pub(crate) queued_moment: Vec3,
    /// External force applied on the last tick (body frame)
    pub last_external_force: Vec3,
    /// Times the sanity pass has reset this car
    pub resets: u32,
    /// Seconds spent continuously upside down
    pub inverted_time: f32,
    pub(crate) checkpoint: Checkpoint,
}

impl Car {
    pub(crate) fn new(
        id: CarId,
        car_type: Arc<CarType>,
        controller: Controller,
        transmission: Transmission,
        body: BodyState,
    ) -> Self {
        let loads = car_type.static_loads();
        let wheels: [Wheel; NUM_WHEELS] =
            std::array::from_fn(|i| Wheel::new(&car_type, i, loads[i]));
        let rear_inverse_inertia = car_type.tires[crate::consts::REAR_LEFT].inverse_inertia;
        let drivetrain = Drivetrain::new(transmission, rear_inverse_inertia);
        let checkpoint = Checkpoint {
            body: body.clone(),
            drivetrain: drivetrain.clone(),
            wheels: wheels.clone(),
        };
        Self {
            id,
            car_type,
            controller,
            controls: Controls::default(),
            body,
            drivetrain,
            wheels,
            queued_force: Vec3::ZERO,
            queued_moment: Vec3::ZERO,
            last_external_force: Vec3::ZERO,
            resets: 0,
            inverted_time: 0.0,
            checkpoint,
        }
    }

    pub fn any_wheel_grounded(&self) -> bool {
        self.wheels.iter().any(Wheel::is_grounded)
    }

    /// Remember the current state as last-known-good
    pub(crate) fn save_checkpoint(&mut self) {
        self.checkpoint.body.clone_from(&self.body);
        self.checkpoint.drivetrain.clone_from(&self.drivetrain);
        self.checkpoint.wheels.clone_from(&self.wheels);
    }

    /// Go back to the last-known-good state, stopped
    pub(crate) fn restore_checkpoint(&mut self) {
        let clock = self.body.clock;
        let ticks = self.body.ticks;
        self.body.clone_from(&self.checkpoint.body);
        self.body.velocity = Vec3::ZERO;
        self.body.angular_velocity = Vec3::ZERO;
        self.body.clear_accumulators();
        self.body.clock = clock;
        self.body.ticks = ticks;

        self.drivetrain.clone_from(&self.checkpoint.drivetrain);
        self.drivetrain.driveshaft_angvel = 0.0;
        self.wheels.clone_from(&self.checkpoint.wheels);
        for wheel in &mut self.wheels {
            wheel.tire.reset();
            wheel.suspension.velocity = 0.0;
        }
        self.queued_force = Vec3::ZERO;
        self.queued_moment = Vec3::ZERO;
        self.last_external_force = Vec3::ZERO;
        self.inverted_time = 0.0;
        self.resets += 1;
    }

    /// First reason this car is outside the envelope, if any
    pub fn sanity_violation(&self, settings: &Settings) -> Option<&'static str> {
        let env = &settings.sanity;
        let body = &self.body;
        let finite = body.position.is_finite()
            && body.velocity.is_finite()
            && body.angular_velocity.is_finite()
            && body.orientation.is_finite()
            && self.drivetrain.engine_angvel.is_finite()
            && self.wheels.iter().all(|w| {
                w.tire.angular_velocity.is_finite() && w.tire.patch_deflection.is_finite()
            });

        if !finite {
            Some("non-finite state")
        } else if body.speed() > env.max_speed {
            Some("speed beyond envelope")
        } else if body.angular_velocity.length() > env.max_angular_speed {
            Some("spin beyond envelope")
        } else if orthonormal_error(&body.orientation) > env.max_basis_error {
            Some("orientation drift")
        } else if body.position.z < env.min_altitude || body.position.z > env.max_altitude {
            Some("altitude beyond envelope")
        } else if self.inverted_time > env.max_inverted_time {
            Some("upside down")
        } else {
            None
        }
    }

    pub fn snapshot(&self) -> CarSnapshot {
        let body = &self.body;
        let speed = body.speed();
        CarSnapshot {
            id: self.id,
            clock: body.clock,
            position: body.position,
            orientation: body.orientation,
            velocity: body.world_velocity(),
            body_velocity: body.velocity,
            angular_velocity: body.angular_velocity,
            speed,
            mph: speed * FPS_TO_MPH,
            heading: heading_of(&body.orientation),
            engine_rpm: self.drivetrain.engine_rpm(),
            gear: self.drivetrain.gear,
            clutch: self.drivetrain.clutch_state,
            wheels: std::array::from_fn(|i| {
                let w = &self.wheels[i];
                WheelSnapshot {
                    slip: w.tire.slip,
                    spinning: w.tire.slip.is_spinning(),
                    screech: w.tire.screech_level(),
                    normal_force: w.normal_force,
                    angular_velocity: w.tire.angular_velocity,
                    compression: w.suspension.compression,
                    surface: w.surface,
                }
            }),
            gauges: self.drivetrain.gauges,
            resets: self.resets,
        }
    }
}

/// Per-wheel part of a snapshot
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WheelSnapshot {
    pub slip: SlipState,
    pub spinning: bool,
    /// Tire squeal 0..=100
    pub screech: u8,
    pub normal_force: f32,
    pub angular_velocity: f32,
    pub compression: f32,
    pub surface: SurfaceCode,
}

/// Read-only view of a car after a tick
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CarSnapshot {
    pub id: CarId,
    pub clock: f32,
    pub position: Vec3,
    pub orientation: Mat3,
    /// World-frame velocity
    pub velocity: Vec3,
    /// Body-frame velocity
    pub body_velocity: Vec3,
    /// Body-frame angular velocity
    pub angular_velocity: Vec3,
    /// ft/s
    pub speed: f32,
    pub mph: f32,
    pub heading: f32,
    pub engine_rpm: f32,
    pub gear: Gear,
    pub clutch: ClutchState,
    pub wheels: [WheelSnapshot; NUM_WHEELS],
    pub gauges: Gauges,
    pub resets: u32,
}

/// How and where to place a new car
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpawnRequest {
    /// Car type name (case-insensitive)
    pub car_type: String,
    /// Ground position; height is taken from the surface
    pub position: Vec3,
    pub heading: f32,
    pub controller: Controller,
    pub transmission: Transmission,
}

impl SpawnRequest {
    pub fn new(car_type: impl Into<String>) -> Self {
        Self {
            car_type: car_type.into(),
            position: Vec3::ZERO,
            heading: 0.0,
            controller: Controller::Human,
            transmission: Transmission::Automatic,
        }
    }

    pub fn at(mut self, position: Vec3, heading: f32) -> Self {
        self.position = position;
        self.heading = heading;
        self
    }

    pub fn controller(mut self, controller: Controller) -> Self {
        self.controller = controller;
        self
    }

    pub fn transmission(mut self, transmission: Transmission) -> Self {
        self.transmission = transmission;
        self
    }
}

/// All cars plus the shared, immutable data they run on
#[derive(Debug, Clone)]
pub struct Simulation {
    pub(crate) settings: Settings,
    pub(crate) gains: AntiSpinGains,
    pub(crate) car_types: Vec<Arc<CarType>>,
    pub(crate) cars: Vec<Car>,
    /// Unsimulated frame time carried between `advance` calls
    pub(crate) accumulator: f32,
    pub(crate) ticks: u64,
}

impl Simulation {
    /// Empty simulation with the stock car catalog
    pub fn new(settings: Settings) -> Self {
        let gains = AntiSpinGains::for_difficulty(settings.difficulty);
        Self {
            settings,
            gains,
            car_types: stock_cars().into_iter().map(Arc::new).collect(),
            cars: Vec::new(),
            accumulator: 0.0,
            ticks: 0,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn cars(&self) -> &[Car] {
        &self.cars
    }

    /// Fixed ticks run so far
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn car(&self, id: CarId) -> Result<&Car> {
        self.cars
            .get(id.0 as usize)
            .ok_or(Error::UnknownCar(id))
    }

    /// Mutable access for tooling that places or launches cars directly
    pub fn car_mut(&mut self, id: CarId) -> Result<&mut Car> {
        self.cars
            .get_mut(id.0 as usize)
            .ok_or(Error::UnknownCar(id))
    }

    pub fn car_type(&self, name: &str) -> Result<Arc<CarType>> {
        self.car_types
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
            .cloned()
            .ok_or_else(|| Error::UnknownCarType(name.to_string()))
    }

    /// Add or replace a car type; cars already spawned keep the old one
    pub fn register_car_type(&mut self, car_type: CarType) -> Result<()> {
        car_type.validate()?;
        log::info!("Registered car type {}", car_type.name);
        let car_type = Arc::new(car_type);
        match self
            .car_types
            .iter_mut()
            .find(|c| c.name.eq_ignore_ascii_case(&car_type.name))
        {
            Some(slot) => *slot = car_type,
            None => self.car_types.push(car_type),
        }
        Ok(())
    }

    /// Place a car at rest on the ground under `request.position`
    pub fn spawn(&mut self, request: &SpawnRequest, surface: &impl SurfaceQuery) -> Result<CarId> {
        let car_type = self.car_type(&request.car_type)?;
        let ground = surface.query(request.position).height;
        let body = BodyState::at_rest(
            &car_type,
            request.position,
            request.heading,
            ground,
            self.settings.timestep,
        );
        let id = CarId(self.cars.len() as u32);
        log::info!(
            "Spawned {} as car {} at ({:.1}, {:.1}, {:.1})",
            car_type.name,
            id.0,
            body.position.x,
            body.position.y,
            body.position.z
        );
        self.cars.push(Car::new(
            id,
            car_type,
            request.controller,
            request.transmission,
            body,
        ));
        Ok(id)
    }

    /// Queue a collision force/moment (world frame) for the next tick
    pub fn queue_collision(&mut self, id: CarId, force: Vec3, moment: Vec3) -> Result<()> {
        let car = self
            .cars
            .get_mut(id.0 as usize)
            .ok_or(Error::UnknownCar(id))?;
        car.queued_force += force;
        car.queued_moment += moment;
        Ok(())
    }

    /// Put a car back to its last-known-good state, stopped
    pub fn reset_car(&mut self, id: CarId) -> Result<()> {
        let car = self
            .cars
            .get_mut(id.0 as usize)
            .ok_or(Error::UnknownCar(id))?;
        car.restore_checkpoint();
        log::info!("Car {} reset on request", id.0);
        Ok(())
    }

    pub fn snapshot(&self, id: CarId) -> Result<CarSnapshot> {
        Ok(self.car(id)?.snapshot())
    }

    /// Snapshots of every car in id order
    pub fn snapshots(&self) -> Vec<CarSnapshot> {
        self.cars.iter().map(Car::snapshot).collect()
    }
}
