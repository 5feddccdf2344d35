//! Deterministic vehicle simulation
//!
//! All physics lives here. This module must be pure and deterministic:
//! - Fixed timestep only
//! - Seeded RNG only
//! - Stable iteration order (by car ID)
//! - No rendering, audio or platform dependencies

pub mod antispin;
pub mod body;
pub mod cartype;
pub mod drivetrain;
pub mod script;
pub mod state;
pub mod surface;
pub mod suspension;
pub mod tick;
pub mod tire;
pub mod torque;

pub use antispin::{AntiSpinGains, Controller, yaw_moment};
pub use body::BodyState;
pub use cartype::{CarType, stock_car, stock_cars};
pub use drivetrain::{
    ClutchState, CurveSelection, Drivetrain, DrivetrainParameters, Gear, GearCommand,
    Transmission, split_torque,
};
pub use script::{ControlScript, ControlSource};
pub use state::{Car, CarId, CarSnapshot, Controls, Simulation, SpawnRequest, WheelSnapshot};
pub use surface::{FlatGround, SurfaceCode, SurfaceContact, SurfaceQuery};
pub use suspension::{SuspensionParameters, SuspensionState};
pub use tick::brake_torque;
pub use tire::{SlipState, TireCurve, TireParameters, TireRuntimeState};
pub use torque::{EngineSwitches, Gauges, TorqueCurveTable};
