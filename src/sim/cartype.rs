//! Car type definitions and the stock catalog
//!
//! A `CarType` is immutable once a car has been spawned from it; cars hold
//! it behind an `Arc`.

use glam::Vec3;
use serde::{Deserialize, Serialize};

use super::drivetrain::{
    DrivetrainParameters, EngineCurve, GEAR_SLOTS, MAX_FORWARD_GEAR, TorqueScales,
};
use super::suspension::SuspensionParameters;
use super::tire::TireParameters;
use crate::consts::{FRONT_LEFT, FRONT_RIGHT, GRAVITY, NUM_WHEELS, REAR_LEFT, REAR_RIGHT};
use crate::error::{Error, Result};

/// Everything static about one model of car
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CarType {
    pub name: String,
    /// Mass (slugs)
    pub mass: f32,
    /// Principal moments of inertia: roll, pitch, yaw (slug·ft²)
    pub inertia: Vec3,
    pub suspension: [SuspensionParameters; NUM_WHEELS],
    /// Anti-roll bar rates (lb/ft)
    pub front_anti_roll: f32,
    pub rear_anti_roll: f32,
    /// Quadratic drag coefficient (lb per (ft/s)²)
    pub drag: f32,
    /// Rolling resistance (lb)
    pub rolling_resistance: f32,
    /// Extra linear drag on loose ground (lb per ft/s)
    pub dirt_drag: f32,
    pub tires: [TireParameters; NUM_WHEELS],
    /// Wheel hub positions relative to the center of mass (body frame, ft)
    pub wheel_offsets: [Vec3; NUM_WHEELS],
    /// Fraction of brake torque on the front axle
    pub brake_balance: f32,
    /// Total brake torque at full pedal (ft·lb)
    pub max_brake_torque: f32,
    pub drivetrain: DrivetrainParameters,
    /// Multiplier on the human anti-spin gains
    pub antispin_scale: f32,
}

impl CarType {
    pub fn weight(&self) -> f32 {
        self.mass * GRAVITY
    }

    /// Per-wheel static load (lb) from the axle positions
    pub fn static_loads(&self) -> [f32; NUM_WHEELS] {
        let front_x = (self.wheel_offsets[FRONT_LEFT].x + self.wheel_offsets[FRONT_RIGHT].x) * 0.5;
        let rear_x = (self.wheel_offsets[REAR_LEFT].x + self.wheel_offsets[REAR_RIGHT].x) * 0.5;
        let wheelbase = front_x - rear_x;
        let front_share = if wheelbase > 0.0 {
            (-rear_x / wheelbase).clamp(0.0, 1.0)
        } else {
            0.5
        };
        let front = self.weight() * front_share * 0.5;
        let rear = self.weight() * (1.0 - front_share) * 0.5;
        [front, front, rear, rear]
    }

    /// Distance between axles (ft)
    pub fn wheelbase(&self) -> f32 {
        self.wheel_offsets[FRONT_LEFT].x - self.wheel_offsets[REAR_LEFT].x
    }

    /// Front track width (ft)
    pub fn track_width(&self) -> f32 {
        self.wheel_offsets[FRONT_LEFT].y - self.wheel_offsets[FRONT_RIGHT].y
    }

    /// Parse and validate a car type from JSON
    pub fn from_json(json: &str) -> Result<Self> {
        let car: CarType = serde_json::from_str(json)?;
        car.validate()?;
        Ok(car)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Reject definitions the simulation cannot run
    pub fn validate(&self) -> Result<()> {
        for (wheel, tire) in self.tires.iter().enumerate() {
            tire.validate(wheel)?;
        }

        let positive = |v: f32| v.is_finite() && v > 0.0;
        let dt = &self.drivetrain;
        let top = usize::from(dt.top_gear);

        let reason = if !positive(self.mass) {
            "mass must be positive".to_string()
        } else if !(positive(self.inertia.x) && positive(self.inertia.y) && positive(self.inertia.z)) {
            "moments of inertia must be positive".to_string()
        } else if let Some(wheel) = self
            .suspension
            .iter()
            .position(|s| !positive(s.spring_rate))
        {
            format!("spring rate of wheel {wheel} must be positive")
        } else if !self.wheel_offsets.iter().all(|o| o.is_finite()) {
            "wheel offsets must be finite".to_string()
        } else if self.wheelbase() <= 0.0 {
            "front wheels must be ahead of the rear wheels".to_string()
        } else if !(0.0..=1.0).contains(&self.brake_balance) {
            "brake balance must be within 0..=1".to_string()
        } else if !positive(dt.engine_inertia) {
            "engine inertia must be positive".to_string()
        } else if !positive(dt.final_drive) {
            "final drive must be positive".to_string()
        } else if !positive(dt.rpm_per_column) {
            "rpm per column must be positive".to_string()
        } else if dt.top_gear == 0 || dt.top_gear > MAX_FORWARD_GEAR {
            format!("top gear {} outside 1..={MAX_FORWARD_GEAR}", dt.top_gear)
        } else if !(dt.gear_ratios[0] < 0.0) {
            "reverse ratio must be negative".to_string()
        } else if !dt.gear_ratios[2..2 + top].iter().all(|&r| positive(r)) {
            "forward ratios must be positive".to_string()
        } else if !(dt.downshift_rpm < dt.upshift_rpm) {
            "downshift point must be below upshift point".to_string()
        } else {
            return Ok(());
        };

        Err(Error::InvalidCar {
            name: self.name.clone(),
            reason,
        })
    }
}

/// Look up a stock car by (case-insensitive) name
pub fn stock_car(name: &str) -> Result<CarType> {
    stock_cars()
        .into_iter()
        .find(|c| c.name.eq_ignore_ascii_case(name))
        .ok_or_else(|| Error::UnknownCarType(name.to_string()))
}

/// The eight stock cars
pub fn stock_cars() -> Vec<CarType> {
    STOCK.iter().map(CarType::from).collect()
}

/// Compact form of a stock car; axles are symmetric left/right
struct Stock {
    name: &'static str,
    weight: f32,
    inertia: [f32; 3],
    springs: [f32; 2],
    anti_roll: [f32; 2],
    damping: [f32; 2],
    drag: f32,
    rolling_resistance: f32,
    /// (x, half track, hub drop) per axle
    front: [f32; 3],
    rear: [f32; 3],
    brake_balance: f32,
    engine_inertia: f32,
    final_drive: f32,
    clutch_max_torque: f32,
    load_sensing: bool,
    torque_scales: [f32; 4],
    gear_ratios: [f32; GEAR_SLOTS],
    upshift_rpm: f32,
    downshift_rpm: f32,
    antispin_scale: f32,
}

/// Enough to lock any stock wheel at full pedal
const STOCK_MAX_BRAKE_TORQUE: f32 = 12_000.0;
const STOCK_DIRT_DRAG: f32 = 8.0;
/// Fixed part of rolling resistance shared by every car (lb)
const BASE_ROLLING_RESISTANCE: f32 = 30.0;

impl From<&Stock> for CarType {
    fn from(s: &Stock) -> Self {
        let corner = |axle: [f32; 3], left: bool| {
            let y = if left { axle[1] } else { -axle[1] };
            Vec3::new(axle[0], y, -axle[2])
        };
        let suspension = |axle: usize| SuspensionParameters {
            spring_rate: s.springs[axle],
            compression_damping: s.damping[axle],
            rebound_damping: s.damping[axle],
        };
        let [first, second, higher, dirt] = s.torque_scales;

        CarType {
            name: s.name.to_string(),
            mass: s.weight / GRAVITY,
            inertia: Vec3::from(s.inertia),
            suspension: [suspension(0), suspension(0), suspension(1), suspension(1)],
            front_anti_roll: s.anti_roll[0],
            rear_anti_roll: s.anti_roll[1],
            drag: s.drag,
            rolling_resistance: BASE_ROLLING_RESISTANCE + s.rolling_resistance,
            dirt_drag: STOCK_DIRT_DRAG,
            tires: [
                TireParameters::front(),
                TireParameters::front(),
                TireParameters::rear(),
                TireParameters::rear(),
            ],
            wheel_offsets: [
                corner(s.front, true),
                corner(s.front, false),
                corner(s.rear, true),
                corner(s.rear, false),
            ],
            brake_balance: s.brake_balance,
            max_brake_torque: STOCK_MAX_BRAKE_TORQUE,
            drivetrain: DrivetrainParameters {
                engine_inertia: s.engine_inertia,
                final_drive: s.final_drive,
                clutch_max_torque: s.clutch_max_torque,
                gear_ratios: s.gear_ratios,
                top_gear: 4,
                upshift_rpm: s.upshift_rpm,
                downshift_rpm: s.downshift_rpm,
                rpm_per_column: 1000.0,
                curve: EngineCurve::Rush,
                torque_scales: TorqueScales {
                    first,
                    second,
                    higher,
                    dirt,
                },
                load_sensing_differential: s.load_sensing,
            },
            antispin_scale: s.antispin_scale,
        }
    }
}

const STOCK: [Stock; 8] = [
    Stock {
        name: "Rocket",
        weight: 3200.0,
        inertia: [1400.0, 2400.0, 2400.0],
        springs: [4200.0, 2800.0],
        anti_roll: [1200.0, 0.0],
        damping: [550.0, 350.0],
        drag: 0.0082,
        rolling_resistance: 32.0,
        front: [4.2, 2.5, 1.4],
        rear: [-5.2, 2.5, 1.5],
        brake_balance: 0.68,
        engine_inertia: 0.28,
        final_drive: 3.5,
        clutch_max_torque: 850.0,
        load_sensing: false,
        torque_scales: [1.1, 1.05, 1.0, 0.9],
        gear_ratios: [-2.4, 0.0, 1.9, 1.5, 1.2, 1.0],
        upshift_rpm: 5750.0,
        downshift_rpm: 3500.0,
        antispin_scale: 1.0,
    },
    Stock {
        name: "Venom",
        weight: 3400.0,
        inertia: [1500.0, 2500.0, 2500.0],
        springs: [4000.0, 2500.0],
        anti_roll: [1000.0, 0.0],
        damping: [500.0, 300.0],
        drag: 0.0087,
        rolling_resistance: 36.0,
        front: [4.5, 2.75, 1.5],
        rear: [-5.5, 2.75, 1.5],
        brake_balance: 0.65,
        engine_inertia: 0.3,
        final_drive: 3.3,
        clutch_max_torque: 800.0,
        load_sensing: false,
        torque_scales: [1.0, 1.0, 1.0, 1.0],
        gear_ratios: [-2.4, 0.0, 1.8, 1.45, 1.2, 1.0],
        upshift_rpm: 5750.0,
        downshift_rpm: 3500.0,
        antispin_scale: 1.0,
    },
    Stock {
        name: "Crusher",
        weight: 4000.0,
        inertia: [1700.0, 2800.0, 2800.0],
        springs: [3600.0, 2200.0],
        anti_roll: [800.0, 200.0],
        damping: [450.0, 280.0],
        drag: 0.0095,
        rolling_resistance: 40.0,
        front: [4.8, 2.9, 1.6],
        rear: [-5.8, 2.9, 1.6],
        brake_balance: 0.60,
        engine_inertia: 0.35,
        final_drive: 3.0,
        clutch_max_torque: 900.0,
        load_sensing: true,
        torque_scales: [1.15, 1.1, 1.05, 1.0],
        gear_ratios: [-2.2, 0.0, 2.0, 1.6, 1.3, 1.0],
        upshift_rpm: 5500.0,
        downshift_rpm: 3200.0,
        antispin_scale: 1.2,
    },
    Stock {
        name: "Phantom",
        weight: 2800.0,
        inertia: [1200.0, 2100.0, 2100.0],
        springs: [4400.0, 2800.0],
        anti_roll: [1400.0, 0.0],
        damping: [580.0, 380.0],
        drag: 0.0078,
        rolling_resistance: 28.0,
        front: [4.0, 2.4, 1.3],
        rear: [-5.0, 2.4, 1.4],
        brake_balance: 0.70,
        engine_inertia: 0.25,
        final_drive: 3.6,
        clutch_max_torque: 750.0,
        load_sensing: false,
        torque_scales: [0.95, 0.95, 0.95, 0.95],
        gear_ratios: [-2.6, 0.0, 2.0, 1.55, 1.25, 1.0],
        upshift_rpm: 6000.0,
        downshift_rpm: 3800.0,
        antispin_scale: 0.9,
    },
    Stock {
        name: "Wraith",
        weight: 3300.0,
        inertia: [1450.0, 2450.0, 2450.0],
        springs: [4100.0, 2600.0],
        anti_roll: [1100.0, 0.0],
        damping: [520.0, 320.0],
        drag: 0.0085,
        rolling_resistance: 34.0,
        front: [4.4, 2.7, 1.45],
        rear: [-5.4, 2.7, 1.5],
        brake_balance: 0.66,
        engine_inertia: 0.29,
        final_drive: 3.4,
        clutch_max_torque: 820.0,
        load_sensing: false,
        torque_scales: [1.02, 1.0, 1.0, 1.0],
        gear_ratios: [-2.4, 0.0, 1.85, 1.48, 1.22, 1.0],
        upshift_rpm: 5800.0,
        downshift_rpm: 3600.0,
        antispin_scale: 1.0,
    },
    Stock {
        name: "Eliminator",
        weight: 3500.0,
        inertia: [1550.0, 2550.0, 2550.0],
        springs: [4500.0, 3000.0],
        anti_roll: [1500.0, 200.0],
        damping: [600.0, 400.0],
        drag: 0.0080,
        rolling_resistance: 35.0,
        front: [4.3, 2.65, 1.4],
        rear: [-5.3, 2.65, 1.45],
        brake_balance: 0.67,
        engine_inertia: 0.32,
        final_drive: 3.2,
        clutch_max_torque: 880.0,
        load_sensing: true,
        torque_scales: [1.2, 1.15, 1.1, 1.0],
        gear_ratios: [-2.3, 0.0, 1.75, 1.4, 1.15, 0.95],
        upshift_rpm: 6200.0,
        downshift_rpm: 4000.0,
        antispin_scale: 0.8,
    },
    Stock {
        name: "Banshee",
        weight: 3000.0,
        inertia: [1300.0, 2200.0, 2200.0],
        springs: [4600.0, 3000.0],
        anti_roll: [1600.0, 0.0],
        damping: [620.0, 420.0],
        drag: 0.0075,
        rolling_resistance: 30.0,
        front: [4.1, 2.5, 1.35],
        rear: [-5.1, 2.5, 1.4],
        brake_balance: 0.68,
        engine_inertia: 0.26,
        final_drive: 3.7,
        clutch_max_torque: 780.0,
        load_sensing: false,
        torque_scales: [1.0, 1.0, 1.0, 1.0],
        gear_ratios: [-2.5, 0.0, 1.95, 1.52, 1.22, 1.0],
        upshift_rpm: 6100.0,
        downshift_rpm: 3900.0,
        antispin_scale: 0.85,
    },
    Stock {
        name: "Secret",
        weight: 3100.0,
        inertia: [1350.0, 2300.0, 2300.0],
        springs: [4300.0, 2900.0],
        anti_roll: [1300.0, 100.0],
        damping: [560.0, 360.0],
        drag: 0.0076,
        rolling_resistance: 31.0,
        front: [4.25, 2.55, 1.38],
        rear: [-5.25, 2.55, 1.42],
        brake_balance: 0.67,
        engine_inertia: 0.28,
        final_drive: 3.55,
        clutch_max_torque: 830.0,
        load_sensing: true,
        torque_scales: [1.15, 1.1, 1.05, 1.0],
        gear_ratios: [-2.35, 0.0, 1.82, 1.46, 1.18, 0.98],
        upshift_rpm: 6000.0,
        downshift_rpm: 3700.0,
        antispin_scale: 0.9,
    },
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stock_cars_validate() {
        let cars = stock_cars();
        assert_eq!(cars.len(), 8);
        for car in &cars {
            car.validate().unwrap();
        }
    }

    #[test]
    fn test_static_loads_sum_to_weight() {
        let car = stock_car("venom").unwrap();
        let loads = car.static_loads();
        let total: f32 = loads.iter().sum();
        assert!((total - 3400.0).abs() < 0.1);
        // CG sits nearer the front axle
        assert!(loads[FRONT_LEFT] > loads[REAR_LEFT]);
        assert_eq!(loads[FRONT_LEFT], loads[FRONT_RIGHT]);
        assert!((car.wheelbase() - 10.0).abs() < 1e-5);
        assert!((car.track_width() - 5.5).abs() < 1e-5);
    }

    #[test]
    fn test_wheel_layout_is_left_positive() {
        let car = stock_car("Rocket").unwrap();
        assert!(car.wheel_offsets[FRONT_LEFT].y > 0.0);
        assert!(car.wheel_offsets[FRONT_RIGHT].y < 0.0);
        assert!(car.wheel_offsets[REAR_LEFT].x < 0.0);
        assert!(car.wheel_offsets[REAR_RIGHT].z < 0.0);
    }

    #[test]
    fn test_unknown_stock_car() {
        assert!(matches!(
            stock_car("Pinto"),
            Err(Error::UnknownCarType(name)) if name == "Pinto"
        ));
    }

    #[test]
    fn test_json_round_trip_validates() {
        let car = stock_car("Crusher").unwrap();
        let json = car.to_json().unwrap();
        let back = CarType::from_json(&json).unwrap();
        assert_eq!(back, car);

        let mut broken = car.clone();
        broken.drivetrain.top_gear = 7;
        let json = broken.to_json().unwrap();
        assert!(matches!(
            CarType::from_json(&json),
            Err(Error::InvalidCar { .. })
        ));
    }

    #[test]
    fn test_bad_tire_rejected() {
        let mut car = stock_car("Banshee").unwrap();
        car.tires[REAR_RIGHT].max_friction = 0.0;
        assert!(matches!(
            car.validate(),
            Err(Error::InvalidTire { wheel: 3, .. })
        ));
    }
}
