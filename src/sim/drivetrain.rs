//! Engine, clutch, transmission and differential
//!
//! Rear-wheel drive. Each tick the drivetrain reads the rear wheel speeds
//! from the previous tick, resolves clutch slip between the engine and the
//! driveshaft, and hands a torque to each driven wheel along with the
//! inverse inertia those wheels should spin against.

use serde::{Deserialize, Serialize};

use super::surface::SurfaceCode;
use super::torque::{
    DIRT_CURVE, EngineSwitches, Gauges, RUSH_CURVE, STANDARD_CURVE, TorqueCurveTable,
};
use crate::consts::{NUM_WHEELS, RDPS_TO_RPM, REAR_LEFT, REAR_RIGHT, RPM_TO_RDPS};

/// Gear ratio slots: reverse, neutral, then forward gears
pub const GEAR_SLOTS: usize = 6;
/// Highest forward gear a ratio array can hold
pub const MAX_FORWARD_GEAR: u8 = (GEAR_SLOTS - 2) as u8;

/// Torque converter loss of the automatic when not in top gear
pub const AUTO_TRANS_LOSS: f32 = 0.925;
/// Manual clutch pedal position where the plates stop touching
pub const CLUTCH_FRICTION_POINT: f32 = 0.8;
/// Centrifugal clutch starts to bite (RPM)
pub const CLUTCH_MIN_RPM: f32 = 1500.0;
/// Centrifugal clutch fully engaged (RPM)
pub const CLUTCH_MAX_RPM: f32 = 3000.0;
/// Engine this far (RPM) below the driveshaft gets the full clutch
pub const CLUTCH_SLIP_DELTA: f32 = 100.0;
/// Engine/clutch mismatch (RPM) reported as a slipping clutch
pub const CLUTCH_SLIP_REPORT_RPM: f32 = 50.0;
/// Minimum time between two gear changes (s)
pub const SHIFT_INTERVAL: f32 = 1.0;
/// Speed (ft/s) above which loose ground selects the dirt curve
pub const DIRT_CURVE_SPEED: f32 = 40.0;
/// Rear axle load (lb) required before the load-sensing split engages
pub const DIFF_LOAD_THRESHOLD: f32 = 500.0;
/// Engine speed at spawn (RPM)
pub const SPAWN_RPM: f32 = 1000.0;

/// Selected gear
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Gear {
    Reverse,
    #[default]
    Neutral,
    Forward(u8),
}

impl Gear {
    /// Signed gear number: -1 reverse, 0 neutral, 1.. forward
    pub fn number(self) -> i32 {
        match self {
            Gear::Reverse => -1,
            Gear::Neutral => 0,
            Gear::Forward(n) => i32::from(n),
        }
    }

    /// Inverse of [`Gear::number`], clamped to `[-1, top]`
    pub fn from_number(number: i32, top: u8) -> Gear {
        match number {
            n if n < 0 => Gear::Reverse,
            0 => Gear::Neutral,
            n => Gear::Forward(n.min(i32::from(top)) as u8),
        }
    }

    /// Index into a ratio array
    pub fn slot(self) -> usize {
        (self.number() + 1).clamp(0, GEAR_SLOTS as i32 - 1) as usize
    }

    pub fn is_forward(self) -> bool {
        matches!(self, Gear::Forward(_))
    }

    /// Next gear up, R → N → 1 → .. → top
    pub fn up(self, top: u8) -> Gear {
        Gear::from_number(self.number() + 1, top)
    }

    /// Next gear down, top → .. → 1 → N → R
    pub fn down(self, top: u8) -> Gear {
        Gear::from_number(self.number() - 1, top)
    }
}

/// Gear request sampled from the controls each tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum GearCommand {
    #[default]
    Hold,
    ShiftUp,
    ShiftDown,
    Select(Gear),
}

/// Transmission type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Transmission {
    #[default]
    Automatic,
    Manual,
}

/// Which stock table the engine uses on pavement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EngineCurve {
    Standard,
    #[default]
    Rush,
}

impl EngineCurve {
    pub fn table(self) -> &'static TorqueCurveTable {
        match self {
            EngineCurve::Standard => &STANDARD_CURVE,
            EngineCurve::Rush => &RUSH_CURVE,
        }
    }
}

/// Which torque curve applies this tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CurveSelection {
    Pavement,
    Dirt,
}

impl CurveSelection {
    /// Dirt when both driven wheels are on dirt above `DIRT_CURVE_SPEED`
    pub fn select(rear_surfaces: [SurfaceCode; 2], speed: f32) -> Self {
        if rear_surfaces.iter().all(|&s| s == SurfaceCode::Dirt) && speed > DIRT_CURVE_SPEED {
            CurveSelection::Dirt
        } else {
            CurveSelection::Pavement
        }
    }
}

/// Engine torque multipliers
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TorqueScales {
    pub first: f32,
    pub second: f32,
    /// Third gear and above (also reverse)
    pub higher: f32,
    pub dirt: f32,
}

impl TorqueScales {
    fn for_gear(&self, gear: Gear) -> f32 {
        match gear {
            Gear::Forward(1) => self.first,
            Gear::Forward(2) => self.second,
            _ => self.higher,
        }
    }
}

/// Clutch condition after the last update
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ClutchState {
    /// Neutral: engine and driveshaft are not connected
    #[default]
    Disengaged,
    Slipping,
    Locked,
}

/// Static drivetrain description
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrivetrainParameters {
    /// Flywheel moment of inertia (slug·ft²)
    pub engine_inertia: f32,
    /// Final drive ratio
    pub final_drive: f32,
    /// Clutch torque capacity (ft·lb)
    pub clutch_max_torque: f32,
    /// Ratios for R, N, 1, 2, ...
    pub gear_ratios: [f32; GEAR_SLOTS],
    pub top_gear: u8,
    /// Automatic upshift engine speed (RPM) at zero throttle
    pub upshift_rpm: f32,
    /// Automatic downshift engine speed (RPM) at zero throttle
    pub downshift_rpm: f32,
    /// RPM between torque table columns
    pub rpm_per_column: f32,
    pub curve: EngineCurve,
    pub torque_scales: TorqueScales,
    /// Split torque by rear wheel load instead of 50/50
    pub load_sensing_differential: bool,
}

impl DrivetrainParameters {
    fn ratio(&self, gear: Gear) -> f32 {
        self.gear_ratios[gear.slot()]
    }

    fn top(&self) -> u8 {
        self.top_gear.clamp(1, MAX_FORWARD_GEAR)
    }
}

/// Per-tick inputs
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrivetrainInput {
    /// Throttle 0..=1
    pub throttle: f32,
    /// Clutch pedal 0 (released) ..= 1 (floored), manual only
    pub clutch_pedal: f32,
    pub switches: EngineSwitches,
    /// Rear wheel spin rates from the previous tick (rad/s)
    pub rear_wheel_angvel: [f32; 2],
    /// Normal load per wheel (lb, + pushing into the ground)
    pub wheel_loads: [f32; NUM_WHEELS],
    pub rear_surfaces: [SurfaceCode; 2],
    /// Body speed magnitude (ft/s)
    pub speed: f32,
    pub dt: f32,
}

/// Drivetrain state for one car
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Drivetrain {
    pub transmission: Transmission,
    pub gear: Gear,
    pub command_gear: Gear,
    /// Ratio of the current gear
    pub trans_ratio: f32,
    /// Gear ratio × final drive, recomputed every tick
    pub total_ratio: f32,

    pub engine_angvel: f32,
    pub engine_torque: f32,
    /// Engine-side speed of the driveshaft
    pub clutch_angvel: f32,
    pub clutch_torque: f32,
    /// Clutch torque capacity this tick
    pub clutch_capacity: f32,
    pub clutch_state: ClutchState,

    /// Average rear wheel speed
    pub driveshaft_angvel: f32,
    pub driveshaft_torque: f32,
    /// Inverse inertia of the bare driveshaft (both rear wheels)
    pub driveshaft_inverse_inertia: f32,
    /// Inverse inertia of the driveshaft including a locked engine
    pub effective_inverse_inertia: f32,

    /// Output torque per wheel (front entries stay zero)
    pub wheel_torque: [f32; NUM_WHEELS],
    /// Loads the differential split was based on
    pub wheel_loads: [f32; NUM_WHEELS],

    pub throttle: f32,
    /// Time before which no shift is allowed
    pub shift_time: f32,
    pub clock: f32,
    pub gauges: Gauges,
}

impl Drivetrain {
    /// Engine idling, first gear selected
    pub fn new(transmission: Transmission, rear_inverse_inertia: f32) -> Self {
        let driveshaft_inverse_inertia = rear_inverse_inertia * 0.5;
        Self {
            transmission,
            gear: Gear::Forward(1),
            command_gear: Gear::Forward(1),
            trans_ratio: 0.0,
            total_ratio: 0.0,
            engine_angvel: SPAWN_RPM * RPM_TO_RDPS,
            engine_torque: 0.0,
            clutch_angvel: 0.0,
            clutch_torque: 0.0,
            clutch_capacity: 0.0,
            clutch_state: ClutchState::Disengaged,
            driveshaft_angvel: 0.0,
            driveshaft_torque: 0.0,
            driveshaft_inverse_inertia,
            effective_inverse_inertia: driveshaft_inverse_inertia,
            wheel_torque: [0.0; NUM_WHEELS],
            wheel_loads: [0.0; NUM_WHEELS],
            throttle: 0.0,
            shift_time: 0.0,
            clock: 0.0,
            gauges: Gauges::default(),
        }
    }

    /// Back to spawn conditions, keeping transmission type and inertia
    pub fn reset(&mut self) {
        *self = Self::new(self.transmission, self.driveshaft_inverse_inertia * 2.0);
    }

    pub fn engine_rpm(&self) -> f32 {
        self.engine_angvel * RDPS_TO_RPM
    }

    /// Driveshaft (average rear wheel) speed in RPM
    pub fn wheel_rpm(&self) -> f32 {
        self.driveshaft_angvel * RDPS_TO_RPM
    }

    pub fn is_clutch_slipping(&self) -> bool {
        if self.gear == Gear::Neutral {
            return false;
        }
        (self.engine_angvel - self.clutch_angvel).abs() > CLUTCH_SLIP_REPORT_RPM * RPM_TO_RDPS
    }

    /// Inverse inertia each driven wheel spins against
    pub fn wheel_inverse_inertia(&self) -> f32 {
        self.effective_inverse_inertia * 2.0
    }

    /// Apply this tick's gear request
    pub fn command(&mut self, params: &DrivetrainParameters, command: GearCommand) {
        let top = params.top();
        match (self.transmission, command) {
            (_, GearCommand::Hold) => {}
            (Transmission::Manual, GearCommand::Select(gear)) => {
                let gear = Gear::from_number(gear.number(), top);
                self.command_gear = gear;
                self.gear = gear;
            }
            (Transmission::Manual, GearCommand::ShiftUp) => {
                self.command_gear = self.gear.up(top);
                if self.command_gear != self.gear && self.clock > self.shift_time {
                    self.shift_to(self.command_gear);
                }
            }
            (Transmission::Manual, GearCommand::ShiftDown) => {
                self.command_gear = self.gear.down(top);
                if self.command_gear != self.gear && self.clock > self.shift_time {
                    self.shift_to(self.command_gear);
                }
            }
            (Transmission::Automatic, GearCommand::Select(gear)) => {
                self.command_gear = match gear {
                    Gear::Forward(_) => Gear::Forward(1),
                    other => other,
                };
            }
            // The automatic's lever: R ↔ N ↔ Drive
            (Transmission::Automatic, GearCommand::ShiftUp) => {
                self.command_gear = match self.command_gear {
                    Gear::Reverse => Gear::Neutral,
                    _ => Gear::Forward(1),
                };
            }
            (Transmission::Automatic, GearCommand::ShiftDown) => {
                self.command_gear = match self.command_gear {
                    Gear::Forward(_) => Gear::Neutral,
                    _ => Gear::Reverse,
                };
            }
        }
    }

    fn shift_to(&mut self, gear: Gear) {
        self.shift_time = self.clock + SHIFT_INTERVAL;
        self.gear = gear;
    }

    /// Run one tick; returns the torque for each wheel
    pub fn update(
        &mut self,
        params: &DrivetrainParameters,
        input: &DrivetrainInput,
    ) -> [f32; NUM_WHEELS] {
        self.throttle = if input.throttle.is_finite() {
            input.throttle.clamp(0.0, 1.0)
        } else {
            0.0
        };
        let [left, right] = input.rear_wheel_angvel;
        self.driveshaft_angvel = (left + right) * 0.5;
        self.wheel_loads = input.wheel_loads;

        if self.transmission == Transmission::Automatic {
            self.autoshift(params);
        }
        self.engine(params, input);
        self.trans_ratio = params.ratio(self.gear);
        self.total_ratio = self.trans_ratio * params.final_drive;
        self.clutch(params, input);

        let (l, r) = split_torque(
            self.driveshaft_torque,
            input.wheel_loads[REAR_LEFT],
            input.wheel_loads[REAR_RIGHT],
            params.load_sensing_differential,
        );
        self.wheel_torque = [0.0; NUM_WHEELS];
        self.wheel_torque[REAR_LEFT] = l;
        self.wheel_torque[REAR_RIGHT] = r;

        self.clock += input.dt;
        self.wheel_torque
    }

    fn autoshift(&mut self, params: &DrivetrainParameters) {
        let fact = (3.0 + self.throttle) * 0.25;
        let upshift = params.upshift_rpm * RPM_TO_RDPS * fact;
        let downshift = params.downshift_rpm * RPM_TO_RDPS * fact;
        let top = params.top();

        match self.command_gear {
            Gear::Neutral | Gear::Reverse => self.gear = self.command_gear,
            Gear::Forward(_) => {
                if !self.gear.is_forward() {
                    self.gear = self.best_gear(params, upshift);
                }
                if self.engine_angvel > upshift {
                    if let Gear::Forward(n) = self.gear {
                        if n < top && self.clock > self.shift_time {
                            self.shift_to(Gear::Forward(n + 1));
                        }
                    }
                }
                if self.engine_angvel < downshift {
                    if let Gear::Forward(n) = self.gear {
                        if n > 1 && self.clock > self.shift_time {
                            self.shift_to(Gear::Forward(n - 1));
                        }
                    }
                }
            }
        }
    }

    /// Lowest gear whose engine-side speed stays under the upshift point
    fn best_gear(&self, params: &DrivetrainParameters, upshift: f32) -> Gear {
        let top = params.top();
        (1..top)
            .map(Gear::Forward)
            .find(|&g| self.driveshaft_angvel * params.final_drive * params.ratio(g) < upshift)
            .unwrap_or(Gear::Forward(top))
    }

    fn engine(&mut self, params: &DrivetrainParameters, input: &DrivetrainInput) {
        let rpm = self.engine_rpm();
        let (table, scale) = match CurveSelection::select(input.rear_surfaces, input.speed) {
            CurveSelection::Dirt => (&DIRT_CURVE, params.torque_scales.dirt),
            CurveSelection::Pavement => (
                params.curve.table(),
                params.torque_scales.for_gear(self.gear),
            ),
        };

        self.engine_torque =
            scale * table.engine_torque(self.throttle, rpm, params.rpm_per_column, input.switches);
        if self.transmission == Transmission::Automatic && self.gear != Gear::Forward(params.top()) {
            self.engine_torque *= AUTO_TRANS_LOSS;
        }
        self.gauges = self.gauges.next(rpm, input.switches.starter, self.clock);
    }

    fn clutch_capacity(&self, params: &DrivetrainParameters, pedal: f32) -> f32 {
        let max = params.clutch_max_torque;
        let capacity = match self.transmission {
            Transmission::Automatic => {
                if self.engine_angvel < self.clutch_angvel - CLUTCH_SLIP_DELTA * RPM_TO_RDPS {
                    // Engine being dragged: the clutch holds fully
                    max
                } else {
                    let centrifugal = self.engine_angvel - self.clutch_angvel * 0.25;
                    let min = CLUTCH_MIN_RPM * RPM_TO_RDPS;
                    let full = CLUTCH_MAX_RPM * RPM_TO_RDPS;
                    if centrifugal < min {
                        0.0
                    } else if centrifugal > full {
                        max
                    } else {
                        max * (centrifugal - min) / (full - min)
                    }
                }
            }
            Transmission::Manual => {
                if pedal < 0.0 {
                    max
                } else if pedal > CLUTCH_FRICTION_POINT {
                    0.0
                } else {
                    (CLUTCH_FRICTION_POINT - pedal) / CLUTCH_FRICTION_POINT * max
                }
            }
        };
        capacity.max(0.0)
    }

    fn clutch(&mut self, params: &DrivetrainParameters, input: &DrivetrainInput) {
        let dt = input.dt;
        let engine_inv = 1.0 / params.engine_inertia;

        if self.gear == Gear::Neutral {
            self.clutch_torque = 0.0;
            self.clutch_capacity = 0.0;
            self.driveshaft_torque = 0.0;
            self.clutch_angvel = self.engine_angvel;
            self.engine_angvel += self.engine_torque * engine_inv * dt;
            self.effective_inverse_inertia = self.driveshaft_inverse_inertia;
            self.clutch_state = ClutchState::Disengaged;
            return;
        }

        self.clutch_angvel = self.driveshaft_angvel * self.total_ratio;
        let capacity = self.clutch_capacity(params, input.clutch_pedal);
        self.clutch_capacity = capacity;

        let locked_inv = 1.0
            / (1.0 / self.driveshaft_inverse_inertia
                + self.total_ratio * self.total_ratio / engine_inv);
        let start = self.engine_angvel;
        let torque = self.engine_torque;
        let integrate = |clutch_torque: f32| start + (torque - clutch_torque) * engine_inv * dt;

        // Engine ahead of the driveshaft drives it; behind, it gets dragged.
        // Crossing over means either lock-up or slip the other way.
        let ahead = start > self.clutch_angvel;
        let (drive, reverse) = if ahead {
            (capacity, -capacity)
        } else {
            (-capacity, capacity)
        };
        self.clutch_torque = drive;
        self.engine_angvel = integrate(drive);

        let crossed = if ahead {
            self.engine_angvel < self.clutch_angvel
        } else {
            self.engine_angvel > self.clutch_angvel
        };
        let overpowers = if ahead {
            torque < reverse
        } else {
            torque > reverse
        };

        if !crossed {
            self.clutch_state = ClutchState::Slipping;
            self.effective_inverse_inertia = self.driveshaft_inverse_inertia;
        } else if overpowers {
            self.clutch_torque = reverse;
            self.engine_angvel = integrate(reverse);
            self.clutch_state = ClutchState::Slipping;
            self.effective_inverse_inertia = self.driveshaft_inverse_inertia;
        } else {
            self.engine_angvel = self.clutch_angvel;
            self.clutch_torque = torque;
            self.clutch_state = ClutchState::Locked;
            self.effective_inverse_inertia = locked_inv;
        }

        self.driveshaft_torque = self.clutch_torque * self.total_ratio;
    }
}

/// Split driveshaft torque between the rear wheels
///
/// 50/50 unless the load-sensing differential is fitted and the rear axle
/// carries at least `DIFF_LOAD_THRESHOLD`; then torque follows load, all of
/// it going to one wheel when the other is unloaded.
pub fn split_torque(total: f32, left_load: f32, right_load: f32, load_sensing: bool) -> (f32, f32) {
    let rear = left_load + right_load;
    if !load_sensing || !(rear >= DIFF_LOAD_THRESHOLD) {
        let half = total * 0.5;
        return (half, total - half);
    }
    if left_load <= 0.0 {
        (0.0, total)
    } else if right_load <= 0.0 {
        (total, 0.0)
    } else {
        let left = total * left_load / rear;
        (left, total - left)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::SIM_DT;

    fn params() -> DrivetrainParameters {
        DrivetrainParameters {
            engine_inertia: 0.3,
            final_drive: 3.3,
            clutch_max_torque: 800.0,
            gear_ratios: [-2.4, 0.0, 1.8, 1.45, 1.2, 1.0],
            top_gear: 4,
            upshift_rpm: 5750.0,
            downshift_rpm: 3500.0,
            rpm_per_column: 1000.0,
            curve: EngineCurve::Rush,
            torque_scales: TorqueScales {
                first: 1.0,
                second: 1.0,
                higher: 1.0,
                dirt: 1.0,
            },
            load_sensing_differential: false,
        }
    }

    fn input(throttle: f32, wheel_angvel: f32) -> DrivetrainInput {
        DrivetrainInput {
            throttle,
            clutch_pedal: 0.0,
            switches: EngineSwitches::default(),
            rear_wheel_angvel: [wheel_angvel; 2],
            wheel_loads: [800.0; NUM_WHEELS],
            rear_surfaces: [SurfaceCode::Pavement; 2],
            speed: wheel_angvel,
            dt: SIM_DT,
        }
    }

    #[test]
    fn test_gear_traversal() {
        assert_eq!(Gear::Reverse.up(4), Gear::Neutral);
        assert_eq!(Gear::Neutral.up(4), Gear::Forward(1));
        assert_eq!(Gear::Forward(4).up(4), Gear::Forward(4));
        assert_eq!(Gear::Forward(1).down(4), Gear::Neutral);
        assert_eq!(Gear::Reverse.down(4), Gear::Reverse);
        assert_eq!(Gear::Reverse.slot(), 0);
        assert_eq!(Gear::Forward(4).slot(), 5);
        assert_eq!(Gear::Forward(9).slot(), GEAR_SLOTS - 1);
        assert_eq!(Gear::default(), Gear::Neutral);
    }

    #[test]
    fn test_neutral_disconnects() {
        let p = params();
        let mut dt = Drivetrain::new(Transmission::Manual, 0.1);
        dt.command(&p, GearCommand::Select(Gear::Neutral));
        let before = dt.engine_angvel;
        let torque = dt.update(&p, &input(1.0, 0.0));
        assert_eq!(torque, [0.0; NUM_WHEELS]);
        assert_eq!(dt.clutch_state, ClutchState::Disengaged);
        assert!(dt.engine_angvel > before);
        assert!(!dt.is_clutch_slipping());
    }

    #[test]
    fn test_centrifugal_clutch_open_at_idle() {
        let p = params();
        let mut dt = Drivetrain::new(Transmission::Automatic, 0.1);
        dt.update(&p, &input(0.0, 0.0));
        assert_eq!(dt.clutch_capacity, 0.0);
        assert_eq!(dt.driveshaft_torque, 0.0);
    }

    #[test]
    fn test_centrifugal_clutch_ramps() {
        let p = params();
        let mut dt = Drivetrain::new(Transmission::Automatic, 0.1);
        dt.clutch_angvel = 0.0;
        dt.engine_angvel = 2250.0 * RPM_TO_RDPS;
        assert!((dt.clutch_capacity(&p, 0.0) - 400.0).abs() < 1e-2);
        dt.engine_angvel = 3500.0 * RPM_TO_RDPS;
        assert_eq!(dt.clutch_capacity(&p, 0.0), 800.0);
    }

    #[test]
    fn test_manual_pedal_friction_point() {
        let p = params();
        let dt = Drivetrain::new(Transmission::Manual, 0.1);
        assert_eq!(dt.clutch_capacity(&p, 0.0), 800.0);
        assert!((dt.clutch_capacity(&p, 0.4) - 400.0).abs() < 1e-3);
        assert_eq!(dt.clutch_capacity(&p, 0.9), 0.0);
    }

    #[test]
    fn test_lockup_matches_speeds() {
        let p = params();
        let mut dt = Drivetrain::new(Transmission::Manual, 0.1);
        dt.command(&p, GearCommand::Select(Gear::Forward(2)));
        // Engine already turning with the wheels at cruise
        let wheel = 60.0;
        dt.engine_angvel = wheel * 1.45 * 3.3;
        dt.update(&p, &input(0.3, wheel));
        assert_eq!(dt.clutch_state, ClutchState::Locked);
        assert_eq!(dt.engine_angvel, dt.clutch_angvel);
        assert_eq!(dt.clutch_torque, dt.engine_torque);
        assert!(dt.wheel_inverse_inertia() < 0.1);
    }

    #[test]
    fn test_clutch_slips_when_engine_far_ahead() {
        let p = params();
        let mut dt = Drivetrain::new(Transmission::Manual, 0.1);
        dt.engine_angvel = 5000.0 * RPM_TO_RDPS;
        let torque = dt.update(&p, &input(1.0, 0.0));
        assert_eq!(dt.clutch_state, ClutchState::Slipping);
        assert!(dt.is_clutch_slipping());
        let expected = 800.0 * 1.8 * 3.3;
        assert!((torque[REAR_LEFT] + torque[REAR_RIGHT] - expected).abs() < 1e-2);
        assert_eq!(torque[0], 0.0);
        assert_eq!(dt.wheel_inverse_inertia(), 0.1);
    }

    #[test]
    fn test_autoshift_up_then_hold() {
        let p = params();
        let mut dt = Drivetrain::new(Transmission::Automatic, 0.1);
        dt.clock = 2.0;
        dt.engine_angvel = 7000.0 * RPM_TO_RDPS;
        dt.update(&p, &input(1.0, 7000.0 * RPM_TO_RDPS / (1.8 * 3.3)));
        assert_eq!(dt.gear, Gear::Forward(2));
        // Engine bogs right after; the shift timer blocks the downshift
        dt.engine_angvel = 1000.0 * RPM_TO_RDPS;
        dt.update(&p, &input(1.0, 10.0));
        assert_eq!(dt.gear, Gear::Forward(2));
    }

    #[test]
    fn test_best_gear_from_neutral() {
        let p = params();
        let mut dt = Drivetrain::new(Transmission::Automatic, 0.1);
        dt.command(&p, GearCommand::Select(Gear::Neutral));
        dt.update(&p, &input(0.0, 0.0));
        assert_eq!(dt.gear, Gear::Neutral);

        dt.command(&p, GearCommand::ShiftUp);
        assert_eq!(dt.command_gear, Gear::Forward(1));
        // Rolling fast enough that first would be past the upshift point
        let wheel = 90.0;
        dt.engine_angvel = wheel * 1.45 * 3.3;
        dt.update(&p, &input(0.0, wheel));
        assert_eq!(dt.gear, Gear::Forward(2));
    }

    #[test]
    fn test_manual_shift_respects_timer() {
        let p = params();
        let mut dt = Drivetrain::new(Transmission::Manual, 0.1);
        dt.clock = 5.0;
        dt.command(&p, GearCommand::ShiftUp);
        assert_eq!(dt.gear, Gear::Forward(2));
        dt.command(&p, GearCommand::ShiftUp);
        assert_eq!(dt.gear, Gear::Forward(2));
        dt.clock = 6.5;
        dt.command(&p, GearCommand::ShiftDown);
        assert_eq!(dt.gear, Gear::Forward(1));
    }

    #[test]
    fn test_auto_loss_outside_top_gear() {
        let p = params();
        let mut auto = Drivetrain::new(Transmission::Automatic, 0.1);
        let mut manual = Drivetrain::new(Transmission::Manual, 0.1);
        auto.engine_angvel = 3000.0 * RPM_TO_RDPS;
        manual.engine_angvel = 3000.0 * RPM_TO_RDPS;
        auto.engine(&p, &input(1.0, 0.0));
        manual.engine(&p, &input(1.0, 0.0));
        assert!((auto.engine_torque - manual.engine_torque * AUTO_TRANS_LOSS).abs() < 1e-3);
    }

    #[test]
    fn test_dirt_curve_selection() {
        let dirt = [SurfaceCode::Dirt, SurfaceCode::Dirt];
        assert_eq!(CurveSelection::select(dirt, 50.0), CurveSelection::Dirt);
        assert_eq!(CurveSelection::select(dirt, 30.0), CurveSelection::Pavement);
        // Other loose ground keeps the pavement curve
        let grass = [SurfaceCode::Dirt, SurfaceCode::Grass];
        assert_eq!(CurveSelection::select(grass, 50.0), CurveSelection::Pavement);
        let sand = [SurfaceCode::Sand, SurfaceCode::Sand];
        assert_eq!(CurveSelection::select(sand, 80.0), CurveSelection::Pavement);
        let mixed = [SurfaceCode::Dirt, SurfaceCode::Pavement];
        assert_eq!(CurveSelection::select(mixed, 80.0), CurveSelection::Pavement);
    }

    #[test]
    fn test_differential_split() {
        assert_eq!(split_torque(100.0, 800.0, 200.0, false), (50.0, 50.0));
        assert_eq!(split_torque(100.0, 800.0, 200.0, true), (80.0, 20.0));
        assert_eq!(split_torque(100.0, 0.0, 900.0, true), (0.0, 100.0));
        assert_eq!(split_torque(100.0, 900.0, 0.0, true), (100.0, 0.0));
        // Lightly loaded axle falls back to 50/50
        assert_eq!(split_torque(100.0, 100.0, 100.0, true), (50.0, 50.0));
        assert_eq!(split_torque(100.0, f32::NAN, 100.0, true), (50.0, 50.0));
    }
}
