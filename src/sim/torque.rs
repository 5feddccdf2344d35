//! Engine torque curves
//!
//! A torque curve is a fixed grid of 10 throttle rows by 12 RPM columns.
//! Row 0 is closed throttle, row 9 wide open; column `c` sits at
//! `c * rpm_per_column` RPM. Column 0 of every row doubles as the starter
//! torque and the last entry of row 0 as the over-run friction used when the
//! engine turns backwards.

use serde::{Deserialize, Serialize};

/// Throttle rows in a torque table
pub const THROTTLE_ROWS: usize = 10;
/// RPM columns in a torque table
pub const RPM_COLUMNS: usize = 12;

/// Below this RPM the engine is stalling and the table is not consulted
pub const STALL_RPM: f32 = 500.0;
/// Reverse rotation range over which over-run friction ramps in
pub const REVERSE_RPM: f32 = 1000.0;
/// Torque returned when the crank spins backwards faster than `REVERSE_RPM`
pub const REVERSE_RUNAWAY_TORQUE: f32 = 70.0;
/// The starter motor only helps below this RPM
pub const STARTER_CUTOUT_RPM: f32 = 1000.0;

/// Ignition and starter switches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineSwitches {
    pub ignition: bool,
    pub starter: bool,
}

impl Default for EngineSwitches {
    fn default() -> Self {
        Self {
            ignition: true,
            starter: false,
        }
    }
}

/// Throttle × RPM torque grid (ft·lb, before per-gear scaling)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TorqueCurveTable {
    rows: [[i16; RPM_COLUMNS]; THROTTLE_ROWS],
}

impl TorqueCurveTable {
    pub const fn new(rows: [[i16; RPM_COLUMNS]; THROTTLE_ROWS]) -> Self {
        Self { rows }
    }

    /// Raw grid entry (indices clamped to the grid)
    pub fn entry(&self, row: usize, column: usize) -> i16 {
        self.rows[row.min(THROTTLE_ROWS - 1)][column.min(RPM_COLUMNS - 1)]
    }

    /// Starter torque (row 0, column 0)
    fn starter_torque(&self) -> f32 {
        f32::from(self.rows[0][0])
    }

    /// Over-run friction (row 0, last column)
    fn overrun_torque(&self) -> f32 {
        f32::from(self.rows[0][RPM_COLUMNS - 1])
    }

    /// Torque with the engine running and the starter disengaged
    ///
    /// Bilinear: interpolate along RPM within the two bracketing throttle
    /// rows, then between the rows along throttle. Above the last column the
    /// last RPM segment is extrapolated (over-rev drag keeps growing). Below
    /// `STALL_RPM` the stall rules apply instead of the grid.
    pub fn lookup(&self, throttle: f32, rpm: f32, rpm_per_column: f32) -> f32 {
        if rpm < STALL_RPM {
            return self.stall_torque(rpm);
        }

        let throttle = if throttle.is_finite() {
            throttle.clamp(0.0, 1.0)
        } else {
            0.0
        };
        let rpm_per_column = if rpm_per_column > 1.0 {
            rpm_per_column
        } else {
            1.0
        };

        let row_pos = throttle * (THROTTLE_ROWS - 1) as f32;
        let row = (row_pos as usize).min(THROTTLE_ROWS - 2);
        let tf = row_pos - row as f32;

        let col_pos = rpm / rpm_per_column;
        let col = (col_pos as usize).min(RPM_COLUMNS - 2);
        let rf = col_pos - col as f32;

        let low = self.along_rpm(row, col, rf);
        let high = self.along_rpm(row + 1, col, rf);
        lerp(low, high, tf)
    }

    /// Full engine torque including ignition and starter behavior
    pub fn engine_torque(
        &self,
        throttle: f32,
        rpm: f32,
        rpm_per_column: f32,
        switches: EngineSwitches,
    ) -> f32 {
        if rpm < STALL_RPM {
            let stall = self.stall_torque(rpm);
            if !switches.starter {
                return stall;
            }
            if rpm >= 0.0 {
                return self.starter_torque();
            }
            if rpm >= -REVERSE_RPM {
                return self.starter_torque() + stall;
            }
            return stall;
        }

        if !switches.ignition {
            return -self.starter_torque();
        }

        if switches.starter && rpm < STARTER_CUTOUT_RPM {
            return self.starter_torque();
        }

        self.lookup(throttle, rpm, rpm_per_column)
    }

    /// Near-stall and reverse-rotation torque
    fn stall_torque(&self, rpm: f32) -> f32 {
        if rpm >= 0.0 {
            // Compression drag ramps in as the crank slows toward a stall
            -self.starter_torque() * rpm / STALL_RPM
        } else if rpm >= -REVERSE_RPM {
            self.overrun_torque() * rpm / REVERSE_RPM
        } else if rpm.is_nan() {
            0.0
        } else {
            REVERSE_RUNAWAY_TORQUE
        }
    }

    fn along_rpm(&self, row: usize, col: usize, rf: f32) -> f32 {
        let a = f32::from(self.rows[row][col]);
        let b = f32::from(self.rows[row][col + 1]);
        lerp(a, b, rf)
    }
}

#[inline]
fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// Dashboard readings derived from engine speed and running time
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Gauges {
    /// Ammeter (A)
    pub amperes: f32,
    /// Oil pressure (psi)
    pub oil_pressure: f32,
    /// Coolant temperature (°F)
    pub coolant_temp: f32,
}

impl Default for Gauges {
    fn default() -> Self {
        Self {
            amperes: 0.0,
            oil_pressure: 0.0,
            coolant_temp: COLD_COOLANT_TEMP,
        }
    }
}

const COLD_COOLANT_TEMP: f32 = 70.0;
const HOT_COOLANT_TEMP: f32 = 200.0;
const WARMUP_SECONDS: f32 = 60.0;
const GAUGE_FULL_RPM: f32 = 2000.0;

impl Gauges {
    /// Next gauge readings; pure in the previous readings and engine state
    ///
    /// Coolant only warms while the engine is above `STALL_RPM`, otherwise
    /// the previous temperature is held.
    pub fn next(self, rpm: f32, starter: bool, clock: f32) -> Gauges {
        let (mut amperes, mut oil_pressure) = if rpm < GAUGE_FULL_RPM {
            (
                (10.0 / GAUGE_FULL_RPM) * rpm - 10.0,
                (40.0 / GAUGE_FULL_RPM) * rpm,
            )
        } else {
            (10.0, 40.0)
        };

        if starter {
            amperes = -50.0;
        }
        if rpm < 0.0 {
            oil_pressure = 0.0;
        }

        let coolant_temp = if rpm < STALL_RPM {
            self.coolant_temp
        } else if clock < WARMUP_SECONDS {
            COLD_COOLANT_TEMP + ((HOT_COOLANT_TEMP - COLD_COOLANT_TEMP) / WARMUP_SECONDS) * clock
        } else {
            HOT_COOLANT_TEMP
        };

        Gauges {
            amperes,
            oil_pressure,
            coolant_temp,
        }
    }
}

/// Stock street curve
pub const STANDARD_CURVE: TorqueCurveTable = TorqueCurveTable::new([
    [75, -10, -30, -50, -70, -80, -80, -80, -80, -80, -80, -80],
    [75, 100, 1, -12, -29, -41, -49, -60, -71, -76, -78, -80],
    [75, 150, 32, 26, 12, -2, -18, -40, -62, -71, -76, -80],
    [75, 150, 63, 63, 53, 37, 13, -20, -53, -67, -73, -80],
    [75, 150, 94, 101, 94, 76, 44, 0, -44, -62, -71, -80],
    [75, 175, 126, 139, 136, 114, 76, 20, -36, -58, -69, -80],
    [75, 175, 157, 177, 177, 153, 107, 40, -27, -53, -67, -80],
    [75, 175, 188, 214, 218, 192, 138, 60, -18, -49, -64, -80],
    [75, 177, 219, 252, 259, 231, 169, 80, -9, -44, -62, -80],
    [75, 200, 250, 290, 300, 270, 200, 100, 0, -40, -60, -80],
]);

/// Flatter curve used when both driven wheels are off-road at speed
pub const DIRT_CURVE: TorqueCurveTable = TorqueCurveTable::new([
    [75, -10, -30, -30, -40, -40, -40, -40, -40, -40, -40, -40],
    [75, 100, 1, -12, -29, -41, -40, -40, -40, -40, -40, -40],
    [75, 150, 60, 26, 12, -2, -18, -40, -40, -40, -40, -40],
    [75, 150, 94, 63, 53, 37, 13, -10, -40, -40, -40, -40],
    [75, 150, 94, 101, 94, 76, 44, 0, -40, -40, -40, -40],
    [75, 150, 94, 101, 94, 76, 44, 0, -40, -40, -40, -40],
    [75, 150, 94, 101, 150, 76, 44, 0, -40, -40, -40, -40],
    [75, 150, 150, 150, 150, 76, 44, 0, -40, -40, -40, -40],
    [75, 150, 150, 150, 150, 76, 44, 0, -40, -40, -40, -40],
    [75, 150, 150, 150, 150, 76, 44, 0, -40, -40, -40, -40],
]);

/// Aggressive mid-range curve used by the racing cars
pub const RUSH_CURVE: TorqueCurveTable = TorqueCurveTable::new([
    [100, -12, -33, -51, -61, -54, -71, -75, -75, -75, -75, -75],
    [100, 112, 62, 3, -30, -51, -65, -69, -71, -73, -75, -75],
    [100, 114, 113, 112, 104, 70, 87, 32, -32, -62, -70, -75],
    [100, 116, 126, 131, 136, 136, 131, 90, -1, -36, -69, -75],
    [100, 119, 137, 151, 161, 170, 175, 160, 90, 0, -50, -75],
    [100, 127, 156, 178, 196, 215, 223, 225, 205, 75, -32, -75],
    [100, 133, 163, 190, 212, 230, 245, 256, 243, 108, -23, -75],
    [100, 137, 175, 206, 230, 250, 265, 280, 282, 175, -10, -75],
    [100, 146, 186, 222, 248, 275, 293, 305, 310, 251, 4, -69],
    [100, 155, 202, 240, 275, 300, 320, 327, 328, 312, 49, -65],
]);
