//! Simulation settings
//!
//! Loaded from JSON; any field left out falls back to its default.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::consts::{MAX_SUBSTEPS, MAX_VELOCITY, SIM_DT};
use crate::error::Result;

/// Difficulty preset (selects the anti-spin gain table)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "Easy",
            Difficulty::Medium => "Medium",
            Difficulty::Hard => "Hard",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "easy" => Some(Difficulty::Easy),
            "medium" | "med" => Some(Difficulty::Medium),
            "hard" | "expert" => Some(Difficulty::Hard),
            _ => None,
        }
    }
}

/// Limits checked after every tick; a car outside them is reset
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SanityEnvelope {
    /// Body speed (ft/s) beyond which the car is considered broken
    pub max_speed: f32,
    /// Angular speed (rad/s) beyond which the car is considered broken
    pub max_angular_speed: f32,
    /// Allowed orientation orthonormality error
    pub max_basis_error: f32,
    /// Altitude band (ft) the car must stay within
    pub min_altitude: f32,
    pub max_altitude: f32,
    /// Seconds a car may spend upside down before it is put back
    pub max_inverted_time: f32,
    /// Body up-axis z below which a tick is not saved as a checkpoint
    pub min_checkpoint_up_z: f32,
}

impl Default for SanityEnvelope {
    fn default() -> Self {
        Self {
            max_speed: MAX_VELOCITY * 1.01,
            max_angular_speed: 60.0,
            max_basis_error: 1e-2,
            min_altitude: -10_000.0,
            max_altitude: 10_000.0,
            max_inverted_time: 1.0,
            min_checkpoint_up_z: 0.5,
        }
    }
}

/// Simulation settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Anti-spin difficulty preset
    pub difficulty: Difficulty,
    /// Fixed timestep (seconds)
    pub timestep: f32,
    /// Maximum fixed ticks run by one `advance` call
    pub max_substeps: u32,
    /// Ticks between orientation re-orthonormalizations
    pub renormalize_interval: u32,
    /// Post-tick sanity limits
    pub sanity: SanityEnvelope,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            difficulty: Difficulty::Medium,
            timestep: SIM_DT,
            max_substeps: MAX_SUBSTEPS,
            renormalize_interval: 16,
            sanity: SanityEnvelope::default(),
        }
    }
}

impl Settings {
    /// Create settings with a given difficulty, everything else default
    pub fn from_difficulty(difficulty: Difficulty) -> Self {
        Self {
            difficulty,
            ..Self::default()
        }
    }

    /// Parse settings from a JSON document
    pub fn from_json(json: &str) -> Result<Self> {
        let mut settings: Settings = serde_json::from_str(json)?;
        settings.sanitize();
        Ok(settings)
    }

    /// Load settings from a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path.as_ref())?;
        let settings = Self::from_json(&json)?;
        log::info!(
            "Loaded settings from {} (difficulty {})",
            path.as_ref().display(),
            settings.difficulty.as_str()
        );
        Ok(settings)
    }

    /// Serialize to pretty JSON
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Replace unusable values with defaults
    fn sanitize(&mut self) {
        if !(self.timestep.is_finite() && self.timestep > 0.0) {
            log::warn!("Ignoring timestep {}, using {}", self.timestep, SIM_DT);
            self.timestep = SIM_DT;
        }
        self.max_substeps = self.max_substeps.max(1);
        self.renormalize_interval = self.renormalize_interval.max(1);
    }
}
