//! Errors for setup and boundary operations
//!
//! The per-tick simulation never returns an error: numeric trouble is
//! absorbed by guards and the sanity pass. Only building cars, loading
//! configuration, and addressing cars by id can fail.

use thiserror::Error;

use crate::sim::CarId;

/// Crate-wide error type
#[derive(Debug, Error)]
pub enum Error {
    /// A tire definition would make the friction-circle solver undefined
    #[error("invalid tire {wheel}: {reason}")]
    InvalidTire { wheel: usize, reason: &'static str },

    /// A car definition is physically meaningless
    #[error("invalid car type '{name}': {reason}")]
    InvalidCar { name: String, reason: String },

    /// No car with this id exists in the simulation
    #[error("unknown car {0:?}")]
    UnknownCar(CarId),

    /// No car type with this name exists in the catalog
    #[error("unknown car type '{0}'")]
    UnknownCarType(String),

    /// Configuration JSON could not be parsed
    #[error("failed to parse configuration: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration file could not be read
    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
