//! Ground contact queries
//!
//! Track geometry lives outside the simulation. Each tick, before the tires
//! are solved, every wheel asks the surface collaborator for the ground
//! under it.

use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Surface material under a wheel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SurfaceCode {
    #[default]
    Pavement,
    Dirt,
    Grass,
    Sand,
    Ice,
    Water,
}

impl SurfaceCode {
    /// Multiplier applied to both cornering stiffness and max friction
    pub fn friction_scale(self) -> f32 {
        match self {
            SurfaceCode::Pavement => 1.0,
            SurfaceCode::Dirt => 0.7,
            SurfaceCode::Grass => 0.6,
            SurfaceCode::Sand => 0.5,
            SurfaceCode::Ice => 0.2,
            SurfaceCode::Water => 0.4,
        }
    }

    /// Loose surfaces add dirt drag and select the off-road torque curve
    pub fn is_loose(self) -> bool {
        matches!(
            self,
            SurfaceCode::Dirt | SurfaceCode::Grass | SurfaceCode::Sand
        )
    }
}

/// What the ground looks like directly under a point
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SurfaceContact {
    /// Ground height (world Z, ft) at the queried XY
    pub height: f32,
    /// Unit ground normal (world frame)
    pub normal: Vec3,
    /// Surface material
    pub surface: SurfaceCode,
}

impl SurfaceContact {
    pub fn flat(height: f32, surface: SurfaceCode) -> Self {
        Self {
            height,
            normal: Vec3::Z,
            surface,
        }
    }
}

/// Track collaborator answering per-wheel ground queries
pub trait SurfaceQuery {
    fn query(&self, position: Vec3) -> SurfaceContact;
}

impl<F> SurfaceQuery for F
where
    F: Fn(Vec3) -> SurfaceContact,
{
    fn query(&self, position: Vec3) -> SurfaceContact {
        self(position)
    }
}

/// Infinite flat plane of a single material
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FlatGround {
    pub height: f32,
    pub surface: SurfaceCode,
}

impl FlatGround {
    pub fn pavement() -> Self {
        Self {
            height: 0.0,
            surface: SurfaceCode::Pavement,
        }
    }
}

impl SurfaceQuery for FlatGround {
    fn query(&self, _position: Vec3) -> SurfaceContact {
        SurfaceContact::flat(self.height, self.surface)
    }
}
