//! Authoritative state of the falling object.

use std::str::FromStr;

use bevy::math::Vec3;
use serde::{Deserialize, Serialize};

use crate::config::SimConfig;
use crate::error::ConfigError;

/// Which integrator drives the falling object. Fixed for the lifetime of a
/// controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SimulationMode {
    /// Analytic bounce model, no collision solver.
    #[default]
    Kinematic,
    /// Stepped rigid-body world.
    RigidBody,
}

/// Named gravity constant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GravityPreset {
    /// 9.81 m/s^2
    #[default]
    Planetary,
    /// 5.76 m/s^2
    Reduced,
}

impl GravityPreset {
    pub const ALL: [GravityPreset; 2] = [GravityPreset::Planetary, GravityPreset::Reduced];

    /// Downward acceleration magnitude in m/s^2.
    pub const fn acceleration(self) -> f32 {
        match self {
            GravityPreset::Planetary => 9.81,
            GravityPreset::Reduced => 5.76,
        }
    }

    /// Name shown in the control panel.
    pub const fn label(self) -> &'static str {
        match self {
            GravityPreset::Planetary => "Earth",
            GravityPreset::Reduced => "Space",
        }
    }
}

impl FromStr for GravityPreset {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "planetary" | "earth" => Ok(GravityPreset::Planetary),
            "reduced" | "space" => Ok(GravityPreset::Reduced),
            _ => Err(ConfigError::UnknownPreset(s.to_string())),
        }
    }
}

/// The single-writer record of the falling object, owned by the controller.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationState {
    pub mode: SimulationMode,
    /// World position, y is the fall axis
    pub position: Vec3,
    /// Kinematic mode keeps the per-frame fall displacement on `y`
    /// (positive = falling). Rigid-body mode mirrors the body's velocity.
    pub velocity: Vec3,
    /// Rotation about z, passed through from the physics engine
    pub angle: f32,
    pub preset: GravityPreset,
    pub mass: f32,
    /// Height of the origin the object returns to on reset
    pub release_height: f32,
    pub running: bool,
}

impl SimulationState {
    pub fn new(config: &SimConfig) -> Self {
        let release_height = config.release_height;
        Self {
            mode: config.mode,
            position: Vec3::new(0.0, release_height, 0.0),
            velocity: Vec3::ZERO,
            angle: 0.0,
            preset: config.initial_preset,
            mass: config.mass,
            release_height,
            running: false,
        }
    }

    /// Active gravity constant.
    pub fn gravity(&self) -> f32 {
        self.preset.acceleration()
    }

    pub fn origin(&self) -> Vec3 {
        Vec3::new(0.0, self.release_height, 0.0)
    }

    /// Back to the origin at rest, not running.
    pub fn reset_to_origin(&mut self) {
        self.position = self.origin();
        self.velocity = Vec3::ZERO;
        self.angle = 0.0;
        self.running = false;
    }
}
