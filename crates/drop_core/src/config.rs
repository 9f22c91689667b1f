//! Simulator configuration.
//!
//! Read from an optional JSON file (`drop_sim.json` by default, or the path in
//! `DROP_SIM_CONFIG`). Every field has a default, so a partial file only
//! overrides what it names.
//!
//! # Example
//!
//! ```ignore
//! use drop_core::SimConfig;
//!
//! let config = SimConfig::load_or_default(SimConfig::resolve_path())?;
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::attachment::AttachmentConfig;
use crate::error::{ConfigError, SimResult};
use crate::kinematic::KinematicParams;
use crate::metrics::MetricsMode;
use crate::state::{GravityPreset, SimulationMode};

/// Config file looked up in the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "drop_sim.json";

/// Environment variable overriding [`DEFAULT_CONFIG_PATH`].
pub const CONFIG_ENV_VAR: &str = "DROP_SIM_CONFIG";

/// Size of the falling body's box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BodySize {
    /// Each half-extent drawn uniformly from `[min, max)`
    Random { min: f32, max: f32 },
    Fixed { half_width: f32, half_height: f32 },
}

impl Default for BodySize {
    fn default() -> Self {
        BodySize::Random { min: 0.1, max: 1.1 }
    }
}

/// Inputs of the rigid-body world.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RigidBodyConfig {
    pub body_size: BodySize,
    /// Half-extent along z, the body moves in the x/y plane
    pub half_depth: f32,
    /// Initial spin about z (radians/sec), restored on reset
    pub angular_velocity: f32,
    pub allow_sleep: bool,
    /// Speed below which the body may fall asleep
    pub sleep_speed_limit: f32,
    /// Spin (radians/sec) below which the body may fall asleep
    pub sleep_angular_limit: f32,
    /// Seconds below the speed limit before sleeping
    pub sleep_time_limit: f32,
    pub linear_damping: f32,
    pub angular_damping: f32,
    pub restitution: f32,
    pub friction: f32,
    /// Seed for the random body size, entropy when absent
    pub seed: Option<u64>,
}

impl Default for RigidBodyConfig {
    fn default() -> Self {
        Self {
            body_size: BodySize::default(),
            half_depth: 0.5,
            angular_velocity: 0.0,
            allow_sleep: true,
            sleep_speed_limit: 0.1,
            sleep_angular_limit: 0.1,
            sleep_time_limit: 1.0,
            linear_damping: 0.0,
            angular_damping: 0.05,
            restitution: 0.3,
            friction: 0.5,
            seed: None,
        }
    }
}

impl RigidBodyConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.body_size {
            BodySize::Random { min, max } => {
                if !(min.is_finite() && max.is_finite() && min > 0.0 && min < max) {
                    return Err(invalid(
                        "rigid_body.body_size",
                        format!("random range must satisfy 0 < min < max, got [{}, {})", min, max),
                    ));
                }
            }
            BodySize::Fixed {
                half_width,
                half_height,
            } => {
                if !(positive(half_width) && positive(half_height)) {
                    return Err(invalid(
                        "rigid_body.body_size",
                        format!(
                            "fixed half-extents must be > 0, got {} x {}",
                            half_width, half_height
                        ),
                    ));
                }
            }
        }
        if !positive(self.half_depth) {
            return Err(invalid("rigid_body.half_depth", "must be > 0"));
        }
        if !self.angular_velocity.is_finite() {
            return Err(invalid("rigid_body.angular_velocity", "must be finite"));
        }
        for (field, value) in [
            ("rigid_body.sleep_speed_limit", self.sleep_speed_limit),
            ("rigid_body.sleep_angular_limit", self.sleep_angular_limit),
            ("rigid_body.sleep_time_limit", self.sleep_time_limit),
            ("rigid_body.linear_damping", self.linear_damping),
            ("rigid_body.angular_damping", self.angular_damping),
            ("rigid_body.friction", self.friction),
        ] {
            if !(value.is_finite() && value >= 0.0) {
                return Err(invalid(field, format!("must be >= 0, got {}", value)));
            }
        }
        if !(0.0..=1.0).contains(&self.restitution) {
            return Err(invalid(
                "rigid_body.restitution",
                format!("must be in [0, 1], got {}", self.restitution),
            ));
        }
        Ok(())
    }
}

/// Top-level simulator configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub mode: SimulationMode,
    pub initial_preset: GravityPreset,
    /// Height the object is released from
    pub release_height: f32,
    pub mass: f32,
    /// Simulated seconds advanced per frame
    pub fixed_timestep: f32,
    /// Wall-clock run length in kinematic mode, `None` runs until reset
    pub auto_stop_ms: Option<u64>,
    pub metrics_mode: MetricsMode,
    pub kinematic: KinematicParams,
    pub rigid_body: RigidBodyConfig,
    pub attachment: AttachmentConfig,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            mode: SimulationMode::Kinematic,
            initial_preset: GravityPreset::Planetary,
            release_height: 3.0,
            mass: 1.0,
            fixed_timestep: 1.0 / 60.0,
            auto_stop_ms: Some(2000),
            metrics_mode: MetricsMode::Continuous,
            kinematic: KinematicParams::default(),
            rigid_body: RigidBodyConfig::default(),
            attachment: AttachmentConfig::default(),
        }
    }
}

impl SimConfig {
    /// Check every numeric input.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_height(self.release_height)?;
        validate_mass(self.mass)?;
        if !positive(self.fixed_timestep) {
            return Err(invalid(
                "fixed_timestep",
                format!("must be > 0, got {}", self.fixed_timestep),
            ));
        }
        if self.auto_stop_ms == Some(0) {
            return Err(invalid("auto_stop_ms", "must be > 0 when set"));
        }

        let k = &self.kinematic;
        if !k.rest_y.is_finite() {
            return Err(invalid("kinematic.rest_y", "must be finite"));
        }
        if !(0.0..=1.0).contains(&k.restitution) {
            return Err(invalid(
                "kinematic.restitution",
                format!("must be in [0, 1], got {}", k.restitution),
            ));
        }
        if !positive(k.scale_factor) {
            return Err(invalid("kinematic.scale_factor", "must be > 0"));
        }
        if !(k.settle_speed.is_finite() && k.settle_speed >= 0.0) {
            return Err(invalid("kinematic.settle_speed", "must be >= 0"));
        }

        self.rigid_body.validate()?;
        self.attachment.validate()
    }

    pub fn from_json_str(json: &str) -> SimResult<Self> {
        let config: SimConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load_from<P: AsRef<Path>>(path: P) -> SimResult<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Load `path` if it exists, defaults otherwise. A file that exists but
    /// does not parse is still an error.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> SimResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::load_from(path)
    }

    /// Config path from the environment, or the default.
    pub fn resolve_path() -> PathBuf {
        std::env::var_os(CONFIG_ENV_VAR)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
    }

    pub fn to_json_pretty(&self) -> SimResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

pub fn validate_height(height: f32) -> Result<(), ConfigError> {
    if height.is_finite() && height >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::InvalidHeight(height))
    }
}

pub fn validate_mass(mass: f32) -> Result<(), ConfigError> {
    if positive(mass) {
        Ok(())
    } else {
        Err(ConfigError::InvalidMass(mass))
    }
}

fn positive(value: f32) -> bool {
    value.is_finite() && value > 0.0
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        field,
        reason: reason.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SimError;
    use crate::kinematic::BounceRule;
    use crate::RetentionPolicy;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = SimConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.release_height, 3.0);
        assert_eq!(config.auto_stop_ms, Some(2000));
        assert_eq!(config.mode, SimulationMode::Kinematic);
    }

    #[test]
    fn test_partial_json_overrides_only_named_fields() {
        let config = SimConfig::from_json_str(
            r#"{
                "mode": "rigid_body",
                "initial_preset": "reduced",
                "kinematic": { "bounce_rule": "every_frame_below_rest" },
                "rigid_body": { "body_size": { "kind": "fixed", "half_width": 0.5, "half_height": 0.25 }, "seed": 7 },
                "attachment": { "retention": "release_on_hide" }
            }"#,
        )
        .expect("valid config");

        assert_eq!(config.mode, SimulationMode::RigidBody);
        assert_eq!(config.initial_preset, GravityPreset::Reduced);
        assert_eq!(config.kinematic.bounce_rule, BounceRule::EveryFrameBelowRest);
        assert_eq!(config.kinematic.restitution, 0.8);
        assert_eq!(
            config.rigid_body.body_size,
            BodySize::Fixed {
                half_width: 0.5,
                half_height: 0.25
            }
        );
        assert_eq!(config.rigid_body.seed, Some(7));
        assert_eq!(config.attachment.retention, RetentionPolicy::ReleaseOnHide);
        assert_eq!(config.release_height, 3.0);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let err = SimConfig::from_json_str(r#"{ "mass": 0.0 }"#).unwrap_err();
        assert!(matches!(err, SimError::Config(ConfigError::InvalidMass(_))));

        let err = SimConfig::from_json_str(r#"{ "release_height": -1.0 }"#).unwrap_err();
        assert!(matches!(err, SimError::Config(ConfigError::InvalidHeight(_))));

        let err = SimConfig::from_json_str(
            r#"{ "rigid_body": { "body_size": { "kind": "random", "min": 1.0, "max": 0.5 } } }"#,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            SimError::Config(ConfigError::InvalidValue { field: "rigid_body.body_size", .. })
        ));

        let err = SimConfig::from_json_str(r#"{ "rigid_body": { "sleep_angular_limit": -0.1 } }"#)
            .unwrap_err();
        assert!(matches!(
            err,
            SimError::Config(ConfigError::InvalidValue {
                field: "rigid_body.sleep_angular_limit",
                ..
            })
        ));
    }

    #[test]
    fn test_unknown_preset_is_a_parse_error() {
        let err = SimConfig::from_json_str(r#"{ "initial_preset": "jupiter" }"#).unwrap_err();
        assert!(matches!(err, SimError::Json(_)));
    }

    #[test]
    fn test_load_from_file_and_missing_file() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(file, r#"{{ "release_height": 5.0, "auto_stop_ms": null }}"#).unwrap();

        let config = SimConfig::load_from(file.path()).expect("loads");
        assert_eq!(config.release_height, 5.0);
        assert_eq!(config.auto_stop_ms, None);

        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.json");
        assert_eq!(
            SimConfig::load_or_default(&missing).unwrap(),
            SimConfig::default()
        );
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{ not json").unwrap();
        assert!(matches!(
            SimConfig::load_or_default(file.path()),
            Err(SimError::Json(_))
        ));
    }

    #[test]
    fn test_json_round_trip_of_defaults() {
        let json = SimConfig::default().to_json_pretty().unwrap();
        assert_eq!(SimConfig::from_json_str(&json).unwrap(), SimConfig::default());
    }
}
