//! Universe limits and morph tuning
//!
//! One immutable value per scene, copied into every motion at construction.
//! Loaded from JSON; any missing field falls back to the tuned default.

use std::path::Path;

use glam::Vec3;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while loading or validating a configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Numeric limits of the orbit universe
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UniverseConfig {
    /// Center of the universe (all orbits circle around it)
    pub universe_center: Vec3,

    // === Axis bands ===
    /// Upper bound of the orbit main axis (center vector)
    pub universe_center_length_limit: f32,
    /// Upper bound of the orbit secondary axis (direction vector)
    pub universe_dir_length_limit: f32,
    /// Lower bound of the main axis (the force field around the planet)
    pub forcefield_center_length_limit: f32,
    /// Lower bound of the secondary axis
    pub forcefield_dir_length_limit: f32,
    /// Main axis length an out-of-band orbit is eased back to
    pub forcefield_new_center_length: f32,
    /// Secondary axis length an out-of-band orbit is eased back to
    pub forcefield_new_dir_length: f32,
    /// Rate multiplier of the main axis reset transition
    pub forcefield_center_scale_speed: f32,
    /// Rate multiplier of the secondary axis reset transition
    pub forcefield_dir_scale_speed: f32,

    // === Speed ===
    /// Speed ceiling for satellites
    pub universe_speed_limit: f32,
    /// Factor for the temporary speed overshoot after a hit
    pub orbit_temp_max_speed_factor: f32,
    /// Minimal orbit speed
    pub orbit_min_speed: f32,
    /// Share of the impulse length added to (or taken from) the orbit speed
    pub orbit_speed_morph_push_factor: f32,
    /// Scales the dynamic rate of speed transitions
    pub orbit_dynamic_speed_factor: f32,

    // === Rotation ===
    /// Ratio between hitting speed and spin angular speed
    pub satellite_speed_rotation_ratio: f32,
    /// Pacing of a direction vector rotation (rad per time unit)
    pub dir_rotation_step: f32,
}

impl Default for UniverseConfig {
    fn default() -> Self {
        Self {
            universe_center: Vec3::ZERO,

            universe_center_length_limit: 24.0,
            universe_dir_length_limit: 24.0,
            forcefield_center_length_limit: 11.0,
            forcefield_dir_length_limit: 11.0,
            forcefield_new_center_length: 15.0,
            forcefield_new_dir_length: 15.0,
            forcefield_center_scale_speed: 25.0,
            forcefield_dir_scale_speed: 25.0,

            universe_speed_limit: 7.5,
            orbit_temp_max_speed_factor: 3.0,
            orbit_min_speed: 0.5,
            orbit_speed_morph_push_factor: 0.25,
            orbit_dynamic_speed_factor: 120.0,

            satellite_speed_rotation_ratio: 4.0,
            // as fast as a satellite needs for a quarter orbit
            dir_rotation_step: 0.25,
        }
    }
}

impl UniverseConfig {
    /// Upper bound a speed transition may temporarily reach
    pub fn temp_max_speed(&self) -> f32 {
        self.universe_speed_limit * self.orbit_temp_max_speed_factor
    }

    /// Parse a configuration from JSON and validate it
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path.as_ref())?;
        let config = Self::from_json(&json)?;
        log::info!("Loaded universe config from {}", path.as_ref().display());
        Ok(config)
    }

    /// Reject non-finite values and inverted bands
    pub fn validate(&self) -> Result<(), ConfigError> {
        let scalars = [
            ("universe_center_length_limit", self.universe_center_length_limit),
            ("universe_dir_length_limit", self.universe_dir_length_limit),
            ("forcefield_center_length_limit", self.forcefield_center_length_limit),
            ("forcefield_dir_length_limit", self.forcefield_dir_length_limit),
            ("forcefield_new_center_length", self.forcefield_new_center_length),
            ("forcefield_new_dir_length", self.forcefield_new_dir_length),
            ("forcefield_center_scale_speed", self.forcefield_center_scale_speed),
            ("forcefield_dir_scale_speed", self.forcefield_dir_scale_speed),
            ("universe_speed_limit", self.universe_speed_limit),
            ("orbit_temp_max_speed_factor", self.orbit_temp_max_speed_factor),
            ("orbit_min_speed", self.orbit_min_speed),
            ("orbit_speed_morph_push_factor", self.orbit_speed_morph_push_factor),
            ("orbit_dynamic_speed_factor", self.orbit_dynamic_speed_factor),
            ("satellite_speed_rotation_ratio", self.satellite_speed_rotation_ratio),
            ("dir_rotation_step", self.dir_rotation_step),
        ];
        for (name, value) in scalars {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::Invalid(format!("{name} must be finite and >= 0, got {value}")));
            }
        }
        if !self.universe_center.is_finite() {
            return Err(ConfigError::Invalid("universe_center must be finite".into()));
        }

        if self.forcefield_center_length_limit > self.universe_center_length_limit {
            return Err(ConfigError::Invalid(format!(
                "center band inverted: {} > {}",
                self.forcefield_center_length_limit, self.universe_center_length_limit
            )));
        }
        if self.forcefield_dir_length_limit > self.universe_dir_length_limit {
            return Err(ConfigError::Invalid(format!(
                "direction band inverted: {} > {}",
                self.forcefield_dir_length_limit, self.universe_dir_length_limit
            )));
        }
        if self.orbit_min_speed > self.temp_max_speed() {
            return Err(ConfigError::Invalid(format!(
                "orbit_min_speed {} exceeds temporary max speed {}",
                self.orbit_min_speed,
                self.temp_max_speed()
            )));
        }
        Ok(())
    }
}
