//! TOML configuration loader with validation.
//!
//! `BalancerConfig` goes through the shared [`ConfigLoader`], which runs
//! [`Validate`]: control period range, leg offset, and the limb table. Any
//! failure is fatal at startup: the binary never enters an active mode on a
//! bad config.

use std::collections::HashSet;
use std::path::Path;

use abc_common::command::LimbDefinition;
use abc_common::config::{ConfigError, ConfigLoader, LoggingConfig, Validate};
use abc_common::consts::{DEFAULT_DT, DT_MAX, DT_MIN};
use abc_common::gait::GaitGenerator;
use abc_sim::ScriptedGait;
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

fn default_dt() -> f64 {
    DEFAULT_DT
}

/// `[balancer]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalancerSection {
    /// Control period [s].
    #[serde(default = "default_dt")]
    pub dt: f64,
    /// Nominal leg offset [m]; default leg poses sit at `∓offset`. Absent
    /// means no gait generator.
    #[serde(default)]
    pub leg_offset: Option<[f64; 3]>,
    /// Numeric debug verbosity (0 off, 1 every 200 ticks, >1 every tick).
    #[serde(default)]
    pub debug_level: u32,
}

impl Default for BalancerSection {
    fn default() -> Self {
        Self {
            dt: DEFAULT_DT,
            leg_offset: None,
            debug_level: 0,
        }
    }
}

/// Complete balancer configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalancerConfig {
    /// Log subscriber settings.
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Engine settings.
    #[serde(default)]
    pub balancer: BalancerSection,
    /// Limbs engaged by the start command.
    #[serde(default)]
    pub limbs: Vec<LimbDefinition>,
}

impl Validate for BalancerConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        self.logging.validate()?;

        let dt = self.balancer.dt;
        if !(DT_MIN..=DT_MAX).contains(&dt) {
            return Err(ConfigError::ValidationError(format!(
                "dt {dt} outside [{DT_MIN}, {DT_MAX}]"
            )));
        }

        if let Some(offset) = self.balancer.leg_offset {
            if offset.iter().any(|v| !v.is_finite()) {
                return Err(ConfigError::ValidationError(format!(
                    "leg_offset {offset:?} is not finite"
                )));
            }
        }

        validate_limbs(&self.limbs)
    }
}

impl BalancerConfig {
    /// Default leg positions `[right, left]` for the gait generator.
    pub fn leg_positions(&self) -> Option<[Vector3<f64>; 2]> {
        self.balancer
            .leg_offset
            .map(|offset| default_leg_positions(&Vector3::from(offset)))
    }

    /// Gait generator for this configuration, if a leg offset is set.
    pub fn build_gait(&self) -> Option<Box<dyn GaitGenerator>> {
        self.leg_positions()
            .map(|legs| Box::new(ScriptedGait::new(self.balancer.dt, legs)) as Box<dyn GaitGenerator>)
    }
}

fn validate_limbs(limbs: &[LimbDefinition]) -> Result<(), ConfigError> {
    let mut seen = HashSet::new();
    for limb in limbs {
        if limb.name.is_empty() {
            return Err(ConfigError::ValidationError(
                "limb name cannot be empty".to_string(),
            ));
        }
        if limb.base_link.is_empty() || limb.target_link.is_empty() {
            return Err(ConfigError::ValidationError(format!(
                "limb {}: base_link and target_link are required",
                limb.name
            )));
        }
        if !seen.insert(limb.name.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "duplicate limb name: {}",
                limb.name
            )));
        }
    }
    Ok(())
}

/// Leg positions `[−offset, +offset]` (right first).
pub fn default_leg_positions(offset: &Vector3<f64>) -> [Vector3<f64>; 2] {
    [-offset, *offset]
}

/// Load and validate a configuration file.
pub fn load_config(path: &Path) -> Result<BalancerConfig, ConfigError> {
    BalancerConfig::load(path)
}

/// Load and validate a configuration from a TOML string (for testing).
pub fn load_config_from_str(content: &str) -> Result<BalancerConfig, ConfigError> {
    BalancerConfig::load_str(content)
}
