//! Command payloads from the service interface.
//!
//! These types describe what arrives at the boundary: limb definitions for
//! starting balance control, walking goals and raw footstep sequences.
//! Footsteps carry an unvalidated leg tag and a `(x, y, z, w)` quaternion;
//! [`Footstep::resolve`] validates both.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::gait::LegSide;
use crate::pose::Pose;

/// One end-effector placed under balance control.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimbDefinition {
    /// Limb name (e.g. `"rleg"`); keys the IK parameter map.
    pub name: String,
    /// Chain base link.
    pub base_link: String,
    /// Chain target (end-effector) link.
    pub target_link: String,
}

impl LimbDefinition {
    /// Convenience constructor.
    pub fn new(name: &str, base_link: &str, target_link: &str) -> Self {
        Self {
            name: name.to_string(),
            base_link: base_link.to_string(),
            target_link: target_link.to_string(),
        }
    }
}

/// Error resolving a boundary footstep.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FootstepError {
    /// Leg tag does not name a foot.
    #[error("No such target: {0}")]
    UnknownLeg(String),

    /// Orientation quaternion has zero or non-finite norm, or the position
    /// is not finite.
    #[error("Degenerate footstep pose for {0}")]
    DegeneratePose(String),
}

/// Raw footstep as received from the service interface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Footstep {
    /// Leg tag (`"rleg"`, `"lleg"`, …).
    pub leg: String,
    /// Landing position [m].
    pub position: [f64; 3],
    /// Landing orientation as `(x, y, z, w)`; normalized on resolve.
    pub orientation: [f64; 4],
}

impl Footstep {
    /// Validate the leg tag and orientation.
    pub fn resolve(&self) -> Result<(LegSide, Pose), FootstepError> {
        let leg: LegSide = self
            .leg
            .parse()
            .map_err(|_| FootstepError::UnknownLeg(self.leg.clone()))?;
        let pose = Pose::from_xyzw(self.position, self.orientation)
            .ok_or_else(|| FootstepError::DegeneratePose(self.leg.clone()))?;
        Ok((leg, pose))
    }
}

/// Walking velocity in the robot's heading frame.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct VelocityCommand {
    /// Forward velocity [m/s].
    pub vx: f64,
    /// Lateral velocity [m/s].
    pub vy: f64,
    /// Yaw rate [rad/s].
    pub vyaw: f64,
}

impl VelocityCommand {
    /// Standing still.
    pub const ZERO: Self = Self {
        vx: 0.0,
        vy: 0.0,
        vyaw: 0.0,
    };

    /// Create a velocity command.
    pub const fn new(vx: f64, vy: f64, vyaw: f64) -> Self {
        Self { vx, vy, vyaw }
    }
}

/// Relative walking goal: displacement and heading change from the
/// current foot mid frame.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct GoPosCommand {
    /// Forward displacement [m].
    pub x: f64,
    /// Lateral displacement [m].
    pub y: f64,
    /// Heading change [rad].
    pub yaw: f64,
}
