//! Gait generator contract and leg identity.
//!
//! The balancer consumes a [`GaitGenerator`] while walking: once per tick it
//! advances the trajectory and reads back the support/swing foot targets,
//! their mid frame and the centre-of-mass target. Footstep planning itself
//! lives behind this trait.

use std::fmt;
use std::str::FromStr;

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::command::{GoPosCommand, VelocityCommand};
use crate::consts::{FOOT_MID_RATIO, LEFT_LEG, RIGHT_LEG};
use crate::pose::Pose;

/// Foot identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LegSide {
    /// Right foot (`"rleg"`).
    Right,
    /// Left foot (`"lleg"`).
    Left,
}

impl LegSide {
    /// Both feet, right first.
    pub const ALL: [LegSide; 2] = [LegSide::Right, LegSide::Left];

    /// The other foot.
    #[inline]
    pub const fn opposite(self) -> Self {
        match self {
            Self::Right => Self::Left,
            Self::Left => Self::Right,
        }
    }

    /// Limb name keying this foot's IK parameters.
    #[inline]
    pub const fn limb_name(self) -> &'static str {
        match self {
            Self::Right => RIGHT_LEG,
            Self::Left => LEFT_LEG,
        }
    }

    /// Array index (right = 0, left = 1).
    #[inline]
    pub const fn index(self) -> usize {
        match self {
            Self::Right => 0,
            Self::Left => 1,
        }
    }
}

impl fmt::Display for LegSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.limb_name())
    }
}

/// Leg tag that names neither foot.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown leg tag: {0}")]
pub struct UnknownLeg(pub String);

impl FromStr for LegSide {
    type Err = UnknownLeg;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "rleg" | ":rleg" | "right" => Ok(Self::Right),
            "lleg" | ":lleg" | "left" => Ok(Self::Left),
            other => Err(UnknownLeg(other.to_string())),
        }
    }
}

/// Footstep/CoM trajectory generator driven by the balancer.
///
/// # Tick Contract
///
/// | Call | When |
/// |------|------|
/// | `initialize_gait_parameter` | once per walk, before the first tick |
/// | `proc_one_tick` | once per control tick while walking |
/// | pose / CoM getters | after `proc_one_tick` in the same tick |
///
/// `proc_one_tick` returns `true` while a solved trajectory is available
/// and `false` once it has run out.
pub trait GaitGenerator: Send {
    /// Seed a walk from the current CoM and the two feet's poses.
    fn initialize_gait_parameter(&mut self, cog: &Vector3<f64>, support: &Pose, swing: &Pose);

    /// Advance the trajectory one control tick.
    fn proc_one_tick(&mut self) -> bool;

    /// Foot currently bearing weight.
    fn support_leg(&self) -> LegSide;

    /// Foot currently in the air (or about to be).
    fn swing_leg(&self) -> LegSide;

    /// Target pose of the support foot.
    fn support_leg_pose(&self) -> Pose;

    /// Target pose of the swing foot.
    fn swing_leg_pose(&self) -> Pose;

    /// Mid frame between the swing and support targets.
    fn swing_support_mid_pose(&self) -> Pose {
        Pose::interpolate(
            &self.swing_leg_pose(),
            &self.support_leg_pose(),
            FOOT_MID_RATIO,
        )
    }

    /// Target centre of mass.
    fn cog(&self) -> Vector3<f64>;

    /// Leg of the first queued footstep (the first foot to swing).
    fn footstep_front_leg(&self) -> LegSide;

    /// Convert a relative goal into footsteps starting at `start_mid`.
    fn go_pos_to_footsteps(&mut self, goal: &GoPosCommand, start_mid: &Pose);

    /// Enter velocity mode from `start_mid`.
    fn initialize_velocity_mode(&mut self, start_mid: &Pose, velocity: &VelocityCommand);

    /// Update the walking velocity while in velocity mode.
    fn set_velocity(&mut self, velocity: &VelocityCommand);

    /// Offset velocity added on top of the commanded one.
    fn set_offset_velocity(&mut self, velocity: &VelocityCommand);

    /// Leave velocity mode; queued steps still run out.
    fn finalize_velocity_mode(&mut self);

    /// Drop every queued footstep.
    fn clear_footsteps(&mut self);

    /// Queue a footstep for `leg`.
    fn append_footstep(&mut self, leg: LegSide, pose: Pose);

    /// Number of queued footsteps.
    fn footstep_count(&self) -> usize;

    /// Whether a walk can be ended now without cutting a step short.
    fn ready_to_stop(&self) -> bool;
}
