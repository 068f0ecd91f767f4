//! Command error types.
//!
//! Every rejected command leaves the balancer untouched. The service layer
//! logs the error and reports a boolean failure to its caller.

use abc_common::command::FootstepError;
use abc_common::model::ModelError;
use thiserror::Error;

use crate::state::mode::ControlMode;

/// Reason a balancer command was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    /// Command is not valid in the current control mode.
    #[error("Command requires {expected} mode, balancer is in {actual}")]
    InvalidMode {
        /// Mode the command needs.
        expected: ControlMode,
        /// Mode the balancer is in.
        actual: ControlMode,
    },

    /// Footstep leg tag names neither foot.
    #[error("No such target: {0}")]
    UnknownLeg(String),

    /// Footstep pose could not be converted.
    #[error("Invalid footstep: {0}")]
    InvalidFootstep(String),

    /// A limb the balancer needs was not supplied.
    #[error("Missing limb definition: {0}")]
    MissingLimb(String),

    /// Reference vector length differs from the model's joint count.
    #[error("Reference has {actual} joints, model has {expected}")]
    ReferenceLength {
        /// Model joint count.
        expected: usize,
        /// Supplied length.
        actual: usize,
    },

    /// Robot model rejected a limb definition.
    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    /// Walking command without a configured gait generator.
    #[error("No gait generator configured")]
    NoGaitGenerator,

    /// Gait generator produced no trajectory while priming a walk.
    #[error("Gait generator not solved after {ticks} ticks")]
    GaitNotSolved {
        /// Ticks spent priming.
        ticks: usize,
    },
}

impl From<FootstepError> for CommandError {
    fn from(e: FootstepError) -> Self {
        match e {
            FootstepError::UnknownLeg(tag) => Self::UnknownLeg(tag),
            FootstepError::DegeneratePose(leg) => {
                Self::InvalidFootstep(format!("degenerate orientation or position for {leg}"))
            }
        }
    }
}
