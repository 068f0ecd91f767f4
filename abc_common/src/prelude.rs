//! Prelude module for common re-exports.
//!
//! ```rust
//! use abc_common::prelude::*;
//! ```

// ─── Configuration ──────────────────────────────────────────────────
pub use crate::config::{ConfigError, ConfigLoader, LogLevel, LoggingConfig, Validate};

// ─── Kinematics ─────────────────────────────────────────────────────
pub use crate::model::{ChainHandle, ChainJacobian, JointLimits, ModelError, RobotModel};
pub use crate::pose::{Pose, difference_rotation};

// ─── Walking ────────────────────────────────────────────────────────
pub use crate::gait::{GaitGenerator, LegSide};

// ─── Commands ───────────────────────────────────────────────────────
pub use crate::command::{Footstep, GoPosCommand, LimbDefinition, VelocityCommand};
