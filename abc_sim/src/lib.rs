//! Simulation backends for the ABC control unit.
//!
//! Software stand-ins for the collaborators the balancer consumes, for
//! development and testing without a robot:
//!
//! - [`SimBiped`]: floating-base biped implementing
//!   [`RobotModel`](abc_common::model::RobotModel)
//! - [`ScriptedGait`]: footstep replayer implementing
//!   [`GaitGenerator`](abc_common::gait::GaitGenerator)

pub mod biped;
pub mod gait;

pub use biped::{SimBiped, SimBipedParams};
pub use gait::ScriptedGait;
