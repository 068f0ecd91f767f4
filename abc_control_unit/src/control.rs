//! Control engine root.
//!
//! Balance engine (re-basing, CoM feedback, transition blending) and the
//! per-limb IK solver it drives.

pub mod balance;
pub mod ik;
