//! # ABC Control Unit Library
//!
//! Active balance control for a legged robot. Every control tick takes the
//! latest reference joint vector and produces a corrected one that keeps the
//! centre of mass over the feet and the feet on their targets, blending
//! control authority in and out over a fixed-length transition.
//!
//! ## Layers
//!
//! 1. **ControlMode**: IDLE / ABC / SYNC lifecycle (`state::mode`)
//! 2. **Transition**: start/stop ramp with logistic gain (`state::transition`)
//! 3. **AutoBalancer**: per-tick engine: re-basing, CoM feedback, limb IK
//!    (`control::balance`, `control::ik`)
//! 4. **BalancerService**: command surface sharing one lock with the tick
//!    (`service`)
//! 5. **CycleRunner**: periodic execution (`cycle`)
//!
//! The robot model and gait generator are consumed through the
//! `abc_common` traits; `abc_sim` provides simulated implementations.

pub mod config;
pub mod control;
pub mod cycle;
pub mod error;
pub mod service;
pub mod state;
