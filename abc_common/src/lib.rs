//! ABC Common Library
//!
//! Shared types, kinematic contracts and configuration loading for all
//! crates of the auto-balancer workspace.
//!
//! # Module Structure
//!
//! - [`pose`] - Position + rotation value type and frame helpers
//! - [`model`] - Narrow robot-model contract consumed by the balancer
//! - [`gait`] - Gait generator contract and leg identity
//! - [`command`] - Command payloads arriving from the service interface
//! - [`config`] - Configuration loading traits and types
//! - [`consts`] - System-wide numeric constants
//! - [`prelude`] - Common re-exports for convenience
//!
//! # Usage
//!
//! ```toml
//! [dependencies]
//! abc_common = { workspace = true }
//! ```
//!
//! ```rust
//! use abc_common::prelude::*;
//!
//! let foot = Pose::from_xyzw([0.0, -0.09, 0.0], [0.0, 0.0, 0.0, 1.0]).unwrap();
//! assert_eq!(foot.position.y, -0.09);
//! ```

pub mod command;
pub mod config;
pub mod consts;
pub mod gait;
pub mod model;
pub mod pose;
pub mod prelude;
