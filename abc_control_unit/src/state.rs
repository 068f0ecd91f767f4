//! State machine module root.
//!
//! Control mode lifecycle, transition ramp and walking flags.

pub mod mode;
pub mod transition;
pub mod walking;
