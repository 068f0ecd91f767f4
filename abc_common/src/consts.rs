//! System-wide constants for the ABC workspace.
//!
//! Single source of truth for the balancer's gains, limits and timing.
//! Imported by all crates; no duplication permitted.

use static_assertions::const_assert;

// ─── Timing ─────────────────────────────────────────────────────────

/// Default control period [s] (200 Hz).
pub const DEFAULT_DT: f64 = 0.005;

/// Smallest accepted control period [s].
pub const DT_MIN: f64 = 0.0001;

/// Largest accepted control period [s].
pub const DT_MAX: f64 = 0.1;

/// Duration of a start or stop transition ramp [s].
pub const TRANSITION_SECONDS: f64 = 2.0;

/// Poll interval of the blocking footstep wait [µs].
pub const WAIT_POLL_INTERVAL_US: u64 = 10;

/// Upper bound on generator ticks spent priming a walk before giving up.
pub const GAIT_PRIME_TICK_LIMIT: usize = 100_000;

// ─── Transition Blend ───────────────────────────────────────────────

/// Logistic steepness: gain spans 0.01 → 0.99 over one ramp.
pub const SIGMOID_STEEPNESS: f64 = 9.19;

// ─── CoM Feedback ───────────────────────────────────────────────────

/// Proportional gain from CoM error to root displacement per tick.
pub const COM_FEEDBACK_GAIN: f64 = 0.05;

/// Blend ratio from the snapshot root rotation toward the target root rotation.
pub const ROOT_ROTATION_BLEND: f64 = 0.9;

/// Ratio used when building the mid frame between two feet.
pub const FOOT_MID_RATIO: f64 = 0.5;

// ─── Limb IK ────────────────────────────────────────────────────────

/// Nullspace weight of the joint-limit avoidance objective.
pub const JOINT_LIMIT_NULLSPACE_WEIGHT: f64 = 0.001;

/// Nullspace weight of the reference-tracking objective.
pub const REFERENCE_NULLSPACE_WEIGHT: f64 = 0.01;

/// Maximum joint displacement per tick [rad] (0.2 rad with a 0.5 margin).
pub const MAX_JOINT_STEP: f64 = 0.2 * 0.5;

/// Singular value cutoff used when pseudo-inverting chain Jacobians.
pub const PSEUDO_INVERSE_EPSILON: f64 = 1.0e-9;

// ─── Diagnostics ────────────────────────────────────────────────────

/// Tick interval between numeric prints at debug level 1.
pub const DEBUG_PRINT_INTERVAL: u64 = 200;

// ─── Limb Names ─────────────────────────────────────────────────────

/// Limb name of the right foot end-effector.
pub const RIGHT_LEG: &str = "rleg";

/// Limb name of the left foot end-effector.
pub const LEFT_LEG: &str = "lleg";

const_assert!(DT_MIN < DEFAULT_DT && DEFAULT_DT < DT_MAX);
const_assert!(TRANSITION_SECONDS > DT_MAX);
const_assert!(MAX_JOINT_STEP > 0.0);
const_assert!(ROOT_ROTATION_BLEND >= 0.0 && ROOT_ROTATION_BLEND <= 1.0);
const_assert!(JOINT_LIMIT_NULLSPACE_WEIGHT < REFERENCE_NULLSPACE_WEIGHT);
