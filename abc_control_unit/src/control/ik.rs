//! Per-limb inverse kinematics.
//!
//! One resolved-rate step per tick:
//!
//! ```text
//! dq = J⁺·v + N·(0.001·u_lim) + N·(0.01·(q_ref − q))
//! ```
//!
//! where `v` is the task velocity toward the limb target, `N = I − J⁺J` the
//! chain nullspace projector and `u_lim` the joint-limit avoidance gradient.
//! The step is rejected when non-finite, scaled down uniformly when any
//! component exceeds the per-tick speed limit, integrated, and clamped to
//! the joint limits.

use abc_common::command::LimbDefinition;
use abc_common::consts::{JOINT_LIMIT_NULLSPACE_WEIGHT, MAX_JOINT_STEP, REFERENCE_NULLSPACE_WEIGHT};
use abc_common::model::{ChainHandle, JointLimits, ModelError, RobotModel};
use abc_common::pose::{Pose, difference_rotation};
use nalgebra::DVector;
use thiserror::Error;
use tracing::{debug, warn};

/// Failure of a single limb solve.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SolveError {
    /// The joint step contained NaN or infinity; nothing was applied.
    #[error("Non-finite joint step for limb {limb}")]
    NonFinite {
        /// Limb name.
        limb: String,
    },

    /// The model could not provide the chain Jacobian or target pose.
    #[error("Model error: {0}")]
    Model(#[from] ModelError),
}

/// IK state of one end-effector under balance control.
#[derive(Debug, Clone)]
pub struct LimbIkParam {
    base_link: String,
    target_link: String,
    chain: ChainHandle,
    /// Target link pose at the start of the last solve.
    pub current: Pose,
    /// Pose the solver drives the target link toward.
    pub target: Pose,
}

impl LimbIkParam {
    /// Bind a limb definition to its chain, with current and target set to
    /// `pose`.
    pub fn new(definition: &LimbDefinition, chain: ChainHandle, pose: Pose) -> Self {
        Self {
            base_link: definition.base_link.clone(),
            target_link: definition.target_link.clone(),
            chain,
            current: pose,
            target: pose,
        }
    }

    /// Chain base link.
    #[inline]
    pub fn base_link(&self) -> &str {
        &self.base_link
    }

    /// Chain target link.
    #[inline]
    pub fn target_link(&self) -> &str {
        &self.target_link
    }

    /// Bound chain.
    #[inline]
    pub fn chain(&self) -> &ChainHandle {
        &self.chain
    }
}

/// Gains applied to one solve.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolveGains {
    /// Transition ramp gain (1.0 outside the start ramp).
    pub transition: f64,
    /// Gain on the task velocity.
    pub cog: f64,
    /// Whether the start ramp is running; scales the task velocity and
    /// both nullspace terms by `transition` once more.
    pub starting: bool,
}

impl SolveGains {
    /// Full authority.
    pub const FULL: Self = Self {
        transition: 1.0,
        cog: 1.0,
        starting: false,
    };
}

/// Joint-limit avoidance gradient: `r²` with the sign of
/// `r = (mid − q) / half_range`.
#[inline]
pub fn joint_limit_gradient(angle: f64, limits: &JointLimits) -> f64 {
    let r = (limits.midpoint() - angle) / limits.half_range();
    if r > 0.0 { r * r } else { -r * r }
}

/// Whether every component is finite.
#[inline]
pub fn all_finite(dq: &DVector<f64>) -> bool {
    dq.iter().all(|v| v.is_finite())
}

/// Uniformly rescale `dq` so no component exceeds `max_step` in magnitude.
///
/// Returns `true` when the step was scaled.
#[inline]
pub fn apply_speed_limit(dq: &mut DVector<f64>, max_step: f64) -> bool {
    let max_speed = dq.iter().fold(0.0_f64, |m, v| m.max(v.abs()));
    if max_speed > max_step {
        *dq *= max_step / max_speed;
        true
    } else {
        false
    }
}

/// Clamp `angle` into the limits of joint `id`, logging when it fires.
fn clamp_to_limits<M: RobotModel + ?Sized>(model: &M, id: usize, angle: f64) -> f64 {
    let limits = model.joint_limits(id);
    if angle > limits.upper {
        warn!(
            "Upper joint limit error {}: {:.4} > {:.4}",
            model.joint_name(id),
            angle,
            limits.upper
        );
        limits.upper
    } else if angle < limits.lower {
        warn!(
            "Lower joint limit error {}: {:.4} < {:.4}",
            model.joint_name(id),
            angle,
            limits.lower
        );
        limits.lower
    } else {
        angle
    }
}

/// Run one IK step for `param`, moving its chain's joints in `model`.
///
/// `reference` is the full reference joint vector (model ordering). On
/// error the model is left untouched.
pub fn solve_limb<M: RobotModel + ?Sized>(
    model: &mut M,
    limb: &str,
    param: &mut LimbIkParam,
    reference: &[f64],
    gains: &SolveGains,
    debug_print: bool,
) -> Result<(), SolveError> {
    param.current = model
        .link_pose(&param.target_link)
        .ok_or_else(|| ModelError::UnknownLink(param.target_link.clone()))?;
    let cj = model.chain_jacobian(&param.chain)?;
    let ids = param.chain.joint_ids();
    let n = ids.len();

    // ── Task velocity ──
    let mut vel_p = param.target.position - param.current.position;
    let mut vel_r = difference_rotation(&param.current.rotation, &param.target.rotation);
    vel_p *= gains.cog;
    vel_r *= gains.cog;
    if gains.starting {
        vel_p *= gains.transition;
        vel_r *= gains.transition;
    }
    if debug_print {
        debug!("{limb} vel_r: {:.6?}", vel_r.as_slice());
    }
    let v = DVector::from_iterator(6, vel_p.iter().chain(vel_r.iter()).copied());
    let mut dq = &cj.pseudo_inverse * v;

    // ── Nullspace: joint-limit avoidance ──
    let mut u = DVector::from_iterator(
        n,
        ids.iter()
            .map(|&id| joint_limit_gradient(model.joint_angle(id), &model.joint_limits(id))),
    );
    if debug_print {
        debug!(
            "{limb} u: {:.6?} dqb: {:.6?}",
            u.as_slice(),
            (&cj.nullspace * &u).as_slice()
        );
    }
    if gains.starting {
        u *= gains.transition;
    }
    dq += &cj.nullspace * (u * JOINT_LIMIT_NULLSPACE_WEIGHT);

    // ── Nullspace: reference tracking ──
    let mut u = DVector::from_iterator(n, ids.iter().map(|&id| reference[id] - model.joint_angle(id)));
    if gains.starting {
        u *= gains.transition;
    }
    dq += &cj.nullspace * (u * REFERENCE_NULLSPACE_WEIGHT);

    if !all_finite(&dq) {
        return Err(SolveError::NonFinite {
            limb: limb.to_string(),
        });
    }

    if debug_print && dq.iter().any(|v| v.abs() > MAX_JOINT_STEP) {
        debug!("{limb} spdlmt: {:.6?}", dq.as_slice());
    }
    if apply_speed_limit(&mut dq, MAX_JOINT_STEP) && debug_print {
        debug!("{limb} spdlmt: {:.6?}", dq.as_slice());
    }

    for (j, &id) in ids.iter().enumerate() {
        let angle = clamp_to_limits(model, id, model.joint_angle(id) + dq[j]);
        model.set_joint_angle(id, angle);
    }

    model.calc_chain_forward_kinematics(&param.chain);
    Ok(())
}
