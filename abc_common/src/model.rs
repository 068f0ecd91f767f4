//! Robot model contract.
//!
//! The balancer never owns a kinematics implementation. It drives any
//! type implementing [`RobotModel`], which exposes joint storage with
//! limits, a floating root pose, link lookup by name, forward kinematics,
//! the whole-body centre of mass and per-chain Jacobians.
//!
//! # Frames
//!
//! All poses returned by the model are expressed in the world frame.
//! Chain Jacobians map joint velocities of the chain to the world-frame
//! twist `[linear; angular]` of the chain's target link, with the base
//! link held fixed.

use nalgebra::{DMatrix, Vector3};
use thiserror::Error;

use crate::consts::PSEUDO_INVERSE_EPSILON;
use crate::pose::Pose;

/// Error types for robot model queries.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    /// No link with this name exists in the model.
    #[error("Unknown link: {0}")]
    UnknownLink(String),

    /// The target link is not a descendant of the base link.
    #[error("No kinematic chain from {base} to {target}")]
    NoChain {
        /// Base link name.
        base: String,
        /// Target link name.
        target: String,
    },

    /// Pseudo-inverse of the chain Jacobian could not be computed.
    #[error("Jacobian pseudo-inverse failed for {base} -> {target}: {reason}")]
    Singular {
        /// Base link name.
        base: String,
        /// Target link name.
        target: String,
        /// Reason reported by the decomposition.
        reason: String,
    },
}

/// Lower/upper position limit of a joint [rad].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JointLimits {
    /// Lower limit.
    pub lower: f64,
    /// Upper limit.
    pub upper: f64,
}

impl JointLimits {
    /// Create a limit pair.
    #[inline]
    pub const fn new(lower: f64, upper: f64) -> Self {
        Self { lower, upper }
    }

    /// Centre of the range.
    #[inline]
    pub fn midpoint(&self) -> f64 {
        (self.upper + self.lower) / 2.0
    }

    /// Half of the range width.
    #[inline]
    pub fn half_range(&self) -> f64 {
        (self.upper - self.lower) / 2.0
    }

    /// Whether `angle` lies inside the closed range.
    #[inline]
    pub fn contains(&self, angle: f64) -> bool {
        angle >= self.lower && angle <= self.upper
    }
}

/// Bound kinematic chain: ordered joint indices from base link to target link.
///
/// Produced by [`RobotModel::chain`]; only valid for the model that built it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainHandle {
    base_link: String,
    target_link: String,
    joint_ids: Vec<usize>,
}

impl ChainHandle {
    /// Create a chain handle. Intended for [`RobotModel`] implementations.
    pub fn new(base_link: &str, target_link: &str, joint_ids: Vec<usize>) -> Self {
        Self {
            base_link: base_link.to_string(),
            target_link: target_link.to_string(),
            joint_ids,
        }
    }

    /// Base link name.
    #[inline]
    pub fn base_link(&self) -> &str {
        &self.base_link
    }

    /// Target (end-effector) link name.
    #[inline]
    pub fn target_link(&self) -> &str {
        &self.target_link
    }

    /// Model joint indices in base → target order.
    #[inline]
    pub fn joint_ids(&self) -> &[usize] {
        &self.joint_ids
    }

    /// Number of joints in the chain.
    #[inline]
    pub fn dof(&self) -> usize {
        self.joint_ids.len()
    }
}

/// Jacobian of a chain with its pseudo-inverse and nullspace projector.
#[derive(Debug, Clone)]
pub struct ChainJacobian {
    /// 6×n task Jacobian `[linear; angular]`.
    pub jacobian: DMatrix<f64>,
    /// n×6 pseudo-inverse.
    pub pseudo_inverse: DMatrix<f64>,
    /// n×n nullspace projector `I − J⁺J`.
    pub nullspace: DMatrix<f64>,
}

impl ChainJacobian {
    /// Derive pseudo-inverse (SVD) and nullspace projector from a Jacobian.
    pub fn from_jacobian(chain: &ChainHandle, jacobian: DMatrix<f64>) -> Result<Self, ModelError> {
        let n = jacobian.ncols();
        let pseudo_inverse = jacobian
            .clone()
            .pseudo_inverse(PSEUDO_INVERSE_EPSILON)
            .map_err(|reason| ModelError::Singular {
                base: chain.base_link.clone(),
                target: chain.target_link.clone(),
                reason: reason.to_string(),
            })?;
        let nullspace = DMatrix::identity(n, n) - &pseudo_inverse * &jacobian;
        Ok(Self {
            jacobian,
            pseudo_inverse,
            nullspace,
        })
    }
}

/// Narrow kinematic-model interface consumed by the balancer.
///
/// Joint indices run `0..num_joints()` and match the ordering of the
/// reference and output joint vectors.
pub trait RobotModel: Send {
    /// Number of joints.
    fn num_joints(&self) -> usize;

    /// Joint name (for diagnostics).
    fn joint_name(&self, id: usize) -> &str;

    /// Current joint angle [rad].
    fn joint_angle(&self, id: usize) -> f64;

    /// Overwrite a joint angle [rad]. Poses are stale until forward
    /// kinematics is recomputed.
    fn set_joint_angle(&mut self, id: usize, angle: f64);

    /// Joint position limits.
    fn joint_limits(&self, id: usize) -> JointLimits;

    /// World pose of the floating root link.
    fn root_pose(&self) -> Pose;

    /// Overwrite the root pose. Poses are stale until forward kinematics
    /// is recomputed.
    fn set_root_pose(&mut self, pose: Pose);

    /// World pose of a link as of the last forward-kinematics pass.
    fn link_pose(&self, name: &str) -> Option<Pose>;

    /// Recompute all link poses from the root pose and joint angles.
    fn calc_forward_kinematics(&mut self);

    /// Whole-body centre of mass as of the last forward-kinematics pass.
    fn center_of_mass(&self) -> Vector3<f64>;

    /// Bind the chain between two links.
    fn chain(&self, base_link: &str, target_link: &str) -> Result<ChainHandle, ModelError>;

    /// Jacobian, pseudo-inverse and nullspace projector of a chain at the
    /// current configuration.
    fn chain_jacobian(&self, chain: &ChainHandle) -> Result<ChainJacobian, ModelError>;

    /// Recompute link poses after the joints of one chain changed.
    ///
    /// Defaults to a full forward-kinematics pass.
    fn calc_chain_forward_kinematics(&mut self, _chain: &ChainHandle) {
        self.calc_forward_kinematics();
    }

    /// Copy all joint angles into `out` (`out.len()` must equal `num_joints()`).
    fn copy_joint_angles(&self, out: &mut [f64]) {
        for (id, q) in out.iter_mut().enumerate() {
            *q = self.joint_angle(id);
        }
    }
}
