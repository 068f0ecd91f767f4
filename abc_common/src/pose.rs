//! Pose/frame primitive.
//!
//! A [`Pose`] is a position plus an orientation expressed in a parent
//! frame. The balancer uses it for link poses, the root pose, foot targets
//! and the fixed-leg reference frame.

use nalgebra::{Isometry3, Quaternion, Translation3, UnitQuaternion, Vector3};

/// Rigid-body pose: position + rotation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    /// Position [m].
    pub position: Vector3<f64>,
    /// Orientation.
    pub rotation: UnitQuaternion<f64>,
}

impl Default for Pose {
    fn default() -> Self {
        Self::identity()
    }
}

impl Pose {
    /// Create a pose from its parts.
    #[inline]
    pub fn new(position: Vector3<f64>, rotation: UnitQuaternion<f64>) -> Self {
        Self { position, rotation }
    }

    /// Identity pose (origin, no rotation).
    #[inline]
    pub fn identity() -> Self {
        Self::new(Vector3::zeros(), UnitQuaternion::identity())
    }

    /// Pure translation.
    #[inline]
    pub fn from_position(position: Vector3<f64>) -> Self {
        Self::new(position, UnitQuaternion::identity())
    }

    /// Planar pose: translation in XY plus a yaw about Z.
    pub fn from_xy_yaw(x: f64, y: f64, yaw: f64) -> Self {
        Self::new(
            Vector3::new(x, y, 0.0),
            UnitQuaternion::from_axis_angle(&Vector3::z_axis(), yaw),
        )
    }

    /// Build a pose from a boundary quaternion in `(x, y, z, w)` order.
    ///
    /// The quaternion is normalized before conversion. Returns `None` when
    /// it has zero or non-finite norm.
    pub fn from_xyzw(position: [f64; 3], xyzw: [f64; 4]) -> Option<Self> {
        let [x, y, z, w] = xyzw;
        let quat = Quaternion::new(w, x, y, z);
        let norm = quat.norm();
        if !norm.is_finite() || norm <= f64::EPSILON || position.iter().any(|v| !v.is_finite()) {
            return None;
        }
        Some(Self::new(
            Vector3::from(position),
            UnitQuaternion::from_quaternion(quat),
        ))
    }

    /// Convert to an `Isometry3`.
    #[inline]
    pub fn to_isometry(&self) -> Isometry3<f64> {
        Isometry3::from_parts(Translation3::from(self.position), self.rotation)
    }

    /// Convert from an `Isometry3`.
    #[inline]
    pub fn from_isometry(iso: &Isometry3<f64>) -> Self {
        Self::new(iso.translation.vector, iso.rotation)
    }

    /// `self ∘ other`: `other` expressed in this pose's local frame.
    #[inline]
    pub fn compose(&self, other: &Pose) -> Pose {
        Pose::new(
            self.position + self.rotation * other.position,
            self.rotation * other.rotation,
        )
    }

    /// Inverse transform.
    #[inline]
    pub fn inverse(&self) -> Pose {
        let inv = self.rotation.inverse();
        Pose::new(-(inv * self.position), inv)
    }

    /// Local-frame transform taking `self` onto `other`.
    ///
    /// Satisfies `self.compose(&self.transformation(other)) == *other`.
    #[inline]
    pub fn transformation(&self, other: &Pose) -> Pose {
        self.inverse().compose(other)
    }

    /// Apply `delta` in this pose's local frame.
    #[inline]
    pub fn transform_local(&mut self, delta: &Pose) {
        *self = self.compose(delta);
    }

    /// Map a point from this pose's local frame to the parent frame.
    #[inline]
    pub fn transform_point(&self, point: &Vector3<f64>) -> Vector3<f64> {
        self.position + self.rotation * point
    }

    /// Weighted interpolation from `a` (ratio 0) to `b` (ratio 1).
    ///
    /// Position is blended linearly. Rotation follows the minimal rotation
    /// from `a` to `b`, scaled by `ratio`.
    pub fn interpolate(a: &Pose, b: &Pose, ratio: f64) -> Pose {
        let position = a.position * (1.0 - ratio) + b.position * ratio;
        let relative = (a.rotation.inverse() * b.rotation).scaled_axis();
        let rotation = a.rotation * UnitQuaternion::from_scaled_axis(relative * ratio);
        Pose::new(position, rotation)
    }
}

/// World-frame rotation vector of the minimal rotation taking `from` onto `to`.
///
/// The returned vector's direction is the rotation axis and its norm the
/// angle in `[0, π]`.
#[inline]
pub fn difference_rotation(
    from: &UnitQuaternion<f64>,
    to: &UnitQuaternion<f64>,
) -> Vector3<f64> {
    from * (from.inverse() * to).scaled_axis()
}
