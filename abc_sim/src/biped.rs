//! Simulated floating-base biped.
//!
//! Link tree: `WAIST` root with a chest yaw joint and two 6-DoF legs
//! (hip yaw/roll/pitch, knee, ankle pitch/roll). Forward kinematics composes
//! each joint's fixed origin with its axis rotation; the chain Jacobian is
//! the geometric one, built from world-frame joint axes.
//!
//! Joint ordering: right leg `0..6`, left leg `6..12`, chest `12`.

use abc_common::model::{ChainHandle, ChainJacobian, JointLimits, ModelError, RobotModel};
use abc_common::pose::Pose;
use nalgebra::{DMatrix, Unit, UnitQuaternion, Vector3};

/// Root link name.
pub const WAIST: &str = "WAIST";
/// Right foot end-effector link.
pub const RLEG_ANKLE: &str = "RLEG_ANKLE";
/// Left foot end-effector link.
pub const LLEG_ANKLE: &str = "LLEG_ANKLE";
/// Upper-body link (outside both leg chains).
pub const CHEST: &str = "CHEST";

/// Number of joints per leg.
pub const LEG_DOF: usize = 6;

/// Standing leg posture: hip pitch, knee and ankle pitch bent so the leg
/// Jacobian stays full rank.
const STANDING_LEG: [f64; LEG_DOF] = [0.0, 0.0, -0.3, 0.6, -0.3, 0.0];

/// Geometry and mass distribution of the simulated biped.
#[derive(Debug, Clone, PartialEq)]
pub struct SimBipedParams {
    /// Lateral distance of each hip from the waist centre [m].
    pub hip_width: f64,
    /// Hip-to-knee length [m].
    pub thigh_length: f64,
    /// Knee-to-ankle length [m].
    pub shin_length: f64,
    /// Waist mass [kg].
    pub waist_mass: f64,
    /// Chest mass [kg].
    pub chest_mass: f64,
    /// Mass of every leg link [kg].
    pub leg_link_mass: f64,
}

impl Default for SimBipedParams {
    fn default() -> Self {
        Self {
            hip_width: 0.09,
            thigh_length: 0.3,
            shin_length: 0.3,
            waist_mass: 10.0,
            chest_mass: 5.0,
            leg_link_mass: 0.5,
        }
    }
}

impl SimBipedParams {
    /// Massless legs: the centre of mass then depends on the root pose only.
    pub fn massless_legs() -> Self {
        Self {
            leg_link_mass: 0.0,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone)]
struct SimJoint {
    name: String,
    /// Parent link index.
    parent: usize,
    /// Offset of the joint in the parent link frame.
    origin: Vector3<f64>,
    axis: Unit<Vector3<f64>>,
    angle: f64,
    limits: JointLimits,
}

#[derive(Debug, Clone)]
struct SimLink {
    name: String,
    parent_joint: Option<usize>,
    mass: f64,
    local_com: Vector3<f64>,
    world: Pose,
}

/// Simulated biped implementing [`RobotModel`].
#[derive(Debug, Clone)]
pub struct SimBiped {
    params: SimBipedParams,
    links: Vec<SimLink>,
    joints: Vec<SimJoint>,
    com_bias: Vector3<f64>,
}

impl Default for SimBiped {
    fn default() -> Self {
        Self::new(SimBipedParams::default())
    }
}

impl SimBiped {
    /// Build the biped in its standing posture with both ankles on the
    /// ground plane.
    pub fn new(params: SimBipedParams) -> Self {
        let mut robot = Self {
            links: vec![SimLink {
                name: WAIST.to_string(),
                parent_joint: None,
                mass: params.waist_mass,
                local_com: Vector3::new(0.0, 0.0, 0.05),
                world: Pose::identity(),
            }],
            joints: Vec::with_capacity(2 * LEG_DOF + 1),
            com_bias: Vector3::zeros(),
            params,
        };

        robot.add_leg("RLEG", -1.0);
        robot.add_leg("LLEG", 1.0);
        let chest_mass = robot.params.chest_mass;
        robot.add_joint(
            "CHEST_Y",
            0,
            CHEST,
            Vector3::new(0.0, 0.0, 0.1),
            Vector3::z_axis(),
            JointLimits::new(-1.0, 1.0),
            chest_mass,
            Vector3::new(0.0, 0.0, 0.2),
        );

        for (id, q) in Self::standing_posture().into_iter().enumerate() {
            robot.joints[id].angle = q;
        }
        robot.calc_forward_kinematics();
        // Link `LEG_DOF` is the right ankle.
        let ankle_z = robot.links[LEG_DOF].world.position.z;
        robot.links[0].world.position.z = -ankle_z;
        robot.calc_forward_kinematics();
        robot
    }

    /// Joint vector of the standing posture.
    pub fn standing_posture() -> Vec<f64> {
        let mut q = Vec::with_capacity(2 * LEG_DOF + 1);
        q.extend_from_slice(&STANDING_LEG);
        q.extend_from_slice(&STANDING_LEG);
        q.push(0.0);
        q
    }

    /// Geometry in use.
    pub fn params(&self) -> &SimBipedParams {
        &self.params
    }

    /// Constant offset added to the computed centre of mass, used to script
    /// CoM disturbances.
    pub fn set_com_bias(&mut self, bias: Vector3<f64>) {
        self.com_bias = bias;
    }

    /// Current CoM disturbance.
    pub fn com_bias(&self) -> Vector3<f64> {
        self.com_bias
    }

    fn link_index(&self, name: &str) -> Option<usize> {
        self.links.iter().position(|l| l.name == name)
    }

    fn add_leg(&mut self, prefix: &str, side: f64) {
        let p = &self.params;
        let (width, thigh, shin, mass) = (p.hip_width, p.thigh_length, p.shin_length, p.leg_link_mass);

        let hip_y = self.add_joint(
            &format!("{prefix}_HIP_Y"),
            0,
            &format!("{prefix}_HIP_Y_LINK"),
            Vector3::new(0.0, side * width, 0.0),
            Vector3::z_axis(),
            JointLimits::new(-1.0, 1.0),
            mass,
            Vector3::zeros(),
        );
        let hip_r = self.add_joint(
            &format!("{prefix}_HIP_R"),
            hip_y,
            &format!("{prefix}_HIP_R_LINK"),
            Vector3::zeros(),
            Vector3::x_axis(),
            JointLimits::new(-0.6, 0.6),
            mass,
            Vector3::zeros(),
        );
        let thigh_link = self.add_joint(
            &format!("{prefix}_HIP_P"),
            hip_r,
            &format!("{prefix}_THIGH"),
            Vector3::zeros(),
            Vector3::y_axis(),
            JointLimits::new(-1.8, 0.8),
            mass,
            Vector3::new(0.0, 0.0, -thigh / 2.0),
        );
        let shin_link = self.add_joint(
            &format!("{prefix}_KNEE"),
            thigh_link,
            &format!("{prefix}_SHIN"),
            Vector3::new(0.0, 0.0, -thigh),
            Vector3::y_axis(),
            JointLimits::new(0.0, 2.4),
            mass,
            Vector3::new(0.0, 0.0, -shin / 2.0),
        );
        let ankle_p = self.add_joint(
            &format!("{prefix}_ANKLE_P"),
            shin_link,
            &format!("{prefix}_ANKLE_P_LINK"),
            Vector3::new(0.0, 0.0, -shin),
            Vector3::y_axis(),
            JointLimits::new(-1.2, 0.8),
            mass,
            Vector3::zeros(),
        );
        self.add_joint(
            &format!("{prefix}_ANKLE_R"),
            ankle_p,
            &format!("{prefix}_ANKLE"),
            Vector3::zeros(),
            Vector3::x_axis(),
            JointLimits::new(-0.6, 0.6),
            mass,
            Vector3::zeros(),
        );
    }

    /// Append a revolute joint and its child link; returns the child link index.
    #[allow(clippy::too_many_arguments)]
    fn add_joint(
        &mut self,
        joint_name: &str,
        parent: usize,
        link_name: &str,
        origin: Vector3<f64>,
        axis: Unit<Vector3<f64>>,
        limits: JointLimits,
        mass: f64,
        local_com: Vector3<f64>,
    ) -> usize {
        let joint_id = self.joints.len();
        self.joints.push(SimJoint {
            name: joint_name.to_string(),
            parent,
            origin,
            axis,
            angle: 0.0,
            limits,
        });
        self.links.push(SimLink {
            name: link_name.to_string(),
            parent_joint: Some(joint_id),
            mass,
            local_com,
            world: Pose::identity(),
        });
        self.links.len() - 1
    }
}

impl RobotModel for SimBiped {
    fn num_joints(&self) -> usize {
        self.joints.len()
    }

    fn joint_name(&self, id: usize) -> &str {
        &self.joints[id].name
    }

    fn joint_angle(&self, id: usize) -> f64 {
        self.joints[id].angle
    }

    fn set_joint_angle(&mut self, id: usize, angle: f64) {
        self.joints[id].angle = angle;
    }

    fn joint_limits(&self, id: usize) -> JointLimits {
        self.joints[id].limits
    }

    fn root_pose(&self) -> Pose {
        self.links[0].world
    }

    fn set_root_pose(&mut self, pose: Pose) {
        self.links[0].world = pose;
    }

    fn link_pose(&self, name: &str) -> Option<Pose> {
        self.link_index(name).map(|i| self.links[i].world)
    }

    fn calc_forward_kinematics(&mut self) {
        // Links are stored parent-first, so one pass in joint order suffices.
        for (id, joint) in self.joints.iter().enumerate() {
            let parent = self.links[joint.parent].world;
            let local = Pose::new(
                joint.origin,
                UnitQuaternion::from_axis_angle(&joint.axis, joint.angle),
            );
            self.links[id + 1].world = parent.compose(&local);
        }
    }

    fn center_of_mass(&self) -> Vector3<f64> {
        let mut total = 0.0;
        let mut moment = Vector3::zeros();
        for link in &self.links {
            total += link.mass;
            moment += link.world.transform_point(&link.local_com) * link.mass;
        }
        let com = if total > 0.0 {
            moment / total
        } else {
            self.links[0].world.position
        };
        com + self.com_bias
    }

    fn chain(&self, base_link: &str, target_link: &str) -> Result<ChainHandle, ModelError> {
        let base = self
            .link_index(base_link)
            .ok_or_else(|| ModelError::UnknownLink(base_link.to_string()))?;
        let mut link = self
            .link_index(target_link)
            .ok_or_else(|| ModelError::UnknownLink(target_link.to_string()))?;

        let no_chain = || ModelError::NoChain {
            base: base_link.to_string(),
            target: target_link.to_string(),
        };

        let mut joint_ids = Vec::new();
        while link != base {
            let joint = self.links[link].parent_joint.ok_or_else(no_chain)?;
            joint_ids.push(joint);
            link = self.joints[joint].parent;
        }
        if joint_ids.is_empty() {
            return Err(no_chain());
        }
        joint_ids.reverse();
        Ok(ChainHandle::new(base_link, target_link, joint_ids))
    }

    fn chain_jacobian(&self, chain: &ChainHandle) -> Result<ChainJacobian, ModelError> {
        let target = self
            .link_index(chain.target_link())
            .ok_or_else(|| ModelError::UnknownLink(chain.target_link().to_string()))?;
        let end = self.links[target].world.position;

        let mut jacobian = DMatrix::zeros(6, chain.dof());
        for (col, &id) in chain.joint_ids().iter().enumerate() {
            let joint = &self.joints[id];
            let parent = &self.links[joint.parent].world;
            let origin = parent.transform_point(&joint.origin);
            let axis = parent.rotation * joint.axis.into_inner();
            let linear = axis.cross(&(end - origin));
            for row in 0..3 {
                jacobian[(row, col)] = linear[row];
                jacobian[(row + 3, col)] = axis[row];
            }
        }
        ChainJacobian::from_jacobian(chain, jacobian)
    }
}
