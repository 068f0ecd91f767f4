//! Joint limits, per-tick speed limit and IK failure handling.

use abc_common::consts::MAX_JOINT_STEP;
use abc_common::model::{ChainHandle, ChainJacobian, JointLimits, ModelError, RobotModel};
use abc_common::pose::Pose;
use abc_control_unit::control::balance::AutoBalancer;
use abc_sim::biped::{LLEG_ANKLE, RLEG_ANKLE};
use abc_sim::{SimBiped, SimBipedParams};
use nalgebra::Vector3;

use super::{DT, balanced, engaged, legs, run_ticks};

const CHAIN_JOINTS: std::ops::Range<usize> = 0..12;

fn assert_within_limits<M: RobotModel>(abc: &AutoBalancer<M>, out: &[f64]) {
    for id in CHAIN_JOINTS {
        let limits = abc.model().joint_limits(id);
        assert!(
            limits.contains(out[id]),
            "joint {id} = {} outside [{}, {}]",
            out[id],
            limits.lower,
            limits.upper
        );
    }
}

#[test]
fn large_disturbance_respects_limits() {
    let mut abc = engaged(balanced());
    abc.model_mut().set_com_bias(Vector3::new(0.0, 0.5, 0.0));
    for _ in 0..100 {
        let out = run_ticks(&mut abc, 1);
        assert_within_limits(&abc, &out);
    }
}

#[test]
fn joint_step_is_speed_limited() {
    let mut abc = engaged(balanced());
    abc.model_mut().set_com_bias(Vector3::new(0.0, 2.0, 0.0));
    let mut previous = SimBiped::standing_posture();
    abc.model().copy_joint_angles(&mut previous);
    for _ in 0..50 {
        let out = run_ticks(&mut abc, 1);
        for id in CHAIN_JOINTS {
            assert!(
                (out[id] - previous[id]).abs() <= MAX_JOINT_STEP + 1e-12,
                "joint {id} stepped {}",
                out[id] - previous[id]
            );
        }
        previous = out;
    }
}

#[test]
fn out_of_limit_reference_is_clamped() {
    let mut abc = balanced();
    let mut reference = SimBiped::standing_posture();
    reference[3] = -0.5;
    abc.set_reference(&reference).unwrap();
    let mut abc = engaged(abc);
    let out = run_ticks(&mut abc, 1);
    assert_within_limits(&abc, &out);
}

/// Simulated biped whose Jacobian for one foot always fails.
struct FailingChain {
    inner: SimBiped,
    failing: &'static str,
}

impl RobotModel for FailingChain {
    fn num_joints(&self) -> usize {
        self.inner.num_joints()
    }

    fn joint_name(&self, id: usize) -> &str {
        self.inner.joint_name(id)
    }

    fn joint_angle(&self, id: usize) -> f64 {
        self.inner.joint_angle(id)
    }

    fn set_joint_angle(&mut self, id: usize, angle: f64) {
        self.inner.set_joint_angle(id, angle);
    }

    fn joint_limits(&self, id: usize) -> JointLimits {
        self.inner.joint_limits(id)
    }

    fn root_pose(&self) -> Pose {
        self.inner.root_pose()
    }

    fn set_root_pose(&mut self, pose: Pose) {
        self.inner.set_root_pose(pose);
    }

    fn link_pose(&self, name: &str) -> Option<Pose> {
        self.inner.link_pose(name)
    }

    fn calc_forward_kinematics(&mut self) {
        self.inner.calc_forward_kinematics();
    }

    fn center_of_mass(&self) -> Vector3<f64> {
        self.inner.center_of_mass()
    }

    fn chain(&self, base_link: &str, target_link: &str) -> Result<ChainHandle, ModelError> {
        self.inner.chain(base_link, target_link)
    }

    fn chain_jacobian(&self, chain: &ChainHandle) -> Result<ChainJacobian, ModelError> {
        if chain.target_link() == self.failing {
            return Err(ModelError::Singular {
                base: chain.base_link().to_string(),
                target: chain.target_link().to_string(),
                reason: "scripted failure".to_string(),
            });
        }
        self.inner.chain_jacobian(chain)
    }
}

fn failing(link: &'static str) -> AutoBalancer<FailingChain> {
    let mut inner = SimBiped::new(SimBipedParams::massless_legs());
    inner.set_com_bias(Vector3::new(0.0, 0.05, 0.0));
    let mut abc = AutoBalancer::new(FailingChain { inner, failing: link }, None, DT, 0);
    abc.set_reference(&SimBiped::standing_posture()).unwrap();
    abc.start_abc(&legs()).unwrap();
    abc
}

fn run<M: RobotModel>(abc: &mut AutoBalancer<M>, n: usize) -> Vec<f64> {
    let mut out = Vec::new();
    for _ in 0..n {
        assert!(abc.tick(&mut out));
    }
    out
}

#[test]
fn failure_after_first_limb_keeps_earlier_result() {
    // Limbs solve in name order: lleg, then rleg.
    let mut abc = failing(RLEG_ANKLE);
    let reference = SimBiped::standing_posture();
    let out = run(&mut abc, 60);

    assert_eq!(&out[0..6], &reference[0..6]);
    assert!(
        (6..12).any(|id| (out[id] - reference[id]).abs() > 1e-6),
        "lleg should have been solved"
    );
}

#[test]
fn failure_on_first_limb_halts_the_rest() {
    let mut abc = failing(LLEG_ANKLE);
    let reference = SimBiped::standing_posture();
    let out = run(&mut abc, 60);

    assert_eq!(&out[0..12], &reference[0..12]);
    // The root still follows the CoM.
    assert!(abc.model().root_pose().position.y < -0.01);
}
