//! Root shift against the CoM error.

use abc_common::consts::COM_FEEDBACK_GAIN;
use abc_common::model::RobotModel;
use abc_control_unit::state::transition::smooth_gain;
use approx::assert_relative_eq;
use nalgebra::Vector3;

use super::{MAX, balanced, engaged, legs, run_ticks};

const BIAS_Y: f64 = 0.05;

#[test]
fn one_tick_shifts_root_by_gain_times_error() {
    let mut abc = engaged(balanced());
    let before = abc.model().root_pose().position;
    abc.model_mut().set_com_bias(Vector3::new(0.0, BIAS_Y, 0.0));
    run_ticks(&mut abc, 1);

    let after = abc.model().root_pose().position;
    assert_relative_eq!(after.y - before.y, -0.0025, epsilon = 1e-12);
    assert_relative_eq!(after.x, before.x, epsilon = 1e-12);
    assert_relative_eq!(after.z, before.z, epsilon = 1e-12);
}

#[test]
fn start_ramp_scales_the_shift() {
    let mut abc = balanced();
    abc.model_mut().set_com_bias(Vector3::new(0.0, BIAS_Y, 0.0));
    abc.start_abc(&legs()).unwrap();
    let before = abc.model().root_pose().position;
    run_ticks(&mut abc, 1);

    let after = abc.model().root_pose().position;
    let expected = -COM_FEEDBACK_GAIN * BIAS_Y * smooth_gain(MAX, MAX);
    assert_relative_eq!(after.y - before.y, expected, epsilon = 1e-12);
    assert!(expected.abs() < 0.1 * COM_FEEDBACK_GAIN * BIAS_Y);
}

#[test]
fn com_converges_over_the_feet() {
    let mut abc = engaged(balanced());
    abc.model_mut().set_com_bias(Vector3::new(0.0, BIAS_Y, 0.0));
    run_ticks(&mut abc, 200);

    let com = abc.model().center_of_mass();
    let target = abc.target_com();
    assert!((com.y - target.y).abs() < 1e-4, "com {com:?} target {target:?}");
    assert_relative_eq!(abc.model().root_pose().position.y, -BIAS_Y, epsilon = 1e-3);
}

#[test]
fn feet_stay_planted_while_root_moves() {
    let mut abc = engaged(balanced());
    let right = abc.limb("rleg").unwrap().target.position;
    let left = abc.limb("lleg").unwrap().target.position;
    abc.model_mut().set_com_bias(Vector3::new(0.02, -0.03, 0.0));
    run_ticks(&mut abc, 200);

    let rleg = abc.model().link_pose(abc_sim::biped::RLEG_ANKLE).unwrap();
    let lleg = abc.model().link_pose(abc_sim::biped::LLEG_ANKLE).unwrap();
    assert_relative_eq!(rleg.position, right, epsilon = 1e-4);
    assert_relative_eq!(lleg.position, left, epsilon = 1e-4);
}
