//! Stop ramp: logistic blend from the frozen posture to the reference.

use abc_control_unit::state::mode::ControlMode;
use abc_control_unit::state::transition::smooth_gain;
use abc_sim::SimBiped;
use approx::assert_relative_eq;
use nalgebra::Vector3;

use super::{MAX, balanced, engaged, run_ticks};

/// Chain joints of both legs.
const CHAIN_JOINTS: std::ops::Range<usize> = 0..12;

#[test]
fn stop_blends_chain_joints_to_reference() {
    let mut abc = engaged(balanced());
    abc.model_mut().set_com_bias(Vector3::new(0.0, 0.05, 0.0));
    let origin = run_ticks(&mut abc, 100);
    let reference = SimBiped::standing_posture();
    assert!(
        CHAIN_JOINTS.clone().any(|id| (origin[id] - reference[id]).abs() > 1e-3),
        "balanced posture should differ from the reference"
    );

    abc.stop_abc().unwrap();
    for k in 1..=MAX {
        let out = run_ticks(&mut abc, 1);
        let gain = smooth_gain(MAX + 1 - k, MAX);
        for id in CHAIN_JOINTS {
            let expected = origin[id] + (reference[id] - origin[id]) * gain;
            assert_relative_eq!(out[id], expected, epsilon = 1e-12);
        }
        assert_eq!(out[12], reference[12]);
    }
    assert_eq!(abc.mode(), ControlMode::Idle);

    // The ramp ends just short of unity; the next tick is pure reference.
    let out = run_ticks(&mut abc, 1);
    assert_eq!(out, reference);
}

#[test]
fn blend_is_monotone() {
    let mut abc = engaged(balanced());
    abc.model_mut().set_com_bias(Vector3::new(0.0, -0.04, 0.0));
    let origin = run_ticks(&mut abc, 100);
    let reference = SimBiped::standing_posture();

    abc.stop_abc().unwrap();
    let mut previous = origin.clone();
    for _ in 0..MAX {
        let out = run_ticks(&mut abc, 1);
        for id in CHAIN_JOINTS {
            let before = (previous[id] - reference[id]).abs();
            let after = (out[id] - reference[id]).abs();
            assert!(after <= before + 1e-15, "joint {id} moved away from reference");
        }
        previous = out;
    }
}
