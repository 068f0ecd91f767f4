//! A balanced robot standing on its reference posture stays put.

use abc_common::model::RobotModel;
use abc_sim::SimBiped;
use approx::assert_relative_eq;

use super::{balanced, legs, run_ticks};

#[test]
fn balanced_posture_passes_through() {
    let mut abc = balanced();
    let reference = SimBiped::standing_posture();
    let root = abc.model().root_pose();
    abc.start_abc(&legs()).unwrap();

    // Through the start ramp and beyond.
    for _ in 0..60 {
        let out = run_ticks(&mut abc, 1);
        for (q, r) in out.iter().zip(&reference) {
            assert_relative_eq!(*q, *r, epsilon = 1e-9);
        }
    }
    assert_relative_eq!(abc.model().root_pose().position, root.position, epsilon = 1e-9);
}

#[test]
fn upper_body_joint_follows_reference() {
    let mut abc = balanced();
    let mut reference = SimBiped::standing_posture();
    reference[12] = 0.2;
    abc.set_reference(&reference).unwrap();
    abc.start_abc(&legs()).unwrap();

    for _ in 0..50 {
        let out = run_ticks(&mut abc, 1);
        assert_eq!(out[12], 0.2);
    }
}

#[test]
fn idle_output_is_reference() {
    let mut abc = balanced();
    let mut reference = SimBiped::standing_posture();
    reference[3] = 0.9;
    abc.set_reference(&reference).unwrap();
    assert_eq!(run_ticks(&mut abc, 1), reference);
}
