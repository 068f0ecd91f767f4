//! Footstep commands: validation before anything is queued, then walking.

use abc_common::command::{Footstep, GoPosCommand};
use abc_common::model::RobotModel;
use abc_control_unit::error::CommandError;
use abc_control_unit::service::BalancerService;
use abc_control_unit::state::mode::ControlMode;
use abc_sim::biped::{LLEG_ANKLE, RLEG_ANKLE};
use approx::assert_relative_eq;
use nalgebra::Vector3;

use super::{balanced, engaged, run_ticks};

fn step(leg: &str, x: f64, y: f64) -> Footstep {
    Footstep {
        leg: leg.to_string(),
        position: [x, y, 0.0],
        orientation: [0.0, 0.0, 0.0, 1.0],
    }
}

#[test]
fn unknown_leg_rejects_whole_sequence() {
    let mut abc = engaged(balanced());
    let steps = [step("rleg", 0.05, -0.09), step("middle", 0.05, 0.0)];
    assert_eq!(
        abc.set_foot_steps(&steps),
        Err(CommandError::UnknownLeg("middle".to_string()))
    );
    assert_eq!(abc.footstep_count(), 0);
    assert!(!abc.walking_flags().is_walking_and_solved());
    assert_eq!(abc.mode(), ControlMode::Abc);
}

#[test]
fn unknown_leg_keeps_existing_queue() {
    let mut abc = engaged(balanced());
    abc.go_pos(&GoPosCommand {
        x: 0.3,
        y: 0.0,
        yaw: 0.0,
    })
    .unwrap();
    let queued = abc.footstep_count();
    let flags = abc.walking_flags();

    assert!(abc.set_foot_steps(&[step("middle", 0.0, 0.0)]).is_err());
    assert_eq!(abc.footstep_count(), queued);
    assert_eq!(abc.walking_flags(), flags);
}

#[test]
fn service_reports_false_on_unknown_leg() {
    let service = BalancerService::new(engaged(balanced()));
    assert!(!service.set_foot_steps(&[step("middle", 0.0, 0.0)]));
    assert_eq!(service.with_balancer(|b| b.footstep_count()), 0);
}

#[test]
fn footsteps_outside_abc_are_rejected() {
    let mut abc = balanced();
    let steps = [step("rleg", 0.05, -0.09), step("lleg", 0.05, 0.09)];
    assert!(matches!(
        abc.set_foot_steps(&steps),
        Err(CommandError::InvalidMode { .. })
    ));
    assert_eq!(abc.footstep_count(), 0);
}

#[test]
fn walks_footstep_sequence() {
    let mut abc = engaged(balanced());
    let steps = [step("rleg", 0.05, -0.09), step(":lleg", 0.05, 0.09)];
    abc.set_foot_steps(&steps).unwrap();
    assert!(abc.walking_flags().is_walking_and_solved());

    run_ticks(&mut abc, 300);
    assert!(!abc.walking_flags().is_walking_and_solved());
    assert_eq!(abc.footstep_count(), 0);

    let rleg = abc.model().link_pose(RLEG_ANKLE).unwrap();
    let lleg = abc.model().link_pose(LLEG_ANKLE).unwrap();
    assert_relative_eq!(rleg.position, Vector3::new(0.05, -0.09, 0.0), epsilon = 1e-4);
    assert_relative_eq!(lleg.position, Vector3::new(0.05, 0.09, 0.0), epsilon = 1e-4);
}

#[test]
fn orientation_is_normalized() {
    let mut abc = engaged(balanced());
    let mut scaled = step("rleg", 0.0, -0.09);
    scaled.orientation = [0.0, 0.0, 0.0, 2.0];
    assert!(abc.set_foot_steps(&[scaled]).is_ok());

    let mut abc = engaged(balanced());
    let mut zero = step("rleg", 0.0, -0.09);
    zero.orientation = [0.0; 4];
    assert!(matches!(
        abc.set_foot_steps(&[zero]),
        Err(CommandError::InvalidFootstep(_))
    ));
    assert_eq!(abc.footstep_count(), 0);
}
