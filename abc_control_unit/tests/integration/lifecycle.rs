//! Mode lifecycle: IDLE → ABC → SYNC → IDLE, and rejected commands.

use abc_control_unit::error::CommandError;
use abc_control_unit::state::mode::ControlMode;
use abc_control_unit::state::walking::WalkingFlags;

use super::{MAX, balanced, engaged, legs, run_ticks};

#[test]
fn start_arms_full_ramp() {
    let mut abc = balanced();
    abc.start_abc(&legs()).unwrap();
    assert_eq!(abc.mode(), ControlMode::Abc);
    assert_eq!(abc.transition().signed_count(), -i64::from(MAX));
    assert_eq!(abc.limbs().count(), 2);
}

#[test]
fn second_start_is_rejected_without_side_effects() {
    let mut abc = balanced();
    abc.start_abc(&legs()).unwrap();
    run_ticks(&mut abc, 3);
    assert_eq!(abc.transition().signed_count(), -37);

    let err = abc.start_abc(&legs()).unwrap_err();
    assert!(matches!(
        err,
        CommandError::InvalidMode {
            expected: ControlMode::Idle,
            actual: ControlMode::Abc
        }
    ));
    assert_eq!(abc.transition().signed_count(), -37);
    assert_eq!(abc.mode(), ControlMode::Abc);
}

#[test]
fn stop_ramps_back_to_idle() {
    let mut abc = engaged(balanced());
    abc.stop_abc().unwrap();
    assert_eq!(abc.mode(), ControlMode::Sync);
    assert_eq!(abc.transition().signed_count(), i64::from(MAX));

    for tick in 1..MAX {
        run_ticks(&mut abc, 1);
        assert_eq!(abc.mode(), ControlMode::Sync, "tick {tick}");
    }
    run_ticks(&mut abc, 1);
    assert_eq!(abc.mode(), ControlMode::Idle);
    assert_eq!(abc.transition().signed_count(), 0);
}

#[test]
fn stop_during_start_ramp_takes_full_ramp_to_idle() {
    let mut abc = balanced();
    abc.start_abc(&legs()).unwrap();
    abc.stop_abc().unwrap();
    assert_eq!(abc.mode(), ControlMode::Sync);
    assert_eq!(abc.transition().signed_count(), i64::from(MAX));

    for tick in 1..MAX {
        run_ticks(&mut abc, 1);
        assert_eq!(abc.mode(), ControlMode::Sync, "tick {tick}");
        assert_eq!(abc.transition().signed_count(), i64::from(MAX - tick));
    }
    run_ticks(&mut abc, 1);
    assert_eq!(abc.mode(), ControlMode::Idle);
    assert_eq!(abc.transition().signed_count(), 0);
}

#[test]
fn stop_outside_abc_is_rejected() {
    let mut abc = balanced();
    assert!(abc.stop_abc().is_err());
    assert_eq!(abc.mode(), ControlMode::Idle);

    let mut abc = engaged(abc);
    abc.stop_abc().unwrap();
    run_ticks(&mut abc, 5);
    let count = abc.transition().signed_count();
    assert!(matches!(
        abc.stop_abc(),
        Err(CommandError::InvalidMode {
            actual: ControlMode::Sync,
            ..
        })
    ));
    assert_eq!(abc.transition().signed_count(), count);
}

#[test]
fn restart_after_idle() {
    let mut abc = engaged(balanced());
    abc.stop_abc().unwrap();
    run_ticks(&mut abc, MAX as usize);
    assert_eq!(abc.mode(), ControlMode::Idle);

    abc.start_abc(&legs()).unwrap();
    assert_eq!(abc.mode(), ControlMode::Abc);
    assert_eq!(abc.transition().signed_count(), -i64::from(MAX));
    assert_eq!(abc.limbs().count(), 2);
}

#[test]
fn stop_while_walking_drops_footsteps() {
    let mut abc = engaged(balanced());
    abc.go_pos(&abc_common::command::GoPosCommand {
        x: 0.3,
        y: 0.0,
        yaw: 0.0,
    })
    .unwrap();
    assert!(abc.walking_flags().is_walking_and_solved());
    assert!(abc.footstep_count() > 0);

    abc.stop_abc().unwrap();
    assert_eq!(abc.footstep_count(), 0);
    assert_eq!(abc.walking_flags(), WalkingFlags::empty());
    assert_eq!(abc.mode(), ControlMode::Sync);
}
