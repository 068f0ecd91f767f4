//! Shared fixtures for the integration tests.

mod com_correction;
mod equilibrium;
mod footsteps;
mod lifecycle;
mod limits;
mod transition;

use abc_common::command::LimbDefinition;
use abc_common::consts::{LEFT_LEG, RIGHT_LEG};
use abc_control_unit::control::balance::AutoBalancer;
use abc_sim::biped::{LLEG_ANKLE, RLEG_ANKLE, WAIST};
use abc_sim::{ScriptedGait, SimBiped, SimBipedParams};
use nalgebra::Vector3;

/// Control period giving a 40-tick transition ramp.
pub const DT: f64 = 0.05;

/// Transition ramp length at [`DT`].
pub const MAX: u32 = 40;

/// Both legs, waist-rooted.
pub fn legs() -> Vec<LimbDefinition> {
    vec![
        LimbDefinition::new(RIGHT_LEG, WAIST, RLEG_ANKLE),
        LimbDefinition::new(LEFT_LEG, WAIST, LLEG_ANKLE),
    ]
}

/// Gait generator with the simulated biped's foot spacing.
pub fn gait() -> Box<ScriptedGait> {
    Box::new(ScriptedGait::new(
        DT,
        [Vector3::new(0.0, -0.09, 0.0), Vector3::new(0.0, 0.09, 0.0)],
    ))
}

/// Balancer over a biped with `params`, fed the standing posture.
pub fn balancer(params: SimBipedParams) -> AutoBalancer<SimBiped> {
    let mut abc = AutoBalancer::new(SimBiped::new(params), Some(gait()), DT, 0);
    abc.set_reference(&SimBiped::standing_posture())
        .expect("standing posture matches the model");
    abc
}

/// Balancer over a massless-leg biped: CoM sits over the feet when standing.
pub fn balanced() -> AutoBalancer<SimBiped> {
    balancer(SimBipedParams::massless_legs())
}

/// Run `n` ticks, returning the last output.
pub fn run_ticks(abc: &mut AutoBalancer<SimBiped>, n: usize) -> Vec<f64> {
    let mut out = Vec::new();
    for _ in 0..n {
        assert!(abc.tick(&mut out));
    }
    out
}

/// Start balance control and run the start ramp to completion.
pub fn engaged(mut abc: AutoBalancer<SimBiped>) -> AutoBalancer<SimBiped> {
    abc.start_abc(&legs()).expect("start from IDLE");
    run_ticks(&mut abc, MAX as usize);
    assert_eq!(abc.transition().signed_count(), 0);
    abc
}
