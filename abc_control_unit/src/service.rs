//! Command surface of the balancer.
//!
//! One `parking_lot::Mutex` guards the engine. The periodic tick and every
//! command take the same lock, so a command lands either entirely before or
//! entirely after a tick. Commands report a plain `bool`; rejections are
//! logged with their reason.
//!
//! [`BalancerService::wait_foot_steps`] and [`BalancerService::go_stop`]
//! block until the gait generator finishes and must not be called from the
//! tick thread.

use std::thread;
use std::time::Duration;

use abc_common::command::{Footstep, GoPosCommand, LimbDefinition, VelocityCommand};
use abc_common::consts::WAIT_POLL_INTERVAL_US;
use abc_common::model::RobotModel;
use parking_lot::Mutex;
use tracing::{info, warn};

use crate::control::balance::{AutoBalancer, WalkStop};
use crate::error::CommandError;
use crate::state::mode::ControlMode;

/// Thread-safe wrapper around [`AutoBalancer`].
pub struct BalancerService<M: RobotModel> {
    balancer: Mutex<AutoBalancer<M>>,
}

fn report(command: &str, result: Result<(), CommandError>) -> bool {
    match result {
        Ok(()) => true,
        Err(e) => {
            warn!("{command} rejected: {e}");
            false
        }
    }
}

impl<M: RobotModel> BalancerService<M> {
    /// Wrap an engine.
    pub fn new(balancer: AutoBalancer<M>) -> Self {
        Self {
            balancer: Mutex::new(balancer),
        }
    }

    /// Run `f` with the engine locked.
    pub fn with_balancer<R>(&self, f: impl FnOnce(&mut AutoBalancer<M>) -> R) -> R {
        f(&mut self.balancer.lock())
    }

    /// Current control mode.
    pub fn mode(&self) -> ControlMode {
        self.balancer.lock().mode()
    }

    // ─── Periodic path ──────────────────────────────────────────────

    /// Store the latest reference joint vector.
    pub fn write_reference(&self, reference: &[f64]) -> bool {
        report("reference", self.balancer.lock().set_reference(reference))
    }

    /// Run one tick; see [`AutoBalancer::tick`].
    pub fn tick_into(&self, output: &mut Vec<f64>) -> bool {
        self.balancer.lock().tick(output)
    }

    // ─── Commands ───────────────────────────────────────────────────

    /// Engage balance control.
    pub fn start_auto_balancer(&self, limbs: &[LimbDefinition]) -> bool {
        report("startAutoBalancer", self.balancer.lock().start_abc(limbs))
    }

    /// Disengage balance control.
    pub fn stop_auto_balancer(&self) -> bool {
        report("stopAutoBalancer", self.balancer.lock().stop_abc())
    }

    /// Walk to `(x, y, yaw)` relative to the current foot midpoint.
    pub fn go_pos(&self, x: f64, y: f64, yaw: f64) -> bool {
        let goal = GoPosCommand { x, y, yaw };
        report("goPos", self.balancer.lock().go_pos(&goal))
    }

    /// Walk at `(vx, vy, vyaw)`.
    pub fn go_velocity(&self, vx: f64, vy: f64, vyaw: f64) -> bool {
        let velocity = VelocityCommand::new(vx, vy, vyaw);
        report("goVelocity", self.balancer.lock().go_velocity(&velocity))
    }

    /// Close velocity mode and block until the last footstep lands.
    pub fn go_stop(&self) -> bool {
        if !report("goStop", self.balancer.lock().finalize_velocity_mode()) {
            return false;
        }
        self.wait_foot_steps();
        true
    }

    /// Replace the footstep queue and walk it.
    ///
    /// An unknown leg tag aborts before anything is queued.
    pub fn set_foot_steps(&self, footsteps: &[Footstep]) -> bool {
        report("setFootSteps", self.balancer.lock().set_foot_steps(footsteps))
    }

    /// Two-phase stop-walking request.
    pub fn stop_walking(&self) -> WalkStop {
        self.balancer.lock().stop_walking()
    }

    /// Block until the generator stops producing a trajectory, then zero
    /// its offset velocity.
    ///
    /// Polls with a short sleep outside the lock. No timeout.
    pub fn wait_foot_steps(&self) {
        let poll = Duration::from_micros(WAIT_POLL_INTERVAL_US);
        while self.balancer.lock().walking_flags().is_walking_and_solved() {
            thread::sleep(poll);
        }
        thread::sleep(poll);
        self.balancer.lock().clear_offset_velocity();
        info!("Footsteps finished");
    }
}
