//! Scripted gait generator.
//!
//! Replays a footstep queue one step at a time: the stepping foot travels
//! from its current pose to the queued pose over a fixed number of ticks
//! (linear in the plane, a half-sine lift in height) while the other foot
//! stays put. The CoM target sits over the midpoint of the two feet.
//!
//! Velocity mode keeps the queue topped up with steps whose length follows
//! the commanded velocity. There is no dynamics or preview control here;
//! the generator only exists to drive the balancer's walking paths.

use std::collections::VecDeque;
use std::f64::consts::PI;

use abc_common::command::{GoPosCommand, VelocityCommand};
use abc_common::gait::{GaitGenerator, LegSide};
use abc_common::pose::Pose;
use nalgebra::Vector3;
use tracing::debug;

/// Duration of one footstep [s].
pub const STEP_SECONDS: f64 = 0.5;

/// Longest forward stride generated by `go_pos` [m].
pub const MAX_STRIDE: f64 = 0.15;

/// Longest lateral stride generated by `go_pos` [m].
pub const MAX_SIDE_STRIDE: f64 = 0.05;

/// Largest heading change per stride generated by `go_pos` [rad].
pub const MAX_STRIDE_YAW: f64 = 10.0 * PI / 180.0;

/// Peak swing foot lift [m].
pub const STEP_HEIGHT: f64 = 0.05;

#[derive(Debug, Clone, Copy)]
struct QueuedStep {
    leg: LegSide,
    pose: Pose,
}

#[derive(Debug, Clone, Copy)]
struct SwingPhase {
    leg: LegSide,
    from: Pose,
    to: Pose,
    tick: usize,
}

/// Footstep replayer implementing [`GaitGenerator`].
#[derive(Debug, Clone)]
pub struct ScriptedGait {
    step_ticks: usize,
    /// Nominal foot offsets from the mid frame, indexed by [`LegSide::index`].
    leg_offsets: [Vector3<f64>; 2],
    queue: VecDeque<QueuedStep>,
    swing_phase: Option<SwingPhase>,
    feet: [Pose; 2],
    support: LegSide,
    swing: LegSide,
    cog: Vector3<f64>,
    velocity_mode: bool,
    velocity: VelocityCommand,
    offset_velocity: VelocityCommand,
    /// Mid frame the next velocity-mode step is planned from.
    velocity_mid: Pose,
    last_leg: LegSide,
}

impl ScriptedGait {
    /// Create a generator for control period `dt` with nominal foot offsets
    /// `[right, left]` relative to the mid frame.
    pub fn new(dt: f64, leg_offsets: [Vector3<f64>; 2]) -> Self {
        let step_ticks = ((STEP_SECONDS / dt).round() as usize).max(1);
        let feet = [
            Pose::from_position(leg_offsets[LegSide::Right.index()]),
            Pose::from_position(leg_offsets[LegSide::Left.index()]),
        ];
        Self {
            step_ticks,
            leg_offsets,
            queue: VecDeque::new(),
            swing_phase: None,
            feet,
            support: LegSide::Left,
            swing: LegSide::Right,
            cog: Vector3::zeros(),
            velocity_mode: false,
            velocity: VelocityCommand::ZERO,
            offset_velocity: VelocityCommand::ZERO,
            velocity_mid: Pose::identity(),
            last_leg: LegSide::Left,
        }
    }

    /// Ticks spent on one footstep.
    pub fn step_ticks(&self) -> usize {
        self.step_ticks
    }

    /// Whether velocity mode is active.
    pub fn is_velocity_mode(&self) -> bool {
        self.velocity_mode
    }

    /// Current velocity command (without offset).
    pub fn velocity(&self) -> VelocityCommand {
        self.velocity
    }

    /// Current offset velocity.
    pub fn offset_velocity(&self) -> VelocityCommand {
        self.offset_velocity
    }

    fn foot_on(&self, mid: &Pose, leg: LegSide) -> Pose {
        mid.compose(&Pose::from_position(self.leg_offsets[leg.index()]))
    }

    fn push_step(&mut self, leg: LegSide, pose: Pose) {
        debug!(
            "footstep {leg}: pos=({:.3}, {:.3}, {:.3})",
            pose.position.x, pose.position.y, pose.position.z
        );
        self.queue.push_back(QueuedStep { leg, pose });
        self.last_leg = leg;
    }

    /// Queue the next velocity-mode step from the running mid frame.
    fn plan_velocity_step(&mut self) {
        let leg = self.last_leg.opposite();
        let vx = self.velocity.vx + self.offset_velocity.vx;
        let vy = self.velocity.vy + self.offset_velocity.vy;
        let vyaw = self.velocity.vyaw + self.offset_velocity.vyaw;
        self.velocity_mid = self.velocity_mid.compose(&Pose::from_xy_yaw(
            vx * STEP_SECONDS,
            vy * STEP_SECONDS,
            vyaw * STEP_SECONDS,
        ));
        let pose = self.foot_on(&self.velocity_mid, leg);
        self.push_step(leg, pose);
    }

    fn update_cog(&mut self) {
        let mid = (self.feet[0].position + self.feet[1].position) / 2.0;
        self.cog = Vector3::new(mid.x, mid.y, self.cog.z);
    }
}

impl GaitGenerator for ScriptedGait {
    fn initialize_gait_parameter(&mut self, cog: &Vector3<f64>, support: &Pose, swing: &Pose) {
        self.swing = self.footstep_front_leg();
        self.support = self.swing.opposite();
        self.feet[self.support.index()] = *support;
        self.feet[self.swing.index()] = *swing;
        self.swing_phase = None;
        self.cog = *cog;
    }

    fn proc_one_tick(&mut self) -> bool {
        if self.swing_phase.is_none() {
            if self.queue.is_empty() && self.velocity_mode {
                self.plan_velocity_step();
            }
            let Some(step) = self.queue.pop_front() else {
                return false;
            };
            self.swing = step.leg;
            self.support = step.leg.opposite();
            self.swing_phase = Some(SwingPhase {
                leg: step.leg,
                from: self.feet[step.leg.index()],
                to: step.pose,
                tick: 0,
            });
        }

        if let Some(phase) = self.swing_phase.as_mut() {
            phase.tick += 1;
            let s = phase.tick as f64 / self.step_ticks as f64;
            let mut foot = Pose::interpolate(&phase.from, &phase.to, s);
            foot.position.z += STEP_HEIGHT * (PI * s).sin();
            self.feet[phase.leg.index()] = foot;
            if phase.tick >= self.step_ticks {
                self.feet[phase.leg.index()] = phase.to;
                self.swing_phase = None;
            }
        }
        self.update_cog();
        true
    }

    fn support_leg(&self) -> LegSide {
        self.support
    }

    fn swing_leg(&self) -> LegSide {
        self.swing
    }

    fn support_leg_pose(&self) -> Pose {
        self.feet[self.support.index()]
    }

    fn swing_leg_pose(&self) -> Pose {
        self.feet[self.swing.index()]
    }

    fn cog(&self) -> Vector3<f64> {
        self.cog
    }

    fn footstep_front_leg(&self) -> LegSide {
        self.queue
            .front()
            .map(|step| step.leg)
            .unwrap_or(LegSide::Right)
    }

    fn go_pos_to_footsteps(&mut self, goal: &GoPosCommand, start_mid: &Pose) {
        self.queue.clear();
        let strides = [
            goal.x.abs() / MAX_STRIDE,
            goal.y.abs() / MAX_SIDE_STRIDE,
            goal.yaw.abs() / MAX_STRIDE_YAW,
        ]
        .into_iter()
        .fold(1.0_f64, f64::max)
        .ceil() as usize;

        // Lead with the foot on the side we are heading to.
        let mut leg = if goal.y > 0.0 {
            LegSide::Left
        } else {
            LegSide::Right
        };
        let mut mid = *start_mid;
        for i in 1..=strides {
            let ratio = i as f64 / strides as f64;
            mid = start_mid.compose(&Pose::from_xy_yaw(
                goal.x * ratio,
                goal.y * ratio,
                goal.yaw * ratio,
            ));
            let pose = self.foot_on(&mid, leg);
            self.push_step(leg, pose);
            leg = leg.opposite();
        }
        // Bring the trailing foot alongside.
        let pose = self.foot_on(&mid, leg);
        self.push_step(leg, pose);
    }

    fn initialize_velocity_mode(&mut self, start_mid: &Pose, velocity: &VelocityCommand) {
        self.queue.clear();
        self.velocity_mode = true;
        self.velocity = *velocity;
        self.velocity_mid = *start_mid;
        self.last_leg = LegSide::Left;
        self.plan_velocity_step();
    }

    fn set_velocity(&mut self, velocity: &VelocityCommand) {
        self.velocity = *velocity;
    }

    fn set_offset_velocity(&mut self, velocity: &VelocityCommand) {
        self.offset_velocity = *velocity;
    }

    fn finalize_velocity_mode(&mut self) {
        if !self.velocity_mode {
            return;
        }
        self.velocity_mode = false;
        // Close the stance: the foot that did not step last comes alongside.
        let leg = self.last_leg.opposite();
        let pose = self.foot_on(&self.velocity_mid, leg);
        self.push_step(leg, pose);
    }

    fn clear_footsteps(&mut self) {
        self.queue.clear();
    }

    fn append_footstep(&mut self, leg: LegSide, pose: Pose) {
        self.push_step(leg, pose);
    }

    fn footstep_count(&self) -> usize {
        self.queue.len()
    }

    fn ready_to_stop(&self) -> bool {
        self.queue.is_empty() && self.swing_phase.is_none() && !self.velocity_mode
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const DT: f64 = 0.01;

    fn offsets() -> [Vector3<f64>; 2] {
        [Vector3::new(0.0, -0.09, 0.0), Vector3::new(0.0, 0.09, 0.0)]
    }

    fn primed(gait: &mut ScriptedGait) {
        let r = Pose::from_position(offsets()[0]);
        let l = Pose::from_position(offsets()[1]);
        let swing = gait.footstep_front_leg();
        let (support_pose, swing_pose) = match swing {
            LegSide::Right => (l, r),
            LegSide::Left => (r, l),
        };
        gait.initialize_gait_parameter(&Vector3::new(0.0, 0.0, 0.8), &support_pose, &swing_pose);
    }

    #[test]
    fn empty_queue_is_not_solved() {
        let mut gait = ScriptedGait::new(DT, offsets());
        assert!(!gait.proc_one_tick());
        assert!(gait.ready_to_stop());
        assert_eq!(gait.footstep_front_leg(), LegSide::Right);
    }

    #[test]
    fn replays_appended_footsteps() {
        let mut gait = ScriptedGait::new(DT, offsets());
        gait.append_footstep(LegSide::Left, Pose::from_position(Vector3::new(0.1, 0.09, 0.0)));
        gait.append_footstep(LegSide::Right, Pose::from_position(Vector3::new(0.1, -0.09, 0.0)));
        primed(&mut gait);
        assert_eq!(gait.swing_leg(), LegSide::Left);
        assert_eq!(gait.support_leg(), LegSide::Right);

        let ticks = gait.step_ticks();
        for tick in 1..=ticks {
            assert!(gait.proc_one_tick());
            if tick == ticks / 2 {
                assert_relative_eq!(gait.swing_leg_pose().position.z, STEP_HEIGHT, epsilon = 1e-9);
            }
        }
        assert_relative_eq!(gait.swing_leg_pose().position.x, 0.1, epsilon = 1e-12);
        assert_relative_eq!(gait.support_leg_pose().position.x, 0.0, epsilon = 1e-12);
        assert_eq!(gait.footstep_count(), 1);

        for _ in 0..ticks {
            assert!(gait.proc_one_tick());
        }
        assert_eq!(gait.swing_leg(), LegSide::Right);
        assert!(gait.ready_to_stop());
        assert!(!gait.proc_one_tick());

        let mid = gait.swing_support_mid_pose();
        assert_relative_eq!(mid.position, Vector3::new(0.1, 0.0, 0.0), epsilon = 1e-12);
        assert_relative_eq!(gait.cog(), Vector3::new(0.1, 0.0, 0.8), epsilon = 1e-12);
    }

    #[test]
    fn go_pos_ends_with_feet_together_at_goal() {
        let mut gait = ScriptedGait::new(DT, offsets());
        gait.go_pos_to_footsteps(
            &GoPosCommand {
                x: 0.3,
                y: 0.0,
                yaw: 0.0,
            },
            &Pose::identity(),
        );
        // two strides of 0.15 m plus the closing step
        assert_eq!(gait.footstep_count(), 3);
        assert_eq!(gait.footstep_front_leg(), LegSide::Right);

        primed(&mut gait);
        while gait.proc_one_tick() {}
        assert_relative_eq!(gait.feet[0].position, Vector3::new(0.3, -0.09, 0.0), epsilon = 1e-12);
        assert_relative_eq!(gait.feet[1].position, Vector3::new(0.3, 0.09, 0.0), epsilon = 1e-12);
    }

    #[test]
    fn go_pos_leads_with_left_when_moving_left() {
        let mut gait = ScriptedGait::new(DT, offsets());
        gait.go_pos_to_footsteps(
            &GoPosCommand {
                x: 0.0,
                y: 0.1,
                yaw: 0.0,
            },
            &Pose::identity(),
        );
        assert_eq!(gait.footstep_front_leg(), LegSide::Left);
    }

    #[test]
    fn velocity_mode_keeps_stepping_until_finalized() {
        let mut gait = ScriptedGait::new(DT, offsets());
        gait.initialize_velocity_mode(&Pose::identity(), &VelocityCommand::new(0.1, 0.0, 0.0));
        assert_eq!(gait.footstep_front_leg(), LegSide::Right);
        primed(&mut gait);

        for _ in 0..(3 * gait.step_ticks()) {
            assert!(gait.proc_one_tick());
        }
        assert!(!gait.ready_to_stop());

        gait.finalize_velocity_mode();
        let mut guard = 0;
        while gait.proc_one_tick() {
            guard += 1;
            assert!(guard < 10 * gait.step_ticks());
        }
        assert!(gait.ready_to_stop());
        let dx = gait.feet[0].position.x - gait.feet[1].position.x;
        assert_relative_eq!(dx, 0.0, epsilon = 1e-12);
        assert!(gait.feet[0].position.x > 0.1);
    }

    #[test]
    fn offset_velocity_adds_to_stride() {
        let mut gait = ScriptedGait::new(DT, offsets());
        gait.set_offset_velocity(&VelocityCommand::new(0.1, 0.0, 0.0));
        gait.initialize_velocity_mode(&Pose::identity(), &VelocityCommand::new(0.1, 0.0, 0.0));
        assert_relative_eq!(gait.queue[0].pose.position.x, 0.2 * STEP_SECONDS, epsilon = 1e-12);
        gait.set_offset_velocity(&VelocityCommand::ZERO);
        assert_eq!(gait.offset_velocity(), VelocityCommand::ZERO);
    }

    #[test]
    fn clear_drops_queue() {
        let mut gait = ScriptedGait::new(DT, offsets());
        gait.append_footstep(LegSide::Right, Pose::identity());
        gait.append_footstep(LegSide::Left, Pose::identity());
        gait.clear_footsteps();
        assert_eq!(gait.footstep_count(), 0);
        assert!(gait.ready_to_stop());
    }
}
