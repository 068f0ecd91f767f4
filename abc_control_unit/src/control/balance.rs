//! Balance engine: per-tick orchestration of the auto-balancer.
//!
//! ## Tick
//! 1. Snapshot joints and root, write the reference joints, run FK.
//! 2. With limbs registered: pull foot targets from the gait generator
//!    (walking) or from the live posture (standing), re-base the root so the
//!    feet midpoint lands on the support frame, record the target root and
//!    target CoM.
//! 3. Stop ramp: blend chain joints from the frozen posture to the
//!    reference; SYNC → IDLE when the ramp finishes.
//! 4. ABC: undo the raw reference write, correct the root against the CoM
//!    error, solve every limb in name order.
//!
//! The engine is single-threaded; [`crate::service::BalancerService`]
//! serializes commands against the tick.

use std::collections::BTreeMap;

use abc_common::command::{Footstep, GoPosCommand, LimbDefinition, VelocityCommand};
use abc_common::consts::{
    COM_FEEDBACK_GAIN, DEBUG_PRINT_INTERVAL, FOOT_MID_RATIO, GAIT_PRIME_TICK_LIMIT, LEFT_LEG,
    RIGHT_LEG, ROOT_ROTATION_BLEND,
};
use abc_common::gait::GaitGenerator;
use abc_common::model::RobotModel;
use abc_common::pose::Pose;
use nalgebra::Vector3;
use tracing::{debug, info};

use crate::control::ik::{LimbIkParam, SolveGains, solve_limb};
use crate::error::CommandError;
use crate::state::mode::{ControlMode, ModeEvent, ModeStateMachine, TransitionResult};
use crate::state::transition::TransitionController;
use crate::state::walking::WalkingFlags;

/// Outcome of a stop-walking request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkStop {
    /// Nothing to stop; state untouched.
    NotWalking,
    /// First call: the ending handshake is armed.
    Armed,
    /// Armed, but the generator still has steps to finish.
    Pending,
    /// Walking cleared and the footstep queue dropped.
    Stopped,
}

/// Per-tick scratch, overwritten every tick.
#[derive(Debug, Clone)]
struct TickScratch {
    original_angles: Vec<f64>,
    original_root: Pose,
    target_com: Vector3<f64>,
    target_root: Pose,
    debug_angles: Vec<f64>,
}

/// The balance engine.
pub struct AutoBalancer<M: RobotModel> {
    model: M,
    gait: Option<Box<dyn GaitGenerator>>,
    limbs: BTreeMap<String, LimbIkParam>,

    mode: ModeStateMachine,
    transition: TransitionController,
    walking: WalkingFlags,

    scratch: TickScratch,
    fix_leg_frame: Pose,
    blend_origin: Vec<f64>,

    reference: Vec<f64>,
    has_reference: bool,

    debug_level: u32,
    loop_count: u64,
}

impl<M: RobotModel> AutoBalancer<M> {
    /// Engine for `model` running at period `dt` [s].
    ///
    /// The reference starts out as the model's current posture; no output is
    /// produced until [`set_reference`](Self::set_reference) is called.
    pub fn new(model: M, gait: Option<Box<dyn GaitGenerator>>, dt: f64, debug_level: u32) -> Self {
        let n = model.num_joints();
        let mut reference = vec![0.0; n];
        model.copy_joint_angles(&mut reference);
        let root = model.root_pose();
        Self {
            model,
            gait,
            limbs: BTreeMap::new(),
            mode: ModeStateMachine::new(),
            transition: TransitionController::new(dt),
            walking: WalkingFlags::empty(),
            scratch: TickScratch {
                original_angles: reference.clone(),
                original_root: root,
                target_com: Vector3::zeros(),
                target_root: root,
                debug_angles: reference.clone(),
            },
            fix_leg_frame: Pose::identity(),
            blend_origin: reference.clone(),
            reference,
            has_reference: false,
            debug_level,
            loop_count: 0,
        }
    }

    // ─── Accessors ──────────────────────────────────────────────────

    /// Current control mode.
    #[inline]
    pub fn mode(&self) -> ControlMode {
        self.mode.mode()
    }

    /// Transition ramp.
    #[inline]
    pub fn transition(&self) -> &TransitionController {
        &self.transition
    }

    /// Walking flags.
    #[inline]
    pub fn walking_flags(&self) -> WalkingFlags {
        self.walking
    }

    /// IK state of one limb.
    pub fn limb(&self, name: &str) -> Option<&LimbIkParam> {
        self.limbs.get(name)
    }

    /// Registered limbs in name order.
    pub fn limbs(&self) -> impl Iterator<Item = (&str, &LimbIkParam)> {
        self.limbs.iter().map(|(name, param)| (name.as_str(), param))
    }

    /// Robot model.
    #[inline]
    pub fn model(&self) -> &M {
        &self.model
    }

    /// Mutable robot model.
    #[inline]
    pub fn model_mut(&mut self) -> &mut M {
        &mut self.model
    }

    /// Gait generator, if configured.
    pub fn gait(&self) -> Option<&dyn GaitGenerator> {
        self.gait.as_deref()
    }

    /// Pending footsteps in the gait generator (0 without one).
    pub fn footstep_count(&self) -> usize {
        self.gait.as_deref().map_or(0, |g| g.footstep_count())
    }

    /// Fixed-leg frame used while standing.
    #[inline]
    pub fn fix_leg_frame(&self) -> &Pose {
        &self.fix_leg_frame
    }

    /// Target CoM of the last tick.
    #[inline]
    pub fn target_com(&self) -> Vector3<f64> {
        self.scratch.target_com
    }

    /// Target root pose of the last tick.
    #[inline]
    pub fn target_root(&self) -> &Pose {
        &self.scratch.target_root
    }

    /// Last reference joint vector.
    #[inline]
    pub fn reference(&self) -> &[f64] {
        &self.reference
    }

    /// Whether a reference has been received.
    #[inline]
    pub fn has_reference(&self) -> bool {
        self.has_reference
    }

    /// Ticks executed.
    #[inline]
    pub fn loop_count(&self) -> u64 {
        self.loop_count
    }

    /// Whether numeric debug output is due this tick.
    #[inline]
    pub fn debug_print_due(&self) -> bool {
        (self.debug_level == 1 && self.loop_count % DEBUG_PRINT_INTERVAL == 0)
            || self.debug_level > 1
    }

    // ─── Tick ───────────────────────────────────────────────────────

    /// Store the latest reference joint vector.
    pub fn set_reference(&mut self, reference: &[f64]) -> Result<(), CommandError> {
        if reference.len() != self.reference.len() {
            return Err(CommandError::ReferenceLength {
                expected: self.reference.len(),
                actual: reference.len(),
            });
        }
        self.reference.copy_from_slice(reference);
        self.has_reference = true;
        Ok(())
    }

    /// Run one tick and copy the corrected joints into `output`.
    ///
    /// Returns `false` (and leaves `output` alone) until the first
    /// reference has arrived.
    pub fn tick(&mut self, output: &mut Vec<f64>) -> bool {
        if !self.has_reference {
            return false;
        }
        self.update();
        output.resize(self.model.num_joints(), 0.0);
        self.model.copy_joint_angles(output);
        true
    }

    /// One control update against the stored reference.
    pub fn update(&mut self) {
        self.loop_count += 1;
        let debug_print = self.debug_print_due();

        self.model.copy_joint_angles(&mut self.scratch.original_angles);
        self.scratch.original_root = self.model.root_pose();
        for (id, &q) in self.reference.iter().enumerate() {
            self.model.set_joint_angle(id, q);
        }
        self.model.calc_forward_kinematics();

        if !self.limbs.is_empty() {
            self.update_targets();
        }

        if let Some(gain) = self.transition.stop_gain() {
            for param in self.limbs.values() {
                for &id in param.chain().joint_ids() {
                    let origin = self.blend_origin[id];
                    self.model
                        .set_joint_angle(id, origin + (self.reference[id] - origin) * gain);
                }
            }
            if self.transition.advance_stop() {
                if let TransitionResult::Ok(mode) = self.mode.handle_event(ModeEvent::SyncComplete) {
                    info!("Finished cleanup, mode {mode}");
                }
            }
        }

        if self.mode.is_active() {
            self.solve_limb_ik(debug_print);
        }

        if debug_print {
            self.model.copy_joint_angles(&mut self.scratch.debug_angles);
            debug!("q: {:.6?}", self.scratch.debug_angles);
        }
    }

    /// Steps 2a–2e: foot targets, re-basing, target root and CoM.
    fn update_targets(&mut self) {
        let walking = self.walking.contains(WalkingFlags::WALKING);
        let frame = match self.gait.as_deref_mut() {
            Some(gait) if walking => {
                let solved = gait.proc_one_tick();
                self.walking.set(WalkingFlags::SOLVED, solved);
                let (support, swing) = (gait.support_leg(), gait.swing_leg());
                if let Some(param) = self.limbs.get_mut(support.limb_name()) {
                    param.target = gait.support_leg_pose();
                }
                if let Some(param) = self.limbs.get_mut(swing.limb_name()) {
                    param.target = gait.swing_leg_pose();
                }
                gait.swing_support_mid_pose()
            }
            _ => self.fix_leg_frame,
        };

        self.fix_leg_to_frame(&frame);
        self.scratch.target_root = self.model.root_pose();

        if !walking {
            for param in self.limbs.values_mut() {
                if let Some(pose) = self.model.link_pose(param.target_link()) {
                    param.target = pose;
                }
            }
        }

        self.scratch.target_com = match self.gait.as_deref() {
            Some(gait) if walking => gait.cog(),
            _ => self.feet_mid_position(),
        };
    }

    /// Move the root so the live feet midpoint coincides with `frame`.
    fn fix_leg_to_frame(&mut self, frame: &Pose) {
        let (Some(right), Some(left)) = (self.foot_link_pose(RIGHT_LEG), self.foot_link_pose(LEFT_LEG))
        else {
            return;
        };
        let mid = Pose::interpolate(&right, &left, FOOT_MID_RATIO);
        let delta = mid.transformation(&self.model.root_pose());
        let mut root = *frame;
        root.transform_local(&delta);
        self.model.set_root_pose(root);
        self.model.calc_forward_kinematics();
    }

    fn foot_link_pose(&self, limb: &str) -> Option<Pose> {
        self.limbs
            .get(limb)
            .and_then(|param| self.model.link_pose(param.target_link()))
    }

    fn feet_mid_position(&self) -> Vector3<f64> {
        match (self.foot_link_pose(RIGHT_LEG), self.foot_link_pose(LEFT_LEG)) {
            (Some(right), Some(left)) => (right.position + left.position) / 2.0,
            _ => self.scratch.target_com,
        }
    }

    /// Midpoint of the two feet's target poses.
    fn foot_mid_target(&self) -> Result<Pose, CommandError> {
        let right = self
            .limbs
            .get(RIGHT_LEG)
            .ok_or_else(|| CommandError::MissingLimb(RIGHT_LEG.to_string()))?;
        let left = self
            .limbs
            .get(LEFT_LEG)
            .ok_or_else(|| CommandError::MissingLimb(LEFT_LEG.to_string()))?;
        Ok(Pose::interpolate(&right.target, &left.target, FOOT_MID_RATIO))
    }

    /// CoM feedback on the root, then every limb in name order.
    fn solve_limb_ik(&mut self, debug_print: bool) {
        let transition_gain = self.transition.start_gain();
        let starting = self.transition.is_starting();

        for param in self.limbs.values() {
            for &id in param.chain().joint_ids() {
                self.model
                    .set_joint_angle(id, self.scratch.original_angles[id]);
            }
        }
        self.model.set_root_pose(self.scratch.original_root);
        self.model.calc_forward_kinematics();

        let mut root = self.model.root_pose();
        let mut com_error = self.model.center_of_mass() - self.scratch.target_com;
        com_error.z = root.position.z - self.scratch.target_root.position.z;
        let cog_gain = transition_gain;
        root.position += cog_gain * -COM_FEEDBACK_GAIN * com_error;
        root.rotation = Pose::interpolate(
            &Pose::new(root.position, self.scratch.original_root.rotation),
            &Pose::new(root.position, self.scratch.target_root.rotation),
            ROOT_ROTATION_BLEND,
        )
        .rotation;
        self.model.set_root_pose(root);
        self.model.calc_forward_kinematics();

        if debug_print {
            debug!("com error: {:.6?}", com_error.as_slice());
        }

        let gains = SolveGains {
            transition: transition_gain,
            cog: cog_gain,
            starting,
        };
        for (name, param) in self.limbs.iter_mut() {
            if let Err(e) = solve_limb(
                &mut self.model,
                name,
                param,
                &self.reference,
                &gains,
                debug_print,
            ) {
                debug!("Limb IK halted: {e}");
                break;
            }
        }

        self.transition.advance_start();
    }

    // ─── Lifecycle ──────────────────────────────────────────────────

    fn require_mode(&self, expected: ControlMode) -> Result<(), CommandError> {
        let actual = self.mode.mode();
        if actual == expected {
            Ok(())
        } else {
            Err(CommandError::InvalidMode { expected, actual })
        }
    }

    /// Engage balance control with `limbs` (must include `rleg` and `lleg`).
    ///
    /// Replaces any previously registered limbs.
    pub fn start_abc(&mut self, limbs: &[LimbDefinition]) -> Result<(), CommandError> {
        self.require_mode(ControlMode::Idle)?;
        for required in [RIGHT_LEG, LEFT_LEG] {
            if !limbs.iter().any(|limb| limb.name == required) {
                return Err(CommandError::MissingLimb(required.to_string()));
            }
        }

        let mut params = BTreeMap::new();
        for limb in limbs {
            let chain = self.model.chain(&limb.base_link, &limb.target_link)?;
            params.insert(limb.name.clone(), (limb, chain));
        }

        info!("START ABC");
        self.limbs.clear();
        for (name, (limb, chain)) in params {
            info!(
                "ABC {} {} {} ({} joints)",
                name,
                limb.base_link,
                limb.target_link,
                chain.dof()
            );
            self.limbs
                .insert(name, LimbIkParam::new(limb, chain, Pose::identity()));
        }

        for (id, &q) in self.reference.iter().enumerate() {
            self.model.set_joint_angle(id, q);
        }
        self.model.calc_forward_kinematics();
        let frame = self.fix_leg_frame;
        self.fix_leg_to_frame(&frame);
        for param in self.limbs.values_mut() {
            if let Some(pose) = self.model.link_pose(param.target_link()) {
                param.current = pose;
                param.target = pose;
            }
        }
        self.scratch.original_root = self.model.root_pose();
        self.scratch.target_root = self.scratch.original_root;

        self.transition.begin_start();
        self.mode.handle_event(ModeEvent::Start);
        Ok(())
    }

    /// Disengage balance control: freeze the current posture and ramp it
    /// back to the reference.
    pub fn stop_abc(&mut self) -> Result<(), CommandError> {
        self.require_mode(ControlMode::Abc)?;
        info!("STOP ABC");
        self.fix_leg_frame = self.foot_mid_target()?;
        self.transition.begin_stop();
        self.model.copy_joint_angles(&mut self.blend_origin);
        self.mode.handle_event(ModeEvent::Stop);
        self.walking = WalkingFlags::empty();
        if let Some(gait) = self.gait.as_deref_mut() {
            gait.clear_footsteps();
        }
        Ok(())
    }

    // ─── Walking ────────────────────────────────────────────────────

    /// Seed the gait generator and prime it until it produces a trajectory.
    pub fn start_walking(&mut self) -> Result<(), CommandError> {
        self.require_mode(ControlMode::Abc)?;
        let cog = self.model.center_of_mass();
        let gait = self
            .gait
            .as_deref_mut()
            .ok_or(CommandError::NoGaitGenerator)?;

        let swing = gait.footstep_front_leg();
        let support = swing.opposite();
        let support_pose = self
            .limbs
            .get(support.limb_name())
            .ok_or_else(|| CommandError::MissingLimb(support.limb_name().to_string()))?
            .target;
        let swing_pose = self
            .limbs
            .get(swing.limb_name())
            .ok_or_else(|| CommandError::MissingLimb(swing.limb_name().to_string()))?
            .target;

        gait.initialize_gait_parameter(&cog, &support_pose, &swing_pose);
        let mut ticks = 0;
        while !gait.proc_one_tick() {
            ticks += 1;
            if ticks >= GAIT_PRIME_TICK_LIMIT {
                return Err(CommandError::GaitNotSolved { ticks });
            }
        }

        self.walking = WalkingFlags::WALKING | WalkingFlags::SOLVED;
        info!("Start walking: support {support}, swing {swing}");
        Ok(())
    }

    /// Two-phase stop-walking handshake.
    pub fn stop_walking(&mut self) -> WalkStop {
        if !self.walking.contains(WalkingFlags::WALKING) {
            return WalkStop::NotWalking;
        }
        if !self.walking.contains(WalkingFlags::ENDING) {
            self.walking.insert(WalkingFlags::ENDING);
            return WalkStop::Armed;
        }
        let Some(gait) = self.gait.as_deref_mut() else {
            self.walking = WalkingFlags::empty();
            return WalkStop::Stopped;
        };
        if !gait.ready_to_stop() {
            return WalkStop::Pending;
        }
        gait.clear_footsteps();
        self.fix_leg_frame = gait.swing_support_mid_pose();
        self.walking = WalkingFlags::empty();
        info!("Stop walking");
        WalkStop::Stopped
    }

    /// Walk to a goal relative to the current foot midpoint.
    pub fn go_pos(&mut self, goal: &GoPosCommand) -> Result<(), CommandError> {
        self.require_mode(ControlMode::Abc)?;
        let mid = self.foot_mid_target()?;
        let gait = self
            .gait
            .as_deref_mut()
            .ok_or(CommandError::NoGaitGenerator)?;
        gait.go_pos_to_footsteps(goal, &mid);
        info!(
            "go_pos x={:.3} y={:.3} yaw={:.3}: {} footsteps",
            goal.x,
            goal.y,
            goal.yaw,
            gait.footstep_count()
        );
        self.start_walking()
    }

    /// Walk at a velocity; updates it in place while already walking.
    pub fn go_velocity(&mut self, velocity: &VelocityCommand) -> Result<(), CommandError> {
        self.require_mode(ControlMode::Abc)?;
        if self.walking.is_walking_and_solved() {
            let gait = self
                .gait
                .as_deref_mut()
                .ok_or(CommandError::NoGaitGenerator)?;
            gait.set_velocity(velocity);
            return Ok(());
        }
        let mid = self.foot_mid_target()?;
        let gait = self
            .gait
            .as_deref_mut()
            .ok_or(CommandError::NoGaitGenerator)?;
        gait.initialize_velocity_mode(&mid, velocity);
        self.start_walking()
    }

    /// Replace the footstep queue and start walking.
    ///
    /// Every footstep is validated before the queue is touched.
    pub fn set_foot_steps(&mut self, footsteps: &[Footstep]) -> Result<(), CommandError> {
        let resolved = footsteps
            .iter()
            .map(Footstep::resolve)
            .collect::<Result<Vec<_>, _>>()?;
        self.require_mode(ControlMode::Abc)?;
        let gait = self
            .gait
            .as_deref_mut()
            .ok_or(CommandError::NoGaitGenerator)?;

        info!("set_foot_steps: {} footsteps", resolved.len());
        gait.clear_footsteps();
        for (leg, pose) in resolved {
            gait.append_footstep(leg, pose);
        }
        self.start_walking()
    }

    /// Close velocity mode with a final step.
    pub fn finalize_velocity_mode(&mut self) -> Result<(), CommandError> {
        let gait = self
            .gait
            .as_deref_mut()
            .ok_or(CommandError::NoGaitGenerator)?;
        gait.finalize_velocity_mode();
        Ok(())
    }

    /// Zero the gait generator's offset velocity.
    pub fn clear_offset_velocity(&mut self) {
        if let Some(gait) = self.gait.as_deref_mut() {
            gait.set_offset_velocity(&VelocityCommand::ZERO);
        }
    }
}
