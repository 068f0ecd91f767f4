//! Control mode lifecycle.
//!
//! IDLE → (Start) → ABC → (Stop) → SYNC → (SyncComplete) → IDLE.
//!
//! `Start` and `Stop` come from the command surface; `SyncComplete` is
//! raised by the tick once the stop ramp has run out.

use std::fmt;

/// Balancer control mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ControlMode {
    /// Reference joints pass through untouched.
    #[default]
    Idle,
    /// Active balance control: CoM feedback and limb IK every tick.
    Abc,
    /// Disengaging: blending from the last controlled posture back to the
    /// reference.
    Sync,
}

impl fmt::Display for ControlMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Idle => "IDLE",
            Self::Abc => "ABC",
            Self::Sync => "SYNC",
        })
    }
}

/// Result of a mode transition attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionResult {
    /// Transition succeeded with the new mode.
    Ok(ControlMode),
    /// Transition rejected with a reason.
    Rejected(&'static str),
}

/// Event that can trigger a mode transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeEvent {
    /// Start balance control.
    Start,
    /// Stop balance control.
    Stop,
    /// Stop ramp finished.
    SyncComplete,
}

/// Mode manager holding the current mode.
#[derive(Debug, Clone, Default)]
pub struct ModeStateMachine {
    mode: ControlMode,
}

impl ModeStateMachine {
    /// Create a new state machine in IDLE.
    pub const fn new() -> Self {
        Self {
            mode: ControlMode::Idle,
        }
    }

    /// Current mode.
    #[inline]
    pub const fn mode(&self) -> ControlMode {
        self.mode
    }

    /// Attempt a transition given an event.
    ///
    /// Returns `TransitionResult::Ok(new_mode)` on success,
    /// `TransitionResult::Rejected(reason)` if the transition is not valid.
    /// A rejected event leaves the mode unchanged.
    pub fn handle_event(&mut self, event: ModeEvent) -> TransitionResult {
        use ControlMode::*;
        use ModeEvent::*;

        let next = match (self.mode, event) {
            (Idle, Start) => Abc,
            (Abc, Stop) => Sync,
            (Sync, SyncComplete) => Idle,
            _ => return TransitionResult::Rejected(invalid_transition_reason(self.mode, event)),
        };

        self.mode = next;
        TransitionResult::Ok(next)
    }

    /// Whether balance control is engaged.
    #[inline]
    pub const fn is_active(&self) -> bool {
        matches!(self.mode, ControlMode::Abc)
    }
}

fn invalid_transition_reason(mode: ControlMode, event: ModeEvent) -> &'static str {
    use ControlMode::*;
    use ModeEvent::*;
    match (mode, event) {
        (Abc, Start) => "Start: balance control already active",
        (Sync, Start) => "Start: stop transition still running",
        (Idle, Stop) => "Stop: balance control not active",
        (Sync, Stop) => "Stop: already stopping",
        (_, SyncComplete) => "SyncComplete: only allowed from SYNC",
        _ => "invalid event for current mode",
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
