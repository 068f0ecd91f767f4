//! Start/stop transition ramp.
//!
//! Engaging and disengaging balance control both run over
//! `MAX = round(TRANSITION_SECONDS / dt)` ticks. The ramp is a tagged state
//! rather than a signed counter:
//!
//! | State | Meaning | Gain |
//! |-------|---------|------|
//! | `Idle` | no ramp in progress | 1.0 |
//! | `Starting { remaining }` | IK authority ramping 0 → 1 | `logistic(MAX − remaining)` |
//! | `Stopping { remaining }` | joint blend ramping to the reference | `logistic(MAX − remaining)` |
//!
//! Both ramps share [`smooth_gain`], which sweeps ≈0.01 → ≈0.99 as
//! `remaining` counts down from `MAX` to 1.

use abc_common::consts::{SIGMOID_STEEPNESS, TRANSITION_SECONDS};

/// Ramp length in ticks for control period `dt` [s].
#[inline]
pub fn max_transition_count(dt: f64) -> u32 {
    ((TRANSITION_SECONDS / dt).round() as u32).max(1)
}

/// Logistic ramp gain with `remaining` of `max` ticks left.
#[inline]
pub fn smooth_gain(remaining: u32, max: u32) -> f64 {
    let progress = f64::from(max.saturating_sub(remaining)) / f64::from(max);
    1.0 / (1.0 + (-SIGMOID_STEEPNESS * (progress - 0.5)).exp())
}

/// Transition ramp state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Transition {
    /// No ramp in progress.
    #[default]
    Idle,
    /// Engaging balance control.
    Starting {
        /// Ticks left.
        remaining: u32,
    },
    /// Disengaging balance control.
    Stopping {
        /// Ticks left.
        remaining: u32,
    },
}

/// Owns the ramp state and its length.
#[derive(Debug, Clone)]
pub struct TransitionController {
    max: u32,
    state: Transition,
}

impl TransitionController {
    /// Controller for control period `dt` [s].
    pub fn new(dt: f64) -> Self {
        Self::with_max(max_transition_count(dt))
    }

    /// Controller with an explicit ramp length.
    pub fn with_max(max: u32) -> Self {
        Self {
            max: max.max(1),
            state: Transition::Idle,
        }
    }

    /// Ramp length in ticks.
    #[inline]
    pub const fn max(&self) -> u32 {
        self.max
    }

    /// Current ramp state.
    #[inline]
    pub const fn state(&self) -> Transition {
        self.state
    }

    /// Whether the start ramp is running.
    #[inline]
    pub const fn is_starting(&self) -> bool {
        matches!(self.state, Transition::Starting { .. })
    }

    /// Whether the stop ramp is running.
    #[inline]
    pub const fn is_stopping(&self) -> bool {
        matches!(self.state, Transition::Stopping { .. })
    }

    /// Begin the start ramp (`remaining = MAX`).
    pub fn begin_start(&mut self) {
        self.state = Transition::Starting {
            remaining: self.max,
        };
    }

    /// Begin the stop ramp (`remaining = MAX`).
    pub fn begin_stop(&mut self) {
        self.state = Transition::Stopping {
            remaining: self.max,
        };
    }

    /// IK authority gain: the ramp gain while starting, 1.0 otherwise.
    #[inline]
    pub fn start_gain(&self) -> f64 {
        match self.state {
            Transition::Starting { remaining } => smooth_gain(remaining, self.max),
            _ => 1.0,
        }
    }

    /// Joint blend gain while stopping.
    #[inline]
    pub fn stop_gain(&self) -> Option<f64> {
        match self.state {
            Transition::Stopping { remaining } => Some(smooth_gain(remaining, self.max)),
            _ => None,
        }
    }

    /// Count the start ramp down by one tick. No-op unless starting.
    pub fn advance_start(&mut self) {
        if let Transition::Starting { remaining } = self.state {
            self.state = match remaining.saturating_sub(1) {
                0 => Transition::Idle,
                remaining => Transition::Starting { remaining },
            };
        }
    }

    /// Count the stop ramp down by one tick.
    ///
    /// Returns `true` on the tick the ramp finishes.
    pub fn advance_stop(&mut self) -> bool {
        if let Transition::Stopping { remaining } = self.state {
            match remaining.saturating_sub(1) {
                0 => {
                    self.state = Transition::Idle;
                    return true;
                }
                remaining => self.state = Transition::Stopping { remaining },
            }
        }
        false
    }

    /// Signed counter view: negative while starting, positive while
    /// stopping, zero when idle.
    pub fn signed_count(&self) -> i64 {
        match self.state {
            Transition::Idle => 0,
            Transition::Starting { remaining } => -i64::from(remaining),
            Transition::Stopping { remaining } => i64::from(remaining),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn max_count_scales_with_period() {
        assert_eq!(max_transition_count(0.005), 400);
        assert_eq!(max_transition_count(0.002), 1000);
        assert_eq!(max_transition_count(0.05), 40);
    }

    #[test]
    fn gain_spans_one_percent_band() {
        assert_relative_eq!(smooth_gain(400, 400), 0.01, epsilon = 1e-4);
        assert_relative_eq!(smooth_gain(200, 400), 0.5, epsilon = 1e-12);
        assert_relative_eq!(smooth_gain(0, 400), 0.99, epsilon = 1e-4);
    }

    #[test]
    fn gain_is_monotone_over_ramp() {
        let max = 400;
        let mut last = 0.0;
        for remaining in (1..=max).rev() {
            let g = smooth_gain(remaining, max);
            assert!(g > last, "gain must increase as remaining counts down");
            last = g;
        }
    }

    #[test]
    fn start_ramp_counts_to_idle() {
        let mut tc = TransitionController::with_max(3);
        tc.begin_start();
        assert_eq!(tc.signed_count(), -3);
        assert!(tc.is_starting());
        assert!(tc.start_gain() < 0.02);
        assert_eq!(tc.stop_gain(), None);

        tc.advance_start();
        tc.advance_start();
        assert_eq!(tc.state(), Transition::Starting { remaining: 1 });
        tc.advance_start();
        assert_eq!(tc.state(), Transition::Idle);
        assert_eq!(tc.start_gain(), 1.0);
    }

    #[test]
    fn stop_ramp_reports_completion_once() {
        let mut tc = TransitionController::with_max(2);
        tc.begin_stop();
        assert_eq!(tc.signed_count(), 2);
        assert!(tc.stop_gain().is_some());
        assert!(!tc.advance_stop());
        assert!(tc.advance_stop());
        assert_eq!(tc.state(), Transition::Idle);
        assert!(!tc.advance_stop());
    }

    #[test]
    fn advance_ignores_other_ramp() {
        let mut tc = TransitionController::with_max(5);
        tc.begin_stop();
        tc.advance_start();
        assert_eq!(tc.state(), Transition::Stopping { remaining: 5 });

        tc.begin_start();
        assert!(!tc.advance_stop());
        assert_eq!(tc.state(), Transition::Starting { remaining: 5 });
    }
}
