//! Capture alignment state machine.
//!
//! Each processed frame the machine judges whether the user stands fully
//! inside the capture volume. Once every required joint has been reliable
//! for the dwell time the state locks and the floor anchor is frozen.

use std::fmt;
use std::time::{Duration, Instant};

use log::{debug, info};
use nalgebra::Vector3;

use crate::config::AlignmentConfig;
use crate::floor::FloorAnchor;

/// Alignment of the user relative to the capture volume
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AlignmentState {
    #[default]
    Searching,
    Aligning,
    Locked,
    TooFar,
    TooClose,
}

impl fmt::Display for AlignmentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Searching => "searching",
            Self::Aligning => "aligning",
            Self::Locked => "locked",
            Self::TooFar => "too_far",
            Self::TooClose => "too_close",
        };
        f.write_str(name)
    }
}

/// Per-frame inputs of the state machine
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlignmentInput {
    /// Smoothed visibility of the left ankle
    pub left_foot_visibility: f32,
    /// Smoothed visibility of the right ankle
    pub right_foot_visibility: f32,
    /// Every joint of the current orientation's connection set is reliable
    pub all_required_visible: bool,
    /// World Z of the hip midpoint
    pub hip_depth: f32,
}

#[derive(Debug, Clone)]
pub struct AlignmentStateMachine {
    state: AlignmentState,
    dwell_start: Option<Instant>,
    dwell: Duration,
    foot_threshold: f32,
    near_bound: f32,
    far_bound: f32,
}

impl AlignmentStateMachine {
    #[must_use]
    pub fn new(config: &AlignmentConfig) -> Self {
        Self {
            state: AlignmentState::Searching,
            dwell_start: None,
            dwell: config.dwell(),
            foot_threshold: config.foot_visibility_threshold,
            near_bound: config.near_bound,
            far_bound: config.far_bound,
        }
    }

    #[must_use]
    pub fn state(&self) -> AlignmentState {
        self.state
    }

    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.state == AlignmentState::Locked
    }

    /// When the current dwell period started, if one is running
    #[must_use]
    pub fn dwell_start(&self) -> Option<Instant> {
        self.dwell_start
    }

    /// Advance the machine by one frame. Freezes `anchor` on the transition
    /// to `Locked`; a locked machine stays locked until [`reset`].
    ///
    /// [`reset`]: Self::reset
    pub fn update(&mut self, input: &AlignmentInput, anchor: &mut FloorAnchor, now: Instant) -> AlignmentState {
        if self.is_locked() {
            return self.state;
        }

        let next = if input.left_foot_visibility <= self.foot_threshold
            && input.right_foot_visibility <= self.foot_threshold
        {
            self.dwell_start = None;
            AlignmentState::TooClose
        } else if input.all_required_visible {
            let started = *self.dwell_start.get_or_insert(now);
            if now.saturating_duration_since(started) >= self.dwell {
                let at: Vector3<f32> = anchor.position();
                if anchor.freeze(at) {
                    info!("Floor anchor frozen at y={:.3}", at.y);
                }
                AlignmentState::Locked
            } else {
                AlignmentState::Aligning
            }
        } else if input.hip_depth > self.near_bound {
            self.dwell_start = None;
            AlignmentState::TooClose
        } else if input.hip_depth < self.far_bound {
            self.dwell_start = None;
            AlignmentState::TooFar
        } else {
            debug!("Ambiguous alignment zone (hip depth {:.3}), holding {}", input.hip_depth, self.state);
            self.dwell_start = None;
            self.state
        };

        if next != self.state {
            info!("Alignment: {} -> {}", self.state, next);
            self.state = next;
        }
        self.state
    }

    /// Break the dwell period without changing the state. Called for frames
    /// that never reach [`update`], so the dwell only counts consecutive
    /// processed frames.
    ///
    /// [`update`]: Self::update
    pub fn interrupt(&mut self) {
        if self.dwell_start.take().is_some() {
            debug!("Dwell interrupted in state {}", self.state);
        }
    }

    pub fn reset(&mut self) {
        self.state = AlignmentState::Searching;
        self.dwell_start = None;
    }
}

impl Default for AlignmentStateMachine {
    fn default() -> Self {
        Self::new(&AlignmentConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn aligned_input() -> AlignmentInput {
        AlignmentInput {
            left_foot_visibility: 0.9,
            right_foot_visibility: 0.9,
            all_required_visible: true,
            hip_depth: 0.0,
        }
    }

    #[test]
    fn test_feet_invisible_is_too_close() {
        let mut machine = AlignmentStateMachine::default();
        let mut anchor = FloorAnchor::default();
        let input = AlignmentInput {
            left_foot_visibility: 0.1,
            right_foot_visibility: 0.1,
            ..aligned_input()
        };
        assert_eq!(machine.update(&input, &mut anchor, Instant::now()), AlignmentState::TooClose);
        assert!(machine.dwell_start().is_none());
    }

    #[test]
    fn test_one_foot_visible_is_enough() {
        let mut machine = AlignmentStateMachine::default();
        let mut anchor = FloorAnchor::default();
        let input = AlignmentInput {
            left_foot_visibility: 0.5,
            ..aligned_input()
        };
        assert_eq!(machine.update(&input, &mut anchor, Instant::now()), AlignmentState::Aligning);
    }

    #[test]
    fn test_dwell_then_lock() {
        let start = Instant::now();
        let mut machine = AlignmentStateMachine::default();
        let mut anchor = FloorAnchor::default();
        anchor.track_y(-1.2);

        let input = aligned_input();
        assert_eq!(machine.update(&input, &mut anchor, start), AlignmentState::Aligning);
        assert_eq!(
            machine.update(&input, &mut anchor, start + Duration::from_millis(999)),
            AlignmentState::Aligning
        );
        assert!(!anchor.is_frozen());
        assert_eq!(
            machine.update(&input, &mut anchor, start + Duration::from_millis(1000)),
            AlignmentState::Locked
        );
        assert!(anchor.is_frozen());
        assert_eq!(anchor.y(), -1.2);
    }

    #[test]
    fn test_interrupt_keeps_state_and_clears_dwell() {
        let start = Instant::now();
        let mut machine = AlignmentStateMachine::default();
        let mut anchor = FloorAnchor::default();

        machine.update(&aligned_input(), &mut anchor, start);
        machine.interrupt();
        assert_eq!(machine.state(), AlignmentState::Aligning);
        assert!(machine.dwell_start().is_none());

        assert_eq!(
            machine.update(&aligned_input(), &mut anchor, start + Duration::from_secs(5)),
            AlignmentState::Aligning
        );
        assert!(!anchor.is_frozen());
    }

    #[test]
    fn test_interruption_restarts_dwell() {
        let start = Instant::now();
        let mut machine = AlignmentStateMachine::default();
        let mut anchor = FloorAnchor::default();

        let input = aligned_input();
        machine.update(&input, &mut anchor, start);
        let gap = AlignmentInput {
            all_required_visible: false,
            ..input
        };
        machine.update(&gap, &mut anchor, start + Duration::from_millis(500));
        assert!(machine.dwell_start().is_none());

        assert_eq!(
            machine.update(&input, &mut anchor, start + Duration::from_millis(1200)),
            AlignmentState::Aligning
        );
        assert_eq!(
            machine.update(&input, &mut anchor, start + Duration::from_millis(2200)),
            AlignmentState::Locked
        );
    }

    #[test]
    fn test_depth_bounds() {
        let now = Instant::now();
        let mut machine = AlignmentStateMachine::default();
        let mut anchor = FloorAnchor::default();
        let partial = AlignmentInput {
            all_required_visible: false,
            ..aligned_input()
        };

        let near = AlignmentInput { hip_depth: 1.5, ..partial };
        assert_eq!(machine.update(&near, &mut anchor, now), AlignmentState::TooClose);

        let far = AlignmentInput { hip_depth: -2.5, ..partial };
        assert_eq!(machine.update(&far, &mut anchor, now), AlignmentState::TooFar);
    }

    #[test]
    fn test_ambiguous_zone_holds_state() {
        let now = Instant::now();
        let mut machine = AlignmentStateMachine::default();
        let mut anchor = FloorAnchor::default();

        let input = aligned_input();
        assert_eq!(machine.update(&input, &mut anchor, now), AlignmentState::Aligning);

        let ambiguous = AlignmentInput {
            all_required_visible: false,
            hip_depth: 0.0,
            ..input
        };
        assert_eq!(machine.update(&ambiguous, &mut anchor, now), AlignmentState::Aligning);
        assert!(machine.dwell_start().is_none());
    }

    #[test]
    fn test_locked_is_terminal_until_reset() {
        let start = Instant::now();
        let mut machine = AlignmentStateMachine::default();
        let mut anchor = FloorAnchor::default();

        let input = aligned_input();
        machine.update(&input, &mut anchor, start);
        machine.update(&input, &mut anchor, start + Duration::from_secs(2));
        assert!(machine.is_locked());

        let gone = AlignmentInput {
            left_foot_visibility: 0.0,
            right_foot_visibility: 0.0,
            ..input
        };
        assert_eq!(
            machine.update(&gone, &mut anchor, start + Duration::from_secs(3)),
            AlignmentState::Locked
        );

        machine.reset();
        assert_eq!(machine.state(), AlignmentState::Searching);
    }
}
