//! Rolling per-joint visibility history.
//!
//! Detector visibility scores flicker from frame to frame, especially for
//! extremities. The tracker keeps the last few scores of every joint and
//! exposes their mean as the smoothed confidence that all gating decisions
//! use.

use std::collections::VecDeque;

use crate::constants::{
    DEFAULT_HISTORY_CAPACITY, DEFAULT_VISIBILITY_THRESHOLD, EXTREMITY_VISIBILITY_THRESHOLD,
    NUM_POSE_LANDMARKS,
};
use crate::landmarks::{JointIndex, LandmarkFrame};

/// Minimum smoothed visibility for a joint to count as reliably tracked.
///
/// Elbows and wrists are occluded more often, so they get a lower bar.
#[must_use]
pub fn adaptive_threshold(joint: JointIndex) -> f32 {
    match joint {
        JointIndex::LeftElbow | JointIndex::RightElbow | JointIndex::LeftWrist | JointIndex::RightWrist => {
            EXTREMITY_VISIBILITY_THRESHOLD
        }
        _ => DEFAULT_VISIBILITY_THRESHOLD,
    }
}

/// Per-joint bounded visibility history
#[derive(Debug, Clone)]
pub struct VisibilityTracker {
    capacity: usize,
    history: [VecDeque<f32>; NUM_POSE_LANDMARKS],
}

impl VisibilityTracker {
    /// Create a tracker keeping `capacity` samples per joint
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is 0
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "History capacity must be greater than 0");
        Self {
            capacity,
            history: std::array::from_fn(|_| VecDeque::with_capacity(capacity)),
        }
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Append the visibility of every joint in `frame`, evicting the oldest
    /// sample of a joint once its history is full.
    pub fn update(&mut self, frame: &LandmarkFrame) {
        for (buffer, landmark) in self.history.iter_mut().zip(frame.landmarks()) {
            if buffer.len() >= self.capacity {
                buffer.pop_front();
            }
            let visibility = if landmark.visibility.is_finite() {
                landmark.visibility
            } else {
                0.0
            };
            buffer.push_back(visibility);
        }
    }

    /// Mean of the stored samples, 0 when nothing has been recorded yet
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn smoothed_visibility(&self, joint: JointIndex) -> f32 {
        let buffer = &self.history[joint.index()];
        if buffer.is_empty() {
            return 0.0;
        }
        buffer.iter().sum::<f32>() / buffer.len() as f32
    }

    /// Smoothed visibility strictly above the joint's adaptive threshold
    #[must_use]
    pub fn is_reliable(&self, joint: JointIndex) -> bool {
        self.smoothed_visibility(joint) > adaptive_threshold(joint)
    }

    /// Number of samples currently stored for a joint
    #[must_use]
    pub fn history_len(&self, joint: JointIndex) -> usize {
        self.history[joint.index()].len()
    }

    /// Stored samples of a joint, oldest first
    pub fn samples(&self, joint: JointIndex) -> impl Iterator<Item = f32> + '_ {
        self.history[joint.index()].iter().copied()
    }

    pub fn reset(&mut self) {
        for buffer in &mut self.history {
            buffer.clear();
        }
    }
}

impl Default for VisibilityTracker {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}
