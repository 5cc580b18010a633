//! Session-scoped tracking state and the per-frame tick.
//!
//! A [`TrackingSession`] owns everything that persists across frames: the
//! visibility history, the latest detector and segmenter results, the dwell
//! timer and the floor anchor. It is created when the camera starts and torn
//! down when it stops; nothing here is global.

use std::time::Instant;

use image::{RgbImage, RgbaImage};
use log::{debug, info};
use nalgebra::Vector3;
use ndarray::Array2;

use crate::alignment::{AlignmentInput, AlignmentState, AlignmentStateMachine};
use crate::config::{Config, FloorStrategy};
use crate::constants::{WORLD_SCALE_X, WORLD_SCALE_Y, WORLD_SCALE_Z};
use crate::floor::{FloorAnchor, FloorDepthEstimator};
use crate::fusion::FrameFusionEngine;
use crate::landmarks::{required_joints, JointIndex, LandmarkFrame};
use crate::orientation::{classify_with_rule, orientation_confidence, Orientation};
use crate::segmentation::SegmentationMask;
use crate::visibility::VisibilityTracker;
use crate::Result;

/// World-space position of the hip midpoint
#[must_use]
pub fn user_position(frame: &LandmarkFrame) -> Vector3<f32> {
    let (x, y, z) = frame.hip_midpoint();
    Vector3::new((x - 0.5) * WORLD_SCALE_X, (0.5 - y) * WORLD_SCALE_Y, -z * WORLD_SCALE_Z)
}

/// Pose-derived values of one processed frame
#[derive(Debug, Clone, PartialEq)]
pub struct PoseSummary {
    pub orientation: Orientation,
    /// Name of the orientation rule that fired
    pub rule: &'static str,
    pub confidence: f32,
    pub user_position: Vector3<f32>,
    pub required_joints: Vec<JointIndex>,
    pub all_required_visible: bool,
}

/// Everything the renderer receives for one tick
#[derive(Debug, Clone)]
pub struct TickOutput {
    pub tick: u64,
    pub person_pixel_count: usize,
    /// Composited frame, present only when a person was detected
    pub composite: Option<RgbaImage>,
    /// Present when a person was detected and landmarks are available
    pub pose: Option<PoseSummary>,
    pub alignment: AlignmentState,
    pub floor_anchor: FloorAnchor,
}

impl TickOutput {
    #[must_use]
    pub fn person_detected(&self) -> bool {
        self.composite.is_some()
    }
}

pub struct TrackingSession {
    visibility: VisibilityTracker,
    fusion: FrameFusionEngine,
    alignment: AlignmentStateMachine,
    anchor: FloorAnchor,
    floor: FloorDepthEstimator,
    latest_landmarks: Option<LandmarkFrame>,
    latest_mask: Option<SegmentationMask>,
    last_orientation: Option<Orientation>,
    active: bool,
    ticks: u64,
}

impl TrackingSession {
    /// Build a session from configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the configured background image cannot be loaded
    pub fn new(config: &Config) -> Result<Self> {
        let fusion = FrameFusionEngine::from_config(&config.fusion)?;
        Ok(Self::with_fusion(config, fusion))
    }

    /// Build a session around an already constructed fusion engine
    #[must_use]
    pub fn with_fusion(config: &Config, fusion: FrameFusionEngine) -> Self {
        Self {
            visibility: VisibilityTracker::new(config.visibility.history_capacity.max(1)),
            fusion,
            alignment: AlignmentStateMachine::new(&config.alignment),
            anchor: FloorAnchor::default(),
            floor: FloorDepthEstimator::new(&config.floor),
            latest_landmarks: None,
            latest_mask: None,
            last_orientation: None,
            active: true,
            ticks: 0,
        }
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active
    }

    #[must_use]
    pub fn visibility(&self) -> &VisibilityTracker {
        &self.visibility
    }

    #[must_use]
    pub fn alignment_state(&self) -> AlignmentState {
        self.alignment.state()
    }

    #[must_use]
    pub fn floor_anchor(&self) -> FloorAnchor {
        self.anchor
    }

    #[must_use]
    pub fn latest_landmarks(&self) -> Option<&LandmarkFrame> {
        self.latest_landmarks.as_ref()
    }

    #[must_use]
    pub fn latest_mask(&self) -> Option<&SegmentationMask> {
        self.latest_mask.as_ref()
    }

    #[must_use]
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Store a detector result. An empty result clears the landmarks.
    pub fn apply_landmarks(&mut self, landmarks: Option<LandmarkFrame>) {
        if !self.active {
            return;
        }
        self.latest_landmarks = landmarks;
    }

    /// Store a segmenter result. An empty result keeps the previous mask.
    pub fn apply_mask(&mut self, mask: Option<SegmentationMask>) {
        if !self.active {
            return;
        }
        if let Some(mask) = mask {
            self.latest_mask = Some(mask);
        }
    }

    /// Drop the current mask so later frames count as having no person
    pub fn clear_mask(&mut self) {
        self.latest_mask = None;
    }

    /// Feed a depth map to the floor estimator when it uses the depth strategy
    pub fn apply_depth(&mut self, depth: &Array2<f32>) {
        if !self.active || self.floor.strategy() != FloorStrategy::DepthModel {
            return;
        }
        if let Some(y) = self.floor.estimate_from_depth(depth) {
            self.anchor.track_y(y);
        }
    }

    /// Process one frame with the most recent inference results
    pub fn tick(&mut self, frame: &RgbImage, now: Instant) -> TickOutput {
        self.ticks += 1;
        let tick = self.ticks;

        if !self.active {
            return self.idle_output(tick, 0);
        }

        let fused = self.fusion.fuse(
            frame,
            self.latest_mask.as_ref(),
            self.latest_landmarks.as_ref(),
            &self.visibility,
        );
        if !fused.person_detected() {
            self.alignment.interrupt();
            return self.idle_output(tick, fused.person_pixel_count);
        }

        if self.floor.strategy() == FloorStrategy::Segmentation {
            if let Some(y) = self.latest_mask.as_ref().and_then(|mask| self.floor.estimate_from_mask(mask)) {
                self.anchor.track_y(y);
            }
        }

        let pose = match self.latest_landmarks.clone() {
            Some(landmarks) => Some(self.track_pose(&landmarks, now)),
            None => {
                self.alignment.interrupt();
                None
            }
        };

        TickOutput {
            tick,
            person_pixel_count: fused.person_pixel_count,
            composite: fused.composite,
            pose,
            alignment: self.alignment.state(),
            floor_anchor: self.anchor,
        }
    }

    fn track_pose(&mut self, landmarks: &LandmarkFrame, now: Instant) -> PoseSummary {
        self.visibility.update(landmarks);

        let (orientation, rule) = classify_with_rule(landmarks);
        if self.last_orientation != Some(orientation) {
            debug!("Orientation {orientation} (rule {rule})");
            self.last_orientation = Some(orientation);
        }

        let confidence = orientation_confidence(&self.visibility);
        let required = required_joints(orientation);
        let all_required_visible = required.iter().all(|&joint| self.visibility.is_reliable(joint));
        let position = user_position(landmarks);

        let input = AlignmentInput {
            left_foot_visibility: self.visibility.smoothed_visibility(JointIndex::LeftAnkle),
            right_foot_visibility: self.visibility.smoothed_visibility(JointIndex::RightAnkle),
            all_required_visible,
            hip_depth: position.z,
        };
        self.alignment.update(&input, &mut self.anchor, now);

        PoseSummary {
            orientation,
            rule,
            confidence,
            user_position: position,
            required_joints: required,
            all_required_visible,
        }
    }

    fn idle_output(&self, tick: u64, person_pixel_count: usize) -> TickOutput {
        TickOutput {
            tick,
            person_pixel_count,
            composite: None,
            pose: None,
            alignment: self.alignment.state(),
            floor_anchor: self.anchor,
        }
    }

    /// End the session. Results delivered afterwards are ignored.
    pub fn teardown(&mut self) {
        if self.active {
            info!("Tracking session torn down after {} ticks", self.ticks);
        }
        self.active = false;
        self.latest_landmarks = None;
        self.latest_mask = None;
    }

    /// Start over with empty history, `Searching` state and a free anchor
    pub fn reset(&mut self) {
        self.visibility.reset();
        self.alignment.reset();
        self.anchor.reset();
        self.latest_landmarks = None;
        self.latest_mask = None;
        self.last_orientation = None;
        self.active = true;
        self.ticks = 0;
    }
}
