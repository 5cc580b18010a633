//! Body orientation classification.
//!
//! Orientation is decided by an ordered list of named rules. Each rule
//! either returns a verdict or passes, and the first verdict wins; when no
//! rule matches the person is assumed to face the camera.

use std::fmt;

use crate::constants::{
    ANKLE_GAP_THRESHOLD, DEPTH_SPLIT_THRESHOLD, FOOT_DIRECTION_THRESHOLD, FOOT_VISIBILITY, HIP_VISIBILITY,
    SHOULDER_STRONG_VISIBILITY, SHOULDER_WEAK_VISIBILITY,
};
use crate::landmarks::{JointIndex, LandmarkFrame};
use crate::visibility::VisibilityTracker;

/// Which way the person is facing relative to the camera
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Orientation {
    #[default]
    Front,
    Left,
    Right,
}

impl fmt::Display for Orientation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Front => "FRONT",
            Self::Left => "LEFT",
            Self::Right => "RIGHT",
        };
        f.write_str(name)
    }
}

/// A named classification rule
#[derive(Clone, Copy)]
pub struct OrientationRule {
    pub name: &'static str,
    pub evaluate: fn(&LandmarkFrame) -> Option<Orientation>,
}

impl fmt::Debug for OrientationRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OrientationRule").field("name", &self.name).finish()
    }
}

/// Rules in precedence order
pub const RULES: [OrientationRule; 4] = [
    OrientationRule {
        name: "depth_split",
        evaluate: depth_split,
    },
    OrientationRule {
        name: "square_shoulders",
        evaluate: square_shoulders,
    },
    OrientationRule {
        name: "single_shoulder",
        evaluate: single_shoulder,
    },
    OrientationRule {
        name: "foot_direction",
        evaluate: foot_direction,
    },
];

/// Name reported when no rule matched
pub const DEFAULT_RULE: &str = "default";

/// Classify the facing direction of a skeleton
#[must_use]
pub fn classify(frame: &LandmarkFrame) -> Orientation {
    classify_with_rule(frame).0
}

/// Classify and report which rule produced the verdict
#[must_use]
pub fn classify_with_rule(frame: &LandmarkFrame) -> (Orientation, &'static str) {
    RULES
        .iter()
        .find_map(|rule| (rule.evaluate)(frame).map(|orientation| (orientation, rule.name)))
        .unwrap_or((Orientation::Front, DEFAULT_RULE))
}

/// Whole-body confidence: mean smoothed visibility over all joints
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn orientation_confidence(tracker: &VisibilityTracker) -> f32 {
    let sum: f32 = JointIndex::ALL
        .iter()
        .map(|&joint| tracker.smoothed_visibility(joint))
        .sum();
    sum / JointIndex::COUNT as f32
}

/// Shoulder width over hip width, when both hips are visible
#[must_use]
pub fn torso_width_ratio(frame: &LandmarkFrame) -> Option<f32> {
    let left_hip = frame.get(JointIndex::LeftHip);
    let right_hip = frame.get(JointIndex::RightHip);
    if left_hip.visibility <= HIP_VISIBILITY || right_hip.visibility <= HIP_VISIBILITY {
        return None;
    }
    let hip_width = (right_hip.x - left_hip.x).abs();
    if hip_width <= f32::EPSILON {
        return None;
    }
    let shoulder_width =
        (frame.get(JointIndex::RightShoulder).x - frame.get(JointIndex::LeftShoulder).x).abs();
    Some(shoulder_width / hip_width)
}

fn shoulders_visible(frame: &LandmarkFrame) -> bool {
    frame.visibility(JointIndex::LeftShoulder) > SHOULDER_STRONG_VISIBILITY
        && frame.visibility(JointIndex::RightShoulder) > SHOULDER_STRONG_VISIBILITY
}

/// One side of the torso is clearly nearer the camera than the other
fn depth_split(frame: &LandmarkFrame) -> Option<Orientation> {
    if !shoulders_visible(frame) {
        return None;
    }
    let left_shoulder = frame.get(JointIndex::LeftShoulder);
    let right_shoulder = frame.get(JointIndex::RightShoulder);
    let left_hip = frame.get(JointIndex::LeftHip);
    let right_hip = frame.get(JointIndex::RightHip);

    let shoulder_dz = (left_shoulder.z - right_shoulder.z).abs();
    let hip_dz = (left_hip.z - right_hip.z).abs();
    if (shoulder_dz + hip_dz) / 2.0 <= DEPTH_SPLIT_THRESHOLD {
        return None;
    }

    if left_shoulder.z < right_shoulder.z && left_hip.z < right_hip.z {
        Some(Orientation::Left)
    } else if right_shoulder.z < left_shoulder.z && right_hip.z < left_hip.z {
        Some(Orientation::Right)
    } else {
        None
    }
}

/// Both shoulders clearly visible without a depth split: facing the camera.
///
/// A shoulder/hip width ratio far from 1 also means FRONT here, so the ratio
/// does not influence the verdict.
fn square_shoulders(frame: &LandmarkFrame) -> Option<Orientation> {
    shoulders_visible(frame).then_some(Orientation::Front)
}

/// Only one shoulder is visible: the person shows that side
fn single_shoulder(frame: &LandmarkFrame) -> Option<Orientation> {
    let left = frame.visibility(JointIndex::LeftShoulder);
    let right = frame.visibility(JointIndex::RightShoulder);
    if left > SHOULDER_STRONG_VISIBILITY && right < SHOULDER_WEAK_VISIBILITY {
        Some(Orientation::Left)
    } else if right > SHOULDER_STRONG_VISIBILITY && left < SHOULDER_WEAK_VISIBILITY {
        Some(Orientation::Right)
    } else {
        None
    }
}

/// Toes pointing the same way sideways, or feet apart facing forward
fn foot_direction(frame: &LandmarkFrame) -> Option<Orientation> {
    if !JointIndex::FEET
        .iter()
        .all(|&joint| frame.visibility(joint) > FOOT_VISIBILITY)
    {
        return None;
    }

    let left_dir = frame.get(JointIndex::LeftFootIndex).x - frame.get(JointIndex::LeftHeel).x;
    let right_dir = frame.get(JointIndex::RightFootIndex).x - frame.get(JointIndex::RightHeel).x;

    if left_dir < -FOOT_DIRECTION_THRESHOLD && right_dir < -FOOT_DIRECTION_THRESHOLD {
        return Some(Orientation::Left);
    }
    if left_dir > FOOT_DIRECTION_THRESHOLD && right_dir > FOOT_DIRECTION_THRESHOLD {
        return Some(Orientation::Right);
    }

    let ankle_gap = (frame.get(JointIndex::LeftAnkle).x - frame.get(JointIndex::RightAnkle).x).abs();
    (ankle_gap > ANKLE_GAP_THRESHOLD).then_some(Orientation::Front)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::landmarks::Landmark;

    fn frame_with(points: &[(JointIndex, Landmark)]) -> LandmarkFrame {
        let mut landmarks = [Landmark::default(); JointIndex::COUNT];
        for &(joint, landmark) in points {
            landmarks[joint.index()] = landmark;
        }
        LandmarkFrame::new(landmarks)
    }

    #[test]
    fn test_rule_order() {
        let names: Vec<_> = RULES.iter().map(|r| r.name).collect();
        assert_eq!(
            names,
            vec!["depth_split", "square_shoulders", "single_shoulder", "foot_direction"]
        );
    }

    #[test]
    fn test_empty_frame_defaults_to_front() {
        let (orientation, rule) = classify_with_rule(&LandmarkFrame::default());
        assert_eq!(orientation, Orientation::Front);
        assert_eq!(rule, DEFAULT_RULE);
    }

    #[test]
    fn test_depth_split_right() {
        let frame = frame_with(&[
            (JointIndex::LeftShoulder, Landmark::new(0.4, 0.3, 0.4, 0.9)),
            (JointIndex::RightShoulder, Landmark::new(0.6, 0.3, 0.1, 0.9)),
            (JointIndex::LeftHip, Landmark::new(0.4, 0.6, 0.35, 0.9)),
            (JointIndex::RightHip, Landmark::new(0.6, 0.6, 0.1, 0.9)),
        ]);
        assert_eq!(classify_with_rule(&frame), (Orientation::Right, "depth_split"));
    }

    #[test]
    fn test_depth_split_disagreement_falls_through() {
        // Left shoulder nearer, right hip nearer: no side wins
        let frame = frame_with(&[
            (JointIndex::LeftShoulder, Landmark::new(0.4, 0.3, 0.0, 0.9)),
            (JointIndex::RightShoulder, Landmark::new(0.6, 0.3, 0.4, 0.9)),
            (JointIndex::LeftHip, Landmark::new(0.4, 0.6, 0.4, 0.9)),
            (JointIndex::RightHip, Landmark::new(0.6, 0.6, 0.0, 0.9)),
        ]);
        assert_eq!(classify_with_rule(&frame), (Orientation::Front, "square_shoulders"));
    }

    #[test]
    fn test_single_shoulder() {
        let left = frame_with(&[
            (JointIndex::LeftShoulder, Landmark::new(0.4, 0.3, 0.0, 0.9)),
            (JointIndex::RightShoulder, Landmark::new(0.6, 0.3, 0.0, 0.2)),
        ]);
        assert_eq!(classify_with_rule(&left), (Orientation::Left, "single_shoulder"));

        let right = frame_with(&[
            (JointIndex::LeftShoulder, Landmark::new(0.4, 0.3, 0.0, 0.3)),
            (JointIndex::RightShoulder, Landmark::new(0.6, 0.3, 0.0, 0.8)),
        ]);
        assert_eq!(classify_with_rule(&right), (Orientation::Right, "single_shoulder"));
    }

    #[test]
    fn test_foot_direction() {
        let feet = |left_toe: f32, right_toe: f32, right_ankle: f32| {
            frame_with(&[
                (JointIndex::LeftAnkle, Landmark::new(0.45, 0.9, 0.0, 0.9)),
                (JointIndex::RightAnkle, Landmark::new(right_ankle, 0.9, 0.0, 0.9)),
                (JointIndex::LeftHeel, Landmark::new(0.45, 0.92, 0.0, 0.9)),
                (JointIndex::RightHeel, Landmark::new(0.55, 0.92, 0.0, 0.9)),
                (JointIndex::LeftFootIndex, Landmark::new(left_toe, 0.95, 0.0, 0.9)),
                (JointIndex::RightFootIndex, Landmark::new(right_toe, 0.95, 0.0, 0.9)),
            ])
        };

        assert_eq!(classify(&feet(0.35, 0.45, 0.55)), Orientation::Left);
        assert_eq!(classify(&feet(0.55, 0.65, 0.55)), Orientation::Right);
        assert_eq!(classify_with_rule(&feet(0.45, 0.55, 0.60)), (Orientation::Front, "foot_direction"));
        // Feet together and pointing forward: nothing decides
        assert_eq!(classify_with_rule(&feet(0.45, 0.55, 0.50)), (Orientation::Front, DEFAULT_RULE));
    }

    #[test]
    fn test_torso_width_ratio() {
        let frame = frame_with(&[
            (JointIndex::LeftShoulder, Landmark::new(0.3, 0.3, 0.0, 0.9)),
            (JointIndex::RightShoulder, Landmark::new(0.69, 0.3, 0.0, 0.9)),
            (JointIndex::LeftHip, Landmark::new(0.35, 0.6, 0.0, 0.9)),
            (JointIndex::RightHip, Landmark::new(0.65, 0.6, 0.0, 0.9)),
        ]);
        let ratio = torso_width_ratio(&frame).unwrap();
        assert!((ratio - 1.3).abs() < 1e-4);

        let hidden_hips = frame_with(&[(JointIndex::LeftShoulder, Landmark::new(0.3, 0.3, 0.0, 0.9))]);
        assert!(torso_width_ratio(&hidden_hips).is_none());
    }

    #[test]
    fn test_orientation_confidence() {
        let mut tracker = VisibilityTracker::default();
        assert_eq!(orientation_confidence(&tracker), 0.0);

        tracker.update(&LandmarkFrame::new([Landmark::new(0.5, 0.5, 0.0, 0.5); JointIndex::COUNT]));
        assert!((orientation_confidence(&tracker) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_display() {
        assert_eq!(Orientation::Front.to_string(), "FRONT");
        assert_eq!(Orientation::Left.to_string(), "LEFT");
        assert_eq!(Orientation::Right.to_string(), "RIGHT");
    }
}
