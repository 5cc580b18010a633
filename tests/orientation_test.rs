//! Orientation classification scenarios


use body_pose_alignment::landmarks::{required_joints, JointIndex, Landmark};
use body_pose_alignment::orientation::{classify, classify_with_rule, orientation_confidence, torso_width_ratio, Orientation};
use body_pose_alignment::visibility::VisibilityTracker;
use test_helpers::{frame_with, standing_frame};

#[test]
fn test_depth_split_left_side_nearer() {
    let frame = frame_with(&[
        (JointIndex::LeftShoulder, Landmark::new(0.45, 0.3, 0.1, 0.9)),
        (JointIndex::RightShoulder, Landmark::new(0.55, 0.3, 0.4, 0.9)),
        (JointIndex::LeftHip, Landmark::new(0.46, 0.55, 0.1, 0.9)),
        (JointIndex::RightHip, Landmark::new(0.54, 0.55, 0.35, 0.9)),
    ]);
    assert_eq!(classify_with_rule(&frame), (Orientation::Left, "depth_split"));
}

#[test]
fn test_depth_split_right_side_nearer() {
    let frame = frame_with(&[
        (JointIndex::LeftShoulder, Landmark::new(0.45, 0.3, 0.4, 0.9)),
        (JointIndex::RightShoulder, Landmark::new(0.55, 0.3, 0.1, 0.9)),
        (JointIndex::LeftHip, Landmark::new(0.46, 0.55, 0.35, 0.9)),
        (JointIndex::RightHip, Landmark::new(0.54, 0.55, 0.1, 0.9)),
    ]);
    assert_eq!(classify(&frame), Orientation::Right);
}

#[test]
fn test_square_shoulders_wide_ratio_is_front() {
    let frame = frame_with(&[
        (JointIndex::LeftShoulder, Landmark::new(0.305, 0.3, 0.0, 0.9)),
        (JointIndex::RightShoulder, Landmark::new(0.695, 0.3, 0.05, 0.9)),
        (JointIndex::LeftHip, Landmark::new(0.35, 0.55, 0.0, 0.9)),
        (JointIndex::RightHip, Landmark::new(0.65, 0.55, 0.05, 0.9)),
    ]);
    let ratio = torso_width_ratio(&frame).unwrap();
    assert!((ratio - 1.3).abs() < 1e-3);
    assert_eq!(classify_with_rule(&frame), (Orientation::Front, "square_shoulders"));
}

#[test]
fn test_mixed_depth_falls_through_to_front() {
    // Shoulders say left, hips say right
    let frame = frame_with(&[
        (JointIndex::LeftShoulder, Landmark::new(0.45, 0.3, 0.0, 0.9)),
        (JointIndex::RightShoulder, Landmark::new(0.55, 0.3, 0.4, 0.9)),
        (JointIndex::LeftHip, Landmark::new(0.46, 0.55, 0.4, 0.9)),
        (JointIndex::RightHip, Landmark::new(0.54, 0.55, 0.0, 0.9)),
    ]);
    assert_eq!(classify_with_rule(&frame), (Orientation::Front, "square_shoulders"));
}

#[test]
fn test_single_visible_shoulder() {
    let left = frame_with(&[
        (JointIndex::LeftShoulder, Landmark::new(0.5, 0.3, 0.0, 0.8)),
        (JointIndex::RightShoulder, Landmark::new(0.5, 0.3, 0.0, 0.2)),
    ]);
    assert_eq!(classify_with_rule(&left), (Orientation::Left, "single_shoulder"));

    let right = frame_with(&[
        (JointIndex::LeftShoulder, Landmark::new(0.5, 0.3, 0.0, 0.3)),
        (JointIndex::RightShoulder, Landmark::new(0.5, 0.3, 0.0, 0.75)),
    ]);
    assert_eq!(classify(&right), Orientation::Right);
}

#[test]
fn test_foot_direction() {
    let feet = |heel_x: f32, toe_x: f32, ankle_gap: f32| {
        frame_with(&[
            (JointIndex::LeftAnkle, Landmark::new(0.5 - ankle_gap / 2.0, 0.9, 0.0, 0.9)),
            (JointIndex::RightAnkle, Landmark::new(0.5 + ankle_gap / 2.0, 0.9, 0.0, 0.9)),
            (JointIndex::LeftHeel, Landmark::new(heel_x, 0.92, 0.0, 0.9)),
            (JointIndex::RightHeel, Landmark::new(heel_x, 0.92, 0.0, 0.9)),
            (JointIndex::LeftFootIndex, Landmark::new(toe_x, 0.93, 0.0, 0.9)),
            (JointIndex::RightFootIndex, Landmark::new(toe_x, 0.93, 0.0, 0.9)),
        ])
    };

    assert_eq!(classify_with_rule(&feet(0.5, 0.4, 0.0)), (Orientation::Left, "foot_direction"));
    assert_eq!(classify_with_rule(&feet(0.5, 0.6, 0.0)), (Orientation::Right, "foot_direction"));
    assert_eq!(classify_with_rule(&feet(0.5, 0.52, 0.2)), (Orientation::Front, "foot_direction"));
    assert_eq!(classify_with_rule(&feet(0.5, 0.52, 0.05)), (Orientation::Front, "default"));
}

#[test]
fn test_nothing_visible_defaults_to_front() {
    let frame = frame_with(&[]);
    assert_eq!(classify_with_rule(&frame), (Orientation::Front, "default"));
}

#[test]
fn test_classification_is_deterministic() {
    let frame = standing_frame(0.9);
    let first = classify_with_rule(&frame);
    for _ in 0..100 {
        assert_eq!(classify_with_rule(&frame), first);
    }
}

#[test]
fn test_confidence_covers_all_joints() {
    let mut tracker = VisibilityTracker::default();
    let frame = frame_with(&[
        (JointIndex::LeftShoulder, Landmark::new(0.4, 0.3, 0.0, 1.0)),
        (JointIndex::RightShoulder, Landmark::new(0.6, 0.3, 0.0, 1.0)),
    ]);
    tracker.update(&frame);
    let confidence = orientation_confidence(&tracker);
    assert!((confidence - 2.0 / 33.0).abs() < 1e-6);
}

#[test]
fn test_required_joints_per_orientation() {
    let front = required_joints(Orientation::Front);
    assert_eq!(front.len(), 12);
    for index in [11, 12, 13, 14, 15, 16, 23, 24, 25, 26, 27, 28] {
        assert!(front.iter().any(|joint| joint.index() == index));
    }

    let left: Vec<usize> = required_joints(Orientation::Left).iter().map(|j| j.index()).collect();
    assert_eq!(left, vec![11, 13, 15, 23, 25, 27]);

    let right: Vec<usize> = required_joints(Orientation::Right).iter().map(|j| j.index()).collect();
    assert_eq!(right, vec![12, 14, 16, 24, 26, 28]);
}
