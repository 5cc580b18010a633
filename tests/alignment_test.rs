//! Alignment and floor anchor behaviour through the tracking session


use std::time::{Duration, Instant};

use body_pose_alignment::alignment::AlignmentState;
use body_pose_alignment::config::{Config, FloorStrategy};
use body_pose_alignment::floor::FloorAnchor;
use body_pose_alignment::orientation::Orientation;
use body_pose_alignment::session::TrackingSession;
use nalgebra::Vector3;
use ndarray::Array2;
use test_helpers::{counted_mask, full_mask, rect_mask, solid_frame, standing_frame, standing_frame_with_ankles};

const WIDTH: u32 = 64;
const HEIGHT: u32 = 48;

fn session_with_person(config: &Config) -> TrackingSession {
    let mut session = TrackingSession::new(config).unwrap();
    session.apply_mask(Some(full_mask(WIDTH, HEIGHT)));
    session
}

#[test]
fn test_invisible_feet_is_too_close() {
    let mut session = session_with_person(&Config::default());
    session.apply_landmarks(Some(standing_frame_with_ankles(0.9, 0.1)));

    let output = session.tick(&solid_frame(WIDTH, HEIGHT, [80; 3]), Instant::now());
    assert_eq!(output.alignment, AlignmentState::TooClose);
    // Ankles are required joints, so the pose is not fully visible either
    assert!(!output.pose.unwrap().all_required_visible);
}

#[test]
fn test_dwell_locks_and_freezes_anchor() {
    let mut session = session_with_person(&Config::default());
    session.apply_landmarks(Some(standing_frame(0.9)));
    let frame = solid_frame(WIDTH, HEIGHT, [80; 3]);
    let start = Instant::now();

    let first = session.tick(&frame, start);
    let pose = first.pose.clone().unwrap();
    assert_eq!(pose.orientation, Orientation::Front);
    assert!(pose.all_required_visible);
    assert_eq!(first.alignment, AlignmentState::Aligning);

    let mid = session.tick(&frame, start + Duration::from_millis(500));
    assert_eq!(mid.alignment, AlignmentState::Aligning);
    assert!(!mid.floor_anchor.is_frozen());

    let locked = session.tick(&frame, start + Duration::from_millis(1000));
    assert_eq!(locked.alignment, AlignmentState::Locked);
    assert!(locked.floor_anchor.is_frozen());
    let frozen_y = locked.floor_anchor.y();
    // Bottom row of a full mask
    let expected = (0.5 - 47.0 / 48.0) * 5.0;
    assert!((frozen_y - expected).abs() < 1e-5);

    // The person's feet move up the frame; the anchor stays put
    session.apply_mask(Some(rect_mask(WIDTH, HEIGHT, 0..WIDTH, 0..30, 4)));
    session.apply_landmarks(Some(standing_frame_with_ankles(0.9, 0.1)));
    let later = session.tick(&frame, start + Duration::from_millis(1500));
    assert_eq!(later.alignment, AlignmentState::Locked);
    assert_eq!(later.floor_anchor.y(), frozen_y);
}

#[test]
fn test_absence_restarts_dwell() {
    let mut session = session_with_person(&Config::default());
    session.apply_landmarks(Some(standing_frame(0.9)));
    let frame = solid_frame(WIDTH, HEIGHT, [80; 3]);
    let start = Instant::now();
    assert_eq!(session.tick(&frame, start).alignment, AlignmentState::Aligning);

    // The person walks away for five seconds
    session.apply_landmarks(None);
    session.apply_mask(Some(counted_mask(WIDTH, HEIGHT, 1)));
    for step in 1..50 {
        let output = session.tick(&frame, start + Duration::from_millis(step * 100));
        assert!(!output.person_detected());
        assert_eq!(output.alignment, AlignmentState::Aligning);
    }

    // Back in frame: the dwell starts over instead of locking at once
    session.apply_mask(Some(full_mask(WIDTH, HEIGHT)));
    session.apply_landmarks(Some(standing_frame(0.9)));
    let back = session.tick(&frame, start + Duration::from_millis(5000));
    assert_eq!(back.alignment, AlignmentState::Aligning);
    assert!(!back.floor_anchor.is_frozen());

    let locked = session.tick(&frame, start + Duration::from_millis(6000));
    assert_eq!(locked.alignment, AlignmentState::Locked);
}

#[test]
fn test_missing_landmarks_restart_dwell() {
    let mut session = session_with_person(&Config::default());
    session.apply_landmarks(Some(standing_frame(0.9)));
    let frame = solid_frame(WIDTH, HEIGHT, [80; 3]);
    let start = Instant::now();
    session.tick(&frame, start);

    // Mask still shows a person but the detector lost the skeleton
    session.apply_landmarks(None);
    let gap = session.tick(&frame, start + Duration::from_millis(500));
    assert!(gap.person_detected());
    assert!(gap.pose.is_none());

    session.apply_landmarks(Some(standing_frame(0.9)));
    let back = session.tick(&frame, start + Duration::from_millis(1200));
    assert_eq!(back.alignment, AlignmentState::Aligning);
}

#[test]
fn test_anchor_tracks_floor_before_lock() {
    let mut session = session_with_person(&Config::default());
    session.apply_landmarks(Some(standing_frame_with_ankles(0.9, 0.1)));
    let frame = solid_frame(WIDTH, HEIGHT, [80; 3]);

    let full = session.tick(&frame, Instant::now());
    session.apply_mask(Some(rect_mask(WIDTH, HEIGHT, 0..WIDTH, 0..24, 4)));
    let upper = session.tick(&frame, Instant::now());

    assert!(!upper.floor_anchor.is_frozen());
    assert!(upper.floor_anchor.y() > full.floor_anchor.y());
    assert!((upper.floor_anchor.y() - (0.5 - 23.0 / 48.0) * 5.0).abs() < 1e-5);
}

#[test]
fn test_no_person_does_not_advance_state() {
    let mut session = TrackingSession::new(&Config::default()).unwrap();
    session.apply_mask(Some(rect_mask(WIDTH, HEIGHT, 0..10, 0..10, 1)));
    session.apply_landmarks(Some(standing_frame_with_ankles(0.9, 0.1)));

    let output = session.tick(&solid_frame(WIDTH, HEIGHT, [0; 3]), Instant::now());
    assert_eq!(output.person_pixel_count, 100);
    assert!(output.pose.is_none());
    assert_eq!(output.alignment, AlignmentState::Searching);
    assert_eq!(session.visibility().history_len(body_pose_alignment::landmarks::JointIndex::Nose), 0);
}

#[test]
fn test_depth_strategy_feeds_anchor() {
    let mut config = Config::default();
    config.floor.strategy = FloorStrategy::DepthModel;
    let mut session = session_with_person(&config);

    let depth = Array2::from_shape_fn((50, 10), |(row, _)| if row >= 45 { 1.5 } else { 7.0 });
    session.apply_depth(&depth);
    assert!((session.floor_anchor().y() - 1.5).abs() < 1e-6);

    // Segmentation does not move the anchor under the depth strategy
    session.apply_landmarks(Some(standing_frame_with_ankles(0.9, 0.1)));
    let output = session.tick(&solid_frame(WIDTH, HEIGHT, [80; 3]), Instant::now());
    assert!((output.floor_anchor.y() - 1.5).abs() < 1e-6);
}

#[test]
fn test_reset_returns_to_searching() {
    let mut session = session_with_person(&Config::default());
    session.apply_landmarks(Some(standing_frame(0.9)));
    let frame = solid_frame(WIDTH, HEIGHT, [80; 3]);
    let start = Instant::now();
    session.tick(&frame, start);
    session.tick(&frame, start + Duration::from_secs(2));
    assert_eq!(session.alignment_state(), AlignmentState::Locked);

    session.reset();
    assert_eq!(session.alignment_state(), AlignmentState::Searching);
    assert!(!session.floor_anchor().is_frozen());
    assert!(session.latest_mask().is_none());
}

#[test]
fn test_freeze_twice_keeps_first_value() {
    let mut anchor = FloorAnchor::default();
    anchor.freeze(Vector3::new(0.0, -2.0, 0.0));
    anchor.freeze(Vector3::new(1.0, 4.0, 1.0));
    assert_eq!(anchor.position(), Vector3::new(0.0, -2.0, 0.0));
}
