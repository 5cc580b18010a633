//! Pose landmark data model.
//!
//! A [`LandmarkFrame`] always holds exactly [`NUM_POSE_LANDMARKS`] entries
//! addressed by [`JointIndex`]. Joints a detector did not report are padded
//! with zero visibility so every downstream stage sees a full skeleton.

use crate::constants::NUM_POSE_LANDMARKS;
use crate::orientation::Orientation;

/// The 33 pose landmark indices
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(usize)]
pub enum JointIndex {
    Nose = 0,
    LeftEyeInner = 1,
    LeftEye = 2,
    LeftEyeOuter = 3,
    RightEyeInner = 4,
    RightEye = 5,
    RightEyeOuter = 6,
    LeftEar = 7,
    RightEar = 8,
    MouthLeft = 9,
    MouthRight = 10,
    LeftShoulder = 11,
    RightShoulder = 12,
    LeftElbow = 13,
    RightElbow = 14,
    LeftWrist = 15,
    RightWrist = 16,
    LeftPinky = 17,
    RightPinky = 18,
    LeftIndex = 19,
    RightIndex = 20,
    LeftThumb = 21,
    RightThumb = 22,
    LeftHip = 23,
    RightHip = 24,
    LeftKnee = 25,
    RightKnee = 26,
    LeftAnkle = 27,
    RightAnkle = 28,
    LeftHeel = 29,
    RightHeel = 30,
    LeftFootIndex = 31,
    RightFootIndex = 32,
}

impl JointIndex {
    pub const COUNT: usize = NUM_POSE_LANDMARKS;

    /// All joints in index order
    pub const ALL: [JointIndex; NUM_POSE_LANDMARKS] = [
        Self::Nose,
        Self::LeftEyeInner,
        Self::LeftEye,
        Self::LeftEyeOuter,
        Self::RightEyeInner,
        Self::RightEye,
        Self::RightEyeOuter,
        Self::LeftEar,
        Self::RightEar,
        Self::MouthLeft,
        Self::MouthRight,
        Self::LeftShoulder,
        Self::RightShoulder,
        Self::LeftElbow,
        Self::RightElbow,
        Self::LeftWrist,
        Self::RightWrist,
        Self::LeftPinky,
        Self::RightPinky,
        Self::LeftIndex,
        Self::RightIndex,
        Self::LeftThumb,
        Self::RightThumb,
        Self::LeftHip,
        Self::RightHip,
        Self::LeftKnee,
        Self::RightKnee,
        Self::LeftAnkle,
        Self::RightAnkle,
        Self::LeftHeel,
        Self::RightHeel,
        Self::LeftFootIndex,
        Self::RightFootIndex,
    ];

    /// Facial joints (nose, eyes, ears, mouth corners)
    pub const FACE: [JointIndex; 11] = [
        Self::Nose,
        Self::LeftEyeInner,
        Self::LeftEye,
        Self::LeftEyeOuter,
        Self::RightEyeInner,
        Self::RightEye,
        Self::RightEyeOuter,
        Self::LeftEar,
        Self::RightEar,
        Self::MouthLeft,
        Self::MouthRight,
    ];

    /// Ankle, heel and toe joints of both feet
    pub const FEET: [JointIndex; 6] = [
        Self::LeftAnkle,
        Self::RightAnkle,
        Self::LeftHeel,
        Self::RightHeel,
        Self::LeftFootIndex,
        Self::RightFootIndex,
    ];

    #[must_use]
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    #[must_use]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Human readable anatomical label
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Nose => "Nose",
            Self::LeftEyeInner => "Left Eye (Inner)",
            Self::LeftEye => "Left Eye",
            Self::LeftEyeOuter => "Left Eye (Outer)",
            Self::RightEyeInner => "Right Eye (Inner)",
            Self::RightEye => "Right Eye",
            Self::RightEyeOuter => "Right Eye (Outer)",
            Self::LeftEar => "Left Ear",
            Self::RightEar => "Right Ear",
            Self::MouthLeft => "Mouth (Left)",
            Self::MouthRight => "Mouth (Right)",
            Self::LeftShoulder => "Left Shoulder",
            Self::RightShoulder => "Right Shoulder",
            Self::LeftElbow => "Left Elbow",
            Self::RightElbow => "Right Elbow",
            Self::LeftWrist => "Left Wrist",
            Self::RightWrist => "Right Wrist",
            Self::LeftPinky => "Left Pinky",
            Self::RightPinky => "Right Pinky",
            Self::LeftIndex => "Left Index",
            Self::RightIndex => "Right Index",
            Self::LeftThumb => "Left Thumb",
            Self::RightThumb => "Right Thumb",
            Self::LeftHip => "Left Hip",
            Self::RightHip => "Right Hip",
            Self::LeftKnee => "Left Knee",
            Self::RightKnee => "Right Knee",
            Self::LeftAnkle => "Left Ankle",
            Self::RightAnkle => "Right Ankle",
            Self::LeftHeel => "Left Heel",
            Self::RightHeel => "Right Heel",
            Self::LeftFootIndex => "Left Foot Index",
            Self::RightFootIndex => "Right Foot Index",
        }
    }
}

/// Single pose landmark in normalized camera space
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Landmark {
    /// Normalized X (0.0 left .. 1.0 right)
    pub x: f32,
    /// Normalized Y (0.0 top .. 1.0 bottom)
    pub y: f32,
    /// Relative depth, smaller is nearer to the camera
    pub z: f32,
    /// Detector confidence that the joint is correctly localized
    pub visibility: f32,
}

impl Landmark {
    #[must_use]
    pub fn new(x: f32, y: f32, z: f32, visibility: f32) -> Self {
        Self { x, y, z, visibility }
    }

    /// Pixel coordinates, truncated toward negative infinity. Coordinates are
    /// clamped to one frame beyond each edge.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
    pub fn to_pixel(&self, width: u32, height: u32) -> (i32, i32) {
        let px = (self.x.clamp(-1.0, 2.0) * width as f32).floor() as i32;
        let py = (self.y.clamp(-1.0, 2.0) * height as f32).floor() as i32;
        (px, py)
    }
}

/// A full skeleton produced by one detector inference
#[derive(Debug, Clone, PartialEq)]
pub struct LandmarkFrame {
    landmarks: [Landmark; NUM_POSE_LANDMARKS],
}

impl LandmarkFrame {
    #[must_use]
    pub fn new(landmarks: [Landmark; NUM_POSE_LANDMARKS]) -> Self {
        Self { landmarks }
    }

    /// Build a frame from however many points the detector reported.
    ///
    /// Missing trailing joints get a default landmark with zero visibility;
    /// extra points are ignored.
    #[must_use]
    pub fn from_points(points: &[Landmark]) -> Self {
        let mut landmarks = [Landmark::default(); NUM_POSE_LANDMARKS];
        for (slot, point) in landmarks.iter_mut().zip(points) {
            *slot = *point;
        }
        Self { landmarks }
    }

    #[must_use]
    pub fn get(&self, joint: JointIndex) -> &Landmark {
        &self.landmarks[joint.index()]
    }

    #[must_use]
    pub fn visibility(&self, joint: JointIndex) -> f32 {
        self.get(joint).visibility
    }

    #[must_use]
    pub fn landmarks(&self) -> &[Landmark; NUM_POSE_LANDMARKS] {
        &self.landmarks
    }

    pub fn iter(&self) -> impl Iterator<Item = (JointIndex, &Landmark)> {
        JointIndex::ALL.iter().copied().zip(self.landmarks.iter())
    }

    /// Midpoint of the two hips in normalized space
    #[must_use]
    pub fn hip_midpoint(&self) -> (f32, f32, f32) {
        let left = self.get(JointIndex::LeftHip);
        let right = self.get(JointIndex::RightHip);
        (
            (left.x + right.x) / 2.0,
            (left.y + right.y) / 2.0,
            (left.z + right.z) / 2.0,
        )
    }
}

impl Default for LandmarkFrame {
    fn default() -> Self {
        Self {
            landmarks: [Landmark::default(); NUM_POSE_LANDMARKS],
        }
    }
}

/// Skeleton connection between two joints
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Connection {
    pub start: JointIndex,
    pub end: JointIndex,
}

const fn conn(start: JointIndex, end: JointIndex) -> Connection {
    Connection { start, end }
}

/// Connections drawn for a person facing the camera
pub const FRONT_VIEW_CONNECTIONS: [Connection; 12] = [
    conn(JointIndex::LeftShoulder, JointIndex::RightShoulder),
    conn(JointIndex::LeftShoulder, JointIndex::LeftElbow),
    conn(JointIndex::LeftElbow, JointIndex::LeftWrist),
    conn(JointIndex::RightShoulder, JointIndex::RightElbow),
    conn(JointIndex::RightElbow, JointIndex::RightWrist),
    conn(JointIndex::LeftShoulder, JointIndex::LeftHip),
    conn(JointIndex::RightShoulder, JointIndex::RightHip),
    conn(JointIndex::LeftHip, JointIndex::RightHip),
    conn(JointIndex::LeftHip, JointIndex::LeftKnee),
    conn(JointIndex::LeftKnee, JointIndex::LeftAnkle),
    conn(JointIndex::RightHip, JointIndex::RightKnee),
    conn(JointIndex::RightKnee, JointIndex::RightAnkle),
];

/// Connections of the left body side
pub const LEFT_VIEW_CONNECTIONS: [Connection; 5] = [
    conn(JointIndex::LeftShoulder, JointIndex::LeftElbow),
    conn(JointIndex::LeftElbow, JointIndex::LeftWrist),
    conn(JointIndex::LeftShoulder, JointIndex::LeftHip),
    conn(JointIndex::LeftHip, JointIndex::LeftKnee),
    conn(JointIndex::LeftKnee, JointIndex::LeftAnkle),
];

/// Connections of the right body side
pub const RIGHT_VIEW_CONNECTIONS: [Connection; 5] = [
    conn(JointIndex::RightShoulder, JointIndex::RightElbow),
    conn(JointIndex::RightElbow, JointIndex::RightWrist),
    conn(JointIndex::RightShoulder, JointIndex::RightHip),
    conn(JointIndex::RightHip, JointIndex::RightKnee),
    conn(JointIndex::RightKnee, JointIndex::RightAnkle),
];

/// Connection set used for an orientation
#[must_use]
pub fn connections_for(orientation: Orientation) -> &'static [Connection] {
    match orientation {
        Orientation::Front => &FRONT_VIEW_CONNECTIONS,
        Orientation::Left => &LEFT_VIEW_CONNECTIONS,
        Orientation::Right => &RIGHT_VIEW_CONNECTIONS,
    }
}

/// Distinct joints touched by an orientation's connection set, in first-seen order
#[must_use]
pub fn required_joints(orientation: Orientation) -> Vec<JointIndex> {
    let mut joints = Vec::new();
    for connection in connections_for(orientation) {
        for joint in [connection.start, connection.end] {
            if !joints.contains(&joint) {
                joints.push(joint);
            }
        }
    }
    joints
}
