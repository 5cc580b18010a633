//! Constants used throughout the pipeline

/// Number of landmarks produced by the pose detector
pub const NUM_POSE_LANDMARKS: usize = 33;

/// Default number of visibility samples kept per joint
pub const DEFAULT_HISTORY_CAPACITY: usize = 5;

/// Adaptive thresholds: elbows and wrists get the lower bar
pub const EXTREMITY_VISIBILITY_THRESHOLD: f32 = 0.4;
pub const DEFAULT_VISIBILITY_THRESHOLD: f32 = 0.6;

/// Orientation rule thresholds
pub const SHOULDER_STRONG_VISIBILITY: f32 = 0.7;
pub const SHOULDER_WEAK_VISIBILITY: f32 = 0.4;
pub const HIP_VISIBILITY: f32 = 0.5;
pub const FOOT_VISIBILITY: f32 = 0.5;
pub const DEPTH_SPLIT_THRESHOLD: f32 = 0.15;
pub const FOOT_DIRECTION_THRESHOLD: f32 = 0.05;
pub const ANKLE_GAP_THRESHOLD: f32 = 0.1;

/// Capture resolution assumed by pixel-space calculations
pub const CAPTURE_WIDTH: u32 = 640;
pub const CAPTURE_HEIGHT: u32 = 480;

/// Fusion defaults
pub const DEFAULT_BOOST_RADIUS: i32 = 10;
pub const DEFAULT_BOOST_THRESHOLD_SCALE: f32 = 0.75;
pub const DEFAULT_MIN_PERSON_PIXELS: usize = 1000;
pub const DEFAULT_FACE_PADDING: f32 = 20.0;
pub const DEFAULT_FACE_BLUR_SIGMA: f32 = 8.0;
pub const DEFAULT_BACKGROUND_COLOR: [u8; 3] = [0x22, 0x22, 0x22];

/// Segmentation categories of the multiclass selfie model
pub const CATEGORY_BACKGROUND: u8 = 0;
pub const PERSON_CATEGORIES: [u8; 4] = [1, 2, 3, 4];

/// Alignment defaults
pub const DEFAULT_DWELL_MS: u64 = 1000;
pub const DEFAULT_FOOT_VISIBILITY_THRESHOLD: f32 = 0.5;
pub const DEFAULT_NEAR_BOUND: f32 = 1.0;
pub const DEFAULT_FAR_BOUND: f32 = -2.0;

/// Floor estimation defaults
pub const DEFAULT_FLOOR_ROW_COVERAGE: f32 = 0.05;
pub const DEFAULT_FLOOR_BOTTOM_FRACTION: f32 = 0.1;

/// Normalized image space to grid world space
pub const WORLD_SCALE_X: f32 = 3.0;
pub const WORLD_SCALE_Y: f32 = 5.0;
pub const WORLD_SCALE_Z: f32 = 4.0;

/// Scheduling defaults
pub const DEFAULT_TARGET_FPS: u32 = 24;
pub const DEFAULT_LANDMARK_INTERVAL_MS: u64 = 66;
pub const DEFAULT_SEGMENTATION_INTERVAL_MS: u64 = 100;
pub const DEFAULT_DEPTH_INTERVAL_MS: u64 = 250;
