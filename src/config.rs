//! Configuration management for the pose alignment pipeline

use crate::constants::{
    CAPTURE_HEIGHT, CAPTURE_WIDTH, DEFAULT_BACKGROUND_COLOR, DEFAULT_BOOST_RADIUS, DEFAULT_BOOST_THRESHOLD_SCALE,
    DEFAULT_DEPTH_INTERVAL_MS, DEFAULT_DWELL_MS, DEFAULT_FACE_BLUR_SIGMA, DEFAULT_FACE_PADDING, DEFAULT_FAR_BOUND,
    DEFAULT_FLOOR_BOTTOM_FRACTION, DEFAULT_FLOOR_ROW_COVERAGE, DEFAULT_FOOT_VISIBILITY_THRESHOLD,
    DEFAULT_HISTORY_CAPACITY, DEFAULT_LANDMARK_INTERVAL_MS, DEFAULT_MIN_PERSON_PIXELS, DEFAULT_NEAR_BOUND,
    DEFAULT_SEGMENTATION_INTERVAL_MS, DEFAULT_TARGET_FPS,
};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Camera capture settings
    pub capture: CaptureConfig,

    /// Frame loop and inference cadence
    pub scheduling: SchedulingConfig,

    /// Visibility smoothing
    pub visibility: VisibilityConfig,

    /// Landmark/segmentation fusion and compositing
    pub fusion: FusionConfig,

    /// Alignment state machine
    pub alignment: AlignmentConfig,

    /// Floor anchor estimation
    pub floor: FloorConfig,

    /// Model file paths
    pub models: ModelConfig,
}

/// Camera capture settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Camera device index
    pub camera_index: i32,

    /// Requested frame width
    pub width: u32,

    /// Requested frame height
    pub height: u32,
}

/// Frame loop and inference cadence
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulingConfig {
    /// Composite loop rate
    pub target_fps: u32,

    /// Minimum time between landmark detections (ms)
    pub landmark_interval_ms: u64,

    /// Minimum time between segmentations (ms)
    pub segmentation_interval_ms: u64,

    /// Minimum time between depth estimations (ms)
    pub depth_interval_ms: u64,
}

/// Visibility smoothing
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VisibilityConfig {
    /// Samples kept per joint
    pub history_capacity: usize,
}

/// How non-person pixels are rendered
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum BackgroundConfig {
    /// Fill with a solid RGB color
    Solid { color: [u8; 3] },
    /// Gaussian-blurred camera frame
    Blurred { sigma: f32 },
    /// Backdrop image, cover-fitted to the frame
    Image { path: PathBuf },
    /// Fully transparent
    Transparent,
}

impl Default for BackgroundConfig {
    fn default() -> Self {
        Self::Solid {
            color: DEFAULT_BACKGROUND_COLOR,
        }
    }
}

/// Landmark/segmentation fusion and compositing
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FusionConfig {
    /// Radius in pixels of the disc around each trusted joint
    pub boost_radius: i32,

    /// Fraction of the adaptive threshold a joint must exceed to boost
    pub boost_threshold_scale: f32,

    /// Person pixel count a frame must exceed to be used
    pub min_person_pixels: usize,

    /// Padding around the face bounding box (pixels)
    pub face_padding: f32,

    /// Face blur strength, 0 disables the blur
    pub face_blur_sigma: f32,

    /// Background treatment
    pub background: BackgroundConfig,
}

/// Alignment state machine
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlignmentConfig {
    /// Continuous alignment time required before locking (ms)
    pub dwell_ms: u64,

    /// Smoothed ankle visibility a foot must exceed to count as visible
    pub foot_visibility_threshold: f32,

    /// Hip depth above which the user is too close
    pub near_bound: f32,

    /// Hip depth below which the user is too far
    pub far_bound: f32,
}

/// Floor estimation strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FloorStrategy {
    /// Lowest mask row with enough person pixels
    #[default]
    Segmentation,
    /// Bottom rows of a monocular depth map
    DepthModel,
}

/// Floor anchor estimation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FloorConfig {
    /// Estimation strategy
    pub strategy: FloorStrategy,

    /// Fraction of a row that must be person pixels to be the floor row
    pub row_coverage: f32,

    /// Fraction of depth map rows, from the bottom, averaged as floor
    pub bottom_fraction: f32,
}

/// Model file paths configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Pose landmark ONNX model
    pub landmarks: PathBuf,

    /// Multiclass selfie segmentation ONNX model
    pub segmenter: PathBuf,

    /// Monocular depth ONNX model
    pub depth: PathBuf,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            camera_index: 0,
            width: CAPTURE_WIDTH,
            height: CAPTURE_HEIGHT,
        }
    }
}

impl Default for SchedulingConfig {
    fn default() -> Self {
        Self {
            target_fps: DEFAULT_TARGET_FPS,
            landmark_interval_ms: DEFAULT_LANDMARK_INTERVAL_MS,
            segmentation_interval_ms: DEFAULT_SEGMENTATION_INTERVAL_MS,
            depth_interval_ms: DEFAULT_DEPTH_INTERVAL_MS,
        }
    }
}

impl SchedulingConfig {
    /// Time between composite ticks
    #[must_use]
    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.target_fps.max(1)))
    }

    #[must_use]
    pub fn landmark_interval(&self) -> Duration {
        Duration::from_millis(self.landmark_interval_ms)
    }

    #[must_use]
    pub fn segmentation_interval(&self) -> Duration {
        Duration::from_millis(self.segmentation_interval_ms)
    }

    #[must_use]
    pub fn depth_interval(&self) -> Duration {
        Duration::from_millis(self.depth_interval_ms)
    }
}

impl Default for VisibilityConfig {
    fn default() -> Self {
        Self {
            history_capacity: DEFAULT_HISTORY_CAPACITY,
        }
    }
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            boost_radius: DEFAULT_BOOST_RADIUS,
            boost_threshold_scale: DEFAULT_BOOST_THRESHOLD_SCALE,
            min_person_pixels: DEFAULT_MIN_PERSON_PIXELS,
            face_padding: DEFAULT_FACE_PADDING,
            face_blur_sigma: DEFAULT_FACE_BLUR_SIGMA,
            background: BackgroundConfig::default(),
        }
    }
}

impl Default for AlignmentConfig {
    fn default() -> Self {
        Self {
            dwell_ms: DEFAULT_DWELL_MS,
            foot_visibility_threshold: DEFAULT_FOOT_VISIBILITY_THRESHOLD,
            near_bound: DEFAULT_NEAR_BOUND,
            far_bound: DEFAULT_FAR_BOUND,
        }
    }
}

impl AlignmentConfig {
    #[must_use]
    pub fn dwell(&self) -> Duration {
        Duration::from_millis(self.dwell_ms)
    }
}

impl Default for FloorConfig {
    fn default() -> Self {
        Self {
            strategy: FloorStrategy::default(),
            row_coverage: DEFAULT_FLOOR_ROW_COVERAGE,
            bottom_fraction: DEFAULT_FLOOR_BOTTOM_FRACTION,
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            landmarks: PathBuf::from("assets/pose_landmarks.onnx"),
            segmenter: PathBuf::from("assets/selfie_multiclass.onnx"),
            depth: PathBuf::from("assets/depth.onnx"),
        }
    }
}

impl Config {
    /// Load configuration from a YAML file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML text
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not a valid configuration
    pub fn from_yaml(content: &str) -> Result<Self> {
        serde_yaml::from_str(content).map_err(|e| Error::ConfigError(format!("Failed to parse config: {e}")))
    }

    /// Save configuration to a YAML file
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_yaml::to_string(self)
            .map_err(|e| Error::ConfigError(format!("Failed to serialize config: {e}")))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Validate value ranges. Model paths are checked when models load.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` describing the first invalid value
    pub fn validate(&self) -> Result<()> {
        if self.capture.width == 0 || self.capture.height == 0 {
            return Err(Error::ConfigError("Capture resolution must be non-zero".to_string()));
        }

        if self.scheduling.target_fps == 0 {
            return Err(Error::ConfigError("Target FPS must be greater than 0".to_string()));
        }

        if self.visibility.history_capacity == 0 {
            return Err(Error::ConfigError(
                "Visibility history capacity must be greater than 0".to_string(),
            ));
        }

        if self.fusion.boost_radius < 0 {
            return Err(Error::ConfigError("Boost radius must be non-negative".to_string()));
        }
        if !(0.0..=1.0).contains(&self.fusion.boost_threshold_scale) {
            return Err(Error::ConfigError(
                "Boost threshold scale must be between 0.0 and 1.0".to_string(),
            ));
        }
        if self.fusion.face_padding < 0.0 || self.fusion.face_blur_sigma < 0.0 {
            return Err(Error::ConfigError(
                "Face padding and blur sigma must be non-negative".to_string(),
            ));
        }
        if let BackgroundConfig::Blurred { sigma } = self.fusion.background {
            if sigma <= 0.0 {
                return Err(Error::ConfigError("Background blur sigma must be positive".to_string()));
            }
        }

        if !(0.0..=1.0).contains(&self.alignment.foot_visibility_threshold) {
            return Err(Error::ConfigError(
                "Foot visibility threshold must be between 0.0 and 1.0".to_string(),
            ));
        }
        if self.alignment.far_bound >= self.alignment.near_bound {
            return Err(Error::ConfigError(format!(
                "Far bound ({}) must be below near bound ({})",
                self.alignment.far_bound, self.alignment.near_bound
            )));
        }

        if !(self.floor.row_coverage > 0.0 && self.floor.row_coverage <= 1.0) {
            return Err(Error::ConfigError("Floor row coverage must be in (0, 1]".to_string()));
        }
        if !(self.floor.bottom_fraction > 0.0 && self.floor.bottom_fraction <= 1.0) {
            return Err(Error::ConfigError("Floor bottom fraction must be in (0, 1]".to_string()));
        }

        Ok(())
    }
}

/// Example configuration file content
pub const EXAMPLE_CONFIG: &str = r#"# Body Pose Alignment Configuration

capture:
  camera_index: 0
  width: 640
  height: 480

scheduling:
  target_fps: 24
  landmark_interval_ms: 66
  segmentation_interval_ms: 100
  depth_interval_ms: 250

visibility:
  history_capacity: 5

fusion:
  boost_radius: 10
  boost_threshold_scale: 0.75
  min_person_pixels: 1000
  face_padding: 20.0
  face_blur_sigma: 8.0
  background:
    mode: solid
    color: [34, 34, 34]

alignment:
  dwell_ms: 1000
  foot_visibility_threshold: 0.5
  near_bound: 1.0
  far_bound: -2.0

floor:
  strategy: segmentation
  row_coverage: 0.05
  bottom_fraction: 0.1

models:
  landmarks: "assets/pose_landmarks.onnx"
  segmenter: "assets/selfie_multiclass.onnx"
  depth: "assets/depth.onnx"
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_example_config_parses() {
        let config = Config::from_yaml(EXAMPLE_CONFIG).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.scheduling.target_fps, 24);
        assert_eq!(config.fusion.background, BackgroundConfig::Solid { color: [34, 34, 34] });
        assert_eq!(config.floor.strategy, FloorStrategy::Segmentation);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config = Config::from_yaml("alignment:\n  dwell_ms: 500\n").unwrap();
        assert_eq!(config.alignment.dwell_ms, 500);
        assert_eq!(config.alignment.near_bound, DEFAULT_NEAR_BOUND);
        assert_eq!(config.visibility.history_capacity, DEFAULT_HISTORY_CAPACITY);
    }

    #[test]
    fn test_background_modes() {
        let config = Config::from_yaml("fusion:\n  background:\n    mode: blurred\n    sigma: 5.0\n").unwrap();
        assert_eq!(config.fusion.background, BackgroundConfig::Blurred { sigma: 5.0 });

        let config = Config::from_yaml("fusion:\n  background:\n    mode: transparent\n").unwrap();
        assert_eq!(config.fusion.background, BackgroundConfig::Transparent);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::default();
        config.scheduling.target_fps = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.alignment.far_bound = 2.0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.visibility.history_capacity = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.fusion.background = BackgroundConfig::Blurred { sigma: 0.0 };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_intervals() {
        let scheduling = SchedulingConfig::default();
        assert_eq!(scheduling.landmark_interval(), Duration::from_millis(66));
        assert_eq!(scheduling.segmentation_interval(), Duration::from_millis(100));
        let frame = scheduling.frame_interval().as_secs_f64();
        assert!((frame - 1.0 / 24.0).abs() < 1e-9);
    }
}
