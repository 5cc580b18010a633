//! Inference collaborators consumed by the pipeline.
//!
//! Models take `&mut self` so that a backend can keep scratch buffers or a
//! session handle that is not `Sync`. The runtime moves each model onto a
//! blocking thread for the duration of one call, hence the `Send` bound.

use std::time::Duration;

use image::RgbImage;
use ndarray::Array2;

use crate::landmarks::LandmarkFrame;
use crate::segmentation::SegmentationMask;
use crate::Result;

/// Skeletal keypoint detector
pub trait LandmarkDetector: Send {
    /// Detect at most one person in `frame`. `Ok(None)` means no person was
    /// found this time, which is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if inference fails
    fn detect(&mut self, frame: &RgbImage, timestamp: Duration) -> Result<Option<LandmarkFrame>>;
}

/// Per-pixel category segmenter
pub trait Segmenter: Send {
    /// Segment `frame`. `Ok(None)` means the segmenter produced nothing and
    /// the previous mask should be kept.
    ///
    /// # Errors
    ///
    /// Returns an error if inference fails
    fn segment(&mut self, frame: &RgbImage, timestamp: Duration) -> Result<Option<SegmentationMask>>;
}

/// Monocular depth estimator
pub trait DepthModel: Send {
    /// Dense depth map indexed `[row, column]`
    ///
    /// # Errors
    ///
    /// Returns an error if inference fails
    fn estimate(&mut self, frame: &RgbImage) -> Result<Array2<f32>>;
}

impl<T: LandmarkDetector + ?Sized> LandmarkDetector for Box<T> {
    fn detect(&mut self, frame: &RgbImage, timestamp: Duration) -> Result<Option<LandmarkFrame>> {
        (**self).detect(frame, timestamp)
    }
}

impl<T: Segmenter + ?Sized> Segmenter for Box<T> {
    fn segment(&mut self, frame: &RgbImage, timestamp: Duration) -> Result<Option<SegmentationMask>> {
        (**self).segment(frame, timestamp)
    }
}

impl<T: DepthModel + ?Sized> DepthModel for Box<T> {
    fn estimate(&mut self, frame: &RgbImage) -> Result<Array2<f32>> {
        (**self).estimate(frame)
    }
}

/// Logistic function used to turn raw detector scores into probabilities
#[must_use]
pub fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}
