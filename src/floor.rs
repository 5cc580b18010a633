//! Floor anchor tracking.
//!
//! The anchor follows the latest ground estimate until alignment locks, at
//! which point it is frozen for the rest of the session.

use log::debug;
use nalgebra::Vector3;
use ndarray::Array2;

use crate::config::{FloorConfig, FloorStrategy};
use crate::constants::{DEFAULT_FLOOR_BOTTOM_FRACTION, DEFAULT_FLOOR_ROW_COVERAGE, WORLD_SCALE_Y};
use crate::segmentation::SegmentationMask;

/// World-space position of the ground reference
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FloorAnchor {
    position: Vector3<f32>,
    frozen: bool,
}

impl FloorAnchor {
    #[must_use]
    pub fn new(position: Vector3<f32>) -> Self {
        Self {
            position,
            frozen: false,
        }
    }

    #[must_use]
    pub fn position(&self) -> Vector3<f32> {
        self.position
    }

    #[must_use]
    pub fn y(&self) -> f32 {
        self.position.y
    }

    #[must_use]
    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// Move the anchor to a new ground height. Ignored once frozen.
    pub fn track_y(&mut self, y: f32) {
        if !self.frozen && y.is_finite() {
            self.position.y = y;
        }
    }

    /// Pin the anchor at `at`. Only the first call has an effect; returns
    /// whether this call froze it.
    pub fn freeze(&mut self, at: Vector3<f32>) -> bool {
        if self.frozen {
            return false;
        }
        self.position = at;
        self.frozen = true;
        true
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Ground height estimation from either a mask or a depth map
#[derive(Debug, Clone)]
pub struct FloorDepthEstimator {
    strategy: FloorStrategy,
    row_coverage: f32,
    bottom_fraction: f32,
}

impl FloorDepthEstimator {
    #[must_use]
    pub fn new(config: &FloorConfig) -> Self {
        Self {
            strategy: config.strategy,
            row_coverage: config.row_coverage,
            bottom_fraction: config.bottom_fraction,
        }
    }

    #[must_use]
    pub fn strategy(&self) -> FloorStrategy {
        self.strategy
    }

    /// Lowest mask row whose person pixel count exceeds the coverage
    /// fraction of the row width, mapped to world Y.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn estimate_from_mask(&self, mask: &SegmentationMask) -> Option<f32> {
        let height = mask.height() as usize;
        if height == 0 {
            return None;
        }
        let min_count = mask.width() as f32 * self.row_coverage;

        let row = (0..height)
            .rev()
            .find(|&row| mask.person_count_in_row(row) as f32 > min_count)?;

        let y = (0.5 - row as f32 / height as f32) * WORLD_SCALE_Y;
        debug!("Floor row {row}/{height} -> y={y:.3}");
        Some(y)
    }

    /// Mean depth of the bottom rows of a depth map
    #[must_use]
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    pub fn estimate_from_depth(&self, depth: &Array2<f32>) -> Option<f32> {
        let height = depth.nrows();
        let rows = (height as f32 * self.bottom_fraction).floor() as usize;
        if rows == 0 || depth.ncols() == 0 {
            return None;
        }
        let bottom = depth.slice(ndarray::s![height - rows.., ..]);
        let mean = bottom.mean()?;
        mean.is_finite().then_some(mean)
    }
}

impl Default for FloorDepthEstimator {
    fn default() -> Self {
        Self {
            strategy: FloorStrategy::Segmentation,
            row_coverage: DEFAULT_FLOOR_ROW_COVERAGE,
            bottom_fraction: DEFAULT_FLOOR_BOTTOM_FRACTION,
        }
    }
}
