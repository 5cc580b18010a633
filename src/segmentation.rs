//! Segmentation mask produced by the multiclass selfie segmenter.

use ndarray::Array2;

use crate::constants::{CATEGORY_BACKGROUND, PERSON_CATEGORIES};
use crate::{Error, Result};

/// Segmenter category vocabulary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Background,
    Hair,
    BodySkin,
    FaceSkin,
    Clothes,
    /// Accessories and anything else the model emits; never a person pixel
    Other(u8),
}

impl Category {
    #[must_use]
    pub fn from_label(label: u8) -> Self {
        match label {
            CATEGORY_BACKGROUND => Self::Background,
            1 => Self::Hair,
            2 => Self::BodySkin,
            3 => Self::FaceSkin,
            4 => Self::Clothes,
            other => Self::Other(other),
        }
    }

    /// Hair, skin and clothes all count as the person
    #[must_use]
    pub fn is_person(self) -> bool {
        matches!(self, Self::Hair | Self::BodySkin | Self::FaceSkin | Self::Clothes)
    }
}

/// Whether a raw category label belongs to the person
#[must_use]
pub fn is_person_label(label: u8) -> bool {
    PERSON_CATEGORIES.contains(&label)
}

/// Per-pixel category labels, indexed `[row, column]`
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentationMask {
    labels: Array2<u8>,
}

impl SegmentationMask {
    #[must_use]
    pub fn new(labels: Array2<u8>) -> Self {
        Self { labels }
    }

    /// Build a mask from a row-major label buffer
    ///
    /// # Errors
    ///
    /// Returns an error if the buffer length does not match `width * height`
    pub fn from_raw(width: u32, height: u32, labels: Vec<u8>) -> Result<Self> {
        let labels = Array2::from_shape_vec((height as usize, width as usize), labels)
            .map_err(|e| Error::InvalidInput(format!("Mask buffer does not match {width}x{height}: {e}")))?;
        Ok(Self { labels })
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        u32::try_from(self.labels.ncols()).unwrap_or(u32::MAX)
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        u32::try_from(self.labels.nrows()).unwrap_or(u32::MAX)
    }

    #[must_use]
    pub fn labels(&self) -> &Array2<u8> {
        &self.labels
    }

    #[must_use]
    pub fn label_at(&self, x: u32, y: u32) -> Option<u8> {
        self.labels.get((y as usize, x as usize)).copied()
    }

    #[must_use]
    pub fn is_person_at(&self, x: u32, y: u32) -> bool {
        self.label_at(x, y).is_some_and(is_person_label)
    }

    /// Number of person pixels in one row
    #[must_use]
    pub fn person_count_in_row(&self, row: usize) -> usize {
        if row >= self.labels.nrows() {
            return 0;
        }
        self.labels
            .row(row)
            .iter()
            .filter(|&&label| is_person_label(label))
            .count()
    }

    /// Total number of person pixels
    #[must_use]
    pub fn person_pixel_count(&self) -> usize {
        self.labels.iter().filter(|&&label| is_person_label(label)).count()
    }

    /// Nearest-neighbour resample to another resolution
    #[must_use]
    pub fn resized(&self, width: u32, height: u32) -> Self {
        if width == self.width() && height == self.height() {
            return self.clone();
        }
        let src_rows = self.labels.nrows();
        let src_cols = self.labels.ncols();
        let (dst_rows, dst_cols) = (height as usize, width as usize);
        let labels = Array2::from_shape_fn((dst_rows, dst_cols), |(row, col)| {
            if src_rows == 0 || src_cols == 0 {
                return CATEGORY_BACKGROUND;
            }
            let src_row = (row * src_rows / dst_rows.max(1)).min(src_rows - 1);
            let src_col = (col * src_cols / dst_cols.max(1)).min(src_cols - 1);
            self.labels[(src_row, src_col)]
        });
        Self { labels }
    }
}
