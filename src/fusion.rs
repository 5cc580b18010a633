//! Landmark and segmentation fusion.
//!
//! A pixel belongs to the person when the segmenter labels it as one of the
//! person categories, or when it lies close to a joint the landmark tracker
//! trusts. The boost fills segmentation holes around fast-moving or
//! rim-lit limbs. Frames with too few person pixels are discarded.

use image::imageops::{self, FilterType};
use image::{Rgb, RgbImage, Rgba, RgbaImage};
use log::{debug, trace};
use ndarray::Array2;

use crate::config::{BackgroundConfig, FusionConfig};
use crate::landmarks::{JointIndex, LandmarkFrame};
use crate::segmentation::SegmentationMask;
use crate::visibility::{adaptive_threshold, VisibilityTracker};
use crate::Result;

/// How pixels outside the person are rendered
#[derive(Debug, Clone)]
pub enum BackgroundTreatment {
    Solid([u8; 3]),
    Blurred { sigma: f32 },
    /// Backdrop image, cover-fitted to the frame
    Image(RgbImage),
    Transparent,
}

impl BackgroundTreatment {
    /// Build the treatment, loading the backdrop image when one is configured
    ///
    /// # Errors
    ///
    /// Returns an error if the backdrop image cannot be read or decoded
    pub fn from_config(config: &BackgroundConfig) -> Result<Self> {
        Ok(match config {
            BackgroundConfig::Solid { color } => Self::Solid(*color),
            BackgroundConfig::Blurred { sigma } => Self::Blurred { sigma: *sigma },
            BackgroundConfig::Image { path } => Self::Image(image::open(path)?.to_rgb8()),
            BackgroundConfig::Transparent => Self::Transparent,
        })
    }
}

/// Outcome of fusing one frame
#[derive(Debug, Clone, Default)]
pub struct FusionResult {
    pub person_pixel_count: usize,
    /// Present only when a person was detected
    pub composite: Option<RgbaImage>,
}

impl FusionResult {
    #[must_use]
    pub fn person_detected(&self) -> bool {
        self.composite.is_some()
    }
}

/// Scale `backdrop` to cover `width` x `height` and crop the center
#[must_use]
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
pub fn cover_fit(backdrop: &RgbImage, width: u32, height: u32) -> RgbImage {
    let (src_w, src_h) = backdrop.dimensions();
    if src_w == 0 || src_h == 0 {
        return RgbImage::new(width, height);
    }
    let scale = (width as f32 / src_w as f32).max(height as f32 / src_h as f32);
    let scaled_w = ((src_w as f32 * scale).ceil() as u32).max(width);
    let scaled_h = ((src_h as f32 * scale).ceil() as u32).max(height);
    let scaled = imageops::resize(backdrop, scaled_w, scaled_h, FilterType::Triangle);
    let x = (scaled_w - width) / 2;
    let y = (scaled_h - height) / 2;
    imageops::crop_imm(&scaled, x, y, width, height).to_image()
}

pub struct FrameFusionEngine {
    boost_radius: i32,
    boost_threshold_scale: f32,
    min_person_pixels: usize,
    face_padding: f32,
    face_blur_sigma: f32,
    background: BackgroundTreatment,
    fitted_backdrop: Option<RgbImage>,
}

impl FrameFusionEngine {
    #[must_use]
    pub fn new(config: &FusionConfig, background: BackgroundTreatment) -> Self {
        Self {
            boost_radius: config.boost_radius,
            boost_threshold_scale: config.boost_threshold_scale,
            min_person_pixels: config.min_person_pixels,
            face_padding: config.face_padding,
            face_blur_sigma: config.face_blur_sigma,
            background,
            fitted_backdrop: None,
        }
    }

    /// Create an engine from configuration, loading any backdrop image
    ///
    /// # Errors
    ///
    /// Returns an error if the configured backdrop image cannot be loaded
    pub fn from_config(config: &FusionConfig) -> Result<Self> {
        let background = BackgroundTreatment::from_config(&config.background)?;
        Ok(Self::new(config, background))
    }

    #[must_use]
    pub fn background(&self) -> &BackgroundTreatment {
        &self.background
    }

    /// Whether a joint is trusted enough to paint a disc around it
    #[must_use]
    pub fn boosts_joint(&self, tracker: &VisibilityTracker, joint: JointIndex) -> bool {
        tracker.smoothed_visibility(joint) > self.boost_threshold_scale * adaptive_threshold(joint)
    }

    /// Per-pixel person decision at frame resolution, indexed `[row, column]`.
    /// Without a mask nothing is classified as person.
    #[must_use]
    pub fn person_map(
        &self,
        width: u32,
        height: u32,
        mask: Option<&SegmentationMask>,
        landmarks: Option<&LandmarkFrame>,
        tracker: &VisibilityTracker,
    ) -> Array2<bool> {
        let (rows, cols) = (height as usize, width as usize);
        let Some(mask) = mask else {
            return Array2::from_elem((rows, cols), false);
        };

        let resized;
        let mask = if mask.width() == width && mask.height() == height {
            mask
        } else {
            trace!(
                "Resampling mask {}x{} to {width}x{height}",
                mask.width(),
                mask.height()
            );
            resized = mask.resized(width, height);
            &resized
        };

        let mut person = mask.labels().mapv(crate::segmentation::is_person_label);

        if let Some(frame) = landmarks {
            let radius = self.boost_radius;
            for (joint, landmark) in frame.iter() {
                if !self.boosts_joint(tracker, joint) {
                    continue;
                }
                let (cx, cy) = landmark.to_pixel(width, height);
                paint_disc(&mut person, cx, cy, radius);
            }
        }

        person
    }

    /// Fuse the latest mask and landmarks with `frame`
    pub fn fuse(
        &mut self,
        frame: &RgbImage,
        mask: Option<&SegmentationMask>,
        landmarks: Option<&LandmarkFrame>,
        tracker: &VisibilityTracker,
    ) -> FusionResult {
        let (width, height) = frame.dimensions();
        let person = self.person_map(width, height, mask, landmarks, tracker);
        let person_pixel_count = person.iter().filter(|&&p| p).count();

        if person_pixel_count <= self.min_person_pixels {
            debug!("No person detected ({person_pixel_count} pixels)");
            return FusionResult {
                person_pixel_count,
                composite: None,
            };
        }

        let mut composite = self.composite(frame, &person);
        if let Some(frame_landmarks) = landmarks {
            self.blur_face(&mut composite, frame_landmarks);
        }

        FusionResult {
            person_pixel_count,
            composite: Some(composite),
        }
    }

    #[allow(clippy::cast_possible_truncation)]
    fn composite(&mut self, frame: &RgbImage, person: &Array2<bool>) -> RgbaImage {
        let (width, height) = frame.dimensions();

        let backdrop: Option<RgbImage> = match &self.background {
            BackgroundTreatment::Solid(_) | BackgroundTreatment::Transparent => None,
            BackgroundTreatment::Blurred { sigma } => Some(imageops::blur(frame, *sigma)),
            BackgroundTreatment::Image(source) => {
                let stale = self
                    .fitted_backdrop
                    .as_ref()
                    .map_or(true, |fitted| fitted.dimensions() != (width, height));
                if stale {
                    self.fitted_backdrop = Some(cover_fit(source, width, height));
                }
                self.fitted_backdrop.clone()
            }
        };

        RgbaImage::from_fn(width, height, |x, y| {
            if person[(y as usize, x as usize)] {
                let Rgb([r, g, b]) = *frame.get_pixel(x, y);
                return Rgba([r, g, b, 255]);
            }
            match (&self.background, &backdrop) {
                (BackgroundTreatment::Solid([r, g, b]), _) => Rgba([*r, *g, *b, 255]),
                (BackgroundTreatment::Transparent, _) => Rgba([0, 0, 0, 0]),
                (_, Some(image)) => {
                    let Rgb([r, g, b]) = *image.get_pixel(x, y);
                    Rgba([r, g, b, 255])
                }
                (_, None) => Rgba([0, 0, 0, 255]),
            }
        })
    }

    /// Padded pixel bounding box of the face joints, clamped to the image.
    /// Returns `(x, y, width, height)`.
    #[must_use]
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    pub fn face_region(&self, landmarks: &LandmarkFrame, width: u32, height: u32) -> Option<(u32, u32, u32, u32)> {
        let mut min_x = f32::INFINITY;
        let mut min_y = f32::INFINITY;
        let mut max_x = f32::NEG_INFINITY;
        let mut max_y = f32::NEG_INFINITY;
        for joint in JointIndex::FACE {
            let landmark = landmarks.get(joint);
            let px = landmark.x * width as f32;
            let py = landmark.y * height as f32;
            min_x = min_x.min(px);
            min_y = min_y.min(py);
            max_x = max_x.max(px);
            max_y = max_y.max(py);
        }
        if !(min_x.is_finite() && min_y.is_finite() && max_x.is_finite() && max_y.is_finite()) {
            return None;
        }

        let left = (min_x - self.face_padding).floor().clamp(0.0, width as f32) as u32;
        let top = (min_y - self.face_padding).floor().clamp(0.0, height as f32) as u32;
        let right = (max_x + self.face_padding).ceil().clamp(0.0, width as f32) as u32;
        let bottom = (max_y + self.face_padding).ceil().clamp(0.0, height as f32) as u32;
        if right <= left || bottom <= top {
            return None;
        }
        Some((left, top, right - left, bottom - top))
    }

    fn blur_face(&self, composite: &mut RgbaImage, landmarks: &LandmarkFrame) {
        if self.face_blur_sigma <= 0.0 {
            return;
        }
        let (width, height) = composite.dimensions();
        let Some((x, y, w, h)) = self.face_region(landmarks, width, height) else {
            return;
        };
        let region = imageops::crop_imm(&*composite, x, y, w, h).to_image();
        let blurred = imageops::blur(&region, self.face_blur_sigma);
        imageops::replace(composite, &blurred, i64::from(x), i64::from(y));
    }
}

/// Mark every pixel within `radius` of `(cx, cy)`
#[allow(clippy::cast_sign_loss, clippy::cast_possible_wrap, clippy::cast_possible_truncation)]
fn paint_disc(map: &mut Array2<bool>, cx: i32, cy: i32, radius: i32) {
    let rows = map.nrows() as i32;
    let cols = map.ncols() as i32;
    let r2 = radius * radius;
    for y in cy.saturating_sub(radius).max(0)..=cy.saturating_add(radius).min(rows - 1) {
        let dy = y - cy;
        for x in cx.saturating_sub(radius).max(0)..=cx.saturating_add(radius).min(cols - 1) {
            let dx = x - cx;
            if dx * dx + dy * dy <= r2 {
                map[(y as usize, x as usize)] = true;
            }
        }
    }
}
