//! Frame sources feeding the pipeline.

use std::collections::VecDeque;
use std::path::Path;

use image::RgbImage;
use log::info;

use crate::{Error, Result};

/// A continuous source of RGB frames
pub trait FrameSource: Send {
    /// Next frame, or `None` once the source is exhausted
    ///
    /// # Errors
    ///
    /// Returns an error if the device fails to deliver a frame
    fn next_frame(&mut self) -> Result<Option<RgbImage>>;

    /// Release the underlying device. Called once on teardown.
    fn stop(&mut self) {}
}

impl<T: FrameSource + ?Sized> FrameSource for Box<T> {
    fn next_frame(&mut self) -> Result<Option<RgbImage>> {
        (**self).next_frame()
    }

    fn stop(&mut self) {
        (**self).stop();
    }
}

/// Frames replayed from memory or an image directory
#[derive(Debug, Clone, Default)]
pub struct ImageSequence {
    frames: VecDeque<RgbImage>,
    stopped: bool,
}

impl ImageSequence {
    #[must_use]
    pub fn new(frames: Vec<RgbImage>) -> Self {
        Self {
            frames: frames.into(),
            stopped: false,
        }
    }

    /// The same frame `count` times
    #[must_use]
    pub fn repeat(frame: &RgbImage, count: usize) -> Self {
        Self::new(vec![frame.clone(); count])
    }

    /// Load every decodable image in `dir`, in file name order
    ///
    /// # Errors
    ///
    /// Returns `ResourceAcquisition` if the directory cannot be read or holds
    /// no images, and an image error if a file fails to decode
    pub fn from_dir<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref();
        let mut paths: Vec<_> = std::fs::read_dir(dir)
            .map_err(|e| Error::ResourceAcquisition(format!("Cannot read {}: {e}", dir.display())))?
            .filter_map(std::result::Result::ok)
            .map(|entry| entry.path())
            .filter(|path| image::ImageFormat::from_path(path).is_ok())
            .collect();
        paths.sort();

        if paths.is_empty() {
            return Err(Error::ResourceAcquisition(format!("No images found in {}", dir.display())));
        }

        let frames = paths
            .iter()
            .map(|path| Ok(image::open(path)?.to_rgb8()))
            .collect::<Result<Vec<_>>>()?;
        info!("Loaded {} frames from {}", frames.len(), dir.display());
        Ok(Self::new(frames))
    }

    #[must_use]
    pub fn remaining(&self) -> usize {
        self.frames.len()
    }

    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.stopped
    }
}

impl FrameSource for ImageSequence {
    fn next_frame(&mut self) -> Result<Option<RgbImage>> {
        if self.stopped {
            return Ok(None);
        }
        Ok(self.frames.pop_front())
    }

    fn stop(&mut self) {
        self.stopped = true;
        self.frames.clear();
    }
}

#[cfg(feature = "camera")]
pub use self::opencv_camera::OpenCvCamera;

#[cfg(feature = "camera")]
mod opencv_camera {
    use image::RgbImage;
    use log::{info, warn};
    use opencv::core::{Mat, CV_8UC3};
    use opencv::prelude::*;
    use opencv::videoio::{self, VideoCapture, VideoCaptureAPIs};

    use super::FrameSource;
    use crate::{Error, Result};

    /// Device camera captured through `OpenCV`
    pub struct OpenCvCamera {
        capture: VideoCapture,
        width: u32,
        height: u32,
    }

    impl OpenCvCamera {
        /// Open camera `index` and request the given resolution
        ///
        /// # Errors
        ///
        /// Returns `ResourceAcquisition` if the camera cannot be opened
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        pub fn open(index: i32, width: u32, height: u32) -> Result<Self> {
            let mut capture = VideoCapture::new(index, VideoCaptureAPIs::CAP_ANY as i32)
                .map_err(|e| Error::ResourceAcquisition(format!("Failed to open camera {index}: {e}")))?;
            if !capture.is_opened()? {
                return Err(Error::ResourceAcquisition(format!("Camera {index} is not available")));
            }

            capture.set(videoio::CAP_PROP_FRAME_WIDTH, f64::from(width))?;
            capture.set(videoio::CAP_PROP_FRAME_HEIGHT, f64::from(height))?;
            capture.set(videoio::CAP_PROP_BUFFERSIZE, 1.0)?;

            let actual_width = capture.get(videoio::CAP_PROP_FRAME_WIDTH)? as u32;
            let actual_height = capture.get(videoio::CAP_PROP_FRAME_HEIGHT)? as u32;
            if (actual_width, actual_height) != (width, height) {
                warn!("Camera delivers {actual_width}x{actual_height} instead of {width}x{height}");
            }
            info!("Camera {index} opened at {actual_width}x{actual_height}");

            Ok(Self {
                capture,
                width: actual_width,
                height: actual_height,
            })
        }

        #[must_use]
        pub fn resolution(&self) -> (u32, u32) {
            (self.width, self.height)
        }
    }

    /// Convert an 8-bit BGR `Mat` into an RGB image
    #[allow(clippy::cast_sign_loss)]
    pub(crate) fn bgr_mat_to_rgb(mat: &Mat) -> Result<RgbImage> {
        if mat.typ() != CV_8UC3 {
            return Err(Error::InvalidInput(format!("Expected CV_8UC3 frame, got type {}", mat.typ())));
        }
        let continuous;
        let mat = if mat.is_continuous() {
            mat
        } else {
            continuous = mat.try_clone()?;
            &continuous
        };

        let (width, height) = (mat.cols() as u32, mat.rows() as u32);
        let bytes = mat.data_bytes()?;
        let mut rgb = Vec::with_capacity(bytes.len());
        for bgr in bytes.chunks_exact(3) {
            rgb.extend_from_slice(&[bgr[2], bgr[1], bgr[0]]);
        }
        RgbImage::from_raw(width, height, rgb)
            .ok_or_else(|| Error::InvalidInput("Frame buffer does not match its dimensions".to_string()))
    }

    impl FrameSource for OpenCvCamera {
        fn next_frame(&mut self) -> Result<Option<RgbImage>> {
            let mut frame = Mat::default();
            if !self.capture.read(&mut frame)? || frame.empty() {
                return Ok(None);
            }
            bgr_mat_to_rgb(&frame).map(Some)
        }

        fn stop(&mut self) {
            if let Err(e) = self.capture.release() {
                warn!("Failed to release camera: {e}");
            }
        }
    }
}
