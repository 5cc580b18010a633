//! Real-time body pose alignment library.
//!
//! This library turns a camera stream into a judgement of whether a person
//! stands fully and squarely inside a virtual capture volume. It combines:
//! - a 33-joint landmark detector with per-joint visibility scores
//! - a multiclass person segmenter
//! - rolling visibility smoothing with per-joint adaptive thresholds
//! - rule-based body orientation (FRONT / LEFT / RIGHT)
//! - a dwell-timed alignment state machine that freezes a floor anchor
//!
//! The per-frame pipeline is:
//! 1. Fuse the latest segmentation mask and landmarks into person pixels
//! 2. Discard frames with too few person pixels
//! 3. Update the visibility history and classify orientation
//! 4. Advance the alignment state machine and track the floor anchor
//!
//! ONNX Runtime models are available with the `onnx` feature and an `OpenCV`
//! camera with the `camera` feature; everything else is pure Rust.
//!
//! # Examples
//!
//! ## Processing one frame
//!
//! ```
//! use std::time::Instant;
//! use body_pose_alignment::{config::Config, session::TrackingSession};
//! use body_pose_alignment::landmarks::{Landmark, LandmarkFrame};
//! use body_pose_alignment::segmentation::SegmentationMask;
//! use image::RgbImage;
//!
//! # fn main() -> body_pose_alignment::Result<()> {
//! let mut session = TrackingSession::new(&Config::default())?;
//!
//! // Latest results from the segmenter and the landmark detector
//! session.apply_mask(Some(SegmentationMask::from_raw(64, 48, vec![4; 64 * 48])?));
//! session.apply_landmarks(Some(LandmarkFrame::new([Landmark::new(0.5, 0.5, 0.0, 0.9); 33])));
//!
//! let output = session.tick(&RgbImage::new(64, 48), Instant::now());
//! assert!(output.person_detected());
//! println!("{} {:?}", output.alignment, output.pose.map(|p| p.orientation));
//! # Ok(())
//! # }
//! ```
//!
//! ## Running the pipeline
//!
//! ```no_run
//! use body_pose_alignment::camera::ImageSequence;
//! use body_pose_alignment::config::Config;
//! use body_pose_alignment::models::{LandmarkDetector, Segmenter};
//! use body_pose_alignment::runtime::{CancellationToken, LogSink, Pipeline};
//!
//! # async fn run(
//! #     detector: Box<dyn LandmarkDetector>,
//! #     segmenter: Box<dyn Segmenter>,
//! # ) -> body_pose_alignment::Result<()> {
//! let config = Config::default();
//! let source = ImageSequence::from_dir("frames/")?;
//! let pipeline = Pipeline::new(&config, Box::new(source), detector, segmenter)?;
//!
//! let summary = pipeline.run(&mut LogSink::new(), CancellationToken::new()).await?;
//! println!("{} ticks, final state {}", summary.ticks, summary.final_alignment);
//! # Ok(())
//! # }
//! ```

/// Error types and result handling
pub mod error;

/// Constants used throughout the library
pub mod constants;

/// Configuration management
pub mod config;

/// Joint indices, landmarks and skeleton connection sets
pub mod landmarks;

/// Segmentation masks and the category vocabulary
pub mod segmentation;

/// Rolling per-joint visibility smoothing
pub mod visibility;

/// Body orientation classification
pub mod orientation;

/// Person-pixel fusion and compositing
pub mod fusion;

/// Floor anchor tracking and estimation
pub mod floor;

/// Capture alignment state machine
pub mod alignment;

/// Interval gate for inference scheduling
pub mod throttle;

/// Inference collaborator traits
pub mod models;

/// ONNX Runtime model backends
#[cfg(feature = "onnx")]
pub mod onnx;

/// Frame sources
pub mod camera;

/// Session-scoped tracking state
pub mod session;

/// Async frame scheduler
pub mod runtime;

pub use error::{Error, Result};
