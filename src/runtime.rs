//! Cooperative frame scheduler.
//!
//! One task drives the composite loop at the target frame rate. Each model
//! sits in an [`InferenceSlot`] with its own throttle; a due slot hands its
//! model and the current frame to a blocking worker and the loop moves on.
//! Finished jobs are collected at the start of a later tick, so the tick
//! always fuses the most recently completed results and never waits for a
//! fresh inference. Session state is only touched from the tick task.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use image::RgbImage;
use log::{debug, error, info, warn};
use ndarray::Array2;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
pub use tokio_util::sync::CancellationToken;

use crate::alignment::AlignmentState;
use crate::camera::FrameSource;
use crate::config::Config;
use crate::floor::FloorAnchor;
use crate::landmarks::LandmarkFrame;
use crate::models::{DepthModel, LandmarkDetector, Segmenter};
use crate::orientation::Orientation;
use crate::segmentation::SegmentationMask;
use crate::session::{TickOutput, TrackingSession};
use crate::throttle::Throttle;
use crate::{Error, Result};

/// Downstream consumer of tick outputs
pub trait FrameSink {
    /// # Errors
    ///
    /// An error stops the pipeline
    fn publish(&mut self, output: &TickOutput) -> Result<()>;
}

/// Logs orientation and alignment changes
#[derive(Debug, Default)]
pub struct LogSink {
    last_orientation: Option<Orientation>,
    last_alignment: Option<AlignmentState>,
}

impl LogSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl FrameSink for LogSink {
    fn publish(&mut self, output: &TickOutput) -> Result<()> {
        if self.last_alignment != Some(output.alignment) {
            info!(
                "[tick {}] alignment {} (floor y={:.3}{})",
                output.tick,
                output.alignment,
                output.floor_anchor.y(),
                if output.floor_anchor.is_frozen() { ", frozen" } else { "" }
            );
            self.last_alignment = Some(output.alignment);
        }
        if let Some(pose) = &output.pose {
            if self.last_orientation != Some(pose.orientation) {
                info!(
                    "[tick {}] facing {} (confidence {:.2}, position {:.2} {:.2} {:.2})",
                    output.tick,
                    pose.orientation,
                    pose.confidence,
                    pose.user_position.x,
                    pose.user_position.y,
                    pose.user_position.z
                );
                self.last_orientation = Some(pose.orientation);
            }
        }
        Ok(())
    }
}

/// Writes every `every`-th composite to a directory as PNG
#[derive(Debug)]
pub struct PngDumpSink {
    dir: PathBuf,
    every: u64,
    written: usize,
}

impl PngDumpSink {
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created
    pub fn new<P: AsRef<Path>>(dir: P, every: u64) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            every: every.max(1),
            written: 0,
        })
    }

    #[must_use]
    pub fn written(&self) -> usize {
        self.written
    }
}

impl FrameSink for PngDumpSink {
    fn publish(&mut self, output: &TickOutput) -> Result<()> {
        if output.tick % self.every != 0 {
            return Ok(());
        }
        if let Some(composite) = &output.composite {
            let path = self.dir.join(format!("frame_{:06}.png", output.tick));
            composite.save(&path)?;
            debug!("Wrote {}", path.display());
            self.written += 1;
        }
        Ok(())
    }
}

/// Fan a tick out to several sinks
impl<A: FrameSink, B: FrameSink> FrameSink for (A, B) {
    fn publish(&mut self, output: &TickOutput) -> Result<()> {
        self.0.publish(output)?;
        self.1.publish(output)
    }
}

impl<T: FrameSink + ?Sized> FrameSink for Box<T> {
    fn publish(&mut self, output: &TickOutput) -> Result<()> {
        (**self).publish(output)
    }
}

enum SlotState<M, R> {
    Idle(M),
    Busy(JoinHandle<(M, Result<R>)>),
    /// The model was lost to a panicked job or released on shutdown
    Empty,
}

/// A model together with its throttle and at most one in-flight job
pub struct InferenceSlot<M, R> {
    name: &'static str,
    throttle: Throttle,
    state: SlotState<M, R>,
}

impl<M: Send + 'static, R: Send + 'static> InferenceSlot<M, R> {
    #[must_use]
    pub fn new(name: &'static str, model: M, interval: Duration) -> Self {
        Self {
            name,
            throttle: Throttle::new(interval),
            state: SlotState::Idle(model),
        }
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    #[must_use]
    pub fn is_busy(&self) -> bool {
        matches!(self.state, SlotState::Busy(_))
    }

    #[must_use]
    pub fn is_idle(&self) -> bool {
        matches!(self.state, SlotState::Idle(_))
    }

    /// The model was lost to a failed worker or released
    #[must_use]
    pub fn is_lost(&self) -> bool {
        matches!(self.state, SlotState::Empty)
    }

    /// Start `job` on a blocking worker if the model is idle and the
    /// throttle is due. Returns whether a job was started.
    pub fn try_launch<F>(&mut self, now: Instant, frame: &Arc<RgbImage>, job: F) -> bool
    where
        F: FnOnce(&mut M, &RgbImage) -> Result<R> + Send + 'static,
    {
        if !self.is_idle() || !self.throttle.ready(now) {
            return false;
        }
        let SlotState::Idle(mut model) = std::mem::replace(&mut self.state, SlotState::Empty) else {
            return false;
        };
        let frame = Arc::clone(frame);
        let handle = tokio::task::spawn_blocking(move || {
            let result = job(&mut model, &frame);
            (model, result)
        });
        self.state = SlotState::Busy(handle);
        true
    }

    /// Collect the result of a finished job without waiting on a running one
    pub async fn poll_completed(&mut self) -> Option<Result<R>> {
        match &self.state {
            SlotState::Busy(handle) if handle.is_finished() => {}
            _ => return None,
        }
        let SlotState::Busy(handle) = std::mem::replace(&mut self.state, SlotState::Empty) else {
            return None;
        };
        match handle.await {
            Ok((model, result)) => {
                self.state = SlotState::Idle(model);
                Some(result)
            }
            Err(e) => {
                error!("{} worker failed, model released: {e}", self.name);
                Some(Err(Error::Runtime(format!("{} worker failed: {e}", self.name))))
            }
        }
    }

    /// Release the model. An in-flight job is detached and its result dropped.
    pub fn shutdown(&mut self) {
        match std::mem::replace(&mut self.state, SlotState::Empty) {
            SlotState::Busy(_) => debug!("Discarding in-flight {} job", self.name),
            SlotState::Idle(_) => debug!("Released {} model", self.name),
            SlotState::Empty => {}
        }
    }
}

/// Counters reported when the pipeline stops
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub ticks: u64,
    /// Ticks whose frame had a detected person
    pub person_frames: u64,
    /// Ticks that produced a pose summary
    pub pose_frames: u64,
    pub final_alignment: AlignmentState,
    pub floor_anchor: FloorAnchor,
}

type LandmarkSlot = InferenceSlot<Box<dyn LandmarkDetector>, Option<LandmarkFrame>>;
type SegmenterSlot = InferenceSlot<Box<dyn Segmenter>, Option<SegmentationMask>>;
type DepthSlot = InferenceSlot<Box<dyn DepthModel>, Array2<f32>>;

/// Camera, models and session wired into a frame loop
pub struct Pipeline {
    source: Box<dyn FrameSource>,
    session: TrackingSession,
    landmarks: LandmarkSlot,
    segmenter: SegmenterSlot,
    depth: Option<DepthSlot>,
    frame_interval: Duration,
    depth_interval: Duration,
    max_ticks: Option<u64>,
    started: Instant,
}

impl Pipeline {
    /// Assemble a pipeline. All resources are acquired before this is called,
    /// so a failure here leaves nothing running.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the session cannot
    /// be built
    pub fn new(
        config: &Config,
        source: Box<dyn FrameSource>,
        detector: Box<dyn LandmarkDetector>,
        segmenter: Box<dyn Segmenter>,
    ) -> Result<Self> {
        config.validate()?;
        let session = TrackingSession::new(config)?;
        let scheduling = &config.scheduling;
        Ok(Self {
            source,
            session,
            landmarks: InferenceSlot::new("landmarks", detector, scheduling.landmark_interval()),
            segmenter: InferenceSlot::new("segmentation", segmenter, scheduling.segmentation_interval()),
            depth: None,
            frame_interval: scheduling.frame_interval(),
            depth_interval: scheduling.depth_interval(),
            max_ticks: None,
            started: Instant::now(),
        })
    }

    /// Run a depth model on its own throttle for the depth floor strategy
    #[must_use]
    pub fn with_depth_model(mut self, model: Box<dyn DepthModel>) -> Self {
        self.depth = Some(InferenceSlot::new("depth", model, self.depth_interval));
        self
    }

    /// Stop after `ticks` processed frames
    #[must_use]
    pub fn with_max_ticks(mut self, ticks: u64) -> Self {
        self.max_ticks = Some(ticks);
        self
    }

    #[must_use]
    pub fn session(&self) -> &TrackingSession {
        &self.session
    }

    /// Drive the frame loop until cancelled, the source runs dry, the tick
    /// limit is reached, the sink fails or a model worker is lost. The
    /// session is torn down on every exit path.
    ///
    /// # Errors
    ///
    /// Returns frame source and sink errors, and [`Error::Runtime`] when a
    /// model worker panicked
    pub async fn run(mut self, sink: &mut dyn FrameSink, cancel: CancellationToken) -> Result<RunSummary> {
        let mut interval = tokio::time::interval(self.frame_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut summary = RunSummary::default();
        self.started = Instant::now();

        info!(
            "Pipeline started at {:.1} fps",
            1.0 / self.frame_interval.as_secs_f64().max(f64::EPSILON)
        );

        let result = loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    info!("Pipeline cancelled");
                    break Ok(());
                }
                _ = interval.tick() => {}
            }

            match self.step(sink, &mut summary).await {
                Ok(true) => {}
                Ok(false) => break Ok(()),
                Err(e) => break Err(e),
            }

            if self.max_ticks.is_some_and(|max| summary.ticks >= max) {
                info!("Reached {} ticks", summary.ticks);
                break Ok(());
            }
        };

        summary.final_alignment = self.session.alignment_state();
        summary.floor_anchor = self.session.floor_anchor();
        self.shutdown();
        result.map(|()| summary)
    }

    /// One frame: collect finished inferences, launch due ones, fuse, publish
    async fn step(&mut self, sink: &mut dyn FrameSink, summary: &mut RunSummary) -> Result<bool> {
        let Some(frame) = self.source.next_frame()? else {
            info!("Frame source exhausted");
            return Ok(false);
        };
        let now = Instant::now();

        self.harvest().await?;

        let frame = Arc::new(frame);
        let timestamp = now.saturating_duration_since(self.started);
        self.landmarks
            .try_launch(now, &frame, move |model, image| model.detect(image, timestamp));
        self.segmenter
            .try_launch(now, &frame, move |model, image| model.segment(image, timestamp));
        if let Some(depth) = &mut self.depth {
            depth.try_launch(now, &frame, |model, image| model.estimate(image));
        }

        let output = self.session.tick(&frame, now);
        summary.ticks += 1;
        if output.person_detected() {
            summary.person_frames += 1;
        }
        if output.pose.is_some() {
            summary.pose_frames += 1;
        }
        sink.publish(&output)?;
        Ok(true)
    }

    /// Apply every result that finished since the last tick. Inference errors
    /// count as no data for this tick. A lost worker drops its stale result
    /// and stops the pipeline.
    async fn harvest(&mut self) -> Result<()> {
        if let Some(result) = self.landmarks.poll_completed().await {
            match result {
                Ok(landmarks) => self.session.apply_landmarks(landmarks),
                Err(e) if self.landmarks.is_lost() => {
                    self.session.apply_landmarks(None);
                    return Err(e);
                }
                Err(e) => warn!("Landmark detection failed: {e}"),
            }
        }
        if let Some(result) = self.segmenter.poll_completed().await {
            match result {
                Ok(mask) => self.session.apply_mask(mask),
                Err(e) if self.segmenter.is_lost() => {
                    self.session.clear_mask();
                    return Err(e);
                }
                Err(e) => warn!("Segmentation failed: {e}"),
            }
        }
        if let Some(depth) = &mut self.depth {
            if let Some(result) = depth.poll_completed().await {
                match result {
                    Ok(map) => self.session.apply_depth(&map),
                    Err(e) if depth.is_lost() => return Err(e),
                    Err(e) => warn!("Depth estimation failed: {e}"),
                }
            }
        }
        Ok(())
    }

    fn shutdown(&mut self) {
        self.session.teardown();
        self.landmarks.shutdown();
        self.segmenter.shutdown();
        if let Some(depth) = &mut self.depth {
            depth.shutdown();
        }
        self.source.stop();
        info!("Pipeline stopped");
    }
}
