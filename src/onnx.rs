//! ONNX Runtime backends for the inference collaborators.

use std::path::Path;
use std::time::Duration;

use image::imageops::{self, FilterType};
use image::RgbImage;
use log::{debug, info};
use ndarray::{Array2, Array4, ArrayViewD, Axis, Ix3};
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::{DynValue, Tensor};

use crate::constants::NUM_POSE_LANDMARKS;
use crate::error::Error;
use crate::landmarks::{Landmark, LandmarkFrame};
use crate::models::{sigmoid, DepthModel, LandmarkDetector, Segmenter};
use crate::segmentation::SegmentationMask;
use crate::Result;

/// Landmark model input resolution
const LANDMARK_INPUT_SIZE: u32 = 256;

/// Values per landmark in the landmark model output (x, y, z, visibility, presence)
const LANDMARK_STRIDE: usize = 5;

/// Pose presence below this means no person
const PRESENCE_THRESHOLD: f32 = 0.5;

/// Segmenter input resolution
const SEGMENTER_INPUT_SIZE: u32 = 256;

/// Depth model input resolution
const DEPTH_INPUT_SIZE: u32 = 256;

/// `ImageNet` normalization used by the depth model
const DEPTH_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
const DEPTH_STD: [f32; 3] = [0.229, 0.224, 0.225];

fn model_error(e: impl std::fmt::Display) -> Error {
    Error::ModelError(e.to_string())
}

/// Load a session, reporting failure as a resource acquisition error
fn load_session(path: &Path) -> Result<(Session, String, Vec<String>)> {
    info!("Loading ONNX model: {}", path.display());
    let session = Session::builder()
        .and_then(|builder| builder.with_optimization_level(GraphOptimizationLevel::Level3))
        .and_then(|builder| builder.commit_from_file(path))
        .map_err(|e| Error::ResourceAcquisition(format!("Failed to load model {}: {e}", path.display())))?;

    let input_name = session
        .inputs
        .first()
        .ok_or_else(|| Error::ResourceAcquisition(format!("Model {} has no inputs", path.display())))?
        .name
        .clone();
    let output_names: Vec<String> = session.outputs.iter().map(|output| output.name.clone()).collect();
    if output_names.is_empty() {
        return Err(Error::ResourceAcquisition(format!("Model {} has no outputs", path.display())));
    }
    debug!("Model inputs: {input_name}, outputs: {output_names:?}");
    Ok((session, input_name, output_names))
}

/// Resize to `size` x `size` and scale to `[0, 1]`, NHWC layout
fn to_nhwc(frame: &RgbImage, size: u32) -> Array4<f32> {
    let resized = imageops::resize(frame, size, size, FilterType::Triangle);
    let side = size as usize;
    Array4::from_shape_fn((1, side, side, 3), |(_, y, x, c)| {
        #[allow(clippy::cast_possible_truncation)]
        let pixel = resized.get_pixel(x as u32, y as u32);
        f32::from(pixel[c]) / 255.0
    })
}

/// Copy an output tensor out of the session outputs
fn extract(value: &DynValue) -> Result<ndarray::ArrayD<f32>> {
    let view: ArrayViewD<f32> = value.try_extract_array::<f32>().map_err(model_error)?;
    Ok(view.to_owned())
}

/// BlazePose-style full-body landmark model.
///
/// Expects a `[1, 256, 256, 3]` input and a first output of 39 x 5 values in
/// input pixel units; the first 33 rows are the body joints. A second
/// output, when present, is the pose presence score.
pub struct OnnxLandmarkDetector {
    session: Session,
    input_name: String,
    output_names: Vec<String>,
}

impl OnnxLandmarkDetector {
    /// # Errors
    ///
    /// Returns `ResourceAcquisition` if the model cannot be loaded
    pub fn new<P: AsRef<Path>>(model_path: P) -> Result<Self> {
        let (session, input_name, output_names) = load_session(model_path.as_ref())?;
        Ok(Self {
            session,
            input_name,
            output_names,
        })
    }
}

/// Raw scores that fall outside `[0, 1]` are logits
fn as_probability(score: f32) -> f32 {
    if (0.0..=1.0).contains(&score) {
        score
    } else {
        sigmoid(score)
    }
}

/// Decode a flat landmark tensor into a frame
#[allow(clippy::cast_precision_loss)]
pub(crate) fn decode_landmarks(values: &[f32], input_size: u32) -> Result<LandmarkFrame> {
    if values.len() < NUM_POSE_LANDMARKS * LANDMARK_STRIDE {
        return Err(Error::ModelOutputError(format!(
            "Expected at least {} landmark values, got {}",
            NUM_POSE_LANDMARKS * LANDMARK_STRIDE,
            values.len()
        )));
    }
    let scale = input_size as f32;
    let points: Vec<Landmark> = values
        .chunks_exact(LANDMARK_STRIDE)
        .take(NUM_POSE_LANDMARKS)
        .map(|v| Landmark::new(v[0] / scale, v[1] / scale, v[2] / scale, sigmoid(v[3])))
        .collect();
    Ok(LandmarkFrame::from_points(&points))
}

impl LandmarkDetector for OnnxLandmarkDetector {
    fn detect(&mut self, frame: &RgbImage, _timestamp: Duration) -> Result<Option<LandmarkFrame>> {
        let input = Tensor::from_array(to_nhwc(frame, LANDMARK_INPUT_SIZE)).map_err(model_error)?;
        let outputs = self
            .session
            .run(ort::inputs![self.input_name.as_str() => input])
            .map_err(model_error)?;

        if let Some(presence_name) = self.output_names.get(1) {
            let presence = extract(&outputs[presence_name.as_str()])?;
            if let Some(&score) = presence.iter().next() {
                if as_probability(score) < PRESENCE_THRESHOLD {
                    return Ok(None);
                }
            }
        }

        let landmarks = extract(&outputs[self.output_names[0].as_str()])?;
        let values: Vec<f32> = landmarks.iter().copied().collect();
        decode_landmarks(&values, LANDMARK_INPUT_SIZE).map(Some)
    }
}

/// Multiclass selfie segmenter.
///
/// Produces per-pixel category scores; the label is the arg max. Both
/// `[1, H, W, C]` and `[1, C, H, W]` outputs are accepted.
pub struct OnnxSegmenter {
    session: Session,
    input_name: String,
    output_name: String,
}

impl OnnxSegmenter {
    /// # Errors
    ///
    /// Returns `ResourceAcquisition` if the model cannot be loaded
    pub fn new<P: AsRef<Path>>(model_path: P) -> Result<Self> {
        let (session, input_name, mut output_names) = load_session(model_path.as_ref())?;
        Ok(Self {
            session,
            input_name,
            output_name: output_names.swap_remove(0),
        })
    }
}

/// Arg max over the category axis of a 4D score tensor
#[allow(clippy::cast_possible_truncation)]
pub(crate) fn argmax_labels(scores: &ndarray::ArrayD<f32>) -> Result<Array2<u8>> {
    let shape = scores.shape();
    if shape.len() != 4 || shape[0] != 1 {
        return Err(Error::ModelOutputError(format!("Unexpected segmenter output shape {shape:?}")));
    }
    // Channel-last when the trailing axis is the small one
    let channel_last = shape[3] < shape[1];
    let scores = scores.index_axis(Axis(0), 0);
    let scores = if channel_last {
        scores
    } else {
        scores.permuted_axes(vec![1, 2, 0])
    };
    let scores = scores
        .into_dimensionality::<Ix3>()
        .map_err(|e| Error::ModelOutputError(format!("Segmenter output is not 3D: {e}")))?;

    let (rows, cols) = (scores.shape()[0], scores.shape()[1]);
    Ok(Array2::from_shape_fn((rows, cols), |(y, x)| {
        let mut best = 0usize;
        let mut best_score = f32::NEG_INFINITY;
        for (c, &score) in scores.slice(ndarray::s![y, x, ..]).iter().enumerate() {
            if score > best_score {
                best = c;
                best_score = score;
            }
        }
        best.min(usize::from(u8::MAX)) as u8
    }))
}

impl Segmenter for OnnxSegmenter {
    fn segment(&mut self, frame: &RgbImage, _timestamp: Duration) -> Result<Option<SegmentationMask>> {
        let input = Tensor::from_array(to_nhwc(frame, SEGMENTER_INPUT_SIZE)).map_err(model_error)?;
        let outputs = self
            .session
            .run(ort::inputs![self.input_name.as_str() => input])
            .map_err(model_error)?;
        let scores = extract(&outputs[self.output_name.as_str()])?;
        let mask = SegmentationMask::new(argmax_labels(&scores)?);
        Ok(Some(mask.resized(frame.width(), frame.height())))
    }
}

/// MiDaS-style monocular depth model with a `[1, 3, 256, 256]` input
pub struct OnnxDepthModel {
    session: Session,
    input_name: String,
    output_name: String,
}

impl OnnxDepthModel {
    /// # Errors
    ///
    /// Returns `ResourceAcquisition` if the model cannot be loaded
    pub fn new<P: AsRef<Path>>(model_path: P) -> Result<Self> {
        let (session, input_name, mut output_names) = load_session(model_path.as_ref())?;
        Ok(Self {
            session,
            input_name,
            output_name: output_names.swap_remove(0),
        })
    }
}

impl DepthModel for OnnxDepthModel {
    fn estimate(&mut self, frame: &RgbImage) -> Result<Array2<f32>> {
        let nchw = to_nhwc(frame, DEPTH_INPUT_SIZE).permuted_axes([0, 3, 1, 2]);
        let mut input = nchw.as_standard_layout().into_owned();
        for (c, mut channel) in input.axis_iter_mut(Axis(1)).enumerate() {
            channel.mapv_inplace(|v| (v - DEPTH_MEAN[c]) / DEPTH_STD[c]);
        }

        let tensor = Tensor::from_array(input).map_err(model_error)?;
        let outputs = self
            .session
            .run(ort::inputs![self.input_name.as_str() => tensor])
            .map_err(model_error)?;
        let depth = extract(&outputs[self.output_name.as_str()])?;

        let shape = depth.shape().to_vec();
        if shape.len() < 2 {
            return Err(Error::ModelOutputError(format!("Unexpected depth output shape {shape:?}")));
        }
        let (rows, cols) = (shape[shape.len() - 2], shape[shape.len() - 1]);
        let values: Vec<f32> = depth.iter().copied().take(rows * cols).collect();
        Array2::from_shape_vec((rows, cols), values)
            .map_err(|e| Error::ModelOutputError(format!("Failed to reshape depth output: {e}")))
    }
}
