mod utils;
pub mod capture;
pub mod common;
pub mod data;
pub mod detection_processing;
pub mod detection_runners;
pub mod detectors;
pub mod display;
pub mod drawing;
pub mod error;
pub mod frame_loop;

use std::time::Instant;
use anyhow::Context;
use image::RgbImage;
use crate::common::{FrameDetections, LabelSet, LabelStore, ModelConfig};
use crate::data::ExecutionConfig;
use crate::detection_runners::{InferenceEngine, OrtEngine};
use crate::detectors::Detector;

pub use crate::error::DetectError;

pub type Result<T, E = DetectError> = std::result::Result<T, E>;

/// Loads labels and model, checks that they agree on the number of classes, and warms the
/// session up once.
pub fn init_detector(model_details: &ModelConfig) -> anyhow::Result<Detector<OrtEngine>> {
    model_details.validate()?;
    log::debug!("Model configuration:\n{}", model_details);

    let labels = LabelSet::load(&model_details.labels_path)?;
    log::info!("Loaded {} class labels from {}", labels.len(), model_details.labels_path);

    OrtEngine::init_runtime(model_details.ort_lib_path.as_deref())?;
    log::info!("Initializing ORT session with ({}) execution provider", model_details.inference_device);
    let engine = OrtEngine::new(model_details)?;

    let mut detector = Detector::new(engine, LabelStore::new(labels), ExecutionConfig::from(model_details))?
        .with_box_units(model_details.box_units);
    detector.warm_up().context("warm-up inference failed")?;
    Ok(detector)
}

/// Runs one frame through the detector and returns the decoded, suppressed detections.
pub fn run_detection<E: InferenceEngine>(detector: &mut Detector<E>, image: &RgbImage) -> Result<FrameDetections> {
    let now = Instant::now();
    let detections = detector.detect(image)?;
    log::debug!("Processing time: {:?}", now.elapsed());
    Ok(detections)
}
