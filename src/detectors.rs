use std::path::Path;
use std::time::Instant;
use image::RgbImage;
use crate::common::{BoxUnits, FrameDetections, InferenceDevice, LabelSet, LabelStore};
use crate::common::check_unit;
use crate::data::{ControlCommand, ExecutionConfig, TimeCalc};
use crate::detection_processing;
use crate::detection_runners::InferenceEngine;
use crate::error::DetectError;
use crate::utils;
use crate::Result;

/// Inference backend plus the decode/suppress pipeline and the runtime configuration that
/// governs both.
pub struct Detector<E: InferenceEngine> {
    engine: E,
    labels: LabelStore,
    config: ExecutionConfig,
    box_units: BoxUnits,
    infer_time: TimeCalc,
}

impl<E: InferenceEngine> Detector<E> {
    /// Wires an engine to a label set and applies the configured device.
    ///
    /// Fails fast with `DimensionMismatch` when the model declares an output width that does not
    /// match `4 + labels.len()`.
    pub fn new(mut engine: E, labels: LabelStore, config: ExecutionConfig) -> Result<Self> {
        check_unit("confidence threshold", config.score_threshold)?;
        check_unit("NMS threshold", config.nms_threshold)?;
        if config.input_shape.0 == 0 || config.input_shape.1 == 0 {
            return Err(DetectError::Config(format!(
                "input size {}x{} is empty", config.input_shape.0, config.input_shape.1
            )));
        }

        let current = labels.current();
        check_output_width(engine.output_width(), &current)?;
        if let Some(names) = engine.embedded_names() {
            if names.len() != current.len() {
                log::warn!("Model metadata lists {} class names, label file has {}", names.len(), current.len());
            }
        }

        engine.configure(config.device);
        let mut detector = Self {
            engine,
            labels,
            config,
            box_units: BoxUnits::default(),
            infer_time: TimeCalc::default(),
        };
        detector.sync_device();
        Ok(detector)
    }

    pub fn with_box_units(mut self, box_units: BoxUnits) -> Self {
        self.box_units = box_units;
        self
    }

    /// Runs one inference on a blank frame so the first live frame does not pay for lazy
    /// allocations inside the runtime.
    pub fn warm_up(&mut self) -> Result<()> {
        let (w, h) = self.config.input_shape;
        let start = Instant::now();
        let raw = self.engine.run_inference(&RgbImage::new(w, h), self.config.input_shape);
        self.sync_device();
        let raw = raw?;
        log::info!("Warm-up done in {:.2?} ({} anchors x {} values)", start.elapsed(), raw.rows(), raw.dimensions());
        Ok(())
    }

    /// Full per-frame pipeline: inference, decode, suppress.
    pub fn detect(&mut self, image: &RgbImage) -> Result<FrameDetections> {
        let labels = self.labels.current();
        let start = Instant::now();

        let raw = self.engine.run_inference(image, self.config.input_shape);
        self.sync_device();
        let raw = raw?;
        let elapsed = utils::trace("TIME", "Detection run", start, Default::default());
        self.infer_time.add_or_push(0, elapsed);

        let detections = detection_processing::process_predictions(
            &raw, &labels, image.dimensions(), &self.config, self.box_units,
        )?;
        let total = utils::trace("TIME", "Postprocessing", start, elapsed);
        self.infer_time.add_or_push(1, total.saturating_sub(elapsed));

        Ok(detections)
    }

    /// `None` keeps the current value. Both values are checked before either is applied.
    pub fn set_thresholds(&mut self, score: Option<f32>, nms: Option<f32>) -> Result<()> {
        self.config = self.config.with_thresholds(
            score.unwrap_or(self.config.score_threshold),
            nms.unwrap_or(self.config.nms_threshold),
        )?;
        log::info!("Thresholds: score {} | nms {}", self.config.score_threshold, self.config.nms_threshold);
        Ok(())
    }

    /// Requests `device` for the next frame. If the backend cannot run on it, the device the
    /// backend settles on is written back into the config after that frame's inference.
    pub fn set_device(&mut self, device: InferenceDevice) {
        self.config = self.config.with_device(device);
        self.engine.configure(device);
        log::info!("Inference device set to {}", device);
        self.sync_device();
    }

    /// Adopts the backend's device when it settled somewhere other than the configured one.
    fn sync_device(&mut self) {
        if self.engine.switch_pending() {
            return;
        }
        let active = self.engine.device();
        if active != self.config.device {
            log::warn!("Inference device {} unavailable, running on {}", self.config.device, active);
            self.config = self.config.with_device(active);
        }
    }

    /// Loads a new label file and publishes it if it fits the model. The previous set stays
    /// active on any failure.
    pub fn reload_labels<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let fresh = LabelSet::load(path.as_ref())?;
        check_output_width(self.engine.output_width(), &fresh)?;
        let count = fresh.len();
        self.labels.replace(fresh);
        log::info!("Reloaded {} labels from {}", count, path.as_ref().display());
        Ok(())
    }

    /// Applies one control command between frames.
    ///
    /// # Returns
    ///
    /// `true` if the command asks the loop to stop.
    pub fn apply(&mut self, command: ControlCommand) -> bool {
        let applied = match command {
            ControlCommand::Stop => return true,
            ControlCommand::SetDevice(device) => {
                self.set_device(device);
                Ok(())
            }
            ControlCommand::SetThresholds { score, nms } => self.set_thresholds(score, nms),
            ControlCommand::ReloadLabels(path) => self.reload_labels(&path),
        };
        if let Err(err) = applied {
            log::warn!("Control command rejected: {}", err);
        }
        false
    }

    pub fn labels(&self) -> &LabelStore {
        &self.labels
    }

    pub fn config(&self) -> &ExecutionConfig {
        &self.config
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    pub fn infer_time(&self) -> &TimeCalc {
        &self.infer_time
    }
}

fn check_output_width(declared: Option<usize>, labels: &LabelSet) -> Result<()> {
    match declared {
        Some(actual) if actual != 4 + labels.len() => {
            Err(DetectError::DimensionMismatch { expected: 4 + labels.len(), actual })
        }
        _ => Ok(()),
    }
}
