//! File/code adapted from https://github.com/jamjamjon/usls

use std::fs;
use anyhow::Context;
use half::f16;
use image::RgbImage;
use ort::{
    execution_providers::{CPUExecutionProvider, CUDAExecutionProvider, ExecutionProvider},
    session::builder::{GraphOptimizationLevel, SessionBuilder},
    session::Session,
    tensor::TensorElementType,
    value::{DynValue, Tensor},
};
use regex::Regex;
use crate::common::{InferenceDevice, ModelConfig, OutputLayout};
use crate::data::{RawTensor, CROSS_MARK};
use crate::detection_runners::image_ops;
use crate::detection_runners::inference_process::InferenceEngine;
use crate::error::DetectError;
use crate::utils::human_bytes;
use crate::Result;

/// ONNX Runtime execution backend.
///
/// Owns the session and a copy of the model bytes, so a device switch rebuilds the session
/// without touching the file system again.
pub struct OrtEngine {
    model_path: String,
    model_bytes: Vec<u8>,
    session: Session,
    requested: InferenceDevice,
    active: InferenceDevice,
    switch_pending: bool,
    layout: OutputLayout,
    swap_rb: bool,
    input_name: String,
    input_dtype: TensorElementType,
    output_name: String,
    output_dtype: TensorElementType,
    output_width: Option<usize>,
    names: Option<Vec<String>>,
}

impl OrtEngine {
    /// Loads the ONNX Runtime shared library. Only the first call in a process has any effect.
    pub fn init_runtime(ort_lib_path: Option<&str>) -> Result<()> {
        let committed = match ort_lib_path {
            Some(path) => ort::init_from(path).commit(),
            None => ort::init().commit(),
        };
        committed.map(|_| ()).map_err(|e| {
            DetectError::model_load(ort_lib_path.unwrap_or("<onnxruntime>"), format!("ORT commit failed: {:?}", e))
        })
    }

    /// Reads and parses the model, and builds a session on the configured device.
    ///
    /// # Returns
    ///
    /// `DetectError::ModelLoad` if the file can't be read, ONNX Runtime rejects it, or the
    /// graph declares no inputs or outputs.
    pub fn new(config: &ModelConfig) -> Result<Self> {
        let model_path = config.weights_path.clone();
        let model_bytes = fs::read(&model_path).map_err(|e| DetectError::model_load(&model_path, e))?;

        let (session, active) = Self::build_session(&model_bytes, config.inference_device)
            .map_err(|e| DetectError::model_load(&model_path, format!("{:#}", e)))?;

        let input = session.inputs.first()
            .ok_or_else(|| DetectError::model_load(&model_path, "graph has no inputs"))?;
        let output = session.outputs.first()
            .ok_or_else(|| DetectError::model_load(&model_path, "graph has no outputs"))?;

        let input_name = input.name.to_string();
        let input_dtype = input.input_type.tensor_type().unwrap_or(TensorElementType::Float32);
        let output_name = output.name.to_string();
        let output_dtype = output.output_type.tensor_type().unwrap_or(TensorElementType::Float32);
        let output_width = output.output_type.tensor_shape()
            .and_then(|shape| Self::output_width_from_shape(shape, config.output_layout));

        let names = match session.metadata() {
            Err(_) => None,
            Ok(metadata) => metadata.custom("names").unwrap_or_default(),
        }.map(|raw| Self::parse_names(&raw));

        log::info!(
            "Backend: ONNXRuntime | Model: {} ({}) | Device: {} | Input: {} {:?} | Output: {} (width {:?})",
            model_path,
            human_bytes(model_bytes.len() as f64),
            active,
            input_name,
            input_dtype,
            output_name,
            output_width,
        );

        Ok(Self {
            model_path,
            model_bytes,
            session,
            requested: config.inference_device,
            active,
            switch_pending: false,
            layout: config.output_layout,
            swap_rb: config.swap_rb,
            input_name,
            input_dtype,
            output_name,
            output_dtype,
            output_width,
            names,
        })
    }

    fn build_session(model_bytes: &[u8], device: InferenceDevice) -> anyhow::Result<(Session, InferenceDevice)> {
        let mut builder = Session::builder()?;

        let mut active = device;
        match device {
            InferenceDevice::CUDA(device_id) => {
                Self::build_cuda(&mut builder, device_id).unwrap_or_else(|err| {
                    log::warn!("{err}, Using cpu");
                    active = InferenceDevice::CPU;
                })
            }
            InferenceDevice::CPU => {
                Self::build_cpu(&mut builder)?;
            }
        }

        let session = builder
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .commit_from_memory(model_bytes)
            .context("failed to build session")?;
        Ok((session, active))
    }

    fn build_cuda(builder: &mut SessionBuilder, device_id: usize) -> anyhow::Result<()> {
        let ep = CUDAExecutionProvider::default().with_device_id(device_id as i32);
        if ep.is_available()? {
            match ep.register(builder) {
                Ok(_) => { }
                Err(err) => { anyhow::bail!("{CROSS_MARK} CUDA initialization failed: {:?}", err) }
            }
            Ok(())
        } else {
            anyhow::bail!("{CROSS_MARK} CUDA execution provider not available")
        }
    }

    fn build_cpu(builder: &mut SessionBuilder) -> anyhow::Result<()> {
        let ep = CPUExecutionProvider::default();
        if ep.is_available()? {
            match ep.register(builder) {
                Ok(_) => { }
                Err(err) => { anyhow::bail!("{CROSS_MARK} CPU initialization failed: {:?}", err) }
            }
            Ok(())
        } else {
            anyhow::bail!("{CROSS_MARK} CPU execution provider not available")
        }
    }

    /// Applies a pending device switch, at most once per request. A failed rebuild keeps the
    /// current session.
    fn apply_pending_device(&mut self) {
        if !std::mem::take(&mut self.switch_pending) {
            return;
        }
        log::info!("Switching inference device {} -> {}", self.active, self.requested);
        match Self::build_session(&self.model_bytes, self.requested) {
            Ok((session, active)) => {
                self.session = session;
                self.active = active;
            }
            Err(err) => {
                log::error!("Failed to rebuild session for {}: {:#}. Staying on {}", self.requested, err, self.active);
            }
        }
    }

    fn input_value(&self, image: &RgbImage, input_shape: (u32, u32)) -> Result<DynValue> {
        let x = image_ops::preprocess(image, input_shape.0, input_shape.1, self.swap_rb)?;
        let value = match self.input_dtype {
            TensorElementType::Float16 => Tensor::from_array(x.mapv(f16::from_f32))?.into_dyn(),
            _ => Tensor::from_array(x)?.into_dyn(),
        };
        Ok(value)
    }

    /// Class names from ONNX metadata.
    /// String format: `{0: 'person', 1: 'bicycle', 2: 'sports ball', ..., 27: "yellow_lady's_slipper"}`
    pub fn parse_names(raw: &str) -> Vec<String> {
        let re = match Regex::new(r#"(['"])([-()\w '"]+)(['"])"#) {
            Ok(re) => re,
            Err(_) => return Vec::new(),
        };
        let mut names = vec![];
        for (_, [_, name, _]) in re.captures_iter(raw).map(|x| x.extract()) {
            names.push(name.to_string());
        }
        names
    }

    /// Static per-anchor width from a declared `[1, a, b]` output shape. Dynamic axes are `-1`.
    pub fn output_width_from_shape(shape: &[i64], layout: OutputLayout) -> Option<usize> {
        if shape.len() != 3 {
            return None;
        }
        let width = shape[1 + layout.feature_axis()];
        if width > 0 { Some(width as usize) } else { None }
    }

    pub fn model_path(&self) -> &str {
        &self.model_path
    }

    pub fn layout(&self) -> OutputLayout {
        self.layout
    }
}

impl InferenceEngine for OrtEngine {
    fn configure(&mut self, device: InferenceDevice) {
        if device == self.requested {
            return;
        }
        log::debug!("Device {} requested, applied on next inference", device);
        self.requested = device;
        self.switch_pending = device != self.active;
    }

    fn device(&self) -> InferenceDevice {
        self.active
    }

    fn switch_pending(&self) -> bool {
        self.switch_pending
    }

    fn run_inference(&mut self, image: &RgbImage, input_shape: (u32, u32)) -> Result<RawTensor> {
        self.apply_pending_device();

        let input = self.input_value(image, input_shape)?;
        let outputs = self.session.run(ort::inputs![self.input_name.as_str() => input])?;

        let output = match outputs.get(self.output_name.as_str()) {
            Some(output) => output,
            None => return Err(DetectError::Inference("forward pass produced no outputs".to_string())),
        };

        match self.output_dtype {
            TensorElementType::Float16 => {
                let y = output.try_extract_array::<f16>()?.mapv(f16::to_f32);
                RawTensor::from_model_output(y.view(), self.layout)
            }
            _ => {
                let y = output.try_extract_array::<f32>()?;
                RawTensor::from_model_output(y, self.layout)
            }
        }
    }

    fn output_width(&self) -> Option<usize> {
        self.output_width
    }

    fn embedded_names(&self) -> Option<Vec<String>> {
        self.names.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_ultralytics_names() {
        let raw = r#"{0: 'person', 1: 'bicycle', 2: 'sports ball', 27: "yellow_lady's_slipper"}"#;
        let names = OrtEngine::parse_names(raw);
        assert_eq!(names[..3], ["person", "bicycle", "sports ball"]);
        assert_eq!(names.len(), 4);
    }

    #[test]
    fn output_width_follows_layout() {
        assert_eq!(OrtEngine::output_width_from_shape(&[1, 84, 8400], OutputLayout::FeaturesFirst), Some(84));
        assert_eq!(OrtEngine::output_width_from_shape(&[1, 8400, 85], OutputLayout::AnchorsFirst), Some(85));
        assert_eq!(OrtEngine::output_width_from_shape(&[1, -1, -1], OutputLayout::FeaturesFirst), None);
        assert_eq!(OrtEngine::output_width_from_shape(&[84, 8400], OutputLayout::FeaturesFirst), None);
    }
}
