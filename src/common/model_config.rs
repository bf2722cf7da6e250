use std::fmt;
use std::fs;
use std::path::Path;
use serde::{Deserialize, Serialize};
use crate::common::{BoxUnits, InferenceDevice, OutputLayout};
use crate::error::DetectError;
use crate::Result;

/// Startup configuration for the detector, loadable from a JSON file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub weights_path: String,
    pub labels_path: String,
    pub ort_lib_path: Option<String>,
    pub inference_device: InferenceDevice,
    pub width: u32,
    pub height: u32,
    pub conf_threshold: f32,
    pub nms_threshold: f32,
    pub output_layout: OutputLayout,
    pub box_units: BoxUnits,
    pub swap_rb: bool,
    pub font_path: Option<String>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            weights_path: String::new(),
            labels_path: String::new(),
            ort_lib_path: None,
            inference_device: InferenceDevice::CPU,
            width: 640,
            height: 640,
            conf_threshold: 0.5,
            nms_threshold: 0.5,
            output_layout: OutputLayout::FeaturesFirst,
            box_units: BoxUnits::Normalized,
            // frames are decoded as RGB already, which is what YOLO exports expect
            swap_rb: false,
            font_path: None,
        }
    }
}

impl ModelConfig {
    pub fn new(weights_path: &str, labels_path: &str, inference_device: InferenceDevice) -> Self {
        Self {
            weights_path: weights_path.to_string(),
            labels_path: labels_path.to_string(),
            inference_device,
            ..Default::default()
        }
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .map_err(|e| DetectError::Config(format!("{}: {}", path.display(), e)))?;
        let config: ModelConfig = serde_json::from_str(&text)
            .map_err(|e| DetectError::Config(format!("{}: {}", path.display(), e)))?;
        Ok(config)
    }

    pub fn set_device_type(&mut self, device_type: InferenceDevice) {
        self.inference_device = device_type;
    }

    /// Checks values that would otherwise fail deep inside the pipeline.
    pub fn validate(&self) -> Result<()> {
        if self.weights_path.is_empty() {
            return Err(DetectError::Config("no model weights path given".into()));
        }
        if self.labels_path.is_empty() {
            return Err(DetectError::Config("no labels path given".into()));
        }
        if self.width == 0 || self.height == 0 {
            return Err(DetectError::Config(format!("input size {}x{} is empty", self.width, self.height)));
        }
        check_unit("confidence threshold", self.conf_threshold)?;
        check_unit("NMS threshold", self.nms_threshold)?;
        Ok(())
    }
}

pub(crate) fn check_unit(what: &str, value: f32) -> Result<()> {
    if !(0.0..=1.0).contains(&value) {
        return Err(DetectError::Config(format!("{} {} is outside [0, 1]", what, value)));
    }
    Ok(())
}

impl fmt::Display for ModelConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Weights File Path: {}\n\
        Labels Path: {}\n\
        OnnxRuntime Lib Path: {}\n\
        Inference Device: {}\n\
        Output Layout: {:?} ({:?} boxes)\n\
        Model Input Resolution: {}x{}\n\
        Detection Threshold: {}\n\
        NMS Threshold: {}",
               self.weights_path, self.labels_path,
               self.ort_lib_path.as_deref().unwrap_or("<system>"),
               self.inference_device, self.output_layout, self.box_units,
               self.width, self.height, self.conf_threshold, self.nms_threshold)
    }
}
