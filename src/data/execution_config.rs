use crate::common::{InferenceDevice, ModelConfig};
use crate::common::check_unit;
use crate::Result;

/// Runtime knobs of the pipeline. Changed only between frames.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExecutionConfig {
    pub device: InferenceDevice,
    pub score_threshold: f32,
    pub nms_threshold: f32,
    /// Network input `(width, height)`.
    pub input_shape: (u32, u32),
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            device: InferenceDevice::CPU,
            score_threshold: 0.5,
            nms_threshold: 0.5,
            input_shape: (640, 640),
        }
    }
}

impl From<&ModelConfig> for ExecutionConfig {
    fn from(config: &ModelConfig) -> Self {
        Self {
            device: config.inference_device,
            score_threshold: config.conf_threshold,
            nms_threshold: config.nms_threshold,
            input_shape: (config.width, config.height),
        }
    }
}

impl ExecutionConfig {
    pub fn with_device(mut self, device: InferenceDevice) -> Self {
        self.device = device;
        self
    }

    pub fn with_thresholds(mut self, score_threshold: f32, nms_threshold: f32) -> Result<Self> {
        check_unit("confidence threshold", score_threshold)?;
        check_unit("NMS threshold", nms_threshold)?;
        self.score_threshold = score_threshold;
        self.nms_threshold = nms_threshold;
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derives_from_model_config() {
        let mut mc = ModelConfig::new("m.onnx", "l.txt", InferenceDevice::CUDA(0));
        mc.width = 320;
        mc.height = 256;
        mc.conf_threshold = 0.25;
        let ec = ExecutionConfig::from(&mc);
        assert_eq!(ec.input_shape, (320, 256));
        assert_eq!(ec.score_threshold, 0.25);
        assert!(ec.device.is_accelerated());
    }

    #[test]
    fn thresholds_are_range_checked() {
        let ec = ExecutionConfig::default();
        assert!(ec.with_thresholds(0.3, 0.45).is_ok());
        assert!(ec.with_thresholds(-0.1, 0.45).is_err());
        assert!(ec.with_thresholds(0.3, f32::NAN).is_err());
    }
}
