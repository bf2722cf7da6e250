use thiserror::Error;

/// Every failure the detection pipeline can report.
///
/// Startup kinds (`LabelLoad`, `ModelLoad`, `DeviceOpen`, `Config`) are fatal. `Inference` and
/// `DimensionMismatch` raised while a frame is processed only cost that frame.
#[derive(Error, Debug)]
pub enum DetectError {
    #[error("Failed to load labels from '{path}': {reason}")]
    LabelLoad { path: String, reason: String },

    #[error("Failed to load model from '{path}': {reason}")]
    ModelLoad { path: String, reason: String },

    #[error("Failed to open capture device '{device}': {reason}")]
    DeviceOpen { device: String, reason: String },

    #[error("Failed to capture frame: {0}")]
    Capture(String),

    #[error("Inference failed: {0}")]
    Inference(String),

    #[error("Tensor dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Display sink error: {0}")]
    Display(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl DetectError {
    pub fn label_load(path: &str, reason: impl ToString) -> Self {
        DetectError::LabelLoad { path: path.to_string(), reason: reason.to_string() }
    }

    pub fn model_load(path: &str, reason: impl ToString) -> Self {
        DetectError::ModelLoad { path: path.to_string(), reason: reason.to_string() }
    }

    pub fn device_open(device: &str, reason: impl ToString) -> Self {
        DetectError::DeviceOpen { device: device.to_string(), reason: reason.to_string() }
    }

    /// Process exit code for a driver that stops on this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            DetectError::LabelLoad { .. } => 2,
            DetectError::ModelLoad { .. } => 3,
            DetectError::DeviceOpen { .. } => 4,
            DetectError::Config(_) => 5,
            _ => 1,
        }
    }

    /// True for failures that only invalidate the frame being processed.
    pub fn is_per_frame(&self) -> bool {
        matches!(self, DetectError::Inference(_) | DetectError::DimensionMismatch { .. })
    }
}

impl From<ort::Error> for DetectError {
    fn from(err: ort::Error) -> Self {
        DetectError::Inference(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn startup_errors_have_distinct_exit_codes() {
        let codes = [
            DetectError::label_load("labels.txt", "empty").exit_code(),
            DetectError::model_load("model.onnx", "bad").exit_code(),
            DetectError::device_open("/dev/video0", "busy").exit_code(),
            DetectError::Config("nope".into()).exit_code(),
        ];
        assert_eq!(codes, [2, 3, 4, 5]);
        assert_eq!(DetectError::Inference("x".into()).exit_code(), 1);
    }

    #[test]
    fn only_inference_kinds_are_per_frame() {
        assert!(DetectError::Inference("zero outputs".into()).is_per_frame());
        assert!(DetectError::DimensionMismatch { expected: 84, actual: 6 }.is_per_frame());
        assert!(!DetectError::Display("disk full".into()).is_per_frame());
    }
}
