use std::fmt;
use serde::{Deserialize, Serialize};

/// Where inference runs. `CPU` is the generic target, `CUDA(device_id)` the accelerated one.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InferenceDevice {
    #[default] CPU,
    CUDA(usize),
}

// Device names, "proper" spelling first and lowercase second.
const CPU: [&str; 2] = ["CPU", "cpu"];
const CUDA: [&str; 2] = ["CUDA", "cuda"];

impl InferenceDevice {
    pub fn from_str(device: &str, device_id: usize) -> Option<Self> {
        match device.trim().to_lowercase().as_str() {
            "cpu" => Some(InferenceDevice::CPU),
            "cuda" | "gpu" => Some(InferenceDevice::CUDA(device_id)),
            _ => None,
        }
    }

    pub fn str(&self) -> &'static str {
        match self {
            InferenceDevice::CPU => CPU[0],
            InferenceDevice::CUDA(_) => CUDA[0],
        }
    }

    pub fn str_lowercase(&self) -> &'static str {
        match self {
            InferenceDevice::CPU => CPU[1],
            InferenceDevice::CUDA(_) => CUDA[1],
        }
    }

    pub fn is_accelerated(&self) -> bool {
        matches!(self, InferenceDevice::CUDA(_))
    }

    pub fn all_inference_devices() -> Vec<&'static str> {
        vec![CPU[1], CUDA[1]]
    }
}

impl fmt::Display for InferenceDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InferenceDevice::CPU => write!(f, "{}", CPU[0]),
            InferenceDevice::CUDA(id) => write!(f, "{}:{}", CUDA[0], id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_both_spellings() {
        assert_eq!(InferenceDevice::from_str("CPU", 3), Some(InferenceDevice::CPU));
        assert_eq!(InferenceDevice::from_str("cuda", 1), Some(InferenceDevice::CUDA(1)));
        assert_eq!(InferenceDevice::from_str("tpu", 0), None);
    }

    #[test]
    fn only_cuda_is_accelerated() {
        assert!(InferenceDevice::CUDA(0).is_accelerated());
        assert!(!InferenceDevice::CPU.is_accelerated());
        assert_eq!(InferenceDevice::CUDA(2).to_string(), "CUDA:2");
    }
}
