pub mod inference_process;
pub mod ort_detector;

pub use inference_process::InferenceEngine;
pub use ort_detector::*;
