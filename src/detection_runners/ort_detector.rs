mod ort_engine;
pub mod image_ops;

pub use ort_engine::*;
