mod bvr_box;
mod candidate;
mod inference_device;
mod label_set;
mod model_config;
mod output_layout;

pub use bvr_box::*;
pub use candidate::*;
pub use inference_device::*;
pub use label_set::*;
pub use model_config::*;
pub use output_layout::*;
