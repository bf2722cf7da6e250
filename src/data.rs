mod execution_config;
mod raw_tensor;
mod time_calc;
pub mod send_channels;

pub use execution_config::ExecutionConfig;
pub use raw_tensor::RawTensor;
pub use send_channels::{control_channel, ControlCommand, ControlState};
pub use time_calc::TimeCalc;

pub(crate) const CROSS_MARK: &str = "❌";
