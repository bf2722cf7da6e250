use image::RgbImage;
use crate::common::InferenceDevice;
use crate::data::RawTensor;
use crate::Result;

/// The execution backend seen by the detector: something that owns a loaded graph and turns a
/// frame into one raw output tensor.
///
/// Not safe for concurrent calls; a single owner drives it one frame at a time.
pub trait InferenceEngine {
    /// Selects the execution device. Idempotent, and effective from the next `run_inference`.
    /// Configuring the device already requested does nothing.
    fn configure(&mut self, device: InferenceDevice);

    /// The device inference actually runs on. Lags a pending switch until the next
    /// `run_inference`, and differs from the requested device after a fallback.
    fn device(&self) -> InferenceDevice;

    /// True while a configured device has not been applied yet.
    fn switch_pending(&self) -> bool {
        false
    }

    /// Runs one forward pass on `image` resized to `input_shape` (width, height) and returns
    /// the designated output with one row per anchor.
    fn run_inference(&mut self, image: &RgbImage, input_shape: (u32, u32)) -> Result<RawTensor>;

    /// Values per anchor row if the model declares it statically.
    fn output_width(&self) -> Option<usize> {
        None
    }

    /// Class names carried in the model's own metadata, if any.
    fn embedded_names(&self) -> Option<Vec<String>> {
        None
    }
}

impl<E: InferenceEngine + ?Sized> InferenceEngine for Box<E> {
    fn configure(&mut self, device: InferenceDevice) {
        (**self).configure(device)
    }

    fn device(&self) -> InferenceDevice {
        (**self).device()
    }

    fn switch_pending(&self) -> bool {
        (**self).switch_pending()
    }

    fn run_inference(&mut self, image: &RgbImage, input_shape: (u32, u32)) -> Result<RawTensor> {
        (**self).run_inference(image, input_shape)
    }

    fn output_width(&self) -> Option<usize> {
        (**self).output_width()
    }

    fn embedded_names(&self) -> Option<Vec<String>> {
        (**self).embedded_names()
    }
}
