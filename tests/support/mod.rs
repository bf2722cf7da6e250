#![allow(dead_code)]

use std::collections::VecDeque;
use image::{Rgb, RgbImage};
use bvr_live::capture::FrameSource;
use bvr_live::common::InferenceDevice;
use bvr_live::data::RawTensor;
use bvr_live::detection_runners::InferenceEngine;
use bvr_live::display::FrameSink;
use bvr_live::{DetectError, Result};

/// Engine returning canned tensors. Scripted results are used first, then the fixed tensor.
pub struct MockEngine {
    fixed: RawTensor,
    script: VecDeque<Result<RawTensor>>,
    device: InferenceDevice,
    requested: InferenceDevice,
    switch_pending: bool,
    accelerator_available: bool,
    output_width: Option<usize>,
    names: Option<Vec<String>>,
    pub configured: Vec<InferenceDevice>,
    pub calls: usize,
    pub shapes_seen: Vec<(u32, u32)>,
}

impl MockEngine {
    pub fn fixed(tensor: RawTensor) -> Self {
        Self {
            fixed: tensor,
            script: VecDeque::new(),
            device: InferenceDevice::CPU,
            requested: InferenceDevice::CPU,
            switch_pending: false,
            accelerator_available: true,
            output_width: None,
            names: None,
            configured: Vec::new(),
            calls: 0,
            shapes_seen: Vec::new(),
        }
    }

    pub fn with_script(mut self, script: Vec<Result<RawTensor>>) -> Self {
        self.script = script.into();
        self
    }

    pub fn with_output_width(mut self, width: usize) -> Self {
        self.output_width = Some(width);
        self
    }

    /// Accelerated devices fail to initialize and the engine falls back to CPU, the way a
    /// missing CUDA provider does.
    pub fn without_accelerator(mut self) -> Self {
        self.accelerator_available = false;
        self
    }

    /// Engine that was asked for `device` at load time and already fell back to CPU.
    pub fn fallen_back_from(mut self, device: InferenceDevice) -> Self {
        self.requested = device;
        self.device = InferenceDevice::CPU;
        self
    }

    pub fn with_names(mut self, names: &[&str]) -> Self {
        self.names = Some(names.iter().map(|n| n.to_string()).collect());
        self
    }
}

impl InferenceEngine for MockEngine {
    fn configure(&mut self, device: InferenceDevice) {
        self.configured.push(device);
        if device != self.requested {
            self.requested = device;
            self.switch_pending = device != self.device;
        }
    }

    fn device(&self) -> InferenceDevice {
        self.device
    }

    fn switch_pending(&self) -> bool {
        self.switch_pending
    }

    fn run_inference(&mut self, _image: &RgbImage, input_shape: (u32, u32)) -> Result<RawTensor> {
        if std::mem::take(&mut self.switch_pending) {
            self.device = if self.requested.is_accelerated() && !self.accelerator_available {
                InferenceDevice::CPU
            } else {
                self.requested
            };
        }
        self.calls += 1;
        self.shapes_seen.push(input_shape);
        match self.script.pop_front() {
            Some(next) => next,
            None => Ok(self.fixed.clone()),
        }
    }

    fn output_width(&self) -> Option<usize> {
        self.output_width
    }

    fn embedded_names(&self) -> Option<Vec<String>> {
        self.names.clone()
    }
}

/// One anchor row per entry, `[cx, cy, w, h, scores..]`.
pub fn tensor(rows: &[&[f32]]) -> RawTensor {
    let dims = rows.first().map(|r| r.len()).unwrap_or(0);
    let flat: Vec<f32> = rows.iter().flat_map(|r| r.iter().copied()).collect();
    RawTensor::from_shape_vec(rows.len(), dims, flat).unwrap()
}

/// Uniform frames whose red channel carries their index, so order can be checked downstream.
pub struct VecSource {
    frames: VecDeque<Result<Option<RgbImage>>>,
}

impl VecSource {
    pub fn tagged(count: u8, size: u32) -> Self {
        let frames = (0..count)
            .map(|i| Ok(Some(RgbImage::from_pixel(size, size, Rgb([i, 0, 0])))))
            .collect();
        Self { frames }
    }

    pub fn then_fail(mut self) -> Self {
        self.frames.push_back(Err(DetectError::Capture("device unplugged".to_string())));
        self
    }
}

impl FrameSource for VecSource {
    fn produce_frame(&mut self) -> Result<Option<RgbImage>> {
        self.frames.pop_front().unwrap_or(Ok(None))
    }

    fn describe(&self) -> String {
        "test frames".to_string()
    }
}

/// Keeps every displayed frame in memory.
#[derive(Default)]
pub struct CollectSink {
    pub frames: Vec<RgbImage>,
    pub fail_after: Option<usize>,
}

impl CollectSink {
    pub fn tags(&self) -> Vec<u8> {
        self.frames.iter().map(|f| f.get_pixel(f.width() - 1, f.height() - 1)[0]).collect()
    }
}

impl FrameSink for CollectSink {
    fn display(&mut self, image: &RgbImage) -> Result<()> {
        if self.fail_after.is_some_and(|n| self.frames.len() >= n) {
            return Err(DetectError::Display("window closed".to_string()));
        }
        self.frames.push(image.clone());
        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }
}
