mod decoder;
pub mod nms;

use std::time::Instant;
use crate::common::{BoxUnits, FrameDetections, LabelSet};
use crate::data::{ExecutionConfig, RawTensor};
use crate::utils;
use crate::Result;

pub use decoder::{decode, decode_scaled};
pub use nms::{suppress, Nms};

/// Decodes one raw tensor and suppresses overlaps, giving the frame's detections.
pub fn process_predictions(
    raw: &RawTensor,
    labels: &LabelSet,
    image_size: (u32, u32),
    config: &ExecutionConfig,
    box_units: BoxUnits,
) -> Result<FrameDetections> {
    let start = Instant::now();

    let basis = box_units.basis(config.input_shape);
    let candidates = decode_scaled(raw, labels, image_size, config.score_threshold, basis)?;
    let elapsed = utils::trace("TIME", "Decode", start, Default::default());

    let kept = suppress(&candidates, config.score_threshold, config.nms_threshold);
    utils::trace("TIME", "NMS", start, elapsed);

    log::debug!("{} anchors -> {} candidates -> {} kept", raw.rows(), candidates.len(), kept.len());
    Ok(FrameDetections::new(candidates, kept))
}
