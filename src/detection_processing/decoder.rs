use crate::common::{BvrBox, Candidate, LabelSet};
use crate::data::RawTensor;
use crate::Result;

/// Turns anchor rows into candidates for an image of `image_size` (width, height).
///
/// Box values are fractions of the network input. A row becomes a candidate only when its best
/// class score is strictly greater than `score_threshold`.
///
/// # Returns
///
/// `DetectError::DimensionMismatch` unless each row is exactly `4 + labels.len()` wide.
pub fn decode(raw: &RawTensor, labels: &LabelSet, image_size: (u32, u32), score_threshold: f32) -> Result<Vec<Candidate>> {
    decode_scaled(raw, labels, image_size, score_threshold, (1.0, 1.0))
}

/// Same as [`decode`], with box values first divided by `basis` (x, y). Models that emit boxes in
/// input pixels pass the input width and height here.
pub fn decode_scaled(
    raw: &RawTensor,
    labels: &LabelSet,
    image_size: (u32, u32),
    score_threshold: f32,
    basis: (f32, f32),
) -> Result<Vec<Candidate>> {
    let num_classes = labels.len();
    raw.validate_classes(num_classes)?;

    let (bx, by) = basis;
    let mut candidates = Vec::new();
    for row in 0..raw.rows() {
        let (Some([cx, cy, w, h]), Some(scores)) = (raw.bbox(row), raw.class_scores(row, num_classes)) else {
            continue;
        };

        let Some((class_id, confidence)) = arg_max(scores.iter().copied()) else {
            continue;
        };
        if !(confidence > score_threshold) {
            continue;
        }

        let bbox = BvrBox::from_normalized_cxcywh(cx / bx, cy / by, w / bx, h / by, image_size.0, image_size.1);
        candidates.push(Candidate::new(class_id, confidence, bbox));
    }

    Ok(candidates)
}

/// Index and value of the largest score. Ties go to the lowest index.
fn arg_max(scores: impl Iterator<Item = f32>) -> Option<(usize, f32)> {
    let mut best: Option<(usize, f32)> = None;
    for (i, s) in scores.enumerate() {
        match best {
            Some((_, max)) if !(s > max) && !max.is_nan() => {}
            _ => best = Some((i, s)),
        }
    }
    best
}
