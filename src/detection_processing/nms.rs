use crate::common::Candidate;

pub trait Nms {
    fn iou(&self, other: &Self) -> f32;
    fn confidence(&self) -> f32;
}

impl Nms for Candidate {
    /// Computes the intersection over union (IoU) between this bounding box and another.
    fn iou(&self, other: &Self) -> f32 {
        self.bbox.iou(&other.bbox)
    }

    /// Returns the confidence score of the bounding box.
    fn confidence(&self) -> f32 {
        self.confidence
    }
}

/// Greedy, class-agnostic non-maximum suppression.
///
/// Candidates not strictly above `score_threshold` are dropped first. The rest are visited by
/// descending confidence (ties keep input order), and each is kept unless it overlaps an
/// already kept box with IoU strictly greater than `nms_threshold`.
///
/// # Returns
///
/// Indices into `candidates` in the order they were kept.
pub fn suppress<T: Nms>(candidates: &[T], score_threshold: f32, nms_threshold: f32) -> Vec<usize> {
    let mut order: Vec<usize> = (0..candidates.len())
        .filter(|&i| candidates[i].confidence() > score_threshold)
        .collect();
    order.sort_by(|&a, &b| candidates[b].confidence().total_cmp(&candidates[a].confidence()));

    let mut kept: Vec<usize> = Vec::with_capacity(order.len());
    for i in order {
        let clear = kept.iter().all(|&k| !(candidates[i].iou(&candidates[k]) > nms_threshold));
        if clear {
            kept.push(i);
        }
    }
    kept
}
