use serde::{Deserialize, Serialize};
use crate::common::BvrBox;

/// One anchor row that cleared the score threshold.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub class_id: usize,
    pub confidence: f32,
    pub bbox: BvrBox,
}

impl Candidate {
    pub fn new(class_id: usize, confidence: f32, bbox: BvrBox) -> Self {
        Self { class_id, confidence, bbox }
    }
}

/// Everything one frame produced: the decoded candidates and the indices that survived
/// suppression, highest confidence first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FrameDetections {
    pub candidates: Vec<Candidate>,
    pub kept: Vec<usize>,
}

impl FrameDetections {
    pub fn new(candidates: Vec<Candidate>, kept: Vec<usize>) -> Self {
        Self { candidates, kept }
    }

    /// Kept candidates in suppression order.
    pub fn iter_kept(&self) -> impl Iterator<Item = &Candidate> + '_ {
        self.kept.iter().filter_map(|&i| self.candidates.get(i))
    }

    pub fn len(&self) -> usize {
        self.kept.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kept.is_empty()
    }
}
