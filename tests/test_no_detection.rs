mod support;

use image::RgbImage;
use bvr_live::common::{Candidate, LabelSet, LabelStore};
use bvr_live::data::{ExecutionConfig, RawTensor};
use bvr_live::detection_processing::{decode, suppress};
use bvr_live::detectors::Detector;
use support::{tensor, MockEngine};

#[test]
fn scores_at_threshold_are_dropped() {
    let labels = LabelSet::from_names(["cat", "dog"]).unwrap();
    let raw = tensor(&[
        &[0.5, 0.5, 0.2, 0.2, 0.5, 0.5],
        &[0.3, 0.3, 0.1, 0.1, 0.0, 0.0],
    ]);

    assert!(decode(&raw, &labels, (640, 480), 0.5).unwrap().is_empty());
}

#[test]
fn empty_tensor_gives_no_candidates() {
    let labels = LabelSet::from_names(["cat", "dog"]).unwrap();
    let raw = RawTensor::from_shape_vec(0, 6, Vec::new()).unwrap();

    assert!(decode(&raw, &labels, (640, 480), 0.5).unwrap().is_empty());
    assert!(suppress::<Candidate>(&[], 0.5, 0.5).is_empty());
}

#[test]
fn blank_frame_is_passed_through() {
    let raw = tensor(&[&[0.5, 0.5, 0.9, 0.9, 0.01, 0.02]]);
    let labels = LabelStore::new(LabelSet::from_names(["cat", "dog"]).unwrap());
    let mut detector = Detector::new(MockEngine::fixed(raw), labels, ExecutionConfig::default()).unwrap();

    let found = detector.detect(&RgbImage::new(320, 240)).unwrap();

    assert!(found.is_empty());
    assert!(found.candidates.is_empty());
    assert_eq!(found.iter_kept().count(), 0);
}
