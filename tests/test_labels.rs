mod support;

use std::io::Write;
use image::RgbImage;
use tempfile::NamedTempFile;
use bvr_live::common::{LabelSet, LabelStore};
use bvr_live::data::{ControlCommand, ExecutionConfig};
use bvr_live::detectors::Detector;
use bvr_live::DetectError;
use support::{tensor, MockEngine};

fn label_file(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

#[test]
fn three_lines_make_three_labels() {
    let file = label_file("person\nbicycle\ntraffic light\n");

    let labels = LabelSet::load(file.path()).unwrap();

    assert_eq!(labels.len(), 3);
    assert_eq!(labels.get(0), Some("person"));
    assert_eq!(labels.get(2), Some("traffic light"));
}

#[test]
fn last_line_without_newline_and_crlf_are_read() {
    let file = label_file("cat\r\ndog");

    let labels = LabelSet::load(file.path()).unwrap();

    assert_eq!(labels.names(), ["cat", "dog"]);
}

#[test]
fn empty_file_fails() {
    let file = label_file("");

    let err = LabelSet::load(file.path()).unwrap_err();

    assert!(matches!(err, DetectError::LabelLoad { .. }));
    assert_eq!(err.exit_code(), 2);
}

#[test]
fn missing_file_fails() {
    let dir = tempfile::tempdir().unwrap();

    let err = LabelSet::load(dir.path().join("nope.txt")).unwrap_err();

    assert!(matches!(err, DetectError::LabelLoad { .. }));
}

#[test]
fn failed_reload_keeps_previous_labels() {
    let store = LabelStore::new(LabelSet::from_names(["cat", "dog"]).unwrap());
    let empty = label_file("");

    assert!(store.reload(empty.path()).is_err());
    assert_eq!(store.current().names(), ["cat", "dog"]);

    let fresh = label_file("fox\nowl\n");
    store.reload(fresh.path()).unwrap();
    assert_eq!(store.current().names(), ["fox", "owl"]);
}

#[test]
fn reload_through_detector_checks_model_width() {
    let raw = tensor(&[&[0.5, 0.5, 0.2, 0.2, 0.1, 0.9]]);
    let engine = MockEngine::fixed(raw).with_output_width(6);
    let store = LabelStore::new(LabelSet::from_names(["cat", "dog"]).unwrap());
    let mut detector = Detector::new(engine, store.clone(), ExecutionConfig::default()).unwrap();

    let three = label_file("a\nb\nc\n");
    assert!(matches!(
        detector.reload_labels(three.path()),
        Err(DetectError::DimensionMismatch { expected: 7, actual: 6 })
    ));
    assert_eq!(store.current().len(), 2);

    let renamed = label_file("fox\nowl\n");
    detector.apply(ControlCommand::ReloadLabels(renamed.path().to_path_buf()));
    let found = detector.detect(&RgbImage::new(100, 100)).unwrap();
    let first = found.iter_kept().next().unwrap();
    assert_eq!(store.current().get(first.class_id), Some("owl"));
}
