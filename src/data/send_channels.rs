use std::path::PathBuf;
use crossbeam_channel::{Receiver, Sender};
use crate::common::InferenceDevice;
use crate::error::DetectError;
use crate::Result;

/// Runtime requests to the frame loop, applied between frames.
#[derive(Debug, Clone, PartialEq)]
pub enum ControlCommand {
    SetDevice(InferenceDevice),
    /// `None` leaves that threshold unchanged.
    SetThresholds { score: Option<f32>, nms: Option<f32> },
    ReloadLabels(PathBuf),
    Stop,
}

impl ControlCommand {
    /// Parses one line of the interactive control protocol:
    ///
    /// `q` | `quit` | `stop`, `device cpu`, `device cuda [id]`, `score <f>`, `nms <f>`,
    /// `labels <path>`. A blank line is `Ok(None)`.
    pub fn parse(line: &str) -> Result<Option<Self>> {
        let mut parts = line.split_whitespace();
        let Some(verb) = parts.next() else {
            return Ok(None);
        };
        let arg = parts.next();

        let cmd = match (verb.to_lowercase().as_str(), arg) {
            ("q" | "quit" | "stop", _) => ControlCommand::Stop,
            ("device", Some(name)) => {
                let id = match parts.next() {
                    Some(id) => id.parse::<usize>()
                        .map_err(|e| DetectError::Config(format!("device id '{}': {}", id, e)))?,
                    None => 0,
                };
                let device = InferenceDevice::from_str(name, id).ok_or_else(|| {
                    DetectError::Config(format!(
                        "unknown device '{}', expected one of {:?}", name, InferenceDevice::all_inference_devices()
                    ))
                })?;
                ControlCommand::SetDevice(device)
            }
            ("score" | "conf", Some(v)) => ControlCommand::SetThresholds { score: Some(parse_f32(v)?), nms: None },
            ("nms", Some(v)) => ControlCommand::SetThresholds { score: None, nms: Some(parse_f32(v)?) },
            ("labels", Some(path)) => ControlCommand::ReloadLabels(PathBuf::from(path)),
            _ => return Err(DetectError::Config(format!("unrecognized command '{}'", line.trim()))),
        };
        Ok(Some(cmd))
    }
}

fn parse_f32(v: &str) -> Result<f32> {
    v.parse::<f32>().map_err(|e| DetectError::Config(format!("'{}': {}", v, e)))
}

#[derive(Debug, Clone)]
pub struct ControlState {
    pub ctl_tx: Sender<ControlCommand>,
    pub ctl_rx: Receiver<ControlCommand>,
}

pub fn control_channel() -> ControlState {
    let (ctl_tx, ctl_rx) = crossbeam_channel::unbounded();
    ControlState { ctl_tx, ctl_rx }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_every_verb() {
        assert_eq!(ControlCommand::parse("q").unwrap(), Some(ControlCommand::Stop));
        assert_eq!(ControlCommand::parse("  ").unwrap(), None);
        assert_eq!(
            ControlCommand::parse("device cuda 1").unwrap(),
            Some(ControlCommand::SetDevice(InferenceDevice::CUDA(1)))
        );
        assert_eq!(
            ControlCommand::parse("device CPU").unwrap(),
            Some(ControlCommand::SetDevice(InferenceDevice::CPU))
        );
        assert_eq!(
            ControlCommand::parse("nms 0.4").unwrap(),
            Some(ControlCommand::SetThresholds { score: None, nms: Some(0.4) })
        );
        assert_eq!(
            ControlCommand::parse("labels /tmp/coco.names").unwrap(),
            Some(ControlCommand::ReloadLabels(PathBuf::from("/tmp/coco.names")))
        );
    }

    #[test]
    fn rejects_garbage() {
        assert!(ControlCommand::parse("device tpu").is_err());
        assert!(ControlCommand::parse("score high").is_err());
        assert!(ControlCommand::parse("dance").is_err());
    }
}
