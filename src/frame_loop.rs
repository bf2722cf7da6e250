use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Instant;
use crossbeam_channel::{Receiver, TryRecvError};
use image::RgbImage;
use crate::capture::FrameSource;
use crate::data::ControlCommand;
use crate::detection_runners::InferenceEngine;
use crate::detectors::Detector;
use crate::display::FrameSink;
use crate::drawing::Renderer;
use crate::error::DetectError;
use crate::Result;

/// Frames buffered between the capture thread and inference in pipelined mode.
const PIPELINE_DEPTH: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The source ran out of frames or failed to produce one.
    EndOfStream,
    /// A stop signal or `Stop` command arrived.
    StopSignal,
    /// The configured frame limit was reached.
    MaxFrames,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Running,
    Stopped(StopReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopSummary {
    /// Frames that went through the whole pipeline and were displayed.
    pub frames: u64,
    /// Detections drawn across all displayed frames.
    pub detections: u64,
    /// Frames dropped because inference or decoding failed.
    pub skipped_frames: u64,
    pub stop_reason: StopReason,
}

/// Cooperative stop flag, checked once per frame.
#[derive(Debug, Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn raise(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Pulls frames, runs them through the detector, draws the survivors and hands the result to a
/// sink, one frame at a time until the source ends or a stop is requested.
pub struct FrameLoop<E: InferenceEngine, K: FrameSink> {
    detector: Detector<E>,
    renderer: Renderer,
    sink: K,
    control: Option<Receiver<ControlCommand>>,
    stop: StopSignal,
    max_frames: Option<u64>,
    state: LoopState,
}

impl<E: InferenceEngine, K: FrameSink> FrameLoop<E, K> {
    pub fn new(detector: Detector<E>, renderer: Renderer, sink: K) -> Self {
        Self {
            detector,
            renderer,
            sink,
            control: None,
            stop: StopSignal::default(),
            max_frames: None,
            state: LoopState::Stopped(StopReason::EndOfStream),
        }
    }

    pub fn with_control(mut self, control: Receiver<ControlCommand>) -> Self {
        self.control = Some(control);
        self
    }

    pub fn with_stop_signal(mut self, stop: StopSignal) -> Self {
        self.stop = stop;
        self
    }

    pub fn with_max_frames(mut self, max_frames: Option<u64>) -> Self {
        self.max_frames = max_frames;
        self
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn detector(&self) -> &Detector<E> {
        &self.detector
    }

    pub fn detector_mut(&mut self) -> &mut Detector<E> {
        &mut self.detector
    }

    pub fn sink(&self) -> &K {
        &self.sink
    }

    pub fn into_parts(self) -> (Detector<E>, Renderer, K) {
        (self.detector, self.renderer, self.sink)
    }

    /// Runs the loop on the calling thread.
    pub fn run<S: FrameSource>(&mut self, mut source: S) -> Result<LoopSummary> {
        log::info!("Reading frames from {} into {}", source.describe(), self.sink.name());
        self.drive(|| source.produce_frame())
    }

    /// Runs acquisition on a background thread feeding a small bounded queue, and everything
    /// else on the calling thread. Frames are displayed in capture order and the detector is
    /// only ever used from this thread.
    ///
    /// `open_source` runs on the capture thread, so the source itself does not need to be `Send`.
    /// An error opening it is returned before any frame is processed.
    pub fn run_pipelined<F, S>(&mut self, open_source: F) -> Result<LoopSummary>
    where
        F: FnOnce() -> Result<S> + Send + 'static,
        S: FrameSource + 'static,
    {
        let (frame_tx, frame_rx) = crossbeam_channel::bounded::<Result<Option<RgbImage>>>(PIPELINE_DEPTH);
        let (ready_tx, ready_rx) = crossbeam_channel::bounded::<Result<String>>(1);
        let producer_stop = StopSignal::default();
        let stop_flag = producer_stop.clone();

        let producer = thread::Builder::new()
            .name("frame-producer".to_string())
            .spawn(move || {
                let mut source = match open_source() {
                    Ok(source) => {
                        let _ = ready_tx.send(Ok(source.describe()));
                        source
                    }
                    Err(err) => {
                        let _ = ready_tx.send(Err(err));
                        return;
                    }
                };
                while !stop_flag.is_raised() {
                    let frame = source.produce_frame();
                    let last = !matches!(frame, Ok(Some(_)));
                    if frame_tx.send(frame).is_err() || last {
                        break;
                    }
                }
            })
            .map_err(|e| DetectError::Capture(format!("failed to start capture thread: {}", e)))?;

        let opened = ready_rx.recv()
            .unwrap_or_else(|_| Err(DetectError::Capture("capture thread exited during startup".to_string())));
        let description = match opened {
            Ok(description) => description,
            Err(err) => {
                let _ = producer.join();
                return Err(err);
            }
        };
        log::info!("Reading frames from {} into {} (pipelined)", description, self.sink.name());

        let result = self.drive(|| frame_rx.recv().unwrap_or(Ok(None)));

        producer_stop.raise();
        drop(frame_rx);
        if producer.join().is_err() {
            log::error!("Capture thread panicked");
        }
        result
    }

    fn drive(&mut self, mut acquire: impl FnMut() -> Result<Option<RgbImage>>) -> Result<LoopSummary> {
        self.state = LoopState::Running;
        let mut frames = 0u64;
        let mut detections = 0u64;
        let mut skipped_frames = 0u64;

        let stop_reason = loop {
            if self.max_frames.is_some_and(|max| frames + skipped_frames >= max) {
                break StopReason::MaxFrames;
            }

            let mut frame = match acquire() {
                Ok(Some(frame)) => frame,
                Ok(None) => break StopReason::EndOfStream,
                Err(err) => {
                    log::warn!("Frame acquisition failed, ending stream: {}", err);
                    break StopReason::EndOfStream;
                }
            };

            match self.process_frame(&mut frame) {
                Ok(drawn) => {
                    frames += 1;
                    detections += drawn as u64;
                }
                Err(err) if err.is_per_frame() => {
                    log::warn!("Skipping frame: {}", err);
                    skipped_frames += 1;
                }
                Err(err) => {
                    self.state = LoopState::Stopped(StopReason::EndOfStream);
                    return Err(err);
                }
            }

            if let Some(reason) = self.poll_stop() {
                break reason;
            }
        };

        self.state = LoopState::Stopped(stop_reason);
        let summary = LoopSummary { frames, detections, skipped_frames, stop_reason };
        log::info!(
            "Loop stopped ({:?}): {} frames, {} detections, {} skipped",
            stop_reason, frames, detections, skipped_frames
        );
        if let Some(avg) = self.detector.infer_time().avg() {
            log::info!("Average detection time: {:.2?}", avg);
        }
        Ok(summary)
    }

    /// detect -> render -> display for one frame. Returns how many detections were drawn.
    fn process_frame(&mut self, frame: &mut RgbImage) -> Result<usize> {
        let start = Instant::now();
        let labels = self.detector.labels().current();
        let found = self.detector.detect(frame)?;
        let drawn = self.renderer.render_frame(frame, &found, &labels);
        self.sink.display(frame)?;
        log::debug!("Frame done in {:.2?}: {} detections", start.elapsed(), drawn);
        Ok(drawn)
    }

    /// Applies queued control commands and reports whether the loop should stop.
    fn poll_stop(&mut self) -> Option<StopReason> {
        if self.stop.is_raised() {
            return Some(StopReason::StopSignal);
        }
        let Some(control) = &self.control else {
            return None;
        };

        let mut pending = Vec::new();
        let mut disconnected = false;
        loop {
            match control.try_recv() {
                Ok(cmd) => pending.push(cmd),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    disconnected = true;
                    break;
                }
            }
        }
        if disconnected {
            self.control = None;
        }

        for cmd in pending {
            log::debug!("Applying {:?}", cmd);
            if self.detector.apply(cmd) {
                return Some(StopReason::StopSignal);
            }
        }
        None
    }
}
