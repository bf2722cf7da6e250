use std::io::{self, BufRead};
use std::process::ExitCode;
use std::thread;
use anyhow::Context;
use clap::Parser;
use crossbeam_channel::Sender;
use bvr_live::capture::open_source;
use bvr_live::common::{InferenceDevice, ModelConfig};
use bvr_live::data::{control_channel, ControlCommand};
use bvr_live::display::DirectorySink;
use bvr_live::drawing::Renderer;
use bvr_live::frame_loop::{FrameLoop, LoopSummary, StopSignal};
use bvr_live::{init_detector, DetectError};

#[derive(Parser, Debug)]
#[command(author, version, about = "Live object detection on a camera or image stream", long_about = None)]
struct Args {
    /// JSON model configuration; explicit flags override its values
    #[arg(long, value_name = "FILE")]
    config: Option<String>,

    /// ONNX detector weights
    #[arg(long, value_name = "FILE")]
    model: Option<String>,

    /// Class names, one per line
    #[arg(long, value_name = "FILE")]
    labels: Option<String>,

    /// Frame source: /dev/videoN, v4l2:///dev/videoN, an image file or a directory of images
    #[arg(long, default_value = "/dev/video0", value_name = "SOURCE")]
    input: String,

    /// Directory receiving annotated frames
    #[arg(long, default_value = "frames", value_name = "DIR")]
    output: String,

    /// Keep only the newest frame as latest.jpg
    #[arg(long)]
    latest_only: bool,

    /// cpu or cuda
    #[arg(long, value_name = "DEVICE")]
    device: Option<String>,

    #[arg(long, default_value_t = 0, value_name = "ID")]
    device_id: usize,

    /// Confidence threshold (0.0 - 1.0)
    #[arg(long, value_name = "THRESHOLD")]
    confidence: Option<f32>,

    /// NMS IoU threshold (0.0 - 1.0)
    #[arg(long, value_name = "THRESHOLD")]
    nms_threshold: Option<f32>,

    /// Network input width
    #[arg(long)]
    width: Option<u32>,

    /// Network input height
    #[arg(long)]
    height: Option<u32>,

    #[arg(long, default_value_t = 640)]
    capture_width: u32,

    #[arg(long, default_value_t = 480)]
    capture_height: u32,

    /// Stop after this many frames
    #[arg(long, value_name = "COUNT")]
    max_frames: Option<u64>,

    /// Capture on a separate thread while the previous frame is processed
    #[arg(long)]
    pipelined: bool,

    /// TrueType font for labels
    #[arg(long, value_name = "FILE")]
    font: Option<String>,

    /// Colour boxes by class instead of a single colour
    #[arg(long)]
    class_colours: bool,

    /// ONNX Runtime shared library to load
    #[arg(long, value_name = "FILE")]
    ort_lib: Option<String>,

    /// Log filter, e.g. info or bvr_live=trace. Overrides RUST_LOG
    #[arg(long, value_name = "FILTER")]
    log_level: Option<String>,
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.log_level.as_deref());

    match run(args) {
        Ok(summary) => {
            log::info!("Done: {} frames, {} detections", summary.frames, summary.detections);
            ExitCode::SUCCESS
        }
        Err(err) => {
            log::error!("{:#}", err);
            let code = err.downcast_ref::<DetectError>().map(DetectError::exit_code).unwrap_or(1);
            ExitCode::from(code)
        }
    }
}

fn init_logging(level: Option<&str>) {
    match level {
        Some(filter) => env_logger::Builder::new().parse_filters(filter).init(),
        None => env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init(),
    }
}

fn build_config(args: &Args) -> anyhow::Result<ModelConfig> {
    let mut config = match &args.config {
        Some(path) => ModelConfig::from_json_file(path)?,
        None => ModelConfig::default(),
    };

    if let Some(model) = &args.model {
        config.weights_path = model.clone();
    }
    if let Some(labels) = &args.labels {
        config.labels_path = labels.clone();
    }
    if let Some(device) = &args.device {
        let device = InferenceDevice::from_str(device, args.device_id).ok_or_else(|| {
            DetectError::Config(format!(
                "unknown device '{}', expected one of {:?}", device, InferenceDevice::all_inference_devices()
            ))
        })?;
        config.set_device_type(device);
    }
    if let Some(confidence) = args.confidence {
        config.conf_threshold = confidence;
    }
    if let Some(nms) = args.nms_threshold {
        config.nms_threshold = nms;
    }
    if let Some(width) = args.width {
        config.width = width;
    }
    if let Some(height) = args.height {
        config.height = height;
    }
    if args.font.is_some() {
        config.font_path = args.font.clone();
    }
    if args.ort_lib.is_some() {
        config.ort_lib_path = args.ort_lib.clone();
    }

    config.validate()?;
    Ok(config)
}

fn run(args: Args) -> anyhow::Result<LoopSummary> {
    let config = build_config(&args)?;
    log::info!("Model configuration:\n{}", config);

    let detector = init_detector(&config)?;
    let renderer = Renderer::from_font_path(config.font_path.as_deref()).with_class_colours(args.class_colours);
    let sink = DirectorySink::new(&args.output, args.latest_only)?;

    let stop = StopSignal::default();
    let handler_stop = stop.clone();
    if let Err(err) = ctrlc::set_handler(move || {
        log::info!("Interrupt received, stopping after the current frame");
        handler_stop.raise();
    }) {
        log::warn!("Failed to install Ctrl-C handler: {}", err);
    }

    let control = control_channel();
    spawn_stdin_reader(control.ctl_tx.clone());

    let mut frame_loop = FrameLoop::new(detector, renderer, sink)
        .with_control(control.ctl_rx)
        .with_stop_signal(stop)
        .with_max_frames(args.max_frames);

    let (input, w, h) = (args.input.clone(), args.capture_width, args.capture_height);
    let summary = if args.pipelined {
        frame_loop.run_pipelined(move || open_source(&input, w, h))?
    } else {
        let source = open_source(&input, w, h)?;
        frame_loop.run(source)?
    };
    Ok(summary)
}

/// Feeds control commands typed on stdin to the loop. Ends quietly on EOF.
fn spawn_stdin_reader(ctl_tx: Sender<ControlCommand>) {
    let spawned = thread::Builder::new()
        .name("stdin-control".to_string())
        .spawn(move || {
            for line in io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                match ControlCommand::parse(&line) {
                    Ok(Some(cmd)) => {
                        if ctl_tx.send(cmd).is_err() {
                            break;
                        }
                    }
                    Ok(None) => {}
                    Err(err) => log::warn!("{}", err),
                }
            }
        })
        .context("failed to start stdin reader");
    if let Err(err) = spawned {
        log::warn!("{:#}", err);
    }
}
