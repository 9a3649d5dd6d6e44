mod settings;

use std::path::{Path, PathBuf};
use std::process;

use clap::Parser;

use faceswap_core::detection::domain::face_detector::FaceDetector;
use faceswap_core::detection::domain::identity_tracker::{FaceSelectionPolicy, TrackerConfig};
use faceswap_core::detection::infrastructure::execution_provider::ExecutionDevice;
use faceswap_core::detection::infrastructure::onnx_face_analyzer::{
    FaceAnalyzerModels, OnnxFaceAnalyzer,
};
use faceswap_core::pipeline::frame_executor::FrameExecutor;
use faceswap_core::pipeline::infrastructure::sequential_frame_executor::SequentialFrameExecutor;
use faceswap_core::pipeline::infrastructure::threaded_frame_executor::ThreadedFrameExecutor;
use faceswap_core::pipeline::pipeline_logger::StdoutPipelineLogger;
use faceswap_core::pipeline::resolve_source_face_use_case::ResolveSourceFaceUseCase;
use faceswap_core::pipeline::swap_image_use_case::{
    SwapImageOptions, SwapImageOutcome, SwapImageUseCase,
};
use faceswap_core::pipeline::swap_video_use_case::{SwapVideoOptions, SwapVideoUseCase};
use faceswap_core::safety::domain::content_gate::ContentGate;
use faceswap_core::safety::infrastructure::onnx_explicit_content_filter::OnnxExplicitContentFilter;
use faceswap_core::shared::constants::IMAGE_EXTENSIONS;
use faceswap_core::shared::error::BoxError;
use faceswap_core::shared::face::SourceFace;
use faceswap_core::shared::target_selector::{CanvasRect, TargetSelector};
use faceswap_core::swapping::domain::swap_executor::SwapExecutor;
use faceswap_core::swapping::infrastructure::onnx_inswapper::OnnxInswapper;
use faceswap_core::video::domain::container_format::ContainerFormat;
use faceswap_core::video::domain::frame_source::FrameSource;
use faceswap_core::video::infrastructure::ffmpeg_writer::FfmpegWriter;
use faceswap_core::video::infrastructure::image_file_reader::ImageFileReader;
use faceswap_core::video::infrastructure::image_file_writer::ImageFileWriter;
use faceswap_core::video::infrastructure::image_sequence_reader::ImageSequenceReader;

use settings::{ModelPaths, Settings};

/// Swap a face from a source image into a target image or frame sequence.
#[derive(Parser)]
#[command(name = "faceswap")]
struct Cli {
    /// Image containing the face to swap in.
    source: PathBuf,

    /// Target image, or a directory of frame images.
    target: PathBuf,

    /// Output image, or .mp4/.avi file when the target is a directory.
    output: PathBuf,

    /// Target face region on the first frame: x,y,width,height.
    #[arg(long, value_delimiter = ',')]
    target_region: Option<Vec<f64>>,

    /// Source face region: x,y,width,height.
    #[arg(long, value_delimiter = ',')]
    source_region: Option<Vec<f64>>,

    /// Size of the canvas the regions were drawn on: width,height.
    /// Without it, regions are in image pixels.
    #[arg(long, value_delimiter = ',')]
    canvas: Option<Vec<f64>>,

    /// Swap every detected face instead of tracking one person.
    #[arg(long)]
    every_face: bool,

    /// Swap every face matching the tracked person in a frame.
    #[arg(long)]
    multiple: bool,

    /// Minimum cosine similarity for a face to continue the track (0.0-1.0].
    #[arg(long)]
    similarity: Option<f64>,

    /// Keep only the most recent N embeddings of the tracked person.
    #[arg(long)]
    history_cap: Option<usize>,

    /// First frame to swap (earlier frames are copied).
    #[arg(long)]
    start_frame: Option<usize>,

    /// Frame after the last one to swap (later frames are copied).
    #[arg(long)]
    end_frame: Option<usize>,

    /// Output frame rate.
    #[arg(long)]
    fps: Option<f64>,

    /// Inference device: cpu or accelerator.
    #[arg(long)]
    device: Option<String>,

    /// Worker threads for CPU swapping.
    #[arg(long)]
    workers: Option<usize>,

    /// Keep finished frames on disk instead of in memory.
    #[arg(long)]
    spill: bool,

    /// Explicit-content score at which a frame is left unswapped (0.0-1.0).
    #[arg(long)]
    content_threshold: Option<f64>,

    /// Directory holding the ONNX models.
    #[arg(long)]
    models_dir: Option<PathBuf>,

    /// Projection matrix for the swap model latent.
    #[arg(long)]
    emap: Option<PathBuf>,

    /// Settings file (default: the user config directory).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Store the effective settings back to the settings file.
    #[arg(long)]
    save_config: bool,
}

/// CLI flags merged over the settings file.
struct RunConfig {
    device: ExecutionDevice,
    models: ModelPaths,
    emap: Option<PathBuf>,
    tracker: TrackerConfig,
    policy: FaceSelectionPolicy,
    workers: usize,
    content_threshold: f64,
    fps: f64,
}

impl RunConfig {
    /// Range checks on the effective values, wherever they came from.
    fn validate(&self) -> Result<(), BoxError> {
        let similarity = self.tracker.similarity_threshold;
        if !(similarity > 0.0 && similarity <= 1.0) {
            return Err(format!("Similarity must be in (0.0, 1.0], got {similarity}").into());
        }
        if !(0.0..=1.0).contains(&self.content_threshold) {
            return Err(format!(
                "Content threshold must be between 0.0 and 1.0, got {}",
                self.content_threshold
            )
            .into());
        }
        if self.workers == 0 {
            return Err("Workers must be at least 1".into());
        }
        if self.tracker.history_capacity == Some(0) {
            return Err("History cap must be at least 1".into());
        }
        if self.fps.is_nan() || self.fps <= 0.0 {
            return Err(format!("FPS must be positive, got {}", self.fps).into());
        }
        Ok(())
    }
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), BoxError> {
    let cli = Cli::parse();
    validate(&cli)?;

    let settings = Settings::load(cli.config.as_deref())?;
    let config = merge(&cli, &settings)?;
    if cli.save_config {
        save_settings(&cli, settings)?;
    }
    let target_selector = parse_selector(cli.target_region.as_deref(), cli.canvas.as_deref());
    let source_selector = parse_selector(cli.source_region.as_deref(), cli.canvas.as_deref());

    let (source_face, detector) = resolve_source(&cli.source, &source_selector, &config)?;

    let gate = ContentGate::new(Box::new(OnnxExplicitContentFilter::new(
        &config.models.content_filter,
        config.device,
        config.content_threshold,
    )?));
    let swap_executor = SwapExecutor::new(Box::new(OnnxInswapper::new(
        &config.models.swapper,
        config.emap.as_deref(),
        config.device,
    )?));

    if cli.target.is_dir() {
        let options = SwapVideoOptions {
            policy: config.policy,
            tracker: config.tracker.clone(),
            selector: target_selector,
            start_frame: cli.start_frame,
            end_frame: cli.end_frame,
            fps: config.fps,
            format: ContainerFormat::from_path(&cli.output)?,
        };
        let executor = build_executor(config.device, config.workers, cli.spill);
        run_video(
            &cli.target,
            &cli.output,
            &source_face,
            detector,
            gate,
            swap_executor,
            executor,
            options,
        )
    } else {
        let options = SwapImageOptions {
            policy: config.policy,
            tracker: config.tracker.clone(),
            selector: target_selector,
        };
        run_image(
            &cli.target,
            &cli.output,
            &source_face,
            detector,
            gate,
            swap_executor,
            options,
        )
    }
}

/// Detects the donor face and hands back the loaded detector for the
/// target pass.
fn resolve_source(
    source: &Path,
    selector: &TargetSelector,
    config: &RunConfig,
) -> Result<(SourceFace, Box<dyn FaceDetector>), BoxError> {
    log::info!("Loading face models on {}", config.device);
    let analyzer = OnnxFaceAnalyzer::new(
        &FaceAnalyzerModels {
            detector: &config.models.detector,
            embedder: &config.models.embedder,
            gender: config.models.gender.as_deref(),
        },
        config.device,
    )?;

    let frame = ImageFileReader::new(source).read(0)?;
    let mut resolver = ResolveSourceFaceUseCase::new(Box::new(analyzer));
    let source_face = resolver.execute(&frame, selector)?;
    Ok((source_face, resolver.into_detector()))
}

fn run_image(
    target: &Path,
    output: &Path,
    source_face: &SourceFace,
    detector: Box<dyn FaceDetector>,
    gate: ContentGate,
    swap_executor: SwapExecutor,
    options: SwapImageOptions,
) -> Result<(), BoxError> {
    let mut use_case = SwapImageUseCase::new(
        detector,
        gate,
        swap_executor,
        Box::new(ImageFileWriter::new()),
        options,
    );
    match use_case.execute(&ImageFileReader::new(target), source_face, output)? {
        SwapImageOutcome::Swapped { faces } => {
            log::info!("Swapped {faces} face(s); output written to {}", output.display())
        }
        SwapImageOutcome::Blocked => {
            log::warn!(
                "Target blocked by content filter; original written to {}",
                output.display()
            )
        }
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn run_video(
    target: &Path,
    output: &Path,
    source_face: &SourceFace,
    detector: Box<dyn FaceDetector>,
    gate: ContentGate,
    swap_executor: SwapExecutor,
    executor: Box<dyn FrameExecutor>,
    options: SwapVideoOptions,
) -> Result<(), BoxError> {
    let frames = ImageSequenceReader::open(target)?;
    log::info!("Found {} frames in {}", frames.len(), target.display());

    let mut use_case = SwapVideoUseCase::new(
        detector,
        gate,
        swap_executor,
        Box::new(FfmpegWriter::new()),
        executor,
        options,
    )
    .with_logger(Box::new(StdoutPipelineLogger::default()))
    .with_progress(Box::new(|current: usize, total: usize| {
        eprint!("\rSwapping frame {current}/{total}");
    }));

    let report = use_case.execute(&frames, source_face, output)?;
    eprintln!();
    log::info!(
        "Output written to {} ({} of {} frames swapped)",
        output.display(),
        report.frames_swapped,
        report.frames_written
    );
    Ok(())
}

/// Accelerators run one frame at a time on the calling thread; the CPU path
/// uses the worker pool.
fn build_executor(device: ExecutionDevice, workers: usize, spill: bool) -> Box<dyn FrameExecutor> {
    if device.is_accelerator() {
        if spill {
            log::warn!("--spill only applies to the CPU worker pool; ignoring");
        }
        log::info!("Swapping sequentially on the accelerator");
        Box::new(SequentialFrameExecutor::new())
    } else {
        log::info!("Swapping on {workers} CPU worker(s)");
        Box::new(ThreadedFrameExecutor::new(workers).with_spill_directory(spill))
    }
}

fn merge(cli: &Cli, settings: &Settings) -> Result<RunConfig, BoxError> {
    let device: ExecutionDevice = cli
        .device
        .as_deref()
        .unwrap_or(settings.device.as_str())
        .parse()?;

    let models_dir = cli
        .models_dir
        .clone()
        .or_else(|| settings.models_dir())
        .ok_or("No models directory: pass --models-dir or set models_dir in the settings")?;

    let policy = if cli.every_face {
        FaceSelectionPolicy::EveryFace
    } else {
        FaceSelectionPolicy::Track
    };

    let config = RunConfig {
        device,
        models: ModelPaths::in_dir(&models_dir),
        emap: cli.emap.clone().or_else(|| settings.emap.clone()),
        tracker: TrackerConfig {
            similarity_threshold: cli.similarity.unwrap_or(settings.similarity_threshold),
            allow_multiple_per_frame: cli.multiple,
            history_capacity: cli.history_cap.or(settings.history_capacity),
            ..TrackerConfig::default()
        },
        policy,
        workers: cli.workers.unwrap_or(settings.workers),
        content_threshold: cli.content_threshold.unwrap_or(settings.content_threshold),
        fps: cli.fps.unwrap_or(settings.fps),
    };
    config.validate()?;
    Ok(config)
}

/// Folds the persistable flags into `settings` and writes them out.
fn save_settings(cli: &Cli, settings: Settings) -> Result<(), BoxError> {
    let path = cli
        .config
        .clone()
        .or_else(Settings::config_path)
        .ok_or("No config directory available for --save-config")?;
    let updated = Settings {
        models_dir: cli.models_dir.clone().or(settings.models_dir),
        emap: cli.emap.clone().or(settings.emap),
        device: cli.device.clone().unwrap_or(settings.device),
        similarity_threshold: cli.similarity.unwrap_or(settings.similarity_threshold),
        history_capacity: cli.history_cap.or(settings.history_capacity),
        workers: cli.workers.unwrap_or(settings.workers),
        content_threshold: cli.content_threshold.unwrap_or(settings.content_threshold),
        fps: cli.fps.unwrap_or(settings.fps),
    };
    updated.save(&path)?;
    log::info!("Settings saved to {}", path.display());
    Ok(())
}

fn parse_selector(region: Option<&[f64]>, canvas: Option<&[f64]>) -> TargetSelector {
    let Some(&[x, y, width, height]) = region else {
        return TargetSelector::None;
    };
    let (canvas_width, canvas_height) = match canvas {
        Some(&[w, h]) => (w, h),
        _ => (0.0, 0.0),
    };
    TargetSelector::Region(CanvasRect {
        x,
        y,
        width,
        height,
        canvas_width,
        canvas_height,
    })
}

fn validate(cli: &Cli) -> Result<(), BoxError> {
    if !cli.source.is_file() {
        return Err(format!("Source image not found: {}", cli.source.display()).into());
    }
    if !is_image(&cli.source) {
        return Err(format!("Source must be an image, got {}", cli.source.display()).into());
    }
    if !cli.target.exists() {
        return Err(format!("Target not found: {}", cli.target.display()).into());
    }
    if cli.target.is_dir() {
        ContainerFormat::from_path(&cli.output)?;
    } else {
        if !is_image(&cli.target) {
            return Err(format!(
                "Target must be an image or a directory of frames, got {}",
                cli.target.display()
            )
            .into());
        }
        if !is_image(&cli.output) {
            return Err(format!(
                "Output for an image target must be an image, got {}",
                cli.output.display()
            )
            .into());
        }
    }
    for (flag, region) in [
        ("--target-region", &cli.target_region),
        ("--source-region", &cli.source_region),
    ] {
        if let Some(values) = region {
            if values.len() != 4 {
                return Err(
                    format!("{flag} takes x,y,width,height, got {} values", values.len()).into(),
                );
            }
        }
    }
    if let Some(canvas) = &cli.canvas {
        if canvas.len() != 2 || canvas.iter().any(|v| *v <= 0.0) {
            return Err("--canvas takes two positive values: width,height".into());
        }
    }
    if cli.every_face && cli.target_region.is_some() {
        return Err("--every-face and --target-region are mutually exclusive".into());
    }
    if let (Some(start), Some(end)) = (cli.start_frame, cli.end_frame) {
        if start > end {
            return Err(format!("Start frame {start} is after end frame {end}").into());
        }
    }
    Ok(())
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}
