use std::ops::Range;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use crate::detection::domain::face_detector::FaceDetector;
use crate::detection::domain::frame_selection::FrameSelection;
use crate::detection::domain::identity_tracker::{
    FaceSelectionPolicy, IdentityTracker, TrackState, TrackerConfig,
};
use crate::pipeline::frame_executor::{FrameExecutor, FrameTask};
use crate::pipeline::pipeline_logger::{
    NullPipelineLogger, PipelineLogger, STAGE_DETECT, STAGE_GATE, STAGE_SWAP, STAGE_WRITE,
};
use crate::pipeline::progress_counter::{ProgressCounter, ProgressFn};
use crate::safety::domain::content_gate::ContentGate;
use crate::shared::constants::DEFAULT_FPS;
use crate::shared::error::{BoxError, FaceSwapError};
use crate::shared::face::SourceFace;
use crate::shared::frame::Frame;
use crate::shared::target_selector::TargetSelector;
use crate::shared::video_metadata::VideoMetadata;
use crate::swapping::domain::swap_executor::{SwapExecutor, SwapJob};
use crate::video::domain::container_format::ContainerFormat;
use crate::video::domain::frame_source::FrameSource;
use crate::video::domain::video_writer::VideoWriter;

#[derive(Clone, Debug, PartialEq)]
pub struct SwapVideoOptions {
    pub policy: FaceSelectionPolicy,
    pub tracker: TrackerConfig,
    pub selector: TargetSelector,
    /// First frame to swap; earlier frames are copied through.
    pub start_frame: Option<usize>,
    /// One past the last frame to swap; later frames are copied through.
    pub end_frame: Option<usize>,
    pub fps: f64,
    pub format: ContainerFormat,
}

impl Default for SwapVideoOptions {
    fn default() -> Self {
        Self {
            policy: FaceSelectionPolicy::default(),
            tracker: TrackerConfig::default(),
            selector: TargetSelector::None,
            start_frame: None,
            end_frame: None,
            fps: DEFAULT_FPS,
            format: ContainerFormat::default(),
        }
    }
}

/// Per-run counts returned by [`SwapVideoUseCase::execute`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SwapVideoReport {
    pub frames_written: usize,
    pub frames_swapped: usize,
    /// Frames the content gate refused; written unmodified.
    pub frames_blocked: usize,
    /// Frames in the swap range where no face was selected.
    pub frames_without_target: usize,
}

/// Swaps the source identity into every frame of a sequence.
///
/// Runs in two phases. Detection and identity tracking walk the whole swap
/// range on the calling thread first, so every frame's selection is fixed
/// before any swap starts. The injected [`FrameExecutor`] then gates and
/// swaps each frame and the results are written in input order. Frames
/// outside the range are copied through at their positions.
pub struct SwapVideoUseCase {
    detector: Box<dyn FaceDetector>,
    gate: ContentGate,
    swap_executor: SwapExecutor,
    writer: Box<dyn VideoWriter>,
    executor: Box<dyn FrameExecutor>,
    options: SwapVideoOptions,
    logger: Mutex<Box<dyn PipelineLogger>>,
    on_progress: Option<Box<ProgressFn>>,
}

impl SwapVideoUseCase {
    pub fn new(
        detector: Box<dyn FaceDetector>,
        gate: ContentGate,
        swap_executor: SwapExecutor,
        writer: Box<dyn VideoWriter>,
        executor: Box<dyn FrameExecutor>,
        options: SwapVideoOptions,
    ) -> Self {
        Self {
            detector,
            gate,
            swap_executor,
            writer,
            executor,
            options,
            logger: Mutex::new(Box::new(NullPipelineLogger)),
            on_progress: None,
        }
    }

    pub fn with_logger(mut self, logger: Box<dyn PipelineLogger>) -> Self {
        self.logger = Mutex::new(logger);
        self
    }

    /// Called with `(completed, total)` after each frame of the swap range.
    pub fn with_progress(mut self, on_progress: Box<ProgressFn>) -> Self {
        self.on_progress = Some(on_progress);
        self
    }

    pub fn execute(
        &mut self,
        source: &dyn FrameSource,
        source_face: &SourceFace,
        output_path: &Path,
    ) -> Result<SwapVideoReport, BoxError> {
        let total = source.len();
        if total == 0 {
            return Err(FaceSwapError::NoFrames("input sequence".into()).into());
        }
        let range = resolve_range(self.options.start_frame, self.options.end_frame, total)?;

        let Self {
            detector,
            gate,
            swap_executor,
            writer,
            executor,
            options,
            logger,
            on_progress,
        } = self;

        lock(logger).info(&format!(
            "Tracking frames {}..{} of {total}",
            range.start, range.end
        ));
        let selections = select_targets(detector.as_mut(), source, range.clone(), options, logger)?;
        let frames_without_target = selections.iter().filter(|s| s.is_empty()).count();

        let first = source.read(0)?;
        let metadata = VideoMetadata {
            width: first.width(),
            height: first.height(),
            fps: options.fps,
            total_frames: total,
            format: options.format,
        };
        writer.open(output_path, &metadata)?;

        let swapped = AtomicUsize::new(0);
        let blocked = AtomicUsize::new(0);
        let counter = ProgressCounter::new(range.len(), on_progress.as_deref());
        let range_start = range.start;
        let gate: &ContentGate = gate;
        let swap_executor: &SwapExecutor = swap_executor;
        let logger: &Mutex<Box<dyn PipelineLogger>> = logger;

        let task = |index: usize| -> Result<Frame, BoxError> {
            let frame = source.read(index)?;
            let selection = &selections[index - range_start];

            let started = Instant::now();
            let safe = gate.check(&frame)?;
            let gate_ms = elapsed_ms(started);

            let (frame, swap_ms) = if !safe {
                blocked.fetch_add(1, Ordering::Relaxed);
                (frame, None)
            } else if selection.is_empty() {
                (frame, None)
            } else {
                let started = Instant::now();
                let out = swap_executor.run(SwapJob {
                    frame_index: index,
                    frame,
                    selection,
                    source: source_face,
                })?;
                swapped.fetch_add(1, Ordering::Relaxed);
                (out, Some(elapsed_ms(started)))
            };

            let completed = counter.increment();
            let mut logger = lock(logger);
            logger.timing(STAGE_GATE, gate_ms);
            if let Some(ms) = swap_ms {
                logger.timing(STAGE_SWAP, ms);
            }
            logger.progress(completed, counter.total());
            Ok(frame)
        };

        let written = write_frames(
            source,
            range,
            writer.as_mut(),
            executor.as_ref(),
            &task,
            logger,
        );
        let frames_written = match written {
            Ok(count) => count,
            Err(e) => {
                if let Err(close_err) = writer.close() {
                    log::warn!("Failed to close writer after error: {close_err}");
                }
                return Err(e);
            }
        };
        writer.close()?;

        let report = SwapVideoReport {
            frames_written,
            frames_swapped: swapped.into_inner(),
            frames_blocked: blocked.into_inner(),
            frames_without_target,
        };
        let logger = lock(logger);
        logger.summary();
        log::info!(
            "Wrote {} frames ({} swapped, {} blocked) to {}",
            report.frames_written,
            report.frames_swapped,
            report.frames_blocked,
            output_path.display()
        );
        Ok(report)
    }
}

/// Resolves optional bounds into `start..end` within `0..total`.
pub fn resolve_range(
    start: Option<usize>,
    end: Option<usize>,
    total: usize,
) -> Result<Range<usize>, FaceSwapError> {
    let start = start.unwrap_or(0);
    let end = end.unwrap_or(total);
    if start > end || end > total {
        return Err(FaceSwapError::InvalidFrameRange { start, end, total });
    }
    Ok(start..end)
}

/// Phase 1: detect every frame of `range` and decide what to swap.
fn select_targets(
    detector: &mut dyn FaceDetector,
    source: &dyn FrameSource,
    range: Range<usize>,
    options: &SwapVideoOptions,
    logger: &Mutex<Box<dyn PipelineLogger>>,
) -> Result<Vec<FrameSelection>, BoxError> {
    let mut selections = Vec::with_capacity(range.len());
    let mut tracker: Option<IdentityTracker> = None;
    let mut state = TrackState::Cold;

    for (offset, index) in range.enumerate() {
        let frame = source.read(index)?;
        let started = Instant::now();
        let faces = detector.detect(&frame)?;
        lock(logger).timing(STAGE_DETECT, elapsed_ms(started));

        let selection = match options.policy {
            FaceSelectionPolicy::EveryFace => FrameSelection::new(faces),
            FaceSelectionPolicy::Track => {
                let tracker = tracker.get_or_insert_with(|| {
                    IdentityTracker::new(
                        options.tracker.clone(),
                        &options.selector,
                        frame.width(),
                        frame.height(),
                    )
                });
                let (next, selection) = tracker.step(std::mem::take(&mut state), offset, &faces);
                state = next;
                selection
            }
        };

        if selection.is_empty() {
            log::debug!("No target face in frame {index}");
        }
        lock(logger).metric("faces_selected", selection.len() as f64);
        selections.push(selection);
    }
    Ok(selections)
}

/// Phase 2: copies the frames before `range`, swaps the range through
/// `executor`, copies the rest. Returns the number of frames written.
fn write_frames(
    source: &dyn FrameSource,
    range: Range<usize>,
    writer: &mut dyn VideoWriter,
    executor: &dyn FrameExecutor,
    task: &FrameTask<'_>,
    logger: &Mutex<Box<dyn PipelineLogger>>,
) -> Result<usize, BoxError> {
    let mut written = 0;

    for index in 0..range.start {
        writer.write(&source.read(index)?)?;
        written += 1;
    }

    executor.execute(range.clone(), task, &mut |frame| {
        let started = Instant::now();
        writer.write(&frame)?;
        lock(logger).timing(STAGE_WRITE, elapsed_ms(started));
        written += 1;
        Ok(())
    })?;

    for index in range.end..source.len() {
        writer.write(&source.read(index)?)?;
        written += 1;
    }
    Ok(written)
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn elapsed_ms(started: Instant) -> f64 {
    started.elapsed().as_secs_f64() * 1000.0
}
