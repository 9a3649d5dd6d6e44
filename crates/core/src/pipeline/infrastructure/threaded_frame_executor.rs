use std::collections::BTreeMap;
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use crate::pipeline::frame_executor::{FrameExecutor, FrameSink, FrameTask};
use crate::shared::constants::{DEFAULT_WORKERS, SPILL_FRAME_DIGITS, SPILL_FRAME_PREFIX};
use crate::shared::error::BoxError;
use crate::shared::frame::Frame;

/// Runs the swap phase on a fixed pool of worker threads.
///
/// Layout: `job queue → N workers → done channel → main [reorder] → sink`
///
/// Workers finish in any order; the calling thread buffers results by
/// index and releases them to the sink strictly in sequence. With a spill
/// directory, workers persist finished frames as PNG files and only indices
/// travel through the reorder buffer, so memory stays bounded on long runs.
pub struct ThreadedFrameExecutor {
    workers: usize,
    spill: bool,
}

impl ThreadedFrameExecutor {
    pub fn new(workers: usize) -> Self {
        Self {
            workers: workers.max(1),
            spill: false,
        }
    }

    /// Persist finished frames to a transient directory instead of holding
    /// them in memory. The directory is removed when the run ends.
    pub fn with_spill_directory(mut self, spill: bool) -> Self {
        self.spill = spill;
        self
    }

    pub fn workers(&self) -> usize {
        self.workers
    }
}

impl Default for ThreadedFrameExecutor {
    fn default() -> Self {
        Self::new(DEFAULT_WORKERS)
    }
}

/// A finished frame as it travels from a worker to the reorder buffer.
enum Finished {
    InMemory(Frame),
    Spilled { index: usize, path: PathBuf },
}

impl Finished {
    fn into_frame(self) -> Result<Frame, BoxError> {
        match self {
            Finished::InMemory(frame) => Ok(frame),
            Finished::Spilled { index, path } => {
                let image = image::open(&path)
                    .map_err(|e| format!("Failed to reload {}: {e}", path.display()))?
                    .to_rgb8();
                // Best effort; the directory goes away with the run anyway.
                let _ = std::fs::remove_file(&path);
                Ok(Frame::from_rgb_image(image, index))
            }
        }
    }
}

type Completion = Result<(usize, Finished), BoxError>;

impl FrameExecutor for ThreadedFrameExecutor {
    fn execute(
        &self,
        indices: Range<usize>,
        task: &FrameTask<'_>,
        sink: &mut FrameSink<'_>,
    ) -> Result<(), BoxError> {
        if indices.is_empty() {
            return Ok(());
        }

        let spill_dir = if self.spill {
            let dir = tempfile::Builder::new().prefix("faceswap-").tempdir()?;
            log::debug!("Spilling frames to {}", dir.path().display());
            Some(dir)
        } else {
            None
        };
        let spill_path = spill_dir.as_ref().map(|d| d.path());

        let (job_tx, job_rx) = crossbeam_channel::unbounded::<usize>();
        for index in indices.clone() {
            job_tx
                .send(index)
                .map_err(|_| "Job queue closed unexpectedly")?;
        }
        drop(job_tx);

        let (done_tx, done_rx) = crossbeam_channel::bounded::<Completion>(self.workers * 2);
        let failed = AtomicBool::new(false);

        std::thread::scope(|scope| {
            let handles: Vec<_> = (0..self.workers)
                .map(|_| {
                    let job_rx = job_rx.clone();
                    let done_tx = done_tx.clone();
                    let failed = &failed;
                    scope.spawn(move || run_worker(job_rx, done_tx, task, spill_path, failed))
                })
                .collect();
            drop(done_tx);

            let emitted = emit_in_order(indices, done_rx, sink);
            if emitted.is_err() {
                failed.store(true, Ordering::SeqCst);
            }

            let mut panicked = false;
            for handle in handles {
                panicked |= handle.join().is_err();
            }
            if panicked {
                return Err("Swap worker panicked".into());
            }
            emitted
        })
    }
}

fn run_worker(
    job_rx: crossbeam_channel::Receiver<usize>,
    done_tx: crossbeam_channel::Sender<Completion>,
    task: &FrameTask<'_>,
    spill_dir: Option<&Path>,
    failed: &AtomicBool,
) {
    for index in job_rx {
        if failed.load(Ordering::SeqCst) {
            break;
        }

        let result = task(index).and_then(|frame| match spill_dir {
            Some(dir) => spill_frame(dir, &frame).map(|path| Finished::Spilled { index, path }),
            None => Ok(Finished::InMemory(frame)),
        });

        let is_err = result.is_err();
        if is_err {
            failed.store(true, Ordering::SeqCst);
        }
        if done_tx.send(result.map(|f| (index, f))).is_err() || is_err {
            break;
        }
    }
}

/// Drains the done channel, releasing frames to `sink` in index order.
///
/// Consumes the receiver so that an early return closes the channel and
/// unblocks any worker waiting to send.
fn emit_in_order(
    indices: Range<usize>,
    done_rx: crossbeam_channel::Receiver<Completion>,
    sink: &mut FrameSink<'_>,
) -> Result<(), BoxError> {
    let mut pending: BTreeMap<usize, Finished> = BTreeMap::new();
    let mut next = indices.start;

    while next < indices.end {
        let (index, finished) = done_rx
            .recv()
            .map_err(|_| "Swap workers stopped before every frame was processed")??;
        pending.insert(index, finished);

        while let Some(finished) = pending.remove(&next) {
            sink(finished.into_frame()?)?;
            next += 1;
        }
    }
    Ok(())
}

fn spill_file_name(index: usize) -> String {
    format!(
        "{SPILL_FRAME_PREFIX}{index:0width$}.png",
        width = SPILL_FRAME_DIGITS
    )
}

fn spill_frame(dir: &Path, frame: &Frame) -> Result<PathBuf, BoxError> {
    let path = dir.join(spill_file_name(frame.index()));
    frame
        .to_rgb_image()
        .ok_or("Failed to create image from frame data")?
        .save(&path)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::sync::Mutex;
    use std::time::Duration;

    fn tagged_frame(index: usize) -> Frame {
        Frame::new(vec![(index * 10) as u8; 2 * 2 * 3], 2, 2, 3, index)
    }

    /// Later indices finish first: index i sleeps (n - i) ms.
    fn reversed_latency_task(n: usize) -> impl Fn(usize) -> Result<Frame, BoxError> + Sync {
        move |i| {
            std::thread::sleep(Duration::from_millis(((n - i) * 3) as u64));
            Ok(tagged_frame(i))
        }
    }

    #[rstest]
    #[case(false)]
    #[case(true)]
    fn test_output_order_under_shuffled_completion(#[case] spill: bool) {
        let executor = ThreadedFrameExecutor::new(4).with_spill_directory(spill);
        let task = reversed_latency_task(20);
        let mut seen = Vec::new();

        executor
            .execute(0..20, &task, &mut |frame| {
                seen.push((frame.index(), frame.data()[0]));
                Ok(())
            })
            .unwrap();

        let expected: Vec<_> = (0..20).map(|i| (i, (i * 10) as u8)).collect();
        assert_eq!(seen, expected);
    }

    #[test]
    fn test_runs_tasks_on_several_threads() {
        let threads = Mutex::new(std::collections::HashSet::new());
        let executor = ThreadedFrameExecutor::new(4);

        executor
            .execute(
                0..16,
                &|i| {
                    threads.lock().unwrap().insert(std::thread::current().id());
                    std::thread::sleep(Duration::from_millis(5));
                    Ok(tagged_frame(i))
                },
                &mut |_| Ok(()),
            )
            .unwrap();

        assert!(threads.lock().unwrap().len() > 1);
    }

    #[test]
    fn test_sub_range_emits_only_that_range() {
        let mut seen = Vec::new();
        ThreadedFrameExecutor::new(3)
            .execute(2..8, &|i| Ok(tagged_frame(i)), &mut |frame| {
                seen.push(frame.index());
                Ok(())
            })
            .unwrap();
        assert_eq!(seen, vec![2, 3, 4, 5, 6, 7]);
    }

    #[test]
    fn test_empty_range_never_calls_task() {
        ThreadedFrameExecutor::new(2)
            .execute(
                5..5,
                &|_| panic!("task must not run"),
                &mut |_| panic!("sink must not run"),
            )
            .unwrap();
    }

    #[test]
    fn test_task_error_is_returned_and_stops_emission() {
        let mut seen = Vec::new();
        let result = ThreadedFrameExecutor::new(2).execute(
            0..50,
            &|i| {
                if i == 3 {
                    Err("swap failed".into())
                } else {
                    Ok(tagged_frame(i))
                }
            },
            &mut |frame| {
                seen.push(frame.index());
                Ok(())
            },
        );

        assert_eq!(result.unwrap_err().to_string(), "swap failed");
        assert!(seen.iter().all(|&i| i < 3));
    }

    #[test]
    fn test_sink_error_stops_workers() {
        let result = ThreadedFrameExecutor::new(2).execute(
            0..100,
            &|i| Ok(tagged_frame(i)),
            &mut |_| Err("writer closed".into()),
        );
        assert_eq!(result.unwrap_err().to_string(), "writer closed");
    }

    #[test]
    fn test_spill_file_name_is_zero_padded() {
        assert_eq!(spill_file_name(42), "frame_000042.png");
    }

    #[test]
    fn test_spilled_frame_reloads_exactly() {
        let dir = tempfile::tempdir().unwrap();
        let mut frame = Frame::new(vec![0u8; 3 * 2 * 3], 3, 2, 3, 7);
        frame.data_mut()[5] = 201;

        let path = spill_frame(dir.path(), &frame).unwrap();
        let reloaded = Finished::Spilled { index: 7, path: path.clone() }
            .into_frame()
            .unwrap();

        assert_eq!(reloaded, frame);
        assert!(!path.exists());
    }

    #[test]
    fn test_worker_count_is_at_least_one() {
        assert_eq!(ThreadedFrameExecutor::new(0).workers(), 1);
        assert_eq!(ThreadedFrameExecutor::default().workers(), DEFAULT_WORKERS);
    }
}
