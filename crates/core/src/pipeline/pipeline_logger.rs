use std::collections::BTreeMap;
use std::time::Instant;

pub const STAGE_DETECT: &str = "detect";
pub const STAGE_GATE: &str = "gate";
pub const STAGE_SWAP: &str = "swap";
pub const STAGE_WRITE: &str = "write";

/// Observer for swap runs: progress, per-stage timings, metrics and an
/// end-of-run summary.
///
/// Use cases report through this trait so the CLI and tests can watch a run
/// without the orchestration code knowing where the output goes.
pub trait PipelineLogger: Send {
    fn progress(&mut self, current: usize, total: usize);

    /// Time spent in `stage` for one frame.
    fn timing(&mut self, stage: &str, duration_ms: f64);

    /// A sampled value such as faces selected per frame.
    fn metric(&mut self, name: &str, value: f64);

    fn info(&mut self, message: &str);

    fn summary(&self) {}
}

/// Discards everything.
pub struct NullPipelineLogger;

impl PipelineLogger for NullPipelineLogger {
    fn progress(&mut self, _current: usize, _total: usize) {}
    fn timing(&mut self, _stage: &str, _duration_ms: f64) {}
    fn metric(&mut self, _name: &str, _value: f64) {}
    fn info(&mut self, _message: &str) {}
}

/// Logs through the `log` facade and aggregates timings for the summary.
///
/// Progress lines are emitted every `throttle_frames` frames and on the
/// last one.
pub struct StdoutPipelineLogger {
    throttle_frames: usize,
    timings: BTreeMap<String, Vec<f64>>,
    metrics: BTreeMap<String, Vec<f64>>,
    started: Instant,
    total_frames: usize,
    messages: Vec<String>,
}

impl StdoutPipelineLogger {
    pub fn new(throttle_frames: usize) -> Self {
        Self {
            throttle_frames: throttle_frames.max(1),
            timings: BTreeMap::new(),
            metrics: BTreeMap::new(),
            started: Instant::now(),
            total_frames: 0,
            messages: Vec::new(),
        }
    }

    /// `None` until at least one timing or metric is recorded.
    pub fn summary_string(&self) -> Option<String> {
        if self.timings.is_empty() && self.metrics.is_empty() {
            return None;
        }

        let elapsed_ms = self.started.elapsed().as_secs_f64() * 1000.0;
        let frames = self.total_frames;
        let mut lines = vec![format!(
            "Swap summary ({frames} frames, {:.1}s total):",
            elapsed_ms / 1000.0
        )];

        for (stage, durations) in &self.timings {
            let total_ms: f64 = durations.iter().sum();
            let avg_ms = mean(durations);
            let share = if elapsed_ms > 0.0 {
                total_ms / elapsed_ms * 100.0
            } else {
                0.0
            };
            lines.push(format!(
                "  {stage:8}: {:5} calls  avg {avg_ms:7.1}ms  total {total_ms:8.0}ms  ({share:4.1}%)",
                durations.len()
            ));
        }

        for (name, values) in &self.metrics {
            lines.push(format!("  {name}: avg {:.1}", mean(values)));
        }

        if frames > 0 && elapsed_ms > 0.0 {
            let fps = frames as f64 / (elapsed_ms / 1000.0);
            lines.push(format!("  Throughput: {fps:.1} fps"));
        }

        Some(lines.join("\n"))
    }

    pub fn timings_for(&self, stage: &str) -> Option<&[f64]> {
        self.timings.get(stage).map(Vec::as_slice)
    }

    pub fn metrics_for(&self, name: &str) -> Option<&[f64]> {
        self.metrics.get(name).map(Vec::as_slice)
    }

    pub fn messages(&self) -> &[String] {
        &self.messages
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

impl Default for StdoutPipelineLogger {
    fn default() -> Self {
        Self::new(10)
    }
}

impl PipelineLogger for StdoutPipelineLogger {
    fn progress(&mut self, current: usize, total: usize) {
        self.total_frames = total;
        if total > 0 && (current % self.throttle_frames == 0 || current == total) {
            let pct = current as f64 / total as f64 * 100.0;
            log::info!("Swapping: {current}/{total} frames ({pct:.1}%)");
        }
    }

    fn timing(&mut self, stage: &str, duration_ms: f64) {
        self.timings
            .entry(stage.to_string())
            .or_default()
            .push(duration_ms);
    }

    fn metric(&mut self, name: &str, value: f64) {
        self.metrics.entry(name.to_string()).or_default().push(value);
    }

    fn info(&mut self, message: &str) {
        self.messages.push(message.to_string());
        log::info!("{message}");
    }

    fn summary(&self) {
        if let Some(text) = self.summary_string() {
            log::info!("\n\n{text}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_null_logger_accepts_everything() {
        let mut logger = NullPipelineLogger;
        logger.progress(1, 10);
        logger.timing(STAGE_SWAP, 5.0);
        logger.metric("faces_selected", 1.0);
        logger.info("hello");
        logger.summary();
    }

    #[test]
    fn test_timings_are_kept_per_stage() {
        let mut logger = StdoutPipelineLogger::new(10);
        logger.timing(STAGE_DETECT, 20.0);
        logger.timing(STAGE_DETECT, 30.0);
        logger.timing(STAGE_SWAP, 5.0);

        assert_eq!(logger.timings_for(STAGE_DETECT), Some(&[20.0, 30.0][..]));
        assert_eq!(logger.timings_for(STAGE_SWAP), Some(&[5.0][..]));
        assert!(logger.timings_for(STAGE_GATE).is_none());
    }

    #[test]
    fn test_metric_average() {
        let mut logger = StdoutPipelineLogger::new(10);
        logger.metric("faces_selected", 1.0);
        logger.metric("faces_selected", 2.0);

        assert_relative_eq!(mean(logger.metrics_for("faces_selected").unwrap()), 1.5);
    }

    #[test]
    fn test_summary_lists_stages_in_name_order() {
        let mut logger = StdoutPipelineLogger::new(10);
        logger.progress(10, 10);
        logger.timing(STAGE_WRITE, 1.0);
        logger.timing(STAGE_DETECT, 20.0);
        logger.timing(STAGE_SWAP, 8.0);

        let summary = logger.summary_string().unwrap();
        assert!(summary.starts_with("Swap summary (10 frames"));
        let detect = summary.find("detect").unwrap();
        let swap = summary.find("swap  ").unwrap();
        let write = summary.find("write").unwrap();
        assert!(detect < swap && swap < write);
    }

    #[test]
    fn test_summary_includes_metrics_and_throughput() {
        let mut logger = StdoutPipelineLogger::new(10);
        logger.progress(5, 5);
        logger.metric("faces_selected", 3.0);
        logger.metric("faces_selected", 4.0);

        let summary = logger.summary_string().unwrap();
        assert!(summary.contains("faces_selected: avg 3.5"));
        assert!(summary.contains("fps"));
    }

    #[test]
    fn test_summary_empty_without_data() {
        assert!(StdoutPipelineLogger::new(10).summary_string().is_none());
    }

    #[test]
    fn test_progress_tracks_total() {
        let mut logger = StdoutPipelineLogger::new(4);
        for i in 1..=9 {
            logger.progress(i, 9);
        }
        assert_eq!(logger.total_frames, 9);
    }

    #[test]
    fn test_info_keeps_messages() {
        let mut logger = StdoutPipelineLogger::default();
        logger.info("Tracking 12 frames");
        assert_eq!(logger.messages(), &["Tracking 12 frames".to_string()]);
        assert_eq!(logger.throttle_frames, 10);
    }

    #[test]
    fn test_zero_throttle_is_clamped() {
        assert_eq!(StdoutPipelineLogger::new(0).throttle_frames, 1);
    }
}
