use std::sync::Mutex;

/// Progress callback: `(completed, total)`.
pub type ProgressFn = dyn Fn(usize, usize) + Send + Sync;

/// Counts completed swap jobs across workers.
///
/// The callback runs while the count is locked, so observers see strictly
/// increasing values even when workers finish concurrently.
pub struct ProgressCounter<'a> {
    completed: Mutex<usize>,
    total: usize,
    on_progress: Option<&'a ProgressFn>,
}

impl<'a> ProgressCounter<'a> {
    pub fn new(total: usize, on_progress: Option<&'a ProgressFn>) -> Self {
        Self {
            completed: Mutex::new(0),
            total,
            on_progress,
        }
    }

    /// Marks one job done and returns the new count.
    pub fn increment(&self) -> usize {
        let mut completed = self
            .completed
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *completed += 1;
        if let Some(callback) = &self.on_progress {
            callback(*completed, self.total);
        }
        *completed
    }

    pub fn completed(&self) -> usize {
        *self
            .completed
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn total(&self) -> usize {
        self.total
    }
}
