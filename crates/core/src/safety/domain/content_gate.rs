use crate::safety::domain::content_filter::ContentFilter;
use crate::shared::error::BoxError;
use crate::shared::frame::Frame;

/// Decides per frame whether the swap may run at all.
///
/// An unsafe frame is never modified: callers pass it through untouched.
/// There is no switch to disable the gate.
pub struct ContentGate {
    filter: Box<dyn ContentFilter>,
}

impl ContentGate {
    pub fn new(filter: Box<dyn ContentFilter>) -> Self {
        Self { filter }
    }

    /// One classifier call. Failures propagate; they never count as safe.
    pub fn check(&self, frame: &Frame) -> Result<bool, BoxError> {
        let safe = self.filter.is_safe(frame)?;
        if !safe {
            log::warn!("Frame {} blocked by content filter", frame.index());
        }
        Ok(safe)
    }
}
