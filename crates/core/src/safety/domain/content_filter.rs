use crate::shared::error::BoxError;
use crate::shared::frame::Frame;

/// Domain interface for the explicit-content classifier.
///
/// `Ok(true)` means the frame may be modified. Implementations are shared by
/// every swap worker, so they must tolerate concurrent calls.
pub trait ContentFilter: Send + Sync {
    fn is_safe(&self, frame: &Frame) -> Result<bool, BoxError>;
}
