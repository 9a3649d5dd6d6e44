use crate::shared::error::BoxError;
use crate::shared::frame::Frame;

/// Random-access source of input frames.
///
/// Frames are addressed by their position in the input sequence; the
/// returned [`Frame`] carries that position as its index. `read` may be
/// called from several worker threads at once.
pub trait FrameSource: Send + Sync {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read(&self, index: usize) -> Result<Frame, BoxError>;
}
