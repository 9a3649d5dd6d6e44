use std::path::Path;

use crate::shared::error::BoxError;
use crate::shared::frame::Frame;
use crate::shared::video_metadata::VideoMetadata;

/// Abstracts video encoding so the pipeline can write output without
/// depending on a specific codec library.
///
/// Frames must be written in display order; the writer never reorders.
pub trait VideoWriter: Send {
    fn open(&mut self, path: &Path, metadata: &VideoMetadata) -> Result<(), BoxError>;

    fn write(&mut self, frame: &Frame) -> Result<(), BoxError>;

    /// Flushes the encoder and finalizes the container.
    fn close(&mut self) -> Result<(), BoxError>;
}
