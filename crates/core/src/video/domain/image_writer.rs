use std::path::Path;

use crate::shared::error::BoxError;
use crate::shared::frame::Frame;

/// Writes a single frame to an image file.
pub trait ImageWriter: Send + Sync {
    /// Output encoding follows the extension of `path`.
    fn write(&self, path: &Path, frame: &Frame) -> Result<(), BoxError>;
}
