use crate::shared::error::BoxError;
use crate::shared::face::{FaceDescriptor, SourceFace};
use crate::shared::frame::Frame;

/// Domain interface for the generative face-swap model.
///
/// Returns a frame of the same size with `target` replaced by the `source`
/// identity. Shared by every swap worker.
pub trait FaceSwapper: Send + Sync {
    fn swap(
        &self,
        frame: &Frame,
        target: &FaceDescriptor,
        source: &SourceFace,
    ) -> Result<Frame, BoxError>;
}
