use crate::shared::error::BoxError;
use crate::shared::face::FaceDescriptor;
use crate::shared::frame::Frame;

/// Domain interface for the detection + recognition collaborator.
///
/// Returns every face in the frame in the detector's native order, which
/// the tracker treats as priority order. An empty vector is a normal result.
pub trait FaceDetector: Send {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<FaceDescriptor>, BoxError>;
}
