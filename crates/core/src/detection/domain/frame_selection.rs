use crate::shared::face::FaceDescriptor;

/// The faces to swap in one frame, in compositing order.
///
/// Empty means the frame passes through unswapped.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FrameSelection(Vec<FaceDescriptor>);

impl FrameSelection {
    pub fn new(faces: Vec<FaceDescriptor>) -> Self {
        Self(faces)
    }

    pub fn empty() -> Self {
        Self(Vec::new())
    }

    pub fn faces(&self) -> &[FaceDescriptor] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
