use crate::detection::domain::frame_selection::FrameSelection;
use crate::shared::error::BoxError;
use crate::shared::face::SourceFace;
use crate::shared::frame::Frame;
use crate::swapping::domain::face_swapper::FaceSwapper;

/// One frame's unit of swap work, with everything decided up front.
pub struct SwapJob<'a> {
    pub frame_index: usize,
    pub frame: Frame,
    pub selection: &'a FrameSelection,
    pub source: &'a SourceFace,
}

/// Composites the source identity onto every selected face of a frame.
pub struct SwapExecutor {
    swapper: Box<dyn FaceSwapper>,
}

impl SwapExecutor {
    pub fn new(swapper: Box<dyn FaceSwapper>) -> Self {
        Self { swapper }
    }

    /// Swaps the faces in selection order; each swap sees the output of the
    /// previous one. An empty selection returns `frame` unchanged.
    pub fn apply(
        &self,
        frame: Frame,
        selection: &FrameSelection,
        source: &SourceFace,
    ) -> Result<Frame, BoxError> {
        selection
            .faces()
            .iter()
            .try_fold(frame, |current, target| self.swapper.swap(&current, target, source))
    }

    pub fn run(&self, job: SwapJob<'_>) -> Result<Frame, BoxError> {
        log::trace!(
            "Swapping {} face(s) in frame {}",
            job.selection.len(),
            job.frame_index
        );
        self.apply(job.frame, job.selection, job.source)
    }
}
