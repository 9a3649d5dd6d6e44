use std::ops::Range;

use crate::shared::error::BoxError;
use crate::shared::frame::Frame;

/// Produces the finished frame for one input index (read, gate, swap).
/// Shared by reference across every worker.
pub type FrameTask<'a> = dyn Fn(usize) -> Result<Frame, BoxError> + Sync + 'a;

/// Receives finished frames strictly in index order on the calling thread.
pub type FrameSink<'a> = dyn FnMut(Frame) -> Result<(), BoxError> + 'a;

/// Abstracts how the per-frame swap phase is scheduled.
///
/// This is a port (application-layer interface). Infrastructure provides
/// a worker pool for CPU inference and an in-order loop for accelerators;
/// both must hand the sink the same frames in the same order.
pub trait FrameExecutor: Send {
    /// Runs `task` for every index in `indices` and feeds each result to
    /// `sink` in ascending index order. Stops at the first error.
    fn execute(
        &self,
        indices: Range<usize>,
        task: &FrameTask<'_>,
        sink: &mut FrameSink<'_>,
    ) -> Result<(), BoxError>;
}
