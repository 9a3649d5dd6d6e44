use std::ops::Range;

use crate::pipeline::frame_executor::{FrameExecutor, FrameSink, FrameTask};
use crate::shared::error::BoxError;

/// Processes frames one at a time on the calling thread.
///
/// Used when inference runs on an accelerator, where the session itself is
/// the bottleneck and concurrent callers would only contend for it.
pub struct SequentialFrameExecutor;

impl SequentialFrameExecutor {
    pub fn new() -> Self {
        Self
    }
}

impl Default for SequentialFrameExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameExecutor for SequentialFrameExecutor {
    fn execute(
        &self,
        indices: Range<usize>,
        task: &FrameTask<'_>,
        sink: &mut FrameSink<'_>,
    ) -> Result<(), BoxError> {
        for index in indices {
            sink(task(index)?)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::frame::Frame;

    #[test]
    fn test_emits_every_index_in_order() {
        let mut seen = Vec::new();
        SequentialFrameExecutor::new()
            .execute(
                3..7,
                &|i| Ok(Frame::new(vec![i as u8; 3], 1, 1, 3, i)),
                &mut |frame| {
                    seen.push(frame.index());
                    Ok(())
                },
            )
            .unwrap();
        assert_eq!(seen, vec![3, 4, 5, 6]);
    }

    #[test]
    fn test_stops_at_first_task_error() {
        let mut seen = Vec::new();
        let result = SequentialFrameExecutor::new().execute(
            0..5,
            &|i| {
                if i == 2 {
                    Err("boom".into())
                } else {
                    Ok(Frame::new(vec![0; 3], 1, 1, 3, i))
                }
            },
            &mut |frame| {
                seen.push(frame.index());
                Ok(())
            },
        );
        assert_eq!(result.unwrap_err().to_string(), "boom");
        assert_eq!(seen, vec![0, 1]);
    }

    #[test]
    fn test_sink_error_propagates() {
        let result = SequentialFrameExecutor::new().execute(
            0..3,
            &|i| Ok(Frame::new(vec![0; 3], 1, 1, 3, i)),
            &mut |_| Err("disk full".into()),
        );
        assert_eq!(result.unwrap_err().to_string(), "disk full");
    }
}
