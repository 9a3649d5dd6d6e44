use thiserror::Error;

/// Boxed error used across collaborator traits and use cases.
///
/// `Send + Sync` so failures can cross the swap worker pool.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Error, Debug)]
pub enum FaceSwapError {
    #[error("face not found: {0}")]
    FaceNotFound(String),
    #[error("unsupported container format: {0}")]
    UnsupportedFormat(String),
    #[error("invalid frame range {start}..{end} for {total} frames")]
    InvalidFrameRange {
        start: usize,
        end: usize,
        total: usize,
    },
    #[error("no frames found in {0}")]
    NoFrames(String),
    #[error("frame {index} is {actual_width}x{actual_height}, expected {expected_width}x{expected_height}")]
    FrameSizeMismatch {
        index: usize,
        expected_width: u32,
        expected_height: u32,
        actual_width: u32,
        actual_height: u32,
    },
}
