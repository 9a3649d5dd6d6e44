use crate::video::domain::container_format::ContainerFormat;

/// Output stream parameters, fixed when the writer is opened.
#[derive(Clone, Debug, PartialEq)]
pub struct VideoMetadata {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    pub total_frames: usize,
    pub format: ContainerFormat,
}

impl VideoMetadata {
    /// Frame rate as the integral timebase denominator used by the encoder.
    /// Non-positive rates fall back to 30.
    pub fn timebase_fps(&self) -> i32 {
        let fps = self.fps.round() as i32;
        if fps <= 0 {
            30
        } else {
            fps
        }
    }
}
