use std::fmt;
use std::path::Path;
use std::str::FromStr;

use crate::shared::error::FaceSwapError;

/// Output containers the writer can produce. Both carry MPEG-4 Part 2 video.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ContainerFormat {
    #[default]
    Mp4,
    Avi,
}

impl ContainerFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ContainerFormat::Mp4 => "mp4",
            ContainerFormat::Avi => "avi",
        }
    }

    /// Short name of the libavformat muxer.
    pub fn ffmpeg_name(&self) -> &'static str {
        match self {
            ContainerFormat::Mp4 => "mp4",
            ContainerFormat::Avi => "avi",
        }
    }

    /// Derives the format from the extension of `path`.
    pub fn from_path(path: &Path) -> Result<Self, FaceSwapError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .ok_or_else(|| FaceSwapError::UnsupportedFormat(path.display().to_string()))?;
        ext.parse()
    }
}

impl FromStr for ContainerFormat {
    type Err = FaceSwapError;

    /// Accepts `mp4` / `avi` with or without a leading dot, in any case.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim_start_matches('.').to_ascii_lowercase();
        match name.as_str() {
            "mp4" => Ok(ContainerFormat::Mp4),
            "avi" => Ok(ContainerFormat::Avi),
            _ => Err(FaceSwapError::UnsupportedFormat(s.to_string())),
        }
    }
}

impl fmt::Display for ContainerFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, ".{}", self.extension())
    }
}
