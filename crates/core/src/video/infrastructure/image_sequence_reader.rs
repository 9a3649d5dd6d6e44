use std::path::{Path, PathBuf};

use crate::shared::constants::IMAGE_EXTENSIONS;
use crate::shared::error::{BoxError, FaceSwapError};
use crate::shared::frame::Frame;
use crate::video::domain::frame_source::FrameSource;
use crate::video::infrastructure::image_file_reader::decode_image;

/// A directory of still images read as an ordered frame sequence.
///
/// Files are kept when their extension is a known image type and ordered
/// lexicographically by file name, so zero-padded names sort as frames.
pub struct ImageSequenceReader {
    files: Vec<PathBuf>,
}

impl ImageSequenceReader {
    pub fn open(dir: &Path) -> Result<Self, BoxError> {
        let mut files = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if path.is_file() && is_image_file(&path) {
                files.push(path);
            }
        }
        if files.is_empty() {
            return Err(FaceSwapError::NoFrames(dir.display().to_string()).into());
        }
        files.sort();

        log::debug!("Found {} frames in {}", files.len(), dir.display());
        Ok(Self { files })
    }

    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }
}

impl FrameSource for ImageSequenceReader {
    fn len(&self) -> usize {
        self.files.len()
    }

    fn read(&self, index: usize) -> Result<Frame, BoxError> {
        let path = self
            .files
            .get(index)
            .ok_or_else(|| format!("ImageSequenceReader: frame {index} out of range"))?;
        decode_image(path, index)
    }
}

fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| {
            let e = e.to_ascii_lowercase();
            IMAGE_EXTENSIONS.contains(&e.as_str())
        })
        .unwrap_or(false)
}
