use std::path::{Path, PathBuf};

use crate::shared::error::BoxError;
use crate::shared::frame::Frame;
use crate::video::domain::frame_source::FrameSource;

/// Adapts a single image file to the [`FrameSource`] interface as a
/// one-frame sequence.
///
/// Decoding goes through ffmpeg, which is significantly faster than the
/// pure-Rust `image` crate for large images (e.g. 4032x3024 JPEG). The file
/// is decoded on each `read`, so the reader holds no ffmpeg state.
pub struct ImageFileReader {
    path: PathBuf,
}

impl ImageFileReader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl FrameSource for ImageFileReader {
    fn len(&self) -> usize {
        1
    }

    fn read(&self, index: usize) -> Result<Frame, BoxError> {
        if index != 0 {
            return Err(format!("ImageFileReader: frame {index} out of range").into());
        }
        decode_image(&self.path, 0)
    }
}

/// Decodes the first video frame of `path` into an RGB [`Frame`] tagged
/// with `index`.
pub fn decode_image(path: &Path, index: usize) -> Result<Frame, BoxError> {
    ffmpeg_next::init()?;

    let mut ictx = ffmpeg_next::format::input(path)
        .map_err(|e| format!("Failed to open {}: {e}", path.display()))?;

    let stream = ictx
        .streams()
        .best(ffmpeg_next::media::Type::Video)
        .ok_or_else(|| format!("No image data found in {}", path.display()))?;
    let stream_index = stream.index();

    let codec_ctx = ffmpeg_next::codec::context::Context::from_parameters(stream.parameters())?;
    let mut decoder = codec_ctx.decoder().video()?;

    let width = decoder.width();
    let height = decoder.height();

    let mut scaler = ffmpeg_next::software::scaling::Context::get(
        decoder.format(),
        width,
        height,
        ffmpeg_next::format::Pixel::RGB24,
        width,
        height,
        ffmpeg_next::software::scaling::Flags::BILINEAR,
    )?;

    for (stream, packet) in ictx.packets() {
        if stream.index() != stream_index {
            continue;
        }
        decoder.send_packet(&packet)?;
        if let Some(pixels) = try_receive_pixels(&mut decoder, &mut scaler, width, height)? {
            return Ok(Frame::new(pixels, width, height, 3, index));
        }
    }

    // Flush decoder for formats that buffer the single frame
    let _ = decoder.send_eof();
    let pixels = try_receive_pixels(&mut decoder, &mut scaler, width, height)?
        .ok_or_else(|| format!("Failed to decode {}", path.display()))?;
    Ok(Frame::new(pixels, width, height, 3, index))
}

fn try_receive_pixels(
    decoder: &mut ffmpeg_next::decoder::Video,
    scaler: &mut ffmpeg_next::software::scaling::Context,
    width: u32,
    height: u32,
) -> Result<Option<Vec<u8>>, BoxError> {
    let mut decoded = ffmpeg_next::util::frame::video::Video::empty();
    if decoder.receive_frame(&mut decoded).is_err() {
        return Ok(None);
    }
    let mut rgb_frame = ffmpeg_next::util::frame::video::Video::empty();
    scaler.run(&decoded, &mut rgb_frame)?;
    Ok(Some(extract_rgb_pixels(&rgb_frame, width, height)))
}

fn extract_rgb_pixels(
    rgb_frame: &ffmpeg_next::util::frame::video::Video,
    width: u32,
    height: u32,
) -> Vec<u8> {
    let stride = rgb_frame.stride(0);
    let data = rgb_frame.data(0);
    let row_bytes = width as usize * 3;

    let mut pixels = Vec::with_capacity(row_bytes * height as usize);
    for row in 0..height as usize {
        let row_start = row * stride;
        pixels.extend_from_slice(&data[row_start..row_start + row_bytes]);
    }
    pixels
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_test_image(dir: &Path, width: u32, height: u32) -> PathBuf {
        let path = dir.join("test.png");
        let img = image::RgbImage::from_pixel(width, height, image::Rgb([50, 100, 200]));
        img.save(&path).unwrap();
        path
    }

    #[test]
    fn test_single_frame_source() {
        let dir = tempfile::tempdir().unwrap();
        let reader = ImageFileReader::new(write_test_image(dir.path(), 100, 80));

        assert_eq!(reader.len(), 1);
        assert!(!reader.is_empty());

        let frame = reader.read(0).unwrap();
        assert_eq!(frame.index(), 0);
        assert_eq!((frame.width(), frame.height()), (100, 80));
        assert_eq!(frame.channels(), 3);
        assert_eq!(&frame.data()[..3], &[50, 100, 200]);
    }

    #[test]
    fn test_read_out_of_range() {
        let dir = tempfile::tempdir().unwrap();
        let reader = ImageFileReader::new(write_test_image(dir.path(), 10, 10));
        assert!(reader.read(1).is_err());
    }

    #[test]
    fn test_decode_tags_requested_index() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_test_image(dir.path(), 10, 10);
        assert_eq!(decode_image(&path, 42).unwrap().index(), 42);
    }

    #[test]
    fn test_nonexistent_file_errors() {
        let reader = ImageFileReader::new("/nonexistent/test.png");
        assert!(reader.read(0).is_err());
    }
}
