/// ArcFace identity embeddings via ONNX Runtime.
///
/// Faces are aligned onto the canonical 112×112 layout from their landmarks
/// (bounding box when landmarks are incomplete) before inference.
use std::path::Path;
use std::sync::Mutex;

use crate::detection::infrastructure::execution_provider::{build_session, ExecutionDevice};
use crate::shared::embedding::Embedding;
use crate::shared::error::BoxError;
use crate::shared::face::FaceDescriptor;
use crate::shared::face_alignment::{alignment_for, warp_crop};
use crate::shared::frame::Frame;

const INPUT_SIZE: usize = 112;
const NORM_MEAN: f32 = 127.5;
const NORM_STD: f32 = 127.5;

pub struct ArcFaceEmbedder {
    session: Mutex<ort::session::Session>,
}

impl ArcFaceEmbedder {
    pub fn new(model_path: &Path, device: ExecutionDevice) -> Result<Self, BoxError> {
        Ok(Self {
            session: Mutex::new(build_session(model_path, device)?),
        })
    }

    /// Unit-length embedding of `face` as it appears in `frame`.
    pub fn embed(&self, frame: &Frame, face: &FaceDescriptor) -> Result<Embedding, BoxError> {
        let transform =
            alignment_for(face, INPUT_SIZE as u32).ok_or("Cannot align degenerate face box")?;
        let crop = warp_crop(frame, &transform, INPUT_SIZE as u32)
            .ok_or("Cannot align degenerate face box")?;

        let input_value = ort::value::Tensor::from_array(preprocess(&crop))?;
        let mut session = self
            .session
            .lock()
            .map_err(|e| format!("Lock poisoned: {e}"))?;
        let outputs = session.run(ort::inputs![input_value])?;
        let embedding_array = outputs[0].try_extract_array::<f32>()?;
        let values: Vec<f32> = embedding_array.iter().copied().collect();
        if values.is_empty() {
            return Err("ArcFace model produced an empty embedding".into());
        }
        Ok(Embedding::new(values))
    }
}

/// Normalize an aligned 112x112 RGB crop into NCHW layout.
fn preprocess(crop: &[u8]) -> ndarray::Array4<f32> {
    let mut tensor = ndarray::Array4::<f32>::zeros((1, 3, INPUT_SIZE, INPUT_SIZE));
    for y in 0..INPUT_SIZE {
        for x in 0..INPUT_SIZE {
            let offset = (y * INPUT_SIZE + x) * 3;
            for c in 0..3 {
                tensor[[0, c, y, x]] = (crop[offset + c] as f32 - NORM_MEAN) / NORM_STD;
            }
        }
    }
    tensor
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_preprocess_shape() {
        let tensor = preprocess(&vec![0u8; INPUT_SIZE * INPUT_SIZE * 3]);
        assert_eq!(tensor.shape(), &[1, 3, 112, 112]);
    }

    #[test]
    fn test_preprocess_normalization_range() {
        let mut crop = vec![0u8; INPUT_SIZE * INPUT_SIZE * 3];
        crop[0] = 255;
        crop[4] = 127;
        let tensor = preprocess(&crop);
        assert_relative_eq!(tensor[[0, 0, 0, 0]], 1.0);
        assert_relative_eq!(tensor[[0, 1, 0, 1]], (127.0 - 127.5) / 127.5);
        assert_relative_eq!(tensor[[0, 2, 0, 0]], -1.0);
    }

    #[test]
    fn test_missing_model_fails_to_load() {
        assert!(ArcFaceEmbedder::new(Path::new("/nonexistent/w600k_r50.onnx"), ExecutionDevice::Cpu).is_err());
    }
}
