/// Gender from the InsightFace `genderage` model.
///
/// The face is cropped around its box center at 1.5× the larger box side,
/// resized to 96×96 and fed as raw RGB values. The first two outputs are
/// female/male scores; the third (age) is ignored.
use std::path::Path;
use std::sync::Mutex;

use crate::detection::infrastructure::execution_provider::{build_session, ExecutionDevice};
use crate::detection::infrastructure::math::argmax;
use crate::shared::error::BoxError;
use crate::shared::face::{FaceDescriptor, Gender};
use crate::shared::face_alignment::{warp_crop, SimilarityTransform};
use crate::shared::frame::Frame;

const INPUT_SIZE: usize = 96;
const CROP_MARGIN: f64 = 1.5;

pub struct OnnxGenderClassifier {
    session: Mutex<ort::session::Session>,
}

impl OnnxGenderClassifier {
    pub fn new(model_path: &Path, device: ExecutionDevice) -> Result<Self, BoxError> {
        Ok(Self {
            session: Mutex::new(build_session(model_path, device)?),
        })
    }

    pub fn classify(&self, frame: &Frame, face: &FaceDescriptor) -> Result<Gender, BoxError> {
        let Some(transform) = box_transform(face) else {
            return Ok(Gender::Unknown);
        };
        let crop =
            warp_crop(frame, &transform, INPUT_SIZE as u32).ok_or("Cannot crop face box")?;

        let input_value = ort::value::Tensor::from_array(preprocess(&crop))?;
        let mut session = self
            .session
            .lock()
            .map_err(|e| format!("Lock poisoned: {e}"))?;
        let outputs = session.run(ort::inputs![input_value])?;
        let scores: Vec<f32> = outputs[0].try_extract_array::<f32>()?.iter().copied().collect();
        Ok(gender_from_scores(&scores))
    }
}

fn box_transform(face: &FaceDescriptor) -> Option<SimilarityTransform> {
    let extent = face.bbox.width().max(face.bbox.height()) * CROP_MARGIN;
    if extent <= 0.0 {
        return None;
    }
    let s = INPUT_SIZE as f64 / extent;
    let center = face.center();
    Some(SimilarityTransform {
        a: s,
        b: 0.0,
        tx: INPUT_SIZE as f64 / 2.0 - s * center.x,
        ty: INPUT_SIZE as f64 / 2.0 - s * center.y,
    })
}

fn preprocess(crop: &[u8]) -> ndarray::Array4<f32> {
    let mut tensor = ndarray::Array4::<f32>::zeros((1, 3, INPUT_SIZE, INPUT_SIZE));
    for y in 0..INPUT_SIZE {
        for x in 0..INPUT_SIZE {
            let offset = (y * INPUT_SIZE + x) * 3;
            for c in 0..3 {
                tensor[[0, c, y, x]] = crop[offset + c] as f32;
            }
        }
    }
    tensor
}

fn gender_from_scores(scores: &[f32]) -> Gender {
    match argmax(&scores[..scores.len().min(2)]) {
        Some(0) => Gender::Female,
        Some(1) => Gender::Male,
        _ => Gender::Unknown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::embedding::Embedding;
    use crate::shared::face::BoundingBox;
    use rstest::rstest;

    #[rstest]
    #[case(&[0.9, 0.1, 0.31], Gender::Female)]
    #[case(&[0.2, 0.8, 0.45], Gender::Male)]
    #[case(&[], Gender::Unknown)]
    fn test_gender_from_scores(#[case] scores: &[f32], #[case] expected: Gender) {
        assert_eq!(gender_from_scores(scores), expected);
    }

    #[test]
    fn test_box_transform_centers_face_with_margin() {
        let face = FaceDescriptor::new(
            BoundingBox::new(0.0, 0.0, 64.0, 32.0),
            Embedding::new(vec![1.0]),
            Gender::Unknown,
        );
        let t = box_transform(&face).unwrap();
        let (x, y) = t.apply(32.0, 16.0);
        assert!((x - 48.0).abs() < 1e-9 && (y - 48.0).abs() < 1e-9);
        assert!((t.scale() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_box_has_no_transform() {
        let face = FaceDescriptor::new(
            BoundingBox::new(5.0, 5.0, 5.0, 5.0),
            Embedding::new(vec![1.0]),
            Gender::Unknown,
        );
        assert!(box_transform(&face).is_none());
    }
}
