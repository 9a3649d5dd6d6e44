/// Full face analysis for one frame: detection, identity embedding and
/// (optionally) gender, composed into [`FaceDescriptor`]s.
use std::path::Path;

use super::arcface_embedder::ArcFaceEmbedder;
use super::execution_provider::ExecutionDevice;
use super::onnx_gender_classifier::OnnxGenderClassifier;
use super::onnx_yolo_detector::{OnnxYoloDetector, DEFAULT_CONFIDENCE};
use crate::detection::domain::face_detector::FaceDetector;
use crate::shared::embedding::Embedding;
use crate::shared::error::BoxError;
use crate::shared::face::{BoundingBox, FaceDescriptor, Gender};
use crate::shared::face_landmarks::FaceLandmarks;
use crate::shared::frame::Frame;

/// Model files for [`OnnxFaceAnalyzer`]. Without a gender model every face
/// reports [`Gender::Unknown`].
#[derive(Clone, Debug)]
pub struct FaceAnalyzerModels<'a> {
    pub detector: &'a Path,
    pub embedder: &'a Path,
    pub gender: Option<&'a Path>,
}

pub struct OnnxFaceAnalyzer {
    detector: OnnxYoloDetector,
    embedder: ArcFaceEmbedder,
    gender: Option<OnnxGenderClassifier>,
}

impl OnnxFaceAnalyzer {
    pub fn new(models: &FaceAnalyzerModels<'_>, device: ExecutionDevice) -> Result<Self, BoxError> {
        let detector = OnnxYoloDetector::new(models.detector, device, DEFAULT_CONFIDENCE)?;
        let embedder = ArcFaceEmbedder::new(models.embedder, device)?;
        let gender = models
            .gender
            .map(|path| OnnxGenderClassifier::new(path, device))
            .transpose()?;
        if gender.is_none() {
            log::info!("No gender model configured; faces report unknown gender");
        }
        Ok(Self {
            detector,
            embedder,
            gender,
        })
    }
}

impl FaceDetector for OnnxFaceAnalyzer {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<FaceDescriptor>, BoxError> {
        let boxes = self.detector.detect_boxes(frame)?;
        let max_x = frame.width() as f64;
        let max_y = frame.height() as f64;

        let mut faces = Vec::with_capacity(boxes.len());
        for det in boxes {
            let bbox = BoundingBox::new(
                det.x1.clamp(0.0, max_x),
                det.y1.clamp(0.0, max_y),
                det.x2.clamp(0.0, max_x),
                det.y2.clamp(0.0, max_y),
            );
            if bbox.width() <= 1.0 || bbox.height() <= 1.0 {
                continue;
            }

            // Embedding needs the landmarks for alignment, so build them first.
            let mut face = FaceDescriptor::new(bbox, Embedding::new(Vec::new()), Gender::Unknown)
                .with_score(det.confidence);
            if let Some(points) = det.keypoints {
                face = face.with_landmarks(FaceLandmarks::new(points));
            }

            face.embedding = self.embedder.embed(frame, &face)?;
            if let Some(classifier) = &self.gender {
                face.gender = classifier.classify(frame, &face)?;
            }
            faces.push(face);
        }

        log::debug!("Frame {}: {} faces", frame.index(), faces.len());
        Ok(faces)
    }
}
