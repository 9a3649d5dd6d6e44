use crate::detection::domain::face_detector::FaceDetector;
use crate::shared::error::{BoxError, FaceSwapError};
use crate::shared::face::{FaceDescriptor, SourceFace};
use crate::shared::frame::Frame;
use crate::shared::target_selector::TargetSelector;

/// Extracts the donor identity from a source image.
///
/// Without a selector the first detected face is the donor. With one, the
/// first face covering the selector center wins, otherwise the face whose
/// center is nearest by Manhattan distance.
pub struct ResolveSourceFaceUseCase {
    detector: Box<dyn FaceDetector>,
}

impl ResolveSourceFaceUseCase {
    pub fn new(detector: Box<dyn FaceDetector>) -> Self {
        Self { detector }
    }

    pub fn execute(
        &mut self,
        frame: &Frame,
        selector: &TargetSelector,
    ) -> Result<SourceFace, BoxError> {
        let faces = self.detector.detect(frame)?;
        let donor = pick_donor(&faces, selector, frame.width(), frame.height()).ok_or_else(|| {
            FaceSwapError::FaceNotFound("no face detected in the source image".into())
        })?;
        log::debug!(
            "Source face at ({:.0}, {:.0}) out of {} detected",
            donor.center().x,
            donor.center().y,
            faces.len()
        );
        Ok(SourceFace::from(donor))
    }

    /// Hands the detector back so the target pass can reuse the loaded models.
    pub fn into_detector(self) -> Box<dyn FaceDetector> {
        self.detector
    }
}

fn pick_donor<'a>(
    faces: &'a [FaceDescriptor],
    selector: &TargetSelector,
    width: u32,
    height: u32,
) -> Option<&'a FaceDescriptor> {
    let Some(center) = selector.center_in(width, height) else {
        return faces.first();
    };
    faces
        .iter()
        .find(|f| f.bbox.contains(&center))
        .or_else(|| {
            faces.iter().min_by(|a, b| {
                a.center()
                    .manhattan_distance(&center)
                    .total_cmp(&b.center().manhattan_distance(&center))
            })
        })
}
