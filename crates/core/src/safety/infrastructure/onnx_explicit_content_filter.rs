/// Explicit-content classifier backed by a NudeNet-layout YOLOv8 detector.
///
/// The model scores 18 body-part classes per candidate box. A frame is
/// unsafe when any candidate scores at or above the threshold for one of the
/// explicit classes.
use std::path::Path;
use std::sync::Mutex;

use crate::detection::infrastructure::execution_provider::{
    build_session, model_input_size, ExecutionDevice,
};
use crate::detection::infrastructure::math::argmax;
use crate::detection::infrastructure::yolo::{output_rows, Letterbox};
use crate::safety::domain::content_filter::ContentFilter;
use crate::shared::error::BoxError;
use crate::shared::frame::Frame;

const DEFAULT_INPUT_SIZE: u32 = 320;

pub const DEFAULT_CONTENT_THRESHOLD: f64 = 0.5;

/// Class indices: buttocks, female breast, female genitalia, anus and male
/// genitalia, all exposed.
pub const EXPLICIT_CLASSES: &[usize] = &[2, 3, 4, 6, 14];

pub struct OnnxExplicitContentFilter {
    session: Mutex<ort::session::Session>,
    input_size: u32,
    threshold: f64,
}

impl OnnxExplicitContentFilter {
    pub fn new(model_path: &Path, device: ExecutionDevice, threshold: f64) -> Result<Self, BoxError> {
        let session = build_session(model_path, device)?;
        let input_size = model_input_size(&session, DEFAULT_INPUT_SIZE);
        Ok(Self {
            session: Mutex::new(session),
            input_size,
            threshold,
        })
    }
}

impl ContentFilter for OnnxExplicitContentFilter {
    fn is_safe(&self, frame: &Frame) -> Result<bool, BoxError> {
        let letterbox = Letterbox::new(frame, self.input_size);
        let input_value = ort::value::Tensor::from_array(letterbox.tensor)?;

        let mut session = self
            .session
            .lock()
            .map_err(|e| format!("Lock poisoned: {e}"))?;
        let outputs = session.run(ort::inputs![input_value])?;
        let tensor = outputs[0].try_extract_array::<f32>()?;
        let rows = output_rows(&tensor)?;

        Ok(!rows.iter().any(|row| is_explicit(row, self.threshold)))
    }
}

/// Row format: `[cx, cy, w, h, class_0, ..., class_17]`.
fn is_explicit(row: &[f32], threshold: f64) -> bool {
    let Some(scores) = row.get(4..) else {
        return false;
    };
    match argmax(scores) {
        Some(class) => {
            EXPLICIT_CLASSES.contains(&class) && scores[class] as f64 >= threshold
        }
        None => false,
    }
}
