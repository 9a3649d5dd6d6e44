/// YOLO-pose face detector using ONNX Runtime via `ort`.
///
/// Handles letterbox preprocessing, inference, NMS and keypoint decoding.
/// Output boxes are in frame pixels, sorted by confidence.
use std::path::Path;

use super::execution_provider::{build_session, model_input_size, ExecutionDevice};
use super::yolo::{nms, output_rows, Letterbox, RawDetection};
use crate::shared::error::BoxError;
use crate::shared::frame::Frame;

/// Fallback YOLO model input resolution when the model doesn't specify dimensions.
const DEFAULT_INPUT_SIZE: u32 = 640;

/// Default confidence threshold for face detection.
pub const DEFAULT_CONFIDENCE: f64 = 0.25;

/// NMS IoU threshold.
const NMS_IOU_THRESH: f64 = 0.45;

/// Number of keypoints per detection (5 landmarks × 3 values each: x, y, conf).
const NUM_KEYPOINT_VALUES: usize = 15;

/// Minimum keypoint confidence to treat a landmark as visible.
const KEYPOINT_CONF_THRESH: f64 = 0.5;

/// YOLO face detector backed by an ONNX Runtime session.
pub struct OnnxYoloDetector {
    session: ort::session::Session,
    confidence: f64,
    input_size: u32,
}

impl OnnxYoloDetector {
    /// Load a YOLO ONNX model and prepare for inference.
    ///
    /// The input resolution is read from the model's input shape (expecting NCHW).
    /// Falls back to 640 if the shape is dynamic or unreadable.
    pub fn new(
        model_path: &Path,
        device: ExecutionDevice,
        confidence: f64,
    ) -> Result<Self, BoxError> {
        let session = build_session(model_path, device)?;
        let input_size = model_input_size(&session, DEFAULT_INPUT_SIZE);
        Ok(Self {
            session,
            confidence,
            input_size,
        })
    }

    pub fn detect_boxes(&mut self, frame: &Frame) -> Result<Vec<RawDetection>, BoxError> {
        let letterbox = Letterbox::new(frame, self.input_size);

        let input_value = ort::value::Tensor::from_array(letterbox.tensor.clone())?;
        let outputs = self.session.run(ort::inputs![input_value])?;
        if outputs.len() == 0 {
            return Err("YOLO model produced no outputs".into());
        }
        let tensor = outputs[0].try_extract_array::<f32>()?;
        let rows = output_rows(&tensor)?;

        let mut raw_dets: Vec<RawDetection> = rows
            .iter()
            .filter_map(|row| decode_row(row, &letterbox, self.confidence))
            .collect();

        Ok(nms(&mut raw_dets, NMS_IOU_THRESH))
    }
}

/// Row format: `[cx, cy, w, h, conf, kp0_x, kp0_y, kp0_conf, ...]`.
fn decode_row(row: &[f32], letterbox: &Letterbox, min_confidence: f64) -> Option<RawDetection> {
    if row.len() < 5 {
        return None;
    }
    let conf = row[4] as f64;
    if conf < min_confidence {
        return None;
    }

    let mut det = RawDetection::from_center(letterbox, row, conf, 0);
    if row.len() >= 5 + NUM_KEYPOINT_VALUES {
        let mut pts = [(0.0f64, 0.0f64); 5];
        for (k, pt) in pts.iter_mut().enumerate() {
            let base = 5 + k * 3;
            if row[base + 2] as f64 >= KEYPOINT_CONF_THRESH {
                *pt = letterbox.to_frame(row[base] as f64, row[base + 1] as f64);
            }
            // else: stays (0.0, 0.0), treated as invisible by FaceLandmarks
        }
        det.keypoints = Some(pts);
    }
    Some(det)
}
