//! Pre- and post-processing shared by the YOLO-family ONNX models (face
//! pose detector and explicit-content detector).

use ndarray::ArrayViewD;

use super::math::bbox_iou;
use crate::shared::error::BoxError;
use crate::shared::frame::Frame;

/// A frame resized into a square model input with aspect-preserving padding.
pub struct Letterbox {
    /// NCHW float32 in `[0, 1]`.
    pub tensor: ndarray::Array4<f32>,
    pub scale: f64,
    pub pad_x: u32,
    pub pad_y: u32,
}

impl Letterbox {
    /// Letterbox-resize a frame to `target_size` × `target_size`.
    pub fn new(frame: &Frame, target_size: u32) -> Self {
        let fw = frame.width() as f64;
        let fh = frame.height() as f64;
        let target = target_size as f64;

        let scale = (target / fw).min(target / fh);
        let new_w = ((fw * scale).round() as u32).min(target_size);
        let new_h = ((fh * scale).round() as u32).min(target_size);
        let pad_x = (target_size - new_w) / 2;
        let pad_y = (target_size - new_h) / 2;

        // Padded with 114/255 gray, YOLO convention
        let gray = 114.0f32 / 255.0;
        let mut tensor = ndarray::Array4::<f32>::from_elem(
            (1, 3, target_size as usize, target_size as usize),
            gray,
        );

        let src = frame.as_ndarray();
        let src_h = frame.height() as usize;
        let src_w = frame.width() as usize;

        // Nearest-neighbor resize into the padded region
        for y in 0..new_h as usize {
            let src_y = ((y as f64 / scale) as usize).min(src_h - 1);
            for x in 0..new_w as usize {
                let src_x = ((x as f64 / scale) as usize).min(src_w - 1);
                let ty = pad_y as usize + y;
                let tx = pad_x as usize + x;
                for c in 0..3 {
                    tensor[[0, c, ty, tx]] = src[[src_y, src_x, c]] as f32 / 255.0;
                }
            }
        }

        Self {
            tensor,
            scale,
            pad_x,
            pad_y,
        }
    }

    /// Maps a point from model-input coordinates back to frame pixels.
    pub fn to_frame(&self, x: f64, y: f64) -> (f64, f64) {
        (
            (x - self.pad_x as f64) / self.scale,
            (y - self.pad_y as f64) / self.scale,
        )
    }
}

/// Splits a YOLO output tensor into one feature row per candidate.
///
/// The output is `[1, features, candidates]` (transposed, as exported by
/// ultralytics) or `[1, candidates, features]`; the smaller axis is taken
/// as the feature axis.
pub fn output_rows(tensor: &ArrayViewD<'_, f32>) -> Result<Vec<Vec<f32>>, BoxError> {
    let shape = tensor.shape();
    if shape.len() != 3 {
        return Err(format!("Unexpected YOLO output shape: {shape:?}").into());
    }
    let transposed = shape[1] < shape[2];
    let (num_dets, num_feats) = if transposed {
        (shape[2], shape[1])
    } else {
        (shape[1], shape[2])
    };

    let data: Vec<f32> = tensor.iter().copied().collect();
    let rows = (0..num_dets)
        .map(|i| {
            if transposed {
                (0..num_feats).map(|f| data[f * num_dets + i]).collect()
            } else {
                data[i * num_feats..(i + 1) * num_feats].to_vec()
            }
        })
        .collect();
    Ok(rows)
}

/// One candidate box in frame coordinates.
#[derive(Clone, Debug, PartialEq)]
pub struct RawDetection {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
    pub confidence: f64,
    pub class_id: usize,
    pub keypoints: Option<[(f64, f64); 5]>,
}

impl RawDetection {
    /// Builds a detection from a `cx, cy, w, h` box in model-input space.
    pub fn from_center(
        letterbox: &Letterbox,
        row: &[f32],
        confidence: f64,
        class_id: usize,
    ) -> Self {
        let (cx, cy, w, h) = (row[0] as f64, row[1] as f64, row[2] as f64, row[3] as f64);
        let (x1, y1) = letterbox.to_frame(cx - w / 2.0, cy - h / 2.0);
        let (x2, y2) = letterbox.to_frame(cx + w / 2.0, cy + h / 2.0);
        Self {
            x1,
            y1,
            x2,
            y2,
            confidence,
            class_id,
            keypoints: None,
        }
    }

    pub fn bbox(&self) -> [f64; 4] {
        [self.x1, self.y1, self.x2, self.y2]
    }
}

/// Greedy NMS: sort by confidence descending, suppress overlapping boxes.
pub fn nms(dets: &mut [RawDetection], iou_thresh: f64) -> Vec<RawDetection> {
    dets.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut keep = Vec::new();
    let mut suppressed = vec![false; dets.len()];

    for i in 0..dets.len() {
        if suppressed[i] {
            continue;
        }
        keep.push(dets[i].clone());
        for j in (i + 1)..dets.len() {
            if !suppressed[j] && bbox_iou(&dets[i].bbox(), &dets[j].bbox()) > iou_thresh {
                suppressed[j] = true;
            }
        }
    }
    keep
}
