/// `inswapper_128`-style face swap via ONNX Runtime.
///
/// The target face is aligned into a 128×128 crop, swapped by the model
/// using the source latent, and blended back into the frame through the
/// inverse alignment with a feathered edge.
use std::path::Path;
use std::sync::Mutex;

use crate::detection::infrastructure::execution_provider::{build_session, ExecutionDevice};
use crate::shared::embedding::l2_normalize;
use crate::shared::error::BoxError;
use crate::shared::face::{FaceDescriptor, SourceFace};
use crate::shared::face_alignment::{alignment_for, bilinear_sample, warp_crop, SimilarityTransform};
use crate::shared::frame::Frame;
use crate::swapping::domain::face_swapper::FaceSwapper;

const CROP_SIZE: usize = 128;

/// Width of the blend ramp at the crop border, as a fraction of the crop.
const FEATHER_RATIO: f64 = 0.1;

pub struct OnnxInswapper {
    session: Mutex<ort::session::Session>,
    emap: Option<Emap>,
}

/// Square projection from ArcFace embedding space into the swap model's
/// latent space.
#[derive(Clone, Debug, PartialEq)]
pub struct Emap {
    dim: usize,
    values: Vec<f32>,
}

impl Emap {
    pub fn new(dim: usize, values: Vec<f32>) -> Result<Self, BoxError> {
        if values.len() != dim * dim {
            return Err(format!(
                "emap must hold {dim}x{dim} values, found {}",
                values.len()
            )
            .into());
        }
        Ok(Self { dim, values })
    }

    /// Reads a row-major little-endian f32 matrix.
    pub fn load(path: &Path) -> Result<Self, BoxError> {
        let bytes = std::fs::read(path)?;
        if bytes.len() % 4 != 0 {
            return Err(format!("{} is not an f32 matrix", path.display()).into());
        }
        let values: Vec<f32> = bytes
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect();
        let dim = (values.len() as f64).sqrt() as usize;
        Self::new(dim, values)
    }

    /// `normalize(embedding · emap)`.
    pub fn project(&self, embedding: &[f32]) -> Result<Vec<f32>, BoxError> {
        if embedding.len() != self.dim {
            return Err(format!(
                "embedding has {} values, emap expects {}",
                embedding.len(),
                self.dim
            )
            .into());
        }
        let mut latent = vec![0.0f32; self.dim];
        for (i, &e) in embedding.iter().enumerate() {
            let row = &self.values[i * self.dim..(i + 1) * self.dim];
            for (l, &m) in latent.iter_mut().zip(row) {
                *l += e * m;
            }
        }
        l2_normalize(&mut latent);
        Ok(latent)
    }
}

impl OnnxInswapper {
    pub fn new(
        model_path: &Path,
        emap_path: Option<&Path>,
        device: ExecutionDevice,
    ) -> Result<Self, BoxError> {
        let session = build_session(model_path, device)?;
        let emap = emap_path.map(Emap::load).transpose()?;
        if emap.is_none() {
            log::info!("No emap configured; source embedding is used as the latent");
        }
        Ok(Self {
            session: Mutex::new(session),
            emap,
        })
    }

    fn latent(&self, source: &SourceFace) -> Result<Vec<f32>, BoxError> {
        match &self.emap {
            Some(emap) => emap.project(source.embedding().as_slice()),
            None => Ok(source.embedding().as_slice().to_vec()),
        }
    }
}

impl FaceSwapper for OnnxInswapper {
    fn swap(
        &self,
        frame: &Frame,
        target: &FaceDescriptor,
        source: &SourceFace,
    ) -> Result<Frame, BoxError> {
        let to_crop =
            alignment_for(target, CROP_SIZE as u32).ok_or("Cannot align degenerate face box")?;
        let crop = warp_crop(frame, &to_crop, CROP_SIZE as u32)
            .ok_or("Cannot align degenerate face box")?;

        let latent = self.latent(source)?;
        let latent_len = latent.len();
        let target_value = ort::value::Tensor::from_array(preprocess(&crop))?;
        let source_value = ort::value::Tensor::from_array(
            ndarray::Array2::from_shape_vec((1, latent_len), latent)?,
        )?;

        let values: Vec<f32> = {
            let mut session = self
                .session
                .lock()
                .map_err(|e| format!("Lock poisoned: {e}"))?;
            let outputs = session.run(ort::inputs![
                "target" => target_value,
                "source" => source_value
            ])?;
            let tensor = outputs[0].try_extract_array::<f32>()?;
            let values = tensor.iter().copied().collect();
            values
        };

        let swapped = postprocess(&values)?;
        paste_back(frame, &swapped, &to_crop)
    }
}

/// RGB crop → NCHW in `[0, 1]`.
fn preprocess(crop: &[u8]) -> ndarray::Array4<f32> {
    let mut tensor = ndarray::Array4::<f32>::zeros((1, 3, CROP_SIZE, CROP_SIZE));
    for y in 0..CROP_SIZE {
        for x in 0..CROP_SIZE {
            let offset = (y * CROP_SIZE + x) * 3;
            for c in 0..3 {
                tensor[[0, c, y, x]] = crop[offset + c] as f32 / 255.0;
            }
        }
    }
    tensor
}

/// NCHW `[0, 1]` model output → interleaved RGB crop.
fn postprocess(values: &[f32]) -> Result<Vec<u8>, BoxError> {
    let plane = CROP_SIZE * CROP_SIZE;
    if values.len() != plane * 3 {
        return Err(format!(
            "swap model returned {} values, expected {}",
            values.len(),
            plane * 3
        )
        .into());
    }
    let mut rgb = vec![0u8; plane * 3];
    for i in 0..plane {
        for c in 0..3 {
            rgb[i * 3 + c] = (values[c * plane + i] * 255.0).round().clamp(0.0, 255.0) as u8;
        }
    }
    Ok(rgb)
}

/// Blend weight of crop position `(u, v)`: 1 inside, ramping to 0 at the
/// crop border.
fn feather_weight(u: f64, v: f64) -> f64 {
    let size = CROP_SIZE as f64 - 1.0;
    let edge = u.min(v).min(size - u).min(size - v);
    if edge < 0.0 {
        return 0.0;
    }
    (edge / (CROP_SIZE as f64 * FEATHER_RATIO)).min(1.0)
}

/// Blends the swapped crop back into a copy of `frame`.
fn paste_back(
    frame: &Frame,
    swapped: &[u8],
    to_crop: &SimilarityTransform,
) -> Result<Frame, BoxError> {
    let to_frame = to_crop.inverse().ok_or("Degenerate alignment")?;
    let (w, h, ch) = (
        frame.width() as usize,
        frame.height() as usize,
        frame.channels() as usize,
    );

    // Frame-space bounds of the crop.
    let last = CROP_SIZE as f64 - 1.0;
    let corners = [(0.0, 0.0), (last, 0.0), (0.0, last), (last, last)]
        .map(|(u, v)| to_frame.apply(u, v));
    let min_x = corners.iter().map(|p| p.0).fold(f64::INFINITY, f64::min).floor().max(0.0) as usize;
    let min_y = corners.iter().map(|p| p.1).fold(f64::INFINITY, f64::min).floor().max(0.0) as usize;
    let max_x = corners.iter().map(|p| p.0).fold(f64::NEG_INFINITY, f64::max).ceil().max(0.0) as usize;
    let max_y = corners.iter().map(|p| p.1).fold(f64::NEG_INFINITY, f64::max).ceil().max(0.0) as usize;

    let mut out = frame.clone();
    let data = out.data_mut();
    for y in min_y..=max_y.min(h.saturating_sub(1)) {
        for x in min_x..=max_x.min(w.saturating_sub(1)) {
            let (u, v) = to_crop.apply(x as f64, y as f64);
            let weight = feather_weight(u, v);
            if weight <= 0.0 {
                continue;
            }
            let offset = (y * w + x) * ch;
            for c in 0..3 {
                let Some(value) = bilinear_sample(swapped, CROP_SIZE, CROP_SIZE, 3, u, v, c) else {
                    continue;
                };
                let original = data[offset + c] as f64;
                data[offset + c] = (weight * value + (1.0 - weight) * original)
                    .round()
                    .clamp(0.0, 255.0) as u8;
            }
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn identity() -> SimilarityTransform {
        SimilarityTransform {
            a: 1.0,
            b: 0.0,
            tx: 0.0,
            ty: 0.0,
        }
    }

    #[test]
    fn test_emap_projection_normalizes() {
        // 2x2 emap swapping the axes and doubling.
        let emap = Emap::new(2, vec![0.0, 2.0, 2.0, 0.0]).unwrap();
        let latent = emap.project(&[1.0, 0.0]).unwrap();
        assert_relative_eq!(latent[0], 0.0);
        assert_relative_eq!(latent[1], 1.0);
    }

    #[test]
    fn test_emap_dimension_checks() {
        assert!(Emap::new(2, vec![0.0; 3]).is_err());
        let emap = Emap::new(2, vec![1.0, 0.0, 0.0, 1.0]).unwrap();
        assert!(emap.project(&[1.0, 0.0, 0.0]).is_err());
    }

    #[test]
    fn test_emap_load_from_raw_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("emap.bin");
        let bytes: Vec<u8> = [1.0f32, 0.0, 0.0, 1.0]
            .iter()
            .flat_map(|v| v.to_le_bytes())
            .collect();
        std::fs::write(&path, bytes).unwrap();

        let emap = Emap::load(&path).unwrap();
        assert_eq!(emap, Emap::new(2, vec![1.0, 0.0, 0.0, 1.0]).unwrap());
    }

    #[test]
    fn test_postprocess_interleaves_planes() {
        let plane = CROP_SIZE * CROP_SIZE;
        let mut values = vec![0.0f32; plane * 3];
        values[0] = 1.0; // R of pixel 0
        values[plane + 1] = 0.5; // G of pixel 1
        let rgb = postprocess(&values).unwrap();
        assert_eq!(&rgb[0..3], &[255, 0, 0]);
        assert_eq!(rgb[4], 128);
    }

    #[test]
    fn test_postprocess_rejects_wrong_size() {
        assert!(postprocess(&[0.0; 10]).is_err());
    }

    #[test]
    fn test_feather_weight_profile() {
        assert_relative_eq!(feather_weight(64.0, 64.0), 1.0);
        assert_relative_eq!(feather_weight(0.0, 64.0), 0.0);
        assert!(feather_weight(6.4, 64.0) > 0.4 && feather_weight(6.4, 64.0) < 0.6);
        assert_relative_eq!(feather_weight(-1.0, 64.0), 0.0);
    }

    #[test]
    fn test_paste_back_replaces_center_and_keeps_outside() {
        let frame = Frame::new(vec![10u8; 200 * 200 * 3], 200, 200, 3, 9);
        let swapped = vec![250u8; CROP_SIZE * CROP_SIZE * 3];

        let out = paste_back(&frame, &swapped, &identity()).unwrap();

        assert_eq!(out.index(), 9);
        assert_eq!(out.pixel(64, 64), Some([250, 250, 250]));
        assert_eq!(out.pixel(0, 0), Some([10, 10, 10]));
        assert_eq!(out.pixel(150, 150), Some([10, 10, 10]));
        let edge = out.pixel(3, 64).unwrap()[0];
        assert!(edge > 10 && edge < 250);
    }

    #[test]
    fn test_paste_back_crop_outside_frame_is_noop() {
        let frame = Frame::new(vec![10u8; 20 * 20 * 3], 20, 20, 3, 0);
        let swapped = vec![250u8; CROP_SIZE * CROP_SIZE * 3];
        let far_away = SimilarityTransform {
            a: 1.0,
            b: 0.0,
            tx: 1000.0,
            ty: 1000.0,
        };

        let out = paste_back(&frame, &swapped, &far_away).unwrap();
        assert_eq!(out, frame);
    }
}
