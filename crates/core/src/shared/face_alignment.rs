//! Landmark-based face alignment: fits a similarity transform from the
//! detected 5 points onto the canonical ArcFace layout and resamples the
//! face into a square crop.

use crate::shared::face::FaceDescriptor;
use crate::shared::frame::Frame;

/// Canonical 5-point positions in a 112×112 ArcFace crop.
pub const ARCFACE_TEMPLATE: [(f64, f64); 5] = [
    (38.2946, 51.6963),
    (73.5318, 51.5014),
    (56.0252, 71.7366),
    (41.5493, 92.3655),
    (70.7299, 92.2041),
];

const TEMPLATE_SIZE: f64 = 112.0;

/// The ArcFace template scaled to a `size`×`size` crop.
pub fn template_for(size: u32) -> [(f64, f64); 5] {
    let s = size as f64 / TEMPLATE_SIZE;
    ARCFACE_TEMPLATE.map(|(x, y)| (x * s, y * s))
}

/// Rotation + uniform scale + translation:
/// `x' = a·x − b·y + tx`, `y' = b·x + a·y + ty`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SimilarityTransform {
    pub a: f64,
    pub b: f64,
    pub tx: f64,
    pub ty: f64,
}

impl SimilarityTransform {
    /// Least-squares fit mapping `src` onto `dst`. `None` when the source
    /// points are degenerate (all coincident).
    pub fn estimate(src: &[(f64, f64)], dst: &[(f64, f64)]) -> Option<Self> {
        let n = src.len().min(dst.len());
        if n == 0 {
            return None;
        }
        let mean = |pts: &[(f64, f64)]| {
            let (sx, sy) = pts[..n]
                .iter()
                .fold((0.0, 0.0), |(ax, ay), (x, y)| (ax + x, ay + y));
            (sx / n as f64, sy / n as f64)
        };
        let (psx, psy) = mean(src);
        let (qsx, qsy) = mean(dst);

        let mut norm = 0.0;
        let mut dot = 0.0;
        let mut cross = 0.0;
        for (&(px, py), &(qx, qy)) in src.iter().zip(dst).take(n) {
            let (px, py) = (px - psx, py - psy);
            let (qx, qy) = (qx - qsx, qy - qsy);
            norm += px * px + py * py;
            dot += px * qx + py * qy;
            cross += px * qy - py * qx;
        }
        if norm <= f64::EPSILON {
            return None;
        }

        let a = dot / norm;
        let b = cross / norm;
        Some(Self {
            a,
            b,
            tx: qsx - (a * psx - b * psy),
            ty: qsy - (b * psx + a * psy),
        })
    }

    pub fn apply(&self, x: f64, y: f64) -> (f64, f64) {
        (
            self.a * x - self.b * y + self.tx,
            self.b * x + self.a * y + self.ty,
        )
    }

    pub fn inverse(&self) -> Option<Self> {
        let det = self.a * self.a + self.b * self.b;
        if det <= f64::EPSILON {
            return None;
        }
        let a = self.a / det;
        let b = -self.b / det;
        Some(Self {
            a,
            b,
            tx: -(a * self.tx - b * self.ty),
            ty: -(b * self.tx + a * self.ty),
        })
    }

    pub fn scale(&self) -> f64 {
        self.a.hypot(self.b)
    }
}

/// Transform from frame pixels into a `size`×`size` aligned crop of `face`.
///
/// Uses the landmarks when all five are visible, otherwise centers the
/// bounding box in the crop.
pub fn alignment_for(face: &FaceDescriptor, size: u32) -> Option<SimilarityTransform> {
    if let Some(landmarks) = face.landmarks.as_ref().filter(|l| l.is_complete()) {
        if let Some(t) = SimilarityTransform::estimate(landmarks.points(), &template_for(size)) {
            return Some(t);
        }
    }

    let extent = face.bbox.width().max(face.bbox.height());
    if extent <= 0.0 {
        return None;
    }
    let s = size as f64 / extent;
    let center = face.center();
    Some(SimilarityTransform {
        a: s,
        b: 0.0,
        tx: size as f64 / 2.0 - s * center.x,
        ty: size as f64 / 2.0 - s * center.y,
    })
}

/// Resamples a `size`×`size` RGB crop of `frame` through `to_crop`
/// (frame → crop). Pixels that map outside the frame are black.
pub fn warp_crop(frame: &Frame, to_crop: &SimilarityTransform, size: u32) -> Option<Vec<u8>> {
    let to_frame = to_crop.inverse()?;
    let (w, h, ch) = (
        frame.width() as usize,
        frame.height() as usize,
        frame.channels() as usize,
    );
    let size = size as usize;
    let mut out = vec![0u8; size * size * 3];

    for v in 0..size {
        for u in 0..size {
            let (x, y) = to_frame.apply(u as f64, v as f64);
            for c in 0..3 {
                if let Some(value) = bilinear_sample(frame.data(), w, h, ch, x, y, c) {
                    out[(v * size + u) * 3 + c] = value.round().clamp(0.0, 255.0) as u8;
                }
            }
        }
    }
    Some(out)
}

/// Bilinear sample of channel `c` of an HWC u8 image at fractional `(x, y)`.
/// Returns `None` outside the image.
pub fn bilinear_sample(
    data: &[u8],
    width: usize,
    height: usize,
    channels: usize,
    x: f64,
    y: f64,
    c: usize,
) -> Option<f64> {
    if width == 0 || height == 0 {
        return None;
    }
    if x < 0.0 || y < 0.0 || x > (width - 1) as f64 || y > (height - 1) as f64 {
        return None;
    }
    let x0 = x.floor() as usize;
    let y0 = y.floor() as usize;
    let x1 = (x0 + 1).min(width - 1);
    let y1 = (y0 + 1).min(height - 1);
    let fx = x - x0 as f64;
    let fy = y - y0 as f64;

    let at = |xx: usize, yy: usize| data[(yy * width + xx) * channels + c] as f64;
    let top = at(x0, y0) * (1.0 - fx) + at(x1, y0) * fx;
    let bottom = at(x0, y1) * (1.0 - fx) + at(x1, y1) * fx;
    Some(top * (1.0 - fy) + bottom * fy)
}
