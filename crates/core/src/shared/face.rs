use crate::shared::embedding::Embedding;
use crate::shared::face_landmarks::FaceLandmarks;

/// A position in image pixel space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Point) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    pub fn manhattan_distance(&self, other: &Point) -> f64 {
        (self.x - other.x).abs() + (self.y - other.y).abs()
    }
}

/// Axis-aligned face box `(x1, y1)`–`(x2, y2)` in source-image pixels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingBox {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

impl BoundingBox {
    pub fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self { x1, y1, x2, y2 }
    }

    pub fn width(&self) -> f64 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f64 {
        self.y2 - self.y1
    }

    pub fn center(&self) -> Point {
        Point::new((self.x1 + self.x2) / 2.0, (self.y1 + self.y2) / 2.0)
    }

    /// Inclusive on every edge.
    pub fn contains(&self, point: &Point) -> bool {
        self.x1 <= point.x && point.x <= self.x2 && self.y1 <= point.y && point.y <= self.y2
    }

    pub fn as_array(&self) -> [f64; 4] {
        [self.x1, self.y1, self.x2, self.y2]
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Gender {
    Male,
    Female,
    #[default]
    Unknown,
}

/// One detected face as reported by the detection collaborator.
#[derive(Clone, Debug, PartialEq)]
pub struct FaceDescriptor {
    pub bbox: BoundingBox,
    pub embedding: Embedding,
    pub gender: Gender,
    pub landmarks: Option<FaceLandmarks>,
    pub score: f64,
}

impl FaceDescriptor {
    pub fn new(bbox: BoundingBox, embedding: Embedding, gender: Gender) -> Self {
        Self {
            bbox,
            embedding,
            gender,
            landmarks: None,
            score: 1.0,
        }
    }

    pub fn with_landmarks(mut self, landmarks: FaceLandmarks) -> Self {
        self.landmarks = Some(landmarks);
        self
    }

    pub fn with_score(mut self, score: f64) -> Self {
        self.score = score;
        self
    }

    pub fn center(&self) -> Point {
        self.bbox.center()
    }
}

/// The donor identity swapped into every selected target face.
#[derive(Clone, Debug, PartialEq)]
pub struct SourceFace {
    embedding: Embedding,
}

impl SourceFace {
    pub fn new(embedding: Embedding) -> Self {
        Self { embedding }
    }

    pub fn embedding(&self) -> &Embedding {
        &self.embedding
    }
}

impl From<&FaceDescriptor> for SourceFace {
    fn from(face: &FaceDescriptor) -> Self {
        Self::new(face.embedding.clone())
    }
}
