//! 5-point face landmarks: left eye, right eye, nose, left mouth, right mouth.
//!
//! Points with `x <= 0` are treated as not visible (the detector reports
//! low-confidence keypoints that way).

#[derive(Clone, Debug, PartialEq)]
pub struct FaceLandmarks {
    points: [(f64, f64); 5],
}

impl FaceLandmarks {
    pub fn new(points: [(f64, f64); 5]) -> Self {
        Self { points }
    }

    pub fn points(&self) -> &[(f64, f64); 5] {
        &self.points
    }

    /// Alignment needs every point; partially visible sets fall back to the bbox.
    pub fn is_complete(&self) -> bool {
        self.points.iter().all(|(x, _)| *x > 0.0)
    }

    /// Maps every point through `f`, keeping invisible points invisible.
    pub fn map(&self, f: impl Fn(f64, f64) -> (f64, f64)) -> Self {
        let mut points = self.points;
        for p in points.iter_mut() {
            if p.0 > 0.0 {
                *p = f(p.0, p.1);
            }
        }
        Self { points }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frontal() -> FaceLandmarks {
        FaceLandmarks::new([
            (440.0, 350.0),
            (560.0, 350.0),
            (500.0, 420.0),
            (460.0, 470.0),
            (540.0, 470.0),
        ])
    }

    #[test]
    fn test_complete_when_all_visible() {
        assert!(frontal().is_complete());
    }

    #[test]
    fn test_incomplete_with_hidden_point() {
        let mut points = *frontal().points();
        points[3] = (0.0, 0.0);
        assert!(!FaceLandmarks::new(points).is_complete());
    }

    #[test]
    fn test_map_skips_invisible_points() {
        let mut points = *frontal().points();
        points[1] = (0.0, 0.0);
        let shifted = FaceLandmarks::new(points).map(|x, y| (x + 10.0, y - 10.0));
        assert_eq!(shifted.points()[0], (450.0, 340.0));
        assert_eq!(shifted.points()[1], (0.0, 0.0));
    }
}
