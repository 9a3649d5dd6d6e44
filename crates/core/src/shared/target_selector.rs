use crate::shared::face::Point;

/// A user-drawn rectangle in the coordinate space of the canvas it was
/// drawn on (typically a scaled-down preview of the first frame).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CanvasRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub canvas_width: f64,
    pub canvas_height: f64,
}

/// Which face the user wants swapped, supplied once per run.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum TargetSelector {
    /// No region: the first detected face is taken.
    #[default]
    None,
    Region(CanvasRect),
}

impl TargetSelector {
    /// Transforms the selected region into the pixel space of a
    /// `frame_width` x `frame_height` image and returns its center.
    ///
    /// A non-positive canvas dimension is read as "already in pixels".
    pub fn center_in(&self, frame_width: u32, frame_height: u32) -> Option<Point> {
        let TargetSelector::Region(rect) = self else {
            return None;
        };
        let scale_x = scale(frame_width, rect.canvas_width);
        let scale_y = scale(frame_height, rect.canvas_height);

        let x1 = rect.x * scale_x;
        let x2 = (rect.x + rect.width) * scale_x;
        let y1 = rect.y * scale_y;
        let y2 = (rect.y + rect.height) * scale_y;

        Some(Point::new((x1 + x2) / 2.0, (y1 + y2) / 2.0))
    }
}

fn scale(frame_extent: u32, canvas_extent: f64) -> f64 {
    if canvas_extent > 0.0 {
        frame_extent as f64 / canvas_extent
    } else {
        1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn rect(x: f64, y: f64, w: f64, h: f64, cw: f64, ch: f64) -> TargetSelector {
        TargetSelector::Region(CanvasRect {
            x,
            y,
            width: w,
            height: h,
            canvas_width: cw,
            canvas_height: ch,
        })
    }

    #[test]
    fn test_none_has_no_center() {
        assert_eq!(TargetSelector::None.center_in(1920, 1080), None);
    }

    #[test]
    fn test_scales_canvas_to_frame() {
        // Canvas is half the frame size on both axes.
        let center = rect(100.0, 50.0, 20.0, 10.0, 960.0, 540.0)
            .center_in(1920, 1080)
            .unwrap();
        assert_relative_eq!(center.x, 220.0);
        assert_relative_eq!(center.y, 110.0);
    }

    #[test]
    fn test_non_uniform_scale() {
        let center = rect(10.0, 10.0, 0.0, 0.0, 100.0, 50.0)
            .center_in(200, 200)
            .unwrap();
        assert_relative_eq!(center.x, 20.0);
        assert_relative_eq!(center.y, 40.0);
    }

    #[test]
    fn test_unit_rect_matches_single_point_selection() {
        let center = rect(5.0, 5.0, 1.0, 1.0, 10.0, 10.0)
            .center_in(100, 100)
            .unwrap();
        assert_relative_eq!(center.x, 55.0);
        assert_relative_eq!(center.y, 55.0);
    }

    #[test]
    fn test_zero_canvas_means_pixel_space() {
        let center = rect(40.0, 60.0, 20.0, 20.0, 0.0, 0.0)
            .center_in(640, 480)
            .unwrap();
        assert_relative_eq!(center.x, 50.0);
        assert_relative_eq!(center.y, 70.0);
    }
}
