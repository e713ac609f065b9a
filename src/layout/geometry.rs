//! Shared geometry for grading marks and the side panel
//!
//! These constants and size rules are used by the overlay builder and by the
//! raster canvas when it draws the same marks.

/// Hand-drawn check mark
pub mod check {
    pub const STROKE_WIDTH: f64 = 4.0;
    pub const ROUGHNESS: f64 = 1.4;

    /// Tick polyline in units of the check size, starting at the origin.
    /// The short stroke dips and the long stroke rises steeply to the right.
    pub const POINTS: [(f64, f64); 11] = [
        (0.0, 0.0),
        (0.20, 0.30),
        (0.45, 0.60),
        (0.65, 0.80),
        (0.90, 0.95),
        (1.10, 0.85),
        (1.30, 0.70),
        (1.60, 0.45),
        (1.95, 0.05),
        (2.40, -0.70),
        (3.20, -2.40),
    ];

    /// Check size for a box of `width x height` display pixels
    ///
    /// Small boxes get a check sized from the display width so it stays
    /// visible; large boxes are capped at 12% of the display width.
    pub fn size(width: f64, height: f64, display_width: f64) -> f64 {
        let local = (0.2 * (width + height))
            .max(0.6 * width.min(height))
            .max(0.04 * display_width);
        0.75 * (0.12 * display_width).min(local)
    }

    /// Scale the unit polyline to `size`
    pub fn points(size: f64) -> Vec<(f64, f64)> {
        POINTS.iter().map(|&(x, y)| (x * size, y * size)).collect()
    }
}

/// Ellipse drawn around a flagged answer
pub mod ellipse {
    pub const STROKE_WIDTH: f64 = 3.0;
    pub const ROUGHNESS: f64 = 1.4;
    /// Largest enlargement, reached by a zero-width box
    pub const MAX_SCALE: f64 = 2.0;
    /// Boxes at least this share of the display width are not enlarged
    pub const FULL_SIZE_RATIO: f64 = 0.7;
    /// Shift towards the top-left, as a share of the enlarged size
    pub const OFFSET_RATIO: f64 = 0.2;
    /// Bezier approximation constant: 4/3 * (sqrt(2) - 1)
    pub const BEZIER_K: f32 = 0.552_284_8;

    /// Enlargement for a box `box_width` display pixels wide, in `[1, MAX_SCALE]`
    pub fn scale_factor(box_width: f64, display_width: f64) -> f64 {
        let threshold = FULL_SIZE_RATIO * display_width;
        if threshold <= 0.0 {
            return 1.0;
        }
        let grow = ((threshold - box_width) / threshold).max(0.0);
        (1.0 + (MAX_SCALE - 1.0) * grow).clamp(1.0, MAX_SCALE)
    }
}

/// Arrowheads for arrow elements drawn in the editor
pub mod arrow {
    pub const HEAD_SIZE: f64 = 16.0;
    /// Angle between shaft and head lines (35 degrees)
    pub const HEAD_ANGLE: f64 = 0.610_865_238;
    pub const MIN_LENGTH: f64 = 5.0;

    /// End points of the two head lines for a shaft from `start` to `end`
    pub fn head_points(start: (f64, f64), end: (f64, f64)) -> Option<[(f64, f64); 2]> {
        let (dx, dy) = (end.0 - start.0, end.1 - start.1);
        let length = (dx * dx + dy * dy).sqrt();
        if length < MIN_LENGTH {
            return None;
        }
        // Unit vector pointing back along the shaft
        let (bx, by) = (-dx / length, -dy / length);
        let (sin, cos) = HEAD_ANGLE.sin_cos();
        let rotate = |sign: f64| {
            (
                end.0 + (bx * cos - sign * by * sin) * HEAD_SIZE,
                end.1 + (sign * bx * sin + by * cos) * HEAD_SIZE,
            )
        };
        Some([rotate(1.0), rotate(-1.0)])
    }
}

/// Side panel to the right of the image
pub mod side_panel {
    /// Gap between the image's right edge and the panel
    pub const MARGIN_X: f64 = 20.0;
    /// Initial vertical cursor
    pub const START_Y: f64 = 20.0;
    pub const LABEL_WIDTH: f64 = 300.0;
    pub const LABEL_HEIGHT: f64 = 30.0;
    /// Cursor advance after a question label
    pub const LABEL_ADVANCE: f64 = 12.0;
    /// Analysis boxes sit this far below the cursor
    pub const BOX_OFFSET_Y: f64 = 20.0;
    /// Cursor advance after an analysis box, on top of its height
    pub const BOX_GAP: f64 = 12.0;
    /// Extra cursor advance after a question that produced analysis text
    pub const QUESTION_GAP: f64 = 20.0;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_size_small_box_uses_display_floor() {
        // 10x10 box on a 1000px image: floor of 0.04 * 1000 wins
        assert!((check::size(10.0, 10.0, 1000.0) - 30.0).abs() < 1e-9);
    }

    #[test]
    fn test_check_size_capped_for_large_boxes() {
        // 0.12 * 1000 = 120 caps the local size of 0.6 * 600
        assert!((check::size(800.0, 600.0, 1000.0) - 90.0).abs() < 1e-9);
    }

    #[test]
    fn test_check_points_scale() {
        let points = check::points(10.0);
        assert_eq!(points.len(), 11);
        assert_eq!(points[0], (0.0, 0.0));
        assert!((points[10].0 - 32.0).abs() < 1e-9);
        assert!((points[10].1 + 24.0).abs() < 1e-9);
    }

    #[test]
    fn test_arrow_head_is_symmetric_behind_tip() {
        let [a, b] = arrow::head_points((0.0, 0.0), (100.0, 0.0)).unwrap();
        assert!(a.0 < 100.0 && b.0 < 100.0);
        assert!((a.0 - b.0).abs() < 1e-9);
        assert!((a.1 + b.1).abs() < 1e-9);
        assert!(arrow::head_points((0.0, 0.0), (1.0, 1.0)).is_none());
    }

    #[test]
    fn test_ellipse_scale_bounds() {
        assert_eq!(ellipse::scale_factor(0.0, 1000.0), 2.0);
        assert!((ellipse::scale_factor(700.0, 1000.0) - 1.0).abs() < 1e-9);
        assert_eq!(ellipse::scale_factor(900.0, 1000.0), 1.0);
        assert!((ellipse::scale_factor(350.0, 1000.0) - 1.5).abs() < 1e-9);
        assert_eq!(ellipse::scale_factor(-50.0, 1000.0), 2.0);
        assert_eq!(ellipse::scale_factor(10.0, 0.0), 1.0);
    }
}
