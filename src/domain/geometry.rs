//! Geometric types for answer boxes and display scaling

use serde::{Deserialize, Serialize};

/// Axis-aligned answer box as `[x1, y1, x2, y2]`
///
/// Grading data always stores these in native image pixels. Call
/// [`BoxRect::scaled`] with the current [`DisplayTransform`] before drawing.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 4]", into = "[f64; 4]")]
pub struct BoxRect {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

impl From<[f64; 4]> for BoxRect {
    fn from([x1, y1, x2, y2]: [f64; 4]) -> Self {
        Self { x1, y1, x2, y2 }
    }
}

impl From<BoxRect> for [f64; 4] {
    fn from(r: BoxRect) -> Self {
        [r.x1, r.y1, r.x2, r.y2]
    }
}

impl BoxRect {
    pub fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self { x1, y1, x2, y2 }
    }

    pub fn width(&self) -> f64 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f64 {
        self.y2 - self.y1
    }

    /// Map from native image pixels into display pixels
    pub fn scaled(&self, transform: &DisplayTransform) -> BoxRect {
        BoxRect {
            x1: self.x1 * transform.scale_x,
            y1: self.y1 * transform.scale_y,
            x2: self.x2 * transform.scale_x,
            y2: self.y2 * transform.scale_y,
        }
    }
}

/// Mapping from native image pixels to on-screen pixels
///
/// Derived once per image load. Never upscales: an image that already fits the
/// bounding box keeps its native size.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct DisplayTransform {
    pub native_width: u32,
    pub native_height: u32,
    pub display_width: f64,
    pub display_height: f64,
    pub scale_x: f64,
    pub scale_y: f64,
}

impl DisplayTransform {
    /// Fit a native size into `max_width x max_height`, preserving aspect ratio
    pub fn fit(native_width: u32, native_height: u32, max_width: u32, max_height: u32) -> Self {
        let (w, h) = (native_width as f64, native_height as f64);
        let (mut display_width, mut display_height) = (w, h);

        if native_width > max_width || native_height > max_height {
            let scale = (max_width as f64 / w).min(max_height as f64 / h);
            display_width = w * scale;
            display_height = h * scale;
        }

        Self {
            native_width,
            native_height,
            display_width,
            display_height,
            scale_x: if native_width > 0 { display_width / w } else { 1.0 },
            scale_y: if native_height > 0 { display_height / h } else { 1.0 },
        }
    }

    /// Transform that leaves a native size untouched
    pub fn identity(native_width: u32, native_height: u32) -> Self {
        Self::fit(native_width, native_height, u32::MAX, u32::MAX)
    }

    pub fn is_downscaled(&self) -> bool {
        self.scale_x < 1.0 || self.scale_y < 1.0
    }
}
