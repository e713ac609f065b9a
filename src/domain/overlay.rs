//! Overlay primitives derived from grading records
//!
//! All coordinates are absolute display pixels. Primitives are built fresh for
//! every record and never mutated afterwards.

use serde::{Deserialize, Serialize};

/// Named stroke/fill colors used by marks and panel text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarkColor {
    Red,
    Orange,
    Purple,
    Green,
    /// Dark grey used for question labels
    Ink,
    White,
    Transparent,
}

impl MarkColor {
    /// CSS color string understood by the canvas widget
    pub fn css(self) -> &'static str {
        match self {
            MarkColor::Red => "red",
            MarkColor::Orange => "orange",
            MarkColor::Purple => "purple",
            MarkColor::Green => "green",
            MarkColor::Ink => "#333",
            MarkColor::White => "white",
            MarkColor::Transparent => "transparent",
        }
    }

    /// Convert to image crate RGBA format (0-255)
    pub fn to_rgba_u8(self) -> [u8; 4] {
        match self {
            MarkColor::Red => [255, 0, 0, 255],
            MarkColor::Orange => [255, 165, 0, 255],
            MarkColor::Purple => [128, 0, 128, 255],
            MarkColor::Green => [0, 128, 0, 255],
            MarkColor::Ink => [0x33, 0x33, 0x33, 255],
            MarkColor::White => [255, 255, 255, 255],
            MarkColor::Transparent => [0, 0, 0, 0],
        }
    }
}

/// Hand-drawn tick placed on a correct answer
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CheckMark {
    /// Origin of the polyline
    pub x: f64,
    pub y: f64,
    pub size: f64,
    /// Polyline points relative to the origin
    pub points: Vec<(f64, f64)>,
    pub color: MarkColor,
    pub stroke_width: f64,
    pub roughness: f64,
}

/// Ellipse drawn around a disputed or incorrect answer
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EllipseMark {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub color: MarkColor,
    pub stroke_width: f64,
    pub roughness: f64,
}

/// Single-line side panel label ("题号: 3 ")
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TextLabel {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub text: String,
    pub font_size: f64,
    pub color: MarkColor,
}

/// Bordered side panel box holding a wrapped analysis
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TextBox {
    pub id: String,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    /// Measured height of the wrapped text
    pub height: f64,
    /// Source text, before wrapping
    pub text: String,
    pub lines: Vec<String>,
    pub font_size: f64,
    pub border: MarkColor,
    pub text_color: MarkColor,
}

/// One vector drawing instruction
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OverlayPrimitive {
    Check(CheckMark),
    Ellipse(EllipseMark),
    TextLabel(TextLabel),
    TextBox(TextBox),
}

impl OverlayPrimitive {
    /// Whether this primitive lives on the image (as opposed to the side panel)
    pub fn is_image_mark(&self) -> bool {
        matches!(self, OverlayPrimitive::Check(_) | OverlayPrimitive::Ellipse(_))
    }

    /// Stroke color of a mark, or text color of a panel entry
    pub fn color(&self) -> MarkColor {
        match self {
            OverlayPrimitive::Check(c) => c.color,
            OverlayPrimitive::Ellipse(e) => e.color,
            OverlayPrimitive::TextLabel(t) => t.color,
            OverlayPrimitive::TextBox(b) => b.text_color,
        }
    }

    /// Top-left corner
    pub fn origin(&self) -> (f64, f64) {
        match self {
            OverlayPrimitive::Check(c) => (c.x, c.y),
            OverlayPrimitive::Ellipse(e) => (e.x, e.y),
            OverlayPrimitive::TextLabel(t) => (t.x, t.y),
            OverlayPrimitive::TextBox(b) => (b.x, b.y),
        }
    }
}
