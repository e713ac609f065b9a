//! Native element schema of the drawing canvas
//!
//! Field names follow the widget's camelCase JSON so scenes can be handed to
//! it (or read back from it) without a translation layer.

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementKind {
    Rectangle,
    Ellipse,
    Line,
    Arrow,
    Freedraw,
    Text,
    Image,
}

impl ElementKind {
    /// Kinds drawn from a `points` polyline
    pub fn is_linear(self) -> bool {
        matches!(self, ElementKind::Line | ElementKind::Arrow | ElementKind::Freedraw)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FillStyle {
    Hachure,
    CrossHatch,
    #[default]
    Solid,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrokeStyle {
    #[default]
    Solid,
    Dashed,
    Dotted,
}

/// Text bound to a container shape
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementLabel {
    pub text: String,
    pub font_size: f64,
    pub stroke_color: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneElement {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: ElementKind,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub stroke_color: String,
    pub background_color: String,
    #[serde(default)]
    pub fill_style: FillStyle,
    #[serde(default)]
    pub stroke_style: StrokeStyle,
    pub stroke_width: f64,
    #[serde(default)]
    pub roughness: f64,
    /// 0-100
    #[serde(default = "full_opacity")]
    pub opacity: f64,
    /// Jitter seed for hand-drawn rendering
    #[serde(default)]
    pub seed: u32,
    #[serde(default)]
    pub locked: bool,
    /// Polyline in coordinates local to (x, y)
    #[serde(default)]
    pub points: Vec<[f64; 2]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_size: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<ElementLabel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_id: Option<String>,
}

fn full_opacity() -> f64 {
    100.0
}

impl SceneElement {
    /// Bare element with the widget's defaults
    pub fn new(
        id: impl Into<String>,
        kind: ElementKind,
        x: f64,
        y: f64,
        width: f64,
        height: f64,
    ) -> Self {
        Self {
            id: id.into(),
            kind,
            x,
            y,
            width,
            height,
            stroke_color: "#1e1e1e".to_string(),
            background_color: "transparent".to_string(),
            fill_style: FillStyle::Solid,
            stroke_style: StrokeStyle::Solid,
            stroke_width: 2.0,
            roughness: 1.0,
            opacity: full_opacity(),
            seed: 0,
            locked: false,
            points: Vec::new(),
            text: None,
            font_size: None,
            label: None,
            file_id: None,
        }
    }

    pub fn stroke(mut self, color: &str, width: f64) -> Self {
        self.stroke_color = color.to_string();
        self.stroke_width = width;
        self
    }

    pub fn fill(mut self, color: &str) -> Self {
        self.background_color = color.to_string();
        self
    }

    pub fn with_points(mut self, points: Vec<[f64; 2]>) -> Self {
        self.points = points;
        self
    }

    pub fn with_text(mut self, text: &str, font_size: f64) -> Self {
        self.text = Some(text.to_string());
        self.font_size = Some(font_size);
        self
    }

    /// Bounding box of `points`, as (min_x, min_y, max_x, max_y)
    pub fn points_bounds(&self) -> Option<(f64, f64, f64, f64)> {
        let first = self.points.first()?;
        Some(self.points.iter().fold(
            (first[0], first[1], first[0], first[1]),
            |(x0, y0, x1, y1), p| (x0.min(p[0]), y0.min(p[1]), x1.max(p[0]), y1.max(p[1])),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_element_json_is_camel_case() {
        let element = SceneElement::new("a", ElementKind::Freedraw, 1.0, 2.0, 3.0, 4.0)
            .stroke("red", 4.0)
            .with_points(vec![[0.0, 0.0], [3.0, 4.0]]);
        let json = serde_json::to_value(&element).unwrap();
        assert_eq!(json["type"], "freedraw");
        assert_eq!(json["strokeColor"], "red");
        assert_eq!(json["fillStyle"], "solid");
        assert_eq!(json["points"][1][1], 4.0);
        assert!(json.get("fileId").is_none());
    }

    #[test]
    fn test_missing_fields_take_defaults() {
        let json = r#"{"id":"x","type":"rectangle","x":0,"y":0,"width":10,"height":10,
            "strokeColor":"red","backgroundColor":"transparent","strokeWidth":2}"#;
        let element: SceneElement = serde_json::from_str(json).unwrap();
        assert_eq!(element.opacity, 100.0);
        assert!(element.points.is_empty());
        assert!(!element.locked);
    }

    #[test]
    fn test_points_bounds() {
        let element = SceneElement::new("a", ElementKind::Line, 0.0, 0.0, 0.0, 0.0)
            .with_points(vec![[0.0, 0.0], [-2.0, 5.0], [4.0, -1.0]]);
        assert_eq!(element.points_bounds(), Some((-2.0, -1.0, 4.0, 5.0)));
    }
}
