//! Translation from overlay primitives to canvas elements

use std::cell::RefCell;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::element::{ElementKind, ElementLabel, FillStyle, SceneElement, StrokeStyle};
use crate::domain::{DisplayTransform, MarkColor, OverlayPrimitive};

/// Prefix of the image element id; the file id follows
pub const IMAGE_ELEMENT_PREFIX: &str = "image_";

/// Make an element safe to hand to the widget
///
/// Elements come back unlocked with solid stroke and fill. Linear elements
/// without points get a single segment across their box.
pub fn normalize(mut element: SceneElement) -> SceneElement {
    element.locked = false;
    element.fill_style = FillStyle::Solid;
    element.stroke_style = StrokeStyle::Solid;
    if element.kind.is_linear() && element.points.is_empty() {
        element.points = vec![[0.0, 0.0], [element.width, element.height]];
    }
    element
}

/// Builds widget scenes, assigning a jitter seed to each element
pub struct SceneBuilder {
    rng: RefCell<StdRng>,
}

impl Default for SceneBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SceneBuilder {
    pub fn new() -> Self {
        Self {
            rng: RefCell::new(StdRng::from_entropy()),
        }
    }

    /// Deterministic seeds, for reproducible output
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: RefCell::new(StdRng::seed_from_u64(seed)),
        }
    }

    fn seeded(&self, element: SceneElement) -> SceneElement {
        let mut element = normalize(element);
        element.seed = self.rng.borrow_mut().gen_range(1..i32::MAX as u32);
        element
    }

    /// Image element covering the display area, anchored at the origin
    pub fn image_element(&self, file_id: &str, transform: &DisplayTransform) -> SceneElement {
        let mut element = SceneElement::new(
            format!("{IMAGE_ELEMENT_PREFIX}{file_id}"),
            ElementKind::Image,
            0.0,
            0.0,
            transform.display_width,
            transform.display_height,
        )
        .stroke(MarkColor::Transparent.css(), 1.0);
        element.roughness = 0.0;
        element.file_id = Some(file_id.to_string());
        self.seeded(element)
    }

    /// Widget element for one overlay primitive; `index` keeps ids unique
    pub fn element_for(&self, primitive: &OverlayPrimitive, index: usize) -> SceneElement {
        let element = match primitive {
            OverlayPrimitive::Check(check) => {
                let points: Vec<[f64; 2]> = check.points.iter().map(|&(x, y)| [x, y]).collect();
                let mut element = SceneElement::new(
                    format!("check_{index}"),
                    ElementKind::Line,
                    check.x,
                    check.y,
                    0.0,
                    0.0,
                )
                .stroke(check.color.css(), check.stroke_width)
                .with_points(points);
                if let Some((x0, y0, x1, y1)) = element.points_bounds() {
                    element.width = x1 - x0;
                    element.height = y1 - y0;
                }
                element.roughness = check.roughness;
                element
            }
            OverlayPrimitive::Ellipse(ellipse) => {
                let mut element = SceneElement::new(
                    format!("ellipse_{index}"),
                    ElementKind::Ellipse,
                    ellipse.x,
                    ellipse.y,
                    ellipse.width,
                    ellipse.height,
                )
                .stroke(ellipse.color.css(), ellipse.stroke_width)
                .fill(MarkColor::Transparent.css());
                element.roughness = ellipse.roughness;
                element
            }
            OverlayPrimitive::TextLabel(label) => SceneElement::new(
                format!("label_{index}"),
                ElementKind::Text,
                label.x,
                label.y,
                label.width,
                label.height,
            )
            .stroke(label.color.css(), 1.0)
            .with_text(&label.text, label.font_size),
            OverlayPrimitive::TextBox(text_box) => {
                let mut element = SceneElement::new(
                    text_box.id.clone(),
                    ElementKind::Rectangle,
                    text_box.x,
                    text_box.y,
                    text_box.width,
                    text_box.height,
                )
                .stroke(text_box.border.css(), 1.0)
                .fill(MarkColor::Transparent.css());
                element.roughness = 0.0;
                element.label = Some(ElementLabel {
                    text: text_box.lines.join("\n"),
                    font_size: text_box.font_size,
                    stroke_color: text_box.text_color.css().to_string(),
                });
                element
            }
        };
        self.seeded(element)
    }

    /// Full grading scene: the image first, then every primitive in order
    pub fn overlay_scene(
        &self,
        image: Option<(&str, &DisplayTransform)>,
        primitives: &[OverlayPrimitive],
    ) -> Vec<SceneElement> {
        let mut elements = Vec::with_capacity(primitives.len() + 1);
        if let Some((file_id, transform)) = image {
            elements.push(self.image_element(file_id, transform));
        }
        elements.extend(
            primitives
                .iter()
                .enumerate()
                .map(|(index, primitive)| self.element_for(primitive, index)),
        );
        elements
    }
}
