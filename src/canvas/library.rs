//! Preset shapes offered in the editor's library panel

use serde::{Deserialize, Serialize};

use super::element::{ElementKind, SceneElement};
use super::scene::normalize;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LibraryItem {
    pub id: String,
    pub status: String,
    pub elements: Vec<SceneElement>,
    /// Epoch milliseconds
    pub created: i64,
}

fn label(text: &str, stroke: &str, background: &str) -> Vec<SceneElement> {
    let mut frame = SceneElement::new("", ElementKind::Rectangle, 0.0, 0.0, 80.0, 40.0)
        .stroke(stroke, 2.0)
        .fill(background);
    frame.roughness = 0.0;
    let caption = SceneElement::new("", ElementKind::Text, 15.0, 10.0, 50.0, 24.0)
        .stroke(stroke, 1.0)
        .with_text(text, 24.0);
    vec![frame, caption]
}

fn preset_shapes() -> Vec<Vec<SceneElement>> {
    let mut highlight = SceneElement::new("", ElementKind::Rectangle, 0.0, 0.0, 200.0, 60.0)
        .stroke("#fab005", 2.0)
        .fill("#fff3bf");
    highlight.opacity = 70.0;

    vec![
        vec![
            SceneElement::new("", ElementKind::Ellipse, 0.0, 0.0, 100.0, 100.0)
                .stroke("#ff0000", 3.0),
        ],
        vec![
            SceneElement::new("", ElementKind::Arrow, 0.0, 0.0, 150.0, 100.0)
                .stroke("#ff0000", 3.0)
                .with_points(vec![[0.0, 0.0], [150.0, 100.0]]),
        ],
        vec![highlight],
        label("重点", "#ff0000", "#ffe8e8"),
        label("问题", "#fab005", "#fff3bf"),
        label("通过", "#40c057", "#d3f9d8"),
        vec![
            SceneElement::new("", ElementKind::Freedraw, 0.0, 0.0, 60.0, 50.0)
                .stroke("#40c057", 6.0)
                .with_points(vec![
                    [0.0, 30.0],
                    [10.0, 40.0],
                    [15.0, 45.0],
                    [20.0, 50.0],
                    [40.0, 20.0],
                    [50.0, 10.0],
                    [60.0, 0.0],
                ]),
        ],
        vec![
            SceneElement::new("", ElementKind::Freedraw, 0.0, 0.0, 50.0, 50.0)
                .stroke("#ff0000", 6.0)
                .with_points(vec![[0.0, 0.0], [50.0, 50.0]]),
            SceneElement::new("", ElementKind::Freedraw, 0.0, 50.0, 50.0, 50.0)
                .stroke("#ff0000", 6.0)
                .with_points(vec![[0.0, 0.0], [50.0, -50.0]]),
        ],
    ]
}

/// Red circle, red arrow, yellow highlight, three stamp labels, green check
/// and red cross, stamped with `created`
pub fn preset_library(created: i64) -> Vec<LibraryItem> {
    preset_shapes()
        .into_iter()
        .enumerate()
        .map(|(i, elements)| LibraryItem {
            id: format!("preset_{i}"),
            status: "published".to_string(),
            elements: elements
                .into_iter()
                .enumerate()
                .map(|(j, mut element)| {
                    element.id = format!("preset_{i}_{j}");
                    normalize(element)
                })
                .collect(),
            created,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets() {
        let items = preset_library(1_700_000_000_000);
        assert_eq!(items.len(), 8);
        assert!(items.iter().all(|item| item.status == "published"));
        assert_eq!(items[3].elements.len(), 2);
        assert_eq!(items[3].elements[1].text.as_deref(), Some("重点"));
        assert_eq!(items[3].elements[1].id, "preset_3_1");
        assert_eq!(items[2].elements[0].opacity, 70.0);
        assert_eq!(items[7].elements[1].y, 50.0);
        assert_eq!(items[0].elements[0].kind, ElementKind::Ellipse);
    }

    #[test]
    fn test_preset_json_shape() {
        let json = serde_json::to_value(&preset_library(5)[6]).unwrap();
        assert_eq!(json["created"], 5);
        assert_eq!(json["elements"][0]["type"], "freedraw");
        assert_eq!(json["elements"][0]["points"].as_array().map(Vec::len), Some(7));
    }
}
