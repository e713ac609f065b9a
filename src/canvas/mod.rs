//! Port to the drawing canvas widget
//!
//! This module contains:
//! - [`CanvasWidget`], the imperative handle the editors drive
//! - The widget's element schema and the translation from overlay primitives
//! - The preset shape library
//! - [`RasterCanvas`], a software implementation used offline and in tests

pub mod element;
pub mod library;
pub mod raster;
pub mod scene;
pub mod text;

use serde::{Deserialize, Serialize};

use crate::error::ViewerError;
use crate::ingest::Blob;

pub use element::{ElementKind, ElementLabel, FillStyle, SceneElement, StrokeStyle};
pub use library::{LibraryItem, preset_library};
pub use raster::RasterCanvas;
pub use scene::{SceneBuilder, normalize};

/// View state of the widget
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppState {
    pub view_background_color: String,
    pub scroll_x: f64,
    pub scroll_y: f64,
    pub zoom: f64,
    pub export_background: bool,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            view_background_color: "#ffffff".to_string(),
            scroll_x: 0.0,
            scroll_y: 0.0,
            zoom: 1.0,
            export_background: true,
        }
    }
}

/// Image data referenced by `image` elements through `file_id`
#[derive(Clone, Debug, PartialEq)]
pub struct BinaryFile {
    pub id: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
    /// Epoch milliseconds
    pub created: i64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Tool {
    #[default]
    Selection,
    Hand,
    Freedraw,
    Rectangle,
    Ellipse,
    Arrow,
    Text,
}

/// Partial scene replacement; `None` keeps the current value
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SceneUpdate {
    pub elements: Option<Vec<SceneElement>>,
    pub app_state: Option<AppState>,
}

impl SceneUpdate {
    pub fn elements(elements: Vec<SceneElement>) -> Self {
        Self {
            elements: Some(elements),
            app_state: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ExportRequest {
    pub elements: Vec<SceneElement>,
    pub app_state: AppState,
    pub files: Vec<BinaryFile>,
    pub mime_type: String,
}

/// Imperative handle to a mounted canvas
///
/// Handles are shared with the widget, so every method takes `&self`.
pub trait CanvasWidget {
    fn scene_elements(&self) -> Vec<SceneElement>;

    fn app_state(&self) -> AppState;

    fn files(&self) -> Vec<BinaryFile>;

    fn add_files(&self, files: Vec<BinaryFile>);

    fn update_scene(&self, update: SceneUpdate);

    fn set_active_tool(&self, tool: Tool);

    /// Scroll so `element_id` is visible, zooming to fit it if `fit` is set
    fn scroll_to_content(&self, element_id: &str, fit: bool);

    fn update_library(&self, items: Vec<LibraryItem>);

    async fn export_to_raster_blob(&self, request: ExportRequest) -> Result<Blob, ViewerError>;

    fn element_count(&self) -> usize {
        self.scene_elements().len()
    }
}
