//! Software canvas backed by tiny-skia
//!
//! Holds a scene in memory the same way the widget does and flattens it to a
//! PNG on export. Used by the command line tool and by tests.

use std::cell::{Cell, RefCell};
use std::io;

use tiny_skia::{
    FillRule, FilterQuality, IntSize, LineCap, LineJoin, Paint, PathBuilder, Pixmap, PixmapPaint,
    Rect, Stroke, Transform,
};

use super::element::{ElementKind, SceneElement};
use super::library::LibraryItem;
use super::text::draw_text;
use super::{AppState, BinaryFile, CanvasWidget, ExportRequest, SceneUpdate, Tool};
use crate::domain::PNG_MIME_TYPE;
use crate::error::ViewerError;
use crate::ingest::Blob;
use crate::layout::geometry::{arrow, ellipse};
use crate::layout::text_flow::LINE_HEIGHT_RATIO;

/// Blank margin around the scene bounds on export
pub const EXPORT_PADDING: f64 = 10.0;
const DEFAULT_FONT_SIZE: f64 = 20.0;
const LABEL_PADDING: f32 = 5.0;

/// Parse a CSS color as used in element styles
///
/// Supports `#rgb`, `#rrggbb`, `#rrggbbaa` and the named colors the overlay
/// and presets use.
pub fn parse_color(css: &str) -> Option<[u8; 4]> {
    let css = css.trim();
    if let Some(hex) = css.strip_prefix('#') {
        let channel = |s: &str| u8::from_str_radix(s, 16).ok();
        return match hex.len() {
            3 => {
                let mut rgb = [0u8; 3];
                for (i, c) in hex.chars().enumerate() {
                    let v = c.to_digit(16)? as u8;
                    rgb[i] = v * 16 + v;
                }
                Some([rgb[0], rgb[1], rgb[2], 255])
            }
            6 | 8 => Some([
                channel(hex.get(0..2)?)?,
                channel(hex.get(2..4)?)?,
                channel(hex.get(4..6)?)?,
                hex.get(6..8).map_or(Some(255), channel)?,
            ]),
            _ => None,
        };
    }
    match css.to_ascii_lowercase().as_str() {
        "transparent" => Some([0, 0, 0, 0]),
        "black" => Some([0, 0, 0, 255]),
        "white" => Some([255, 255, 255, 255]),
        "red" => Some([255, 0, 0, 255]),
        "orange" => Some([255, 165, 0, 255]),
        "purple" => Some([128, 0, 128, 255]),
        "green" => Some([0, 128, 0, 255]),
        _ => None,
    }
}

fn paint_for(css: &str, opacity: f64) -> Option<Paint<'static>> {
    let [r, g, b, a] = parse_color(css)?;
    let a = (a as f64 * (opacity / 100.0).clamp(0.0, 1.0)).round() as u8;
    if a == 0 {
        return None;
    }
    let mut paint = Paint::default();
    paint.set_color_rgba8(r, g, b, a);
    paint.anti_alias = true;
    Some(paint)
}

fn round_stroke(width: f64) -> Stroke {
    Stroke {
        width: width as f32,
        line_cap: LineCap::Round,
        line_join: LineJoin::Round,
        ..Default::default()
    }
}

/// Build an ellipse path using cubic bezier curves
fn build_ellipse_path(cx: f32, cy: f32, rx: f32, ry: f32) -> Option<tiny_skia::Path> {
    let kx = rx * ellipse::BEZIER_K;
    let ky = ry * ellipse::BEZIER_K;

    let mut pb = PathBuilder::new();
    pb.move_to(cx, cy - ry);
    pb.cubic_to(cx + kx, cy - ry, cx + rx, cy - ky, cx + rx, cy);
    pb.cubic_to(cx + rx, cy + ky, cx + kx, cy + ry, cx, cy + ry);
    pb.cubic_to(cx - kx, cy + ry, cx - rx, cy + ky, cx - rx, cy);
    pb.cubic_to(cx - rx, cy - ky, cx - kx, cy - ry, cx, cy - ry);
    pb.close();
    pb.finish()
}

/// Polyline through `points`, plus arrowhead lines at the end if asked
fn build_polyline_path(
    ox: f64,
    oy: f64,
    points: &[[f64; 2]],
    head: bool,
) -> Option<tiny_skia::Path> {
    let (first, rest) = points.split_first()?;
    let mut pb = PathBuilder::new();
    pb.move_to((ox + first[0]) as f32, (oy + first[1]) as f32);
    for p in rest {
        pb.line_to((ox + p[0]) as f32, (oy + p[1]) as f32);
    }
    if head
        && let [.., from, to] = points
        && let Some(lines) = arrow::head_points((from[0], from[1]), (to[0], to[1]))
    {
        for (hx, hy) in lines {
            pb.move_to((ox + to[0]) as f32, (oy + to[1]) as f32);
            pb.line_to((ox + hx) as f32, (oy + hy) as f32);
        }
    }
    pb.finish()
}

/// Scene-space bounds of an element, as (min_x, min_y, max_x, max_y)
fn element_bounds(element: &SceneElement) -> (f64, f64, f64, f64) {
    if element.kind.is_linear()
        && let Some((x0, y0, x1, y1)) = element.points_bounds()
    {
        let half = element.stroke_width / 2.0;
        return (
            element.x + x0 - half,
            element.y + y0 - half,
            element.x + x1 + half,
            element.y + y1 + half,
        );
    }
    (
        element.x,
        element.y,
        element.x + element.width,
        element.y + element.height,
    )
}

fn scene_bounds(elements: &[SceneElement]) -> Option<(f64, f64, f64, f64)> {
    elements.iter().map(element_bounds).reduce(|a, b| {
        (a.0.min(b.0), a.1.min(b.1), a.2.max(b.2), a.3.max(b.3))
    })
}

/// Decode an image file into a premultiplied pixmap
fn decode_pixmap(file: &BinaryFile) -> Result<Pixmap, ViewerError> {
    let decoded = image::load_from_memory(&file.bytes)
        .map_err(|err| ViewerError::DecodeFailed(format!("{}: {err}", file.id)))?
        .to_rgba8();
    let (w, h) = decoded.dimensions();
    let mut data = decoded.into_raw();
    for px in data.chunks_exact_mut(4) {
        let a = px[3] as u16;
        for c in &mut px[..3] {
            *c = ((*c as u16 * a + 127) / 255) as u8;
        }
    }
    let size = IntSize::from_wh(w, h)
        .ok_or_else(|| ViewerError::DecodeFailed(format!("{}: empty image", file.id)))?;
    Pixmap::from_vec(data, size)
        .ok_or_else(|| ViewerError::DecodeFailed(format!("{}: invalid image size", file.id)))
}

fn write_png<W: io::Write>(w: W, pixmap: &Pixmap) -> Result<(), png::EncodingError> {
    let data: Vec<u8> = pixmap
        .pixels()
        .iter()
        .flat_map(|p| {
            let c = p.demultiply();
            [c.red(), c.green(), c.blue(), c.alpha()]
        })
        .collect();
    let mut encoder = png::Encoder::new(w, pixmap.width(), pixmap.height());
    encoder.set_color(png::ColorType::Rgba);
    encoder.set_depth(png::BitDepth::Eight);
    let mut writer = encoder.write_header()?;
    writer.write_image_data(&data)
}

/// Flatten `request` into a pixmap covering the scene bounds plus padding
pub fn rasterize(request: &ExportRequest) -> Result<Pixmap, ViewerError> {
    let (min_x, min_y, max_x, max_y) = scene_bounds(&request.elements)
        .ok_or_else(|| ViewerError::ExportFailed("scene is empty".to_string()))?;
    let width = (max_x - min_x + 2.0 * EXPORT_PADDING).ceil().max(1.0) as u32;
    let height = (max_y - min_y + 2.0 * EXPORT_PADDING).ceil().max(1.0) as u32;
    let mut pixmap = Pixmap::new(width, height)
        .ok_or_else(|| ViewerError::ExportFailed(format!("invalid export size {width}x{height}")))?;

    if request.app_state.export_background
        && let Some([r, g, b, a]) = parse_color(&request.app_state.view_background_color)
    {
        pixmap.fill(tiny_skia::Color::from_rgba8(r, g, b, a));
    }

    let (dx, dy) = (EXPORT_PADDING - min_x, EXPORT_PADDING - min_y);
    for element in &request.elements {
        draw_element(&mut pixmap, element, dx, dy, &request.files)?;
    }
    Ok(pixmap)
}

fn draw_element(
    pixmap: &mut Pixmap,
    element: &SceneElement,
    dx: f64,
    dy: f64,
    files: &[BinaryFile],
) -> Result<(), ViewerError> {
    let (x, y) = (element.x + dx, element.y + dy);
    let stroke_paint = paint_for(&element.stroke_color, element.opacity);
    let fill_paint = paint_for(&element.background_color, element.opacity);
    let stroke = round_stroke(element.stroke_width);

    match element.kind {
        ElementKind::Image => {
            let Some(file) = element
                .file_id
                .as_deref()
                .and_then(|id| files.iter().find(|f| f.id == id))
            else {
                log::warn!("Image element {} has no file, skipping", element.id);
                return Ok(());
            };
            let source = decode_pixmap(file)?;
            let sx = element.width as f32 / source.width() as f32;
            let sy = element.height as f32 / source.height() as f32;
            let paint = PixmapPaint {
                quality: FilterQuality::Bilinear,
                ..Default::default()
            };
            pixmap.draw_pixmap(
                0,
                0,
                source.as_ref(),
                &paint,
                Transform::from_row(sx, 0.0, 0.0, sy, x as f32, y as f32),
                None,
            );
        }
        ElementKind::Rectangle => {
            let rect = Rect::from_xywh(
                x as f32,
                y as f32,
                element.width as f32,
                element.height as f32,
            );
            if let Some(rect) = rect {
                let path = PathBuilder::from_rect(rect);
                if let Some(paint) = &fill_paint {
                    pixmap.fill_path(&path, paint, FillRule::Winding, Transform::identity(), None);
                }
                if let Some(paint) = &stroke_paint {
                    pixmap.stroke_path(&path, paint, &stroke, Transform::identity(), None);
                }
            }
            if let Some(label) = &element.label
                && let Some([r, g, b, a]) = parse_color(&label.stroke_color)
            {
                let line_height = (label.font_size * LINE_HEIGHT_RATIO) as f32;
                draw_text(
                    pixmap,
                    &label.text,
                    x as f32 + LABEL_PADDING,
                    y as f32 + LABEL_PADDING,
                    label.font_size as f32,
                    line_height,
                    [r, g, b, a],
                );
            }
        }
        ElementKind::Ellipse => {
            let (rx, ry) = (element.width / 2.0, element.height / 2.0);
            let path = build_ellipse_path((x + rx) as f32, (y + ry) as f32, rx as f32, ry as f32);
            if let Some(path) = path {
                if let Some(paint) = &fill_paint {
                    pixmap.fill_path(&path, paint, FillRule::Winding, Transform::identity(), None);
                }
                if let Some(paint) = &stroke_paint {
                    pixmap.stroke_path(&path, paint, &stroke, Transform::identity(), None);
                }
            }
        }
        ElementKind::Line | ElementKind::Arrow | ElementKind::Freedraw => {
            let head = element.kind == ElementKind::Arrow;
            if let Some(path) = build_polyline_path(x, y, &element.points, head)
                && let Some(paint) = &stroke_paint
            {
                pixmap.stroke_path(&path, paint, &stroke, Transform::identity(), None);
            }
        }
        ElementKind::Text => {
            if let (Some(text), Some(rgba)) = (&element.text, parse_color(&element.stroke_color)) {
                let font_size = element.font_size.unwrap_or(DEFAULT_FONT_SIZE);
                draw_text(
                    pixmap,
                    text,
                    x as f32,
                    y as f32,
                    font_size as f32,
                    (font_size * LINE_HEIGHT_RATIO) as f32,
                    rgba,
                );
            }
        }
    }
    Ok(())
}

/// Encode `pixmap` as PNG bytes
pub fn encode_png(pixmap: &Pixmap) -> Result<Vec<u8>, ViewerError> {
    let mut out = Vec::new();
    write_png(&mut out, pixmap).map_err(|err| ViewerError::ExportFailed(err.to_string()))?;
    Ok(out)
}

/// In-process [`CanvasWidget`]
#[derive(Debug, Default)]
pub struct RasterCanvas {
    elements: RefCell<Vec<SceneElement>>,
    app_state: RefCell<AppState>,
    files: RefCell<Vec<BinaryFile>>,
    library: RefCell<Vec<LibraryItem>>,
    tool: Cell<Tool>,
    scrolled_to: RefCell<Option<String>>,
}

impl RasterCanvas {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active_tool(&self) -> Tool {
        self.tool.get()
    }

    pub fn library(&self) -> Vec<LibraryItem> {
        self.library.borrow().clone()
    }

    /// Element last passed to [`CanvasWidget::scroll_to_content`]
    pub fn scrolled_to(&self) -> Option<String> {
        self.scrolled_to.borrow().clone()
    }

    /// Append elements, as a user drawing on the canvas would
    pub fn push_elements(&self, elements: impl IntoIterator<Item = SceneElement>) {
        self.elements.borrow_mut().extend(elements);
    }

    /// Current scene flattened to PNG bytes
    pub fn render_png(&self) -> Result<Vec<u8>, ViewerError> {
        let request = ExportRequest {
            elements: self.scene_elements(),
            app_state: self.app_state(),
            files: self.files(),
            mime_type: PNG_MIME_TYPE.to_string(),
        };
        encode_png(&rasterize(&request)?)
    }
}

impl CanvasWidget for RasterCanvas {
    fn scene_elements(&self) -> Vec<SceneElement> {
        self.elements.borrow().clone()
    }

    fn app_state(&self) -> AppState {
        self.app_state.borrow().clone()
    }

    fn files(&self) -> Vec<BinaryFile> {
        self.files.borrow().clone()
    }

    fn add_files(&self, files: Vec<BinaryFile>) {
        let mut current = self.files.borrow_mut();
        for file in files {
            current.retain(|f| f.id != file.id);
            current.push(file);
        }
    }

    fn update_scene(&self, update: SceneUpdate) {
        if let Some(elements) = update.elements {
            *self.elements.borrow_mut() = elements;
        }
        if let Some(app_state) = update.app_state {
            *self.app_state.borrow_mut() = app_state;
        }
    }

    fn set_active_tool(&self, tool: Tool) {
        self.tool.set(tool);
    }

    fn scroll_to_content(&self, element_id: &str, fit: bool) {
        let target = self
            .elements
            .borrow()
            .iter()
            .find(|e| e.id == element_id)
            .map(|e| (e.x, e.y));
        if let Some((x, y)) = target {
            let mut state = self.app_state.borrow_mut();
            state.scroll_x = -x;
            state.scroll_y = -y;
            if fit {
                state.zoom = 1.0;
            }
        }
        *self.scrolled_to.borrow_mut() = Some(element_id.to_string());
    }

    fn update_library(&self, items: Vec<LibraryItem>) {
        *self.library.borrow_mut() = items;
    }

    async fn export_to_raster_blob(&self, request: ExportRequest) -> Result<Blob, ViewerError> {
        if request.mime_type != PNG_MIME_TYPE {
            return Err(ViewerError::ExportFailed(format!(
                "unsupported export type {}",
                request.mime_type
            )));
        }
        let pixmap = rasterize(&request)?;
        log::debug!(
            "Rasterized {} elements to {}x{}",
            request.elements.len(),
            pixmap.width(),
            pixmap.height()
        );
        Ok(Blob {
            mime_type: PNG_MIME_TYPE.to_string(),
            bytes: encode_png(&pixmap)?,
        })
    }
}
