//! Test doubles for the host, canvas, network and PDF ports

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};
use std::io::Cursor;
use std::rc::Rc;
use std::time::Duration;

use image::{ImageFormat, Rgb, RgbImage};
use tiny_skia::{Color, Pixmap};

use crate::canvas::{
    AppState, BinaryFile, CanvasWidget, ExportRequest, LibraryItem, RasterCanvas, SceneElement,
    SceneUpdate, Tool,
};
use crate::domain::Attachment;
use crate::error::{FetchCause, ViewerError};
use crate::host::{
    CellRef, FieldMeta, FieldType, HostPlatform, Selection, TextSegment, ToastSeverity, UploadFile,
};
use crate::ingest::{Blob, FetchResponse, Fetcher};
use crate::pdf::{PageViewport, PdfBackend, PdfDocument, PdfFailure, RenderCancel};

pub const GRADE_FIELD: &str = "自动批改结果参考";

/// Solid grey PNG
pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_pixel(width, height, Rgb([200, 200, 200]));
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, ImageFormat::Png).unwrap();
    out.into_inner()
}

pub fn attachment(name: &str, mime_type: &str, token: &str) -> Attachment {
    Attachment {
        name: name.to_string(),
        size: 1024,
        mime_type: mime_type.to_string(),
        token: token.to_string(),
        time_stamp: 0,
    }
}

// ============================================================================
// Fetcher
// ============================================================================

/// Scripted responses per URL
///
/// Queued results are consumed first, then the sticky response. A URL with
/// neither fails with a network error.
#[derive(Default)]
pub struct FakeFetcher {
    queued: RefCell<HashMap<String, VecDeque<Result<FetchResponse, ViewerError>>>>,
    sticky: RefCell<HashMap<String, FetchResponse>>,
    delays: RefCell<HashMap<String, Duration>>,
    calls: RefCell<HashMap<String, u32>>,
}

impl FakeFetcher {
    pub fn push_response(&self, url: &str, response: FetchResponse) {
        self.queued
            .borrow_mut()
            .entry(url.to_string())
            .or_default()
            .push_back(Ok(response));
    }

    pub fn push_error(&self, url: &str, cause: FetchCause) {
        self.queued
            .borrow_mut()
            .entry(url.to_string())
            .or_default()
            .push_back(Err(ViewerError::FetchFailed {
                cause,
                detail: url.to_string(),
            }));
    }

    pub fn set_response(&self, url: &str, response: FetchResponse) {
        self.sticky.borrow_mut().insert(url.to_string(), response);
    }

    pub fn set_image(&self, url: &str, width: u32, height: u32) {
        self.set_response(url, FetchResponse::ok(Some("image/png"), png_bytes(width, height)));
    }

    pub fn set_delay(&self, url: &str, delay: Duration) {
        self.delays.borrow_mut().insert(url.to_string(), delay);
    }

    pub fn calls(&self, url: &str) -> u32 {
        self.calls.borrow().get(url).copied().unwrap_or(0)
    }
}

impl Fetcher for FakeFetcher {
    async fn get(&self, url: &str, _accept: &str) -> Result<FetchResponse, ViewerError> {
        *self.calls.borrow_mut().entry(url.to_string()).or_default() += 1;
        let delay = self.delays.borrow().get(url).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let queued = self
            .queued
            .borrow_mut()
            .get_mut(url)
            .and_then(VecDeque::pop_front);
        if let Some(result) = queued {
            return result;
        }
        self.sticky
            .borrow()
            .get(url)
            .cloned()
            .ok_or_else(|| ViewerError::FetchFailed {
                cause: FetchCause::Network,
                detail: format!("no route to {url}"),
            })
    }
}

// ============================================================================
// Host
// ============================================================================

type Key = (String, String);

fn key(record: &str, field: &str) -> Key {
    (record.to_string(), field.to_string())
}

/// One table "t" with a primary title, a grade text field and three
/// attachment fields ("附件", "备用附件", "批改结果")
pub struct FakeHost {
    selection: RefCell<Selection>,
    fields: Vec<FieldMeta>,
    texts: RefCell<HashMap<Key, String>>,
    cell_strings: RefCell<HashMap<Key, String>>,
    attachments: RefCell<HashMap<Key, Vec<Attachment>>>,
    list_delays: RefCell<HashMap<String, Duration>>,
    uploads: RefCell<Vec<UploadFile>>,
    fail_upload: Cell<bool>,
    fail_set_list: Cell<bool>,
    set_list_calls: Cell<u32>,
    toasts: RefCell<Vec<(String, ToastSeverity)>>,
}

impl Default for FakeHost {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeHost {
    pub fn new() -> Self {
        let field = |id: &str, name: &str, field_type, is_primary| FieldMeta {
            id: id.to_string(),
            name: name.to_string(),
            field_type,
            is_primary,
        };
        Self {
            selection: RefCell::new(Selection::default()),
            fields: vec![
                field("title", "标题", FieldType::Text, true),
                field("att", "附件", FieldType::Attachment, false),
                field("grade", GRADE_FIELD, FieldType::Text, false),
                field("spare", "备用附件", FieldType::Attachment, false),
                field("result", "批改结果", FieldType::Attachment, false),
            ],
            texts: RefCell::default(),
            cell_strings: RefCell::default(),
            attachments: RefCell::default(),
            list_delays: RefCell::default(),
            uploads: RefCell::default(),
            fail_upload: Cell::new(false),
            fail_set_list: Cell::new(false),
            set_list_calls: Cell::new(0),
            toasts: RefCell::default(),
        }
    }

    pub fn select(&self, selection: Selection) {
        *self.selection.borrow_mut() = selection;
    }

    pub fn set_text(&self, record: &str, field_id: &str, text: &str) {
        self.texts.borrow_mut().insert(key(record, field_id), text.to_string());
    }

    pub fn set_cell_string(&self, record: &str, field_id: &str, value: &str) {
        self.cell_strings
            .borrow_mut()
            .insert(key(record, field_id), value.to_string());
    }

    pub fn set_attachments(&self, record: &str, field_id: &str, list: Vec<Attachment>) {
        self.attachments.borrow_mut().insert(key(record, field_id), list);
    }

    pub fn attachments(&self, record: &str, field_id: &str) -> Vec<Attachment> {
        self.attachments
            .borrow()
            .get(&key(record, field_id))
            .cloned()
            .unwrap_or_default()
    }

    /// Delay attachment list reads for `record`
    pub fn set_list_delay(&self, record: &str, delay: Duration) {
        self.list_delays.borrow_mut().insert(record.to_string(), delay);
    }

    pub fn fail_upload(&self, fail: bool) {
        self.fail_upload.set(fail);
    }

    pub fn fail_set_list(&self, fail: bool) {
        self.fail_set_list.set(fail);
    }

    pub fn uploads(&self) -> Vec<UploadFile> {
        self.uploads.borrow().clone()
    }

    pub fn set_list_calls(&self) -> u32 {
        self.set_list_calls.get()
    }

    pub fn toasts(&self) -> Vec<(String, ToastSeverity)> {
        self.toasts.borrow().clone()
    }
}

impl HostPlatform for FakeHost {
    async fn current_selection(&self) -> Result<Selection, ViewerError> {
        Ok(self.selection.borrow().clone())
    }

    async fn field_meta_list(&self, _table_id: &str) -> Result<Vec<FieldMeta>, ViewerError> {
        Ok(self.fields.clone())
    }

    async fn field_meta(&self, _table_id: &str, field_id: &str) -> Result<FieldMeta, ViewerError> {
        self.fields
            .iter()
            .find(|f| f.id == field_id)
            .cloned()
            .ok_or_else(|| ViewerError::Host(format!("no field {field_id}")))
    }

    async fn cell_string(&self, cell: &CellRef) -> Result<String, ViewerError> {
        self.cell_strings
            .borrow()
            .get(&key(&cell.record_id, &cell.field_id))
            .cloned()
            .ok_or_else(|| ViewerError::Host(format!("no record {}", cell.record_id)))
    }

    async fn text_field_value(&self, cell: &CellRef) -> Result<Vec<TextSegment>, ViewerError> {
        Ok(self
            .texts
            .borrow()
            .get(&key(&cell.record_id, &cell.field_id))
            .map(|text| vec![TextSegment::plain(text)])
            .unwrap_or_default())
    }

    async fn attachment_list(&self, cell: &CellRef) -> Result<Vec<Attachment>, ViewerError> {
        let delay = self.list_delays.borrow().get(&cell.record_id).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Ok(self.attachments(&cell.record_id, &cell.field_id))
    }

    async fn attachment_urls(&self, cell: &CellRef) -> Result<Vec<Option<String>>, ViewerError> {
        Ok(self
            .attachments(&cell.record_id, &cell.field_id)
            .iter()
            .map(|a| Some(format!("https://files/{}", a.token)))
            .collect())
    }

    async fn set_attachment_list(
        &self,
        cell: &CellRef,
        attachments: Vec<Attachment>,
    ) -> Result<(), ViewerError> {
        self.set_list_calls.set(self.set_list_calls.get() + 1);
        if self.fail_set_list.get() {
            return Err(ViewerError::Host("permission denied".to_string()));
        }
        self.set_attachments(&cell.record_id, &cell.field_id, attachments);
        Ok(())
    }

    async fn upload_file(&self, file: UploadFile) -> Result<String, ViewerError> {
        if self.fail_upload.get() {
            return Err(ViewerError::Host("upload rejected".to_string()));
        }
        let mut uploads = self.uploads.borrow_mut();
        uploads.push(file);
        Ok(format!("tok-{}", uploads.len()))
    }

    fn show_toast(&self, message: &str, severity: ToastSeverity) {
        self.toasts.borrow_mut().push((message.to_string(), severity));
    }
}

// ============================================================================
// Canvas
// ============================================================================

/// [`RasterCanvas`] that records scene updates and can stall or fail exports
#[derive(Default)]
pub struct FakeCanvas {
    inner: RasterCanvas,
    updates: Cell<u32>,
    export_delay: Cell<Duration>,
    fail_export: Cell<bool>,
}

impl FakeCanvas {
    pub fn raster(&self) -> &RasterCanvas {
        &self.inner
    }

    pub fn updates(&self) -> u32 {
        self.updates.get()
    }

    pub fn set_export_delay(&self, delay: Duration) {
        self.export_delay.set(delay);
    }

    pub fn fail_export(&self, fail: bool) {
        self.fail_export.set(fail);
    }

    /// Simulate the user drawing `count` strokes
    pub fn draw_strokes(&self, count: usize) {
        let start = self.inner.scene_elements().len();
        self.inner.push_elements((0..count).map(|i| {
            SceneElement::new(
                format!("stroke_{}", start + i),
                crate::canvas::ElementKind::Freedraw,
                5.0,
                5.0,
                10.0,
                10.0,
            )
            .stroke("red", 2.0)
        }));
    }
}

impl CanvasWidget for FakeCanvas {
    fn scene_elements(&self) -> Vec<SceneElement> {
        self.inner.scene_elements()
    }

    fn app_state(&self) -> AppState {
        self.inner.app_state()
    }

    fn files(&self) -> Vec<BinaryFile> {
        self.inner.files()
    }

    fn add_files(&self, files: Vec<BinaryFile>) {
        self.inner.add_files(files);
    }

    fn update_scene(&self, update: SceneUpdate) {
        self.updates.set(self.updates.get() + 1);
        self.inner.update_scene(update);
    }

    fn set_active_tool(&self, tool: Tool) {
        self.inner.set_active_tool(tool);
    }

    fn scroll_to_content(&self, element_id: &str, fit: bool) {
        self.inner.scroll_to_content(element_id, fit);
    }

    fn update_library(&self, items: Vec<LibraryItem>) {
        self.inner.update_library(items);
    }

    async fn export_to_raster_blob(&self, request: ExportRequest) -> Result<Blob, ViewerError> {
        let delay = self.export_delay.get();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if self.fail_export.get() {
            return Err(ViewerError::ExportFailed("canvas refused to export".to_string()));
        }
        self.inner.export_to_raster_blob(request).await
    }
}

// ============================================================================
// PDF
// ============================================================================

pub const PAGE_WIDTH: f32 = 100.0;
pub const PAGE_HEIGHT: f32 = 150.0;

struct PdfState {
    pages: u32,
    render_delay: Cell<Duration>,
    open_delay: Cell<Duration>,
    open_failure: RefCell<Option<PdfFailure>>,
    page_failures: RefCell<HashMap<u32, PdfFailure>>,
    opens: Cell<u32>,
    destroyed: Cell<u32>,
}

/// Backend whose documents have `pages` pages of 100x150 points
#[derive(Clone)]
pub struct FakePdfBackend(Rc<PdfState>);

impl FakePdfBackend {
    pub fn new(pages: u32) -> Self {
        Self(Rc::new(PdfState {
            pages,
            render_delay: Cell::new(Duration::ZERO),
            open_delay: Cell::new(Duration::ZERO),
            open_failure: RefCell::new(None),
            page_failures: RefCell::default(),
            opens: Cell::new(0),
            destroyed: Cell::new(0),
        }))
    }

    pub fn with_render_delay(self, delay: Duration) -> Self {
        self.0.render_delay.set(delay);
        self
    }

    pub fn with_open_delay(self, delay: Duration) -> Self {
        self.0.open_delay.set(delay);
        self
    }

    pub fn fail_open(&self, failure: PdfFailure) {
        *self.0.open_failure.borrow_mut() = Some(failure);
    }

    pub fn fail_page(&self, page: u32, failure: PdfFailure) {
        self.0.page_failures.borrow_mut().insert(page, failure);
    }

    pub fn opens(&self) -> u32 {
        self.0.opens.get()
    }

    pub fn destroyed(&self) -> u32 {
        self.0.destroyed.get()
    }
}

pub struct FakePdfDocument(Rc<PdfState>);

pub struct FakePage(u32);

impl PdfBackend for FakePdfBackend {
    type Document = FakePdfDocument;

    async fn open(&self, _url: &str) -> Result<FakePdfDocument, PdfFailure> {
        self.0.opens.set(self.0.opens.get() + 1);
        let delay = self.0.open_delay.get();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if let Some(failure) = self.0.open_failure.borrow().clone() {
            return Err(failure);
        }
        Ok(FakePdfDocument(Rc::clone(&self.0)))
    }
}

impl PdfDocument for FakePdfDocument {
    type Page = FakePage;

    fn page_count(&self) -> u32 {
        self.0.pages
    }

    async fn page(&self, number: u32) -> Result<FakePage, PdfFailure> {
        if number == 0 || number > self.0.pages {
            return Err(PdfFailure::Invalid(format!("no page {number}")));
        }
        if let Some(failure) = self.0.page_failures.borrow().get(&number) {
            return Err(failure.clone());
        }
        Ok(FakePage(number))
    }

    fn viewport(&self, _page: &FakePage, zoom: f32) -> PageViewport {
        PageViewport::at_zoom(PAGE_WIDTH, PAGE_HEIGHT, zoom)
    }

    async fn render(
        &self,
        page: &FakePage,
        _viewport: &PageViewport,
        target: &mut Pixmap,
        cancel: &RenderCancel,
    ) -> Result<(), PdfFailure> {
        let delay = self.0.render_delay.get();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if cancel.is_cancelled() {
            return Err(PdfFailure::Cancelled);
        }
        let shade = (page.0 * 40 % 256) as u8;
        target.fill(Color::from_rgba8(shade, shade, shade, 255));
        Ok(())
    }

    fn destroy(&self) {
        self.0.destroyed.set(self.0.destroyed.get() + 1);
    }
}
