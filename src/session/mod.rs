//! Annotation session
//!
//! Ties the host selection to the viewer and the editors. The session owns
//! the preview pipelines and the canvas handle, and every load it starts
//! carries a ticket so that only the latest request for the viewer (or the
//! editor) ever writes to state.

pub mod export;
pub mod messages;
pub mod state;

use std::cell::{Cell, RefCell};

use tokio::sync::mpsc;

use crate::canvas::{
    BinaryFile, CanvasWidget, SceneBuilder, SceneElement, SceneUpdate, Tool, preset_library,
};
use crate::config::AppConfig;
use crate::domain::{Attachment, AttachmentKind, AttachmentWithUrl, GradingRecord};
use crate::error::{FetchCause, Presentation, ViewerError};
use crate::host::{
    CellRef, FieldType, HostPlatform, ToastSeverity, attachment_fields_by_priority,
    check_grade_field, load_grading_records, record_title,
};
use crate::ingest::{Fetcher, ImageIngestPipeline};
use crate::layout::{OverlayBuilder, OverlayStyle};
use crate::pdf::{PdfBackend, PdfPagePipeline, RasterSurface, RenderOutcome};

pub use export::{export_canvas, export_file_name};
pub use messages::{BackOutcome, EditorMsg, NavMsg, SessionMsg};
pub use state::{
    EditGuard, EditorKind, EditorState, GradingState, Mode, SessionState, ViewStatus, ViewerState,
};

/// Preview slot of the attachment viewer
const VIEWER_SLOT: &str = "viewer";

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

fn bump(ticket: &Cell<u64>) -> u64 {
    let next = ticket.get() + 1;
    ticket.set(next);
    next
}

fn missing_url(attachment: &AttachmentWithUrl) -> ViewerError {
    ViewerError::FetchFailed {
        cause: FetchCause::Network,
        detail: format!("no download URL for {}", attachment.attachment.name),
    }
}

pub struct AnnotationSession<H, C, F, B: PdfBackend> {
    host: H,
    canvas: C,
    images: ImageIngestPipeline<F>,
    pdf: PdfPagePipeline<B>,
    surface: RasterSurface,
    overlay: OverlayBuilder,
    scenes: SceneBuilder,
    config: AppConfig,
    state: RefCell<SessionState>,
    view_ticket: Cell<u64>,
    editor_ticket: Cell<u64>,
}

impl<H, C, F, B> AnnotationSession<H, C, F, B>
where
    H: HostPlatform,
    C: CanvasWidget,
    F: Fetcher,
    B: PdfBackend,
{
    pub fn new(host: H, canvas: C, fetcher: F, backend: B, config: AppConfig) -> Self {
        Self {
            images: ImageIngestPipeline::new(
                fetcher,
                config.image.clone(),
                config.fetch.retry_policy(),
            ),
            pdf: PdfPagePipeline::new(backend, config.timeouts.pdf_load()),
            surface: RasterSurface::new(),
            overlay: OverlayBuilder::new(OverlayStyle::from(&config.text)),
            scenes: SceneBuilder::new(),
            state: RefCell::new(SessionState::new(&config.pdf)),
            view_ticket: Cell::new(0),
            editor_ticket: Cell::new(0),
            host,
            canvas,
            config,
        }
    }

    /// Use a fixed seed for element jitter
    pub fn with_scene_seed(mut self, seed: u64) -> Self {
        self.scenes = SceneBuilder::with_seed(seed);
        self
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn canvas(&self) -> &C {
        &self.canvas
    }

    pub fn images(&self) -> &ImageIngestPipeline<F> {
        &self.images
    }

    pub fn pdf(&self) -> &PdfPagePipeline<B> {
        &self.pdf
    }

    /// Raster target of the PDF viewer
    pub fn surface(&self) -> &RasterSurface {
        &self.surface
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    pub fn viewer(&self) -> ViewerState {
        self.state.borrow().viewer.clone()
    }

    pub fn mode(&self) -> Mode {
        self.state.borrow().mode
    }

    pub fn has_unexported_edits(&self) -> bool {
        let count = self.canvas.element_count();
        self.state
            .borrow()
            .editor
            .as_ref()
            .is_some_and(|editor| editor.guard.has_unexported_edits(count))
    }

    pub async fn handle(&self, msg: SessionMsg) -> Result<(), ViewerError> {
        match msg {
            SessionMsg::SelectionChanged => self.refresh_selection().await,
            SessionMsg::Nav(msg) => self.handle_nav(msg).await,
            SessionMsg::Editor(msg) => self.handle_editor(msg).await,
        }
    }

    async fn handle_nav(&self, msg: NavMsg) -> Result<(), ViewerError> {
        match msg {
            NavMsg::NextAttachment => self.next_attachment().await,
            NavMsg::PreviousAttachment => self.previous_attachment().await,
            NavMsg::Wheel(delta_y) => {
                self.wheel(delta_y);
                Ok(())
            }
            NavMsg::Pan(dx, dy) => {
                self.pan(dx, dy);
                Ok(())
            }
            NavMsg::NextPage => self.next_page().await,
            NavMsg::PreviousPage => self.previous_page().await,
            NavMsg::ZoomIn => self.zoom_pdf(self.config.pdf.zoom_step).await,
            NavMsg::ZoomOut => self.zoom_pdf(-self.config.pdf.zoom_step).await,
        }
    }

    async fn handle_editor(&self, msg: EditorMsg) -> Result<(), ViewerError> {
        match msg {
            EditorMsg::OpenImage => self.open_image_editor().await,
            EditorMsg::OpenGrading => self.open_grading_editor().await,
            EditorMsg::OpenBlank => self.open_blank_canvas().await,
            EditorMsg::NextRecord => self.next_record().await,
            EditorMsg::PreviousRecord => self.previous_record().await,
            EditorMsg::SetTarget(field_id) => {
                self.set_export_target(&field_id);
                Ok(())
            }
            EditorMsg::Export => self.export().await.map(|_| ()),
            EditorMsg::Back => {
                self.request_back();
                Ok(())
            }
            EditorMsg::ConfirmDiscard => {
                self.confirm_discard();
                Ok(())
            }
            EditorMsg::CancelDiscard => {
                self.cancel_discard();
                Ok(())
            }
        }
    }

    // ========================================================================
    // Viewer
    // ========================================================================

    fn is_current_view(&self, ticket: u64) -> bool {
        self.view_ticket.get() == ticket
    }

    fn set_status(&self, status: ViewStatus) {
        self.state.borrow_mut().viewer.status = status;
    }

    /// Record a failure of the load holding `ticket`, unless it went stale
    fn settle(&self, ticket: u64, result: Result<(), ViewerError>) -> Result<(), ViewerError> {
        match result {
            Err(_) if !self.is_current_view(ticket) => Ok(()),
            Err(err) => {
                let status = match err.presentation() {
                    Presentation::Silent => return Ok(()),
                    Presentation::EmptyState => ViewStatus::Empty(err.clone()),
                    _ if err == ViewerError::NoAttachments => ViewStatus::Empty(err.clone()),
                    _ => ViewStatus::Failed(err.clone()),
                };
                self.set_status(status);
                Err(err)
            }
            Ok(()) => Ok(()),
        }
    }

    /// Reload everything from the host's current selection
    ///
    /// The PDF document and any preview blob of the previous selection are
    /// released first. If another refresh starts before this one finishes,
    /// this one returns `Ok` without touching state.
    pub async fn refresh_selection(&self) -> Result<(), ViewerError> {
        let ticket = bump(&self.view_ticket);
        self.pdf.teardown();
        self.images.release(VIEWER_SLOT);
        {
            let mut state = self.state.borrow_mut();
            let viewer = &mut state.viewer;
            viewer.cell = None;
            viewer.attachments.clear();
            viewer.current_index = 0;
            viewer.can_grade = false;
            viewer.reset_view(&self.config.pdf);
            viewer.status = ViewStatus::Loading;
        }
        let result = self.load_selection(ticket).await;
        self.settle(ticket, result)
    }

    async fn load_selection(&self, ticket: u64) -> Result<(), ViewerError> {
        let selection = self.host.current_selection().await?;
        let Some(cell) = selection.complete() else {
            return Err(ViewerError::SelectionInvalid);
        };

        let field = self.host.field_meta(&cell.table_id, &cell.field_id).await?;
        let can_grade = check_grade_field(
            &self.host,
            &cell.table_id,
            &cell.record_id,
            &self.config.grade_field_name,
        )
        .await;
        if !self.is_current_view(ticket) {
            return Ok(());
        }
        {
            let mut state = self.state.borrow_mut();
            state.viewer.cell = Some(cell.clone());
            state.viewer.can_grade = can_grade;
        }

        if field.field_type != FieldType::Attachment {
            log::debug!("Field {} is not an attachment field", field.name);
            self.set_status(ViewStatus::BlankCanvasOffer);
            return Ok(());
        }

        let attachments = self.host.attachment_list(&cell).await?;
        let urls = self.host.attachment_urls(&cell).await?;
        if !self.is_current_view(ticket) {
            return Ok(());
        }
        if attachments.is_empty() {
            return Err(ViewerError::NoAttachments);
        }

        let attachments: Vec<AttachmentWithUrl> = attachments
            .into_iter()
            .enumerate()
            .map(|(i, attachment)| AttachmentWithUrl {
                attachment,
                url: urls.get(i).cloned().flatten(),
            })
            .collect();
        log::info!(
            "Loaded {} attachments for record {}",
            attachments.len(),
            cell.record_id
        );
        self.state.borrow_mut().viewer.attachments = attachments;
        self.load_current(ticket).await
    }

    /// Display the current attachment in the viewer
    async fn load_current(&self, ticket: u64) -> Result<(), ViewerError> {
        let (current, page, zoom) = {
            let state = self.state.borrow();
            let Some(current) = state.viewer.current().cloned() else {
                return Err(ViewerError::NoAttachments);
            };
            (current, state.viewer.pdf_page, state.viewer.pdf_zoom)
        };

        match current.attachment.kind() {
            AttachmentKind::Image => {
                self.pdf.teardown();
                let url = current.url.clone().ok_or_else(|| missing_url(&current))?;
                self.set_status(ViewStatus::Loading);
                let preview = self.images.prepare_preview(VIEWER_SLOT, &url).await?;
                if let Some(source) = preview
                    && self.is_current_view(ticket)
                {
                    self.set_status(ViewStatus::Image(source));
                }
            }
            AttachmentKind::Pdf => {
                self.images.release(VIEWER_SLOT);
                let url = current.url.clone().ok_or_else(|| missing_url(&current))?;
                let outcome = self.pdf.render_page(&url, page, zoom, &self.surface).await?;
                if let RenderOutcome::Rendered { page, .. } = outcome
                    && self.is_current_view(ticket)
                {
                    let page_count = self.pdf.page_count().unwrap_or(page);
                    let mut state = self.state.borrow_mut();
                    state.viewer.pdf_page_count = page_count;
                    state.viewer.status = ViewStatus::Pdf { page, page_count };
                }
            }
            AttachmentKind::Unsupported => {
                self.pdf.teardown();
                self.images.release(VIEWER_SLOT);
                self.set_status(ViewStatus::Unsupported);
            }
        }
        Ok(())
    }

    /// Issue a fresh load of the current attachment
    pub async fn show_current(&self) -> Result<(), ViewerError> {
        let ticket = bump(&self.view_ticket);
        let result = self.load_current(ticket).await;
        self.settle(ticket, result)
    }

    async fn step_attachment(&self, forward: bool) -> Result<(), ViewerError> {
        let moved = {
            let mut state = self.state.borrow_mut();
            let viewer = &mut state.viewer;
            let len = viewer.attachments.len();
            let target = if forward {
                (viewer.current_index + 1 < len).then_some(viewer.current_index + 1)
            } else {
                viewer.current_index.checked_sub(1)
            };
            if let Some(index) = target {
                viewer.current_index = index;
                viewer.reset_view(&self.config.pdf);
            }
            target.is_some()
        };
        if !moved {
            return Ok(());
        }
        self.pdf.teardown();
        self.show_current().await
    }

    pub async fn next_attachment(&self) -> Result<(), ViewerError> {
        self.step_attachment(true).await
    }

    pub async fn previous_attachment(&self) -> Result<(), ViewerError> {
        self.step_attachment(false).await
    }

    /// Image wheel zoom
    pub fn wheel(&self, delta_y: f64) {
        self.state.borrow_mut().viewer.wheel(delta_y);
    }

    /// Image pan; ignored unless zoomed in
    pub fn pan(&self, dx: f64, dy: f64) -> bool {
        self.state.borrow_mut().viewer.pan(dx, dy)
    }

    fn current_is_pdf(&self) -> bool {
        self.state
            .borrow()
            .viewer
            .current()
            .is_some_and(|c| c.attachment.kind() == AttachmentKind::Pdf)
    }

    async fn step_page(&self, forward: bool) -> Result<(), ViewerError> {
        if !self.current_is_pdf() {
            return Ok(());
        }
        let moved = {
            let mut state = self.state.borrow_mut();
            let viewer = &mut state.viewer;
            let next = if forward {
                (viewer.pdf_page < viewer.pdf_page_count).then_some(viewer.pdf_page + 1)
            } else {
                (viewer.pdf_page > 1).then(|| viewer.pdf_page - 1)
            };
            if let Some(page) = next {
                viewer.pdf_page = page;
            }
            next.is_some()
        };
        if moved {
            self.show_current().await
        } else {
            Ok(())
        }
    }

    pub async fn next_page(&self) -> Result<(), ViewerError> {
        self.step_page(true).await
    }

    pub async fn previous_page(&self) -> Result<(), ViewerError> {
        self.step_page(false).await
    }

    /// Change the PDF zoom by `delta` within the configured bounds
    pub async fn zoom_pdf(&self, delta: f32) -> Result<(), ViewerError> {
        if !self.current_is_pdf() {
            return Ok(());
        }
        let changed = {
            let pdf = &self.config.pdf;
            let mut state = self.state.borrow_mut();
            let zoom = (state.viewer.pdf_zoom + delta).clamp(pdf.min_zoom, pdf.max_zoom);
            let changed = (zoom - state.viewer.pdf_zoom).abs() > f32::EPSILON;
            state.viewer.pdf_zoom = zoom;
            changed
        };
        if changed {
            self.show_current().await
        } else {
            Ok(())
        }
    }

    /// Consume selection-change notifications until the sender goes away
    ///
    /// Notifications that queue up while a refresh runs collapse into one.
    pub async fn watch_selection(&self, mut changes: mpsc::Receiver<()>) {
        while changes.recv().await.is_some() {
            while changes.try_recv().is_ok() {}
            if let Err(err) = self.refresh_selection().await {
                self.report(&err);
            }
        }
        log::debug!("Selection watch ended");
    }

    fn report(&self, err: &ViewerError) {
        match err.presentation() {
            Presentation::Silent => log::debug!("{}", err),
            Presentation::LogOnly => log::warn!("{}", err),
            Presentation::EmptyState => log::info!("{}", err),
            Presentation::Toast => self.host.show_toast(&err.user_message(), ToastSeverity::Error),
            Presentation::Inline => log::error!("{}", err),
        }
    }

    /// Cancel renders and release everything held for the viewer
    pub fn teardown(&self) {
        bump(&self.view_ticket);
        bump(&self.editor_ticket);
        self.pdf.teardown();
        self.images.release_all();
        self.surface.clear();
    }

    // ========================================================================
    // Editors
    // ========================================================================

    fn selected_cell(&self) -> Result<CellRef, ViewerError> {
        self.state
            .borrow()
            .viewer
            .cell
            .clone()
            .ok_or(ViewerError::SelectionInvalid)
    }

    /// First attachment field matching the result hint, else the selected field
    async fn default_target(&self, cell: &CellRef) -> CellRef {
        attachment_fields_by_priority(&self.host, &cell.table_id, &self.config.result_field_hint)
            .await
            .first()
            .map_or_else(|| cell.clone(), |field| cell.with_field(&field.id))
    }

    /// Export target and header title for an editor opened on `cell`
    async fn editor_context(&self, cell: &CellRef) -> (CellRef, String) {
        let target = self.default_target(cell).await;
        let title = record_title(&self.host, &cell.table_id, &cell.record_id).await;
        (target, title)
    }

    fn mount_scene(
        &self,
        kind: EditorKind,
        (target, title): (CellRef, String),
        elements: Vec<SceneElement>,
        focus: Option<&str>,
        grading: Option<GradingState>,
    ) {
        self.canvas.update_scene(SceneUpdate::elements(elements));
        self.canvas.update_library(preset_library(now_millis()));
        self.canvas.set_active_tool(Tool::Freedraw);
        if let Some(id) = focus {
            self.canvas.scroll_to_content(id, true);
        }

        let mut editor = EditorState::new(kind, target);
        editor.title = title;
        editor.guard = EditGuard::new(self.canvas.element_count());
        editor.grading = grading;
        log::debug!(
            "Opened {:?} editor with {} elements",
            kind,
            editor.guard.baseline()
        );
        let mut state = self.state.borrow_mut();
        state.editor = Some(editor);
        state.mode = Mode::Editing;
    }

    /// Open the current image attachment in the canvas
    pub async fn open_image_editor(&self) -> Result<(), ViewerError> {
        let cell = self.selected_cell()?;
        let current = self
            .state
            .borrow()
            .viewer
            .current()
            .cloned()
            .ok_or(ViewerError::NoAttachments)?;
        if current.attachment.kind() != AttachmentKind::Image {
            return Err(ViewerError::UnsupportedResponse {
                content_type: current.attachment.mime_type.clone(),
            });
        }
        let url = current.url.clone().ok_or_else(|| missing_url(&current))?;

        let ticket = bump(&self.editor_ticket);
        let context = self.editor_context(&cell).await;
        let loaded = self.images.load_for_display(&url).await?;
        if self.editor_ticket.get() != ticket {
            return Ok(());
        }

        let file_id = current.attachment.token.clone();
        self.canvas.add_files(vec![BinaryFile {
            id: file_id.clone(),
            mime_type: loaded.image.mime_type,
            bytes: loaded.image.bytes,
            created: now_millis(),
        }]);
        let image = self.scenes.image_element(&file_id, &loaded.transform);
        let image_id = image.id.clone();
        self.mount_scene(EditorKind::Image, context, vec![image], Some(&image_id), None);
        Ok(())
    }

    /// Load the record's grading data and show the first graded image
    pub async fn open_grading_editor(&self) -> Result<(), ViewerError> {
        let cell = self.selected_cell()?;
        let ticket = bump(&self.editor_ticket);
        let context = self.editor_context(&cell).await;
        let records = load_grading_records(
            &self.host,
            self.images.fetcher(),
            &cell.table_id,
            &cell.record_id,
            &self.config.grade_field_name,
        )
        .await?;
        if self.editor_ticket.get() != ticket {
            return Ok(());
        }
        if records.is_empty() {
            return Err(ViewerError::ParseFailed("grading data has no records".to_string()));
        }
        log::info!("Loaded {} grading records", records.len());
        self.show_grading_record(ticket, context, records, 0).await
    }

    async fn show_grading_record(
        &self,
        ticket: u64,
        context: (CellRef, String),
        records: Vec<GradingRecord>,
        index: usize,
    ) -> Result<(), ViewerError> {
        let Some(record) = records.get(index) else {
            return Ok(());
        };
        let loaded = self.images.load_for_display(&record.image_url).await?;
        if self.editor_ticket.get() != ticket {
            return Ok(());
        }

        let primitives = self.overlay.build(&record.questions, &loaded.transform);
        let file_id = format!("grade_{index}");
        self.canvas.add_files(vec![BinaryFile {
            id: file_id.clone(),
            mime_type: loaded.image.mime_type,
            bytes: loaded.image.bytes,
            created: now_millis(),
        }]);
        let elements = self
            .scenes
            .overlay_scene(Some((&file_id, &loaded.transform)), &primitives);
        let image_id = elements.first().map(|e| e.id.clone());
        log::debug!(
            "Record {} of {}: {} overlay primitives",
            index + 1,
            records.len(),
            primitives.len()
        );
        self.mount_scene(
            EditorKind::Grading,
            context,
            elements,
            image_id.as_deref(),
            Some(GradingState { records, index }),
        );
        Ok(())
    }

    async fn step_record(&self, forward: bool) -> Result<(), ViewerError> {
        let Some((context, grading)) = self.state.borrow().editor.as_ref().and_then(|editor| {
            let context = (editor.target.clone(), editor.title.clone());
            editor.grading.clone().map(|grading| (context, grading))
        }) else {
            return Ok(());
        };
        let next = if forward {
            (grading.index + 1 < grading.records.len()).then_some(grading.index + 1)
        } else {
            grading.index.checked_sub(1)
        };
        let Some(index) = next else {
            return Ok(());
        };
        let ticket = bump(&self.editor_ticket);
        self.show_grading_record(ticket, context, grading.records, index)
            .await
    }

    pub async fn next_record(&self) -> Result<(), ViewerError> {
        self.step_record(true).await
    }

    pub async fn previous_record(&self) -> Result<(), ViewerError> {
        self.step_record(false).await
    }

    /// Start an empty canvas for the selected record
    pub async fn open_blank_canvas(&self) -> Result<(), ViewerError> {
        let cell = self.selected_cell()?;
        bump(&self.editor_ticket);
        let context = self.editor_context(&cell).await;
        self.mount_scene(EditorKind::Blank, context, Vec::new(), None, None);
        Ok(())
    }

    /// Export to another attachment field of the same record
    pub fn set_export_target(&self, field_id: &str) {
        if let Some(editor) = self.state.borrow_mut().editor.as_mut() {
            editor.target = editor.target.with_field(field_id);
        }
    }

    /// Flatten the canvas and append it to the export target
    ///
    /// Success clears the discard guard. Either way the editor stays open and
    /// the outcome is shown as a toast.
    pub async fn export(&self) -> Result<Attachment, ViewerError> {
        let (kind, target) = {
            let mut state = self.state.borrow_mut();
            if state.mode != Mode::Editing {
                return Err(ViewerError::ExportFailed("no editor is ready to export".to_string()));
            }
            let Some(editor) = state.editor.as_ref() else {
                return Err(ViewerError::ExportFailed("no editor is open".to_string()));
            };
            let picked = (editor.kind, editor.target.clone());
            state.mode = Mode::Exporting;
            picked
        };
        let prefix = match kind {
            EditorKind::Grading => &self.config.export.grade_prefix,
            EditorKind::Image | EditorKind::Blank => &self.config.export.canvas_prefix,
        };

        let result = export_canvas(
            &self.host,
            &self.canvas,
            &target,
            prefix,
            self.config.timeouts.export(),
        )
        .await;

        let count = self.canvas.element_count();
        {
            let mut state = self.state.borrow_mut();
            state.mode = if state.editor.is_some() {
                Mode::Editing
            } else {
                Mode::Viewing
            };
            if result.is_ok()
                && let Some(editor) = state.editor.as_mut()
            {
                editor.guard.mark_exported(count);
            }
        }

        match &result {
            Ok(attachment) => self
                .host
                .show_toast(&format!("Saved {}", attachment.name), ToastSeverity::Success),
            Err(err) => self.host.show_toast(&err.user_message(), ToastSeverity::Error),
        }
        result
    }

    /// Leave the editor, unless that would drop unexported edits
    pub fn request_back(&self) -> BackOutcome {
        let count = self.canvas.element_count();
        {
            let mut state = self.state.borrow_mut();
            let Some(editor) = state.editor.as_mut() else {
                return BackOutcome::Closed;
            };
            if editor.guard.needs_discard_confirmation(count) {
                editor.pending_discard = true;
                return BackOutcome::NeedsConfirmation;
            }
        }
        self.close_editor();
        BackOutcome::Closed
    }

    /// Close the editor after [`BackOutcome::NeedsConfirmation`]
    pub fn confirm_discard(&self) -> bool {
        let pending = self
            .state
            .borrow()
            .editor
            .as_ref()
            .is_some_and(|editor| editor.pending_discard);
        if pending {
            self.close_editor();
        }
        pending
    }

    pub fn cancel_discard(&self) {
        if let Some(editor) = self.state.borrow_mut().editor.as_mut() {
            editor.pending_discard = false;
        }
    }

    fn close_editor(&self) {
        bump(&self.editor_ticket);
        {
            let mut state = self.state.borrow_mut();
            state.editor = None;
            state.mode = Mode::Viewing;
        }
        self.canvas.update_scene(SceneUpdate::elements(Vec::new()));
    }
}
