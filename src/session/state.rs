//! State types for the annotation session
//!
//! This module contains:
//! - ViewerState: selection, attachment index, page, zoom and pan
//! - EditGuard: the discard guard for unexported canvas edits
//! - EditorState: which editor is open and what it exports to

use crate::config::PdfConfig;
use crate::domain::{AttachmentWithUrl, GradingRecord};
use crate::error::ViewerError;
use crate::host::CellRef;
use crate::ingest::PreviewSource;

pub const MIN_IMAGE_SCALE: f64 = 0.5;
pub const MAX_IMAGE_SCALE: f64 = 3.0;
pub const WHEEL_STEP: f64 = 0.1;

/// What the viewer is showing
#[derive(Clone, Debug, Default, PartialEq)]
pub enum ViewStatus {
    #[default]
    Idle,
    Loading,
    /// Nothing to show; carries the reason (selection, field type, no files)
    Empty(ViewerError),
    /// Field is not an attachment field; a blank canvas may be opened
    BlankCanvasOffer,
    Image(PreviewSource),
    Pdf { page: u32, page_count: u32 },
    Unsupported,
    Failed(ViewerError),
}

#[derive(Clone, Debug, PartialEq)]
pub struct ViewerState {
    /// Selected cell, possibly a non-attachment field
    pub cell: Option<CellRef>,
    pub attachments: Vec<AttachmentWithUrl>,
    pub current_index: usize,
    pub pdf_page: u32,
    pub pdf_page_count: u32,
    pub pdf_zoom: f32,
    /// Image zoom
    pub scale: f64,
    /// Image pan offset
    pub position: (f64, f64),
    pub can_grade: bool,
    pub status: ViewStatus,
}

impl ViewerState {
    pub fn new(pdf: &PdfConfig) -> Self {
        Self {
            cell: None,
            attachments: Vec::new(),
            current_index: 0,
            pdf_page: 1,
            pdf_page_count: 0,
            pdf_zoom: pdf.initial_zoom,
            scale: 1.0,
            position: (0.0, 0.0),
            can_grade: false,
            status: ViewStatus::Idle,
        }
    }

    pub fn current(&self) -> Option<&AttachmentWithUrl> {
        self.attachments.get(self.current_index)
    }

    /// Back to the first page at the initial zoom with no image pan
    pub fn reset_view(&mut self, pdf: &PdfConfig) {
        self.pdf_page = 1;
        self.pdf_page_count = 0;
        self.pdf_zoom = pdf.initial_zoom;
        self.scale = 1.0;
        self.position = (0.0, 0.0);
    }

    /// Wheel zoom: scrolling up zooms in
    pub fn wheel(&mut self, delta_y: f64) {
        let step = if delta_y < 0.0 { WHEEL_STEP } else { -WHEEL_STEP };
        self.scale = (self.scale + step).clamp(MIN_IMAGE_SCALE, MAX_IMAGE_SCALE);
        if self.scale <= 1.0 {
            self.position = (0.0, 0.0);
        }
    }

    /// Pan while zoomed in. Returns false if the image is not zoomed.
    pub fn pan(&mut self, dx: f64, dy: f64) -> bool {
        if self.scale <= 1.0 {
            return false;
        }
        self.position = (self.position.0 + dx, self.position.1 + dy);
        true
    }
}

/// Tracks whether the canvas holds edits that were never exported
///
/// The baseline is the element count right after a load or an export. Leaving
/// the editor only needs confirmation while no export has succeeded since the
/// last load.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EditGuard {
    baseline: usize,
    exported: bool,
}

impl EditGuard {
    pub fn new(element_count: usize) -> Self {
        Self {
            baseline: element_count,
            exported: false,
        }
    }

    pub fn baseline(&self) -> usize {
        self.baseline
    }

    pub fn mark_exported(&mut self, element_count: usize) {
        self.baseline = element_count;
        self.exported = true;
    }

    /// Elements were added since the last load or export
    pub fn has_unexported_edits(&self, element_count: usize) -> bool {
        element_count > self.baseline
    }

    pub fn needs_discard_confirmation(&self, element_count: usize) -> bool {
        self.has_unexported_edits(element_count) && !self.exported
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EditorKind {
    Image,
    Grading,
    Blank,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Mode {
    #[default]
    Viewing,
    Editing,
    Exporting,
}

/// Records loaded for the grading editor
#[derive(Clone, Debug, PartialEq)]
pub struct GradingState {
    pub records: Vec<GradingRecord>,
    pub index: usize,
}

#[derive(Clone, Debug, PartialEq)]
pub struct EditorState {
    pub kind: EditorKind,
    /// Record title shown in the editor header
    pub title: String,
    pub guard: EditGuard,
    /// Attachment cell exports are appended to
    pub target: CellRef,
    pub grading: Option<GradingState>,
    /// Back was requested with unexported edits
    pub pending_discard: bool,
}

impl EditorState {
    pub fn new(kind: EditorKind, target: CellRef) -> Self {
        Self {
            kind,
            title: String::new(),
            guard: EditGuard::default(),
            target,
            grading: None,
            pending_discard: false,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct SessionState {
    pub viewer: ViewerState,
    pub mode: Mode,
    pub editor: Option<EditorState>,
}

impl SessionState {
    pub fn new(pdf: &PdfConfig) -> Self {
        Self {
            viewer: ViewerState::new(pdf),
            mode: Mode::Viewing,
            editor: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guard_tracks_growth_since_baseline() {
        let mut guard = EditGuard::new(3);
        assert!(!guard.has_unexported_edits(3));
        assert!(guard.has_unexported_edits(4));
        assert!(guard.needs_discard_confirmation(4));
        guard.mark_exported(4);
        assert!(!guard.has_unexported_edits(4));
        guard = EditGuard::new(6);
        assert!(guard.has_unexported_edits(7));
    }

    #[test]
    fn test_edits_after_export_are_unexported_but_not_guarded() {
        let mut guard = EditGuard::new(1);
        guard.mark_exported(2);
        assert!(guard.has_unexported_edits(3));
        assert!(!guard.needs_discard_confirmation(3));
    }

    #[test]
    fn test_wheel_zoom_clamps_and_recenters() {
        let mut viewer = ViewerState::new(&PdfConfig::default());
        for _ in 0..30 {
            viewer.wheel(-1.0);
        }
        assert!((viewer.scale - MAX_IMAGE_SCALE).abs() < 1e-9);
        assert!(viewer.pan(10.0, -5.0));
        assert_eq!(viewer.position, (10.0, -5.0));

        for _ in 0..30 {
            viewer.wheel(1.0);
        }
        assert!((viewer.scale - MIN_IMAGE_SCALE).abs() < 1e-9);
        assert_eq!(viewer.position, (0.0, 0.0));
        assert!(!viewer.pan(1.0, 1.0));
    }
}
