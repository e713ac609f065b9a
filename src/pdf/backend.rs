//! Port to the PDF rasterizer

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tiny_skia::Pixmap;

use crate::error::{FetchCause, ViewerError};

/// Cooperative cancellation flag shared with a render in progress
#[derive(Clone, Debug, Default)]
pub struct RenderCancel(Arc<AtomicBool>);

impl RenderCancel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn same_as(&self, other: &RenderCancel) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

/// Pixel size of a page at a zoom level
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PageViewport {
    pub width: u32,
    pub height: u32,
    pub zoom: f32,
}

impl PageViewport {
    /// Viewport for a page of `width x height` points at `zoom`
    pub fn at_zoom(width: f32, height: f32, zoom: f32) -> Self {
        Self {
            width: (width * zoom).ceil().max(1.0) as u32,
            height: (height * zoom).ceil().max(1.0) as u32,
            zoom,
        }
    }
}

/// Backend failure, before it is mapped to a [`ViewerError`]
#[derive(Clone, Debug, PartialEq)]
pub enum PdfFailure {
    Http(u16),
    Network(String),
    Cancelled,
    Invalid(String),
}

impl fmt::Display for PdfFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PdfFailure::Http(status) => write!(f, "HTTP error {status}"),
            PdfFailure::Network(msg) => write!(f, "network error: {msg}"),
            PdfFailure::Cancelled => write!(f, "rendering cancelled"),
            PdfFailure::Invalid(msg) => write!(f, "{msg}"),
        }
    }
}

impl From<PdfFailure> for ViewerError {
    fn from(failure: PdfFailure) -> Self {
        match failure {
            PdfFailure::Http(status) => ViewerError::FetchFailed {
                cause: FetchCause::Http(status),
                detail: "PDF document".to_string(),
            },
            PdfFailure::Network(detail) => ViewerError::FetchFailed {
                cause: FetchCause::Network,
                detail,
            },
            PdfFailure::Cancelled => ViewerError::RenderCancelled,
            PdfFailure::Invalid(msg) => ViewerError::RenderFailed(msg),
        }
    }
}

/// An opened document
pub trait PdfDocument {
    type Page;

    fn page_count(&self) -> u32;

    /// Fetch 1-based page `number`
    async fn page(&self, number: u32) -> Result<Self::Page, PdfFailure>;

    fn viewport(&self, page: &Self::Page, zoom: f32) -> PageViewport;

    /// Rasterize `page` into `target`, which is sized to `viewport`
    ///
    /// Implementations check `cancel` between steps and return
    /// [`PdfFailure::Cancelled`] once it is set.
    async fn render(
        &self,
        page: &Self::Page,
        viewport: &PageViewport,
        target: &mut Pixmap,
        cancel: &RenderCancel,
    ) -> Result<(), PdfFailure>;

    /// Release backend resources. The document is not used afterwards.
    fn destroy(&self);
}

pub trait PdfBackend {
    type Document: PdfDocument;

    async fn open(&self, url: &str) -> Result<Self::Document, PdfFailure>;
}
