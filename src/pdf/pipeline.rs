//! Cached PDF document and single-writer page rendering
//!
//! The pipeline keeps one open document keyed by its URL. Every render
//! request cancels the one before it, renders into a scratch pixmap, and only
//! commits to the shared surface if it is still the latest request.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;

use tiny_skia::Pixmap;
use tokio::sync::Notify;

use super::backend::{PdfBackend, PdfDocument, RenderCancel};
use crate::error::ViewerError;
use crate::task::with_timeout;

/// Last frame written to a [`RasterSurface`]
#[derive(Clone, Debug, PartialEq)]
pub struct RenderedFrame {
    pub page: u32,
    pub zoom: f32,
    pub pixmap: Pixmap,
}

/// The one raster target of a viewer
#[derive(Debug, Default)]
pub struct RasterSurface {
    frame: RefCell<Option<RenderedFrame>>,
    commits: Cell<u32>,
}

impl RasterSurface {
    pub fn new() -> Self {
        Self::default()
    }

    fn commit(&self, frame: RenderedFrame) {
        *self.frame.borrow_mut() = Some(frame);
        self.commits.set(self.commits.get() + 1);
    }

    pub fn frame(&self) -> Option<RenderedFrame> {
        self.frame.borrow().clone()
    }

    pub fn page(&self) -> Option<u32> {
        self.frame.borrow().as_ref().map(|f| f.page)
    }

    /// Number of frames ever written
    pub fn commits(&self) -> u32 {
        self.commits.get()
    }

    pub fn clear(&self) {
        *self.frame.borrow_mut() = None;
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum RenderOutcome {
    Rendered { page: u32, width: u32, height: u32 },
    /// A newer request or a teardown took over; nothing was written
    Superseded,
}

enum DocumentSlot<D> {
    Idle,
    Loading { url: String, generation: u64 },
    Ready { url: String, document: Rc<D> },
}

pub struct PdfPagePipeline<B: PdfBackend> {
    backend: B,
    timeout: Duration,
    slot: RefCell<DocumentSlot<B::Document>>,
    in_flight: RefCell<Option<RenderCancel>>,
    generation: Cell<u64>,
    /// Woken whenever a load settles or the document is released
    settled: Notify,
}

impl<B: PdfBackend> PdfPagePipeline<B> {
    pub fn new(backend: B, timeout: Duration) -> Self {
        Self {
            backend,
            timeout,
            slot: RefCell::new(DocumentSlot::Idle),
            in_flight: RefCell::new(None),
            generation: Cell::new(0),
            settled: Notify::new(),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// URL of the open (or opening) document
    pub fn source_url(&self) -> Option<String> {
        match &*self.slot.borrow() {
            DocumentSlot::Idle => None,
            DocumentSlot::Loading { url, .. } | DocumentSlot::Ready { url, .. } => {
                Some(url.clone())
            }
        }
    }

    pub fn page_count(&self) -> Option<u32> {
        match &*self.slot.borrow() {
            DocumentSlot::Ready { document, .. } => Some(document.page_count()),
            _ => None,
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(&*self.slot.borrow(), DocumentSlot::Loading { .. })
    }

    /// Return the document for `url`, opening it if the cached one differs
    pub async fn ensure_document(&self, url: &str) -> Result<Rc<B::Document>, ViewerError> {
        self.document_for(url, &RenderCancel::new()).await
    }

    /// Like [`Self::ensure_document`], joining a load of the same URL that is
    /// already running instead of opening the document a second time
    async fn document_for(
        &self,
        url: &str,
        token: &RenderCancel,
    ) -> Result<Rc<B::Document>, ViewerError> {
        loop {
            let settled = self.settled.notified();
            let pending = match &*self.slot.borrow() {
                DocumentSlot::Ready { url: cached, document } if cached == url => {
                    return Ok(Rc::clone(document));
                }
                DocumentSlot::Loading { url: loading, .. } => loading == url,
                _ => false,
            };
            if !pending {
                break;
            }
            log::debug!("Waiting for PDF {} to finish loading", url);
            settled.await;
            if token.is_cancelled() {
                return Err(ViewerError::RenderCancelled);
            }
        }

        self.release_document();
        let generation = self.generation.get() + 1;
        self.generation.set(generation);
        *self.slot.borrow_mut() = DocumentSlot::Loading {
            url: url.to_string(),
            generation,
        };
        log::debug!("Opening PDF {}", url);

        let opened = match with_timeout(self.timeout, self.backend.open(url)).await {
            Ok(result) => result.map_err(ViewerError::from),
            Err(timed_out) => {
                log::warn!("PDF load {}", timed_out);
                Err(ViewerError::LoadTimeout)
            }
        };
        let result = self.settle_load(url, generation, opened);
        self.settled.notify_waiters();
        result
    }

    fn settle_load(
        &self,
        url: &str,
        generation: u64,
        opened: Result<B::Document, ViewerError>,
    ) -> Result<Rc<B::Document>, ViewerError> {
        let mut slot = self.slot.borrow_mut();
        let still_loading =
            matches!(&*slot, DocumentSlot::Loading { generation: g, .. } if *g == generation);

        match opened {
            Ok(document) if still_loading => {
                let document = Rc::new(document);
                log::info!("Opened PDF {} with {} pages", url, document.page_count());
                *slot = DocumentSlot::Ready {
                    url: url.to_string(),
                    document: Rc::clone(&document),
                };
                Ok(document)
            }
            Ok(document) => {
                document.destroy();
                match &*slot {
                    // Another request opened the same URL first
                    DocumentSlot::Ready { url: cached, document } if cached == url => {
                        Ok(Rc::clone(document))
                    }
                    _ => Err(ViewerError::RenderCancelled),
                }
            }
            Err(err) => {
                if still_loading {
                    *slot = DocumentSlot::Idle;
                }
                Err(err)
            }
        }
    }

    /// Render 1-based `page` of `url` at `zoom` onto `surface`
    ///
    /// Any render still running is cancelled first. Cancellation is reported
    /// as [`RenderOutcome::Superseded`], never as an error. A genuine failure
    /// closes the cached document so the next request starts clean, and
    /// leaves `surface` untouched.
    pub async fn render_page(
        &self,
        url: &str,
        page: u32,
        zoom: f32,
        surface: &RasterSurface,
    ) -> Result<RenderOutcome, ViewerError> {
        let token = RenderCancel::new();
        if let Some(previous) = self.in_flight.replace(Some(token.clone())) {
            previous.cancel();
        }

        let result = self.render_into_pixmap(url, page, zoom, &token).await;
        let is_mine = self
            .in_flight
            .borrow()
            .as_ref()
            .is_some_and(|current| current.same_as(&token));
        if is_mine {
            *self.in_flight.borrow_mut() = None;
        }

        match result {
            Ok(pixmap) if !token.is_cancelled() => {
                let (width, height) = (pixmap.width(), pixmap.height());
                surface.commit(RenderedFrame { page, zoom, pixmap });
                Ok(RenderOutcome::Rendered { page, width, height })
            }
            Ok(_) => {
                log::debug!("Discarding finished render of page {} after cancel", page);
                Ok(RenderOutcome::Superseded)
            }
            Err(err) if err.is_cancellation() || token.is_cancelled() => {
                log::debug!("Render of page {} cancelled: {}", page, err);
                Ok(RenderOutcome::Superseded)
            }
            Err(err) => {
                log::error!("Failed to render page {} of {}: {}", page, url, err);
                // The backend may still be rendering after a timeout
                token.cancel();
                self.release_document();
                Err(err)
            }
        }
    }

    async fn render_into_pixmap(
        &self,
        url: &str,
        page_number: u32,
        zoom: f32,
        token: &RenderCancel,
    ) -> Result<Pixmap, ViewerError> {
        let document = self.document_for(url, token).await?;
        if token.is_cancelled() {
            return Err(ViewerError::RenderCancelled);
        }

        let page = with_timeout(self.timeout, document.page(page_number))
            .await
            .map_err(|_| ViewerError::LoadTimeout)??;
        let viewport = document.viewport(&page, zoom);
        let mut pixmap = Pixmap::new(viewport.width, viewport.height).ok_or_else(|| {
            ViewerError::RenderFailed(format!(
                "invalid viewport {}x{}",
                viewport.width, viewport.height
            ))
        })?;

        match with_timeout(
            self.timeout,
            document.render(&page, &viewport, &mut pixmap, token),
        )
        .await
        {
            Ok(result) => result?,
            Err(_) => return Err(ViewerError::RenderTimeout),
        }
        Ok(pixmap)
    }

    /// Cancel the running render, close the document and forget its URL
    pub fn teardown(&self) {
        if let Some(token) = self.in_flight.borrow_mut().take() {
            token.cancel();
        }
        self.release_document();
    }

    fn release_document(&self) {
        let previous = std::mem::replace(&mut *self.slot.borrow_mut(), DocumentSlot::Idle);
        // Bump so a load still in progress is discarded when it lands
        self.generation.set(self.generation.get() + 1);
        if let DocumentSlot::Ready { url, document } = previous {
            log::debug!("Closing PDF {}", url);
            document.destroy();
        }
        self.settled.notify_waiters();
    }
}
