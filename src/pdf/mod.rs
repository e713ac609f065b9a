//! PDF page rendering
//!
//! The rasterizer itself sits behind [`PdfBackend`]; this module owns the
//! document cache, render cancellation and timeouts.

pub mod backend;
pub mod pipeline;

pub use backend::{PageViewport, PdfBackend, PdfDocument, PdfFailure, RenderCancel};
pub use pipeline::{PdfPagePipeline, RasterSurface, RenderOutcome, RenderedFrame};
