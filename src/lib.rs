//! Attachment preview and grading-overlay annotation for spreadsheet bases
//!
//! The host base, the drawing canvas, the network and the PDF renderer are
//! ports (`host`, `canvas`, `ingest`, `pdf`); `session` drives them.

// Ports are single-threaded; their futures are never required to be Send
#![allow(async_fn_in_trait)]

pub mod canvas;
pub mod config;
pub mod domain;
pub mod error;
pub mod host;
pub mod ingest;
pub mod layout;
pub mod pdf;
pub mod session;
pub mod task;

#[cfg(test)]
pub(crate) mod testing;

pub use config::AppConfig;
pub use error::ViewerError;
pub use session::AnnotationSession;
