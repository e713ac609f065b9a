//! Error taxonomy for the viewer and editors
//!
//! Every failure a user can run into maps to one [`ViewerError`] variant.
//! [`ViewerError::presentation`] decides how (and whether) it is shown.

use std::fmt;

/// Why a fetch did not produce a body
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FetchCause {
    Network,
    Http(u16),
    Cors,
}

impl fmt::Display for FetchCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchCause::Network => write!(f, "network error"),
            FetchCause::Http(status) => write!(f, "HTTP error {status}"),
            FetchCause::Cors => write!(f, "cross-origin request blocked"),
        }
    }
}

/// How an error reaches the user
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Presentation {
    /// Normal control flow, never shown
    Silent,
    /// Recovered locally, only logged
    LogOnly,
    /// Rendered as an empty-state hint rather than an error
    EmptyState,
    /// Transient toast, user may retry
    Toast,
    /// Blocking error panel for the current view
    Inline,
}

#[derive(Clone, Debug, PartialEq)]
pub enum ViewerError {
    /// No cell, or an incomplete selection
    SelectionInvalid,
    UnsupportedFieldType,
    NoAttachments,
    GradeFieldMissing { field: String },
    GradeFieldEmpty { field: String },
    FetchFailed { cause: FetchCause, detail: String },
    /// Response carried something other than an image
    UnsupportedResponse { content_type: String },
    DecodeFailed(String),
    ParseFailed(String),
    LoadTimeout,
    RenderTimeout,
    RenderCancelled,
    RenderFailed(String),
    ExportTimeout,
    ExportFailed(String),
    CompressionFailed(String),
    /// A host capability call failed
    Host(String),
}

impl fmt::Display for ViewerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ViewerError::SelectionInvalid => write!(f, "no cell selected"),
            ViewerError::UnsupportedFieldType => {
                write!(f, "selected field is not an attachment field")
            }
            ViewerError::NoAttachments => write!(f, "selected cell has no attachments"),
            ViewerError::GradeFieldMissing { field } => write!(f, "field \"{field}\" not found"),
            ViewerError::GradeFieldEmpty { field } => {
                write!(f, "field \"{field}\" is empty for this record")
            }
            ViewerError::FetchFailed { cause, detail } => {
                write!(f, "fetch failed ({cause}): {detail}")
            }
            ViewerError::UnsupportedResponse { content_type } => {
                write!(f, "unsupported response, Content-Type={content_type}")
            }
            ViewerError::DecodeFailed(msg) => write!(f, "image decode failed: {msg}"),
            ViewerError::ParseFailed(msg) => write!(f, "grading data is not valid JSON: {msg}"),
            ViewerError::LoadTimeout => write!(f, "document load timed out"),
            ViewerError::RenderTimeout => write!(f, "render timed out"),
            ViewerError::RenderCancelled => write!(f, "render cancelled"),
            ViewerError::RenderFailed(msg) => write!(f, "render failed: {msg}"),
            ViewerError::ExportTimeout => write!(f, "export timed out"),
            ViewerError::ExportFailed(msg) => write!(f, "export failed: {msg}"),
            ViewerError::CompressionFailed(msg) => write!(f, "compression failed: {msg}"),
            ViewerError::Host(msg) => write!(f, "host call failed: {msg}"),
        }
    }
}

impl std::error::Error for ViewerError {}

impl ViewerError {
    pub fn is_cancellation(&self) -> bool {
        matches!(self, ViewerError::RenderCancelled)
    }

    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            ViewerError::LoadTimeout | ViewerError::RenderTimeout | ViewerError::ExportTimeout
        )
    }

    pub fn presentation(&self) -> Presentation {
        match self {
            ViewerError::RenderCancelled => Presentation::Silent,
            ViewerError::CompressionFailed(_) => Presentation::LogOnly,
            ViewerError::SelectionInvalid => Presentation::EmptyState,
            ViewerError::ExportTimeout | ViewerError::ExportFailed(_) => Presentation::Toast,
            _ => Presentation::Inline,
        }
    }

    /// Message shown to the grader
    pub fn user_message(&self) -> String {
        match self {
            ViewerError::SelectionInvalid => "Select a cell to preview its attachments".to_string(),
            ViewerError::NoAttachments => "The selected cell has no attachments".to_string(),
            ViewerError::FetchFailed { cause: FetchCause::Cors, .. } => {
                "Image blocked by cross-origin policy, contact an administrator".to_string()
            }
            ViewerError::FetchFailed { cause: FetchCause::Http(status), .. } => {
                format!("Server returned an error (HTTP {status})")
            }
            ViewerError::FetchFailed { cause: FetchCause::Network, .. } => {
                "Network problem, check the connection and retry".to_string()
            }
            ViewerError::LoadTimeout | ViewerError::RenderTimeout => {
                "Loading timed out, check the network and retry".to_string()
            }
            ViewerError::ExportTimeout => "Export timed out, retry or export manually".to_string(),
            ViewerError::ExportFailed(_) => "Export failed, please retry".to_string(),
            ViewerError::ParseFailed(_) => {
                "Grading data is malformed and cannot be parsed".to_string()
            }
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancellation_is_silent() {
        let err = ViewerError::RenderCancelled;
        assert!(err.is_cancellation());
        assert_eq!(err.presentation(), Presentation::Silent);
    }

    #[test]
    fn test_timeouts_are_distinguishable() {
        assert!(ViewerError::LoadTimeout.is_timeout());
        assert!(ViewerError::ExportTimeout.is_timeout());
        assert!(!ViewerError::RenderFailed("x".into()).is_timeout());
        assert_ne!(
            ViewerError::ExportTimeout.user_message(),
            ViewerError::ExportFailed("x".into()).user_message()
        );
    }

    #[test]
    fn test_presentation_classes() {
        assert_eq!(ViewerError::SelectionInvalid.presentation(), Presentation::EmptyState);
        assert_eq!(
            ViewerError::CompressionFailed("oom".into()).presentation(),
            Presentation::LogOnly
        );
        assert_eq!(ViewerError::ParseFailed("eof".into()).presentation(), Presentation::Inline);
        assert_eq!(ViewerError::ExportFailed("x".into()).presentation(), Presentation::Toast);
    }

    #[test]
    fn test_fetch_messages_by_cause() {
        let http = ViewerError::FetchFailed { cause: FetchCause::Http(404), detail: String::new() };
        assert!(http.user_message().contains("404"));
        let cors = ViewerError::FetchFailed { cause: FetchCause::Cors, detail: String::new() };
        assert!(cors.user_message().contains("cross-origin"));
    }
}
