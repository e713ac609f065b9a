//! Message types for the annotation session
//!
//! Navigation and editor events are grouped in sub-enums the same way the
//! session handles them.

/// Viewer navigation
#[derive(Debug, Clone, PartialEq)]
pub enum NavMsg {
    NextAttachment,
    PreviousAttachment,
    /// Mouse wheel over an image, negative zooms in
    Wheel(f64),
    /// Drag while zoomed in
    Pan(f64, f64),
    NextPage,
    PreviousPage,
    ZoomIn,
    ZoomOut,
}

/// Editor lifecycle
#[derive(Debug, Clone, PartialEq)]
pub enum EditorMsg {
    OpenImage,
    OpenGrading,
    OpenBlank,
    NextRecord,
    PreviousRecord,
    /// Change the attachment field exports go to
    SetTarget(String),
    Export,
    Back,
    ConfirmDiscard,
    CancelDiscard,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionMsg {
    /// Host reported a new selection
    SelectionChanged,
    Nav(NavMsg),
    Editor(EditorMsg),
}

/// Result of asking to leave an editor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackOutcome {
    Closed,
    /// Unexported edits; wait for ConfirmDiscard or CancelDiscard
    NeedsConfirmation,
}
