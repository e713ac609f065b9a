//! Pure domain types with minimal dependencies
//!
//! Types here have no knowledge of the host base, the canvas widget, or the
//! async runtime.

pub mod attachment;
pub mod geometry;
pub mod grading;
pub mod overlay;

pub use attachment::*;
pub use geometry::*;
pub use grading::*;
pub use overlay::*;
