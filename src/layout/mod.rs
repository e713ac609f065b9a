//! Overlay layout
//!
//! This module contains:
//! - Text measurement and wrapping for side panel boxes
//! - Mark geometry shared by the builder and the raster canvas
//! - The overlay builder itself

pub mod geometry;
pub mod overlay_builder;
pub mod text_flow;

pub use overlay_builder::{OverlayBuilder, OverlayStyle, build};
pub use text_flow::{TextFlow, measure_height, wrap};
