//! Image ingest
//!
//! Fetching with retry, display scaling, and compressed preview renditions
//! with their blob URL lifecycle.

pub mod blob;
pub mod fetch;
pub mod image;

pub use blob::{Blob, BlobRegistry, is_blob_url};
pub use fetch::{
    FetchResponse, FetchedImage, Fetcher, LocalFileFetcher, fetch_image, fetch_image_with_retry,
    fetch_text,
};
pub use self::image::{
    ImageIngestPipeline, LoadedImage, PreviewSource, compress_bytes, decode_dimensions,
};
