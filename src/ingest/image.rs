//! Image loading, display scaling and preview compression

use std::cell::RefCell;
use std::collections::HashMap;
use std::io::Cursor;

use image::ImageReader;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;

use super::blob::{Blob, BlobRegistry};
use super::fetch::{FetchedImage, Fetcher, fetch_image_with_retry};
use crate::config::ImageConfig;
use crate::domain::DisplayTransform;
use crate::error::ViewerError;
use crate::task::RetryPolicy;

const JPEG_MIME_TYPE: &str = "image/jpeg";

/// A fetched image and how it maps onto the display
#[derive(Clone, Debug, PartialEq)]
pub struct LoadedImage {
    pub url: String,
    pub image: FetchedImage,
    pub transform: DisplayTransform,
}

/// What a preview should point at
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PreviewSource {
    Original(String),
    /// A live blob URL owned by the pipeline
    Compressed(String),
}

impl PreviewSource {
    pub fn url(&self) -> &str {
        match self {
            PreviewSource::Original(url) | PreviewSource::Compressed(url) => url,
        }
    }

    pub fn is_compressed(&self) -> bool {
        matches!(self, PreviewSource::Compressed(_))
    }
}

#[derive(Debug, Default)]
struct PreviewSlot {
    generation: u64,
    blob_url: Option<String>,
}

/// Read pixel dimensions from an encoded image without decoding it fully
pub fn decode_dimensions(bytes: &[u8]) -> Result<(u32, u32), ViewerError> {
    ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|err| ViewerError::DecodeFailed(err.to_string()))?
        .into_dimensions()
        .map_err(|err| ViewerError::DecodeFailed(err.to_string()))
}

/// Downscale to fit `max_width x max_height` and re-encode as JPEG
///
/// `quality` is on the 1-100 scale. Images already inside the box keep their
/// size and are only re-encoded.
pub fn compress_bytes(
    bytes: &[u8],
    max_width: u32,
    max_height: u32,
    quality: u8,
) -> Result<Vec<u8>, ViewerError> {
    let decoded = image::load_from_memory(bytes)
        .map_err(|err| ViewerError::CompressionFailed(err.to_string()))?;

    let resized = if decoded.width() > max_width || decoded.height() > max_height {
        decoded.resize(max_width, max_height, FilterType::CatmullRom)
    } else {
        decoded
    };

    let rgb = resized.to_rgb8();
    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, quality)
        .encode_image(&rgb)
        .map_err(|err| ViewerError::CompressionFailed(err.to_string()))?;
    Ok(out)
}

/// Fetches images, works out their display transform, and manages
/// compressed preview renditions
///
/// Each preview slot (one per viewer) owns at most one live blob URL. A new
/// request for a slot releases the previous blob first, and results of a
/// request that was superseded in the meantime are dropped.
pub struct ImageIngestPipeline<F> {
    fetcher: F,
    config: ImageConfig,
    retry: RetryPolicy,
    blobs: RefCell<BlobRegistry>,
    previews: RefCell<HashMap<String, PreviewSlot>>,
}

impl<F: Fetcher> ImageIngestPipeline<F> {
    pub fn new(fetcher: F, config: ImageConfig, retry: RetryPolicy) -> Self {
        Self {
            fetcher,
            config,
            retry,
            blobs: RefCell::new(BlobRegistry::default()),
            previews: RefCell::new(HashMap::new()),
        }
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    pub fn config(&self) -> &ImageConfig {
        &self.config
    }

    /// Fetch `url` with retry and fit it into `max_width x max_height`
    pub async fn load(
        &self,
        url: &str,
        max_width: u32,
        max_height: u32,
    ) -> Result<LoadedImage, ViewerError> {
        let image = fetch_image_with_retry(&self.fetcher, url, self.retry).await?;
        let (width, height) = decode_dimensions(&image.bytes)?;
        let transform = DisplayTransform::fit(width, height, max_width, max_height);
        log::debug!(
            "Loaded {}x{} image from {}, display {}x{}",
            width,
            height,
            url,
            transform.display_width,
            transform.display_height
        );
        Ok(LoadedImage {
            url: url.to_string(),
            image,
            transform,
        })
    }

    /// [`Self::load`] against the configured editor bounding box
    pub async fn load_for_display(&self, url: &str) -> Result<LoadedImage, ViewerError> {
        self.load(url, self.config.max_display_width, self.config.max_display_height)
            .await
    }

    /// Compress the image at `url` into a new blob URL
    ///
    /// The caller owns the returned URL and must hand it to
    /// [`Self::revoke_blob`] when done.
    pub async fn compress(
        &self,
        url: &str,
        max_width: u32,
        max_height: u32,
        quality: u8,
    ) -> Result<String, ViewerError> {
        let image = fetch_image_with_retry(&self.fetcher, url, self.retry).await?;
        let jpeg = compress_off_thread(image.bytes, max_width, max_height, quality).await?;
        Ok(self.blobs.borrow_mut().create(Blob {
            mime_type: JPEG_MIME_TYPE.to_string(),
            bytes: jpeg,
        }))
    }

    pub fn needs_compression(&self, width: u32, height: u32) -> bool {
        width > self.config.compress_threshold || height > self.config.compress_threshold
    }

    /// Choose what the preview in `slot` should display for `url`
    ///
    /// Large images are compressed; any compression problem falls back to the
    /// original URL and is only logged. Returns `Ok(None)` if another request
    /// for the same slot started while this one was running.
    pub async fn prepare_preview(
        &self,
        slot: &str,
        url: &str,
    ) -> Result<Option<PreviewSource>, ViewerError> {
        let generation = self.begin(slot);

        let image = fetch_image_with_retry(&self.fetcher, url, self.retry).await?;
        let (width, height) = decode_dimensions(&image.bytes)?;
        if !self.is_current(slot, generation) {
            return Ok(None);
        }
        if !self.needs_compression(width, height) {
            return Ok(Some(PreviewSource::Original(url.to_string())));
        }

        let compressed = compress_off_thread(
            image.bytes,
            self.config.compress_max_width,
            self.config.compress_max_height,
            self.config.jpeg_quality(),
        )
        .await;
        if !self.is_current(slot, generation) {
            return Ok(None);
        }

        let jpeg = match compressed.and_then(|jpeg| decode_dimensions(&jpeg).map(|_| jpeg)) {
            Ok(jpeg) => jpeg,
            Err(err) => {
                log::warn!("Image compression failed, using original: {}", err);
                return Ok(Some(PreviewSource::Original(url.to_string())));
            }
        };

        let blob_url = self.blobs.borrow_mut().create(Blob {
            mime_type: JPEG_MIME_TYPE.to_string(),
            bytes: jpeg,
        });
        if let Some(entry) = self.previews.borrow_mut().get_mut(slot) {
            entry.blob_url = Some(blob_url.clone());
        }
        log::info!("Compressed {}x{} preview for {}", width, height, url);
        Ok(Some(PreviewSource::Compressed(blob_url)))
    }

    /// Drop the compressed rendition of `slot` after it failed to display
    pub fn fall_back_to_original(&self, slot: &str, url: &str) -> PreviewSource {
        log::warn!("Compressed preview for {} failed to load, using original", url);
        self.release(slot);
        PreviewSource::Original(url.to_string())
    }

    /// Abandon any request for `slot` and revoke its blob
    pub fn release(&self, slot: &str) {
        if let Some(entry) = self.previews.borrow_mut().get_mut(slot) {
            entry.generation += 1;
            if let Some(url) = entry.blob_url.take() {
                self.blobs.borrow_mut().revoke(&url);
            }
        }
    }

    pub fn release_all(&self) {
        let mut previews = self.previews.borrow_mut();
        let mut blobs = self.blobs.borrow_mut();
        for entry in previews.values_mut() {
            entry.generation += 1;
            if let Some(url) = entry.blob_url.take() {
                blobs.revoke(&url);
            }
        }
    }

    pub fn revoke_blob(&self, url: &str) -> bool {
        self.blobs.borrow_mut().revoke(url)
    }

    pub fn blob(&self, url: &str) -> Option<Blob> {
        self.blobs.borrow().get(url).cloned()
    }

    pub fn live_blobs(&self) -> usize {
        self.blobs.borrow().live_count()
    }

    /// Start a new request for `slot`, releasing what the last one produced
    fn begin(&self, slot: &str) -> u64 {
        self.release(slot);
        let mut previews = self.previews.borrow_mut();
        let entry = previews.entry(slot.to_string()).or_default();
        entry.generation += 1;
        entry.generation
    }

    fn is_current(&self, slot: &str, generation: u64) -> bool {
        self.previews
            .borrow()
            .get(slot)
            .is_some_and(|entry| entry.generation == generation)
    }
}

async fn compress_off_thread(
    bytes: Vec<u8>,
    max_width: u32,
    max_height: u32,
    quality: u8,
) -> Result<Vec<u8>, ViewerError> {
    tokio::task::spawn_blocking(move || compress_bytes(&bytes, max_width, max_height, quality))
        .await
        .map_err(|err| ViewerError::CompressionFailed(err.to_string()))?
}
