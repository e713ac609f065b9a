//! Network access port and the image/text fetch helpers built on it

use std::path::{Path, PathBuf};

use crate::domain::{guess_image_mime, is_image_content_type, resolve_image_mime};
use crate::error::{FetchCause, ViewerError};
use crate::task::{RetryPolicy, with_retry};

pub const ACCEPT_IMAGE: &str = "image/*";
pub const ACCEPT_ANY: &str = "*/*";

/// Raw response as delivered by the transport
#[derive(Clone, Debug, PartialEq)]
pub struct FetchResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

impl FetchResponse {
    pub fn ok(content_type: Option<&str>, body: Vec<u8>) -> Self {
        Self {
            status: 200,
            content_type: content_type.map(str::to_string),
            body,
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Transport used to GET resources by URL
///
/// Implementations report transport failures as [`ViewerError::FetchFailed`]
/// and return non-2xx responses as values; status handling is up to callers.
pub trait Fetcher {
    async fn get(&self, url: &str, accept: &str) -> Result<FetchResponse, ViewerError>;
}

/// Image bytes with the MIME type they should be stored under
#[derive(Clone, Debug, PartialEq)]
pub struct FetchedImage {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

fn check_status(url: &str, response: &FetchResponse) -> Result<(), ViewerError> {
    if response.is_success() {
        Ok(())
    } else {
        Err(ViewerError::FetchFailed {
            cause: FetchCause::Http(response.status),
            detail: url.to_string(),
        })
    }
}

/// Single GET of an image, validating status, content type and body
pub async fn fetch_image<F: Fetcher>(fetcher: &F, url: &str) -> Result<FetchedImage, ViewerError> {
    let response = fetcher.get(url, ACCEPT_IMAGE).await?;
    check_status(url, &response)?;

    let content_type = response.content_type.as_deref();
    if !is_image_content_type(content_type) {
        return Err(ViewerError::UnsupportedResponse {
            content_type: content_type.unwrap_or_default().to_string(),
        });
    }
    if response.body.is_empty() {
        return Err(ViewerError::DecodeFailed("empty image data".to_string()));
    }

    Ok(FetchedImage {
        mime_type: resolve_image_mime(content_type, url),
        bytes: response.body,
    })
}

/// [`fetch_image`] retried with exponential backoff
pub async fn fetch_image_with_retry<F: Fetcher>(
    fetcher: &F,
    url: &str,
    policy: RetryPolicy,
) -> Result<FetchedImage, ViewerError> {
    with_retry(policy, |_| fetch_image(fetcher, url)).await
}

/// Single GET of a UTF-8 document such as dereferenced grading JSON
pub async fn fetch_text<F: Fetcher>(fetcher: &F, url: &str) -> Result<String, ViewerError> {
    let response = fetcher.get(url, ACCEPT_ANY).await?;
    check_status(url, &response)?;
    String::from_utf8(response.body)
        .map_err(|err| ViewerError::ParseFailed(format!("response is not UTF-8: {err}")))
}

/// Fetcher over the local filesystem
///
/// Accepts plain paths and `file://` URLs. Relative paths resolve against
/// `root` when one is set. A missing file reads as HTTP 404.
#[derive(Clone, Debug, Default)]
pub struct LocalFileFetcher {
    root: Option<PathBuf>,
}

impl LocalFileFetcher {
    pub fn new(root: Option<PathBuf>) -> Self {
        Self { root }
    }

    pub fn resolve(&self, url: &str) -> PathBuf {
        let path = Path::new(url.strip_prefix("file://").unwrap_or(url));
        match &self.root {
            Some(root) if path.is_relative() => root.join(path),
            _ => path.to_path_buf(),
        }
    }
}

impl Fetcher for LocalFileFetcher {
    async fn get(&self, url: &str, _accept: &str) -> Result<FetchResponse, ViewerError> {
        let path = self.resolve(url);
        let content_type = match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Some("application/json"),
            Some(ext) if ext.eq_ignore_ascii_case("pdf") => Some("application/pdf"),
            _ => guess_image_mime(url),
        };

        let read_path = path.clone();
        let result = tokio::task::spawn_blocking(move || std::fs::read(read_path))
            .await
            .map_err(|err| ViewerError::FetchFailed {
                cause: FetchCause::Network,
                detail: err.to_string(),
            })?;

        match result {
            Ok(body) => Ok(FetchResponse::ok(content_type, body)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                log::debug!("No file at {}", path.display());
                Ok(FetchResponse {
                    status: 404,
                    content_type: None,
                    body: Vec::new(),
                })
            }
            Err(err) => Err(ViewerError::FetchFailed {
                cause: FetchCause::Network,
                detail: format!("{}: {err}", path.display()),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeFetcher;
    use std::time::Duration;
    use tokio::time::Instant;

    #[tokio::test(start_paused = true)]
    async fn test_image_fetch_retries_then_succeeds() {
        let fetcher = FakeFetcher::default();
        fetcher.push_error("https://h/a.png", FetchCause::Network);
        fetcher.push_response("https://h/a.png", FetchResponse::ok(Some("image/png"), vec![1, 2]));

        let start = Instant::now();
        let image = fetch_image_with_retry(&fetcher, "https://h/a.png", RetryPolicy::default())
            .await
            .unwrap();
        assert_eq!(image.mime_type, "image/png");
        assert_eq!(fetcher.calls("https://h/a.png"), 2);
        assert!(start.elapsed() >= Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_image_content_type_is_rejected() {
        let fetcher = FakeFetcher::default();
        fetcher.set_response(
            "https://h/a",
            FetchResponse::ok(Some("text/html"), b"<html>".to_vec()),
        );
        let err = fetch_image_with_retry(&fetcher, "https://h/a", RetryPolicy::default())
            .await
            .unwrap_err();
        assert_eq!(
            err,
            ViewerError::UnsupportedResponse { content_type: "text/html".to_string() }
        );
        assert_eq!(fetcher.calls("https://h/a"), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_http_status_and_empty_body() {
        let fetcher = FakeFetcher::default();
        fetcher.set_response(
            "https://h/404",
            FetchResponse { status: 404, content_type: None, body: Vec::new() },
        );
        fetcher.set_response("https://h/empty", FetchResponse::ok(Some("image/png"), Vec::new()));

        let err = fetch_image(&fetcher, "https://h/404").await.unwrap_err();
        assert!(matches!(err, ViewerError::FetchFailed { cause: FetchCause::Http(404), .. }));
        let err = fetch_image(&fetcher, "https://h/empty").await.unwrap_err();
        assert!(matches!(err, ViewerError::DecodeFailed(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_octet_stream_uses_url_extension() {
        let fetcher = FakeFetcher::default();
        fetcher.set_response(
            "https://h/x.webp?sig=1",
            FetchResponse::ok(Some("application/octet-stream"), vec![0]),
        );
        let image = fetch_image(&fetcher, "https://h/x.webp?sig=1").await.unwrap();
        assert_eq!(image.mime_type, "image/webp");
    }

    #[tokio::test]
    async fn test_local_file_fetcher() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("grade.json"), "[]").unwrap();
        let fetcher = LocalFileFetcher::new(Some(dir.path().to_path_buf()));

        assert_eq!(fetch_text(&fetcher, "grade.json").await.unwrap(), "[]");
        let missing = fetcher.get("nope.png", ACCEPT_IMAGE).await.unwrap();
        assert_eq!(missing.status, 404);
        let err = fetch_text(&fetcher, "nope.json").await.unwrap_err();
        assert!(matches!(err, ViewerError::FetchFailed { cause: FetchCause::Http(404), .. }));
    }
}
