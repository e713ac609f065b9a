//! Attachment records as stored by the host base, and file type checks

use serde::{Deserialize, Serialize};

const IMAGE_EXTENSIONS: [&str; 6] = ["jpg", "jpeg", "png", "gif", "webp", "bmp"];
const IMAGE_MIME_PREFIX: &str = "image/";
pub const PDF_MIME_TYPE: &str = "application/pdf";
pub const PNG_MIME_TYPE: &str = "image/png";
const OCTET_STREAM: &str = "application/octet-stream";

/// One file inside an attachment cell
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub name: String,
    pub size: u64,
    #[serde(rename = "type")]
    pub mime_type: String,
    pub token: String,
    /// Epoch milliseconds
    #[serde(default)]
    pub time_stamp: i64,
}

/// An attachment paired with its resolved download URL
#[derive(Clone, Debug, PartialEq)]
pub struct AttachmentWithUrl {
    pub attachment: Attachment,
    pub url: Option<String>,
}

/// What a viewer can do with an attachment
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AttachmentKind {
    Image,
    Pdf,
    Unsupported,
}

impl Attachment {
    pub fn kind(&self) -> AttachmentKind {
        if is_image(&self.mime_type, &self.name) {
            AttachmentKind::Image
        } else if is_pdf(&self.mime_type, &self.name) {
            AttachmentKind::Pdf
        } else {
            AttachmentKind::Unsupported
        }
    }
}

fn extension(name: &str) -> Option<String> {
    let base = name.split(['?', '#']).next().unwrap_or(name);
    let (_, ext) = base.rsplit_once('.')?;
    Some(ext.to_ascii_lowercase())
}

pub fn is_image(mime_type: &str, name: &str) -> bool {
    mime_type.starts_with(IMAGE_MIME_PREFIX)
        || extension(name).is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.as_str()))
}

pub fn is_pdf(mime_type: &str, name: &str) -> bool {
    mime_type == PDF_MIME_TYPE || extension(name).is_some_and(|ext| ext == "pdf")
}

pub fn is_supported(mime_type: &str, name: &str) -> bool {
    is_image(mime_type, name) || is_pdf(mime_type, name)
}

/// Guess an image MIME type from a URL's file extension
pub fn guess_image_mime(url: &str) -> Option<&'static str> {
    match extension(url)?.as_str() {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "gif" => Some("image/gif"),
        "webp" => Some("image/webp"),
        "bmp" => Some("image/bmp"),
        _ => None,
    }
}

/// Pick the MIME type to store a fetched image under
///
/// Uses the response type unless it is missing or generic, then the URL
/// extension, then JPEG.
pub fn resolve_image_mime(content_type: Option<&str>, url: &str) -> String {
    match content_type.map(str::trim) {
        Some(ct) if !ct.is_empty() && ct != OCTET_STREAM => ct.to_string(),
        _ => guess_image_mime(url).unwrap_or("image/jpeg").to_string(),
    }
}

/// Whether a response `Content-Type` may carry image bytes
pub fn is_image_content_type(content_type: Option<&str>) -> bool {
    match content_type.map(str::trim) {
        None => true,
        Some(ct) => ct.is_empty() || ct.starts_with(IMAGE_MIME_PREFIX) || ct == OCTET_STREAM,
    }
}
