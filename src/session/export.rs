//! Flatten the canvas and append it to an attachment field
//!
//! The host has no atomic append: the list is read, extended and written back
//! whole. If the upload succeeds but the write fails, the uploaded file is
//! left unreferenced on the host.

use std::time::Duration;

use crate::canvas::{CanvasWidget, ExportRequest};
use crate::domain::{Attachment, PNG_MIME_TYPE};
use crate::error::ViewerError;
use crate::host::{CellRef, HostPlatform, UploadFile};
use crate::task::with_timeout;

/// `{prefix}-{epoch millis}.png`
pub fn export_file_name(prefix: &str, millis: i64) -> String {
    format!("{prefix}-{millis}.png")
}

async fn flatten_and_append<H: HostPlatform, C: CanvasWidget>(
    host: &H,
    canvas: &C,
    target: &CellRef,
    prefix: &str,
) -> Result<Attachment, ViewerError> {
    let elements = canvas.scene_elements();
    if elements.is_empty() {
        return Err(ViewerError::ExportFailed("canvas is empty".to_string()));
    }
    let blob = canvas
        .export_to_raster_blob(ExportRequest {
            elements,
            app_state: canvas.app_state(),
            files: canvas.files(),
            mime_type: PNG_MIME_TYPE.to_string(),
        })
        .await?;

    let millis = chrono::Utc::now().timestamp_millis();
    let name = export_file_name(prefix, millis);
    let mut list = host.attachment_list(target).await?;

    let size = blob.bytes.len() as u64;
    let token = host
        .upload_file(UploadFile {
            name: name.clone(),
            mime_type: blob.mime_type.clone(),
            bytes: blob.bytes,
        })
        .await?;
    log::debug!("Uploaded {} ({} bytes) as {}", name, size, token);

    let attachment = Attachment {
        name,
        size,
        mime_type: blob.mime_type,
        token,
        time_stamp: millis,
    };
    list.push(attachment.clone());
    if let Err(err) = host.set_attachment_list(target, list).await {
        log::warn!(
            "Uploaded {} but could not attach it, the file is orphaned: {}",
            attachment.name,
            err
        );
        return Err(err);
    }
    Ok(attachment)
}

/// Export the current scene as PNG into `target`, giving up after `timeout`
///
/// A timeout yields [`ViewerError::ExportTimeout`]; every other failure is
/// reported as [`ViewerError::ExportFailed`].
pub async fn export_canvas<H: HostPlatform, C: CanvasWidget>(
    host: &H,
    canvas: &C,
    target: &CellRef,
    prefix: &str,
    timeout: Duration,
) -> Result<Attachment, ViewerError> {
    match with_timeout(timeout, flatten_and_append(host, canvas, target, prefix)).await {
        Ok(Ok(attachment)) => {
            log::info!("Exported {} to field {}", attachment.name, target.field_id);
            Ok(attachment)
        }
        Ok(Err(err @ ViewerError::ExportFailed(_))) => Err(err),
        Ok(Err(err)) => Err(ViewerError::ExportFailed(err.to_string())),
        Err(timed_out) => {
            log::warn!("Export {}", timed_out);
            Err(ViewerError::ExportTimeout)
        }
    }
}
