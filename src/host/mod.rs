//! Port to the spreadsheet base hosting the plugin
//!
//! Everything the viewer knows about tables, fields, records and attachment
//! storage comes through [`HostPlatform`].

pub mod fields;

use crate::domain::Attachment;
use crate::error::ViewerError;

pub use fields::{
    attachment_fields_by_priority, check_grade_field, concat_segments, find_field_by_name,
    has_text_value, load_grade_text, load_grading_records, record_title, resolve_grade_json,
};

/// Host selection; any part may be missing
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Selection {
    pub table_id: Option<String>,
    pub record_id: Option<String>,
    pub field_id: Option<String>,
}

impl Selection {
    pub fn cell(table_id: &str, record_id: &str, field_id: &str) -> Self {
        Self {
            table_id: Some(table_id.to_string()),
            record_id: Some(record_id.to_string()),
            field_id: Some(field_id.to_string()),
        }
    }

    /// The selected cell, if table, record and field are all set
    pub fn complete(&self) -> Option<CellRef> {
        Some(CellRef {
            table_id: self.table_id.clone()?,
            record_id: self.record_id.clone()?,
            field_id: self.field_id.clone()?,
        })
    }
}

/// Fully qualified cell address
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CellRef {
    pub table_id: String,
    pub record_id: String,
    pub field_id: String,
}

impl CellRef {
    /// Same record, different field
    pub fn with_field(&self, field_id: &str) -> CellRef {
        CellRef {
            field_id: field_id.to_string(),
            ..self.clone()
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldType {
    Text,
    Attachment,
    Url,
    Number,
    Other,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldMeta {
    pub id: String,
    pub name: String,
    pub field_type: FieldType,
    pub is_primary: bool,
}

/// One run of rich text in a text cell
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TextSegment {
    pub text: String,
    pub link: Option<String>,
}

impl TextSegment {
    pub fn plain(text: &str) -> Self {
        Self {
            text: text.to_string(),
            link: None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ToastSeverity {
    Info,
    Success,
    Warning,
    Error,
}

/// File handed to the host for storage
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UploadFile {
    pub name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

/// Capabilities consumed from the host base
pub trait HostPlatform {
    async fn current_selection(&self) -> Result<Selection, ViewerError>;

    async fn field_meta_list(&self, table_id: &str) -> Result<Vec<FieldMeta>, ViewerError>;

    async fn field_meta(&self, table_id: &str, field_id: &str) -> Result<FieldMeta, ViewerError>;

    /// Display string of a cell, as the host formats it
    async fn cell_string(&self, cell: &CellRef) -> Result<String, ViewerError>;

    async fn text_field_value(&self, cell: &CellRef) -> Result<Vec<TextSegment>, ViewerError>;

    async fn attachment_list(&self, cell: &CellRef) -> Result<Vec<Attachment>, ViewerError>;

    /// Download URLs, parallel to [`Self::attachment_list`]
    async fn attachment_urls(&self, cell: &CellRef) -> Result<Vec<Option<String>>, ViewerError>;

    /// Replace the whole attachment list of a cell
    async fn set_attachment_list(
        &self,
        cell: &CellRef,
        attachments: Vec<Attachment>,
    ) -> Result<(), ViewerError>;

    /// Store a file and return its token
    async fn upload_file(&self, file: UploadFile) -> Result<String, ViewerError>;

    fn show_toast(&self, message: &str, severity: ToastSeverity);
}
