//! Field lookups and grading data loading on top of [`HostPlatform`]

use super::{CellRef, FieldMeta, FieldType, HostPlatform, TextSegment};
use crate::domain::{GradingRecord, parse_grading_records};
use crate::error::ViewerError;
use crate::ingest::{Fetcher, fetch_text};

pub fn concat_segments(segments: &[TextSegment]) -> String {
    segments.iter().map(|s| s.text.as_str()).collect()
}

pub fn has_text_value(segments: &[TextSegment]) -> bool {
    !concat_segments(segments).trim().is_empty()
}

pub async fn find_field_by_name<H: HostPlatform>(
    host: &H,
    table_id: &str,
    name: &str,
) -> Result<Option<FieldMeta>, ViewerError> {
    let fields = host.field_meta_list(table_id).await?;
    Ok(fields.into_iter().find(|f| f.name == name))
}

/// Raw grading text of a record
///
/// Fails with [`ViewerError::GradeFieldMissing`] if the table has no such
/// field and [`ViewerError::GradeFieldEmpty`] if the cell is blank.
pub async fn load_grade_text<H: HostPlatform>(
    host: &H,
    table_id: &str,
    record_id: &str,
    field_name: &str,
) -> Result<String, ViewerError> {
    let field = find_field_by_name(host, table_id, field_name)
        .await?
        .ok_or_else(|| ViewerError::GradeFieldMissing {
            field: field_name.to_string(),
        })?;

    let cell = CellRef {
        table_id: table_id.to_string(),
        record_id: record_id.to_string(),
        field_id: field.id,
    };
    let text = concat_segments(&host.text_field_value(&cell).await?);
    if text.trim().is_empty() {
        return Err(ViewerError::GradeFieldEmpty {
            field: field_name.to_string(),
        });
    }
    Ok(text)
}

/// Whether a record has grading data worth opening
pub async fn check_grade_field<H: HostPlatform>(
    host: &H,
    table_id: &str,
    record_id: &str,
    field_name: &str,
) -> bool {
    let field = match find_field_by_name(host, table_id, field_name).await {
        Ok(Some(field)) => field,
        Ok(None) => return false,
        Err(err) => {
            log::error!("Error checking grade field: {}", err);
            return false;
        }
    };
    if field.field_type != FieldType::Text {
        return false;
    }

    let cell = CellRef {
        table_id: table_id.to_string(),
        record_id: record_id.to_string(),
        field_id: field.id,
    };
    match host.text_field_value(&cell).await {
        Ok(segments) => has_text_value(&segments),
        Err(err) => {
            log::error!("Error reading grade field: {}", err);
            false
        }
    }
}

/// Attachment fields of a table, those whose name contains `hint` first
///
/// Order is otherwise kept. Host errors yield an empty list.
pub async fn attachment_fields_by_priority<H: HostPlatform>(
    host: &H,
    table_id: &str,
    hint: &str,
) -> Vec<FieldMeta> {
    let fields = match host.field_meta_list(table_id).await {
        Ok(fields) => fields,
        Err(err) => {
            log::error!("Error loading attachment fields: {}", err);
            return Vec::new();
        }
    };
    let mut attachments: Vec<FieldMeta> = fields
        .into_iter()
        .filter(|f| f.field_type == FieldType::Attachment)
        .collect();
    // Stable sort keeps the host order within each group
    attachments.sort_by_key(|f| !f.name.contains(hint));
    attachments
}

/// Primary field value of a record, empty on any failure
pub async fn record_title<H: HostPlatform>(host: &H, table_id: &str, record_id: &str) -> String {
    let fields = match host.field_meta_list(table_id).await {
        Ok(fields) => fields,
        Err(err) => {
            log::error!("Error getting record title: {}", err);
            return String::new();
        }
    };
    let Some(primary) = fields.into_iter().find(|f| f.is_primary) else {
        return String::new();
    };
    let cell = CellRef {
        table_id: table_id.to_string(),
        record_id: record_id.to_string(),
        field_id: primary.id,
    };
    host.cell_string(&cell).await.unwrap_or_else(|err| {
        log::error!("Error getting record title: {}", err);
        String::new()
    })
}

fn is_remote_url(text: &str) -> bool {
    text.starts_with("http://") || text.starts_with("https://")
}

/// Grading JSON stored inline, or dereferenced if the field holds a URL
pub async fn resolve_grade_json<F: Fetcher>(
    fetcher: &F,
    text: &str,
) -> Result<String, ViewerError> {
    let trimmed = text.trim();
    if is_remote_url(trimmed) {
        log::debug!("Fetching grading data from {}", trimmed);
        fetch_text(fetcher, trimmed).await
    } else {
        Ok(text.to_string())
    }
}

/// Load and parse every grading record stored on a record
pub async fn load_grading_records<H: HostPlatform, F: Fetcher>(
    host: &H,
    fetcher: &F,
    table_id: &str,
    record_id: &str,
    field_name: &str,
) -> Result<Vec<GradingRecord>, ViewerError> {
    let text = load_grade_text(host, table_id, record_id, field_name).await?;
    let json = resolve_grade_json(fetcher, &text).await?;
    parse_grading_records(&json).map_err(|err| ViewerError::ParseFailed(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::FetchResponse;
    use crate::testing::{FakeFetcher, FakeHost, GRADE_FIELD};

    const GRADE_JSON: &str = r#"[{"image_url": "https://h/a.png", "questions_info": []}]"#;

    #[test]
    fn test_segments_concatenate() {
        let segments = [TextSegment::plain("[{"), TextSegment::plain("}]")];
        assert_eq!(concat_segments(&segments), "[{}]");
        assert!(has_text_value(&segments));
        assert!(!has_text_value(&[TextSegment::plain("  \n")]));
        assert!(!has_text_value(&[]));
    }

    #[tokio::test]
    async fn test_grade_field_missing_and_empty() {
        let host = FakeHost::new();
        let err = load_grade_text(&host, "t", "r", "nope").await.unwrap_err();
        assert_eq!(err, ViewerError::GradeFieldMissing { field: "nope".into() });

        host.set_text("r", "grade", "   ");
        let err = load_grade_text(&host, "t", "r", GRADE_FIELD).await.unwrap_err();
        assert!(matches!(err, ViewerError::GradeFieldEmpty { .. }));
        assert!(!check_grade_field(&host, "t", "r", GRADE_FIELD).await);

        host.set_text("r", "grade", GRADE_JSON);
        assert!(check_grade_field(&host, "t", "r", GRADE_FIELD).await);
    }

    #[tokio::test]
    async fn test_grade_field_must_be_text() {
        let host = FakeHost::new();
        assert!(!check_grade_field(&host, "t", "r", "附件").await);
    }

    #[tokio::test]
    async fn test_attachment_fields_prefer_hint() {
        let host = FakeHost::new();
        let fields = attachment_fields_by_priority(&host, "t", "结果").await;
        let names: Vec<&str> = fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["批改结果", "附件", "备用附件"]);
    }

    #[tokio::test]
    async fn test_record_title_from_primary_field() {
        let host = FakeHost::new();
        host.set_cell_string("r", "title", "张三 - 第3周");
        assert_eq!(record_title(&host, "t", "r").await, "张三 - 第3周");
        assert_eq!(record_title(&host, "t", "missing").await, "");
    }

    #[tokio::test]
    async fn test_grading_json_behind_url_is_fetched() {
        let host = FakeHost::new();
        host.set_text("r", "grade", " https://h/grade.json ");
        let fetcher = FakeFetcher::default();
        fetcher.set_response(
            "https://h/grade.json",
            FetchResponse::ok(Some("application/json"), GRADE_JSON.as_bytes().to_vec()),
        );
        let records = load_grading_records(&host, &fetcher, "t", "r", GRADE_FIELD).await.unwrap();
        assert_eq!(records[0].image_url, "https://h/a.png");
    }

    #[tokio::test]
    async fn test_malformed_grading_json_is_parse_error() {
        let host = FakeHost::new();
        host.set_text("r", "grade", "{\"image_url\": ");
        let err = load_grading_records(&host, &FakeFetcher::default(), "t", "r", GRADE_FIELD)
            .await
            .unwrap_err();
        assert!(matches!(err, ViewerError::ParseFailed(_)));
    }
}
