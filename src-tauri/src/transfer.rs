use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{json, Value};

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum TransferError {
    #[error("Invalid JSON file")]
    InvalidJson,
    #[error("Unsupported format")]
    UnsupportedFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransferFormat {
    Txt,
    Json,
}

impl TransferFormat {
    pub fn parse(name: &str) -> Result<Self, TransferError> {
        match name {
            "txt" => Ok(Self::Txt),
            "json" => Ok(Self::Json),
            _ => Err(TransferError::UnsupportedFormat),
        }
    }

    /// Picked files classify by extension, with plain text as the default
    /// for anything that isn't .json.
    pub fn from_path(path: &std::path::Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::Json,
            _ => Self::Txt,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Txt => "txt",
            Self::Json => "json",
        }
    }
}

pub struct ExportFile {
    pub filename: &'static str,
    pub body: String,
}

/// Renders the combined note text into an export payload. The JSON form
/// wraps it with a timestamp and a payload version.
pub fn render_export(content: &str, format: TransferFormat, timestamp: DateTime<Utc>) -> ExportFile {
    match format {
        TransferFormat::Txt => ExportFile {
            filename: "sticky_notes.txt",
            body: content.to_string(),
        },
        TransferFormat::Json => {
            let payload = json!({
                "content": content,
                "timestamp": timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
                "version": "1.0",
            });
            ExportFile {
                filename: "sticky_notes.json",
                body: serde_json::to_string_pretty(&payload)
                    .unwrap_or_else(|_| payload.to_string()),
            }
        }
    }
}

/// Extracts the note text carried by an imported file.
pub fn parse_import(content: &str, format: TransferFormat) -> Result<String, TransferError> {
    match format {
        TransferFormat::Txt => Ok(content.to_string()),
        TransferFormat::Json => {
            let payload: Value =
                serde_json::from_str(content).map_err(|_| TransferError::InvalidJson)?;
            Ok(payload
                .get("content")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string())
        }
    }
}

/// Joins every stored note's text for export. Accepts both the note array
/// and the legacy single-string record.
pub fn combined_content(stored: &Value) -> String {
    match stored {
        Value::Array(notes) => notes
            .iter()
            .filter_map(|note| note.get("content").and_then(Value::as_str))
            .collect::<Vec<_>>()
            .join("\n\n"),
        Value::String(content) => content.clone(),
        _ => String::new(),
    }
}

/// Applies imported text to the stored notes: the first note's content is
/// replaced, and an empty store gets one default note carrying it.
pub fn apply_import(notes: Option<Value>, content: &str) -> Value {
    match notes {
        Some(Value::Array(mut notes)) if !notes.is_empty() => {
            if let Some(map) = notes[0].as_object_mut() {
                map.insert("content".into(), json!(content));
            }
            Value::Array(notes)
        }
        _ => json!([default_note(content)]),
    }
}

fn default_note(content: &str) -> Value {
    json!({
        "id": "note-1",
        "content": content,
        "position": {"top": "20px", "right": "20px", "left": "auto", "bottom": "auto"},
        "size": {"width": "300px", "height": "200px"},
        "minimized": false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn txt_export_is_the_raw_content() {
        let file = render_export("a\n\nb", TransferFormat::Txt, Utc::now());
        assert_eq!(file.filename, "sticky_notes.txt");
        assert_eq!(file.body, "a\n\nb");
    }

    #[test]
    fn json_export_carries_timestamp_and_version() {
        let stamp = "2026-08-26T12:00:00Z".parse().unwrap();
        let file = render_export("hello", TransferFormat::Json, stamp);
        assert_eq!(file.filename, "sticky_notes.json");
        let payload: Value = serde_json::from_str(&file.body).unwrap();
        assert_eq!(payload["content"], json!("hello"));
        assert_eq!(payload["timestamp"], json!("2026-08-26T12:00:00.000Z"));
        assert_eq!(payload["version"], json!("1.0"));
    }

    #[test]
    fn unknown_format_is_rejected() {
        assert_eq!(
            TransferFormat::parse("pdf"),
            Err(TransferError::UnsupportedFormat)
        );
        assert_eq!(
            TransferError::UnsupportedFormat.to_string(),
            "Unsupported format"
        );
    }

    #[test]
    fn malformed_json_import_is_rejected() {
        let err = parse_import("{not json", TransferFormat::Json).unwrap_err();
        assert_eq!(err, TransferError::InvalidJson);
        assert_eq!(err.to_string(), "Invalid JSON file");
    }

    #[test]
    fn json_import_without_content_yields_empty_text() {
        assert_eq!(
            parse_import(r#"{"version": "1.0"}"#, TransferFormat::Json).unwrap(),
            ""
        );
    }

    #[test]
    fn combined_content_joins_notes_with_blank_lines() {
        let stored = json!([
            {"id": "note-1", "content": "first"},
            {"id": "note-2", "content": "second"},
        ]);
        assert_eq!(combined_content(&stored), "first\n\nsecond");
        assert_eq!(combined_content(&json!("legacy text")), "legacy text");
        assert_eq!(combined_content(&Value::Null), "");
    }

    #[test]
    fn import_replaces_the_first_notes_content() {
        let notes = json!([
            {"id": "note-1", "content": "old"},
            {"id": "note-2", "content": "kept"},
        ]);
        let applied = apply_import(Some(notes), "imported");
        assert_eq!(applied[0]["content"], json!("imported"));
        assert_eq!(applied[1]["content"], json!("kept"));
    }

    #[test]
    fn import_into_an_empty_store_creates_one_note() {
        let applied = apply_import(None, "imported");
        assert_eq!(applied[0]["id"], json!("note-1"));
        assert_eq!(applied[0]["content"], json!("imported"));
        assert_eq!(applied[0]["position"]["top"], json!("20px"));
    }
}
