//! Lenient readers for extraction metadata stored on documents.
//!
//! The JSON comes from an LLM, so every field is optional and shapes vary:
//! an attendee may be a bare string or an object, an action item may be a
//! string or an object with a `description`.

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use serde_json::Value;

use crate::db::{AttendanceStatus, DbDocument};

/// One attendee mention read from `metadata.attendees`.
#[derive(Debug, Clone, PartialEq)]
pub struct AttendeeMention {
    pub name: String,
    pub role: Option<String>,
    pub status: AttendanceStatus,
    pub source_text: Option<String>,
}

/// One entry from `metadata.topics`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TopicEntry {
    pub title: String,
    pub summary: Option<String>,
    pub action_items: Vec<String>,
}

fn str_field(obj: &Value, key: &str) -> Option<String> {
    obj.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Attendee mentions with a non-blank name, in document order.
pub fn attendee_mentions(doc: &DbDocument) -> Vec<AttendeeMention> {
    let Some(Value::Array(items)) = doc.metadata_field("attendees") else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| match item {
            Value::String(name) if !name.trim().is_empty() => Some(AttendeeMention {
                name: name.trim().to_string(),
                role: None,
                status: AttendanceStatus::Present,
                source_text: None,
            }),
            Value::Object(_) => Some(AttendeeMention {
                name: str_field(item, "name")?,
                role: str_field(item, "role"),
                status: str_field(item, "status")
                    .map(|s| AttendanceStatus::from_str_lossy(&s))
                    .unwrap_or(AttendanceStatus::Present),
                source_text: str_field(item, "source_text"),
            }),
            _ => None,
        })
        .collect()
}

/// Topics with a non-blank title, in document order.
pub fn topics(doc: &DbDocument) -> Vec<TopicEntry> {
    let Some(Value::Array(items)) = doc.metadata_field("topics") else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| {
            let title = match item {
                Value::String(s) => Some(s.trim().to_string()).filter(|s| !s.is_empty()),
                _ => str_field(item, "title"),
            }?;
            let action_items = item
                .get("action_items")
                .and_then(Value::as_array)
                .map(|actions| {
                    actions
                        .iter()
                        .filter_map(|a| match a {
                            Value::String(s) => Some(s.trim().to_string()),
                            _ => str_field(a, "description").or_else(|| str_field(a, "text")),
                        })
                        .filter(|s| !s.is_empty())
                        .collect()
                })
                .unwrap_or_default();
            Some(TopicEntry {
                title,
                summary: str_field(item, "summary"),
                action_items,
            })
        })
        .collect()
}

/// `metadata.meeting_date` as written by extraction (YYYY-MM-DD expected).
pub fn meeting_date(doc: &DbDocument) -> Option<String> {
    doc.metadata_field("meeting_date")
        .as_ref()
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

pub fn document_type(doc: &DbDocument) -> Option<String> {
    doc.metadata_field("document_type")
        .as_ref()
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Timestamp to record a sighting at: the meeting date at midnight UTC when
/// it parses, otherwise `now`.
pub fn sighting_timestamp(doc: &DbDocument, now: DateTime<Utc>) -> String {
    meeting_date(doc)
        .and_then(|d| NaiveDate::parse_from_str(&d, "%Y-%m-%d").ok())
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
        .unwrap_or(now)
        .to_rfc3339_opts(SecondsFormat::Secs, true)
}
