//! Shared type definitions for the database layer.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors specific to database operations.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Home directory not found")]
    HomeDirNotFound,

    #[error("Failed to create database directory: {0}")]
    CreateDir(std::io::Error),

    #[error("Schema migration failed: {0}")]
    Migration(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("Refused: {0}")]
    Refused(String),

    #[error("JSON column encoding failed: {0}")]
    Json(#[from] serde_json::Error),
}

impl DbError {
    /// True when the underlying SQLite error is a UNIQUE/CHECK/FK violation.
    pub fn is_constraint_violation(&self) -> bool {
        matches!(
            self,
            DbError::Sqlite(rusqlite::Error::SqliteFailure(err, _))
                if err.code == rusqlite::ErrorCode::ConstraintViolation
        )
    }
}

/// A row from the `towns` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbTown {
    pub id: i64,
    pub name: String,
    pub normalized_name: String,
    pub created_at: String,
    pub updated_at: String,
}

/// A row from the `governing_bodies` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbGoverningBody {
    pub id: i64,
    /// Bodies imported before their town was known have no town and are
    /// excluded from search.
    pub town_id: Option<i64>,
    pub name: String,
    pub normalized_name: String,
    pub created_at: String,
    pub updated_at: String,
}

/// Extraction pipeline state of a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    Pending,
    Processing,
    Complete,
    Failed,
}

impl DocumentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentStatus::Pending => "pending",
            DocumentStatus::Processing => "processing",
            DocumentStatus::Complete => "complete",
            DocumentStatus::Failed => "failed",
        }
    }

    pub fn from_str_lossy(s: &str) -> Self {
        match s {
            "processing" => DocumentStatus::Processing,
            "complete" => DocumentStatus::Complete,
            "failed" => DocumentStatus::Failed,
            _ => DocumentStatus::Pending,
        }
    }
}

/// A row from the `documents` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbDocument {
    pub id: i64,
    pub governing_body_id: Option<i64>,
    pub title: String,
    pub status: DocumentStatus,
    /// JSON object produced by the extraction pipeline.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extracted_text: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl DbDocument {
    /// Decode one top-level field of the extraction metadata.
    ///
    /// Returns `None` when the metadata is absent, not valid JSON, or lacks
    /// the field.
    pub fn metadata_field(&self, name: &str) -> Option<serde_json::Value> {
        let raw = self.metadata.as_deref()?;
        let mut value: serde_json::Value = serde_json::from_str(raw).ok()?;
        match value.get_mut(name) {
            Some(field) if !field.is_null() => Some(field.take()),
            _ => None,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.status == DocumentStatus::Complete
    }
}

/// A row from the `people` table: a resolved identity scoped to a town.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbPerson {
    pub id: i64,
    pub town_id: i64,
    pub name: String,
    pub normalized_name: String,
    pub appearances_count: i64,
    pub created_at: String,
    pub updated_at: String,
}

/// Merge state of an attendee.
///
/// Stored as a nullable `merged_into_id` column; modelled here as a tagged
/// union so callers cannot forget the redirect case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "targetId", rename_all = "camelCase")]
pub enum AttendeeState {
    Active,
    MergedInto(i64),
}

impl AttendeeState {
    pub fn from_column(merged_into_id: Option<i64>) -> Self {
        match merged_into_id {
            Some(id) => AttendeeState::MergedInto(id),
            None => AttendeeState::Active,
        }
    }

    pub fn merged_into(&self) -> Option<i64> {
        match self {
            AttendeeState::Active => None,
            AttendeeState::MergedInto(id) => Some(*id),
        }
    }

    pub fn is_merged(&self) -> bool {
        matches!(self, AttendeeState::MergedInto(_))
    }
}

/// A row from the `attendees` table: one extracted mention identity within
/// a governing body.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbAttendee {
    pub id: i64,
    pub person_id: i64,
    pub name: String,
    pub normalized_name: String,
    /// Primary governing body, as named at extraction time.
    pub governing_body: String,
    /// Every governing body this identity has been observed in.
    pub governing_bodies: Vec<String>,
    pub first_seen_at: Option<String>,
    pub last_seen_at: Option<String>,
    pub state: AttendeeState,
    pub appearances_count: i64,
    pub created_at: String,
    pub updated_at: String,
}

/// Attendance recorded on a `document_attendees` row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttendanceStatus {
    Present,
    Absent,
    Remote,
}

impl AttendanceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttendanceStatus::Present => "present",
            AttendanceStatus::Absent => "absent",
            AttendanceStatus::Remote => "remote",
        }
    }

    /// Lenient parse of LLM output ("Absent", "virtual", "via zoom", ...).
    /// Anything unrecognised counts as present.
    pub fn from_str_lossy(s: &str) -> Self {
        let lowered = s.trim().to_lowercase();
        if lowered.starts_with("absent") || lowered == "excused" {
            AttendanceStatus::Absent
        } else if lowered.starts_with("remote")
            || lowered.contains("virtual")
            || lowered.contains("zoom")
            || lowered.contains("phone")
        {
            AttendanceStatus::Remote
        } else {
            AttendanceStatus::Present
        }
    }
}

/// A row from the `document_attendees` join table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbDocumentAttendee {
    pub id: i64,
    pub document_id: i64,
    pub attendee_id: i64,
    pub role: Option<String>,
    pub status: AttendanceStatus,
    pub source_text: Option<String>,
    pub created_at: String,
}

/// How a duplicate pair was matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    Exact,
    Similar,
}

impl MatchType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchType::Exact => "exact",
            MatchType::Similar => "similar",
        }
    }

    pub fn from_str_lossy(s: &str) -> Self {
        match s {
            "exact" => MatchType::Exact,
            _ => MatchType::Similar,
        }
    }
}

/// A row from the `duplicate_suggestions` table. `person_id` is always the
/// smaller of the two ids.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbDuplicateSuggestion {
    pub id: i64,
    pub person_id: i64,
    pub duplicate_person_id: i64,
    pub match_type: MatchType,
    /// Edit distance between the normalized names; 0 for exact matches.
    pub similarity_score: i64,
    pub created_at: String,
}

/// A row from the `search_index` FTS table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbSearchEntry {
    pub entity_type: String,
    pub entity_id: i64,
    pub title: String,
    pub subtitle: Option<String>,
    pub content: String,
    pub url: String,
}

/// A row from the `audit_logs` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbAuditLog {
    pub id: i64,
    pub action: String,
    pub actor: Option<String>,
    pub ip_address: Option<String>,
    pub details: serde_json::Value,
    pub created_at: String,
}

/// Result of a Person-level merge.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonMergeResult {
    pub attendees_moved: usize,
    pub source_appearances: i64,
    pub target_appearances_before: i64,
    pub target_appearances_after: i64,
}

/// Result of an Attendee-level merge.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendeeMergeResult {
    pub target_appearances_before: i64,
    pub target_appearances_after: i64,
    pub governing_bodies: Vec<String>,
}

/// Result of splitting one attendee out into a new Person.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnmergeResult {
    pub original_person_id: i64,
    pub new_person_id: i64,
    pub original_appearances_after: i64,
    pub new_appearances: i64,
}
