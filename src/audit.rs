//! Audit trail for identity mutations.
//!
//! Who performed an operation travels as an explicit `AuditContext` value.
//! Rows land in `audit_logs` after the mutation has committed.

use serde::Serialize;

use crate::db::RecordsDb;

pub const ACTION_PERSON_MERGE: &str = "person_merge";
pub const ACTION_ATTENDEE_MERGE: &str = "attendee_merge";
pub const ACTION_ATTENDEE_UNMERGE: &str = "attendee_unmerge";
pub const ACTION_DUPLICATE_DETECTION: &str = "duplicate_detection";
pub const ACTION_SEARCH_REBUILD: &str = "search_rebuild";

/// Who performed an operation, and from where.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditContext {
    pub actor: Option<String>,
    pub ip_address: Option<String>,
}

impl AuditContext {
    pub fn new(actor: impl Into<String>, ip_address: Option<String>) -> Self {
        Self {
            actor: Some(actor.into()),
            ip_address,
        }
    }

    /// Context for scheduled jobs and CLI maintenance runs.
    pub fn system() -> Self {
        Self {
            actor: Some("system".to_string()),
            ip_address: None,
        }
    }
}

/// Buckets used by the admin dashboard's audit badges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditCategory {
    PersonMerge,
    AttendeeMerge,
    Unmerge,
    Detection,
    Other,
}

impl AuditCategory {
    /// Classify an action name by prefix. Kept in step with the CASE
    /// expression in `RecordsDb::audit_counts_by_category`.
    pub fn classify(action: &str) -> Self {
        if action.starts_with(ACTION_PERSON_MERGE) {
            AuditCategory::PersonMerge
        } else if action.starts_with(ACTION_ATTENDEE_MERGE) {
            AuditCategory::AttendeeMerge
        } else if action.starts_with(ACTION_ATTENDEE_UNMERGE) {
            AuditCategory::Unmerge
        } else if action.starts_with(ACTION_DUPLICATE_DETECTION) {
            AuditCategory::Detection
        } else {
            AuditCategory::Other
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AuditCategory::PersonMerge => "person_merge",
            AuditCategory::AttendeeMerge => "attendee_merge",
            AuditCategory::Unmerge => "unmerge",
            AuditCategory::Detection => "detection",
            AuditCategory::Other => "other",
        }
    }

    pub fn from_str_lossy(s: &str) -> Self {
        match s {
            "person_merge" => AuditCategory::PersonMerge,
            "attendee_merge" => AuditCategory::AttendeeMerge,
            "unmerge" => AuditCategory::Unmerge,
            "detection" => AuditCategory::Detection,
            _ => AuditCategory::Other,
        }
    }
}

/// Write an audit row for a committed operation.
///
/// The mutation has already succeeded, so a failed write is logged rather
/// than reported as a failure of the operation.
pub fn record(db: &RecordsDb, ctx: &AuditContext, action: &str, details: serde_json::Value) {
    if let Err(e) = db.insert_audit_log(
        action,
        ctx.actor.as_deref(),
        ctx.ip_address.as_deref(),
        &details,
    ) {
        log::warn!("Audit log write for '{}' failed: {}", action, e);
    }
}
