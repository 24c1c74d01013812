//! Error types for identity operations
//!
//! Errors are classified by how a caller should present them:
//! - NotFound: a referenced record does not exist
//! - Validation: the request was refused before any mutation
//! - Storage: the database failed underneath the operation

use serde::Serialize;
use thiserror::Error;

use crate::db::DbError;

/// Failure of a merge, unmerge or other identity mutation.
///
/// Expected failures carry every applicable message, not just the first.
#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("{}", .0.join("; "))]
    NotFound(Vec<String>),

    #[error("{}", .0.join("; "))]
    Validation(Vec<String>),

    #[error("Storage error: {0}")]
    Storage(DbError),
}

impl IdentityError {
    pub fn not_found(message: impl Into<String>) -> Self {
        IdentityError::NotFound(vec![message.into()])
    }

    pub fn validation(message: impl Into<String>) -> Self {
        IdentityError::Validation(vec![message.into()])
    }

    /// Human-readable messages, one per problem found.
    pub fn messages(&self) -> Vec<String> {
        match self {
            IdentityError::NotFound(msgs) | IdentityError::Validation(msgs) => msgs.clone(),
            IdentityError::Storage(e) => vec![e.to_string()],
        }
    }

    pub fn error_type(&self) -> ErrorType {
        match self {
            IdentityError::NotFound(_) => ErrorType::NotFound,
            IdentityError::Validation(_) => ErrorType::Validation,
            IdentityError::Storage(_) => ErrorType::Storage,
        }
    }
}

impl From<DbError> for IdentityError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound(what) => IdentityError::NotFound(vec![format!("{what} not found")]),
            DbError::Refused(reason) => IdentityError::Validation(vec![reason]),
            other => IdentityError::Storage(other),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorType {
    NotFound,
    Validation,
    Storage,
}

/// Serializable success/failure envelope handed to the admin UI.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationOutcome<T> {
    pub success: bool,
    pub errors: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_type: Option<ErrorType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<T>,
}

impl<T> From<Result<T, IdentityError>> for OperationOutcome<T> {
    fn from(result: Result<T, IdentityError>) -> Self {
        match result {
            Ok(value) => OperationOutcome {
                success: true,
                errors: Vec::new(),
                error_type: None,
                result: Some(value),
            },
            Err(err) => OperationOutcome {
                success: false,
                errors: err.messages(),
                error_type: Some(err.error_type()),
                result: None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_db_errors_map_to_categories() {
        let nf: IdentityError = DbError::NotFound("Person 7".into()).into();
        assert_eq!(nf.error_type(), ErrorType::NotFound);
        assert_eq!(nf.messages(), vec!["Person 7 not found".to_string()]);

        let refused: IdentityError = DbError::Refused("only identity".into()).into();
        assert_eq!(refused.error_type(), ErrorType::Validation);

        let storage: IdentityError = DbError::HomeDirNotFound.into();
        assert_eq!(storage.error_type(), ErrorType::Storage);
    }

    #[test]
    fn test_outcome_serializes_camel_case() {
        let failed: OperationOutcome<()> = Err(IdentityError::Validation(vec![
            "Source person does not exist".into(),
            "Cannot merge a person into itself".into(),
        ]))
        .into();
        let json = serde_json::to_value(&failed).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["errorType"], "validation");
        assert_eq!(json["errors"].as_array().unwrap().len(), 2);
        assert!(json.get("result").is_none());

        let ok: OperationOutcome<u32> = Ok(3).into();
        let json = serde_json::to_value(&ok).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["result"], 3);
        assert!(json.get("errorType").is_none());
    }

    #[test]
    fn test_display_joins_messages() {
        let err = IdentityError::NotFound(vec!["Source not found".into(), "Target not found".into()]);
        assert_eq!(err.to_string(), "Source not found; Target not found");
    }
}
