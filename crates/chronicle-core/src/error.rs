//! Error types for chronicle operations.
//!
//! Every fallible operation returns [`ChronicleResult`]. A missing history
//! position is not an error anywhere in this crate; it is reported as absence
//! (`None`, `false` or an empty diff).

use std::collections::HashMap;
use thiserror::Error;

/// Result type alias for chronicle operations.
pub type ChronicleResult<T> = Result<T, ChronicleError>;

/// Main error type for all chronicle operations.
#[derive(Error, Debug)]
pub enum ChronicleError {
    /// Input validation failed.
    #[error("Validation error: {message}")]
    Validation {
        message: String,
        code: ErrorCode,
        details: HashMap<String, String>,
        suggestion: Option<String>,
    },

    /// Record not found.
    #[error("Record not found: {message}")]
    NotFound {
        message: String,
        code: ErrorCode,
        record_id: Option<String>,
    },

    /// Database operation failed.
    #[error("Database error: {message}")]
    Database {
        message: String,
        code: ErrorCode,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Parse error.
    #[error("Parse error: {message}")]
    Parse { message: String, code: ErrorCode },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Error codes for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // Validation (VAL_xxx)
    ValInvalidInput,
    ValMissingTarget,
    ValUnknownTarget,
    ValInvalidField,

    // Records (REC_xxx)
    RecNotFound,
    RecDuplicate,

    // Database (DB_xxx)
    DbConnectionFailed,
    DbOperationFailed,

    // Parse (PARSE_xxx)
    ParseInvalidJson,
    ParseInvalidPosition,

    // Internal
    Internal,
}

impl ErrorCode {
    /// Get the string representation of the error code.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::ValInvalidInput => "VAL_001",
            ErrorCode::ValMissingTarget => "VAL_002",
            ErrorCode::ValUnknownTarget => "VAL_003",
            ErrorCode::ValInvalidField => "VAL_004",
            ErrorCode::RecNotFound => "REC_001",
            ErrorCode::RecDuplicate => "REC_002",
            ErrorCode::DbConnectionFailed => "DB_001",
            ErrorCode::DbOperationFailed => "DB_002",
            ErrorCode::ParseInvalidJson => "PARSE_001",
            ErrorCode::ParseInvalidPosition => "PARSE_002",
            ErrorCode::Internal => "INT_001",
        }
    }
}

impl ChronicleError {
    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            code: ErrorCode::ValInvalidInput,
            details: HashMap::new(),
            suggestion: None,
        }
    }

    /// Create a validation error for a version that carries no target reference.
    pub fn missing_target(target_type: impl Into<String>) -> Self {
        let target_type = target_type.into();
        let mut details = HashMap::new();
        details.insert("target_type".to_string(), target_type.clone());
        Self::Validation {
            message: format!("version of '{}' has no target id", target_type),
            code: ErrorCode::ValMissingTarget,
            details,
            suggestion: Some("Persist the record before creating versions for it".to_string()),
        }
    }

    /// Create a validation error for a target that cannot be resolved.
    pub fn unknown_target(target_type: impl Into<String>, target_id: impl Into<String>) -> Self {
        let target_type = target_type.into();
        let target_id = target_id.into();
        let mut details = HashMap::new();
        details.insert("target_type".to_string(), target_type.clone());
        details.insert("target_id".to_string(), target_id.clone());
        Self::Validation {
            message: format!("target {}/{} cannot be resolved", target_type, target_id),
            code: ErrorCode::ValUnknownTarget,
            details,
            suggestion: Some(
                "Register the record type with Database::register_target and persist the record first"
                    .to_string(),
            ),
        }
    }

    /// Create a validation error for a malformed tracked field.
    pub fn invalid_field(field: impl Into<String>, message: impl Into<String>) -> Self {
        let field = field.into();
        let mut details = HashMap::new();
        details.insert("field".to_string(), field.clone());
        Self::Validation {
            message: format!("field '{}': {}", field, message.into()),
            code: ErrorCode::ValInvalidField,
            details,
            suggestion: None,
        }
    }

    /// Create a not found error.
    pub fn not_found(record_id: impl Into<String>) -> Self {
        let id = record_id.into();
        Self::NotFound {
            message: format!("Record with id '{}' not found", id),
            code: ErrorCode::RecNotFound,
            record_id: Some(id),
        }
    }

    /// Create a duplicate record error.
    pub fn duplicate(record_id: impl Into<String>) -> Self {
        let id = record_id.into();
        let mut details = HashMap::new();
        details.insert("record_id".to_string(), id.clone());
        Self::Validation {
            message: format!("Record with id '{}' already exists", id),
            code: ErrorCode::RecDuplicate,
            details,
            suggestion: Some("Load the existing record and save it instead".to_string()),
        }
    }

    /// Create a parse error.
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
            code: ErrorCode::ParseInvalidJson,
        }
    }

    /// Create a parse error for an unrecognised history position.
    pub fn invalid_position(input: impl AsRef<str>) -> Self {
        Self::Parse {
            message: format!(
                "'{}' is not a position (expected current, first, last or an integer)",
                input.as_ref()
            ),
            code: ErrorCode::ParseInvalidPosition,
        }
    }

    /// Create a database error.
    pub fn database(message: impl Into<String>) -> Self {
        Self::Database {
            message: message.into(),
            code: ErrorCode::DbOperationFailed,
            source: None,
        }
    }

    /// Get the error code.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Validation { code, .. } => *code,
            Self::NotFound { code, .. } => *code,
            Self::Database { code, .. } => *code,
            Self::Parse { code, .. } => *code,
            Self::Serialization(_) => ErrorCode::ParseInvalidJson,
            _ => ErrorCode::Internal,
        }
    }

    /// Get a user-friendly suggestion for resolving this error.
    pub fn suggestion(&self) -> Option<&str> {
        match self {
            Self::NotFound { .. } => Some("Please check the record ID and ensure it exists"),
            Self::Validation { suggestion, .. } => suggestion.as_deref(),
            Self::Database { .. } => Some("Please check the database path and permissions"),
            _ => None,
        }
    }

    /// Whether this error is a validation failure.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }
}

impl From<rusqlite::Error> for ChronicleError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Database {
            message: err.to_string(),
            code: ErrorCode::DbOperationFailed,
            source: Some(Box::new(err)),
        }
    }
}

impl<T> From<std::sync::PoisonError<T>> for ChronicleError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        Self::Internal(format!("lock poisoned: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error() {
        let err = ChronicleError::validation("Invalid input");
        assert_eq!(err.code(), ErrorCode::ValInvalidInput);
        assert!(err.to_string().contains("Invalid input"));
        assert!(err.is_validation());
    }

    #[test]
    fn test_missing_target_error() {
        let err = ChronicleError::missing_target("question");
        assert_eq!(err.code(), ErrorCode::ValMissingTarget);
        assert!(err.to_string().contains("question"));
        assert!(err.suggestion().is_some());
    }

    #[test]
    fn test_not_found_error() {
        let err = ChronicleError::not_found("q-1");
        assert_eq!(err.code(), ErrorCode::RecNotFound);
        assert!(err.suggestion().is_some());
        assert!(!err.is_validation());
    }

    #[test]
    fn test_duplicate_error() {
        let err = ChronicleError::duplicate("q-1");
        assert_eq!(err.code(), ErrorCode::RecDuplicate);
        assert!(err.is_validation());
    }

    #[test]
    fn test_error_code_as_str() {
        assert_eq!(ErrorCode::ValMissingTarget.as_str(), "VAL_002");
        assert_eq!(ErrorCode::RecNotFound.as_str(), "REC_001");
        assert_eq!(ErrorCode::ParseInvalidPosition.as_str(), "PARSE_002");
    }
}
