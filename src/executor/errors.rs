//! Executor error types
//!
//! Error codes:
//! - SHEETS_TABLE_NOT_FOUND (REJECT)
//! - SHEETS_FIELD_NOT_FOUND (REJECT)
//! - SHEETS_QUERY_INVALID (REJECT)
//! - SHEETS_UNSUPPORTED_QUERY (REJECT)
//! - SHEETS_UNSUPPORTED_EXPRESSION (REJECT)
//! - SHEETS_DATA_SOURCE_UNAVAILABLE (ERROR)
//! - SHEETS_CURSOR_STATE (ERROR)
//! - SHEETS_EVALUATION_FAILED (ERROR)

use std::fmt;

use crate::cache::CacheError;
use crate::planner::{PlannerError, PlannerErrorCode};
use crate::table::CursorStateError;
use crate::value::CoercionError;

/// Severity levels for executor errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Query rejected before any row was produced
    Reject,
    /// Execution failed mid-fetch
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Reject => write!(f, "REJECT"),
            Severity::Error => write!(f, "ERROR"),
        }
    }
}

/// Executor-specific error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutorErrorCode {
    /// Table alias or name does not resolve
    TableNotFound,
    /// Column reference does not resolve against the bound header
    FieldNotFound,
    /// Malformed query description
    QueryInvalid,
    /// Construct outside the supported subset
    UnsupportedQuery,
    /// Unknown expression or lookup kind
    UnsupportedExpression,
    /// Credentials or remote fetch failed
    DataSourceUnavailable,
    /// Value read from an unstarted or exhausted cursor
    CursorState,
    /// Runtime evaluation failure, e.g. a failed date coercion
    EvaluationFailed,
}

impl ExecutorErrorCode {
    /// Returns the string code
    pub fn code(&self) -> &'static str {
        match self {
            ExecutorErrorCode::TableNotFound => "SHEETS_TABLE_NOT_FOUND",
            ExecutorErrorCode::FieldNotFound => "SHEETS_FIELD_NOT_FOUND",
            ExecutorErrorCode::QueryInvalid => "SHEETS_QUERY_INVALID",
            ExecutorErrorCode::UnsupportedQuery => "SHEETS_UNSUPPORTED_QUERY",
            ExecutorErrorCode::UnsupportedExpression => "SHEETS_UNSUPPORTED_EXPRESSION",
            ExecutorErrorCode::DataSourceUnavailable => "SHEETS_DATA_SOURCE_UNAVAILABLE",
            ExecutorErrorCode::CursorState => "SHEETS_CURSOR_STATE",
            ExecutorErrorCode::EvaluationFailed => "SHEETS_EVALUATION_FAILED",
        }
    }

    /// Returns the severity level for this error
    pub fn severity(&self) -> Severity {
        match self {
            ExecutorErrorCode::DataSourceUnavailable
            | ExecutorErrorCode::CursorState
            | ExecutorErrorCode::EvaluationFailed => Severity::Error,
            _ => Severity::Reject,
        }
    }
}

impl fmt::Display for ExecutorErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Executor error type with full context
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutorError {
    code: ExecutorErrorCode,
    message: String,
}

impl ExecutorError {
    fn new(code: ExecutorErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Create a table not found error
    pub fn table_not_found(name: impl AsRef<str>) -> Self {
        Self::new(
            ExecutorErrorCode::TableNotFound,
            format!("Table '{}' not found", name.as_ref()),
        )
    }

    /// Create a field not found error
    pub fn field_not_found(alias: &str, field: &str) -> Self {
        Self::new(
            ExecutorErrorCode::FieldNotFound,
            format!("Field '{}.{}' not found", alias, field),
        )
    }

    /// Create an unsupported expression error
    pub fn unsupported_expression(reason: impl Into<String>) -> Self {
        Self::new(ExecutorErrorCode::UnsupportedExpression, reason)
    }

    /// Create a data source unavailable error
    pub fn data_source_unavailable(reason: impl Into<String>) -> Self {
        Self::new(ExecutorErrorCode::DataSourceUnavailable, reason)
    }

    /// Create an evaluation failed error
    pub fn evaluation_failed(reason: impl Into<String>) -> Self {
        Self::new(ExecutorErrorCode::EvaluationFailed, reason)
    }

    /// Returns the error code
    pub fn code(&self) -> ExecutorErrorCode {
        self.code
    }

    /// Returns the severity level
    pub fn severity(&self) -> Severity {
        self.code.severity()
    }

    /// Returns the error message
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for ExecutorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}: {}",
            self.code.severity(),
            self.code.code(),
            self.message
        )
    }
}

impl std::error::Error for ExecutorError {}

impl From<CacheError> for ExecutorError {
    fn from(e: CacheError) -> Self {
        match e {
            CacheError::TableNotFound(name) => Self::table_not_found(name),
            other => Self::data_source_unavailable(other.to_string()),
        }
    }
}

impl From<PlannerError> for ExecutorError {
    fn from(e: PlannerError) -> Self {
        let code = match e.code() {
            PlannerErrorCode::QueryInvalid => ExecutorErrorCode::QueryInvalid,
            PlannerErrorCode::UnsupportedQuery => ExecutorErrorCode::UnsupportedQuery,
            PlannerErrorCode::UnsupportedExpression => ExecutorErrorCode::UnsupportedExpression,
        };
        Self::new(code, e.message())
    }
}

impl From<CursorStateError> for ExecutorError {
    fn from(e: CursorStateError) -> Self {
        Self::new(ExecutorErrorCode::CursorState, e.to_string())
    }
}

impl From<CoercionError> for ExecutorError {
    fn from(e: CoercionError) -> Self {
        Self::evaluation_failed(e.to_string())
    }
}

/// Result type for executor operations
pub type ExecutorResult<T> = Result<T, ExecutorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(
            ExecutorErrorCode::TableNotFound.code(),
            "SHEETS_TABLE_NOT_FOUND"
        );
        assert_eq!(
            ExecutorErrorCode::DataSourceUnavailable.code(),
            "SHEETS_DATA_SOURCE_UNAVAILABLE"
        );
        assert_eq!(
            ExecutorErrorCode::EvaluationFailed.severity(),
            Severity::Error
        );
        assert_eq!(ExecutorErrorCode::FieldNotFound.severity(), Severity::Reject);
    }

    #[test]
    fn test_from_cache_error() {
        let err: ExecutorError = CacheError::TableNotFound("people".into()).into();
        assert_eq!(err.code(), ExecutorErrorCode::TableNotFound);

        let err: ExecutorError = CacheError::DataSourceUnavailable("down".into()).into();
        assert_eq!(err.code(), ExecutorErrorCode::DataSourceUnavailable);
        assert!(err.message().contains("down"));
    }

    #[test]
    fn test_from_planner_error() {
        let err: ExecutorError = PlannerError::unsupported_query("HAVING").into();
        assert_eq!(err.code(), ExecutorErrorCode::UnsupportedQuery);
    }

    #[test]
    fn test_error_display() {
        let err = ExecutorError::field_not_found("p", "age");
        assert_eq!(
            err.to_string(),
            "[REJECT] SHEETS_FIELD_NOT_FOUND: Field 'p.age' not found"
        );
    }
}
