//! Planner error types
//!
//! Error codes:
//! - SHEETS_QUERY_INVALID (REJECT)
//! - SHEETS_UNSUPPORTED_QUERY (REJECT)
//! - SHEETS_UNSUPPORTED_EXPRESSION (REJECT)

use std::fmt;

/// Severity levels for planner errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Client request rejected
    Reject,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Reject => write!(f, "REJECT"),
        }
    }
}

/// Planner-specific error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlannerErrorCode {
    /// Malformed description (duplicate alias, bad operand shape)
    QueryInvalid,
    /// Query construct outside the supported subset
    UnsupportedQuery,
    /// Unknown lookup, connector, function or date part
    UnsupportedExpression,
}

impl PlannerErrorCode {
    /// Returns the string code
    pub fn code(&self) -> &'static str {
        match self {
            PlannerErrorCode::QueryInvalid => "SHEETS_QUERY_INVALID",
            PlannerErrorCode::UnsupportedQuery => "SHEETS_UNSUPPORTED_QUERY",
            PlannerErrorCode::UnsupportedExpression => "SHEETS_UNSUPPORTED_EXPRESSION",
        }
    }

    /// Returns the severity level for this error
    pub fn severity(&self) -> Severity {
        Severity::Reject
    }
}

impl fmt::Display for PlannerErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Planner error type with full context
#[derive(Debug, Clone, PartialEq)]
pub struct PlannerError {
    code: PlannerErrorCode,
    message: String,
}

impl PlannerError {
    /// Create a query invalid error
    pub fn query_invalid(reason: impl Into<String>) -> Self {
        Self {
            code: PlannerErrorCode::QueryInvalid,
            message: reason.into(),
        }
    }

    /// Create an unsupported query error
    pub fn unsupported_query(reason: impl Into<String>) -> Self {
        Self {
            code: PlannerErrorCode::UnsupportedQuery,
            message: reason.into(),
        }
    }

    /// Create an unsupported expression error naming the offending kind
    pub fn unsupported_expression(kind: &str, name: impl AsRef<str>) -> Self {
        Self {
            code: PlannerErrorCode::UnsupportedExpression,
            message: format!("Unsupported {} '{}'", kind, name.as_ref()),
        }
    }

    /// Returns the error code
    pub fn code(&self) -> PlannerErrorCode {
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

impl fmt::Display for PlannerError {
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

impl std::error::Error for PlannerError {}

/// Result type for planner operations
pub type PlannerResult<T> = Result<T, PlannerError>;
