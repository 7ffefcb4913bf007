//! # Cache Errors
//!
//! Error types for the data source cache and its collaborators.

use thiserror::Error;

/// Result type for cache operations
pub type CacheResult<T> = Result<T, CacheError>;

/// Data source cache errors
#[derive(Debug, Clone, Error)]
pub enum CacheError {
    /// Table absent even after a full refresh
    #[error("Table not found: {0}")]
    TableNotFound(String),

    /// Credentials or remote fetch failed
    #[error("Data source unavailable: {0}")]
    DataSourceUnavailable(String),

    /// Cache store rejected a write
    #[error("Cache store write failed: {0}")]
    StoreWrite(String),
}

/// Errors raised by a data source client
#[derive(Debug, Clone, Error)]
pub enum ClientError {
    /// The source does not exist
    #[error("Source not found: {0}")]
    SourceNotFound(String),

    /// Transport or I/O failure
    #[error("Fetch failed: {0}")]
    Fetch(String),

    /// Payload could not be decoded
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),
}

/// Errors raised by a credential provider
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CredentialError {
    /// No credentials have ever been configured
    #[error("Data source not configured")]
    NotConfigured,

    /// Credentials exist but could not be refreshed
    #[error("Credential refresh failed: {0}")]
    RefreshFailed(String),
}

impl From<ClientError> for CacheError {
    fn from(e: ClientError) -> Self {
        CacheError::DataSourceUnavailable(e.to_string())
    }
}

impl From<CredentialError> for CacheError {
    fn from(e: CredentialError) -> Self {
        CacheError::DataSourceUnavailable(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_error_is_unavailable() {
        let err: CacheError = ClientError::Fetch("timeout".into()).into();
        assert!(matches!(err, CacheError::DataSourceUnavailable(_)));
        assert!(err.to_string().contains("timeout"));
    }

    #[test]
    fn test_credential_error_is_unavailable() {
        let err: CacheError = CredentialError::NotConfigured.into();
        assert!(matches!(err, CacheError::DataSourceUnavailable(_)));
    }
}
