//! Credential providers
//!
//! Acquiring and refreshing credentials is done elsewhere; a provider
//! only hands out what is currently valid, or says why it cannot.

use std::fs;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::errors::CredentialError;

/// Access credentials for the remote source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    /// Bearer token
    pub token: String,
    /// Expiry, if the token has one
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

impl Credentials {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            expires_at: None,
        }
    }

    /// Returns true if the token has expired at `now`
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map_or(false, |at| now >= at)
    }
}

/// Supplies current valid credentials
pub trait CredentialProvider: Send + Sync {
    fn credentials(&self) -> Result<Credentials, CredentialError>;
}

impl<P: CredentialProvider + ?Sized> CredentialProvider for Box<P> {
    fn credentials(&self) -> Result<Credentials, CredentialError> {
        (**self).credentials()
    }
}

/// Provider with a fixed answer
#[derive(Debug, Clone)]
pub struct StaticCredentialProvider {
    credentials: Option<Credentials>,
}

impl StaticCredentialProvider {
    /// Always returns `credentials`
    pub fn new(credentials: Credentials) -> Self {
        Self {
            credentials: Some(credentials),
        }
    }

    /// Always reports "not configured"
    pub fn unconfigured() -> Self {
        Self { credentials: None }
    }
}

impl CredentialProvider for StaticCredentialProvider {
    fn credentials(&self) -> Result<Credentials, CredentialError> {
        self.credentials.clone().ok_or(CredentialError::NotConfigured)
    }
}

/// Reads a JSON token file written by the external authorization flow.
///
/// A missing file means the source was never configured. An expired
/// token is a refresh failure: refreshing is not this provider's job.
#[derive(Debug, Clone)]
pub struct FileCredentialProvider {
    path: PathBuf,
}

impl FileCredentialProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl CredentialProvider for FileCredentialProvider {
    fn credentials(&self) -> Result<Credentials, CredentialError> {
        if !self.path.exists() {
            return Err(CredentialError::NotConfigured);
        }
        let content = fs::read_to_string(&self.path)
            .map_err(|e| CredentialError::RefreshFailed(format!("cannot read token file: {}", e)))?;
        let credentials: Credentials = serde_json::from_str(&content)
            .map_err(|e| CredentialError::RefreshFailed(format!("invalid token file: {}", e)))?;
        if credentials.is_expired(Utc::now()) {
            return Err(CredentialError::RefreshFailed("token expired".into()));
        }
        Ok(credentials)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_static_provider() {
        let provider = StaticCredentialProvider::new(Credentials::new("t"));
        assert_eq!(provider.credentials().unwrap().token, "t");
        assert_eq!(
            StaticCredentialProvider::unconfigured().credentials(),
            Err(CredentialError::NotConfigured)
        );
    }

    #[test]
    fn test_file_provider_missing_file() {
        let dir = TempDir::new().unwrap();
        let provider = FileCredentialProvider::new(dir.path().join("token.json"));
        assert_eq!(provider.credentials(), Err(CredentialError::NotConfigured));
    }

    #[test]
    fn test_file_provider_reads_token() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("token.json");
        fs::write(&path, r#"{"token": "abc"}"#).unwrap();

        let provider = FileCredentialProvider::new(&path);
        assert_eq!(provider.credentials().unwrap(), Credentials::new("abc"));
    }

    #[test]
    fn test_file_provider_expired_token() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("token.json");
        fs::write(
            &path,
            r#"{"token": "abc", "expires_at": "2000-01-01T00:00:00Z"}"#,
        )
        .unwrap();

        let provider = FileCredentialProvider::new(&path);
        assert!(matches!(
            provider.credentials(),
            Err(CredentialError::RefreshFailed(_))
        ));
    }
}
