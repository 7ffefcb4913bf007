//! Data source cache subsystem for sheetsdb
//!
//! Owns the table stores of one logical spreadsheet database and hides
//! the remote source behind a ttl-bounded cache.
//!
//! # Collaborators
//!
//! - [`DataSourceClient`]: fetches every page of a database in one call
//! - [`CredentialProvider`]: supplies valid credentials or "not configured"
//! - [`CacheStore`]: shared key/value store with ttl
//!
//! A credential failure disables the source; every later request fails
//! fast with `DataSourceUnavailable` until [`DataSourceCache::reconfigure`].

mod client;
mod config;
mod credentials;
mod errors;
mod source;
mod store;

pub use client::{DataSourceClient, DatabasePayload, WorkbookDirClient};
pub use config::SourceConfig;
pub use credentials::{
    CredentialProvider, Credentials, FileCredentialProvider, StaticCredentialProvider,
};
pub use errors::{CacheError, CacheResult, ClientError, CredentialError};
pub use source::{DataSourceCache, TableProvider};
pub use store::{CacheEntry, CacheStore, Clock, ManualClock, MemoryCacheStore, SystemClock};
