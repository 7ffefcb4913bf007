//! Observability events for sheetsdb
//!
//! Every log line carries one of these as its `event` field.

use std::fmt;

/// Observable events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Cache
    /// Pages served from the cache store
    CacheHit,
    /// Name map or a page absent or expired
    CacheMiss,
    /// Cache store write failed (best effort, read continues)
    CacheWriteFailed,

    // Remote source
    /// Full-database fetch begins
    RemoteFetchStart,
    /// Full-database fetch complete
    RemoteFetchComplete,
    /// Full-database fetch failed
    RemoteFetchFailed,
    /// Credentials missing or refresh failed; source disabled
    SourceNotConfigured,
    /// Source re-enabled
    SourceReconfigured,

    // Query
    /// Query description compiled into a selector
    QueryCompiled,
    /// Query rejected at compile or bind time
    QueryRejected,
    /// Base table cursor exhausted
    CursorExhausted,
}

impl Event {
    /// Returns the string representation of the event
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::CacheHit => "CACHE_HIT",
            Event::CacheMiss => "CACHE_MISS",
            Event::CacheWriteFailed => "CACHE_WRITE_FAILED",

            Event::RemoteFetchStart => "REMOTE_FETCH_START",
            Event::RemoteFetchComplete => "REMOTE_FETCH_COMPLETE",
            Event::RemoteFetchFailed => "REMOTE_FETCH_FAILED",
            Event::SourceNotConfigured => "SOURCE_NOT_CONFIGURED",
            Event::SourceReconfigured => "SOURCE_RECONFIGURED",

            Event::QueryCompiled => "QUERY_COMPILED",
            Event::QueryRejected => "QUERY_REJECTED",
            Event::CursorExhausted => "CURSOR_EXHAUSTED",
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
