//! Observability for sheetsdb
//!
//! Structured logging through `tracing`. Each log line names a typed
//! [`Event`] in its `event` field so output can be filtered by event.
//!
//! ```ignore
//! tracing::info!(event = %Event::CacheHit, tables = 3);
//! ```
//!
//! Logs go to stderr; stdout belongs to the CLI's JSON responses.

mod events;

pub use events::Event;

use tracing_subscriber::EnvFilter;

/// Environment variable holding the log filter directive
pub const LOG_ENV: &str = "SHEETSDB_LOG";

/// Installs the global fmt subscriber.
///
/// `SHEETSDB_LOG` wins over `default_filter`. Calling this twice is a
/// no-op on the second call.
pub fn init_logging(default_filter: &str) {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default_filter));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_logging_twice() {
        init_logging("debug");
        init_logging("warn");
        tracing::info!(event = %Event::QueryCompiled, "smoke");
    }
}
