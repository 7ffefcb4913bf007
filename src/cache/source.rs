//! Data source cache
//!
//! Serves table stores for one logical spreadsheet database.
//!
//! Lookup order:
//! 1. name→identifier map from the cache store
//! 2. each requested page by identifier from the cache store
//! 3. on any miss: one full-database remote fetch, then rewrite the map
//!    and every page with the configured ttl
//!
//! Cache writes are best effort. Two callers missing at once both fetch;
//! the pages are identical and the last write wins.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, info, warn};

use crate::observability::Event;
use crate::table::TableStore;

use super::client::DataSourceClient;
use super::config::SourceConfig;
use super::credentials::CredentialProvider;
use super::errors::{CacheError, CacheResult};
use super::store::CacheStore;

/// Table name (lowercased) → page identifier
type NameMap = BTreeMap<String, String>;

/// Anything that can hand out table stores by name
pub trait TableProvider {
    /// Returns the requested tables keyed by lowercased name.
    ///
    /// An empty `names` set requests every table.
    fn get_tables(&self, names: &BTreeSet<String>) -> CacheResult<HashMap<String, TableStore>>;
}

impl TableProvider for HashMap<String, TableStore> {
    fn get_tables(&self, names: &BTreeSet<String>) -> CacheResult<HashMap<String, TableStore>> {
        if names.is_empty() {
            return Ok(self
                .values()
                .map(|t| (t.key(), t.clone()))
                .collect());
        }
        names
            .iter()
            .map(|name| {
                let key = name.to_lowercase();
                self.values()
                    .find(|t| t.key() == key)
                    .map(|t| (key.clone(), t.clone()))
                    .ok_or_else(|| CacheError::TableNotFound(name.clone()))
            })
            .collect()
    }
}

/// Cache over one remote spreadsheet database
pub struct DataSourceCache<C: DataSourceClient, P: CredentialProvider, S: CacheStore> {
    config: SourceConfig,
    client: C,
    credentials: P,
    store: S,
    configured: AtomicBool,
}

impl<C: DataSourceClient, P: CredentialProvider, S: CacheStore> DataSourceCache<C, P, S> {
    /// Creates a cache. The source starts out configured.
    pub fn new(config: SourceConfig, client: C, credentials: P, store: S) -> Self {
        Self {
            config,
            client,
            credentials,
            store,
            configured: AtomicBool::new(true),
        }
    }

    /// Returns the source configuration
    pub fn config(&self) -> &SourceConfig {
        &self.config
    }

    /// Returns false once a credential failure disabled the source
    pub fn is_configured(&self) -> bool {
        self.configured.load(Ordering::SeqCst)
    }

    /// Re-enables a disabled source and refreshes it.
    ///
    /// Call after the credentials have been repaired externally.
    pub fn reconfigure(&self) -> CacheResult<()> {
        self.configured.store(true, Ordering::SeqCst);
        info!(event = %Event::SourceReconfigured, source = %self.config.source_id);
        self.refresh().map(|_| ())
    }

    /// Returns all table names
    pub fn table_names(&self) -> CacheResult<Vec<String>> {
        let tables = self.get_tables(&BTreeSet::new())?;
        let mut names: Vec<String> = tables.values().map(|t| t.name().to_string()).collect();
        names.sort();
        Ok(names)
    }

    /// Returns the field names of one table
    pub fn describe_table(&self, name: &str) -> CacheResult<Vec<String>> {
        let key = name.to_lowercase();
        let mut tables = self.get_tables(&BTreeSet::from([key.clone()]))?;
        tables
            .remove(&key)
            .map(|t| t.field_names().to_vec())
            .ok_or_else(|| CacheError::TableNotFound(name.to_string()))
    }

    fn ensure_configured(&self) -> CacheResult<()> {
        if self.is_configured() {
            Ok(())
        } else {
            Err(CacheError::DataSourceUnavailable(format!(
                "source {} is not configured",
                self.config.source_id
            )))
        }
    }

    /// Serves the request from the cache store, or None on any miss
    fn from_cache(&self, names: &BTreeSet<String>) -> Option<HashMap<String, TableStore>> {
        let raw_map = self.store.get(&self.config.name_map_key())?;
        let name_map: NameMap = serde_json::from_str(&raw_map).ok()?;

        let wanted: Vec<&String> = if names.is_empty() {
            name_map.keys().collect()
        } else {
            names.iter().collect()
        };

        let mut tables = HashMap::with_capacity(wanted.len());
        for name in wanted {
            let identifier = name_map.get(name)?;
            let raw_page = self.store.get(&self.config.page_key(identifier))?;
            let table: TableStore = serde_json::from_str(&raw_page).ok()?;
            tables.insert(name.clone(), table);
        }
        Some(tables)
    }

    /// Fetches the whole database and rewrites the cache
    fn refresh(&self) -> CacheResult<HashMap<String, TableStore>> {
        self.ensure_configured()?;

        let credentials = match self.credentials.credentials() {
            Ok(c) => c,
            Err(e) => {
                self.configured.store(false, Ordering::SeqCst);
                warn!(
                    event = %Event::SourceNotConfigured,
                    source = %self.config.source_id,
                    reason = %e
                );
                return Err(e.into());
            }
        };

        info!(event = %Event::RemoteFetchStart, source = %self.config.source_id);
        let payload = self
            .client
            .fetch_database(&self.config.source_id, &credentials)
            .map_err(|e| {
                warn!(
                    event = %Event::RemoteFetchFailed,
                    source = %self.config.source_id,
                    reason = %e
                );
                CacheError::from(e)
            })?;
        info!(
            event = %Event::RemoteFetchComplete,
            source = %self.config.source_id,
            tables = payload.tables.len()
        );

        let mut name_map = NameMap::new();
        let mut tables = HashMap::with_capacity(payload.tables.len());
        for table in payload.tables {
            name_map.insert(table.key(), table.identifier().to_string());
            self.write_best_effort(
                &self.config.page_key(table.identifier()),
                serde_json::to_string(&table),
                self.config.cache_ttl(),
            );
            tables.insert(table.key(), table);
        }
        self.write_best_effort(
            &self.config.name_map_key(),
            serde_json::to_string(&name_map),
            self.config.name_map_ttl(),
        );

        Ok(tables)
    }

    fn write_best_effort(
        &self,
        key: &str,
        payload: Result<String, serde_json::Error>,
        ttl: std::time::Duration,
    ) {
        let result = payload
            .map_err(|e| CacheError::StoreWrite(e.to_string()))
            .and_then(|p| self.store.set(key, p, ttl));
        if let Err(e) = result {
            warn!(event = %Event::CacheWriteFailed, key = %key, reason = %e);
        }
    }
}

impl<C: DataSourceClient, P: CredentialProvider, S: CacheStore> TableProvider
    for DataSourceCache<C, P, S>
{
    fn get_tables(&self, names: &BTreeSet<String>) -> CacheResult<HashMap<String, TableStore>> {
        self.ensure_configured()?;
        let names: BTreeSet<String> = names.iter().map(|n| n.to_lowercase()).collect();

        if let Some(tables) = self.from_cache(&names) {
            debug!(event = %Event::CacheHit, source = %self.config.source_id, tables = tables.len());
            return Ok(tables);
        }
        debug!(event = %Event::CacheMiss, source = %self.config.source_id);

        let mut all = self.refresh()?;
        if names.is_empty() {
            return Ok(all);
        }
        names
            .into_iter()
            .map(|name| match all.remove(&name) {
                Some(table) => Ok((name, table)),
                None => Err(CacheError::TableNotFound(name)),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::client::DatabasePayload;
    use crate::cache::credentials::{Credentials, StaticCredentialProvider};
    use crate::cache::errors::ClientError;
    use crate::cache::store::MemoryCacheStore;
    use crate::value::CellValue;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    struct CountingClient {
        calls: Arc<AtomicUsize>,
        fail: bool,
    }

    impl DataSourceClient for CountingClient {
        fn fetch_database(
            &self,
            _source_id: &str,
            _credentials: &Credentials,
        ) -> Result<DatabasePayload, ClientError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(ClientError::Fetch("boom".into()));
            }
            Ok(DatabasePayload {
                tables: vec![
                    TableStore::new(
                        "1",
                        "People",
                        vec!["name".into()],
                        vec![vec![CellValue::text("A")]],
                    ),
                    TableStore::new("2", "Orders", vec!["amount".into()], vec![]),
                ],
            })
        }
    }

    /// Store whose writes always fail
    struct BrokenStore;

    impl CacheStore for BrokenStore {
        fn get(&self, _key: &str) -> Option<String> {
            None
        }

        fn set(&self, key: &str, _payload: String, _ttl: std::time::Duration) -> CacheResult<()> {
            Err(CacheError::StoreWrite(key.to_string()))
        }
    }

    fn make_cache(
        fail: bool,
    ) -> (
        DataSourceCache<CountingClient, StaticCredentialProvider, MemoryCacheStore>,
        Arc<AtomicUsize>,
    ) {
        let calls = Arc::new(AtomicUsize::new(0));
        let cache = DataSourceCache::new(
            SourceConfig::new("src"),
            CountingClient {
                calls: calls.clone(),
                fail,
            },
            StaticCredentialProvider::new(Credentials::new("t")),
            MemoryCacheStore::new(),
        );
        (cache, calls)
    }

    fn names(list: &[&str]) -> BTreeSet<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_second_call_served_from_cache() {
        let (cache, calls) = make_cache(false);

        let first = cache.get_tables(&names(&["people"])).unwrap();
        let second = cache.get_tables(&names(&["People"])).unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(first, second);
        assert_eq!(second["people"].len(), 1);
    }

    #[test]
    fn test_empty_request_returns_all() {
        let (cache, _) = make_cache(false);
        let all = cache.get_tables(&BTreeSet::new()).unwrap();
        assert_eq!(all.len(), 2);
        assert!(all.contains_key("orders"));
    }

    #[test]
    fn test_unknown_table_after_refresh() {
        let (cache, calls) = make_cache(false);
        let err = cache.get_tables(&names(&["missing"])).unwrap_err();
        assert!(matches!(err, CacheError::TableNotFound(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_fetch_failure_is_unavailable_without_retry() {
        let (cache, calls) = make_cache(true);
        let err = cache.get_tables(&names(&["people"])).unwrap_err();
        assert!(matches!(err, CacheError::DataSourceUnavailable(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        // Fetch failures do not disable the source
        assert!(cache.is_configured());
    }

    #[test]
    fn test_unconfigured_fails_fast() {
        let calls = Arc::new(AtomicUsize::new(0));
        let cache = DataSourceCache::new(
            SourceConfig::new("src"),
            CountingClient {
                calls: calls.clone(),
                fail: false,
            },
            StaticCredentialProvider::unconfigured(),
            MemoryCacheStore::new(),
        );

        assert!(cache.get_tables(&names(&["people"])).is_err());
        assert!(!cache.is_configured());
        assert!(matches!(
            cache.get_tables(&names(&["people"])),
            Err(CacheError::DataSourceUnavailable(_))
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_write_failure_does_not_fail_read() {
        let calls = Arc::new(AtomicUsize::new(0));
        let cache = DataSourceCache::new(
            SourceConfig::new("src"),
            CountingClient {
                calls: calls.clone(),
                fail: false,
            },
            StaticCredentialProvider::new(Credentials::new("t")),
            BrokenStore,
        );

        let tables = cache.get_tables(&names(&["people"])).unwrap();
        assert_eq!(tables.len(), 1);
    }

    #[test]
    fn test_introspection() {
        let (cache, _) = make_cache(false);
        assert_eq!(cache.table_names().unwrap(), vec!["Orders", "People"]);
        assert_eq!(cache.describe_table("PEOPLE").unwrap(), vec!["name"]);
    }

    #[test]
    fn test_hashmap_provider() {
        let mut tables = HashMap::new();
        tables.insert(
            "people".to_string(),
            TableStore::new("1", "People", vec!["name".into()], vec![]),
        );
        assert!(tables.get_tables(&names(&["PEOPLE"])).is_ok());
        assert!(tables.get_tables(&names(&["x"])).is_err());
    }
}
