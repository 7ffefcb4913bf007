//! CLI command implementations
//!
//! Each command loads the config, builds a fresh data source cache over
//! the workbook directory, runs once and writes one JSON response.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use crate::cache::{
    CredentialProvider, Credentials, DataSourceCache, FileCredentialProvider, MemoryCacheStore,
    SourceConfig, StaticCredentialProvider, WorkbookDirClient,
};
use crate::executor::run_query;
use crate::planner::QueryDescription;

use super::args::Command;
use super::errors::{CliError, CliResult};
use super::io::{read_request, write_response};

/// Token handed to the workbook client when no credentials file is set
const LOCAL_TOKEN: &str = "local";

/// Configuration file structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Source to query (required)
    pub source: SourceConfig,

    /// Directory holding `<source_id>.json` workbooks (required)
    pub workbook_dir: String,

    /// Token file written by the authorization flow (optional)
    #[serde(default)]
    pub credentials_file: Option<String>,
}

impl Config {
    /// Load configuration from file
    pub fn load(path: &Path) -> CliResult<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| CliError::config_error(format!("Failed to read config: {}", e)))?;

        let config: Config = serde_json::from_str(&content)
            .map_err(|e| CliError::config_error(format!("Invalid config JSON: {}", e)))?;

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration
    fn validate(&self) -> CliResult<()> {
        self.source
            .validate()
            .map_err(|e| CliError::config_error(format!("Invalid source config: {}", e)))?;

        if self.workbook_dir.trim().is_empty() {
            return Err(CliError::config_error("workbook_dir must not be empty"));
        }
        if !self.workbook_path().is_dir() {
            return Err(CliError::config_error(format!(
                "workbook_dir '{}' is not a directory",
                self.workbook_dir
            )));
        }

        Ok(())
    }

    /// Get workbook directory as Path
    pub fn workbook_path(&self) -> &Path {
        Path::new(&self.workbook_dir)
    }

    fn credential_provider(&self) -> Box<dyn CredentialProvider> {
        match &self.credentials_file {
            Some(path) => Box::new(FileCredentialProvider::new(PathBuf::from(path))),
            None => Box::new(StaticCredentialProvider::new(Credentials::new(LOCAL_TOKEN))),
        }
    }
}

/// Cache type the CLI runs queries against
pub type CliCache = DataSourceCache<WorkbookDirClient, Box<dyn CredentialProvider>, MemoryCacheStore>;

/// Builds the cache for a loaded config
pub fn build_cache(config: &Config) -> CliCache {
    DataSourceCache::new(
        config.source.clone(),
        WorkbookDirClient::new(config.workbook_path()),
        config.credential_provider(),
        MemoryCacheStore::new(),
    )
}

/// Run a CLI command
pub fn run_command(cmd: Command) -> CliResult<()> {
    match cmd {
        Command::Query { config } => query(&config),
        Command::Tables { config } => tables(&config),
        Command::Describe { config, table } => describe(&config, &table),
    }
}

/// Execute one query description read from stdin
pub fn query(config_path: &Path) -> CliResult<()> {
    let config = Config::load(config_path)?;
    let cache = build_cache(&config);

    let description: QueryDescription = read_request()?;
    let result = run_query(&description, &cache)?;
    info!(source = %config.source.source_id, rows = result.len(), "query complete");

    write_response(serde_json::to_value(&result)?)?;

    Ok(())
}

/// List all table names
pub fn tables(config_path: &Path) -> CliResult<()> {
    let config = Config::load(config_path)?;
    let cache = build_cache(&config);

    let names = cache.table_names()?;
    write_response(json!({ "tables": names }))?;

    Ok(())
}

/// Show one table's field names
pub fn describe(config_path: &Path, table: &str) -> CliResult<()> {
    let config = Config::load(config_path)?;
    let cache = build_cache(&config);

    let fields = cache.describe_table(table)?;
    write_response(json!({ "table": table, "fields": fields }))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::TableProvider;
    use crate::cli::errors::CliErrorCode;
    use std::collections::BTreeSet;
    use tempfile::TempDir;

    fn write_workbook(dir: &Path) {
        let workbook = json!({
            "sheets": [{
                "properties": {"sheetId": 7, "title": "People"},
                "data": [{"rowData": [
                    {"values": [{"formattedValue": "name"}, {"formattedValue": "hire_year"}]},
                    {"values": [{"formattedValue": "A"}, {"effectiveValue": {"numberValue": 2020}}]}
                ]}]
            }]
        });
        fs::write(dir.join("src1.json"), workbook.to_string()).unwrap();
    }

    fn write_config(dir: &Path, body: serde_json::Value) -> PathBuf {
        let path = dir.join("sheetsdb.json");
        fs::write(&path, body.to_string()).unwrap();
        path
    }

    #[test]
    fn test_load_config_and_build_cache() {
        let dir = TempDir::new().unwrap();
        write_workbook(dir.path());
        let path = write_config(
            dir.path(),
            json!({
                "source": {"source_id": "src1"},
                "workbook_dir": dir.path().to_str().unwrap()
            }),
        );

        let config = Config::load(&path).unwrap();
        assert_eq!(config.source.cache_ttl_secs, 300);

        let cache = build_cache(&config);
        let tables = cache.get_tables(&BTreeSet::new()).unwrap();
        assert_eq!(tables["people"].field_names(), &["name", "hire_year"]);
    }

    #[test]
    fn test_invalid_configs() {
        let dir = TempDir::new().unwrap();

        let missing_dir = write_config(
            dir.path(),
            json!({"source": {"source_id": "s"}, "workbook_dir": "/definitely/not/here"}),
        );
        let err = Config::load(&missing_dir).unwrap_err();
        assert_eq!(err.code(), &CliErrorCode::ConfigError);

        let zero_ttl = write_config(
            dir.path(),
            json!({
                "source": {"source_id": "s", "cache_ttl_secs": 0},
                "workbook_dir": dir.path().to_str().unwrap()
            }),
        );
        assert!(Config::load(&zero_ttl).is_err());

        let err = Config::load(&dir.path().join("absent.json")).unwrap_err();
        assert_eq!(err.code(), &CliErrorCode::ConfigError);
    }

    #[test]
    fn test_missing_credentials_file_disables_source() {
        let dir = TempDir::new().unwrap();
        write_workbook(dir.path());
        let path = write_config(
            dir.path(),
            json!({
                "source": {"source_id": "src1"},
                "workbook_dir": dir.path().to_str().unwrap(),
                "credentials_file": dir.path().join("token.json").to_str().unwrap()
            }),
        );

        let cache = build_cache(&Config::load(&path).unwrap());
        let err = CliError::from(cache.table_names().unwrap_err());
        assert_eq!(err.code_str(), "SHEETS_DATA_SOURCE_UNAVAILABLE");
        assert!(!cache.is_configured());
    }
}
