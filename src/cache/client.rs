//! Remote data source clients

use std::fs;
use std::path::PathBuf;

use crate::table::{decode_workbook, TableStore};

use super::credentials::Credentials;
use super::errors::ClientError;

/// Every table of one logical database, fetched at once
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DatabasePayload {
    pub tables: Vec<TableStore>,
}

/// Fetches a whole spreadsheet database.
///
/// One blocking call per cache refresh. Fetching a single page costs the
/// same as fetching all of them, so there is no per-table method.
pub trait DataSourceClient: Send + Sync {
    fn fetch_database(
        &self,
        source_id: &str,
        credentials: &Credentials,
    ) -> Result<DatabasePayload, ClientError>;
}

/// Client that reads `<dir>/<source_id>.json` workbook payloads.
///
/// Credentials are accepted but not checked.
#[derive(Debug, Clone)]
pub struct WorkbookDirClient {
    dir: PathBuf,
}

impl WorkbookDirClient {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn workbook_path(&self, source_id: &str) -> PathBuf {
        self.dir.join(format!("{}.json", source_id))
    }
}

impl DataSourceClient for WorkbookDirClient {
    fn fetch_database(
        &self,
        source_id: &str,
        _credentials: &Credentials,
    ) -> Result<DatabasePayload, ClientError> {
        let path = self.workbook_path(source_id);
        if !path.exists() {
            return Err(ClientError::SourceNotFound(source_id.to_string()));
        }
        let content = fs::read_to_string(&path)
            .map_err(|e| ClientError::Fetch(format!("{}: {}", path.display(), e)))?;
        let payload: serde_json::Value = serde_json::from_str(&content)
            .map_err(|e| ClientError::InvalidPayload(e.to_string()))?;
        let tables =
            decode_workbook(payload).map_err(|e| ClientError::InvalidPayload(e.to_string()))?;
        Ok(DatabasePayload { tables })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_reads_workbook_file() {
        let dir = TempDir::new().unwrap();
        let workbook = json!({
            "sheets": [{
                "properties": {"sheetId": 5, "title": "People"},
                "data": [{"rowData": [
                    {"values": [{"formattedValue": "name"}]},
                    {"values": [{"formattedValue": "A"}]}
                ]}]
            }]
        });
        fs::write(dir.path().join("src1.json"), workbook.to_string()).unwrap();

        let client = WorkbookDirClient::new(dir.path());
        let payload = client
            .fetch_database("src1", &Credentials::new("t"))
            .unwrap();
        assert_eq!(payload.tables.len(), 1);
        assert_eq!(payload.tables[0].identifier(), "5");
    }

    #[test]
    fn test_missing_source() {
        let dir = TempDir::new().unwrap();
        let client = WorkbookDirClient::new(dir.path());
        let err = client
            .fetch_database("nope", &Credentials::new("t"))
            .unwrap_err();
        assert!(matches!(err, ClientError::SourceNotFound(_)));
    }

    #[test]
    fn test_invalid_payload() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("bad.json"), "{not json").unwrap();
        let client = WorkbookDirClient::new(dir.path());
        let err = client
            .fetch_database("bad", &Credentials::new("t"))
            .unwrap_err();
        assert!(matches!(err, ClientError::InvalidPayload(_)));
    }
}
