//! In-memory table store for one spreadsheet page

use serde::{Deserialize, Serialize};

use crate::value::CellValue;

/// Name of the synthetic row-ordinal field
pub const ROW_ID_FIELD: &str = "id";

/// Resolved position of a field inside a table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldSlot {
    /// Index into the header row
    Column(usize),
    /// Synthetic `id` field: the row's 0-based ordinal
    RowId,
}

/// One spreadsheet page: a header-derived field list plus data rows.
///
/// Every row has exactly `field_names.len()` cells. This is also the
/// serialized page payload written to the cache store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableStore {
    /// Stable remote identifier of the page
    identifier: String,
    /// Page title
    name: String,
    /// Header row
    field_names: Vec<String>,
    /// Data rows
    rows: Vec<Vec<CellValue>>,
}

impl TableStore {
    /// Creates a table, padding short rows with nulls and truncating
    /// long ones so every row matches the header width.
    pub fn new(
        identifier: impl Into<String>,
        name: impl Into<String>,
        field_names: Vec<String>,
        rows: Vec<Vec<CellValue>>,
    ) -> Self {
        let width = field_names.len();
        let rows = rows
            .into_iter()
            .map(|mut row| {
                row.resize(width, CellValue::Null);
                row
            })
            .collect();

        Self {
            identifier: identifier.into(),
            name: name.into(),
            field_names,
            rows,
        }
    }

    /// Returns the remote identifier
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// Returns the table name as titled in the source
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the lookup key for this table (lowercased name)
    pub fn key(&self) -> String {
        self.name.to_lowercase()
    }

    /// Returns the header row
    pub fn field_names(&self) -> &[String] {
        &self.field_names
    }

    /// Returns all data rows
    pub fn rows(&self) -> &[Vec<CellValue>] {
        &self.rows
    }

    /// Returns the row at `index`
    pub fn row(&self, index: usize) -> Option<&[CellValue]> {
        self.rows.get(index).map(Vec::as_slice)
    }

    /// Number of data rows
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns true if the table has no data rows
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Resolves a field name case-insensitively.
    ///
    /// `id` always names the row ordinal, even when the header has an
    /// `id` column.
    pub fn resolve_field(&self, field: &str) -> Option<FieldSlot> {
        let wanted = field.to_lowercase();
        if wanted == ROW_ID_FIELD {
            return Some(FieldSlot::RowId);
        }
        self.field_names
            .iter()
            .position(|name| name.to_lowercase() == wanted)
            .map(FieldSlot::Column)
    }

    /// Reads a field of a row
    pub fn value(&self, row: usize, slot: FieldSlot) -> CellValue {
        match slot {
            FieldSlot::RowId => CellValue::Number(row as f64),
            FieldSlot::Column(i) => self
                .rows
                .get(row)
                .and_then(|r| r.get(i))
                .cloned()
                .unwrap_or(CellValue::Null),
        }
    }
}
