//! Result types for query execution

use serde::Serialize;

use crate::value::CellValue;

/// One produced row before post-processing
#[derive(Debug, Clone, PartialEq)]
pub struct ResultRow {
    /// Output tuple in select order
    pub values: Vec<CellValue>,
    /// One value per ordering key
    pub sort_keys: Vec<CellValue>,
    /// DISTINCT ON key values, empty unless requested
    pub distinct_on: Vec<CellValue>,
}

/// Fully fetched result with its column aliases
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryResult {
    /// Output aliases in select order
    pub columns: Vec<String>,
    /// Tuples in result order
    pub rows: Vec<Vec<CellValue>>,
}

impl QueryResult {
    /// Returns true if no rows matched
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Returns the number of rows
    pub fn len(&self) -> usize {
        self.rows.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_result_serializes_cells_bare() {
        let result = QueryResult {
            columns: vec!["name".into(), "n".into()],
            rows: vec![vec![CellValue::text("A"), CellValue::Number(2.0)]],
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["rows"][0][0], "A");
        assert_eq!(json["rows"][0][1], 2.0);
        assert_eq!(result.len(), 1);
    }
}
