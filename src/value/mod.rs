//! Cell values for sheetsdb
//!
//! A spreadsheet cell holds one of null, string, number or boolean.
//! Dates have no wire type of their own; see [`dates`] for the coercion
//! rules applied when an expression needs a date/time.

mod dates;

pub use dates::{to_datetime, CoercionError, SERIAL_EPOCH};

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A single typed cell value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
}

impl CellValue {
    /// Creates a text value
    pub fn text(s: impl Into<String>) -> Self {
        CellValue::Text(s.into())
    }

    /// Returns true for the null value
    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }

    /// Converts a JSON scalar into a cell value.
    ///
    /// Arrays and objects have no cell representation and return None.
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        use serde_json::Value;

        match value {
            Value::Null => Some(CellValue::Null),
            Value::Bool(b) => Some(CellValue::Bool(*b)),
            Value::Number(n) => n.as_f64().map(CellValue::Number),
            Value::String(s) => Some(CellValue::Text(s.clone())),
            Value::Array(_) | Value::Object(_) => None,
        }
    }

    /// Numeric view of the value.
    ///
    /// Text is accepted when it parses as a number, so that
    /// formatted cells still take part in arithmetic.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            CellValue::Number(n) => Some(*n),
            CellValue::Text(s) => s.trim().parse::<f64>().ok(),
            CellValue::Null | CellValue::Bool(_) => None,
        }
    }

    /// String view of the value, as a spreadsheet would format it
    pub fn as_text(&self) -> Option<String> {
        match self {
            CellValue::Null => None,
            other => Some(other.to_string()),
        }
    }

    /// Key used for distinct-value bookkeeping.
    ///
    /// Equal values map to equal keys; `-0.0` and `0.0` are the same key.
    pub fn distinct_key(&self) -> String {
        match self {
            CellValue::Null => "n:".to_string(),
            CellValue::Bool(b) => format!("b:{}", b),
            CellValue::Number(n) if *n == 0.0 => "f:0".to_string(),
            CellValue::Number(n) => format!("f:{}", n.to_bits()),
            CellValue::Text(s) => format!("s:{}", s),
        }
    }

    /// Total ordering across all cell values.
    ///
    /// Ordering rules:
    /// - null < bool < number < string
    /// - For same types, natural ordering
    pub fn total_cmp(&self, other: &CellValue) -> Ordering {
        let type_order = |v: &CellValue| -> u8 {
            match v {
                CellValue::Null => 0,
                CellValue::Bool(_) => 1,
                CellValue::Number(_) => 2,
                CellValue::Text(_) => 3,
            }
        };

        match (self, other) {
            (CellValue::Null, CellValue::Null) => Ordering::Equal,
            (CellValue::Bool(a), CellValue::Bool(b)) => a.cmp(b),
            (CellValue::Number(a), CellValue::Number(b)) => a.total_cmp(b),
            (CellValue::Text(a), CellValue::Text(b)) => a.cmp(b),
            (a, b) => type_order(a).cmp(&type_order(b)),
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Null => write!(f, "NULL"),
            CellValue::Bool(b) => write!(f, "{}", if *b { "TRUE" } else { "FALSE" }),
            CellValue::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => {
                write!(f, "{}", *n as i64)
            }
            CellValue::Number(n) => write!(f, "{}", n),
            CellValue::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<f64> for CellValue {
    fn from(n: f64) -> Self {
        CellValue::Number(n)
    }
}

impl From<i64> for CellValue {
    fn from(n: i64) -> Self {
        CellValue::Number(n as f64)
    }
}

impl From<bool> for CellValue {
    fn from(b: bool) -> Self {
        CellValue::Bool(b)
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        CellValue::Text(s.to_string())
    }
}

impl From<String> for CellValue {
    fn from(s: String) -> Self {
        CellValue::Text(s)
    }
}

impl<T: Into<CellValue>> From<Option<T>> for CellValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(CellValue::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_json_scalars() {
        assert_eq!(CellValue::from_json(&json!(null)), Some(CellValue::Null));
        assert_eq!(CellValue::from_json(&json!(3)), Some(CellValue::Number(3.0)));
        assert_eq!(CellValue::from_json(&json!("x")), Some(CellValue::text("x")));
        assert_eq!(CellValue::from_json(&json!([1])), None);
    }

    #[test]
    fn test_serde_untagged() {
        let row: Vec<CellValue> = serde_json::from_str(r#"[null, true, 1.5, "a"]"#).unwrap();
        assert_eq!(
            row,
            vec![
                CellValue::Null,
                CellValue::Bool(true),
                CellValue::Number(1.5),
                CellValue::text("a")
            ]
        );
        assert_eq!(serde_json::to_string(&row).unwrap(), r#"[null,true,1.5,"a"]"#);
    }

    #[test]
    fn test_text_coerces_to_number() {
        assert_eq!(CellValue::text(" 2021 ").as_number(), Some(2021.0));
        assert_eq!(CellValue::text("abc").as_number(), None);
        assert_eq!(CellValue::Bool(true).as_number(), None);
    }

    #[test]
    fn test_display_integral_numbers() {
        assert_eq!(CellValue::Number(2021.0).to_string(), "2021");
        assert_eq!(CellValue::Number(1.25).to_string(), "1.25");
    }

    #[test]
    fn test_total_order_across_types() {
        let mut values = vec![
            CellValue::text("a"),
            CellValue::Number(2.0),
            CellValue::Null,
            CellValue::Bool(false),
            CellValue::Number(-1.0),
        ];
        values.sort_by(|a, b| a.total_cmp(b));
        assert_eq!(
            values,
            vec![
                CellValue::Null,
                CellValue::Bool(false),
                CellValue::Number(-1.0),
                CellValue::Number(2.0),
                CellValue::text("a"),
            ]
        );
    }

    #[test]
    fn test_distinct_key_zero() {
        assert_eq!(
            CellValue::Number(0.0).distinct_key(),
            CellValue::Number(-0.0).distinct_key()
        );
        assert_ne!(
            CellValue::Number(1.0).distinct_key(),
            CellValue::text("1").distinct_key()
        );
    }
}
