//! Date/time coercion for cell values
//!
//! Numeric cells are spreadsheet serial numbers: whole days since
//! [`SERIAL_EPOCH`] plus a fractional day. Text cells must use the
//! day-month-year format, optionally followed by a time.

use chrono::{Duration, NaiveDate, NaiveDateTime};
use thiserror::Error;

use super::CellValue;

/// Serial day 0
pub const SERIAL_EPOCH: (i32, u32, u32) = (1899, 12, 30);

const DATETIME_FORMATS: &[&str] = &["%d/%m/%Y %H:%M:%S", "%d/%m/%Y %H:%M"];
const DATE_FORMAT: &str = "%d/%m/%Y";

const SECONDS_PER_DAY: f64 = 86_400.0;

/// A value could not be coerced to the requested type
#[derive(Debug, Clone, PartialEq, Error)]
#[error("cannot coerce {value} to {target}")]
pub struct CoercionError {
    pub value: String,
    pub target: &'static str,
}

impl CoercionError {
    fn datetime(value: &CellValue) -> Self {
        Self {
            value: format!("{:?}", value),
            target: "datetime",
        }
    }
}

/// Coerces a cell value to a date/time.
///
/// Null is not handled here; callers propagate null before coercing.
pub fn to_datetime(value: &CellValue) -> Result<NaiveDateTime, CoercionError> {
    match value {
        CellValue::Number(serial) => from_serial(*serial).ok_or_else(|| CoercionError::datetime(value)),
        CellValue::Text(s) => parse_text(s.trim()).ok_or_else(|| CoercionError::datetime(value)),
        CellValue::Null | CellValue::Bool(_) => Err(CoercionError::datetime(value)),
    }
}

fn from_serial(serial: f64) -> Option<NaiveDateTime> {
    if !serial.is_finite() {
        return None;
    }
    let (y, m, d) = SERIAL_EPOCH;
    let epoch = NaiveDate::from_ymd_opt(y, m, d)?.and_hms_opt(0, 0, 0)?;
    let seconds = (serial * SECONDS_PER_DAY).round();
    if seconds.abs() > i64::MAX as f64 / 1000.0 {
        return None;
    }
    epoch.checked_add_signed(Duration::seconds(seconds as i64))
}

fn parse_text(s: &str) -> Option<NaiveDateTime> {
    for format in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, format) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(s, DATE_FORMAT)
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}
