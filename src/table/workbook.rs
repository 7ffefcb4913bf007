//! Decoding of spreadsheet payloads into table stores
//!
//! The payload mirrors the Sheets API `spreadsheets.get` response with
//! grid data included. The first row of each sheet is its header.

use serde::Deserialize;

use crate::value::CellValue;

use super::store::TableStore;

#[derive(Debug, Deserialize)]
struct Workbook {
    #[serde(default)]
    sheets: Vec<Sheet>,
}

#[derive(Debug, Deserialize)]
struct Sheet {
    properties: SheetProperties,
    #[serde(default)]
    data: Vec<GridData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SheetProperties {
    #[serde(default)]
    sheet_id: i64,
    title: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GridData {
    #[serde(default)]
    row_data: Vec<RowData>,
}

#[derive(Debug, Deserialize)]
struct RowData {
    #[serde(default)]
    values: Vec<CellData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CellData {
    #[serde(default)]
    formatted_value: Option<String>,
    #[serde(default)]
    effective_value: Option<ExtendedValue>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExtendedValue {
    #[serde(default)]
    number_value: Option<f64>,
    #[serde(default)]
    string_value: Option<String>,
    #[serde(default)]
    bool_value: Option<bool>,
}

impl CellData {
    fn into_value(self) -> CellValue {
        if let Some(ev) = self.effective_value {
            if let Some(n) = ev.number_value {
                return CellValue::Number(n);
            }
            if let Some(b) = ev.bool_value {
                return CellValue::Bool(b);
            }
            if let Some(s) = ev.string_value {
                return CellValue::Text(s);
            }
        }
        self.formatted_value
            .map(CellValue::Text)
            .unwrap_or(CellValue::Null)
    }
}

/// Decodes every sheet of a workbook payload
pub fn decode_workbook(payload: serde_json::Value) -> Result<Vec<TableStore>, serde_json::Error> {
    let workbook: Workbook = serde_json::from_value(payload)?;
    Ok(workbook.sheets.into_iter().map(decode_sheet).collect())
}

fn decode_sheet(sheet: Sheet) -> TableStore {
    let mut field_names: Option<Vec<String>> = None;
    let mut rows = Vec::new();

    let row_data = sheet
        .data
        .into_iter()
        .next()
        .map(|grid| grid.row_data)
        .unwrap_or_default();

    for row in row_data {
        if field_names.is_none() {
            field_names = Some(
                row.values
                    .into_iter()
                    .enumerate()
                    .map(|(i, cell)| {
                        cell.formatted_value
                            .unwrap_or_else(|| format!("column_{}", i + 1))
                    })
                    .collect(),
            );
        } else if !row.values.is_empty() {
            rows.push(row.values.into_iter().map(CellData::into_value).collect());
        }
    }

    TableStore::new(
        sheet.properties.sheet_id.to_string(),
        sheet.properties.title,
        field_names.unwrap_or_default(),
        rows,
    )
}
