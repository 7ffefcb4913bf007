//! Table storage for sheetsdb
//!
//! A [`TableStore`] holds one spreadsheet page in memory. A
//! [`TableCursor`] walks it row by row; the dependent side of a join uses
//! a materialized cursor so every outer row can replay the same scan.

mod cursor;
mod store;
mod workbook;

pub use cursor::{CursorState, CursorStateError, TableCursor};
pub use store::{FieldSlot, TableStore, ROW_ID_FIELD};
pub use workbook::decode_workbook;
