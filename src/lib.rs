//! sheetsdb - relational queries over spreadsheet-backed tables
//!
//! A spreadsheet workbook is exposed as a set of tables, one per page.
//! Queries arrive as an abstract description, are compiled into a
//! [`planner::Selector`] and executed by a pull-based
//! [`executor::RowCursor`] over pages served by the
//! [`cache::DataSourceCache`].
//!
//! ```ignore
//! let selector = planner::compile(&description)?;
//! let rows = executor::execute(&selector, &cache)?.fetch_all()?;
//! ```

pub mod cache;
pub mod cli;
pub mod executor;
pub mod observability;
pub mod planner;
pub mod table;
pub mod value;
