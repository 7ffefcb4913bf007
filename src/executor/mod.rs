//! Query executor subsystem for sheetsdb
//!
//! Consumes a compiled [`Selector`](crate::planner::Selector) and pulls
//! result tuples through a [`RowCursor`].
//!
//! # Execution modes
//!
//! - No aggregates: one tuple per surviving join combination
//! - Aggregates over dependent tables: one tuple per base row with at
//!   least one combination, aggregates folding over its combinations
//! - Aggregates over the base table only: exactly one tuple
//!
//! # Invariants
//!
//! - Binding errors surface before the first row is produced
//! - A null operand never makes a predicate true
//! - Tuple arity and order always match the select list

mod bind;
mod cursor;
mod errors;
mod eval;
mod result;
mod sorter;

pub use bind::{Binder, BoundColumn, BoundExpr, BoundJoin};
pub use cursor::{execute, run_query, RowCursor};
pub use errors::{ExecutorError, ExecutorErrorCode, ExecutorResult, Severity};
pub use eval::{compare, truth, values_equal, Evaluator, Scope};
pub use result::{QueryResult, ResultRow};
pub use sorter::ResultSequencer;
