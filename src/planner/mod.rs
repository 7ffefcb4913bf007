//! Query planner subsystem for sheetsdb
//!
//! Compiles the abstract query description produced by the query-builder
//! layer into an immutable [`Selector`].
//!
//! # Supported subset
//!
//! - Exactly one base table, plus inner equality joins onto earlier aliases
//! - Filter trees of AND/OR groups, lookups, arithmetic and date parts
//! - `count [distinct]`, `avg`, `sum`, `max`, `min`
//! - Ordering, DISTINCT / DISTINCT ON, limit and offset
//!
//! Anything else fails with `SHEETS_UNSUPPORTED_QUERY` or
//! `SHEETS_UNSUPPORTED_EXPRESSION` before a single row is read.

mod ast;
mod compiler;
mod errors;
mod selector;

pub use ast::{FromItem, JoinClause, OrderItem, QueryDescription, QueryNode, SelectItem};
pub use compiler::{compile, SelectorCompiler};
pub use errors::{PlannerError, PlannerErrorCode, PlannerResult, Severity};
pub use selector::{
    Aggregate, AggregateFunc, AggregateMode, ArithOp, ColumnRef, Connector, DatePart, Expr,
    JoinSpec, LookupOp, OrderKey, OrderTarget, SelectColumn, Selector, TableSource,
};
