//! Column binding
//!
//! Resolves every `alias.field` of a selector against the fetched tables
//! once, before iteration starts. The evaluator then reads cells by
//! table position and field slot without any name lookups.

use crate::planner::{
    AggregateFunc, ArithOp, ColumnRef, Connector, DatePart, Expr, JoinSpec, LookupOp,
};
use crate::table::{FieldSlot, TableStore};
use crate::value::CellValue;

use super::errors::{ExecutorError, ExecutorResult};

/// A column resolved to (table position, field slot)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundColumn {
    /// Index into the selector's table list
    pub table: usize,
    pub slot: FieldSlot,
}

/// Expression tree with bound columns
#[derive(Debug, Clone, PartialEq)]
pub enum BoundExpr {
    Column(BoundColumn),
    Literal(CellValue),
    List(Vec<CellValue>),
    Lookup {
        op: LookupOp,
        lhs: Box<BoundExpr>,
        rhs: Box<BoundExpr>,
    },
    Arithmetic {
        op: ArithOp,
        lhs: Box<BoundExpr>,
        rhs: Box<BoundExpr>,
    },
    Extract {
        part: DatePart,
        operand: Box<BoundExpr>,
    },
    Aggregate {
        func: AggregateFunc,
        distinct: bool,
        arg: Option<Box<BoundExpr>>,
    },
    Group {
        connector: Connector,
        negated: bool,
        children: Vec<BoundExpr>,
    },
}

/// Equality join pairs of one dependent table
#[derive(Debug, Clone, PartialEq)]
pub struct BoundJoin {
    pub parent: usize,
    /// (parent slot, child slot)
    pub pairs: Vec<(FieldSlot, FieldSlot)>,
}

/// Resolves names against tables held in selector order
pub struct Binder<'a> {
    aliases: &'a [String],
    tables: &'a [&'a TableStore],
}

impl<'a> Binder<'a> {
    pub fn new(aliases: &'a [String], tables: &'a [&'a TableStore]) -> Self {
        Self { aliases, tables }
    }

    fn table_index(&self, alias: &str) -> ExecutorResult<usize> {
        self.aliases
            .iter()
            .position(|a| a.eq_ignore_ascii_case(alias))
            .ok_or_else(|| ExecutorError::table_not_found(alias))
    }

    fn slot(&self, table: usize, alias: &str, field: &str) -> ExecutorResult<FieldSlot> {
        self.tables[table]
            .resolve_field(field)
            .ok_or_else(|| ExecutorError::field_not_found(alias, field))
    }

    pub fn bind_column(&self, column: &ColumnRef) -> ExecutorResult<BoundColumn> {
        let table = self.table_index(&column.alias)?;
        let slot = self.slot(table, &column.alias, &column.field)?;
        Ok(BoundColumn { table, slot })
    }

    pub fn bind(&self, expr: &Expr) -> ExecutorResult<BoundExpr> {
        let bound = match expr {
            Expr::Column(col) => BoundExpr::Column(self.bind_column(col)?),
            Expr::Literal(v) => BoundExpr::Literal(v.clone()),
            Expr::List(items) => BoundExpr::List(items.clone()),
            Expr::Lookup { op, lhs, rhs } => BoundExpr::Lookup {
                op: *op,
                lhs: Box::new(self.bind(lhs)?),
                rhs: Box::new(self.bind(rhs)?),
            },
            Expr::Arithmetic { op, lhs, rhs } => BoundExpr::Arithmetic {
                op: *op,
                lhs: Box::new(self.bind(lhs)?),
                rhs: Box::new(self.bind(rhs)?),
            },
            Expr::Extract { part, operand } => BoundExpr::Extract {
                part: *part,
                operand: Box::new(self.bind(operand)?),
            },
            Expr::Aggregate(agg) => BoundExpr::Aggregate {
                func: agg.func,
                distinct: agg.distinct,
                arg: agg
                    .arg
                    .as_ref()
                    .map(|arg| self.bind(arg).map(Box::new))
                    .transpose()?,
            },
            Expr::Group {
                connector,
                negated,
                children,
            } => BoundExpr::Group {
                connector: *connector,
                negated: *negated,
                children: children
                    .iter()
                    .map(|child| self.bind(child))
                    .collect::<ExecutorResult<Vec<_>>>()?,
            },
        };
        Ok(bound)
    }

    /// Binds the join of the dependent table at `child`
    pub fn bind_join(&self, child: usize, join: &JoinSpec) -> ExecutorResult<BoundJoin> {
        let parent = self.table_index(&join.parent_alias)?;
        let child_alias = &self.aliases[child];
        let pairs = join
            .pairs
            .iter()
            .map(|(parent_field, child_field)| {
                Ok((
                    self.slot(parent, &join.parent_alias, parent_field)?,
                    self.slot(child, child_alias, child_field)?,
                ))
            })
            .collect::<ExecutorResult<Vec<_>>>()?;
        Ok(BoundJoin { parent, pairs })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::errors::ExecutorErrorCode;

    fn people() -> TableStore {
        TableStore::new(
            "1",
            "People",
            vec!["Name".into(), "hire_year".into()],
            vec![vec!["A".into(), CellValue::from(2020i64)]],
        )
    }

    #[test]
    fn test_bind_case_insensitive() {
        let aliases = vec!["p".to_string()];
        let table = people();
        let tables = [&table];
        let binder = Binder::new(&aliases, &tables);

        let col = binder.bind_column(&ColumnRef::new("P", "NAME")).unwrap();
        assert_eq!(col.slot, FieldSlot::Column(0));

        let id = binder.bind_column(&ColumnRef::new("p", "id")).unwrap();
        assert_eq!(id.slot, FieldSlot::RowId);
    }

    #[test]
    fn test_bind_errors() {
        let aliases = vec!["p".to_string()];
        let table = people();
        let tables = [&table];
        let binder = Binder::new(&aliases, &tables);

        let err = binder.bind_column(&ColumnRef::new("q", "name")).unwrap_err();
        assert_eq!(err.code(), ExecutorErrorCode::TableNotFound);

        let err = binder.bind_column(&ColumnRef::new("p", "age")).unwrap_err();
        assert_eq!(err.code(), ExecutorErrorCode::FieldNotFound);
    }
}
