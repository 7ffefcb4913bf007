//! Row cursor: the pull-based execution engine
//!
//! # Execution flow
//!
//! 1. Fetch every referenced table from the provider
//! 2. Bind all column references (fails before any row is read)
//! 3. Advance the base cursor one row at a time
//! 4. Evaluate a base-only filter on the base row
//! 5. Nested-loop the dependent cursors in declared order, keeping
//!    combinations whose join pairs hold (and, for filters touching
//!    dependents, whose filter holds)
//! 6. Evaluate the select list per combination, or once per group when
//!    aggregates are present
//! 7. Order (materializing), then distinct, offset and limit
//!
//! Dependent cursors are materialized and replayed from their buffer for
//! every outer row; there is no hash join.

use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

use tracing::debug;

use crate::cache::TableProvider;
use crate::observability::Event;
use crate::planner::{self, AggregateMode, OrderTarget, QueryDescription, Selector};
use crate::table::{TableCursor, TableStore};
use crate::value::CellValue;

use super::bind::{Binder, BoundExpr, BoundJoin};
use super::errors::{ExecutorError, ExecutorResult};
use super::eval::{values_equal, Evaluator, Scope};
use super::result::{QueryResult, ResultRow};
use super::sorter::ResultSequencer;

/// Fetches the selector's tables and returns a bound cursor
pub fn execute<P: TableProvider + ?Sized>(
    selector: &Selector,
    provider: &P,
) -> ExecutorResult<RowCursor> {
    let names: BTreeSet<String> = selector
        .tables
        .iter()
        .map(|t| t.table.to_lowercase())
        .collect();
    let tables = provider.get_tables(&names)?;
    RowCursor::new(selector, tables)
}

/// Compiles, executes and fully fetches a query description
pub fn run_query<P: TableProvider + ?Sized>(
    query: &QueryDescription,
    provider: &P,
) -> ExecutorResult<QueryResult> {
    let selector = planner::compile(query)?;
    execute(&selector, provider)?.into_result()
}

#[derive(Debug, Clone)]
enum BoundOrder {
    Output(usize),
    Expr(BoundExpr),
}

/// Per-query execution engine yielding result tuples
#[derive(Debug)]
pub struct RowCursor {
    column_names: Vec<String>,
    columns: Vec<BoundExpr>,
    filter: Option<BoundExpr>,
    filter_on_base: bool,
    /// Join of `cursors[i + 1]`
    joins: Vec<BoundJoin>,
    order_by: Vec<BoundOrder>,
    descending: Vec<bool>,
    distinct: bool,
    distinct_on: Vec<BoundExpr>,
    limit: Option<usize>,
    offset: usize,
    mode: AggregateMode,

    /// Base cursor first, then materialized dependents
    cursors: Vec<TableCursor>,
    pending: VecDeque<ResultRow>,
    sorted: Option<std::vec::IntoIter<ResultRow>>,
    seen: HashSet<String>,
    skipped: usize,
    emitted: usize,
    finished: bool,
}

impl RowCursor {
    /// Binds `selector` against `tables`, keyed by lowercased table name.
    ///
    /// Unknown aliases fail with `SHEETS_TABLE_NOT_FOUND` and unknown
    /// fields with `SHEETS_FIELD_NOT_FOUND`.
    pub fn new(selector: &Selector, mut tables: HashMap<String, TableStore>) -> ExecutorResult<Self> {
        let mut stores = Vec::with_capacity(selector.tables.len());
        for (i, source) in selector.tables.iter().enumerate() {
            let key = source.table.to_lowercase();
            let reused = selector.tables[i + 1..]
                .iter()
                .any(|t| t.table.to_lowercase() == key);
            let store = if reused {
                tables.get(&key).cloned()
            } else {
                tables.remove(&key)
            };
            stores.push(store.ok_or_else(|| ExecutorError::table_not_found(&source.table))?);
        }

        let aliases: Vec<String> = selector.tables.iter().map(|t| t.alias.clone()).collect();
        let refs: Vec<&TableStore> = stores.iter().collect();
        let binder = Binder::new(&aliases, &refs);

        let columns = selector
            .columns
            .iter()
            .map(|c| binder.bind(&c.expr))
            .collect::<ExecutorResult<Vec<_>>>()?;
        let filter = selector
            .filter
            .as_ref()
            .map(|f| binder.bind(f))
            .transpose()?;
        let order_by = selector
            .order_by
            .iter()
            .map(|key| match &key.target {
                OrderTarget::Output(i) => Ok(BoundOrder::Output(*i)),
                OrderTarget::Expr(expr) => binder.bind(expr).map(BoundOrder::Expr),
            })
            .collect::<ExecutorResult<Vec<_>>>()?;
        let distinct_on = selector
            .distinct_on
            .iter()
            .map(|e| binder.bind(e))
            .collect::<ExecutorResult<Vec<_>>>()?;
        for col in &selector.group_by {
            binder.bind_column(col)?;
        }
        let joins = selector
            .tables
            .iter()
            .enumerate()
            .skip(1)
            .map(|(i, source)| match &source.join {
                Some(join) => binder.bind_join(i, join),
                None => Err(ExecutorError::from(planner::PlannerError::unsupported_query(
                    "more than one base table is not supported",
                ))),
            })
            .collect::<ExecutorResult<Vec<_>>>()?;

        let cursors = stores
            .into_iter()
            .enumerate()
            .map(|(i, store)| {
                if i == 0 {
                    TableCursor::new(store)
                } else {
                    TableCursor::materialized(store)
                }
            })
            .collect();

        Ok(Self {
            column_names: selector.column_names(),
            columns,
            filter,
            filter_on_base: selector.filter_on_base,
            joins,
            order_by,
            descending: selector.order_by.iter().map(|k| k.descending).collect(),
            distinct: selector.distinct,
            distinct_on,
            limit: selector.limit,
            offset: selector.offset,
            mode: selector.aggregate_mode,
            cursors,
            pending: VecDeque::new(),
            sorted: None,
            seen: HashSet::new(),
            skipped: 0,
            emitted: 0,
            finished: false,
        })
    }

    /// Output aliases in tuple order
    pub fn column_names(&self) -> &[String] {
        &self.column_names
    }

    /// Returns the next tuple, or None once exhausted
    pub fn fetch_one(&mut self) -> ExecutorResult<Option<Vec<CellValue>>> {
        match self.next_row() {
            Ok(row) => Ok(row),
            Err(e) => {
                self.finished = true;
                Err(e)
            }
        }
    }

    /// Returns up to `n` tuples
    pub fn fetch_many(&mut self, n: usize) -> ExecutorResult<Vec<Vec<CellValue>>> {
        let mut rows = Vec::with_capacity(n.min(1024));
        while rows.len() < n {
            match self.fetch_one()? {
                Some(row) => rows.push(row),
                None => break,
            }
        }
        Ok(rows)
    }

    /// Returns every remaining tuple
    pub fn fetch_all(&mut self) -> ExecutorResult<Vec<Vec<CellValue>>> {
        let mut rows = Vec::new();
        while let Some(row) = self.fetch_one()? {
            rows.push(row);
        }
        Ok(rows)
    }

    /// Fetches everything along with the column aliases
    pub fn into_result(mut self) -> ExecutorResult<QueryResult> {
        let rows = self.fetch_all()?;
        Ok(QueryResult {
            columns: self.column_names,
            rows,
        })
    }

    fn limit_reached(&self) -> bool {
        self.limit.map_or(false, |limit| self.emitted >= limit)
    }

    fn next_row(&mut self) -> ExecutorResult<Option<Vec<CellValue>>> {
        loop {
            if self.finished || self.limit_reached() {
                self.finished = true;
                return Ok(None);
            }

            let next = if !self.order_by.is_empty() || self.mode == AggregateMode::WholeTable {
                if self.sorted.is_none() {
                    let rows = self.materialize()?;
                    self.sorted = Some(rows.into_iter());
                }
                self.sorted.as_mut().and_then(|rows| rows.next())
            } else {
                match self.pending.pop_front() {
                    Some(row) => Some(row),
                    None => {
                        if !self.step_base()? {
                            self.finished = true;
                        }
                        continue;
                    }
                }
            };

            match next {
                Some(row) => {
                    if self.admit(&row) {
                        return Ok(Some(row.values));
                    }
                }
                None => self.finished = true,
            }
        }
    }

    /// Applies distinct, offset and limit to one row
    fn admit(&mut self, row: &ResultRow) -> bool {
        if self.distinct || !self.distinct_on.is_empty() {
            let values = if self.distinct {
                &row.values
            } else {
                &row.distinct_on
            };
            if !self.seen.insert(tuple_key(values)) {
                return false;
            }
        }
        if self.skipped < self.offset {
            self.skipped += 1;
            return false;
        }
        self.emitted += 1;
        true
    }

    /// Produces every row and applies the ordering
    fn materialize(&mut self) -> ExecutorResult<Vec<ResultRow>> {
        let mut rows = Vec::new();
        if self.mode == AggregateMode::WholeTable {
            let mut group = Vec::new();
            while let Some(base_row) = self.advance_base()? {
                if self.base_filter_passes(base_row)? {
                    group.extend(self.combinations(base_row)?);
                }
            }
            let frame = group.first().cloned().unwrap_or_default();
            rows.push(self.produce(&frame, &group)?);
        } else {
            while self.step_base()? {
                rows.extend(self.pending.drain(..));
            }
        }
        ResultSequencer::sort(&mut rows, &self.descending);
        Ok(rows)
    }

    fn advance_base(&mut self) -> ExecutorResult<Option<usize>> {
        let base = &mut self.cursors[0];
        if base.advance() {
            return Ok(Some(base.position()?));
        }
        debug!(
            event = %Event::CursorExhausted,
            table = %base.table().name(),
            rows = base.table().len(),
        );
        Ok(None)
    }

    /// Processes one base row into `pending`. Returns false once the
    /// base cursor is exhausted.
    fn step_base(&mut self) -> ExecutorResult<bool> {
        let base_row = match self.advance_base()? {
            Some(row) => row,
            None => return Ok(false),
        };
        if !self.base_filter_passes(base_row)? {
            return Ok(true);
        }

        let combinations = self.combinations(base_row)?;
        match self.mode {
            AggregateMode::None => {
                for frame in &combinations {
                    let row = self.produce(frame, &[])?;
                    self.pending.push_back(row);
                }
            }
            AggregateMode::PerBaseRow | AggregateMode::WholeTable => {
                if let Some(frame) = combinations.first() {
                    let row = self.produce(frame, &combinations)?;
                    self.pending.push_back(row);
                }
            }
        }
        Ok(true)
    }

    fn base_filter_passes(&self, base_row: usize) -> ExecutorResult<bool> {
        match (&self.filter, self.filter_on_base) {
            (Some(filter), true) => {
                Evaluator::is_true(filter, &Scope::row(&self.cursors, &[base_row]))
            }
            _ => Ok(true),
        }
    }

    /// Join combinations of one base row that survive the filter
    fn combinations(&mut self, base_row: usize) -> ExecutorResult<Vec<Vec<usize>>> {
        let mut combinations = Vec::new();
        let mut frame = vec![base_row];
        extend(&mut self.cursors, &self.joins, 1, &mut frame, &mut combinations)?;

        match (&self.filter, self.filter_on_base) {
            (Some(filter), false) => {
                let mut kept = Vec::with_capacity(combinations.len());
                for frame in combinations {
                    if Evaluator::is_true(filter, &Scope::row(&self.cursors, &frame))? {
                        kept.push(frame);
                    }
                }
                Ok(kept)
            }
            _ => Ok(combinations),
        }
    }

    fn produce(&self, frame: &[usize], group: &[Vec<usize>]) -> ExecutorResult<ResultRow> {
        let scope = Scope::group(&self.cursors, frame, group);
        let values = self
            .columns
            .iter()
            .map(|expr| Evaluator::eval(expr, &scope))
            .collect::<ExecutorResult<Vec<_>>>()?;
        let sort_keys = self
            .order_by
            .iter()
            .map(|key| match key {
                BoundOrder::Output(i) => Ok(values.get(*i).cloned().unwrap_or(CellValue::Null)),
                BoundOrder::Expr(expr) => Evaluator::eval(expr, &scope),
            })
            .collect::<ExecutorResult<Vec<_>>>()?;
        let distinct_on = self
            .distinct_on
            .iter()
            .map(|expr| Evaluator::eval(expr, &scope))
            .collect::<ExecutorResult<Vec<_>>>()?;
        Ok(ResultRow {
            values,
            sort_keys,
            distinct_on,
        })
    }
}

impl Iterator for RowCursor {
    type Item = ExecutorResult<Vec<CellValue>>;

    fn next(&mut self) -> Option<Self::Item> {
        self.fetch_one().transpose()
    }
}

/// Nested loop over the dependent cursors from `depth` on
fn extend(
    cursors: &mut [TableCursor],
    joins: &[BoundJoin],
    depth: usize,
    frame: &mut Vec<usize>,
    out: &mut Vec<Vec<usize>>,
) -> ExecutorResult<()> {
    if depth == cursors.len() {
        out.push(frame.clone());
        return Ok(());
    }

    cursors[depth].rewind()?;
    while cursors[depth].advance() {
        let row = cursors[depth].position()?;
        if join_matches(cursors, &joins[depth - 1], frame, depth, row) {
            frame.push(row);
            extend(cursors, joins, depth + 1, frame, out)?;
            frame.pop();
        }
    }
    Ok(())
}

/// All equality pairs hold; null never equals null
fn join_matches(
    cursors: &[TableCursor],
    join: &BoundJoin,
    frame: &[usize],
    child: usize,
    row: usize,
) -> bool {
    let parent_row = match frame.get(join.parent) {
        Some(r) => *r,
        None => return false,
    };
    let parent = cursors[join.parent].table();
    let dependent = cursors[child].table();
    join.pairs.iter().all(|(parent_slot, child_slot)| {
        let left = parent.value(parent_row, *parent_slot);
        let right = dependent.value(row, *child_slot);
        !left.is_null() && !right.is_null() && values_equal(&left, &right)
    })
}

/// Unambiguous key of a whole tuple
fn tuple_key(values: &[CellValue]) -> String {
    values
        .iter()
        .map(|v| {
            let key = v.distinct_key();
            format!("{}:{}", key.len(), key)
        })
        .collect()
}
