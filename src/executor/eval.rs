//! Expression evaluation
//!
//! One recursive `match` over [`BoundExpr`], evaluated fresh for every
//! row. Comparisons follow three-valued logic: a null operand yields
//! null, and null is never true at the top of a predicate tree.

use std::cmp::Ordering;
use std::collections::HashSet;

use chrono::{Datelike, Timelike};

use crate::planner::{AggregateFunc, ArithOp, Connector, DatePart, LookupOp};
use crate::table::{CursorStateError, TableCursor};
use crate::value::{to_datetime, CellValue};

use super::bind::BoundExpr;
use super::errors::{ExecutorError, ExecutorResult};

/// Rows visible to one evaluation
#[derive(Debug, Clone, Copy)]
pub struct Scope<'a> {
    cursors: &'a [TableCursor],
    /// Row index per table, in selector order
    frame: &'a [usize],
    /// Join combinations aggregates fold over
    group: &'a [Vec<usize>],
}

impl<'a> Scope<'a> {
    /// Scope of a single combination
    pub fn row(cursors: &'a [TableCursor], frame: &'a [usize]) -> Self {
        Self {
            cursors,
            frame,
            group: &[],
        }
    }

    /// Scope whose aggregates fold over `group`
    pub fn group(cursors: &'a [TableCursor], frame: &'a [usize], group: &'a [Vec<usize>]) -> Self {
        Self {
            cursors,
            frame,
            group,
        }
    }
}

/// Tree-walking evaluator
pub struct Evaluator;

impl Evaluator {
    /// Evaluates `expr` to a cell value
    pub fn eval(expr: &BoundExpr, scope: &Scope<'_>) -> ExecutorResult<CellValue> {
        match expr {
            BoundExpr::Column(col) => {
                let row = *scope
                    .frame
                    .get(col.table)
                    .ok_or(CursorStateError::NotStarted)?;
                Ok(scope.cursors[col.table].table().value(row, col.slot))
            }
            BoundExpr::Literal(value) => Ok(value.clone()),
            BoundExpr::List(_) => Err(ExecutorError::evaluation_failed(
                "list literal used as a scalar",
            )),
            BoundExpr::Lookup { op, lhs, rhs } => Self::lookup(*op, lhs, rhs, scope),
            BoundExpr::Arithmetic { op, lhs, rhs } => {
                let left = Self::eval(lhs, scope)?;
                let right = Self::eval(rhs, scope)?;
                arithmetic(*op, &left, &right)
            }
            BoundExpr::Extract { part, operand } => {
                let value = Self::eval(operand, scope)?;
                if value.is_null() {
                    return Ok(CellValue::Null);
                }
                let dt = to_datetime(&value)?;
                let n = match part {
                    DatePart::Year => dt.year() as f64,
                    DatePart::Month => dt.month() as f64,
                    DatePart::Day => dt.day() as f64,
                    DatePart::Hour => dt.hour() as f64,
                    DatePart::Minute => dt.minute() as f64,
                    DatePart::Second => dt.second() as f64,
                };
                Ok(CellValue::Number(n))
            }
            BoundExpr::Aggregate {
                func,
                distinct,
                arg,
            } => Self::aggregate(*func, *distinct, arg.as_deref(), scope),
            BoundExpr::Group {
                connector,
                negated,
                children,
            } => {
                // Value that decides the group on its own
                let decisive = *connector == Connector::Or;
                let mut outcome = Some(!decisive);
                for child in children {
                    match truth(&Self::eval(child, scope)?) {
                        Some(b) if b == decisive => {
                            outcome = Some(decisive);
                            break;
                        }
                        Some(_) => {}
                        None => outcome = None,
                    }
                }
                if *negated {
                    outcome = outcome.map(|b| !b);
                }
                Ok(outcome.map_or(CellValue::Null, CellValue::Bool))
            }
        }
    }

    /// Evaluates a predicate; null counts as false
    pub fn is_true(expr: &BoundExpr, scope: &Scope<'_>) -> ExecutorResult<bool> {
        Ok(truth(&Self::eval(expr, scope)?) == Some(true))
    }

    fn lookup(
        op: LookupOp,
        lhs: &BoundExpr,
        rhs: &BoundExpr,
        scope: &Scope<'_>,
    ) -> ExecutorResult<CellValue> {
        let left = Self::eval(lhs, scope)?;

        let result = match op {
            LookupOp::IsNull => {
                let wanted = truth(&Self::eval(rhs, scope)?) == Some(true);
                return Ok(CellValue::Bool(left.is_null() == wanted));
            }
            LookupOp::In => {
                let items = list_operand(op, rhs)?;
                if left.is_null() {
                    return Ok(CellValue::Null);
                }
                if items.iter().any(|item| values_equal(&left, item)) {
                    true
                } else if items.iter().any(CellValue::is_null) {
                    return Ok(CellValue::Null);
                } else {
                    false
                }
            }
            LookupOp::Range => {
                let (low, high) = match list_operand(op, rhs)? {
                    [low, high] => (low, high),
                    _ => {
                        return Err(ExecutorError::unsupported_expression(
                            "'range' requires exactly two bounds",
                        ))
                    }
                };
                if left.is_null() || low.is_null() || high.is_null() {
                    return Ok(CellValue::Null);
                }
                compare(&left, low)? != Ordering::Less && compare(&left, high)? != Ordering::Greater
            }
            _ => {
                let right = Self::eval(rhs, scope)?;
                if left.is_null() || right.is_null() {
                    return Ok(CellValue::Null);
                }
                match op {
                    LookupOp::Exact => values_equal(&left, &right),
                    LookupOp::IExact => lowered(&left) == lowered(&right),
                    LookupOp::Gt => compare(&left, &right)? == Ordering::Greater,
                    LookupOp::Gte => compare(&left, &right)? != Ordering::Less,
                    LookupOp::Lt => compare(&left, &right)? == Ordering::Less,
                    LookupOp::Lte => compare(&left, &right)? != Ordering::Greater,
                    _ => pattern_match(op, &left, &right)?,
                }
            }
        };
        Ok(CellValue::Bool(result))
    }

    fn aggregate(
        func: AggregateFunc,
        distinct: bool,
        arg: Option<&BoundExpr>,
        scope: &Scope<'_>,
    ) -> ExecutorResult<CellValue> {
        let mut seen = HashSet::new();
        let mut values = Vec::new();
        for frame in scope.group {
            let inner = Scope::row(scope.cursors, frame);
            let value = match arg {
                None => CellValue::Bool(true),
                Some(arg) => Self::eval(arg, &inner)?,
            };
            if value.is_null() {
                continue;
            }
            if distinct && !seen.insert(value.distinct_key()) {
                continue;
            }
            values.push(value);
        }

        match func {
            AggregateFunc::Count => Ok(CellValue::Number(values.len() as f64)),
            AggregateFunc::Sum | AggregateFunc::Avg => {
                if values.is_empty() {
                    return Ok(CellValue::Null);
                }
                let mut sum = 0.0;
                for value in &values {
                    sum += number_operand(value)?;
                }
                if func == AggregateFunc::Avg {
                    sum /= values.len() as f64;
                }
                Ok(CellValue::Number(sum))
            }
            AggregateFunc::Max => Ok(values
                .into_iter()
                .max_by(|a, b| a.total_cmp(b))
                .unwrap_or(CellValue::Null)),
            AggregateFunc::Min => Ok(values
                .into_iter()
                .min_by(|a, b| a.total_cmp(b))
                .unwrap_or(CellValue::Null)),
        }
    }
}

/// Boolean view of a value; None for null
pub fn truth(value: &CellValue) -> Option<bool> {
    match value {
        CellValue::Null => None,
        CellValue::Bool(b) => Some(*b),
        CellValue::Number(n) => Some(*n != 0.0),
        CellValue::Text(s) => Some(!s.is_empty()),
    }
}

/// Equality of two non-null values.
///
/// Numbers and numeric text compare as numbers; other mixed types
/// are never equal.
pub fn values_equal(a: &CellValue, b: &CellValue) -> bool {
    match (a, b) {
        (CellValue::Number(x), CellValue::Number(y)) => x == y,
        (CellValue::Text(x), CellValue::Text(y)) => x == y,
        (CellValue::Bool(x), CellValue::Bool(y)) => x == y,
        (CellValue::Number(x), CellValue::Text(_)) => b.as_number() == Some(*x),
        (CellValue::Text(_), CellValue::Number(y)) => a.as_number() == Some(*y),
        _ => false,
    }
}

/// Ordering of two non-null values of comparable types
pub fn compare(a: &CellValue, b: &CellValue) -> ExecutorResult<Ordering> {
    let numeric = |x: f64, y: f64| x.partial_cmp(&y).unwrap_or_else(|| x.total_cmp(&y));
    let mismatch = || {
        ExecutorError::evaluation_failed(format!("cannot compare {:?} with {:?}", a, b))
    };
    match (a, b) {
        (CellValue::Number(x), CellValue::Number(y)) => Ok(numeric(*x, *y)),
        (CellValue::Text(x), CellValue::Text(y)) => Ok(x.cmp(y)),
        (CellValue::Bool(x), CellValue::Bool(y)) => Ok(x.cmp(y)),
        (CellValue::Number(x), CellValue::Text(_)) => {
            b.as_number().map(|y| numeric(*x, y)).ok_or_else(mismatch)
        }
        (CellValue::Text(_), CellValue::Number(y)) => {
            a.as_number().map(|x| numeric(x, *y)).ok_or_else(mismatch)
        }
        _ => Err(mismatch()),
    }
}

fn lowered(value: &CellValue) -> Option<String> {
    value.as_text().map(|s| s.to_lowercase())
}

fn list_operand(op: LookupOp, rhs: &BoundExpr) -> ExecutorResult<&[CellValue]> {
    match rhs {
        BoundExpr::List(items) => Ok(items.as_slice()),
        _ => Err(ExecutorError::unsupported_expression(format!(
            "{:?} requires a list operand",
            op
        ))),
    }
}

fn number_operand(value: &CellValue) -> ExecutorResult<f64> {
    value
        .as_number()
        .ok_or_else(|| ExecutorError::evaluation_failed(format!("{:?} is not a number", value)))
}

fn integral_operand(n: f64) -> ExecutorResult<i64> {
    const MAX_EXACT: f64 = 9_007_199_254_740_992.0;
    if n.fract() == 0.0 && n.abs() <= MAX_EXACT {
        Ok(n as i64)
    } else {
        Err(ExecutorError::evaluation_failed(format!(
            "bitwise operand {} is not an integer",
            n
        )))
    }
}

fn shift_amount(n: i64) -> ExecutorResult<u32> {
    u32::try_from(n)
        .ok()
        .filter(|s| *s < 64)
        .ok_or_else(|| ExecutorError::evaluation_failed(format!("invalid shift amount {}", n)))
}

fn arithmetic(op: ArithOp, left: &CellValue, right: &CellValue) -> ExecutorResult<CellValue> {
    if left.is_null() || right.is_null() {
        return Ok(CellValue::Null);
    }
    let x = number_operand(left)?;
    let y = number_operand(right)?;

    let n = match op {
        ArithOp::Add => x + y,
        ArithOp::Sub => x - y,
        ArithOp::Mul => x * y,
        ArithOp::Div | ArithOp::Mod if y == 0.0 => {
            return Err(ExecutorError::evaluation_failed("division by zero"))
        }
        ArithOp::Div => x / y,
        ArithOp::Mod => x % y,
        ArithOp::Pow => x.powf(y),
        _ => {
            let a = integral_operand(x)?;
            let b = integral_operand(y)?;
            let bits = match op {
                ArithOp::BitAnd => a & b,
                ArithOp::BitOr => a | b,
                ArithOp::BitXor => a ^ b,
                ArithOp::Shl => a.wrapping_shl(shift_amount(b)?),
                _ => a.wrapping_shr(shift_amount(b)?),
            };
            bits as f64
        }
    };
    Ok(CellValue::Number(n))
}

/// True if the pattern ends in a `%` wildcard rather than an escaped `\%`
fn trailing_wildcard(pattern: &str) -> bool {
    match pattern.strip_suffix('%') {
        Some(rest) => rest.chars().rev().take_while(|c| *c == '\\').count() % 2 == 0,
        None => false,
    }
}

/// Removes the `%` wrapping the query builder attaches to pattern
/// operands, then unescapes `\%`, `\_` and `\\`.
fn strip_wildcards(op: LookupOp, pattern: &str) -> String {
    let leading = matches!(
        op,
        LookupOp::Contains | LookupOp::IContains | LookupOp::EndsWith | LookupOp::IEndsWith
    );
    let trailing = matches!(
        op,
        LookupOp::Contains | LookupOp::IContains | LookupOp::StartsWith | LookupOp::IStartsWith
    );

    let mut p = pattern;
    if leading {
        p = p.strip_prefix('%').unwrap_or(p);
    }
    if trailing && trailing_wildcard(p) {
        p = &p[..p.len() - 1];
    }

    let mut out = String::with_capacity(p.len());
    let mut chars = p.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next_if(|n| matches!(n, '%' | '_' | '\\')) {
                out.push(next);
                continue;
            }
        }
        out.push(c);
    }
    out
}

fn pattern_match(op: LookupOp, value: &CellValue, pattern: &CellValue) -> ExecutorResult<bool> {
    let (text, pattern) = match (value.as_text(), pattern.as_text()) {
        (Some(t), Some(p)) => (t, p),
        _ => return Ok(false),
    };
    let mut needle = strip_wildcards(op, &pattern);
    let mut haystack = text;
    if op.is_case_insensitive() {
        needle = needle.to_lowercase();
        haystack = haystack.to_lowercase();
    }

    match op {
        LookupOp::Contains | LookupOp::IContains => Ok(haystack.contains(&needle)),
        LookupOp::StartsWith | LookupOp::IStartsWith => Ok(haystack.starts_with(&needle)),
        LookupOp::EndsWith | LookupOp::IEndsWith => Ok(haystack.ends_with(&needle)),
        other => Err(ExecutorError::unsupported_expression(format!(
            "{:?} is not a pattern lookup",
            other
        ))),
    }
}
