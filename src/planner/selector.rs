//! Compiled query plan
//!
//! A [`Selector`] is immutable once built. Aliases are stored lowercased;
//! field names keep their original spelling and are matched
//! case-insensitively when bound.

use crate::value::CellValue;

/// `alias.field` column reference
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ColumnRef {
    pub alias: String,
    pub field: String,
}

impl ColumnRef {
    pub fn new(alias: impl Into<String>, field: impl Into<String>) -> Self {
        Self {
            alias: alias.into().to_lowercase(),
            field: field.into(),
        }
    }
}

/// Binary comparison kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupOp {
    Exact,
    IExact,
    Gt,
    Gte,
    Lt,
    Lte,
    In,
    Range,
    Contains,
    IContains,
    StartsWith,
    IStartsWith,
    EndsWith,
    IEndsWith,
    IsNull,
}

impl LookupOp {
    pub fn from_name(name: &str) -> Option<Self> {
        let op = match name.to_ascii_lowercase().as_str() {
            "exact" => LookupOp::Exact,
            "iexact" => LookupOp::IExact,
            "gt" => LookupOp::Gt,
            "gte" => LookupOp::Gte,
            "lt" => LookupOp::Lt,
            "lte" => LookupOp::Lte,
            "in" => LookupOp::In,
            "range" => LookupOp::Range,
            "contains" => LookupOp::Contains,
            "icontains" => LookupOp::IContains,
            "startswith" => LookupOp::StartsWith,
            "istartswith" => LookupOp::IStartsWith,
            "endswith" => LookupOp::EndsWith,
            "iendswith" => LookupOp::IEndsWith,
            "isnull" => LookupOp::IsNull,
            _ => return None,
        };
        Some(op)
    }

    /// Case-insensitive variant
    pub fn is_case_insensitive(&self) -> bool {
        matches!(
            self,
            LookupOp::IExact | LookupOp::IContains | LookupOp::IStartsWith | LookupOp::IEndsWith
        )
    }
}

/// Arithmetic connectors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
}

impl ArithOp {
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        let op = match symbol {
            "+" => ArithOp::Add,
            "-" => ArithOp::Sub,
            "*" => ArithOp::Mul,
            "/" => ArithOp::Div,
            "%%" | "%" => ArithOp::Mod,
            "^" | "**" => ArithOp::Pow,
            "&" => ArithOp::BitAnd,
            "|" => ArithOp::BitOr,
            "#" => ArithOp::BitXor,
            "<<" => ArithOp::Shl,
            ">>" => ArithOp::Shr,
            _ => return None,
        };
        Some(op)
    }
}

/// Extractable date parts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatePart {
    Year,
    Month,
    Day,
    Hour,
    Minute,
    Second,
}

impl DatePart {
    pub fn from_name(name: &str) -> Option<Self> {
        let part = match name.to_ascii_lowercase().as_str() {
            "year" => DatePart::Year,
            "month" => DatePart::Month,
            "day" => DatePart::Day,
            "hour" => DatePart::Hour,
            "minute" => DatePart::Minute,
            "second" => DatePart::Second,
            _ => return None,
        };
        Some(part)
    }
}

/// Aggregate functions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateFunc {
    Count,
    Avg,
    Sum,
    Max,
    Min,
}

impl AggregateFunc {
    pub fn from_name(name: &str) -> Option<Self> {
        let func = match name.to_ascii_lowercase().as_str() {
            "count" => AggregateFunc::Count,
            "avg" => AggregateFunc::Avg,
            "sum" => AggregateFunc::Sum,
            "max" => AggregateFunc::Max,
            "min" => AggregateFunc::Min,
            _ => return None,
        };
        Some(func)
    }
}

/// Boolean group connector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connector {
    And,
    Or,
}

impl Connector {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_uppercase().as_str() {
            "AND" => Some(Connector::And),
            "OR" => Some(Connector::Or),
            _ => None,
        }
    }
}

/// Aggregate call.
///
/// `arg` is None for `count(*)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Aggregate {
    pub func: AggregateFunc,
    pub distinct: bool,
    pub arg: Option<Box<Expr>>,
}

/// Expression tree
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Column(ColumnRef),
    Literal(CellValue),
    /// Literal list, right-hand side of `in` / `range`
    List(Vec<CellValue>),
    Lookup {
        op: LookupOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Arithmetic {
        op: ArithOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Extract {
        part: DatePart,
        operand: Box<Expr>,
    },
    Aggregate(Aggregate),
    Group {
        connector: Connector,
        negated: bool,
        children: Vec<Expr>,
    },
}

impl Expr {
    /// Visits every column reference, including those inside aggregates
    pub fn for_each_column<'a>(&'a self, f: &mut dyn FnMut(&'a ColumnRef)) {
        match self {
            Expr::Column(col) => f(col),
            Expr::Literal(_) | Expr::List(_) => {}
            Expr::Lookup { lhs, rhs, .. } | Expr::Arithmetic { lhs, rhs, .. } => {
                lhs.for_each_column(f);
                rhs.for_each_column(f);
            }
            Expr::Extract { operand, .. } => operand.for_each_column(f),
            Expr::Aggregate(agg) => {
                if let Some(arg) = &agg.arg {
                    arg.for_each_column(f);
                }
            }
            Expr::Group { children, .. } => {
                for child in children {
                    child.for_each_column(f);
                }
            }
        }
    }

    /// Column references outside any aggregate
    pub fn plain_columns(&self) -> Vec<&ColumnRef> {
        let mut out = Vec::new();
        self.collect_plain(&mut out);
        out
    }

    fn collect_plain<'a>(&'a self, out: &mut Vec<&'a ColumnRef>) {
        match self {
            Expr::Column(col) => out.push(col),
            Expr::Literal(_) | Expr::List(_) | Expr::Aggregate(_) => {}
            Expr::Lookup { lhs, rhs, .. } | Expr::Arithmetic { lhs, rhs, .. } => {
                lhs.collect_plain(out);
                rhs.collect_plain(out);
            }
            Expr::Extract { operand, .. } => operand.collect_plain(out),
            Expr::Group { children, .. } => {
                for child in children {
                    child.collect_plain(out);
                }
            }
        }
    }

    /// Aggregate calls in this tree (not descending into aggregates)
    pub fn aggregates(&self) -> Vec<&Aggregate> {
        let mut out = Vec::new();
        self.collect_aggregates(&mut out);
        out
    }

    fn collect_aggregates<'a>(&'a self, out: &mut Vec<&'a Aggregate>) {
        match self {
            Expr::Aggregate(agg) => out.push(agg),
            Expr::Column(_) | Expr::Literal(_) | Expr::List(_) => {}
            Expr::Lookup { lhs, rhs, .. } | Expr::Arithmetic { lhs, rhs, .. } => {
                lhs.collect_aggregates(out);
                rhs.collect_aggregates(out);
            }
            Expr::Extract { operand, .. } => operand.collect_aggregates(out),
            Expr::Group { children, .. } => {
                for child in children {
                    child.collect_aggregates(out);
                }
            }
        }
    }

    /// True if every column reference names `alias`
    pub fn only_references(&self, alias: &str) -> bool {
        let mut only = true;
        self.for_each_column(&mut |col| only &= col.alias == alias);
        only
    }
}

/// One output column
#[derive(Debug, Clone, PartialEq)]
pub struct SelectColumn {
    pub alias: String,
    pub expr: Expr,
}

/// Equality join from a dependent alias to an earlier one
#[derive(Debug, Clone, PartialEq)]
pub struct JoinSpec {
    pub parent_alias: String,
    /// (parent field, child field)
    pub pairs: Vec<(String, String)>,
}

/// One aliased source table
#[derive(Debug, Clone, PartialEq)]
pub struct TableSource {
    pub alias: String,
    pub table: String,
    /// None for the base table
    pub join: Option<JoinSpec>,
}

/// What an ordering key sorts on
#[derive(Debug, Clone, PartialEq)]
pub enum OrderTarget {
    /// A select item by position
    Output(usize),
    Expr(Expr),
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderKey {
    pub target: OrderTarget,
    pub descending: bool,
}

/// How aggregates collapse rows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateMode {
    /// No aggregates; one output row per join combination
    None,
    /// One output row per base row with at least one combination
    PerBaseRow,
    /// Exactly one output row over all combinations
    WholeTable,
}

/// Compiled, immutable query
#[derive(Debug, Clone, PartialEq)]
pub struct Selector {
    pub columns: Vec<SelectColumn>,
    /// Base table first, then dependents in declared order
    pub tables: Vec<TableSource>,
    pub filter: Option<Expr>,
    /// Filter only touches the base alias
    pub filter_on_base: bool,
    pub order_by: Vec<OrderKey>,
    pub distinct: bool,
    pub distinct_on: Vec<Expr>,
    pub group_by: Vec<ColumnRef>,
    pub limit: Option<usize>,
    pub offset: usize,
    pub aggregate_mode: AggregateMode,
}

impl Selector {
    pub fn base(&self) -> &TableSource {
        &self.tables[0]
    }

    pub fn dependents(&self) -> &[TableSource] {
        &self.tables[1..]
    }

    /// Output aliases in select order
    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.alias.clone()).collect()
    }
}
