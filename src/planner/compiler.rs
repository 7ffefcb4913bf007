//! Selector compiler
//!
//! Turns a [`QueryDescription`] into an immutable [`Selector`]. Every
//! construct outside the supported subset is rejected here, before any
//! table is fetched or any row produced.

use tracing::{debug, info};

use crate::observability::Event;
use crate::value::CellValue;

use super::ast::{FromItem, QueryDescription, QueryNode};
use super::errors::{PlannerError, PlannerResult};
use super::selector::{
    Aggregate, AggregateFunc, AggregateMode, ArithOp, ColumnRef, Connector, DatePart, Expr,
    JoinSpec, LookupOp, OrderKey, OrderTarget, SelectColumn, Selector, TableSource,
};

/// Compiles a query description into a selector.
///
/// Emits `QUERY_COMPILED` on success and `QUERY_REJECTED` on failure.
pub fn compile(query: &QueryDescription) -> PlannerResult<Selector> {
    match SelectorCompiler::compile(query) {
        Ok(selector) => {
            debug!(
                event = %Event::QueryCompiled,
                tables = selector.tables.len(),
                columns = selector.columns.len(),
                aggregate_mode = ?selector.aggregate_mode,
                ordered = !selector.order_by.is_empty(),
            );
            Ok(selector)
        }
        Err(err) => {
            info!(event = %Event::QueryRejected, code = %err.code(), reason = err.message());
            Err(err)
        }
    }
}

/// Clause an expression is being compiled for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Clause {
    Select,
    Filter,
    OrderBy,
    DistinctOn,
    GroupBy,
    AggregateArg,
}

impl Clause {
    fn allows_aggregates(&self) -> bool {
        matches!(self, Clause::Select | Clause::OrderBy)
    }
}

/// Compiler state for one description
pub struct SelectorCompiler {
    base_alias: String,
}

impl SelectorCompiler {
    /// Compiles without logging; see [`compile`]
    pub fn compile(query: &QueryDescription) -> PlannerResult<Selector> {
        if let Some(combinator) = &query.combinator {
            return Err(PlannerError::unsupported_query(format!(
                "{} combinator is not supported",
                combinator.to_uppercase()
            )));
        }
        if query.having.is_some() {
            return Err(PlannerError::unsupported_query("HAVING is not supported"));
        }
        if !query.group_by.is_empty() && !query.distinct_fields.is_empty() {
            return Err(PlannerError::unsupported_query(
                "GROUP BY combined with DISTINCT on fields is not supported",
            ));
        }

        let tables = compile_from(&query.from)?;
        let compiler = SelectorCompiler {
            base_alias: tables[0].alias.clone(),
        };

        if query.select.is_empty() {
            return Err(PlannerError::query_invalid("select list is empty"));
        }
        let columns = query
            .select
            .iter()
            .enumerate()
            .map(|(i, item)| {
                let alias = match (&item.alias, &item.expr) {
                    (Some(alias), _) => alias.clone(),
                    (None, QueryNode::Col { column, .. }) => column.clone(),
                    (None, _) => format!("col{}", i + 1),
                };
                let expr = compiler.compile_node(&item.expr, Clause::Select)?;
                Ok(SelectColumn { alias, expr })
            })
            .collect::<PlannerResult<Vec<_>>>()?;

        let filter = query
            .filter
            .as_ref()
            .map(|node| compiler.compile_node(node, Clause::Filter))
            .transpose()?;
        let filter_on_base = filter
            .as_ref()
            .map_or(true, |f| f.only_references(&compiler.base_alias));

        let order_by = query
            .order_by
            .iter()
            .map(|item| {
                let target = match &item.expr {
                    QueryNode::Ref { name } => columns
                        .iter()
                        .position(|c| c.alias.eq_ignore_ascii_case(name))
                        .map(OrderTarget::Output)
                        .ok_or_else(|| {
                            PlannerError::query_invalid(format!(
                                "order_by references unknown select alias '{}'",
                                name
                            ))
                        })?,
                    node => OrderTarget::Expr(compiler.compile_node(node, Clause::OrderBy)?),
                };
                Ok(OrderKey {
                    target,
                    descending: item.descending,
                })
            })
            .collect::<PlannerResult<Vec<_>>>()?;

        let distinct_on = query
            .distinct_fields
            .iter()
            .map(|node| compiler.compile_node(node, Clause::DistinctOn))
            .collect::<PlannerResult<Vec<_>>>()?;

        let group_by = query
            .group_by
            .iter()
            .map(|node| match compiler.compile_node(node, Clause::GroupBy)? {
                Expr::Column(col) if col.alias == compiler.base_alias => Ok(col),
                _ => Err(PlannerError::unsupported_query(
                    "GROUP BY supports base-table columns only",
                )),
            })
            .collect::<PlannerResult<Vec<_>>>()?;

        let aggregate_mode =
            compiler.aggregate_mode(&columns, &order_by, &distinct_on, tables.len() > 1)?;

        Ok(Selector {
            columns,
            tables,
            filter,
            filter_on_base,
            order_by,
            distinct: query.distinct && distinct_on.is_empty(),
            distinct_on,
            group_by,
            limit: query
                .limit
                .map(|l| usize::try_from(l).unwrap_or(usize::MAX)),
            offset: usize::try_from(query.offset).unwrap_or(usize::MAX),
            aggregate_mode,
        })
    }

    fn compile_node(&self, node: &QueryNode, clause: Clause) -> PlannerResult<Expr> {
        match node {
            QueryNode::Col { alias, column } => {
                let alias = alias.as_deref().unwrap_or(&self.base_alias);
                Ok(Expr::Column(ColumnRef::new(alias, column.as_str())))
            }
            QueryNode::Value { value } => compile_literal(value),
            QueryNode::Ref { name } => Err(PlannerError::unsupported_query(format!(
                "alias reference '{}' is only supported in order_by",
                name
            ))),
            QueryNode::Star => Err(PlannerError::unsupported_expression("expression", "*")),
            QueryNode::Lookup { lookup, lhs, rhs } => {
                let op = LookupOp::from_name(lookup)
                    .ok_or_else(|| PlannerError::unsupported_expression("lookup", lookup))?;
                let lhs = self.compile_node(lhs, clause)?;
                let rhs = self.compile_node(rhs, clause)?;
                check_lookup_operand(op, lookup, &rhs)?;
                Ok(Expr::Lookup {
                    op,
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                })
            }
            QueryNode::Combined {
                connector,
                lhs,
                rhs,
            } => {
                let op = ArithOp::from_symbol(connector)
                    .ok_or_else(|| PlannerError::unsupported_expression("connector", connector))?;
                Ok(Expr::Arithmetic {
                    op,
                    lhs: Box::new(self.compile_node(lhs, clause)?),
                    rhs: Box::new(self.compile_node(rhs, clause)?),
                })
            }
            QueryNode::Extract { part, lhs } => {
                let part = DatePart::from_name(part)
                    .ok_or_else(|| PlannerError::unsupported_expression("date part", part))?;
                Ok(Expr::Extract {
                    part,
                    operand: Box::new(self.compile_node(lhs, clause)?),
                })
            }
            QueryNode::Aggregate {
                function,
                distinct,
                args,
            } => self.compile_aggregate(function, *distinct, args, clause),
            QueryNode::Where {
                connector,
                negated,
                children,
            } => {
                let connector = Connector::from_name(connector)
                    .ok_or_else(|| PlannerError::unsupported_expression("connector", connector))?;
                let children = children
                    .iter()
                    .map(|child| self.compile_node(child, clause))
                    .collect::<PlannerResult<Vec<_>>>()?;
                Ok(Expr::Group {
                    connector,
                    negated: *negated,
                    children,
                })
            }
            QueryNode::Subquery { .. } => {
                Err(PlannerError::unsupported_query("subqueries are not supported"))
            }
        }
    }

    fn compile_aggregate(
        &self,
        function: &str,
        distinct: bool,
        args: &[QueryNode],
        clause: Clause,
    ) -> PlannerResult<Expr> {
        match clause {
            Clause::AggregateArg => {
                return Err(PlannerError::unsupported_query(
                    "nested aggregates are not supported",
                ))
            }
            Clause::Filter => {
                return Err(PlannerError::unsupported_query(
                    "aggregates in the filter require HAVING, which is not supported",
                ))
            }
            c if !c.allows_aggregates() => {
                return Err(PlannerError::unsupported_query(format!(
                    "aggregates are not allowed in {:?}",
                    c
                )))
            }
            _ => {}
        }

        let func = AggregateFunc::from_name(function)
            .ok_or_else(|| PlannerError::unsupported_expression("aggregate", function))?;
        let arg = match args {
            [] | [QueryNode::Star] => {
                if func != AggregateFunc::Count {
                    return Err(PlannerError::query_invalid(format!(
                        "{} requires an argument",
                        function
                    )));
                }
                if distinct {
                    return Err(PlannerError::query_invalid(
                        "count(distinct *) needs a column argument",
                    ));
                }
                None
            }
            [arg] => Some(Box::new(self.compile_node(arg, Clause::AggregateArg)?)),
            _ => {
                return Err(PlannerError::unsupported_expression(
                    "aggregate",
                    format!("{} with {} arguments", function, args.len()),
                ))
            }
        };

        Ok(Expr::Aggregate(Aggregate {
            func,
            distinct,
            arg,
        }))
    }

    /// Aggregates over a dependent alias fold per base row; aggregates
    /// touching only the base alias fold over the whole result.
    fn is_dependent(&self, aggregate: &Aggregate, has_joins: bool) -> bool {
        match &aggregate.arg {
            None => has_joins,
            Some(arg) => {
                let mut any_column = false;
                let mut dependent = false;
                arg.for_each_column(&mut |col| {
                    any_column = true;
                    dependent |= col.alias != self.base_alias;
                });
                dependent || (!any_column && has_joins)
            }
        }
    }

    fn aggregate_mode(
        &self,
        columns: &[SelectColumn],
        order_by: &[OrderKey],
        distinct_on: &[Expr],
        has_joins: bool,
    ) -> PlannerResult<AggregateMode> {
        let order_exprs = order_by.iter().filter_map(|key| match &key.target {
            OrderTarget::Expr(expr) => Some(expr),
            OrderTarget::Output(_) => None,
        });
        let exprs: Vec<&Expr> = columns
            .iter()
            .map(|c| &c.expr)
            .chain(order_exprs)
            .chain(distinct_on.iter())
            .collect();

        let aggregates: Vec<&Aggregate> = exprs.iter().flat_map(|e| e.aggregates()).collect();
        if aggregates.is_empty() {
            return Ok(AggregateMode::None);
        }
        let plain: Vec<&ColumnRef> = exprs.iter().flat_map(|e| e.plain_columns()).collect();
        let any_base_aggregate = aggregates.iter().any(|a| !self.is_dependent(a, has_joins));
        let any_dependent_aggregate = aggregates.iter().any(|a| self.is_dependent(a, has_joins));

        if any_base_aggregate && !plain.is_empty() {
            return Err(PlannerError::unsupported_query(
                "base-table aggregates mixed with plain columns are not supported",
            ));
        }
        if !any_dependent_aggregate {
            return Ok(AggregateMode::WholeTable);
        }
        if let Some(col) = plain.iter().find(|c| c.alias != self.base_alias) {
            return Err(PlannerError::unsupported_query(format!(
                "column '{}.{}' mixed with aggregates over dependent tables",
                col.alias, col.field
            )));
        }
        Ok(AggregateMode::PerBaseRow)
    }
}

fn compile_from(from: &[FromItem]) -> PlannerResult<Vec<TableSource>> {
    if from.is_empty() {
        return Err(PlannerError::unsupported_query("query has no from clause"));
    }

    let mut tables: Vec<TableSource> = Vec::with_capacity(from.len());
    for (i, item) in from.iter().enumerate() {
        let alias = item.alias().to_lowercase();
        if tables.iter().any(|t| t.alias == alias) {
            return Err(PlannerError::query_invalid(format!(
                "duplicate table alias '{}'",
                alias
            )));
        }

        let join = match (&item.join, i) {
            (None, 0) => None,
            (None, _) => {
                return Err(PlannerError::unsupported_query(
                    "more than one base table is not supported",
                ))
            }
            (Some(_), 0) => {
                return Err(PlannerError::unsupported_query(
                    "the first from-clause entry must be the base table",
                ))
            }
            (Some(join), _) => {
                let join_type = join.join_type.to_ascii_uppercase();
                if join_type != "INNER" && join_type != "INNER JOIN" {
                    return Err(PlannerError::unsupported_query(format!(
                        "{} joins are not supported",
                        join.join_type
                    )));
                }
                if join.extra_condition.is_some() || join.pairs.is_empty() {
                    return Err(PlannerError::unsupported_query(
                        "non-equality joins are not supported",
                    ));
                }
                let parent_alias = join.parent_alias.to_lowercase();
                if !tables.iter().any(|t| t.alias == parent_alias) {
                    return Err(PlannerError::unsupported_query(format!(
                        "join parent '{}' is not declared before '{}'",
                        parent_alias, alias
                    )));
                }
                Some(JoinSpec {
                    parent_alias,
                    pairs: join.pairs.clone(),
                })
            }
        };

        tables.push(TableSource {
            alias,
            table: item.table.clone(),
            join,
        });
    }
    Ok(tables)
}

fn compile_literal(value: &serde_json::Value) -> PlannerResult<Expr> {
    if let serde_json::Value::Array(items) = value {
        let list = items
            .iter()
            .map(|item| {
                CellValue::from_json(item)
                    .ok_or_else(|| PlannerError::query_invalid("list literals must hold scalars"))
            })
            .collect::<PlannerResult<Vec<_>>>()?;
        return Ok(Expr::List(list));
    }
    CellValue::from_json(value)
        .map(Expr::Literal)
        .ok_or_else(|| PlannerError::query_invalid("object literals are not supported"))
}

fn check_lookup_operand(op: LookupOp, name: &str, rhs: &Expr) -> PlannerResult<()> {
    match (op, rhs) {
        (LookupOp::In, Expr::List(_)) => Ok(()),
        (LookupOp::Range, Expr::List(bounds)) if bounds.len() == 2 => Ok(()),
        (LookupOp::In | LookupOp::Range, _) => Err(PlannerError::query_invalid(format!(
            "'{}' requires a list operand{}",
            name,
            if op == LookupOp::Range { " of two bounds" } else { "" }
        ))),
        (LookupOp::IsNull, Expr::Literal(CellValue::Bool(_))) => Ok(()),
        (LookupOp::IsNull, _) => Err(PlannerError::query_invalid(
            "'isnull' requires a boolean operand",
        )),
        (_, Expr::List(_)) => Err(PlannerError::query_invalid(format!(
            "'{}' does not accept a list operand",
            name
        ))),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::errors::PlannerErrorCode;
    use serde_json::json;

    fn people() -> QueryDescription {
        QueryDescription::from_table("p", "people")
    }

    fn rejected(query: &QueryDescription) -> PlannerErrorCode {
        compile(query).unwrap_err().code()
    }

    #[test]
    fn test_compile_simple_select() {
        let query = people()
            .select(QueryNode::col("P", "name"))
            .select(QueryNode::combined(
                "+",
                QueryNode::col("p", "hire_year"),
                QueryNode::value(1),
            ))
            .filter(QueryNode::lookup(
                "exact",
                QueryNode::col("p", "hire_year"),
                QueryNode::value(2021),
            ))
            .order_by(QueryNode::col("p", "name"), false)
            .limit(5);

        let selector = compile(&query).unwrap();
        assert_eq!(selector.column_names(), vec!["name", "col2"]);
        assert_eq!(selector.base().alias, "p");
        assert!(selector.dependents().is_empty());
        assert!(selector.filter_on_base);
        assert_eq!(selector.limit, Some(5));
        assert_eq!(selector.aggregate_mode, AggregateMode::None);
        assert_eq!(
            selector.columns[0].expr,
            Expr::Column(ColumnRef::new("p", "name"))
        );
    }

    #[test]
    fn test_missing_alias_means_base() {
        let query = people().select(QueryNode::Col {
            alias: None,
            column: "name".into(),
        });
        let selector = compile(&query).unwrap();
        assert_eq!(
            selector.columns[0].expr,
            Expr::Column(ColumnRef::new("p", "name"))
        );
    }

    #[test]
    fn test_join_compiles_in_declared_order() {
        let query = QueryDescription::from_table("c", "customers")
            .join("o", "orders", "c", vec![("id", "customer_id")])
            .join("i", "items", "o", vec![("id", "order_id")])
            .select(QueryNode::col("i", "sku"))
            .filter(QueryNode::lookup(
                "gt",
                QueryNode::col("o", "total"),
                QueryNode::value(10),
            ));

        let selector = compile(&query).unwrap();
        let aliases: Vec<_> = selector.tables.iter().map(|t| t.alias.as_str()).collect();
        assert_eq!(aliases, vec!["c", "o", "i"]);
        assert_eq!(
            selector.tables[2].join.as_ref().unwrap().parent_alias,
            "o"
        );
        assert!(!selector.filter_on_base);
    }

    #[test]
    fn test_order_by_reference() {
        let query = people()
            .select_as("who", QueryNode::col("p", "name"))
            .order_by(QueryNode::reference("WHO"), true);
        let selector = compile(&query).unwrap();
        assert_eq!(selector.order_by[0].target, OrderTarget::Output(0));
        assert!(selector.order_by[0].descending);

        let bad = people()
            .select(QueryNode::col("p", "name"))
            .order_by(QueryNode::reference("missing"), false);
        assert_eq!(rejected(&bad), PlannerErrorCode::QueryInvalid);
    }

    #[test]
    fn test_aggregate_modes() {
        let count_orders = QueryDescription::from_table("c", "customers")
            .join("o", "orders", "c", vec![("id", "customer_id")])
            .select(QueryNode::col("c", "name"))
            .select(QueryNode::aggregate("count", vec![QueryNode::Star]));
        assert_eq!(
            compile(&count_orders).unwrap().aggregate_mode,
            AggregateMode::PerBaseRow
        );

        let total = people().select(QueryNode::aggregate(
            "sum",
            vec![QueryNode::col("p", "hire_year")],
        ));
        assert_eq!(
            compile(&total).unwrap().aggregate_mode,
            AggregateMode::WholeTable
        );
    }

    #[test]
    fn test_rejects_unsupported_queries() {
        let base_only = || people().select(QueryNode::col("p", "name"));

        let mut no_from = base_only();
        no_from.from.clear();
        assert_eq!(rejected(&no_from), PlannerErrorCode::UnsupportedQuery);

        let mut two_bases = base_only();
        two_bases.from.push(FromItem {
            alias: Some("q".into()),
            table: "other".into(),
            join: None,
        });
        assert_eq!(rejected(&two_bases), PlannerErrorCode::UnsupportedQuery);

        let mut outer = base_only().join("o", "orders", "p", vec![("id", "person_id")]);
        outer.from[1].join.as_mut().unwrap().join_type = "LEFT OUTER".into();
        assert_eq!(rejected(&outer), PlannerErrorCode::UnsupportedQuery);

        let mut non_equality = base_only().join("o", "orders", "p", vec![]);
        assert_eq!(rejected(&non_equality), PlannerErrorCode::UnsupportedQuery);
        non_equality.from[1].join.as_mut().unwrap().pairs = vec![("id".into(), "pid".into())];
        non_equality.from[1].join.as_mut().unwrap().extra_condition = Some(QueryNode::value(true));
        assert_eq!(rejected(&non_equality), PlannerErrorCode::UnsupportedQuery);

        let forward = base_only().join("o", "orders", "x", vec![("id", "person_id")]);
        assert_eq!(rejected(&forward), PlannerErrorCode::UnsupportedQuery);

        let duplicate = base_only().join("p", "orders", "p", vec![("id", "person_id")]);
        assert_eq!(rejected(&duplicate), PlannerErrorCode::QueryInvalid);

        let mut grouped_distinct = base_only();
        grouped_distinct.group_by = vec![QueryNode::col("p", "name")];
        grouped_distinct.distinct_fields = vec![QueryNode::col("p", "name")];
        assert_eq!(rejected(&grouped_distinct), PlannerErrorCode::UnsupportedQuery);

        let mut having = base_only();
        having.having = Some(QueryNode::value(true));
        assert_eq!(rejected(&having), PlannerErrorCode::UnsupportedQuery);

        let mut union = base_only();
        union.combinator = Some("union".into());
        assert_eq!(rejected(&union), PlannerErrorCode::UnsupportedQuery);

        let subquery = base_only().filter(QueryNode::lookup(
            "in",
            QueryNode::col("p", "id"),
            QueryNode::Subquery { query: json!({}) },
        ));
        assert_eq!(rejected(&subquery), PlannerErrorCode::UnsupportedQuery);
    }

    #[test]
    fn test_rejects_misplaced_aggregates() {
        let in_filter = people()
            .select(QueryNode::col("p", "name"))
            .filter(QueryNode::lookup(
                "gt",
                QueryNode::aggregate("count", vec![]),
                QueryNode::value(1),
            ));
        assert_eq!(rejected(&in_filter), PlannerErrorCode::UnsupportedQuery);

        let nested = people().select(QueryNode::aggregate(
            "sum",
            vec![QueryNode::aggregate("count", vec![])],
        ));
        assert_eq!(rejected(&nested), PlannerErrorCode::UnsupportedQuery);

        let mixed_base = people()
            .select(QueryNode::col("p", "name"))
            .select(QueryNode::aggregate("max", vec![QueryNode::col("p", "hire_year")]));
        assert_eq!(rejected(&mixed_base), PlannerErrorCode::UnsupportedQuery);

        let mixed_dependent = QueryDescription::from_table("c", "customers")
            .join("o", "orders", "c", vec![("id", "customer_id")])
            .select(QueryNode::col("o", "total"))
            .select(QueryNode::aggregate("count", vec![QueryNode::Star]));
        assert_eq!(rejected(&mixed_dependent), PlannerErrorCode::UnsupportedQuery);

        let mut grouped_dependent = people().select(QueryNode::col("p", "name"));
        grouped_dependent = grouped_dependent.join("o", "orders", "p", vec![("id", "pid")]);
        grouped_dependent.group_by = vec![QueryNode::col("o", "pid")];
        assert_eq!(rejected(&grouped_dependent), PlannerErrorCode::UnsupportedQuery);
    }

    #[test]
    fn test_rejects_unknown_expression_kinds() {
        let regex = people().select(QueryNode::col("p", "name")).filter(QueryNode::lookup(
            "regex",
            QueryNode::col("p", "name"),
            QueryNode::value("^A"),
        ));
        assert_eq!(rejected(&regex), PlannerErrorCode::UnsupportedExpression);

        let week_day = people().select(QueryNode::extract("week_day", QueryNode::col("p", "d")));
        assert_eq!(rejected(&week_day), PlannerErrorCode::UnsupportedExpression);

        let stddev = people().select(QueryNode::aggregate("stddev", vec![QueryNode::col("p", "x")]));
        assert_eq!(rejected(&stddev), PlannerErrorCode::UnsupportedExpression);

        let xor_group = people().select(QueryNode::col("p", "name")).filter(QueryNode::Where {
            connector: "XOR".into(),
            negated: false,
            children: vec![],
        });
        assert_eq!(rejected(&xor_group), PlannerErrorCode::UnsupportedExpression);
    }

    #[test]
    fn test_lookup_operand_shapes() {
        let bad_range = people().select(QueryNode::col("p", "name")).filter(QueryNode::lookup(
            "range",
            QueryNode::col("p", "hire_year"),
            QueryNode::value(json!([2020])),
        ));
        assert_eq!(rejected(&bad_range), PlannerErrorCode::QueryInvalid);

        let good_in = people().select(QueryNode::col("p", "name")).filter(QueryNode::lookup(
            "in",
            QueryNode::col("p", "hire_year"),
            QueryNode::value(json!([2020, 2021])),
        ));
        let selector = compile(&good_in).unwrap();
        assert!(matches!(
            selector.filter,
            Some(Expr::Lookup { op: LookupOp::In, .. })
        ));
    }
}
