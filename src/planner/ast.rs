//! Query description AST
//!
//! The abstract, already-validated query handed to the planner by the
//! query-builder layer. It is plain serde data so it can arrive as JSON:
//!
//! ```json
//! {
//!   "select": [{"expr": {"node": "col", "alias": "p", "column": "name"}}],
//!   "from": [{"alias": "p", "table": "people"}],
//!   "filter": {"node": "lookup", "lookup": "exact",
//!              "lhs": {"node": "col", "alias": "p", "column": "hire_year"},
//!              "rhs": {"node": "value", "value": 2021}},
//!   "order_by": [{"expr": {"node": "col", "alias": "p", "column": "name"}}]
//! }
//! ```
//!
//! Names inside nodes (lookups, connectors, functions, date parts) stay
//! strings here. The compiler turns them into closed enums and rejects
//! anything it does not know.

use serde::{Deserialize, Serialize};

/// One node of a select, filter or ordering expression
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "node", rename_all = "snake_case")]
pub enum QueryNode {
    /// Column reference; a missing alias means the base table
    Col {
        #[serde(default)]
        alias: Option<String>,
        column: String,
    },
    /// Literal scalar, or a list of scalars for `in` / `range`
    Value { value: serde_json::Value },
    /// Reference to a select item by output alias (order-by only)
    Ref { name: String },
    /// `*`, only meaningful as the argument of `count`
    Star,
    /// Binary comparison, e.g. `exact`, `gt`, `icontains`
    Lookup {
        lookup: String,
        lhs: Box<QueryNode>,
        rhs: Box<QueryNode>,
    },
    /// Arithmetic combination, e.g. `+`, `**`, `<<`
    Combined {
        connector: String,
        lhs: Box<QueryNode>,
        rhs: Box<QueryNode>,
    },
    /// Date-part extraction
    Extract { part: String, lhs: Box<QueryNode> },
    /// Aggregate call
    Aggregate {
        function: String,
        #[serde(default)]
        distinct: bool,
        #[serde(default)]
        args: Vec<QueryNode>,
    },
    /// AND/OR group with negation flag
    Where {
        connector: String,
        #[serde(default)]
        negated: bool,
        #[serde(default)]
        children: Vec<QueryNode>,
    },
    /// Nested query; never supported
    Subquery {
        #[serde(default)]
        query: serde_json::Value,
    },
}

impl QueryNode {
    /// Column on an explicit alias
    pub fn col(alias: impl Into<String>, column: impl Into<String>) -> Self {
        QueryNode::Col {
            alias: Some(alias.into()),
            column: column.into(),
        }
    }

    /// Literal value
    pub fn value(value: impl Into<serde_json::Value>) -> Self {
        QueryNode::Value {
            value: value.into(),
        }
    }

    pub fn reference(name: impl Into<String>) -> Self {
        QueryNode::Ref { name: name.into() }
    }

    pub fn lookup(lookup: impl Into<String>, lhs: QueryNode, rhs: QueryNode) -> Self {
        QueryNode::Lookup {
            lookup: lookup.into(),
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    pub fn combined(connector: impl Into<String>, lhs: QueryNode, rhs: QueryNode) -> Self {
        QueryNode::Combined {
            connector: connector.into(),
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    pub fn extract(part: impl Into<String>, lhs: QueryNode) -> Self {
        QueryNode::Extract {
            part: part.into(),
            lhs: Box::new(lhs),
        }
    }

    pub fn aggregate(function: impl Into<String>, args: Vec<QueryNode>) -> Self {
        QueryNode::Aggregate {
            function: function.into(),
            distinct: false,
            args,
        }
    }

    pub fn aggregate_distinct(function: impl Into<String>, args: Vec<QueryNode>) -> Self {
        QueryNode::Aggregate {
            function: function.into(),
            distinct: true,
            args,
        }
    }

    pub fn and(children: Vec<QueryNode>) -> Self {
        QueryNode::Where {
            connector: "AND".into(),
            negated: false,
            children,
        }
    }

    pub fn or(children: Vec<QueryNode>) -> Self {
        QueryNode::Where {
            connector: "OR".into(),
            negated: false,
            children,
        }
    }

    /// Negated AND group around `children`
    pub fn not(children: Vec<QueryNode>) -> Self {
        QueryNode::Where {
            connector: "AND".into(),
            negated: true,
            children,
        }
    }
}

/// One select-list entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectItem {
    /// Output alias; defaults to the column name, or `col<n>`
    #[serde(default)]
    pub alias: Option<String>,
    pub expr: QueryNode,
}

/// Join edge from a dependent table to an earlier alias
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinClause {
    pub parent_alias: String,
    #[serde(default = "default_join_type")]
    pub join_type: String,
    /// (parent column, child column) equality pairs
    #[serde(default)]
    pub pairs: Vec<(String, String)>,
    /// Extra non-equality condition; never supported
    #[serde(default)]
    pub extra_condition: Option<QueryNode>,
}

fn default_join_type() -> String {
    "INNER".to_string()
}

/// One from-clause entry.
///
/// The entry without a join is the base table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FromItem {
    /// Alias; defaults to the table name
    #[serde(default)]
    pub alias: Option<String>,
    pub table: String,
    #[serde(default)]
    pub join: Option<JoinClause>,
}

impl FromItem {
    /// Alias the item is referenced by
    pub fn alias(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.table)
    }
}

/// One order-by entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    pub expr: QueryNode,
    #[serde(default)]
    pub descending: bool,
}

/// The abstract relational query
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryDescription {
    #[serde(default)]
    pub select: Vec<SelectItem>,
    #[serde(default)]
    pub from: Vec<FromItem>,
    #[serde(default)]
    pub filter: Option<QueryNode>,
    #[serde(default)]
    pub order_by: Vec<OrderItem>,
    #[serde(default)]
    pub distinct: bool,
    #[serde(default)]
    pub distinct_fields: Vec<QueryNode>,
    #[serde(default)]
    pub group_by: Vec<QueryNode>,
    #[serde(default)]
    pub having: Option<QueryNode>,
    /// UNION / INTERSECT / EXCEPT; never supported
    #[serde(default)]
    pub combinator: Option<String>,
    #[serde(default)]
    pub limit: Option<u64>,
    #[serde(default)]
    pub offset: u64,
}

impl QueryDescription {
    /// Query over a single base table
    pub fn from_table(alias: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            from: vec![FromItem {
                alias: Some(alias.into()),
                table: table.into(),
                join: None,
            }],
            ..Default::default()
        }
    }

    /// Adds an inner equality join
    pub fn join(
        mut self,
        alias: impl Into<String>,
        table: impl Into<String>,
        parent_alias: impl Into<String>,
        pairs: Vec<(&str, &str)>,
    ) -> Self {
        self.from.push(FromItem {
            alias: Some(alias.into()),
            table: table.into(),
            join: Some(JoinClause {
                parent_alias: parent_alias.into(),
                join_type: default_join_type(),
                pairs: pairs
                    .into_iter()
                    .map(|(p, c)| (p.to_string(), c.to_string()))
                    .collect(),
                extra_condition: None,
            }),
        });
        self
    }

    pub fn select(mut self, expr: QueryNode) -> Self {
        self.select.push(SelectItem { alias: None, expr });
        self
    }

    pub fn select_as(mut self, alias: impl Into<String>, expr: QueryNode) -> Self {
        self.select.push(SelectItem {
            alias: Some(alias.into()),
            expr,
        });
        self
    }

    pub fn filter(mut self, filter: QueryNode) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn order_by(mut self, expr: QueryNode, descending: bool) -> Self {
        self.order_by.push(OrderItem { expr, descending });
        self
    }

    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = offset;
        self
    }
}
