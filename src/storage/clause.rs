//! Clause builder - descriptors to SQL fragments
//!
//! Descriptors that reference a property missing from the table schema, or
//! that ask for something SQL cannot express here (nested roots, unknown
//! sort directions), are dropped silently. Callers may pass speculative
//! descriptors without risking an error.
//!
//! Filter values are never spliced into the SQL text; they are bound as
//! parameters in clause order.

use serde_json::Value;
use crate::model::{FilterDescriptor, GrouperDescriptor, SortDirection, SorterDescriptor};
use super::codec::bool_text;
use super::connection::SqlValue;
use super::schema::{quote_ident, ColumnSchema, TableSchema};

/// A WHERE clause with its bound parameters
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WhereClause {
    pub sql: String,
    pub params: Vec<SqlValue>,
    inline: String,
}

impl WhereClause {
    pub fn is_empty(&self) -> bool {
        self.sql.is_empty()
    }

    /// The clause with literals substituted for placeholders.
    ///
    /// For logs and diagnostics only; queries always run the parameterized form.
    pub fn to_inline_sql(&self) -> &str {
        &self.inline
    }
}

/// Build `WHERE ...` from `filters`
pub fn build_where(filters: &[FilterDescriptor], schema: &TableSchema) -> WhereClause {
    let mut clause = WhereClause::default();

    for filter in filters {
        let Some(column) = schema.column(&filter.property) else {
            tracing::debug!("Dropping filter on unknown property {}", filter.property);
            continue;
        };

        let lead = if clause.sql.is_empty() { "WHERE\n     " } else { "\n  AND " };
        let operator = filter_operator(filter, column);
        let (param, literal) = filter_literal(filter, column);
        let target = format!("{}{} {}", lead, quote_ident(&column.name), operator);

        clause.sql.push_str(&format!("{target} ?"));
        clause.inline.push_str(&format!("{target} {literal}"));
        clause.params.push(param);
    }

    clause
}

fn filter_operator<'a>(filter: &'a FilterDescriptor, column: &ColumnSchema) -> &'a str {
    match filter.operator.as_deref().map(str::trim) {
        Some(op) if !op.is_empty() => op,
        _ if column.is_text() && !filter.case_sensitive => "LIKE",
        _ => "=",
    }
}

/// Bound value and its inline rendering for one filter
fn filter_literal(filter: &FilterDescriptor, column: &ColumnSchema) -> (SqlValue, String) {
    if column.is_text() {
        let text = match &filter.value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        let text = if filter.exact_match { text } else { format!("%{text}%") };
        let literal = quote_literal(&text);
        return (SqlValue::Text(text), literal);
    }

    if column.is_boolean() {
        let text = bool_text(is_truthy(&filter.value));
        return (SqlValue::Text(text.to_string()), quote_literal(text));
    }

    match &filter.value {
        Value::Null => (SqlValue::Null, "NULL".to_string()),
        Value::Bool(b) => (SqlValue::Integer(i64::from(*b)), i64::from(*b).to_string()),
        Value::Number(n) => match n.as_i64() {
            Some(i) => (SqlValue::Integer(i), i.to_string()),
            None => {
                let f = n.as_f64().unwrap_or_default();
                (SqlValue::Real(f), f.to_string())
            }
        },
        Value::String(s) => (SqlValue::Text(s.clone()), quote_literal(s)),
        other => {
            let text = other.to_string();
            let literal = quote_literal(&text);
            (SqlValue::Text(text), literal)
        }
    }
}

fn quote_literal(text: &str) -> String {
    format!("'{}'", text.replace('\'', "''"))
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Build `ORDER BY ...` from `sorters`; empty when none survive
pub fn build_order_by(sorters: &[SorterDescriptor], schema: &TableSchema) -> String {
    let orders: Vec<String> = sorters
        .iter()
        .filter_map(|sorter| {
            if schema.column(&sorter.property).is_none() || sorter.root.is_some() {
                tracing::debug!("Dropping sorter on {}", sorter.property);
                return None;
            }
            let Some(direction) = SortDirection::parse(&sorter.direction) else {
                tracing::debug!("Dropping sorter with direction {}", sorter.direction);
                return None;
            };
            Some(format!("{} {}", quote_ident(&sorter.property), direction.as_str()))
        })
        .collect();

    if orders.is_empty() {
        return String::new();
    }
    format!("ORDER BY\n  {}", orders.join(",\n  "))
}

/// Build `GROUP BY ...` from `groupers`; empty when none survive
pub fn build_group_by(groupers: &[GrouperDescriptor], schema: &TableSchema) -> String {
    let groups: Vec<String> = groupers
        .iter()
        .filter(|g| schema.column(&g.property).is_some() && g.root.is_none())
        .map(|g| quote_ident(&g.property))
        .collect();

    if groups.is_empty() {
        return String::new();
    }
    format!("GROUP BY\n  {}", groups.join(",\n  "))
}

/// Build `LIMIT [start,] [limit]`
pub fn build_limit(limit: Option<u64>, start: Option<u64>) -> String {
    match (start, limit) {
        (None, None) => String::new(),
        (None, Some(limit)) => format!("LIMIT {limit}"),
        (Some(start), Some(limit)) => format!("LIMIT {start}, {limit}"),
        // SQLite needs a row count; -1 means no upper bound
        (Some(start), None) => format!("LIMIT {start}, -1"),
    }
}

/// A complete read query
#[derive(Debug, Clone, PartialEq)]
pub struct SelectQuery {
    pub sql: String,
    pub params: Vec<SqlValue>,
}

/// `SELECT rowid, * FROM table [WHERE] [GROUP BY] [ORDER BY] [LIMIT]`
pub fn build_select(
    schema: &TableSchema,
    filters: &[FilterDescriptor],
    groupers: &[GrouperDescriptor],
    sorters: &[SorterDescriptor],
    limit: Option<u64>,
    start: Option<u64>,
) -> SelectQuery {
    let where_clause = build_where(filters, schema);
    let mut sql = format!("SELECT rowid, * FROM {}", schema.quoted_table());

    for fragment in [
        where_clause.sql.clone(),
        build_group_by(groupers, schema),
        build_order_by(sorters, schema),
        build_limit(limit, start),
    ] {
        if !fragment.is_empty() {
            sql.push('\n');
            sql.push_str(&fragment);
        }
    }

    SelectQuery {
        sql,
        params: where_clause.params,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FieldDescriptor, LogicalType, Model};
    use serde_json::json;

    fn schema() -> TableSchema {
        let model = Model::new(
            "id",
            vec![
                FieldDescriptor::new("id", LogicalType::Int),
                FieldDescriptor::new("name", LogicalType::String),
                FieldDescriptor::new("age", LogicalType::Int),
                FieldDescriptor::new("active", LogicalType::Boolean),
            ],
        );
        TableSchema::new("people", model.fields())
    }

    #[test]
    fn test_where_substring_like() {
        let clause = build_where(&[FilterDescriptor::new("name", "Jo")], &schema());
        assert_eq!(clause.sql, "WHERE\n     `name` LIKE ?");
        assert_eq!(clause.params, vec![SqlValue::Text("%Jo%".into())]);
        assert_eq!(clause.to_inline_sql(), "WHERE\n     `name` LIKE '%Jo%'");
    }

    #[test]
    fn test_where_operator_selection() {
        let filters = vec![
            FilterDescriptor::new("name", "Jo").exact().case_sensitive(),
            FilterDescriptor::new("age", 30),
            FilterDescriptor::new("age", 18).with_operator(">="),
            FilterDescriptor::new("active", true),
        ];
        let clause = build_where(&filters, &schema());
        assert_eq!(
            clause.to_inline_sql(),
            "WHERE\n     `name` = 'Jo'\n  AND `age` = 30\n  AND `age` >= 18\n  AND `active` = 'true'"
        );
        assert_eq!(
            clause.params,
            vec![
                SqlValue::Text("Jo".into()),
                SqlValue::Integer(30),
                SqlValue::Integer(18),
                SqlValue::Text("true".into()),
            ]
        );
    }

    #[test]
    fn test_where_ignores_unknown_properties() {
        let base = vec![FilterDescriptor::new("name", "Jo")];
        let mut noisy = base.clone();
        noisy.insert(0, FilterDescriptor::new("nickname", "J"));
        noisy.push(FilterDescriptor::new("id", 1));

        assert_eq!(build_where(&noisy, &schema()), build_where(&base, &schema()));
        assert!(build_where(&[FilterDescriptor::new("ghost", 1)], &schema()).is_empty());
    }

    #[test]
    fn test_where_quotes_are_bound_not_spliced() {
        let clause = build_where(&[FilterDescriptor::new("name", "O'Brien").exact()], &schema());
        assert_eq!(clause.sql, "WHERE\n     `name` LIKE ?");
        assert_eq!(clause.params, vec![SqlValue::Text("O'Brien".into())]);
        assert_eq!(clause.to_inline_sql(), "WHERE\n     `name` LIKE 'O''Brien'");
    }

    #[test]
    fn test_order_by() {
        assert_eq!(
            build_order_by(&[SorterDescriptor::asc("name")], &schema()),
            "ORDER BY\n  `name` ASC"
        );
        assert_eq!(
            build_order_by(&[SorterDescriptor::new("name", "SIDEWAYS")], &schema()),
            ""
        );
        assert_eq!(
            build_order_by(
                &[
                    SorterDescriptor::desc("age"),
                    SorterDescriptor::asc("ghost"),
                    SorterDescriptor::asc("name").with_root("data"),
                    SorterDescriptor::asc("name"),
                ],
                &schema()
            ),
            "ORDER BY\n  `age` DESC,\n  `name` ASC"
        );
    }

    #[test]
    fn test_group_by() {
        let groupers = vec![
            GrouperDescriptor::from("age"),
            GrouperDescriptor::new("name").with_root("data"),
            GrouperDescriptor::from("ghost"),
        ];
        assert_eq!(build_group_by(&groupers, &schema()), "GROUP BY\n  `age`");
        assert_eq!(build_group_by(&[], &schema()), "");
    }

    #[test]
    fn test_limit() {
        assert_eq!(build_limit(None, None), "");
        assert_eq!(build_limit(Some(10), None), "LIMIT 10");
        assert_eq!(build_limit(Some(10), Some(20)), "LIMIT 20, 10");
        assert_eq!(build_limit(None, Some(5)), "LIMIT 5, -1");
    }

    #[test]
    fn test_select_clause_order() {
        let query = build_select(
            &schema(),
            &[FilterDescriptor::new("name", json!("Jo"))],
            &[GrouperDescriptor::from("age")],
            &[SorterDescriptor::asc("name")],
            Some(5),
            Some(0),
        );
        assert_eq!(
            query.sql,
            "SELECT rowid, * FROM `people`\nWHERE\n     `name` LIKE ?\nGROUP BY\n  `age`\nORDER BY\n  `name` ASC\nLIMIT 0, 5"
        );
        assert_eq!(query.params.len(), 1);

        let bare = build_select(&schema(), &[], &[], &[], None, None);
        assert_eq!(bare.sql, "SELECT rowid, * FROM `people`");
    }
}
