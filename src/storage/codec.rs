//! Record codec - records to bound column values, plus the write statements
//!
//! Only fields with a defined value are written, so an INSERT or UPDATE
//! touches exactly the columns the record carries. Fields flagged for the
//! opaque codec are stored as JSON text.

use serde_json::Value;
use crate::model::Record;
use crate::operation::OperationKind;
use crate::Result;
use super::connection::{SqlValue, Tx};
use super::schema::{quote_ident, ColumnSchema, TableSchema};

/// Convert one field value into the value bound for `column`
pub fn to_sql_value(value: &Value, column: &ColumnSchema) -> Result<SqlValue> {
    if column.requires_opaque_codec {
        return Ok(SqlValue::Text(serde_json::to_string(value)?));
    }

    Ok(match value {
        Value::Null => SqlValue::Null,
        // Same encodings the clause builder binds for filters on this column
        Value::Bool(b) if column.is_boolean() || column.is_text() => SqlValue::Text(bool_text(*b).to_string()),
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Number(n) => match n.as_i64() {
            Some(i) => SqlValue::Integer(i),
            None => SqlValue::Real(n.as_f64().unwrap_or_default()),
        },
        Value::String(s) => SqlValue::Text(s.clone()),
        // Structured values without the opaque flag still need a text form
        Value::Array(_) | Value::Object(_) => SqlValue::Text(serde_json::to_string(value)?),
    })
}

/// Text form of a boolean, as stored and as matched by filters
pub fn bool_text(b: bool) -> &'static str {
    if b { "true" } else { "false" }
}

/// Column/value pairs for every schema column the record defines, in schema order
pub fn to_row(record: &Record, schema: &TableSchema) -> Result<Vec<(String, SqlValue)>> {
    let mut row = Vec::new();
    for column in schema.columns() {
        if let Some(value) = record.get(&column.name) {
            row.push((column.name.clone(), to_sql_value(value, column)?));
        }
    }
    Ok(row)
}

/// A statement with its bound parameters
#[derive(Debug, Clone, PartialEq)]
pub struct WriteStatement {
    pub sql: String,
    pub params: Vec<SqlValue>,
}

pub fn insert_statement(record: &Record, schema: &TableSchema) -> Result<WriteStatement> {
    let row = to_row(record, schema)?;
    if row.is_empty() {
        return Ok(WriteStatement {
            sql: format!("INSERT INTO {} DEFAULT VALUES", schema.quoted_table()),
            params: Vec::new(),
        });
    }

    let columns: Vec<String> = row.iter().map(|(name, _)| quote_ident(name)).collect();
    let placeholders = vec!["?"; row.len()].join(", ");
    Ok(WriteStatement {
        sql: format!(
            "INSERT INTO {} ({}) VALUES ({})",
            schema.quoted_table(),
            columns.join(", "),
            placeholders
        ),
        params: row.into_iter().map(|(_, value)| value).collect(),
    })
}

/// UPDATE by row id. A phantom record binds NULL and so matches no row.
pub fn update_statement(record: &Record, schema: &TableSchema) -> Result<WriteStatement> {
    let row = to_row(record, schema)?;
    let assignments = if row.is_empty() {
        // Nothing to change; still reports whether the row exists
        "rowid = rowid".to_string()
    } else {
        row.iter()
            .map(|(name, _)| format!("{} = ?", quote_ident(name)))
            .collect::<Vec<_>>()
            .join(", ")
    };

    let mut params: Vec<SqlValue> = row.into_iter().map(|(_, value)| value).collect();
    params.push(record.id().map(SqlValue::Integer).unwrap_or(SqlValue::Null));
    Ok(WriteStatement {
        sql: format!(
            "UPDATE {} SET {} WHERE rowid = ?",
            schema.quoted_table(),
            assignments
        ),
        params,
    })
}

pub fn delete_statement(record: &Record, schema: &TableSchema) -> WriteStatement {
    WriteStatement {
        sql: format!("DELETE FROM {} WHERE rowid = ?", schema.quoted_table()),
        params: vec![record.id().map(SqlValue::Integer).unwrap_or(SqlValue::Null)],
    }
}

/// The write one record needs, prepared ahead of the transaction
#[derive(Debug, Clone, PartialEq)]
pub enum RecordWrite {
    Insert(WriteStatement),
    /// Update, falling back to an insert when the row is gone
    Update {
        update: WriteStatement,
        fallback: WriteStatement,
    },
    Delete(WriteStatement),
}

impl RecordWrite {
    /// Prepare the write for `record` under a create, update or destroy.
    ///
    /// Returns `None` for reads, which write nothing.
    pub fn for_record(
        kind: OperationKind,
        record: &Record,
        schema: &TableSchema,
    ) -> Option<Result<Self>> {
        match kind {
            OperationKind::Create => Some(insert_statement(record, schema).map(RecordWrite::Insert)),
            OperationKind::Update => Some(Self::update_with_fallback(record, schema)),
            OperationKind::Destroy => Some(Ok(RecordWrite::Delete(delete_statement(record, schema)))),
            OperationKind::Read => None,
        }
    }

    fn update_with_fallback(record: &Record, schema: &TableSchema) -> Result<Self> {
        Ok(RecordWrite::Update {
            update: update_statement(record, schema)?,
            fallback: insert_statement(record, schema)?,
        })
    }

    /// Execute the write; returns the row id when a row was inserted.
    pub fn apply(&self, tx: &Tx<'_>) -> Result<Option<i64>> {
        match self {
            RecordWrite::Insert(stmt) => Ok(tx.execute_sql(&stmt.sql, &stmt.params)?.insert_id),
            RecordWrite::Update { update, fallback } => {
                let rs = tx.execute_sql(&update.sql, &update.params)?;
                if rs.rows_affected == 0 {
                    tracing::debug!("Row missing for update, inserting instead");
                    return Ok(tx.execute_sql(&fallback.sql, &fallback.params)?.insert_id);
                }
                Ok(None)
            }
            RecordWrite::Delete(stmt) => {
                tx.execute_sql(&stmt.sql, &stmt.params)?;
                Ok(None)
            }
        }
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
                FieldDescriptor::new("tags", LogicalType::Array),
                FieldDescriptor::new("active", LogicalType::Boolean),
            ],
        );
        TableSchema::new("people", model.fields())
    }

    #[test]
    fn test_to_row_skips_undefined() {
        let record = Record::from_json(json!({"name": "Jo", "tags": ["a", "b"], "other": 1}));
        let row = to_row(&record, &schema()).unwrap();
        assert_eq!(
            row,
            vec![
                ("name".to_string(), SqlValue::Text("Jo".into())),
                ("tags".to_string(), SqlValue::Text(r#"["a","b"]"#.into())),
            ]
        );
    }

    #[test]
    fn test_value_conversion() {
        let schema = schema();
        let active = schema.column("active").unwrap();
        let age = schema.column("age").unwrap();
        let tags = schema.column("tags").unwrap();

        let name = schema.column("name").unwrap();

        assert_eq!(to_sql_value(&json!(true), active).unwrap(), SqlValue::Text("true".into()));
        assert_eq!(to_sql_value(&json!(false), name).unwrap(), SqlValue::Text("false".into()));
        assert_eq!(to_sql_value(&json!(true), age).unwrap(), SqlValue::Integer(1));
        assert_eq!(to_sql_value(&json!(41), age).unwrap(), SqlValue::Integer(41));
        assert_eq!(to_sql_value(&json!(1.5), age).unwrap(), SqlValue::Real(1.5));
        assert_eq!(to_sql_value(&Value::Null, age).unwrap(), SqlValue::Null);
        assert_eq!(to_sql_value(&Value::Null, tags).unwrap(), SqlValue::Text("null".into()));
    }

    #[test]
    fn test_insert_statement() {
        let record = Record::from_json(json!({"name": "Jo", "age": 30}));
        let stmt = insert_statement(&record, &schema()).unwrap();
        assert_eq!(stmt.sql, "INSERT INTO `people` (`name`, `age`) VALUES (?, ?)");
        assert_eq!(stmt.params.len(), 2);

        let empty = insert_statement(&Record::default(), &schema()).unwrap();
        assert_eq!(empty.sql, "INSERT INTO `people` DEFAULT VALUES");
    }

    #[test]
    fn test_update_statement_binds_rowid_last() {
        let record = Record::with_id(9, json!({"age": 31}).as_object().unwrap().clone());
        let stmt = update_statement(&record, &schema()).unwrap();
        assert_eq!(stmt.sql, "UPDATE `people` SET `age` = ? WHERE rowid = ?");
        assert_eq!(stmt.params, vec![SqlValue::Integer(31), SqlValue::Integer(9)]);
    }

    #[test]
    fn test_delete_phantom_binds_null() {
        let stmt = delete_statement(&Record::default(), &schema());
        assert_eq!(stmt.sql, "DELETE FROM `people` WHERE rowid = ?");
        assert_eq!(stmt.params, vec![SqlValue::Null]);
    }

    #[test]
    fn test_read_has_no_write() {
        assert!(RecordWrite::for_record(OperationKind::Read, &Record::default(), &schema()).is_none());
    }
}
