//! Result mapping - raw rows back into records

use serde_json::{Map, Number, Value};
use crate::model::{FieldDescriptor, LogicalType, Record};
use super::connection::{SqlResultSet, SqlValue};

/// Map every row of `result` to a record.
///
/// Column 0 is expected to hold the row id (`SELECT rowid, * ...`). Every
/// non-identity field gets a value: absent columns and NULLs become `null`.
pub fn map_rows(result: &SqlResultSet, fields: &[FieldDescriptor]) -> Vec<Record> {
    result
        .rows()
        .iter()
        .map(|row| {
            let mut data = Map::new();
            for field in fields.iter().filter(|f| !f.is_identity) {
                let raw = row.get(&field.name);
                let value = if field.requires_opaque_codec {
                    decode_opaque(raw)
                } else {
                    from_sql_value(raw, &field.declared_type)
                };
                data.insert(field.name.clone(), value);
            }

            match row.get_index(0) {
                Some(SqlValue::Integer(id)) => Record::with_id(*id, data),
                _ => Record::new(data),
            }
        })
        .collect()
}

/// Decode an opaquely encoded column. Never fails: missing values and NULL
/// give `null`, text that is not JSON is kept as a string.
pub fn decode_opaque(raw: Option<&SqlValue>) -> Value {
    match raw {
        None | Some(SqlValue::Null) => Value::Null,
        Some(SqlValue::Text(text)) => serde_json::from_str(text).unwrap_or_else(|e| {
            tracing::debug!("Keeping undecodable column value as text: {}", e);
            Value::String(text.clone())
        }),
        Some(other) => from_sql_value(Some(other), &LogicalType::Auto),
    }
}

/// Convert a plain column value, restoring booleans from their text form
pub fn from_sql_value(raw: Option<&SqlValue>, declared: &LogicalType) -> Value {
    match raw {
        None | Some(SqlValue::Null) => Value::Null,
        Some(SqlValue::Integer(i)) if *declared == LogicalType::Boolean => Value::Bool(*i != 0),
        Some(SqlValue::Integer(i)) => Value::from(*i),
        Some(SqlValue::Real(f)) => Number::from_f64(*f).map(Value::Number).unwrap_or(Value::Null),
        Some(SqlValue::Text(text)) if *declared == LogicalType::Boolean => match text.as_str() {
            "true" => Value::Bool(true),
            "false" => Value::Bool(false),
            _ => Value::String(text.clone()),
        },
        Some(SqlValue::Text(text)) => Value::String(text.clone()),
        Some(SqlValue::Blob(bytes)) => Value::Array(bytes.iter().map(|b| Value::from(*b)).collect()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::connection::Connection;
    use crate::model::Model;
    use serde_json::json;

    #[test]
    fn test_decode_opaque_never_fails() {
        assert_eq!(decode_opaque(None), Value::Null);
        assert_eq!(decode_opaque(Some(&SqlValue::Null)), Value::Null);
        assert_eq!(decode_opaque(Some(&SqlValue::Text("[1,2]".into()))), json!([1, 2]));
        assert_eq!(decode_opaque(Some(&SqlValue::Text("{oops".into()))), json!("{oops"));
    }

    #[test]
    fn test_boolean_from_text() {
        let text = |s: &str| SqlValue::Text(s.to_string());
        assert_eq!(from_sql_value(Some(&text("true")), &LogicalType::Boolean), json!(true));
        assert_eq!(from_sql_value(Some(&text("false")), &LogicalType::Boolean), json!(false));
        assert_eq!(from_sql_value(Some(&text("true")), &LogicalType::String), json!("true"));
    }

    #[tokio::test]
    async fn test_map_rows_attaches_rowid() {
        let conn = Connection::open_in_memory().unwrap();
        let rs = conn
            .transaction(|tx| {
                tx.execute_sql("CREATE TABLE people (name TEXT, meta TEXT)", &[])?;
                tx.execute_sql("INSERT INTO people (name) VALUES ('Jo')", &[])?;
                tx.execute_sql("INSERT INTO people (name, meta) VALUES ('Ann', '{\"k\":1}')", &[])?;
                tx.execute_sql("SELECT rowid, * FROM people ORDER BY rowid", &[])
            })
            .await
            .unwrap();

        let model = Model::new(
            "id",
            vec![
                FieldDescriptor::new("id", LogicalType::Int),
                FieldDescriptor::new("name", LogicalType::String),
                FieldDescriptor::new("meta", LogicalType::Object),
                FieldDescriptor::new("note", LogicalType::String).transient(),
            ],
        );
        let records = map_rows(&rs, model.fields());

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].id(), Some(1));
        assert!(!records[0].is_phantom());
        assert_eq!(records[0].to_json("id"), json!({"id": 1, "name": "Jo", "meta": null, "note": null}));
        assert_eq!(records[1].get("meta"), Some(&json!({"k": 1})));
    }
}
