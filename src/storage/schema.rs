//! Schema derivation
//!
//! Turns a model's field descriptors into the column list of its table.
//! The identity field maps to SQLite's implicit `rowid` and never becomes a
//! column; non-persistent fields are skipped.

use serde::Serialize;
use serde_json::Value;
use crate::model::{FieldDescriptor, LogicalType};
use crate::{Error, Result};

/// Column type written into the table definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum SqlType {
    Integer,
    Float,
    Text,
    Datetime,
    /// Declared type without a mapping, used verbatim
    Passthrough(String),
}

impl SqlType {
    /// Lookup table from logical to SQL type
    pub fn for_logical(ty: &LogicalType) -> SqlType {
        match ty {
            LogicalType::Int => SqlType::Integer,
            LogicalType::Float => SqlType::Float,
            LogicalType::String | LogicalType::Array | LogicalType::Object => SqlType::Text,
            LogicalType::Date => SqlType::Datetime,
            LogicalType::Boolean | LogicalType::Auto | LogicalType::Other(_) => {
                SqlType::Passthrough(ty.as_str().to_string())
            }
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            SqlType::Integer => "INTEGER",
            SqlType::Float => "FLOAT",
            SqlType::Text => "TEXT",
            SqlType::Datetime => "DATETIME",
            SqlType::Passthrough(name) => name,
        }
    }
}

impl std::fmt::Display for SqlType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One table column derived from a persisted field
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnSchema {
    pub name: String,
    pub sql_type: SqlType,
    /// Extra definition text such as `NOT NULL`; empty when unset
    pub option: String,
    pub logical_type: LogicalType,
    pub requires_opaque_codec: bool,
    pub default_value: Option<Value>,
}

impl ColumnSchema {
    pub fn from_field(field: &FieldDescriptor) -> Self {
        Self {
            name: field.name.clone(),
            sql_type: SqlType::for_logical(&field.declared_type),
            option: field.option.clone().unwrap_or_default(),
            logical_type: field.declared_type.clone(),
            requires_opaque_codec: field.requires_opaque_codec,
            default_value: field.default_value.clone(),
        }
    }

    /// Column definition as used by CREATE TABLE and ADD COLUMN
    pub fn definition(&self) -> String {
        let mut def = format!("{} {}", quote_ident(&self.name), self.sql_type);
        if !self.option.trim().is_empty() {
            def.push(' ');
            def.push_str(self.option.trim());
        }
        def
    }

    pub fn is_text(&self) -> bool {
        self.sql_type == SqlType::Text
    }

    pub fn is_boolean(&self) -> bool {
        self.logical_type == LogicalType::Boolean
    }
}

/// Derive the column list for a set of fields.
///
/// Skips the identity field and non-persistent fields. Column order follows
/// field order.
pub fn derive_schema(fields: &[FieldDescriptor]) -> Vec<ColumnSchema> {
    fields
        .iter()
        .filter(|f| f.persist && !f.is_identity)
        .map(ColumnSchema::from_field)
        .collect()
}

/// Quote an identifier with backticks
pub fn quote_ident(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

/// A named table and its derived columns
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableSchema {
    table: String,
    columns: Vec<ColumnSchema>,
}

impl TableSchema {
    pub fn new(table: impl Into<String>, fields: &[FieldDescriptor]) -> Self {
        Self {
            table: table.into(),
            columns: derive_schema(fields),
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Quoted table name for use in SQL text
    pub fn quoted_table(&self) -> String {
        quote_ident(&self.table)
    }

    pub fn columns(&self) -> &[ColumnSchema] {
        &self.columns
    }

    /// Find a column by name
    pub fn column(&self, name: &str) -> Option<&ColumnSchema> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// SQL to create the table
    pub fn create_table_sql(&self) -> Result<String> {
        if self.columns.is_empty() {
            return Err(Error::Schema(format!(
                "table {} has no persistent columns",
                self.table
            )));
        }
        let defs: Vec<String> = self.columns.iter().map(ColumnSchema::definition).collect();
        Ok(format!(
            "CREATE TABLE IF NOT EXISTS {} ({})",
            self.quoted_table(),
            defs.join(", ")
        ))
    }

    pub fn drop_table_sql(&self) -> String {
        format!("DROP TABLE IF EXISTS {}", self.quoted_table())
    }

    pub fn delete_all_sql(&self) -> String {
        format!("DELETE FROM {}", self.quoted_table())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Model;

    fn fields() -> Vec<FieldDescriptor> {
        Model::new(
            "id",
            vec![
                FieldDescriptor::new("id", LogicalType::Int),
                FieldDescriptor::new("name", LogicalType::String).with_option("NOT NULL"),
                FieldDescriptor::new("cache", LogicalType::Auto).transient(),
                FieldDescriptor::new("age", LogicalType::Int),
                FieldDescriptor::new("tags", LogicalType::Array),
                FieldDescriptor::new("born", LogicalType::Date),
                FieldDescriptor::new("score", LogicalType::Float),
                FieldDescriptor::new("active", LogicalType::Boolean),
                FieldDescriptor::new("blob", LogicalType::Other("BLOB".into())),
            ],
        )
        .fields()
        .to_vec()
    }

    #[test]
    fn test_derive_excludes_identity_and_transient() {
        let columns = derive_schema(&fields());
        let names: Vec<&str> = columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["name", "age", "tags", "born", "score", "active", "blob"]);
    }

    #[test]
    fn test_type_mapping() {
        let schema = TableSchema::new("people", &fields());
        let ty = |name: &str| schema.column(name).unwrap().sql_type.as_str().to_string();
        assert_eq!(ty("name"), "TEXT");
        assert_eq!(ty("age"), "INTEGER");
        assert_eq!(ty("tags"), "TEXT");
        assert_eq!(ty("born"), "DATETIME");
        assert_eq!(ty("score"), "FLOAT");
        assert_eq!(ty("active"), "boolean");
        assert_eq!(ty("blob"), "BLOB");
        assert!(schema.column("tags").unwrap().requires_opaque_codec);
        assert!(!schema.column("name").unwrap().requires_opaque_codec);
    }

    #[test]
    fn test_create_table_sql() {
        let schema = TableSchema::new("people", &Model::default().fields()[..]);
        assert_eq!(
            schema.create_table_sql().unwrap(),
            "CREATE TABLE IF NOT EXISTS `people` (`name` TEXT)"
        );

        let with_option = TableSchema::new("people", &fields());
        assert!(with_option.create_table_sql().unwrap().contains("`name` TEXT NOT NULL"));
    }

    #[test]
    fn test_create_table_requires_columns() {
        let only_id = Model::new("id", vec![FieldDescriptor::new("id", LogicalType::Int)]);
        let schema = TableSchema::new("empty", only_id.fields());
        assert!(schema.create_table_sql().is_err());
    }

    #[test]
    fn test_quote_ident_escapes_backticks() {
        assert_eq!(quote_ident("we`ird"), "`we``ird`");
    }
}
