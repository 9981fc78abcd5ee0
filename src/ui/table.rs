use serde_json::Value;
use tabled::{builder::Builder, settings::Style, Table, Tabled};
use crate::model::Record;
use crate::storage::TableSchema;

#[derive(Tabled)]
struct ColumnRow {
    #[tabled(rename = "Column")]
    name: String,
    #[tabled(rename = "SQL type")]
    sql_type: String,
    #[tabled(rename = "Field type")]
    logical_type: String,
    #[tabled(rename = "Option")]
    option: String,
    #[tabled(rename = "Encoded")]
    opaque: String,
}

/// Derived column layout of `schema`
pub fn schema_table(schema: &TableSchema) -> String {
    let rows: Vec<ColumnRow> = schema
        .columns()
        .iter()
        .map(|c| ColumnRow {
            name: c.name.clone(),
            sql_type: c.sql_type.as_str().to_string(),
            logical_type: c.logical_type.to_string(),
            option: c.option.clone(),
            opaque: if c.requires_opaque_codec { "json" } else { "" }.to_string(),
        })
        .collect();

    Table::new(&rows).with(Style::rounded()).to_string()
}

/// Records as rows: identity first, then `columns` in order
pub fn records_table(id_property: &str, columns: &[&str], records: &[Record]) -> String {
    let mut builder = Builder::default();
    builder.push_record(std::iter::once(id_property).chain(columns.iter().copied()));

    for record in records {
        let id = record.id().map(|id| id.to_string()).unwrap_or_default();
        let cells = columns.iter().map(|name| cell(record.get(name)));
        builder.push_record(std::iter::once(id).chain(cells));
    }

    builder.build().with(Style::rounded()).to_string()
}

fn cell(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}
