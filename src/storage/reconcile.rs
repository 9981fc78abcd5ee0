//! Schema reconciliation
//!
//! Brings the stored table in line with the derived schema on start-up.
//! Only additive changes are made to a table holding data: missing columns
//! are added (and back-filled with their default), nothing is dropped,
//! renamed or narrowed. An empty table is simply rebuilt.

use std::collections::HashSet;
use serde::Serialize;
use serde_json::Value;
use crate::Result;
use super::codec::to_sql_value;
use super::connection::{SqlValue, Tx};
use super::schema::{quote_ident, ColumnSchema, TableSchema};

/// What reconciliation did to the table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReconcileAction {
    /// Table did not exist
    Created,
    /// Table existed without rows and was rebuilt
    Recreated,
    /// Columns were added to a populated table
    Altered,
    Unchanged,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReconcileReport {
    pub action: ReconcileAction,
    /// Columns added by ALTER TABLE
    pub added: Vec<String>,
    /// Added columns whose default was written into existing rows
    pub backfilled: Vec<String>,
    /// Columns that could not be added, with the engine's message
    pub failed: Vec<(String, String)>,
}

impl ReconcileReport {
    fn new(action: ReconcileAction) -> Self {
        Self {
            action,
            added: Vec::new(),
            backfilled: Vec::new(),
            failed: Vec::new(),
        }
    }
}

/// Reconcile the table in `schema` inside the current transaction
pub fn reconcile(tx: &Tx<'_>, schema: &TableSchema) -> Result<ReconcileReport> {
    let create_sql = schema.create_table_sql()?;

    let catalog = tx.execute_sql(
        "SELECT sql FROM sqlite_master WHERE type = 'table' AND name = ?",
        &[SqlValue::Text(schema.table().to_string())],
    )?;
    if catalog.is_empty() {
        tx.execute_sql(&create_sql, &[])?;
        tracing::info!("Created table {}", schema.table());
        return Ok(ReconcileReport::new(ReconcileAction::Created));
    }

    let sample = tx.execute_sql(&format!("SELECT 1 FROM {} LIMIT 1", schema.quoted_table()), &[])?;
    if sample.is_empty() {
        tx.execute_sql(&schema.drop_table_sql(), &[])?;
        tx.execute_sql(&create_sql, &[])?;
        tracing::info!("Recreated empty table {}", schema.table());
        return Ok(ReconcileReport::new(ReconcileAction::Recreated));
    }

    let existing = existing_columns(tx, schema.table())?;
    let mut report = ReconcileReport::new(ReconcileAction::Unchanged);

    for column in schema.columns().iter().filter(|c| !existing.contains(&c.name.to_lowercase())) {
        match tx.savepoint(|sp| add_column(sp, schema, column)) {
            Ok(backfilled) => {
                tracing::info!("Added column {} to {}", column.name, schema.table());
                report.added.push(column.name.clone());
                if backfilled {
                    report.backfilled.push(column.name.clone());
                }
            }
            Err(e) => {
                tracing::warn!("Failed to add column {} to {}: {}", column.name, schema.table(), e);
                report.failed.push((column.name.clone(), e.to_string()));
            }
        }
    }

    if !report.added.is_empty() || !report.failed.is_empty() {
        report.action = ReconcileAction::Altered;
    }
    Ok(report)
}

/// Lowercased names of the table's columns; SQLite identifiers ignore case
fn existing_columns(tx: &Tx<'_>, table: &str) -> Result<HashSet<String>> {
    let info = tx.execute_sql(
        "SELECT name FROM pragma_table_info(?)",
        &[SqlValue::Text(table.to_string())],
    )?;
    Ok(info
        .rows()
        .iter()
        .filter_map(|row| match row.get_index(0) {
            Some(SqlValue::Text(name)) => Some(name.to_lowercase()),
            _ => None,
        })
        .collect())
}

/// Add one column; returns whether existing rows were back-filled
fn add_column(tx: &Tx<'_>, schema: &TableSchema, column: &ColumnSchema) -> Result<bool> {
    tx.execute_sql(
        &format!("ALTER TABLE {} ADD COLUMN {}", schema.quoted_table(), column.definition()),
        &[],
    )?;

    match &column.default_value {
        Some(default) if !is_empty_value(default) => {
            tx.execute_sql(
                &format!("UPDATE {} SET {} = ?", schema.quoted_table(), quote_ident(&column.name)),
                &[to_sql_value(default, column)?],
            )?;
            Ok(true)
        }
        _ => Ok(false),
    }
}

/// Null, empty strings and empty arrays count as "no default"
pub fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}
