//! # Litestore - CRUD storage proxy over embedded SQLite
//!
//! Translates model-agnostic create/read/update/destroy requests into SQL
//! and reconciles the transaction-scoped results back into records.
//!
//! Litestore provides:
//! - Schema derivation from a field-level model description
//! - Filter/sorter/grouper descriptors compiled to parameterized SQL clauses
//! - Additive schema reconciliation on start-up
//! - One transaction per operation with per-record completion tracking
//! - JSON-backed opaque encoding for structured field values

pub mod config;
pub mod model;
pub mod operation;
pub mod storage;
pub mod ui;

// Re-exports for convenient access
pub use model::{FieldDescriptor, FilterDescriptor, GrouperDescriptor, LogicalType, Model, Record, SorterDescriptor};
pub use operation::{Operation, OperationKind, OperationState, RecordFailure, ResultSet};
pub use storage::{BatchRequest, Connection, ConnectionConfig, Proxy, SqliteProxy};

/// Result type alias for Litestore operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for Litestore operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("Encoding error: {0}")]
    Encoding(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Invalid operation state: {0}")]
    OperationState(String),

    #[error("Record {0} was not executed")]
    NotExecuted(usize),

    #[error("Database connection closed")]
    ConnectionClosed,
}
