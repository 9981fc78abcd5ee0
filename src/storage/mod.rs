//! Storage Layer - SQLite-backed CRUD proxy
//!
//! One table per model:
//! - one column per persisted, non-identity field
//! - the engine's implicit `rowid` as record identity
//!
//! Structured values (arrays, objects, untyped fields) are stored as JSON text.

pub mod clause;
pub mod codec;
pub mod connection;
pub mod mapper;
pub mod proxy;
pub mod reconcile;
pub mod schema;
pub mod transaction;

pub use connection::{Connection, ConnectionConfig, SqlResultSet, SqlRow, SqlValue, Tx};
pub use proxy::{BatchRequest, Proxy, SqliteProxy};
pub use reconcile::{ReconcileAction, ReconcileReport};
pub use schema::{ColumnSchema, SqlType, TableSchema};
