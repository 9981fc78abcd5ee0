//! Engine wrapper - one SQLite connection owned by a worker thread
//!
//! Callers hand the worker a transaction body and await its outcome. The
//! worker runs bodies strictly in submission order, so transactions from
//! different callers never overlap and no locking is needed on our side.

use std::cell::Cell;
use std::path::Path;
use std::sync::Arc;
use crossbeam::channel::{self, Receiver, Sender};
use rusqlite::params_from_iter;
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;
use crate::{Error, Result};

/// A value bound to, or read from, a statement
pub type SqlValue = rusqlite::types::Value;

const IN_MEMORY: &str = ":memory:";

/// Parameters used to open the database
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    /// Database file path, or `:memory:`
    pub name: String,
    pub version: String,
    pub description: String,
    /// Expected size in bytes; informational
    pub size_hint: u64,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            name: "litestore.db".to_string(),
            version: "1.0".to_string(),
            description: String::new(),
            size_hint: 5 * 1024 * 1024,
        }
    }
}

impl ConnectionConfig {
    pub fn in_memory() -> Self {
        Self {
            name: IN_MEMORY.to_string(),
            ..Self::default()
        }
    }

    pub fn is_in_memory(&self) -> bool {
        self.name == IN_MEMORY
    }
}

/// One result row, addressable by column name or position
#[derive(Debug, Clone, PartialEq)]
pub struct SqlRow {
    columns: Arc<[String]>,
    values: Vec<SqlValue>,
}

impl SqlRow {
    /// Get a column value by name, ignoring ASCII case as SQLite does;
    /// `None` if the column is not in the row
    pub fn get(&self, column: &str) -> Option<&SqlValue> {
        self.columns
            .iter()
            .position(|c| c.eq_ignore_ascii_case(column))
            .and_then(|i| self.values.get(i))
    }

    pub fn get_index(&self, index: usize) -> Option<&SqlValue> {
        self.values.get(index)
    }
}

/// Outcome of one statement
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SqlResultSet {
    rows: Vec<SqlRow>,
    /// Row id of the inserted row, for INSERT statements that wrote a row
    pub insert_id: Option<i64>,
    pub rows_affected: usize,
}

impl SqlResultSet {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn item(&self, index: usize) -> Option<&SqlRow> {
        self.rows.get(index)
    }

    pub fn rows(&self) -> &[SqlRow] {
        &self.rows
    }
}

/// Handle to the transaction currently running on the worker
pub struct Tx<'a> {
    conn: &'a rusqlite::Connection,
    savepoint_depth: Cell<usize>,
}

impl<'a> Tx<'a> {
    fn new(conn: &'a rusqlite::Connection) -> Self {
        Self {
            conn,
            savepoint_depth: Cell::new(0),
        }
    }

    /// Execute one statement with positional parameters
    pub fn execute_sql(&self, sql: &str, params: &[SqlValue]) -> Result<SqlResultSet> {
        tracing::debug!(sql, params = params.len(), "execute_sql");
        let mut stmt = self.conn.prepare(sql)?;

        if stmt.column_count() > 0 {
            let columns: Arc<[String]> = stmt
                .column_names()
                .into_iter()
                .map(String::from)
                .collect();
            let width = columns.len();
            let mut rows = stmt.query(params_from_iter(params.iter()))?;
            let mut out = Vec::new();
            while let Some(row) = rows.next()? {
                let values = (0..width)
                    .map(|i| row.get::<_, SqlValue>(i))
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                out.push(SqlRow {
                    columns: Arc::clone(&columns),
                    values,
                });
            }
            return Ok(SqlResultSet {
                rows: out,
                insert_id: None,
                rows_affected: 0,
            });
        }

        let rows_affected = stmt.execute(params_from_iter(params.iter()))?;
        let is_insert = sql.trim_start().get(..6).is_some_and(|kw| kw.eq_ignore_ascii_case("INSERT"));
        Ok(SqlResultSet {
            rows: Vec::new(),
            insert_id: (is_insert && rows_affected > 0).then(|| self.conn.last_insert_rowid()),
            rows_affected,
        })
    }

    /// Run `body` inside a savepoint. On error only the savepoint's work is
    /// undone and the surrounding transaction stays usable.
    pub fn savepoint<T>(&self, body: impl FnOnce(&Tx<'a>) -> Result<T>) -> Result<T> {
        let depth = self.savepoint_depth.get();
        let name = format!("litestore_sp_{depth}");
        self.conn.execute_batch(&format!("SAVEPOINT {name}"))?;
        self.savepoint_depth.set(depth + 1);
        let result = body(self);
        self.savepoint_depth.set(depth);

        match result {
            Ok(value) => {
                self.conn.execute_batch(&format!("RELEASE {name}"))?;
                Ok(value)
            }
            Err(e) => {
                if let Err(rollback) = self
                    .conn
                    .execute_batch(&format!("ROLLBACK TO {name}; RELEASE {name}"))
                {
                    tracing::warn!("Failed to roll back savepoint {}: {}", name, rollback);
                }
                Err(e)
            }
        }
    }
}

type Job = Box<dyn FnOnce(&mut rusqlite::Connection) + Send>;

/// Cloneable handle to the database worker
#[derive(Clone)]
pub struct Connection {
    sender: Sender<Job>,
    config: Arc<ConnectionConfig>,
}

impl Connection {
    /// Open the database described by `config` and start its worker thread
    pub fn open(config: ConnectionConfig) -> Result<Self> {
        let conn = if config.is_in_memory() {
            rusqlite::Connection::open_in_memory()?
        } else {
            let path = Path::new(&config.name);
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() && !parent.exists() {
                    std::fs::create_dir_all(parent)?;
                }
            }
            rusqlite::Connection::open(path)?
        };

        tracing::info!(
            name = %config.name,
            version = %config.version,
            size_hint = config.size_hint,
            "Opened database {}",
            config.description
        );

        let (sender, receiver) = channel::unbounded::<Job>();
        std::thread::Builder::new()
            .name("litestore-engine".to_string())
            .spawn(move || engine_loop(conn, receiver))?;

        Ok(Self {
            sender,
            config: Arc::new(config),
        })
    }

    /// Open a private in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        Self::open(ConnectionConfig::in_memory())
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Run `body` in one transaction on the worker.
    ///
    /// Commits when `body` returns `Ok`, rolls back otherwise. Resolves after
    /// the commit or rollback finished.
    pub async fn transaction<T, F>(&self, body: F) -> Result<T>
    where
        F: FnOnce(&Tx<'_>) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let (done, outcome) = oneshot::channel();
        let job: Job = Box::new(move |conn| {
            let _ = done.send(run_transaction(conn, body));
        });
        self.sender.send(job).map_err(|_| Error::ConnectionClosed)?;
        outcome.await.map_err(|_| Error::ConnectionClosed)?
    }
}

fn run_transaction<T>(
    conn: &mut rusqlite::Connection,
    body: impl FnOnce(&Tx<'_>) -> Result<T>,
) -> Result<T> {
    let txn = conn.transaction()?;
    // Dropping `txn` without commit rolls it back
    let value = body(&Tx::new(&txn))?;
    txn.commit()?;
    Ok(value)
}

fn engine_loop(mut conn: rusqlite::Connection, receiver: Receiver<Job>) {
    for job in receiver {
        job(&mut conn);
    }
    tracing::debug!("Database worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_transaction_commits() {
        let conn = Connection::open_in_memory().unwrap();
        conn.transaction(|tx| {
            tx.execute_sql("CREATE TABLE t (v INTEGER)", &[])?;
            tx.execute_sql("INSERT INTO t (v) VALUES (?)", &[SqlValue::Integer(4)])?;
            Ok(())
        })
        .await
        .unwrap();

        let rs = conn
            .transaction(|tx| tx.execute_sql("SELECT rowid, v FROM t", &[]))
            .await
            .unwrap();
        assert_eq!(rs.len(), 1);
        assert_eq!(rs.item(0).unwrap().get("v"), Some(&SqlValue::Integer(4)));
        assert_eq!(rs.item(0).unwrap().get("V"), Some(&SqlValue::Integer(4)));
        assert_eq!(rs.item(0).unwrap().get("w"), None);
    }

    #[tokio::test]
    async fn test_transaction_rolls_back_on_error() {
        let conn = Connection::open_in_memory().unwrap();
        conn.transaction(|tx| tx.execute_sql("CREATE TABLE t (v INTEGER)", &[]).map(|_| ()))
            .await
            .unwrap();

        let result = conn
            .transaction(|tx| {
                tx.execute_sql("INSERT INTO t (v) VALUES (1)", &[])?;
                tx.execute_sql("INSERT INTO missing (v) VALUES (1)", &[])?;
                Ok(())
            })
            .await;
        assert!(result.is_err());

        let rs = conn
            .transaction(|tx| tx.execute_sql("SELECT v FROM t", &[]))
            .await
            .unwrap();
        assert!(rs.is_empty());
    }

    #[tokio::test]
    async fn test_insert_id_and_rows_affected() {
        let conn = Connection::open_in_memory().unwrap();
        let (insert, update) = conn
            .transaction(|tx| {
                tx.execute_sql("CREATE TABLE t (v INTEGER)", &[])?;
                let insert = tx.execute_sql("INSERT INTO t (v) VALUES (1)", &[])?;
                let update = tx.execute_sql("UPDATE t SET v = 2 WHERE rowid = 99", &[])?;
                Ok((insert, update))
            })
            .await
            .unwrap();

        assert_eq!(insert.insert_id, Some(1));
        assert_eq!(insert.rows_affected, 1);
        assert_eq!(update.insert_id, None);
        assert_eq!(update.rows_affected, 0);
    }

    #[tokio::test]
    async fn test_savepoint_failure_keeps_transaction() {
        let conn = Connection::open_in_memory().unwrap();
        let rs = conn
            .transaction(|tx| {
                tx.execute_sql("CREATE TABLE t (v INTEGER NOT NULL)", &[])?;
                tx.savepoint(|sp| sp.execute_sql("INSERT INTO t (v) VALUES (1)", &[]))?;
                let failed = tx.savepoint(|sp| {
                    sp.execute_sql("INSERT INTO t (v) VALUES (2)", &[])?;
                    sp.execute_sql("INSERT INTO t (v) VALUES (NULL)", &[])
                });
                assert!(failed.is_err());
                tx.execute_sql("SELECT v FROM t", &[])
            })
            .await
            .unwrap();

        assert_eq!(rs.len(), 1);
        assert_eq!(rs.item(0).unwrap().get_index(0), Some(&SqlValue::Integer(1)));
    }

    #[tokio::test]
    async fn test_file_database_persists() {
        let dir = tempfile::tempdir().unwrap();
        let config = ConnectionConfig {
            name: dir.path().join("nested").join("db.sqlite").to_string_lossy().to_string(),
            ..ConnectionConfig::default()
        };

        let conn = Connection::open(config.clone()).unwrap();
        conn.transaction(|tx| tx.execute_sql("CREATE TABLE t (v TEXT)", &[]).map(|_| ()))
            .await
            .unwrap();
        drop(conn);

        let reopened = Connection::open(config).unwrap();
        let rs = reopened
            .transaction(|tx| {
                tx.execute_sql("SELECT name FROM sqlite_master WHERE name = 't'", &[])
            })
            .await
            .unwrap();
        assert_eq!(rs.len(), 1);
    }
}
