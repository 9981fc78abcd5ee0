//! Transaction orchestration
//!
//! Two ways to run an operation's SQL, both inside exactly one transaction:
//!
//! - [`run_in_transaction`]: queued queries, all-or-nothing. Used for reads
//!   and maintenance statements.
//! - [`run_tracked`]: one savepoint per record. A failing record is rolled
//!   back on its own, the others still run and commit, and every outcome is
//!   collected by a [`CompletionTracker`]. Used for all record writes.

use tokio::sync::mpsc;
use crate::{Error, Result};
use super::codec::RecordWrite;
use super::connection::{Connection, SqlResultSet, SqlValue, Tx};

/// A statement group queued into a transaction
pub type Query = Box<dyn FnOnce(&Tx<'_>) -> Result<()> + Send>;

/// Queue a single statement without parameters
pub fn statement(sql: impl Into<String>) -> Query {
    let sql = sql.into();
    Box::new(move |tx| tx.execute_sql(&sql, &[]).map(|_| ()))
}

/// Run `queries` in order in one transaction; the first failure rolls back all of them.
pub async fn run_in_transaction(conn: &Connection, queries: Vec<Query>) -> Result<()> {
    conn.transaction(move |tx| {
        for query in queries {
            query(tx)?;
        }
        Ok(())
    })
    .await
}

/// Run one read statement in its own transaction
pub async fn run_query(conn: &Connection, sql: String, params: Vec<SqlValue>) -> Result<SqlResultSet> {
    conn.transaction(move |tx| tx.execute_sql(&sql, &params)).await
}

/// Resolution of one record: the inserted row id, if any
#[derive(Debug)]
pub struct RecordOutcome {
    pub index: usize,
    pub result: Result<Option<i64>>,
}

/// Sending half handed to whoever executes the records
#[derive(Clone)]
pub struct CompletionReporter {
    sender: mpsc::UnboundedSender<RecordOutcome>,
}

impl CompletionReporter {
    pub fn report(&self, index: usize, result: Result<Option<i64>>) {
        if self.sender.send(RecordOutcome { index, result }).is_err() {
            tracing::debug!("Completion tracker gone, dropping outcome for record {}", index);
        }
    }
}

/// Collects exactly one outcome per record
pub struct CompletionTracker {
    expected: usize,
    receiver: mpsc::UnboundedReceiver<RecordOutcome>,
}

impl CompletionTracker {
    pub fn new(expected: usize) -> (Self, CompletionReporter) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { expected, receiver }, CompletionReporter { sender })
    }

    /// Wait until every record resolved or all reporters are gone.
    ///
    /// Records that never reported resolve as [`Error::NotExecuted`]. A
    /// second report for the same record is ignored.
    pub async fn wait(mut self) -> BatchOutcome {
        let mut slots: Vec<Option<Result<Option<i64>>>> = (0..self.expected).map(|_| None).collect();
        let mut resolved = 0;

        while resolved < self.expected {
            let Some(outcome) = self.receiver.recv().await else {
                break;
            };
            match slots.get_mut(outcome.index) {
                Some(slot) if slot.is_none() => {
                    *slot = Some(outcome.result);
                    resolved += 1;
                }
                _ => tracing::warn!("Ignoring stray outcome for record {}", outcome.index),
            }
        }

        BatchOutcome {
            results: slots
                .into_iter()
                .enumerate()
                .map(|(index, slot)| slot.unwrap_or(Err(Error::NotExecuted(index))))
                .collect(),
        }
    }
}

/// Per-record results of a tracked batch, in record order
#[derive(Debug)]
pub struct BatchOutcome {
    results: Vec<Result<Option<i64>>>,
}

impl BatchOutcome {
    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// True iff no record failed
    pub fn is_successful(&self) -> bool {
        self.results.iter().all(Result::is_ok)
    }

    pub fn failed_count(&self) -> usize {
        self.results.iter().filter(|r| r.is_err()).count()
    }

    pub fn into_results(self) -> Vec<Result<Option<i64>>> {
        self.results
    }
}

/// Run per-record writes inside one transaction.
///
/// `prelude` runs first; if it fails nothing else runs and the transaction
/// rolls back. Each write then runs in its own savepoint and reports its
/// outcome. A write that could not be prepared (`Err` entry) is reported as
/// failed without touching the database.
///
/// Returns the transaction's own outcome (commit or rollback) together with
/// the per-record outcomes.
pub async fn run_tracked(
    conn: &Connection,
    prelude: Vec<Query>,
    writes: Vec<Result<RecordWrite>>,
) -> (Result<()>, BatchOutcome) {
    let (tracker, reporter) = CompletionTracker::new(writes.len());

    let committed = conn
        .transaction(move |tx| {
            for query in prelude {
                query(tx)?;
            }
            for (index, write) in writes.into_iter().enumerate() {
                let result = write.and_then(|w| tx.savepoint(|sp| w.apply(sp)));
                if let Err(e) = &result {
                    tracing::warn!("Record {} failed: {}", index, e);
                }
                reporter.report(index, result);
            }
            Ok(())
        })
        .await;

    (committed, tracker.wait().await)
}
