//! Storage proxy - CRUD entry points over one model table
//!
//! Every entry point takes an [`Operation`] and resolves to the same
//! operation, completed. Failures are attached to the operation; no entry
//! point returns an error of its own.
//!
//! All record writes (create, update, destroy) use per-record tracking: one
//! transaction per operation, one savepoint per record. A failing record
//! marks the operation failed but does not undo the records that succeeded.

use std::sync::Arc;
use async_trait::async_trait;
use crate::model::{Model, Record};
use crate::operation::{Operation, OperationKind, OperationState, ResultSet};
use crate::Result;
use super::codec::RecordWrite;
use super::connection::Connection;
use super::reconcile::{self, ReconcileReport};
use super::schema::TableSchema;
use super::{clause, mapper, transaction};

/// The four CRUD entry points plus table truncation
#[async_trait]
pub trait Proxy: Send + Sync {
    async fn create(&self, operation: Operation) -> Operation;

    async fn read(&self, operation: Operation) -> Operation;

    async fn update(&self, operation: Operation) -> Operation;

    async fn destroy(&self, operation: Operation) -> Operation;

    /// Delete every row, keeping the table
    async fn truncate(&self) -> Result<()>;

    /// Dispatch on the operation's kind
    async fn execute(&self, operation: Operation) -> Operation {
        match operation.kind() {
            OperationKind::Create => self.create(operation).await,
            OperationKind::Read => self.read(operation).await,
            OperationKind::Update => self.update(operation).await,
            OperationKind::Destroy => self.destroy(operation).await,
        }
    }
}

/// Records to write together, run as create, then update, then destroy
#[derive(Debug)]
pub struct BatchRequest {
    pub create: Vec<Record>,
    pub update: Vec<Record>,
    pub destroy: Vec<Record>,
    /// Empty the table before the create operation
    pub full_rewrite: bool,
    /// One operation per action holding all its records; otherwise one per record
    pub batch_actions: bool,
}

impl Default for BatchRequest {
    fn default() -> Self {
        Self {
            create: Vec::new(),
            update: Vec::new(),
            destroy: Vec::new(),
            full_rewrite: false,
            batch_actions: true,
        }
    }
}

/// SQLite-backed proxy for one model
pub struct SqliteProxy {
    conn: Connection,
    model: Arc<Model>,
    schema: Arc<TableSchema>,
}

impl SqliteProxy {
    /// Create a proxy without touching the database
    pub fn new(conn: Connection, table: impl Into<String>, model: Model) -> Self {
        let schema = TableSchema::new(table, model.fields());
        Self {
            conn,
            model: Arc::new(model),
            schema: Arc::new(schema),
        }
    }

    /// Create a proxy and bring its table in line with the model.
    ///
    /// Table bootstrap is best effort: failures are logged, not returned.
    pub async fn open(conn: Connection, table: impl Into<String>, model: Model) -> Self {
        let proxy = Self::new(conn, table, model);
        match proxy.reconcile().await {
            Ok(report) => tracing::debug!("Reconciled {}: {:?}", proxy.schema.table(), report),
            Err(e) => tracing::warn!("Table bootstrap for {} failed: {}", proxy.schema.table(), e),
        }
        proxy
    }

    pub fn model(&self) -> &Model {
        &self.model
    }

    pub fn schema(&self) -> &TableSchema {
        &self.schema
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Run schema reconciliation and report what changed
    pub async fn reconcile(&self) -> Result<ReconcileReport> {
        let schema = Arc::clone(&self.schema);
        self.conn
            .transaction(move |tx| reconcile::reconcile(tx, &schema))
            .await
    }

    /// Drop the table entirely
    pub async fn drop_table(&self) -> Result<()> {
        transaction::run_in_transaction(
            &self.conn,
            vec![transaction::statement(self.schema.drop_table_sql())],
        )
        .await
    }

    /// Run the records of `request` as create, update and destroy operations, in that order
    pub async fn batch(&self, request: BatchRequest) -> Vec<Operation> {
        let BatchRequest {
            create,
            update,
            destroy,
            full_rewrite,
            batch_actions,
        } = request;

        let mut operations = Vec::new();
        for (kind, records) in [
            (OperationKind::Create, create),
            (OperationKind::Update, update),
            (OperationKind::Destroy, destroy),
        ] {
            if records.is_empty() {
                continue;
            }
            if batch_actions {
                operations.push(
                    Operation::new(kind, records)
                        .with_full_rewrite(full_rewrite && kind == OperationKind::Create),
                );
            } else {
                operations.extend(records.into_iter().map(|r| Operation::new(kind, vec![r])));
            }
        }

        let mut completed = Vec::with_capacity(operations.len());
        for operation in operations {
            completed.push(self.execute(operation).await);
        }
        completed
    }

    async fn write(&self, mut operation: Operation) -> Operation {
        if !begin(&mut operation) {
            return operation;
        }

        let kind = operation.kind();
        let writes: Vec<Result<RecordWrite>> = operation
            .records()
            .iter()
            .filter_map(|record| RecordWrite::for_record(kind, record, &self.schema))
            .collect();

        let mut prelude = Vec::new();
        if kind == OperationKind::Create && operation.full_rewrite() {
            prelude.push(transaction::statement(self.schema.delete_all_sql()));
        }

        tracing::debug!("{} {} record(s) in {}", kind, writes.len(), self.schema.table());
        let (committed, outcome) = transaction::run_tracked(&self.conn, prelude, writes).await;

        if let Err(e) = committed {
            tracing::warn!("{} on {} rolled back: {}", kind, self.schema.table(), e);
            finish(&mut operation, Err(e));
            return operation;
        }

        if !outcome.is_successful() {
            tracing::warn!(
                "{} on {}: {} of {} record(s) failed",
                kind,
                self.schema.table(),
                outcome.failed_count(),
                outcome.len()
            );
        }

        for (index, result) in outcome.into_results().into_iter().enumerate() {
            match result {
                Ok(Some(id)) => {
                    if let Some(record) = operation.records_mut().get_mut(index) {
                        record.set_id(id);
                    }
                }
                Ok(None) => {}
                Err(e) => operation.record_failure(index, e),
            }
        }
        finish(&mut operation, Ok(()));
        operation
    }
}

#[async_trait]
impl Proxy for SqliteProxy {
    async fn create(&self, operation: Operation) -> Operation {
        self.write(operation).await
    }

    async fn read(&self, mut operation: Operation) -> Operation {
        if !begin(&mut operation) {
            return operation;
        }

        let query = clause::build_select(
            &self.schema,
            operation.filters(),
            operation.groupers(),
            operation.sorters(),
            operation.limit(),
            operation.start_offset(),
        );
        tracing::debug!("read: {}", query.sql);

        match transaction::run_query(&self.conn, query.sql, query.params).await {
            Ok(rows) => {
                let records = mapper::map_rows(&rows, self.model.fields());
                operation.set_result_set(ResultSet::new(records));
                finish(&mut operation, Ok(()));
            }
            Err(e) => {
                tracing::warn!("Read from {} failed: {}", self.schema.table(), e);
                finish(&mut operation, Err(e));
            }
        }
        operation
    }

    async fn update(&self, operation: Operation) -> Operation {
        self.write(operation).await
    }

    async fn destroy(&self, operation: Operation) -> Operation {
        self.write(operation).await
    }

    async fn truncate(&self) -> Result<()> {
        transaction::run_in_transaction(
            &self.conn,
            vec![transaction::statement(self.schema.delete_all_sql())],
        )
        .await
    }
}

/// Start the operation. A completed operation is left untouched; one that
/// was already started is failed.
fn begin(operation: &mut Operation) -> bool {
    match operation.start() {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!("Rejecting operation: {}", e);
            if operation.state() == OperationState::Started {
                finish(operation, Err(e));
            }
            false
        }
    }
}

fn finish(operation: &mut Operation, result: Result<()>) {
    let done = match result {
        Ok(()) => operation.complete(),
        Err(e) => operation.fail(e),
    };
    if let Err(e) = done {
        tracing::warn!("Could not complete operation: {}", e);
    }
}
