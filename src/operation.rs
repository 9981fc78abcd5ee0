//! Operations - one logical CRUD request and its single outcome
//!
//! Lifecycle: `Created -> Started -> Completed { successful }`. The completed
//! state is terminal; an operation is never restarted or reused.

use std::sync::Arc;
use crate::model::{FilterDescriptor, GrouperDescriptor, Record, SorterDescriptor};
use crate::{Error, Result};

/// The four CRUD actions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    Create,
    Read,
    Update,
    Destroy,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Create => "create",
            OperationKind::Read => "read",
            OperationKind::Update => "update",
            OperationKind::Destroy => "destroy",
        }
    }
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationState {
    Created,
    Started,
    Completed { successful: bool },
}

/// A record that failed inside a batched write
#[derive(Debug, Clone)]
pub struct RecordFailure {
    /// Position of the record in the operation's record list
    pub index: usize,
    pub error: Arc<Error>,
}

/// Records produced by a read
#[derive(Debug, Clone, PartialEq)]
pub struct ResultSet {
    pub records: Vec<Record>,
    /// Number of rows in this page (no separate count query is issued)
    pub total: usize,
    pub loaded: bool,
}

impl ResultSet {
    pub fn new(records: Vec<Record>) -> Self {
        Self {
            total: records.len(),
            records,
            loaded: true,
        }
    }
}

/// A single CRUD request tracked to one completion outcome.
#[derive(Debug)]
pub struct Operation {
    kind: OperationKind,
    records: Vec<Record>,
    filters: Vec<FilterDescriptor>,
    sorters: Vec<SorterDescriptor>,
    groupers: Vec<GrouperDescriptor>,
    limit: Option<u64>,
    start: Option<u64>,
    full_rewrite: bool,
    state: OperationState,
    exception: Option<Arc<Error>>,
    failures: Vec<RecordFailure>,
    result_set: Option<ResultSet>,
}

impl Operation {
    pub fn new(kind: OperationKind, records: Vec<Record>) -> Self {
        Self {
            kind,
            records,
            filters: Vec::new(),
            sorters: Vec::new(),
            groupers: Vec::new(),
            limit: None,
            start: None,
            full_rewrite: false,
            state: OperationState::Created,
            exception: None,
            failures: Vec::new(),
            result_set: None,
        }
    }

    pub fn create(records: Vec<Record>) -> Self {
        Self::new(OperationKind::Create, records)
    }

    pub fn read() -> Self {
        Self::new(OperationKind::Read, Vec::new())
    }

    pub fn update(records: Vec<Record>) -> Self {
        Self::new(OperationKind::Update, records)
    }

    pub fn destroy(records: Vec<Record>) -> Self {
        Self::new(OperationKind::Destroy, records)
    }

    pub fn with_filter(mut self, filter: FilterDescriptor) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn with_sorter(mut self, sorter: SorterDescriptor) -> Self {
        self.sorters.push(sorter);
        self
    }

    pub fn with_grouper(mut self, grouper: impl Into<GrouperDescriptor>) -> Self {
        self.groupers.push(grouper.into());
        self
    }

    pub fn with_limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_start(mut self, start: u64) -> Self {
        self.start = Some(start);
        self
    }

    /// Empty the table before inserting (create only)
    pub fn with_full_rewrite(mut self, full_rewrite: bool) -> Self {
        self.full_rewrite = full_rewrite;
        self
    }

    // ========== Accessors ==========

    pub fn kind(&self) -> OperationKind {
        self.kind
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn into_records(self) -> Vec<Record> {
        self.records
    }

    pub fn filters(&self) -> &[FilterDescriptor] {
        &self.filters
    }

    pub fn sorters(&self) -> &[SorterDescriptor] {
        &self.sorters
    }

    pub fn groupers(&self) -> &[GrouperDescriptor] {
        &self.groupers
    }

    pub fn limit(&self) -> Option<u64> {
        self.limit
    }

    pub fn start_offset(&self) -> Option<u64> {
        self.start
    }

    pub fn full_rewrite(&self) -> bool {
        self.full_rewrite
    }

    pub fn state(&self) -> OperationState {
        self.state
    }

    pub fn is_started(&self) -> bool {
        !matches!(self.state, OperationState::Created)
    }

    pub fn is_completed(&self) -> bool {
        matches!(self.state, OperationState::Completed { .. })
    }

    pub fn is_successful(&self) -> bool {
        matches!(self.state, OperationState::Completed { successful: true })
    }

    /// First error attached to the operation
    pub fn exception(&self) -> Option<&Error> {
        self.exception.as_deref()
    }

    /// Per-record failures of a batched write, in resolution order
    pub fn failures(&self) -> &[RecordFailure] {
        &self.failures
    }

    pub fn result_set(&self) -> Option<&ResultSet> {
        self.result_set.as_ref()
    }

    // ========== Lifecycle ==========

    /// Move from `Created` to `Started`
    pub fn start(&mut self) -> Result<()> {
        match self.state {
            OperationState::Created => {
                self.state = OperationState::Started;
                Ok(())
            }
            state => Err(Error::OperationState(format!(
                "{} operation cannot start from {:?}",
                self.kind, state
            ))),
        }
    }

    pub(crate) fn records_mut(&mut self) -> &mut [Record] {
        &mut self.records
    }

    /// Note a failed record; the operation will complete unsuccessfully.
    pub(crate) fn record_failure(&mut self, index: usize, error: Error) {
        let error = Arc::new(error);
        if self.exception.is_none() {
            self.exception = Some(Arc::clone(&error));
        }
        self.failures.push(RecordFailure { index, error });
    }

    /// Attach read results; they also replace the operation's records.
    pub(crate) fn set_result_set(&mut self, result_set: ResultSet) {
        self.records = result_set.records.clone();
        self.result_set = Some(result_set);
    }

    /// Finish a started operation. It is successful iff no error was attached.
    pub fn complete(&mut self) -> Result<()> {
        self.ensure_started()?;
        self.state = OperationState::Completed {
            successful: self.exception.is_none(),
        };
        Ok(())
    }

    /// Finish a started operation with an error
    pub fn fail(&mut self, error: Error) -> Result<()> {
        self.ensure_started()?;
        if self.exception.is_none() {
            self.exception = Some(Arc::new(error));
        }
        self.state = OperationState::Completed { successful: false };
        Ok(())
    }

    fn ensure_started(&self) -> Result<()> {
        match self.state {
            OperationState::Started => Ok(()),
            state => Err(Error::OperationState(format!(
                "{} operation cannot complete from {:?}",
                self.kind, state
            ))),
        }
    }
}
