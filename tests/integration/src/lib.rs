//! Integration tests for facetdb.
//!
//! Every flow runs against a [`RecordingTransport`], which remembers each
//! input it receives and answers from per-operation queues of scripted
//! outputs (an empty output when a queue runs dry).
//!
//! Run them with:
//! ```text
//! cargo test -p facetdb-integration
//! ```

use std::collections::VecDeque;
use std::sync::{Arc, Once};

use facetdb_core::schema::TimestampsConfig;
use facetdb_core::{
    AttributeDefinition, Entity, FacetDefinition, FixedClock, IndexDefinition, Schema, Transport,
    TransportError,
};
use facetdb_model::input::{
    BatchGetItemInput, BatchWriteItemInput, DeleteItemInput, GetItemInput, PutItemInput,
    QueryInput, ScanInput, TransactGetItemsInput, TransactWriteItemsInput, UpdateItemInput,
};
use facetdb_model::output::{
    BatchGetItemOutput, BatchWriteItemOutput, DeleteItemOutput, GetItemOutput, PutItemOutput,
    QueryOutput, ScanOutput, TransactGetItemsOutput, TransactWriteItemsOutput, UpdateItemOutput,
};
use parking_lot::Mutex;

static INIT: Once = Once::new();

/// Initialize tracing (once).
pub fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_test_writer()
            .init();
    });
}

/// One input received by the transport.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    /// `GetItem`.
    Get(GetItemInput),
    /// `PutItem`.
    Put(PutItemInput),
    /// `UpdateItem`.
    Update(UpdateItemInput),
    /// `DeleteItem`.
    Delete(DeleteItemInput),
    /// `Query`.
    Query(QueryInput),
    /// `Scan`.
    Scan(ScanInput),
    /// `BatchGetItem`.
    BatchGet(BatchGetItemInput),
    /// `BatchWriteItem`.
    BatchWrite(BatchWriteItemInput),
    /// `TransactWriteItems`.
    TransactWrite(TransactWriteItemsInput),
    /// `TransactGetItems`.
    TransactGet(TransactGetItemsInput),
}

#[derive(Debug, Default)]
struct Script {
    gets: VecDeque<GetItemOutput>,
    updates: VecDeque<UpdateItemOutput>,
    deletes: VecDeque<DeleteItemOutput>,
    queries: VecDeque<QueryOutput>,
    scans: VecDeque<ScanOutput>,
    batch_gets: VecDeque<BatchGetItemOutput>,
    batch_writes: VecDeque<BatchWriteItemOutput>,
    transact_gets: VecDeque<TransactGetItemsOutput>,
    failure: Option<TransportError>,
}

/// A transport that records inputs and replays scripted outputs.
#[derive(Debug, Default)]
pub struct RecordingTransport {
    calls: Mutex<Vec<Call>>,
    script: Mutex<Script>,
}

impl RecordingTransport {
    /// A fresh transport shared behind an `Arc`.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Every input received so far.
    #[must_use]
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    /// Queue a `GetItem` output.
    pub fn push_get(&self, output: GetItemOutput) {
        self.script.lock().gets.push_back(output);
    }

    /// Queue an `UpdateItem` output.
    pub fn push_update(&self, output: UpdateItemOutput) {
        self.script.lock().updates.push_back(output);
    }

    /// Queue a `DeleteItem` output.
    pub fn push_delete(&self, output: DeleteItemOutput) {
        self.script.lock().deletes.push_back(output);
    }

    /// Queue a `Query` output.
    pub fn push_query(&self, output: QueryOutput) {
        self.script.lock().queries.push_back(output);
    }

    /// Queue a `Scan` output.
    pub fn push_scan(&self, output: ScanOutput) {
        self.script.lock().scans.push_back(output);
    }

    /// Queue a `BatchGetItem` output.
    pub fn push_batch_get(&self, output: BatchGetItemOutput) {
        self.script.lock().batch_gets.push_back(output);
    }

    /// Queue a `BatchWriteItem` output.
    pub fn push_batch_write(&self, output: BatchWriteItemOutput) {
        self.script.lock().batch_writes.push_back(output);
    }

    /// Queue a `TransactGetItems` output.
    pub fn push_transact_get(&self, output: TransactGetItemsOutput) {
        self.script.lock().transact_gets.push_back(output);
    }

    /// Fail the next call with `error`.
    pub fn fail_next(&self, error: TransportError) {
        self.script.lock().failure = Some(error);
    }

    fn record(&self, call: Call) -> Result<(), TransportError> {
        self.calls.lock().push(call);
        match self.script.lock().failure.take() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

#[async_trait::async_trait]
impl Transport for RecordingTransport {
    async fn get_item(&self, input: GetItemInput) -> Result<GetItemOutput, TransportError> {
        self.record(Call::Get(input))?;
        Ok(self.script.lock().gets.pop_front().unwrap_or_default())
    }

    async fn put_item(&self, input: PutItemInput) -> Result<PutItemOutput, TransportError> {
        self.record(Call::Put(input))?;
        Ok(PutItemOutput::default())
    }

    async fn update_item(&self, input: UpdateItemInput) -> Result<UpdateItemOutput, TransportError> {
        self.record(Call::Update(input))?;
        Ok(self.script.lock().updates.pop_front().unwrap_or_default())
    }

    async fn delete_item(&self, input: DeleteItemInput) -> Result<DeleteItemOutput, TransportError> {
        self.record(Call::Delete(input))?;
        Ok(self.script.lock().deletes.pop_front().unwrap_or_default())
    }

    async fn query(&self, input: QueryInput) -> Result<QueryOutput, TransportError> {
        self.record(Call::Query(input))?;
        Ok(self.script.lock().queries.pop_front().unwrap_or_default())
    }

    async fn scan(&self, input: ScanInput) -> Result<ScanOutput, TransportError> {
        self.record(Call::Scan(input))?;
        Ok(self.script.lock().scans.pop_front().unwrap_or_default())
    }

    async fn batch_get_item(
        &self,
        input: BatchGetItemInput,
    ) -> Result<BatchGetItemOutput, TransportError> {
        self.record(Call::BatchGet(input))?;
        Ok(self.script.lock().batch_gets.pop_front().unwrap_or_default())
    }

    async fn batch_write_item(
        &self,
        input: BatchWriteItemInput,
    ) -> Result<BatchWriteItemOutput, TransportError> {
        self.record(Call::BatchWrite(input))?;
        Ok(self.script.lock().batch_writes.pop_front().unwrap_or_default())
    }

    async fn transact_write_items(
        &self,
        input: TransactWriteItemsInput,
    ) -> Result<TransactWriteItemsOutput, TransportError> {
        self.record(Call::TransactWrite(input))?;
        Ok(TransactWriteItemsOutput::default())
    }

    async fn transact_get_items(
        &self,
        input: TransactGetItemsInput,
    ) -> Result<TransactGetItemsOutput, TransportError> {
        self.record(Call::TransactGet(input))?;
        Ok(self.script.lock().transact_gets.pop_front().unwrap_or_default())
    }
}

/// Tasks of a task tracker: one user owns many tasks, queryable by project.
#[must_use]
pub fn task_schema() -> Schema {
    Schema::new("TaskApp", "Task", "tasks")
        .version("1")
        .attribute("taskId", AttributeDefinition::string().required())
        .attribute("project", AttributeDefinition::string().required())
        .attribute("owner", AttributeDefinition::string().required())
        .attribute("title", AttributeDefinition::string())
        .attribute(
            "status",
            AttributeDefinition::enumeration(["open", "in-progress", "closed"]),
        )
        .attribute("points", AttributeDefinition::number())
        .timestamps(TimestampsConfig::default())
        .index(
            "task",
            IndexDefinition::primary(
                FacetDefinition::new("pk", ["taskId"]),
                Some(FacetDefinition::new("sk", ["project"])),
            ),
        )
        .index(
            "byOwner",
            IndexDefinition::secondary(
                "gsi1pk-gsi1sk-index",
                FacetDefinition::new("gsi1pk", ["owner"]),
                Some(FacetDefinition::new("gsi1sk", ["project", "taskId"])),
            )
            .in_collection("workspace"),
        )
}

/// Users of the task tracker, sharing the owner collection with tasks.
#[must_use]
pub fn user_schema() -> Schema {
    Schema::new("TaskApp", "User", "tasks")
        .version("1")
        .attribute("owner", AttributeDefinition::string().required())
        .attribute("name", AttributeDefinition::string())
        .index(
            "user",
            IndexDefinition::primary(
                FacetDefinition::new("pk", ["owner"]),
                Some(FacetDefinition::new("sk", Vec::<String>::new())),
            ),
        )
        .index(
            "byOwner",
            IndexDefinition::secondary(
                "gsi1pk-gsi1sk-index",
                FacetDefinition::new("gsi1pk", ["owner"]),
                Some(FacetDefinition::new("gsi1sk", Vec::<String>::new())),
            )
            .in_collection("workspace"),
        )
}

/// The task entity wired to `transport` with a clock frozen at `seconds`.
pub fn task_entity(transport: &Arc<RecordingTransport>, seconds: i64) -> Entity {
    init_tracing();
    Entity::new(task_schema())
        .unwrap_or_else(|e| panic!("task schema is invalid: {e}"))
        .with_transport(transport.clone())
        .with_clock(Arc::new(FixedClock::at_unix(seconds)))
}

mod test_entity;
mod test_pagination;
mod test_service;
