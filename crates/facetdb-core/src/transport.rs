//! The seam between facetdb and a concrete store client.
//!
//! facetdb never talks to a store itself. Entities and services hand every
//! built input to a [`Transport`], which executes one storage primitive and
//! returns the store's output.
//!
//! # Object safety
//!
//! The trait uses `#[async_trait]` so it can be shared as
//! `Arc<dyn Transport>` between entities of one service.

use facetdb_model::input::{
    BatchGetItemInput, BatchWriteItemInput, DeleteItemInput, GetItemInput, PutItemInput,
    QueryInput, ScanInput, TransactGetItemsInput, TransactWriteItemsInput, UpdateItemInput,
};
use facetdb_model::output::{
    BatchGetItemOutput, BatchWriteItemOutput, DeleteItemOutput, GetItemOutput, PutItemOutput,
    QueryOutput, ScanOutput, TransactGetItemsOutput, TransactWriteItemsOutput, UpdateItemOutput,
};
use thiserror::Error;

/// Failures reported by a transport.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The store rejected the request.
    #[error("{code}: {message}")]
    Service {
        /// Store error code, e.g. `ConditionalCheckFailedException`.
        code: String,
        /// Store error message.
        message: String,
    },
    /// The store could not be reached.
    #[error("connection failed: {0}")]
    Connection(String),
    /// Any other client failure.
    #[error(transparent)]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl TransportError {
    /// A store-side rejection.
    pub fn service(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Service {
            code: code.into(),
            message: message.into(),
        }
    }

    /// Returns `true` when a condition expression did not hold.
    #[must_use]
    pub fn is_conditional_check_failed(&self) -> bool {
        matches!(self, Self::Service { code, .. } if code == "ConditionalCheckFailedException")
    }
}

/// Executes storage primitives against a store.
#[async_trait::async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Read one item by primary key.
    async fn get_item(&self, input: GetItemInput) -> Result<GetItemOutput, TransportError>;

    /// Insert or replace one item.
    async fn put_item(&self, input: PutItemInput) -> Result<PutItemOutput, TransportError>;

    /// Modify one item.
    async fn update_item(&self, input: UpdateItemInput) -> Result<UpdateItemOutput, TransportError>;

    /// Delete one item by primary key.
    async fn delete_item(&self, input: DeleteItemInput) -> Result<DeleteItemOutput, TransportError>;

    /// Read items by key condition.
    async fn query(&self, input: QueryInput) -> Result<QueryOutput, TransportError>;

    /// Read every item of a table or index.
    async fn scan(&self, input: ScanInput) -> Result<ScanOutput, TransportError>;

    /// Read many items by key.
    async fn batch_get_item(
        &self,
        input: BatchGetItemInput,
    ) -> Result<BatchGetItemOutput, TransportError>;

    /// Put or delete many items.
    async fn batch_write_item(
        &self,
        input: BatchWriteItemInput,
    ) -> Result<BatchWriteItemOutput, TransportError>;

    /// Atomic multi-item write.
    async fn transact_write_items(
        &self,
        input: TransactWriteItemsInput,
    ) -> Result<TransactWriteItemsOutput, TransportError>;

    /// Atomic multi-item read.
    async fn transact_get_items(
        &self,
        input: TransactGetItemsInput,
    ) -> Result<TransactGetItemsOutput, TransportError>;
}
