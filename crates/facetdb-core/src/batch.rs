//! Batch chunking and execution.
//!
//! Requests are split into store-sized chunks in the order they were added
//! and sent one chunk at a time. Anything the store leaves unprocessed is
//! returned to the caller, never retried.

use std::collections::HashMap;

use facetdb_model::input::{BatchGetItemInput, BatchWriteItemInput};
use facetdb_model::types::{KeysAndAttributes, WriteRequest};
use facetdb_model::{Item, Key, StoreOperation};
use tracing::{debug, warn};

use crate::error::{Result, transport_error_to_facet};
use crate::transport::Transport;

/// Items read by a batch, with the table each came from.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchGetOutcome {
    /// `(table, item)` pairs in response order.
    pub items: Vec<(String, Item)>,
    /// Keys the store did not process.
    pub unprocessed: Vec<(String, Key)>,
}

/// Writes the store left unprocessed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchWriteOutcome {
    /// `(table, request)` pairs.
    pub unprocessed: Vec<(String, WriteRequest)>,
}

/// Split `(table, key)` pairs into `BatchGetItem` inputs of at most `chunk`
/// keys each.
#[must_use]
pub fn chunk_gets(keys: Vec<(String, Key)>, chunk: usize) -> Vec<BatchGetItemInput> {
    let chunk = chunk.max(1);
    let mut inputs = Vec::with_capacity(keys.len().div_ceil(chunk));
    let mut keys = keys.into_iter().peekable();
    while keys.peek().is_some() {
        let mut request_items: HashMap<String, KeysAndAttributes> = HashMap::new();
        for (table, key) in keys.by_ref().take(chunk) {
            request_items.entry(table).or_default().keys.push(key);
        }
        inputs.push(BatchGetItemInput { request_items });
    }
    inputs
}

/// Split `(table, request)` pairs into `BatchWriteItem` inputs of at most
/// `chunk` requests each.
#[must_use]
pub fn chunk_writes(requests: Vec<(String, WriteRequest)>, chunk: usize) -> Vec<BatchWriteItemInput> {
    let chunk = chunk.max(1);
    let mut inputs = Vec::with_capacity(requests.len().div_ceil(chunk));
    let mut requests = requests.into_iter().peekable();
    while requests.peek().is_some() {
        let mut request_items: HashMap<String, Vec<WriteRequest>> = HashMap::new();
        for (table, request) in requests.by_ref().take(chunk) {
            request_items.entry(table).or_default().push(request);
        }
        inputs.push(BatchWriteItemInput { request_items });
    }
    inputs
}

/// Send every chunk of a batch read.
pub async fn execute_gets(transport: &dyn Transport, inputs: Vec<BatchGetItemInput>) -> Result<BatchGetOutcome> {
    let mut outcome = BatchGetOutcome::default();
    let chunks = inputs.len();
    for (i, input) in inputs.into_iter().enumerate() {
        debug!(chunk = i + 1, chunks, "executing batch get");
        let output = transport
            .batch_get_item(input)
            .await
            .map_err(|e| transport_error_to_facet(StoreOperation::BatchGetItem, e))?;
        for (table, items) in output.responses {
            outcome
                .items
                .extend(items.into_iter().map(|item| (table.clone(), item)));
        }
        for (table, pending) in output.unprocessed_keys {
            warn!(table = %table, keys = pending.keys.len(), "batch get left keys unprocessed");
            outcome
                .unprocessed
                .extend(pending.keys.into_iter().map(|key| (table.clone(), key)));
        }
    }
    Ok(outcome)
}

/// Send every chunk of a batch write.
pub async fn execute_writes(
    transport: &dyn Transport,
    inputs: Vec<BatchWriteItemInput>,
) -> Result<BatchWriteOutcome> {
    let mut outcome = BatchWriteOutcome::default();
    let chunks = inputs.len();
    for (i, input) in inputs.into_iter().enumerate() {
        debug!(chunk = i + 1, chunks, "executing batch write");
        let output = transport
            .batch_write_item(input)
            .await
            .map_err(|e| transport_error_to_facet(StoreOperation::BatchWriteItem, e))?;
        for (table, pending) in output.unprocessed_items {
            warn!(table = %table, requests = pending.len(), "batch write left requests unprocessed");
            outcome
                .unprocessed
                .extend(pending.into_iter().map(|request| (table.clone(), request)));
        }
    }
    Ok(outcome)
}
