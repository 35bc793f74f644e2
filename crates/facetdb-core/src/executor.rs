//! Runs built inputs through a [`Transport`] and shapes what comes back.
//!
//! Read shaping drops everything that is not an entity attribute (composite
//! key fields in particular), strips padding and applies read transforms.

use facetdb_model::input::{
    DeleteItemInput, GetItemInput, PutItemInput, QueryInput, ScanInput, UpdateItemInput,
};
use facetdb_model::{Item, Key, StoreOperation};
use tracing::debug;

use crate::cursor;
use crate::enrich::remove_padding;
use crate::error::{Result, cursor_error_to_facet, transport_error_to_facet};
use crate::schema::Schema;
use crate::transport::Transport;
use crate::validate::Validator;

/// One page of shaped results.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    /// Items of this page.
    pub items: Vec<Item>,
    /// Cursor of the next page; `None` on the last page.
    pub cursor: Option<String>,
}

/// Shape a stored item for the caller.
#[must_use]
pub fn shape_item(schema: &Schema, item: &Item) -> Item {
    let mut kept: Item = item
        .iter()
        .filter(|(name, _)| schema.is_entity_attribute(name))
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect();
    remove_padding(schema, &mut kept);
    Validator::new(schema).transform_for_read(&kept)
}

fn encode_cursor(last_key: &Key) -> Result<Option<String>> {
    let encoded = cursor::encode(last_key).map_err(cursor_error_to_facet)?;
    Ok((!encoded.is_empty()).then_some(encoded))
}

/// Executes inputs for one entity.
#[derive(Clone, Copy)]
pub struct Executor<'a> {
    transport: &'a dyn Transport,
    schema: &'a Schema,
    raw: bool,
}

impl std::fmt::Debug for Executor<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Executor")
            .field("entity", &self.schema.entity)
            .field("raw", &self.raw)
            .finish_non_exhaustive()
    }
}

impl<'a> Executor<'a> {
    /// An executor for `schema` over `transport`.
    #[must_use]
    pub fn new(transport: &'a dyn Transport, schema: &'a Schema) -> Self {
        Self {
            transport,
            schema,
            raw: false,
        }
    }

    /// Hand back stored items as the store returned them.
    #[must_use]
    pub fn raw(mut self, raw: bool) -> Self {
        self.raw = raw;
        self
    }

    fn shape(&self, item: &Item) -> Item {
        if self.raw {
            item.clone()
        } else {
            shape_item(self.schema, item)
        }
    }

    fn trace(&self, operation: StoreOperation, table: &str) {
        debug!(entity = %self.schema.entity, %operation, table, "executing");
    }

    /// Read one item; `None` when it does not exist.
    pub async fn get(&self, input: GetItemInput) -> Result<Option<Item>> {
        self.trace(StoreOperation::GetItem, &input.table_name);
        let output = self
            .transport
            .get_item(input)
            .await
            .map_err(|e| transport_error_to_facet(StoreOperation::GetItem, e))?;
        Ok(output.item.map(|item| self.shape(&item)))
    }

    /// Write one item and return it as the caller will read it back.
    pub async fn put(&self, input: PutItemInput) -> Result<Item> {
        self.trace(StoreOperation::PutItem, &input.table_name);
        let written = self.shape(&input.item);
        self.transport
            .put_item(input)
            .await
            .map_err(|e| transport_error_to_facet(StoreOperation::PutItem, e))?;
        Ok(written)
    }

    /// Update one item and return the attributes the store sent back.
    pub async fn update(&self, input: UpdateItemInput) -> Result<Item> {
        self.trace(StoreOperation::UpdateItem, &input.table_name);
        let output = self
            .transport
            .update_item(input)
            .await
            .map_err(|e| transport_error_to_facet(StoreOperation::UpdateItem, e))?;
        Ok(self.shape(&output.attributes))
    }

    /// Delete one item and return the attributes the store sent back.
    pub async fn delete(&self, input: DeleteItemInput) -> Result<Item> {
        self.trace(StoreOperation::DeleteItem, &input.table_name);
        let output = self
            .transport
            .delete_item(input)
            .await
            .map_err(|e| transport_error_to_facet(StoreOperation::DeleteItem, e))?;
        Ok(self.shape(&output.attributes))
    }

    /// Run one query page.
    pub async fn query(&self, input: QueryInput) -> Result<Page> {
        self.trace(StoreOperation::Query, &input.table_name);
        let output = self
            .transport
            .query(input)
            .await
            .map_err(|e| transport_error_to_facet(StoreOperation::Query, e))?;
        Ok(Page {
            items: output.items.iter().map(|i| self.shape(i)).collect(),
            cursor: encode_cursor(&output.last_evaluated_key)?,
        })
    }

    /// Run one scan page.
    pub async fn scan(&self, input: ScanInput) -> Result<Page> {
        self.trace(StoreOperation::Scan, &input.table_name);
        let output = self
            .transport
            .scan(input)
            .await
            .map_err(|e| transport_error_to_facet(StoreOperation::Scan, e))?;
        Ok(Page {
            items: output.items.iter().map(|i| self.shape(i)).collect(),
            cursor: encode_cursor(&output.last_evaluated_key)?,
        })
    }

    /// Follow query pages until the store reports no resume point or
    /// `max_pages` pages were read (`0` means no bound).
    pub async fn query_pages(&self, mut input: QueryInput, max_pages: usize) -> Result<Vec<Item>> {
        let mut items = Vec::new();
        let mut pages = 0;
        loop {
            self.trace(StoreOperation::Query, &input.table_name);
            let output = self
                .transport
                .query(input.clone())
                .await
                .map_err(|e| transport_error_to_facet(StoreOperation::Query, e))?;
            pages += 1;
            items.extend(output.items.iter().map(|i| self.shape(i)));
            if output.last_evaluated_key.is_empty() || (max_pages > 0 && pages >= max_pages) {
                break;
            }
            input.exclusive_start_key = output.last_evaluated_key;
        }
        debug!(entity = %self.schema.entity, pages, items = items.len(), "collected query pages");
        Ok(items)
    }

    /// Follow scan pages; see [`query_pages`](Self::query_pages).
    pub async fn scan_pages(&self, mut input: ScanInput, max_pages: usize) -> Result<Vec<Item>> {
        let mut items = Vec::new();
        let mut pages = 0;
        loop {
            self.trace(StoreOperation::Scan, &input.table_name);
            let output = self
                .transport
                .scan(input.clone())
                .await
                .map_err(|e| transport_error_to_facet(StoreOperation::Scan, e))?;
            pages += 1;
            items.extend(output.items.iter().map(|i| self.shape(i)));
            if output.last_evaluated_key.is_empty() || (max_pages > 0 && pages >= max_pages) {
                break;
            }
            input.exclusive_start_key = output.last_evaluated_key;
        }
        debug!(entity = %self.schema.entity, pages, items = items.len(), "collected scan pages");
        Ok(items)
    }
}
