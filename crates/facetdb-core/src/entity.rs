//! Entities and their fluent operation builders.
//!
//! An [`Entity`] owns a validated [`Schema`] plus the runtime pieces needed
//! to execute operations: table name, transport and clock. Every operation
//! builder offers `params()` to inspect the store input it would send,
//! `commit()` to enlist it in a transaction and `go()` to execute it.

use std::fmt;
use std::sync::Arc;

use chrono::Duration;
use facetdb_model::input::{
    BatchGetItemInput, BatchWriteItemInput, DeleteItemInput, GetItemInput, PutItemInput,
    QueryInput, ScanInput, UpdateItemInput,
};
use facetdb_model::types::{ReturnValue, TransactConditionCheck, WriteRequest};
use facetdb_model::{AttributeValue, Item, Key};

use crate::batch::{chunk_gets, chunk_writes, execute_gets, execute_writes};
use crate::clock::{Clock, SystemClock};
use crate::config::FacetConfig;
use crate::enrich::{Ttl, is_expired, time_until, ttl_of};
use crate::error::{Result, no_client};
use crate::executor::{Executor, Page, shape_item};
use crate::expression::filter::where_callback;
use crate::expression::{ExpressionCompiler, UpdateAction, UpdateIntent, WhereCallback};
use crate::params::{
    GetOptions, Order, ParamsBuilder, QueryOptions, ScanOptions, SortCondition, WriteOptions,
};
use crate::schema::Schema;
use crate::transaction::{TransactionAction, TransactionItem};
use crate::transport::Transport;

/// An entity bound to its runtime configuration.
#[derive(Clone)]
pub struct Entity {
    schema: Arc<Schema>,
    config: FacetConfig,
    table: Option<String>,
    transport: Option<Arc<dyn Transport>>,
    clock: Arc<dyn Clock>,
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entity")
            .field("entity", &self.schema.entity)
            .field("service", &self.schema.service)
            .field("table", &self.table())
            .field("transport", &self.transport.is_some())
            .finish_non_exhaustive()
    }
}

impl Entity {
    /// Validate `schema` and build an entity with default configuration and
    /// the system clock.
    pub fn new(schema: Schema) -> Result<Self> {
        schema.validate()?;
        Ok(Self {
            schema: Arc::new(schema),
            config: FacetConfig::default(),
            table: None,
            transport: None,
            clock: Arc::new(SystemClock),
        })
    }

    /// Use `config`. Its table, if any, overrides the schema's.
    #[must_use]
    pub fn with_config(mut self, config: FacetConfig) -> Self {
        if let Some(table) = &config.table {
            self.table = Some(table.clone());
        }
        self.config = config;
        self
    }

    /// Override the table name.
    #[must_use]
    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    /// Execute operations through `transport`.
    #[must_use]
    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Read time from `clock`.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Fill in the table and transport of a service the entity joins. The
    /// entity's own settings win.
    pub(crate) fn inherit(&mut self, table: Option<&str>, transport: Option<&Arc<dyn Transport>>) {
        if self.table.is_none() {
            self.table = table.map(str::to_owned);
        }
        if self.transport.is_none() {
            self.transport = transport.cloned();
        }
    }

    /// The entity's schema.
    #[must_use]
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// The entity name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.schema.entity
    }

    /// The resolved table name; empty when none is configured.
    #[must_use]
    pub fn table(&self) -> &str {
        self.table.as_deref().unwrap_or(&self.schema.table)
    }

    /// Runtime configuration.
    #[must_use]
    pub fn config(&self) -> &FacetConfig {
        &self.config
    }

    /// A params builder bound to this entity.
    #[must_use]
    pub fn params(&self) -> ParamsBuilder<'_> {
        ParamsBuilder::new(&self.schema, self.table(), self.clock.as_ref())
    }

    pub(crate) fn transport(&self) -> Result<&dyn Transport> {
        self.transport
            .as_deref()
            .ok_or_else(|| no_client(&self.schema.entity))
    }

    pub(crate) fn executor(&self) -> Result<Executor<'_>> {
        Ok(Executor::new(self.transport()?, &self.schema))
    }

    /// Shape a stored item for the caller.
    #[must_use]
    pub fn shape(&self, item: &Item) -> Item {
        shape_item(&self.schema, item)
    }

    /// Returns `true` when `item` carries an expiry that has passed.
    #[must_use]
    pub fn is_expired(&self, item: &Item) -> bool {
        ttl_of(&self.schema, item).is_some_and(|ttl| is_expired(self.clock.as_ref(), ttl))
    }

    /// Time left before `item` expires; `None` without an expiry.
    #[must_use]
    pub fn time_to_live(&self, item: &Item) -> Option<Duration> {
        ttl_of(&self.schema, item).map(|ttl| time_until(self.clock.as_ref(), ttl))
    }

    // -- operations ---------------------------------------------------------

    /// Read one item.
    #[must_use]
    pub fn get(&self, facets: Item) -> GetOperation<'_> {
        GetOperation {
            entity: self,
            facets,
            options: GetOptions::default(),
        }
    }

    /// Write an item, replacing any existing one.
    #[must_use]
    pub fn put(&self, item: Item) -> PutOperation<'_> {
        PutOperation {
            entity: self,
            item,
            create: false,
            options: WriteOptions::default(),
        }
    }

    /// Write an item that must not exist yet.
    #[must_use]
    pub fn create(&self, item: Item) -> PutOperation<'_> {
        PutOperation {
            create: true,
            ..self.put(item)
        }
    }

    /// Write every attribute of an item, creating it when absent.
    #[must_use]
    pub fn upsert(&self, item: Item) -> UpsertOperation<'_> {
        UpsertOperation {
            entity: self,
            item,
            options: WriteOptions::default(),
        }
    }

    /// Modify an item.
    #[must_use]
    pub fn update(&self, facets: Item) -> UpdateOperation<'_> {
        UpdateOperation {
            entity: self,
            facets,
            intent: UpdateIntent::new(),
            patch: false,
            options: WriteOptions::default(),
        }
    }

    /// Modify an item that must exist.
    #[must_use]
    pub fn patch(&self, facets: Item) -> UpdateOperation<'_> {
        UpdateOperation {
            patch: true,
            ..self.update(facets)
        }
    }

    /// Delete an item.
    #[must_use]
    pub fn delete(&self, facets: Item) -> DeleteOperation<'_> {
        DeleteOperation {
            entity: self,
            facets,
            remove: false,
            options: WriteOptions::default(),
        }
    }

    /// Delete an item that must exist.
    #[must_use]
    pub fn remove(&self, facets: Item) -> DeleteOperation<'_> {
        DeleteOperation {
            remove: true,
            ..self.delete(facets)
        }
    }

    /// A transactional condition check on an item.
    pub fn check<F>(&self, facets: Item, condition: F) -> ConditionCheckOperation<'_>
    where
        F: Fn(&mut ExpressionCompiler<'_>) -> String + Send + Sync + 'static,
    {
        ConditionCheckOperation {
            entity: self,
            facets,
            condition: where_callback(condition),
        }
    }

    /// Query an access pattern.
    #[must_use]
    pub fn query(&self, access_pattern: impl Into<String>, facets: Item) -> QueryOperation<'_> {
        QueryOperation {
            entity: self,
            access_pattern: access_pattern.into(),
            facets,
            options: QueryOptions::default(),
        }
    }

    /// Scan the table for this entity's items.
    #[must_use]
    pub fn scan(&self) -> ScanOperation<'_> {
        ScanOperation {
            entity: self,
            options: ScanOptions::default(),
        }
    }

    /// Read many items by primary key.
    #[must_use]
    pub fn batch_get(&self, facets: Vec<Item>) -> BatchGetOperation<'_> {
        BatchGetOperation {
            entity: self,
            facets,
        }
    }

    /// Put and delete many items.
    #[must_use]
    pub fn batch_write(&self) -> BatchWriteOperation<'_> {
        BatchWriteOperation {
            entity: self,
            puts: Vec::new(),
            deletes: Vec::new(),
        }
    }

    fn enlist(&self, action: TransactionAction) -> TransactionItem {
        TransactionItem::new(self.schema.entity.clone(), action)
    }
}

// ---------------------------------------------------------------------------
// Single item operations
// ---------------------------------------------------------------------------

/// A pending get.
#[derive(Debug)]
pub struct GetOperation<'e> {
    entity: &'e Entity,
    facets: Item,
    options: GetOptions,
}

impl GetOperation<'_> {
    /// Only read `attributes`.
    #[must_use]
    pub fn attributes<I, S>(mut self, attributes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options.attributes = attributes.into_iter().map(Into::into).collect();
        self
    }

    /// Request a strongly consistent read.
    #[must_use]
    pub fn consistent(mut self) -> Self {
        self.options.consistent = true;
        self
    }

    /// Return what the store sent back without shaping it.
    #[must_use]
    pub fn raw(mut self) -> Self {
        self.options.raw = true;
        self
    }

    /// The store input.
    pub fn params(&self) -> Result<GetItemInput> {
        self.entity.params().get(&self.facets, &self.options)
    }

    /// Enlist in a read transaction.
    pub fn commit(&self) -> Result<TransactionItem> {
        Ok(self.entity.enlist(TransactionAction::Get(self.params()?)))
    }

    /// Execute; `None` when the item does not exist.
    pub async fn go(&self) -> Result<Option<Item>> {
        let input = self.params()?;
        self.entity.executor()?.raw(self.options.raw).get(input).await
    }
}

/// A pending put or create.
#[derive(Debug)]
pub struct PutOperation<'e> {
    entity: &'e Entity,
    item: Item,
    create: bool,
    options: WriteOptions,
}

impl PutOperation<'_> {
    /// Only write when `condition` holds.
    #[must_use]
    pub fn condition<F>(mut self, condition: F) -> Self
    where
        F: Fn(&mut ExpressionCompiler<'_>) -> String + Send + Sync + 'static,
    {
        self.options.condition = Some(where_callback(condition));
        self
    }

    /// Ask the store to return values.
    #[must_use]
    pub fn return_values(mut self, return_values: ReturnValue) -> Self {
        self.options.return_values = Some(return_values);
        self
    }

    /// Expire the item `duration` after the write.
    #[must_use]
    pub fn ttl(mut self, duration: Duration) -> Self {
        self.options.ttl = Some(Ttl::After(duration));
        self
    }

    /// Expire the item at `seconds` (unix time).
    #[must_use]
    pub fn ttl_at(mut self, seconds: i64) -> Self {
        self.options.ttl = Some(Ttl::At(seconds));
        self
    }

    /// Return what the store sent back without shaping it.
    #[must_use]
    pub fn raw(mut self) -> Self {
        self.options.raw = true;
        self
    }

    /// The store input.
    pub fn params(&self) -> Result<PutItemInput> {
        let params = self.entity.params();
        if self.create {
            params.create(&self.item, &self.options)
        } else {
            params.put(&self.item, &self.options)
        }
    }

    /// Enlist in a write transaction.
    pub fn commit(&self) -> Result<TransactionItem> {
        Ok(self.entity.enlist(TransactionAction::Put(self.params()?)))
    }

    /// Execute, returning the item as it will read back.
    pub async fn go(&self) -> Result<Item> {
        let input = self.params()?;
        self.entity.executor()?.raw(self.options.raw).put(input).await
    }
}

/// A pending upsert.
#[derive(Debug)]
pub struct UpsertOperation<'e> {
    entity: &'e Entity,
    item: Item,
    options: WriteOptions,
}

impl UpsertOperation<'_> {
    /// Only write when `condition` holds.
    #[must_use]
    pub fn condition<F>(mut self, condition: F) -> Self
    where
        F: Fn(&mut ExpressionCompiler<'_>) -> String + Send + Sync + 'static,
    {
        self.options.condition = Some(where_callback(condition));
        self
    }

    /// Expire the item `duration` after the write.
    #[must_use]
    pub fn ttl(mut self, duration: Duration) -> Self {
        self.options.ttl = Some(Ttl::After(duration));
        self
    }

    /// Expire the item at `seconds` (unix time).
    #[must_use]
    pub fn ttl_at(mut self, seconds: i64) -> Self {
        self.options.ttl = Some(Ttl::At(seconds));
        self
    }

    /// Return what the store sent back without shaping it.
    #[must_use]
    pub fn raw(mut self) -> Self {
        self.options.raw = true;
        self
    }

    /// The store input.
    pub fn params(&self) -> Result<UpdateItemInput> {
        self.entity.params().upsert(&self.item, &self.options)
    }

    /// Enlist in a write transaction.
    pub fn commit(&self) -> Result<TransactionItem> {
        Ok(self.entity.enlist(TransactionAction::Update(self.params()?)))
    }

    /// Execute, returning the stored item.
    pub async fn go(&self) -> Result<Item> {
        let input = self.params()?;
        self.entity.executor()?.raw(self.options.raw).update(input).await
    }
}

/// A pending update or patch.
#[derive(Debug)]
pub struct UpdateOperation<'e> {
    entity: &'e Entity,
    facets: Item,
    intent: UpdateIntent,
    patch: bool,
    options: WriteOptions,
}

impl UpdateOperation<'_> {
    fn action(mut self, attribute: impl Into<String>, action: UpdateAction) -> Self {
        self.intent.push(attribute, action);
        self
    }

    /// Assign a value.
    #[must_use]
    pub fn set(self, attribute: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        self.action(attribute, UpdateAction::Assign(value.into()))
    }

    /// Assign every attribute of `values`, in name order.
    #[must_use]
    pub fn set_all(mut self, values: Item) -> Self {
        let mut values: Vec<_> = values.into_iter().collect();
        values.sort_by(|a, b| a.0.cmp(&b.0));
        for (attribute, value) in values {
            self.intent.push(attribute, UpdateAction::Assign(value));
        }
        self
    }

    /// Increment a number.
    #[must_use]
    pub fn add(self, attribute: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        self.action(attribute, UpdateAction::Add(value.into()))
    }

    /// Decrement a number.
    #[must_use]
    pub fn subtract(self, attribute: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        self.action(attribute, UpdateAction::Subtract(value.into()))
    }

    /// Append to a list.
    #[must_use]
    pub fn append(self, attribute: impl Into<String>, values: Vec<AttributeValue>) -> Self {
        self.action(attribute, UpdateAction::Append(AttributeValue::L(values)))
    }

    /// Prepend to a list.
    #[must_use]
    pub fn prepend(self, attribute: impl Into<String>, values: Vec<AttributeValue>) -> Self {
        self.action(attribute, UpdateAction::Prepend(AttributeValue::L(values)))
    }

    /// Add members to a set.
    #[must_use]
    pub fn add_to_set(self, attribute: impl Into<String>, members: AttributeValue) -> Self {
        self.action(attribute, UpdateAction::AddToSet(members))
    }

    /// Remove members from a set.
    #[must_use]
    pub fn delete_from_set(self, attribute: impl Into<String>, members: AttributeValue) -> Self {
        self.action(attribute, UpdateAction::DeleteFromSet(members))
    }

    /// Remove an attribute.
    #[must_use]
    pub fn remove(self, attribute: impl Into<String>) -> Self {
        self.action(attribute, UpdateAction::Remove)
    }

    /// Remove list elements by position.
    #[must_use]
    pub fn remove_indexes(
        self,
        attribute: impl Into<String>,
        indexes: impl IntoIterator<Item = usize>,
    ) -> Self {
        let indexes = indexes.into_iter().collect();
        self.action(attribute, UpdateAction::RemoveIndexes(indexes))
    }

    /// Only update when `condition` holds.
    #[must_use]
    pub fn condition<F>(mut self, condition: F) -> Self
    where
        F: Fn(&mut ExpressionCompiler<'_>) -> String + Send + Sync + 'static,
    {
        self.options.condition = Some(where_callback(condition));
        self
    }

    /// Ask the store to return values (default `ALL_NEW`).
    #[must_use]
    pub fn return_values(mut self, return_values: ReturnValue) -> Self {
        self.options.return_values = Some(return_values);
        self
    }

    /// Expire the item `duration` after the write.
    #[must_use]
    pub fn ttl(mut self, duration: Duration) -> Self {
        self.options.ttl = Some(Ttl::After(duration));
        self
    }

    /// Expire the item at `seconds` (unix time).
    #[must_use]
    pub fn ttl_at(mut self, seconds: i64) -> Self {
        self.options.ttl = Some(Ttl::At(seconds));
        self
    }

    /// Remove the item's expiry.
    #[must_use]
    pub fn remove_ttl(mut self) -> Self {
        self.options.remove_ttl = true;
        self
    }

    /// Return what the store sent back without shaping it.
    #[must_use]
    pub fn raw(mut self) -> Self {
        self.options.raw = true;
        self
    }

    /// The store input.
    pub fn params(&self) -> Result<UpdateItemInput> {
        let params = self.entity.params();
        if self.patch {
            params.patch(&self.facets, &self.intent, &self.options)
        } else {
            params.update(&self.facets, &self.intent, &self.options)
        }
    }

    /// Enlist in a write transaction.
    pub fn commit(&self) -> Result<TransactionItem> {
        Ok(self.entity.enlist(TransactionAction::Update(self.params()?)))
    }

    /// Execute, returning the attributes the store sent back.
    pub async fn go(&self) -> Result<Item> {
        let input = self.params()?;
        self.entity.executor()?.raw(self.options.raw).update(input).await
    }
}

/// A pending delete or remove.
#[derive(Debug)]
pub struct DeleteOperation<'e> {
    entity: &'e Entity,
    facets: Item,
    remove: bool,
    options: WriteOptions,
}

impl DeleteOperation<'_> {
    /// Only delete when `condition` holds.
    #[must_use]
    pub fn condition<F>(mut self, condition: F) -> Self
    where
        F: Fn(&mut ExpressionCompiler<'_>) -> String + Send + Sync + 'static,
    {
        self.options.condition = Some(where_callback(condition));
        self
    }

    /// Ask the store to return values.
    #[must_use]
    pub fn return_values(mut self, return_values: ReturnValue) -> Self {
        self.options.return_values = Some(return_values);
        self
    }

    /// Return what the store sent back without shaping it.
    #[must_use]
    pub fn raw(mut self) -> Self {
        self.options.raw = true;
        self
    }

    /// The store input.
    pub fn params(&self) -> Result<DeleteItemInput> {
        let params = self.entity.params();
        if self.remove {
            params.remove(&self.facets, &self.options)
        } else {
            params.delete(&self.facets, &self.options)
        }
    }

    /// Enlist in a write transaction.
    pub fn commit(&self) -> Result<TransactionItem> {
        Ok(self.entity.enlist(TransactionAction::Delete(self.params()?)))
    }

    /// Execute, returning the attributes the store sent back.
    pub async fn go(&self) -> Result<Item> {
        let input = self.params()?;
        self.entity.executor()?.raw(self.options.raw).delete(input).await
    }
}

/// A pending transactional condition check.
pub struct ConditionCheckOperation<'e> {
    entity: &'e Entity,
    facets: Item,
    condition: WhereCallback,
}

impl fmt::Debug for ConditionCheckOperation<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConditionCheckOperation")
            .field("entity", &self.entity.name())
            .field("facets", &self.facets)
            .finish_non_exhaustive()
    }
}

impl ConditionCheckOperation<'_> {
    /// The transaction element.
    pub fn params(&self) -> Result<TransactConditionCheck> {
        self.entity.params().check(&self.facets, &self.condition)
    }

    /// Enlist in a write transaction.
    pub fn commit(&self) -> Result<TransactionItem> {
        Ok(self
            .entity
            .enlist(TransactionAction::ConditionCheck(self.params()?)))
    }
}

// ---------------------------------------------------------------------------
// Query and scan
// ---------------------------------------------------------------------------

/// A pending query.
#[derive(Debug)]
pub struct QueryOperation<'e> {
    entity: &'e Entity,
    access_pattern: String,
    facets: Item,
    options: QueryOptions,
}

impl QueryOperation<'_> {
    fn sort(mut self, condition: SortCondition) -> Self {
        self.options.sort = Some(condition);
        self
    }

    /// Sort key equals the key built from `facets`.
    #[must_use]
    pub fn eq(self, facets: Item) -> Self {
        self.sort(SortCondition::Eq(facets))
    }

    /// Sort key greater than.
    #[must_use]
    pub fn gt(self, facets: Item) -> Self {
        self.sort(SortCondition::Gt(facets))
    }

    /// Sort key greater than or equal.
    #[must_use]
    pub fn gte(self, facets: Item) -> Self {
        self.sort(SortCondition::Gte(facets))
    }

    /// Sort key less than.
    #[must_use]
    pub fn lt(self, facets: Item) -> Self {
        self.sort(SortCondition::Lt(facets))
    }

    /// Sort key less than or equal.
    #[must_use]
    pub fn lte(self, facets: Item) -> Self {
        self.sort(SortCondition::Lte(facets))
    }

    /// Sort key between two keys, inclusive.
    #[must_use]
    pub fn between(self, start: Item, end: Item) -> Self {
        self.sort(SortCondition::Between(start, end))
    }

    /// Sort key begins with the key built from `facets`.
    #[must_use]
    pub fn begins(self, facets: Item) -> Self {
        self.sort(SortCondition::Begins(facets))
    }

    /// Add a filter.
    #[must_use]
    pub fn filter<F>(mut self, filter: F) -> Self
    where
        F: Fn(&mut ExpressionCompiler<'_>) -> String + Send + Sync + 'static,
    {
        self.options.filters.push_where(where_callback(filter));
        self
    }

    /// Apply a filter declared on the schema.
    #[must_use]
    pub fn named_filter(mut self, name: impl Into<String>, params: Item) -> Self {
        self.options.filters.push_named(name, params);
        self
    }

    /// Only read `attributes`.
    #[must_use]
    pub fn attributes<I, S>(mut self, attributes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options.attributes = attributes.into_iter().map(Into::into).collect();
        self
    }

    /// Page size.
    #[must_use]
    pub fn limit(mut self, limit: i32) -> Self {
        self.options.limit = Some(limit);
        self
    }

    /// Result ordering.
    #[must_use]
    pub fn order(mut self, order: Order) -> Self {
        self.options.order = order;
        self
    }

    /// Resume from a cursor returned by an earlier page.
    #[must_use]
    pub fn cursor(mut self, cursor: impl Into<String>) -> Self {
        self.options.cursor = Some(cursor.into());
        self
    }

    /// Start from the first page even when a cursor is set.
    #[must_use]
    pub fn ignore_cursor(mut self) -> Self {
        self.options.ignore_cursor = true;
        self
    }

    /// Follow at most `pages` pages in [`pages`](Self::pages); `0` means no
    /// bound.
    #[must_use]
    pub fn max_pages(mut self, pages: usize) -> Self {
        self.options.pages = Some(pages);
        self
    }

    /// Return what the store sent back without shaping it.
    #[must_use]
    pub fn raw(mut self) -> Self {
        self.options.raw = true;
        self
    }

    /// The store input.
    pub fn params(&self) -> Result<QueryInput> {
        self.entity
            .params()
            .query(&self.access_pattern, &self.facets, &self.options)
    }

    /// Execute one page.
    pub async fn go(&self) -> Result<Page> {
        let input = self.params()?;
        self.entity.executor()?.raw(self.options.raw).query(input).await
    }

    /// Follow every page, bounded by [`max_pages`](Self::max_pages) or else
    /// the configured page limit.
    pub async fn pages(&self) -> Result<Vec<Item>> {
        let input = self.params()?;
        self.entity
            .executor()?
            .raw(self.options.raw)
            .query_pages(input, self.options.pages.unwrap_or(self.entity.config.max_pages))
            .await
    }
}

/// A pending scan.
#[derive(Debug)]
pub struct ScanOperation<'e> {
    entity: &'e Entity,
    options: ScanOptions,
}

impl ScanOperation<'_> {
    /// Add a filter.
    #[must_use]
    pub fn filter<F>(mut self, filter: F) -> Self
    where
        F: Fn(&mut ExpressionCompiler<'_>) -> String + Send + Sync + 'static,
    {
        self.options.filters.push_where(where_callback(filter));
        self
    }

    /// Apply a filter declared on the schema.
    #[must_use]
    pub fn named_filter(mut self, name: impl Into<String>, params: Item) -> Self {
        self.options.filters.push_named(name, params);
        self
    }

    /// Only read `attributes`.
    #[must_use]
    pub fn attributes<I, S>(mut self, attributes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options.attributes = attributes.into_iter().map(Into::into).collect();
        self
    }

    /// Page size.
    #[must_use]
    pub fn limit(mut self, limit: i32) -> Self {
        self.options.limit = Some(limit);
        self
    }

    /// Resume from a cursor returned by an earlier page.
    #[must_use]
    pub fn cursor(mut self, cursor: impl Into<String>) -> Self {
        self.options.cursor = Some(cursor.into());
        self
    }

    /// Start from the first page even when a cursor is set.
    #[must_use]
    pub fn ignore_cursor(mut self) -> Self {
        self.options.ignore_cursor = true;
        self
    }

    /// Follow at most `pages` pages in [`pages`](Self::pages); `0` means no
    /// bound.
    #[must_use]
    pub fn max_pages(mut self, pages: usize) -> Self {
        self.options.pages = Some(pages);
        self
    }

    /// Return what the store sent back without shaping it.
    #[must_use]
    pub fn raw(mut self) -> Self {
        self.options.raw = true;
        self
    }

    /// The store input.
    pub fn params(&self) -> Result<ScanInput> {
        self.entity.params().scan(&self.options)
    }

    /// Execute one page.
    pub async fn go(&self) -> Result<Page> {
        let input = self.params()?;
        self.entity.executor()?.raw(self.options.raw).scan(input).await
    }

    /// Follow every page, bounded by [`max_pages`](Self::max_pages) or else
    /// the configured page limit.
    pub async fn pages(&self) -> Result<Vec<Item>> {
        let input = self.params()?;
        self.entity
            .executor()?
            .raw(self.options.raw)
            .scan_pages(input, self.options.pages.unwrap_or(self.entity.config.max_pages))
            .await
    }
}

// ---------------------------------------------------------------------------
// Batch
// ---------------------------------------------------------------------------

/// Result of a batch read.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchGetResult {
    /// Shaped items in response order.
    pub items: Vec<Item>,
    /// Keys the store did not process.
    pub unprocessed: Vec<Key>,
}

/// A pending batch read.
#[derive(Debug)]
pub struct BatchGetOperation<'e> {
    entity: &'e Entity,
    facets: Vec<Item>,
}

impl<'e> BatchGetOperation<'e> {
    pub(crate) fn entity(&self) -> &'e Entity {
        self.entity
    }

    pub(crate) fn keys(&self) -> Result<Vec<(String, Key)>> {
        let params = self.entity.params();
        let table = params.table()?;
        Ok(params
            .batch_get_keys(&self.facets)?
            .into_iter()
            .map(|key| (table.clone(), key))
            .collect())
    }

    /// The store inputs, one per chunk.
    pub fn params(&self) -> Result<Vec<BatchGetItemInput>> {
        Ok(chunk_gets(self.keys()?, self.entity.config.batch_get_chunk))
    }

    /// Execute every chunk.
    pub async fn go(&self) -> Result<BatchGetResult> {
        let inputs = self.params()?;
        let outcome = execute_gets(self.entity.transport()?, inputs).await?;
        Ok(BatchGetResult {
            items: outcome
                .items
                .iter()
                .map(|(_, item)| self.entity.shape(item))
                .collect(),
            unprocessed: outcome.unprocessed.into_iter().map(|(_, key)| key).collect(),
        })
    }
}

/// A pending batch write.
#[derive(Debug)]
pub struct BatchWriteOperation<'e> {
    entity: &'e Entity,
    puts: Vec<Item>,
    deletes: Vec<Item>,
}

impl<'e> BatchWriteOperation<'e> {
    pub(crate) fn entity(&self) -> &'e Entity {
        self.entity
    }

    /// Put `items`.
    #[must_use]
    pub fn put(mut self, items: Vec<Item>) -> Self {
        self.puts.extend(items);
        self
    }

    /// Delete the items addressed by `facets`.
    #[must_use]
    pub fn delete(mut self, facets: Vec<Item>) -> Self {
        self.deletes.extend(facets);
        self
    }

    pub(crate) fn requests(&self) -> Result<Vec<(String, WriteRequest)>> {
        let params = self.entity.params();
        let table = params.table()?;
        let mut requests = params.batch_put_requests(&self.puts)?;
        requests.extend(params.batch_delete_requests(&self.deletes)?);
        Ok(requests
            .into_iter()
            .map(|request| (table.clone(), request))
            .collect())
    }

    /// The store inputs, one per chunk. Puts come before deletes.
    pub fn params(&self) -> Result<Vec<BatchWriteItemInput>> {
        Ok(chunk_writes(self.requests()?, self.entity.config.batch_write_chunk))
    }

    /// Execute every chunk, returning the requests the store left
    /// unprocessed.
    pub async fn go(&self) -> Result<Vec<WriteRequest>> {
        let inputs = self.params()?;
        let outcome = execute_writes(self.entity.transport()?, inputs).await?;
        Ok(outcome.unprocessed.into_iter().map(|(_, r)| r).collect())
    }
}
