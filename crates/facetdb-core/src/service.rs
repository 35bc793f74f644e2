//! Services group entities sharing one table.
//!
//! Joining an entity registers its access patterns into collections. A
//! collection is named by the index's declared collection, or by the access
//! pattern name when none is declared, and queries every member entity
//! through its own access pattern.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;
use std::sync::Arc;

use facetdb_model::input::{QueryInput, TransactGetItemsInput, TransactWriteItemsInput};
use facetdb_model::types::WriteRequest;
use facetdb_model::{ErrorCode, FacetError, Item, Key, StoreOperation, facet_error};
use tracing::{debug, info};

use crate::batch::{chunk_gets, chunk_writes, execute_gets, execute_writes};
use crate::config::FacetConfig;
use crate::entity::{BatchGetOperation, BatchWriteOperation, Entity};
use crate::error::{Result, transport_error_to_facet};
use crate::expression::ExpressionCompiler;
use crate::expression::filter::where_callback;
use crate::params::{Order, QueryOptions, SortCondition};
use crate::transaction::{TransactionItem, get_input, write_input};
use crate::transport::Transport;

/// Access patterns of several entities that share partition facets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Collection {
    /// Collection name.
    pub name: String,
    /// Secondary index the members query; `None` for the primary index.
    pub index: Option<String>,
    /// `(entity, access pattern)` pairs in join order.
    pub members: Vec<(String, String)>,
}

/// A registry of entities.
#[derive(Clone)]
pub struct Service {
    name: String,
    table: Option<String>,
    config: FacetConfig,
    transport: Option<Arc<dyn Transport>>,
    entities: BTreeMap<String, Entity>,
    collections: BTreeMap<String, Collection>,
}

impl fmt::Debug for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Service")
            .field("name", &self.name)
            .field("table", &self.table)
            .field("entities", &self.entities.keys().collect::<Vec<_>>())
            .field("collections", &self.collections.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl Service {
    /// An empty service.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            table: None,
            config: FacetConfig::default(),
            transport: None,
            entities: BTreeMap::new(),
            collections: BTreeMap::new(),
        }
    }

    /// Table inherited by entities that configure none.
    #[must_use]
    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    /// Transport inherited by entities that configure none.
    #[must_use]
    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Configuration for service-level batches. Its table, if any, becomes
    /// the service table.
    #[must_use]
    pub fn with_config(mut self, config: FacetConfig) -> Self {
        if let Some(table) = &config.table {
            self.table = Some(table.clone());
        }
        self.config = config;
        self
    }

    /// The service name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Register `entity`, handing it the service table and transport when
    /// it has none of its own.
    pub fn join(&mut self, mut entity: Entity) -> Result<()> {
        let name = entity.name().to_owned();
        if !entity.schema().service.eq_ignore_ascii_case(&self.name) {
            return Err(FacetError::with_message(
                ErrorCode::InvalidEntity,
                format!(
                    "entity {name} belongs to service {}, not {}",
                    entity.schema().service,
                    self.name
                ),
            ));
        }
        if self.entities.contains_key(&name) {
            return Err(FacetError::with_message(
                ErrorCode::DuplicateEntity,
                format!("entity {name} already joined service {}", self.name),
            ));
        }
        entity.inherit(self.table.as_deref(), self.transport.as_ref());

        for (pattern, index) in &entity.schema().indexes {
            let collection_name = index.collection.clone().unwrap_or_else(|| pattern.clone());
            let collection = self
                .collections
                .entry(collection_name.clone())
                .or_insert_with(|| Collection {
                    name: collection_name,
                    index: index.index.clone(),
                    members: Vec::new(),
                });
            if !collection.members.iter().any(|(e, _)| *e == name) {
                collection.members.push((name.clone(), pattern.clone()));
            }
        }

        info!(service = %self.name, entity = %name, "entity joined");
        self.entities.insert(name, entity);
        Ok(())
    }

    /// Registered entities by name.
    #[must_use]
    pub fn entities(&self) -> &BTreeMap<String, Entity> {
        &self.entities
    }

    /// Look up an entity.
    pub fn entity(&self, name: &str) -> Result<&Entity> {
        self.entities.get(name).ok_or_else(|| {
            FacetError::with_message(
                ErrorCode::EntityNotFound,
                format!("entity {name} not found in service {}", self.name),
            )
        })
    }

    /// Registered collections by name.
    #[must_use]
    pub fn collections(&self) -> &BTreeMap<String, Collection> {
        &self.collections
    }

    /// Look up a collection.
    pub fn collection(&self, name: &str) -> Result<&Collection> {
        self.collections.get(name).ok_or_else(|| {
            FacetError::with_message(
                ErrorCode::CollectionNotFound,
                format!("collection {name} not found in service {}", self.name),
            )
        })
    }

    /// Query every member of collection `name`.
    pub fn query(&self, name: &str, facets: Item) -> Result<CollectionQuery<'_>> {
        Ok(CollectionQuery {
            service: self,
            collection: self.collection(name)?,
            facets,
            options: QueryOptions::default(),
        })
    }

    fn transport(&self) -> Result<&dyn Transport> {
        self.transport.as_deref().ok_or_else(|| {
            FacetError::with_message(
                ErrorCode::NoClientProvided,
                format!("no transport was provided to service {}", self.name),
            )
        })
    }

    // -- batches ------------------------------------------------------------

    /// Read items of several entities in shared chunks. Every returned item
    /// is attributed to the operation that requested its primary key; items
    /// matching no requested key are dropped.
    pub async fn batch_get(&self, operations: &[BatchGetOperation<'_>]) -> Result<ServiceBatchGetResult> {
        let mut keys = Vec::new();
        let mut requested = Vec::with_capacity(operations.len());
        for operation in operations {
            let operation_keys = operation.keys()?;
            requested.push(RequestedKeys::new(operation.entity(), &operation_keys));
            keys.extend(operation_keys);
        }
        let inputs = chunk_gets(keys, self.config.batch_get_chunk);
        let outcome = execute_gets(self.transport()?, inputs).await?;

        let mut result = ServiceBatchGetResult::default();
        for (table, item) in &outcome.items {
            match requested.iter().find(|r| r.requested(table, item)) {
                Some(r) => result
                    .items
                    .entry(r.entity.name().to_owned())
                    .or_default()
                    .push(r.entity.shape(item)),
                None => debug!(service = %self.name, %table, "dropping item matching no requested key"),
            }
        }
        result.unprocessed = outcome.unprocessed.into_iter().map(|(_, key)| key).collect();
        // Entities that were asked for but returned nothing still get an entry.
        for operation in operations {
            result
                .items
                .entry(operation.entity().name().to_owned())
                .or_default();
        }
        Ok(result)
    }

    /// Write items of several entities in shared chunks, returning the
    /// requests the store left unprocessed.
    pub async fn batch_write(&self, operations: &[BatchWriteOperation<'_>]) -> Result<Vec<WriteRequest>> {
        let mut requests = Vec::new();
        for operation in operations {
            requests.extend(operation.requests()?);
        }
        let inputs = chunk_writes(requests, self.config.batch_write_chunk);
        let outcome = execute_writes(self.transport()?, inputs).await?;
        Ok(outcome.unprocessed.into_iter().map(|(_, r)| r).collect())
    }

    // -- transactions -------------------------------------------------------

    /// A write transaction over committed operations.
    #[must_use]
    pub fn transact_write(&self, items: Vec<TransactionItem>) -> TransactWriteOperation<'_> {
        TransactWriteOperation {
            service: self,
            items,
            token: None,
        }
    }

    /// A read transaction over committed gets.
    #[must_use]
    pub fn transact_get(&self, items: Vec<TransactionItem>) -> TransactGetOperation<'_> {
        TransactGetOperation { service: self, items }
    }
}

/// Primary keys one batch operation asked for, fingerprinted by their
/// field values.
struct RequestedKeys<'e> {
    entity: &'e Entity,
    fields: BTreeSet<String>,
    keys: HashSet<(String, String)>,
}

impl<'e> RequestedKeys<'e> {
    fn new(entity: &'e Entity, keys: &[(String, Key)]) -> Self {
        let fields: BTreeSet<String> = keys
            .iter()
            .flat_map(|(_, key)| key.keys().cloned())
            .collect();
        let keys = keys
            .iter()
            .filter_map(|(table, key)| Some((table.clone(), fingerprint(&fields, key)?)))
            .collect();
        Self { entity, fields, keys }
    }

    fn requested(&self, table: &str, item: &Item) -> bool {
        fingerprint(&self.fields, item)
            .is_some_and(|f| self.keys.contains(&(table.to_owned(), f)))
    }
}

/// Key values of `fields` in field order; `None` when one is missing.
fn fingerprint(fields: &BTreeSet<String>, item: &Item) -> Option<String> {
    let parts = fields
        .iter()
        .map(|field| item.get(field).map(|value| format!("{field}={value:?}")))
        .collect::<Option<Vec<_>>>()?;
    Some(parts.join("\u{1f}"))
}

/// Items read by a service batch, grouped by entity.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ServiceBatchGetResult {
    /// Shaped items per entity name.
    pub items: BTreeMap<String, Vec<Item>>,
    /// Keys the store did not process.
    pub unprocessed: Vec<Key>,
}

// ---------------------------------------------------------------------------
// Collection queries
// ---------------------------------------------------------------------------

/// A pending query across a collection.
#[derive(Debug)]
pub struct CollectionQuery<'s> {
    service: &'s Service,
    collection: &'s Collection,
    facets: Item,
    options: QueryOptions,
}

impl CollectionQuery<'_> {
    fn sort(mut self, condition: SortCondition) -> Self {
        self.options.sort = Some(condition);
        self
    }

    /// Sort key equals.
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

    /// Sort key between, inclusive.
    #[must_use]
    pub fn between(self, start: Item, end: Item) -> Self {
        self.sort(SortCondition::Between(start, end))
    }

    /// Sort key begins with.
    #[must_use]
    pub fn begins(self, facets: Item) -> Self {
        self.sort(SortCondition::Begins(facets))
    }

    /// Add a filter applied to every member query.
    #[must_use]
    pub fn filter<F>(mut self, filter: F) -> Self
    where
        F: Fn(&mut ExpressionCompiler<'_>) -> String + Send + Sync + 'static,
    {
        self.options.filters.push_where(where_callback(filter));
        self
    }

    /// Page size of each member query.
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

    /// One query input per member entity.
    pub fn params(&self) -> Result<BTreeMap<String, QueryInput>> {
        let mut inputs = BTreeMap::new();
        for (name, pattern) in &self.collection.members {
            let entity = self.service.entity(name)?;
            let input = entity.params().query(pattern, &self.facets, &self.options)?;
            inputs.insert(name.clone(), input);
        }
        Ok(inputs)
    }

    /// Run every member query, following pages up to each entity's
    /// configured bound.
    pub async fn go(&self) -> Result<BTreeMap<String, Vec<Item>>> {
        let inputs = self.params()?;
        debug!(
            collection = %self.collection.name,
            members = inputs.len(),
            "executing collection query"
        );
        let mut results = BTreeMap::new();
        for (name, input) in inputs {
            let entity = self.service.entity(&name)?;
            let items = entity
                .executor()?
                .query_pages(input, entity.config().max_pages)
                .await?;
            results.insert(name, items);
        }
        Ok(results)
    }
}

// ---------------------------------------------------------------------------
// Transactions
// ---------------------------------------------------------------------------

/// A pending write transaction.
#[derive(Debug)]
pub struct TransactWriteOperation<'s> {
    service: &'s Service,
    items: Vec<TransactionItem>,
    token: Option<String>,
}

impl TransactWriteOperation<'_> {
    /// Idempotency token for the transaction.
    #[must_use]
    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// The store input.
    pub fn params(&self) -> Result<TransactWriteItemsInput> {
        write_input(self.items.clone(), self.token.clone())
    }

    /// Execute the transaction.
    pub async fn go(&self) -> Result<()> {
        let input = self.params()?;
        debug!(service = %self.service.name, items = input.transact_items.len(), "executing write transaction");
        self.service
            .transport()?
            .transact_write_items(input)
            .await
            .map_err(|e| transport_error_to_facet(StoreOperation::TransactWriteItems, e))?;
        Ok(())
    }
}

/// A pending read transaction.
#[derive(Debug)]
pub struct TransactGetOperation<'s> {
    service: &'s Service,
    items: Vec<TransactionItem>,
}

impl TransactGetOperation<'_> {
    /// The store input.
    pub fn params(&self) -> Result<TransactGetItemsInput> {
        get_input(self.items.clone())
    }

    /// Execute the transaction. Results line up with the committed gets;
    /// each found item is shaped by the entity that committed its get.
    pub async fn go(&self) -> Result<Vec<Option<Item>>> {
        let input = self.params()?;
        debug!(service = %self.service.name, items = input.transact_items.len(), "executing read transaction");
        let output = self
            .service
            .transport()?
            .transact_get_items(input)
            .await
            .map_err(|e| transport_error_to_facet(StoreOperation::TransactGetItems, e))?;
        if output.responses.len() != self.items.len() {
            return Err(facet_error!(
                TransportError,
                format!(
                    "read transaction returned {} responses for {} items",
                    output.responses.len(),
                    self.items.len()
                )
            ));
        }
        self.items
            .iter()
            .zip(output.responses)
            .map(|(committed, response)| {
                let entity = self.service.entity(&committed.entity)?;
                Ok(response.item.map(|item| entity.shape(&item)))
            })
            .collect()
    }
}
