//! Operation assembly: turns entity-level intent into store inputs.
//!
//! A [`ParamsBuilder`] is bound to one schema, the resolved table name and a
//! clock. Every method is pure apart from reading the clock, and validation
//! failures short-circuit before any input is produced.

use std::collections::HashMap;
use std::fmt;

use facetdb_model::input::{
    DeleteItemInput, GetItemInput, PutItemInput, QueryInput, ScanInput, UpdateItemInput,
};
use facetdb_model::types::{
    DeleteRequest, PutRequest, ReturnValue, TransactConditionCheck, WriteRequest,
};
use facetdb_model::{AttributeValue, ErrorCode, FacetError, Item, Key, facet_error};
use tracing::{debug, trace};

use crate::clock::Clock;
use crate::cursor;
use crate::enrich::{
    Ttl, apply_defaults, apply_padding, apply_timestamps, apply_ttl, apply_update_timestamps,
    apply_update_ttl, pad_value,
};
use crate::error::{Result, cursor_error_to_facet};
use crate::expression::filter::FilterSet;
use crate::expression::{
    CompiledExpression, ExpressionCompiler, UpdateAction, UpdateIntent, WhereCallback,
    compile_update,
};
use crate::key::{partition_key, sort_key};
use crate::schema::{FacetDefinition, IndexDefinition, Schema};
use crate::validate::Validator;

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// Options for reading one item.
#[derive(Debug, Clone, Default)]
pub struct GetOptions {
    /// Attributes to project; empty reads every attribute.
    pub attributes: Vec<String>,
    /// Request a strongly consistent read.
    pub consistent: bool,
    /// Return the stored item without shaping it.
    pub raw: bool,
}

/// Options shared by put, create, upsert, update, patch, delete and remove.
#[derive(Clone, Default)]
pub struct WriteOptions {
    /// Caller condition, compiled against the entity's attributes.
    pub condition: Option<WhereCallback>,
    /// What the store should return.
    pub return_values: Option<ReturnValue>,
    /// Expiry written to the TTL attribute.
    pub ttl: Option<Ttl>,
    /// Remove the TTL attribute (updates only).
    pub remove_ttl: bool,
    /// Return what the store sent back without shaping it.
    pub raw: bool,
}

impl fmt::Debug for WriteOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WriteOptions")
            .field("condition", &self.condition.is_some())
            .field("return_values", &self.return_values)
            .field("ttl", &self.ttl)
            .field("remove_ttl", &self.remove_ttl)
            .field("raw", &self.raw)
            .finish()
    }
}

/// Result ordering of a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Order {
    /// Ascending sort key order.
    #[default]
    Asc,
    /// Descending sort key order.
    Desc,
}

/// An explicit sort key condition. Each map supplies sort facets that are
/// merged over the query's facets before the key is built, so partial keys
/// are allowed.
#[derive(Debug, Clone, PartialEq)]
pub enum SortCondition {
    /// `sk = key`.
    Eq(Item),
    /// `sk > key`.
    Gt(Item),
    /// `sk >= key`.
    Gte(Item),
    /// `sk < key`.
    Lt(Item),
    /// `sk <= key`.
    Lte(Item),
    /// `sk BETWEEN lo AND hi`.
    Between(Item, Item),
    /// `begins_with(sk, key)`.
    Begins(Item),
}

/// Options for a query.
#[derive(Debug, Clone, Default)]
pub struct QueryOptions {
    /// Explicit sort key condition; without one the sort key prefix is used.
    pub sort: Option<SortCondition>,
    /// Where-callbacks and named filters.
    pub filters: FilterSet,
    /// Attributes to project.
    pub attributes: Vec<String>,
    /// Page size.
    pub limit: Option<i32>,
    /// Result ordering.
    pub order: Order,
    /// Cursor of the page to resume from.
    pub cursor: Option<String>,
    /// Start from the first page even when a cursor is set.
    pub ignore_cursor: bool,
    /// Page bound when following pages; overrides the configured one.
    pub pages: Option<usize>,
    /// Return stored items without shaping them.
    pub raw: bool,
}

/// Options for a scan.
#[derive(Debug, Clone, Default)]
pub struct ScanOptions {
    /// Where-callbacks and named filters.
    pub filters: FilterSet,
    /// Attributes to project.
    pub attributes: Vec<String>,
    /// Page size.
    pub limit: Option<i32>,
    /// Cursor of the page to resume from.
    pub cursor: Option<String>,
    /// Start from the first page even when a cursor is set.
    pub ignore_cursor: bool,
    /// Page bound when following pages; overrides the configured one.
    pub pages: Option<usize>,
    /// Return stored items without shaping them.
    pub raw: bool,
}

/// Existence guard on the primary key fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Guard {
    None,
    Exists,
    NotExists,
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Builds store inputs for one entity.
#[derive(Debug, Clone, Copy)]
pub struct ParamsBuilder<'a> {
    schema: &'a Schema,
    table: &'a str,
    clock: &'a dyn Clock,
}

impl<'a> ParamsBuilder<'a> {
    /// A builder for `schema` writing to `table`.
    #[must_use]
    pub fn new(schema: &'a Schema, table: &'a str, clock: &'a dyn Clock) -> Self {
        Self {
            schema,
            table,
            clock,
        }
    }

    /// The table name, failing with `InvalidSchema` when none is configured.
    pub fn table(&self) -> Result<String> {
        if self.table.is_empty() {
            return Err(FacetError::invalid_schema(format!(
                "no table configured for entity {}",
                self.schema.entity
            )));
        }
        Ok(self.table.to_owned())
    }

    // -- keys ---------------------------------------------------------------

    /// The primary key addressed by `facets`. Both halves must be fulfilled.
    pub fn primary_key(&self, facets: &Item) -> Result<Key> {
        let (pattern, index) = self.schema.primary_index()?;
        let facets = self.padded(facets);
        self.built_keys(index, &facets)
            .ok_or_else(|| missing_facets(pattern, index, &facets))
    }

    /// Key fields of every index for a fully prepared item. The primary
    /// index must be fulfilled; secondary keys are only attached when
    /// fulfilled.
    pub fn index_keys(&self, item: &Item) -> Result<Item> {
        let mut keys = Item::new();
        for (pattern, index) in &self.schema.indexes {
            match self.built_keys(index, item) {
                Some(built) => keys.extend(built),
                None if index.is_primary() => return Err(missing_facets(pattern, index, item)),
                None => trace!(access_pattern = %pattern, "skipping sparse index"),
            }
        }
        Ok(keys)
    }

    fn built_keys(&self, index: &IndexDefinition, facets: &Item) -> Option<Key> {
        let pk = partition_key(self.schema, &index.pk, facets);
        if !pk.fulfilled {
            return None;
        }
        let mut key = Key::with_capacity(2);
        key.insert(index.pk.field.clone(), AttributeValue::S(pk.key));
        if let Some(def) = &index.sk {
            let sk = sort_key(self.schema, def, facets);
            if !sk.fulfilled {
                return None;
            }
            key.insert(def.field.clone(), AttributeValue::S(sk.key));
        }
        Some(key)
    }

    fn padded(&self, facets: &Item) -> Item {
        let mut facets = facets.clone();
        apply_padding(self.schema, &mut facets);
        facets
    }

    // -- single item --------------------------------------------------------

    /// Build a `GetItem` input.
    pub fn get(&self, facets: &Item, options: &GetOptions) -> Result<GetItemInput> {
        let key = self.primary_key(facets)?;
        let projection = self.projection(&options.attributes)?;
        debug!(entity = %self.schema.entity, operation = "get", "built params");
        Ok(GetItemInput {
            table_name: self.table()?,
            key,
            projection_expression: projection.as_ref().map(|p| p.expression.clone()),
            expression_attribute_names: projection.map(|p| p.names).unwrap_or_default(),
            consistent_read: options.consistent.then_some(true),
        })
    }

    /// Build a `PutItem` input that replaces any existing item.
    pub fn put(&self, item: &Item, options: &WriteOptions) -> Result<PutItemInput> {
        self.put_with(item, options, Guard::None)
    }

    /// Build a `PutItem` input that fails if the item already exists.
    pub fn create(&self, item: &Item, options: &WriteOptions) -> Result<PutItemInput> {
        self.put_with(item, options, Guard::NotExists)
    }

    fn put_with(&self, item: &Item, options: &WriteOptions, guard: Guard) -> Result<PutItemInput> {
        let mut item = self.prepare_item(item)?;
        apply_ttl(self.schema, &mut item, options.ttl, self.clock);
        let mut compiler = ExpressionCompiler::new();
        self.condition(&mut compiler, guard, options.condition.as_ref())?;
        let compiled = compiler.finish()?;
        debug!(entity = %self.schema.entity, operation = "put", ?guard, "built params");
        Ok(PutItemInput {
            table_name: self.table()?,
            item,
            condition_expression: non_empty(compiled.expression),
            expression_attribute_names: compiled.names,
            expression_attribute_values: compiled.values,
            return_values: options.return_values,
        })
    }

    /// Build an `UpdateItem` input that writes every attribute of `item`,
    /// creating the item when it does not exist. The created-at timestamp is
    /// only written by the first upsert.
    pub fn upsert(&self, item: &Item, options: &WriteOptions) -> Result<UpdateItemInput> {
        let mut item = self.prepare_item(item)?;
        apply_ttl(self.schema, &mut item, options.ttl, self.clock);
        let (_, primary) = self.schema.primary_index()?;
        let key_fields = key_field_names(primary);
        let created_at = self
            .schema
            .timestamps
            .as_ref()
            .and_then(|t| t.created_at.as_deref());

        let key: Key = item
            .iter()
            .filter(|(name, _)| key_fields.contains(&name.as_str()))
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();
        let mut attributes: Vec<(&String, &AttributeValue)> = item
            .iter()
            .filter(|(name, _)| !key_fields.contains(&name.as_str()))
            .collect();
        attributes.sort_by(|a, b| a.0.cmp(b.0));

        let mut compiler = ExpressionCompiler::new();
        let assignments: Vec<String> = attributes
            .into_iter()
            .map(|(name, value)| {
                let n = compiler.add_name(name);
                let v = compiler.add_value(value.clone());
                if created_at == Some(name.as_str()) {
                    format!("{n} = if_not_exists({n}, {v})")
                } else {
                    format!("{n} = {v}")
                }
            })
            .collect();
        self.condition(&mut compiler, Guard::None, options.condition.as_ref())?;
        let compiled = compiler.finish()?;
        debug!(entity = %self.schema.entity, operation = "upsert", "built params");
        Ok(UpdateItemInput {
            table_name: self.table()?,
            key,
            update_expression: Some(format!("SET {}", assignments.join(", "))),
            condition_expression: non_empty(compiled.expression),
            expression_attribute_names: compiled.names,
            expression_attribute_values: compiled.values,
            return_values: Some(options.return_values.unwrap_or(ReturnValue::AllNew)),
        })
    }

    /// Build an `UpdateItem` input applying `intent` to the addressed item.
    pub fn update(
        &self,
        facets: &Item,
        intent: &UpdateIntent,
        options: &WriteOptions,
    ) -> Result<UpdateItemInput> {
        self.update_with(facets, intent, options, Guard::None)
    }

    /// Like [`update`](Self::update), but fails if the item does not exist.
    pub fn patch(
        &self,
        facets: &Item,
        intent: &UpdateIntent,
        options: &WriteOptions,
    ) -> Result<UpdateItemInput> {
        self.update_with(facets, intent, options, Guard::Exists)
    }

    fn update_with(
        &self,
        facets: &Item,
        intent: &UpdateIntent,
        options: &WriteOptions,
        guard: Guard,
    ) -> Result<UpdateItemInput> {
        let key = self.primary_key(facets)?;
        let mut intent = intent.clone();
        apply_update_ttl(self.schema, &mut intent, options.ttl, options.remove_ttl, self.clock);
        if intent.is_empty() {
            return Err(facet_error!(
                InvalidOperation,
                format!("update of entity {} has no actions", self.schema.entity)
            ));
        }
        let (_, primary) = self.schema.primary_index()?;
        if let Some((name, _)) = intent
            .iter()
            .find(|(name, _)| index_facets(primary).any(|f| f == *name))
        {
            return Err(FacetError::with_message(
                ErrorCode::ReadOnlyViolation,
                format!("attribute {name} is part of the primary key and cannot be updated"),
            ));
        }

        Validator::new(self.schema).validate_update(&mut intent)?;
        self.pad_update(&mut intent);
        for (field, value) in self.secondary_key_updates(facets, &intent)? {
            intent.push(field, UpdateAction::Assign(value));
        }
        apply_update_timestamps(self.schema, &mut intent, self.clock);

        let mut compiler = ExpressionCompiler::new();
        let update = compile_update(&intent, &mut compiler)?;
        self.condition(&mut compiler, guard, options.condition.as_ref())?;
        let compiled = compiler.finish()?;
        debug!(entity = %self.schema.entity, operation = "update", ?guard, "built params");
        Ok(UpdateItemInput {
            table_name: self.table()?,
            key,
            update_expression: Some(update),
            condition_expression: non_empty(compiled.expression),
            expression_attribute_names: compiled.names,
            expression_attribute_values: compiled.values,
            return_values: Some(options.return_values.unwrap_or(ReturnValue::AllNew)),
        })
    }

    /// Build a `DeleteItem` input.
    pub fn delete(&self, facets: &Item, options: &WriteOptions) -> Result<DeleteItemInput> {
        self.delete_with(facets, options, Guard::None)
    }

    /// Build a `DeleteItem` input that fails if the item does not exist.
    pub fn remove(&self, facets: &Item, options: &WriteOptions) -> Result<DeleteItemInput> {
        self.delete_with(facets, options, Guard::Exists)
    }

    fn delete_with(&self, facets: &Item, options: &WriteOptions, guard: Guard) -> Result<DeleteItemInput> {
        let key = self.primary_key(facets)?;
        let mut compiler = ExpressionCompiler::new();
        self.condition(&mut compiler, guard, options.condition.as_ref())?;
        let compiled = compiler.finish()?;
        debug!(entity = %self.schema.entity, operation = "delete", ?guard, "built params");
        Ok(DeleteItemInput {
            table_name: self.table()?,
            key,
            condition_expression: non_empty(compiled.expression),
            expression_attribute_names: compiled.names,
            expression_attribute_values: compiled.values,
            return_values: options.return_values,
        })
    }

    /// Build the condition check of a transaction.
    pub fn check(&self, facets: &Item, condition: &WhereCallback) -> Result<TransactConditionCheck> {
        let key = self.primary_key(facets)?;
        let mut compiler = ExpressionCompiler::new();
        self.condition(&mut compiler, Guard::None, Some(condition))?;
        let compiled = compiler.finish()?;
        if compiled.expression.is_empty() {
            return Err(facet_error!(
                InvalidOperation,
                "a condition check needs a non-empty condition"
            ));
        }
        Ok(TransactConditionCheck {
            table_name: self.table()?,
            key,
            condition_expression: compiled.expression,
            expression_attribute_names: compiled.names,
            expression_attribute_values: compiled.values,
        })
    }

    // -- reads over many items ----------------------------------------------

    /// Build a `Query` input for `access_pattern`.
    pub fn query(&self, access_pattern: &str, facets: &Item, options: &QueryOptions) -> Result<QueryInput> {
        let index = self.schema.access_pattern(access_pattern)?;
        let facets = self.padded(facets);
        let pk = partition_key(self.schema, &index.pk, &facets);
        if !pk.fulfilled {
            return Err(FacetError::invalid_keys(format!(
                "incomplete partition key for access pattern {access_pattern}, missing facets: {}",
                missing_names(index.pk.facets.iter(), &facets)
            )));
        }

        let mut compiler = ExpressionCompiler::new();
        let mut key_condition = compiler.attr(&index.pk.field).eq(pk.key);
        if let Some(def) = &index.sk {
            let fragment = self.sort_condition(&mut compiler, def, &facets, options.sort.as_ref());
            key_condition = format!("{key_condition} AND {fragment}");
        }
        self.apply_filters(&mut compiler, &options.filters)?;
        let projection = self
            .projection(&options.attributes)?
            .map(|p| compiler.absorb(p));
        let exclusive_start_key = decode_cursor(options.cursor.as_deref(), options.ignore_cursor)?;
        let compiled = compiler.finish()?;

        debug!(
            entity = %self.schema.entity,
            operation = "query",
            access_pattern,
            index = index.index.as_deref().unwrap_or(""),
            "built params"
        );
        Ok(QueryInput {
            table_name: self.table()?,
            index_name: index.index.clone(),
            key_condition_expression: Some(key_condition),
            filter_expression: non_empty(compiled.expression),
            projection_expression: projection,
            expression_attribute_names: compiled.names,
            expression_attribute_values: compiled.values,
            scan_index_forward: (options.order == Order::Desc).then_some(false),
            limit: options.limit,
            exclusive_start_key,
        })
    }

    fn sort_condition(
        &self,
        compiler: &mut ExpressionCompiler<'_>,
        def: &FacetDefinition,
        facets: &Item,
        sort: Option<&SortCondition>,
    ) -> String {
        let key_for = |extra: &Item| {
            let mut merged = facets.clone();
            merged.extend(self.padded(extra));
            sort_key(self.schema, def, &merged).key
        };
        let field = def.field.as_str();
        match sort {
            None => compiler.attr(field).begins(sort_key(self.schema, def, facets).key),
            Some(SortCondition::Eq(v)) => compiler.attr(field).eq(key_for(v)),
            Some(SortCondition::Gt(v)) => compiler.attr(field).gt(key_for(v)),
            Some(SortCondition::Gte(v)) => compiler.attr(field).gte(key_for(v)),
            Some(SortCondition::Lt(v)) => compiler.attr(field).lt(key_for(v)),
            Some(SortCondition::Lte(v)) => compiler.attr(field).lte(key_for(v)),
            Some(SortCondition::Begins(v)) => compiler.attr(field).begins(key_for(v)),
            Some(SortCondition::Between(lo, hi)) => {
                let n = compiler.add_name(field);
                let lo = compiler.add_value(key_for(lo));
                let hi = compiler.add_value(key_for(hi));
                format!("{n} BETWEEN {lo} AND {hi}")
            }
        }
    }

    /// Build a `Scan` input restricted to this entity's items.
    pub fn scan(&self, options: &ScanOptions) -> Result<ScanInput> {
        let (_, primary) = self.schema.primary_index()?;
        let none = Item::new();
        let mut compiler = ExpressionCompiler::new();

        let pk_prefix = partition_key(self.schema, &prefix_only(&primary.pk), &none).key;
        let mut identity = compiler.attr(&primary.pk.field).begins(pk_prefix);
        if let Some(def) = &primary.sk {
            let sk_prefix = sort_key(self.schema, &prefix_only(def), &none).key;
            let fragment = compiler.attr(&def.field).begins(sk_prefix);
            identity = format!("{identity} AND {fragment}");
        }
        compiler.add_expression(&identity);
        self.apply_filters(&mut compiler, &options.filters)?;
        let projection = self
            .projection(&options.attributes)?
            .map(|p| compiler.absorb(p));
        let exclusive_start_key = decode_cursor(options.cursor.as_deref(), options.ignore_cursor)?;
        let compiled = compiler.finish()?;

        debug!(entity = %self.schema.entity, operation = "scan", "built params");
        Ok(ScanInput {
            table_name: self.table()?,
            index_name: None,
            filter_expression: non_empty(compiled.expression),
            projection_expression: projection,
            expression_attribute_names: compiled.names,
            expression_attribute_values: compiled.values,
            limit: options.limit,
            exclusive_start_key,
        })
    }

    // -- batch --------------------------------------------------------------

    /// Primary keys for a batch read.
    pub fn batch_get_keys(&self, facets: &[Item]) -> Result<Vec<Key>> {
        facets.iter().map(|f| self.primary_key(f)).collect()
    }

    /// Put requests for a batch write; each item is prepared like a put.
    pub fn batch_put_requests(&self, items: &[Item]) -> Result<Vec<WriteRequest>> {
        items
            .iter()
            .map(|item| {
                Ok(WriteRequest {
                    put_request: Some(PutRequest {
                        item: self.prepare_item(item)?,
                    }),
                    delete_request: None,
                })
            })
            .collect()
    }

    /// Delete requests for a batch write.
    pub fn batch_delete_requests(&self, facets: &[Item]) -> Result<Vec<WriteRequest>> {
        facets
            .iter()
            .map(|f| {
                Ok(WriteRequest {
                    put_request: None,
                    delete_request: Some(DeleteRequest {
                        key: self.primary_key(f)?,
                    }),
                })
            })
            .collect()
    }

    // -- helpers ------------------------------------------------------------

    /// Required check on the caller's item, then defaults, validation and
    /// write transforms, timestamps, padding and finally every index key.
    fn prepare_item(&self, item: &Item) -> Result<Item> {
        let validator = Validator::new(self.schema);
        validator.check_required(item)?;
        let mut item = item.clone();
        apply_defaults(self.schema, &mut item, self.clock);
        let mut item = validator.validate_and_transform_for_write(&item, false)?;
        apply_timestamps(self.schema, &mut item, self.clock);
        apply_padding(self.schema, &mut item);
        let keys = self.index_keys(&item)?;
        item.extend(keys);
        Ok(item)
    }

    fn pad_update(&self, intent: &mut UpdateIntent) {
        for (name, action) in intent.iter_mut() {
            let Some(padding) = self.schema.attributes.get(name).and_then(|a| a.padding.as_ref()) else {
                continue;
            };
            if let UpdateAction::Assign(value) = action {
                *value = pad_value(value, padding);
            }
        }
    }

    /// Rebuilt secondary keys for every index whose facets the update
    /// assigns. The facets of a touched index must all be known from the
    /// addressed facets and the assignments.
    fn secondary_key_updates(&self, facets: &Item, intent: &UpdateIntent) -> Result<Vec<(String, AttributeValue)>> {
        let assigned: Item = intent
            .iter()
            .filter_map(|(name, action)| match action {
                UpdateAction::Assign(v) => Some((name.to_owned(), v.clone())),
                _ => None,
            })
            .collect();
        if assigned.is_empty() {
            return Ok(Vec::new());
        }
        let mut supplied = self.padded(facets);
        supplied.extend(assigned.iter().map(|(k, v)| (k.clone(), v.clone())));

        let mut updates = Vec::new();
        for (pattern, index) in &self.schema.indexes {
            if index.is_primary() || !index_facets(index).any(|f| assigned.contains_key(f)) {
                continue;
            }
            let keys = self
                .built_keys(index, &supplied)
                .ok_or_else(|| missing_facets(pattern, index, &supplied))?;
            let mut keys: Vec<_> = keys.into_iter().collect();
            keys.sort_by(|a, b| a.0.cmp(&b.0));
            updates.extend(keys);
        }
        Ok(updates)
    }

    fn condition(
        &self,
        compiler: &mut ExpressionCompiler<'_>,
        guard: Guard,
        callback: Option<&WhereCallback>,
    ) -> Result<()> {
        if guard != Guard::None {
            let (_, primary) = self.schema.primary_index()?;
            for field in key_field_names(primary) {
                let fragment = match guard {
                    Guard::Exists => compiler.exists(field),
                    _ => compiler.not_exists(field),
                };
                compiler.add_expression(&fragment);
            }
        }
        if let Some(callback) = callback {
            let mut scoped = ExpressionCompiler::with_catalog(self.schema);
            scoped.where_with(|c| (**callback)(c));
            let text = compiler.absorb(scoped.finish()?);
            compiler.add_expression(&text);
        }
        Ok(())
    }

    fn apply_filters(&self, compiler: &mut ExpressionCompiler<'_>, filters: &FilterSet) -> Result<()> {
        if filters.is_empty() {
            return Ok(());
        }
        let text = compiler.absorb(filters.compile(self.schema)?);
        compiler.add_expression(&text);
        Ok(())
    }

    fn projection(&self, attributes: &[String]) -> Result<Option<CompiledExpression>> {
        if attributes.is_empty() {
            return Ok(None);
        }
        let mut compiler = ExpressionCompiler::with_catalog(self.schema);
        let text = compiler.projection(attributes);
        let mut compiled = compiler.finish()?;
        compiled.expression = text;
        Ok(Some(compiled))
    }
}

fn non_empty(text: String) -> Option<String> {
    (!text.is_empty()).then_some(text)
}

fn decode_cursor(cursor: Option<&str>, ignore: bool) -> Result<Key> {
    match cursor {
        Some(c) if !ignore => cursor::decode(c).map_err(cursor_error_to_facet),
        _ => Ok(HashMap::new()),
    }
}

fn key_field_names(index: &IndexDefinition) -> Vec<&str> {
    std::iter::once(index.pk.field.as_str())
        .chain(index.sk.as_ref().map(|sk| sk.field.as_str()))
        .collect()
}

fn index_facets(index: &IndexDefinition) -> impl Iterator<Item = &str> {
    index
        .pk
        .facets
        .iter()
        .chain(index.sk.iter().flat_map(|sk| sk.facets.iter()))
        .map(String::as_str)
}

fn prefix_only(def: &FacetDefinition) -> FacetDefinition {
    FacetDefinition {
        field: def.field.clone(),
        facets: Vec::new(),
        casing: def.casing,
    }
}

fn missing_names<'f>(facets: impl Iterator<Item = &'f String>, supplied: &Item) -> String {
    facets
        .filter(|f| !supplied.contains_key(*f))
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

fn missing_facets(pattern: &str, index: &IndexDefinition, supplied: &Item) -> FacetError {
    let all = index
        .pk
        .facets
        .iter()
        .chain(index.sk.iter().flat_map(|sk| sk.facets.iter()));
    FacetError::invalid_keys(format!(
        "incomplete key for access pattern {pattern}, missing facets: {}",
        missing_names(all, supplied)
    ))
}
