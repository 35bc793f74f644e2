//! Transaction envelopes.
//!
//! Entity operations commit into [`TransactionItem`]s, which a service folds
//! into one `TransactWriteItems` or `TransactGetItems` input.

use facetdb_model::input::{
    DeleteItemInput, GetItemInput, PutItemInput, TransactGetItemsInput, TransactWriteItemsInput,
    UpdateItemInput,
};
use facetdb_model::types::{
    TransactConditionCheck, TransactDelete, TransactGet, TransactGetItem, TransactPut,
    TransactUpdate, TransactWriteItem,
};
use facetdb_model::facet_error;

use crate::error::Result;

/// Maximum items the store accepts in one transaction.
pub const MAX_TRANSACTION_ITEMS: usize = 100;

/// The store action behind a transaction item.
#[derive(Debug, Clone, PartialEq)]
pub enum TransactionAction {
    /// Write an item.
    Put(PutItemInput),
    /// Modify an item.
    Update(UpdateItemInput),
    /// Delete an item.
    Delete(DeleteItemInput),
    /// Assert a condition on an item without changing it.
    ConditionCheck(TransactConditionCheck),
    /// Read an item.
    Get(GetItemInput),
}

impl TransactionAction {
    /// Short name of the action.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Put(_) => "put",
            Self::Update(_) => "update",
            Self::Delete(_) => "delete",
            Self::ConditionCheck(_) => "condition_check",
            Self::Get(_) => "get",
        }
    }
}

/// One committed operation, tagged with the entity that built it.
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionItem {
    /// Name of the entity whose schema shapes the result.
    pub entity: String,
    /// The store action.
    pub action: TransactionAction,
}

impl TransactionItem {
    /// Tag `action` with `entity`.
    pub fn new(entity: impl Into<String>, action: TransactionAction) -> Self {
        Self {
            entity: entity.into(),
            action,
        }
    }

    /// Convert into a write envelope. Reads are rejected.
    pub fn into_write_item(self) -> Result<TransactWriteItem> {
        let item = match self.action {
            TransactionAction::Put(p) => TransactWriteItem {
                put: Some(TransactPut {
                    table_name: p.table_name,
                    item: p.item,
                    condition_expression: p.condition_expression,
                    expression_attribute_names: p.expression_attribute_names,
                    expression_attribute_values: p.expression_attribute_values,
                }),
                ..TransactWriteItem::default()
            },
            TransactionAction::Update(u) => {
                let update_expression = u.update_expression.ok_or_else(|| {
                    facet_error!(InvalidOperation, "a transactional update needs an update expression")
                })?;
                TransactWriteItem {
                    update: Some(TransactUpdate {
                        table_name: u.table_name,
                        key: u.key,
                        update_expression,
                        condition_expression: u.condition_expression,
                        expression_attribute_names: u.expression_attribute_names,
                        expression_attribute_values: u.expression_attribute_values,
                    }),
                    ..TransactWriteItem::default()
                }
            }
            TransactionAction::Delete(d) => TransactWriteItem {
                delete: Some(TransactDelete {
                    table_name: d.table_name,
                    key: d.key,
                    condition_expression: d.condition_expression,
                    expression_attribute_names: d.expression_attribute_names,
                    expression_attribute_values: d.expression_attribute_values,
                }),
                ..TransactWriteItem::default()
            },
            TransactionAction::ConditionCheck(c) => TransactWriteItem {
                condition_check: Some(c),
                ..TransactWriteItem::default()
            },
            TransactionAction::Get(_) => {
                return Err(facet_error!(
                    InvalidOperation,
                    format!("a get of entity {} cannot be part of a write transaction", self.entity)
                ));
            }
        };
        Ok(item)
    }

    /// Convert into a read envelope. Only gets are accepted.
    pub fn into_get_item(self) -> Result<TransactGetItem> {
        match self.action {
            TransactionAction::Get(g) => Ok(TransactGetItem {
                get: TransactGet {
                    table_name: g.table_name,
                    key: g.key,
                    projection_expression: g.projection_expression,
                    expression_attribute_names: g.expression_attribute_names,
                },
            }),
            other => Err(facet_error!(
                InvalidOperation,
                format!(
                    "a {} of entity {} cannot be part of a read transaction",
                    other.as_str(),
                    self.entity
                )
            )),
        }
    }
}

fn check_count(len: usize) -> Result<()> {
    if len == 0 {
        return Err(facet_error!(InvalidOperation, "a transaction needs at least one item"));
    }
    if len > MAX_TRANSACTION_ITEMS {
        return Err(facet_error!(
            InvalidOperation,
            format!("a transaction holds at most {MAX_TRANSACTION_ITEMS} items, got {len}")
        ));
    }
    Ok(())
}

/// Fold committed items into a `TransactWriteItems` input.
pub fn write_input(items: Vec<TransactionItem>, token: Option<String>) -> Result<TransactWriteItemsInput> {
    check_count(items.len())?;
    Ok(TransactWriteItemsInput {
        transact_items: items
            .into_iter()
            .map(TransactionItem::into_write_item)
            .collect::<Result<_>>()?,
        client_request_token: token,
    })
}

/// Fold committed gets into a `TransactGetItems` input.
pub fn get_input(items: Vec<TransactionItem>) -> Result<TransactGetItemsInput> {
    check_count(items.len())?;
    Ok(TransactGetItemsInput {
        transact_items: items
            .into_iter()
            .map(TransactionItem::into_get_item)
            .collect::<Result<_>>()?,
    })
}
