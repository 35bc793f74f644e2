//! Attribute rules applied on the write and read paths.

use facetdb_model::{AttributeValue, ErrorCode, FacetError, Item};
use tracing::trace;

use crate::error::Result;
use crate::expression::UpdateIntent;
use crate::schema::{AttributeDefinition, AttributeType, Schema};

/// Applies the attribute catalog of one schema.
#[derive(Debug, Clone, Copy)]
pub struct Validator<'a> {
    schema: &'a Schema,
}

impl<'a> Validator<'a> {
    /// A validator for `schema`.
    #[must_use]
    pub fn new(schema: &'a Schema) -> Self {
        Self { schema }
    }

    /// Fail with `MissingAttribute` for the first required attribute that is
    /// absent or null.
    pub fn check_required(&self, item: &Item) -> Result<()> {
        match self
            .schema
            .attributes
            .iter()
            .find(|(name, attr)| attr.required && item.get(*name).is_none_or(AttributeValue::is_null))
        {
            Some((name, _)) => Err(FacetError::missing_attribute(name)),
            None => Ok(()),
        }
    }

    /// Check every present attribute and apply its write transform. Unknown
    /// attributes pass through untouched.
    pub fn validate_and_transform_for_write(&self, item: &Item, is_update: bool) -> Result<Item> {
        let mut out = Item::with_capacity(item.len());
        for (name, value) in item {
            let Some(attr) = self.schema.attributes.get(name) else {
                out.insert(name.clone(), value.clone());
                continue;
            };
            if is_update && attr.read_only {
                return Err(read_only(name));
            }
            check_value(name, attr, value)?;
            out.insert(name.clone(), attr.set.apply(value));
        }
        Ok(out)
    }

    /// Drop hidden attributes and apply read transforms.
    #[must_use]
    pub fn transform_for_read(&self, item: &Item) -> Item {
        item.iter()
            .filter_map(|(name, value)| match self.schema.attributes.get(name) {
                Some(attr) if attr.hidden => None,
                Some(attr) => Some((name.clone(), attr.get.apply(value))),
                None => Some((name.clone(), value.clone())),
            })
            .collect()
    }

    /// Check an update: read-only attributes may not be touched at all, and
    /// every carried value is checked and transformed in place.
    pub fn validate_update(&self, intent: &mut UpdateIntent) -> Result<()> {
        for (name, action) in intent.iter_mut() {
            let Some(attr) = self.schema.attributes.get(name) else {
                continue;
            };
            if attr.read_only {
                return Err(read_only(name));
            }
            if let Some(value) = action.value_mut() {
                check_value(name, attr, value)?;
                *value = attr.set.apply(value);
            }
            trace!(attribute = name, action = action.kind(), "validated update action");
        }
        Ok(())
    }
}

fn check_value(name: &str, attr: &AttributeDefinition, value: &AttributeValue) -> Result<()> {
    if attr.attr_type == AttributeType::Enum && !attr.enum_values.contains(value) {
        return Err(FacetError::with_message(
            ErrorCode::InvalidEnumValue,
            format!("value {value} is not allowed for attribute {name}"),
        ));
    }
    for validation in &attr.validations {
        validation.check(name, value)?;
    }
    Ok(())
}

fn read_only(name: &str) -> FacetError {
    FacetError::with_message(
        ErrorCode::ReadOnlyViolation,
        format!("attribute {name} is read-only"),
    )
}
