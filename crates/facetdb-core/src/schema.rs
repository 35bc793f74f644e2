//! Entity schema: attribute catalog, index definitions and named filters.
//!
//! A [`Schema`] is assembled with builder methods and validated once when the
//! owning [`Entity`](crate::entity::Entity) is constructed. It is immutable
//! afterwards.

use std::collections::{BTreeMap, BTreeSet};

use facetdb_model::{AttributeValue, FacetError};

use crate::error::Result;
use crate::expression::filter::NamedFilter;
use crate::key::Casing;
use crate::transform::{DefaultValue, Transform, Validation};

// ---------------------------------------------------------------------------
// Attributes
// ---------------------------------------------------------------------------

/// Declared type of an attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AttributeType {
    /// Text.
    #[default]
    String,
    /// Number.
    Number,
    /// Boolean.
    Boolean,
    /// One of a fixed set of values.
    Enum,
    /// Ordered list.
    List,
    /// Nested map.
    Map,
    /// String or number set.
    Set,
    /// Anything.
    Any,
}

/// Left-padding applied to an attribute when written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Padding {
    /// Target width in chars.
    pub length: usize,
    /// Pad character.
    pub pad_char: char,
}

impl Padding {
    /// Zero padding to `length` chars.
    #[must_use]
    pub fn new(length: usize) -> Self {
        Self {
            length,
            pad_char: '0',
        }
    }

    /// Use a different pad character.
    #[must_use]
    pub fn with_char(mut self, pad_char: char) -> Self {
        self.pad_char = pad_char;
        self
    }
}

/// Definition of a single attribute.
#[derive(Debug, Clone, Default)]
pub struct AttributeDefinition {
    /// Declared type.
    pub attr_type: AttributeType,
    /// Must be present on put.
    pub required: bool,
    /// Cannot be changed by update.
    pub read_only: bool,
    /// Dropped from read results.
    pub hidden: bool,
    /// Value assigned when absent on put.
    pub default: Option<DefaultValue>,
    /// Rules checked on write.
    pub validations: Vec<Validation>,
    /// Transform applied on read.
    pub get: Transform,
    /// Transform applied on write.
    pub set: Transform,
    /// Left-padding applied on write and stripped on read.
    pub padding: Option<Padding>,
    /// Allowed values for [`AttributeType::Enum`].
    pub enum_values: Vec<AttributeValue>,
}

impl AttributeDefinition {
    /// A definition of the given type with no rules.
    #[must_use]
    pub fn new(attr_type: AttributeType) -> Self {
        Self {
            attr_type,
            ..Self::default()
        }
    }

    /// A string attribute.
    #[must_use]
    pub fn string() -> Self {
        Self::new(AttributeType::String)
    }

    /// A number attribute.
    #[must_use]
    pub fn number() -> Self {
        Self::new(AttributeType::Number)
    }

    /// A boolean attribute.
    #[must_use]
    pub fn boolean() -> Self {
        Self::new(AttributeType::Boolean)
    }

    /// An enum attribute restricted to `values`.
    #[must_use]
    pub fn enumeration<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<AttributeValue>,
    {
        Self {
            enum_values: values.into_iter().map(Into::into).collect(),
            ..Self::new(AttributeType::Enum)
        }
    }

    /// Mark the attribute as required.
    #[must_use]
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Mark the attribute as read-only.
    #[must_use]
    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    /// Hide the attribute from read results.
    #[must_use]
    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    /// Set the default value.
    #[must_use]
    pub fn with_default(mut self, default: DefaultValue) -> Self {
        self.default = Some(default);
        self
    }

    /// Add a validation rule.
    #[must_use]
    pub fn with_validation(mut self, validation: Validation) -> Self {
        self.validations.push(validation);
        self
    }

    /// Set the read transform.
    #[must_use]
    pub fn with_get(mut self, transform: Transform) -> Self {
        self.get = transform;
        self
    }

    /// Set the write transform.
    #[must_use]
    pub fn with_set(mut self, transform: Transform) -> Self {
        self.set = transform;
        self
    }

    /// Set the padding rule.
    #[must_use]
    pub fn with_padding(mut self, padding: Padding) -> Self {
        self.padding = Some(padding);
        self
    }
}

// ---------------------------------------------------------------------------
// Indexes
// ---------------------------------------------------------------------------

/// One half (partition or sort) of an index key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FacetDefinition {
    /// Stored field holding the composite key.
    pub field: String,
    /// Ordered facets composing the key.
    pub facets: Vec<String>,
    /// Casing overlay for the whole key.
    pub casing: Option<Casing>,
}

impl FacetDefinition {
    /// A key stored in `field` composed from `facets`.
    pub fn new<I, S>(field: impl Into<String>, facets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            field: field.into(),
            facets: facets.into_iter().map(Into::into).collect(),
            casing: None,
        }
    }

    /// Set the casing overlay.
    #[must_use]
    pub fn with_casing(mut self, casing: Casing) -> Self {
        self.casing = Some(casing);
        self
    }
}

/// An access pattern: the primary index or a secondary index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexDefinition {
    /// Secondary index name; `None` for the primary index.
    pub index: Option<String>,
    /// Partition key.
    pub pk: FacetDefinition,
    /// Sort key.
    pub sk: Option<FacetDefinition>,
    /// Collection this access pattern belongs to.
    pub collection: Option<String>,
}

impl IndexDefinition {
    /// The table's primary index.
    #[must_use]
    pub fn primary(pk: FacetDefinition, sk: Option<FacetDefinition>) -> Self {
        Self {
            index: None,
            pk,
            sk,
            collection: None,
        }
    }

    /// A secondary index named `index`.
    pub fn secondary(index: impl Into<String>, pk: FacetDefinition, sk: Option<FacetDefinition>) -> Self {
        Self {
            index: Some(index.into()),
            pk,
            sk,
            collection: None,
        }
    }

    /// Place the access pattern in a collection.
    #[must_use]
    pub fn in_collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = Some(collection.into());
        self
    }

    /// Returns `true` for the primary index.
    #[must_use]
    pub fn is_primary(&self) -> bool {
        self.index.is_none()
    }
}

// ---------------------------------------------------------------------------
// Schema
// ---------------------------------------------------------------------------

/// Attribute names maintained automatically on write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimestampsConfig {
    /// Set once on create.
    pub created_at: Option<String>,
    /// Set on every write.
    pub updated_at: Option<String>,
}

impl Default for TimestampsConfig {
    fn default() -> Self {
        Self {
            created_at: Some("createdAt".to_owned()),
            updated_at: Some("updatedAt".to_owned()),
        }
    }
}

/// Attribute holding the expiry time used by the store's TTL sweeper.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TtlConfig {
    /// Attribute name.
    pub attribute: String,
}

/// The full description of an entity.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    /// Service (application) name; prefixes every partition key.
    pub service: String,
    /// Entity name; prefixes every sort key.
    pub entity: String,
    /// Table name.
    pub table: String,
    /// Schema version, part of the sort key prefix.
    pub version: String,
    /// Attribute catalog.
    pub attributes: BTreeMap<String, AttributeDefinition>,
    /// Access patterns by name.
    pub indexes: BTreeMap<String, IndexDefinition>,
    /// Named filters usable on queries.
    pub filters: BTreeMap<String, NamedFilter>,
    /// Automatic timestamps.
    pub timestamps: Option<TimestampsConfig>,
    /// TTL attribute.
    pub ttl: Option<TtlConfig>,
}

impl Schema {
    /// Start a schema for `entity` in `service`, stored in `table`.
    pub fn new(
        service: impl Into<String>,
        entity: impl Into<String>,
        table: impl Into<String>,
    ) -> Self {
        Self {
            service: service.into(),
            entity: entity.into(),
            table: table.into(),
            ..Self::default()
        }
    }

    /// Set the version.
    #[must_use]
    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Declare an attribute.
    #[must_use]
    pub fn attribute(mut self, name: impl Into<String>, definition: AttributeDefinition) -> Self {
        self.attributes.insert(name.into(), definition);
        self
    }

    /// Declare an access pattern.
    #[must_use]
    pub fn index(mut self, access_pattern: impl Into<String>, definition: IndexDefinition) -> Self {
        self.indexes.insert(access_pattern.into(), definition);
        self
    }

    /// Register a named filter.
    #[must_use]
    pub fn filter(mut self, name: impl Into<String>, filter: NamedFilter) -> Self {
        self.filters.insert(name.into(), filter);
        self
    }

    /// Enable automatic timestamps.
    #[must_use]
    pub fn timestamps(mut self, config: TimestampsConfig) -> Self {
        self.timestamps = Some(config);
        self
    }

    /// Enable TTL on `attribute`.
    #[must_use]
    pub fn ttl(mut self, attribute: impl Into<String>) -> Self {
        self.ttl = Some(TtlConfig {
            attribute: attribute.into(),
        });
        self
    }

    /// Check the structural rules every entity must satisfy.
    pub fn validate(&self) -> Result<()> {
        if self.service.is_empty() {
            return Err(FacetError::invalid_schema("service name is required"));
        }
        if self.entity.is_empty() {
            return Err(FacetError::invalid_schema("entity name is required"));
        }
        if self.table.is_empty() {
            return Err(FacetError::invalid_schema("table name is required"));
        }
        if self.attributes.is_empty() {
            return Err(FacetError::invalid_schema(
                "at least one attribute is required",
            ));
        }
        if self.indexes.is_empty() {
            return Err(FacetError::invalid_schema("at least one index is required"));
        }

        let primaries = self.indexes.values().filter(|i| i.is_primary()).count();
        if primaries != 1 {
            return Err(FacetError::invalid_schema(format!(
                "exactly one primary index is required, found {primaries}"
            )));
        }

        let mut index_names = BTreeSet::new();
        for (pattern, index) in &self.indexes {
            if let Some(name) = &index.index {
                if !index_names.insert(name.as_str()) {
                    return Err(FacetError::invalid_schema(format!(
                        "index {name} is used by more than one access pattern"
                    )));
                }
            }
            let halves = std::iter::once(("pk", &index.pk))
                .chain(index.sk.as_ref().map(|sk| ("sk", sk)));
            for (half, def) in halves {
                if def.field.is_empty() {
                    return Err(FacetError::invalid_schema(format!(
                        "{half} field of access pattern {pattern} is empty"
                    )));
                }
                if let Some(facet) = def.facets.iter().find(|f| !self.attributes.contains_key(*f)) {
                    return Err(FacetError::invalid_schema(format!(
                        "{half} facet {facet} in access pattern {pattern} references an undeclared attribute"
                    )));
                }
            }
        }

        for (name, attr) in &self.attributes {
            if attr.attr_type == AttributeType::Enum && attr.enum_values.is_empty() {
                return Err(FacetError::invalid_schema(format!(
                    "enum attribute {name} declares no values"
                )));
            }
        }

        Ok(())
    }

    /// The primary access pattern and its index.
    pub fn primary_index(&self) -> Result<(&str, &IndexDefinition)> {
        self.indexes
            .iter()
            .find(|(_, index)| index.is_primary())
            .map(|(name, index)| (name.as_str(), index))
            .ok_or_else(|| FacetError::invalid_schema("no primary index defined"))
    }

    /// Look up an access pattern, failing with `InvalidIndex`.
    pub fn access_pattern(&self, name: &str) -> Result<&IndexDefinition> {
        self.indexes
            .get(name)
            .ok_or_else(|| FacetError::invalid_index(name))
    }

    /// Every stored field holding a composite key.
    #[must_use]
    pub fn key_fields(&self) -> BTreeSet<&str> {
        self.indexes
            .values()
            .flat_map(|i| std::iter::once(&i.pk).chain(i.sk.as_ref()))
            .map(|def| def.field.as_str())
            .collect()
    }

    /// Returns `true` if `name` belongs in read results: declared attributes
    /// plus timestamp and TTL attributes.
    #[must_use]
    pub fn is_entity_attribute(&self, name: &str) -> bool {
        if self.attributes.contains_key(name) {
            return true;
        }
        let timestamp = self.timestamps.as_ref().is_some_and(|t| {
            t.created_at.as_deref() == Some(name) || t.updated_at.as_deref() == Some(name)
        });
        timestamp || self.ttl.as_ref().is_some_and(|t| t.attribute == name)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use facetdb_model::ErrorCode;

    use super::*;

    /// The store/mall entity used across the core tests.
    pub(crate) fn store_schema() -> Schema {
        Schema::new("MallStoreDirectory", "MallStores", "StoreDirectory")
            .version("1")
            .attribute("id", AttributeDefinition::string().required())
            .attribute("mall", AttributeDefinition::string().required())
            .attribute("store", AttributeDefinition::string().required())
            .attribute("building", AttributeDefinition::string().required())
            .attribute("unit", AttributeDefinition::string().required())
            .attribute(
                "category",
                AttributeDefinition::enumeration(["food/coffee", "spite store", "clothing"])
                    .required(),
            )
            .attribute("rent", AttributeDefinition::string().required())
            .attribute("leaseEnd", AttributeDefinition::string().required())
            .attribute("tenant", AttributeDefinition::string().read_only())
            .attribute("tags", AttributeDefinition::new(AttributeType::Set))
            .index(
                "store",
                IndexDefinition::primary(
                    FacetDefinition::new("pk", ["id"]),
                    Some(FacetDefinition::new("sk", Vec::<String>::new())),
                ),
            )
            .index(
                "units",
                IndexDefinition::secondary(
                    "gsi1pk-gsi1sk-index",
                    FacetDefinition::new("gsi1pk", ["mall"]),
                    Some(FacetDefinition::new("gsi1sk", ["building", "unit", "store"])),
                )
                .in_collection("directory"),
            )
            .index(
                "leases",
                IndexDefinition::secondary(
                    "gsi2pk-gsi2sk-index",
                    FacetDefinition::new("gsi2pk", ["mall"]),
                    Some(FacetDefinition::new("gsi2sk", ["leaseEnd", "store", "building", "unit"])),
                ),
            )
    }

    #[test]
    fn test_should_accept_valid_schema() {
        let schema = store_schema();
        assert!(schema.validate().is_ok());
        let (name, primary) = schema.primary_index().unwrap();
        assert_eq!(name, "store");
        assert_eq!(primary.pk.field, "pk");
    }

    #[test]
    fn test_should_reject_missing_service() {
        let mut schema = store_schema();
        schema.service.clear();
        assert_eq!(schema.validate().unwrap_err().code, ErrorCode::InvalidSchema);
    }

    #[test]
    fn test_should_reject_missing_entity_name() {
        let mut schema = store_schema();
        schema.entity.clear();
        let err = schema.validate().unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidSchema);
        assert!(err.message.contains("entity"));
    }

    #[test]
    fn test_should_reject_missing_table_name() {
        let schema = Schema {
            table: String::new(),
            ..store_schema()
        };
        let err = schema.validate().unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidSchema);
        assert!(err.message.contains("table"));
    }

    #[test]
    fn test_should_reject_undeclared_facet() {
        let schema = store_schema().index(
            "bogus",
            IndexDefinition::secondary("gsi9", FacetDefinition::new("gsi9pk", ["nope"]), None),
        );
        let err = schema.validate().unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidSchema);
        assert!(err.message.contains("nope"));
    }

    #[test]
    fn test_should_require_exactly_one_primary_index() {
        let schema = store_schema().index(
            "second",
            IndexDefinition::primary(FacetDefinition::new("pk", ["mall"]), None),
        );
        assert_eq!(schema.validate().unwrap_err().code, ErrorCode::InvalidSchema);
    }

    #[test]
    fn test_should_fail_unknown_access_pattern() {
        let schema = store_schema();
        assert_eq!(
            schema.access_pattern("missing").unwrap_err().code,
            ErrorCode::InvalidIndex
        );
    }

    #[test]
    fn test_should_list_key_fields() {
        let schema = store_schema();
        let fields = schema.key_fields();
        assert_eq!(
            fields.into_iter().collect::<Vec<_>>(),
            vec!["gsi1pk", "gsi1sk", "gsi2pk", "gsi2sk", "pk", "sk"]
        );
    }

    #[test]
    fn test_should_treat_timestamps_as_entity_attributes() {
        let schema = store_schema().timestamps(TimestampsConfig::default()).ttl("expires");
        assert!(schema.is_entity_attribute("createdAt"));
        assert!(schema.is_entity_attribute("expires"));
        assert!(!schema.is_entity_attribute("gsi1pk"));
    }
}
