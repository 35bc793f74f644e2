//! Composite key construction.
//!
//! A composite key is a prefix followed by one labeled segment per facet, e.g.
//! `$mallstoredirectory#mall_eastpointe`. Keys may be partial: the first facet
//! without a supplied value ends the key right after its label, which is what
//! range scans over a sort key rely on.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use facetdb_model::{AttributeValue, Item};

use crate::schema::{FacetDefinition, Schema};

/// A facet paired with the label written into keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FacetLabel {
    /// Attribute name.
    pub name: String,
    /// Label written into the key.
    pub label: String,
}

/// Build labels for `facets` in order. Labels are the lower-cased names.
#[must_use]
pub fn labels<S: AsRef<str>>(facets: &[S]) -> Vec<FacetLabel> {
    facets
        .iter()
        .map(|f| FacetLabel {
            name: f.as_ref().to_owned(),
            label: f.as_ref().to_lowercase(),
        })
        .collect()
}

/// Casing overlay applied to a whole key after it is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Casing {
    /// Leave the key as built.
    #[default]
    Default,
    /// Upper-case the key.
    Upper,
    /// Lower-case the key.
    Lower,
    /// Leave the key as built.
    None,
}

impl Casing {
    fn apply(self, key: String) -> String {
        match self {
            Self::Upper => key.to_uppercase(),
            Self::Lower => key.to_lowercase(),
            Self::Default | Self::None => key,
        }
    }
}

/// Options controlling [`make_key`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyOptions {
    /// Text the key starts with.
    pub prefix: String,
    /// Labels are written verbatim instead of as `#<label>_`.
    pub is_custom: bool,
    /// Casing overlay.
    pub casing: Option<Casing>,
    /// Appended when every facet is supplied.
    pub postfix: Option<String>,
    /// Stop before the label of the first missing facet.
    pub exclude_label_tail: bool,
    /// Never append the postfix.
    pub exclude_postfix: bool,
}

impl KeyOptions {
    /// Options for a key with the given prefix.
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            ..Self::default()
        }
    }
}

/// A built key and whether every facet contributed a value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyResult {
    /// The key text.
    pub key: String,
    /// `true` when every facet was supplied.
    pub fulfilled: bool,
}

/// Build a composite key from `labels` and the `supplied` values.
#[must_use]
pub fn make_key(options: &KeyOptions, labels: &[FacetLabel], supplied: &Item) -> KeyResult {
    let mut key = options.prefix.clone();
    let mut found = 0;

    for label in labels {
        let value = supplied.get(&label.name);
        if value.is_none() && options.exclude_label_tail {
            break;
        }

        if options.is_custom {
            key.push_str(&label.label);
        } else {
            key.push('#');
            key.push_str(&label.label);
            key.push('_');
        }

        let Some(value) = value else {
            break;
        };
        key.push_str(&render_value(value).to_lowercase());
        found += 1;
    }

    let fulfilled = found == labels.len();
    if fulfilled && !options.exclude_postfix {
        if let Some(postfix) = &options.postfix {
            key.push_str(postfix);
        }
    }

    if let Some(casing) = options.casing {
        key = casing.apply(key);
    }

    KeyResult { key, fulfilled }
}

/// Render a value as key text, before lower-casing.
#[must_use]
pub fn render_value(value: &AttributeValue) -> String {
    match value {
        AttributeValue::S(s) | AttributeValue::N(s) => s.clone(),
        AttributeValue::Bool(b) => b.to_string(),
        AttributeValue::Null(_) => "null".to_owned(),
        AttributeValue::B(b) => STANDARD.encode(b),
        AttributeValue::Ss(v) | AttributeValue::Ns(v) => v.join(","),
        AttributeValue::Bs(v) => v
            .iter()
            .map(|b| STANDARD.encode(b))
            .collect::<Vec<_>>()
            .join(","),
        // Going through `serde_json::Value` sorts map keys, so equal maps
        // render equal keys. Serializing an `AttributeValue` cannot fail:
        // every map key is a string and no variant raises a custom error.
        AttributeValue::L(_) | AttributeValue::M(_) => serde_json::to_value(value)
            .map(|json| json.to_string())
            .unwrap_or_default(),
    }
}

/// `$<service>`, lower-cased.
#[must_use]
pub fn partition_key_prefix(service: &str) -> String {
    format!("${}", service.to_lowercase())
}

/// `$<entity>_<version>`, lower-cased; the version segment is omitted when
/// empty.
#[must_use]
pub fn sort_key_prefix(entity: &str, version: &str) -> String {
    let entity = entity.to_lowercase();
    if version.is_empty() {
        format!("${entity}")
    } else {
        format!("${entity}_{version}")
    }
}

/// Build the partition key of `def` for an entity of `schema`.
#[must_use]
pub fn partition_key(schema: &Schema, def: &FacetDefinition, supplied: &Item) -> KeyResult {
    let options = KeyOptions {
        casing: def.casing,
        ..KeyOptions::with_prefix(partition_key_prefix(&schema.service))
    };
    make_key(&options, &labels(&def.facets), supplied)
}

/// Build the sort key of `def` for an entity of `schema`.
#[must_use]
pub fn sort_key(schema: &Schema, def: &FacetDefinition, supplied: &Item) -> KeyResult {
    let options = KeyOptions {
        casing: def.casing,
        ..KeyOptions::with_prefix(sort_key_prefix(&schema.entity, &schema.version))
    };
    make_key(&options, &labels(&def.facets), supplied)
}
