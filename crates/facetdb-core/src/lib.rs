//! Single-table modelling for key-value stores.
//!
//! Entities declare attributes and access patterns; the crate turns entity
//! level intent into fully formed store inputs (composite keys, placeholder
//! safe expressions, validated and enriched items) and, given a
//! [`Transport`](transport::Transport), executes them and shapes the results.
#![allow(clippy::doc_markdown, clippy::module_name_repetitions)]

pub mod batch;
pub mod clock;
pub mod config;
pub mod cursor;
pub mod enrich;
pub mod entity;
pub mod error;
pub mod executor;
pub mod expression;
pub mod key;
pub mod params;
pub mod schema;
pub mod service;
pub mod transaction;
pub mod transform;
pub mod transport;
pub mod validate;

pub use clock::{Clock, FixedClock, SystemClock};
pub use config::FacetConfig;
pub use enrich::Ttl;
pub use entity::Entity;
pub use error::Result;
pub use executor::Page;
pub use expression::{ExpressionCompiler, NamedFilter, UpdateAction, UpdateIntent};
pub use facetdb_model::{AttributeValue, ErrorCode, ErrorKind, FacetError, Item, Key};
pub use params::{Order, SortCondition};
pub use schema::{
    AttributeDefinition, AttributeType, FacetDefinition, IndexDefinition, Padding, Schema,
    TimestampsConfig,
};
pub use service::{Collection, Service};
pub use transaction::TransactionItem;
pub use transport::{Transport, TransportError};

/// Build an [`Item`] from `name => value` pairs; values go through
/// `AttributeValue::from`.
///
/// ```
/// let item = facetdb_core::item! { "id" => "123", "rent" => 1500_i64 };
/// assert_eq!(item.len(), 2);
/// ```
#[macro_export]
macro_rules! item {
    () => {
        $crate::Item::new()
    };
    ($($name:expr => $value:expr),+ $(,)?) => {{
        let mut item = $crate::Item::new();
        $(
            item.insert(::std::string::String::from($name), $crate::AttributeValue::from($value));
        )+
        item
    }};
}
