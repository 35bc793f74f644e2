//! Model types for facetdb.
//!
//! This crate holds the value types shared by the key builder, expression
//! compiler and transports: [`AttributeValue`], the request inputs the
//! operation assembler produces, the outputs a transport returns and the
//! [`FacetError`] error type.
#![allow(clippy::struct_excessive_bools)]
#![allow(clippy::module_name_repetitions)]

pub mod attribute_value;
pub mod error;
pub mod input;
pub mod operations;
pub mod output;
pub mod types;

pub use attribute_value::AttributeValue;
pub use error::{ErrorCode, ErrorKind, FacetError};
pub use operations::StoreOperation;
pub use types::{Item, Key};
