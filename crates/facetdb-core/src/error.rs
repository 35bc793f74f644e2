//! Core error helpers.

use facetdb_model::error::{ErrorCode, FacetError};
use facetdb_model::operations::StoreOperation;

/// Result alias used throughout the core crate.
pub type Result<T> = std::result::Result<T, FacetError>;

/// Convert a cursor codec error into a facet error.
///
/// Takes `e` by value because this is used as a closure argument to `.map_err()`.
#[must_use]
pub fn cursor_error_to_facet(e: crate::cursor::CursorCodecError) -> FacetError {
    let code = match e {
        crate::cursor::CursorCodecError::Encode(_) => ErrorCode::CursorEncodingError,
        _ => ErrorCode::CursorDecodingError,
    };
    FacetError::with_message(code, e.to_string()).with_source(e)
}

/// Convert a transport failure into a facet error carrying it as the source.
#[must_use]
pub fn transport_error_to_facet(
    operation: StoreOperation,
    e: crate::transport::TransportError,
) -> FacetError {
    FacetError::with_message(
        ErrorCode::TransportError,
        format!("failed to execute {operation}"),
    )
    .with_source(e)
}

/// Error for an entity that has no transport configured.
#[must_use]
pub fn no_client(entity: &str) -> FacetError {
    FacetError::with_message(
        ErrorCode::NoClientProvided,
        format!("no transport was provided to entity {entity}"),
    )
}
