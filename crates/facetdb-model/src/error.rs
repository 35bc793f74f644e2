//! facetdb error types.
//!
//! Every fallible operation in the workspace reports a [`FacetError`] carrying a
//! stable [`ErrorCode`], a human-readable message and an optional cause.

use std::fmt;

/// Broad classification of an [`ErrorCode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The entity or service definition is malformed.
    Schema,
    /// The request cannot be assembled from what the caller supplied.
    Request,
    /// A value failed an attribute rule.
    Validation,
    /// A cursor could not be encoded or decoded.
    Encoding,
    /// The transport failed to execute a request.
    Transport,
}

/// Stable error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[non_exhaustive]
pub enum ErrorCode {
    /// Schema definition is malformed.
    InvalidSchema,
    /// Entity definition is malformed.
    InvalidEntity,
    /// An entity with the same name is already registered.
    DuplicateEntity,
    /// Keys required for the operation are not fulfilled.
    InvalidKeys,
    /// Unknown access pattern.
    InvalidIndex,
    /// A required attribute is missing.
    MissingAttribute,
    /// An expression references an undeclared attribute.
    UnknownAttribute,
    /// Unknown named filter.
    UnknownFilter,
    /// The same attribute appears under two update actions.
    ConflictingUpdate,
    /// Entity is not registered in the service.
    EntityNotFound,
    /// Collection is not defined by any entity.
    CollectionNotFound,
    /// The operation is not valid in this context.
    InvalidOperation,
    /// No transport has been configured.
    NoClientProvided,
    /// A value failed a validation rule.
    #[default]
    ValidationError,
    /// A value is not one of the allowed enum members.
    InvalidEnumValue,
    /// Attempt to modify a read-only attribute.
    ReadOnlyViolation,
    /// Cursor could not be encoded.
    CursorEncodingError,
    /// Cursor could not be decoded.
    CursorDecodingError,
    /// The transport returned an error.
    TransportError,
}

impl ErrorCode {
    /// Returns the short error code string.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidSchema => "InvalidSchema",
            Self::InvalidEntity => "InvalidEntity",
            Self::DuplicateEntity => "DuplicateEntity",
            Self::InvalidKeys => "InvalidKeys",
            Self::InvalidIndex => "InvalidIndex",
            Self::MissingAttribute => "MissingAttribute",
            Self::UnknownAttribute => "UnknownAttribute",
            Self::UnknownFilter => "UnknownFilter",
            Self::ConflictingUpdate => "ConflictingUpdate",
            Self::EntityNotFound => "EntityNotFound",
            Self::CollectionNotFound => "CollectionNotFound",
            Self::InvalidOperation => "InvalidOperation",
            Self::NoClientProvided => "NoClientProvided",
            Self::ValidationError => "ValidationError",
            Self::InvalidEnumValue => "InvalidEnumValue",
            Self::ReadOnlyViolation => "ReadOnlyViolation",
            Self::CursorEncodingError => "CursorEncodingError",
            Self::CursorDecodingError => "CursorDecodingError",
            Self::TransportError => "TransportError",
        }
    }

    /// Returns the classification of this code.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidSchema | Self::InvalidEntity | Self::DuplicateEntity => ErrorKind::Schema,
            Self::ValidationError | Self::InvalidEnumValue | Self::ReadOnlyViolation => {
                ErrorKind::Validation
            }
            Self::CursorEncodingError | Self::CursorDecodingError => ErrorKind::Encoding,
            Self::TransportError => ErrorKind::Transport,
            _ => ErrorKind::Request,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The error type returned by every facetdb operation.
#[derive(Debug)]
pub struct FacetError {
    /// The error code.
    pub code: ErrorCode,
    /// A human-readable error message.
    pub message: String,
    /// The underlying source error, if any.
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl fmt::Display for FacetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FacetError({}): {}", self.code, self.message)
    }
}

impl std::error::Error for FacetError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

impl FacetError {
    /// Create a new `FacetError` from an error code.
    #[must_use]
    pub fn new(code: ErrorCode) -> Self {
        Self {
            message: code.as_str().to_owned(),
            code,
            source: None,
        }
    }

    /// Create a new `FacetError` with a custom message.
    #[must_use]
    pub fn with_message(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code,
            source: None,
        }
    }

    /// Set the source error.
    #[must_use]
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Returns the classification of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        self.code.kind()
    }

    // -- Convenience constructors --

    /// Keys are not fulfilled.
    #[must_use]
    pub fn invalid_keys(message: impl Into<String>) -> Self {
        Self::with_message(ErrorCode::InvalidKeys, message)
    }

    /// Unknown access pattern.
    #[must_use]
    pub fn invalid_index(access_pattern: &str) -> Self {
        Self::with_message(
            ErrorCode::InvalidIndex,
            format!("unknown access pattern: {access_pattern}"),
        )
    }

    /// Required attribute is absent.
    #[must_use]
    pub fn missing_attribute(attribute: &str) -> Self {
        Self::with_message(
            ErrorCode::MissingAttribute,
            format!("missing required attribute: {attribute}"),
        )
    }

    /// Attribute is not declared by the entity.
    #[must_use]
    pub fn unknown_attribute(attribute: &str) -> Self {
        Self::with_message(
            ErrorCode::UnknownAttribute,
            format!("unknown attribute: {attribute}"),
        )
    }

    /// Value failed a validation rule.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::with_message(ErrorCode::ValidationError, message)
    }

    /// Schema definition problem.
    #[must_use]
    pub fn invalid_schema(message: impl Into<String>) -> Self {
        Self::with_message(ErrorCode::InvalidSchema, message)
    }
}

/// Create a `FacetError` from an error code.
///
/// # Examples
///
/// ```
/// use facetdb_model::facet_error;
/// use facetdb_model::error::ErrorCode;
///
/// let err = facet_error!(InvalidKeys);
/// assert_eq!(err.code, ErrorCode::InvalidKeys);
///
/// let err = facet_error!(EntityNotFound, "no entity named user");
/// assert_eq!(err.message, "no entity named user");
/// ```
#[macro_export]
macro_rules! facet_error {
    ($code:ident) => {
        $crate::error::FacetError::new($crate::error::ErrorCode::$code)
    };
    ($code:ident, $msg:expr) => {
        $crate::error::FacetError::with_message($crate::error::ErrorCode::$code, $msg)
    };
}
