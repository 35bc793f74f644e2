//! Storage primitive enum.

use std::fmt;

/// The storage primitives a transport executes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOperation {
    // Item CRUD
    /// Read one item by primary key.
    GetItem,
    /// Insert or replace one item.
    PutItem,
    /// Modify one item.
    UpdateItem,
    /// Delete one item by primary key.
    DeleteItem,

    // Query & Scan
    /// Read items by key condition.
    Query,
    /// Read every item of a table.
    Scan,

    // Batch operations
    /// Read many items by key.
    BatchGetItem,
    /// Put or delete many items.
    BatchWriteItem,

    // Transactions
    /// Atomic multi-item write.
    TransactWriteItems,
    /// Atomic multi-item read.
    TransactGetItems,
}

impl StoreOperation {
    /// Returns the operation name string.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GetItem => "GetItem",
            Self::PutItem => "PutItem",
            Self::UpdateItem => "UpdateItem",
            Self::DeleteItem => "DeleteItem",
            Self::Query => "Query",
            Self::Scan => "Scan",
            Self::BatchGetItem => "BatchGetItem",
            Self::BatchWriteItem => "BatchWriteItem",
            Self::TransactWriteItems => "TransactWriteItems",
            Self::TransactGetItems => "TransactGetItems",
        }
    }

    /// Parse an operation name string into a `StoreOperation`.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "GetItem" => Some(Self::GetItem),
            "PutItem" => Some(Self::PutItem),
            "UpdateItem" => Some(Self::UpdateItem),
            "DeleteItem" => Some(Self::DeleteItem),
            "Query" => Some(Self::Query),
            "Scan" => Some(Self::Scan),
            "BatchGetItem" => Some(Self::BatchGetItem),
            "BatchWriteItem" => Some(Self::BatchWriteItem),
            "TransactWriteItems" => Some(Self::TransactWriteItems),
            "TransactGetItems" => Some(Self::TransactGetItems),
            _ => None,
        }
    }

    /// Returns `true` if the primitive only reads.
    #[must_use]
    pub fn is_read(&self) -> bool {
        matches!(
            self,
            Self::GetItem | Self::Query | Self::Scan | Self::BatchGetItem | Self::TransactGetItems
        )
    }
}

impl fmt::Display for StoreOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
