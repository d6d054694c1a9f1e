use common::{OrderId, ParseLiteralError};
use thiserror::Error;

/// Errors that can occur when reading from or writing to the order store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A row referenced a parent that does not exist.
    #[error("Foreign key violation on {table}: {detail}")]
    ForeignKeyViolation { table: String, detail: String },

    /// A second payment was inserted for the same order.
    #[error("Order {0} already has a payment")]
    DuplicatePayment(OrderId),

    /// The order row does not exist.
    #[error("Order not found: {0}")]
    OrderNotFound(OrderId),

    /// The order exists but has no payment row.
    #[error("Payment not found for order {0}")]
    PaymentNotFound(OrderId),

    /// A value does not fit the column it is written to or read from.
    #[error("Value out of range for {field}")]
    OutOfRange { field: &'static str },

    /// A text column held a value outside its literal set.
    #[error("Invalid stored literal: {0}")]
    InvalidLiteral(#[from] ParseLiteralError),

    /// The store could not complete the operation.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Result type for order store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
