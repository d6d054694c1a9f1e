//! Domain error types.

use common::OrderId;
use order_store::StoreError;
use thiserror::Error;

use crate::order::OrderError;

/// Errors that can occur during domain operations.
#[derive(Debug, Error)]
pub enum DomainError {
    /// The request was rejected by order rules.
    #[error(transparent)]
    Order(#[from] OrderError),

    /// The principal has no rights over the target resource.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// The referenced order does not exist.
    #[error("Order not found: {0}")]
    OrderNotFound(OrderId),

    /// An error occurred in the order store.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl DomainError {
    /// Returns true if the caller can fix the failure by changing the request
    /// or the principal; false if it happened on the server side.
    pub fn is_client_error(&self) -> bool {
        !matches!(self, DomainError::Store(_))
    }
}
