//! Order placement and lifecycle.

mod commands;
mod lifecycle;
mod payment;
mod workflow;

pub use commands::{LineItemDraft, OrderDraft, PaymentDraft, PlaceOrder};
pub use lifecycle::{SideEffect, Transition, TransitionRule, plan_transition, rule_for};
pub use payment::derive_payment;
pub use workflow::OrderWorkflow;

use common::{Money, OrderStatus, ProductId};
use thiserror::Error;

/// Errors that can occur during order operations.
#[derive(Debug, Error)]
pub enum OrderError {
    /// Required fields were missing or empty.
    #[error("Missing or empty fields: {}", .fields.join(", "))]
    MissingFields { fields: Vec<&'static str> },

    /// Invalid quantity.
    #[error("Invalid quantity for product {product_id}: {quantity} (must be at least 1)")]
    InvalidQuantity { product_id: ProductId, quantity: i64 },

    /// Invalid price.
    #[error("Invalid price for product {product_id}: {price} (must not be negative)")]
    InvalidPrice { product_id: ProductId, price: Money },

    /// An amount cannot be stored exactly in a money column.
    #[error(
        "Amount out of range for {field}: at most 2 decimal places and 12 integer digits are allowed"
    )]
    AmountOutOfRange { field: &'static str },

    /// The supplied total disagrees with the line items.
    #[error("Total amount {supplied} does not match line items total {computed}")]
    TotalMismatch { supplied: Money, computed: Money },

    /// The supplied payment amount disagrees with the line items.
    #[error("Payment amount {supplied} does not match order total {computed}")]
    PaymentAmountMismatch { supplied: Money, computed: Money },

    /// The lifecycle has no transition between the two statuses.
    #[error("Invalid status transition: cannot move order from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },
}
