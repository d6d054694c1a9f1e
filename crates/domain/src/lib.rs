//! Domain layer for the storefront order system.
//!
//! This crate provides the order workflow engine:
//! - Validation of order placement requests into closed shapes
//! - Payment status derivation from the payment method
//! - The order status lifecycle as a declared transition table
//! - `OrderWorkflow`, which runs creation and status changes in one store
//!   transaction each

pub mod error;
pub mod order;

pub use common::{
    Money, OrderId, OrderStatus, PaymentMethod, PaymentStatus, Principal, ProductId, Role, UserId,
};
pub use error::DomainError;
pub use order::{
    LineItemDraft, OrderDraft, OrderError, OrderWorkflow, PaymentDraft, PlaceOrder, SideEffect,
    Transition, derive_payment, plan_transition,
};
