//! Persistence for orders, their line items and payments.
//!
//! Writes go through a [`StoreTransaction`] obtained from [`OrderStore::begin`];
//! nothing a transaction writes is visible to readers until it commits.

pub mod error;
pub mod memory;
pub mod postgres;
pub mod query;
pub mod records;
pub mod store;

pub use common::{Money, OrderId, OrderStatus, PaymentMethod, PaymentStatus, ProductId, UserId};
pub use error::{Result, StoreError};
pub use memory::InMemoryOrderStore;
pub use postgres::PostgresOrderStore;
pub use query::OrderQuery;
pub use records::{
    LineItemRecord, NewLineItem, NewOrder, NewPayment, OrderRecord, OrderView, PaymentRecord,
    ProductRecord, UserRecord,
};
pub use store::{OrderStore, OrderStoreExt, StoreTransaction};
