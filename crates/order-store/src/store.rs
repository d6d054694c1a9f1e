use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{
    NewLineItem, NewOrder, NewPayment, OrderId, OrderQuery, OrderRecord, OrderStatus, OrderView,
    Result, UserId,
};

/// Core trait for order store implementations.
///
/// All implementations must be thread-safe (Send + Sync). Writes are only
/// possible through a transaction; reads see committed data only.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Acquires a connection and opens a transaction on it.
    ///
    /// The connection is held until the transaction is committed, rolled back
    /// or dropped. Dropping an open transaction rolls it back.
    async fn begin(&self) -> Result<Box<dyn StoreTransaction>>;

    /// Runs the order read projection.
    ///
    /// Each order is left-joined with its payment and owner, and carries its
    /// line items inner-joined with their products. Orders are returned newest
    /// first.
    async fn query_orders(&self, query: OrderQuery) -> Result<Vec<OrderView>>;
}

/// A unit of work against the store.
///
/// Either every write made through the transaction becomes visible at
/// [`commit`](StoreTransaction::commit), or none does.
#[async_trait]
pub trait StoreTransaction: Send {
    /// Inserts an order row and returns its generated identifier.
    async fn insert_order(&mut self, order: &NewOrder) -> Result<OrderId>;

    /// Inserts one line item under `order_id`.
    async fn insert_line_item(&mut self, order_id: OrderId, item: &NewLineItem) -> Result<()>;

    /// Inserts the payment row for `order_id`.
    async fn insert_payment(&mut self, order_id: OrderId, payment: &NewPayment) -> Result<()>;

    /// Reads an order row and locks it for the rest of the transaction.
    ///
    /// Returns None if the order doesn't exist.
    async fn lock_order(&mut self, order_id: OrderId) -> Result<Option<OrderRecord>>;

    /// Sets the order's status.
    async fn update_order_status(&mut self, order_id: OrderId, status: OrderStatus)
    -> Result<()>;

    /// Marks the order's payment completed at `paid_at`.
    async fn complete_payment(&mut self, order_id: OrderId, paid_at: DateTime<Utc>) -> Result<()>;

    /// Commits every write and releases the connection.
    async fn commit(self: Box<Self>) -> Result<()>;

    /// Discards every write and releases the connection.
    async fn rollback(self: Box<Self>) -> Result<()>;
}

/// Extension trait providing convenience reads for order stores.
#[async_trait]
pub trait OrderStoreExt: OrderStore {
    /// Loads one order with its items and payment.
    async fn get_order_view(&self, order_id: OrderId) -> Result<Option<OrderView>> {
        Ok(self
            .query_orders(OrderQuery::for_order(order_id))
            .await?
            .into_iter()
            .next())
    }

    /// Loads every order owned by a user, newest first.
    async fn orders_for_user(&self, user_id: UserId) -> Result<Vec<OrderView>> {
        self.query_orders(OrderQuery::for_user(user_id)).await
    }
}

// Blanket implementation for all OrderStore implementations
impl<T: OrderStore + ?Sized> OrderStoreExt for T {}
