//! Row shapes written to and read from the store.

use chrono::{DateTime, Utc};
use common::{Money, OrderId, OrderStatus, PaymentMethod, PaymentStatus, ProductId, Role, UserId};

/// An `orders` row to insert. The store assigns the identifier.
#[derive(Debug, Clone, PartialEq)]
pub struct NewOrder {
    pub user_id: UserId,
    pub total_amount: Money,
    pub shipping_address: String,
    pub status: OrderStatus,
    pub order_date: DateTime<Utc>,
}

/// An `order_details` row to insert under a freshly inserted order.
#[derive(Debug, Clone, PartialEq)]
pub struct NewLineItem {
    pub product_id: ProductId,
    pub quantity: u32,
    /// Unit price captured at order time.
    pub price: Money,
}

impl NewLineItem {
    /// Returns `price * quantity`, or `None` on overflow.
    pub fn subtotal(&self) -> Option<Money> {
        self.price.checked_mul(self.quantity)
    }
}

/// A `payments` row to insert under a freshly inserted order.
#[derive(Debug, Clone, PartialEq)]
pub struct NewPayment {
    pub amount: Money,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub transaction_id: Option<String>,
    pub payment_date: Option<DateTime<Utc>>,
}

/// A persisted `orders` row.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderRecord {
    pub order_id: OrderId,
    pub user_id: UserId,
    pub total_amount: Money,
    pub shipping_address: String,
    pub status: OrderStatus,
    pub order_date: DateTime<Utc>,
}

/// A persisted `order_details` row joined with its product.
#[derive(Debug, Clone, PartialEq)]
pub struct LineItemRecord {
    pub order_detail_id: i64,
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub product_name: String,
    pub product_url: Option<String>,
    pub quantity: u32,
    pub price: Money,
}

/// A persisted `payments` row.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentRecord {
    pub payment_id: i64,
    pub order_id: OrderId,
    pub amount: Money,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub transaction_id: Option<String>,
    pub payment_date: Option<DateTime<Utc>>,
}

/// An order composed with its owner's name, line items and payment.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderView {
    pub order: OrderRecord,
    pub username: Option<String>,
    pub items: Vec<LineItemRecord>,
    pub payment: Option<PaymentRecord>,
}

/// A `users` row. Users are managed outside the order workflow.
#[derive(Debug, Clone, PartialEq)]
pub struct UserRecord {
    pub user_id: UserId,
    pub username: String,
    pub email: Option<String>,
    pub role: Role,
}

/// A `products` row. The catalog is managed outside the order workflow.
#[derive(Debug, Clone, PartialEq)]
pub struct ProductRecord {
    pub product_id: ProductId,
    pub name: String,
    pub price: Money,
    pub stock_quantity: i32,
    pub category: String,
    pub url: Option<String>,
}
