//! Order placement requests.
//!
//! An [`OrderDraft`] is what the boundary hands over: every field optional so
//! that all missing ones can be reported at once. [`OrderDraft::validate`]
//! turns it into a [`PlaceOrder`], the only shape the workflow writes.

use chrono::{DateTime, Utc};
use common::{Money, OrderStatus, PaymentMethod, ProductId, UserId};
use order_store::{NewLineItem, NewOrder, NewPayment};

use super::OrderError;
use super::payment::derive_payment;

/// One requested line item.
#[derive(Debug, Clone, PartialEq)]
pub struct LineItemDraft {
    pub product_id: ProductId,
    pub quantity: i64,
    /// Unit price the client saw when ordering.
    pub price: Money,
}

impl LineItemDraft {
    pub fn new(product_id: ProductId, quantity: i64, price: Money) -> Self {
        Self {
            product_id,
            quantity,
            price,
        }
    }
}

/// The requested payment. Its status is never taken from the client.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentDraft {
    pub amount: Option<Money>,
    pub payment_method: PaymentMethod,
    pub transaction_id: Option<String>,
}

impl PaymentDraft {
    pub fn cash() -> Self {
        Self {
            amount: None,
            payment_method: PaymentMethod::Cash,
            transaction_id: None,
        }
    }

    pub fn bank_transfer(transaction_id: impl Into<String>) -> Self {
        Self {
            amount: None,
            payment_method: PaymentMethod::BankTransfer,
            transaction_id: Some(transaction_id.into()),
        }
    }

    /// Sets the amount the client claims to pay.
    pub fn with_amount(mut self, amount: Money) -> Self {
        self.amount = Some(amount);
        self
    }
}

/// An unvalidated order placement request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrderDraft {
    pub user_id: Option<UserId>,
    pub total_amount: Option<Money>,
    pub shipping_address: Option<String>,
    pub line_items: Option<Vec<LineItemDraft>>,
    pub payment: Option<PaymentDraft>,
}

impl OrderDraft {
    /// Validates the draft.
    ///
    /// Every missing or empty field is reported together. Quantities must be
    /// at least 1 and prices non-negative. The total is recomputed from the
    /// line items and a supplied total or payment amount must agree with it.
    pub fn validate(self) -> Result<PlaceOrder, OrderError> {
        let mut missing = Vec::new();

        if self.user_id.is_none() {
            missing.push("user_id");
        }
        if self.total_amount.is_none() {
            missing.push("total_amount");
        }
        let shipping_address = self
            .shipping_address
            .map(|a| a.trim().to_string())
            .filter(|a| !a.is_empty());
        if shipping_address.is_none() {
            missing.push("shipping_address");
        }
        let line_items = self.line_items.filter(|items| !items.is_empty());
        if line_items.is_none() {
            missing.push("line_items");
        }
        match &self.payment {
            None => missing.push("payment"),
            Some(payment) if payment.payment_method == PaymentMethod::BankTransfer => {
                let has_reference = payment
                    .transaction_id
                    .as_deref()
                    .is_some_and(|id| !id.trim().is_empty());
                if !has_reference {
                    missing.push("payment.transaction_id");
                }
            }
            Some(_) => {}
        }

        let (Some(user_id), Some(total_amount), Some(shipping_address), Some(items), Some(payment)) = (
            self.user_id,
            self.total_amount,
            shipping_address,
            line_items,
            self.payment,
        ) else {
            return Err(OrderError::MissingFields { fields: missing });
        };
        if !missing.is_empty() {
            return Err(OrderError::MissingFields { fields: missing });
        }

        let mut line_items = Vec::with_capacity(items.len());
        for item in items {
            let quantity = u32::try_from(item.quantity)
                .ok()
                .filter(|q| *q >= 1)
                .ok_or(OrderError::InvalidQuantity {
                    product_id: item.product_id,
                    quantity: item.quantity,
                })?;
            if item.price.is_negative() {
                return Err(OrderError::InvalidPrice {
                    product_id: item.product_id,
                    price: item.price,
                });
            }
            if !item.price.fits_column() {
                return Err(OrderError::AmountOutOfRange {
                    field: "line_items.price",
                });
            }
            line_items.push(NewLineItem {
                product_id: item.product_id,
                quantity,
                price: item.price,
            });
        }

        let computed = line_items
            .iter()
            .try_fold(Money::zero(), |acc, item| {
                item.subtotal().and_then(|subtotal| acc.checked_add(subtotal))
            })
            .filter(Money::fits_column)
            .ok_or(OrderError::AmountOutOfRange {
                field: "total_amount",
            })?;
        if !total_amount.fits_column() {
            return Err(OrderError::AmountOutOfRange {
                field: "total_amount",
            });
        }
        if total_amount != computed {
            return Err(OrderError::TotalMismatch {
                supplied: total_amount,
                computed,
            });
        }
        if let Some(amount) = payment.amount
            && !amount.fits_column()
        {
            return Err(OrderError::AmountOutOfRange {
                field: "payment.amount",
            });
        }
        if let Some(amount) = payment.amount
            && amount != computed
        {
            return Err(OrderError::PaymentAmountMismatch {
                supplied: amount,
                computed,
            });
        }

        Ok(PlaceOrder {
            user_id,
            shipping_address,
            line_items,
            total_amount: computed,
            payment_method: payment.payment_method,
            transaction_id: payment.transaction_id,
        })
    }
}

/// A validated order placement.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaceOrder {
    pub user_id: UserId,
    pub shipping_address: String,
    pub line_items: Vec<NewLineItem>,
    /// Sum of `price * quantity` over the line items.
    pub total_amount: Money,
    pub payment_method: PaymentMethod,
    pub transaction_id: Option<String>,
}

impl PlaceOrder {
    /// Builds the rows to insert, stamped with `placed_at`.
    pub fn into_rows(self, placed_at: DateTime<Utc>) -> (NewOrder, Vec<NewLineItem>, NewPayment) {
        let order = NewOrder {
            user_id: self.user_id,
            total_amount: self.total_amount,
            shipping_address: self.shipping_address,
            status: OrderStatus::Pending,
            order_date: placed_at,
        };
        let payment = derive_payment(
            self.payment_method,
            self.transaction_id,
            self.total_amount,
            placed_at,
        );
        (order, self.line_items, payment)
    }
}
