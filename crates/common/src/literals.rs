//! Closed literal sets shared by the HTTP boundary and the database.
//!
//! Every enum here round-trips through exactly one lowercase literal. Anything
//! else fails to parse with [`ParseLiteralError`].

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A string that is not one of the recognized literals for its kind.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unrecognized {kind} '{value}'")]
pub struct ParseLiteralError {
    pub kind: &'static str,
    pub value: String,
}

macro_rules! literal_enum {
    (
        $(#[$meta:meta])*
        $name:ident, $kind:literal {
            $($(#[$vmeta:meta])* $variant:ident => $lit:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($(#[$vmeta])* $variant),+
        }

        impl $name {
            /// All recognized values, in declaration order.
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// Returns the wire / column literal.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $lit),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = ParseLiteralError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($lit => Ok($name::$variant),)+
                    other => Err(ParseLiteralError {
                        kind: $kind,
                        value: other.to_string(),
                    }),
                }
            }
        }
    };
}

literal_enum!(
    /// Lifecycle status of an order.
    ///
    /// ```text
    /// pending ──► processing ──► shipped ──► delivered
    ///    │            │             │
    ///    └────────────┴─────────────┴──► cancelled
    /// ```
    OrderStatus, "order status" {
        /// Placed, not yet handled.
        Pending => "pending",
        /// Being prepared.
        Processing => "processing",
        /// Handed to the carrier.
        Shipped => "shipped",
        /// Received by the customer (terminal).
        Delivered => "delivered",
        /// Abandoned (terminal).
        Cancelled => "cancelled",
    }
);

impl OrderStatus {
    /// Returns true if no outgoing transitions are defined.
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }

    /// Position on the happy path, `None` for `cancelled`.
    pub fn progress(&self) -> Option<u8> {
        match self {
            OrderStatus::Pending => Some(0),
            OrderStatus::Processing => Some(1),
            OrderStatus::Shipped => Some(2),
            OrderStatus::Delivered => Some(3),
            OrderStatus::Cancelled => None,
        }
    }
}

impl Default for OrderStatus {
    fn default() -> Self {
        OrderStatus::Pending
    }
}

literal_enum!(
    /// How an order is paid.
    PaymentMethod, "payment method" {
        /// Cash on delivery.
        Cash => "cash",
        /// Bank transfer, presumed verified off-band.
        BankTransfer => "bank_transfer",
    }
);

literal_enum!(
    /// Settlement status of a payment.
    PaymentStatus, "payment status" {
        Pending => "pending",
        Completed => "completed",
    }
);

literal_enum!(
    /// Role of an authenticated user.
    Role, "role" {
        Client => "client",
        Admin => "admin",
    }
);
