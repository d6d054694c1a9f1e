//! Shared types for the storefront order system.
//!
//! Identifiers, money, the closed literal sets used on the wire and in the
//! database, and the authenticated principal.

mod literals;
mod money;
mod principal;
mod types;

pub use literals::{OrderStatus, ParseLiteralError, PaymentMethod, PaymentStatus, Role};
pub use money::Money;
pub use principal::Principal;
pub use types::{OrderId, ProductId, UserId};
