//! Decimal money amounts in currency units.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A money amount in currency units, stored as an exact decimal.
///
/// Amounts map to `NUMERIC` columns and are never rounded through floating
/// point. On the wire they serialize as decimal strings and accept either
/// JSON numbers or strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(Decimal);

impl Money {
    /// Decimal places kept by the money columns.
    pub const SCALE: u32 = 2;
    /// Integer digits kept by the money columns.
    pub const MAX_INTEGER_DIGITS: u32 = 12;

    /// Wraps a decimal amount.
    pub fn new(amount: Decimal) -> Self {
        Self(amount)
    }

    /// Creates an amount from whole currency units.
    pub fn from_units(units: i64) -> Self {
        Self(Decimal::from(units))
    }

    /// Returns zero money.
    pub fn zero() -> Self {
        Self(Decimal::ZERO)
    }

    /// Returns the underlying decimal.
    pub fn amount(&self) -> Decimal {
        self.0
    }

    /// Returns true if the amount is zero.
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Returns true if the amount is below zero.
    pub fn is_negative(&self) -> bool {
        self.0.is_sign_negative() && !self.0.is_zero()
    }

    /// Multiplies by a quantity, or `None` on decimal overflow.
    pub fn checked_mul(&self, quantity: u32) -> Option<Money> {
        self.0.checked_mul(Decimal::from(quantity)).map(Money)
    }

    /// Adds two amounts, or `None` on decimal overflow.
    pub fn checked_add(&self, rhs: Money) -> Option<Money> {
        self.0.checked_add(rhs.0).map(Money)
    }

    /// Returns true if the amount is storable in a `NUMERIC(14, 2)` column
    /// without rounding: at most [`Money::SCALE`] significant decimal places
    /// and at most [`Money::MAX_INTEGER_DIGITS`] integer digits.
    pub fn fits_column(&self) -> bool {
        let limit = Decimal::from(10_i64.pow(Self::MAX_INTEGER_DIGITS));
        self.0.normalize().scale() <= Self::SCALE && self.0.abs() < limit
    }
}

impl Default for Money {
    fn default() -> Self {
        Self::zero()
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.normalize())
    }
}

impl From<Decimal> for Money {
    fn from(amount: Decimal) -> Self {
        Self(amount)
    }
}

impl From<Money> for Decimal {
    fn from(money: Money) -> Self {
        money.0
    }
}
