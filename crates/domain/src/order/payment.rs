use chrono::{DateTime, Utc};
use common::{Money, PaymentMethod, PaymentStatus};
use order_store::NewPayment;

/// Builds the payment row for a new order.
///
/// The status follows from the method alone: a bank transfer is presumed
/// verified off-band and starts `completed` with its reference kept; cash on
/// delivery starts `pending` and any reference the client sent is dropped.
pub fn derive_payment(
    method: PaymentMethod,
    transaction_id: Option<String>,
    amount: Money,
    placed_at: DateTime<Utc>,
) -> NewPayment {
    match method {
        PaymentMethod::BankTransfer => NewPayment {
            amount,
            payment_method: method,
            payment_status: PaymentStatus::Completed,
            transaction_id,
            payment_date: Some(placed_at),
        },
        PaymentMethod::Cash => NewPayment {
            amount,
            payment_method: method,
            payment_status: PaymentStatus::Pending,
            transaction_id: None,
            payment_date: None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bank_transfer_starts_completed_with_reference() {
        let now = Utc::now();
        let payment = derive_payment(
            PaymentMethod::BankTransfer,
            Some("TX123".to_string()),
            Money::from_units(250),
            now,
        );
        assert_eq!(payment.payment_status, PaymentStatus::Completed);
        assert_eq!(payment.transaction_id.as_deref(), Some("TX123"));
        assert_eq!(payment.payment_date, Some(now));
    }

    #[test]
    fn cash_starts_pending_and_drops_reference() {
        let payment = derive_payment(
            PaymentMethod::Cash,
            Some("SELF-DECLARED".to_string()),
            Money::from_units(250),
            Utc::now(),
        );
        assert_eq!(payment.payment_status, PaymentStatus::Pending);
        assert!(payment.transaction_id.is_none());
        assert!(payment.payment_date.is_none());
    }
}
