//! Order status lifecycle.
//!
//! Which moves are legal is decided by [`plan_transition`]; what else must be
//! written alongside a move is declared once per target status in [`RULES`].
//!
//! ```text
//! pending ──► processing ──► shipped ──► delivered
//!    │            │             │
//!    └────────────┴─────────────┴──► cancelled
//! ```
//!
//! Forward moves may skip steps. `delivered` and `cancelled` are terminal.
//! Re-applying the current status is an idempotent no-op.

use common::OrderStatus;

use super::OrderError;

/// A write that accompanies a status change in the same transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SideEffect {
    /// Mark the order's payment completed, stamped with the transition time.
    CompletePayment,
}

/// The side effects owed when an order enters `target`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionRule {
    pub target: OrderStatus,
    pub effects: &'static [SideEffect],
}

/// One rule per status.
pub const RULES: &[TransitionRule] = &[
    TransitionRule {
        target: OrderStatus::Pending,
        effects: &[],
    },
    TransitionRule {
        target: OrderStatus::Processing,
        effects: &[],
    },
    TransitionRule {
        target: OrderStatus::Shipped,
        effects: &[],
    },
    TransitionRule {
        target: OrderStatus::Delivered,
        effects: &[SideEffect::CompletePayment],
    },
    TransitionRule {
        target: OrderStatus::Cancelled,
        effects: &[],
    },
];

/// Looks up the rule for entering `target`.
pub fn rule_for(target: OrderStatus) -> TransitionRule {
    RULES
        .iter()
        .copied()
        .find(|rule| rule.target == target)
        .unwrap_or(TransitionRule {
            target,
            effects: &[],
        })
}

/// Outcome of planning a status change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// The status changes and the listed effects must be applied.
    Apply {
        from: OrderStatus,
        to: OrderStatus,
        effects: &'static [SideEffect],
    },
    /// The order already has the requested status; nothing is written.
    Unchanged(OrderStatus),
}

/// Decides whether an order in `from` may move to `to`.
pub fn plan_transition(from: OrderStatus, to: OrderStatus) -> Result<Transition, OrderError> {
    if from == to {
        return Ok(Transition::Unchanged(from));
    }
    if from.is_terminal() {
        return Err(OrderError::InvalidTransition { from, to });
    }

    let allowed = match (from.progress(), to.progress()) {
        // Cancellation from any non-terminal state.
        (_, None) => true,
        (Some(current), Some(next)) => next > current,
        (None, Some(_)) => false,
    };

    if allowed {
        Ok(Transition::Apply {
            from,
            to,
            effects: rule_for(to).effects,
        })
    } else {
        Err(OrderError::InvalidTransition { from, to })
    }
}
