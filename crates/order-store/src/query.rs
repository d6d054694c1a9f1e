use common::{OrderId, UserId};

/// Filter for the order read projection.
///
/// An empty query matches every order. Results are always ordered by order
/// date, newest first.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OrderQuery {
    /// Only orders owned by this user.
    pub user_id: Option<UserId>,

    /// Only this order.
    pub order_id: Option<OrderId>,
}

impl OrderQuery {
    /// Creates a query matching every order.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a query for the orders of one user.
    pub fn for_user(user_id: UserId) -> Self {
        Self {
            user_id: Some(user_id),
            ..Default::default()
        }
    }

    /// Creates a query for a single order.
    pub fn for_order(order_id: OrderId) -> Self {
        Self {
            order_id: Some(order_id),
            ..Default::default()
        }
    }

    /// Filters by owning user.
    pub fn user_id(mut self, user_id: UserId) -> Self {
        self.user_id = Some(user_id);
        self
    }

    /// Filters by order.
    pub fn order_id(mut self, order_id: OrderId) -> Self {
        self.order_id = Some(order_id);
        self
    }

    /// Returns true if the given order row passes this filter.
    pub fn matches(&self, order_id: OrderId, user_id: UserId) -> bool {
        self.order_id.is_none_or(|id| id == order_id) && self.user_id.is_none_or(|id| id == user_id)
    }
}
