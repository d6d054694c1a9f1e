//! Order workflow engine.
//!
//! Each write operation owns exactly one store transaction: it is opened,
//! used, and then either committed or rolled back before the operation
//! returns, whichever way it exits.

use std::time::Instant;

use chrono::{DateTime, Utc};
use common::{OrderId, OrderStatus, Principal, UserId};
use order_store::{
    NewLineItem, NewOrder, NewPayment, OrderQuery, OrderStore, OrderStoreExt, OrderView,
    StoreError, StoreTransaction,
};

use super::{OrderDraft, SideEffect, Transition, plan_transition};
use crate::error::DomainError;

/// Service that places orders and moves them through their lifecycle.
///
/// Authorization and validation run before the store is touched. Store
/// failures are logged with full detail here and surface as
/// [`DomainError::Store`].
pub struct OrderWorkflow<S: OrderStore> {
    store: S,
}

impl<S: OrderStore> OrderWorkflow<S> {
    /// Creates a new workflow over the given store.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Returns a reference to the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Places an order: the order row, one row per line item and the payment
    /// row are written in a single transaction.
    ///
    /// A client may only order for itself; an admin may order for anyone.
    /// Returns the new order's identifier.
    #[tracing::instrument(skip(self, principal, draft), fields(actor = %principal.user_id, role = %principal.role))]
    pub async fn create_order(
        &self,
        principal: &Principal,
        draft: OrderDraft,
    ) -> Result<OrderId, DomainError> {
        let started = Instant::now();

        if let Some(owner) = draft.user_id
            && !principal.can_act_for(owner)
        {
            metrics::counter!("order_creation_failures_total", "reason" => "forbidden")
                .increment(1);
            tracing::warn!(%owner, "order placement for another user rejected");
            return Err(DomainError::Forbidden(format!(
                "cannot place orders for user {owner}"
            )));
        }

        let order = draft.validate().inspect_err(|e| {
            metrics::counter!("order_creation_failures_total", "reason" => "validation")
                .increment(1);
            tracing::debug!(error = %e, "order draft rejected");
        })?;

        let (new_order, items, payment) = order.into_rows(Utc::now());

        let result = match self.begin("create_order").await {
            Ok(mut tx) => {
                let outcome = insert_order_rows(tx.as_mut(), &new_order, &items, &payment).await;
                finish(tx, outcome, "create_order").await
            }
            Err(e) => Err(e),
        };

        match &result {
            Ok(order_id) => {
                metrics::counter!("orders_created_total").increment(1);
                metrics::histogram!("order_creation_duration_seconds")
                    .record(started.elapsed().as_secs_f64());
                tracing::info!(
                    %order_id,
                    user_id = %new_order.user_id,
                    items = items.len(),
                    total = %new_order.total_amount,
                    method = %payment.payment_method,
                    "order placed"
                );
            }
            Err(_) => {
                metrics::counter!("order_creation_failures_total", "reason" => "store")
                    .increment(1);
            }
        }

        result
    }

    /// Moves an order to `status` and applies the side effects declared for
    /// entering it, in one transaction. Admin only.
    ///
    /// Returns the order as it reads after the change.
    #[tracing::instrument(skip(self, principal), fields(actor = %principal.user_id))]
    pub async fn set_order_status(
        &self,
        principal: &Principal,
        order_id: OrderId,
        status: OrderStatus,
    ) -> Result<OrderView, DomainError> {
        if !principal.is_admin() {
            return Err(DomainError::Forbidden(
                "only administrators can change order status".to_string(),
            ));
        }

        let mut tx = self.begin("set_order_status").await?;
        let outcome = apply_transition(tx.as_mut(), order_id, status, Utc::now()).await;
        let transition = finish(tx, outcome, "set_order_status").await?;

        match transition {
            Transition::Apply { from, to, effects } => {
                metrics::counter!("order_status_transitions_total", "status" => to.as_str())
                    .increment(1);
                tracing::info!(%order_id, %from, %to, effects = effects.len(), "order status changed");
            }
            Transition::Unchanged(current) => {
                tracing::debug!(%order_id, status = %current, "order already in requested status");
            }
        }

        self.store
            .get_order_view(order_id)
            .await
            .map_err(|e| store_failure("set_order_status", e))?
            .ok_or(DomainError::OrderNotFound(order_id))
    }

    /// Lists a user's orders, newest first, with items and payment attached.
    #[tracing::instrument(skip(self, principal), fields(actor = %principal.user_id))]
    pub async fn get_orders_for_user(
        &self,
        principal: &Principal,
        user_id: UserId,
    ) -> Result<Vec<OrderView>, DomainError> {
        if !principal.can_act_for(user_id) {
            return Err(DomainError::Forbidden(format!(
                "cannot read orders of user {user_id}"
            )));
        }

        self.store
            .orders_for_user(user_id)
            .await
            .map_err(|e| store_failure("get_orders_for_user", e))
    }

    /// Loads one order with its items and payment.
    #[tracing::instrument(skip(self, principal), fields(actor = %principal.user_id))]
    pub async fn get_order_details(
        &self,
        principal: &Principal,
        order_id: OrderId,
    ) -> Result<OrderView, DomainError> {
        let view = self
            .store
            .get_order_view(order_id)
            .await
            .map_err(|e| store_failure("get_order_details", e))?
            .ok_or(DomainError::OrderNotFound(order_id))?;

        if !principal.can_act_for(view.order.user_id) {
            return Err(DomainError::Forbidden(format!(
                "cannot read order {order_id}"
            )));
        }
        Ok(view)
    }

    /// Lists every order, newest first, with owner names. Admin only.
    #[tracing::instrument(skip(self, principal), fields(actor = %principal.user_id))]
    pub async fn list_all_orders(&self, principal: &Principal) -> Result<Vec<OrderView>, DomainError> {
        if !principal.is_admin() {
            return Err(DomainError::Forbidden(
                "only administrators can list all orders".to_string(),
            ));
        }

        self.store
            .query_orders(OrderQuery::new())
            .await
            .map_err(|e| store_failure("list_all_orders", e))
    }

    async fn begin(&self, operation: &'static str) -> Result<Box<dyn StoreTransaction>, DomainError> {
        self.store
            .begin()
            .await
            .map_err(|e| store_failure(operation, e))
    }
}

async fn insert_order_rows(
    tx: &mut dyn StoreTransaction,
    order: &NewOrder,
    items: &[NewLineItem],
    payment: &NewPayment,
) -> Result<OrderId, DomainError> {
    let order_id = tx.insert_order(order).await?;
    for item in items {
        tx.insert_line_item(order_id, item).await?;
    }
    tx.insert_payment(order_id, payment).await?;
    Ok(order_id)
}

async fn apply_transition(
    tx: &mut dyn StoreTransaction,
    order_id: OrderId,
    target: OrderStatus,
    at: DateTime<Utc>,
) -> Result<Transition, DomainError> {
    let order = tx
        .lock_order(order_id)
        .await?
        .ok_or(DomainError::OrderNotFound(order_id))?;

    let transition = plan_transition(order.status, target)?;

    if let Transition::Apply { to, effects, .. } = transition {
        tx.update_order_status(order_id, to).await?;
        for effect in effects {
            match effect {
                SideEffect::CompletePayment => tx.complete_payment(order_id, at).await?,
            }
        }
    }

    Ok(transition)
}

/// Commits on success, rolls back on failure. Either way the transaction is
/// consumed, which releases its connection.
async fn finish<T>(
    tx: Box<dyn StoreTransaction>,
    outcome: Result<T, DomainError>,
    operation: &'static str,
) -> Result<T, DomainError> {
    match outcome {
        Ok(value) => {
            tx.commit().await.map_err(|e| store_failure(operation, e))?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = tx.rollback().await {
                tracing::warn!(operation, error = %rollback_err, "rollback failed");
            }
            if let DomainError::Store(ref e) = err {
                tracing::error!(operation, error = %e, "transaction rolled back after store failure");
            }
            Err(err)
        }
    }
}

fn store_failure(operation: &'static str, e: StoreError) -> DomainError {
    tracing::error!(operation, error = %e, "order store failure");
    DomainError::Store(e)
}
