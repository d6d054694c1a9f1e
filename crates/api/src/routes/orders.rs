//! Order placement, lookup and status endpoints.

use std::sync::Arc;

use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use chrono::{DateTime, Utc};
use common::{
    Money, OrderId, OrderStatus, PaymentMethod, PaymentStatus, Principal, ProductId, UserId,
};
use domain::{DomainError, LineItemDraft, OrderDraft, OrderWorkflow, PaymentDraft};
use order_store::{LineItemRecord, OrderStore, OrderView, PaymentRecord};
use serde::{Deserialize, Serialize};

use crate::auth::PrincipalProvider;
use crate::error::ApiError;

/// Shared application state accessible from all handlers.
pub struct AppState<S: OrderStore> {
    pub workflow: OrderWorkflow<S>,
    pub principals: Arc<dyn PrincipalProvider>,
}

// -- Request types --

/// Body of `POST /orders`. Unknown fields are ignored; a payment status sent
/// by the client never reaches the workflow.
#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    pub user_id: Option<UserId>,
    pub total_amount: Option<Money>,
    pub shipping_address: Option<String>,
    #[serde(alias = "line_items")]
    pub order_details: Option<Vec<LineItemRequest>>,
    pub payment: Option<PaymentRequest>,
}

#[derive(Debug, Deserialize)]
pub struct LineItemRequest {
    pub product_id: ProductId,
    pub quantity: i64,
    pub price: Money,
}

#[derive(Debug, Deserialize)]
pub struct PaymentRequest {
    pub amount: Option<Money>,
    pub payment_method: PaymentMethod,
    pub transaction_id: Option<String>,
}

impl From<CreateOrderRequest> for OrderDraft {
    fn from(req: CreateOrderRequest) -> Self {
        OrderDraft {
            user_id: req.user_id,
            total_amount: req.total_amount,
            shipping_address: req.shipping_address,
            line_items: req.order_details.map(|items| {
                items
                    .into_iter()
                    .map(|i| LineItemDraft::new(i.product_id, i.quantity, i.price))
                    .collect()
            }),
            payment: req.payment.map(|p| PaymentDraft {
                amount: p.amount,
                payment_method: p.payment_method,
                transaction_id: p.transaction_id,
            }),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
}

// -- Response types --

#[derive(Debug, Serialize)]
pub struct OrderCreatedResponse {
    pub success: bool,
    pub order_id: OrderId,
}

#[derive(Debug, Serialize)]
pub struct OrderResponse {
    pub order_id: OrderId,
    pub user_id: UserId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    pub total_amount: Money,
    pub shipping_address: String,
    pub status: OrderStatus,
    pub order_date: DateTime<Utc>,
    pub items: Vec<LineItemResponse>,
    pub payment: Option<PaymentResponse>,
}

#[derive(Debug, Serialize)]
pub struct LineItemResponse {
    pub order_detail_id: i64,
    pub product_id: ProductId,
    pub name: String,
    pub url: Option<String>,
    pub quantity: u32,
    pub price: Money,
}

#[derive(Debug, Serialize)]
pub struct PaymentResponse {
    pub payment_id: i64,
    pub amount: Money,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub transaction_id: Option<String>,
    pub payment_date: Option<DateTime<Utc>>,
}

impl From<LineItemRecord> for LineItemResponse {
    fn from(item: LineItemRecord) -> Self {
        Self {
            order_detail_id: item.order_detail_id,
            product_id: item.product_id,
            name: item.product_name,
            url: item.product_url,
            quantity: item.quantity,
            price: item.price,
        }
    }
}

impl From<PaymentRecord> for PaymentResponse {
    fn from(payment: PaymentRecord) -> Self {
        Self {
            payment_id: payment.payment_id,
            amount: payment.amount,
            payment_method: payment.payment_method,
            payment_status: payment.payment_status,
            transaction_id: payment.transaction_id,
            payment_date: payment.payment_date,
        }
    }
}

impl From<OrderView> for OrderResponse {
    fn from(view: OrderView) -> Self {
        Self {
            order_id: view.order.order_id,
            user_id: view.order.user_id,
            username: view.username,
            total_amount: view.order.total_amount,
            shipping_address: view.order.shipping_address,
            status: view.order.status,
            order_date: view.order.order_date,
            items: view.items.into_iter().map(Into::into).collect(),
            payment: view.payment.map(Into::into),
        }
    }
}

fn to_responses(views: Vec<OrderView>) -> Vec<OrderResponse> {
    views.into_iter().map(OrderResponse::from).collect()
}

// -- Handlers --

/// POST /orders: place an order with its line items and payment.
#[tracing::instrument(skip(state, payload))]
pub async fn create<S: OrderStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Extension(principal): Extension<Principal>,
    payload: Result<Json<CreateOrderRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<OrderCreatedResponse>), ApiError> {
    let Json(req) = payload?;

    let order_id = state
        .workflow
        .create_order(&principal, OrderDraft::from(req))
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(OrderCreatedResponse {
            success: true,
            order_id,
        }),
    ))
}

/// GET /orders/user/{user_id}: list a user's orders, newest first.
#[tracing::instrument(skip(state))]
pub async fn list_for_user<S: OrderStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Extension(principal): Extension<Principal>,
    user_id: Result<Path<UserId>, PathRejection>,
) -> Result<Json<Vec<OrderResponse>>, ApiError> {
    let Path(user_id) = user_id?;

    let views = state
        .workflow
        .get_orders_for_user(&principal, user_id)
        .await?;

    Ok(Json(to_responses(views)))
}

/// GET /orders/{id}/details: one order with items and payment.
#[tracing::instrument(skip(state))]
pub async fn details<S: OrderStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Extension(principal): Extension<Principal>,
    order_id: Result<Path<OrderId>, PathRejection>,
) -> Result<Json<OrderResponse>, ApiError> {
    let Path(order_id) = order_id?;

    let view = state
        .workflow
        .get_order_details(&principal, order_id)
        .await?;

    Ok(Json(view.into()))
}

/// GET /admin/orders: every order with its owner's username.
#[tracing::instrument(skip(state))]
pub async fn list_all<S: OrderStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Extension(principal): Extension<Principal>,
) -> Result<Json<Vec<OrderResponse>>, ApiError> {
    let views = state.workflow.list_all_orders(&principal).await?;
    Ok(Json(to_responses(views)))
}

/// PUT /admin/orders/{id}/status: move an order through its lifecycle.
///
/// Non-admins are refused before the status literal is looked at.
#[tracing::instrument(skip(state, payload))]
pub async fn update_status<S: OrderStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Extension(principal): Extension<Principal>,
    order_id: Result<Path<OrderId>, PathRejection>,
    payload: Result<Json<UpdateStatusRequest>, JsonRejection>,
) -> Result<Json<OrderResponse>, ApiError> {
    if !principal.is_admin() {
        return Err(ApiError::Domain(DomainError::Forbidden(
            "only administrators can change order status".to_string(),
        )));
    }

    let Path(order_id) = order_id?;
    let Json(req) = payload?;
    let status: OrderStatus = req.status.trim().parse()?;

    let view = state
        .workflow
        .set_order_status(&principal, order_id, status)
        .await?;

    Ok(Json(view.into()))
}
