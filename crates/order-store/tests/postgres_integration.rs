//! PostgreSQL integration tests
//!
//! These tests use a shared PostgreSQL container for efficiency.
//! Run with:
//!
//! ```bash
//! cargo test -p order-store --test postgres_integration -- --test-threads=1
//! ```

use std::sync::Arc;

use chrono::Utc;
use order_store::{
    Money, NewLineItem, NewOrder, NewPayment, OrderId, OrderStatus, OrderStore, OrderStoreExt,
    PaymentMethod, PaymentStatus, PostgresOrderStore, ProductId, StoreError, UserId,
};
use serial_test::serial;
use sqlx::PgPool;
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

/// Shared container info - container stays alive for all tests
struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

/// Global shared container
static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();

            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();

            let connection_string =
                format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

            let temp_pool = PgPool::connect(&connection_string).await.unwrap();

            sqlx::raw_sql(include_str!(
                "../../../migrations/001_create_store_tables.sql"
            ))
            .execute(&temp_pool)
            .await
            .unwrap();

            temp_pool.close().await;

            Arc::new(ContainerInfo {
                container,
                connection_string,
            })
        })
        .await
        .clone()
}

/// Get a fresh store with its own pool, cleared tables and a seeded catalog
async fn get_test_store() -> PostgresOrderStore {
    let info = get_container_info().await;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&info.connection_string)
        .await
        .unwrap();

    sqlx::query("TRUNCATE TABLE payments, order_details, orders, products, users RESTART IDENTITY")
        .execute(&pool)
        .await
        .unwrap();

    sqlx::raw_sql(
        r#"
        INSERT INTO users (user_id, username, role) VALUES (1, 'admin', 'admin'), (7, 'lan', 'client');
        INSERT INTO products (product_id, name, price, stock_quantity, category, url) VALUES
            (1, 'Linen shirt', 100, 10, 'shirt', '/img/shirt.jpg'),
            (2, 'Canvas tote', 50, 5, 'accessory', NULL);
        "#,
    )
    .execute(&pool)
    .await
    .unwrap();

    PostgresOrderStore::new(pool)
}

fn new_order(total: i64) -> NewOrder {
    NewOrder {
        user_id: UserId::new(7),
        total_amount: Money::from_units(total),
        shipping_address: "12 Hang Bac, Hanoi".to_string(),
        status: OrderStatus::Pending,
        order_date: Utc::now(),
    }
}

fn item(product_id: i64, quantity: u32, price: i64) -> NewLineItem {
    NewLineItem {
        product_id: ProductId::new(product_id),
        quantity,
        price: Money::from_units(price),
    }
}

fn cash_payment(amount: i64) -> NewPayment {
    NewPayment {
        amount: Money::from_units(amount),
        payment_method: PaymentMethod::Cash,
        payment_status: PaymentStatus::Pending,
        transaction_id: None,
        payment_date: None,
    }
}

async fn count(store: &PostgresOrderStore, table: &str) -> i64 {
    sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table}"))
        .fetch_one(store.pool())
        .await
        .unwrap()
}

#[tokio::test]
#[serial]
async fn committed_order_is_projected_with_items_and_payment() {
    let store = get_test_store().await;

    let mut tx = store.begin().await.unwrap();
    let order_id = tx.insert_order(&new_order(250)).await.unwrap();
    tx.insert_line_item(order_id, &item(1, 2, 100)).await.unwrap();
    tx.insert_line_item(order_id, &item(2, 1, 50)).await.unwrap();
    tx.insert_payment(order_id, &cash_payment(250)).await.unwrap();
    tx.commit().await.unwrap();

    let view = store.get_order_view(order_id).await.unwrap().unwrap();
    assert_eq!(view.order.total_amount, Money::from_units(250));
    assert_eq!(view.order.status, OrderStatus::Pending);
    assert_eq!(view.username.as_deref(), Some("lan"));
    assert_eq!(view.items.len(), 2);
    assert_eq!(view.items[0].product_name, "Linen shirt");
    assert_eq!(view.items[0].product_url.as_deref(), Some("/img/shirt.jpg"));

    let payment = view.payment.unwrap();
    assert_eq!(payment.payment_status, PaymentStatus::Pending);
    assert!(payment.transaction_id.is_none());
    assert!(payment.payment_date.is_none());
}

#[tokio::test]
#[serial]
async fn foreign_key_violation_rolls_back_whole_order() {
    let store = get_test_store().await;

    let mut tx = store.begin().await.unwrap();
    let order_id = tx.insert_order(&new_order(100)).await.unwrap();
    tx.insert_line_item(order_id, &item(1, 1, 100)).await.unwrap();

    let result = tx.insert_line_item(order_id, &item(404, 1, 100)).await;
    assert!(matches!(result, Err(StoreError::ForeignKeyViolation { .. })));
    tx.rollback().await.unwrap();

    assert_eq!(count(&store, "orders").await, 0);
    assert_eq!(count(&store, "order_details").await, 0);
    assert_eq!(count(&store, "payments").await, 0);
}

#[tokio::test]
#[serial]
async fn dropped_transaction_is_rolled_back() {
    let store = get_test_store().await;

    {
        let mut tx = store.begin().await.unwrap();
        let order_id = tx.insert_order(&new_order(100)).await.unwrap();
        tx.insert_line_item(order_id, &item(1, 1, 100)).await.unwrap();
    }

    assert_eq!(count(&store, "orders").await, 0);
    assert_eq!(count(&store, "order_details").await, 0);
}

#[tokio::test]
#[serial]
async fn duplicate_payment_is_reported() {
    let store = get_test_store().await;

    let mut tx = store.begin().await.unwrap();
    let order_id = tx.insert_order(&new_order(100)).await.unwrap();
    tx.insert_payment(order_id, &cash_payment(100)).await.unwrap();
    let result = tx.insert_payment(order_id, &cash_payment(100)).await;
    assert!(matches!(result, Err(StoreError::DuplicatePayment(id)) if id == order_id));
}

#[tokio::test]
#[serial]
async fn status_update_and_payment_completion_commit_together() {
    let store = get_test_store().await;

    let mut tx = store.begin().await.unwrap();
    let order_id = tx.insert_order(&new_order(100)).await.unwrap();
    tx.insert_line_item(order_id, &item(1, 1, 100)).await.unwrap();
    tx.insert_payment(order_id, &cash_payment(100)).await.unwrap();
    tx.commit().await.unwrap();

    let mut tx = store.begin().await.unwrap();
    let locked = tx.lock_order(order_id).await.unwrap().unwrap();
    assert_eq!(locked.status, OrderStatus::Pending);
    tx.update_order_status(order_id, OrderStatus::Delivered)
        .await
        .unwrap();
    tx.complete_payment(order_id, Utc::now()).await.unwrap();
    tx.commit().await.unwrap();

    let view = store.get_order_view(order_id).await.unwrap().unwrap();
    assert_eq!(view.order.status, OrderStatus::Delivered);
    let payment = view.payment.unwrap();
    assert_eq!(payment.payment_status, PaymentStatus::Completed);
    assert!(payment.payment_date.is_some());
}

#[tokio::test]
#[serial]
async fn missing_order_and_payment_are_reported() {
    let store = get_test_store().await;
    let missing = OrderId::new(9999);

    let mut tx = store.begin().await.unwrap();
    assert!(tx.lock_order(missing).await.unwrap().is_none());
    assert!(matches!(
        tx.update_order_status(missing, OrderStatus::Shipped).await,
        Err(StoreError::OrderNotFound(_))
    ));
    tx.rollback().await.unwrap();

    let mut tx = store.begin().await.unwrap();
    let order_id = tx.insert_order(&new_order(100)).await.unwrap();
    assert!(matches!(
        tx.complete_payment(order_id, Utc::now()).await,
        Err(StoreError::PaymentNotFound(_))
    ));
}

#[tokio::test]
#[serial]
async fn orders_for_user_are_newest_first() {
    let store = get_test_store().await;
    let earlier = Utc::now() - chrono::Duration::minutes(5);

    let mut tx = store.begin().await.unwrap();
    let old_id = tx
        .insert_order(&NewOrder {
            order_date: earlier,
            ..new_order(100)
        })
        .await
        .unwrap();
    let new_id = tx.insert_order(&new_order(50)).await.unwrap();
    tx.commit().await.unwrap();

    let orders = store.orders_for_user(UserId::new(7)).await.unwrap();
    let ids: Vec<OrderId> = orders.iter().map(|v| v.order.order_id).collect();
    assert_eq!(ids, vec![new_id, old_id]);

    let none = store.orders_for_user(UserId::new(1)).await.unwrap();
    assert!(none.is_empty());
}
