use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Row, Transaction, postgres::PgRow};

use crate::{
    LineItemRecord, Money, NewLineItem, NewOrder, NewPayment, OrderId, OrderQuery, OrderRecord,
    OrderStatus, OrderView, PaymentRecord, ProductId, Result, StoreError, UserId,
    store::{OrderStore, StoreTransaction},
};

/// PostgreSQL-backed order store implementation.
#[derive(Clone)]
pub struct PostgresOrderStore {
    pool: PgPool,
}

impl PostgresOrderStore {
    /// Creates a new PostgreSQL order store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await
    }

    fn row_to_order(row: &PgRow) -> Result<OrderRecord> {
        Ok(OrderRecord {
            order_id: OrderId::new(row.try_get("order_id")?),
            user_id: UserId::new(row.try_get("user_id")?),
            total_amount: Money::new(row.try_get("total_amount")?),
            shipping_address: row.try_get("shipping_address")?,
            status: row.try_get::<&str, _>("status")?.parse()?,
            order_date: row.try_get("order_date")?,
        })
    }

    fn row_to_payment(row: &PgRow, order_id: OrderId) -> Result<Option<PaymentRecord>> {
        let Some(payment_id) = row.try_get::<Option<i64>, _>("payment_id")? else {
            return Ok(None);
        };

        Ok(Some(PaymentRecord {
            payment_id,
            order_id,
            amount: Money::new(row.try_get("amount")?),
            payment_method: row.try_get::<&str, _>("payment_method")?.parse()?,
            payment_status: row.try_get::<&str, _>("payment_status")?.parse()?,
            transaction_id: row.try_get("transaction_id")?,
            payment_date: row.try_get("payment_date")?,
        }))
    }

    fn row_to_line_item(row: &PgRow) -> Result<LineItemRecord> {
        let quantity: i32 = row.try_get("quantity")?;

        Ok(LineItemRecord {
            order_detail_id: row.try_get("order_detail_id")?,
            order_id: OrderId::new(row.try_get("order_id")?),
            product_id: ProductId::new(row.try_get("product_id")?),
            product_name: row.try_get("name")?,
            product_url: row.try_get("url")?,
            quantity: u32::try_from(quantity)
                .map_err(|_| StoreError::OutOfRange { field: "quantity" })?,
            price: Money::new(row.try_get("price")?),
        })
    }
}

/// Translates constraint violations into their store-level meaning.
fn map_write_error(table: &'static str, e: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(ref db_err) = e
        && db_err.is_foreign_key_violation()
    {
        return StoreError::ForeignKeyViolation {
            table: db_err.table().unwrap_or(table).to_string(),
            detail: db_err.message().to_string(),
        };
    }
    StoreError::Database(e)
}

#[async_trait]
impl OrderStore for PostgresOrderStore {
    async fn begin(&self) -> Result<Box<dyn StoreTransaction>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PostgresTransaction { tx }))
    }

    async fn query_orders(&self, query: OrderQuery) -> Result<Vec<OrderView>> {
        let rows = sqlx::query(
            r#"
            SELECT o.order_id, o.user_id, o.total_amount, o.shipping_address, o.status, o.order_date,
                   u.username,
                   p.payment_id, p.amount, p.payment_method, p.payment_status,
                   p.transaction_id, p.payment_date
            FROM orders o
            LEFT JOIN users u ON u.user_id = o.user_id
            LEFT JOIN payments p ON p.order_id = o.order_id
            WHERE ($1::BIGINT IS NULL OR o.user_id = $1)
              AND ($2::BIGINT IS NULL OR o.order_id = $2)
            ORDER BY o.order_date DESC, o.order_id DESC
            "#,
        )
        .bind(query.user_id.map(|id| id.as_i64()))
        .bind(query.order_id.map(|id| id.as_i64()))
        .fetch_all(&self.pool)
        .await?;

        let mut views = Vec::with_capacity(rows.len());
        for row in &rows {
            let order = Self::row_to_order(row)?;
            let payment = Self::row_to_payment(row, order.order_id)?;
            views.push(OrderView {
                username: row.try_get("username")?,
                order,
                items: Vec::new(),
                payment,
            });
        }

        if views.is_empty() {
            return Ok(views);
        }

        let order_ids: Vec<i64> = views.iter().map(|v| v.order.order_id.as_i64()).collect();
        let item_rows = sqlx::query(
            r#"
            SELECT d.order_detail_id, d.order_id, d.product_id, d.quantity, d.price,
                   pr.name, pr.url
            FROM order_details d
            JOIN products pr ON pr.product_id = d.product_id
            WHERE d.order_id = ANY($1)
            ORDER BY d.order_detail_id ASC
            "#,
        )
        .bind(&order_ids)
        .fetch_all(&self.pool)
        .await?;

        let mut items: HashMap<OrderId, Vec<LineItemRecord>> = HashMap::new();
        for row in &item_rows {
            let item = Self::row_to_line_item(row)?;
            items.entry(item.order_id).or_default().push(item);
        }
        for view in &mut views {
            view.items = items.remove(&view.order.order_id).unwrap_or_default();
        }

        Ok(views)
    }
}

/// Transaction over a pooled PostgreSQL connection.
///
/// The connection returns to the pool on commit, rollback or drop; sqlx rolls
/// back a transaction that is dropped while still open.
pub struct PostgresTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl StoreTransaction for PostgresTransaction {
    async fn insert_order(&mut self, order: &NewOrder) -> Result<OrderId> {
        let order_id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO orders (user_id, total_amount, shipping_address, status, order_date)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING order_id
            "#,
        )
        .bind(order.user_id.as_i64())
        .bind(order.total_amount.amount())
        .bind(&order.shipping_address)
        .bind(order.status.as_str())
        .bind(order.order_date)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| map_write_error("orders", e))?;

        Ok(OrderId::new(order_id))
    }

    async fn insert_line_item(&mut self, order_id: OrderId, item: &NewLineItem) -> Result<()> {
        let quantity =
            i32::try_from(item.quantity).map_err(|_| StoreError::OutOfRange { field: "quantity" })?;

        sqlx::query(
            r#"
            INSERT INTO order_details (order_id, product_id, quantity, price)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(order_id.as_i64())
        .bind(item.product_id.as_i64())
        .bind(quantity)
        .bind(item.price.amount())
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_write_error("order_details", e))?;

        Ok(())
    }

    async fn insert_payment(&mut self, order_id: OrderId, payment: &NewPayment) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO payments (order_id, amount, payment_method, payment_status, transaction_id, payment_date)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(order_id.as_i64())
        .bind(payment.amount.amount())
        .bind(payment.payment_method.as_str())
        .bind(payment.payment_status.as_str())
        .bind(payment.transaction_id.as_deref())
        .bind(payment.payment_date)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.constraint() == Some("payments_order_id_key")
            {
                return StoreError::DuplicatePayment(order_id);
            }
            map_write_error("payments", e)
        })?;

        Ok(())
    }

    async fn lock_order(&mut self, order_id: OrderId) -> Result<Option<OrderRecord>> {
        let row: Option<PgRow> = sqlx::query(
            r#"
            SELECT order_id, user_id, total_amount, shipping_address, status, order_date
            FROM orders
            WHERE order_id = $1
            FOR UPDATE
            "#,
        )
        .bind(order_id.as_i64())
        .fetch_optional(&mut *self.tx)
        .await?;

        row.as_ref().map(PostgresOrderStore::row_to_order).transpose()
    }

    async fn update_order_status(
        &mut self,
        order_id: OrderId,
        status: OrderStatus,
    ) -> Result<()> {
        let result = sqlx::query("UPDATE orders SET status = $2 WHERE order_id = $1")
            .bind(order_id.as_i64())
            .bind(status.as_str())
            .execute(&mut *self.tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::OrderNotFound(order_id));
        }
        Ok(())
    }

    async fn complete_payment(&mut self, order_id: OrderId, paid_at: DateTime<Utc>) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE payments
            SET payment_status = 'completed', payment_date = $2
            WHERE order_id = $1
            "#,
        )
        .bind(order_id.as_i64())
        .bind(paid_at)
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::PaymentNotFound(order_id));
        }
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}
