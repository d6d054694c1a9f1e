use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

use crate::{
    LineItemRecord, Money, NewLineItem, NewOrder, NewPayment, OrderId, OrderQuery, OrderRecord,
    OrderStatus, OrderView, PaymentRecord, PaymentStatus, ProductId, ProductRecord, Result,
    StoreError, UserId, UserRecord,
    store::{OrderStore, StoreTransaction},
};

#[derive(Debug, Clone)]
struct StoredLineItem {
    order_detail_id: i64,
    order_id: OrderId,
    product_id: ProductId,
    quantity: u32,
    price: Money,
}

/// Failures to inject into transactions opened after the plan is set.
#[derive(Debug, Clone, Copy, Default)]
struct FaultPlan {
    fail_on_begin: bool,
    /// Zero-based index of the line-item insert to fail within a transaction.
    fail_on_line_item: Option<usize>,
    fail_on_payment: bool,
    fail_on_payment_completion: bool,
    fail_on_commit: bool,
}

#[derive(Debug, Default)]
struct Tables {
    users: BTreeMap<UserId, UserRecord>,
    products: BTreeMap<ProductId, ProductRecord>,
    orders: BTreeMap<OrderId, OrderRecord>,
    line_items: Vec<StoredLineItem>,
    payments: BTreeMap<OrderId, PaymentRecord>,
    faults: FaultPlan,
}

#[derive(Debug, Default)]
struct Sequences {
    order: AtomicI64,
    order_detail: AtomicI64,
    payment: AtomicI64,
}

fn next_value(sequence: &AtomicI64) -> i64 {
    sequence.fetch_add(1, Ordering::SeqCst) + 1
}

/// In-memory order store implementation for testing.
///
/// Transactions stage their writes privately and apply them to the shared
/// tables in one step at commit, so readers never observe a partial order.
/// Foreign keys to users and products are enforced like the SQL schema does,
/// and individual writes can be made to fail to exercise rollback paths.
///
/// [`StoreTransaction::lock_order`] takes a per-order lock that is held until
/// the transaction commits, rolls back or is dropped, so concurrent status
/// changes to one order run one after the other.
#[derive(Clone, Default)]
pub struct InMemoryOrderStore {
    tables: Arc<RwLock<Tables>>,
    sequences: Arc<Sequences>,
    open_transactions: Arc<AtomicUsize>,
    row_locks: Arc<RowLocks>,
}

type RowLocks = Mutex<HashMap<OrderId, Arc<Mutex<()>>>>;

impl InMemoryOrderStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a user.
    pub async fn insert_user(&self, user: UserRecord) {
        self.tables.write().await.users.insert(user.user_id, user);
    }

    /// Adds or replaces a catalog product.
    pub async fn insert_product(&self, product: ProductRecord) {
        self.tables
            .write()
            .await
            .products
            .insert(product.product_id, product);
    }

    /// Returns the number of committed orders.
    pub async fn order_count(&self) -> usize {
        self.tables.read().await.orders.len()
    }

    /// Returns the number of committed line items.
    pub async fn line_item_count(&self) -> usize {
        self.tables.read().await.line_items.len()
    }

    /// Returns the number of committed payments.
    pub async fn payment_count(&self) -> usize {
        self.tables.read().await.payments.len()
    }

    /// Returns the number of transactions that have not yet been released.
    pub fn open_transactions(&self) -> usize {
        self.open_transactions.load(Ordering::SeqCst)
    }

    /// Makes the `index`-th line-item insert of each new transaction fail.
    pub async fn set_fail_on_line_item(&self, index: Option<usize>) {
        self.tables.write().await.faults.fail_on_line_item = index;
    }

    /// Makes opening a transaction fail.
    pub async fn set_fail_on_begin(&self, fail: bool) {
        self.tables.write().await.faults.fail_on_begin = fail;
    }

    /// Makes payment inserts fail.
    pub async fn set_fail_on_payment(&self, fail: bool) {
        self.tables.write().await.faults.fail_on_payment = fail;
    }

    /// Makes payment completion fail.
    pub async fn set_fail_on_payment_completion(&self, fail: bool) {
        self.tables.write().await.faults.fail_on_payment_completion = fail;
    }

    /// Makes commits fail.
    pub async fn set_fail_on_commit(&self, fail: bool) {
        self.tables.write().await.faults.fail_on_commit = fail;
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn begin(&self) -> Result<Box<dyn StoreTransaction>> {
        let faults = self.tables.read().await.faults;
        if faults.fail_on_begin {
            return Err(StoreError::Unavailable(
                "injected failure on begin".to_string(),
            ));
        }
        self.open_transactions.fetch_add(1, Ordering::SeqCst);

        Ok(Box::new(InMemoryTransaction {
            tables: Arc::clone(&self.tables),
            sequences: Arc::clone(&self.sequences),
            faults,
            staged: Staged::default(),
            line_item_inserts: 0,
            row_locks: Arc::clone(&self.row_locks),
            held: HashMap::new(),
            _open: OpenGuard(Arc::clone(&self.open_transactions)),
        }))
    }

    async fn query_orders(&self, query: OrderQuery) -> Result<Vec<OrderView>> {
        let tables = self.tables.read().await;

        let mut orders: Vec<&OrderRecord> = tables
            .orders
            .values()
            .filter(|o| query.matches(o.order_id, o.user_id))
            .collect();
        orders.sort_by(|a, b| {
            b.order_date
                .cmp(&a.order_date)
                .then(b.order_id.cmp(&a.order_id))
        });

        let mut items: HashMap<OrderId, Vec<LineItemRecord>> = HashMap::new();
        for item in &tables.line_items {
            // Inner join: items whose product is gone are not projected.
            let Some(product) = tables.products.get(&item.product_id) else {
                continue;
            };
            items
                .entry(item.order_id)
                .or_default()
                .push(LineItemRecord {
                    order_detail_id: item.order_detail_id,
                    order_id: item.order_id,
                    product_id: item.product_id,
                    product_name: product.name.clone(),
                    product_url: product.url.clone(),
                    quantity: item.quantity,
                    price: item.price,
                });
        }

        Ok(orders
            .into_iter()
            .map(|order| OrderView {
                order: order.clone(),
                username: tables.users.get(&order.user_id).map(|u| u.username.clone()),
                items: items.remove(&order.order_id).unwrap_or_default(),
                payment: tables.payments.get(&order.order_id).cloned(),
            })
            .collect())
    }
}

/// Decrements the store's open-transaction count when the transaction goes away.
struct OpenGuard(Arc<AtomicUsize>);

impl Drop for OpenGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[derive(Debug, Default)]
struct Staged {
    orders: BTreeMap<OrderId, OrderRecord>,
    line_items: Vec<StoredLineItem>,
    payments: BTreeMap<OrderId, PaymentRecord>,
    status_updates: BTreeMap<OrderId, OrderStatus>,
    payment_completions: BTreeMap<OrderId, DateTime<Utc>>,
}

/// Transaction over an [`InMemoryOrderStore`].
pub struct InMemoryTransaction {
    tables: Arc<RwLock<Tables>>,
    sequences: Arc<Sequences>,
    faults: FaultPlan,
    staged: Staged,
    line_item_inserts: usize,
    row_locks: Arc<RowLocks>,
    held: HashMap<OrderId, OwnedMutexGuard<()>>,
    _open: OpenGuard,
}

impl InMemoryTransaction {
    fn order_exists(&self, tables: &Tables, order_id: OrderId) -> bool {
        self.staged.orders.contains_key(&order_id) || tables.orders.contains_key(&order_id)
    }

    /// Waits for the order's row lock unless this transaction already holds it.
    async fn acquire_row_lock(&mut self, order_id: OrderId) {
        if self.held.contains_key(&order_id) {
            return;
        }
        let row = {
            let mut locks = self.row_locks.lock().await;
            Arc::clone(locks.entry(order_id).or_default())
        };
        let guard = row.lock_owned().await;
        self.held.insert(order_id, guard);
    }
}

#[async_trait]
impl StoreTransaction for InMemoryTransaction {
    async fn insert_order(&mut self, order: &NewOrder) -> Result<OrderId> {
        {
            let tables = self.tables.read().await;
            if !tables.users.contains_key(&order.user_id) {
                return Err(StoreError::ForeignKeyViolation {
                    table: "orders".to_string(),
                    detail: format!("user_id {} is not present in users", order.user_id),
                });
            }
        }

        let order_id = OrderId::new(next_value(&self.sequences.order));
        self.staged.orders.insert(
            order_id,
            OrderRecord {
                order_id,
                user_id: order.user_id,
                total_amount: order.total_amount,
                shipping_address: order.shipping_address.clone(),
                status: order.status,
                order_date: order.order_date,
            },
        );
        Ok(order_id)
    }

    async fn insert_line_item(&mut self, order_id: OrderId, item: &NewLineItem) -> Result<()> {
        let index = self.line_item_inserts;
        self.line_item_inserts += 1;

        if self.faults.fail_on_line_item == Some(index) {
            return Err(StoreError::Unavailable(format!(
                "injected failure on line item insert {index}"
            )));
        }
        if item.quantity == 0 {
            return Err(StoreError::OutOfRange { field: "quantity" });
        }

        {
            let tables = self.tables.read().await;
            if !self.order_exists(&tables, order_id) {
                return Err(StoreError::ForeignKeyViolation {
                    table: "order_details".to_string(),
                    detail: format!("order_id {order_id} is not present in orders"),
                });
            }
            if !tables.products.contains_key(&item.product_id) {
                return Err(StoreError::ForeignKeyViolation {
                    table: "order_details".to_string(),
                    detail: format!("product_id {} is not present in products", item.product_id),
                });
            }
        }

        self.staged.line_items.push(StoredLineItem {
            order_detail_id: next_value(&self.sequences.order_detail),
            order_id,
            product_id: item.product_id,
            quantity: item.quantity,
            price: item.price,
        });
        Ok(())
    }

    async fn insert_payment(&mut self, order_id: OrderId, payment: &NewPayment) -> Result<()> {
        if self.faults.fail_on_payment {
            return Err(StoreError::Unavailable(
                "injected failure on payment insert".to_string(),
            ));
        }

        {
            let tables = self.tables.read().await;
            if !self.order_exists(&tables, order_id) {
                return Err(StoreError::ForeignKeyViolation {
                    table: "payments".to_string(),
                    detail: format!("order_id {order_id} is not present in orders"),
                });
            }
            if self.staged.payments.contains_key(&order_id)
                || tables.payments.contains_key(&order_id)
            {
                return Err(StoreError::DuplicatePayment(order_id));
            }
        }

        self.staged.payments.insert(
            order_id,
            PaymentRecord {
                payment_id: next_value(&self.sequences.payment),
                order_id,
                amount: payment.amount,
                payment_method: payment.payment_method,
                payment_status: payment.payment_status,
                transaction_id: payment.transaction_id.clone(),
                payment_date: payment.payment_date,
            },
        );
        Ok(())
    }

    async fn lock_order(&mut self, order_id: OrderId) -> Result<Option<OrderRecord>> {
        let mut order = match self.staged.orders.get(&order_id) {
            Some(order) => Some(order.clone()),
            None => {
                // Read only after the lock is ours so the status is the latest committed one.
                self.acquire_row_lock(order_id).await;
                let committed = self.tables.read().await.orders.get(&order_id).cloned();
                if committed.is_none() {
                    self.held.remove(&order_id);
                }
                committed
            }
        };
        if let Some(ref mut order) = order
            && let Some(status) = self.staged.status_updates.get(&order_id)
        {
            order.status = *status;
        }
        Ok(order)
    }

    async fn update_order_status(
        &mut self,
        order_id: OrderId,
        status: OrderStatus,
    ) -> Result<()> {
        if let Some(order) = self.staged.orders.get_mut(&order_id) {
            order.status = status;
            return Ok(());
        }
        if !self.tables.read().await.orders.contains_key(&order_id) {
            return Err(StoreError::OrderNotFound(order_id));
        }
        self.staged.status_updates.insert(order_id, status);
        Ok(())
    }

    async fn complete_payment(&mut self, order_id: OrderId, paid_at: DateTime<Utc>) -> Result<()> {
        if self.faults.fail_on_payment_completion {
            return Err(StoreError::Unavailable(
                "injected failure on payment completion".to_string(),
            ));
        }
        if let Some(payment) = self.staged.payments.get_mut(&order_id) {
            payment.payment_status = PaymentStatus::Completed;
            payment.payment_date = Some(paid_at);
            return Ok(());
        }
        if !self.tables.read().await.payments.contains_key(&order_id) {
            return Err(StoreError::PaymentNotFound(order_id));
        }
        self.staged.payment_completions.insert(order_id, paid_at);
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        if self.faults.fail_on_commit {
            return Err(StoreError::Unavailable("injected commit failure".to_string()));
        }

        let this = *self;
        let staged = this.staged;
        // Row locks in `this.held` are released after the tables guard below.
        let mut tables = this.tables.write().await;

        tables.orders.extend(staged.orders);
        tables.line_items.extend(staged.line_items);
        tables.payments.extend(staged.payments);
        for (order_id, status) in staged.status_updates {
            if let Some(order) = tables.orders.get_mut(&order_id) {
                order.status = status;
            }
        }
        for (order_id, paid_at) in staged.payment_completions {
            if let Some(payment) = tables.payments.get_mut(&order_id) {
                payment.payment_status = PaymentStatus::Completed;
                payment.payment_date = Some(paid_at);
            }
        }
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{OrderStoreExt, PaymentMethod};
    use common::Role;

    async fn seeded_store() -> InMemoryOrderStore {
        let store = InMemoryOrderStore::new();
        store
            .insert_user(UserRecord {
                user_id: UserId::new(7),
                username: "lan".to_string(),
                email: None,
                role: Role::Client,
            })
            .await;
        store
            .insert_product(ProductRecord {
                product_id: ProductId::new(1),
                name: "Linen shirt".to_string(),
                price: Money::from_units(100),
                stock_quantity: 10,
                category: "shirt".to_string(),
                url: Some("/img/shirt.jpg".to_string()),
            })
            .await;
        store
    }

    fn new_order() -> NewOrder {
        NewOrder {
            user_id: UserId::new(7),
            total_amount: Money::from_units(200),
            shipping_address: "12 Hang Bac, Hanoi".to_string(),
            status: OrderStatus::Pending,
            order_date: Utc::now(),
        }
    }

    fn new_item() -> NewLineItem {
        NewLineItem {
            product_id: ProductId::new(1),
            quantity: 2,
            price: Money::from_units(100),
        }
    }

    fn cash_payment() -> NewPayment {
        NewPayment {
            amount: Money::from_units(200),
            payment_method: PaymentMethod::Cash,
            payment_status: PaymentStatus::Pending,
            transaction_id: None,
            payment_date: None,
        }
    }

    #[tokio::test]
    async fn uncommitted_writes_are_invisible() {
        let store = seeded_store().await;
        let mut tx = store.begin().await.unwrap();
        let order_id = tx.insert_order(&new_order()).await.unwrap();
        tx.insert_line_item(order_id, &new_item()).await.unwrap();

        assert_eq!(store.order_count().await, 0);
        assert!(store.get_order_view(order_id).await.unwrap().is_none());

        tx.insert_payment(order_id, &cash_payment()).await.unwrap();
        tx.commit().await.unwrap();

        let view = store.get_order_view(order_id).await.unwrap().unwrap();
        assert_eq!(view.items.len(), 1);
        assert_eq!(view.items[0].product_name, "Linen shirt");
        assert_eq!(view.username.as_deref(), Some("lan"));
        assert!(view.payment.is_some());
    }

    #[tokio::test]
    async fn rollback_discards_everything() {
        let store = seeded_store().await;
        let mut tx = store.begin().await.unwrap();
        let order_id = tx.insert_order(&new_order()).await.unwrap();
        tx.insert_line_item(order_id, &new_item()).await.unwrap();
        tx.rollback().await.unwrap();

        assert_eq!(store.order_count().await, 0);
        assert_eq!(store.line_item_count().await, 0);
        assert_eq!(store.open_transactions(), 0);
    }

    #[tokio::test]
    async fn dropped_transaction_is_released() {
        let store = seeded_store().await;
        {
            let mut tx = store.begin().await.unwrap();
            tx.insert_order(&new_order()).await.unwrap();
            assert_eq!(store.open_transactions(), 1);
        }
        assert_eq!(store.open_transactions(), 0);
        assert_eq!(store.order_count().await, 0);
    }

    #[tokio::test]
    async fn unknown_product_violates_foreign_key() {
        let store = seeded_store().await;
        let mut tx = store.begin().await.unwrap();
        let order_id = tx.insert_order(&new_order()).await.unwrap();

        let item = NewLineItem {
            product_id: ProductId::new(99),
            ..new_item()
        };
        let result = tx.insert_line_item(order_id, &item).await;
        assert!(matches!(
            result,
            Err(StoreError::ForeignKeyViolation { ref table, .. }) if table == "order_details"
        ));
    }

    #[tokio::test]
    async fn unknown_user_violates_foreign_key() {
        let store = seeded_store().await;
        let mut tx = store.begin().await.unwrap();
        let order = NewOrder {
            user_id: UserId::new(404),
            ..new_order()
        };
        assert!(matches!(
            tx.insert_order(&order).await,
            Err(StoreError::ForeignKeyViolation { .. })
        ));
    }

    #[tokio::test]
    async fn second_payment_is_rejected() {
        let store = seeded_store().await;
        let mut tx = store.begin().await.unwrap();
        let order_id = tx.insert_order(&new_order()).await.unwrap();
        tx.insert_payment(order_id, &cash_payment()).await.unwrap();

        let result = tx.insert_payment(order_id, &cash_payment()).await;
        assert!(matches!(result, Err(StoreError::DuplicatePayment(id)) if id == order_id));
    }

    #[tokio::test]
    async fn injected_line_item_failure_hits_requested_index() {
        let store = seeded_store().await;
        store.set_fail_on_line_item(Some(1)).await;

        let mut tx = store.begin().await.unwrap();
        let order_id = tx.insert_order(&new_order()).await.unwrap();
        assert!(tx.insert_line_item(order_id, &new_item()).await.is_ok());
        assert!(matches!(
            tx.insert_line_item(order_id, &new_item()).await,
            Err(StoreError::Unavailable(_))
        ));
    }

    #[tokio::test]
    async fn failed_commit_leaves_no_rows() {
        let store = seeded_store().await;
        store.set_fail_on_commit(true).await;

        let mut tx = store.begin().await.unwrap();
        let order_id = tx.insert_order(&new_order()).await.unwrap();
        tx.insert_line_item(order_id, &new_item()).await.unwrap();
        tx.insert_payment(order_id, &cash_payment()).await.unwrap();
        assert!(tx.commit().await.is_err());

        assert_eq!(store.order_count().await, 0);
        assert_eq!(store.payment_count().await, 0);
        assert_eq!(store.open_transactions(), 0);
    }

    #[tokio::test]
    async fn status_update_and_payment_completion_apply_together() {
        let store = seeded_store().await;
        let mut tx = store.begin().await.unwrap();
        let order_id = tx.insert_order(&new_order()).await.unwrap();
        tx.insert_payment(order_id, &cash_payment()).await.unwrap();
        tx.commit().await.unwrap();

        let paid_at = Utc::now();
        let mut tx = store.begin().await.unwrap();
        let locked = tx.lock_order(order_id).await.unwrap().unwrap();
        assert_eq!(locked.status, OrderStatus::Pending);
        tx.update_order_status(order_id, OrderStatus::Delivered)
            .await
            .unwrap();
        tx.complete_payment(order_id, paid_at).await.unwrap();

        let locked = tx.lock_order(order_id).await.unwrap().unwrap();
        assert_eq!(locked.status, OrderStatus::Delivered);
        let before = store.get_order_view(order_id).await.unwrap().unwrap();
        assert_eq!(before.order.status, OrderStatus::Pending);

        tx.commit().await.unwrap();

        let after = store.get_order_view(order_id).await.unwrap().unwrap();
        assert_eq!(after.order.status, OrderStatus::Delivered);
        let payment = after.payment.unwrap();
        assert_eq!(payment.payment_status, PaymentStatus::Completed);
        assert_eq!(payment.payment_date, Some(paid_at));
    }

    async fn committed_pending_order(store: &InMemoryOrderStore) -> OrderId {
        let mut tx = store.begin().await.unwrap();
        let order_id = tx.insert_order(&new_order()).await.unwrap();
        tx.insert_payment(order_id, &cash_payment()).await.unwrap();
        tx.commit().await.unwrap();
        order_id
    }

    #[tokio::test]
    async fn second_lock_waits_for_first_commit() {
        let store = seeded_store().await;
        let order_id = committed_pending_order(&store).await;

        let mut first = store.begin().await.unwrap();
        let locked = first.lock_order(order_id).await.unwrap().unwrap();
        assert_eq!(locked.status, OrderStatus::Pending);

        let contender = store.clone();
        let second = tokio::spawn(async move {
            let mut tx = contender.begin().await.unwrap();
            let seen = tx.lock_order(order_id).await.unwrap().unwrap().status;
            if seen == OrderStatus::Pending {
                tx.update_order_status(order_id, OrderStatus::Delivered)
                    .await
                    .unwrap();
                tx.complete_payment(order_id, Utc::now()).await.unwrap();
            }
            tx.commit().await.unwrap();
            seen
        });

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert!(!second.is_finished());

        first
            .update_order_status(order_id, OrderStatus::Cancelled)
            .await
            .unwrap();
        first.commit().await.unwrap();

        assert_eq!(second.await.unwrap(), OrderStatus::Cancelled);
        let view = store.get_order_view(order_id).await.unwrap().unwrap();
        assert_eq!(view.order.status, OrderStatus::Cancelled);
        assert_eq!(view.payment.unwrap().payment_status, PaymentStatus::Pending);
        assert_eq!(store.open_transactions(), 0);
    }

    #[tokio::test]
    async fn rolled_back_lock_is_released() {
        let store = seeded_store().await;
        let order_id = committed_pending_order(&store).await;

        let mut first = store.begin().await.unwrap();
        first.lock_order(order_id).await.unwrap();
        first.rollback().await.unwrap();

        let mut second = store.begin().await.unwrap();
        let locked = tokio::time::timeout(
            std::time::Duration::from_secs(1),
            second.lock_order(order_id),
        )
        .await
        .expect("lock should be free after rollback")
        .unwrap();
        assert_eq!(locked.unwrap().status, OrderStatus::Pending);
    }

    #[tokio::test]
    async fn injected_begin_failure_opens_nothing() {
        let store = seeded_store().await;
        store.set_fail_on_begin(true).await;

        assert!(matches!(store.begin().await, Err(StoreError::Unavailable(_))));
        assert_eq!(store.open_transactions(), 0);
    }

    #[tokio::test]
    async fn status_update_on_missing_order_fails() {
        let store = seeded_store().await;
        let mut tx = store.begin().await.unwrap();
        assert!(tx.lock_order(OrderId::new(5)).await.unwrap().is_none());
        assert!(matches!(
            tx.update_order_status(OrderId::new(5), OrderStatus::Shipped)
                .await,
            Err(StoreError::OrderNotFound(_))
        ));
    }

    #[tokio::test]
    async fn orders_are_listed_newest_first() {
        let store = seeded_store().await;
        let earlier = Utc::now() - chrono::Duration::hours(1);

        let mut tx = store.begin().await.unwrap();
        let old_id = tx
            .insert_order(&NewOrder {
                order_date: earlier,
                ..new_order()
            })
            .await
            .unwrap();
        let new_id = tx.insert_order(&new_order()).await.unwrap();
        tx.commit().await.unwrap();

        let orders = store.orders_for_user(UserId::new(7)).await.unwrap();
        let ids: Vec<OrderId> = orders.iter().map(|v| v.order.order_id).collect();
        assert_eq!(ids, vec![new_id, old_id]);
        assert!(orders.iter().all(|v| v.payment.is_none()));
    }
}
