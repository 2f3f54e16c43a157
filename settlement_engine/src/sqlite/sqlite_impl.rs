//! `SqliteDatabase` is a concrete implementation of a settlement backend.
//!
//! Unsurprisingly, it uses SQLite as the backend and implements all the traits defined in the [`crate::traits`]
//! module.
//!
//! A session is a plain `sqlx` transaction. SQLite has no row-level locks, so the first write issued through a session
//! (the order lock) takes the database writer lock and holds it until the session is committed or rolled back. This
//! serialises settlements; readers are not blocked thanks to WAL mode.
use std::{fmt::Debug, time::Duration};

use log::*;
use sqlx::{Sqlite, SqlitePool, Transaction};

use super::db::{checkout, items, line_items, new_pool, orders, vouchers};
use crate::{
    config::{SettlementConfig, DEFAULT_BUSY_TIMEOUT_MS},
    db_types::{
        CheckoutLine,
        CheckoutRecord,
        ItemId,
        LineItem,
        NewCheckoutRecord,
        NewLineItem,
        NewOrder,
        NewSellableItem,
        NewVoucher,
        Order,
        OrderId,
        OrderStatusType,
        OrderVoucher,
        SellableItem,
        SettlementUpdate,
        Voucher,
        VoucherId,
    },
    traits::{
        InventoryManagement,
        LineItemManagement,
        OrderManagement,
        SessionManagement,
        SettlementStoreError,
        VoucherManagement,
    },
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl SessionManagement for SqliteDatabase {
    type Session = Transaction<'static, Sqlite>;

    async fn begin_session(&self) -> Result<Self::Session, SettlementStoreError> {
        let tx = self.pool.begin().await?;
        Ok(tx)
    }

    async fn commit_session(&self, session: Self::Session) -> Result<(), SettlementStoreError> {
        session.commit().await?;
        Ok(())
    }

    async fn rollback_session(&self, session: Self::Session) -> Result<(), SettlementStoreError> {
        session.rollback().await?;
        Ok(())
    }
}

impl OrderManagement for SqliteDatabase {
    async fn lock_order(&self, session: &mut Self::Session, id: OrderId) -> Result<Option<Order>, SettlementStoreError> {
        let order = orders::lock_order(id, &mut **session).await?;
        Ok(order)
    }

    async fn update_order_status(
        &self,
        session: &mut Self::Session,
        id: OrderId,
        update: SettlementUpdate,
    ) -> Result<Order, SettlementStoreError> {
        let current =
            orders::fetch_order_by_id(id, &mut **session).await?.ok_or(SettlementStoreError::OrderNotFound(id))?;
        if !current.status.can_transition_to(update.new_status) {
            return Err(SettlementStoreError::IllegalStatusChange {
                id,
                from: current.status,
                to: update.new_status,
            });
        }
        let order =
            orders::update_settlement(id, update, &mut **session).await?.ok_or(SettlementStoreError::OrderNotFound(id))?;
        debug!("🗃️ Order {id} moved from {} to {}", current.status, order.status);
        Ok(order)
    }

    async fn fetch_order_voucher(
        &self,
        session: &mut Self::Session,
        id: OrderId,
    ) -> Result<Option<OrderVoucher>, SettlementStoreError> {
        let link = orders::fetch_order_voucher(id, &mut **session).await?;
        Ok(link)
    }

    async fn fetch_order_by_payment_id(&self, payment_id: &str) -> Result<Option<Order>, SettlementStoreError> {
        let mut conn = self.pool.acquire().await?;
        let order = orders::fetch_order_by_payment_id(payment_id, &mut conn).await?;
        Ok(order)
    }

    async fn fetch_order_by_id(&self, id: OrderId) -> Result<Option<Order>, SettlementStoreError> {
        let mut conn = self.pool.acquire().await?;
        let order = orders::fetch_order_by_id(id, &mut conn).await?;
        Ok(order)
    }

    async fn fetch_unsettled_orders(&self, limit: usize) -> Result<Vec<Order>, SettlementStoreError> {
        let mut conn = self.pool.acquire().await?;
        let orders = orders::fetch_unsettled_orders(limit, &mut conn).await?;
        Ok(orders)
    }

    async fn mark_voucher_limit_failed(&self, id: OrderId) -> Result<Option<Order>, SettlementStoreError> {
        let mut conn = self.pool.acquire().await?;
        let order = orders::mark_voucher_limit_failed(id, &mut conn).await?;
        Ok(order)
    }
}

impl InventoryManagement for SqliteDatabase {
    async fn fetch_item(
        &self,
        session: &mut Self::Session,
        id: ItemId,
    ) -> Result<Option<SellableItem>, SettlementStoreError> {
        let item = items::fetch_item(id, &mut **session).await?;
        Ok(item)
    }

    async fn decrement_stock(
        &self,
        session: &mut Self::Session,
        id: ItemId,
        quantity: i64,
    ) -> Result<bool, SettlementStoreError> {
        if quantity <= 0 {
            return Err(SettlementStoreError::InvalidData(format!("Cannot decrement {id} by {quantity}")));
        }
        let decremented = items::decrement_stock(id, quantity, &mut **session).await?;
        Ok(decremented)
    }
}

impl VoucherManagement for SqliteDatabase {
    async fn lock_voucher(
        &self,
        session: &mut Self::Session,
        id: VoucherId,
    ) -> Result<Option<Voucher>, SettlementStoreError> {
        let voucher = vouchers::lock_voucher(id, &mut **session).await?;
        Ok(voucher)
    }

    async fn increment_voucher_usage(
        &self,
        session: &mut Self::Session,
        id: VoucherId,
    ) -> Result<bool, SettlementStoreError> {
        let incremented = vouchers::increment_usage(id, &mut **session).await?;
        Ok(incremented)
    }
}

impl LineItemManagement for SqliteDatabase {
    async fn fetch_linked_line_items(
        &self,
        session: &mut Self::Session,
        order_id: OrderId,
    ) -> Result<Vec<LineItem>, SettlementStoreError> {
        let lines = line_items::fetch_linked(order_id, &mut **session).await?;
        Ok(lines)
    }

    async fn fetch_checkout_line(
        &self,
        session: &mut Self::Session,
        order_id: OrderId,
    ) -> Result<Option<CheckoutLine>, SettlementStoreError> {
        let line = checkout::fetch_checkout_line(order_id, &mut **session).await?;
        Ok(line)
    }

    async fn fetch_unlinked_line_items(
        &self,
        session: &mut Self::Session,
        user_id: i64,
    ) -> Result<Vec<LineItem>, SettlementStoreError> {
        let lines = line_items::fetch_unlinked(user_id, &mut **session).await?;
        Ok(lines)
    }

    async fn link_line_items(
        &self,
        session: &mut Self::Session,
        order_id: OrderId,
        line_item_ids: &[i64],
    ) -> Result<u64, SettlementStoreError> {
        let linked = line_items::link_to_order(order_id, line_item_ids, &mut **session).await?;
        Ok(linked)
    }
}

/// Checkout-side writes. These belong to the storefront, but the settlement core needs them to set up the data it
/// settles against.
impl SqliteDatabase {
    pub async fn insert_item(&self, item: NewSellableItem) -> Result<SellableItem, SettlementStoreError> {
        let mut conn = self.pool.acquire().await?;
        let item = items::insert_item(item, &mut conn).await?;
        Ok(item)
    }

    pub async fn insert_voucher(&self, voucher: NewVoucher) -> Result<Voucher, SettlementStoreError> {
        let mut conn = self.pool.acquire().await?;
        let voucher = vouchers::insert_voucher(voucher, &mut conn).await?;
        Ok(voucher)
    }

    /// Adds an item to the user's working selection, capturing the item's current unit price.
    pub async fn add_line_item(&self, line: NewLineItem) -> Result<LineItem, SettlementStoreError> {
        if line.quantity <= 0 {
            return Err(SettlementStoreError::InvalidData(format!("Quantity must be positive, got {}", line.quantity)));
        }
        let item_id = line.item_id;
        let mut conn = self.pool.acquire().await?;
        line_items::insert_line_item(line, &mut conn).await?.ok_or(SettlementStoreError::ItemNotFound(item_id))
    }

    /// Creates an order from the user's working selection in a single transaction.
    ///
    /// * If a voucher code is given, its discount is locked in and the voucher is linked to the order. Voucher usage
    ///   is *not* counted here; that only happens when the order is paid.
    /// * Every unlinked line item of the user is linked to the new order.
    pub async fn create_order(&self, order: NewOrder) -> Result<Order, SettlementStoreError> {
        // Looked up outside the transaction: a deferred transaction whose first statement is a read cannot later take
        // the writer lock while another connection holds it
        let voucher = match order.voucher_code.as_deref() {
            Some(code) => {
                let mut conn = self.pool.acquire().await?;
                Some(
                    vouchers::fetch_voucher_by_code(code, &mut conn)
                        .await?
                        .ok_or_else(|| SettlementStoreError::VoucherNotFound(code.to_string()))?,
                )
            },
            None => None,
        };
        let mut tx = self.pool.begin().await?;
        let discount = voucher.as_ref().map(|v| v.discount_for(order.subtotal)).unwrap_or_default();
        let total = order.subtotal - discount;
        let new_order = orders::insert_order(order.user_id, total, order.primary_item_id, &mut tx).await?;
        if let Some(v) = voucher {
            orders::insert_order_voucher(new_order.id, v.id, discount, &mut tx).await?;
            debug!("🎟️ Voucher {} applied to order {} for a discount of {discount}", v.code, new_order.id);
        }
        let linked = line_items::link_selection(new_order.id, order.user_id, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Order {} created with {linked} line items", new_order.id);
        Ok(new_order)
    }

    pub async fn add_checkout_record(&self, record: NewCheckoutRecord) -> Result<CheckoutRecord, SettlementStoreError> {
        if record.quantity <= 0 {
            return Err(SettlementStoreError::InvalidData(format!(
                "Quantity must be positive, got {}",
                record.quantity
            )));
        }
        let mut conn = self.pool.acquire().await?;
        let record = checkout::insert_checkout_record(record, &mut conn).await?;
        Ok(record)
    }

    /// Records the correlation string (and the gateway's payment id, if already known) and moves the order to
    /// `awaiting_payment`. Only orders in `created` can be initiated.
    pub async fn initiate_payment(
        &self,
        id: OrderId,
        external_id: &str,
        payment_id: Option<&str>,
    ) -> Result<Order, SettlementStoreError> {
        let mut conn = self.pool.acquire().await?;
        match orders::initiate_payment(id, external_id, payment_id, &mut conn).await? {
            Some(order) => {
                debug!("🗃️ Payment initiated for order {id} with external id {external_id}");
                Ok(order)
            },
            None => match orders::fetch_order_by_id(id, &mut conn).await? {
                Some(order) => Err(SettlementStoreError::IllegalStatusChange {
                    id,
                    from: order.status,
                    to: OrderStatusType::AwaitingPayment,
                }),
                None => Err(SettlementStoreError::OrderNotFound(id)),
            },
        }
    }

    pub async fn fetch_sellable_item(&self, id: ItemId) -> Result<Option<SellableItem>, SettlementStoreError> {
        let mut conn = self.pool.acquire().await?;
        let item = items::fetch_item(id, &mut conn).await?;
        Ok(item)
    }

    pub async fn fetch_voucher(&self, id: VoucherId) -> Result<Option<Voucher>, SettlementStoreError> {
        let mut conn = self.pool.acquire().await?;
        let voucher = vouchers::fetch_voucher(id, &mut conn).await?;
        Ok(voucher)
    }

    pub async fn fetch_line_items_for_order(&self, id: OrderId) -> Result<Vec<LineItem>, SettlementStoreError> {
        let mut conn = self.pool.acquire().await?;
        let lines = line_items::fetch_linked(id, &mut conn).await?;
        Ok(lines)
    }
}

impl SqliteDatabase {
    /// Creates a new database API object from the given configuration.
    pub async fn new(config: &SettlementConfig) -> Result<Self, SettlementStoreError> {
        Self::new_with_options(&config.database_url, config.max_connections, config.busy_timeout).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, SettlementStoreError> {
        Self::new_with_options(url, max_connections, Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS)).await
    }

    pub async fn new_with_options(
        url: &str,
        max_connections: u32,
        busy_timeout: Duration,
    ) -> Result<Self, SettlementStoreError> {
        trace!("Creating new database connection pool with url {url}");
        let pool = new_pool(url, max_connections, busy_timeout).await?;
        let url = url.to_string();
        Ok(Self { url, pool })
    }

    pub fn url(&self) -> &str {
        self.url.as_str()
    }

    /// Returns a reference to the database connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}
