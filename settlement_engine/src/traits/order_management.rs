use crate::{
    db_types::{Order, OrderId, OrderVoucher, SettlementUpdate},
    traits::{SessionManagement, SettlementStoreError},
};

/// Order store behaviour used by the order resolver and the settlement flow.
#[allow(async_fn_in_trait)]
pub trait OrderManagement: SessionManagement {
    /// Acquires an exclusive lock on the order row for the lifetime of `session` and returns the order as seen
    /// under that lock. Returns `None` if the order does not exist.
    ///
    /// Blocks until the lock is granted, or fails with [`SettlementStoreError::StoreUnavailable`] if the store gives up
    /// waiting.
    async fn lock_order(&self, session: &mut Self::Session, id: OrderId) -> Result<Option<Order>, SettlementStoreError>;

    /// Applies the settlement update to the order inside `session` and returns the updated order.
    ///
    /// The payment id is only written if the order does not already have one.
    async fn update_order_status(
        &self,
        session: &mut Self::Session,
        id: OrderId,
        update: SettlementUpdate,
    ) -> Result<Order, SettlementStoreError>;

    /// Fetches the voucher association for the order, if there is one.
    async fn fetch_order_voucher(
        &self,
        session: &mut Self::Session,
        id: OrderId,
    ) -> Result<Option<OrderVoucher>, SettlementStoreError>;

    /// Looks up an order by the gateway's payment id.
    async fn fetch_order_by_payment_id(&self, payment_id: &str) -> Result<Option<Order>, SettlementStoreError>;

    /// Looks up an order by its internal id.
    async fn fetch_order_by_id(&self, id: OrderId) -> Result<Option<Order>, SettlementStoreError>;

    /// Returns the most recently created orders that are still waiting for a payment outcome. Used to build the
    /// diagnostics attached to unresolvable notifications.
    async fn fetch_unsettled_orders(&self, limit: usize) -> Result<Vec<Order>, SettlementStoreError>;

    /// Marks the order as `voucher_limit_failed`, outside of any session.
    ///
    /// This is the only write that happens after a unit of work has been rolled back. It does not overwrite a terminal
    /// status. Returns the order if it was modified.
    async fn mark_voucher_limit_failed(&self, id: OrderId) -> Result<Option<Order>, SettlementStoreError>;
}
