use crate::{
    db_types::{CheckoutLine, LineItem, OrderId},
    traits::{SessionManagement, SettlementStoreError},
};

/// The data sources for the line-item fallback chain.
#[allow(async_fn_in_trait)]
pub trait LineItemManagement: SessionManagement {
    /// Line items that were linked to the order at checkout.
    async fn fetch_linked_line_items(
        &self,
        session: &mut Self::Session,
        order_id: OrderId,
    ) -> Result<Vec<LineItem>, SettlementStoreError>;

    /// The order's checkout record joined with the item it refers to, if one was captured.
    async fn fetch_checkout_line(
        &self,
        session: &mut Self::Session,
        order_id: OrderId,
    ) -> Result<Option<CheckoutLine>, SettlementStoreError>;

    /// The user's current working selection, i.e. line items that have not been linked to any order.
    async fn fetch_unlinked_line_items(
        &self,
        session: &mut Self::Session,
        user_id: i64,
    ) -> Result<Vec<LineItem>, SettlementStoreError>;

    /// Links the given (currently unlinked) line items to the order. Lines that were linked in the meantime are left
    /// alone. Returns the number of lines linked.
    async fn link_line_items(
        &self,
        session: &mut Self::Session,
        order_id: OrderId,
        line_item_ids: &[i64],
    ) -> Result<u64, SettlementStoreError>;
}
