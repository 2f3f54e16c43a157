use crate::{
    db_types::{ItemId, SellableItem},
    traits::{SessionManagement, SettlementStoreError},
};

#[allow(async_fn_in_trait)]
pub trait InventoryManagement: SessionManagement {
    /// Fetches a sellable item, reading through the session so that the result is consistent with the locks held by
    /// the unit of work.
    async fn fetch_item(
        &self,
        session: &mut Self::Session,
        id: ItemId,
    ) -> Result<Option<SellableItem>, SettlementStoreError>;

    /// Atomically decrements the item's stock by `quantity`.
    ///
    /// Returns `false` (and changes nothing) if the item does not exist or has fewer than `quantity` units left.
    /// Insufficient stock is never reported as an error; it is up to the caller to decide what it means.
    async fn decrement_stock(
        &self,
        session: &mut Self::Session,
        id: ItemId,
        quantity: i64,
    ) -> Result<bool, SettlementStoreError>;
}
