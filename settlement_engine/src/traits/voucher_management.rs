use crate::{
    db_types::{Voucher, VoucherId},
    traits::{SessionManagement, SettlementStoreError},
};

#[allow(async_fn_in_trait)]
pub trait VoucherManagement: SessionManagement {
    /// Acquires an exclusive lock on the voucher row for the lifetime of `session`.
    async fn lock_voucher(
        &self,
        session: &mut Self::Session,
        id: VoucherId,
    ) -> Result<Option<Voucher>, SettlementStoreError>;

    /// Atomically increments the voucher's usage counter.
    ///
    /// Returns `false` (and changes nothing) if the voucher does not exist or its usage ceiling has been reached.
    async fn increment_voucher_usage(
        &self,
        session: &mut Self::Session,
        id: VoucherId,
    ) -> Result<bool, SettlementStoreError>;
}
