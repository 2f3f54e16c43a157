use crate::traits::SettlementStoreError;

/// Opens and closes the atomic units of work that all settlement writes share.
#[allow(async_fn_in_trait)]
pub trait SessionManagement {
    /// An open unit of work. Dropping a session without calling [`Self::commit_session`] must discard all of its
    /// writes.
    type Session: Send;

    /// Starts a new unit of work.
    async fn begin_session(&self) -> Result<Self::Session, SettlementStoreError>;

    /// Makes every write performed through `session` durable and visible to other readers, and releases its locks.
    async fn commit_session(&self, session: Self::Session) -> Result<(), SettlementStoreError>;

    /// Discards every write performed through `session` and releases its locks.
    async fn rollback_session(&self, session: Self::Session) -> Result<(), SettlementStoreError>;
}
