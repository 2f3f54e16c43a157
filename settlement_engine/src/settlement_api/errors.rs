use thiserror::Error;

use crate::{
    db_types::{ItemId, OrderId, VoucherId},
    settlement_api::settlement_objects::ResolutionDiagnostics,
    traits::SettlementStoreError,
};

#[derive(Debug, Clone, Error)]
pub enum SettlementError {
    #[error("The notification is malformed. {0}")]
    MalformedNotification(String),
    #[error("{0}")]
    OrderNotResolved(Box<ResolutionDiagnostics>),
    #[error("Order {0} does not exist")]
    OrderNotFound(OrderId),
    #[error("Insufficient stock for {item_id}. Requested {requested}, but only {available} available")]
    InsufficientStock { item_id: ItemId, requested: i64, available: i64 },
    #[error("Voucher {voucher_id} has reached its usage limit ({usage_count}/{usage_limit})")]
    VoucherLimitExceeded { voucher_id: VoucherId, usage_count: i64, usage_limit: i64 },
    #[error("The store is temporarily unavailable. {0}")]
    StoreUnavailable(String),
    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl SettlementError {
    /// Transient errors should be reported to the gateway in a way that makes it redeliver the notification later.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::StoreUnavailable(_))
    }
}

impl From<SettlementStoreError> for SettlementError {
    fn from(e: SettlementStoreError) -> Self {
        match e {
            SettlementStoreError::StoreUnavailable(s) => Self::StoreUnavailable(s),
            SettlementStoreError::OrderNotFound(id) => Self::OrderNotFound(id),
            e => Self::DatabaseError(e.to_string()),
        }
    }
}
