use thiserror::Error;

use crate::db_types::{ItemId, OrderId, OrderStatusType};

#[derive(Debug, Clone, Error)]
pub enum SettlementStoreError {
    #[error("The database is temporarily unavailable: {0}")]
    StoreUnavailable(String),
    #[error("We have an internal database engine (configuration/uptime etc.) error: {0}")]
    DatabaseError(String),
    #[error("The requested order {0} does not exist")]
    OrderNotFound(OrderId),
    #[error("The requested item {0} does not exist")]
    ItemNotFound(ItemId),
    #[error("The requested voucher {0} does not exist")]
    VoucherNotFound(String),
    #[error("Order {id} cannot move from {from} to {to}")]
    IllegalStatusChange { id: OrderId, from: OrderStatusType, to: OrderStatusType },
    #[error("Invalid data supplied: {0}")]
    InvalidData(String),
}

impl SettlementStoreError {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::StoreUnavailable(_))
    }
}

/// SQLite primary result codes for "database is busy" and "table is locked". Extended codes share the low byte.
const SQLITE_BUSY: i32 = 5;
const SQLITE_LOCKED: i32 = 6;

impl From<sqlx::Error> for SettlementStoreError {
    fn from(e: sqlx::Error) -> Self {
        match &e {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                SettlementStoreError::StoreUnavailable(e.to_string())
            },
            sqlx::Error::Database(db_err) => {
                let code = db_err.code().and_then(|c| c.parse::<i32>().ok()).map(|c| c & 0xff);
                let locked = matches!(code, Some(SQLITE_BUSY | SQLITE_LOCKED)) ||
                    db_err.message().contains("database is locked");
                if locked {
                    SettlementStoreError::StoreUnavailable(e.to_string())
                } else {
                    SettlementStoreError::DatabaseError(e.to_string())
                }
            },
            _ => SettlementStoreError::DatabaseError(e.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for SettlementStoreError {
    fn from(e: sqlx::migrate::MigrateError) -> Self {
        SettlementStoreError::DatabaseError(e.to_string())
    }
}
