//! Settlement Engine
//!
//! The settlement engine reconciles asynchronous, at-least-once payment gateway notifications with internal order
//! state. When a notification reports that an order has been paid, the engine marks the order paid, takes the ordered
//! items out of stock and counts the redemption of the order's voucher, all in one atomic unit of work.
//!
//! The library is divided into three main sections:
//! 1. Store interfaces ([`mod@traits`]) and the SQLite backend that implements them ([`SqliteDatabase`]). The
//!    database types are defined in the [`mod@db_types`] module and are public.
//! 2. The settlement API ([`mod@settlement_api`]). [`SettlementApi`] validates a notification, resolves the order it
//!    refers to, and reconciles the two. It is generic over the backend.
//! 3. Events ([`mod@events`]). Collaborators (receipts, ticket rendering, email) subscribe to an `OrderSettled` event
//!    that is only ever published after a settlement has been committed.
pub mod config;
pub mod db_types;
pub mod events;
pub mod helpers;
pub mod settlement_api;
pub mod traits;

#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

pub use config::{ConfigError, SettlementConfig};
pub use settlement_api::{
    errors::SettlementError,
    notification::{GatewayStatus, InvoiceNotification, ValidatedNotification},
    settlement_objects::{LineItemSource, ResolutionDiagnostics, SettlementOutcome},
    SettlementApi,
};
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDatabase;
pub use traits::{
    InventoryManagement,
    LineItemManagement,
    OrderManagement,
    SessionManagement,
    SettlementDatabase,
    SettlementStoreError,
    VoucherManagement,
};
