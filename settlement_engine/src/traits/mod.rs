//! #  Store interfaces consumed by the settlement core.
//!
//! This module defines the contracts that a database *backend* must fulfil in order to be used by the settlement
//! flow. The settlement flow never talks to a database directly. It is handed a backend at construction time and only
//! uses the behaviour described here.
//!
//! ## Sessions
//! Every write that the settlement flow performs happens inside a single unit of work. The backend hands out a
//! [`SessionManagement::Session`] value when the unit of work begins, and every mutating method on the store traits
//! takes `&mut Self::Session`. There is no way to decrement stock, increment voucher usage or change an order's
//! settlement status without an open session, and dropping the session without committing discards every write.
//!
//! ## Traits
//! * [`SessionManagement`] opens, commits and rolls back units of work.
//! * [`OrderManagement`] locks orders, updates their settlement status and looks them up by id or payment id.
//! * [`InventoryManagement`] reads sellable items and decrements stock.
//! * [`VoucherManagement`] locks vouchers and increments their usage counter.
//! * [`LineItemManagement`] provides the data the line-item fallback chain needs.
//! * [`SettlementDatabase`] bundles all of the above, and is what the settlement API is generic over.
mod inventory_management;
mod line_item_management;
mod order_management;
mod session;
mod store_error;
mod voucher_management;

pub use inventory_management::InventoryManagement;
pub use line_item_management::LineItemManagement;
pub use order_management::OrderManagement;
pub use session::SessionManagement;
pub use store_error::SettlementStoreError;
pub use voucher_management::VoucherManagement;

/// The complete set of store behaviour needed by the settlement flow.
pub trait SettlementDatabase:
    Clone + OrderManagement + InventoryManagement + VoucherManagement + LineItemManagement
{
}

impl<T> SettlementDatabase for T where T: Clone + OrderManagement + InventoryManagement + VoucherManagement + LineItemManagement
{}
