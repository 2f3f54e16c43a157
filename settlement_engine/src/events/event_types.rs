use serde::{Deserialize, Serialize};

use crate::db_types::{Order, OrderId, OrderStatusType};

/// Published after a settlement that moved an order to `paid` or `cancelled` has been committed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderSettledEvent {
    pub order_id: OrderId,
    pub status: OrderStatusType,
    pub order: Order,
}

impl OrderSettledEvent {
    pub fn new(order: Order) -> Self {
        Self { order_id: order.id, status: order.status, order }
    }

    pub fn is_paid(&self) -> bool {
        self.status == OrderStatusType::Paid
    }
}
