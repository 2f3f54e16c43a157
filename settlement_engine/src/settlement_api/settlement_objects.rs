use std::fmt::Display;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db_types::{ItemId, Money, Order, OrderId, OrderStatusType};

//--------------------------------------   SettlementOutcome   ---------------------------------------------------------
/// The successful result of reconciling a notification against an order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettlementOutcome {
    /// The order was marked paid and its side effects (stock, voucher usage) were applied.
    Settled { order: Order, source: LineItemSource },
    /// The payment expired and the order was cancelled. No side effects were applied.
    Cancelled { order: Order },
    /// The gateway reported a non-terminal status. Only the status and payment id were recorded.
    Pending { order: Order },
    /// The order was already paid. Nothing was changed.
    AlreadySettled { order: Order },
    /// The order is cancelled or failed; further notifications are not acted upon.
    Ignored { order: Order },
}

impl SettlementOutcome {
    pub fn order(&self) -> &Order {
        match self {
            Self::Settled { order, .. } |
            Self::Cancelled { order } |
            Self::Pending { order } |
            Self::AlreadySettled { order } |
            Self::Ignored { order } => order,
        }
    }

    pub fn into_order(self) -> Order {
        match self {
            Self::Settled { order, .. } |
            Self::Cancelled { order } |
            Self::Pending { order } |
            Self::AlreadySettled { order } |
            Self::Ignored { order } => order,
        }
    }

    /// True if the settlement changed nothing in the store.
    pub fn is_no_op(&self) -> bool {
        matches!(self, Self::AlreadySettled { .. } | Self::Ignored { .. })
    }
}

impl Display for SettlementOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let order = self.order();
        match self {
            Self::Settled { source, .. } => write!(f, "Order {} settled (line items from {source})", order.id),
            Self::Cancelled { .. } => write!(f, "Order {} cancelled", order.id),
            Self::Pending { .. } => write!(f, "Order {} pending ({})", order.id, order.status),
            Self::AlreadySettled { .. } => write!(f, "Order {} was already settled", order.id),
            Self::Ignored { .. } => write!(f, "Order {} is {}. Notification ignored", order.id, order.status),
        }
    }
}

//--------------------------------------     Line items        ---------------------------------------------------------
/// Where the line-item resolver found the items to decrement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineItemSource {
    /// Line items linked to the order at checkout
    Linked,
    /// The checkout record captured when payment was initiated
    CheckoutRecord,
    /// The user's unlinked working selection. The selection may have changed since checkout.
    WorkingSelection,
    /// Quantity inferred from the order total and the primary item's price. Lossy.
    QuantityInference,
    /// Nothing could be found
    Nothing,
}

impl LineItemSource {
    /// True for the fallbacks that may not reflect what the customer actually bought.
    pub fn is_risky(&self) -> bool {
        matches!(self, Self::WorkingSelection | Self::QuantityInference)
    }
}

impl Display for LineItemSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Linked => write!(f, "linked line items"),
            Self::CheckoutRecord => write!(f, "checkout record"),
            Self::WorkingSelection => write!(f, "working selection"),
            Self::QuantityInference => write!(f, "quantity inference"),
            Self::Nothing => write!(f, "nowhere"),
        }
    }
}

/// A request to remove `quantity` units of an item from stock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StockDemand {
    pub item_id: ItemId,
    pub quantity: i64,
}

impl StockDemand {
    pub fn new(item_id: ItemId, quantity: i64) -> Self {
        Self { item_id, quantity }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedLineItems {
    pub source: LineItemSource,
    /// At most one demand per item, in ascending item id order.
    pub demands: Vec<StockDemand>,
}

impl ResolvedLineItems {
    pub fn nothing() -> Self {
        Self { source: LineItemSource::Nothing, demands: vec![] }
    }

    pub fn is_empty(&self) -> bool {
        self.demands.is_empty()
    }

    pub fn total_units(&self) -> i64 {
        self.demands.iter().map(|d| d.quantity).sum()
    }
}

//--------------------------------------    Diagnostics        ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptOutcome {
    /// The strategy could not run, e.g. the notification had no payment id
    Skipped,
    NoMatch,
    /// The strategy extracted an order id, but no such order exists
    OrderMissing(OrderId),
    Matched(OrderId),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionAttempt {
    pub strategy: String,
    pub outcome: AttemptOutcome,
}

impl ResolutionAttempt {
    pub fn new<S: Into<String>>(strategy: S, outcome: AttemptOutcome) -> Self {
        Self { strategy: strategy.into(), outcome }
    }
}

/// Snapshot of an order that could plausibly have been the target of an unresolved notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateOrder {
    pub id: OrderId,
    pub status: OrderStatusType,
    pub total_amount: Money,
    pub external_id: Option<String>,
    pub payment_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<&Order> for CandidateOrder {
    fn from(order: &Order) -> Self {
        Self {
            id: order.id,
            status: order.status,
            total_amount: order.total_amount,
            external_id: order.external_id.clone(),
            payment_id: order.payment_id.clone(),
            created_at: order.created_at,
        }
    }
}

/// Everything we know about a notification that could not be mapped to an order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionDiagnostics {
    pub payment_id: Option<String>,
    pub correlation: Option<String>,
    pub attempts: Vec<ResolutionAttempt>,
    pub candidates: Vec<CandidateOrder>,
}

impl Display for ResolutionDiagnostics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "Could not resolve an order for payment id {:?} / external id {:?}.",
            self.payment_id, self.correlation
        )?;
        writeln!(f, "Strategies attempted:")?;
        for attempt in &self.attempts {
            writeln!(f, "  - {}: {:?}", attempt.strategy, attempt.outcome)?;
        }
        if self.candidates.is_empty() {
            write!(f, "There are no unsettled orders.")
        } else {
            writeln!(f, "Recent unsettled orders:")?;
            for c in &self.candidates {
                writeln!(
                    f,
                    "  - {} [{}] {} external_id={:?} payment_id={:?} created {}",
                    c.id, c.status, c.total_amount, c.external_id, c.payment_id, c.created_at
                )?;
            }
            Ok(())
        }
    }
}
