use std::fmt::Debug;

use chrono::Utc;
use log::*;

use crate::{
    config::SettlementConfig,
    db_types::{Order, OrderId, OrderStatusType, SettlementUpdate, Voucher},
    events::{EventProducers, OrderSettledEvent},
    settlement_api::{
        errors::SettlementError,
        line_item_resolver::LineItemResolver,
        notification::{InvoiceNotification, ValidatedNotification},
        order_resolver::OrderResolver,
        settlement_objects::SettlementOutcome,
    },
    traits::SettlementDatabase,
};

/// `SettlementApi` reconciles payment gateway notifications with order state.
///
/// Every settlement runs in a single session. The order row is locked first, so two deliveries of the same
/// notification are fully serialised and the second one always sees the outcome of the first. Any failure rolls the
/// whole session back. The only write that survives a failed settlement is the `voucher_limit_failed` marker, which is
/// written separately after the rollback.
pub struct SettlementApi<B> {
    db: B,
    resolver: OrderResolver<B>,
    line_items: LineItemResolver,
    producers: EventProducers,
}

impl<B> Debug for SettlementApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SettlementApi")
    }
}

impl<B: Clone> SettlementApi<B> {
    pub fn new(db: B, config: &SettlementConfig, producers: EventProducers) -> Self {
        let resolver = OrderResolver::new(db.clone(), config.diagnostic_candidates);
        let line_items = LineItemResolver::from(config);
        Self { db, resolver, line_items, producers }
    }
}

impl<B> SettlementApi<B> {
    pub fn db(&self) -> &B {
        &self.db
    }
}

impl<B> SettlementApi<B>
where B: SettlementDatabase
{
    /// Validates, resolves and reconciles a notification.
    pub async fn settle(&self, notification: InvoiceNotification) -> Result<SettlementOutcome, SettlementError> {
        let notification = notification.validate()?;
        let order = self.resolve_order(&notification).await?;
        self.reconcile(order.id, &notification).await
    }

    /// Parses a raw gateway payload and settles it.
    pub async fn settle_json(&self, payload: &str) -> Result<SettlementOutcome, SettlementError> {
        let notification = InvoiceNotification::from_json(payload)?;
        self.settle(notification).await
    }

    pub async fn resolve_order(&self, notification: &ValidatedNotification) -> Result<Order, SettlementError> {
        self.resolver.resolve(notification.payment_id.as_deref(), notification.external_id.as_deref()).await
    }

    /// Applies the notification to the order in a single session.
    ///
    /// On success the session is committed and, for paid and cancelled orders, an [`OrderSettledEvent`] is published.
    /// On failure the session is rolled back. If the failure was a voucher limit violation, the order is then marked
    /// `voucher_limit_failed` in a separate write.
    pub async fn reconcile(
        &self,
        order_id: OrderId,
        notification: &ValidatedNotification,
    ) -> Result<SettlementOutcome, SettlementError> {
        let mut session = self.db.begin_session().await?;
        match self.apply_within_session(&mut session, order_id, notification).await {
            Ok(outcome) => {
                self.db.commit_session(session).await?;
                info!("🧾️ {outcome}");
                self.notify(&outcome).await;
                Ok(outcome)
            },
            Err(e) => {
                if let Err(rb) = self.db.rollback_session(session).await {
                    // The session is dropped either way, which discards its writes
                    warn!("🧾️ Rollback of the session for order {order_id} failed: {rb}");
                }
                warn!("🧾️ Settlement of order {order_id} was rolled back. {e}");
                if matches!(e, SettlementError::VoucherLimitExceeded { .. }) {
                    self.record_voucher_failure(order_id).await;
                }
                Err(e)
            },
        }
    }

    async fn apply_within_session(
        &self,
        session: &mut B::Session,
        order_id: OrderId,
        notification: &ValidatedNotification,
    ) -> Result<SettlementOutcome, SettlementError> {
        let order = self.db.lock_order(session, order_id).await?.ok_or(SettlementError::OrderNotFound(order_id))?;
        if order.status == OrderStatusType::Paid {
            debug!("🧾️ Order {order_id} is already paid. {} notification ignored", notification.status);
            return Ok(SettlementOutcome::AlreadySettled { order });
        }
        if order.status.is_terminal() {
            warn!("🧾️ Order {order_id} is {}. {} notification ignored", order.status, notification.status);
            return Ok(SettlementOutcome::Ignored { order });
        }
        let target = notification.status.target_status(order.status);
        // Locked regardless of the target, so that every session takes its locks in the same order
        let voucher = match self.db.fetch_order_voucher(session, order_id).await? {
            Some(link) => Some(
                self.db
                    .lock_voucher(session, link.voucher_id)
                    .await?
                    .ok_or_else(|| SettlementError::DatabaseError(format!("Voucher {} is missing", link.voucher_id)))?,
            ),
            None => None,
        };
        match target {
            OrderStatusType::Paid => self.settle_paid(session, order, voucher, notification).await,
            OrderStatusType::Cancelled => {
                let update = SettlementUpdate::new(target).with_payment_id(notification.payment_id.clone());
                let order = self.db.update_order_status(session, order_id, update).await?;
                Ok(SettlementOutcome::Cancelled { order })
            },
            _ => {
                let update = SettlementUpdate::new(target).with_payment_id(notification.payment_id.clone());
                let order = self.db.update_order_status(session, order_id, update).await?;
                debug!("🧾️ Order {order_id} is pending ({}). Gateway reported {}", order.status, notification.status);
                Ok(SettlementOutcome::Pending { order })
            },
        }
    }

    async fn settle_paid(
        &self,
        session: &mut B::Session,
        order: Order,
        voucher: Option<Voucher>,
        notification: &ValidatedNotification,
    ) -> Result<SettlementOutcome, SettlementError> {
        if let Some(v) = voucher.as_ref().filter(|v| !v.has_capacity()) {
            return Err(voucher_limit_error(v));
        }
        if let Some(amount) = notification.amount.filter(|a| *a < order.total_amount) {
            warn!("🧾️ Order {} totals {}, but the gateway reported a payment of {amount}", order.id, order.total_amount);
        }

        let resolved = self.line_items.resolve(&self.db, session, &order).await?;
        if resolved.is_empty() {
            warn!("🧾️ No line items could be found for order {}. It will be marked paid without touching stock", order.id);
        }
        for demand in &resolved.demands {
            if !self.db.decrement_stock(session, demand.item_id, demand.quantity).await? {
                let available = self.db.fetch_item(session, demand.item_id).await?.map(|i| i.stock).unwrap_or(0);
                return Err(SettlementError::InsufficientStock {
                    item_id: demand.item_id,
                    requested: demand.quantity,
                    available,
                });
            }
            debug!("📦️ {} x {} taken from stock for order {}", demand.quantity, demand.item_id, order.id);
        }

        if let Some(v) = &voucher {
            if !self.db.increment_voucher_usage(session, v.id).await? {
                let current = self.db.lock_voucher(session, v.id).await?.unwrap_or_else(|| v.clone());
                return Err(voucher_limit_error(&current));
            }
            debug!("🎟️ Voucher {} redeemed by order {}", v.code, order.id);
        }

        let update = SettlementUpdate::new(OrderStatusType::Paid)
            .with_payment_id(notification.payment_id.clone())
            .with_payment_method(notification.payment_method.clone(), notification.payment_channel.clone())
            .with_payer_email(notification.payer_email.as_ref().map(|e| e.reveal().clone()))
            .completed_at(notification.paid_at.unwrap_or_else(Utc::now));
        let order = self.db.update_order_status(session, order.id, update).await?;
        Ok(SettlementOutcome::Settled { order, source: resolved.source })
    }

    async fn record_voucher_failure(&self, order_id: OrderId) {
        match self.db.mark_voucher_limit_failed(order_id).await {
            Ok(Some(_)) => info!("🎟️ Order {order_id} marked as voucher_limit_failed"),
            Ok(None) => debug!("🎟️ Order {order_id} already has a terminal status. Not marking it as failed"),
            Err(e) => error!("🎟️ Could not mark order {order_id} as voucher_limit_failed. {e}"),
        }
    }

    async fn notify(&self, outcome: &SettlementOutcome) {
        if self.producers.is_empty() {
            return;
        }
        match outcome {
            SettlementOutcome::Settled { order, .. } | SettlementOutcome::Cancelled { order } => {
                debug!("📬️ Notifying order settled hook subscribers");
                self.producers.publish_order_settled(OrderSettledEvent::new(order.clone())).await;
            },
            _ => {},
        }
    }
}

fn voucher_limit_error(voucher: &Voucher) -> SettlementError {
    SettlementError::VoucherLimitExceeded {
        voucher_id: voucher.id,
        usage_count: voucher.usage_count,
        usage_limit: voucher.usage_limit.unwrap_or(voucher.usage_count),
    }
}
