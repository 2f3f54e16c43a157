use std::collections::BTreeMap;

use log::*;

use crate::{
    config::SettlementConfig,
    db_types::{ItemId, Money, Order},
    settlement_api::settlement_objects::{LineItemSource, ResolvedLineItems, StockDemand},
    traits::{InventoryManagement, LineItemManagement, SettlementStoreError},
};

/// Works out which items, and how many of each, a paid order takes out of stock.
///
/// The sources are tried in order and the first non-empty one wins:
/// 1. line items linked to the order,
/// 2. the order's checkout record,
/// 3. the user's unlinked working selection, which is linked to the order as part of the session,
/// 4. the order's primary item, with the quantity inferred from the order total.
///
/// Sources 3 and 4 can be switched off in [`SettlementConfig`].
#[derive(Debug, Clone, Copy)]
pub struct LineItemResolver {
    allow_selection_fallback: bool,
    allow_quantity_inference: bool,
}

impl Default for LineItemResolver {
    fn default() -> Self {
        Self { allow_selection_fallback: true, allow_quantity_inference: true }
    }
}

impl From<&SettlementConfig> for LineItemResolver {
    fn from(config: &SettlementConfig) -> Self {
        Self {
            allow_selection_fallback: config.allow_selection_fallback,
            allow_quantity_inference: config.allow_quantity_inference,
        }
    }
}

impl LineItemResolver {
    pub async fn resolve<B>(
        &self,
        db: &B,
        session: &mut B::Session,
        order: &Order,
    ) -> Result<ResolvedLineItems, SettlementStoreError>
    where
        B: LineItemManagement + InventoryManagement,
    {
        let linked = db.fetch_linked_line_items(session, order.id).await?;
        if !linked.is_empty() {
            trace!("🧾️ Order {} has {} linked line items", order.id, linked.len());
            return Ok(aggregate(LineItemSource::Linked, linked.iter().map(|l| (l.item_id, l.quantity))));
        }

        if let Some(line) = db.fetch_checkout_line(session, order.id).await? {
            debug!("🧾️ Order {} has no linked line items. Using its checkout record", order.id);
            return Ok(aggregate(LineItemSource::CheckoutRecord, [(line.item_id, line.quantity)]));
        }

        if self.allow_selection_fallback {
            let selection = db.fetch_unlinked_line_items(session, order.user_id).await?;
            if !selection.is_empty() {
                warn!(
                    "🧾️ Order {} has no linked line items or checkout record. Falling back to the current selection of \
                     user {} ({} lines). The selection may have changed since checkout.",
                    order.id,
                    order.user_id,
                    selection.len()
                );
                let ids = selection.iter().map(|l| l.id).collect::<Vec<_>>();
                let linked = db.link_line_items(session, order.id, &ids).await?;
                debug!("🧾️ Linked {linked} selection lines to order {}", order.id);
                return Ok(aggregate(LineItemSource::WorkingSelection, selection.iter().map(|l| (l.item_id, l.quantity))));
            }
        }

        if self.allow_quantity_inference {
            if let Some(item_id) = order.primary_item_id {
                if let Some(item) = db.fetch_item(session, item_id).await? {
                    let quantity = infer_quantity(order.total_amount, item.unit_price);
                    warn!(
                        "🧾️ Order {} has no line items. Inferring {quantity} x {item_id} from the order total {} and \
                         unit price {}. This is lossy when discounts were applied.",
                        order.id, order.total_amount, item.unit_price
                    );
                    return Ok(aggregate(LineItemSource::QuantityInference, [(item_id, quantity)]));
                }
                warn!("🧾️ Order {} refers to primary item {item_id}, which does not exist", order.id);
            }
        }

        Ok(ResolvedLineItems::nothing())
    }
}

/// Combines lines for the same item and sorts them by item id, so that concurrent settlements touch items in the same
/// order.
fn aggregate<I>(source: LineItemSource, lines: I) -> ResolvedLineItems
where I: IntoIterator<Item = (ItemId, i64)> {
    let mut totals = BTreeMap::<ItemId, i64>::new();
    for (item_id, quantity) in lines {
        *totals.entry(item_id).or_default() += quantity;
    }
    let demands =
        totals.into_iter().filter(|(_, q)| *q > 0).map(|(item_id, quantity)| StockDemand::new(item_id, quantity)).collect();
    ResolvedLineItems { source, demands }
}

/// `total / unit_price`, rounded half-up to a whole number of units, and never less than one.
///
/// This is legacy behaviour. Once a voucher discount has been taken off the total, the result undercounts.
pub fn infer_quantity(total: Money, unit_price: Money) -> i64 {
    let price = i128::from(unit_price.value());
    if price <= 0 {
        return 1;
    }
    let total = i128::from(total.value().max(0));
    let rounded = (total * 2 + price) / (2 * price);
    i64::try_from(rounded).unwrap_or(i64::MAX).max(1)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn quantity_inference() {
        let q = |t: i64, p: i64| infer_quantity(Money::from(t), Money::from(p));
        assert_eq!(q(150_000, 50_000), 3);
        assert_eq!(q(124_999, 50_000), 2);
        assert_eq!(q(125_000, 50_000), 3);
        assert_eq!(q(10_000, 50_000), 1);
        assert_eq!(q(0, 50_000), 1);
        assert_eq!(q(150_000, 0), 1);
        // 10% discount on 3 units
        assert_eq!(q(135_000, 50_000), 3);
        // 50% discount on 3 units undercounts
        assert_eq!(q(75_000, 50_000), 2);
    }

    #[test]
    fn aggregation_merges_and_sorts() {
        let r = aggregate(LineItemSource::Linked, [(ItemId(7), 1), (ItemId(2), 2), (ItemId(7), 3)]);
        assert_eq!(r.demands, vec![StockDemand::new(ItemId(2), 2), StockDemand::new(ItemId(7), 4)]);
        assert_eq!(r.total_units(), 6);
        assert_eq!(r.source, LineItemSource::Linked);
        let r = aggregate(LineItemSource::Linked, std::iter::empty());
        assert!(r.is_empty());
    }
}
