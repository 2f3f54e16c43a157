use settlement_engine::{
    db_types::{Money, NewOrder, OrderId},
    settlement_api::settlement_objects::AttemptOutcome,
    InvoiceNotification,
    SettlementError,
};
use tokio::runtime::Runtime;

mod support;

use support::*;

#[test]
fn every_correlation_template_resolves() {
    let rt = Runtime::new().unwrap();
    rt.block_on(async {
        let api = setup().await;
        let db = api.db();
        let mut ids = Vec::new();
        for user in 1..=3 {
            let order = db.create_order(NewOrder::new(user, Money::from(10_000))).await.unwrap();
            ids.push(order.id);
        }
        let target = ids[1];
        let n = target.value();
        let templates = [
            format!("ORDER_{n}_1718000000"),
            format!("ORDER_{n}"),
            format!("TICKET_{n}_retry-2"),
            format!("invoice_ORDER_{n}_1718000000123"),
            format!("{n}"),
        ];
        for template in templates {
            let notification = InvoiceNotification::new("PAID").with_external_id(&template).validate().unwrap();
            let order = api.resolve_order(&notification).await.unwrap_or_else(|e| panic!("{template}: {e}"));
            assert_eq!(order.id, target, "{template} resolved to the wrong order");
        }
        tear_down(api).await;
    });
}

#[test]
fn payment_id_takes_precedence() {
    let rt = Runtime::new().unwrap();
    rt.block_on(async {
        let api = setup().await;
        let db = api.db();
        let first = db.create_order(NewOrder::new(1, Money::from(10_000))).await.unwrap();
        let second = db.create_order(NewOrder::new(2, Money::from(10_000))).await.unwrap();
        db.initiate_payment(second.id, "ORDER_2_1718000000", Some("inv-100")).await.unwrap();

        // The correlation string points at the first order, but the payment id is authoritative
        let notification = InvoiceNotification::new("PAID")
            .with_payment_id("inv-100")
            .with_external_id(&format!("ORDER_{}", first.id.value()))
            .validate()
            .unwrap();
        let order = api.resolve_order(&notification).await.unwrap();
        assert_eq!(order.id, second.id);

        // Unknown payment ids fall through to the correlation string
        let notification = InvoiceNotification::new("PAID")
            .with_payment_id("inv-unknown")
            .with_external_id(&format!("ORDER_{}", first.id.value()))
            .validate()
            .unwrap();
        let order = api.resolve_order(&notification).await.unwrap();
        assert_eq!(order.id, first.id);
        tear_down(api).await;
    });
}

#[test]
fn unmatched_strings_fail_with_diagnostics() {
    let rt = Runtime::new().unwrap();
    rt.block_on(async {
        let api = setup().await;
        let db = api.db();
        let order = db.create_order(NewOrder::new(1, Money::from(10_000))).await.unwrap();
        db.initiate_payment(order.id, "ORDER_1_1718000000", None).await.unwrap();

        let notification =
            InvoiceNotification::new("PAID").with_payment_id("inv-x").with_external_id("no order here").validate().unwrap();
        let err = api.resolve_order(&notification).await.expect_err("Nothing should resolve");
        let SettlementError::OrderNotResolved(diagnostics) = &err else {
            panic!("Expected OrderNotResolved, got {err:?}");
        };
        assert_eq!(diagnostics.payment_id.as_deref(), Some("inv-x"));
        assert_eq!(diagnostics.correlation.as_deref(), Some("no order here"));
        let strategies = diagnostics.attempts.iter().map(|a| a.strategy.as_str()).collect::<Vec<_>>();
        assert_eq!(strategies, vec![
            "payment_id",
            "prefix_timestamp",
            "prefix_only",
            "prefix_suffix",
            "wrapped_invoice",
            "bare_numeric"
        ]);
        assert!(diagnostics.attempts.iter().all(|a| a.outcome == AttemptOutcome::NoMatch));
        assert_eq!(diagnostics.candidates.len(), 1);
        assert_eq!(diagnostics.candidates[0].external_id.as_deref(), Some("ORDER_1_1718000000"));
        assert!(err.to_string().contains("bare_numeric"));
        assert!(!err.is_transient());
        tear_down(api).await;
    });
}

#[test]
fn extracted_id_must_exist() {
    let rt = Runtime::new().unwrap();
    rt.block_on(async {
        let api = setup().await;
        let notification = InvoiceNotification::new("PAID").with_external_id("ORDER_999").validate().unwrap();
        let err = api.resolve_order(&notification).await.expect_err("Order 999 does not exist");
        let SettlementError::OrderNotResolved(diagnostics) = &err else {
            panic!("Expected OrderNotResolved, got {err:?}");
        };
        let last = diagnostics.attempts.last().unwrap();
        assert_eq!(last.strategy, "prefix_only");
        assert_eq!(last.outcome, AttemptOutcome::OrderMissing(OrderId(999)));
        assert_eq!(diagnostics.attempts[0].outcome, AttemptOutcome::Skipped);
        assert!(diagnostics.candidates.is_empty());
        tear_down(api).await;
    });
}
