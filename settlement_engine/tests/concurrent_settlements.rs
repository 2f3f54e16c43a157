use std::sync::Arc;

use log::*;
use settlement_engine::{db_types::OrderStatusType, OrderManagement, SettlementError, SettlementOutcome};
use tokio::runtime::Runtime;

mod support;

use support::*;

const DELIVERIES: usize = 10;

#[test]
fn concurrent_redeliveries_settle_once() {
    let rt = Runtime::new().unwrap();
    rt.block_on(async {
        let api = Arc::new(setup().await);
        let db = api.db().clone();
        let tee = item(&db, "Tour T-shirt", 50_000, 10).await;
        let ticket = item(&db, "Day pass", 50_000, 10).await;
        let promo = voucher(&db, "EARLYBIRD", 10_000, Some(5)).await;
        let order = checkout(&db, 1, &[(tee.id, 2), (ticket.id, 1)], Some("EARLYBIRD")).await;

        let mut handles = Vec::with_capacity(DELIVERIES);
        for _ in 0..DELIVERIES {
            let api = Arc::clone(&api);
            let notification = paid(&order, "inv-200");
            handles.push(tokio::spawn(async move { api.settle(notification).await }));
        }
        let mut settled = 0;
        let mut already = 0;
        for handle in handles {
            match handle.await.expect("Task panicked").expect("Settlement failed") {
                SettlementOutcome::Settled { .. } => settled += 1,
                SettlementOutcome::AlreadySettled { .. } => already += 1,
                other => panic!("Unexpected outcome {other:?}"),
            }
        }
        info!("🚀️ {settled} settled, {already} no-ops");
        assert_eq!(settled, 1);
        assert_eq!(already, DELIVERIES - 1);
        assert_eq!(stock(&db, tee.id).await, 8);
        assert_eq!(stock(&db, ticket.id).await, 9);
        assert_eq!(usage(&db, &promo).await, 1);

        let api = Arc::into_inner(api).expect("All tasks are done");
        tear_down(api).await;
    });
}

#[test]
fn stock_never_goes_negative() {
    let rt = Runtime::new().unwrap();
    rt.block_on(async {
        let api = Arc::new(setup().await);
        let db = api.db().clone();
        let pass = item(&db, "VIP pass", 100_000, 3).await;
        let mut orders = Vec::new();
        for user in 1..=5 {
            orders.push(checkout(&db, user, &[(pass.id, 1)], None).await);
        }

        let mut handles = Vec::new();
        for (i, order) in orders.iter().enumerate() {
            let api = Arc::clone(&api);
            let notification = paid(order, &format!("inv-3{i:02}"));
            handles.push(tokio::spawn(async move { api.settle(notification).await }));
        }
        let mut settled = 0;
        let mut out_of_stock = 0;
        for handle in handles {
            match handle.await.expect("Task panicked") {
                Ok(SettlementOutcome::Settled { .. }) => settled += 1,
                Err(SettlementError::InsufficientStock { available, .. }) => {
                    assert_eq!(available, 0);
                    out_of_stock += 1;
                },
                other => panic!("Unexpected result {other:?}"),
            }
        }
        assert_eq!(settled, 3);
        assert_eq!(out_of_stock, 2);
        assert_eq!(stock(&db, pass.id).await, 0);
        let mut still_waiting = 0;
        for order in &orders {
            let order = db.fetch_order_by_id(order.id).await.unwrap().unwrap();
            if order.status == OrderStatusType::AwaitingPayment {
                still_waiting += 1;
            } else {
                assert_eq!(order.status, OrderStatusType::Paid);
            }
        }
        assert_eq!(still_waiting, 2);

        let api = Arc::into_inner(api).expect("All tasks are done");
        tear_down(api).await;
    });
}

#[test]
fn voucher_ceiling_holds_under_contention() {
    let rt = Runtime::new().unwrap();
    rt.block_on(async {
        let api = Arc::new(setup().await);
        let db = api.db().clone();
        let tee = item(&db, "Tour T-shirt", 50_000, 100).await;
        let promo = voucher(&db, "FIRST2", 5_000, Some(2)).await;
        let mut orders = Vec::new();
        for user in 1..=5 {
            orders.push(checkout(&db, user, &[(tee.id, 1)], Some("FIRST2")).await);
        }

        let mut handles = Vec::new();
        for (i, order) in orders.iter().enumerate() {
            let api = Arc::clone(&api);
            let notification = paid(order, &format!("inv-4{i:02}"));
            handles.push(tokio::spawn(async move { api.settle(notification).await }));
        }
        let mut settled = 0;
        let mut refused = 0;
        for handle in handles {
            match handle.await.expect("Task panicked") {
                Ok(SettlementOutcome::Settled { .. }) => settled += 1,
                Err(SettlementError::VoucherLimitExceeded { usage_limit, .. }) => {
                    assert_eq!(usage_limit, 2);
                    refused += 1;
                },
                other => panic!("Unexpected result {other:?}"),
            }
        }
        assert_eq!(settled, 2);
        assert_eq!(refused, 3);
        assert_eq!(usage(&db, &promo).await, 2);
        assert_eq!(stock(&db, tee.id).await, 98);
        let mut failed = 0;
        for order in &orders {
            let order = db.fetch_order_by_id(order.id).await.unwrap().unwrap();
            match order.status {
                OrderStatusType::Paid => {},
                OrderStatusType::VoucherLimitFailed => failed += 1,
                s => panic!("Unexpected status {s}"),
            }
        }
        assert_eq!(failed, 3);

        let api = Arc::into_inner(api).expect("All tasks are done");
        tear_down(api).await;
    });
}

#[test]
fn concurrent_checkouts_with_a_voucher() {
    let rt = Runtime::new().unwrap();
    rt.block_on(async {
        let api = setup().await;
        let db = api.db().clone();
        let tee = item(&db, "Tour T-shirt", 50_000, 100).await;
        let promo = voucher(&db, "CREW", 5_000, Some(20)).await;

        let mut handles = Vec::new();
        for user in 1..=8 {
            let db = db.clone();
            let item_id = tee.id;
            handles.push(tokio::spawn(async move { checkout(&db, user, &[(item_id, 1)], Some("CREW")).await }));
        }
        for handle in handles {
            let order = handle.await.expect("Checkout panicked");
            assert_eq!(order.status, OrderStatusType::AwaitingPayment);
            assert_eq!(order.total_amount.value(), 45_000);
            let order = db.fetch_order_by_id(order.id).await.unwrap().unwrap();
            assert_eq!(order.status, OrderStatusType::AwaitingPayment);
        }
        assert_eq!(usage(&db, &promo).await, 0);
        assert_eq!(stock(&db, tee.id).await, 100);

        tear_down(api).await;
    });
}
