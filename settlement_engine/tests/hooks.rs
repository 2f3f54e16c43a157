use std::{future::Future, pin::Pin, time::Duration};

use log::*;
use settlement_engine::{
    db_types::OrderStatusType,
    events::{EventHandlers, EventHooks, HandlerReport, OrderSettledEvent},
    SettlementConfig,
    SettlementOutcome,
};
use tokio::{runtime::Runtime, sync::mpsc};

mod support;

use support::*;

#[test]
fn on_order_settled() {
    dotenvy::from_filename(".env.test").ok();
    let _ = env_logger::try_init();
    let rt = Runtime::new().unwrap();
    rt.block_on(async move {
        let (tx, mut rx) = mpsc::channel::<OrderSettledEvent>(10);
        let mut hooks = EventHooks::default();
        hooks.on_order_settled(move |ev| {
            let tx = tx.clone();
            Box::pin(async move {
                info!("🪝️ {ev:?}");
                let _ = tx.send(ev).await;
            }) as Pin<Box<dyn Future<Output = ()> + Send>>
        });
        let config = SettlementConfig::default();
        let handlers = EventHandlers::from_config(&config, hooks);
        let producers = handlers.producers();
        let tasks = handlers.start_handlers();
        assert_eq!(tasks.len(), 1);

        let api = setup_with_producers(config, producers).await;
        let db = api.db().clone();
        let tee = item(&db, "Tour T-shirt", 50_000, 5).await;
        let first = checkout(&db, 1, &[(tee.id, 1)], None).await;
        let second = checkout(&db, 2, &[(tee.id, 1)], None).await;

        let outcome = api.settle(paid(&first, "inv-500")).await.unwrap();
        assert!(matches!(outcome, SettlementOutcome::Settled { .. }));
        let ev = tokio::time::timeout(Duration::from_secs(5), rx.recv()).await.unwrap().unwrap();
        assert_eq!(ev.order_id, first.id);
        assert!(ev.is_paid());

        // Redelivery does not publish again
        let outcome = api.settle(paid(&first, "inv-500")).await.unwrap();
        assert!(outcome.is_no_op());

        let outcome = api.settle(expired(&second, "inv-501")).await.unwrap();
        assert!(matches!(outcome, SettlementOutcome::Cancelled { .. }));
        let ev = tokio::time::timeout(Duration::from_secs(5), rx.recv()).await.unwrap().unwrap();
        assert_eq!(ev.order_id, second.id);
        assert_eq!(ev.status, OrderStatusType::Cancelled);
        assert!(!ev.is_paid());

        // A failed settlement publishes nothing
        let third = checkout(&db, 3, &[(tee.id, 10)], None).await;
        assert!(api.settle(paid(&third, "inv-502")).await.is_err());
        assert!(tokio::time::timeout(Duration::from_millis(200), rx.recv()).await.is_err());

        // Dropping the api drops the last producer, which shuts the handler down
        tear_down(api).await;
        for task in tasks {
            let report = task.await.expect("Handler task panicked");
            assert_eq!(report, HandlerReport { handled: 2, failed: 0 });
        }
    });
    info!("🪝️ test complete");
}
