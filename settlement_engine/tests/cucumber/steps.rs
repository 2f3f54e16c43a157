use std::str::FromStr;

use cucumber::{then, when};
use settlement_engine::{
    db_types::{Money, NewOrder, OrderStatusType},
    InvoiceNotification,
    LineItemSource,
    OrderManagement,
    SettlementError,
    SettlementOutcome,
};

use crate::cucumber::SettlementWorld;

async fn check_out(world: &mut SettlementWorld, customer: i64, name: String, voucher: Option<String>) {
    let subtotal = world.selections.remove(&customer).unwrap_or_else(|| Money::from(0));
    let mut order = NewOrder::new(customer, subtotal);
    if let Some(code) = &voucher {
        order = order.with_voucher(code);
    }
    let order = world.db().create_order(order).await.expect("Error creating order");
    let external_id = format!("ORDER_{}_1718000000000", order.id.value());
    let order = world.db().initiate_payment(order.id, &external_id, None).await.expect("Error initiating payment");
    world.orders.insert(name, order);
}

#[when(expr = "customer {int} checks out as {word}")]
async fn checkout(world: &mut SettlementWorld, customer: i64, name: String) {
    check_out(world, customer, name, None).await;
}

#[when(expr = "customer {int} checks out as {word} using voucher {word}")]
async fn checkout_with_voucher(world: &mut SettlementWorld, customer: i64, name: String, code: String) {
    check_out(world, customer, name, Some(code)).await;
}

#[when(expr = "the gateway reports {word} as {word} with payment id {word}")]
async fn gateway_notification(world: &mut SettlementWorld, name: String, status: String, payment_id: String) {
    let order = world.order(&name);
    let notification = InvoiceNotification::new(&status)
        .with_payment_id(&payment_id)
        .with_external_id(order.external_id.as_deref().unwrap_or_default())
        .with_amount(order.total_amount.value());
    let result = world.api().settle(notification).await;
    world.last_result = Some(result);
}

#[when(expr = "the gateway sends the payload {string}")]
async fn gateway_payload(world: &mut SettlementWorld, payload: String) {
    let result = world.api().settle_json(&payload).await;
    world.last_result = Some(result);
}

fn outcome_name(outcome: &SettlementOutcome) -> &'static str {
    match outcome {
        SettlementOutcome::Settled { .. } => "settled",
        SettlementOutcome::Cancelled { .. } => "cancelled",
        SettlementOutcome::Pending { .. } => "pending",
        SettlementOutcome::AlreadySettled { .. } => "already settled",
        SettlementOutcome::Ignored { .. } => "ignored",
    }
}

fn error_name(err: &SettlementError) -> &'static str {
    match err {
        SettlementError::MalformedNotification(_) => "malformed notification",
        SettlementError::OrderNotResolved(_) => "order not resolved",
        SettlementError::OrderNotFound(_) => "order not found",
        SettlementError::InsufficientStock { .. } => "insufficient stock",
        SettlementError::VoucherLimitExceeded { .. } => "voucher limit exceeded",
        SettlementError::StoreUnavailable(_) => "store unavailable",
        SettlementError::DatabaseError(_) => "database error",
    }
}

#[then(expr = "the notification is {string}")]
async fn check_outcome(world: &mut SettlementWorld, expected: String) {
    match world.last_result() {
        Ok(outcome) => assert_eq!(outcome_name(outcome), expected, "Unexpected outcome: {outcome}"),
        Err(e) => panic!("Expected {expected}, but settlement failed: {e}"),
    }
}

#[then(expr = "the notification fails with {string}")]
async fn check_failure(world: &mut SettlementWorld, expected: String) {
    match world.last_result() {
        Ok(outcome) => panic!("Expected {expected}, but settlement succeeded: {outcome}"),
        Err(e) => assert_eq!(error_name(e), expected, "Unexpected error: {e}"),
    }
}

#[then(expr = "the line items were taken from {word}")]
async fn check_source(world: &mut SettlementWorld, source: String) {
    let expected = match source.as_str() {
        "order" => LineItemSource::Linked,
        "checkout" => LineItemSource::CheckoutRecord,
        "selection" => LineItemSource::WorkingSelection,
        "total" => LineItemSource::QuantityInference,
        "nowhere" => LineItemSource::Nothing,
        s => panic!("Unknown line item source {s}"),
    };
    match world.last_result() {
        Ok(SettlementOutcome::Settled { source, .. }) => assert_eq!(*source, expected),
        other => panic!("Expected a settled order, got {other:?}"),
    }
}

#[then(expr = "{word} is {word}")]
async fn check_order_status(world: &mut SettlementWorld, name: String, status: String) {
    let id = world.order(&name).id;
    let expected = OrderStatusType::from_str(&status).expect("Not a valid order status");
    let order = world.db().fetch_order_by_id(id).await.expect("Error fetching order").expect("Order does not exist");
    assert_eq!(order.status, expected, "Order {name} has the wrong status");
}

#[then(expr = "{word} totals {int}")]
async fn check_order_total(world: &mut SettlementWorld, name: String, total: i64) {
    assert_eq!(world.order(&name).total_amount, Money::from(total));
}

#[then(expr = "{string} has {int} in stock")]
async fn check_stock(world: &mut SettlementWorld, name: String, stock: i64) {
    let id = world.item_id(&name);
    let item = world.db().fetch_sellable_item(id).await.expect("Error fetching item").expect("Item does not exist");
    assert_eq!(item.stock, stock, "Stock for {name} is incorrect");
}

#[then(expr = "voucher {word} has been used {int} time(s)")]
async fn check_usage(world: &mut SettlementWorld, code: String, count: i64) {
    let id = world.voucher_id(&code);
    let voucher = world.db().fetch_voucher(id).await.expect("Error fetching voucher").expect("Voucher does not exist");
    assert_eq!(voucher.usage_count, count, "Usage count for {code} is incorrect");
}
