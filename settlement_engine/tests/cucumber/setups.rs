use cucumber::given;
use settlement_engine::db_types::{Money, NewLineItem, NewSellableItem, NewVoucher};

use crate::cucumber::{SettlementSystem, SettlementWorld};

#[given("a fresh install")]
async fn fresh_database(world: &mut SettlementWorld) {
    let system = SettlementSystem::new().await;
    world.system = Some(system);
}

#[given(expr = "a settlement engine that refuses risky line item fallbacks")]
async fn strict_database(world: &mut SettlementWorld) {
    let system = SettlementSystem::strict().await;
    world.system = Some(system);
}

#[given(expr = "the item {string} costs {int} with {int} in stock")]
async fn add_item(world: &mut SettlementWorld, name: String, price: i64, stock: i64) {
    let item = NewSellableItem::new(name.as_str(), Money::from(price), stock);
    let item = world.db().insert_item(item).await.expect("Error inserting item");
    world.items.insert(name, item.id);
}

#[given(expr = "the voucher {word} takes {int} off and can be used {int} times")]
async fn add_voucher(world: &mut SettlementWorld, code: String, discount: i64, limit: i64) {
    let voucher = NewVoucher::fixed(code.as_str(), Money::from(discount)).with_usage_limit(limit);
    let voucher = world.db().insert_voucher(voucher).await.expect("Error inserting voucher");
    world.vouchers.insert(code, voucher.id);
}

#[given(expr = "customer {int} selects {int} x {string}")]
async fn select_item(world: &mut SettlementWorld, customer: i64, quantity: i64, name: String) {
    let item_id = world.item_id(&name);
    let line = NewLineItem::new(customer, item_id, quantity);
    let line = world.db().add_line_item(line).await.expect("Error adding line item");
    *world.selections.entry(customer).or_insert_with(|| Money::from(0)) += line.unit_price * line.quantity;
}
