#![allow(dead_code)]
use log::*;
use settlement_engine::{
    db_types::{ItemId, Money, NewLineItem, NewOrder, NewSellableItem, NewVoucher, Order, SellableItem, Voucher},
    events::EventProducers,
    test_utils::{prepare_test_env, random_db_path},
    InvoiceNotification,
    SettlementApi,
    SettlementConfig,
    SqliteDatabase,
};
use sqlx::{migrate::MigrateDatabase, Sqlite};

pub async fn setup() -> SettlementApi<SqliteDatabase> {
    setup_with_config(SettlementConfig::default()).await
}

pub async fn setup_with_config(config: SettlementConfig) -> SettlementApi<SqliteDatabase> {
    setup_with_producers(config, EventProducers::default()).await
}

pub async fn setup_with_producers(config: SettlementConfig, producers: EventProducers) -> SettlementApi<SqliteDatabase> {
    let url = random_db_path();
    prepare_test_env(&url).await;
    let config = SettlementConfig { database_url: url, ..config };
    let db = SqliteDatabase::new(&config).await.expect("Error creating connection to database");
    SettlementApi::new(db, &config, producers)
}

pub async fn tear_down(api: SettlementApi<SqliteDatabase>) {
    let url = api.db().url().to_string();
    api.db().close().await;
    if let Err(e) = Sqlite::drop_database(&url).await {
        warn!("🚀️ Failed to drop database {url}: {e}");
    }
}

pub async fn item(db: &SqliteDatabase, name: &str, price: i64, stock: i64) -> SellableItem {
    db.insert_item(NewSellableItem::new(name, Money::from(price), stock)).await.expect("Error inserting item")
}

pub async fn voucher(db: &SqliteDatabase, code: &str, discount: i64, limit: Option<i64>) -> Voucher {
    let mut voucher = NewVoucher::fixed(code, Money::from(discount));
    if let Some(limit) = limit {
        voucher = voucher.with_usage_limit(limit);
    }
    db.insert_voucher(voucher).await.expect("Error inserting voucher")
}

/// The correlation string the storefront currently generates
pub fn external_id(order: &Order) -> String {
    format!("ORDER_{}_1718000000000", order.id.value())
}

/// Adds the lines to the user's selection, checks out, and initiates payment.
pub async fn checkout(db: &SqliteDatabase, user_id: i64, lines: &[(ItemId, i64)], voucher_code: Option<&str>) -> Order {
    let mut subtotal = Money::from(0);
    for (item_id, quantity) in lines {
        let line = db.add_line_item(NewLineItem::new(user_id, *item_id, *quantity)).await.expect("Error adding line");
        subtotal += line.unit_price * line.quantity;
    }
    let mut new_order = NewOrder::new(user_id, subtotal);
    if let Some(code) = voucher_code {
        new_order = new_order.with_voucher(code);
    }
    let order = db.create_order(new_order).await.expect("Error creating order");
    let external_id = external_id(&order);
    db.initiate_payment(order.id, &external_id, None).await.expect("Error initiating payment")
}

pub fn paid(order: &Order, payment_id: &str) -> InvoiceNotification {
    InvoiceNotification::new("PAID")
        .with_payment_id(payment_id)
        .with_external_id(&external_id(order))
        .with_amount(order.total_amount.value())
        .with_payer_email("buyer@example.com")
        .with_payment_method("BANK_TRANSFER", "BCA")
}

pub fn expired(order: &Order, payment_id: &str) -> InvoiceNotification {
    InvoiceNotification::new("EXPIRED").with_payment_id(payment_id).with_external_id(&external_id(order))
}

pub async fn stock(db: &SqliteDatabase, id: ItemId) -> i64 {
    db.fetch_sellable_item(id).await.expect("Error fetching item").expect("Item does not exist").stock
}

pub async fn usage(db: &SqliteDatabase, voucher: &Voucher) -> i64 {
    db.fetch_voucher(voucher.id).await.expect("Error fetching voucher").expect("Voucher does not exist").usage_count
}
