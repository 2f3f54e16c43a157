use sqlx::SqliteConnection;

use crate::db_types::{CheckoutLine, CheckoutRecord, NewCheckoutRecord, OrderId};

pub async fn insert_checkout_record(
    record: NewCheckoutRecord,
    conn: &mut SqliteConnection,
) -> Result<CheckoutRecord, sqlx::Error> {
    let records: Vec<CheckoutRecord> = sqlx::query_as(
        r#"
            INSERT INTO checkout_records
                (order_id, item_id, quantity, recipient_name, recipient_phone, shipping_address)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
        "#,
    )
    .bind(record.order_id)
    .bind(record.item_id)
    .bind(record.quantity)
    .bind(record.recipient_name)
    .bind(record.recipient_phone)
    .bind(record.shipping_address)
    .fetch_all(conn)
    .await?;
    records.into_iter().next().ok_or(sqlx::Error::RowNotFound)
}

/// The checkout record for the order together with the current unit price of the referenced item.
pub async fn fetch_checkout_line(
    order_id: OrderId,
    conn: &mut SqliteConnection,
) -> Result<Option<CheckoutLine>, sqlx::Error> {
    let line = sqlx::query_as(
        r#"
            SELECT c.order_id, c.item_id, c.quantity, i.unit_price
            FROM checkout_records c JOIN sellable_items i ON i.id = c.item_id
            WHERE c.order_id = $1
        "#,
    )
    .bind(order_id)
    .fetch_optional(conn)
    .await?;
    Ok(line)
}
