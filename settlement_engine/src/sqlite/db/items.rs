use log::{debug, trace};
use sqlx::SqliteConnection;

use crate::db_types::{ItemId, NewSellableItem, SellableItem};

pub async fn insert_item(item: NewSellableItem, conn: &mut SqliteConnection) -> Result<SellableItem, sqlx::Error> {
    let items: Vec<SellableItem> =
        sqlx::query_as("INSERT INTO sellable_items (name, unit_price, stock) VALUES ($1, $2, $3) RETURNING *")
            .bind(item.name)
            .bind(item.unit_price)
            .bind(item.stock)
            .fetch_all(conn)
            .await?;
    let item = items.into_iter().next().ok_or(sqlx::Error::RowNotFound)?;
    debug!("📦️ Item {} ({}) added with {} units in stock", item.id, item.name, item.stock);
    Ok(item)
}

pub async fn fetch_item(id: ItemId, conn: &mut SqliteConnection) -> Result<Option<SellableItem>, sqlx::Error> {
    let item = sqlx::query_as("SELECT * FROM sellable_items WHERE id = $1").bind(id).fetch_optional(conn).await?;
    Ok(item)
}

/// Conditional decrement. The `stock >= $1` guard and the `CHECK (stock >= 0)` constraint mean stock can never go
/// negative, regardless of what the caller read earlier.
///
/// Returns `true` if exactly one row was updated.
pub async fn decrement_stock(id: ItemId, quantity: i64, conn: &mut SqliteConnection) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
            UPDATE sellable_items SET stock = stock - $1, updated_at = CURRENT_TIMESTAMP
            WHERE id = $2 AND stock >= $1
        "#,
    )
    .bind(quantity)
    .bind(id)
    .execute(conn)
    .await?;
    let decremented = result.rows_affected() == 1;
    trace!("📦️ decrement_stock({id}, {quantity}) -> {decremented}");
    Ok(decremented)
}
