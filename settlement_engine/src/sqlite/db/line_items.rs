use log::trace;
use sqlx::{QueryBuilder, SqliteConnection};

use crate::db_types::{LineItem, NewLineItem, OrderId};

/// Adds an item to the user's working selection. The unit price is captured from the sellable item at this point.
pub async fn insert_line_item(line: NewLineItem, conn: &mut SqliteConnection) -> Result<Option<LineItem>, sqlx::Error> {
    let lines: Vec<LineItem> = sqlx::query_as(
        r#"
            INSERT INTO line_items (user_id, item_id, quantity, unit_price)
            SELECT $1, id, $2, unit_price FROM sellable_items WHERE id = $3
            RETURNING *
        "#,
    )
    .bind(line.user_id)
    .bind(line.quantity)
    .bind(line.item_id)
    .fetch_all(conn)
    .await?;
    Ok(lines.into_iter().next())
}

pub async fn fetch_linked(order_id: OrderId, conn: &mut SqliteConnection) -> Result<Vec<LineItem>, sqlx::Error> {
    let lines = sqlx::query_as("SELECT * FROM line_items WHERE order_id = $1 ORDER BY id")
        .bind(order_id)
        .fetch_all(conn)
        .await?;
    Ok(lines)
}

pub async fn fetch_unlinked(user_id: i64, conn: &mut SqliteConnection) -> Result<Vec<LineItem>, sqlx::Error> {
    let lines = sqlx::query_as("SELECT * FROM line_items WHERE user_id = $1 AND order_id IS NULL ORDER BY id")
        .bind(user_id)
        .fetch_all(conn)
        .await?;
    Ok(lines)
}

/// Links the given line items to the order. Lines that already belong to an order are skipped.
pub async fn link_to_order(order_id: OrderId, ids: &[i64], conn: &mut SqliteConnection) -> Result<u64, sqlx::Error> {
    if ids.is_empty() {
        return Ok(0);
    }
    let mut builder = QueryBuilder::new("UPDATE line_items SET order_id = ");
    builder.push_bind(order_id);
    builder.push(" WHERE order_id IS NULL AND id IN (");
    let mut in_clause = builder.separated(", ");
    for id in ids {
        in_clause.push_bind(*id);
    }
    builder.push(")");
    trace!("🗃️ Executing query: {}", builder.sql());
    let result = builder.build().execute(conn).await?;
    Ok(result.rows_affected())
}

/// Links every unlinked line in the user's selection to the order.
pub async fn link_selection(order_id: OrderId, user_id: i64, conn: &mut SqliteConnection) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("UPDATE line_items SET order_id = $1 WHERE user_id = $2 AND order_id IS NULL")
        .bind(order_id)
        .bind(user_id)
        .execute(conn)
        .await?;
    Ok(result.rows_affected())
}
