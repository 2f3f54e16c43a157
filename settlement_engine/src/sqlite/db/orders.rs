use log::{debug, trace};
use sqlx::{sqlite::SqliteRow, FromRow, QueryBuilder, SqliteConnection};

use crate::{
    db_types::{ItemId, Money, Order, OrderId, OrderStatusType, OrderVoucher, SettlementUpdate, VoucherId},
    traits::SettlementStoreError,
};

/// Inserts a new order with the given (already discounted) total. This is not atomic. You can embed this call
/// inside a transaction if you need to ensure atomicity, and pass `&mut *tx` as the connection argument.
pub async fn insert_order(
    user_id: i64,
    total_amount: Money,
    primary_item_id: Option<ItemId>,
    conn: &mut SqliteConnection,
) -> Result<Order, SettlementStoreError> {
    let orders: Vec<Order> = sqlx::query_as(
        r#"
            INSERT INTO orders (user_id, total_amount, primary_item_id)
            VALUES ($1, $2, $3)
            RETURNING *;
        "#,
    )
    .bind(user_id)
    .bind(total_amount)
    .bind(primary_item_id)
    .fetch_all(conn)
    .await?;
    let order = orders.into_iter().next().ok_or(sqlx::Error::RowNotFound)?;
    debug!("🗃️ Order {} inserted for user {user_id} with total {total_amount}", order.id);
    Ok(order)
}

/// Takes the order row lock by issuing a no-op write against it. In SQLite this acquires the database writer lock,
/// which is held until the surrounding transaction ends.
pub async fn lock_order(id: OrderId, conn: &mut SqliteConnection) -> Result<Option<Order>, sqlx::Error> {
    trace!("🗃️ Locking order {id}");
    let orders: Vec<Order> = sqlx::query_as("UPDATE orders SET updated_at = updated_at WHERE id = $1 RETURNING *")
        .bind(id)
        .fetch_all(conn)
        .await?;
    Ok(orders.into_iter().next())
}

pub async fn fetch_order_by_id(id: OrderId, conn: &mut SqliteConnection) -> Result<Option<Order>, sqlx::Error> {
    let order = sqlx::query_as("SELECT * FROM orders WHERE id = $1").bind(id).fetch_optional(conn).await?;
    Ok(order)
}

/// Returns the most recent order carrying the given gateway payment id.
pub async fn fetch_order_by_payment_id(
    payment_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let order = sqlx::query_as("SELECT * FROM orders WHERE payment_id = $1 ORDER BY id DESC LIMIT 1")
        .bind(payment_id)
        .fetch_optional(conn)
        .await?;
    Ok(order)
}

/// Orders still waiting on a payment outcome, newest first.
pub async fn fetch_unsettled_orders(limit: usize, conn: &mut SqliteConnection) -> Result<Vec<Order>, sqlx::Error> {
    #[allow(clippy::cast_possible_wrap)]
    let limit = limit as i64;
    let orders = sqlx::query_as(
        r#"
            SELECT * FROM orders
            WHERE status IN ('created', 'awaiting_payment')
            ORDER BY created_at DESC, id DESC
            LIMIT $1
        "#,
    )
    .bind(limit)
    .fetch_all(conn)
    .await?;
    Ok(orders)
}

/// Writes the settlement fields onto the order. The payment id is never overwritten once set. Optional payment details
/// that are `None` leave the stored value untouched.
pub(crate) async fn update_settlement(
    id: OrderId,
    update: SettlementUpdate,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, SettlementStoreError> {
    let mut builder = QueryBuilder::new("UPDATE orders SET updated_at = CURRENT_TIMESTAMP, ");
    let mut set_clause = builder.separated(", ");
    set_clause.push("status = ");
    set_clause.push_bind_unseparated(update.new_status.to_string());
    if let Some(payment_id) = update.payment_id {
        set_clause.push("payment_id = COALESCE(payment_id, ");
        set_clause.push_bind_unseparated(payment_id);
        set_clause.push_unseparated(")");
    }
    if let Some(method) = update.payment_method {
        set_clause.push("payment_method = ");
        set_clause.push_bind_unseparated(method);
    }
    if let Some(channel) = update.payment_channel {
        set_clause.push("payment_channel = ");
        set_clause.push_bind_unseparated(channel);
    }
    if let Some(email) = update.payer_email {
        set_clause.push("payer_email = ");
        set_clause.push_bind_unseparated(email);
    }
    if let Some(completed_at) = update.completed_at {
        set_clause.push("completed_at = ");
        set_clause.push_bind_unseparated(completed_at);
    }
    builder.push(" WHERE id = ");
    builder.push_bind(id);
    builder.push(" RETURNING *");
    trace!("🗃️ Executing query: {}", builder.sql());
    let rows: Vec<SqliteRow> = builder.build().fetch_all(conn).await?;
    let res = rows.first().map(Order::from_row).transpose()?;
    trace!("🗃️ Result of update_settlement: {res:?}");
    Ok(res)
}

/// Moves a non-terminal order to `voucher_limit_failed`. Returns `None` if the order does not exist or has already
/// reached a terminal status.
pub async fn mark_voucher_limit_failed(id: OrderId, conn: &mut SqliteConnection) -> Result<Option<Order>, sqlx::Error> {
    let orders: Vec<Order> = sqlx::query_as(
        r#"
            UPDATE orders SET status = 'voucher_limit_failed', updated_at = CURRENT_TIMESTAMP
            WHERE id = $1 AND status IN ('created', 'awaiting_payment')
            RETURNING *
        "#,
    )
    .bind(id)
    .fetch_all(conn)
    .await?;
    Ok(orders.into_iter().next())
}

/// Records the correlation string and gateway payment id, and moves the order from `created` to `awaiting_payment`.
pub async fn initiate_payment(
    id: OrderId,
    external_id: &str,
    payment_id: Option<&str>,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let orders: Vec<Order> = sqlx::query_as(
        r#"
            UPDATE orders SET
                status = $1,
                external_id = $2,
                payment_id = COALESCE($3, payment_id),
                updated_at = CURRENT_TIMESTAMP
            WHERE id = $4 AND status = 'created'
            RETURNING *
        "#,
    )
    .bind(OrderStatusType::AwaitingPayment.to_string())
    .bind(external_id)
    .bind(payment_id)
    .bind(id)
    .fetch_all(conn)
    .await?;
    Ok(orders.into_iter().next())
}

pub async fn insert_order_voucher(
    order_id: OrderId,
    voucher_id: VoucherId,
    discount: Money,
    conn: &mut SqliteConnection,
) -> Result<OrderVoucher, sqlx::Error> {
    let links: Vec<OrderVoucher> = sqlx::query_as(
        "INSERT INTO order_vouchers (order_id, voucher_id, discount_amount) VALUES ($1, $2, $3) RETURNING *",
    )
    .bind(order_id)
    .bind(voucher_id)
    .bind(discount)
    .fetch_all(conn)
    .await?;
    links.into_iter().next().ok_or(sqlx::Error::RowNotFound)
}

pub async fn fetch_order_voucher(
    order_id: OrderId,
    conn: &mut SqliteConnection,
) -> Result<Option<OrderVoucher>, sqlx::Error> {
    let link = sqlx::query_as("SELECT * FROM order_vouchers WHERE order_id = $1")
        .bind(order_id)
        .fetch_optional(conn)
        .await?;
    Ok(link)
}
