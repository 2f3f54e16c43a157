use log::{debug, trace};
use sqlx::SqliteConnection;

use crate::db_types::{NewVoucher, Voucher, VoucherId};

pub async fn insert_voucher(voucher: NewVoucher, conn: &mut SqliteConnection) -> Result<Voucher, sqlx::Error> {
    let vouchers: Vec<Voucher> = sqlx::query_as(
        r#"
            INSERT INTO vouchers (code, discount_type, discount_value, usage_limit)
            VALUES ($1, $2, $3, $4)
            RETURNING *
        "#,
    )
    .bind(voucher.code)
    .bind(voucher.discount_type)
    .bind(voucher.discount_value)
    .bind(voucher.usage_limit)
    .fetch_all(conn)
    .await?;
    let voucher = vouchers.into_iter().next().ok_or(sqlx::Error::RowNotFound)?;
    debug!("🎟️ Voucher {} ({}) created. Usage limit: {:?}", voucher.id, voucher.code, voucher.usage_limit);
    Ok(voucher)
}

pub async fn fetch_voucher_by_code(code: &str, conn: &mut SqliteConnection) -> Result<Option<Voucher>, sqlx::Error> {
    let voucher = sqlx::query_as("SELECT * FROM vouchers WHERE code = $1").bind(code).fetch_optional(conn).await?;
    Ok(voucher)
}

pub async fn fetch_voucher(id: VoucherId, conn: &mut SqliteConnection) -> Result<Option<Voucher>, sqlx::Error> {
    let voucher = sqlx::query_as("SELECT * FROM vouchers WHERE id = $1").bind(id).fetch_optional(conn).await?;
    Ok(voucher)
}

/// No-op write that takes the writer lock for the voucher row.
pub async fn lock_voucher(id: VoucherId, conn: &mut SqliteConnection) -> Result<Option<Voucher>, sqlx::Error> {
    trace!("🎟️ Locking voucher {id}");
    let vouchers: Vec<Voucher> = sqlx::query_as("UPDATE vouchers SET id = id WHERE id = $1 RETURNING *")
        .bind(id)
        .fetch_all(conn)
        .await?;
    Ok(vouchers.into_iter().next())
}

/// Conditional increment. The usage counter never passes the ceiling.
pub async fn increment_usage(id: VoucherId, conn: &mut SqliteConnection) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
            UPDATE vouchers SET usage_count = usage_count + 1, updated_at = CURRENT_TIMESTAMP
            WHERE id = $1 AND (usage_limit IS NULL OR usage_count < usage_limit)
        "#,
    )
    .bind(id)
    .execute(conn)
    .await?;
    let incremented = result.rows_affected() == 1;
    trace!("🎟️ increment_usage({id}) -> {incremented}");
    Ok(incremented)
}
