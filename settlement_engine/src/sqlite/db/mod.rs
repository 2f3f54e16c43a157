//! # SQLite Database methods
//!
//! This module contains "low-level" SQLite database interactions.
//!
//! All these interaction are maintained by simple functions (rather than stateful structs) that accept a
//! `&mut SqliteConnection` argument. Callers can obtain a connection from a pool,
//! or hand in an open session (`&mut **tx`) when the call must be part of a settlement unit of work.
//!
//! Writes with a `RETURNING` clause are always read with `fetch_all`. SQLite only finishes a statement, and commits its
//! implicit transaction, once every row has been stepped through; a statement left half-read holds the writer lock.
use std::{str::FromStr, time::Duration};

use log::info;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions},
    Error as SqlxError,
    SqlitePool,
};

pub mod checkout;
pub mod items;
pub mod line_items;
pub mod orders;
pub mod vouchers;

pub async fn new_pool(url: &str, max_connections: u32, busy_timeout: Duration) -> Result<SqlitePool, SqlxError> {
    info!("🗃️ Opening connection pool for {url} ({max_connections} connections, busy timeout {busy_timeout:?})");
    let options = SqliteConnectOptions::from_str(url)?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(busy_timeout);
    let pool = SqlitePoolOptions::new().max_connections(max_connections).connect_with(options).await?;
    Ok(pool)
}
