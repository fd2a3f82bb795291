pub mod db;
mod sqlite_impl;

use std::env;

use log::info;
pub use sqlite_impl::SqliteDatabase;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};

use crate::traits::SettlementError;

const SQLITE_DB_URL: &str = "sqlite://data/group_buy.db";

pub fn db_url() -> String {
    let result = env::var("GBE_DATABASE_URL").unwrap_or_else(|_| {
        info!("GBE_DATABASE_URL is not set. Using the default.");
        SQLITE_DB_URL.to_string()
    });
    info!("Using database URL: {result}");
    result
}

pub async fn new_pool(url: &str, max_connections: u32) -> Result<SqlitePool, SettlementError> {
    let pool = SqlitePoolOptions::new().max_connections(max_connections).connect(url).await?;
    Ok(pool)
}
