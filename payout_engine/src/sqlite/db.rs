use std::env;

use log::info;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};

use super::SqliteDatabaseError;

const SQLITE_DB_URL: &str = "sqlite://data/payout_store.db";

pub fn db_url() -> String {
    let result = env::var("VPC_DATABASE_URL").unwrap_or_else(|_| {
        info!("VPC_DATABASE_URL is not set. Using the default.");
        SQLITE_DB_URL.to_string()
    });
    info!("Using database URL: {result}");
    result
}

pub async fn new_pool(url: &str, max_connections: u32) -> Result<SqlitePool, SqliteDatabaseError> {
    let pool = SqlitePoolOptions::new().max_connections(max_connections).connect(url).await?;
    Ok(pool)
}
