//! Low-level SQLite query functions.
//!
//! Every table gets a submodule of free async functions over `&mut SqliteConnection`, so the same
//! query code runs against a pooled connection or inside a transaction, whichever the caller
//! holds. The stateful wrapper lives one level up in [`super::sqlite_impl`].
use std::env;

use log::info;
use sqlx::{sqlite::SqlitePoolOptions, Error as SqlxError, SqlitePool};

pub mod checkouts;
pub mod product_jobs;
pub mod provider_payments;
pub mod requests;
pub mod schedules;
pub mod webhook_events;

const DEFAULT_DB_URL: &str = "sqlite://data/astro_store.db";

pub fn db_url() -> String {
    let url = match env::var("APG_DATABASE_URL") {
        Ok(url) => url,
        Err(_) => {
            info!("APG_DATABASE_URL is not set. Falling back to {DEFAULT_DB_URL}");
            DEFAULT_DB_URL.to_string()
        },
    };
    info!("Using database URL: {url}");
    url
}

pub async fn new_pool(url: &str, max_connections: u32) -> Result<SqlitePool, SqlxError> {
    SqlitePoolOptions::new().max_connections(max_connections).connect(url).await
}
