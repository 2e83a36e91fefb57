use log::*;
use sqlx::{migrate, migrate::MigrateDatabase, Sqlite};

use crate::SqliteDatabase;

/// A unique database url under the workspace `data/` directory. The relative path resolves from
/// any member crate, so server tests can share the engine's fixtures.
pub fn random_db_path() -> String {
    format!("sqlite://../data/test_store_{}", rand::random::<u64>())
}

/// Drops any leftover database at `url`, creates a fresh one and applies every migration. Panics
/// on failure: a test without its schema cannot say anything useful.
pub async fn prepare_test_env(url: &str) {
    dotenvy::from_filename(".env.test").ok();
    let _ = env_logger::try_init();
    recreate_database(url).await;
    apply_migrations(url).await;
    debug!("🧪️ Test database ready at {url}");
}

async fn recreate_database(url: &str) {
    if let Err(e) = Sqlite::drop_database(url).await {
        warn!("🧪️ Could not drop old test database {url}: {e}");
    }
    Sqlite::create_database(url).await.expect("Could not create the test database");
}

async fn apply_migrations(url: &str) {
    let db = SqliteDatabase::new_with_url(url, 5).await.expect("Could not connect to the test database");
    migrate!("./src/sqlite/migrations").run(db.pool()).await.expect("Could not apply migrations");
}
