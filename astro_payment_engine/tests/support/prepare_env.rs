use astro_payment_engine::SqliteDatabase;
use log::*;
use sqlx::{migrate, migrate::MigrateDatabase, Sqlite};

/// A unique database url under the workspace `data/` directory, so parallel tests never collide.
pub fn random_db_path() -> String {
    format!("sqlite://../data/test_store_{}", rand::random::<u64>())
}

/// Fresh database at `url` with every migration applied. Panics on failure: a test without its
/// schema cannot say anything useful.
pub async fn prepare_test_env(url: &str) {
    dotenvy::from_filename(".env.test").ok();
    let _ = env_logger::try_init();
    if let Err(e) = Sqlite::drop_database(url).await {
        warn!("🧪️ Could not drop old test database {url}: {e}");
    }
    Sqlite::create_database(url).await.expect("Could not create the test database");
    let db = SqliteDatabase::new_with_url(url, 5).await.expect("Could not connect to the test database");
    migrate!("./src/sqlite/migrations").run(db.pool()).await.expect("Could not apply migrations");
    debug!("🧪️ Test database ready at {url}");
}

pub async fn tear_down(db: &SqliteDatabase) {
    use astro_payment_engine::PaymentPipelineDatabase;
    db.pool().close().await;
    if let Err(e) = Sqlite::drop_database(db.url()).await {
        error!("🧪️ Failed to drop test database: {e}");
    }
}
