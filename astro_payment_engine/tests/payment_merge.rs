use astro_payment_engine::{
    db_types::{MaskedCustomer, NormalizedStatus, PaymentProvider, PaymentUpdate},
    normalize::normalize_status,
    PaymentManagement,
    SqliteDatabase,
};
use apg_common::MoneyMinor;
use serde_json::json;

use crate::support::prepare_env::{prepare_test_env, random_db_path, tear_down};

mod support;

async fn setup() -> SqliteDatabase {
    let url = random_db_path();
    prepare_test_env(&url).await;
    SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating database")
}

async fn upsert(db: &SqliteDatabase, update: &PaymentUpdate) -> astro_payment_engine::db_types::PaymentRecord {
    let normalized = normalize_status(update.provider, &update.status);
    db.upsert_payment(update, normalized).await.expect("Error upserting payment")
}

/// The approved notification (with customer data) arrives before the created notification
/// (without it). The later-arriving earlier event must not erase anything, but status always
/// follows the latest write.
#[tokio::test]
async fn out_of_order_updates_never_erase_fields() {
    let db = setup().await;

    let mut approved = PaymentUpdate::new("pay-1001", PaymentProvider::MercadoPago, "approved");
    approved.status_detail = Some("accredited".to_string());
    approved.customer =
        MaskedCustomer::from_raw(Some("Jane Doe"), Some("jane@example.com"), Some("123.456.789-09"), None, None);
    approved.amount = Some(MoneyMinor::from_major(45));
    approved.currency = Some("BRL".to_string());
    approved.external_reference = Some("77".to_string());
    approved.raw = json!({"id": "pay-1001", "status": "approved"});
    let stored = upsert(&db, &approved).await;
    assert_eq!(stored.normalized_status, NormalizedStatus::Approved);
    assert_eq!(stored.customer_email.as_deref(), Some("j***@e***.com"));

    let mut created = PaymentUpdate::new("pay-1001", PaymentProvider::MercadoPago, "pending");
    created.raw = json!({"id": "pay-1001", "status": "pending"});
    let stored = upsert(&db, &created).await;

    // Status reflects the latest assertion, even though it regressed.
    assert_eq!(stored.status, "pending");
    assert_eq!(stored.normalized_status, NormalizedStatus::Pending);
    assert_eq!(stored.status_detail, None, "status_detail always takes the incoming value");
    // Everything the earlier write had stays put.
    assert_eq!(stored.customer_email.as_deref(), Some("j***@e***.com"));
    assert_eq!(stored.customer_name.as_deref(), Some("Jane D."));
    assert_eq!(stored.amount, Some(MoneyMinor::from_major(45)));
    assert_eq!(stored.currency.as_deref(), Some("BRL"));
    assert_eq!(stored.external_reference.as_deref(), Some("77"));

    tear_down(&db).await;
}

#[tokio::test]
async fn upsert_is_keyed_on_payment_id() {
    let db = setup().await;

    let first = upsert(&db, &PaymentUpdate::new("pay-a", PaymentProvider::MercadoPago, "pending")).await;
    let second = upsert(&db, &PaymentUpdate::new("pay-b", PaymentProvider::MercadoPago, "pending")).await;
    assert_ne!(first.id, second.id);

    let again = upsert(&db, &PaymentUpdate::new("pay-a", PaymentProvider::MercadoPago, "approved")).await;
    assert_eq!(again.id, first.id);
    assert_eq!(again.normalized_status, NormalizedStatus::Approved);
    assert!(again.updated_at >= first.updated_at);

    tear_down(&db).await;
}

#[tokio::test]
async fn unknown_provider_status_degrades_to_updated() {
    let db = setup().await;

    let stored = upsert(&db, &PaymentUpdate::new("pay-odd", PaymentProvider::Stripe, "brand_new_status")).await;
    assert_eq!(stored.status, "brand_new_status");
    assert_eq!(stored.normalized_status, NormalizedStatus::Updated);

    tear_down(&db).await;
}
