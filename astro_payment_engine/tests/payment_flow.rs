//! End-to-end engine flow: request, checkout, payment updates, snapshot and event publication.
use std::sync::{
    atomic::{AtomicI32, Ordering},
    Arc,
};

use astro_payment_engine::{
    db_types::{
        MaskedCustomer,
        NewCheckout,
        NewReadingRequest,
        NormalizedStatus,
        PaymentProvider,
        PaymentUpdate,
        ProductType,
    },
    events::{EventHandlers, EventHooks},
    PaymentFlowApi,
    RequestManagement,
    SqliteDatabase,
};
use futures_util::FutureExt;
use serde_json::json;
use tokio::time::{sleep, Duration};

use crate::support::prepare_env::{prepare_test_env, random_db_path, tear_down};

mod support;

fn new_request(product_type: ProductType) -> NewReadingRequest {
    NewReadingRequest {
        product_type,
        customer_name: "Jane Doe".to_string(),
        customer_email: "jane@example.com".to_string(),
        birth_date: "1990-04-12".to_string(),
        birth_time: "08:30".to_string(),
        birth_place: "São Paulo, Brazil".to_string(),
        latitude: -23.5505,
        longitude: -46.6333,
        utc_offset_hours: -3.0,
        partner_name: None,
        partner_birth_date: None,
        partner_birth_time: None,
        partner_birth_place: None,
        partner_latitude: None,
        partner_longitude: None,
    }
}

#[derive(Default, Clone)]
struct HookCalled {
    called: Arc<AtomicI32>,
}

impl HookCalled {
    pub fn called(&self) {
        let _ = self.called.fetch_add(1, Ordering::Relaxed);
    }

    pub fn count(&self) -> i32 {
        self.called.load(Ordering::Relaxed)
    }
}

async fn setup_with_hooks(hooks: EventHooks) -> (SqliteDatabase, PaymentFlowApi<SqliteDatabase>) {
    let url = random_db_path();
    prepare_test_env(&url).await;
    let db = SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating database");
    let handlers = EventHandlers::new(10, hooks);
    let producers = handlers.producers();
    handlers.start_handlers().await;
    (db.clone(), PaymentFlowApi::new(db, producers))
}

#[tokio::test]
async fn status_transition_publishes_exactly_once() {
    let event = HookCalled::default();
    let event_copy = event.clone();
    let mut hooks = EventHooks::default();
    hooks.on_status_changed(move |ev| {
        let counter = event_copy.clone();
        async move {
            assert_eq!(ev.request_id, 1);
            counter.called();
        }
        .boxed()
    });
    let (db, api) = setup_with_hooks(hooks).await;

    let request = api.insert_reading_request(new_request(ProductType::BirthChart)).await.unwrap();
    assert_eq!(request.id, 1);

    let mut update = PaymentUpdate::new("pay-500", PaymentProvider::MercadoPago, "pending");
    update.external_reference = Some("1".to_string());
    update.raw = json!({"id": "pay-500"});

    // First delivery transitions None -> PENDING.
    let change = api.apply_payment_update(update.clone()).await.unwrap().expect("Snapshot should be written");
    assert!(change.is_transition());

    // A redelivered pending assertion refreshes bookkeeping without publishing.
    let change = api.apply_payment_update(update.clone()).await.unwrap().expect("Snapshot should be written");
    assert!(!change.is_transition());

    // And the approval transitions PENDING -> APPROVED.
    update.status = "approved".to_string();
    let change = api.apply_payment_update(update).await.unwrap().expect("Snapshot should be written");
    assert!(change.is_transition());
    assert_eq!(change.new_status, NormalizedStatus::Approved);

    // Handlers run on a spawned task; give the channel a beat to drain.
    sleep(Duration::from_millis(50)).await;
    assert_eq!(event.count(), 2, "two transitions, three deliveries, exactly two events");

    let snapshot = db.fetch_reading_request(1).await.unwrap().unwrap();
    assert_eq!(snapshot.payment_status, Some(NormalizedStatus::Approved));
    assert_eq!(snapshot.payment_id.as_deref(), Some("pay-500"));

    tear_down(&db).await;
}

#[tokio::test]
async fn payment_resolves_request_through_checkout_when_reference_is_missing() {
    let (db, api) = setup_with_hooks(EventHooks::default()).await;

    let request = api.insert_reading_request(new_request(ProductType::RelationshipReading)).await.unwrap();
    let checkout = NewCheckout {
        checkout_id: "pref-abc".to_string(),
        request_id: request.id,
        provider: PaymentProvider::MercadoPago,
        status: "created".to_string(),
        link: Some("https://www.mercadopago.com/init/pref-abc".to_string()),
        customer: json!({"email": "j***@e***.com"}),
        raw: json!({"id": "pref-abc"}),
    };
    api.process_new_checkout(checkout).await.unwrap();

    let snapshot = db.fetch_reading_request(request.id).await.unwrap().unwrap();
    assert_eq!(snapshot.checkout_id.as_deref(), Some("pref-abc"));
    assert_eq!(snapshot.payment_link.as_deref(), Some("https://www.mercadopago.com/init/pref-abc"));

    // No external reference on the webhook; the checkout id is the only link back.
    let mut update = PaymentUpdate::new("pay-900", PaymentProvider::MercadoPago, "approved");
    update.checkout_id = Some("pref-abc".to_string());
    update.customer = MaskedCustomer::from_raw(None, Some("jane@example.com"), None, None, None);
    let change = api.apply_payment_update(update).await.unwrap().expect("Checkout fallback should resolve");
    assert_eq!(change.request_id, request.id);
    assert_eq!(change.new_status, NormalizedStatus::Approved);

    tear_down(&db).await;
}

#[tokio::test]
async fn orphan_payment_is_stored_but_writes_no_snapshot() {
    let (db, api) = setup_with_hooks(EventHooks::default()).await;

    let update = PaymentUpdate::new("pay-orphan", PaymentProvider::Stripe, "succeeded");
    let change = api.apply_payment_update(update).await.unwrap();
    assert!(change.is_none());
    assert!(api.fetch_payment("pay-orphan").await.unwrap().is_some(), "the payment row itself is kept");

    tear_down(&db).await;
}
