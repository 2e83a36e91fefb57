//! Astro Payment Engine
//!
//! The Astro Payment Engine is the core of the reading storefront's payment pipeline. It is
//! provider-agnostic: webhooks from any supported payment provider are recorded, merged and
//! normalized here, and product fulfilment reacts to the resulting events.
//!
//! The library is divided into two main sections:
//! 1. Database management and control ([`mod@sqlite`]). You should never need to access the
//!    database directly. Instead, use the public API provided by the engine. The exception is the
//!    data types used in the database. These are defined in the `db_types` module and are public.
//! 2. The engine public API ([`mod@api`]). This provides the public-facing functionality of the
//!    pipeline: recording notifications, merging payment state, the product job state machine and
//!    the trigger schedule. Specific backends need to implement the traits in the [`mod@traits`]
//!    module in order to act as a storage backend.
//!
//! The engine also provides a set of events that can be subscribed to. These events are emitted
//! when certain actions occur within the pipeline, such as a payment's normalized status moving
//! to a new value. A simple Actor framework is used so that you can easily hook into these events
//! and perform custom actions.
pub mod api;
pub mod db_types;
pub mod events;
pub mod helpers;
pub mod normalize;
pub mod traits;

#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

pub use api::{
    jobs_api::{ProductJobApi, MAX_STORED_ERROR_LEN},
    payment_flow_api::{IngestOutcome, PaymentFlowApi},
    schedule_api::ScheduleApi,
};
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDatabase;
pub use traits::{
    EventManagement,
    JobApiError,
    JobGate,
    JobManagement,
    PaymentManagement,
    PaymentPipelineDatabase,
    PaymentPipelineError,
    RequestManagement,
    ScheduleApiError,
    ScheduleManagement,
};
