//! Product jobs: the work units that turn a paid (or stalled) reading request into outbound
//! calls, plus the event-bus wiring that starts them. The state machine itself (gate, attempts,
//! terminal rows) lives in the engine; this module supplies the work.
pub mod fulfillment;
pub mod handlers;
pub mod reminder;
pub mod retry;

pub use fulfillment::{build_chart_subjects, run_fulfillment_job, ChartPayload, CoercionError};
pub use handlers::{create_product_event_handlers, PRODUCT_EVENT_BUFFER_SIZE};
pub use reminder::run_reminder_job;
pub use retry::{call_with_retry, CallOutcome, RetryPolicy};
