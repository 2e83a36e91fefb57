//! Interface contracts for payment pipeline database backends.
//!
//! The webhook pipeline is written against these traits rather than a concrete database so that
//! the processing rules (dedupe, merge semantics, idempotency gates) can be tested and reasoned
//! about independently of storage.
//!
//! * [`EventManagement`] is the append-only notification log with exactly-once recording.
//! * [`PaymentManagement`] maintains the consolidated per-payment view and checkout records.
//! * [`RequestManagement`] owns the reading request rows and their embedded payment snapshot.
//! * [`JobManagement`] records product job attempts and enforces the SUCCEEDED idempotency gate.
//! * [`ScheduleManagement`] stores delayed triggers with monotonic state transitions.
//!
//! [`PaymentPipelineDatabase`] bundles the first three; it is what the webhook flow requires.
mod data_objects;
mod jobs;
mod pipeline;
mod schedules;

pub use data_objects::JobGate;
pub use jobs::{JobApiError, JobManagement};
pub use pipeline::{
    EventManagement,
    PaymentManagement,
    PaymentPipelineDatabase,
    PaymentPipelineError,
    RequestManagement,
};
pub use schedules::{ScheduleApiError, ScheduleManagement};
