//! # Astro payment engine public API
//!
//! The `api` module exposes the programmatic API for the payment engine. The API is modular, so
//! that clients can pick and choose the functionality they want, or run different parts (e.g.
//! webhook ingestion and the scheduler) on different machines.
//!
//! * [`payment_flow_api`] is the primary API for recording webhook notifications, merging payment
//!   state and keeping the reading request snapshot current.
//! * [`jobs_api`] wraps the product job state machine and its idempotency gate.
//! * [`schedule_api`] manages delayed triggers for the scheduler loop.
//!
//! # API usage
//!
//! The pattern for using all the APIs is the same. An API instance is created by supplying a
//! database backend that implements the specific backend traits required by the API.
//!
//! ```rust,ignore
//! use astro_payment_engine::{ProductJobApi, SqliteDatabase};
//! let db = SqliteDatabase::new_with_url(...).await?;
//! // SqliteDatabase implements JobManagement
//! let api = ProductJobApi::new(db);
//! let gate = api.start(request_id, product_type, trigger_status).await?;
//! ```

pub mod jobs_api;
pub mod payment_flow_api;
pub mod schedule_api;
