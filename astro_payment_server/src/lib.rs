//! # Astro Payment Gateway server
//! This module hosts the HTTP server for the astrology-reading storefront's payment pipeline. It
//! is responsible for:
//! Listening for incoming webhook notifications from Mercado Pago and Stripe.
//! Verifying webhook signatures (soft-fail) and recording every delivery exactly once.
//! Merging provider payment assertions into the stored request snapshots.
//! Running the product jobs (chart fulfillment, payment reminders) that react to payment events.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more
//! information.
//!
//! ## Routes
//! The server exposes the following routes:
//! * `/health`: A health check route that returns a 200 OK response.
//! * `/wh/mercadopago` and `/wh/mercadopago/{path_secret}`: Mercado Pago webhook notifications.
//! * `/wh/stripe` and `/wh/stripe/{path_secret}`: Stripe webhook events.
//! * `/api/requests`: Reading-request intake.
//! * `/api/requests/{id}/checkout`: Checkout creation for a stored request.
pub mod cli;
pub mod config;
pub mod data_objects;
pub mod errors;

pub mod integrations;
pub mod jobs;
pub mod routes;
pub mod scheduler;
pub mod server;
pub mod signature;
pub mod webhook_routes;

#[cfg(test)]
mod endpoint_tests;
