//! End-to-end tests for the HTTP surface.
//!
//! Each test spins up the full actix service with a throwaway Sqlite database behind it, wired
//! the same way `create_server_instance` wires production, and drives it over HTTP. Signature
//! material comes from `signature::test_signing`, never from real provider dashboards.
pub mod helpers;
mod mercado_pago;
mod requests;
mod stripe;
