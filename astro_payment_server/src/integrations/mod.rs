//! Provider-specific webhook plumbing: envelope parsing and conversion of provider payloads into
//! the pipeline's payment updates.

pub mod mercado_pago;
pub mod stripe;
