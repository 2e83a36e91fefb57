//! Event uid derivation.
//!
//! The event store dedupes on `event_uid`, so the uid must be stable across provider redeliveries
//! of the same notification. Resolution order: the provider's own envelope id (providers keep it
//! stable across retries), then the correlation header, then a BLAKE2 hash of the raw body. The
//! provider tag prefixes every uid so ids from different providers can never collide.

use blake2::{Blake2b512, Digest};

use crate::db_types::PaymentProvider;

pub fn derive_event_uid(
    provider: PaymentProvider,
    envelope_id: Option<&str>,
    correlation_id: Option<&str>,
    body: &[u8],
) -> String {
    let tag = provider.as_tag();
    if let Some(id) = envelope_id.map(str::trim).filter(|s| !s.is_empty()) {
        return format!("{tag}:{id}");
    }
    if let Some(id) = correlation_id.map(str::trim).filter(|s| !s.is_empty()) {
        return format!("{tag}:req:{id}");
    }
    let digest = Blake2b512::digest(body);
    format!("{tag}:b2:{}", hex::encode(&digest[..16]))
}
