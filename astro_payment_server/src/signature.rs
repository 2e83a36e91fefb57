//! Webhook signature verification.
//!
//! Verification never blocks ingestion. Every check folds into a [`VerifyVerdict`] that rides
//! alongside the notification: a forged or stale delivery is recorded and flagged, not dropped,
//! because the stored event log is the audit trail and providers retry aggressively on anything
//! but a 200. Each provider gets one verifier instance for the lifetime of the server, owning a
//! replay cache and a rate-limited audit writer.

use std::{
    collections::HashMap,
    fmt::{self, Display},
    sync::Mutex,
};

use apg_common::Secret;
use astro_payment_engine::db_types::PaymentProvider;
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use log::*;
use regex::Regex;
use serde_json::Value;
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::config::WebhookConfig;

type HmacSha256 = Hmac<Sha256>;

/// Upper bound on entries held by each verifier-owned cache.
const TTL_CACHE_CAP: usize = 4096;
/// Timestamps below this magnitude are second-resolution; at or above, millisecond-resolution.
const MILLISECOND_THRESHOLD: i64 = 1_000_000_000_000;

//-----------------------------------------------  VerifyVerdict  ------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VerdictReason {
    MissingSecret,
    MissingSignature,
    MalformedSignature,
    NoResourceId,
    SignatureMismatch,
    StaleTimestamp,
    SuspectedReplay,
    PathSecretMismatch,
}

impl Display for VerdictReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::MissingSecret => "no webhook secret configured",
            Self::MissingSignature => "signature header missing",
            Self::MalformedSignature => "signature header malformed",
            Self::NoResourceId => "no resource id in notification body",
            Self::SignatureMismatch => "signature mismatch",
            Self::StaleTimestamp => "stale timestamp",
            Self::SuspectedReplay => "suspected replay",
            Self::PathSecretMismatch => "path secret mismatch",
        };
        f.write_str(s)
    }
}

/// The outcome of verifying one inbound notification. The verdict travels with the notification
/// through the pipeline; it never aborts processing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerifyVerdict {
    pub path_secret_ok: bool,
    pub signature_ok: bool,
    pub fresh: bool,
    pub duplicate: bool,
    /// The most significant problem found, if any. Signature problems outrank staleness, which
    /// outranks replays, which outrank a path-secret mismatch.
    pub reason: Option<VerdictReason>,
}

impl VerifyVerdict {
    pub fn clean() -> Self {
        Self { path_secret_ok: true, signature_ok: true, fresh: true, duplicate: false, reason: None }
    }

    pub fn is_clean(&self) -> bool {
        self.path_secret_ok && self.signature_ok && self.fresh && !self.duplicate
    }
}

impl Display for VerifyVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.reason {
            None => f.write_str("verified"),
            Some(reason) => write!(f, "flagged ({reason})"),
        }
    }
}

//----------------------------------------------  SignatureHeader  -----------------------------------------------------

/// A parsed provider signature header: comma-separated `k=v` fields carrying a timestamp and one
/// or more hex HMAC digests under `v1`. Unknown keys are ignored so providers can add fields
/// without breaking verification.
#[derive(Debug, Clone)]
pub struct SignatureHeader {
    /// The timestamp exactly as it appeared in the header. Manifests quote it verbatim, so it
    /// must not be re-rendered from the parsed value.
    pub timestamp_raw: String,
    /// The timestamp normalized to milliseconds since the epoch.
    pub timestamp_ms: i64,
    /// All digests supplied under `v1`. More than one can appear during secret rotation; a match
    /// against any of them counts. Never empty.
    pub signatures: Vec<Vec<u8>>,
}

impl SignatureHeader {
    /// Parses a header using `ts_key` as the timestamp field name (`ts` for Mercado Pago, `t` for
    /// Stripe). Returns `None` when the timestamp or every digest is missing or unusable.
    pub fn parse(header: &str, ts_key: &str) -> Option<Self> {
        let mut timestamp_raw = None;
        let mut signatures = Vec::new();
        for field in header.split(',') {
            let (key, value) = match field.split_once('=') {
                Some((key, value)) => (key.trim(), value.trim()),
                None => continue,
            };
            if key == ts_key {
                timestamp_raw = Some(value.to_string());
            } else if key == "v1" {
                if let Ok(sig) = hex::decode(value) {
                    signatures.push(sig);
                }
            }
        }
        let timestamp_raw = timestamp_raw?;
        let ts = timestamp_raw.parse::<i64>().ok()?;
        if signatures.is_empty() {
            return None;
        }
        Some(Self { timestamp_ms: normalize_to_millis(ts), timestamp_raw, signatures })
    }
}

fn normalize_to_millis(ts: i64) -> i64 {
    if ts < MILLISECOND_THRESHOLD {
        ts.saturating_mul(1000)
    } else {
        ts
    }
}

/// Fresh means the signed timestamp is no older than the tolerance window. The boundary value
/// itself is fresh, and timestamps from clocks running ahead of ours are fresh too.
fn is_fresh(timestamp_ms: i64, tolerance: Duration, now: DateTime<Utc>) -> bool {
    now.timestamp_millis() - timestamp_ms <= tolerance.num_milliseconds()
}

/// Pulls the provider's resource id out of a notification body. Ordered rules: a nested
/// `data.id`, then a top-level `id`, then the trailing numeric path segment of a `resource` URL.
pub fn extract_resource_id(body: &Value) -> Option<String> {
    if let Some(id) = body.pointer("/data/id").and_then(json_id_string) {
        return Some(id);
    }
    if let Some(id) = body.get("id").and_then(json_id_string) {
        return Some(id);
    }
    let resource = body.get("resource").and_then(|v| v.as_str())?;
    let re = Regex::new(r"/(\d+)/?$").ok()?;
    re.captures(resource).and_then(|c| c.get(1)).map(|m| m.as_str().to_string())
}

pub(crate) fn json_id_string(v: &Value) -> Option<String> {
    match v {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

//-------------------------------------------------  TtlCache  ---------------------------------------------------------

/// A bounded map of recently seen keys with TTL eviction, used for replay detection and for
/// rate-limiting audit lines. Per-process and advisory only; losing it on restart is acceptable.
pub struct TtlCache {
    ttl: Duration,
    cap: usize,
    entries: HashMap<String, DateTime<Utc>>,
}

impl TtlCache {
    pub fn new(ttl: Duration, cap: usize) -> Self {
        Self { ttl, cap, entries: HashMap::new() }
    }

    /// Records `key` at `now` and reports whether it was already present and unexpired. The
    /// first-seen time is kept on repeats, so one key cannot stay "fresh" forever by repeating.
    pub fn check_and_insert(&mut self, key: &str, now: DateTime<Utc>) -> bool {
        let ttl = self.ttl;
        self.entries.retain(|_, seen| now - *seen <= ttl);
        if self.entries.contains_key(key) {
            return true;
        }
        if self.entries.len() >= self.cap {
            let oldest = self.entries.iter().min_by_key(|(_, seen)| **seen).map(|(k, _)| k.clone());
            if let Some(oldest) = oldest {
                self.entries.remove(&oldest);
            }
        }
        self.entries.insert(key.to_string(), now);
        false
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

//-------------------------------------------------  AuditLog  ---------------------------------------------------------

/// Rate-limited audit writer: one warning per (correlation id, reason) pair per window. Webhook
/// providers redeliver flagged events on a tight loop, and a line per redelivery would drown the
/// log without adding information.
struct AuditLog {
    seen: Mutex<TtlCache>,
}

impl AuditLog {
    fn new(window: Duration) -> Self {
        Self { seen: Mutex::new(TtlCache::new(window, TTL_CACHE_CAP)) }
    }

    fn flag(&self, provider: PaymentProvider, correlation_id: Option<&str>, reason: VerdictReason) {
        let key = format!("{}:{}:{reason}", provider.as_tag(), correlation_id.unwrap_or("-"));
        let mut seen = self.seen.lock().unwrap_or_else(|p| p.into_inner());
        if !seen.check_and_insert(&key, Utc::now()) {
            warn!(
                "🚨️ {provider} webhook flagged: {reason}. Correlation id: {}",
                correlation_id.unwrap_or("none")
            );
        }
    }
}

//----------------------------------------------  ManifestVerifier  ----------------------------------------------------

/// Verifier for the HMAC-manifest scheme (`x-signature` header). The digest covers a canonical
/// manifest assembled from the resource id, the correlation header and the signed timestamp, not
/// the body itself.
pub struct ManifestVerifier {
    secret: Option<Secret<String>>,
    path_secret: Option<Secret<String>>,
    tolerance: Duration,
    replays: Mutex<TtlCache>,
    audit: AuditLog,
}

impl ManifestVerifier {
    pub fn new(config: &WebhookConfig) -> Self {
        Self {
            secret: config.secret.clone(),
            path_secret: config.path_secret.clone(),
            tolerance: config.tolerance,
            replays: Mutex::new(TtlCache::new(config.tolerance, TTL_CACHE_CAP)),
            audit: AuditLog::new(config.tolerance),
        }
    }

    pub fn verify(
        &self,
        body: Option<&Value>,
        signature_header: Option<&str>,
        correlation_id: Option<&str>,
        supplied_path_secret: Option<&str>,
    ) -> VerifyVerdict {
        let path_secret_ok = check_path_secret(self.path_secret.as_ref(), supplied_path_secret);
        // Replay detection keys on the correlation id. Providers keep it stable for a given
        // delivery and mint a new one per redelivery, so a repeat inside the window is suspect.
        let duplicate = match correlation_id {
            Some(cid) => {
                let mut replays = self.replays.lock().unwrap_or_else(|p| p.into_inner());
                replays.check_and_insert(cid, Utc::now())
            },
            None => false,
        };
        let (signature_ok, fresh, sig_reason) = self.check_signature(body, signature_header, correlation_id);
        let reason = sig_reason
            .or_else(|| duplicate.then_some(VerdictReason::SuspectedReplay))
            .or_else(|| (!path_secret_ok).then_some(VerdictReason::PathSecretMismatch));
        let verdict = VerifyVerdict { path_secret_ok, signature_ok, fresh, duplicate, reason };
        if let Some(reason) = verdict.reason {
            self.audit.flag(PaymentProvider::MercadoPago, correlation_id, reason);
        }
        verdict
    }

    fn check_signature(
        &self,
        body: Option<&Value>,
        signature_header: Option<&str>,
        correlation_id: Option<&str>,
    ) -> (bool, bool, Option<VerdictReason>) {
        let header = match signature_header {
            Some(h) => h,
            None => return (false, false, Some(VerdictReason::MissingSignature)),
        };
        let parsed = match SignatureHeader::parse(header, "ts") {
            Some(p) => p,
            None => return (false, false, Some(VerdictReason::MalformedSignature)),
        };
        let fresh = is_fresh(parsed.timestamp_ms, self.tolerance, Utc::now());
        let secret = match &self.secret {
            Some(s) => s,
            None => return (false, fresh, Some(VerdictReason::MissingSecret)),
        };
        let resource_id = match body.and_then(extract_resource_id) {
            Some(id) => id,
            None => return (false, fresh, Some(VerdictReason::NoResourceId)),
        };
        let manifest = build_manifest(&resource_id, correlation_id, &parsed.timestamp_raw);
        let expected = hmac_sha256(secret.reveal().as_bytes(), manifest.as_bytes());
        if !parsed.signatures.iter().any(|sig| constant_time_compare(&expected, sig)) {
            return (false, fresh, Some(VerdictReason::SignatureMismatch));
        }
        (true, fresh, (!fresh).then_some(VerdictReason::StaleTimestamp))
    }
}

/// Canonical manifest: `id:{resource_id};request-id:{correlation_id};ts:{ts};`. When the
/// correlation header is absent its section is dropped entirely, matching how providers sign.
fn build_manifest(resource_id: &str, correlation_id: Option<&str>, ts: &str) -> String {
    match correlation_id {
        Some(cid) => format!("id:{resource_id};request-id:{cid};ts:{ts};"),
        None => format!("id:{resource_id};ts:{ts};"),
    }
}

//--------------------------------------------  SignedPayloadVerifier  -------------------------------------------------

/// Verifier for the signed-payload scheme (`Stripe-Signature` header): HMAC-SHA256 over
/// `{t}.{body}`, any of the supplied `v1` digests may match.
pub struct SignedPayloadVerifier {
    secret: Option<Secret<String>>,
    path_secret: Option<Secret<String>>,
    tolerance: Duration,
    replays: Mutex<TtlCache>,
    audit: AuditLog,
}

impl SignedPayloadVerifier {
    pub fn new(config: &WebhookConfig) -> Self {
        Self {
            secret: config.secret.clone(),
            path_secret: config.path_secret.clone(),
            tolerance: config.tolerance,
            replays: Mutex::new(TtlCache::new(config.tolerance, TTL_CACHE_CAP)),
            audit: AuditLog::new(config.tolerance),
        }
    }

    pub fn verify(&self, body: &[u8], signature_header: Option<&str>, supplied_path_secret: Option<&str>) -> VerifyVerdict {
        let path_secret_ok = check_path_secret(self.path_secret.as_ref(), supplied_path_secret);
        let (signature_ok, fresh, duplicate, sig_reason) = self.check_signature(body, signature_header);
        let reason = sig_reason.or_else(|| (!path_secret_ok).then_some(VerdictReason::PathSecretMismatch));
        let verdict = VerifyVerdict { path_secret_ok, signature_ok, fresh, duplicate, reason };
        if let Some(reason) = verdict.reason {
            let correlation = signature_header.map(|h| h.chars().take(24).collect::<String>());
            self.audit.flag(PaymentProvider::Stripe, correlation.as_deref(), reason);
        }
        verdict
    }

    fn check_signature(&self, body: &[u8], signature_header: Option<&str>) -> (bool, bool, bool, Option<VerdictReason>) {
        let header = match signature_header {
            Some(h) => h,
            None => return (false, false, false, Some(VerdictReason::MissingSignature)),
        };
        let parsed = match SignatureHeader::parse(header, "t") {
            Some(p) => p,
            None => return (false, false, false, Some(VerdictReason::MalformedSignature)),
        };
        let fresh = is_fresh(parsed.timestamp_ms, self.tolerance, Utc::now());
        // A redelivery is re-signed with a new timestamp, so a byte-identical digest inside the
        // window means the same transmission was seen twice.
        let replay_key = parsed.signatures.first().map(hex::encode).unwrap_or_default();
        let duplicate = {
            let mut replays = self.replays.lock().unwrap_or_else(|p| p.into_inner());
            replays.check_and_insert(&replay_key, Utc::now())
        };
        let secret = match &self.secret {
            Some(s) => s,
            None => return (false, fresh, duplicate, Some(VerdictReason::MissingSecret)),
        };
        let signed_payload = [parsed.timestamp_raw.as_bytes(), b".", body].concat();
        let expected = hmac_sha256(secret.reveal().as_bytes(), &signed_payload);
        if !parsed.signatures.iter().any(|sig| constant_time_compare(&expected, sig)) {
            return (false, fresh, duplicate, Some(VerdictReason::SignatureMismatch));
        }
        let reason = (!fresh)
            .then_some(VerdictReason::StaleTimestamp)
            .or_else(|| duplicate.then_some(VerdictReason::SuspectedReplay));
        (true, fresh, duplicate, reason)
    }
}

//--------------------------------------------------  Shared  ----------------------------------------------------------

fn check_path_secret(expected: Option<&Secret<String>>, supplied: Option<&str>) -> bool {
    match (expected, supplied) {
        (None, _) => true,
        (Some(expected), Some(supplied)) => constant_time_compare(expected.reveal().as_bytes(), supplied.as_bytes()),
        (Some(_), None) => false,
    }
}

/// The length check is not a timing leak: digest lengths are public.
fn constant_time_compare(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}

fn hmac_sha256(secret: &[u8], message: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC accepts any key");
    mac.update(message);
    mac.finalize().into_bytes().to_vec()
}


#[cfg(test)]
mod test {
    use apg_common::Secret;
    use chrono::{Duration, Utc};
    use serde_json::json;

    use super::{test_signing::*, *};
    use crate::config::WebhookConfig;

    fn config_with(secret: &str) -> WebhookConfig {
        WebhookConfig {
            secret: Some(Secret::new(secret.to_string())),
            path_secret: None,
            tolerance: Duration::seconds(900),
        }
    }

    #[test]
    fn header_parses_timestamp_and_digests() {
        let header = SignatureHeader::parse("ts=1700000000,v1=abcd", "ts").unwrap();
        assert_eq!(header.timestamp_raw, "1700000000");
        assert_eq!(header.timestamp_ms, 1_700_000_000_000);
        assert_eq!(header.signatures, vec![vec![0xab, 0xcd]]);
    }

    #[test]
    fn header_keeps_every_v1_and_ignores_unknown_keys() {
        let header = SignatureHeader::parse("t=1700000000, v1=aa, v0=dead, v1=bb, scheme=2", "t").unwrap();
        assert_eq!(header.signatures, vec![vec![0xaa], vec![0xbb]]);
    }

    #[test]
    fn header_without_timestamp_or_digest_is_rejected() {
        assert!(SignatureHeader::parse("v1=abcd", "ts").is_none());
        assert!(SignatureHeader::parse("ts=1700000000", "ts").is_none());
        assert!(SignatureHeader::parse("ts=soon,v1=abcd", "ts").is_none());
        assert!(SignatureHeader::parse("ts=1700000000,v1=zzzz", "ts").is_none());
        assert!(SignatureHeader::parse("complete junk", "ts").is_none());
    }

    #[test]
    fn second_resolution_timestamps_are_scaled() {
        assert_eq!(normalize_to_millis(1_700_000_000), 1_700_000_000_000);
        assert_eq!(normalize_to_millis(1_700_000_000_000), 1_700_000_000_000);
    }

    #[test]
    fn resource_id_extraction_follows_the_ordered_rules() {
        assert_eq!(extract_resource_id(&json!({"data": {"id": "PAY1"}, "id": "ENV1"})), Some("PAY1".into()));
        assert_eq!(extract_resource_id(&json!({"data": {"id": 4411}})), Some("4411".into()));
        assert_eq!(extract_resource_id(&json!({"id": "ENV1"})), Some("ENV1".into()));
        let url = json!({"resource": "https://api.example.com/v1/payments/998877"});
        assert_eq!(extract_resource_id(&url), Some("998877".into()));
        let trailing = json!({"resource": "https://api.example.com/v1/payments/998877/"});
        assert_eq!(extract_resource_id(&trailing), Some("998877".into()));
        assert_eq!(extract_resource_id(&json!({"resource": "https://api.example.com/about"})), None);
        assert_eq!(extract_resource_id(&json!({"topic": "payment"})), None);
    }

    #[test]
    fn manifest_round_trip_verifies() {
        let verifier = ManifestVerifier::new(&config_with("s3cret"));
        let ts = Utc::now().timestamp().to_string();
        let header = manifest_header("s3cret", "PAY1", Some("req-1"), &ts);
        let body = json!({"data": {"id": "PAY1"}});
        let verdict = verifier.verify(Some(&body), Some(&header), Some("req-1"), None);
        assert!(verdict.is_clean(), "verdict was {verdict:?}");
    }

    #[test]
    fn manifest_without_correlation_id_drops_that_section() {
        let verifier = ManifestVerifier::new(&config_with("s3cret"));
        let ts = Utc::now().timestamp().to_string();
        let header = manifest_header("s3cret", "PAY1", None, &ts);
        let body = json!({"data": {"id": "PAY1"}});
        let verdict = verifier.verify(Some(&body), Some(&header), None, None);
        assert!(verdict.is_clean(), "verdict was {verdict:?}");
    }

    #[test]
    fn mutated_signature_fails() {
        let verifier = ManifestVerifier::new(&config_with("s3cret"));
        let ts = Utc::now().timestamp().to_string();
        let sig = sign_manifest("s3cret", "PAY1", Some("req-1"), &ts);
        // Flip the last hex digit.
        let last = if sig.ends_with('0') { "1" } else { "0" };
        let mutated = format!("{}{last}", &sig[..sig.len() - 1]);
        let header = format!("ts={ts},v1={mutated}");
        let body = json!({"data": {"id": "PAY1"}});
        let verdict = verifier.verify(Some(&body), Some(&header), Some("req-1"), None);
        assert!(!verdict.signature_ok);
        assert_eq!(verdict.reason, Some(VerdictReason::SignatureMismatch));
    }

    #[test]
    fn tolerance_boundary_is_fresh_and_one_millisecond_past_is_stale() {
        let verifier = ManifestVerifier::new(&config_with("s3cret"));
        let body = json!({"data": {"id": "PAY1"}});
        let at_boundary = (Utc::now() - Duration::seconds(900)).timestamp_millis().to_string();
        let header = manifest_header("s3cret", "PAY1", Some("req-b"), &at_boundary);
        let verdict = verifier.verify(Some(&body), Some(&header), Some("req-b"), None);
        assert!(verdict.fresh, "boundary timestamp should be fresh");

        let past_boundary = ((Utc::now() - Duration::seconds(900)).timestamp_millis() - 100).to_string();
        let header = manifest_header("s3cret", "PAY1", Some("req-c"), &past_boundary);
        let verdict = verifier.verify(Some(&body), Some(&header), Some("req-c"), None);
        assert!(!verdict.fresh);
        assert!(verdict.signature_ok, "stale events still carry a valid signature");
        assert_eq!(verdict.reason, Some(VerdictReason::StaleTimestamp));
    }

    #[test]
    fn future_timestamps_are_fresh() {
        let verifier = ManifestVerifier::new(&config_with("s3cret"));
        let body = json!({"data": {"id": "PAY1"}});
        let ahead = (Utc::now() + Duration::seconds(120)).timestamp().to_string();
        let header = manifest_header("s3cret", "PAY1", Some("req-f"), &ahead);
        let verdict = verifier.verify(Some(&body), Some(&header), Some("req-f"), None);
        assert!(verdict.is_clean(), "verdict was {verdict:?}");
    }

    #[test]
    fn repeated_correlation_id_is_flagged_as_replay() {
        let verifier = ManifestVerifier::new(&config_with("s3cret"));
        let body = json!({"data": {"id": "PAY1"}});
        let ts = Utc::now().timestamp().to_string();
        let header = manifest_header("s3cret", "PAY1", Some("req-dup"), &ts);
        let first = verifier.verify(Some(&body), Some(&header), Some("req-dup"), None);
        assert!(first.is_clean());
        let second = verifier.verify(Some(&body), Some(&header), Some("req-dup"), None);
        assert!(second.duplicate);
        assert!(second.signature_ok);
        assert_eq!(second.reason, Some(VerdictReason::SuspectedReplay));
    }

    #[test]
    fn missing_body_id_is_flagged() {
        let verifier = ManifestVerifier::new(&config_with("s3cret"));
        let ts = Utc::now().timestamp().to_string();
        let header = manifest_header("s3cret", "PAY1", Some("req-n"), &ts);
        let body = json!({"topic": "payment"});
        let verdict = verifier.verify(Some(&body), Some(&header), Some("req-n"), None);
        assert!(!verdict.signature_ok);
        assert_eq!(verdict.reason, Some(VerdictReason::NoResourceId));
    }

    #[test]
    fn missing_secret_is_flagged_not_fatal() {
        let config = WebhookConfig { secret: None, path_secret: None, tolerance: Duration::seconds(900) };
        let verifier = ManifestVerifier::new(&config);
        let ts = Utc::now().timestamp().to_string();
        let header = manifest_header("anything", "PAY1", Some("req-s"), &ts);
        let body = json!({"data": {"id": "PAY1"}});
        let verdict = verifier.verify(Some(&body), Some(&header), Some("req-s"), None);
        assert!(!verdict.signature_ok);
        assert!(verdict.fresh);
        assert_eq!(verdict.reason, Some(VerdictReason::MissingSecret));
    }

    #[test]
    fn path_secret_is_compared_when_configured() {
        let config = WebhookConfig {
            secret: Some(Secret::new("s3cret".to_string())),
            path_secret: Some(Secret::new("abc123".to_string())),
            tolerance: Duration::seconds(900),
        };
        let verifier = ManifestVerifier::new(&config);
        let body = json!({"data": {"id": "PAY1"}});
        let ts = Utc::now().timestamp().to_string();
        let header = manifest_header("s3cret", "PAY1", Some("req-p1"), &ts);
        let ok = verifier.verify(Some(&body), Some(&header), Some("req-p1"), Some("abc123"));
        assert!(ok.path_secret_ok);
        let header = manifest_header("s3cret", "PAY1", Some("req-p2"), &ts);
        let bad = verifier.verify(Some(&body), Some(&header), Some("req-p2"), Some("abc124"));
        assert!(!bad.path_secret_ok);
        assert_eq!(bad.reason, Some(VerdictReason::PathSecretMismatch));
        let header = manifest_header("s3cret", "PAY1", Some("req-p3"), &ts);
        let missing = verifier.verify(Some(&body), Some(&header), Some("req-p3"), None);
        assert!(!missing.path_secret_ok);
    }

    #[test]
    fn signed_payload_round_trip_verifies() {
        let verifier = SignedPayloadVerifier::new(&config_with("whsec_test"));
        let body = br#"{"id":"evt_1","type":"payment_intent.succeeded"}"#;
        let header = signed_payload_header("whsec_test", Utc::now().timestamp(), body);
        let verdict = verifier.verify(body, Some(&header), None);
        assert!(verdict.is_clean(), "verdict was {verdict:?}");
    }

    #[test]
    fn signed_payload_accepts_any_matching_digest() {
        let verifier = SignedPayloadVerifier::new(&config_with("whsec_test"));
        let body = br#"{"id":"evt_2"}"#;
        let ts = Utc::now().timestamp();
        let good = signed_payload_header("whsec_test", ts, body);
        let rotated = format!("t={ts},v1=deadbeef,{}", good.split(',').nth(1).unwrap());
        let verdict = verifier.verify(body, Some(&rotated), None);
        assert!(verdict.signature_ok, "verdict was {verdict:?}");
    }

    #[test]
    fn signed_payload_tamper_fails() {
        let verifier = SignedPayloadVerifier::new(&config_with("whsec_test"));
        let body = br#"{"id":"evt_3","amount":1000}"#;
        let header = signed_payload_header("whsec_test", Utc::now().timestamp(), body);
        let tampered = br#"{"id":"evt_3","amount":9000}"#;
        let verdict = verifier.verify(tampered, Some(&header), None);
        assert!(!verdict.signature_ok);
        assert_eq!(verdict.reason, Some(VerdictReason::SignatureMismatch));
    }

    #[test]
    fn identical_signed_payload_delivery_is_a_replay() {
        let verifier = SignedPayloadVerifier::new(&config_with("whsec_test"));
        let body = br#"{"id":"evt_4"}"#;
        let header = signed_payload_header("whsec_test", Utc::now().timestamp(), body);
        assert!(verifier.verify(body, Some(&header), None).is_clean());
        let second = verifier.verify(body, Some(&header), None);
        assert!(second.duplicate);
        assert_eq!(second.reason, Some(VerdictReason::SuspectedReplay));
    }

    #[test]
    fn ttl_cache_expires_and_bounds_entries() {
        let mut cache = TtlCache::new(Duration::seconds(10), 2);
        let t0 = Utc::now();
        assert!(!cache.check_and_insert("a", t0));
        assert!(cache.check_and_insert("a", t0 + Duration::seconds(5)));
        // Past the TTL the key reads as new again.
        assert!(!cache.check_and_insert("a", t0 + Duration::seconds(16)));

        let mut cache = TtlCache::new(Duration::hours(1), 2);
        assert!(!cache.check_and_insert("a", t0));
        assert!(!cache.check_and_insert("b", t0 + Duration::seconds(1)));
        assert!(!cache.check_and_insert("c", t0 + Duration::seconds(2)));
        assert_eq!(cache.len(), 2);
        // "a" was the oldest entry, so it was dropped to make room.
        assert!(!cache.check_and_insert("a", t0 + Duration::seconds(3)));
    }
}
