//! Webhook payload sanitisation.
//!
//! Everything a provider sends is persisted verbatim for reconciliation, except for two classes of
//! value:
//!
//! * credentials and signatures (deny-listed header names and body keys) are replaced wholesale
//!   with `[redacted]`;
//! * a short allow-list of PII-bearing keys (email, tax id, phone) is masked format-preserving via
//!   [`apg_common::mask_email`] and [`apg_common::mask_digits`], so support staff can still match
//!   a stored event against a provider dashboard.
//!
//! Key matching is case-insensitive and applies at any nesting depth.

use apg_common::{mask_digits, mask_email};
use serde_json::{Map, Value};

const REDACTED: &str = "[redacted]";

const HEADER_DENY_LIST: [&str; 9] = [
    "authorization",
    "proxy-authorization",
    "cookie",
    "set-cookie",
    "x-api-key",
    "api-key",
    "x-signature",
    "stripe-signature",
    "x-hub-signature-256",
];

const KEY_DENY_LIST: [&str; 12] = [
    "token",
    "access_token",
    "refresh_token",
    "api_key",
    "apikey",
    "secret",
    "password",
    "authorization",
    "card_number",
    "card",
    "cvv",
    "security_code",
];

const DIGIT_PII_KEYS: [&str; 10] = [
    "cpf",
    "cnpj",
    "tax_id",
    "taxid",
    "document",
    "doc_number",
    "identification_number",
    "phone",
    "phone_number",
    "mobile",
];

fn is_email_key(key: &str) -> bool {
    key.contains("email")
}

fn is_digit_pii_key(key: &str) -> bool {
    DIGIT_PII_KEYS.contains(&key)
}

/// Sanitises request headers into a JSON object. Deny-listed header values are replaced wholesale.
pub fn sanitize_header_map<'a, I>(headers: I) -> Value
where I: IntoIterator<Item = (&'a str, &'a str)> {
    let mut map = Map::new();
    for (name, value) in headers {
        let key = name.to_ascii_lowercase();
        let value = if HEADER_DENY_LIST.contains(&key.as_str()) { REDACTED.to_string() } else { value.to_string() };
        map.insert(key, Value::String(value));
    }
    Value::Object(map)
}

/// Sanitises query-string pairs into a JSON object, applying the same key rules as JSON bodies.
pub fn sanitize_query_pairs<'a, I>(pairs: I) -> Value
where I: IntoIterator<Item = (&'a str, &'a str)> {
    let mut map = Map::new();
    for (name, value) in pairs {
        map.insert(name.to_string(), sanitize_value_for_key(name, &Value::String(value.to_string())));
    }
    Value::Object(map)
}

/// Recursively sanitises a JSON document. Non-object scalars pass through untouched; object
/// entries are redacted or masked by key name at every depth.
pub fn sanitize_json(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let sanitized =
                map.iter().map(|(k, v)| (k.clone(), sanitize_value_for_key(k, v))).collect::<Map<String, Value>>();
            Value::Object(sanitized)
        },
        Value::Array(items) => Value::Array(items.iter().map(sanitize_json).collect()),
        other => other.clone(),
    }
}

fn sanitize_value_for_key(key: &str, value: &Value) -> Value {
    let key = key.to_ascii_lowercase();
    if KEY_DENY_LIST.contains(&key.as_str()) {
        return Value::String(REDACTED.to_string());
    }
    if is_email_key(&key) {
        return match value {
            Value::String(s) => Value::String(mask_email(s)),
            other => sanitize_json(other),
        };
    }
    if is_digit_pii_key(&key) {
        return match value {
            Value::String(s) => Value::String(mask_digits(s)),
            // Numeric tax ids and phone numbers lose their type on masking; a starred string is
            // still more useful than a redaction marker.
            Value::Number(n) => Value::String(mask_digits(&n.to_string())),
            other => sanitize_json(other),
        };
    }
    sanitize_json(value)
}
