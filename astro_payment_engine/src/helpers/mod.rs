mod event_uid;
mod sanitize;

pub use event_uid::derive_event_uid;
pub use sanitize::{sanitize_header_map, sanitize_json, sanitize_query_pairs};
