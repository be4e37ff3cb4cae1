pub mod canvas;
pub mod extract;
pub mod messages;
pub mod recommendation;
pub mod signature;

use chrono::{DateTime, Utc};
use serde_json::Value;

pub use extract::extract_conversation_ref;
pub use messages::{build_job_payload, normalize_messages, strip_html, summarize_conversation};
pub use recommendation::{normalize_response, parse_response_body};
pub use signature::{verify_signature, SignatureCheck};

pub fn unix_to_rfc3339(secs: i64) -> Option<String> {
    DateTime::<Utc>::from_timestamp(secs, 0).map(|v| v.to_rfc3339())
}

/// Renders a JSON scalar id (`"123"` or `123`) as a string.
pub fn value_to_id(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
