use relay_contracts::{ConversationRef, UNKNOWN_EMAIL};
use serde_json::Value;

use crate::value_to_id;

// Probe order is significant: contact-level fields, then nested context,
// then generic fallbacks.
const EMAIL_PATHS: &[&[&str]] = &[
    &["customer", "email"],
    &["contact", "email"],
    &["context", "customer", "email"],
    &["context", "contact", "email"],
    &["context", "user", "email"],
    &["user", "email"],
    &["input_values", "email"],
];

const CONVERSATION_ID_PATHS: &[&[&str]] = &[
    &["conversation", "id"],
    &["context", "conversation_id"],
    &["context", "conversation", "id"],
    &["conversation_id"],
    &["input_values", "conversation_id"],
];

const AGENT_EMAIL_PATHS: &[&[&str]] = &[
    &["admin", "email"],
    &["context", "admin", "email"],
    &["current_admin", "email"],
];

const WORKSPACE_ID_PATHS: &[&[&str]] = &[
    &["workspace_id"],
    &["context", "workspace_id"],
    &["app", "id"],
];

pub fn extract_conversation_ref(body: &Value) -> ConversationRef {
    ConversationRef {
        conversation_id: extract_conversation_id(body),
        customer_email: extract_email(body),
        agent_email: first_match(body, AGENT_EMAIL_PATHS).unwrap_or_default(),
        workspace_id: first_match(body, WORKSPACE_ID_PATHS).unwrap_or_default(),
    }
}

pub fn extract_email(body: &Value) -> String {
    first_match(body, EMAIL_PATHS).unwrap_or_else(|| UNKNOWN_EMAIL.to_string())
}

pub fn extract_conversation_id(body: &Value) -> Option<String> {
    first_match(body, CONVERSATION_ID_PATHS)
}

fn first_match(body: &Value, paths: &[&[&str]]) -> Option<String> {
    paths
        .iter()
        .find_map(|path| lookup(body, path).and_then(value_to_id))
}

fn lookup<'a>(body: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter().try_fold(body, |node, key| node.get(*key))
}
