use chrono::{DateTime, Utc};
use relay_contracts::{
    Author, ConversationPart, ConversationRef, ConversationSource, ConversationSummary,
    JobMetadata, MessageRecord, RecommendationJobPayload,
};
use serde_json::Value;
use tracing::warn;

use crate::{unix_to_rfc3339, value_to_id};

const BLOCK_TAGS: &[&str] = &["br", "/p", "/div", "/li", "/h1", "/h2", "/h3", "/blockquote"];

/// Flattens the source message and every conversation part, in delivery order.
///
/// Source and parts are decoded one at a time; an entry that does not decode
/// is skipped and the rest are kept.
pub fn normalize_messages(raw: &Value) -> Vec<MessageRecord> {
    let mut records = Vec::new();

    if let Some(source) = raw.get("source").filter(|v| v.is_object()) {
        match serde_json::from_value::<ConversationSource>(source.clone()) {
            Ok(source) => {
                let author = source.author.clone().unwrap_or_default();
                let body = match (&source.subject, &source.body) {
                    (Some(subject), Some(body)) if !subject.trim().is_empty() => {
                        format!("{subject}\n{body}")
                    }
                    (_, Some(body)) => body.clone(),
                    (Some(subject), None) => subject.clone(),
                    (None, None) => String::new(),
                };
                records.push(record(
                    source.id.as_ref().and_then(value_to_id).unwrap_or_default(),
                    "initial".to_string(),
                    &author,
                    &body,
                    unix_field(raw, "created_at"),
                ));
            }
            Err(e) => warn!(error = %e, "conversation source skipped: unexpected shape"),
        }
    }

    let parts = raw
        .get("conversation_parts")
        .and_then(|p| p.get("conversation_parts"))
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();
    for (idx, part) in parts.iter().enumerate() {
        let part = match serde_json::from_value::<ConversationPart>(part.clone()) {
            Ok(part) => part,
            Err(e) => {
                warn!(index = idx, error = %e, "conversation part skipped: unexpected shape");
                continue;
            }
        };
        let author = part.author.clone().unwrap_or_default();
        records.push(record(
            part.id.as_ref().and_then(value_to_id).unwrap_or_default(),
            part.part_type.unwrap_or_else(|| "comment".to_string()),
            &author,
            part.body.as_deref().unwrap_or_default(),
            part.created_at,
        ));
    }
    records
}

pub fn summarize_conversation(raw: &Value) -> ConversationSummary {
    ConversationSummary {
        id: raw.get("id").and_then(value_to_id).unwrap_or_default(),
        state: string_field(raw, "state").unwrap_or_else(|| "unknown".to_string()),
        title: string_field(raw, "title").filter(|t| !t.trim().is_empty()),
        created_at: unix_field(raw, "created_at").and_then(unix_to_rfc3339),
        updated_at: unix_field(raw, "updated_at").and_then(unix_to_rfc3339),
        waiting_since: unix_field(raw, "waiting_since").and_then(unix_to_rfc3339),
    }
}

pub fn build_job_payload(
    conversation_id: &str,
    reference: &ConversationRef,
    raw: &Value,
    now: DateTime<Utc>,
) -> RecommendationJobPayload {
    let mut conversation = summarize_conversation(raw);
    if conversation.id.is_empty() {
        conversation.id = conversation_id.to_string();
    }
    let messages = normalize_messages(raw);
    RecommendationJobPayload {
        conversation_id: conversation_id.to_string(),
        customer_email: reference.customer_email.clone(),
        agent_email: reference.agent_email.clone(),
        workspace_id: reference.workspace_id.clone(),
        metadata: JobMetadata {
            total_messages: messages.len(),
            waiting_since: conversation.waiting_since.clone(),
            requested_at: now.to_rfc3339(),
        },
        conversation,
        messages,
    }
}

/// Removes markup with a single tolerant pass. Not a sanitizer: unterminated
/// tags are kept as literal text.
pub fn strip_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find('<') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        let opens_tag = after
            .chars()
            .next()
            .map(|c| c.is_ascii_alphabetic() || c == '/' || c == '!')
            .unwrap_or(false);
        match (opens_tag, after.find('>')) {
            (true, Some(end)) => {
                let tag = after[..end].trim().to_ascii_lowercase();
                let name = tag
                    .split(|c: char| c.is_whitespace() || c == '>')
                    .next()
                    .unwrap_or_default()
                    .trim_end_matches('/');
                if BLOCK_TAGS.contains(&name) {
                    out.push('\n');
                }
                rest = &after[end + 1..];
            }
            _ => {
                out.push('<');
                rest = after;
            }
        }
    }
    out.push_str(rest);

    let decoded = decode_entities(&out);
    let mut lines: Vec<&str> = Vec::new();
    for line in decoded.lines().map(str::trim) {
        if line.is_empty() && lines.last().map(|l| l.is_empty()).unwrap_or(true) {
            continue;
        }
        lines.push(line);
    }
    lines.join("\n").trim().to_string()
}

fn decode_entities(input: &str) -> String {
    input
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#x27;", "'")
        .replace("&amp;", "&")
}

fn string_field(raw: &Value, key: &str) -> Option<String> {
    raw.get(key).and_then(Value::as_str).map(str::to_string)
}

fn unix_field(raw: &Value, key: &str) -> Option<i64> {
    raw.get(key).and_then(Value::as_i64)
}

fn record(
    id: String,
    kind: String,
    author: &Author,
    body: &str,
    created_at: Option<i64>,
) -> MessageRecord {
    MessageRecord {
        id,
        kind,
        author_type: author.kind.clone().unwrap_or_default(),
        author_email: author.email.clone().unwrap_or_default(),
        author_name: author.name.clone().unwrap_or_default(),
        text: strip_html(body),
        timestamp: created_at.and_then(unix_to_rfc3339),
    }
}
