use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const UNKNOWN_EMAIL: &str = "unknown@example.com";
pub const DEFAULT_CONFIDENCE: f64 = 0.95;
pub const DEFAULT_TONE: &str = "professional";

/// Identity of the conversation an inbound Canvas call refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationRef {
    pub conversation_id: Option<String>,
    pub customer_email: String,
    pub agent_email: String,
    pub workspace_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MessageRecord {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub author_type: String,
    pub author_email: String,
    pub author_name: String,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ConversationSummary {
    pub id: String,
    pub state: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub waiting_since: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct JobMetadata {
    pub total_messages: usize,
    pub waiting_since: Option<String>,
    pub requested_at: String,
}

/// Body posted verbatim to the automation webhook.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RecommendationJobPayload {
    pub conversation_id: String,
    pub customer_email: String,
    pub agent_email: String,
    pub workspace_id: String,
    pub conversation: ConversationSummary,
    pub messages: Vec<MessageRecord>,
    pub metadata: JobMetadata,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Reply {
    pub id: String,
    pub text: String,
    pub confidence: f64,
    pub tone: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ContextAnalysis {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sentiment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub urgency: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RecommendationResult {
    Pending,
    Ready {
        replies: Vec<Reply>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        context_analysis: Option<ContextAnalysis>,
    },
    Failed {
        message: String,
    },
}

// Downstream response shapes. `recommended_replies` entries are lenient because
// upstream prompt templates drift; defaults are filled in during normalization.

#[derive(Debug, Clone, Deserialize)]
pub struct CanonicalReply {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub tone: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CanonicalResponse {
    pub recommended_replies: Vec<CanonicalReply>,
    #[serde(default)]
    pub context_analysis: Option<ContextAnalysis>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContentBlock {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContentItem {
    pub content: Vec<ContentBlock>,
}

/// Every response shape the automation webhook is known to produce.
#[derive(Debug, Clone)]
pub enum DownstreamResponse {
    Canonical(CanonicalResponse),
    ContentBlocks(Vec<ContentItem>),
    Unrecognized(Value),
}

// Remote conversation API shapes. Only the fields the relay reads are typed;
// the normalizer decodes the source and each part on its own.

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Author {
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConversationSource {
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub author: Option<Author>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConversationPart {
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default)]
    pub part_type: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub created_at: Option<i64>,
    #[serde(default)]
    pub author: Option<Author>,
}

// Canvas Kit wire format.

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TextStyle {
    Header,
    Paragraph,
    Muted,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ButtonStyle {
    Primary,
    Secondary,
    Link,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ButtonAction {
    Submit,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SpacerSize {
    Xs,
    S,
    M,
    L,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Component {
    Text {
        text: String,
        style: TextStyle,
    },
    Divider,
    Button {
        id: String,
        label: String,
        style: ButtonStyle,
        action: ButtonAction,
    },
    Textarea {
        id: String,
        label: String,
        value: String,
    },
    Spacer {
        size: SpacerSize,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CanvasContent {
    pub components: Vec<Component>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Canvas {
    pub content: CanvasContent,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CanvasResponse {
    pub canvas: Canvas,
}

impl CanvasResponse {
    pub fn new(components: Vec<Component>) -> Self {
        Self {
            canvas: Canvas {
                content: CanvasContent { components },
            },
        }
    }

    pub fn components(&self) -> &[Component] {
        &self.canvas.content.components
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn canvas_envelope_matches_wire_format() {
        let canvas = CanvasResponse::new(vec![
            Component::Text {
                text: "hi".to_string(),
                style: TextStyle::Paragraph,
            },
            Component::Divider,
            Component::Button {
                id: "refresh_now".to_string(),
                label: "Check status".to_string(),
                style: ButtonStyle::Primary,
                action: ButtonAction::Submit,
            },
            Component::Spacer { size: SpacerSize::S },
        ]);
        let value = serde_json::to_value(&canvas).unwrap();
        assert_eq!(
            value,
            json!({"canvas": {"content": {"components": [
                {"type": "text", "text": "hi", "style": "paragraph"},
                {"type": "divider"},
                {"type": "button", "id": "refresh_now", "label": "Check status",
                 "style": "primary", "action": {"type": "submit"}},
                {"type": "spacer", "size": "s"}
            ]}}})
        );
    }

    #[test]
    fn message_record_serializes_kind_as_type() {
        let record = MessageRecord {
            id: "1".to_string(),
            kind: "initial".to_string(),
            author_type: "user".to_string(),
            author_email: "a@b.c".to_string(),
            author_name: "A".to_string(),
            text: "hello".to_string(),
            timestamp: None,
        };
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["type"], "initial");
        assert!(value.get("timestamp").is_none());
    }

    #[test]
    fn conversation_part_tolerates_missing_fields() {
        let part: ConversationPart = serde_json::from_value(json!({"id": "123"})).unwrap();
        assert!(part.author.is_none());
        assert!(part.body.is_none());
        assert!(serde_json::from_value::<ConversationPart>(json!({"created_at": "2024-01-01"})).is_err());
    }
}
