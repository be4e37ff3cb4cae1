//! Canvas Kit views. Every function builds a fresh component tree.

use relay_contracts::{
    ButtonAction, ButtonStyle, CanvasResponse, Component, ContextAnalysis, RecommendationResult,
    Reply, SpacerSize, TextStyle,
};

pub const REFRESH_NOW: &str = "refresh_now";
pub const REGENERATE: &str = "regenerate";
pub const TRY_AGAIN: &str = "try_again";
pub const BACK_TO_REPLIES: &str = "back_to_replies";
pub const USE_REPLY_PREFIX: &str = "use_reply_";
pub const REPLY_TEXT_PREFIX: &str = "reply_text_";
pub const FINAL_REPLY: &str = "final_reply";

const HEADER: &str = "🤖 AI Reply Suggestions";

pub fn loading_view(customer_email: &str, message_count: usize) -> CanvasResponse {
    CanvasResponse::new(vec![
        header(),
        text("⏳ **Generating recommendations...**", TextStyle::Paragraph),
        text(
            &format!("Customer: {customer_email} · {message_count} messages analyzed"),
            TextStyle::Muted,
        ),
        spacer(),
        button(REFRESH_NOW, "Check status", ButtonStyle::Primary),
    ])
}

pub fn still_processing_view() -> CanvasResponse {
    CanvasResponse::new(vec![
        header(),
        text(
            "⏳ **Still processing...**\n\nRecommendations are not ready yet. Check again in a few seconds.",
            TextStyle::Paragraph,
        ),
        spacer(),
        button(REFRESH_NOW, "Check status", ButtonStyle::Primary),
    ])
}

pub fn recommendations_view(result: &RecommendationResult) -> CanvasResponse {
    match result {
        RecommendationResult::Pending => still_processing_view(),
        RecommendationResult::Ready {
            replies,
            context_analysis,
        } => ready_view(replies, context_analysis.as_ref()),
        RecommendationResult::Failed { message } => failed_view(message),
    }
}

pub fn ready_view(replies: &[Reply], context_analysis: Option<&ContextAnalysis>) -> CanvasResponse {
    if replies.is_empty() {
        return empty_view();
    }

    let mut components = vec![header()];
    for (idx, reply) in replies.iter().enumerate() {
        if idx > 0 {
            components.push(Component::Divider);
        }
        components.push(text(
            &format!(
                "**Option {}** · {} confidence · {}",
                idx + 1,
                confidence_label(reply.confidence),
                reply.tone
            ),
            TextStyle::Paragraph,
        ));
        components.push(Component::Textarea {
            id: format!("{REPLY_TEXT_PREFIX}{idx}"),
            label: format!("Reply {}", idx + 1),
            value: reply.text.clone(),
        });
        components.push(button(
            &format!("{USE_REPLY_PREFIX}{idx}"),
            "Use this reply",
            ButtonStyle::Secondary,
        ));
    }

    if let Some(summary) = context_analysis.and_then(context_summary) {
        components.push(Component::Divider);
        components.push(text(&summary, TextStyle::Muted));
    }

    components.push(spacer());
    components.push(button(REGENERATE, "🔄 Regenerate", ButtonStyle::Primary));
    CanvasResponse::new(components)
}

pub fn empty_view() -> CanvasResponse {
    CanvasResponse::new(vec![
        header(),
        text(
            "⚠️ **No recommendations**\n\nThe automation returned no reply suggestions for this conversation.",
            TextStyle::Paragraph,
        ),
        button(TRY_AGAIN, "Try again", ButtonStyle::Primary),
    ])
}

pub fn failed_view(message: &str) -> CanvasResponse {
    CanvasResponse::new(vec![
        header(),
        text(
            &format!("❌ **Error**\n\nFailed to generate recommendations: {message}"),
            TextStyle::Error,
        ),
        button(TRY_AGAIN, "Try again", ButtonStyle::Primary),
    ])
}

pub fn reply_selected_view(reply_text: &str) -> CanvasResponse {
    CanvasResponse::new(vec![
        text("✅ **Reply selected**", TextStyle::Header),
        text("Edit it if needed, then copy it into the composer.", TextStyle::Muted),
        Component::Textarea {
            id: FINAL_REPLY.to_string(),
            label: "Your reply".to_string(),
            value: reply_text.to_string(),
        },
        button(BACK_TO_REPLIES, "← Back to suggestions", ButtonStyle::Secondary),
    ])
}

pub fn missing_context_view() -> CanvasResponse {
    CanvasResponse::new(vec![text(
        "ℹ️ **No conversation**\n\nOpen this app from a conversation to get reply suggestions.",
        TextStyle::Paragraph,
    )])
}

pub fn not_found_view(conversation_id: &str) -> CanvasResponse {
    CanvasResponse::new(vec![text(
        &format!("ℹ️ **No Data Found**\n\nNo conversation found for id: {conversation_id}"),
        TextStyle::Paragraph,
    )])
}

pub fn misconfigured_view(missing: &[&str]) -> CanvasResponse {
    CanvasResponse::new(vec![text(
        &format!(
            "⚠️ **Configuration Error**\n\nThe relay is not fully configured. Please set: {}.",
            missing.join(", ")
        ),
        TextStyle::Error,
    )])
}

pub fn error_view(message: &str) -> CanvasResponse {
    CanvasResponse::new(vec![
        text(&format!("❌ **Error**\n\n{message}"), TextStyle::Error),
        button(TRY_AGAIN, "Try again", ButtonStyle::Primary),
    ])
}

pub fn acknowledged_view() -> CanvasResponse {
    CanvasResponse::new(vec![text(
        "✅ **Action Completed**\n\nYour request has been processed successfully.",
        TextStyle::Paragraph,
    )])
}

pub fn confidence_label(confidence: f64) -> String {
    format!("{}%", (confidence.clamp(0.0, 1.0) * 100.0).round() as u32)
}

/// Index `i` for a `use_reply_{i}` component id.
pub fn reply_index(component_id: &str) -> Option<usize> {
    component_id.strip_prefix(USE_REPLY_PREFIX)?.parse().ok()
}

fn context_summary(ctx: &ContextAnalysis) -> Option<String> {
    let fields: Vec<String> = [
        ("Sentiment", &ctx.sentiment),
        ("Urgency", &ctx.urgency),
        ("Category", &ctx.category),
    ]
    .into_iter()
    .filter_map(|(label, value)| value.as_ref().map(|v| format!("{label}: {v}")))
    .collect();
    if fields.is_empty() {
        None
    } else {
        Some(format!("**Context** · {}", fields.join(" · ")))
    }
}

fn header() -> Component {
    text(HEADER, TextStyle::Header)
}

fn text(value: &str, style: TextStyle) -> Component {
    Component::Text {
        text: value.to_string(),
        style,
    }
}

fn spacer() -> Component {
    Component::Spacer { size: SpacerSize::S }
}

fn button(id: &str, label: &str, style: ButtonStyle) -> Component {
    Component::Button {
        id: id.to_string(),
        label: label.to_string(),
        style,
        action: ButtonAction::Submit,
    }
}
