use relay_contracts::{
    CanonicalResponse, ContentItem, ContextAnalysis, DownstreamResponse, RecommendationResult,
    Reply, DEFAULT_CONFIDENCE, DEFAULT_TONE,
};
use serde_json::Value;

/// Parses the raw webhook body. Errors are human readable and end up in a
/// `Failed` cache entry.
pub fn parse_response_body(body: &str) -> Result<DownstreamResponse, String> {
    if body.trim().is_empty() {
        return Err("Automation webhook returned an empty response".to_string());
    }
    let value: Value = serde_json::from_str(body)
        .map_err(|e| format!("Automation webhook returned invalid JSON: {e}"))?;
    Ok(classify(value))
}

pub fn classify(value: Value) -> DownstreamResponse {
    if value.get("recommended_replies").is_some() {
        if let Ok(canonical) = serde_json::from_value::<CanonicalResponse>(value.clone()) {
            return DownstreamResponse::Canonical(canonical);
        }
    }

    match &value {
        Value::Array(items) => {
            if let [single] = items.as_slice() {
                if single.get("recommended_replies").is_some() {
                    if let Ok(canonical) =
                        serde_json::from_value::<CanonicalResponse>(single.clone())
                    {
                        return DownstreamResponse::Canonical(canonical);
                    }
                }
            }
            if let Ok(blocks) = serde_json::from_value::<Vec<ContentItem>>(value.clone()) {
                return DownstreamResponse::ContentBlocks(blocks);
            }
        }
        Value::Object(_) if value.get("content").is_some() => {
            if let Ok(item) = serde_json::from_value::<ContentItem>(value.clone()) {
                return DownstreamResponse::ContentBlocks(vec![item]);
            }
        }
        _ => {}
    }
    DownstreamResponse::Unrecognized(value)
}

pub fn normalize_response(response: DownstreamResponse) -> RecommendationResult {
    match response {
        DownstreamResponse::Canonical(canonical) => RecommendationResult::Ready {
            replies: canonical
                .recommended_replies
                .into_iter()
                .enumerate()
                .map(|(idx, r)| Reply {
                    id: r
                        .id
                        .filter(|id| !id.trim().is_empty())
                        .unwrap_or_else(|| format!("reply_{}", idx + 1)),
                    text: r.text,
                    confidence: r.confidence.unwrap_or(DEFAULT_CONFIDENCE).clamp(0.0, 1.0),
                    tone: r.tone.unwrap_or_else(|| DEFAULT_TONE.to_string()),
                })
                .collect(),
            context_analysis: canonical.context_analysis,
        },
        DownstreamResponse::ContentBlocks(items) => {
            let replies = content_blocks_to_replies(&items);
            let context_analysis = if replies.is_empty() {
                None
            } else {
                Some(default_context_analysis())
            };
            RecommendationResult::Ready {
                replies,
                context_analysis,
            }
        }
        DownstreamResponse::Unrecognized(_) => RecommendationResult::Ready {
            replies: Vec::new(),
            context_analysis: None,
        },
    }
}

/// Adapter for providers that answer with message content blocks instead of
/// the canonical shape: one reply per text block, across all items.
pub fn content_blocks_to_replies(items: &[ContentItem]) -> Vec<Reply> {
    items
        .iter()
        .flat_map(|item| item.content.iter())
        .filter(|block| block.kind == "text")
        .filter_map(|block| block.text.as_deref())
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .enumerate()
        .map(|(idx, text)| Reply {
            id: format!("reply_{}", idx + 1),
            text: text.to_string(),
            confidence: DEFAULT_CONFIDENCE,
            tone: DEFAULT_TONE.to_string(),
        })
        .collect()
}

fn default_context_analysis() -> ContextAnalysis {
    ContextAnalysis {
        sentiment: Some("positive".to_string()),
        urgency: Some("medium".to_string()),
        category: Some("support".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn normalize(body: &str) -> RecommendationResult {
        normalize_response(parse_response_body(body).unwrap())
    }

    #[test]
    fn canonical_shape_is_used_as_is() {
        let result = normalize(
            r#"{"recommended_replies":[{"id":"r1","text":"Hi","confidence":0.8}],
                "context_analysis":{"sentiment":"neutral"}}"#,
        );
        match result {
            RecommendationResult::Ready {
                replies,
                context_analysis,
            } => {
                assert_eq!(replies.len(), 1);
                assert_eq!(replies[0].id, "r1");
                assert_eq!(replies[0].confidence, 0.8);
                assert_eq!(replies[0].tone, DEFAULT_TONE);
                let ctx = context_analysis.unwrap();
                assert_eq!(ctx.sentiment.as_deref(), Some("neutral"));
                assert_eq!(ctx.urgency, None);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn content_blocks_become_professional_replies() {
        let result = normalize(r#"[{"content":[{"type":"text","text":"Hello there"}]}]"#);
        match result {
            RecommendationResult::Ready {
                replies,
                context_analysis,
            } => {
                assert_eq!(replies.len(), 1);
                assert_eq!(replies[0].id, "reply_1");
                assert_eq!(replies[0].text, "Hello there");
                assert_eq!(replies[0].tone, "professional");
                assert_eq!(replies[0].confidence, 0.95);
                let ctx = context_analysis.unwrap();
                assert_eq!(ctx.sentiment.as_deref(), Some("positive"));
                assert_eq!(ctx.urgency.as_deref(), Some("medium"));
                assert_eq!(ctx.category.as_deref(), Some("support"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn text_blocks_flatten_across_items_with_sequential_ids() {
        let result = normalize(
            r#"[
                {"content":[{"type":"text","text":"One"},{"type":"tool_use","id":"x"}]},
                {"content":[{"type":"text","text":"Two"},{"type":"text","text":"  "},{"type":"text","text":"Three"}]}
            ]"#,
        );
        let RecommendationResult::Ready { replies, .. } = result else {
            panic!("expected ready");
        };
        let pairs: Vec<(&str, &str)> = replies
            .iter()
            .map(|r| (r.id.as_str(), r.text.as_str()))
            .collect();
        assert_eq!(
            pairs,
            [("reply_1", "One"), ("reply_2", "Two"), ("reply_3", "Three")]
        );
    }

    #[test]
    fn wrapped_canonical_object_is_unwrapped() {
        let result = normalize(r#"[{"recommended_replies":[{"text":"Sure"}]}]"#);
        let RecommendationResult::Ready { replies, .. } = result else {
            panic!("expected ready");
        };
        assert_eq!(replies[0].id, "reply_1");
        assert_eq!(replies[0].text, "Sure");
    }

    #[test]
    fn unknown_shape_yields_empty_ready() {
        let result = normalize(r#"{"output":"something else"}"#);
        assert_eq!(
            result,
            RecommendationResult::Ready {
                replies: Vec::new(),
                context_analysis: None
            }
        );
    }

    #[test]
    fn empty_and_invalid_bodies_are_errors() {
        let err = parse_response_body("").unwrap_err();
        assert!(err.contains("empty response"));
        let err = parse_response_body("   \n").unwrap_err();
        assert!(err.contains("empty response"));
        let err = parse_response_body("<html>").unwrap_err();
        assert!(err.contains("invalid JSON"));
    }

    #[test]
    fn confidence_is_clamped() {
        let result = normalize(r#"{"recommended_replies":[{"text":"x","confidence":3.2}]}"#);
        let RecommendationResult::Ready { replies, .. } = result else {
            panic!("expected ready");
        };
        assert_eq!(replies[0].confidence, 1.0);
    }
}
