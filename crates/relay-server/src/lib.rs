pub mod cache;
pub mod error;
pub mod fetcher;
pub mod jobs;

use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use relay_config::Config;
use relay_contracts::{CanvasResponse, ConversationRef};
use relay_kernel::canvas::{self, BACK_TO_REPLIES, REFRESH_NOW, REGENERATE, REPLY_TEXT_PREFIX, TRY_AGAIN};
use relay_kernel::{build_job_payload, extract_conversation_ref, verify_signature};
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};

use crate::cache::{Clock, ResultCache, SystemClock};
use crate::error::RelayError;
use crate::fetcher::ConversationFetcher;
use crate::jobs::{Job, JobRunner};

pub const SIGNATURE_HEADER: &str = "x-body-signature";

pub async fn serve(cfg: Config) -> Result<(), String> {
    let addr = cfg.listen_socket().map_err(|e| e.to_string())?;
    let sweep_every = Duration::from_secs(cfg.cache.sweep_interval_secs);
    let state = AppState::new(cfg, Arc::new(SystemClock)).map_err(|e| e.to_string())?;

    if !sweep_every.is_zero() {
        let cache = state.cache();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(sweep_every);
            loop {
                ticker.tick().await;
                let removed = cache.sweep_expired().await;
                if removed > 0 {
                    debug!(removed, "expired recommendation results swept");
                }
            }
        });
    }

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| format!("bind failed: {e}"))?;
    info!(%addr, "canvas relay listening");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutting down");
        })
        .await
        .map_err(|e| format!("serve failed: {e}"))
}

pub async fn build_app(cfg: Config) -> Result<Router, String> {
    let state = AppState::new(cfg, Arc::new(SystemClock)).map_err(|e| e.to_string())?;
    Ok(router(state))
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/initialize", post(initialize))
        .route("/submit", post(submit))
        .with_state(state)
}

#[derive(Clone)]
pub struct AppState {
    cfg: Arc<Config>,
    clock: Arc<dyn Clock>,
    cache: Arc<ResultCache>,
    fetcher: Arc<ConversationFetcher>,
    jobs: Arc<JobRunner>,
}

/// What a `submit` call asks for, decided from its component id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitAction {
    SelectReply(String),
    Poll,
    Retry,
    Unhandled,
}

impl AppState {
    pub fn new(cfg: Config, clock: Arc<dyn Clock>) -> Result<Self, RelayError> {
        let cache = Arc::new(ResultCache::new(
            Duration::from_secs(cfg.cache.ttl_secs),
            cfg.cache.max_entries,
            clock.clone(),
        ));
        let fetcher = ConversationFetcher::new(
            &cfg.platform.api_base_url,
            Duration::from_secs(cfg.platform.fetch_timeout_secs),
        )?;
        let jobs = JobRunner::new(
            cfg.automation.webhook_url.clone(),
            Duration::from_secs(cfg.automation.job_timeout_secs),
            cache.clone(),
        )?;
        Ok(Self {
            cfg: Arc::new(cfg),
            clock,
            cache,
            fetcher: Arc::new(fetcher),
            jobs: Arc::new(jobs),
        })
    }

    pub fn cache(&self) -> Arc<ResultCache> {
        self.cache.clone()
    }

    async fn process_initialize(
        &self,
        signature: Option<&str>,
        body: &[u8],
    ) -> Result<CanvasResponse, RelayError> {
        let check = verify_signature(body, signature, self.cfg.platform.client_secret.as_deref());
        if check.is_rejected() {
            warn!("initialize rejected: signature mismatch");
            return Err(RelayError::SignatureInvalid);
        }

        let payload = parse_body(body);
        let reference = extract_conversation_ref(&payload);
        let conversation_id = reference
            .conversation_id
            .clone()
            .ok_or(RelayError::MissingContext)?;
        self.dispatch(&reference, &conversation_id).await
    }

    async fn process_submit(&self, body: &[u8]) -> Result<CanvasResponse, RelayError> {
        let payload = parse_body(body);
        let component_id = payload
            .get("component_id")
            .and_then(Value::as_str)
            .unwrap_or_default();
        let reference = extract_conversation_ref(&payload);

        let action = classify_submit(component_id, payload.get("input_values"));
        debug!(component_id, ?action, "submit received");
        match action {
            SubmitAction::SelectReply(text) => Ok(canvas::reply_selected_view(&text)),
            SubmitAction::Poll => {
                let conversation_id = reference
                    .conversation_id
                    .as_deref()
                    .ok_or(RelayError::MissingContext)?;
                let status = self.cache.status(conversation_id).await;
                Ok(canvas::recommendations_view(&status))
            }
            SubmitAction::Retry => {
                let conversation_id = reference
                    .conversation_id
                    .clone()
                    .ok_or(RelayError::MissingContext)?;
                self.dispatch(&reference, &conversation_id).await
            }
            SubmitAction::Unhandled => Ok(canvas::acknowledged_view()),
        }
    }

    /// Fetches the conversation, answers with the loading view and leaves the
    /// downstream call to a detached job.
    async fn dispatch(
        &self,
        reference: &ConversationRef,
        conversation_id: &str,
    ) -> Result<CanvasResponse, RelayError> {
        let missing = self.cfg.missing_external();
        if !missing.is_empty() {
            warn!(?missing, "initialize skipped: relay not configured");
            return Err(RelayError::MissingConfiguration(missing));
        }
        let access_token = self
            .cfg
            .platform
            .access_token
            .as_deref()
            .unwrap_or_default();

        let conversation = self
            .fetcher
            .fetch(conversation_id, access_token)
            .await
            .inspect_err(|e| warn!(conversation_id, error = %e, "conversation fetch failed"))?;
        let payload = build_job_payload(conversation_id, reference, &conversation, self.clock.now());
        let message_count = payload.messages.len();

        let generation = self.cache.begin_job(conversation_id).await;
        let job = Job::new(conversation_id, generation, payload);
        info!(
            conversation_id,
            job_id = %job.job_id,
            messages = message_count,
            "recommendation job dispatched"
        );
        drop(self.jobs.spawn(job));

        Ok(canvas::loading_view(&reference.customer_email, message_count))
    }
}

pub fn classify_submit(component_id: &str, input_values: Option<&Value>) -> SubmitAction {
    if let Some(idx) = canvas::reply_index(component_id) {
        let text = input_values
            .and_then(|v| v.get(format!("{REPLY_TEXT_PREFIX}{idx}")))
            .and_then(Value::as_str)
            .filter(|v| !v.trim().is_empty());
        return match text {
            Some(text) => SubmitAction::SelectReply(text.to_string()),
            None => SubmitAction::Unhandled,
        };
    }
    match component_id {
        REFRESH_NOW | REGENERATE | BACK_TO_REPLIES => SubmitAction::Poll,
        TRY_AGAIN => SubmitAction::Retry,
        _ => SubmitAction::Unhandled,
    }
}

fn parse_body(body: &[u8]) -> Value {
    match serde_json::from_slice::<Value>(body) {
        Ok(v) => v,
        Err(e) => {
            warn!(error = %e, "request body is not JSON, treating as empty");
            Value::Object(Map::new())
        }
    }
}

async fn health() -> Json<Value> {
    Json(json!({"status": "ok", "timestamp": Utc::now().to_rfc3339()}))
}

async fn initialize(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<CanvasResponse>, RelayError> {
    debug!(body = %String::from_utf8_lossy(&body), "initialize received");
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok());
    state
        .process_initialize(signature, &body)
        .await
        .map(Json)
}

async fn submit(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<CanvasResponse>, RelayError> {
    state.process_submit(&body).await.map(Json)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reply_selection_needs_populated_value() {
        let values = json!({"reply_text_0": "Thanks for reaching out", "reply_text_1": "  "});
        assert_eq!(
            classify_submit("use_reply_0", Some(&values)),
            SubmitAction::SelectReply("Thanks for reaching out".to_string())
        );
        assert_eq!(
            classify_submit("use_reply_1", Some(&values)),
            SubmitAction::Unhandled
        );
        assert_eq!(classify_submit("use_reply_0", None), SubmitAction::Unhandled);
    }

    #[test]
    fn selected_reply_text_is_passed_through_unchanged() {
        let text = "  Hi Dana,\n\nYour order ships today.\n";
        let values = json!({"reply_text_2": text});
        assert_eq!(
            classify_submit("use_reply_2", Some(&values)),
            SubmitAction::SelectReply(text.to_string())
        );
    }

    #[test]
    fn poll_and_retry_ids() {
        for id in [REFRESH_NOW, REGENERATE, BACK_TO_REPLIES] {
            assert_eq!(classify_submit(id, None), SubmitAction::Poll);
        }
        assert_eq!(classify_submit(TRY_AGAIN, None), SubmitAction::Retry);
        assert_eq!(classify_submit("view_details", None), SubmitAction::Unhandled);
        assert_eq!(classify_submit("", None), SubmitAction::Unhandled);
    }

    #[test]
    fn unparseable_body_reads_as_empty_object() {
        assert_eq!(parse_body(b"not json"), json!({}));
        assert_eq!(parse_body(br#"{"a":1}"#), json!({"a": 1}));
    }
}
