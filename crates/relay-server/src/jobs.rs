use std::sync::Arc;
use std::time::Duration;

use relay_contracts::{RecommendationJobPayload, RecommendationResult};
use relay_kernel::{normalize_response, parse_response_body};
use reqwest::Client;
use tokio::task::JoinHandle;
use tracing::{debug, info, info_span, warn, Instrument};
use url::Url;
use uuid::Uuid;

use crate::cache::ResultCache;
use crate::error::RelayError;
use crate::fetcher::truncate;

#[derive(Debug, Clone)]
pub struct Job {
    pub job_id: Uuid,
    pub conversation_id: String,
    pub generation: u64,
    pub payload: RecommendationJobPayload,
}

impl Job {
    pub fn new(conversation_id: &str, generation: u64, payload: RecommendationJobPayload) -> Self {
        Self {
            job_id: Uuid::new_v4(),
            conversation_id: conversation_id.to_string(),
            generation,
            payload,
        }
    }
}

/// Webhook URL with any userinfo moved into Basic-auth credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookTarget {
    pub url: Url,
    pub username: Option<String>,
    pub password: Option<String>,
}

pub fn resolve_target(raw: &str) -> Result<WebhookTarget, RelayError> {
    let mut url = Url::parse(raw.trim())
        .map_err(|e| RelayError::JobDispatch(format!("invalid automation webhook URL: {e}")))?;

    let username = decode_userinfo(url.username());
    let password = url.password().and_then(decode_userinfo);
    if username.is_some() || password.is_some() {
        url.set_username("")
            .and_then(|_| url.set_password(None))
            .map_err(|_| {
                RelayError::JobDispatch("automation webhook URL cannot carry credentials".to_string())
            })?;
    }

    Ok(WebhookTarget {
        url,
        username,
        password,
    })
}

fn decode_userinfo(raw: &str) -> Option<String> {
    if raw.is_empty() {
        return None;
    }
    Some(
        urlencoding::decode(raw)
            .map(|v| v.into_owned())
            .unwrap_or_else(|_| raw.to_string()),
    )
}

/// Posts job payloads to the automation webhook and records the outcome in the
/// result cache. Nothing a job does is reported to a caller.
pub struct JobRunner {
    client: Client,
    webhook_url: Option<String>,
    cache: Arc<ResultCache>,
}

impl JobRunner {
    pub fn new(
        webhook_url: Option<String>,
        timeout: Duration,
        cache: Arc<ResultCache>,
    ) -> Result<Self, RelayError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RelayError::Client(e.to_string()))?;
        Ok(Self {
            client,
            webhook_url,
            cache,
        })
    }

    pub fn spawn(self: &Arc<Self>, job: Job) -> JoinHandle<()> {
        let runner = Arc::clone(self);
        let span = info_span!(
            "recommendation_job",
            job_id = %job.job_id,
            conversation_id = %job.conversation_id
        );
        tokio::spawn(async move { runner.run(job).await }.instrument(span))
    }

    pub async fn run(&self, job: Job) {
        let result = match self.execute(&job).await {
            Ok(result) => {
                if let RecommendationResult::Ready { replies, .. } = &result {
                    info!(replies = replies.len(), "recommendations ready");
                }
                result
            }
            Err(err) => {
                warn!(code = err.code(), error = %err, "recommendation job failed");
                RecommendationResult::Failed {
                    message: err.to_string(),
                }
            }
        };

        if !self
            .cache
            .complete(&job.conversation_id, job.generation, result)
            .await
        {
            info!(generation = job.generation, "result discarded, superseded by a newer job");
        }
    }

    async fn execute(&self, job: &Job) -> Result<RecommendationResult, RelayError> {
        let raw = self
            .webhook_url
            .as_deref()
            .ok_or_else(|| RelayError::MissingConfiguration(vec!["AUTOMATION_WEBHOOK_URL"]))?;
        let target = resolve_target(raw)?;

        let mut request = self.client.post(target.url.clone()).json(&job.payload);
        if target.username.is_some() || target.password.is_some() {
            let username = target.username.as_deref().unwrap_or_default();
            request = request.basic_auth(username, target.password.as_deref());
        }

        let response = request
            .send()
            .await
            .map_err(|e| RelayError::JobDispatch(format!("automation webhook request failed: {e}")))?;
        let status = response.status();
        let body = response.text().await.map_err(|e| {
            RelayError::JobDispatch(format!("failed to read automation webhook response: {e}"))
        })?;
        debug!(status = status.as_u16(), bytes = body.len(), "automation webhook answered");

        if !status.is_success() {
            return Err(RelayError::JobDispatch(format!(
                "automation webhook responded with HTTP {}: {}",
                status.as_u16(),
                truncate(&body, 500)
            )));
        }

        let parsed = parse_response_body(&body).map_err(RelayError::MalformedDownstreamResponse)?;
        Ok(normalize_response(parsed))
    }
}
