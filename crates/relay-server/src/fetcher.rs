use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde_json::Value;
use tracing::debug;

use crate::error::RelayError;

pub const API_VERSION: &str = "2.11";

pub struct ConversationFetcher {
    client: Client,
    base_url: String,
}

impl ConversationFetcher {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, RelayError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RelayError::Client(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn conversation_url(&self, conversation_id: &str) -> String {
        format!(
            "{}/conversations/{}",
            self.base_url,
            urlencoding::encode(conversation_id)
        )
    }

    /// Returns the raw conversation object.
    pub async fn fetch(&self, conversation_id: &str, access_token: &str) -> Result<Value, RelayError> {
        let response = self
            .client
            .get(self.conversation_url(conversation_id))
            .bearer_auth(access_token)
            .header("Accept", "application/json")
            .header("Intercom-Version", API_VERSION)
            .send()
            .await
            .map_err(|e| RelayError::RemoteTransport(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| RelayError::RemoteTransport(e.to_string()))?;
        if status == StatusCode::NOT_FOUND {
            return Err(RelayError::ConversationNotFound(conversation_id.to_string()));
        }
        if !status.is_success() {
            return Err(RelayError::RemoteFetch {
                status: status.as_u16(),
                body: truncate(&body, 500),
            });
        }
        debug!(conversation_id, bytes = body.len(), "conversation fetched");
        serde_json::from_str(&body).map_err(|e| {
            RelayError::RemoteTransport(format!("conversation body is not JSON: {e}"))
        })
    }
}

pub(crate) fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}…", &text[..idx]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn fetch_sends_token_and_version_header() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/conversations/215"))
            .and(header("authorization", "Bearer tok"))
            .and(header("intercom-version", API_VERSION))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "215", "state": "open"})))
            .expect(1)
            .mount(&server)
            .await;

        let fetcher = ConversationFetcher::new(&format!("{}/", server.uri()), Duration::from_secs(5)).unwrap();
        let conversation = fetcher.fetch("215", "tok").await.unwrap();
        assert_eq!(conversation["state"], "open");
    }

    #[tokio::test]
    async fn non_success_status_carries_status_and_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/conversations/215"))
            .respond_with(ResponseTemplate::new(500).set_body_string("upstream exploded"))
            .mount(&server)
            .await;

        let fetcher = ConversationFetcher::new(&server.uri(), Duration::from_secs(5)).unwrap();
        let err = fetcher.fetch("215", "tok").await.unwrap_err();
        match err {
            RelayError::RemoteFetch { status, body } => {
                assert_eq!(status, 500);
                assert_eq!(body, "upstream exploded");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_conversation_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/conversations/404"))
            .respond_with(ResponseTemplate::new(404).set_body_string("conversation not found"))
            .mount(&server)
            .await;

        let fetcher = ConversationFetcher::new(&server.uri(), Duration::from_secs(5)).unwrap();
        let err = fetcher.fetch("404", "tok").await.unwrap_err();
        assert!(matches!(err, RelayError::ConversationNotFound(ref id) if id == "404"));
    }

    #[test]
    fn ids_are_path_encoded() {
        let fetcher = ConversationFetcher::new("https://api.example.com/", Duration::from_secs(1)).unwrap();
        assert_eq!(
            fetcher.conversation_url("a/b c"),
            "https://api.example.com/conversations/a%2Fb%20c"
        );
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate("héllo", 2), "hé…");
        assert_eq!(truncate("short", 10), "short");
    }
}
