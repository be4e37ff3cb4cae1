use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use relay_contracts::{ErrorBody, ErrorResponse};
use relay_kernel::canvas;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("signature verification failed")]
    SignatureInvalid,
    #[error("request carries no conversation context")]
    MissingContext,
    #[error("missing configuration: {}", .0.join(", "))]
    MissingConfiguration(Vec<&'static str>),
    #[error("conversation {0} not found")]
    ConversationNotFound(String),
    #[error("conversation API responded with HTTP {status}: {body}")]
    RemoteFetch { status: u16, body: String },
    #[error("conversation API request failed: {0}")]
    RemoteTransport(String),
    #[error("{0}")]
    JobDispatch(String),
    #[error("{0}")]
    MalformedDownstreamResponse(String),
    #[error("http client setup failed: {0}")]
    Client(String),
}

impl RelayError {
    pub fn code(&self) -> &'static str {
        match self {
            RelayError::SignatureInvalid => "signature_invalid",
            RelayError::MissingContext => "missing_context",
            RelayError::MissingConfiguration(_) => "missing_configuration",
            RelayError::ConversationNotFound(_) => "conversation_not_found",
            RelayError::RemoteFetch { .. } => "remote_fetch_error",
            RelayError::RemoteTransport(_) => "remote_transport_error",
            RelayError::JobDispatch(_) => "job_dispatch_error",
            RelayError::MalformedDownstreamResponse(_) => "malformed_downstream_response",
            RelayError::Client(_) => "client_error",
        }
    }
}

/// The Canvas host cannot render HTTP error pages, so everything except a
/// rejected signature is answered with a 200 and an informational view.
impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        match &self {
            RelayError::SignatureInvalid => (
                StatusCode::UNAUTHORIZED,
                Json(ErrorResponse {
                    error: ErrorBody {
                        code: self.code().to_string(),
                        message: self.to_string(),
                    },
                }),
            )
                .into_response(),
            RelayError::MissingContext => {
                (StatusCode::OK, Json(canvas::missing_context_view())).into_response()
            }
            RelayError::MissingConfiguration(missing) => {
                (StatusCode::OK, Json(canvas::misconfigured_view(missing))).into_response()
            }
            RelayError::ConversationNotFound(id) => {
                (StatusCode::OK, Json(canvas::not_found_view(id))).into_response()
            }
            _ => (
                StatusCode::OK,
                Json(canvas::error_view(&format!(
                    "Failed to load conversation: {self}"
                ))),
            )
                .into_response(),
        }
    }
}
