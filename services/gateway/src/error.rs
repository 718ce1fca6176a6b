use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::{Value, json};

#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error("Message is required")]
    MissingMessage,
    #[error("Invalid request body: {0}")]
    InvalidBody(String),
    #[error("Request timeout: {0}")]
    Timeout(String),
    /// The upstream answered with an error; `body` is relayed as-is.
    #[error("upstream answered HTTP {status}")]
    Upstream { status: StatusCode, body: Value },
    #[error("upstream sent an unreadable body: {0}")]
    BadUpstreamBody(String),
    #[error("{0}")]
    Request(#[from] reqwest::Error),
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ProxyError::Upstream { status, body } => (status, body),
            ProxyError::MissingMessage | ProxyError::InvalidBody(_) => {
                (StatusCode::BAD_REQUEST, json!({ "error": self.to_string() }))
            }
            ProxyError::Timeout(_) => {
                (StatusCode::GATEWAY_TIMEOUT, json!({ "error": self.to_string() }))
            }
            ProxyError::BadUpstreamBody(_) => {
                (StatusCode::BAD_GATEWAY, json!({ "error": self.to_string() }))
            }
            ProxyError::Request(ref e) => {
                tracing::error!("upstream request failed: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, json!({ "error": self.to_string() }))
            }
        };
        (status, Json(body)).into_response()
    }
}
