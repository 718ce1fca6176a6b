use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use reqwest::Client;
use serde_json::Value;

use crate::avatar::{AvatarDescriptor, decode_avatar_list};
use crate::credential::{StreamingCredential, decode_token, describe_keys};

const AVATARS_PATH: &str = "/interactive_avatars";
const TOKEN_PATH: &str = "/streaming_token";
const CHAT_PATH: &str = "/chat";

// The RAG backend can take a long time on cold starts.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("HTTP {status}: {detail}")]
    Http { status: u16, detail: String },
    #[error("no token in streaming token response (keys: {keys})")]
    MissingToken { keys: String },
    #[error("unexpected response from {endpoint}: {reason}")]
    Shape {
        endpoint: &'static str,
        reason: String,
    },
}

impl GatewayError {
    pub fn status(&self) -> Option<u16> {
        match self {
            GatewayError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// The three backend endpoints the client depends on.
///
/// Implemented over HTTP by [`GatewayClient`]; mocked in tests so the session
/// and UI logic can run without a backend.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Gateway: Send + Sync {
    fn base_url(&self) -> String;

    /// Points subsequent requests at another backend. An empty value restores
    /// the configured default.
    fn set_base_url(&self, base_url: &str);

    async fn list_avatars(&self) -> Result<Vec<AvatarDescriptor>, GatewayError>;

    async fn get_streaming_token(&self) -> Result<StreamingCredential, GatewayError>;

    async fn chat(&self, message: &str) -> Result<String, GatewayError>;
}

pub struct GatewayClient {
    client: Client,
    default_base_url: String,
    base_url: RwLock<String>,
    // Returned by the RAG backend and echoed back so follow-ups share context.
    conversation_id: RwLock<Option<String>>,
}

impl GatewayClient {
    pub fn new(default_base_url: &str) -> Self {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!("falling back to default HTTP client: {}", e);
                Client::new()
            });
        Self::with_client(client, default_base_url)
    }

    pub fn with_client(client: Client, default_base_url: &str) -> Self {
        let default_base_url = normalize_base_url(default_base_url);
        Self {
            client,
            base_url: RwLock::new(default_base_url.clone()),
            default_base_url,
            conversation_id: RwLock::new(None),
        }
    }

    pub fn conversation_id(&self) -> Option<String> {
        self.conversation_id.read().ok().and_then(|id| id.clone())
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url(), path)
    }

    async fn send(&self, request: reqwest::RequestBuilder, url: &str) -> Result<Value, GatewayError> {
        let response = request.send().await.map_err(|source| GatewayError::Transport {
            url: url.to_string(),
            source,
        })?;

        let status = response.status();
        let text = response.text().await.map_err(|source| GatewayError::Transport {
            url: url.to_string(),
            source,
        })?;

        if !status.is_success() {
            let detail = error_detail(&text)
                .or_else(|| status.canonical_reason().map(str::to_string))
                .unwrap_or_else(|| "request failed".to_string());
            tracing::warn!("{} answered HTTP {}: {}", url, status.as_u16(), detail);
            return Err(GatewayError::Http {
                status: status.as_u16(),
                detail,
            });
        }

        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text).map_err(|e| GatewayError::Shape {
            endpoint: path_of(url),
            reason: e.to_string(),
        })
    }
}

#[async_trait]
impl Gateway for GatewayClient {
    fn base_url(&self) -> String {
        self.base_url
            .read()
            .map(|url| url.clone())
            .unwrap_or_else(|_| self.default_base_url.clone())
    }

    fn set_base_url(&self, base_url: &str) {
        let normalized = normalize_base_url(base_url);
        let next = if normalized.is_empty() {
            self.default_base_url.clone()
        } else {
            normalized
        };
        tracing::info!("gateway base url set to {}", next);
        if let Ok(mut current) = self.base_url.write() {
            *current = next;
        }
    }

    async fn list_avatars(&self) -> Result<Vec<AvatarDescriptor>, GatewayError> {
        let url = self.url(AVATARS_PATH);
        let body = self.send(self.client.get(&url), &url).await?;
        let avatars = decode_avatar_list(&body);
        tracing::debug!("decoded {} avatars", avatars.len());
        Ok(avatars)
    }

    async fn get_streaming_token(&self) -> Result<StreamingCredential, GatewayError> {
        let url = self.url(TOKEN_PATH);
        let body = self.send(self.client.post(&url), &url).await?;
        decode_token(&body).ok_or_else(|| GatewayError::MissingToken {
            keys: describe_keys(&body),
        })
    }

    async fn chat(&self, message: &str) -> Result<String, GatewayError> {
        let url = self.url(CHAT_PATH);
        let mut payload = serde_json::json!({ "message": message });
        if let Some(id) = self.conversation_id() {
            payload["conversation_id"] = Value::String(id);
        }

        let body = self.send(self.client.post(&url).json(&payload), &url).await?;

        if let Some(id) = body.get("conversation_id").and_then(Value::as_str) {
            if let Ok(mut current) = self.conversation_id.write() {
                *current = Some(id.to_string());
            }
        }

        ["message", "answer", "response"]
            .iter()
            .filter_map(|key| body.get(*key))
            .filter_map(Value::as_str)
            .next()
            .map(str::to_string)
            .ok_or_else(|| GatewayError::Shape {
                endpoint: CHAT_PATH,
                reason: format!("no answer text (keys: {})", describe_keys(&body)),
            })
    }
}

fn normalize_base_url(base_url: &str) -> String {
    base_url.trim().trim_end_matches('/').to_string()
}

fn path_of(url: &str) -> &'static str {
    if url.ends_with(AVATARS_PATH) {
        AVATARS_PATH
    } else if url.ends_with(TOKEN_PATH) {
        TOKEN_PATH
    } else {
        CHAT_PATH
    }
}

/// Server-provided detail from an error body: `error`, then `detail`, then
/// the raw text.
fn error_detail(text: &str) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    let Ok(body) = serde_json::from_str::<Value>(trimmed) else {
        return Some(trimmed.to_string());
    };
    ["error", "detail"]
        .iter()
        .filter_map(|key| body.get(*key))
        .find(|v| !v.is_null())
        .map(|v| match v {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
        .or_else(|| Some(trimmed.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn lists_avatars_from_canonical_shape() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/interactive_avatars"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": { "avatars": [ { "avatar_id": "a1", "name": "Ann" } ] }
            })))
            .mount(&server)
            .await;

        let gateway = GatewayClient::new(&server.uri());
        let avatars = gateway.list_avatars().await.unwrap();

        assert_eq!(avatars, vec![AvatarDescriptor::new("a1", Some("Ann".into()))]);
    }

    #[tokio::test]
    async fn avatar_list_http_error_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/interactive_avatars"))
            .respond_with(ResponseTemplate::new(502).set_body_json(json!({ "error": "upstream down" })))
            .mount(&server)
            .await;

        let gateway = GatewayClient::new(&server.uri());
        let err = gateway.list_avatars().await.unwrap_err();

        assert_eq!(err.status(), Some(502));
        assert_eq!(err.to_string(), "HTTP 502: upstream down");
    }

    #[tokio::test]
    async fn token_http_500_carries_status_code() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/streaming_token"))
            .respond_with(ResponseTemplate::new(500).set_body_json(json!({
                "error": "HeyGen API error", "status": 500
            })))
            .mount(&server)
            .await;

        let gateway = GatewayClient::new(&server.uri());
        let err = gateway.get_streaming_token().await.unwrap_err();

        assert!(err.to_string().contains("500"));
    }

    #[tokio::test]
    async fn token_without_known_key_names_the_keys() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/streaming_token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "error": null, "result": {} })))
            .mount(&server)
            .await;

        let gateway = GatewayClient::new(&server.uri());
        match gateway.get_streaming_token().await {
            Err(GatewayError::MissingToken { keys }) => {
                assert!(keys.contains("error"));
                assert!(keys.contains("result"));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn chat_returns_message_and_keeps_conversation() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat"))
            .and(body_json(json!({ "message": "Hi" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "message": "Hello!", "conversation_id": "conv-1"
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/chat"))
            .and(body_json(json!({ "message": "More", "conversation_id": "conv-1" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "message": "Sure." })))
            .expect(1)
            .mount(&server)
            .await;

        let gateway = GatewayClient::new(&server.uri());
        assert_eq!(gateway.chat("Hi").await.unwrap(), "Hello!");
        assert_eq!(gateway.conversation_id().as_deref(), Some("conv-1"));
        assert_eq!(gateway.chat("More").await.unwrap(), "Sure.");
    }

    #[tokio::test]
    async fn chat_error_surfaces_detail() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat"))
            .respond_with(ResponseTemplate::new(422).set_body_json(json!({ "detail": "message too long" })))
            .mount(&server)
            .await;

        let gateway = GatewayClient::new(&server.uri());
        let err = gateway.chat("Hi").await.unwrap_err();

        assert_eq!(err.to_string(), "HTTP 422: message too long");
    }

    #[test]
    fn base_url_is_normalized_and_resettable() {
        let gateway = GatewayClient::new("http://localhost:3002/");
        assert_eq!(gateway.base_url(), "http://localhost:3002");

        gateway.set_base_url(" https://avatar.example.com/api/ ");
        assert_eq!(gateway.base_url(), "https://avatar.example.com/api");

        gateway.set_base_url("");
        assert_eq!(gateway.base_url(), "http://localhost:3002");
    }

    #[test]
    fn error_detail_prefers_error_then_detail() {
        assert_eq!(error_detail(r#"{"error":"a","detail":"b"}"#).as_deref(), Some("a"));
        assert_eq!(error_detail(r#"{"error":null,"detail":"b"}"#).as_deref(), Some("b"));
        assert_eq!(error_detail("plain text").as_deref(), Some("plain text"));
        assert_eq!(error_detail("  "), None);
    }
}
