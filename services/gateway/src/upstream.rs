use std::time::Duration;

use axum::http::StatusCode;
use reqwest::{Client, RequestBuilder};
use secrecy::{ExposeSecret, SecretString};
use serde_json::{Value, json};

use crate::config::Config;
use crate::error::ProxyError;

const API_KEY_HEADER: &str = "X-Api-Key";
pub const STREAMING_TOKEN_PATH: &str = "/v1/streaming.create_token";
pub const AVATARS_PATH: &str = "/v2/avatars";
pub const INTERACTIVE_AVATARS_PATH: &str = "/v1/streaming/avatar.list";
pub const VOICES_PATH: &str = "/v2/voices";

/// Calls the avatar vendor with the server-held API key, and the RAG backend.
pub struct Upstream {
    http: Client,
    api_key: SecretString,
    heygen_base_url: String,
    rag_api_url: String,
    vendor_timeout: Duration,
    rag_timeout: Duration,
}

impl Upstream {
    pub fn new(config: Config) -> Self {
        Self {
            http: Client::new(),
            api_key: config.heygen_api_key,
            heygen_base_url: config.heygen_base_url,
            rag_api_url: config.rag_api_url,
            vendor_timeout: config.vendor_timeout,
            rag_timeout: config.rag_timeout,
        }
    }

    fn vendor(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header(API_KEY_HEADER, self.api_key.expose_secret())
            .timeout(self.vendor_timeout)
    }

    /// GETs a vendor endpoint. Error bodies are relayed as `{error: text}`.
    pub async fn heygen_get(&self, path: &str) -> Result<Value, ProxyError> {
        let url = format!("{}{}", self.heygen_base_url, path);
        let response = self
            .vendor(self.http.get(&url))
            .send()
            .await
            .map_err(timeout_or)?;

        let status = response.status();
        let text = response.text().await.map_err(timeout_or)?;
        if !status.is_success() {
            tracing::warn!("GET {} answered HTTP {}: {}", path, status.as_u16(), text);
            return Err(upstream_error(status, json!({ "error": text })));
        }
        parse_body(&text)
    }

    /// Mints a short-lived streaming token.
    pub async fn create_streaming_token(&self) -> Result<Value, ProxyError> {
        let url = format!("{}{}", self.heygen_base_url, STREAMING_TOKEN_PATH);
        let response = self
            .vendor(self.http.post(&url))
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .send()
            .await
            .map_err(timeout_or)?;

        let status = response.status();
        let text = response.text().await.map_err(timeout_or)?;
        if status != reqwest::StatusCode::OK {
            tracing::error!("HeyGen API error ({}): {}", status.as_u16(), text);
            return Err(upstream_error(
                status,
                json!({
                    "error": text,
                    "status": status.as_u16(),
                    "details": "Check backend logs",
                }),
            ));
        }

        let body = parse_body(&text)?;
        if let Some(map) = body.as_object() {
            tracing::debug!(
                "token response keys: {}",
                map.keys().cloned().collect::<Vec<_>>().join(", ")
            );
        }
        Ok(body)
    }

    /// Forwards a chat payload. Error bodies are relayed when they are JSON.
    pub async fn rag_chat(&self, payload: &Value) -> Result<Value, ProxyError> {
        let response = self
            .http
            .post(&self.rag_api_url)
            .json(payload)
            .timeout(self.rag_timeout)
            .send()
            .await
            .map_err(rag_timeout_or)?;

        let status = response.status();
        let text = response.text().await.map_err(rag_timeout_or)?;
        if !status.is_success() {
            tracing::warn!("RAG API answered HTTP {}: {}", status.as_u16(), text);
            let body = serde_json::from_str::<Value>(&text)
                .unwrap_or_else(|_| json!({ "error": text }));
            return Err(upstream_error(status, body));
        }
        parse_body(&text)
    }
}

fn upstream_error(status: reqwest::StatusCode, body: Value) -> ProxyError {
    ProxyError::Upstream {
        status: StatusCode::from_u16(status.as_u16()).unwrap_or(StatusCode::BAD_GATEWAY),
        body,
    }
}

fn parse_body(text: &str) -> Result<Value, ProxyError> {
    serde_json::from_str(text).map_err(|e| ProxyError::BadUpstreamBody(e.to_string()))
}

fn timeout_or(e: reqwest::Error) -> ProxyError {
    if e.is_timeout() {
        ProxyError::Timeout(e.to_string())
    } else {
        ProxyError::Request(e)
    }
}

fn rag_timeout_or(e: reqwest::Error) -> ProxyError {
    if e.is_timeout() {
        ProxyError::Timeout(format!("{e}. RAG API is taking too long to respond."))
    } else {
        ProxyError::Request(e)
    }
}
