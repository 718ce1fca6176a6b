use std::sync::Arc;

use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{Map, Value, json};
use tower_http::cors::{Any, CorsLayer};

use crate::error::ProxyError;
use crate::upstream::{AVATARS_PATH, INTERACTIVE_AVATARS_PATH, Upstream, VOICES_PATH};

#[derive(Clone)]
pub struct AppState {
    upstream: Arc<Upstream>,
}

impl AppState {
    pub fn new(upstream: Upstream) -> Self {
        Self {
            upstream: Arc::new(upstream),
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    // Any origin may call in; the console and browser players run elsewhere.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(health))
        .route("/streaming_token", post(streaming_token))
        .route("/avatars", get(avatars))
        .route("/interactive_avatars", get(interactive_avatars))
        .route("/voices", get(voices))
        .route("/chat", post(chat))
        .layer(cors)
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "Interactive avatar gateway",
        "endpoints": {
            "streaming_token": "/streaming_token (POST)",
            "avatars": "/avatars (all avatars)",
            "interactive_avatars": "/interactive_avatars (streaming only)",
            "voices": "/voices",
            "chat": "/chat (POST)"
        },
        "limits": {
            "free_tier": {
                "resolution": "720p max",
                "session_duration": "3 minutes max",
                "credits_per_minute": "0.2 credits",
                "monthly_credits": "10 credits"
            }
        }
    }))
}

async fn streaming_token(State(state): State<AppState>) -> Result<Json<Value>, ProxyError> {
    let body = state.upstream.create_streaming_token().await?;
    tracing::info!("issued streaming token");
    Ok(Json(body))
}

async fn avatars(State(state): State<AppState>) -> Result<Json<Value>, ProxyError> {
    Ok(Json(state.upstream.heygen_get(AVATARS_PATH).await?))
}

async fn interactive_avatars(State(state): State<AppState>) -> Result<Json<Value>, ProxyError> {
    Ok(Json(state.upstream.heygen_get(INTERACTIVE_AVATARS_PATH).await?))
}

async fn voices(State(state): State<AppState>) -> Result<Json<Value>, ProxyError> {
    Ok(Json(state.upstream.heygen_get(VOICES_PATH).await?))
}

async fn chat(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<Value>, ProxyError> {
    let Json(body) = body.map_err(|rejection| ProxyError::InvalidBody(rejection.body_text()))?;

    let message = body
        .get("message")
        .and_then(Value::as_str)
        .filter(|m| !m.is_empty())
        .ok_or(ProxyError::MissingMessage)?;

    let mut payload = Map::new();
    payload.insert("message".to_string(), Value::String(message.to_string()));
    if let Some(id) = body
        .get("conversation_id")
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
    {
        payload.insert("conversation_id".to_string(), Value::String(id.to_string()));
    }

    tracing::debug!("forwarding chat message ({} chars)", message.chars().count());
    let answer = state.upstream.rag_chat(&Value::Object(payload)).await?;
    Ok(Json(answer))
}
