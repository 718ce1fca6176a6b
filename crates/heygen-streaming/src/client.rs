use std::sync::{Arc, Mutex};

use heygen_streaming_types::{
    ApiResponse, NewSessionRequest, SessionIdRequest, SessionInfo, TaskInfo, TaskRequest,
};
use secrecy::ExposeSecret;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::task::JoinHandle;

use crate::client::config::Config;
use crate::client::connection::{Connection, MediaStream, ServerRx};
use crate::client::consts::{
    INTERRUPT_PATH, KEEP_ALIVE_PATH, NEW_SESSION_PATH, START_SESSION_PATH, STOP_SESSION_PATH,
    TASK_PATH,
};
use crate::client::error::{Error, Result};

pub(crate) mod config;
pub(crate) mod connection;
mod consts;
pub(crate) mod error;
mod utils;

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// REST client bound to one streaming credential.
pub struct StreamingAvatar {
    http: reqwest::Client,
    config: Arc<Config>,
}

impl StreamingAvatar {
    pub fn new(config: Config) -> Self {
        Self {
            http: reqwest::Client::new(),
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Creates a session, starts it and begins connecting its event websocket.
    ///
    /// Returns as soon as the vendor accepted the start request. The media
    /// stream of the returned session stays empty until the websocket is up;
    /// there is no notification for that, callers poll
    /// [`StreamingSession::media_stream`].
    pub async fn create_start_avatar(&self, request: &NewSessionRequest) -> Result<StreamingSession> {
        tracing::info!(
            "creating streaming session for avatar {} ({})",
            request.avatar_name(),
            request.quality().as_str()
        );
        let info: SessionInfo = self
            .post(NEW_SESSION_PATH, request)
            .await?
            .ok_or(Error::MissingData("session data"))?;
        tracing::debug!("session {} created", info.session_id());

        let started = self
            .post::<_, serde_json::Value>(START_SESSION_PATH, &SessionIdRequest::new(info.session_id()))
            .await;
        if let Err(e) = started {
            // The session exists on the vendor side and counts against the quota.
            if let Err(stop_err) = self.stop_avatar(info.session_id()).await {
                tracing::warn!(
                    "failed to stop session {} after a failed start: {}",
                    info.session_id(),
                    stop_err
                );
            }
            return Err(e);
        }
        tracing::info!("session {} started", info.session_id());

        Ok(StreamingSession::connect(self.config.clone(), info))
    }

    pub async fn speak(&self, request: &TaskRequest) -> Result<TaskInfo> {
        tracing::debug!(
            "sending {:?} task to session {}",
            request.task_type(),
            request.session_id()
        );
        self.post(TASK_PATH, request)
            .await?
            .ok_or(Error::MissingData("task data"))
    }

    pub async fn stop_avatar(&self, session_id: &str) -> Result<()> {
        self.post::<_, serde_json::Value>(STOP_SESSION_PATH, &SessionIdRequest::new(session_id))
            .await?;
        tracing::info!("session {} stopped", session_id);
        Ok(())
    }

    /// Cuts off whatever the avatar is currently saying.
    pub async fn interrupt(&self, session_id: &str) -> Result<()> {
        self.post::<_, serde_json::Value>(INTERRUPT_PATH, &SessionIdRequest::new(session_id))
            .await?;
        Ok(())
    }

    /// Resets the vendor's idle timer for the session.
    pub async fn keep_alive(&self, session_id: &str) -> Result<()> {
        self.post::<_, serde_json::Value>(KEEP_ALIVE_PATH, &SessionIdRequest::new(session_id))
            .await?;
        Ok(())
    }

    async fn post<B, T>(&self, path: &str, body: &B) -> Result<Option<T>>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = utils::endpoint(&self.config, path);
        let response = self
            .http
            .post(&url)
            .bearer_auth(self.config.token().expose_secret())
            .json(body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            tracing::warn!("{} answered HTTP {}: {}", path, status.as_u16(), text);
            return Err(Error::from_body(status.as_u16(), &text));
        }
        if text.trim().is_empty() {
            return Ok(None);
        }

        let envelope: ApiResponse<T> = serde_json::from_str(&text)?;
        Ok(envelope.into_data())
    }
}

/// One running avatar session: its identifiers, its media room and its
/// event connection.
pub struct StreamingSession {
    info: SessionInfo,
    media: Arc<Mutex<Option<MediaStream>>>,
    connection: Arc<tokio::sync::Mutex<Option<Connection>>>,
    connect_task: JoinHandle<()>,
}

impl StreamingSession {
    fn connect(config: Arc<Config>, info: SessionInfo) -> Self {
        let media = Arc::new(Mutex::new(None));
        let connection = Arc::new(tokio::sync::Mutex::new(None));

        let task_media = media.clone();
        let task_connection = connection.clone();
        let session_id = info.session_id().to_string();
        let room_url = info.url().to_string();
        let access_token = info.access_token().to_string();

        let connect_task = tokio::spawn(async move {
            let request = match utils::build_request(&config, &session_id, &access_token) {
                Ok(request) => request,
                Err(e) => {
                    tracing::error!("invalid event url for session {}: {}", session_id, e);
                    return;
                }
            };
            match Connection::open(request, EVENT_CHANNEL_CAPACITY).await {
                Ok(conn) => {
                    *task_connection.lock().await = Some(conn);
                    let stream = MediaStream::new(&room_url);
                    match task_media.lock() {
                        Ok(mut slot) => *slot = Some(stream),
                        Err(_) => tracing::error!("media slot poisoned for session {}", session_id),
                    }
                    tracing::info!("event connection established for session {}", session_id);
                }
                Err(e) => {
                    tracing::error!("failed to open event connection for session {}: {}", session_id, e);
                }
            }
        });

        Self {
            info,
            media,
            connection,
            connect_task,
        }
    }

    pub fn session_id(&self) -> &str {
        self.info.session_id()
    }

    pub fn info(&self) -> &SessionInfo {
        &self.info
    }

    /// The media room, once the session is fully connected.
    pub fn media_stream(&self) -> Option<MediaStream> {
        self.media.lock().ok().and_then(|slot| slot.clone())
    }

    pub async fn server_events(&self) -> Option<ServerRx> {
        self.connection
            .lock()
            .await
            .as_ref()
            .map(Connection::server_events)
    }

    /// Closes the event connection, or abandons it if it is still being
    /// established.
    pub async fn close_connection(&self) -> Result<()> {
        self.connect_task.abort();
        match self.connection.lock().await.take() {
            Some(mut conn) => conn.close().await,
            None => Err(Error::NotConnected),
        }
    }

    pub fn stop_media_tracks(&self) {
        if let Ok(mut slot) = self.media.lock() {
            if let Some(stream) = slot.take() {
                stream.stop_tracks();
            }
        }
    }
}

impl Drop for StreamingSession {
    fn drop(&mut self) {
        self.connect_task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use heygen_streaming_types::AvatarQuality;
    use secrecy::SecretString;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> StreamingAvatar {
        StreamingAvatar::new(
            Config::builder()
                .with_base_url(&server.uri())
                .with_token(SecretString::from("token-abc".to_string()))
                .build(),
        )
    }

    #[tokio::test]
    async fn create_start_avatar_creates_then_starts() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/streaming.new"))
            .and(header("authorization", "Bearer token-abc"))
            .and(body_json(serde_json::json!({
                "avatar_name": "a1",
                "quality": "low",
                "version": "v2",
                "source": "sdk"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "code": 100,
                "data": {
                    "session_id": "s-1",
                    "url": "wss://room.example",
                    "access_token": "room-token"
                },
                "message": "success"
            })))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/v1/streaming.start"))
            .and(body_json(serde_json::json!({ "session_id": "s-1" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "code": 100,
                "data": null,
                "message": "success"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let avatar = client_for(&server);
        let request = NewSessionRequest::new("a1").with_quality(AvatarQuality::Low);
        let session = avatar.create_start_avatar(&request).await.unwrap();

        assert_eq!(session.session_id(), "s-1");
        assert_eq!(session.info().url(), "wss://room.example");
    }

    #[tokio::test]
    async fn rejected_session_surfaces_vendor_message() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/streaming.new"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "code": 10013,
                "message": "avatar is not allowed"
            })))
            .mount(&server)
            .await;

        let avatar = client_for(&server);
        let err = match avatar.create_start_avatar(&NewSessionRequest::new("bad")).await {
            Ok(_) => panic!("session should have been rejected"),
            Err(e) => e,
        };

        assert_eq!(err.status(), Some(400));
        match err {
            Error::Api { code, message, .. } => {
                assert_eq!(code.as_deref(), Some("10013"));
                assert_eq!(message, "avatar is not allowed");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn speak_posts_repeat_task() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/streaming.task"))
            .and(body_json(serde_json::json!({
                "session_id": "s-1",
                "text": "Hello!",
                "task_type": "repeat",
                "task_mode": "async"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "code": 100,
                "data": { "task_id": "t-9", "duration_ms": 1200.0 },
                "message": "success"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let avatar = client_for(&server);
        let task = avatar
            .speak(&TaskRequest::new("s-1", "Hello!"))
            .await
            .unwrap();

        assert_eq!(task.task_id(), Some("t-9"));
    }

    #[tokio::test]
    async fn stop_accepts_empty_body() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/streaming.stop"))
            .and(body_json(serde_json::json!({ "session_id": "s-1" })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let avatar = client_for(&server);
        avatar.stop_avatar("s-1").await.unwrap();
    }

    #[tokio::test]
    async fn failed_start_stops_the_created_session() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/streaming.new"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": { "session_id": "s-1", "url": "wss://room.example", "access_token": "rt" }
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/streaming.start"))
            .respond_with(ResponseTemplate::new(500).set_body_string("start failed"))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/streaming.stop"))
            .and(body_json(serde_json::json!({ "session_id": "s-1" })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let avatar = client_for(&server);
        let err = match avatar.create_start_avatar(&NewSessionRequest::new("a1")).await {
            Ok(_) => panic!("start should have failed"),
            Err(e) => e,
        };

        assert_eq!(err.status(), Some(500));
    }

    #[tokio::test]
    async fn failed_cleanup_keeps_the_start_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/streaming.new"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": { "session_id": "s-1", "url": "wss://room.example", "access_token": "rt" }
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/streaming.start"))
            .respond_with(ResponseTemplate::new(503).set_body_string("busy"))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/streaming.stop"))
            .respond_with(ResponseTemplate::new(404).set_body_string("gone"))
            .expect(1)
            .mount(&server)
            .await;

        let avatar = client_for(&server);
        let err = match avatar.create_start_avatar(&NewSessionRequest::new("a1")).await {
            Ok(_) => panic!("start should have failed"),
            Err(e) => e,
        };

        assert_eq!(err.status(), Some(503));
    }

    #[tokio::test]
    async fn interrupt_and_keep_alive_post_the_session_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/streaming.interrupt"))
            .and(header("authorization", "Bearer token-abc"))
            .and(body_json(serde_json::json!({ "session_id": "s-1" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "code": 100, "data": null, "message": "success"
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/streaming.keep_alive"))
            .and(body_json(serde_json::json!({ "session_id": "s-1" })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let avatar = client_for(&server);
        avatar.interrupt("s-1").await.unwrap();
        avatar.keep_alive("s-1").await.unwrap();
    }

    #[tokio::test]
    async fn interrupt_of_unknown_session_is_an_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/streaming.interrupt"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "code": 10005, "message": "session not found"
            })))
            .mount(&server)
            .await;

        let avatar = client_for(&server);
        let err = avatar.interrupt("s-9").await.unwrap_err();

        assert_eq!(err.status(), Some(400));
        assert!(err.to_string().contains("session not found"));
    }

    #[tokio::test]
    async fn media_is_absent_until_connected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/streaming.new"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": { "session_id": "s-2", "url": "wss://room.example", "access_token": "rt" }
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/streaming.start"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let avatar = client_for(&server);
        let session = avatar
            .create_start_avatar(&NewSessionRequest::new("a1"))
            .await
            .unwrap();

        // The mock server does not speak websocket, so the connection never comes up.
        assert!(session.media_stream().is_none());
        assert!(session.close_connection().await.is_err());
        session.stop_media_tracks();
    }
}
