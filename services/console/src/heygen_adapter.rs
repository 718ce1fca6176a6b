use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result};
use async_trait::async_trait;
use avatar_core::credential::StreamingCredential;
use avatar_core::vendor::{
    AvatarQuality, AvatarSession, AvatarVendor, MediaStreamRef, SessionEvent, SpeakRequest,
    StartAvatarRequest,
};
use heygen_streaming::types::{self, NewSessionRequest, ServerEvent, TaskRequest, TaskType};
use heygen_streaming::{Config, StreamingAvatar, StreamingSession};
use secrecy::SecretString;
use tokio::sync::broadcast::error::RecvError;

const EVENT_CHANNEL_CAPACITY: usize = 128;

/// Implements the core `AvatarVendor` trait over the HeyGen streaming client.
pub struct HeyGenVendor {
    api_base: String,
}

impl HeyGenVendor {
    pub fn new(api_base: &str) -> Self {
        Self {
            api_base: api_base.to_string(),
        }
    }
}

#[async_trait]
impl AvatarVendor for HeyGenVendor {
    async fn create_start_avatar(
        &self,
        credential: &StreamingCredential,
        request: StartAvatarRequest,
    ) -> Result<Box<dyn AvatarSession>> {
        let config = Config::builder()
            .with_base_url(&self.api_base)
            .with_token(SecretString::from(credential.expose().to_string()))
            .build();
        let client = StreamingAvatar::new(config);

        let new_session = NewSessionRequest::new(&request.avatar_name)
            .with_quality(vendor_quality(request.quality));
        let session = client
            .create_start_avatar(&new_session)
            .await
            .context("Failed to create and start avatar session")?;

        let session: Box<dyn AvatarSession> = Box::new(HeyGenSession {
            client,
            session,
            events_taken: AtomicBool::new(false),
        });
        Ok(session)
    }
}

/// A running HeyGen session, seen through the core `AvatarSession` trait.
pub struct HeyGenSession {
    client: StreamingAvatar,
    session: StreamingSession,
    events_taken: AtomicBool,
}

#[async_trait]
impl AvatarSession for HeyGenSession {
    fn session_id(&self) -> Option<String> {
        let id = self.session.session_id();
        (!id.is_empty()).then(|| id.to_string())
    }

    fn media_stream(&self) -> Option<MediaStreamRef> {
        self.session.media_stream().map(|stream| MediaStreamRef {
            room_url: stream.room_url().to_string(),
        })
    }

    async fn speak(&self, request: SpeakRequest) -> Result<()> {
        // Repeat, not talk: the answer comes from our own backend.
        let task = TaskRequest::new(&request.session_id, &request.text)
            .with_task_type(TaskType::Repeat);
        let info = self
            .client
            .speak(&task)
            .await
            .context("Adapter failed to send speak task")?;
        tracing::debug!(
            "speak task {:?} accepted, {:?} ms",
            info.task_id(),
            info.duration_ms()
        );
        Ok(())
    }

    async fn interrupt(&self, session_id: &str) -> Result<()> {
        self.client
            .interrupt(session_id)
            .await
            .context("Adapter failed to interrupt avatar")
    }

    async fn stop_avatar(&self, session_id: &str) -> Result<()> {
        self.client
            .stop_avatar(session_id)
            .await
            .context("Adapter failed to stop avatar session")
    }

    async fn close_connection(&self) -> Result<()> {
        self.session
            .close_connection()
            .await
            .context("Adapter failed to close event connection")
    }

    fn stop_media_tracks(&self) {
        self.session.stop_media_tracks();
    }

    async fn server_events(&self) -> Option<tokio::sync::mpsc::Receiver<SessionEvent>> {
        if self.events_taken.swap(true, Ordering::SeqCst) {
            tracing::warn!("server_events channel has already been taken");
            return None;
        }
        let mut vendor_rx = self.session.server_events().await?;

        let (tx, rx) = tokio::sync::mpsc::channel(EVENT_CHANNEL_CAPACITY);
        tokio::spawn(async move {
            loop {
                let event = match vendor_rx.recv().await {
                    Ok(event) => event,
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!("dropped {} avatar events", skipped);
                        continue;
                    }
                    Err(RecvError::Closed) => break,
                };
                let Some(event) = to_session_event(event) else {
                    continue;
                };
                if tx.send(event).await.is_err() {
                    tracing::debug!("session event receiver dropped, stopping adapter task");
                    break;
                }
            }
        });
        Some(rx)
    }
}

fn vendor_quality(quality: AvatarQuality) -> types::AvatarQuality {
    match quality {
        AvatarQuality::Low => types::AvatarQuality::Low,
        AvatarQuality::Medium => types::AvatarQuality::Medium,
        AvatarQuality::High => types::AvatarQuality::High,
    }
}

fn to_session_event(event: ServerEvent) -> Option<SessionEvent> {
    match event {
        ServerEvent::AvatarStartTalking(_) => Some(SessionEvent::AvatarStartTalking),
        ServerEvent::AvatarStopTalking(_) => Some(SessionEvent::AvatarStopTalking),
        ServerEvent::AvatarTalkingMessage(data) => {
            Some(SessionEvent::AvatarMessage(data.message().to_string()))
        }
        ServerEvent::UserTalkingMessage(data) => {
            Some(SessionEvent::UserMessage(data.message().to_string()))
        }
        ServerEvent::Close { reason } => Some(SessionEvent::Closed(reason)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn mount_session(server: &MockServer) {
        Mock::given(method("POST"))
            .and(path("/v1/streaming.new"))
            .and(header("authorization", "Bearer tok-1"))
            .and(body_partial_json(json!({ "avatar_name": "a1", "quality": "low" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "code": 100,
                "data": {
                    "session_id": "s-1",
                    "url": "wss://room.example",
                    "access_token": "room-token"
                },
                "message": "success"
            })))
            .expect(1)
            .mount(server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/streaming.start"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "code": 100, "data": null, "message": "success"
            })))
            .expect(1)
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn creates_low_quality_session_and_speaks_repeat_tasks() {
        let server = MockServer::start().await;
        mount_session(&server).await;
        Mock::given(method("POST"))
            .and(path("/v1/streaming.task"))
            .and(body_json(json!({
                "session_id": "s-1",
                "text": "Hello!",
                "task_type": "repeat",
                "task_mode": "async"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "code": 100,
                "data": { "task_id": "t-1", "duration_ms": 900.0 },
                "message": "success"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let vendor = HeyGenVendor::new(&server.uri());
        let request = StartAvatarRequest {
            avatar_name: "a1".to_string(),
            quality: AvatarQuality::Low,
        };
        let session = vendor
            .create_start_avatar(&StreamingCredential::new("tok-1"), request)
            .await
            .unwrap();

        assert_eq!(session.session_id().as_deref(), Some("s-1"));
        session
            .speak(SpeakRequest {
                text: "Hello!".to_string(),
                session_id: "s-1".to_string(),
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn interrupt_reaches_the_vendor() {
        let server = MockServer::start().await;
        mount_session(&server).await;
        Mock::given(method("POST"))
            .and(path("/v1/streaming.interrupt"))
            .and(body_json(json!({ "session_id": "s-1" })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let vendor = HeyGenVendor::new(&server.uri());
        let request = StartAvatarRequest {
            avatar_name: "a1".to_string(),
            quality: AvatarQuality::Low,
        };
        let session = vendor
            .create_start_avatar(&StreamingCredential::new("tok-1"), request)
            .await
            .unwrap();

        session.interrupt("s-1").await.unwrap();
    }

    #[tokio::test]
    async fn rejected_session_surfaces_vendor_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/streaming.new"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "code": 10013, "message": "avatar not allowed"
            })))
            .mount(&server)
            .await;

        let vendor = HeyGenVendor::new(&server.uri());
        let request = StartAvatarRequest {
            avatar_name: "a1".to_string(),
            quality: AvatarQuality::Low,
        };
        let err = match vendor
            .create_start_avatar(&StreamingCredential::new("tok-1"), request)
            .await
        {
            Err(e) => e,
            Ok(_) => panic!("session should have been rejected"),
        };

        assert!(format!("{err:#}").contains("avatar not allowed"));
    }

    #[test]
    fn maps_vendor_events() {
        let event: ServerEvent = serde_json::from_value(json!({
            "type": "avatar_talking_message", "task_id": "t-1", "message": "Hel"
        }))
        .unwrap();
        assert_eq!(
            to_session_event(event),
            Some(SessionEvent::AvatarMessage("Hel".to_string()))
        );

        let closed = ServerEvent::Close {
            reason: Some("timeout".to_string()),
        };
        assert_eq!(
            to_session_event(closed),
            Some(SessionEvent::Closed(Some("timeout".to_string())))
        );
        assert_eq!(to_session_event(ServerEvent::Unknown), None);
    }
}
