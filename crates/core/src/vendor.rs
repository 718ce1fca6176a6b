use anyhow::Result;
use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use tokio::sync::mpsc;

use crate::credential::StreamingCredential;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AvatarQuality {
    #[default]
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartAvatarRequest {
    pub avatar_name: String,
    pub quality: AvatarQuality,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpeakRequest {
    pub text: String,
    pub session_id: String,
}

/// Where the avatar's audio and video can be picked up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaStreamRef {
    pub room_url: String,
}

/// Vendor-neutral events of a running session.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    AvatarStartTalking,
    AvatarStopTalking,
    AvatarMessage(String),
    UserMessage(String),
    Closed(Option<String>),
}

/// Constructs vendor sessions. One call per session negotiation; the
/// credential is only needed for the duration of the call.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait AvatarVendor: Send + Sync {
    async fn create_start_avatar(
        &self,
        credential: &StreamingCredential,
        request: StartAvatarRequest,
    ) -> Result<Box<dyn AvatarSession>>;
}

/// The handle of one vendor session.
///
/// The media stream appears some time after creation, and vendors give no
/// signal for it, so owners poll [`AvatarSession::media_stream`].
#[cfg_attr(test, automock)]
#[async_trait]
pub trait AvatarSession: Send + Sync {
    fn session_id(&self) -> Option<String>;

    fn media_stream(&self) -> Option<MediaStreamRef>;

    async fn speak(&self, request: SpeakRequest) -> Result<()>;

    /// Cuts off the answer the avatar is currently speaking.
    async fn interrupt(&self, session_id: &str) -> Result<()>;

    async fn stop_avatar(&self, session_id: &str) -> Result<()>;

    async fn close_connection(&self) -> Result<()>;

    fn stop_media_tracks(&self);

    /// Takes the event feed of the session, if the vendor offers one. Only
    /// the first call returns `Some`.
    async fn server_events(&self) -> Option<mpsc::Receiver<SessionEvent>>;
}
