use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::Command;
use crate::gateway::{Gateway, GatewayError};
use crate::status::StatusReporter;
use crate::vendor::{
    AvatarQuality, AvatarSession, AvatarVendor, MediaStreamRef, SessionEvent, SpeakRequest,
    StartAvatarRequest,
};

/// Shortest media poll interval; anything below is raised to it.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Longest text the vendor accepts in one speak task.
pub const TRANSPORT_TEXT_LIMIT: usize = 300;
const ELLIPSIS: &str = "...";

/// Cuts `text` to [`TRANSPORT_TEXT_LIMIT`] characters, ending in an ellipsis
/// when anything was removed.
pub fn truncate_for_transport(text: &str) -> String {
    if text.chars().count() <= TRANSPORT_TEXT_LIMIT {
        return text.to_string();
    }
    let keep = TRANSPORT_TEXT_LIMIT - ELLIPSIS.len();
    let mut truncated: String = text.chars().take(keep).collect();
    truncated.push_str(ELLIPSIS);
    truncated
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Starting,
    Active,
    Stopping,
    Error,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SessionState::Idle => "idle",
            SessionState::Starting => "starting",
            SessionState::Active => "active",
            SessionState::Stopping => "stopping",
            SessionState::Error => "failed",
        };
        f.write_str(label)
    }
}

/// Timing and quality knobs of a session.
#[derive(Debug, Clone)]
pub struct SessionLimits {
    /// How often the handle is checked for a media stream.
    pub poll_interval: Duration,
    /// How long to wait for the media stream before giving up.
    pub media_timeout: Duration,
    /// Hard ceiling on a session's lifetime, from the vendor's usage quota.
    pub max_duration: Duration,
    pub quality: AvatarQuality,
}

impl Default for SessionLimits {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(250),
            media_timeout: Duration::from_secs(15),
            max_duration: Duration::from_secs(180),
            quality: AvatarQuality::Low,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("session is already {0}")]
    AlreadyRunning(SessionState),
    #[error("no avatar selected")]
    NoAvatarSelected,
    #[error("no active session")]
    NotActive,
    #[error("session has no id")]
    NoSessionId,
    #[error("nothing to say")]
    EmptyText,
    #[error("could not get a streaming token: {0}")]
    Token(#[source] GatewayError),
    #[error("avatar service rejected the session: {0:#}")]
    Vendor(anyhow::Error),
    #[error("video stream did not arrive within {}s", .0.as_secs())]
    MediaTimeout(Duration),
    #[error("avatar could not speak: {0:#}")]
    Speak(anyhow::Error),
    #[error("avatar could not be interrupted: {0:#}")]
    Interrupt(anyhow::Error),
}

/// Owns the lifecycle of the single streaming session.
///
/// `Idle → Starting → Active → Stopping → Idle`, with `Error` entered from
/// `Starting` or `Active` and always followed by a teardown back to `Idle`.
/// Every method takes `&mut self`, so one owner drives the controller and a
/// second `start` can never interleave with one still in flight.
pub struct AvatarSessionController {
    gateway: Arc<dyn Gateway>,
    vendor: Arc<dyn AvatarVendor>,
    status: StatusReporter,
    limits: SessionLimits,
    command_tx: mpsc::Sender<Command>,
    state_tx: watch::Sender<SessionState>,
    session: Option<Box<dyn AvatarSession>>,
    media: Option<MediaStreamRef>,
    auto_stop: Option<JoinHandle<()>>,
    event_forwarder: Option<JoinHandle<()>>,
    // Bumped on every start so timer and event commands from an earlier
    // session can be told apart.
    generation: u64,
}

impl AvatarSessionController {
    pub fn new(
        gateway: Arc<dyn Gateway>,
        vendor: Arc<dyn AvatarVendor>,
        status: StatusReporter,
        command_tx: mpsc::Sender<Command>,
    ) -> Self {
        let (state_tx, _) = watch::channel(SessionState::Idle);
        Self {
            gateway,
            vendor,
            status,
            limits: SessionLimits::default(),
            command_tx,
            state_tx,
            session: None,
            media: None,
            auto_stop: None,
            event_forwarder: None,
            generation: 0,
        }
    }

    pub fn with_limits(mut self, mut limits: SessionLimits) -> Self {
        if limits.poll_interval < MIN_POLL_INTERVAL {
            tracing::warn!(
                "media poll interval {:?} is too short, using {:?}",
                limits.poll_interval,
                MIN_POLL_INTERVAL
            );
            limits.poll_interval = MIN_POLL_INTERVAL;
        }
        self.limits = limits;
        self
    }

    pub fn state(&self) -> SessionState {
        *self.state_tx.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<SessionState> {
        self.state_tx.subscribe()
    }

    pub fn media_stream(&self) -> Option<&MediaStreamRef> {
        self.media.as_ref()
    }

    pub fn session_id(&self) -> Option<String> {
        self.session.as_ref().and_then(|s| s.session_id())
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn limits(&self) -> &SessionLimits {
        &self.limits
    }

    fn set_state(&self, next: SessionState) {
        let previous = self.state_tx.send_replace(next);
        if previous != next {
            tracing::debug!("session state {} -> {}", previous, next);
        }
    }

    /// Opens a session with `avatar_id`. Outcomes are reported on the status
    /// line; a failed start leaves the controller `Idle`.
    pub async fn start(&mut self, avatar_id: &str) -> Result<(), SessionError> {
        let state = self.state();
        if state != SessionState::Idle {
            tracing::warn!("start requested while session is {}", state);
            self.status
                .warning(format!("Session is already {state}; stop it first"));
            return Err(SessionError::AlreadyRunning(state));
        }

        let avatar_id = avatar_id.trim();
        if avatar_id.is_empty() {
            self.status.warning("Select an avatar first");
            return Err(SessionError::NoAvatarSelected);
        }

        self.generation += 1;
        self.set_state(SessionState::Starting);
        self.status
            .info(format!("Starting session with {avatar_id}..."));

        if let Err(e) = self.establish(avatar_id).await {
            self.set_state(SessionState::Error);
            self.teardown().await;
            match e {
                SessionError::MediaTimeout(_) => {
                    self.status.warning(format!("{e}; session stopped"))
                }
                _ => self.status.error(format!("Failed to start session: {e}")),
            }
            return Err(e);
        }
        Ok(())
    }

    async fn establish(&mut self, avatar_id: &str) -> Result<(), SessionError> {
        let credential = self
            .gateway
            .get_streaming_token()
            .await
            .map_err(SessionError::Token)?;
        tracing::debug!("streaming token acquired");

        let request = StartAvatarRequest {
            avatar_name: avatar_id.to_string(),
            quality: self.limits.quality,
        };
        let session = self
            .vendor
            .create_start_avatar(&credential, request)
            .await
            .map_err(SessionError::Vendor)?;
        drop(credential);

        // Owned from here on, so a failure below still gets torn down.
        let session = self.session.insert(session);
        let media = wait_for_media(&**session, &self.limits).await?;
        let events = session.server_events().await;
        let session_id = session.session_id().unwrap_or_default();

        tracing::info!("media stream ready at {}", media.room_url);
        self.media = Some(media);
        self.set_state(SessionState::Active);
        self.arm_auto_stop();
        if let Some(events) = events {
            self.forward_events(events);
        }
        self.status
            .success(format!("Session {session_id} started"));
        Ok(())
    }

    fn arm_auto_stop(&mut self) {
        let command_tx = self.command_tx.clone();
        let generation = self.generation;
        let ceiling = self.limits.max_duration;
        self.auto_stop = Some(tokio::spawn(async move {
            tokio::time::sleep(ceiling).await;
            if command_tx
                .send(Command::SessionExpired { generation })
                .await
                .is_err()
            {
                tracing::debug!("session expired but nobody is listening");
            }
        }));
    }

    fn forward_events(&mut self, mut events: mpsc::Receiver<SessionEvent>) {
        let command_tx = self.command_tx.clone();
        let generation = self.generation;
        self.event_forwarder = Some(tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                if command_tx
                    .send(Command::Session { generation, event })
                    .await
                    .is_err()
                {
                    break;
                }
            }
        }));
    }

    /// Applies a command produced by one of the controller's background tasks.
    pub async fn handle_command(&mut self, command: Command) {
        match command {
            Command::SessionExpired { generation } => {
                if generation != self.generation || self.state() != SessionState::Active {
                    tracing::debug!("ignoring expiry of session generation {}", generation);
                    return;
                }
                self.teardown().await;
                self.status.warning(format!(
                    "Session reached its {}s limit and was stopped",
                    self.limits.max_duration.as_secs()
                ));
            }
            Command::Session { generation, event } => {
                if generation != self.generation {
                    return;
                }
                match event {
                    SessionEvent::AvatarStartTalking => tracing::debug!("avatar started talking"),
                    SessionEvent::AvatarStopTalking => tracing::debug!("avatar stopped talking"),
                    SessionEvent::AvatarMessage(text) => tracing::info!("avatar: {}", text),
                    SessionEvent::UserMessage(text) => tracing::info!("user: {}", text),
                    SessionEvent::Closed(reason) => {
                        if self.state() != SessionState::Active {
                            return;
                        }
                        self.set_state(SessionState::Error);
                        self.teardown().await;
                        let reason = reason.unwrap_or_else(|| "no reason given".to_string());
                        self.status
                            .error(format!("Avatar connection closed ({reason})"));
                    }
                }
            }
        }
    }

    /// Has the avatar speak `text`, cut to the transport limit.
    pub async fn speak(&self, text: &str) -> Result<(), SessionError> {
        if self.state() != SessionState::Active {
            return Err(SessionError::NotActive);
        }
        let text = text.trim();
        if text.is_empty() {
            return Err(SessionError::EmptyText);
        }
        let session = self.session.as_ref().ok_or(SessionError::NotActive)?;
        let session_id = session.session_id().ok_or(SessionError::NoSessionId)?;

        let request = SpeakRequest {
            text: truncate_for_transport(text),
            session_id,
        };
        session.speak(request).await.map_err(SessionError::Speak)
    }

    /// Stops the answer in progress. The session stays active.
    pub async fn interrupt(&self) -> Result<(), SessionError> {
        if self.state() != SessionState::Active {
            return Err(SessionError::NotActive);
        }
        let session = self.session.as_ref().ok_or(SessionError::NotActive)?;
        let session_id = session.session_id().ok_or(SessionError::NoSessionId)?;
        session
            .interrupt(&session_id)
            .await
            .map_err(SessionError::Interrupt)
    }

    /// Ends the current session, if any. Safe to call in any state.
    pub async fn stop(&mut self) {
        if self.state() == SessionState::Idle && self.session.is_none() {
            tracing::debug!("stop requested with no session");
            return;
        }
        self.teardown().await;
        self.status.info("Session stopped");
    }

    // Every step is attempted regardless of earlier failures; the controller
    // always ends up Idle.
    async fn teardown(&mut self) {
        self.set_state(SessionState::Stopping);

        if let Some(timer) = self.auto_stop.take() {
            timer.abort();
        }
        if let Some(forwarder) = self.event_forwarder.take() {
            forwarder.abort();
        }

        if let Some(session) = self.session.take() {
            if let Err(e) = session.close_connection().await {
                tracing::warn!("failed to close avatar connection: {:#}", e);
            }
            session.stop_media_tracks();
            match session.session_id() {
                Some(id) => {
                    if let Err(e) = session.stop_avatar(&id).await {
                        tracing::warn!("failed to stop avatar session {}: {:#}", id, e);
                    }
                }
                None => tracing::debug!("session never got an id; nothing to stop remotely"),
            }
        }

        self.media = None;
        self.set_state(SessionState::Idle);
    }
}

async fn wait_for_media(
    session: &dyn AvatarSession,
    limits: &SessionLimits,
) -> Result<MediaStreamRef, SessionError> {
    let poll = async {
        let mut ticker = tokio::time::interval(limits.poll_interval);
        loop {
            ticker.tick().await;
            if let Some(media) = session.media_stream() {
                return media;
            }
        }
    };
    tokio::time::timeout(limits.media_timeout, poll)
        .await
        .map_err(|_| SessionError::MediaTimeout(limits.media_timeout))
}
