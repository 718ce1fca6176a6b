use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures_util::{SinkExt, StreamExt};
use heygen_streaming_types::ServerEvent;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::client::Request;

use crate::client::error::{Error, Result};

type ClientTx = tokio::sync::mpsc::Sender<Message>;
type ServerTx = tokio::sync::broadcast::Sender<ServerEvent>;
pub type ServerRx = tokio::sync::broadcast::Receiver<ServerEvent>;

/// The room an avatar publishes its audio and video tracks into.
///
/// Rendering is left to whatever WebRTC player attaches to `room_url`; this
/// handle only tracks whether the local side still considers the tracks live.
#[derive(Debug, Clone)]
pub struct MediaStream {
    inner: Arc<MediaInner>,
}

#[derive(Debug)]
struct MediaInner {
    room_url: String,
    live: AtomicBool,
}

impl MediaStream {
    pub fn new(room_url: &str) -> Self {
        Self {
            inner: Arc::new(MediaInner {
                room_url: room_url.to_string(),
                live: AtomicBool::new(true),
            }),
        }
    }

    pub fn room_url(&self) -> &str {
        &self.inner.room_url
    }

    pub fn is_live(&self) -> bool {
        self.inner.live.load(Ordering::SeqCst)
    }

    /// Marks every track as ended. Clones share the flag.
    pub fn stop_tracks(&self) {
        if self.inner.live.swap(false, Ordering::SeqCst) {
            tracing::debug!("media tracks stopped for room {}", self.inner.room_url);
        }
    }
}

/// The event websocket of one streaming session.
pub struct Connection {
    c_tx: Option<ClientTx>,
    s_tx: ServerTx,
}

impl Connection {
    pub(crate) async fn open(request: Request, capacity: usize) -> Result<Self> {
        let (ws_stream, _) = tokio_tungstenite::connect_async(request).await?;

        // Split the WebSocket into read and write halves.
        let (mut write, mut read) = ws_stream.split();

        let (c_tx, mut c_rx) = tokio::sync::mpsc::channel::<Message>(capacity);
        let (s_tx, _) = tokio::sync::broadcast::channel(capacity);

        // Outbound frames. The channel closing (or a close frame) ends the task.
        tokio::spawn(async move {
            while let Some(message) = c_rx.recv().await {
                let closing = matches!(message, Message::Close(_));
                if let Err(e) = write.send(message).await {
                    tracing::error!("failed to send message: {}", e);
                    break;
                }
                if closing {
                    break;
                }
            }
            if let Err(e) = write.close().await {
                tracing::debug!("websocket already closed: {}", e);
            }
        });

        let events = s_tx.clone();
        tokio::spawn(async move {
            // Every way out of this loop ends the session, so each one is
            // reported as a close event.
            let mut reason = None;
            while let Some(message) = read.next().await {
                let message = match message {
                    Err(e) => {
                        tracing::error!("failed to read message: {}", e);
                        reason = Some(e.to_string());
                        break;
                    }
                    Ok(message) => message,
                };
                match message {
                    Message::Text(text) => match serde_json::from_str::<ServerEvent>(&text) {
                        Ok(event) => {
                            tracing::debug!("received event: {:?}", event);
                            // No subscribers is fine; events are advisory.
                            let _ = events.send(event);
                        }
                        Err(e) => {
                            tracing::warn!("failed to deserialize event: {}, text=> {:?}", e, text);
                        }
                    },
                    Message::Binary(bin) => {
                        tracing::warn!("unexpected binary message: {} bytes", bin.len());
                    }
                    Message::Close(frame) => {
                        tracing::info!("connection closed: {:?}", frame);
                        reason = frame.map(|v| v.reason.to_string());
                        break;
                    }
                    _ => {}
                }
            }
            tracing::debug!("event reader finished: {:?}", reason);
            let _ = events.send(ServerEvent::Close { reason });
        });

        Ok(Self {
            c_tx: Some(c_tx),
            s_tx,
        })
    }

    pub fn server_events(&self) -> ServerRx {
        self.s_tx.subscribe()
    }

    /// Sends a close frame and releases the outbound half.
    pub async fn close(&mut self) -> Result<()> {
        let tx = self.c_tx.take().ok_or(Error::NotConnected)?;
        tx.send(Message::Close(None))
            .await
            .map_err(|_| Error::NotConnected)
    }
}
