use heygen_streaming_types::ErrorBody;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The vendor answered with a non-success status or a non-success `code`.
    #[error("{}", describe_api_error(*status, code.as_deref(), message))]
    Api {
        status: u16,
        code: Option<String>,
        message: String,
    },
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),
    #[error("unexpected response body: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("response did not contain {0}")]
    MissingData(&'static str),
    #[error("not connected yet")]
    NotConnected,
}

impl Error {
    /// Builds an [`Error::Api`] from a raw response body, keeping the text
    /// verbatim when it is not one of the vendor's JSON error shapes.
    pub(crate) fn from_body(status: u16, body: &str) -> Self {
        let parsed = serde_json::from_str::<ErrorBody>(body).unwrap_or_default();
        let message = parsed
            .message()
            .unwrap_or_else(|| body.trim().to_string());
        Error::Api {
            status,
            code: parsed.code(),
            message,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Api { status, .. } => Some(*status),
            Error::Request(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

fn describe_api_error(status: u16, code: Option<&str>, message: &str) -> String {
    let message = if message.is_empty() { "no details" } else { message };
    match code {
        Some(code) => format!("vendor rejected request (HTTP {status}, code {code}): {message}"),
        None => format!("vendor rejected request (HTTP {status}): {message}"),
    }
}
