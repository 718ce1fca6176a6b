use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use url::Url;

use crate::client::config::Config;
use crate::client::consts::EVENTS_PATH;
use crate::client::error::Result;

/// Joins a REST path onto the configured base URL.
pub fn endpoint(config: &Config, path: &str) -> String {
    format!("{}{}", config.base_url(), path)
}

/// Builds the URL of the per-session event websocket, swapping the REST
/// scheme for its websocket counterpart.
pub fn events_url(config: &Config, session_id: &str, session_token: &str) -> Result<Url> {
    let mut url = Url::parse(config.base_url())?;
    let scheme = if url.scheme() == "http" { "ws" } else { "wss" };
    // Both schemes are "special" in the URL standard, so this only fails on
    // exotic bases, which Url::parse above would have rejected already.
    let _ = url.set_scheme(scheme);
    url.set_path(EVENTS_PATH);
    url.query_pairs_mut()
        .append_pair("session_id", session_id)
        .append_pair("session_token", session_token)
        .append_pair("silence_response", "false");
    Ok(url)
}

pub fn build_request(
    config: &Config,
    session_id: &str,
    session_token: &str,
) -> Result<Request> {
    let url = events_url(config, session_id, session_token)?;
    Ok(url.as_str().into_client_request()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_url_uses_websocket_scheme() {
        let config = Config::builder().with_base_url("https://api.heygen.com/").build();
        let url = events_url(&config, "s-1", "tok").unwrap();
        assert_eq!(
            url.as_str(),
            "wss://api.heygen.com/v1/ws/streaming.chat?session_id=s-1&session_token=tok&silence_response=false"
        );

        let local = Config::builder().with_base_url("http://127.0.0.1:9000").build();
        let url = events_url(&local, "s-2", "t").unwrap();
        assert_eq!(url.scheme(), "ws");
        assert_eq!(url.port(), Some(9000));
    }
}
