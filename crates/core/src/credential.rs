use std::fmt;

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::Value;

/// Short-lived bearer token authorising one session negotiation.
pub struct StreamingCredential(SecretString);

impl StreamingCredential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(SecretString::from(token.into()))
    }

    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }
}

impl fmt::Debug for StreamingCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("StreamingCredential([REDACTED])")
    }
}

/// Shapes the token endpoint has been seen to answer with, canonical first.
#[derive(Deserialize)]
#[serde(untagged)]
enum TokenResponse {
    /// `{"data": {"token": "..."}}`
    Canonical { data: TokenField },
    /// `{"data": {"data": {"token": "..."}}}`
    DoubleNested { data: NestedToken },
    /// `{"token": "..."}`
    TopLevel { token: String },
    /// `{"access_token": "..."}`
    AccessToken { access_token: String },
}

#[derive(Deserialize)]
struct TokenField {
    token: String,
}

#[derive(Deserialize)]
struct NestedToken {
    data: TokenField,
}

/// Pulls the token out of a streaming token response. `None` when no
/// tolerated shape carries a non-empty token.
pub fn decode_token(body: &Value) -> Option<StreamingCredential> {
    let token = match TokenResponse::deserialize(body).ok()? {
        TokenResponse::Canonical { data } => data.token,
        TokenResponse::DoubleNested { data } => data.data.token,
        TokenResponse::TopLevel { token } => token,
        TokenResponse::AccessToken { access_token } => access_token,
    };
    let token = token.trim();
    if token.is_empty() {
        return None;
    }
    Some(StreamingCredential::new(token))
}

/// Top-level keys of a response, for error messages.
pub(crate) fn describe_keys(body: &Value) -> String {
    match body.as_object() {
        Some(map) if !map.is_empty() => map.keys().cloned().collect::<Vec<_>>().join(", "),
        Some(_) => "empty object".to_string(),
        None => "not an object".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_every_tolerated_shape() {
        for body in [
            json!({ "data": { "token": "t-1" } }),
            json!({ "data": { "data": { "token": "t-1" } } }),
            json!({ "token": "t-1" }),
            json!({ "access_token": "t-1" }),
        ] {
            let credential = decode_token(&body).expect("token should be found");
            assert_eq!(credential.expose(), "t-1");
        }
    }

    #[test]
    fn missing_or_empty_token_is_none() {
        assert!(decode_token(&json!({ "data": { "token": "" } })).is_none());
        assert!(decode_token(&json!({ "data": {} })).is_none());
        assert!(decode_token(&json!({ "error": null, "data": null })).is_none());
    }

    #[test]
    fn debug_is_redacted() {
        let credential = StreamingCredential::new("secret-token");
        assert!(!format!("{credential:?}").contains("secret-token"));
    }

    #[test]
    fn describes_keys() {
        assert_eq!(describe_keys(&json!({ "error": null })), "error");
        assert_eq!(describe_keys(&json!([])), "not an object");
    }
}
