/// The `{ code, data, message }` wrapper every REST response is sent in.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ApiResponse<T> {
    #[serde(default)]
    code: Option<i64>,

    #[serde(default = "Option::default")]
    data: Option<T>,

    #[serde(default)]
    message: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn code(&self) -> Option<i64> {
        self.code
    }

    pub fn data(&self) -> Option<&T> {
        self.data.as_ref()
    }

    pub fn into_data(self) -> Option<T> {
        self.data
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }
}

/// Error payload of a rejected request.
///
/// The vendor is inconsistent here: some endpoints answer
/// `{"code": 10005, "message": "..."}`, others nest the same pair under
/// `"error"`, and gateways in front of it may answer with a bare string.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    code: Option<serde_json::Value>,

    #[serde(default)]
    message: Option<String>,

    #[serde(default)]
    error: Option<serde_json::Value>,
}

impl ErrorBody {
    pub fn code(&self) -> Option<String> {
        let code = self.code.as_ref().or_else(|| {
            self.error
                .as_ref()
                .and_then(|e| e.get("code"))
        })?;
        match code {
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Null => None,
            other => Some(other.to_string()),
        }
    }

    pub fn message(&self) -> Option<String> {
        if let Some(message) = &self.message {
            return Some(message.clone());
        }
        match self.error.as_ref()? {
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Object(map) => map
                .get("message")
                .and_then(|m| m.as_str())
                .map(str::to_string),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_body_reads_flat_and_nested_forms() {
        let flat: ErrorBody =
            serde_json::from_str(r#"{"code":10005,"message":"avatar not found"}"#).unwrap();
        assert_eq!(flat.code().as_deref(), Some("10005"));
        assert_eq!(flat.message().as_deref(), Some("avatar not found"));

        let nested: ErrorBody =
            serde_json::from_str(r#"{"error":{"code":"quota","message":"out of credits"}}"#)
                .unwrap();
        assert_eq!(nested.code().as_deref(), Some("quota"));
        assert_eq!(nested.message().as_deref(), Some("out of credits"));

        let bare: ErrorBody = serde_json::from_str(r#"{"error":"unauthorized"}"#).unwrap();
        assert_eq!(bare.code(), None);
        assert_eq!(bare.message().as_deref(), Some("unauthorized"));
    }

    #[test]
    fn api_response_without_data() {
        let response: ApiResponse<serde_json::Value> =
            serde_json::from_str(r#"{"code":100,"message":"success"}"#).unwrap();
        assert_eq!(response.code(), Some(100));
        assert!(response.data().is_none());
    }
}
