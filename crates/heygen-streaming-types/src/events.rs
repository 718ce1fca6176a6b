/// Events pushed over the `streaming.chat` websocket.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type")]
pub enum ServerEvent {
    #[serde(rename = "close")]
    Close {
        reason: Option<String>,
    },
    #[serde(rename = "avatar_start_talking")]
    AvatarStartTalking(TaskEvent),
    #[serde(rename = "avatar_stop_talking")]
    AvatarStopTalking(TaskEvent),
    #[serde(rename = "avatar_talking_message")]
    AvatarTalkingMessage(MessageEvent),
    #[serde(rename = "avatar_end_message")]
    AvatarEndMessage(TaskEvent),
    #[serde(rename = "user_start")]
    UserStart(TaskEvent),
    #[serde(rename = "user_stop")]
    UserStop(TaskEvent),
    #[serde(rename = "user_silence")]
    UserSilence(TaskEvent),
    #[serde(rename = "user_talking_message")]
    UserTalkingMessage(MessageEvent),
    #[serde(rename = "user_end_message")]
    UserEndMessage(TaskEvent),
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TaskEvent {
    #[serde(default)]
    task_id: Option<String>,
}

impl TaskEvent {
    pub fn task_id(&self) -> Option<&str> {
        self.task_id.as_deref()
    }
}

/// A fragment of speech, as text.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct MessageEvent {
    #[serde(default)]
    task_id: Option<String>,

    #[serde(default)]
    message: String,
}

impl MessageEvent {
    pub fn task_id(&self) -> Option<&str> {
        self.task_id.as_deref()
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_known_and_unknown_events() {
        let talking: ServerEvent = serde_json::from_str(
            r#"{"type":"avatar_talking_message","task_id":"t1","message":"Hello"}"#,
        )
        .unwrap();
        match talking {
            ServerEvent::AvatarTalkingMessage(event) => {
                assert_eq!(event.message(), "Hello");
                assert_eq!(event.task_id(), Some("t1"));
            }
            other => panic!("unexpected event: {other:?}"),
        }

        let unknown: ServerEvent =
            serde_json::from_str(r#"{"type":"something_new","x":1}"#).unwrap();
        assert_eq!(unknown, ServerEvent::Unknown);
    }
}
