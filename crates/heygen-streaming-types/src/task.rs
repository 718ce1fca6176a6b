/// How the avatar treats the submitted text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskType {
    /// Speak the text verbatim.
    #[default]
    Repeat,
    /// Let the vendor's own model answer the text.
    Talk,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskMode {
    /// Respond once the avatar finished speaking.
    Sync,
    #[default]
    Async,
}

/// Body of `POST /v1/streaming.task`.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TaskRequest {
    session_id: String,
    text: String,
    task_type: TaskType,
    task_mode: TaskMode,
}

impl TaskRequest {
    pub fn new(session_id: &str, text: &str) -> Self {
        Self {
            session_id: session_id.to_string(),
            text: text.to_string(),
            task_type: TaskType::default(),
            task_mode: TaskMode::default(),
        }
    }

    pub fn with_task_type(mut self, task_type: TaskType) -> Self {
        self.task_type = task_type;
        self
    }

    pub fn with_task_mode(mut self, task_mode: TaskMode) -> Self {
        self.task_mode = task_mode;
        self
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn task_type(&self) -> TaskType {
        self.task_type
    }
}

/// `data` of the `streaming.task` response.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TaskInfo {
    #[serde(default)]
    task_id: Option<String>,

    #[serde(default)]
    duration_ms: Option<f64>,
}

impl TaskInfo {
    pub fn task_id(&self) -> Option<&str> {
        self.task_id.as_deref()
    }

    pub fn duration_ms(&self) -> Option<f64> {
        self.duration_ms
    }
}
