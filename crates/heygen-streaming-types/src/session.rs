/// Rendering tier requested when a session is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AvatarQuality {
    #[default]
    Low,
    Medium,
    High,
}

impl AvatarQuality {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct VoiceSetting {
    #[serde(skip_serializing_if = "Option::is_none")]
    voice_id: Option<String>,

    /// Speaking rate, 0.5 to 1.5.
    #[serde(skip_serializing_if = "Option::is_none")]
    rate: Option<f32>,

    /// ex: "excited", "serious", "friendly", "soothing", "broadcaster"
    #[serde(skip_serializing_if = "Option::is_none")]
    emotion: Option<String>,
}

impl VoiceSetting {
    pub fn with_voice_id(mut self, voice_id: &str) -> Self {
        self.voice_id = Some(voice_id.to_string());
        self
    }

    pub fn with_rate(mut self, rate: f32) -> Self {
        self.rate = Some(rate);
        self
    }

    pub fn with_emotion(mut self, emotion: &str) -> Self {
        self.emotion = Some(emotion.to_string());
        self
    }

    pub fn voice_id(&self) -> Option<&str> {
        self.voice_id.as_deref()
    }
}

/// Body of `POST /v1/streaming.new`.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct NewSessionRequest {
    /// The interactive avatar to render.
    avatar_name: String,

    quality: AvatarQuality,

    #[serde(skip_serializing_if = "Option::is_none")]
    voice: Option<VoiceSetting>,

    /// Knowledge base id configured on the vendor side.
    #[serde(skip_serializing_if = "Option::is_none")]
    knowledge_id: Option<String>,

    /// Inline knowledge base prompt.
    #[serde(skip_serializing_if = "Option::is_none")]
    knowledge_base: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    language: Option<String>,

    /// Seconds of inactivity before the vendor closes the session.
    #[serde(skip_serializing_if = "Option::is_none")]
    activity_idle_timeout: Option<u32>,

    version: String,
    source: String,
}

impl NewSessionRequest {
    pub fn new(avatar_name: &str) -> Self {
        Self {
            avatar_name: avatar_name.to_string(),
            quality: AvatarQuality::default(),
            voice: None,
            knowledge_id: None,
            knowledge_base: None,
            language: None,
            activity_idle_timeout: None,
            version: "v2".to_string(),
            source: "sdk".to_string(),
        }
    }

    pub fn with_quality(mut self, quality: AvatarQuality) -> Self {
        self.quality = quality;
        self
    }

    pub fn with_voice(mut self, voice: VoiceSetting) -> Self {
        self.voice = Some(voice);
        self
    }

    pub fn with_knowledge_id(mut self, knowledge_id: &str) -> Self {
        self.knowledge_id = Some(knowledge_id.to_string());
        self
    }

    pub fn with_knowledge_base(mut self, knowledge_base: &str) -> Self {
        self.knowledge_base = Some(knowledge_base.to_string());
        self
    }

    pub fn with_language(mut self, language: &str) -> Self {
        self.language = Some(language.to_string());
        self
    }

    pub fn with_activity_idle_timeout(mut self, seconds: u32) -> Self {
        self.activity_idle_timeout = Some(seconds);
        self
    }

    pub fn avatar_name(&self) -> &str {
        &self.avatar_name
    }

    pub fn quality(&self) -> AvatarQuality {
        self.quality
    }

    pub fn language(&self) -> Option<&str> {
        self.language.as_deref()
    }
}

/// `data` of the `streaming.new` response.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SessionInfo {
    session_id: String,

    /// WebRTC room the avatar publishes its tracks into.
    url: String,

    /// Room access token; also authorises the event websocket.
    access_token: String,

    #[serde(default)]
    session_duration_limit: Option<u64>,

    #[serde(default)]
    is_paid: Option<bool>,
}

impl SessionInfo {
    pub fn new(session_id: &str, url: &str, access_token: &str) -> Self {
        Self {
            session_id: session_id.to_string(),
            url: url.to_string(),
            access_token: access_token.to_string(),
            session_duration_limit: None,
            is_paid: None,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    pub fn session_duration_limit(&self) -> Option<u64> {
        self.session_duration_limit
    }

    pub fn is_paid(&self) -> Option<bool> {
        self.is_paid
    }
}

/// Body shared by `streaming.start`, `streaming.stop`, `streaming.interrupt`
/// and `streaming.keep_alive`.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SessionIdRequest {
    session_id: String,
}

impl SessionIdRequest {
    pub fn new(session_id: &str) -> Self {
        Self {
            session_id: session_id.to_string(),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }
}
