use secrecy::SecretString;

use crate::client::consts::BASE_URL;

pub struct Config {
    base_url: String,
    token: SecretString,
}

pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::new(),
        }
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.config.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_token(mut self, token: SecretString) -> Self {
        self.config.token = token;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    // Sets the default values. The token is per session and always supplied by the caller.
    pub fn new() -> Self {
        Self {
            base_url: BASE_URL.to_string(),
            token: SecretString::from(String::new()),
        }
    }

    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn token(&self) -> &SecretString {
        &self.token
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}
