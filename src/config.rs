use std::path::PathBuf;

use serde::Deserialize;

/// Sentinel shipped in example configs; treated as "no key configured".
pub const PLACEHOLDER_API_KEY: &str = "YOUR_GEMINI_API_KEY";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub uploads: UploadsConfig,
    pub gemini: GeminiConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 5001,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UploadsConfig {
    pub dir: PathBuf,
    pub max_bytes: usize,
}

impl Default for UploadsConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("static/uploads"),
            max_bytes: 16 * 1024 * 1024,
        }
    }
}

#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct GeminiConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: PLACEHOLDER_API_KEY.into(),
            model: "gemini-1.5-pro".into(),
            base_url: "https://generativelanguage.googleapis.com/v1beta".into(),
        }
    }
}

impl GeminiConfig {
    /// True when a real key is configured (non-empty and not the placeholder).
    pub fn has_credential(&self) -> bool {
        let key = self.api_key.trim();
        !key.is_empty() && key != PLACEHOLDER_API_KEY
    }
}

// Keep the key out of logs.
impl std::fmt::Debug for GeminiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiConfig")
            .field("api_key", &if self.has_credential() { "<set>" } else { "<unset>" })
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(
                config::Environment::with_prefix("PALM")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}
