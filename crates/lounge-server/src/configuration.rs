use std::net::SocketAddr;

use config::{Config, Environment};
use serde::Deserialize;

use lounge::providers::configs::{
    ANTHROPIC_HOST, ANTHROPIC_MAX_TOKENS, ANTHROPIC_MODEL, DEFAULT_TIMEOUT_SECS, OPENAI_HOST,
    OPENAI_MODEL,
};
use lounge::relay::orchestrator::RelayConfig;
use lounge::voice::{VoiceConfig, DEFAULT_VOICE_ID, ELEVENLABS_HOST};

use crate::error::ConfigError;

#[derive(Debug, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl ServerSettings {
    pub fn socket_addr(&self) -> SocketAddr {
        format!("{}:{}", self.host, self.port)
            .parse()
            .expect("Failed to parse socket address")
    }
}

#[derive(Debug, Deserialize)]
pub struct RelaySettings {
    #[serde(default = "default_preferred_provider")]
    pub preferred_provider: String,
    #[serde(default)]
    pub openai_api_key: Option<String>,
    #[serde(default = "default_openai_host")]
    pub openai_host: String,
    #[serde(default = "default_openai_model")]
    pub openai_model: String,
    #[serde(default)]
    pub anthropic_api_key: Option<String>,
    #[serde(default = "default_anthropic_host")]
    pub anthropic_host: String,
    #[serde(default = "default_anthropic_model")]
    pub anthropic_model: String,
    #[serde(default = "default_anthropic_max_tokens")]
    pub anthropic_max_tokens: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            preferred_provider: default_preferred_provider(),
            openai_api_key: None,
            openai_host: default_openai_host(),
            openai_model: default_openai_model(),
            anthropic_api_key: None,
            anthropic_host: default_anthropic_host(),
            anthropic_model: default_anthropic_model(),
            anthropic_max_tokens: default_anthropic_max_tokens(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl RelaySettings {
    /// Convert to the relay's runtime config. The conventional per-vendor
    /// variables are honored when the prefixed ones are unset, so a missing
    /// key disables a vendor without crashing the process.
    pub fn into_config(self) -> RelayConfig {
        RelayConfig {
            preferred_provider: self.preferred_provider,
            openai_api_key: self.openai_api_key.or_else(|| env_key("OPENAI_API_KEY")),
            openai_host: self.openai_host,
            openai_model: self.openai_model,
            anthropic_api_key: self
                .anthropic_api_key
                .or_else(|| env_key("ANTHROPIC_API_KEY")),
            anthropic_host: self.anthropic_host,
            anthropic_model: self.anthropic_model,
            anthropic_max_tokens: self.anthropic_max_tokens,
            timeout_secs: self.timeout_secs,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct VoiceSettings {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_voice_host")]
    pub host: String,
    #[serde(default = "default_voice_id")]
    pub voice_id: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for VoiceSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            host: default_voice_host(),
            voice_id: default_voice_id(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl VoiceSettings {
    pub fn into_config(self) -> VoiceConfig {
        VoiceConfig {
            host: self.host,
            api_key: self.api_key.or_else(|| env_key("ELEVENLABS_API_KEY")),
            default_voice_id: self.voice_id,
            timeout_secs: self.timeout_secs,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct BackendSettings {
    #[serde(default = "default_backend_url")]
    pub url: String,
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            url: default_backend_url(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub relay: RelaySettings,
    #[serde(default)]
    pub voice: VoiceSettings,
    #[serde(default)]
    pub backend: BackendSettings,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let config = Config::builder()
            // Layer on the environment variables
            .add_source(
                Environment::with_prefix("LOUNGE")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(config.try_deserialize()?)
    }
}

fn env_key(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|value| !value.is_empty())
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_preferred_provider() -> String {
    "openai".to_string()
}

fn default_openai_host() -> String {
    OPENAI_HOST.to_string()
}

fn default_openai_model() -> String {
    OPENAI_MODEL.to_string()
}

fn default_anthropic_host() -> String {
    ANTHROPIC_HOST.to_string()
}

fn default_anthropic_model() -> String {
    ANTHROPIC_MODEL.to_string()
}

fn default_anthropic_max_tokens() -> u32 {
    ANTHROPIC_MAX_TOKENS
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_voice_host() -> String {
    ELEVENLABS_HOST.to_string()
}

fn default_voice_id() -> String {
    DEFAULT_VOICE_ID.to_string()
}

fn default_backend_url() -> String {
    "http://localhost:8000".to_string()
}
