use bytes::Bytes;
use reqwest::multipart;
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;

use crate::errors::{ProviderError, ProviderResult};

const PROVIDER: &str = "elevenlabs";

pub const ELEVENLABS_HOST: &str = "https://api.elevenlabs.io";

/// Stock voice used when a profile has not cloned one.
pub const DEFAULT_VOICE_ID: &str = "zY2HMEGUPYdbv4Q7IE7U";

const TTS_MODEL: &str = "eleven_monolingual_v1";
const PREVIEW_MODEL: &str = "eleven_multilingual_v2";
const PREVIEW_TEXT: &str = "Hi from your cloned lounge voice!";

#[derive(Debug, Clone)]
pub struct VoiceConfig {
    pub host: String,
    pub api_key: Option<String>,
    pub default_voice_id: String,
    pub timeout_secs: u64,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            host: ELEVENLABS_HOST.to_string(),
            api_key: None,
            default_voice_id: DEFAULT_VOICE_ID.to_string(),
            timeout_secs: 30,
        }
    }
}

/// ElevenLabs client: speech synthesis, voice cloning, and clone preview.
pub struct VoiceClient {
    client: Client,
    config: VoiceConfig,
}

impl VoiceClient {
    pub fn new(config: VoiceConfig) -> ProviderResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ProviderError::transport(PROVIDER, e))?;

        Ok(Self { client, config })
    }

    fn api_key(&self) -> ProviderResult<&str> {
        match self.config.api_key.as_deref().filter(|key| !key.is_empty()) {
            Some(key) => Ok(key),
            None => Err(ProviderError::MissingApiKey { provider: PROVIDER }),
        }
    }

    /// Render `text` as speech with the given (or default) voice. Returns
    /// raw MP3 bytes.
    pub async fn synthesize(&self, text: &str, voice_id: Option<&str>) -> ProviderResult<Bytes> {
        let voice = voice_id.unwrap_or(&self.config.default_voice_id);
        let payload = json!({
            "text": text,
            "model_id": TTS_MODEL,
            "voice_settings": {
                "stability": 0.5,
                "similarity_boost": 0.75,
                "style": 0.0,
                "use_speaker_boost": true,
            },
        });

        self.speech_request(voice, payload).await
    }

    /// Short sample of a cloned voice, rendered with the multilingual model.
    pub async fn preview(&self, voice_id: &str, text: Option<&str>) -> ProviderResult<Bytes> {
        let payload = json!({
            "text": text.unwrap_or(PREVIEW_TEXT),
            "model_id": PREVIEW_MODEL,
        });

        self.speech_request(voice_id, payload).await
    }

    /// Register a new cloned voice from recorded audio; returns its id.
    pub async fn clone_voice(
        &self,
        name: &str,
        audio: Bytes,
        mime_type: &str,
    ) -> ProviderResult<String> {
        let api_key = self.api_key()?;
        let url = format!("{}/v1/voices/add", self.config.host.trim_end_matches('/'));

        let part = multipart::Part::bytes(audio.to_vec())
            .file_name("voice.webm")
            .mime_str(mime_type)
            .map_err(|e| ProviderError::transport(PROVIDER, e))?;
        let form = multipart::Form::new()
            .text("name", name.to_string())
            .part("files", part);

        let response = self
            .client
            .post(&url)
            .header("xi-api-key", api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| ProviderError::transport(PROVIDER, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Request {
                provider: PROVIDER,
                status: status.as_u16(),
                body,
            });
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| ProviderError::transport(PROVIDER, e))?;

        body.get("voice_id")
            .or_else(|| body.get("voiceId"))
            .and_then(Value::as_str)
            .map(String::from)
            .ok_or_else(|| ProviderError::Request {
                provider: PROVIDER,
                status: status.as_u16(),
                body: "missing voice_id in response".to_string(),
            })
    }

    async fn speech_request(&self, voice_id: &str, payload: Value) -> ProviderResult<Bytes> {
        let api_key = self.api_key()?;
        let url = format!(
            "{}/v1/text-to-speech/{}",
            self.config.host.trim_end_matches('/'),
            voice_id
        );

        let response = self
            .client
            .post(&url)
            .header("xi-api-key", api_key)
            .header("Accept", "audio/mpeg")
            .json(&payload)
            .send()
            .await
            .map_err(|e| ProviderError::transport(PROVIDER, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Request {
                provider: PROVIDER,
                status: status.as_u16(),
                body,
            });
        }

        response
            .bytes()
            .await
            .map_err(|e| ProviderError::transport(PROVIDER, e))
    }
}
