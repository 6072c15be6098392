use lounge::relay::orchestrator::RelayConfig;
use lounge::voice::VoiceConfig;

use crate::configuration::Settings;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub relay: RelayConfig,
    pub voice: VoiceConfig,
    pub backend_url: String,
}

impl AppState {
    pub fn from_settings(settings: Settings) -> Self {
        Self {
            relay: settings.relay.into_config(),
            voice: settings.voice.into_config(),
            backend_url: settings.backend.url,
        }
    }
}
