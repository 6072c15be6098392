use thiserror::Error;

/// Failures raised by upstream vendor calls. Everything here is absorbable
/// by the relay; only inbound-request validation ever reaches the caller as
/// an error.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("{provider} API key not configured")]
    MissingApiKey { provider: &'static str },

    #[error("{provider} request failed: {status} - {body}")]
    Request {
        provider: &'static str,
        status: u16,
        body: String,
    },

    #[error("{provider} timed out after {seconds}s waiting for a response")]
    Timeout {
        provider: &'static str,
        seconds: u64,
    },

    #[error("{provider} transport error: {source}")]
    Transport {
        provider: &'static str,
        #[source]
        source: reqwest::Error,
    },
}

impl ProviderError {
    pub fn transport(provider: &'static str, source: reqwest::Error) -> Self {
        ProviderError::Transport { provider, source }
    }
}

pub type ProviderResult<T> = Result<T, ProviderError>;
