use async_trait::async_trait;
use thiserror::Error;

use outreach_core::domain::conversation::Turn;

/// Failure reported by a text-generation provider. `status` is the transport status code
/// when the provider answered at all.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("provider error (status {status:?}): {message}")]
pub struct ProviderError {
    pub status: Option<u16>,
    pub message: String,
}

impl ProviderError {
    pub fn with_status(status: u16, message: impl Into<String>) -> Self {
        Self { status: Some(status), message: message.into() }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self { status: None, message: message.into() }
    }

    pub fn kind(&self) -> ProviderErrorKind {
        classify_status(self.status)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProviderErrorKind {
    /// Malformed request or unknown model. Not retried on the same model.
    Client,
    /// Rate limited or temporarily unavailable. Retried with backoff.
    Transient,
    Unknown,
}

pub fn classify_status(status: Option<u16>) -> ProviderErrorKind {
    match status {
        Some(400 | 404) => ProviderErrorKind::Client,
        Some(429 | 503) => ProviderErrorKind::Transient,
        _ => ProviderErrorKind::Unknown,
    }
}

#[async_trait]
pub trait GenerationProvider: Send + Sync {
    async fn generate(
        &self,
        model: &str,
        instruction: &str,
        history: &[Turn],
        message: &str,
    ) -> Result<String, ProviderError>;
}
