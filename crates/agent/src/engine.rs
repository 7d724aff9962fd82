use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use thiserror::Error;
use tracing::{debug, warn};

use outreach_core::config::LlmConfig;
use outreach_core::domain::conversation::Turn;

use crate::llm::{GenerationProvider, ProviderError, ProviderErrorKind};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum GenerationError {
    #[error("client error from `{model}`: {source}")]
    Client { model: String, source: ProviderError },
    #[error("transient error from `{model}`: {source}")]
    Transient { model: String, source: ProviderError },
    #[error("`{model}` returned blank text")]
    BlankResult { model: String },
    #[error("unclassified error from `{model}`: {source}")]
    Unknown { model: String, source: ProviderError },
    #[error("all models exhausted; last error: {last}")]
    AllModelsExhausted { last: Box<GenerationError> },
    #[error("no generation models are configured")]
    NoModels,
}

impl GenerationError {
    fn from_provider(model: &str, source: ProviderError) -> Self {
        let model = model.to_string();
        match source.kind() {
            ProviderErrorKind::Client => Self::Client { model, source },
            ProviderErrorKind::Transient => Self::Transient { model, source },
            ProviderErrorKind::Unknown => Self::Unknown { model, source },
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Generation {
    pub text: String,
    pub model: String,
    /// Provider calls made across all models, including the successful one.
    pub attempts: u32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub models: Vec<String>,
    pub max_retries: u32,
    pub retry_base: Duration,
    pub retry_jitter: Duration,
    pub attempt_timeout: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &LlmConfig) -> Self {
        Self {
            models: config.models.clone(),
            max_retries: config.max_retries,
            retry_base: Duration::from_millis(config.retry_base_ms),
            retry_jitter: Duration::from_millis(config.retry_jitter_ms),
            attempt_timeout: Duration::from_secs(config.timeout_secs),
        }
    }

    /// `retry_base` plus a uniform draw from `0..=retry_jitter`.
    pub fn backoff(&self) -> Duration {
        let jitter_ms = u64::try_from(self.retry_jitter.as_millis()).unwrap_or(u64::MAX);
        let jitter = if jitter_ms == 0 { 0 } else { rand::thread_rng().gen_range(0..=jitter_ms) };
        self.retry_base + Duration::from_millis(jitter)
    }
}

#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

#[derive(Clone, Copy, Debug, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Tries each configured model in order until one returns non-blank text.
pub struct GenerationEngine {
    provider: Arc<dyn GenerationProvider>,
    policy: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
}

impl GenerationEngine {
    pub fn new(provider: Arc<dyn GenerationProvider>, policy: RetryPolicy) -> Self {
        Self::with_sleeper(provider, policy, Arc::new(TokioSleeper))
    }

    pub fn with_sleeper(
        provider: Arc<dyn GenerationProvider>,
        policy: RetryPolicy,
        sleeper: Arc<dyn Sleeper>,
    ) -> Self {
        Self { provider, policy, sleeper }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Single provider call bounded by the per-attempt timeout. A timeout has no status.
    pub async fn attempt(
        &self,
        model: &str,
        instruction: &str,
        history: &[Turn],
        message: &str,
    ) -> Result<String, ProviderError> {
        let call = self.provider.generate(model, instruction, history, message);
        match tokio::time::timeout(self.policy.attempt_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(ProviderError::transport(format!(
                "no response within {}s",
                self.policy.attempt_timeout.as_secs()
            ))),
        }
    }

    pub async fn generate(
        &self,
        instruction: &str,
        history: &[Turn],
        message: &str,
    ) -> Result<Generation, GenerationError> {
        let mut last_error = None;
        let mut attempts = 0;

        for model in &self.policy.models {
            for attempt in 0..=self.policy.max_retries {
                attempts += 1;
                let error = match self.attempt(model, instruction, history, message).await {
                    Ok(text) if !text.trim().is_empty() => {
                        debug!(event_name = "agent.generation.success", model = %model, attempts, "generation succeeded");
                        return Ok(Generation { text, model: model.clone(), attempts });
                    }
                    Ok(_) => {
                        warn!(event_name = "agent.generation.blank", model = %model, attempt, "model returned blank text");
                        last_error = Some(GenerationError::BlankResult { model: model.clone() });
                        continue;
                    }
                    Err(source) => GenerationError::from_provider(model, source),
                };

                let retry = matches!(error, GenerationError::Transient { .. })
                    && attempt < self.policy.max_retries;
                last_error = Some(error);

                if !retry {
                    warn!(
                        event_name = "agent.generation.model_advance",
                        model = %model,
                        attempt,
                        error = ?last_error,
                        "advancing to next model"
                    );
                    break;
                }

                let delay = self.policy.backoff();
                warn!(
                    event_name = "agent.generation.retry",
                    model = %model,
                    attempt,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    "transient provider error, retrying"
                );
                self.sleeper.sleep(delay).await;
            }
        }

        Err(match last_error {
            Some(last) => GenerationError::AllModelsExhausted { last: Box::new(last) },
            None => GenerationError::NoModels,
        })
    }
}
