//! Decision layer: unhealthy records in, proposed actions out
//!
//! ## Architecture
//!
//! - [`AdvisoryBackend`]: one implementation per remote model API
//! - [`AdvisedProvider`]: prompt construction, backend call, response parsing
//! - [`WithFallback`]: decorator that routes backend outages to [`RuleEngine`]
//! - [`RuleEngine`]: deterministic table of remediation rules
//!
//! An unreachable backend falls back to the rule engine. A backend that
//! answers with something other than an action list yields no actions.

use async_trait::async_trait;

use crate::config::AdvisoryConfig;
use crate::types::{Action, ActionKind, HealthRecord};

mod backends;
mod fallback;
mod parsing;
mod prompt;
mod rules;

pub use backends::{
    AdvisoryBackend, AnthropicBackend, BackendError, OllamaBackend, OpenAiBackend,
    UnsupportedBackend,
};
pub use fallback::{AdvisedProvider, WithFallback};
pub use parsing::{parse_actions, strip_code_fence};
pub use prompt::analysis_prompt;
pub use rules::RuleEngine;

#[derive(Debug, thiserror::Error)]
pub enum DecisionError {
    /// The backend could not be reached or refused the request
    #[error("advisory backend unavailable: {0}")]
    Unavailable(#[from] BackendError),
    /// The backend answered, but not with an action list
    #[error("malformed advisory response: {0}")]
    Malformed(String),
}

/// Maps health records plus an allow-list of action kinds to actions.
///
/// Implementations must not call any backend when no record is unhealthy.
/// Actions outside `allowed` may still be returned; gating is the caller's job.
#[async_trait]
pub trait DecisionProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn analyze(
        &self,
        records: &[HealthRecord],
        allowed: &[ActionKind],
    ) -> Result<Vec<Action>, DecisionError>;
}

pub(crate) fn unhealthy(records: &[HealthRecord]) -> Vec<&HealthRecord> {
    records.iter().filter(|r| !r.healthy).collect()
}

/// Build the configured provider.
///
/// Unknown provider names and missing credentials produce an
/// [`UnsupportedBackend`], so every cycle goes straight to the rule engine.
pub fn from_config(config: &AdvisoryConfig) -> Result<Box<dyn DecisionProvider>, BackendError> {
    let backend: Box<dyn AdvisoryBackend> = match config.provider.as_str() {
        "rules" => return Ok(Box::new(RuleEngine)),
        "anthropic" => match config.api_key.as_deref() {
            Some(key) if !key.is_empty() => Box::new(AnthropicBackend::new(config, key)?),
            _ => Box::new(UnsupportedBackend::new("anthropic provider has no api_key")),
        },
        "openai" => match config.api_key.as_deref() {
            Some(key) if !key.is_empty() => Box::new(OpenAiBackend::new(config, key)?),
            _ => Box::new(UnsupportedBackend::new("openai provider has no api_key")),
        },
        "ollama" => Box::new(OllamaBackend::new(config)?),
        other => Box::new(UnsupportedBackend::new(format!("unsupported provider '{other}'"))),
    };

    tracing::info!(
        provider = %config.provider,
        backend = backend.backend_name(),
        model = %config.model,
        "Advisory backend configured"
    );
    Ok(Box::new(WithFallback::new(AdvisedProvider::new(backend))))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rules_provider_needs_no_backend() {
        let config = AdvisoryConfig {
            provider: "rules".to_string(),
            ..AdvisoryConfig::default()
        };
        assert_eq!(from_config(&config).unwrap().name(), "rules");
    }

    #[test]
    fn missing_key_still_builds_a_provider() {
        let config = AdvisoryConfig {
            provider: "anthropic".to_string(),
            api_key: None,
            ..AdvisoryConfig::default()
        };
        let provider = from_config(&config).unwrap();
        assert_eq!(provider.name(), "advised+fallback");
    }
}
