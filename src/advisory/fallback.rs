//! Backend-driven provider and the rule-engine fallback decorator

use async_trait::async_trait;
use tracing::{debug, warn};

use super::{
    analysis_prompt, parse_actions, unhealthy, AdvisoryBackend, DecisionError, DecisionProvider,
    RuleEngine,
};
use crate::types::{Action, ActionKind, HealthRecord};

/// Asks an [`AdvisoryBackend`] for actions and parses its answer.
///
/// Errors are surfaced unchanged; wrap in [`WithFallback`] for degradation.
pub struct AdvisedProvider<B> {
    backend: B,
}

impl<B: AdvisoryBackend> AdvisedProvider<B> {
    pub fn new(backend: B) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl<B: AdvisoryBackend> DecisionProvider for AdvisedProvider<B> {
    fn name(&self) -> &str {
        "advised"
    }

    async fn analyze(
        &self,
        records: &[HealthRecord],
        allowed: &[ActionKind],
    ) -> Result<Vec<Action>, DecisionError> {
        let issues = unhealthy(records);
        if issues.is_empty() {
            return Ok(Vec::new());
        }

        let prompt = analysis_prompt(&issues, allowed);
        let text = self.backend.generate(&prompt).await?;
        debug!(
            backend = self.backend.backend_name(),
            chars = text.len(),
            "Advisory response received"
        );
        parse_actions(&text).map_err(DecisionError::Malformed)
    }
}

/// Degrades an inner provider.
///
/// - `Unavailable` → the deterministic [`RuleEngine`]
/// - `Malformed` → no actions (the rule engine is not consulted)
pub struct WithFallback<P> {
    inner: P,
    rules: RuleEngine,
}

impl<P: DecisionProvider> WithFallback<P> {
    pub fn new(inner: P) -> Self {
        Self {
            inner,
            rules: RuleEngine,
        }
    }
}

#[async_trait]
impl<P: DecisionProvider> DecisionProvider for WithFallback<P> {
    fn name(&self) -> &str {
        "advised+fallback"
    }

    async fn analyze(
        &self,
        records: &[HealthRecord],
        allowed: &[ActionKind],
    ) -> Result<Vec<Action>, DecisionError> {
        match self.inner.analyze(records, allowed).await {
            Ok(actions) => Ok(actions),
            Err(DecisionError::Unavailable(e)) => {
                warn!(error = %e, "Advisory backend unavailable, using rule engine");
                Ok(self.rules.decide(&unhealthy(records), allowed))
            }
            Err(DecisionError::Malformed(reason)) => {
                warn!(reason = %reason, "Discarding malformed advisory response");
                Ok(Vec::new())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::advisory::BackendError;
    use crate::types::metrics;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    enum Reply {
        Text(&'static str),
        Down,
    }

    struct ScriptedBackend {
        reply: Reply,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl AdvisoryBackend for ScriptedBackend {
        async fn generate(&self, _prompt: &str) -> Result<String, BackendError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.reply {
                Reply::Text(t) => Ok(t.to_string()),
                Reply::Down => Err(BackendError::Unsupported("connection refused".into())),
            }
        }

        fn backend_name(&self) -> &'static str {
            "scripted"
        }
    }

    fn provider(reply: Reply) -> (WithFallback<AdvisedProvider<ScriptedBackend>>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let backend = ScriptedBackend {
            reply,
            calls: calls.clone(),
        };
        (WithFallback::new(AdvisedProvider::new(backend)), calls)
    }

    fn nginx_down() -> Vec<HealthRecord> {
        vec![HealthRecord::new(metrics::SERVICE_STATUS, false, "nginx inactive").with("service", "nginx")]
    }

    #[tokio::test]
    async fn healthy_input_never_reaches_backend() {
        let (p, calls) = provider(Reply::Text("[]"));
        let records = vec![HealthRecord::new(metrics::CPU_USAGE, true, "ok")];
        assert!(p.analyze(&records, &ActionKind::KNOWN).await.unwrap().is_empty());
        assert!(p.analyze(&[], &ActionKind::KNOWN).await.unwrap().is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn backend_outage_uses_rule_engine() {
        let (p, calls) = provider(Reply::Down);
        let actions = p.analyze(&nginx_down(), &[ActionKind::RestartService]).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].action, ActionKind::RestartService);
        assert_eq!(actions[0].param_str("service"), Some("nginx"));
    }

    #[tokio::test]
    async fn malformed_response_yields_nothing() {
        let (p, calls) = provider(Reply::Text("Sure! Restart nginx."));
        let actions = p.analyze(&nginx_down(), &[ActionKind::RestartService]).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(actions.is_empty());
    }

    #[tokio::test]
    async fn backend_actions_pass_through_unfiltered() {
        let (p, _) = provider(Reply::Text(
            "```json\n{\"action\":\"kill_hung_process\",\"action_params\":{\"pid\":42},\"severity\":\"critical\"}\n```",
        ));
        let actions = p.analyze(&nginx_down(), &[ActionKind::RestartService]).await.unwrap();
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].action, ActionKind::KillHungProcess);
    }
}
