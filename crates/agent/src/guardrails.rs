use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use propbot_core::config::LlmConfig;

use crate::llm::{CompletionRequest, LlmClient, LlmError};

/// Bounds on a single reply generation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GenerationPolicy {
    pub attempt_timeout: Duration,
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub fallback_on_exhaustion: bool,
    pub fallback_reply: String,
}

impl From<&LlmConfig> for GenerationPolicy {
    fn from(config: &LlmConfig) -> Self {
        Self {
            attempt_timeout: Duration::from_secs(config.timeout_secs),
            max_retries: config.max_retries,
            initial_backoff: Duration::from_millis(config.initial_backoff_ms),
            fallback_on_exhaustion: config.fallback_on_exhaustion,
            fallback_reply: config.fallback_reply.clone(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GenerationOutcome {
    Generated {
        reply: String,
        attempts: u32,
    },
    Degraded {
        reason_code: &'static str,
        reply: String,
        attempts: u32,
        last_error: LlmError,
    },
}

impl GenerationOutcome {
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Generated { attempts, .. } | Self::Degraded { attempts, .. } => *attempts,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::Degraded { .. })
    }
}

/// Wraps the generation collaborator with a per-attempt deadline, doubling
/// backoff between transient failures and an optional canned reply once
/// retries run out. Permanent failures return immediately.
pub struct GenerationGuard {
    client: Arc<dyn LlmClient>,
    policy: GenerationPolicy,
}

impl GenerationGuard {
    pub fn new(client: Arc<dyn LlmClient>, policy: GenerationPolicy) -> Self {
        Self { client, policy }
    }

    pub async fn generate(
        &self,
        request: &CompletionRequest,
        correlation_id: &str,
    ) -> Result<GenerationOutcome, LlmError> {
        let mut backoff = self.policy.initial_backoff;
        let mut last_error = None;

        for attempt in 0..=self.policy.max_retries {
            if attempt > 0 {
                tokio::time::sleep(backoff).await;
                backoff = backoff.saturating_mul(2);
            }

            let deadline = self.policy.attempt_timeout;
            let result = tokio::time::timeout(deadline, self.client.complete(request))
                .await
                .unwrap_or_else(|_| Err(LlmError::Timeout(deadline)));

            match result {
                Ok(reply) => {
                    return Ok(GenerationOutcome::Generated { reply, attempts: attempt + 1 });
                }
                Err(error) if error.is_retryable() => {
                    warn!(
                        event_name = "llm.generation.attempt_failed",
                        correlation_id,
                        provider = self.client.provider(),
                        attempt = attempt + 1,
                        max_attempts = self.policy.max_retries + 1,
                        error = %error,
                        "transient generation failure"
                    );
                    last_error = Some(error);
                }
                Err(error) => {
                    warn!(
                        event_name = "llm.generation.rejected",
                        correlation_id,
                        provider = self.client.provider(),
                        attempt = attempt + 1,
                        error = %error,
                        "permanent generation failure, not retrying"
                    );
                    return Err(error);
                }
            }
        }

        let last_error = last_error
            .unwrap_or_else(|| LlmError::Transient("generation retries exhausted".to_string()));
        let attempts = self.policy.max_retries + 1;

        if self.policy.fallback_on_exhaustion {
            warn!(
                event_name = "llm.generation.degraded",
                correlation_id,
                provider = self.client.provider(),
                attempts,
                error = %last_error,
                "using fallback reply"
            );
            Ok(GenerationOutcome::Degraded {
                reason_code: "generation_retries_exhausted",
                reply: self.policy.fallback_reply.clone(),
                attempts,
                last_error,
            })
        } else {
            Err(last_error)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::{GenerationGuard, GenerationOutcome, GenerationPolicy};
    use crate::llm::scripted::ScriptedLlm;
    use crate::llm::{CompletionRequest, LlmError};

    fn policy(max_retries: u32, fallback_on_exhaustion: bool) -> GenerationPolicy {
        GenerationPolicy {
            attempt_timeout: Duration::from_millis(200),
            max_retries,
            initial_backoff: Duration::from_millis(1),
            fallback_on_exhaustion,
            fallback_reply: "We'll get back to you shortly.".to_string(),
        }
    }

    fn failing(error: LlmError) -> Arc<ScriptedLlm> {
        Arc::new(ScriptedLlm::new(vec![Err(error)]))
    }

    fn request() -> CompletionRequest {
        CompletionRequest {
            system_prompt: "You are PropBot".to_string(),
            history: Vec::new(),
            message: "hi".to_string(),
        }
    }

    #[tokio::test]
    async fn transient_failure_then_success_is_retried() {
        let llm = Arc::new(ScriptedLlm::new(vec![
            Err(LlmError::Transient("HTTP 503".to_string())),
            Ok("Hello! Are you looking to buy or rent?".to_string()),
        ]));
        let guard = GenerationGuard::new(llm.clone(), policy(2, true));

        let outcome = guard.generate(&request(), "req-1").await.expect("generate");

        assert_eq!(
            outcome,
            GenerationOutcome::Generated {
                reply: "Hello! Are you looking to buy or rent?".to_string(),
                attempts: 2,
            }
        );
        assert_eq!(llm.calls(), 2);
    }

    #[tokio::test]
    async fn permanent_failure_is_not_retried() {
        let llm = failing(LlmError::Permanent("HTTP 401".to_string()));
        let guard = GenerationGuard::new(llm.clone(), policy(3, true));

        let error = guard.generate(&request(), "req-2").await;

        assert_eq!(error, Err(LlmError::Permanent("HTTP 401".to_string())));
        assert_eq!(llm.calls(), 1);
    }

    #[tokio::test]
    async fn exhausted_retries_fall_back_when_enabled() {
        let llm = failing(LlmError::Transient("HTTP 502".to_string()));
        let guard = GenerationGuard::new(llm.clone(), policy(2, true));

        let outcome = guard.generate(&request(), "req-3").await.expect("fallback outcome");

        assert!(outcome.is_degraded());
        assert_eq!(outcome.attempts(), 3);
        let GenerationOutcome::Degraded { reply, .. } = outcome else {
            panic!("expected a degraded outcome");
        };
        assert_eq!(reply, "We'll get back to you shortly.");
        assert_eq!(llm.calls(), 3);
    }

    #[tokio::test]
    async fn exhausted_retries_surface_last_error_without_fallback() {
        let llm = failing(LlmError::Transient("HTTP 429".to_string()));
        let guard = GenerationGuard::new(llm.clone(), policy(1, false));

        let error = guard.generate(&request(), "req-4").await;

        assert_eq!(error, Err(LlmError::Transient("HTTP 429".to_string())));
        assert_eq!(llm.calls(), 2);
    }

    #[tokio::test]
    async fn slow_attempts_time_out_and_count_as_transient() {
        let llm = Arc::new(ScriptedLlm::replying("too late").with_delay(Duration::from_secs(5)));
        let mut policy = policy(1, false);
        policy.attempt_timeout = Duration::from_millis(20);
        let guard = GenerationGuard::new(llm.clone(), policy);

        let error = guard.generate(&request(), "req-5").await;

        assert_eq!(error, Err(LlmError::Timeout(Duration::from_millis(20))));
        assert_eq!(llm.calls(), 2);
    }
}
