//! Resilient generation: one external call per category, bounded.
//!
//! Each attempt races the provider against a fixed timeout. Failed attempts
//! are followed by a constant delay (no exponential backoff); once the
//! attempt budget is spent the category gets deterministic fallback text
//! built from its own input. The only error that escapes is a missing prompt
//! template, which is a deployment defect rather than a transient failure.
//!
//! The retry loop is driven by [`RetryPolicy::transition`], a pure function
//! over [`AttemptState`], so the attempt/delay semantics can be tested
//! without any I/O:
//!
//! ```text
//! Attempt(n) ──ok──────────────▶ Succeeded
//!     │
//!     └─err──▶ n < max ─▶ Retry(n) ──delay──▶ Attempt(n+1)
//!              n = max ─▶ Exhausted ──────────▶ Fallback text
//! ```

use crate::config::SynthesisConfig;
use crate::error::{GenerationError, SynthError};
use crate::model::{Category, FittedImage, GenerationOutcome, GenerationRequest};
use crate::prompts::{PromptSet, PromptTemplate};
use crate::provider::{GenerationParams, ImageAttachment, TextGenerator};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::sync::Arc;
use tokio::time::{sleep, timeout, Duration, Instant};
use tracing::{debug, warn};

/// Attempt budget, inter-attempt delay and per-attempt timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, at least 1.
    pub max_attempts: u32,
    pub delay: Duration,
    pub timeout: Duration,
}

impl RetryPolicy {
    /// Policy for category rewriting.
    pub fn generation(config: &SynthesisConfig) -> Self {
        Self {
            max_attempts: config.max_retries.max(1),
            delay: Duration::from_millis(config.retry_delay_ms),
            timeout: Duration::from_millis(config.generation_timeout_ms),
        }
    }

    /// Policy for short caption calls.
    pub fn caption(config: &SynthesisConfig) -> Self {
        Self {
            timeout: Duration::from_millis(config.caption_timeout_ms),
            ..Self::generation(config)
        }
    }

    /// Next state after attempt number `attempt` (1-based) produced `result`.
    pub fn transition(&self, attempt: u32, result: Result<String, GenerationError>) -> AttemptState {
        match result {
            Ok(text) => AttemptState::Succeeded { attempt, text },
            Err(last_error) if attempt < self.max_attempts => AttemptState::Retry {
                attempt,
                last_error,
            },
            Err(last_error) => AttemptState::Exhausted {
                attempts: attempt,
                last_error,
            },
        }
    }

    /// Upper bound on wall-clock time for one category.
    pub fn worst_case(&self) -> Duration {
        (self.timeout + self.delay) * self.max_attempts
    }
}

/// Retry loop state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptState {
    /// About to make attempt `n` (1-based).
    Attempt(u32),
    /// Attempt `attempt` failed; wait the fixed delay, then try again.
    Retry {
        attempt: u32,
        last_error: GenerationError,
    },
    Succeeded {
        attempt: u32,
        text: String,
    },
    Exhausted {
        attempts: u32,
        last_error: GenerationError,
    },
}

/// Deterministic text used when every attempt failed.
///
/// `[<tag>] <Capitalized tag>` followed by the original content.
pub fn fallback_text(category: Category, content: &str) -> String {
    format!("[{}] {}\n{}", category.tag(), category.capitalized(), content)
}

/// Deterministic caption used when every caption attempt failed.
pub fn fallback_caption(figure_number: usize) -> String {
    format!("Figura {figure_number}")
}

/// Outcome plus the bookkeeping the orchestrator reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationReport {
    pub outcome: GenerationOutcome,
    pub attempts: u32,
    pub duration_ms: u64,
    pub last_error: Option<GenerationError>,
}

/// Wraps a [`TextGenerator`] with templates, retries, timeout and fallback.
#[derive(Clone)]
pub struct ResilientGenerator {
    generator: Arc<dyn TextGenerator>,
    prompts: PromptSet,
    params: GenerationParams,
    policy: RetryPolicy,
    caption_policy: RetryPolicy,
}

impl ResilientGenerator {
    pub fn new(generator: Arc<dyn TextGenerator>, config: &SynthesisConfig) -> Self {
        Self {
            generator,
            prompts: config.prompts.clone(),
            params: GenerationParams::from_config(config),
            policy: RetryPolicy::generation(config),
            caption_policy: RetryPolicy::caption(config),
        }
    }

    /// Template lookup; a miss is the one fatal error of this stage.
    pub fn template(&self, category: Category) -> Result<&PromptTemplate, SynthError> {
        self.prompts
            .get(category)
            .ok_or_else(|| SynthError::ConfigError {
                category,
                message: "no prompt template registered for this category".to_string(),
            })
    }

    /// Generate text for one category. Never fails except on a missing template.
    pub async fn generate(&self, request: &GenerationRequest) -> Result<GenerationOutcome, SynthError> {
        Ok(self.generate_with_report(request).await?.outcome)
    }

    /// [`ResilientGenerator::generate`] plus attempt count and timing.
    pub async fn generate_with_report(
        &self,
        request: &GenerationRequest,
    ) -> Result<GenerationReport, SynthError> {
        let template = self.template(request.category)?;
        let user_prompt = template.render_user(&request.title, &request.content);
        let fallback = fallback_text(request.category, &request.content);

        Ok(self
            .run(
                request.category.tag(),
                &self.policy,
                &template.system,
                &user_prompt,
                &self.params,
                fallback,
            )
            .await)
    }

    /// Caption figure `figure_number` (1-based) with the image attached.
    ///
    /// Uses the caption timeout and only the first line of the answer. Falls
    /// back to [`fallback_caption`], also when that line is blank once
    /// quotes are stripped.
    pub async fn caption(&self, title: &str, figure_number: usize, image: &FittedImage) -> GenerationReport {
        let template = self.prompts.caption();
        let user_prompt = template.render_user(title, &figure_number.to_string());
        let params = self.params.clone().with_image(ImageAttachment {
            base64: STANDARD.encode(&image.bytes),
            mime_type: image.format.mime_type().to_string(),
        });
        let label = format!("figure {figure_number}");

        let mut report = self
            .run(
                &label,
                &self.caption_policy,
                &template.system,
                &user_prompt,
                &params,
                fallback_caption(figure_number),
            )
            .await;
        if let GenerationOutcome::Success { ref text } = report.outcome {
            let first = text.lines().next().unwrap_or_default().trim();
            let caption = first.trim_matches('"').trim();
            report.outcome = if caption.is_empty() {
                warn!("{}: blank caption, using fallback", label);
                report.last_error = Some(GenerationError::EmptyResponse);
                GenerationOutcome::Fallback {
                    text: fallback_caption(figure_number),
                }
            } else {
                GenerationOutcome::Success {
                    text: caption.to_string(),
                }
            };
        }
        report
    }

    /// Drive the retry state machine for an already rendered prompt pair.
    async fn run(
        &self,
        label: &str,
        policy: &RetryPolicy,
        system_prompt: &str,
        user_prompt: &str,
        params: &GenerationParams,
        fallback: String,
    ) -> GenerationReport {
        let start = Instant::now();
        let mut state = AttemptState::Attempt(1);

        loop {
            state = match state {
                AttemptState::Attempt(n) => {
                    let result = self.attempt(policy.timeout, system_prompt, user_prompt, params).await;
                    policy.transition(n, result)
                }
                AttemptState::Retry {
                    attempt,
                    last_error,
                } => {
                    warn!(
                        "{}: attempt {}/{} failed ({}); retrying in {}ms",
                        label,
                        attempt,
                        policy.max_attempts,
                        last_error,
                        policy.delay.as_millis()
                    );
                    sleep(policy.delay).await;
                    AttemptState::Attempt(attempt + 1)
                }
                AttemptState::Succeeded { attempt, text } => {
                    debug!("{}: generated on attempt {}", label, attempt);
                    return GenerationReport {
                        outcome: GenerationOutcome::Success { text },
                        attempts: attempt,
                        duration_ms: start.elapsed().as_millis() as u64,
                        last_error: None,
                    };
                }
                AttemptState::Exhausted {
                    attempts,
                    last_error,
                } => {
                    warn!(
                        "{}: all {} attempts failed (last: {}); using fallback text",
                        label, attempts, last_error
                    );
                    return GenerationReport {
                        outcome: GenerationOutcome::Fallback { text: fallback },
                        attempts,
                        duration_ms: start.elapsed().as_millis() as u64,
                        last_error: Some(last_error),
                    };
                }
            };
        }
    }

    /// One provider call raced against the timeout.
    async fn attempt(
        &self,
        limit: Duration,
        system_prompt: &str,
        user_prompt: &str,
        params: &GenerationParams,
    ) -> Result<String, GenerationError> {
        let call = self.generator.generate(system_prompt, user_prompt, params);
        match timeout(limit, call).await {
            Err(_) => Err(GenerationError::Timeout {
                elapsed_ms: limit.as_millis() as u64,
            }),
            Ok(Err(e)) => Err(e),
            Ok(Ok(text)) => {
                let text = text.trim();
                if text.is_empty() {
                    Err(GenerationError::EmptyResponse)
                } else {
                    Ok(text.to_string())
                }
            }
        }
    }
}
