//! Field extraction: one section's text → the model's free-text reply.
//!
//! The prompt lives in [`crate::prompts`], the retry policy in
//! [`crate::pipeline::retry`], and the reply is parsed later by
//! [`crate::pipeline::parse`]. This module holds the seam between them:
//!
//! * [`ExtractionClient`]: "send this prompt, give me text back". The
//!   production implementation is [`LlmClient`] over `edgequake-llm`; tests
//!   plug in scripted clients to inject fault sequences.
//! * [`ResilientExtractor`]: renders the prompt for a section and runs the
//!   client under the backoff policy. Exhausting the budget is
//!   [`PipelineError::MaxRetriesExceeded`]; no partial reply is returned.

use crate::config::ExtractionConfig;
use crate::error::{ExtractionFault, PipelineError};
use crate::pipeline::retry::{with_backoff, BackoffPolicy, RetryError};
use crate::prompts::{render_extraction_prompt, EXTRACTION_PROMPT};
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider};
use std::future::Future;
use std::sync::Arc;
use tracing::debug;

/// A remote service that answers a text prompt.
pub trait ExtractionClient: Send + Sync {
    fn complete(&self, prompt: &str) -> impl Future<Output = Result<String, ExtractionFault>> + Send;
}

/// [`ExtractionClient`] backed by an `edgequake-llm` provider.
#[derive(Clone)]
pub struct LlmClient {
    provider: Arc<dyn LLMProvider>,
    options: CompletionOptions,
}

impl LlmClient {
    pub fn new(provider: Arc<dyn LLMProvider>, config: &ExtractionConfig) -> Self {
        Self {
            provider,
            options: build_options(config),
        }
    }
}

impl ExtractionClient for LlmClient {
    async fn complete(&self, prompt: &str) -> Result<String, ExtractionFault> {
        let messages = vec![ChatMessage::user(prompt)];
        match self.provider.chat(&messages, Some(&self.options)).await {
            Ok(response) => {
                debug!(
                    "{} input tokens, {} output tokens",
                    response.prompt_tokens, response.completion_tokens
                );
                Ok(response.content)
            }
            Err(e) => Err(ExtractionFault::classify(e.to_string())),
        }
    }
}

/// Build `CompletionOptions` from the extraction config.
pub(crate) fn build_options(config: &ExtractionConfig) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(config.temperature),
        max_tokens: Some(config.max_tokens),
        ..Default::default()
    }
}

/// Sends sections to an [`ExtractionClient`] with exponential backoff.
pub struct ResilientExtractor<C> {
    client: C,
    config: ExtractionConfig,
}

impl<C: ExtractionClient> ResilientExtractor<C> {
    pub fn new(client: C, config: ExtractionConfig) -> Self {
        Self { client, config }
    }

    pub fn config(&self) -> &ExtractionConfig {
        &self.config
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    fn prompt_for(&self, section_text: &str) -> String {
        let template = self
            .config
            .prompt_template
            .as_deref()
            .unwrap_or(EXTRACTION_PROMPT);
        render_extraction_prompt(template, section_text)
    }

    /// Extract with the configured retry budget and initial delay.
    pub async fn extract(&self, section_text: &str) -> Result<String, PipelineError> {
        self.extract_with_policy(section_text, self.config.backoff_policy())
            .await
    }

    /// Extract with an explicit retry budget and initial delay.
    pub async fn extract_with_policy(
        &self,
        section_text: &str,
        policy: BackoffPolicy,
    ) -> Result<String, PipelineError> {
        let prompt = self.prompt_for(section_text);
        let prompt = prompt.as_str();
        let client = &self.client;
        let result = with_backoff(
            policy,
            "extraction",
            self.config.progress_callback.as_ref(),
            move |_| client.complete(prompt),
        )
        .await;

        match result {
            Ok(text) => Ok(text),
            Err(RetryError::Exhausted { attempts, last }) => Err(PipelineError::MaxRetriesExceeded {
                attempts,
                last_error: last
                    .map(|f| f.to_string())
                    .unwrap_or_else(|| "no attempt was made".to_string()),
            }),
            Err(RetryError::Aborted(fault)) => Err(PipelineError::ExtractionRejected {
                detail: fault.detail().to_string(),
            }),
        }
    }
}
