//! The external text-generation capability.
//!
//! The pipeline only ever needs `generate(system, user, params) -> text`.
//! [`TextGenerator`] is that seam: production code wraps an
//! `edgequake_llm` provider in [`LlmTextGenerator`], tests plug in scripted
//! generators. The trait is object safe (`async-trait`) so the config can
//! hold an `Arc<dyn TextGenerator>`.

use crate::config::SynthesisConfig;
use crate::error::{GenerationError, SynthError};
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, ImageData, LLMProvider, ProviderFactory};
use std::sync::Arc;
use tracing::debug;

const DEFAULT_MODEL: &str = "gpt-4.1-nano";

/// A base64 image sent along with the user prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageAttachment {
    pub base64: String,
    pub mime_type: String,
}

/// Sampling parameters for one call.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationParams {
    pub temperature: f32,
    pub max_tokens: usize,
    pub images: Vec<ImageAttachment>,
}

impl GenerationParams {
    pub fn from_config(config: &SynthesisConfig) -> Self {
        Self {
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            images: Vec::new(),
        }
    }

    pub fn with_image(mut self, image: ImageAttachment) -> Self {
        self.images.push(image);
        self
    }
}

/// Black-box text generation.
///
/// Implementations report every failure as a [`GenerationError`]; retrying
/// and timeouts are the caller's job.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        params: &GenerationParams,
    ) -> Result<String, GenerationError>;
}

/// [`TextGenerator`] backed by an `edgequake_llm` provider.
pub struct LlmTextGenerator {
    provider: Arc<dyn LLMProvider>,
}

impl LlmTextGenerator {
    pub fn new(provider: Arc<dyn LLMProvider>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl TextGenerator for LlmTextGenerator {
    async fn generate(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        params: &GenerationParams,
    ) -> Result<String, GenerationError> {
        let user = if params.images.is_empty() {
            ChatMessage::user(user_prompt)
        } else {
            let images = params
                .images
                .iter()
                .map(|img| ImageData::new(img.base64.clone(), img.mime_type.as_str()))
                .collect();
            ChatMessage::user_with_images(user_prompt, images)
        };
        let messages = vec![ChatMessage::system(system_prompt), user];

        let options = CompletionOptions {
            temperature: Some(params.temperature),
            max_tokens: Some(params.max_tokens),
            ..Default::default()
        };

        let response = self
            .provider
            .chat(&messages, Some(&options))
            .await
            .map_err(|e| GenerationError::Provider(e.to_string()))?;

        debug!(
            "LLM call: {} input tokens, {} output tokens",
            response.prompt_tokens, response.completion_tokens
        );
        Ok(response.content)
    }
}

/// Resolve the text generator, from most-specific to least-specific.
///
/// 1. **Pre-built generator** (`config.generator`), used as-is.
/// 2. **Named provider + model** (`config.provider_name`) through
///    [`ProviderFactory::create_llm_provider`], which reads the matching
///    API key from the environment.
/// 3. **Environment pair** `EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`.
/// 4. **OpenAI key present**: OpenAI with the configured or default model.
/// 5. **Full auto-detection** via [`ProviderFactory::from_env`].
pub fn resolve_generator(config: &SynthesisConfig) -> Result<Arc<dyn TextGenerator>, SynthError> {
    if let Some(ref generator) = config.generator {
        return Ok(Arc::clone(generator));
    }

    if let Some(ref name) = config.provider_name {
        let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
        return create_generator(name, model);
    }

    if let (Ok(prov), Ok(model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            return create_generator(&prov, &model);
        }
    }

    if let Ok(openai_key) = std::env::var("OPENAI_API_KEY") {
        if !openai_key.is_empty() {
            let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
            return create_generator("openai", model);
        }
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| SynthError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set OPENAI_API_KEY, ANTHROPIC_API_KEY, or configure a provider.\n\
                Error: {}",
                e
            ),
        })?;

    Ok(Arc::new(LlmTextGenerator::new(llm_provider)))
}

fn create_generator(provider_name: &str, model: &str) -> Result<Arc<dyn TextGenerator>, SynthError> {
    let provider = ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        SynthError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })?;
    Ok(Arc::new(LlmTextGenerator::new(provider)))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo;

    #[async_trait]
    impl TextGenerator for Echo {
        async fn generate(
            &self,
            _system_prompt: &str,
            user_prompt: &str,
            _params: &GenerationParams,
        ) -> Result<String, GenerationError> {
            Ok(user_prompt.to_string())
        }
    }

    #[test]
    fn params_from_config() {
        let config = SynthesisConfig::default();
        let params = GenerationParams::from_config(&config);
        assert_eq!(params.temperature, 0.3);
        assert_eq!(params.max_tokens, 1024);
        assert!(params.images.is_empty());
    }

    #[test]
    fn explicit_generator_wins() {
        let config = SynthesisConfig::builder()
            .generator(Arc::new(Echo))
            .provider_name("does-not-exist")
            .build()
            .unwrap();
        assert!(resolve_generator(&config).is_ok());
    }

    #[tokio::test]
    async fn trait_object_dispatch() {
        let g: Arc<dyn TextGenerator> = Arc::new(Echo);
        let params = GenerationParams::from_config(&SynthesisConfig::default());
        let out = g.generate("sys", "hello", &params).await.unwrap();
        assert_eq!(out, "hello");
    }
}
