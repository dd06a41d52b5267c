//! Adapter from any `edgequake-llm` provider to [`VisionModel`].
//!
//! Lets the pipeline run against OpenAI, Anthropic, Ollama, … with the same
//! prompts. Only temperature and the output-token cap are carried over;
//! top-p/top-k and the safety settings are Gemini request fields and are
//! sent only by [`crate::pipeline::gemini::GeminiModel`].

use crate::config::ExtractionConfig;
use crate::error::{ChallanError, ModelError};
use crate::pipeline::model::{PageRequest, VisionModel};
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, ImageData, LLMProvider, ProviderFactory};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// A vision model backed by an `edgequake-llm` provider.
pub struct ProviderModel {
    provider: Arc<dyn LLMProvider>,
    label: String,
    temperature: f32,
    max_tokens: usize,
    timeout: Option<Duration>,
}

impl ProviderModel {
    /// Instantiate the named provider (`"openai"`, `"anthropic"`, …) with the
    /// configured model. The provider reads its own API key from the
    /// environment.
    pub fn from_config(provider_name: &str, config: &ExtractionConfig) -> Result<Self, ChallanError> {
        let provider = ProviderFactory::create_llm_provider(provider_name, &config.model_name)
            .map_err(|e| ChallanError::ProviderNotConfigured {
                provider: provider_name.to_string(),
                hint: format!("{e}"),
            })?;
        Ok(Self::new(provider, format!("{provider_name}/{}", config.model_name), config))
    }

    /// Wrap an already constructed provider.
    pub fn new(provider: Arc<dyn LLMProvider>, label: String, config: &ExtractionConfig) -> Self {
        Self {
            provider,
            label,
            temperature: config.generation.temperature,
            max_tokens: config.generation.max_output_tokens as usize,
            timeout: config.api_timeout_secs.map(Duration::from_secs),
        }
    }

    fn options(&self) -> CompletionOptions {
        CompletionOptions {
            temperature: Some(self.temperature),
            max_tokens: Some(self.max_tokens),
            ..Default::default()
        }
    }
}

#[async_trait]
impl VisionModel for ProviderModel {
    fn name(&self) -> String {
        self.label.clone()
    }

    async fn generate(&self, request: PageRequest<'_>) -> Result<String, ModelError> {
        let image = ImageData::new(request.image.to_base64(), request.image.mime_type);
        let messages = vec![
            ChatMessage::system(request.system_prompt),
            ChatMessage::user_with_images(request.user_prompt, vec![image]),
        ];
        let options = self.options();

        let call = self.provider.chat(&messages, Some(&options));
        let response = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, call)
                .await
                .map_err(|_| ModelError::Other(format!("timed out after {}s", limit.as_secs())))?,
            None => call.await,
        }
        .map_err(|e| ModelError::Other(e.to_string()))?;

        debug!(
            "Page {}: {} input tokens, {} output tokens",
            request.image.page_num, response.prompt_tokens, response.completion_tokens
        );
        Ok(response.content)
    }
}
