//! OpenAI chat completions for pair resolution.

use async_trait::async_trait;

use canon_core::error::{CanonError, CanonResult};
use canon_core::traits::{Llm, LlmConfig, LlmResponse, Prompt, TokenUsage};

#[cfg(feature = "openai")]
use async_openai::{
    config::OpenAIConfig,
    types::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessage,
        ChatCompletionRequestSystemMessageContent, ChatCompletionRequestUserMessage,
        ChatCompletionRequestUserMessageContent, CreateChatCompletionRequest, ResponseFormat,
    },
    Client,
};

/// Default chat model for entity resolution.
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4.1-nano-2025-04-14";

const REASONING_PREFIXES: [&str; 4] = ["o1", "o3", "o4", "gpt-5"];

pub struct OpenAIProvider {
    #[cfg(feature = "openai")]
    client: Client<OpenAIConfig>,
    config: LlmConfig,
}

impl OpenAIProvider {
    pub fn new(mut config: LlmConfig) -> CanonResult<Self> {
        let api_key = config
            .api_key
            .clone()
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
            .ok_or_else(|| {
                CanonError::Configuration(
                    "OpenAI API key not found. Set OPENAI_API_KEY or llm.config.api_key."
                        .to_string(),
                )
            })?;

        #[cfg(feature = "openai")]
        let client = {
            let mut openai_config = OpenAIConfig::new().with_api_key(api_key);
            if let Some(ref base_url) = config.base_url {
                openai_config = openai_config.with_api_base(base_url);
            }
            Client::with_config(openai_config)
        };
        #[cfg(not(feature = "openai"))]
        let _ = api_key;

        if config.model.is_empty() {
            config.model = DEFAULT_OPENAI_MODEL.to_string();
        }

        Ok(Self {
            #[cfg(feature = "openai")]
            client,
            config,
        })
    }

    #[cfg(feature = "openai")]
    fn request(&self, prompt: &Prompt) -> CreateChatCompletionRequest {
        let messages = vec![
            ChatCompletionRequestMessage::System(ChatCompletionRequestSystemMessage {
                content: ChatCompletionRequestSystemMessageContent::Text(prompt.system.clone()),
                name: None,
            }),
            ChatCompletionRequestMessage::User(ChatCompletionRequestUserMessage {
                content: ChatCompletionRequestUserMessageContent::Text(prompt.user.clone()),
                name: None,
            }),
        ];

        let mut request = CreateChatCompletionRequest {
            model: self.config.model.clone(),
            messages,
            ..Default::default()
        };
        if !self.is_reasoning_model() {
            request.temperature = Some(self.config.temperature);
            request.top_p = Some(self.config.top_p);
            request.max_tokens = Some(self.config.max_tokens);
        }
        if prompt.json {
            request.response_format = Some(ResponseFormat::JsonObject);
        }
        request
    }
}

#[async_trait]
impl Llm for OpenAIProvider {
    #[cfg(feature = "openai")]
    async fn complete(&self, prompt: &Prompt) -> CanonResult<LlmResponse> {
        let response = self
            .client
            .chat()
            .create(self.request(prompt))
            .await
            .map_err(|e| CanonError::llm(format!("OpenAI API error: {}", e)))?;

        let usage = response.usage.map(|u| TokenUsage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
        });
        if let Some(ref usage) = usage {
            tracing::debug!(
                "{} used {} prompt / {} completion tokens",
                self.config.model,
                usage.prompt_tokens,
                usage.completion_tokens
            );
        }

        let content = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| CanonError::llm("No response choices returned"))?
            .message
            .content;

        Ok(LlmResponse { content, usage })
    }

    #[cfg(not(feature = "openai"))]
    async fn complete(&self, _prompt: &Prompt) -> CanonResult<LlmResponse> {
        Err(CanonError::Configuration(
            "OpenAI feature not enabled. Enable the 'openai' feature.".to_string(),
        ))
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }

    fn is_reasoning_model(&self) -> bool {
        let model = self.config.model.to_lowercase();
        REASONING_PREFIXES.iter().any(|p| model.starts_with(p))
    }
}
