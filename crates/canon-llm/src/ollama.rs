//! Local chat models through an Ollama server.

use async_trait::async_trait;

use canon_core::error::{CanonError, CanonResult};
use canon_core::traits::{Llm, LlmConfig, LlmResponse, Prompt};

#[cfg(feature = "ollama")]
use ollama_rs::{
    generation::{
        chat::{request::ChatMessageRequest, ChatMessage},
        options::GenerationOptions,
        parameters::FormatType,
    },
    Ollama,
};

/// Default local model.
pub const DEFAULT_OLLAMA_MODEL: &str = "llama3.1:8b";

const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

pub struct OllamaLlm {
    #[cfg(feature = "ollama")]
    client: Ollama,
    config: LlmConfig,
}

impl OllamaLlm {
    pub fn new(mut config: LlmConfig) -> CanonResult<Self> {
        let url = url::Url::parse(config.base_url.as_deref().unwrap_or(DEFAULT_OLLAMA_URL))
            .map_err(|e| CanonError::Configuration(format!("Invalid Ollama URL: {}", e)))?;

        #[cfg(feature = "ollama")]
        let client = Ollama::new(
            format!("{}://{}", url.scheme(), url.host_str().unwrap_or("localhost")),
            url.port().unwrap_or(11434),
        );
        #[cfg(not(feature = "ollama"))]
        let _ = url;

        if config.model.is_empty() {
            config.model = DEFAULT_OLLAMA_MODEL.to_string();
        }

        Ok(Self {
            #[cfg(feature = "ollama")]
            client,
            config,
        })
    }
}

#[async_trait]
impl Llm for OllamaLlm {
    #[cfg(feature = "ollama")]
    async fn complete(&self, prompt: &Prompt) -> CanonResult<LlmResponse> {
        let messages = vec![
            ChatMessage::system(prompt.system.clone()),
            ChatMessage::user(prompt.user.clone()),
        ];
        let options = GenerationOptions::default()
            .temperature(self.config.temperature)
            .top_p(self.config.top_p)
            .num_predict(self.config.max_tokens as i32);

        let mut request =
            ChatMessageRequest::new(self.config.model.clone(), messages).options(options);
        if prompt.json {
            request = request.format(FormatType::Json);
        }

        let response = self
            .client
            .send_chat_messages(request)
            .await
            .map_err(|e| CanonError::llm(format!("Ollama API error: {}", e)))?;

        Ok(LlmResponse {
            content: response.message.map(|m| m.content),
            usage: None,
        })
    }

    #[cfg(not(feature = "ollama"))]
    async fn complete(&self, _prompt: &Prompt) -> CanonResult<LlmResponse> {
        Err(CanonError::Configuration(
            "Ollama feature not enabled. Enable the 'ollama' feature.".to_string(),
        ))
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}
