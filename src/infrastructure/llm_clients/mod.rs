pub mod gemini;
pub mod openai;

use crate::domain::error::Result;
use crate::domain::llm_config::{CompletionOptions, LLMConfig, LLMProvider};
use async_trait::async_trait;
use gemini::GeminiClient;
use openai::OpenAICompatibleClient;

#[async_trait]
pub trait LLMClient {
    /// One chat completion. Returns the raw assistant text; JSON extraction is the caller's job.
    async fn complete_structured(
        &self,
        config: &LLMConfig,
        system: &str,
        user: &str,
        options: &CompletionOptions,
    ) -> Result<String>;
}

pub struct RouterClient {
    openai: OpenAICompatibleClient,
    gemini: GeminiClient,
}

impl RouterClient {
    pub fn new(timeout_secs: u64) -> Self {
        Self {
            openai: OpenAICompatibleClient::new(timeout_secs),
            gemini: GeminiClient::new(timeout_secs),
        }
    }
}

#[async_trait]
impl LLMClient for RouterClient {
    async fn complete_structured(
        &self,
        config: &LLMConfig,
        system: &str,
        user: &str,
        options: &CompletionOptions,
    ) -> Result<String> {
        match config.provider {
            LLMProvider::Google => {
                self.gemini
                    .complete_structured(config, system, user, options)
                    .await
            }
            _ => {
                self.openai
                    .complete_structured(config, system, user, options)
                    .await
            }
        }
    }
}

pub(crate) fn build_http_client(timeout_secs: u64) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs.max(1)))
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}
