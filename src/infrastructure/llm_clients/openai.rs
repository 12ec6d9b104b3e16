use super::{build_http_client, LLMClient};
use crate::domain::error::{AppError, Result};
use crate::domain::llm_config::{CompletionOptions, LLMConfig, LLMProvider};
use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

/// Chat-completions client for OpenAI, OpenRouter and local OpenAI-style servers.
pub struct OpenAICompatibleClient {
    client: reqwest::Client,
}

impl OpenAICompatibleClient {
    pub fn new(timeout_secs: u64) -> Self {
        Self {
            client: build_http_client(timeout_secs),
        }
    }

    fn endpoint(config: &LLMConfig) -> String {
        if config.base_url.ends_with('/') {
            format!("{}chat/completions", config.base_url)
        } else {
            format!("{}/chat/completions", config.base_url)
        }
    }

    pub(crate) fn build_body(
        config: &LLMConfig,
        system: &str,
        user: &str,
        options: &CompletionOptions,
    ) -> Value {
        let mut body = json!({
            "model": config.model_for(options.variant),
            "messages": [
                {
                    "role": "system",
                    "content": system
                },
                {
                    "role": "user",
                    "content": user
                }
            ],
            "max_tokens": options.max_tokens.or(config.max_tokens),
            "temperature": config.temperature,
        });
        if options.json_mode {
            body["response_format"] = json!({ "type": "json_object" });
        }
        body
    }
}

#[async_trait]
impl LLMClient for OpenAICompatibleClient {
    async fn complete_structured(
        &self,
        config: &LLMConfig,
        system: &str,
        user: &str,
        options: &CompletionOptions,
    ) -> Result<String> {
        let url = Self::endpoint(config);
        let body = Self::build_body(config, system, user, options);
        debug!(
            model = %config.model_for(options.variant),
            variant = ?options.variant,
            "Sending chat completion"
        );

        let mut request = self.client.post(&url).json(&body);
        match (&config.api_key, &config.provider) {
            (Some(api_key), _) => request = request.bearer_auth(api_key),
            (None, LLMProvider::Local) => {}
            (None, _) => {
                return Err(AppError::LLMError(format!(
                    "Missing API key for {:?}",
                    config.provider
                )))
            }
        }

        let response = request
            .send()
            .await
            .map_err(|e| AppError::LLMError(format!("Request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(AppError::LLMError(format!(
                "API error ({}): {}",
                status, text
            )));
        }

        let json: Value = response
            .json()
            .await
            .map_err(|e| AppError::LLMError(format!("Failed to parse JSON: {}", e)))?;

        json["choices"][0]["message"]["content"]
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| AppError::LLMError("Invalid response format".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn body_uses_fast_model_and_json_mode() {
        let config = LLMConfig {
            fast_model: Some("mini".to_string()),
            ..LLMConfig::default()
        };
        let body = OpenAICompatibleClient::build_body(
            &config,
            "sys",
            "user",
            &CompletionOptions::fast(Some(512)),
        );
        assert_eq!(body["model"], "mini");
        assert_eq!(body["max_tokens"], 512);
        assert_eq!(body["response_format"]["type"], "json_object");
        assert_eq!(body["messages"][0]["content"], "sys");
    }

    #[test]
    fn body_falls_back_to_config_max_tokens() {
        let config = LLMConfig::default();
        let options = CompletionOptions {
            json_mode: false,
            ..CompletionOptions::primary(None)
        };
        let body = OpenAICompatibleClient::build_body(&config, "s", "u", &options);
        assert_eq!(body["model"], "local-model");
        assert_eq!(body["max_tokens"], 4096);
        assert!(body.get("response_format").is_none());
    }

    #[test]
    fn endpoint_handles_trailing_slash() {
        let mut config = LLMConfig::default();
        config.base_url = "https://api.openai.com/v1/".to_string();
        assert_eq!(
            OpenAICompatibleClient::endpoint(&config),
            "https://api.openai.com/v1/chat/completions"
        );
    }
}
