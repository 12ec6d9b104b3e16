use super::{build_http_client, LLMClient};
use crate::domain::error::{AppError, Result};
use crate::domain::llm_config::{CompletionOptions, LLMConfig};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Serialize)]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(rename = "systemInstruction", skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiContent>,
    #[serde(rename = "generationConfig", skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Serialize)]
struct GeminiContent {
    parts: Vec<GeminiPart>,
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
}

#[derive(Serialize)]
struct GeminiPart {
    text: String,
}

#[derive(Serialize)]
struct GenerationConfig {
    temperature: f64,
    #[serde(rename = "maxOutputTokens", skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
    #[serde(rename = "responseMimeType", skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<String>,
}

#[derive(Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Deserialize)]
struct GeminiCandidate {
    content: GeminiCandidateContent,
}

#[derive(Deserialize)]
struct GeminiCandidateContent {
    parts: Vec<GeminiCandidatePart>,
}

#[derive(Deserialize)]
struct GeminiCandidatePart {
    text: String,
}

pub struct GeminiClient {
    client: reqwest::Client,
}

impl GeminiClient {
    pub fn new(timeout_secs: u64) -> Self {
        Self {
            client: build_http_client(timeout_secs),
        }
    }

    fn api_key(config: &LLMConfig) -> Result<String> {
        config
            .api_key
            .clone()
            .ok_or_else(|| AppError::LLMError("Missing API key for Google provider".to_string()))
    }

    fn build_request(
        config: &LLMConfig,
        system: &str,
        user: &str,
        options: &CompletionOptions,
    ) -> GeminiRequest {
        let system_instruction = (!system.trim().is_empty()).then(|| GeminiContent {
            parts: vec![GeminiPart {
                text: system.to_string(),
            }],
            role: None,
        });

        GeminiRequest {
            contents: vec![GeminiContent {
                parts: vec![GeminiPart {
                    text: user.to_string(),
                }],
                role: Some("user".to_string()),
            }],
            system_instruction,
            generation_config: Some(GenerationConfig {
                temperature: config.temperature.unwrap_or(0.2) as f64,
                max_output_tokens: options.max_tokens.or(config.max_tokens),
                response_mime_type: options
                    .json_mode
                    .then(|| "application/json".to_string()),
            }),
        }
    }
}

#[async_trait]
impl LLMClient for GeminiClient {
    async fn complete_structured(
        &self,
        config: &LLMConfig,
        system: &str,
        user: &str,
        options: &CompletionOptions,
    ) -> Result<String> {
        let api_key = Self::api_key(config)?;
        let model_id = config.model_for(options.variant).trim();
        let base_url = config.base_url.trim_end_matches('/');
        let url = format!("{}/{}:generateContent", base_url, model_id);

        let body = Self::build_request(config, system, user, options);

        let response = self
            .client
            .post(&url)
            .query(&[("key", api_key.as_str())])
            .json(&body)
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

        let json: GeminiResponse = response
            .json()
            .await
            .map_err(|e| AppError::LLMError(format!("Failed to parse JSON: {}", e)))?;

        json.candidates
            .first()
            .and_then(|candidate| candidate.content.parts.first())
            .map(|part| part.text.clone())
            .ok_or_else(|| AppError::LLMError("Invalid response format".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_carries_system_instruction_and_json_mime() {
        let config = LLMConfig::default();
        let request = GeminiClient::build_request(
            &config,
            "Be strict",
            "Critique this",
            &CompletionOptions::fast(Some(256)),
        );
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["systemInstruction"]["parts"][0]["text"], "Be strict");
        assert_eq!(value["contents"][0]["role"], "user");
        assert_eq!(value["generationConfig"]["maxOutputTokens"], 256);
        assert_eq!(
            value["generationConfig"]["responseMimeType"],
            "application/json"
        );
    }

    #[test]
    fn blank_system_prompt_is_omitted() {
        let config = LLMConfig::default();
        let request =
            GeminiClient::build_request(&config, "  ", "hi", &CompletionOptions::primary(None));
        let value = serde_json::to_value(&request).unwrap();
        assert!(value.get("systemInstruction").is_none());
    }
}
