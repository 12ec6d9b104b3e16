use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub enum LLMProvider {
    Local,
    OpenAI,
    OpenRouter,
    Google,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LLMConfig {
    pub provider: LLMProvider,
    pub base_url: String,
    pub model: String,
    /// Cheaper model used for critique and fix calls. Falls back to `model`.
    #[serde(default)]
    pub fast_model: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    120
}

impl LLMConfig {
    pub fn model_for(&self, variant: ModelVariant) -> &str {
        match variant {
            ModelVariant::Primary => &self.model,
            ModelVariant::Fast => self
                .fast_model
                .as_deref()
                .filter(|model| !model.trim().is_empty())
                .unwrap_or(&self.model),
        }
    }
}

impl Default for LLMConfig {
    fn default() -> Self {
        Self {
            provider: LLMProvider::Local,
            base_url: "http://localhost:1234/v1".to_string(),
            model: "local-model".to_string(),
            fast_model: None,
            api_key: None,
            max_tokens: Some(4096),
            temperature: Some(0.2),
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ModelVariant {
    #[default]
    Primary,
    Fast,
}

/// Per-call knobs for a structured completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompletionOptions {
    pub max_tokens: Option<u32>,
    pub variant: ModelVariant,
    pub json_mode: bool,
}

impl CompletionOptions {
    pub fn primary(max_tokens: Option<u32>) -> Self {
        Self {
            max_tokens,
            variant: ModelVariant::Primary,
            json_mode: true,
        }
    }

    pub fn fast(max_tokens: Option<u32>) -> Self {
        Self {
            max_tokens,
            variant: ModelVariant::Fast,
            json_mode: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fast_variant_falls_back_to_primary_model() {
        let mut config = LLMConfig::default();
        assert_eq!(config.model_for(ModelVariant::Fast), "local-model");

        config.fast_model = Some("  ".to_string());
        assert_eq!(config.model_for(ModelVariant::Fast), "local-model");

        config.fast_model = Some("gpt-4o-mini".to_string());
        assert_eq!(config.model_for(ModelVariant::Fast), "gpt-4o-mini");
        assert_eq!(config.model_for(ModelVariant::Primary), "local-model");
    }
}
