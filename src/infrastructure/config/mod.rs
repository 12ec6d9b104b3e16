use crate::domain::error::{AppError, Result};
use crate::domain::llm_config::{LLMConfig, LLMProvider};
use crate::infrastructure::security::{KeyringManager, SecretStore};
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

pub const ENV_PREFIX: &str = "EPICQA_";
const KEYRING_SERVICE: &str = "epicqa";
const JIRA_SECRET_KEY: &str = "jira";
/// Upper bound for any store TTL or idle window (100 years).
pub const MAX_STORE_TTL_SECS: i64 = 100 * 365 * 24 * 60 * 60;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub llm: LLMConfig,
    #[serde(default)]
    pub jira: JiraSettings,
    #[serde(default)]
    pub stores: StoreSettings,
    #[serde(default)]
    pub generation: GenerationSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JiraSettings {
    pub base_url: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub api_token: Option<String>,
    pub timeout_secs: u64,
}

impl Default for JiraSettings {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            email: None,
            api_token: None,
            timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreSettings {
    pub document_cache_ttl_secs: i64,
    pub draft_ttl_secs: i64,
    pub session_idle_secs: i64,
    /// Janitor period; 0 disables the background sweep.
    pub sweep_interval_secs: u64,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            document_cache_ttl_secs: 2 * 60 * 60,
            draft_ttl_secs: 24 * 60 * 60,
            session_idle_secs: 7 * 24 * 60 * 60,
            sweep_interval_secs: 10 * 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationSettings {
    pub max_retries: u32,
    pub max_generation_attempts: u32,
    pub generation_max_tokens: u32,
    pub critique_max_tokens: u32,
    pub fix_max_tokens: u32,
    pub language: String,
    /// Estimated tokens of epic/story/attachment context sent with a request.
    pub context_token_budget: usize,
    pub attachment_token_budget: usize,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            max_retries: 2,
            max_generation_attempts: 3,
            generation_max_tokens: 6000,
            critique_max_tokens: 2000,
            fix_max_tokens: 6000,
            language: "English".to_string(),
            context_token_budget: 12_000,
            attachment_token_budget: 6_000,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConfigValidation {
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl AppConfig {
    pub fn validate(&self) -> ConfigValidation {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        if self.llm.base_url.trim().is_empty() {
            errors.push("llm.base_url must not be empty".to_string());
        }
        if self.llm.model.trim().is_empty() {
            errors.push("llm.model must not be empty".to_string());
        }
        if self.llm.provider != LLMProvider::Local
            && self.llm.api_key.as_deref().map_or(true, |k| k.trim().is_empty())
        {
            warnings.push(format!(
                "llm.api_key is not set for {:?}; the keyring will be consulted",
                self.llm.provider
            ));
        }

        if self.jira.base_url.trim().is_empty() {
            warnings.push("jira.base_url is empty; epic loading will fail".to_string());
        }

        for (name, value) in [
            ("stores.document_cache_ttl_secs", self.stores.document_cache_ttl_secs),
            ("stores.draft_ttl_secs", self.stores.draft_ttl_secs),
            ("stores.session_idle_secs", self.stores.session_idle_secs),
        ] {
            if value <= 0 {
                errors.push(format!("{} must be positive", name));
            } else if value > MAX_STORE_TTL_SECS {
                errors.push(format!(
                    "{} must be at most {} seconds",
                    name, MAX_STORE_TTL_SECS
                ));
            }
        }
        if self.stores.sweep_interval_secs == 0 {
            warnings.push("stores.sweep_interval_secs is 0; background sweep disabled".to_string());
        }

        if self.generation.max_generation_attempts == 0 {
            errors.push("generation.max_generation_attempts must be at least 1".to_string());
        }
        if self.generation.max_retries > 10 {
            warnings.push(format!(
                "generation.max_retries = {} allows many LLM calls per request",
                self.generation.max_retries
            ));
        }

        ConfigValidation {
            valid: errors.is_empty(),
            errors,
            warnings,
        }
    }
}

/// Defaults, then the optional TOML file, then `EPICQA_*` variables
/// (`EPICQA_STORES__DRAFT_TTL_SECS=3600`).
pub fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            warn!(error = %e, "Failed to read .env file");
        }
    }

    let mut figment = Figment::from(Serialized::defaults(AppConfig::default()));
    if let Some(path) = path {
        debug!(path = %path.display(), "Loading configuration file");
        figment = figment.merge(Toml::file(path));
    }
    figment
        .merge(Env::prefixed(ENV_PREFIX).split("__"))
        .extract()
        .map_err(|e| AppError::ConfigError(e.to_string()))
}

/// Resolves and stores credentials. Values in the config win over the keyring.
pub struct ConfigService {
    secrets: Arc<dyn SecretStore>,
}

impl ConfigService {
    pub fn new() -> Self {
        Self::with_store(Arc::new(KeyringManager::new(KEYRING_SERVICE)))
    }

    pub fn with_store(secrets: Arc<dyn SecretStore>) -> Self {
        Self { secrets }
    }

    pub fn save_api_key(&self, provider: &LLMProvider, key: &str) -> Result<()> {
        if key.trim().is_empty() {
            return Err(AppError::ValidationError("API key is empty".to_string()));
        }
        self.secrets.set_secret(provider_account(provider), key)
    }

    pub fn delete_api_key(&self, provider: &LLMProvider) -> Result<()> {
        self.secrets.delete_secret(provider_account(provider))
    }

    pub fn resolve_api_key(&self, llm: &LLMConfig) -> Result<Option<String>> {
        if let Some(key) = non_empty(llm.api_key.as_deref()) {
            return Ok(Some(key));
        }
        self.secrets.get_secret(provider_account(&llm.provider))
    }

    pub fn save_jira_token(&self, token: &str) -> Result<()> {
        self.secrets.set_secret(JIRA_SECRET_KEY, token)
    }

    /// Fill missing secrets from the keyring. Keyring failures are logged, not fatal.
    pub fn apply_secrets(&self, config: &mut AppConfig) {
        match self.resolve_api_key(&config.llm) {
            Ok(key) => config.llm.api_key = key,
            Err(e) => warn!(error = %e, "Could not read LLM API key from keyring"),
        }

        if non_empty(config.jira.api_token.as_deref()).is_none() {
            match self.secrets.get_secret(JIRA_SECRET_KEY) {
                Ok(token) => config.jira.api_token = token,
                Err(e) => warn!(error = %e, "Could not read Jira token from keyring"),
            }
        }
    }
}

impl Default for ConfigService {
    fn default() -> Self {
        Self::new()
    }
}

fn provider_account(provider: &LLMProvider) -> &'static str {
    match provider {
        LLMProvider::Local => "local",
        LLMProvider::OpenAI => "openai",
        LLMProvider::OpenRouter => "openrouter",
        LLMProvider::Google => "google",
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
