use std::path::Path;
use std::sync::Arc;

use chrono::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::application::use_cases::epic_context::EpicContextUseCase;
use crate::application::use_cases::test_generation::{
    AgentSettings, LlmTestAgent, RefinementLoop, TestGenerationUseCase,
};
use crate::domain::error::{AppError, Result};
use crate::infrastructure::config::{load_config, AppConfig, ConfigService};
use crate::infrastructure::extraction::LocalDocumentExtractor;
use crate::infrastructure::llm_clients::{LLMClient, RouterClient};
use crate::infrastructure::store::{DocumentCache, DraftStore, ViewStore};
use crate::infrastructure::tracker::{IssueTracker, JiraClient};
use crate::shared::{Clock, SystemClock};

/// One instance of every store, client and use case, wired together.
pub struct AppContext {
    pub config: AppConfig,
    pub clock: Arc<dyn Clock>,
    pub document_cache: Arc<DocumentCache>,
    pub draft_store: Arc<DraftStore>,
    pub view_store: Arc<ViewStore>,
    pub llm_client: Arc<dyn LLMClient + Send + Sync>,
    pub tracker: Arc<dyn IssueTracker + Send + Sync>,
    pub epic_context: Arc<EpicContextUseCase>,
    pub test_generation: Arc<TestGenerationUseCase>,
}

impl AppContext {
    /// Load configuration (file, environment, keyring) and build the context.
    pub fn from_env(config_path: Option<&Path>) -> Result<Self> {
        let mut config = load_config(config_path)?;
        ConfigService::new().apply_secrets(&mut config);
        Self::build(config)
    }

    pub fn build(config: AppConfig) -> Result<Self> {
        Self::build_with_clock(config, Arc::new(SystemClock))
    }

    pub fn build_with_clock(config: AppConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        let validation = config.validate();
        for warning in &validation.warnings {
            warn!(warning = %warning, "Configuration warning");
        }
        if !validation.valid {
            error!(errors = ?validation.errors, "Invalid configuration");
            return Err(AppError::ConfigError(validation.errors.join("; ")));
        }

        let stores = &config.stores;
        let document_cache = Arc::new(DocumentCache::new(
            clock.clone(),
            ttl_from_secs("stores.document_cache_ttl_secs", stores.document_cache_ttl_secs)?,
        ));
        let draft_store = Arc::new(DraftStore::new(
            clock.clone(),
            ttl_from_secs("stores.draft_ttl_secs", stores.draft_ttl_secs)?,
            ttl_from_secs("stores.session_idle_secs", stores.session_idle_secs)?,
        ));
        let view_store = Arc::new(ViewStore::new(clock.clone()));

        let llm_client: Arc<dyn LLMClient + Send + Sync> =
            Arc::new(RouterClient::new(config.llm.timeout_secs));
        let tracker: Arc<dyn IssueTracker + Send + Sync> =
            Arc::new(JiraClient::new(config.jira.clone()));

        let generation = &config.generation;
        let epic_context = Arc::new(EpicContextUseCase::new(
            tracker.clone(),
            Arc::new(LocalDocumentExtractor::new(
                generation.attachment_token_budget,
            )),
            document_cache.clone(),
        ));
        let agent = Arc::new(LlmTestAgent::new(
            llm_client.clone(),
            config.llm.clone(),
            AgentSettings {
                generation_max_tokens: generation.generation_max_tokens,
                critique_max_tokens: generation.critique_max_tokens,
                fix_max_tokens: generation.fix_max_tokens,
                language: generation.language.clone(),
            },
        ));
        let refinement = RefinementLoop::new(generation.max_retries)
            .with_generation_attempts(generation.max_generation_attempts);
        let test_generation = Arc::new(TestGenerationUseCase::new(
            epic_context.clone(),
            agent.clone(),
            agent.clone(),
            agent,
            draft_store.clone(),
            refinement,
            &generation.language,
            generation.context_token_budget,
        ));

        info!(
            provider = ?config.llm.provider,
            model = %config.llm.model,
            max_retries = generation.max_retries,
            "Application context ready"
        );

        Ok(Self {
            config,
            clock,
            document_cache,
            draft_store,
            view_store,
            llm_client,
            tracker,
            epic_context,
            test_generation,
        })
    }

    /// Background sweep at the configured interval; `None` when disabled.
    pub fn spawn_janitor(&self) -> Option<JoinHandle<()>> {
        let secs = self.config.stores.sweep_interval_secs;
        if secs == 0 {
            return None;
        }
        Some(spawn_store_janitor(
            self.document_cache.clone(),
            self.draft_store.clone(),
            std::time::Duration::from_secs(secs),
        ))
    }
}

fn ttl_from_secs(name: &str, secs: i64) -> Result<Duration> {
    Duration::try_seconds(secs)
        .ok_or_else(|| AppError::ConfigError(format!("{} is out of range: {}", name, secs)))
}

/// Periodically drop expired cache entries, drafts and idle sessions.
///
/// Reads already ignore expired data, so this only bounds memory.
pub fn spawn_store_janitor(
    document_cache: Arc<DocumentCache>,
    draft_store: Arc<DraftStore>,
    period: std::time::Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let documents = document_cache.sweep();
            let drafts = draft_store.cleanup_expired();
            debug!(documents, drafts, "Store janitor pass");
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::draft::DraftDataType;
    use crate::infrastructure::config::MAX_STORE_TTL_SECS;
    use crate::shared::ManualClock;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    fn clock() -> Arc<ManualClock> {
        Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap(),
        ))
    }

    #[test]
    fn build_rejects_invalid_config() {
        let mut config = AppConfig::default();
        config.stores.document_cache_ttl_secs = 0;
        let err = AppContext::build_with_clock(config, clock()).err();
        assert!(matches!(err, Some(AppError::ConfigError(_))));
    }

    #[test]
    fn build_rejects_out_of_range_ttl() {
        let mut config = AppConfig::default();
        config.stores.document_cache_ttl_secs = i64::MAX;
        let err = AppContext::build_with_clock(config, clock()).err();
        assert!(matches!(err, Some(AppError::ConfigError(_))));
    }

    #[test]
    fn ttl_conversion_rejects_unrepresentable_seconds() {
        assert!(ttl_from_secs("ttl", i64::MAX).is_err());
        assert_eq!(ttl_from_secs("ttl", 90).ok(), Some(Duration::seconds(90)));
    }

    #[tokio::test]
    async fn build_accepts_century_long_draft_ttl() {
        let mut config = AppConfig::default();
        config.stores.draft_ttl_secs = MAX_STORE_TTL_SECS;
        config.stores.session_idle_secs = MAX_STORE_TTL_SECS;
        let clock = clock();
        let context = AppContext::build_with_clock(config, clock.clone()).unwrap();

        let id = context
            .draft_store
            .save_draft("s1", DraftDataType::TestCases, json!({}), None);
        clock.advance(Duration::days(365));
        assert!(context.draft_store.load_draft("s1", &id).is_some());
    }

    #[tokio::test]
    async fn build_wires_stores_with_configured_ttls() {
        let mut config = AppConfig::default();
        config.stores.draft_ttl_secs = 60;
        let clock = clock();
        let context = AppContext::build_with_clock(config, clock.clone()).unwrap();

        assert_eq!(context.document_cache.ttl(), Duration::hours(2));
        let id = context
            .draft_store
            .save_draft("s1", DraftDataType::TestCases, json!({}), None);
        clock.advance(Duration::seconds(61));
        assert!(context.draft_store.load_draft("s1", &id).is_none());
    }

    #[tokio::test]
    async fn janitor_sweeps_expired_entries() {
        let clock = clock();
        let cache = Arc::new(DocumentCache::new(clock.clone(), Duration::minutes(1)));
        let drafts = Arc::new(DraftStore::new(
            clock.clone(),
            Duration::minutes(1),
            Duration::days(7),
        ));
        cache.store("QA-1", Vec::new(), Default::default());
        drafts.save_draft("s1", DraftDataType::TestCases, json!({}), None);
        clock.advance(Duration::minutes(2));

        let handle = spawn_store_janitor(
            cache.clone(),
            drafts.clone(),
            std::time::Duration::from_millis(10),
        );
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        handle.abort();

        assert_eq!(cache.stats().total, 0);
        assert_eq!(drafts.stats().drafts, 0);
        assert!(drafts.session_exists("s1"));
    }

    #[tokio::test]
    async fn janitor_disabled_with_zero_interval() {
        let mut config = AppConfig::default();
        config.stores.sweep_interval_secs = 0;
        let context = AppContext::build_with_clock(config, clock()).unwrap();
        assert!(context.spawn_janitor().is_none());
    }
}
