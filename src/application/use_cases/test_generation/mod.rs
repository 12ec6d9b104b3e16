mod hashing;
pub mod llm_agent;
mod llm_output;
mod prompts;
pub mod quality;
pub mod refinement;

use crate::application::use_cases::data_protection::PiiSanitizer;
use crate::application::use_cases::epic_context::{EpicContext, EpicContextUseCase};
use crate::domain::critique::CritiqueVerdict;
use crate::domain::draft::{DraftDataType, DraftMetadata};
use crate::domain::error::{AppError, Result};
use crate::domain::test_artifact::TestArtifact;
use crate::infrastructure::store::DraftStore;
use crate::shared::TokenCounter;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{info, warn};

use hashing::normalize_language;

pub use llm_agent::{AgentSettings, LlmTestAgent};
pub use refinement::{LoopStatus, RefinementLoop, RefinementOutcome, RoundRecord};

/// Everything the generator needs for one epic.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationRequest {
    pub epic_key: String,
    pub summary: String,
    pub context: String,
    pub language: String,
}

#[async_trait]
pub trait TestCaseGenerator: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> Result<TestArtifact>;
}

#[async_trait]
pub trait TestCaseCritic: Send + Sync {
    async fn critique(&self, summary: &str, artifact: &TestArtifact) -> Result<CritiqueVerdict>;
}

#[async_trait]
pub trait TestCaseFixer: Send + Sync {
    /// Must return a complete artifact, never a partial patch.
    async fn fix(&self, artifact: &TestArtifact, verdict: &CritiqueVerdict)
        -> Result<TestArtifact>;
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationReport {
    pub epic_key: String,
    pub outcome: RefinementOutcome,
    /// Set when an artifact was produced and saved as a `test_cases` draft.
    pub draft_id: Option<String>,
}

pub struct TestGenerationUseCase {
    epic_context: Arc<EpicContextUseCase>,
    generator: Arc<dyn TestCaseGenerator>,
    critic: Arc<dyn TestCaseCritic>,
    fixer: Arc<dyn TestCaseFixer>,
    drafts: Arc<DraftStore>,
    sanitizer: PiiSanitizer,
    refinement: RefinementLoop,
    language: String,
    context_token_budget: usize,
}

impl TestGenerationUseCase {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        epic_context: Arc<EpicContextUseCase>,
        generator: Arc<dyn TestCaseGenerator>,
        critic: Arc<dyn TestCaseCritic>,
        fixer: Arc<dyn TestCaseFixer>,
        drafts: Arc<DraftStore>,
        refinement: RefinementLoop,
        language: &str,
        context_token_budget: usize,
    ) -> Self {
        Self {
            epic_context,
            generator,
            critic,
            fixer,
            drafts,
            sanitizer: PiiSanitizer::new(),
            refinement,
            language: normalize_language(language),
            context_token_budget,
        }
    }

    /// Save an `epic_analysis` draft describing what was loaded for the epic.
    pub async fn analyze_epic(&self, session_id: &str, epic_key: &str) -> Result<String> {
        let session_id = require_session(session_id)?;
        let context = self.epic_context.load(epic_key, false).await?;
        let prompt_context = context.to_prompt_context(self.context_token_budget);

        let data = json!({
            "epic": context.epic,
            "children": context.children.iter().map(|child| json!({
                "key": child.key,
                "summary": child.summary,
                "issueType": child.issue_type,
                "status": child.status,
            })).collect::<Vec<_>>(),
            "attachments": attachment_overview(&context),
            "estimatedContextTokens": TokenCounter::estimate_tokens(&prompt_context),
            "fromCache": context.from_cache,
        });

        let mut metadata = DraftMetadata::new();
        metadata.insert("epic_key".to_string(), json!(context.epic.key));
        metadata.insert("child_count".to_string(), json!(context.children.len()));
        let draft_id =
            self.drafts
                .save_draft(session_id, DraftDataType::EpicAnalysis, data, Some(metadata));
        info!(
            session_id = %session_id,
            epic_key = %context.epic.key,
            draft_id = %draft_id,
            "Epic analysis saved"
        );
        Ok(draft_id)
    }

    /// Run the generate/critique/fix loop for an epic and keep the result as a draft.
    ///
    /// Tracker failures are returned as errors; model failures end up in the outcome.
    pub async fn generate_for_epic(
        &self,
        session_id: &str,
        epic_key: &str,
    ) -> Result<GenerationReport> {
        let session_id = require_session(session_id)?;
        let context = self.epic_context.load(epic_key, false).await?;
        let request = self.build_request(&context);

        let outcome = self
            .refinement
            .run(
                &request,
                self.generator.as_ref(),
                self.critic.as_ref(),
                self.fixer.as_ref(),
            )
            .await;

        let draft_id = outcome.artifact.as_ref().map(|artifact| {
            let data = json!({
                "epicKey": request.epic_key,
                "artifact": artifact,
                "verdict": outcome.verdict,
                "status": outcome.status,
            });
            let mut metadata = DraftMetadata::new();
            metadata.insert("epic_key".to_string(), json!(request.epic_key));
            metadata.insert("status".to_string(), json!(outcome.status.as_str()));
            metadata.insert("approved".to_string(), json!(outcome.approved()));
            metadata.insert("rounds".to_string(), json!(outcome.critique_calls));
            self.drafts
                .save_draft(session_id, DraftDataType::TestCases, data, Some(metadata))
        });

        match &draft_id {
            Some(id) => info!(
                session_id = %session_id,
                epic_key = %request.epic_key,
                status = outcome.status.as_str(),
                draft_id = %id,
                "Test case generation finished"
            ),
            None => warn!(
                session_id = %session_id,
                epic_key = %request.epic_key,
                error = ?outcome.last_error,
                "Test case generation produced no artifact"
            ),
        }

        Ok(GenerationReport {
            epic_key: request.epic_key,
            outcome,
            draft_id,
        })
    }

    fn build_request(&self, context: &EpicContext) -> GenerationRequest {
        let raw_context = context.to_prompt_context(self.context_token_budget);
        GenerationRequest {
            epic_key: context.epic.key.clone(),
            summary: self.sanitizer.sanitize(&context.epic.summary),
            context: self.sanitizer.sanitize(&raw_context),
            language: self.language.clone(),
        }
    }
}

fn require_session(session_id: &str) -> Result<&str> {
    let trimmed = session_id.trim();
    if trimmed.is_empty() {
        return Err(AppError::ValidationError(
            "Session id is required.".to_string(),
        ));
    }
    Ok(trimmed)
}

fn attachment_overview(context: &EpicContext) -> Vec<Value> {
    let epic = context
        .epic_attachments
        .iter()
        .map(|a| (context.epic.key.as_str(), a));
    let children = context
        .child_attachments
        .iter()
        .flat_map(|(key, items)| items.iter().map(move |a| (key.as_str(), a)));
    epic.chain(children)
        .map(|(issue_key, attachment)| {
            json!({
                "issueKey": issue_key,
                "filename": attachment.filename,
                "charCount": attachment.char_count,
                "truncated": attachment.truncated,
            })
        })
        .collect()
}
