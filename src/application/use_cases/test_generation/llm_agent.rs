use super::llm_output::{parse_test_artifact, parse_verdict};
use super::prompts::{
    build_critique_system_prompt, build_critique_user_prompt, build_fix_system_prompt,
    build_fix_user_prompt, build_generation_system_prompt, build_generation_user_prompt,
};
use super::quality;
use super::{GenerationRequest, TestCaseCritic, TestCaseFixer, TestCaseGenerator};
use crate::domain::critique::{CritiqueIssue, CritiqueVerdict};
use crate::domain::error::{AppError, Result};
use crate::domain::llm_config::{CompletionOptions, LLMConfig};
use crate::domain::test_artifact::{TestArtifact, TestStep};
use crate::infrastructure::llm_clients::LLMClient;
use crate::shared::TokenCounter;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct AgentSettings {
    pub generation_max_tokens: u32,
    pub critique_max_tokens: u32,
    pub fix_max_tokens: u32,
    pub language: String,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            generation_max_tokens: 6000,
            critique_max_tokens: 2000,
            fix_max_tokens: 6000,
            language: "English".to_string(),
        }
    }
}

/// Generator, critic and fixer backed by one LLM client.
///
/// Generation uses the primary model; critique and fix use the fast variant.
pub struct LlmTestAgent {
    llm_client: Arc<dyn LLMClient + Send + Sync>,
    config: LLMConfig,
    settings: AgentSettings,
}

impl LlmTestAgent {
    pub fn new(
        llm_client: Arc<dyn LLMClient + Send + Sync>,
        config: LLMConfig,
        settings: AgentSettings,
    ) -> Self {
        Self {
            llm_client,
            config,
            settings,
        }
    }

    async fn complete(
        &self,
        stage: &'static str,
        system: &str,
        user: &str,
        options: CompletionOptions,
    ) -> Result<String> {
        debug!(
            stage,
            model = %self.config.model_for(options.variant),
            prompt_tokens = TokenCounter::estimate_prompt_tokens(system, user),
            "LLM request"
        );
        self.llm_client
            .complete_structured(&self.config, system, user, &options)
            .await
    }
}

#[async_trait]
impl TestCaseGenerator for LlmTestAgent {
    async fn generate(&self, request: &GenerationRequest) -> Result<TestArtifact> {
        let system = build_generation_system_prompt(&request.language);
        let user = build_generation_user_prompt(request);
        let raw = self
            .complete(
                "generate",
                &system,
                &user,
                CompletionOptions::primary(Some(self.settings.generation_max_tokens)),
            )
            .await?;
        let artifact = parse_test_artifact(&raw, None)?;
        info!(
            epic_key = %request.epic_key,
            requirements = artifact.requirements.len(),
            test_cases = artifact.test_cases.len(),
            "Generated test artifact"
        );
        Ok(artifact)
    }
}

#[async_trait]
impl TestCaseCritic for LlmTestAgent {
    async fn critique(&self, summary: &str, artifact: &TestArtifact) -> Result<CritiqueVerdict> {
        let local = quality::inspect(artifact);
        let system = build_critique_system_prompt();
        let user = build_critique_user_prompt(summary, artifact, &local);
        let raw = self
            .complete(
                "critique",
                &system,
                &user,
                CompletionOptions::fast(Some(self.settings.critique_max_tokens)),
            )
            .await?;
        let verdict = parse_verdict(&raw)?;
        Ok(merge_local_findings(verdict, local.issues))
    }
}

#[async_trait]
impl TestCaseFixer for LlmTestAgent {
    async fn fix(&self, artifact: &TestArtifact, verdict: &CritiqueVerdict) -> Result<TestArtifact> {
        let system = build_fix_system_prompt(&self.settings.language);
        let user = build_fix_user_prompt(artifact, verdict);
        let raw = self
            .complete(
                "fix",
                &system,
                &user,
                CompletionOptions::fast(Some(self.settings.fix_max_tokens)),
            )
            .await?;
        let revised = parse_test_artifact(&raw, Some(&artifact.requirements))?;
        repair_orphan_steps(revised)
    }
}

/// Local findings are authoritative: any of them rejects the artifact.
pub(crate) fn merge_local_findings(
    mut verdict: CritiqueVerdict,
    local: Vec<CritiqueIssue>,
) -> CritiqueVerdict {
    if local.is_empty() {
        return verdict;
    }
    if verdict.approved {
        warn!(
            local_issues = local.len(),
            "Model approved an artifact that fails structural checks"
        );
    }
    verdict.approved = false;
    for issue in local {
        let duplicate = verdict.issues_found.iter().any(|existing| {
            existing.category == issue.category
                && existing.requirement_id == issue.requirement_id
                && existing.test_case_title == issue.test_case_title
        });
        if !duplicate {
            verdict.issues_found.push(issue);
        }
    }
    verdict
}

/// Fold every action that lacks an expected result into the following step.
/// A case whose last step is still unpaired cannot be repaired.
pub(crate) fn repair_orphan_steps(mut artifact: TestArtifact) -> Result<TestArtifact> {
    for case in &mut artifact.test_cases {
        let mut repaired = Vec::with_capacity(case.steps.len());
        let mut pending: Option<String> = None;
        for step in case.steps.drain(..) {
            let action = match pending.take() {
                Some(prefix) => format!("{}; {}", prefix, step.action.trim()),
                None => step.action.trim().to_string(),
            };
            if step.is_orphan() {
                pending = Some(action);
            } else {
                repaired.push(TestStep {
                    action,
                    expected: step.expected,
                });
            }
        }
        if pending.is_some() {
            return Err(AppError::ParseError(format!(
                "Fixed test case '{}' ends with an action without expected result",
                case.title
            )));
        }
        case.steps = repaired;
    }
    Ok(artifact)
}
