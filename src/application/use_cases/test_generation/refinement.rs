//! Generate → critique → fix loop.
//!
//! One round is one critique. With `max_retries = R` the loop runs at most `R + 1`
//! critiques and `R` fixes. Generation has its own attempt budget. Collaborator
//! errors never escape: the outcome always carries the best artifact obtained, or
//! `None` when generation never produced one.

use super::hashing::{count_changed, fingerprint_cases};
use super::{GenerationRequest, TestCaseCritic, TestCaseFixer, TestCaseGenerator};
use crate::domain::critique::{CritiqueVerdict, OverallQuality};
use crate::domain::test_artifact::TestArtifact;
use serde::Serialize;
use std::collections::HashSet;
use tracing::{debug, info, warn};

pub const DEFAULT_MAX_RETRIES: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopStatus {
    /// A critique approved the current artifact.
    Approved,
    /// The final round was critiqued and not approved.
    Exhausted,
    /// The final critique failed; the artifact is returned without a verdict.
    CritiqueUnavailable,
    /// A fix failed; the previous artifact and its verdict are returned.
    FixFailed,
    /// No generation attempt produced an artifact.
    GenerationFailed,
}

impl LoopStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoopStatus::Approved => "approved",
            LoopStatus::Exhausted => "exhausted",
            LoopStatus::CritiqueUnavailable => "critique_unavailable",
            LoopStatus::FixFailed => "fix_failed",
            LoopStatus::GenerationFailed => "generation_failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoundRecord {
    pub round: u32,
    /// `None` when the critique call failed.
    pub approved: Option<bool>,
    pub overall_quality: Option<OverallQuality>,
    pub confidence_score: Option<f32>,
    pub issue_count: usize,
    /// Test cases whose fingerprint was not present in the previously critiqued artifact.
    pub changed_cases: usize,
    pub critique_error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RefinementOutcome {
    pub status: LoopStatus,
    pub artifact: Option<TestArtifact>,
    pub verdict: Option<CritiqueVerdict>,
    pub generation_calls: u32,
    pub critique_calls: u32,
    pub fix_calls: u32,
    pub rounds: Vec<RoundRecord>,
    pub last_error: Option<String>,
}

impl RefinementOutcome {
    pub fn approved(&self) -> bool {
        self.status == LoopStatus::Approved
    }

    pub fn has_artifact(&self) -> bool {
        self.artifact.is_some()
    }
}

enum LoopState {
    Generate,
    Critique,
    Fix(CritiqueVerdict),
    Done(LoopStatus),
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefinementLoop {
    max_retries: u32,
    max_generation_attempts: u32,
}

impl Default for RefinementLoop {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_RETRIES)
    }
}

impl RefinementLoop {
    /// Generation gets `max_retries + 1` attempts unless overridden.
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            max_generation_attempts: max_retries.saturating_add(1),
        }
    }

    pub fn with_generation_attempts(mut self, attempts: u32) -> Self {
        self.max_generation_attempts = attempts.max(1);
        self
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn max_generation_attempts(&self) -> u32 {
        self.max_generation_attempts
    }

    pub async fn run(
        &self,
        request: &GenerationRequest,
        generator: &dyn TestCaseGenerator,
        critic: &dyn TestCaseCritic,
        fixer: &dyn TestCaseFixer,
    ) -> RefinementOutcome {
        let mut run = LoopRun::default();
        let mut state = LoopState::Generate;
        let mut round: u32 = 0;

        loop {
            state = match state {
                LoopState::Generate => {
                    run.generation_calls += 1;
                    let attempt = run.generation_calls;
                    match generator.generate(request).await {
                        Ok(artifact) => {
                            debug!(
                                epic_key = %request.epic_key,
                                attempt,
                                test_cases = artifact.test_cases.len(),
                                "Generation succeeded"
                            );
                            run.artifact = Some(artifact);
                            LoopState::Critique
                        }
                        Err(err) => {
                            run.last_error = Some(err.to_string());
                            if attempt < self.max_generation_attempts {
                                warn!(
                                    epic_key = %request.epic_key,
                                    attempt,
                                    max_attempts = self.max_generation_attempts,
                                    error = %err,
                                    "Generation failed, retrying"
                                );
                                LoopState::Generate
                            } else {
                                warn!(
                                    epic_key = %request.epic_key,
                                    attempt,
                                    error = %err,
                                    "Generation failed, attempts exhausted"
                                );
                                LoopState::Failed
                            }
                        }
                    }
                }

                LoopState::Critique => {
                    let Some(artifact) = run.artifact.as_ref() else {
                        break;
                    };
                    run.critique_calls += 1;
                    let changed_cases = count_changed(&run.critiqued_fingerprints, artifact);
                    run.critiqued_fingerprints = fingerprint_cases(artifact);
                    let is_final = round >= self.max_retries;

                    match critic.critique(&request.summary, artifact).await {
                        Ok(verdict) => {
                            run.rounds.push(RoundRecord {
                                round,
                                approved: Some(verdict.approved),
                                overall_quality: Some(verdict.overall_quality),
                                confidence_score: Some(verdict.confidence_score),
                                issue_count: verdict.issues_found.len(),
                                changed_cases,
                                critique_error: None,
                            });
                            info!(
                                epic_key = %request.epic_key,
                                round,
                                approved = verdict.approved,
                                quality = ?verdict.overall_quality,
                                issues = verdict.issues_found.len(),
                                changed_cases,
                                "Critique round finished"
                            );

                            if verdict.approved {
                                run.verdict = Some(verdict);
                                LoopState::Done(LoopStatus::Approved)
                            } else if is_final {
                                run.verdict = Some(verdict);
                                LoopState::Done(LoopStatus::Exhausted)
                            } else {
                                LoopState::Fix(verdict)
                            }
                        }
                        Err(err) => {
                            run.last_error = Some(err.to_string());
                            run.rounds.push(RoundRecord {
                                round,
                                approved: None,
                                overall_quality: None,
                                confidence_score: None,
                                issue_count: 0,
                                changed_cases,
                                critique_error: Some(err.to_string()),
                            });
                            if is_final {
                                warn!(
                                    epic_key = %request.epic_key,
                                    round,
                                    error = %err,
                                    "Critique failed on final round, returning unreviewed artifact"
                                );
                                run.verdict = None;
                                LoopState::Done(LoopStatus::CritiqueUnavailable)
                            } else {
                                warn!(
                                    epic_key = %request.epic_key,
                                    round,
                                    error = %err,
                                    "Critique failed, retrying"
                                );
                                round += 1;
                                LoopState::Critique
                            }
                        }
                    }
                }

                LoopState::Fix(verdict) => {
                    let Some(artifact) = run.artifact.as_ref() else {
                        break;
                    };
                    run.fix_calls += 1;
                    match fixer.fix(artifact, &verdict).await {
                        Ok(fixed) => {
                            debug!(
                                epic_key = %request.epic_key,
                                round,
                                test_cases = fixed.test_cases.len(),
                                "Fix applied"
                            );
                            run.artifact = Some(fixed);
                            run.verdict = Some(verdict);
                            round += 1;
                            LoopState::Critique
                        }
                        Err(err) => {
                            warn!(
                                epic_key = %request.epic_key,
                                round,
                                error = %err,
                                "Fix failed, keeping previous artifact"
                            );
                            run.last_error = Some(err.to_string());
                            run.verdict = Some(verdict);
                            LoopState::Done(LoopStatus::FixFailed)
                        }
                    }
                }

                LoopState::Done(status) => return run.finish(status),
                LoopState::Failed => break,
            };
        }

        run.finish(LoopStatus::GenerationFailed)
    }
}

#[derive(Default)]
struct LoopRun {
    artifact: Option<TestArtifact>,
    verdict: Option<CritiqueVerdict>,
    critiqued_fingerprints: HashSet<String>,
    generation_calls: u32,
    critique_calls: u32,
    fix_calls: u32,
    rounds: Vec<RoundRecord>,
    last_error: Option<String>,
}

impl LoopRun {
    fn finish(self, status: LoopStatus) -> RefinementOutcome {
        let (artifact, verdict) = match status {
            LoopStatus::GenerationFailed => (None, None),
            _ => (self.artifact, self.verdict),
        };
        RefinementOutcome {
            status,
            artifact,
            verdict,
            generation_calls: self.generation_calls,
            critique_calls: self.critique_calls,
            fix_calls: self.fix_calls,
            rounds: self.rounds,
            last_error: self.last_error,
        }
    }
}
