// Copyright 2025 Agentgauge Contributors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Per-case execution: produce a transcript, then score it.
//!
//! The runner owns the full lifecycle of one case. Evaluators run against
//! whatever transcript exists, even an incomplete one, and each evaluator
//! failure is isolated: the remaining evaluators still land, and the failure
//! is recorded as an error string on the case result.

use std::sync::Arc;
use std::time::Duration;

use agentgauge_core::{
    current_timestamp_us, AgentConfig, Case, CaseResult, CaseStatus, EngineConfig, Transcript,
    TranscriptStatus, Turn,
};
use agentgauge_evals::{invoke_with_retry, EvaluatorKind, Judge, ModelClient, RetryPolicy};

use crate::simulator::{ActorSimulator, PersonaSpec};
use crate::CancelFlag;

/// How the transcript for a case is produced.
#[derive(Debug, Clone)]
pub enum ExecutionMode {
    /// Single-turn execution, unless the case carries persona metadata.
    Auto,
    /// Multi-turn simulation for every case, persona or not.
    Simulate { max_turns: u32 },
}

/// Executes one case end to end: transcript production plus evaluation.
pub struct CaseRunner {
    client: Arc<dyn ModelClient>,
    judge: Arc<Judge>,
    simulator: ActorSimulator,
    timeout: Duration,
    retry: RetryPolicy,
    default_max_turns: u32,
}

impl CaseRunner {
    pub fn new(client: Arc<dyn ModelClient>, judge: Arc<Judge>, config: &EngineConfig) -> Self {
        Self {
            simulator: ActorSimulator::from_config(client.clone(), config),
            client,
            judge,
            timeout: Duration::from_secs(config.invoke_timeout_secs),
            retry: RetryPolicy::new(config.max_retries),
            default_max_turns: config.max_turns,
        }
    }

    /// Replace the simulator, e.g. to install a stop predicate.
    pub fn with_simulator(mut self, simulator: ActorSimulator) -> Self {
        self.simulator = simulator;
        self
    }

    /// Run one case and score it with every resolved evaluator.
    ///
    /// Never returns an error: whatever goes wrong is recorded on the
    /// [`CaseResult`] so one bad case cannot sink the run.
    pub async fn run_case(
        &self,
        case: &Case,
        agent: &AgentConfig,
        evaluators: &[EvaluatorKind],
        rubric: Option<&str>,
        mode: &ExecutionMode,
        cancel: &CancelFlag,
    ) -> CaseResult {
        let (transcript, agent_error) = self.produce_transcript(case, agent, mode, cancel).await;

        let judgments = futures::future::join_all(
            evaluators
                .iter()
                .map(|kind| self.judge.evaluate(*kind, case, &transcript, rubric)),
        )
        .await;

        let mut evaluations = Vec::with_capacity(evaluators.len());
        let mut errors = Vec::new();
        if let Some(error) = &agent_error {
            errors.push(error.clone());
        }
        let mut evaluator_failed = false;
        for (kind, judgment) in evaluators.iter().zip(judgments) {
            match judgment {
                Ok(result) => evaluations.push(result),
                Err(e) => {
                    evaluator_failed = true;
                    tracing::warn!(
                        case_name = %case.name,
                        evaluator = kind.name(),
                        error = %e,
                        "evaluator failed"
                    );
                    errors.push(format!("{}: {}", kind.name(), e));
                }
            }
        }

        let case_status = if agent_error.is_some() {
            CaseStatus::Failed
        } else if evaluator_failed {
            CaseStatus::CompletedWithPartialEvaluations
        } else {
            CaseStatus::Completed
        };

        tracing::debug!(
            case_name = %case.name,
            status = case_status.as_str(),
            evaluations = evaluations.len(),
            errors = errors.len(),
            "case finished"
        );

        CaseResult {
            case: case.clone(),
            transcript,
            evaluations,
            case_status,
            errors,
            extra: serde_json::Map::new(),
        }
    }

    async fn produce_transcript(
        &self,
        case: &Case,
        agent: &AgentConfig,
        mode: &ExecutionMode,
        cancel: &CancelFlag,
    ) -> (Transcript, Option<String>) {
        if cancel.is_cancelled() {
            let transcript = Transcript::finished(
                Vec::new(),
                TranscriptStatus::Incomplete,
                current_timestamp_us(),
            );
            return (transcript, Some("run cancelled before case started".into()));
        }

        match mode {
            ExecutionMode::Simulate { max_turns } => {
                let persona = PersonaSpec::from_case(case)
                    .unwrap_or_else(|| PersonaSpec::for_goal(case.input_text()));
                let limit = PersonaSpec::case_max_turns(case).unwrap_or(*max_turns);
                let outcome = self
                    .simulator
                    .simulate(agent, case, &persona, limit, cancel)
                    .await;
                (outcome.transcript, outcome.error)
            }
            ExecutionMode::Auto => match PersonaSpec::from_case(case) {
                Some(persona) => {
                    let limit =
                        PersonaSpec::case_max_turns(case).unwrap_or(self.default_max_turns);
                    let outcome = self
                        .simulator
                        .simulate(agent, case, &persona, limit, cancel)
                        .await;
                    (outcome.transcript, outcome.error)
                }
                None => self.single_turn(case, agent).await,
            },
        }
    }

    async fn single_turn(&self, case: &Case, agent: &AgentConfig) -> (Transcript, Option<String>) {
        let started_at_us = current_timestamp_us();
        let input = case.input_text();
        let conversation = [Turn::user(input.clone())];
        match invoke_with_retry(
            &self.client,
            &conversation,
            &agent.model_id,
            Some(&agent.system_prompt),
            self.timeout,
            &self.retry,
        )
        .await
        {
            Ok(response) => {
                let agent_turn =
                    Turn::agent(response.content).with_tool_calls(response.tool_calls);
                (
                    Transcript::single_turn(input, agent_turn, started_at_us),
                    None,
                )
            }
            Err(e) => {
                // The lone user turn is still worth keeping for the record.
                let transcript = Transcript::finished(
                    vec![Turn::user(input)],
                    TranscriptStatus::Incomplete,
                    started_at_us,
                );
                (transcript, Some(format!("agent invocation failed: {e}")))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;
    use serde_json::json;

    use agentgauge_evals::{ClientError, ModelResponse};

    /// Answers as agent, actor, or judge depending on the system prompt.
    /// Judge verdicts score 1.0 when the transcript contains the reference
    /// answer "42"; judgments for the criterion named in `break_criterion`
    /// come back as prose the parser rejects.
    struct HarnessClient {
        agent_calls: AtomicU32,
        judge_calls: AtomicU32,
        fail_agent: bool,
        break_criterion: Option<&'static str>,
    }

    impl HarnessClient {
        fn new() -> Self {
            Self {
                agent_calls: AtomicU32::new(0),
                judge_calls: AtomicU32::new(0),
                fail_agent: false,
                break_criterion: None,
            }
        }

        fn failing_agent() -> Self {
            Self {
                fail_agent: true,
                ..Self::new()
            }
        }

        fn breaking(criterion: &'static str) -> Self {
            Self {
                break_criterion: Some(criterion),
                ..Self::new()
            }
        }

        fn response(content: impl Into<String>) -> ModelResponse {
            ModelResponse {
                content: content.into(),
                tool_calls: Vec::new(),
                usage: None,
                model: "test-model".to_string(),
                latency_ms: 1,
            }
        }
    }

    #[async_trait]
    impl ModelClient for HarnessClient {
        async fn invoke(
            &self,
            conversation: &[Turn],
            _model_id: &str,
            system_prompt: Option<&str>,
        ) -> Result<ModelResponse, ClientError> {
            let system = system_prompt.unwrap_or("");
            if system.contains("expert evaluator") {
                self.judge_calls.fetch_add(1, Ordering::SeqCst);
                let prompt = conversation.last().map(|t| t.content.as_str()).unwrap_or("");
                if let Some(marker) = self.break_criterion {
                    if prompt.contains(marker) {
                        return Ok(Self::response("I refuse to answer in JSON."));
                    }
                }
                let score = if prompt.contains("42") { 1.0 } else { 0.2 };
                return Ok(Self::response(format!(
                    r#"{{"score": {score}, "rationale": "graded"}}"#
                )));
            }
            if system.contains("role-playing a user") {
                return Ok(Self::response("and what else?"));
            }
            self.agent_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_agent {
                return Err(ClientError::InvalidResponse("agent down".to_string()));
            }
            Ok(Self::response("the answer is 42"))
        }

        fn provider(&self) -> &str {
            "test"
        }
    }

    fn runner(client: Arc<HarnessClient>) -> CaseRunner {
        let mut config = EngineConfig::default();
        config.max_retries = 0;
        config.invoke_timeout_secs = 5;
        config.enable_judge_cache = false;
        let judge = Arc::new(Judge::from_config(client.clone(), &config));
        CaseRunner::new(client, judge, &config)
    }

    #[tokio::test]
    async fn test_single_turn_case_completes_with_scores() {
        let client = Arc::new(HarnessClient::new());
        let run = runner(client.clone());
        let case = Case::new("meaning", json!("What is the meaning of life?"));

        let result = run
            .run_case(
                &case,
                &AgentConfig::default(),
                &[EvaluatorKind::Output],
                None,
                &ExecutionMode::Auto,
                &CancelFlag::new(),
            )
            .await;

        assert_eq!(result.case_status, CaseStatus::Completed);
        assert_eq!(result.transcript.turns.len(), 2);
        assert_eq!(result.evaluations.len(), 1);
        assert!(result.evaluations[0].passed);
        assert!(result.errors.is_empty());
        assert!(result.passed());
        assert_eq!(client.agent_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_one_failing_evaluator_leaves_the_others() {
        // Faithfulness verdicts come back as unparseable prose.
        let client = Arc::new(HarnessClient::breaking("Factual accuracy"));
        let run = runner(client);
        let case = Case::new("partial", json!("q"));

        let result = run
            .run_case(
                &case,
                &AgentConfig::default(),
                &[
                    EvaluatorKind::Output,
                    EvaluatorKind::Helpfulness,
                    EvaluatorKind::Faithfulness,
                ],
                None,
                &ExecutionMode::Auto,
                &CancelFlag::new(),
            )
            .await;

        assert_eq!(result.case_status, CaseStatus::CompletedWithPartialEvaluations);
        assert_eq!(result.evaluations.len(), 2);
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].starts_with("faithfulness:"), "{}", result.errors[0]);
        let names: Vec<&str> = result
            .evaluations
            .iter()
            .map(|e| e.evaluator_name.as_str())
            .collect();
        assert_eq!(names, vec!["output", "helpfulness"]);
    }

    #[tokio::test]
    async fn test_agent_failure_marks_case_failed_but_still_evaluates() {
        let client = Arc::new(HarnessClient::failing_agent());
        let run = runner(client);
        let case = Case::new("down", json!("q"));

        let result = run
            .run_case(
                &case,
                &AgentConfig::default(),
                &[EvaluatorKind::Output],
                None,
                &ExecutionMode::Auto,
                &CancelFlag::new(),
            )
            .await;

        assert_eq!(result.case_status, CaseStatus::Failed);
        assert_eq!(result.transcript.status, TranscriptStatus::Incomplete);
        assert!(result.errors[0].contains("agent invocation failed"));
        // No agent turn, so the output evaluator skips instead of guessing.
        assert_eq!(result.evaluations.len(), 1);
        assert!(result.evaluations[0].skipped);
        assert!(!result.passed());
    }

    #[tokio::test]
    async fn test_auto_mode_simulates_persona_cases() {
        let client = Arc::new(HarnessClient::new());
        let run = runner(client);
        let case = Case::new("multi", json!("help me"))
            .with_metadata("persona", json!({"goal": "get help"}))
            .with_metadata("max_turns", json!(2));

        let result = run
            .run_case(
                &case,
                &AgentConfig::default(),
                &[EvaluatorKind::Helpfulness],
                None,
                &ExecutionMode::Auto,
                &CancelFlag::new(),
            )
            .await;

        assert_eq!(result.transcript.agent_turn_count(), 2);
        assert_eq!(result.transcript.status, TranscriptStatus::Truncated);
        assert_eq!(result.case_status, CaseStatus::Completed);
    }

    #[tokio::test]
    async fn test_simulate_mode_synthesizes_persona_from_input() {
        let client = Arc::new(HarnessClient::new());
        let run = runner(client.clone());
        let case = Case::new("plain", json!("teach me chess"));

        let result = run
            .run_case(
                &case,
                &AgentConfig::default(),
                &[EvaluatorKind::GoalSuccess],
                None,
                &ExecutionMode::Simulate { max_turns: 2 },
                &CancelFlag::new(),
            )
            .await;

        assert_eq!(result.transcript.agent_turn_count(), 2);
        assert_eq!(result.transcript.turns[0].content, "teach me chess");
        assert_eq!(client.agent_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_cancelled_case_fails_without_model_calls() {
        let client = Arc::new(HarnessClient::new());
        let run = runner(client.clone());
        let case = Case::new("late", json!("q"));
        let cancel = CancelFlag::new();
        cancel.cancel();

        let result = run
            .run_case(
                &case,
                &AgentConfig::default(),
                &[EvaluatorKind::Output],
                None,
                &ExecutionMode::Auto,
                &cancel,
            )
            .await;

        assert_eq!(result.case_status, CaseStatus::Failed);
        assert!(result.errors[0].contains("cancelled"));
        assert!(result.transcript.turns.is_empty());
        assert_eq!(client.agent_calls.load(Ordering::SeqCst), 0);
    }
}
