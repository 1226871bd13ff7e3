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

//! Experiment orchestration: resolve cases, fan out runners, persist runs.
//!
//! The orchestrator is the engine's single entry point for executing
//! experiments. It owns the run lifecycle (`pending -> running -> terminal`),
//! dispatches case runners with bounded concurrency, and keeps a cancel flag
//! per in-flight run so callers can abort.

use std::sync::Arc;

use dashmap::DashMap;
use futures::stream::{self, StreamExt};
use uuid::Uuid;

use agentgauge_core::{
    current_timestamp_us, AgentConfig, Case, CaseResult, EngineConfig, EngineError, ExperimentRun,
    Result, RunId, RunListing, Suite, SuiteId,
};
use agentgauge_evals::{resolve, Judge, ModelClient};
use agentgauge_storage::{RunStore, SuiteStore};

use crate::runner::{CaseRunner, ExecutionMode};
use crate::synthesis::{CaseSynthesizer, ModelCaseSynthesizer};
use crate::CancelFlag;

/// Where an experiment's cases come from.
#[derive(Debug, Clone)]
pub enum CaseSource {
    /// Inline cases supplied with the request.
    Cases(Vec<Case>),
    /// A stored suite, selected by id or name.
    Suite(String),
}

/// One experiment request.
///
/// Optional fields fall back to the engine configuration; empty
/// `evaluator_names` fall back to the entry point's defaults.
#[derive(Debug, Clone)]
pub struct ExperimentSpec {
    pub name: Option<String>,
    pub source: CaseSource,
    pub evaluator_names: Vec<String>,
    pub model_id: Option<String>,
    pub system_prompt: Option<String>,
    pub temperature: Option<f64>,
    pub max_tokens: Option<u32>,
    pub rubric: Option<String>,
    pub max_turns: Option<u32>,
}

impl ExperimentSpec {
    pub fn for_suite(selector: impl Into<String>) -> Self {
        Self::with_source(CaseSource::Suite(selector.into()))
    }

    pub fn for_cases(cases: Vec<Case>) -> Self {
        Self::with_source(CaseSource::Cases(cases))
    }

    fn with_source(source: CaseSource) -> Self {
        Self {
            name: None,
            source,
            evaluator_names: Vec::new(),
            model_id: None,
            system_prompt: None,
            temperature: None,
            max_tokens: None,
            rubric: None,
            max_turns: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_evaluators(mut self, names: Vec<String>) -> Self {
        self.evaluator_names = names;
        self
    }

    pub fn with_rubric(mut self, rubric: impl Into<String>) -> Self {
        self.rubric = Some(rubric.into());
        self
    }

    pub fn with_max_turns(mut self, max_turns: u32) -> Self {
        self.max_turns = Some(max_turns);
        self
    }
}

/// Runs experiments against the stores.
pub struct Orchestrator {
    config: EngineConfig,
    suites: Arc<SuiteStore>,
    runs: Arc<RunStore>,
    runner: CaseRunner,
    synthesizer: Arc<dyn CaseSynthesizer>,
    /// Cancel flags for runs currently executing.
    active: DashMap<RunId, CancelFlag>,
}

impl Orchestrator {
    pub fn new(
        client: Arc<dyn ModelClient>,
        suites: Arc<SuiteStore>,
        runs: Arc<RunStore>,
        config: EngineConfig,
    ) -> Self {
        let judge = Arc::new(Judge::from_config(client.clone(), &config));
        let runner = CaseRunner::new(client.clone(), judge, &config);
        let synthesizer = Arc::new(ModelCaseSynthesizer::from_config(client, &config));
        Self {
            config,
            suites,
            runs,
            runner,
            synthesizer,
            active: DashMap::new(),
        }
    }

    /// Swap the case synthesizer, e.g. for a non-model generator.
    pub fn with_synthesizer(mut self, synthesizer: Arc<dyn CaseSynthesizer>) -> Self {
        self.synthesizer = synthesizer;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Execute an experiment: single-turn per case unless a case carries
    /// persona metadata. Defaults to the `output` evaluator.
    pub async fn run_experiment(&self, spec: ExperimentSpec) -> Result<ExperimentRun> {
        let evaluator_names = if spec.evaluator_names.is_empty() {
            vec!["output".to_string()]
        } else {
            spec.evaluator_names.clone()
        };
        self.execute(spec, evaluator_names, ExecutionMode::Auto).await
    }

    /// Execute an experiment with every case simulated multi-turn.
    /// Defaults to the `helpfulness` and `goal_success` evaluators.
    pub async fn run_simulation(&self, spec: ExperimentSpec) -> Result<ExperimentRun> {
        let evaluator_names = if spec.evaluator_names.is_empty() {
            vec!["helpfulness".to_string(), "goal_success".to_string()]
        } else {
            spec.evaluator_names.clone()
        };
        let mode = ExecutionMode::Simulate {
            max_turns: spec.max_turns.unwrap_or(self.config.max_turns),
        };
        self.execute(spec, evaluator_names, mode).await
    }

    async fn execute(
        &self,
        spec: ExperimentSpec,
        evaluator_names: Vec<String>,
        mode: ExecutionMode,
    ) -> Result<ExperimentRun> {
        // Structural failures surface before any run record exists.
        let (cases, suite_ref) = self.resolve_cases(&spec.source)?;
        if cases.is_empty() {
            return Err(EngineError::Validation("experiment has no cases".into()));
        }

        let resolved = resolve(&evaluator_names);
        let agent = self.agent_config(&spec);
        let name = spec
            .name
            .clone()
            .unwrap_or_else(|| format!("experiment-{}", current_timestamp_us() / 1_000_000));
        let mut run = ExperimentRun::new(
            name,
            suite_ref,
            evaluator_names.clone(),
            &agent.model_id,
            &agent.system_prompt,
        );

        if !resolved.unknown.is_empty() {
            let diagnostic = format!(
                "unknown evaluators skipped: {}",
                resolved.unknown.join(", ")
            );
            tracing::warn!(run_id = %run.run_id, %diagnostic, "resolving evaluators");
            run.error = Some(diagnostic);
        }
        if resolved.kinds.is_empty() {
            run.abort(format!(
                "no known evaluators among: {}",
                evaluator_names.join(", ")
            ));
            self.runs.put(run.clone());
            return Ok(run);
        }

        self.runs.put(run.clone());
        run.mark_running();
        self.runs.put(run.clone());
        tracing::info!(
            run_id = %run.run_id,
            name = %run.name,
            cases = cases.len(),
            evaluators = resolved.kinds.len(),
            "experiment run started"
        );

        let cancel = CancelFlag::new();
        self.active.insert(run.run_id, cancel.clone());
        let rubric = spec.rubric.as_deref();
        // Futures are collected up front: keeping the closure-bearing `Map`
        // iterator inside this future trips rustc's higher-ranked `Send`
        // check when the run is spawned (rust-lang/rust#102211).
        let case_futures: Vec<_> = cases
            .iter()
            .map(|case| {
                self.runner
                    .run_case(case, &agent, &resolved.kinds, rubric, &mode, &cancel)
            })
            .collect();
        let results: Vec<CaseResult> = stream::iter(case_futures)
            .buffer_unordered(self.config.max_concurrent)
            .collect()
            .await;
        self.active.remove(&run.run_id);

        if cancel.is_cancelled() {
            let note = "run cancelled";
            run.error = Some(match run.error.take() {
                Some(previous) => format!("{previous}; {note}"),
                None => note.to_string(),
            });
        }
        run.finalize(results);
        self.runs.put(run.clone());
        tracing::info!(
            run_id = %run.run_id,
            status = run.status.as_str(),
            pass_rate = run.summary.pass_rate,
            overall_score = run.summary.overall_score,
            "experiment run finished"
        );
        Ok(run)
    }

    /// Generate a suite of cases from a context document and task
    /// description, and register it in the suite store.
    pub async fn generate_experiment(
        &self,
        context: &str,
        task_description: &str,
        num_cases: usize,
    ) -> Result<Suite> {
        if num_cases == 0 {
            return Err(EngineError::Validation(
                "num_cases must be at least 1".into(),
            ));
        }
        let cases = self
            .synthesizer
            .synthesize(context, task_description, num_cases)
            .await?;

        let suffix = Uuid::new_v4().simple().to_string();
        let mut suite = Suite::new(
            format!("generated-{}", &suffix[..8]),
            format!("Generated cases for: {task_description}"),
        );
        for case in cases {
            suite.add_case(case)?;
        }
        let id = self.suites.create(suite)?;
        self.suites.get(id)
    }

    /// Request cancellation of an in-flight run. Returns false when the run
    /// is unknown or already terminal.
    pub fn abort_run(&self, run_id: RunId) -> bool {
        match self.active.get(&run_id) {
            Some(flag) => {
                flag.cancel();
                tracing::info!(run_id = %run_id, "run cancellation requested");
                true
            }
            None => false,
        }
    }

    pub fn list_runs(&self, suite: Option<SuiteId>) -> Vec<RunListing> {
        self.runs.list(suite)
    }

    pub fn get_run(&self, run_id: RunId) -> Result<ExperimentRun> {
        self.runs.get(run_id)
    }

    fn resolve_cases(&self, source: &CaseSource) -> Result<(Vec<Case>, Option<SuiteId>)> {
        match source {
            CaseSource::Cases(cases) => {
                let mut seen = Vec::with_capacity(cases.len());
                for case in cases {
                    case.validate()?;
                    if seen.contains(&&case.name) {
                        return Err(EngineError::DuplicateName(format!(
                            "case '{}' appears twice in the request",
                            case.name
                        )));
                    }
                    seen.push(&case.name);
                }
                Ok((cases.clone(), None))
            }
            CaseSource::Suite(selector) => {
                let suite = self.suites.resolve(selector)?;
                Ok((suite.cases.clone(), Some(suite.id)))
            }
        }
    }

    fn agent_config(&self, spec: &ExperimentSpec) -> AgentConfig {
        let mut agent = AgentConfig::from_engine(&self.config);
        if let Some(model_id) = &spec.model_id {
            agent.model_id = model_id.clone();
        }
        if let Some(system_prompt) = &spec.system_prompt {
            agent.system_prompt = system_prompt.clone();
        }
        if let Some(temperature) = spec.temperature {
            agent.temperature = temperature;
        }
        if let Some(max_tokens) = spec.max_tokens {
            agent.max_tokens = max_tokens;
        }
        agent
    }
}
