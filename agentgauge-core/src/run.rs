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

//! Experiment run records: per-evaluator results, per-case results, and the
//! aggregated run document that gets persisted.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::case::Case;
use crate::error::Result;
use crate::suite::SuiteId;
use crate::transcript::Transcript;

/// Unique identifier for an experiment run.
pub type RunId = Uuid;

/// Schema version written into every persisted run document.
pub const EXPERIMENT_RUN_SCHEMA_VERSION: &str = "experiment_run_v1";

fn default_run_schema_version() -> String {
    EXPERIMENT_RUN_SCHEMA_VERSION.to_string()
}

/// A judge score on the evaluator's own scale.
///
/// Numeric scores are bounded per the evaluator's scoring contract;
/// categorical labels pass through untouched. Scores are never coerced
/// across evaluators.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Score {
    Numeric(f64),
    Label(String),
}

impl Score {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Score::Numeric(v) => Some(*v),
            Score::Label(_) => None,
        }
    }

    /// True for the top of the unit scale.
    pub fn is_maximal(&self) -> bool {
        matches!(self, Score::Numeric(v) if *v >= 1.0)
    }
}

/// Outcome of one (case, evaluator) pair.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EvaluationResult {
    pub evaluator_name: String,
    pub case_name: String,

    /// Absent only for capability skips.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<Score>,

    /// Score-vs-threshold verdict for numeric scales.
    #[serde(default)]
    pub passed: bool,

    /// Judge explanation, or the skip diagnostic.
    #[serde(default)]
    pub rationale: String,

    /// Raw judge model output, kept verbatim for audits.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_judgment: Option<String>,

    /// The evaluator could not score this transcript shape.
    #[serde(default)]
    pub skipped: bool,

    /// The transcript scored here was cut short; discount accordingly.
    #[serde(default)]
    pub incomplete_transcript: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Judge latency.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,

    /// Fields from newer schema versions, preserved opaquely.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

impl EvaluationResult {
    /// A scored result.
    pub fn scored(
        evaluator_name: impl Into<String>,
        case_name: impl Into<String>,
        score: Score,
        passed: bool,
        rationale: impl Into<String>,
    ) -> Self {
        Self {
            evaluator_name: evaluator_name.into(),
            case_name: case_name.into(),
            score: Some(score),
            passed,
            rationale: rationale.into(),
            raw_judgment: None,
            skipped: false,
            incomplete_transcript: false,
            error: None,
            duration_ms: None,
            extra: serde_json::Map::new(),
        }
    }

    /// A capability-mismatch skip with its diagnostic.
    pub fn skipped(
        evaluator_name: impl Into<String>,
        case_name: impl Into<String>,
        diagnostic: impl Into<String>,
    ) -> Self {
        let diagnostic = diagnostic.into();
        Self {
            evaluator_name: evaluator_name.into(),
            case_name: case_name.into(),
            score: None,
            passed: false,
            rationale: diagnostic.clone(),
            raw_judgment: None,
            skipped: true,
            incomplete_transcript: false,
            error: Some(diagnostic),
            duration_ms: None,
            extra: serde_json::Map::new(),
        }
    }

    pub fn with_raw_judgment(mut self, raw: impl Into<String>) -> Self {
        self.raw_judgment = Some(raw.into());
        self
    }

    pub fn with_duration_ms(mut self, ms: u64) -> Self {
        self.duration_ms = Some(ms);
        self
    }

    /// Flag that the transcript behind this result was incomplete.
    pub fn with_incomplete_transcript(mut self) -> Self {
        self.incomplete_transcript = true;
        self
    }
}

/// Terminal state of a single case within a run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CaseStatus {
    /// Transcript produced and every resolved evaluator returned a result.
    Completed,
    /// Transcript produced but at least one evaluator failed.
    CompletedWithPartialEvaluations,
    /// The target agent could not produce a transcript.
    Failed,
}

impl CaseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CaseStatus::Completed => "completed",
            CaseStatus::CompletedWithPartialEvaluations => "completed_with_partial_evaluations",
            CaseStatus::Failed => "failed",
        }
    }
}

/// Everything recorded for one case: the exact case contents used at
/// execution time, the transcript, and all evaluation results.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CaseResult {
    /// Snapshot of the case as executed; later suite edits never alter it.
    pub case: Case,

    pub transcript: Transcript,

    #[serde(default)]
    pub evaluations: Vec<EvaluationResult>,

    pub case_status: CaseStatus,

    /// Errors attached to this case (agent retry exhaustion, judge failures).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,

    /// Fields from newer schema versions, preserved opaquely.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

impl CaseResult {
    /// True when every scored evaluation passed and the case completed.
    pub fn passed(&self) -> bool {
        self.case_status != CaseStatus::Failed
            && self
                .evaluations
                .iter()
                .filter(|e| !e.skipped)
                .all(|e| e.passed)
            && self.evaluations.iter().any(|e| !e.skipped)
    }
}

/// Lifecycle of an experiment run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Run record created, no case runner dispatched yet.
    Pending,
    /// Case runners in flight.
    Running,
    /// Every case completed cleanly.
    Completed,
    /// At least one case failed or finished with partial evaluations.
    CompletedWithFailures,
    /// Unrecoverable error before any case could be dispatched.
    Aborted,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Pending => "pending",
            RunStatus::Running => "running",
            RunStatus::Completed => "completed",
            RunStatus::CompletedWithFailures => "completed_with_failures",
            RunStatus::Aborted => "aborted",
        }
    }

    /// True once the run can no longer change.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunStatus::Completed | RunStatus::CompletedWithFailures | RunStatus::Aborted
        )
    }
}

/// Aggregated metrics over a finished run.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RunSummary {
    pub total_cases: usize,
    pub completed: usize,
    pub failed: usize,
    /// Cases that completed with partial evaluations.
    pub partial: usize,
    /// Mean of all numeric scores across evaluations.
    pub overall_score: f64,
    /// Fraction of cases whose scored evaluations all passed.
    pub pass_rate: f64,
    pub duration_ms: u64,
}

impl RunSummary {
    /// Compute the summary from finalized case results.
    pub fn from_results(results: &[CaseResult], duration_ms: u64) -> Self {
        let total_cases = results.len();
        let completed = results
            .iter()
            .filter(|r| r.case_status == CaseStatus::Completed)
            .count();
        let failed = results
            .iter()
            .filter(|r| r.case_status == CaseStatus::Failed)
            .count();
        let partial = results
            .iter()
            .filter(|r| r.case_status == CaseStatus::CompletedWithPartialEvaluations)
            .count();

        let scores: Vec<f64> = results
            .iter()
            .flat_map(|r| r.evaluations.iter())
            .filter_map(|e| e.score.as_ref().and_then(Score::as_f64))
            .collect();
        let overall_score = if scores.is_empty() {
            0.0
        } else {
            scores.iter().sum::<f64>() / scores.len() as f64
        };

        let pass_rate = if total_cases == 0 {
            0.0
        } else {
            results.iter().filter(|r| r.passed()).count() as f64 / total_cases as f64
        };

        Self {
            total_cases,
            completed,
            failed,
            partial,
            overall_score,
            pass_rate,
            duration_ms,
        }
    }
}

/// The persisted record of one experiment execution.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExperimentRun {
    /// Schema version for forward-compatible loading.
    #[serde(default = "default_run_schema_version")]
    pub schema_version: String,

    /// Assigned at creation, immutable.
    pub run_id: RunId,

    pub name: String,

    /// Reference (not a copy) to the suite this was run against, when the
    /// run was backed by a stored suite.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suite_ref: Option<SuiteId>,

    #[serde(default)]
    pub evaluator_names: Vec<String>,

    pub model_id: String,
    pub system_prompt: String,

    /// Sorted by case name when the run finalizes, for reproducible diffs.
    #[serde(default)]
    pub case_results: Vec<CaseResult>,

    #[serde(default)]
    pub summary: RunSummary,

    pub started_at_us: u64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at_us: Option<u64>,

    pub status: RunStatus,

    /// Run-level error or diagnostic (abort reason, skipped evaluator names).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Fields from newer schema versions, preserved opaquely.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

impl ExperimentRun {
    /// Create a pending run record.
    pub fn new(
        name: impl Into<String>,
        suite_ref: Option<SuiteId>,
        evaluator_names: Vec<String>,
        model_id: impl Into<String>,
        system_prompt: impl Into<String>,
    ) -> Self {
        Self {
            schema_version: default_run_schema_version(),
            run_id: Uuid::new_v4(),
            name: name.into(),
            suite_ref,
            evaluator_names,
            model_id: model_id.into(),
            system_prompt: system_prompt.into(),
            case_results: Vec::new(),
            summary: RunSummary::default(),
            started_at_us: current_timestamp_us(),
            finished_at_us: None,
            status: RunStatus::Pending,
            error: None,
            extra: serde_json::Map::new(),
        }
    }

    /// Transition `pending -> running`.
    pub fn mark_running(&mut self) {
        self.status = RunStatus::Running;
    }

    /// Finalize with collected case results.
    ///
    /// Results are sorted by case name regardless of completion order, the
    /// summary is recomputed, and the terminal status is derived from the
    /// case statuses.
    pub fn finalize(&mut self, mut case_results: Vec<CaseResult>) {
        case_results.sort_by(|a, b| a.case.name.cmp(&b.case.name));
        let finished = current_timestamp_us();
        let duration_ms = finished.saturating_sub(self.started_at_us) / 1_000;

        let clean = case_results
            .iter()
            .all(|r| r.case_status == CaseStatus::Completed);
        self.status = if clean {
            RunStatus::Completed
        } else {
            RunStatus::CompletedWithFailures
        };
        self.summary = RunSummary::from_results(&case_results, duration_ms);
        self.case_results = case_results;
        self.finished_at_us = Some(finished);
    }

    /// Transition to `aborted` with the structural error attached.
    pub fn abort(&mut self, error: impl Into<String>) {
        self.status = RunStatus::Aborted;
        self.error = Some(error.into());
        self.finished_at_us = Some(current_timestamp_us());
    }

    /// Serialize to a JSON document.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Deserialize from a JSON document, preserving unknown fields.
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
}

/// Listing entry for [`ExperimentRun`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunListing {
    pub run_id: RunId,
    pub name: String,
    pub status: RunStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suite_ref: Option<SuiteId>,
    pub case_count: usize,
    pub started_at_us: u64,
}

impl From<&ExperimentRun> for RunListing {
    fn from(run: &ExperimentRun) -> Self {
        Self {
            run_id: run.run_id,
            name: run.name.clone(),
            status: run.status,
            suite_ref: run.suite_ref,
            case_count: run.case_results.len(),
            started_at_us: run.started_at_us,
        }
    }
}

/// Current timestamp in microseconds since the Unix epoch.
pub fn current_timestamp_us() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_micros() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transcript::{TranscriptStatus, Turn};
    use proptest::prelude::*;
    use serde_json::json;

    fn case_result(name: &str, status: CaseStatus, score: f64, passed: bool) -> CaseResult {
        let case = Case::new(name, json!({"query": "q"}));
        let transcript = Transcript::single_turn("q", Turn::agent("a"), 0);
        CaseResult {
            case,
            transcript,
            evaluations: vec![EvaluationResult::scored(
                "output",
                name,
                Score::Numeric(score),
                passed,
                "judged",
            )],
            case_status: status,
            errors: Vec::new(),
            extra: serde_json::Map::new(),
        }
    }

    #[test]
    fn test_run_status_transitions() {
        let mut run = ExperimentRun::new("exp", None, vec!["output".into()], "model", "prompt");
        assert_eq!(run.status, RunStatus::Pending);

        run.mark_running();
        assert_eq!(run.status, RunStatus::Running);

        run.finalize(vec![case_result("a", CaseStatus::Completed, 1.0, true)]);
        assert_eq!(run.status, RunStatus::Completed);
        assert!(run.status.is_terminal());
        assert!(run.finished_at_us.is_some());
    }

    #[test]
    fn test_finalize_sorts_by_case_name() {
        let mut run = ExperimentRun::new("exp", None, vec!["output".into()], "m", "p");
        run.mark_running();
        run.finalize(vec![
            case_result("zebra", CaseStatus::Completed, 1.0, true),
            case_result("alpha", CaseStatus::Completed, 0.5, false),
            case_result("mid", CaseStatus::Completed, 0.75, true),
        ]);
        let names: Vec<&str> = run
            .case_results
            .iter()
            .map(|r| r.case.name.as_str())
            .collect();
        assert_eq!(names, vec!["alpha", "mid", "zebra"]);
    }

    #[test]
    fn test_failures_flip_terminal_status() {
        let mut run = ExperimentRun::new("exp", None, vec!["output".into()], "m", "p");
        run.mark_running();
        run.finalize(vec![
            case_result("good", CaseStatus::Completed, 1.0, true),
            case_result("bad", CaseStatus::Failed, 0.0, false),
        ]);
        assert_eq!(run.status, RunStatus::CompletedWithFailures);
        assert_eq!(run.summary.failed, 1);
        assert_eq!(run.summary.completed, 1);
    }

    #[test]
    fn test_abort_attaches_error() {
        let mut run = ExperimentRun::new("exp", None, vec!["nope".into()], "m", "p");
        run.abort("no evaluator name resolved");
        assert_eq!(run.status, RunStatus::Aborted);
        assert!(run.case_results.is_empty());
        assert_eq!(run.error.as_deref(), Some("no evaluator name resolved"));
    }

    #[test]
    fn test_summary_aggregates() {
        let results = vec![
            case_result("a", CaseStatus::Completed, 1.0, true),
            case_result("b", CaseStatus::Completed, 0.5, false),
        ];
        let summary = RunSummary::from_results(&results, 10);
        assert_eq!(summary.total_cases, 2);
        assert!((summary.overall_score - 0.75).abs() < 1e-9);
        assert!((summary.pass_rate - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_status_wire_names() {
        assert_eq!(
            serde_json::to_value(RunStatus::CompletedWithFailures).unwrap(),
            json!("completed_with_failures")
        );
        assert_eq!(
            serde_json::to_value(CaseStatus::CompletedWithPartialEvaluations).unwrap(),
            json!("completed_with_partial_evaluations")
        );
    }

    #[test]
    fn test_json_round_trip_preserves_unknown_fields() {
        let mut run = ExperimentRun::new("exp", None, vec!["output".into()], "m", "p");
        run.mark_running();
        run.finalize(vec![case_result("only", CaseStatus::Completed, 1.0, true)]);
        run.extra
            .insert("introduced_in_v2".into(), json!({"flag": true}));

        let text = run.to_json().unwrap();
        let loaded = ExperimentRun::from_json(&text).unwrap();
        assert_eq!(loaded, run);
        assert_eq!(
            loaded.extra.get("introduced_in_v2").unwrap(),
            &json!({"flag": true})
        );
    }

    fn arb_score() -> impl Strategy<Value = Score> {
        prop_oneof![
            (0u32..=100).prop_map(|v| Score::Numeric(v as f64 / 100.0)),
            "[a-z]{3,8}".prop_map(Score::Label),
        ]
    }

    fn arb_case_status() -> impl Strategy<Value = CaseStatus> {
        prop_oneof![
            Just(CaseStatus::Completed),
            Just(CaseStatus::CompletedWithPartialEvaluations),
            Just(CaseStatus::Failed),
        ]
    }

    fn arb_case_result() -> impl Strategy<Value = CaseResult> {
        (
            "[a-z]{1,12}",
            arb_score(),
            any::<bool>(),
            arb_case_status(),
            proptest::option::of("[a-z ]{1,20}"),
        )
            .prop_map(|(name, score, passed, status, error)| {
                let case = Case::new(name.clone(), json!({"query": name.clone()}));
                let transcript = Transcript::finished(
                    vec![Turn::user("q"), Turn::agent("a")],
                    TranscriptStatus::Complete,
                    7,
                );
                let mut result = CaseResult {
                    case,
                    transcript,
                    evaluations: vec![EvaluationResult::scored(
                        "output", &name, score, passed, "why",
                    )],
                    case_status: status,
                    errors: Vec::new(),
                    extra: serde_json::Map::new(),
                };
                if let Some(e) = error {
                    result.errors.push(e);
                }
                result
            })
    }

    proptest! {
        // Round-trip law: to_json then from_json reproduces the record
        // field-for-field, including fields this version does not know.
        #[test]
        fn prop_run_round_trip(
            results in proptest::collection::vec(arb_case_result(), 0..4),
            run_name in "[a-z]{1,10}",
            extra_val in 0u64..9999,
        ) {
            let mut run = ExperimentRun::new(
                run_name,
                None,
                vec!["output".to_string()],
                "model-x",
                "prompt",
            );
            run.mark_running();
            run.finalize(results);
            run.extra.insert("forward_compat".into(), json!(extra_val));

            let text = run.to_json().unwrap();
            let loaded = ExperimentRun::from_json(&text).unwrap();
            prop_assert_eq!(loaded, run);
        }
    }
}
