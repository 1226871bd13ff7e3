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

//! The closed catalog of built-in evaluators.
//!
//! Evaluators are identified by stable snake_case names. Each entry
//! declares its analysis level, the transcript fields it needs, and
//! whether it accepts a custom rubric. Resolution is tolerant: unknown
//! names are reported back to the caller rather than failing the batch.

use serde::{Deserialize, Serialize};

use agentgauge_core::{Case, Transcript};

/// Rubric applied when a rubric-driven evaluator is run without one.
pub const DEFAULT_RUBRIC: &str = "Score 1.0 if the response is accurate, complete, and helpful. \
     Score 0.5 if partially correct. Score 0.0 if incorrect or unhelpful.";

/// What slice of the interaction an evaluator looks at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvaluatorLevel {
    /// Judges the final answer against the input.
    Output,
    /// Judges a single traced exchange in detail.
    Trace,
    /// Judges the whole conversation.
    Session,
}

impl EvaluatorLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            EvaluatorLevel::Output => "output",
            EvaluatorLevel::Trace => "trace",
            EvaluatorLevel::Session => "session",
        }
    }
}

/// Transcript data an evaluator requires before it can judge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TranscriptField {
    Input,
    Output,
    ExpectedOutput,
    FullTranscript,
    ToolCalls,
    Trajectory,
}

impl TranscriptField {
    pub fn as_str(&self) -> &'static str {
        match self {
            TranscriptField::Input => "input",
            TranscriptField::Output => "output",
            TranscriptField::ExpectedOutput => "expected_output",
            TranscriptField::FullTranscript => "full_transcript",
            TranscriptField::ToolCalls => "tool_calls",
            TranscriptField::Trajectory => "trajectory",
        }
    }

    /// Whether this case and transcript can satisfy the field.
    pub fn is_satisfied(&self, case: &Case, transcript: &Transcript) -> bool {
        match self {
            TranscriptField::Input => true,
            TranscriptField::Output => transcript.last_agent_text().is_some(),
            TranscriptField::ExpectedOutput => case.expected_output.is_some(),
            TranscriptField::FullTranscript => !transcript.turns.is_empty(),
            TranscriptField::ToolCalls => transcript.has_tool_calls(),
            TranscriptField::Trajectory => !transcript.turns.is_empty(),
        }
    }
}

/// Shape of the scores an evaluator emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScaleKind {
    /// Any value in the interval.
    Continuous,
    /// Only the endpoints are meaningful.
    Binary,
}

/// Score bounds an evaluator guarantees.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ScoringContract {
    pub min: f64,
    pub max: f64,
    pub scale: ScaleKind,
}

impl ScoringContract {
    pub fn unit_interval(scale: ScaleKind) -> Self {
        Self {
            min: 0.0,
            max: 1.0,
            scale,
        }
    }

    /// Clamp a raw judge score into the contracted range.
    pub fn clamp(&self, score: f64) -> f64 {
        score.clamp(self.min, self.max)
    }
}

/// The built-in evaluators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvaluatorKind {
    Output,
    Helpfulness,
    Faithfulness,
    Trajectory,
    GoalSuccess,
    Interactions,
    ToolSelection,
    ToolParameter,
    Coherence,
    Conciseness,
    Harmfulness,
    ResponseRelevance,
}

impl EvaluatorKind {
    pub const ALL: [EvaluatorKind; 12] = [
        EvaluatorKind::Output,
        EvaluatorKind::Helpfulness,
        EvaluatorKind::Faithfulness,
        EvaluatorKind::Trajectory,
        EvaluatorKind::GoalSuccess,
        EvaluatorKind::Interactions,
        EvaluatorKind::ToolSelection,
        EvaluatorKind::ToolParameter,
        EvaluatorKind::Coherence,
        EvaluatorKind::Conciseness,
        EvaluatorKind::Harmfulness,
        EvaluatorKind::ResponseRelevance,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            EvaluatorKind::Output => "output",
            EvaluatorKind::Helpfulness => "helpfulness",
            EvaluatorKind::Faithfulness => "faithfulness",
            EvaluatorKind::Trajectory => "trajectory",
            EvaluatorKind::GoalSuccess => "goal_success",
            EvaluatorKind::Interactions => "interactions",
            EvaluatorKind::ToolSelection => "tool_selection",
            EvaluatorKind::ToolParameter => "tool_parameter",
            EvaluatorKind::Coherence => "coherence",
            EvaluatorKind::Conciseness => "conciseness",
            EvaluatorKind::Harmfulness => "harmfulness",
            EvaluatorKind::ResponseRelevance => "response_relevance",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        EvaluatorKind::ALL.iter().copied().find(|k| k.name() == name)
    }

    pub fn level(&self) -> EvaluatorLevel {
        match self {
            EvaluatorKind::Output => EvaluatorLevel::Output,
            EvaluatorKind::Helpfulness
            | EvaluatorKind::Faithfulness
            | EvaluatorKind::Coherence
            | EvaluatorKind::Conciseness
            | EvaluatorKind::Harmfulness
            | EvaluatorKind::ResponseRelevance
            | EvaluatorKind::ToolSelection
            | EvaluatorKind::ToolParameter => EvaluatorLevel::Trace,
            EvaluatorKind::Trajectory
            | EvaluatorKind::GoalSuccess
            | EvaluatorKind::Interactions => EvaluatorLevel::Session,
        }
    }

    /// Rubric-driven evaluators accept a caller-supplied grading rubric.
    pub fn requires_rubric(&self) -> bool {
        matches!(
            self,
            EvaluatorKind::Output | EvaluatorKind::Trajectory | EvaluatorKind::Interactions
        )
    }

    pub fn description(&self) -> &'static str {
        match self {
            EvaluatorKind::Output => "Flexible rubric-driven judgment of the final output",
            EvaluatorKind::Helpfulness => "How helpful the response is from the user's perspective",
            EvaluatorKind::Faithfulness => "Factual accuracy and groundedness of the response",
            EvaluatorKind::Trajectory => "Quality of the sequence of actions and tool usage",
            EvaluatorKind::GoalSuccess => "Whether the user's goal was achieved by the end",
            EvaluatorKind::Interactions => "Conversation patterns and interaction quality",
            EvaluatorKind::ToolSelection => "Whether the right tools were chosen for the task",
            EvaluatorKind::ToolParameter => "Accuracy of the arguments passed to tools",
            EvaluatorKind::Coherence => "Logical consistency and structure of responses",
            EvaluatorKind::Conciseness => "Brevity and directness without lost substance",
            EvaluatorKind::Harmfulness => "Absence of harmful or unsafe content",
            EvaluatorKind::ResponseRelevance => "Relevance of the response to the input query",
        }
    }

    pub fn required_fields(&self) -> &'static [TranscriptField] {
        match self {
            EvaluatorKind::Output
            | EvaluatorKind::Helpfulness
            | EvaluatorKind::Faithfulness
            | EvaluatorKind::Coherence
            | EvaluatorKind::Conciseness
            | EvaluatorKind::Harmfulness
            | EvaluatorKind::ResponseRelevance => {
                &[TranscriptField::Input, TranscriptField::Output]
            }
            EvaluatorKind::ToolSelection | EvaluatorKind::ToolParameter => {
                &[TranscriptField::Input, TranscriptField::ToolCalls]
            }
            EvaluatorKind::Trajectory => &[TranscriptField::Trajectory],
            EvaluatorKind::GoalSuccess | EvaluatorKind::Interactions => {
                &[TranscriptField::FullTranscript]
            }
        }
    }

    pub fn scoring_contract(&self) -> ScoringContract {
        match self {
            EvaluatorKind::GoalSuccess | EvaluatorKind::Harmfulness => {
                ScoringContract::unit_interval(ScaleKind::Binary)
            }
            _ => ScoringContract::unit_interval(ScaleKind::Continuous),
        }
    }

    pub fn descriptor(&self) -> EvaluatorDescriptor {
        EvaluatorDescriptor {
            name: self.name().to_string(),
            level: self.level(),
            description: self.description().to_string(),
            requires_rubric: self.requires_rubric(),
            required_fields: self.required_fields().to_vec(),
            scoring_contract: self.scoring_contract(),
        }
    }

    /// Fields the pair cannot satisfy, empty when the evaluator can run.
    pub fn missing_fields(&self, case: &Case, transcript: &Transcript) -> Vec<TranscriptField> {
        self.required_fields()
            .iter()
            .filter(|f| !f.is_satisfied(case, transcript))
            .copied()
            .collect()
    }
}

/// Introspectable description of one catalog entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluatorDescriptor {
    pub name: String,
    pub level: EvaluatorLevel,
    pub description: String,
    pub requires_rubric: bool,
    pub required_fields: Vec<TranscriptField>,
    pub scoring_contract: ScoringContract,
}

/// The full catalog, in registration order.
pub fn catalog() -> Vec<EvaluatorDescriptor> {
    EvaluatorKind::ALL.iter().map(|k| k.descriptor()).collect()
}

/// Outcome of resolving requested evaluator names against the catalog.
#[derive(Debug, Clone)]
pub struct ResolvedEvaluators {
    pub kinds: Vec<EvaluatorKind>,
    pub unknown: Vec<String>,
}

impl ResolvedEvaluators {
    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }
}

/// Resolve names to evaluator kinds, preserving request order and
/// dropping duplicates. Unknown names are collected, not fatal.
pub fn resolve(names: &[String]) -> ResolvedEvaluators {
    let mut kinds = Vec::new();
    let mut unknown = Vec::new();
    for name in names {
        match EvaluatorKind::from_name(name) {
            Some(kind) => {
                if !kinds.contains(&kind) {
                    kinds.push(kind);
                }
            }
            None => unknown.push(name.clone()),
        }
    }
    ResolvedEvaluators { kinds, unknown }
}
