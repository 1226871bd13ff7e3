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

//! Transcripts: the ordered turn sequence produced by executing one case.
//!
//! A transcript is immutable once the case runner finishes. Single-turn
//! executions contain exactly one agent turn; multi-turn transcripts come
//! from the actor simulator and alternate user/agent turns chronologically.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::run::current_timestamp_us;

/// Who produced a turn.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The simulated counterpart persona (or the case input itself).
    User,
    /// The target agent under evaluation.
    Agent,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Agent => "agent",
        }
    }
}

/// A tool invocation reported by the target agent within a turn.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCall {
    /// Tool name as reported by the model.
    pub name: String,

    /// Arguments payload, opaque to the engine.
    #[serde(default)]
    pub arguments: Value,

    /// Provider-assigned call id, when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

/// One turn of a conversation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Turn {
    pub role: Role,
    pub content: String,

    /// Tool calls made during this turn (agent turns only, usually).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
}

impl Turn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            tool_calls: Vec::new(),
        }
    }

    pub fn agent(content: impl Into<String>) -> Self {
        Self {
            role: Role::Agent,
            content: content.into(),
            tool_calls: Vec::new(),
        }
    }

    pub fn with_tool_calls(mut self, tool_calls: Vec<ToolCall>) -> Self {
        self.tool_calls = tool_calls;
        self
    }
}

/// Terminal state of a transcript.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TranscriptStatus {
    /// Execution finished normally (single turn, or termination predicate
    /// fired before the turn limit).
    Complete,
    /// The simulation hit its maximum turn count without terminating.
    Truncated,
    /// Execution stopped early (invocation failure or cancellation); the
    /// turns recorded so far are preserved.
    Incomplete,
}

impl TranscriptStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TranscriptStatus::Complete => "complete",
            TranscriptStatus::Truncated => "truncated",
            TranscriptStatus::Incomplete => "incomplete",
        }
    }
}

/// The recorded conversation for one case execution.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Transcript {
    /// Turns in chronological order.
    #[serde(default)]
    pub turns: Vec<Turn>,

    pub status: TranscriptStatus,

    pub started_at_us: u64,
    pub finished_at_us: u64,

    /// Fields from newer schema versions, preserved opaquely.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

impl Transcript {
    /// Build a finished transcript from recorded turns.
    pub fn finished(turns: Vec<Turn>, status: TranscriptStatus, started_at_us: u64) -> Self {
        Self {
            turns,
            status,
            started_at_us,
            finished_at_us: current_timestamp_us(),
            extra: serde_json::Map::new(),
        }
    }

    /// Build a single-turn transcript: the case input followed by one agent
    /// turn.
    pub fn single_turn(input: impl Into<String>, agent_turn: Turn, started_at_us: u64) -> Self {
        Self::finished(
            vec![Turn::user(input), agent_turn],
            TranscriptStatus::Complete,
            started_at_us,
        )
    }

    /// Number of agent turns recorded.
    pub fn agent_turn_count(&self) -> usize {
        self.turns.iter().filter(|t| t.role == Role::Agent).count()
    }

    /// Content of the final agent turn, if one exists.
    pub fn last_agent_text(&self) -> Option<&str> {
        self.turns
            .iter()
            .rev()
            .find(|t| t.role == Role::Agent)
            .map(|t| t.content.as_str())
    }

    /// True when any turn carries tool calls.
    pub fn has_tool_calls(&self) -> bool {
        self.turns.iter().any(|t| !t.tool_calls.is_empty())
    }

    /// All tool calls across the transcript, in order.
    pub fn tool_calls(&self) -> Vec<&ToolCall> {
        self.turns.iter().flat_map(|t| t.tool_calls.iter()).collect()
    }

    /// Plain-text rendering used inside judge prompts.
    pub fn render_plain(&self) -> String {
        let mut out = String::new();
        for turn in &self.turns {
            out.push_str(turn.role.as_str());
            out.push_str(": ");
            out.push_str(&turn.content);
            for call in &turn.tool_calls {
                out.push_str(&format!("\n  [tool_call {} {}]", call.name, call.arguments));
            }
            out.push('\n');
        }
        out
    }

    /// Stable digest over the turn sequence, for snapshot integrity checks.
    pub fn content_hash(&self) -> String {
        let bytes = serde_json::to_vec(&self.turns).unwrap_or_default();
        blake3::hash(&bytes).to_hex().to_string()
    }
}
