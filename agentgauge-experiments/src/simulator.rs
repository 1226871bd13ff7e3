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

//! Multi-turn conversation simulation.
//!
//! The simulator plays a persona against the target agent: it produces one
//! user utterance per turn (scripted ones first, then model-generated), hands
//! the growing conversation to the agent, and stops on a stop phrase, a
//! termination predicate, or the turn limit. The same model client drives
//! both sides; the actor sees the conversation with the roles swapped so that
//! from its point of view it is the one being assisted.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use agentgauge_core::{
    current_timestamp_us, AgentConfig, Case, EngineConfig, Role, Transcript, TranscriptStatus,
    Turn,
};
use agentgauge_evals::{invoke_with_retry, ModelClient, RetryPolicy};

use crate::CancelFlag;

/// Decides after each agent turn whether the conversation is finished.
pub type StopPredicate = Arc<dyn Fn(&[Turn]) -> bool + Send + Sync>;

/// The simulated user persona for one case.
///
/// Deserialized from a case's `persona` metadata entry. `script` utterances
/// are consumed in order before the actor model generates anything; a
/// `stop_phrase` emitted by the actor ends the conversation without being
/// appended to the transcript.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PersonaSpec {
    /// What the simulated user is trying to get done.
    #[serde(alias = "task_description")]
    pub goal: String,

    /// Behavioral constraints, rendered into the actor's system prompt.
    pub constraints: Vec<String>,

    /// Fixed utterances to play before generating any.
    pub script: Vec<String>,

    /// Marker the actor emits when its goal is satisfied.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_phrase: Option<String>,
}

impl PersonaSpec {
    /// Persona with a goal and no script.
    pub fn for_goal(goal: impl Into<String>) -> Self {
        Self {
            goal: goal.into(),
            ..Self::default()
        }
    }

    /// Extract a persona from case metadata, if the case carries one.
    ///
    /// A `persona` object is deserialized directly. A bare `task_description`
    /// string or a `max_turns` hint also marks the case as multi-turn, with
    /// the goal derived from the metadata or the case input.
    pub fn from_case(case: &Case) -> Option<Self> {
        if let Some(value) = case.metadata.get("persona") {
            match serde_json::from_value(value.clone()) {
                Ok(persona) => return Some(persona),
                Err(e) => {
                    tracing::warn!(
                        case_name = %case.name,
                        error = %e,
                        "malformed persona metadata, treating case as single-turn"
                    );
                    return None;
                }
            }
        }
        if let Some(task) = case.metadata.get("task_description").and_then(|v| v.as_str()) {
            return Some(Self::for_goal(task));
        }
        if case.metadata.contains_key("max_turns") {
            return Some(Self::for_goal(case.input_text()));
        }
        None
    }

    /// Per-case turn limit override from metadata.
    pub fn case_max_turns(case: &Case) -> Option<u32> {
        case.metadata
            .get("max_turns")
            .and_then(|v| v.as_u64())
            .map(|n| n as u32)
    }
}

/// What a simulation produced.
///
/// Failures do not discard the conversation: the transcript always holds
/// every turn recorded before the stop, and `error` says why an incomplete
/// transcript stopped early.
#[derive(Debug, Clone)]
pub struct SimulationOutcome {
    pub transcript: Transcript,
    pub error: Option<String>,
}

impl SimulationOutcome {
    fn finished(turns: Vec<Turn>, status: TranscriptStatus, started_at_us: u64) -> Self {
        Self {
            transcript: Transcript::finished(turns, status, started_at_us),
            error: None,
        }
    }

    fn failed(turns: Vec<Turn>, started_at_us: u64, error: impl Into<String>) -> Self {
        Self {
            transcript: Transcript::finished(turns, TranscriptStatus::Incomplete, started_at_us),
            error: Some(error.into()),
        }
    }
}

/// Drives a persona against the target agent.
pub struct ActorSimulator {
    client: Arc<dyn ModelClient>,
    actor_model_id: String,
    timeout: Duration,
    retry: RetryPolicy,
    stop_predicate: Option<StopPredicate>,
}

impl ActorSimulator {
    pub fn new(client: Arc<dyn ModelClient>, actor_model_id: impl Into<String>) -> Self {
        Self {
            client,
            actor_model_id: actor_model_id.into(),
            timeout: Duration::from_secs(30),
            retry: RetryPolicy::default(),
            stop_predicate: None,
        }
    }

    /// Simulator defaults derived from the engine configuration. The actor
    /// runs on the engine's default model.
    pub fn from_config(client: Arc<dyn ModelClient>, config: &EngineConfig) -> Self {
        Self {
            client,
            actor_model_id: config.default_model_id.clone(),
            timeout: Duration::from_secs(config.invoke_timeout_secs),
            retry: RetryPolicy::new(config.max_retries),
            stop_predicate: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Install a predicate checked after every agent turn.
    pub fn with_stop_predicate(mut self, predicate: StopPredicate) -> Self {
        self.stop_predicate = Some(predicate);
        self
    }

    /// Run one simulated conversation.
    ///
    /// Each iteration appends one user turn and one agent turn, so a
    /// truncated transcript holds exactly `max_turns` agent turns. The
    /// cancel flag is checked at the top of every iteration; a cancelled
    /// simulation keeps the turns recorded so far.
    pub async fn simulate(
        &self,
        agent: &AgentConfig,
        case: &Case,
        persona: &PersonaSpec,
        max_turns: u32,
        cancel: &CancelFlag,
    ) -> SimulationOutcome {
        let started_at_us = current_timestamp_us();
        let actor_system = build_actor_system_prompt(persona);
        let mut turns: Vec<Turn> = Vec::new();
        let mut script = persona.script.iter();

        for turn_index in 0..max_turns {
            if cancel.is_cancelled() {
                tracing::debug!(case_name = %case.name, turn = turn_index, "simulation cancelled");
                return SimulationOutcome::failed(turns, started_at_us, "simulation cancelled");
            }

            let utterance = match script.next() {
                Some(scripted) => scripted.clone(),
                None if turn_index == 0 => case.input_text(),
                None => {
                    let actor_view = swap_roles(&turns);
                    match invoke_with_retry(
                        &self.client,
                        &actor_view,
                        &self.actor_model_id,
                        Some(&actor_system),
                        self.timeout,
                        &self.retry,
                    )
                    .await
                    {
                        Ok(response) => response.content.trim().to_string(),
                        Err(e) => {
                            return SimulationOutcome::failed(
                                turns,
                                started_at_us,
                                format!("actor invocation failed: {e}"),
                            );
                        }
                    }
                }
            };

            if let Some(stop_phrase) = &persona.stop_phrase {
                if utterance.contains(stop_phrase.as_str()) {
                    tracing::debug!(
                        case_name = %case.name,
                        turns = turns.len(),
                        "stop phrase emitted, conversation complete"
                    );
                    return SimulationOutcome::finished(
                        turns,
                        TranscriptStatus::Complete,
                        started_at_us,
                    );
                }
            }
            turns.push(Turn::user(utterance));

            match invoke_with_retry(
                &self.client,
                &turns,
                &agent.model_id,
                Some(&agent.system_prompt),
                self.timeout,
                &self.retry,
            )
            .await
            {
                Ok(response) => {
                    turns.push(Turn::agent(response.content).with_tool_calls(response.tool_calls));
                }
                Err(e) => {
                    return SimulationOutcome::failed(
                        turns,
                        started_at_us,
                        format!("agent invocation failed: {e}"),
                    );
                }
            }

            if let Some(predicate) = &self.stop_predicate {
                if predicate(&turns) {
                    tracing::debug!(case_name = %case.name, turn = turn_index, "stop predicate fired");
                    return SimulationOutcome::finished(
                        turns,
                        TranscriptStatus::Complete,
                        started_at_us,
                    );
                }
            }
        }

        tracing::debug!(case_name = %case.name, max_turns, "simulation hit turn limit");
        SimulationOutcome::finished(turns, TranscriptStatus::Truncated, started_at_us)
    }
}

/// The actor sees the conversation inverted: agent turns become the user
/// turns it is replying to. Tool calls are dropped, the actor only reads
/// text.
fn swap_roles(turns: &[Turn]) -> Vec<Turn> {
    turns
        .iter()
        .map(|turn| match turn.role {
            Role::User => Turn::agent(turn.content.clone()),
            Role::Agent => Turn::user(turn.content.clone()),
        })
        .collect()
}

fn build_actor_system_prompt(persona: &PersonaSpec) -> String {
    let mut prompt = String::from(
        "You are role-playing a user talking to an AI assistant. Stay in character \
         and write only the user's next message, with no commentary.\n",
    );
    if !persona.goal.is_empty() {
        prompt.push_str(&format!("\nYour goal: {}\n", persona.goal));
    }
    if !persona.constraints.is_empty() {
        prompt.push_str("\nConstraints:\n");
        for constraint in &persona.constraints {
            prompt.push_str(&format!("- {constraint}\n"));
        }
    }
    if let Some(stop_phrase) = &persona.stop_phrase {
        prompt.push_str(&format!(
            "\nWhen your goal has been fully satisfied, reply with exactly: {stop_phrase}\n"
        ));
    }
    prompt
}
