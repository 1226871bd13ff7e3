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

//! Agentgauge Core
//!
//! Fundamental data structures for the experiment evaluation engine: suites,
//! cases, transcripts, run records, errors, and configuration. Everything
//! here serializes to stable JSON with unknown-field preservation so records
//! written by newer versions stay inspectable.

pub mod case;
pub mod config;
pub mod error;
pub mod run;
pub mod suite;
pub mod transcript;

pub use case::{Case, CaseId};
pub use config::{AgentConfig, EngineConfig};
pub use error::{EngineError, Result};
pub use run::{
    current_timestamp_us, CaseResult, CaseStatus, EvaluationResult, ExperimentRun, RunId,
    RunListing, RunStatus, RunSummary, Score, EXPERIMENT_RUN_SCHEMA_VERSION,
};
pub use suite::{Suite, SuiteId, SuiteSummary};
pub use transcript::{Role, ToolCall, Transcript, TranscriptStatus, Turn};
