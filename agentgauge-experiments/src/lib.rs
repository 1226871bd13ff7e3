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

//! # Agentgauge Experiments
//!
//! Experiment execution on top of the evaluator catalog and the stores.
//!
//! ## Features
//!
//! - **Orchestrated runs**: `pending -> running -> terminal` lifecycle with
//!   every state persisted to the run store
//! - **Bounded fan-out**: Cases run concurrently up to the configured limit
//! - **Actor simulation**: Persona-driven multi-turn conversations against
//!   the target agent
//! - **Case synthesis**: Model-generated suites from a context document and
//!   task description
//! - **Cooperative cancellation**: In-flight runs can be aborted; finished
//!   case results are kept
//!
//! ## Example
//!
//! ```rust,ignore
//! use agentgauge_core::EngineConfig;
//! use agentgauge_evals::AnthropicClient;
//! use agentgauge_experiments::{ExperimentSpec, Orchestrator};
//! use agentgauge_storage::{RunStore, SuiteStore};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() {
//!     let client = Arc::new(AnthropicClient::new(
//!         std::env::var("ANTHROPIC_API_KEY").unwrap(),
//!     ));
//!     let orchestrator = Orchestrator::new(
//!         client,
//!         Arc::new(SuiteStore::new()),
//!         Arc::new(RunStore::new()),
//!         EngineConfig::default(),
//!     );
//!     let run = orchestrator
//!         .run_experiment(ExperimentSpec::for_suite("regression"))
//!         .await
//!         .unwrap();
//!     println!("{}: pass rate {:.2}", run.name, run.summary.pass_rate);
//! }
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub mod orchestrator;
pub mod runner;
pub mod simulator;
pub mod synthesis;

pub use orchestrator::{CaseSource, ExperimentSpec, Orchestrator};
pub use runner::{CaseRunner, ExecutionMode};
pub use simulator::{ActorSimulator, PersonaSpec, SimulationOutcome, StopPredicate};
pub use synthesis::{CaseSynthesizer, ModelCaseSynthesizer};

/// Shared cancellation signal for one run.
///
/// Cloning shares the flag. Cancellation is cooperative: runners and the
/// simulator check it at their suspension points and wind down without
/// discarding finished work.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
