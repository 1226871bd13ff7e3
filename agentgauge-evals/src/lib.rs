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

//! # Agentgauge Evaluators
//!
//! LLM-as-judge evaluators for scoring agent transcripts.
//!
//! ## Features
//!
//! - **Closed evaluator catalog**: Twelve built-in evaluators across output,
//!   trace, and session levels
//! - **Rubric-driven judging**: Customizable grading rubrics for the
//!   rubric-driven evaluators
//! - **Capability checks**: Evaluators skip transcripts that lack the
//!   fields they need instead of guessing
//! - **Judgment caching**: Identical (transcript, evaluator, rubric)
//!   triples are judged once
//! - **Retry with backoff**: Transient judge failures are retried with
//!   jittered exponential backoff
//!
//! ## Example
//!
//! ```rust,ignore
//! use agentgauge_evals::{AnthropicClient, EvaluatorKind, Judge};
//! use agentgauge_core::{Case, Transcript, Turn};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() {
//!     let client = Arc::new(AnthropicClient::new(
//!         std::env::var("ANTHROPIC_API_KEY").unwrap(),
//!     ));
//!     let judge = Judge::new(client, "claude-sonnet-4-20250514");
//!
//!     let case = Case::new("arithmetic", serde_json::json!("What is 2+2?"));
//!     let transcript = Transcript::single_turn("What is 2+2?", Turn::agent("4"), 0);
//!     let result = judge
//!         .evaluate(EvaluatorKind::Output, &case, &transcript, None)
//!         .await
//!         .unwrap();
//!     println!("{:?} {}", result.score, result.rationale);
//! }
//! ```

use thiserror::Error;

pub mod cache;
pub mod judge;
pub mod llm_client;
pub mod registry;

pub use cache::{CacheStats, JudgmentCache};
pub use judge::Judge;
pub use llm_client::{
    invoke_prompt, invoke_with_retry, AnthropicClient, ClientError, ModelClient, ModelResponse,
    RetryPolicy, TokenUsage,
};
pub use registry::{
    catalog, resolve, EvaluatorDescriptor, EvaluatorKind, EvaluatorLevel, ResolvedEvaluators,
    ScaleKind, ScoringContract, TranscriptField, DEFAULT_RUBRIC,
};

/// Errors from judge-side evaluation.
#[derive(Debug, Error)]
pub enum EvalError {
    /// The judge model call failed after retries.
    #[error("judge client error: {0}")]
    Client(String),

    /// The judge model call timed out after retries.
    #[error("judge timed out after {0}s")]
    Timeout(u64),

    /// The judge replied, but not with a usable verdict.
    #[error("invalid judgment: {0}")]
    InvalidJudgment(String),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}
