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

//! Error taxonomy shared across the engine.
//!
//! Store, registry, and orchestration errors all converge on [`EngineError`]
//! so callers can match on a single enum. Model-call failures are wrapped in
//! [`EngineError::Invocation`] at the point where they affect a case or run.

use thiserror::Error;

/// Engine-wide error type.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Unknown suite, case, or run id.
    #[error("not found: {0}")]
    NotFound(String),

    /// Name collision within a suite, or between suites.
    #[error("duplicate name: {0}")]
    DuplicateName(String),

    /// Malformed case or suite input.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Evaluator cannot score the given transcript shape, or an unknown
    /// evaluator name was requested.
    #[error("capability mismatch: {0}")]
    Capability(String),

    /// Model call failed (timeout, transport, provider error).
    #[error("model invocation failed: {0}")]
    Invocation(String),

    /// JSON encode/decode failure.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Filesystem failure from the archive layer.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl EngineError {
    /// True for errors that should never be retried.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, EngineError::Invocation(_))
    }
}

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, EngineError>;
