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

//! Test cases: one input for the target agent plus optional reference output.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::{EngineError, Result};

/// Unique identifier for a test case.
pub type CaseId = Uuid;

/// A single test case within a suite.
///
/// Immutable once added to a suite; identified uniquely by `name` within it.
/// `input` is an opaque structured payload handed to the target agent.
/// Unknown fields encountered on load are kept in `extra` and re-emitted on
/// save.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Case {
    /// Unique identifier, assigned at construction.
    pub id: CaseId,

    /// Name, unique within the owning suite.
    pub name: String,

    /// Input payload for the target agent.
    pub input: Value,

    /// Reference output for reference-based evaluators.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_output: Option<Value>,

    /// Free-form metadata (persona spec, simulation hints, tags).
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub metadata: serde_json::Map<String, Value>,

    /// Fields from newer schema versions, preserved opaquely.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

impl Case {
    /// Create a new case with a fresh id.
    pub fn new(name: impl Into<String>, input: Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            input,
            expected_output: None,
            metadata: serde_json::Map::new(),
            extra: serde_json::Map::new(),
        }
    }

    /// Attach a reference output.
    pub fn with_expected_output(mut self, expected: Value) -> Self {
        self.expected_output = Some(expected);
        self
    }

    /// Attach one metadata entry.
    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Check structural validity before the case enters a suite.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(EngineError::Validation("case name must not be empty".into()));
        }
        if self.input.is_null() {
            return Err(EngineError::Validation(format!(
                "case '{}' has a null input",
                self.name
            )));
        }
        Ok(())
    }

    /// Render the input as a user utterance.
    ///
    /// String payloads are used verbatim; object payloads fall back through
    /// the `query` then `input` keys; anything else is the JSON text.
    pub fn input_text(&self) -> String {
        match &self.input {
            Value::String(s) => s.clone(),
            Value::Object(map) => map
                .get("query")
                .or_else(|| map.get("input"))
                .map(value_text)
                .unwrap_or_else(|| self.input.to_string()),
            other => other.to_string(),
        }
    }

    /// Render the expected output, if any, falling back through the
    /// `output` then `response` keys for object payloads.
    pub fn expected_text(&self) -> Option<String> {
        let expected = self.expected_output.as_ref()?;
        Some(match expected {
            Value::String(s) => s.clone(),
            Value::Object(map) => map
                .get("output")
                .or_else(|| map.get("response"))
                .map(value_text)
                .unwrap_or_else(|| expected.to_string()),
            other => other.to_string(),
        })
    }

    /// Metadata lookup helper.
    pub fn metadata_value(&self, key: &str) -> Option<&Value> {
        self.metadata.get(key)
    }
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
