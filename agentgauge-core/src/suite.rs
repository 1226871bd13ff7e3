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

//! Suites: named, ordered collections of test cases.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::case::{Case, CaseId};
use crate::error::{EngineError, Result};
use crate::run::current_timestamp_us;

/// Unique identifier for a suite.
pub type SuiteId = Uuid;

/// An ordered collection of cases sharing a name.
///
/// Cases are appended, never mutated in place; edits go through
/// [`Suite::replace_case`]. The suite is the unit of reuse across experiment
/// runs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Suite {
    /// Unique identifier, assigned at creation.
    pub id: SuiteId,

    /// Human-readable name, unique within the store.
    pub name: String,

    /// Optional description.
    #[serde(default)]
    pub description: String,

    /// Cases in insertion order.
    #[serde(default)]
    pub cases: Vec<Case>,

    /// Creation timestamp (microseconds since Unix epoch).
    pub created_at_us: u64,

    /// Fields from newer schema versions, preserved opaquely.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Suite {
    /// Create an empty suite with a fresh id.
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            description: description.into(),
            cases: Vec::new(),
            created_at_us: current_timestamp_us(),
            extra: serde_json::Map::new(),
        }
    }

    /// Check structural validity of the suite and every contained case.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(EngineError::Validation("suite name must not be empty".into()));
        }
        for case in &self.cases {
            case.validate()?;
        }
        Ok(())
    }

    /// Append a case, enforcing name uniqueness within the suite.
    ///
    /// On a duplicate name the suite is left unchanged.
    pub fn add_case(&mut self, case: Case) -> Result<CaseId> {
        case.validate()?;
        if self.find_case(&case.name).is_some() {
            return Err(EngineError::DuplicateName(format!(
                "case '{}' already exists in suite '{}'",
                case.name, self.name
            )));
        }
        let id = case.id;
        self.cases.push(case);
        Ok(id)
    }

    /// Replace the case with the same name, keeping its position.
    pub fn replace_case(&mut self, case: Case) -> Result<CaseId> {
        case.validate()?;
        let slot = self
            .cases
            .iter_mut()
            .find(|c| c.name == case.name)
            .ok_or_else(|| {
                EngineError::NotFound(format!(
                    "case '{}' in suite '{}'",
                    case.name, self.name
                ))
            })?;
        let id = case.id;
        *slot = case;
        Ok(id)
    }

    /// Find a case by name.
    pub fn find_case(&self, name: &str) -> Option<&Case> {
        self.cases.iter().find(|c| c.name == name)
    }

    /// Number of cases.
    pub fn case_count(&self) -> usize {
        self.cases.len()
    }

    /// Serialize to a JSON document.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Deserialize from a JSON document, preserving unknown fields.
    pub fn from_json(text: &str) -> Result<Self> {
        let suite: Suite = serde_json::from_str(text)?;
        suite.validate()?;
        Ok(suite)
    }
}

/// Listing entry for [`Suite`], ordered by creation time in store listings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SuiteSummary {
    pub id: SuiteId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub case_count: usize,
    pub created_at_us: u64,
}

impl From<&Suite> for SuiteSummary {
    fn from(suite: &Suite) -> Self {
        Self {
            id: suite.id,
            name: suite.name.clone(),
            description: suite.description.clone(),
            case_count: suite.cases.len(),
            created_at_us: suite.created_at_us,
        }
    }
}
