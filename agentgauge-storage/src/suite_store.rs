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

//! In-memory suite registry.
//!
//! Suite names are unique across the store, so the whole registry sits
//! behind one `RwLock`: create and delete must update the name index and
//! the suite map together.

use std::collections::HashMap;

use parking_lot::RwLock;
use uuid::Uuid;

use agentgauge_core::{Case, EngineError, Result, Suite, SuiteId, SuiteSummary};

#[derive(Default)]
struct Inner {
    suites: HashMap<SuiteId, Suite>,
    by_name: HashMap<String, SuiteId>,
}

/// Registry of evaluation suites, keyed by id with a unique-name index.
#[derive(Default)]
pub struct SuiteStore {
    inner: RwLock<Inner>,
}

impl SuiteStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a suite. Fails on invalid suites and duplicate names; the
    /// store is unchanged on failure.
    pub fn create(&self, suite: Suite) -> Result<SuiteId> {
        suite.validate()?;
        let mut inner = self.inner.write();
        if inner.by_name.contains_key(&suite.name) {
            return Err(EngineError::DuplicateName(format!(
                "suite '{}' already exists",
                suite.name
            )));
        }
        let id = suite.id;
        inner.by_name.insert(suite.name.clone(), id);
        inner.suites.insert(id, suite);
        tracing::debug!(suite_id = %id, "suite registered");
        Ok(id)
    }

    pub fn get(&self, id: SuiteId) -> Result<Suite> {
        self.inner
            .read()
            .suites
            .get(&id)
            .cloned()
            .ok_or_else(|| EngineError::NotFound(format!("suite {}", id)))
    }

    pub fn find_by_name(&self, name: &str) -> Option<Suite> {
        let inner = self.inner.read();
        let id = inner.by_name.get(name)?;
        inner.suites.get(id).cloned()
    }

    /// Resolve a selector that is either a suite id or a suite name.
    pub fn resolve(&self, selector: &str) -> Result<Suite> {
        if let Ok(id) = selector.parse::<Uuid>() {
            if let Ok(suite) = self.get(id) {
                return Ok(suite);
            }
        }
        self.find_by_name(selector)
            .ok_or_else(|| EngineError::NotFound(format!("suite '{}'", selector)))
    }

    /// Append a case to an existing suite. Returns the new case count.
    pub fn add_case(&self, suite_id: SuiteId, case: Case) -> Result<usize> {
        let mut inner = self.inner.write();
        let suite = inner
            .suites
            .get_mut(&suite_id)
            .ok_or_else(|| EngineError::NotFound(format!("suite {}", suite_id)))?;
        suite.add_case(case)?;
        Ok(suite.case_count())
    }

    /// Replace the same-named case in a suite, keeping its position.
    pub fn replace_case(&self, suite_id: SuiteId, case: Case) -> Result<()> {
        let mut inner = self.inner.write();
        let suite = inner
            .suites
            .get_mut(&suite_id)
            .ok_or_else(|| EngineError::NotFound(format!("suite {}", suite_id)))?;
        suite.replace_case(case)?;
        Ok(())
    }

    /// Summaries of every suite, oldest first.
    pub fn list(&self) -> Vec<SuiteSummary> {
        let inner = self.inner.read();
        let mut summaries: Vec<SuiteSummary> =
            inner.suites.values().map(SuiteSummary::from).collect();
        summaries.sort_by(|a, b| {
            a.created_at_us
                .cmp(&b.created_at_us)
                .then_with(|| a.name.cmp(&b.name))
        });
        summaries
    }

    /// Remove a suite and free its name.
    pub fn delete(&self, id: SuiteId) -> Result<Suite> {
        let mut inner = self.inner.write();
        let suite = inner
            .suites
            .remove(&id)
            .ok_or_else(|| EngineError::NotFound(format!("suite {}", id)))?;
        inner.by_name.remove(&suite.name);
        tracing::debug!(suite_id = %id, "suite deleted");
        Ok(suite)
    }

    pub fn len(&self) -> usize {
        self.inner.read().suites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().suites.is_empty()
    }
}
