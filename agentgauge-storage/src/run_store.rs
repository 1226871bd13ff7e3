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

//! In-memory store of experiment runs.
//!
//! Runs are independent records, so a sharded map is enough; there is no
//! cross-run invariant to hold a lock over. The orchestrator writes the
//! same run several times as it moves through its lifecycle.

use dashmap::DashMap;

use agentgauge_core::{EngineError, ExperimentRun, Result, RunId, RunListing, SuiteId};

/// Store of experiment runs keyed by run id.
#[derive(Default)]
pub struct RunStore {
    runs: DashMap<RunId, ExperimentRun>,
}

impl RunStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite a run record.
    pub fn put(&self, run: ExperimentRun) {
        self.runs.insert(run.run_id, run);
    }

    pub fn get(&self, run_id: RunId) -> Result<ExperimentRun> {
        self.runs
            .get(&run_id)
            .map(|r| r.clone())
            .ok_or_else(|| EngineError::NotFound(format!("run {}", run_id)))
    }

    /// Listings of stored runs, newest first, optionally filtered to one
    /// suite.
    pub fn list(&self, suite: Option<SuiteId>) -> Vec<RunListing> {
        let mut listings: Vec<RunListing> = self
            .runs
            .iter()
            .filter(|entry| match suite {
                Some(id) => entry.value().suite_ref == Some(id),
                None => true,
            })
            .map(|entry| RunListing::from(entry.value()))
            .collect();
        listings.sort_by(|a, b| {
            b.started_at_us
                .cmp(&a.started_at_us)
                .then_with(|| a.run_id.cmp(&b.run_id))
        });
        listings
    }

    pub fn len(&self) -> usize {
        self.runs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }
}
