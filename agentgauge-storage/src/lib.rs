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

//! # Agentgauge Storage
//!
//! State kept by the engine: the in-memory suite registry, the
//! in-memory run store, and the on-disk archive of experiment
//! definitions.
//!
//! Suites and runs live in memory for the lifetime of the engine
//! process; the archive holds the re-runnable experiment definitions an
//! operator saves for later sessions.

pub mod archive;
pub mod run_store;
pub mod suite_store;

pub use archive::{ExperimentArchive, ExperimentDefinition, SavedExperiment};
pub use run_store::RunStore;
pub use suite_store::SuiteStore;
