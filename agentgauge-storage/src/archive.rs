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

//! On-disk archive of experiment definitions.
//!
//! A definition is the re-runnable part of an experiment: its cases,
//! evaluator names, and optional rubric. One pretty-printed JSON
//! document per definition. File names are sanitized to a portable
//! character set and always carry a `.json` extension, so a caller can
//! pass `nightly` or `nightly.json` interchangeably.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use agentgauge_core::{current_timestamp_us, Case, EngineError, Result};

/// A stored, re-runnable experiment definition.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExperimentDefinition {
    pub name: String,

    pub cases: Vec<Case>,

    pub evaluator_names: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rubric: Option<String>,

    pub created_at_us: u64,

    /// Fields from newer schema versions, preserved opaquely.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

impl ExperimentDefinition {
    pub fn new(
        name: impl Into<String>,
        cases: Vec<Case>,
        evaluator_names: Vec<String>,
    ) -> Self {
        Self {
            name: name.into(),
            cases,
            evaluator_names,
            rubric: None,
            created_at_us: current_timestamp_us(),
            extra: serde_json::Map::new(),
        }
    }

    pub fn with_rubric(mut self, rubric: impl Into<String>) -> Self {
        self.rubric = Some(rubric.into());
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(EngineError::Validation(
                "experiment name must not be empty".into(),
            ));
        }
        if self.cases.is_empty() {
            return Err(EngineError::Validation(format!(
                "experiment '{}' has no cases",
                self.name
            )));
        }
        for case in &self.cases {
            case.validate()?;
        }
        Ok(())
    }
}

/// Listing entry for one archived definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavedExperiment {
    pub file_name: String,
    pub name: String,
    pub case_count: usize,
    pub modified_at_us: u64,
}

/// Directory of archived experiment definitions.
pub struct ExperimentArchive {
    dir: PathBuf,
}

impl ExperimentArchive {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write a definition under the given file name, returning the path
    /// written.
    pub fn save(&self, definition: &ExperimentDefinition, file_name: &str) -> Result<PathBuf> {
        definition.validate()?;
        fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(sanitize_file_name(file_name));
        fs::write(&path, serde_json::to_string_pretty(definition)?)?;
        tracing::info!(
            path = %path.display(),
            cases = definition.cases.len(),
            "experiment definition saved"
        );
        Ok(path)
    }

    /// Load a definition by file name, with or without the `.json`
    /// extension.
    pub fn load(&self, file_name: &str) -> Result<ExperimentDefinition> {
        let path = self.dir.join(sanitize_file_name(file_name));
        if !path.exists() {
            return Err(EngineError::NotFound(format!(
                "saved experiment {}",
                path.display()
            )));
        }
        let text = fs::read_to_string(&path)?;
        let definition: ExperimentDefinition = serde_json::from_str(&text)?;
        Ok(definition)
    }

    /// Listings for every archived definition, newest first. Files that
    /// fail to parse are skipped with a warning rather than failing the
    /// listing.
    pub fn list(&self) -> Result<Vec<SavedExperiment>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }
        let mut entries = Vec::new();
        for dir_entry in fs::read_dir(&self.dir)? {
            let path = dir_entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let text = match fs::read_to_string(&path) {
                Ok(text) => text,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "skipping unreadable archive file");
                    continue;
                }
            };
            match serde_json::from_str::<ExperimentDefinition>(&text) {
                Ok(definition) => entries.push(SavedExperiment {
                    file_name: path
                        .file_name()
                        .and_then(|n| n.to_str())
                        .unwrap_or_default()
                        .to_string(),
                    name: definition.name,
                    case_count: definition.cases.len(),
                    modified_at_us: modified_at_us(&path),
                }),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "skipping malformed archive file");
                }
            }
        }
        entries.sort_by(|a, b| {
            b.modified_at_us
                .cmp(&a.modified_at_us)
                .then_with(|| a.file_name.cmp(&b.file_name))
        });
        Ok(entries)
    }
}

fn modified_at_us(path: &Path) -> u64 {
    fs::metadata(path)
        .and_then(|m| m.modified())
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_micros() as u64)
        .unwrap_or(0)
}

/// Restrict file names to a portable character set and enforce the
/// `.json` extension. Separators and dots are flattened, so archive
/// files cannot escape the archive directory.
fn sanitize_file_name(name: &str) -> String {
    let trimmed = name.strip_suffix(".json").unwrap_or(name);
    let stem: String = trimmed
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '-'
            }
        })
        .collect();
    if stem.is_empty() {
        "experiment.json".to_string()
    } else {
        format!("{}.json", stem)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_definition(name: &str) -> ExperimentDefinition {
        ExperimentDefinition::new(
            name,
            vec![
                Case::new("math", json!({"query": "What is 2+2?"}))
                    .with_expected_output(json!({"output": "4"})),
                Case::new("capital", json!("What is the capital of France?")),
            ],
            vec!["output".to_string()],
        )
        .with_rubric("Full marks for exact answers.")
    }

    #[test]
    fn test_save_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let archive = ExperimentArchive::new(dir.path());

        let definition = sample_definition("nightly");
        let path = archive.save(&definition, "nightly").unwrap();
        assert!(path.exists());
        assert_eq!(path.extension().unwrap(), "json");

        let loaded = archive.load("nightly").unwrap();
        assert_eq!(loaded, definition);
        // The extension is optional on load.
        assert_eq!(archive.load("nightly.json").unwrap(), definition);
    }

    #[test]
    fn test_list_reports_names_and_counts() {
        let dir = tempfile::tempdir().unwrap();
        let archive = ExperimentArchive::new(dir.path());

        archive.save(&sample_definition("alpha"), "alpha").unwrap();
        archive.save(&sample_definition("beta"), "beta").unwrap();
        fs::write(dir.path().join("broken.json"), "not json").unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let entries = archive.list().unwrap();
        assert_eq!(entries.len(), 2);
        assert!(entries.iter().any(|e| e.name == "alpha" && e.case_count == 2));
        assert!(entries.iter().all(|e| e.file_name.ends_with(".json")));
    }

    #[test]
    fn test_file_names_cannot_escape_archive_dir() {
        let dir = tempfile::tempdir().unwrap();
        let archive = ExperimentArchive::new(dir.path());

        let path = archive
            .save(&sample_definition("evil"), "../../evil")
            .unwrap();
        assert!(path.starts_with(dir.path()));
        assert_eq!(path.file_name().unwrap(), "------evil.json");
    }

    #[test]
    fn test_load_missing_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let archive = ExperimentArchive::new(dir.path());
        assert!(matches!(
            archive.load("absent"),
            Err(EngineError::NotFound(_))
        ));
    }

    #[test]
    fn test_empty_definition_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let archive = ExperimentArchive::new(dir.path());
        let definition = ExperimentDefinition::new("empty", Vec::new(), vec!["output".into()]);
        assert!(matches!(
            archive.save(&definition, "empty"),
            Err(EngineError::Validation(_))
        ));
    }

    #[test]
    fn test_list_on_missing_dir_is_empty() {
        let archive = ExperimentArchive::new("/nonexistent/archive/dir");
        assert!(archive.list().unwrap().is_empty());
    }
}
