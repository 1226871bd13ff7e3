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

//! Engine configuration, loaded once at process start and read-only after.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

/// Process-wide engine configuration.
///
/// Every field has a default so a missing or partial config file still
/// yields a working engine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    /// Model used when a run does not name one.
    pub default_model_id: String,

    /// System prompt for the target agent when a run does not set one.
    pub system_prompt: String,

    /// Sampling temperature for the target agent.
    pub temperature: f64,

    /// Completion token cap for the target agent.
    pub max_tokens: u32,

    /// Turn limit for multi-turn simulations.
    pub max_turns: u32,

    /// Concurrent case runners per experiment.
    pub max_concurrent: usize,

    /// Per-model-call timeout.
    pub invoke_timeout_secs: u64,

    /// Retry attempts after the first failed model call.
    pub max_retries: u32,

    /// Numeric scores at or above this threshold count as passed.
    pub pass_threshold: f64,

    /// Cache identical judge judgments in process.
    pub enable_judge_cache: bool,

    /// Judge cache entry lifetime.
    pub cache_ttl_secs: u64,

    /// Directory for saved experiment definitions.
    pub archive_dir: PathBuf,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_model_id: "us.anthropic.claude-sonnet-4-20250514-v1:0".to_string(),
            system_prompt: "You are a helpful assistant.".to_string(),
            temperature: 0.1,
            max_tokens: 4096,
            max_turns: 10,
            max_concurrent: 4,
            invoke_timeout_secs: 30,
            max_retries: 2,
            pass_threshold: 0.7,
            enable_judge_cache: true,
            cache_ttl_secs: 3600,
            archive_dir: PathBuf::from(".agentgauge/experiments"),
        }
    }
}

impl EngineConfig {
    /// Parse from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: EngineConfig = toml::from_str(text)
            .map_err(|e| EngineError::Validation(format!("config parse: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    fn validate(&self) -> Result<()> {
        if self.max_concurrent == 0 {
            return Err(EngineError::Validation(
                "max_concurrent must be at least 1".into(),
            ));
        }
        if self.max_turns == 0 {
            return Err(EngineError::Validation("max_turns must be at least 1".into()));
        }
        if !(0.0..=1.0).contains(&self.pass_threshold) {
            return Err(EngineError::Validation(
                "pass_threshold must be within [0, 1]".into(),
            ));
        }
        Ok(())
    }
}

/// Target-agent configuration for one run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AgentConfig {
    pub model_id: String,
    pub system_prompt: String,
    pub temperature: f64,
    pub max_tokens: u32,
}

impl Default for AgentConfig {
    fn default() -> Self {
        let engine = EngineConfig::default();
        Self {
            model_id: engine.default_model_id,
            system_prompt: engine.system_prompt,
            temperature: engine.temperature,
            max_tokens: engine.max_tokens,
        }
    }
}

impl AgentConfig {
    /// Derive the per-run agent defaults from the engine configuration.
    pub fn from_engine(config: &EngineConfig) -> Self {
        Self {
            model_id: config.default_model_id.clone(),
            system_prompt: config.system_prompt.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.max_turns, 10);
        assert_eq!(config.max_retries, 2);
        assert_eq!(config.invoke_timeout_secs, 30);
        assert!((config.temperature - 0.1).abs() < 1e-9);
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config = EngineConfig::from_toml_str(
            r#"
            max_concurrent = 8
            pass_threshold = 0.9
            "#,
        )
        .unwrap();
        assert_eq!(config.max_concurrent, 8);
        assert!((config.pass_threshold - 0.9).abs() < 1e-9);
        // Untouched fields keep their defaults.
        assert_eq!(config.max_tokens, 4096);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(EngineConfig::from_toml_str("max_concurrent = 0").is_err());
        assert!(EngineConfig::from_toml_str("pass_threshold = 1.5").is_err());
    }

    #[test]
    fn test_agent_config_tracks_engine() {
        let mut engine = EngineConfig::default();
        engine.default_model_id = "other-model".into();
        let agent = AgentConfig::from_engine(&engine);
        assert_eq!(agent.model_id, "other-model");
        assert_eq!(agent.max_tokens, 4096);
    }
}
