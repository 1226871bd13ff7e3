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

//! Model-driven test case generation.
//!
//! Given a context document and a task description, the synthesizer asks a
//! model for a JSON array of cases. Replies are salvaged the same way judge
//! verdicts are: whole-text parse first, then the outermost JSON array.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use serde_json::Value;

use agentgauge_core::{Case, EngineConfig, EngineError, Result, Turn};
use agentgauge_evals::{invoke_with_retry, ModelClient, RetryPolicy};

const SYNTHESIS_SYSTEM_PROMPT: &str =
    "You design test cases for evaluating AI agents. Respond only with a valid JSON array.";

const SYNTHESIS_PROMPT_TEMPLATE: &str = r#"Generate {num_cases} test cases for evaluating an AI agent.

TASK UNDER TEST:
{task_description}

CONTEXT:
{context}

Each case needs a realistic user input and, where the task has a verifiable
answer, an expected output. Cover distinct scenarios, including at least one
edge case.

Respond with a JSON array of objects:
[{"name": "<short-kebab-case-name>", "input": "<user input>", "expected_output": "<reference answer, optional>"}]"#;

/// Produces cases from a context and task description.
#[async_trait]
pub trait CaseSynthesizer: Send + Sync {
    async fn synthesize(
        &self,
        context: &str,
        task_description: &str,
        num_cases: usize,
    ) -> Result<Vec<Case>>;
}

/// Synthesizer backed by a generator model.
pub struct ModelCaseSynthesizer {
    client: Arc<dyn ModelClient>,
    model_id: String,
    timeout: Duration,
    retry: RetryPolicy,
}

impl ModelCaseSynthesizer {
    pub fn new(client: Arc<dyn ModelClient>, model_id: impl Into<String>) -> Self {
        Self {
            client,
            model_id: model_id.into(),
            timeout: Duration::from_secs(60),
            retry: RetryPolicy::default(),
        }
    }

    /// Generator defaults from the engine configuration. Case generation is
    /// one large completion, so it gets double the per-call budget.
    pub fn from_config(client: Arc<dyn ModelClient>, config: &EngineConfig) -> Self {
        Self {
            client,
            model_id: config.default_model_id.clone(),
            timeout: Duration::from_secs(config.invoke_timeout_secs * 2),
            retry: RetryPolicy::new(config.max_retries),
        }
    }
}

#[async_trait]
impl CaseSynthesizer for ModelCaseSynthesizer {
    async fn synthesize(
        &self,
        context: &str,
        task_description: &str,
        num_cases: usize,
    ) -> Result<Vec<Case>> {
        let prompt = SYNTHESIS_PROMPT_TEMPLATE
            .replace("{num_cases}", &num_cases.to_string())
            .replace("{task_description}", task_description)
            .replace("{context}", context);

        let conversation = [Turn::user(prompt)];
        let response = invoke_with_retry(
            &self.client,
            &conversation,
            &self.model_id,
            Some(SYNTHESIS_SYSTEM_PROMPT),
            self.timeout,
            &self.retry,
        )
        .await
        .map_err(|e| EngineError::Invocation(format!("case generation failed: {e}")))?;

        let cases = parse_cases(&response.content)?;
        tracing::info!(
            requested = num_cases,
            generated = cases.len(),
            model_id = %self.model_id,
            "synthesized test cases"
        );
        Ok(cases)
    }
}

/// Parse a generator reply into cases.
///
/// Accepts either a bare JSON array or prose with an embedded array. Entries
/// without a name get positional names; duplicate names get a positional
/// suffix so every case can enter a suite.
fn parse_cases(content: &str) -> Result<Vec<Case>> {
    let array = extract_array(content).ok_or_else(|| {
        EngineError::Invocation(format!(
            "generator reply held no JSON array: {}",
            truncate(content, 200)
        ))
    })?;

    let mut cases = Vec::new();
    let mut seen_names: Vec<String> = Vec::new();
    for (index, entry) in array.into_iter().enumerate() {
        let Value::Object(mut fields) = entry else {
            tracing::warn!(index, "skipping non-object generator entry");
            continue;
        };
        let input = match fields.remove("input").or_else(|| fields.remove("query")) {
            Some(input) if !input.is_null() => input,
            _ => {
                tracing::warn!(index, "skipping generator entry without input");
                continue;
            }
        };
        let mut name = fields
            .remove("name")
            .and_then(|v| v.as_str().map(str::to_string))
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| format!("case-{}", index + 1));
        if seen_names.contains(&name) {
            name = format!("{}-{}", name, index + 1);
        }
        seen_names.push(name.clone());

        let mut case = Case::new(name, input);
        if let Some(expected) = fields.remove("expected_output") {
            if !expected.is_null() {
                case = case.with_expected_output(expected);
            }
        }
        if let Some(Value::Object(metadata)) = fields.remove("metadata") {
            case.metadata = metadata;
        }
        cases.push(case);
    }

    if cases.is_empty() {
        return Err(EngineError::Invocation(
            "generator reply held no usable cases".into(),
        ));
    }
    Ok(cases)
}

fn extract_array(content: &str) -> Option<Vec<Value>> {
    if let Ok(Value::Array(array)) = serde_json::from_str::<Value>(content) {
        return Some(array);
    }
    let pattern = Regex::new(r"(?s)\[.*\]").ok()?;
    let salvaged = pattern.find(content)?;
    match serde_json::from_str::<Value>(salvaged.as_str()) {
        Ok(Value::Array(array)) => Some(array),
        _ => None,
    }
}

fn truncate(text: &str, limit: usize) -> String {
    if text.len() <= limit {
        text.to_string()
    } else {
        let mut end = limit;
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &text[..end])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    use agentgauge_evals::{ClientError, ModelResponse};

    struct CannedClient {
        reply: String,
    }

    #[async_trait]
    impl ModelClient for CannedClient {
        async fn invoke(
            &self,
            _conversation: &[agentgauge_core::Turn],
            _model_id: &str,
            _system_prompt: Option<&str>,
        ) -> std::result::Result<ModelResponse, ClientError> {
            Ok(ModelResponse {
                content: self.reply.clone(),
                tool_calls: Vec::new(),
                usage: None,
                model: "test-model".to_string(),
                latency_ms: 1,
            })
        }

        fn provider(&self) -> &str {
            "test"
        }
    }

    #[tokio::test]
    async fn test_synthesize_parses_generated_cases() {
        let client = Arc::new(CannedClient {
            reply: json!([
                {"name": "basic-sum", "input": "What is 2+2?", "expected_output": "4"},
                {"name": "edge-zero", "input": "What is 0+0?", "expected_output": "0"}
            ])
            .to_string(),
        });
        let synthesizer = ModelCaseSynthesizer::new(client, "gen-model");

        let cases = synthesizer.synthesize("arithmetic", "add numbers", 2).await.unwrap();
        assert_eq!(cases.len(), 2);
        assert_eq!(cases[0].name, "basic-sum");
        assert_eq!(cases[0].input_text(), "What is 2+2?");
        assert_eq!(cases[1].expected_text().as_deref(), Some("0"));
    }

    #[tokio::test]
    async fn test_synthesize_salvages_array_from_prose() {
        let client = Arc::new(CannedClient {
            reply: "Here are your cases:\n[{\"name\": \"one\", \"input\": \"q\"}]\nEnjoy!"
                .to_string(),
        });
        let synthesizer = ModelCaseSynthesizer::new(client, "gen-model");

        let cases = synthesizer.synthesize("ctx", "task", 1).await.unwrap();
        assert_eq!(cases.len(), 1);
        assert_eq!(cases[0].name, "one");
    }

    #[tokio::test]
    async fn test_synthesize_rejects_reply_without_array() {
        let client = Arc::new(CannedClient {
            reply: "I cannot generate cases right now.".to_string(),
        });
        let synthesizer = ModelCaseSynthesizer::new(client, "gen-model");

        let err = synthesizer.synthesize("ctx", "task", 3).await.unwrap_err();
        assert!(matches!(err, EngineError::Invocation(_)));
    }

    #[test]
    fn test_parse_cases_fills_and_deduplicates_names() {
        let reply = json!([
            {"input": "first"},
            {"name": "dup", "input": "second"},
            {"name": "dup", "input": "third"}
        ])
        .to_string();

        let cases = parse_cases(&reply).unwrap();
        assert_eq!(cases[0].name, "case-1");
        assert_eq!(cases[1].name, "dup");
        assert_eq!(cases[2].name, "dup-3");
    }

    #[test]
    fn test_parse_cases_skips_unusable_entries() {
        let reply = json!([
            "not an object",
            {"name": "no-input"},
            {"name": "ok", "input": "fine", "metadata": {"tag": "smoke"}}
        ])
        .to_string();

        let cases = parse_cases(&reply).unwrap();
        assert_eq!(cases.len(), 1);
        assert_eq!(cases[0].name, "ok");
        assert_eq!(cases[0].metadata.get("tag"), Some(&json!("smoke")));
    }

    #[test]
    fn test_parse_cases_rejects_empty_array() {
        assert!(matches!(
            parse_cases("[]"),
            Err(EngineError::Invocation(_))
        ));
    }
}
