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

//! Request handling for the evaluation tool surface.
//!
//! [`McpEngineHandler::handle`] dispatches the JSON-RPC methods
//! (`initialize`, `tools/list`, `tools/call`); tool invocations funnel
//! through [`McpEngineHandler::handle_tool_call`]. Protocol problems
//! (unknown method, malformed params) become JSON-RPC errors; engine
//! failures become `{"error": ...}` tool payloads with the error flag
//! set, so hosts can surface them to the model instead of dropping the
//! call.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{json, Value};
use uuid::Uuid;

use agentgauge_core::{Case, EngineConfig, EngineError, Result, Suite};
use agentgauge_evals::{catalog, resolve, ModelClient};
use agentgauge_experiments::{CaseSource, ExperimentSpec, Orchestrator};
use agentgauge_storage::{ExperimentArchive, ExperimentDefinition, RunStore, SuiteStore};

use super::protocol::{
    CallToolParams, CallToolResult, JsonRpcError, JsonRpcId, JsonRpcRequest, JsonRpcResponse,
    MCP_PROTOCOL_VERSION,
};
use super::tools::get_tool_definitions;

/// The engine components behind the tool surface, wired to one model
/// client and one configuration.
pub struct EngineState {
    pub suites: Arc<SuiteStore>,
    pub runs: Arc<RunStore>,
    pub orchestrator: Orchestrator,
    pub archive: ExperimentArchive,
}

impl EngineState {
    pub fn new(client: Arc<dyn ModelClient>, config: EngineConfig) -> Self {
        let suites = Arc::new(SuiteStore::new());
        let runs = Arc::new(RunStore::new());
        let archive = ExperimentArchive::new(config.archive_dir.clone());
        let orchestrator = Orchestrator::new(client, suites.clone(), runs.clone(), config);
        Self {
            suites,
            runs,
            orchestrator,
            archive,
        }
    }
}

/// MCP handler for the evaluation engine.
pub struct McpEngineHandler {
    state: Arc<EngineState>,
}

impl McpEngineHandler {
    pub fn new(state: Arc<EngineState>) -> Self {
        Self { state }
    }

    /// Handle one JSON-RPC request.
    pub async fn handle(&self, request: JsonRpcRequest) -> JsonRpcResponse {
        match request.method.as_str() {
            "initialize" => self.handle_initialize(request.id),
            "tools/list" => self.handle_list_tools(request.id),
            "tools/call" => self.handle_call_tool(request.id, request.params).await,
            _ => JsonRpcResponse::error(
                request.id,
                JsonRpcError::method_not_found(&request.method),
            ),
        }
    }

    fn handle_initialize(&self, id: JsonRpcId) -> JsonRpcResponse {
        let result = json!({
            "protocolVersion": MCP_PROTOCOL_VERSION,
            "capabilities": {
                "tools": {}
            },
            "serverInfo": {
                "name": "agentgauge",
                "version": env!("CARGO_PKG_VERSION")
            }
        });
        JsonRpcResponse::success(id, result)
    }

    fn handle_list_tools(&self, id: JsonRpcId) -> JsonRpcResponse {
        JsonRpcResponse::success(id, json!({ "tools": get_tool_definitions() }))
    }

    async fn handle_call_tool(&self, id: JsonRpcId, params: Option<Value>) -> JsonRpcResponse {
        let params: CallToolParams = match params {
            Some(value) => match serde_json::from_value(value) {
                Ok(params) => params,
                Err(e) => {
                    return JsonRpcResponse::error(id, JsonRpcError::invalid_params(e.to_string()))
                }
            },
            None => {
                return JsonRpcResponse::error(
                    id,
                    JsonRpcError::invalid_params("missing tools/call params"),
                )
            }
        };
        let result = self.handle_tool_call(&params.name, &params.arguments).await;
        JsonRpcResponse::success(id, json!(result))
    }

    /// Dispatch one tool invocation by name.
    pub async fn handle_tool_call(
        &self,
        name: &str,
        arguments: &HashMap<String, Value>,
    ) -> CallToolResult {
        tracing::debug!(tool = name, "tool call");
        let outcome = match name {
            "evals_create_suite" => self.execute_create_suite(arguments),
            "evals_add_case" => self.execute_add_case(arguments),
            "evals_list_suites" => self.execute_list_suites(),
            "evals_get_suite" => self.execute_get_suite(arguments),
            "evals_delete_suite" => self.execute_delete_suite(arguments),
            "evals_list_evaluators" => self.execute_list_evaluators(),
            "evals_run_experiment" => self.execute_run_experiment(arguments).await,
            "evals_run_simulation" => self.execute_run_simulation(arguments).await,
            "evals_generate_experiment" => self.execute_generate_experiment(arguments).await,
            "evals_list_runs" => self.execute_list_runs(arguments),
            "evals_get_run" => self.execute_get_run(arguments),
            "evals_save_experiment" => self.execute_save_experiment(arguments),
            "evals_load_experiment" => self.execute_load_experiment(arguments),
            "evals_list_saved_experiments" => self.execute_list_saved_experiments(),
            _ => Err(EngineError::NotFound(format!("tool '{}'", name))),
        };
        match outcome {
            Ok(payload) => CallToolResult::json(&payload),
            Err(e) => {
                tracing::warn!(tool = name, error = %e, "tool call failed");
                CallToolResult::failure(e.to_string())
            }
        }
    }

    fn execute_create_suite(&self, args: &HashMap<String, Value>) -> Result<Value> {
        let name = require_str(args, "name")?;
        let description = optional_str(args, "description").unwrap_or_default();
        let mut suite = Suite::new(name, description);
        if let Some(value) = args.get("cases") {
            for case in parse_cases(value)? {
                suite.add_case(case)?;
            }
        }
        let suite_id = self.state.suites.create(suite)?;
        let suite = self.state.suites.get(suite_id)?;
        Ok(json!({
            "suite_id": suite_id,
            "name": suite.name,
            "case_count": suite.case_count(),
        }))
    }

    fn execute_add_case(&self, args: &HashMap<String, Value>) -> Result<Value> {
        let suite = self.state.suites.resolve(require_str(args, "suite_id")?)?;
        let case = args
            .get("case")
            .ok_or_else(|| EngineError::Validation("missing required parameter 'case'".into()))?;
        let case = parse_case(case, 0)?;
        let case_id = case.id;
        let total = self.state.suites.add_case(suite.id, case)?;
        Ok(json!({
            "added": true,
            "suite_id": suite.id,
            "case_id": case_id,
            "total_cases": total,
        }))
    }

    fn execute_list_suites(&self) -> Result<Value> {
        let suites = self.state.suites.list();
        Ok(json!({ "suites": suites, "count": suites.len() }))
    }

    fn execute_get_suite(&self, args: &HashMap<String, Value>) -> Result<Value> {
        let suite = self.state.suites.resolve(require_str(args, "suite_id")?)?;
        Ok(serde_json::to_value(&suite)?)
    }

    fn execute_delete_suite(&self, args: &HashMap<String, Value>) -> Result<Value> {
        let suite = self.state.suites.resolve(require_str(args, "suite_id")?)?;
        let deleted = self.state.suites.delete(suite.id)?;
        Ok(json!({
            "deleted": true,
            "suite_id": deleted.id,
            "name": deleted.name,
        }))
    }

    fn execute_list_evaluators(&self) -> Result<Value> {
        let evaluators = catalog();
        Ok(json!({ "evaluators": evaluators, "count": evaluators.len() }))
    }

    async fn execute_run_experiment(&self, args: &HashMap<String, Value>) -> Result<Value> {
        let spec = experiment_spec(args, experiment_source(args)?)?;
        let run = self.state.orchestrator.run_experiment(spec).await?;
        Ok(serde_json::to_value(&run)?)
    }

    async fn execute_run_simulation(&self, args: &HashMap<String, Value>) -> Result<Value> {
        let cases = args
            .get("cases")
            .ok_or_else(|| EngineError::Validation("missing required parameter 'cases'".into()))?;
        let spec = experiment_spec(args, CaseSource::Cases(parse_cases(cases)?))?;
        let run = self.state.orchestrator.run_simulation(spec).await?;
        Ok(serde_json::to_value(&run)?)
    }

    async fn execute_generate_experiment(&self, args: &HashMap<String, Value>) -> Result<Value> {
        let context = require_str(args, "context")?;
        let task_description = require_str(args, "task_description")?;
        let num_cases = optional_u32(args, "num_cases")?.unwrap_or(5) as usize;
        let evaluator_name = optional_str(args, "evaluator_name").unwrap_or("output");
        if !resolve(&[evaluator_name.to_string()]).unknown.is_empty() {
            return Err(EngineError::Capability(format!(
                "unknown evaluator '{}'",
                evaluator_name
            )));
        }
        let suite = self
            .state
            .orchestrator
            .generate_experiment(context, task_description, num_cases)
            .await?;
        let mut payload = serde_json::to_value(&suite)?;
        if let Some(object) = payload.as_object_mut() {
            object.insert("evaluator_names".into(), json!([evaluator_name]));
            object.insert("case_count".into(), json!(suite.case_count()));
        }
        Ok(payload)
    }

    fn execute_list_runs(&self, args: &HashMap<String, Value>) -> Result<Value> {
        // Id filters stay valid after suite deletion; names need the store.
        let filter = match optional_str(args, "suite_id") {
            Some(selector) => match selector.parse::<Uuid>() {
                Ok(id) => Some(id),
                Err(_) => Some(self.state.suites.resolve(selector)?.id),
            },
            None => None,
        };
        let runs = self.state.orchestrator.list_runs(filter);
        Ok(json!({ "runs": runs, "count": runs.len() }))
    }

    fn execute_get_run(&self, args: &HashMap<String, Value>) -> Result<Value> {
        let run_id = parse_id(require_str(args, "run_id")?, "run_id")?;
        let run = self.state.orchestrator.get_run(run_id)?;
        Ok(serde_json::to_value(&run)?)
    }

    fn execute_save_experiment(&self, args: &HashMap<String, Value>) -> Result<Value> {
        let cases = args
            .get("cases")
            .ok_or_else(|| EngineError::Validation("missing required parameter 'cases'".into()))?;
        let cases = parse_cases(cases)?;
        let evaluator_names = string_array(args, "evaluator_names")?;
        if evaluator_names.is_empty() {
            return Err(EngineError::Validation(
                "missing required parameter 'evaluator_names'".into(),
            ));
        }
        let filename = require_str(args, "filename")?;
        let name = optional_str(args, "experiment_name").unwrap_or(filename);
        let mut definition = ExperimentDefinition::new(name, cases, evaluator_names);
        if let Some(rubric) = optional_str(args, "rubric") {
            definition = definition.with_rubric(rubric);
        }
        let path = self.state.archive.save(&definition, filename)?;
        Ok(json!({
            "path": path.display().to_string(),
            "case_count": definition.cases.len(),
        }))
    }

    fn execute_load_experiment(&self, args: &HashMap<String, Value>) -> Result<Value> {
        let definition = self.state.archive.load(require_str(args, "filename")?)?;
        let case_count = definition.cases.len();
        let mut payload = serde_json::to_value(&definition)?;
        if let Some(object) = payload.as_object_mut() {
            object.insert("case_count".into(), json!(case_count));
        }
        Ok(payload)
    }

    fn execute_list_saved_experiments(&self) -> Result<Value> {
        let experiments = self.state.archive.list()?;
        Ok(json!({ "experiments": experiments, "count": experiments.len() }))
    }
}

/// Either inline cases or a stored suite, never both.
fn experiment_source(args: &HashMap<String, Value>) -> Result<CaseSource> {
    match (args.get("cases"), optional_str(args, "suite_id")) {
        (Some(cases), None) => Ok(CaseSource::Cases(parse_cases(cases)?)),
        (None, Some(selector)) => Ok(CaseSource::Suite(selector.to_string())),
        _ => Err(EngineError::Validation(
            "provide exactly one of 'cases' or 'suite_id'".into(),
        )),
    }
}

fn experiment_spec(args: &HashMap<String, Value>, source: CaseSource) -> Result<ExperimentSpec> {
    Ok(ExperimentSpec {
        name: optional_str(args, "experiment_name").map(str::to_string),
        source,
        evaluator_names: string_array(args, "evaluator_names")?,
        model_id: optional_str(args, "model_id").map(str::to_string),
        system_prompt: optional_str(args, "system_prompt").map(str::to_string),
        temperature: args.get("temperature").and_then(Value::as_f64),
        max_tokens: None,
        rubric: optional_str(args, "rubric").map(str::to_string),
        max_turns: optional_u32(args, "max_turns")?,
    })
}

fn require_str<'a>(args: &'a HashMap<String, Value>, key: &str) -> Result<&'a str> {
    optional_str(args, key).ok_or_else(|| {
        EngineError::Validation(format!("missing required string parameter '{}'", key))
    })
}

/// Present, non-empty string arguments only. Hosts routinely send empty
/// strings for omitted optionals, so those collapse to `None`.
fn optional_str<'a>(args: &'a HashMap<String, Value>, key: &str) -> Option<&'a str> {
    args.get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
}

fn optional_u32(args: &HashMap<String, Value>, key: &str) -> Result<Option<u32>> {
    match args.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value
            .as_u64()
            .and_then(|n| u32::try_from(n).ok())
            .map(Some)
            .ok_or_else(|| {
                EngineError::Validation(format!("'{}' must be a non-negative integer", key))
            }),
    }
}

/// String array argument; absent means empty.
fn string_array(args: &HashMap<String, Value>, key: &str) -> Result<Vec<String>> {
    match args.get(key) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| {
                item.as_str().map(str::to_string).ok_or_else(|| {
                    EngineError::Validation(format!("'{}' must contain only strings", key))
                })
            })
            .collect(),
        Some(_) => Err(EngineError::Validation(format!(
            "'{}' must be an array of strings",
            key
        ))),
    }
}

fn parse_id(text: &str, field: &str) -> Result<Uuid> {
    text.parse::<Uuid>()
        .map_err(|_| EngineError::Validation(format!("'{}' is not a valid id: {}", field, text)))
}

fn parse_cases(value: &Value) -> Result<Vec<Case>> {
    let entries = value
        .as_array()
        .ok_or_else(|| EngineError::Validation("'cases' must be an array".into()))?;
    entries
        .iter()
        .enumerate()
        .map(|(index, entry)| parse_case(entry, index))
        .collect()
}

/// Build a case from a loosely-structured object. Unnamed cases get
/// positional names, a missing input defaults to an empty object, and a
/// well-formed `id` is honored so definitions round-trip through hosts.
fn parse_case(value: &Value, index: usize) -> Result<Case> {
    let object = value.as_object().ok_or_else(|| {
        EngineError::Validation(format!("case at index {} must be an object", index))
    })?;
    let name = object
        .get("name")
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| format!("case-{}", index));
    let input = object
        .get("input")
        .filter(|v| !v.is_null())
        .cloned()
        .unwrap_or_else(|| json!({}));
    let mut case = Case::new(name, input);
    if let Some(id) = object.get("id").and_then(Value::as_str) {
        if let Ok(id) = id.parse::<Uuid>() {
            case.id = id;
        }
    }
    if let Some(expected) = object.get("expected_output").filter(|v| !v.is_null()) {
        case = case.with_expected_output(expected.clone());
    }
    if let Some(metadata) = object.get("metadata").and_then(Value::as_object) {
        case.metadata = metadata.clone();
    }
    case.validate()?;
    Ok(case)
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;
    use agentgauge_core::Turn;
    use agentgauge_evals::{ClientError, ModelResponse};

    /// Plays the agent, the judge, the actor persona, and the case
    /// generator, discriminating on the system prompt.
    struct StubClient {
        agent_calls: AtomicU32,
    }

    impl StubClient {
        fn new() -> Self {
            Self {
                agent_calls: AtomicU32::new(0),
            }
        }

        fn response(content: impl Into<String>) -> ModelResponse {
            ModelResponse {
                content: content.into(),
                tool_calls: Vec::new(),
                usage: None,
                model: "test-model".to_string(),
                latency_ms: 1,
            }
        }
    }

    #[async_trait]
    impl ModelClient for StubClient {
        async fn invoke(
            &self,
            conversation: &[Turn],
            _model_id: &str,
            system_prompt: Option<&str>,
        ) -> std::result::Result<ModelResponse, ClientError> {
            let system = system_prompt.unwrap_or("");
            if system.contains("expert evaluator") {
                let prompt = conversation.last().map(|t| t.content.as_str()).unwrap_or("");
                let score = if prompt.contains("the answer is 42") { 0.9 } else { 0.2 };
                return Ok(Self::response(format!(
                    r#"{{"score": {score}, "rationale": "graded"}}"#
                )));
            }
            if system.contains("You design test cases") {
                return Ok(Self::response(
                    r#"[{"name": "drafted-1", "input": {"query": "What is 2+2?"}},
                        {"name": "drafted-2", "input": {"query": "What is 3+3?"}}]"#,
                ));
            }
            if system.contains("role-playing a user") {
                return Ok(Self::response("go on"));
            }
            self.agent_calls.fetch_add(1, Ordering::SeqCst);
            Ok(Self::response("the answer is 42"))
        }

        fn provider(&self) -> &str {
            "test"
        }
    }

    fn test_config() -> EngineConfig {
        let mut config = EngineConfig::default();
        config.max_retries = 0;
        config.invoke_timeout_secs = 5;
        config.enable_judge_cache = false;
        config
    }

    fn handler_with_config(config: EngineConfig) -> McpEngineHandler {
        let state = EngineState::new(Arc::new(StubClient::new()), config);
        McpEngineHandler::new(Arc::new(state))
    }

    fn handler() -> McpEngineHandler {
        handler_with_config(test_config())
    }

    fn request(method: &str, params: Option<Value>) -> JsonRpcRequest {
        JsonRpcRequest {
            jsonrpc: "2.0".to_string(),
            method: method.to_string(),
            params,
            id: JsonRpcId::Number(1),
        }
    }

    fn arguments_map(value: Value) -> HashMap<String, Value> {
        match value {
            Value::Object(map) => map.into_iter().collect(),
            other => panic!("arguments must be an object, got {}", other),
        }
    }

    async fn call_tool(handler: &McpEngineHandler, name: &str, arguments: Value) -> Value {
        let result = handler
            .handle_tool_call(name, &arguments_map(arguments))
            .await;
        assert_ne!(
            result.is_error,
            Some(true),
            "tool {} failed: {:?}",
            name,
            result.text()
        );
        serde_json::from_str(result.text().unwrap()).unwrap()
    }

    async fn call_tool_err(handler: &McpEngineHandler, name: &str, arguments: Value) -> String {
        let result = handler
            .handle_tool_call(name, &arguments_map(arguments))
            .await;
        assert_eq!(result.is_error, Some(true), "tool {} should fail", name);
        let payload: Value = serde_json::from_str(result.text().unwrap()).unwrap();
        payload["error"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_initialize_advertises_tools() {
        let handler = handler();
        let response = handler.handle(request("initialize", None)).await;
        assert!(response.error.is_none());
        let result = response.result.unwrap();
        assert_eq!(result["protocolVersion"], MCP_PROTOCOL_VERSION);
        assert!(result["capabilities"]["tools"].is_object());
        assert_eq!(result["serverInfo"]["name"], "agentgauge");
    }

    #[tokio::test]
    async fn test_list_tools_exposes_full_surface() {
        let handler = handler();
        let response = handler.handle(request("tools/list", None)).await;
        let result = response.result.unwrap();
        let tools = result["tools"].as_array().unwrap();
        assert_eq!(tools.len(), 14);
        assert!(tools.iter().any(|t| t["name"] == "evals_run_experiment"));
        assert!(tools.iter().all(|t| t["inputSchema"]["type"] == "object"));
    }

    #[tokio::test]
    async fn test_unknown_method_is_rejected() {
        let handler = handler();
        let response = handler.handle(request("resources/list", None)).await;
        assert_eq!(response.error.unwrap().code, -32601);
    }

    #[tokio::test]
    async fn test_tool_call_without_params_is_invalid() {
        let handler = handler();
        let response = handler.handle(request("tools/call", None)).await;
        assert_eq!(response.error.unwrap().code, -32602);
    }

    #[tokio::test]
    async fn test_unknown_tool_is_a_tool_error() {
        let handler = handler();
        let message = call_tool_err(&handler, "evals_rewind_time", json!({})).await;
        assert!(message.contains("evals_rewind_time"));
    }

    #[tokio::test]
    async fn test_tools_call_envelope_round_trip() {
        let handler = handler();
        let response = handler
            .handle(request(
                "tools/call",
                Some(json!({
                    "name": "evals_list_evaluators",
                    "arguments": {}
                })),
            ))
            .await;
        assert!(response.error.is_none());
        let result = response.result.unwrap();
        assert!(result.get("isError").is_none());
        let text = result["content"][0]["text"].as_str().unwrap();
        let payload: Value = serde_json::from_str(text).unwrap();
        assert_eq!(payload["count"], 12);
    }

    #[tokio::test]
    async fn test_suite_management_flow() {
        let handler = handler();

        let created = call_tool(
            &handler,
            "evals_create_suite",
            json!({
                "name": "regression",
                "description": "nightly checks",
                "cases": [{ "name": "sum", "input": { "query": "What is 2+2?" } }]
            }),
        )
        .await;
        assert_eq!(created["case_count"], 1);
        let suite_id = created["suite_id"].as_str().unwrap().to_string();

        let added = call_tool(
            &handler,
            "evals_add_case",
            json!({
                "suite_id": suite_id,
                "case": { "name": "diff", "input": { "query": "What is 5-3?" } }
            }),
        )
        .await;
        assert_eq!(added["added"], true);
        assert_eq!(added["total_cases"], 2);

        // Suites resolve by name as well as id.
        let fetched = call_tool(
            &handler,
            "evals_get_suite",
            json!({ "suite_id": "regression" }),
        )
        .await;
        assert_eq!(fetched["cases"].as_array().unwrap().len(), 2);

        let listed = call_tool(&handler, "evals_list_suites", json!({})).await;
        assert_eq!(listed["count"], 1);
        assert_eq!(listed["suites"][0]["name"], "regression");

        let deleted = call_tool(
            &handler,
            "evals_delete_suite",
            json!({ "suite_id": "regression" }),
        )
        .await;
        assert_eq!(deleted["deleted"], true);

        let message = call_tool_err(
            &handler,
            "evals_get_suite",
            json!({ "suite_id": "regression" }),
        )
        .await;
        assert!(message.contains("regression"));
    }

    #[tokio::test]
    async fn test_duplicate_suite_name_is_rejected() {
        let handler = handler();
        call_tool(&handler, "evals_create_suite", json!({ "name": "twice" })).await;
        let message =
            call_tool_err(&handler, "evals_create_suite", json!({ "name": "twice" })).await;
        assert!(message.contains("already exists"));
    }

    #[tokio::test]
    async fn test_list_evaluators_reports_catalog() {
        let handler = handler();
        let listed = call_tool(&handler, "evals_list_evaluators", json!({})).await;
        assert_eq!(listed["count"], 12);
        let names: Vec<&str> = listed["evaluators"]
            .as_array()
            .unwrap()
            .iter()
            .map(|e| e["name"].as_str().unwrap())
            .collect();
        assert!(names.contains(&"output"));
        assert!(names.contains(&"goal_success"));
    }

    #[tokio::test]
    async fn test_run_experiment_with_inline_cases() {
        let handler = handler();
        let run = call_tool(
            &handler,
            "evals_run_experiment",
            json!({
                "cases": [{
                    "name": "math",
                    "input": { "query": "What is 2+2?" },
                    "expected_output": { "output": "4" }
                }],
                "evaluator_names": ["output"],
                "experiment_name": "smoke"
            }),
        )
        .await;
        assert_eq!(run["name"], "smoke");
        assert_eq!(run["status"], "completed");
        assert_eq!(run["summary"]["total_cases"], 1);
        assert_eq!(
            run["case_results"][0]["evaluations"][0]["evaluator_name"],
            "output"
        );

        let run_id = run["run_id"].as_str().unwrap();
        let fetched = call_tool(&handler, "evals_get_run", json!({ "run_id": run_id })).await;
        assert_eq!(fetched["run_id"], run["run_id"]);

        let listed = call_tool(&handler, "evals_list_runs", json!({})).await;
        assert_eq!(listed["count"], 1);
    }

    #[tokio::test]
    async fn test_run_experiment_needs_exactly_one_source() {
        let handler = handler();
        let message = call_tool_err(&handler, "evals_run_experiment", json!({})).await;
        assert!(message.contains("cases"));

        let message = call_tool_err(
            &handler,
            "evals_run_experiment",
            json!({
                "cases": [{ "input": "q" }],
                "suite_id": "regression"
            }),
        )
        .await;
        assert!(message.contains("exactly one"));
    }

    #[tokio::test]
    async fn test_run_experiment_over_stored_suite_and_filtered_listing() {
        let handler = handler();
        let created = call_tool(
            &handler,
            "evals_create_suite",
            json!({
                "name": "stored",
                "cases": [
                    { "name": "sum", "input": { "query": "What is 2+2?" } },
                    { "name": "diff", "input": { "query": "What is 5-3?" } }
                ]
            }),
        )
        .await;
        let suite_id = created["suite_id"].as_str().unwrap().to_string();

        let run = call_tool(
            &handler,
            "evals_run_experiment",
            json!({ "suite_id": "stored", "evaluator_names": ["output"] }),
        )
        .await;
        assert_eq!(run["status"], "completed");
        assert_eq!(run["suite_ref"].as_str().unwrap(), suite_id);
        assert_eq!(run["summary"]["total_cases"], 2);

        let filtered =
            call_tool(&handler, "evals_list_runs", json!({ "suite_id": suite_id })).await;
        assert_eq!(filtered["count"], 1);

        // A filter naming an unknown suite is an error, not an empty list.
        let message =
            call_tool_err(&handler, "evals_list_runs", json!({ "suite_id": "absent" })).await;
        assert!(message.contains("absent"));
    }

    #[tokio::test]
    async fn test_run_on_unknown_suite_persists_nothing() {
        let handler = handler();
        let message = call_tool_err(
            &handler,
            "evals_run_experiment",
            json!({ "suite_id": "ghost", "evaluator_names": ["output"] }),
        )
        .await;
        assert!(message.contains("ghost"));
        let listed = call_tool(&handler, "evals_list_runs", json!({})).await;
        assert_eq!(listed["count"], 0);
    }

    #[tokio::test]
    async fn test_run_simulation_defaults_and_turn_cap() {
        let handler = handler();
        let run = call_tool(
            &handler,
            "evals_run_simulation",
            json!({
                "cases": [{
                    "name": "chat",
                    "input": "I need help with arithmetic",
                    "metadata": { "task_description": "get the answer 42" }
                }],
                "max_turns": 2
            }),
        )
        .await;
        assert_eq!(run["status"], "completed");
        assert_eq!(
            run["evaluator_names"],
            json!(["helpfulness", "goal_success"])
        );
        let transcript = &run["case_results"][0]["transcript"];
        assert_eq!(transcript["status"], "truncated");
        let agent_turns = transcript["turns"]
            .as_array()
            .unwrap()
            .iter()
            .filter(|t| t["role"] == "agent")
            .count();
        assert_eq!(agent_turns, 2);
        assert_eq!(
            run["case_results"][0]["evaluations"]
                .as_array()
                .unwrap()
                .len(),
            2
        );
    }

    #[tokio::test]
    async fn test_generate_experiment_registers_runnable_suite() {
        let handler = handler();
        let generated = call_tool(
            &handler,
            "evals_generate_experiment",
            json!({
                "context": "A calculator agent with add and subtract tools",
                "task_description": "answer arithmetic questions",
                "num_cases": 2
            }),
        )
        .await;
        assert_eq!(generated["case_count"], 2);
        assert_eq!(generated["evaluator_names"], json!(["output"]));
        let name = generated["name"].as_str().unwrap().to_string();
        assert!(name.starts_with("generated-"));

        let run = call_tool(
            &handler,
            "evals_run_experiment",
            json!({ "suite_id": name, "evaluator_names": ["output"] }),
        )
        .await;
        assert_eq!(run["summary"]["total_cases"], 2);
    }

    #[tokio::test]
    async fn test_generate_experiment_rejects_unknown_evaluator() {
        let handler = handler();
        let message = call_tool_err(
            &handler,
            "evals_generate_experiment",
            json!({ "context": "c", "task_description": "t", "evaluator_name": "vibes" }),
        )
        .await;
        assert!(message.contains("vibes"));
    }

    #[tokio::test]
    async fn test_archive_save_load_list_flow() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = test_config();
        config.archive_dir = dir.path().to_path_buf();
        let handler = handler_with_config(config);

        let saved = call_tool(
            &handler,
            "evals_save_experiment",
            json!({
                "cases": [{ "name": "math", "input": { "query": "What is 2+2?" } }],
                "evaluator_names": ["output"],
                "filename": "nightly",
                "rubric": "Full marks for exact answers.",
                "experiment_name": "nightly regression"
            }),
        )
        .await;
        assert_eq!(saved["case_count"], 1);
        assert!(saved["path"].as_str().unwrap().ends_with("nightly.json"));

        let loaded = call_tool(
            &handler,
            "evals_load_experiment",
            json!({ "filename": "nightly" }),
        )
        .await;
        assert_eq!(loaded["name"], "nightly regression");
        assert_eq!(loaded["case_count"], 1);
        assert_eq!(loaded["rubric"], "Full marks for exact answers.");

        let listed = call_tool(&handler, "evals_list_saved_experiments", json!({})).await;
        assert_eq!(listed["count"], 1);
        assert_eq!(listed["experiments"][0]["file_name"], "nightly.json");

        let message = call_tool_err(
            &handler,
            "evals_load_experiment",
            json!({ "filename": "absent" }),
        )
        .await;
        assert!(message.contains("absent"));
    }

    #[tokio::test]
    async fn test_missing_required_parameter_is_reported() {
        let handler = handler();
        let message = call_tool_err(
            &handler,
            "evals_save_experiment",
            json!({
                "cases": [{ "input": "q" }],
                "evaluator_names": ["output"]
            }),
        )
        .await;
        assert!(message.contains("filename"));
    }
}
