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

//! Tool definitions for the evaluation surface.
//!
//! Every tool name is a stable identifier; hosts dispatch on it via
//! `tools/call`. Suite management tools mutate the in-process stores,
//! experiment tools drive the orchestrator, and archive tools read and
//! write saved experiment definitions.

use serde_json::json;

use super::protocol::Tool;

/// Schema fragment for a test case object, shared by every tool that
/// accepts inline cases.
fn case_schema() -> serde_json::Value {
    json!({
        "type": "object",
        "properties": {
            "name": {
                "type": "string",
                "description": "Case name, unique within the batch (default: case-<index>)"
            },
            "input": {
                "description": "Input payload for the target agent, a string or structured object (default: {})"
            },
            "expected_output": {
                "description": "Reference output for reference-based evaluators (optional)"
            },
            "metadata": {
                "type": "object",
                "description": "Free-form metadata; include a 'persona' object or 'task_description' to drive multi-turn simulation"
            }
        }
    })
}

/// Tool registry, all evaluation tools exposed over MCP.
pub fn get_tool_definitions() -> Vec<Tool> {
    vec![
        Tool {
            name: "evals_create_suite".to_string(),
            description: Some(
                "Create a named evaluation suite, optionally seeded with initial test cases. \
                 Suite names are unique across the store."
                    .to_string(),
            ),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "name": {
                        "type": "string",
                        "description": "Suite name, unique across the store"
                    },
                    "description": {
                        "type": "string",
                        "description": "What the suite covers"
                    },
                    "cases": {
                        "type": "array",
                        "items": case_schema(),
                        "description": "Initial test cases (optional)"
                    }
                },
                "required": ["name"]
            }),
        },
        Tool {
            name: "evals_add_case".to_string(),
            description: Some(
                "Add a test case to an existing suite. Case names are unique within the suite."
                    .to_string(),
            ),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "suite_id": {
                        "type": "string",
                        "description": "Suite id or suite name"
                    },
                    "case": case_schema()
                },
                "required": ["suite_id", "case"]
            }),
        },
        Tool {
            name: "evals_list_suites".to_string(),
            description: Some(
                "List stored evaluation suites with case counts, oldest first.".to_string(),
            ),
            input_schema: json!({
                "type": "object",
                "properties": {}
            }),
        },
        Tool {
            name: "evals_get_suite".to_string(),
            description: Some(
                "Get a stored suite with its full case list.".to_string(),
            ),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "suite_id": {
                        "type": "string",
                        "description": "Suite id or suite name"
                    }
                },
                "required": ["suite_id"]
            }),
        },
        Tool {
            name: "evals_delete_suite".to_string(),
            description: Some(
                "Delete a stored suite. Finished runs that referenced it are kept.".to_string(),
            ),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "suite_id": {
                        "type": "string",
                        "description": "Suite id or suite name"
                    }
                },
                "required": ["suite_id"]
            }),
        },
        Tool {
            name: "evals_list_evaluators".to_string(),
            description: Some(
                "List the built-in LLM-as-judge evaluators with their levels, required \
                 transcript fields, and scoring contracts."
                    .to_string(),
            ),
            input_schema: json!({
                "type": "object",
                "properties": {}
            }),
        },
        Tool {
            name: "evals_run_experiment".to_string(),
            description: Some(
                "Run an experiment against an agent and score each case with the named \
                 evaluators. Cases run single-turn unless their metadata carries a persona, \
                 in which case a simulated user drives the conversation. Provide either \
                 inline cases or a stored suite."
                    .to_string(),
            ),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "cases": {
                        "type": "array",
                        "items": case_schema(),
                        "description": "Inline test cases (exclusive with suite_id)"
                    },
                    "suite_id": {
                        "type": "string",
                        "description": "Stored suite id or name (exclusive with cases)"
                    },
                    "evaluator_names": {
                        "type": "array",
                        "items": { "type": "string" },
                        "description": "Evaluators to run (default: ['output'])"
                    },
                    "rubric": {
                        "type": "string",
                        "description": "Custom grading rubric for rubric-driven evaluators"
                    },
                    "model_id": {
                        "type": "string",
                        "description": "Model for the agent under test (default: engine configuration)"
                    },
                    "system_prompt": {
                        "type": "string",
                        "description": "System prompt for the agent under test"
                    },
                    "temperature": {
                        "type": "number",
                        "description": "Sampling temperature for the agent under test"
                    },
                    "experiment_name": {
                        "type": "string",
                        "description": "Name for this run (default: a timestamped name)"
                    }
                }
            }),
        },
        Tool {
            name: "evals_run_simulation".to_string(),
            description: Some(
                "Run multi-turn simulations: a model-driven user persona converses with the \
                 agent for up to max_turns turns per case, then the named evaluators score \
                 each conversation."
                    .to_string(),
            ),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "cases": {
                        "type": "array",
                        "items": case_schema(),
                        "description": "Test cases; metadata may carry a persona with goal, script, and stop_phrase"
                    },
                    "evaluator_names": {
                        "type": "array",
                        "items": { "type": "string" },
                        "description": "Evaluators to run (default: ['helpfulness', 'goal_success'])"
                    },
                    "rubric": {
                        "type": "string",
                        "description": "Custom grading rubric for rubric-driven evaluators"
                    },
                    "model_id": {
                        "type": "string",
                        "description": "Model for the agent under test (default: engine configuration)"
                    },
                    "system_prompt": {
                        "type": "string",
                        "description": "System prompt for the agent under test"
                    },
                    "temperature": {
                        "type": "number",
                        "description": "Sampling temperature for the agent under test"
                    },
                    "max_turns": {
                        "type": "integer",
                        "description": "Agent turn limit per conversation (default: 10)",
                        "default": 10
                    },
                    "experiment_name": {
                        "type": "string",
                        "description": "Name for this run (default: a timestamped name)"
                    }
                },
                "required": ["cases"]
            }),
        },
        Tool {
            name: "evals_generate_experiment".to_string(),
            description: Some(
                "Generate test cases from a context document and task description, and \
                 register them as a new suite ready to run."
                    .to_string(),
            ),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "context": {
                        "type": "string",
                        "description": "Description of the agent's capabilities, tools, and data"
                    },
                    "task_description": {
                        "type": "string",
                        "description": "What the agent does"
                    },
                    "num_cases": {
                        "type": "integer",
                        "description": "Number of cases to generate (default: 5)",
                        "default": 5
                    },
                    "evaluator_name": {
                        "type": "string",
                        "description": "Evaluator the generated suite targets (default: output)",
                        "default": "output"
                    }
                },
                "required": ["context", "task_description"]
            }),
        },
        Tool {
            name: "evals_list_runs".to_string(),
            description: Some(
                "List experiment runs, newest first, optionally filtered to runs of one \
                 stored suite."
                    .to_string(),
            ),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "suite_id": {
                        "type": "string",
                        "description": "Only runs of this suite id or name (optional)"
                    }
                }
            }),
        },
        Tool {
            name: "evals_get_run".to_string(),
            description: Some(
                "Get the full record of one experiment run, including per-case transcripts, \
                 evaluation results, and the summary."
                    .to_string(),
            ),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "run_id": {
                        "type": "string",
                        "description": "Run id"
                    }
                },
                "required": ["run_id"]
            }),
        },
        Tool {
            name: "evals_save_experiment".to_string(),
            description: Some(
                "Save a re-runnable experiment definition (cases, evaluators, rubric) to the \
                 archive directory as JSON."
                    .to_string(),
            ),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "cases": {
                        "type": "array",
                        "items": case_schema(),
                        "description": "Test cases to save"
                    },
                    "evaluator_names": {
                        "type": "array",
                        "items": { "type": "string" },
                        "description": "Evaluators the definition runs with"
                    },
                    "filename": {
                        "type": "string",
                        "description": "Archive file name; a .json extension is added if missing"
                    },
                    "rubric": {
                        "type": "string",
                        "description": "Custom grading rubric (optional)"
                    },
                    "experiment_name": {
                        "type": "string",
                        "description": "Definition name (default: the filename)"
                    }
                },
                "required": ["cases", "evaluator_names", "filename"]
            }),
        },
        Tool {
            name: "evals_load_experiment".to_string(),
            description: Some(
                "Load a saved experiment definition from the archive directory.".to_string(),
            ),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "filename": {
                        "type": "string",
                        "description": "Archive file name, with or without the .json extension"
                    }
                },
                "required": ["filename"]
            }),
        },
        Tool {
            name: "evals_list_saved_experiments".to_string(),
            description: Some(
                "List saved experiment definitions in the archive directory, newest first."
                    .to_string(),
            ),
            input_schema: json!({
                "type": "object",
                "properties": {}
            }),
        },
    ]
}
