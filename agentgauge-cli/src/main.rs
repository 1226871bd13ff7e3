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

//! Agentgauge CLI
//!
//! Thin operational interface over the evaluation engine: inspect the
//! evaluator catalog and run experiments or simulations from saved
//! experiment definition files.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use agentgauge_core::{CaseStatus, EngineConfig, EvaluationResult, ExperimentRun, Score};
use agentgauge_evals::{catalog, AnthropicClient, ModelClient};
use agentgauge_experiments::{CaseSource, ExperimentSpec, Orchestrator};
use agentgauge_storage::{ExperimentDefinition, RunStore, SuiteStore};

#[derive(Parser)]
#[command(name = "agentgauge")]
#[command(about = "Agentgauge - LLM experiment evaluation engine", long_about = None)]
struct Cli {
    /// Engine configuration file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Verbose mode
    #[arg(short, long)]
    verbose: bool,

    /// Output as JSON (machine-readable)
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the available evaluators
    Evaluators,

    /// Run an experiment from a JSON definition file
    Run {
        /// Path to the experiment definition
        file: PathBuf,

        /// Model for the target agent (defaults to the configured model)
        #[arg(long)]
        model: Option<String>,

        /// Experiment name (defaults to the definition's name)
        #[arg(long)]
        name: Option<String>,

        /// Write the full run record to this path
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Run a multi-turn simulation from a JSON definition file
    Simulate {
        /// Path to the experiment definition
        file: PathBuf,

        /// Model for the target agent (defaults to the configured model)
        #[arg(long)]
        model: Option<String>,

        /// Experiment name (defaults to the definition's name)
        #[arg(long)]
        name: Option<String>,

        /// Conversation turn cap (defaults to the configured limit)
        #[arg(long)]
        max_turns: Option<u32>,

        /// Write the full run record to this path
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "agentgauge=debug"
    } else {
        "agentgauge=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Evaluators => {
            let evaluators = catalog();
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&evaluators)?);
            } else {
                println!("Available Evaluators ({}):", evaluators.len());
                println!("{:-<72}", "");
                for descriptor in &evaluators {
                    let rubric = if descriptor.requires_rubric {
                        "  [rubric required]"
                    } else {
                        ""
                    };
                    println!(
                        "  {:<22} {:?}/{:?}{}",
                        descriptor.name, descriptor.level, descriptor.scoring_contract.scale, rubric
                    );
                    println!("      {}", descriptor.description);
                }
            }
        }

        Commands::Run {
            file,
            model,
            name,
            output,
        } => {
            let definition = load_definition(&file)?;
            println!(
                "Running {} cases from {}...",
                definition.cases.len(),
                file.display()
            );

            let spec = ExperimentSpec {
                name: Some(name.unwrap_or_else(|| definition.name.clone())),
                source: CaseSource::Cases(definition.cases),
                evaluator_names: definition.evaluator_names,
                model_id: model,
                system_prompt: None,
                temperature: None,
                max_tokens: None,
                rubric: definition.rubric,
                max_turns: None,
            };

            let orchestrator = build_orchestrator(config)?;
            let run = orchestrator.run_experiment(spec).await?;
            finish_run(&run, cli.json, output.as_deref())?;
        }

        Commands::Simulate {
            file,
            model,
            name,
            max_turns,
            output,
        } => {
            let definition = load_definition(&file)?;
            println!(
                "Simulating {} cases from {}...",
                definition.cases.len(),
                file.display()
            );

            let spec = ExperimentSpec {
                name: Some(name.unwrap_or_else(|| definition.name.clone())),
                source: CaseSource::Cases(definition.cases),
                evaluator_names: definition.evaluator_names,
                model_id: model,
                system_prompt: None,
                temperature: None,
                max_tokens: None,
                rubric: definition.rubric,
                max_turns,
            };

            let orchestrator = build_orchestrator(config)?;
            let run = orchestrator.run_simulation(spec).await?;
            finish_run(&run, cli.json, output.as_deref())?;
        }
    }

    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    match path {
        Some(path) => EngineConfig::load(path)
            .with_context(|| format!("failed to load config {}", path.display())),
        None => Ok(EngineConfig::default()),
    }
}

fn load_definition(path: &Path) -> Result<ExperimentDefinition> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&text)
        .with_context(|| format!("invalid experiment definition in {}", path.display()))
}

fn build_orchestrator(config: EngineConfig) -> Result<Orchestrator> {
    let api_key =
        std::env::var("ANTHROPIC_API_KEY").context("ANTHROPIC_API_KEY is not set")?;
    let client: Arc<dyn ModelClient> = Arc::new(AnthropicClient::new(api_key));
    let suites = Arc::new(SuiteStore::new());
    let runs = Arc::new(RunStore::new());
    Ok(Orchestrator::new(client, suites, runs, config))
}

fn finish_run(run: &ExperimentRun, json: bool, output: Option<&Path>) -> Result<()> {
    if let Some(path) = output {
        std::fs::write(path, serde_json::to_string_pretty(run)?)
            .with_context(|| format!("failed to write {}", path.display()))?;
        tracing::info!(path = %path.display(), "run record written");
    }
    if json {
        println!("{}", serde_json::to_string_pretty(run)?);
    } else {
        print_run(run);
    }
    Ok(())
}

fn print_run(run: &ExperimentRun) {
    println!();
    println!("Experiment: {} ({})", run.name, run.run_id);
    println!("{:-<60}", "");
    println!("Model:      {}", run.model_id);
    println!("Evaluators: {}", run.evaluator_names.join(", "));
    println!("Started:    {}", format_timestamp(run.started_at_us));
    println!();

    for result in &run.case_results {
        let passed = result.case_status == CaseStatus::Completed
            && result.evaluations.iter().all(|e| e.skipped || e.passed);
        let marker = if passed { "✓" } else { "✗" };
        let verdicts: Vec<String> = result.evaluations.iter().map(evaluation_verdict).collect();
        println!("  {} {} ({})", marker, result.case.name, verdicts.join(", "));
        for error in &result.errors {
            println!("      error: {}", error);
        }
    }

    let summary = &run.summary;
    println!();
    println!("Status:   {}", run.status.as_str());
    println!(
        "Cases:    {} total, {} completed, {} partial, {} failed",
        summary.total_cases, summary.completed, summary.partial, summary.failed
    );
    println!(
        "Score:    {:.2} mean, {:.0}% pass rate",
        summary.overall_score,
        summary.pass_rate * 100.0
    );
    println!("Duration: {:.2}s", summary.duration_ms as f64 / 1000.0);
    if let Some(error) = &run.error {
        println!("Note:     {}", error);
    }
}

fn evaluation_verdict(evaluation: &EvaluationResult) -> String {
    if evaluation.skipped {
        return format!("{} skipped", evaluation.evaluator_name);
    }
    match &evaluation.score {
        Some(Score::Numeric(value)) => format!("{} {:.2}", evaluation.evaluator_name, value),
        Some(Score::Label(label)) => format!("{} {}", evaluation.evaluator_name, label),
        None => format!("{} -", evaluation.evaluator_name),
    }
}

fn format_timestamp(us: u64) -> String {
    chrono::DateTime::from_timestamp_micros(us as i64)
        .map(|d| d.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| us.to_string())
}
