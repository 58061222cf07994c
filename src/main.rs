use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use studybuddy_conductor::agents::{render_plan, PlannerAgent};
use studybuddy_conductor::config::Config;
use studybuddy_conductor::interaction_log::{InteractionLogger, DEFAULT_LOG_PATH};
use studybuddy_conductor::llm::{LLMProviderConfig, LLM};
use studybuddy_conductor::models::{PlanPreferences, StudyPlan};
use studybuddy_conductor::types::AppError;
use studybuddy_conductor::utils::{init_logger, truncate_chars};
use studybuddy_conductor::workflow::{Conductor, StepStatus, WorkflowOutcome, WorkflowRequest};
use tracing::{info, warn};

/// StudyBuddy workflow conductor
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Route one query through the workflow and print the answer
    Ask {
        /// The question or request
        query: String,

        /// Restrict document retrieval to one document
        #[arg(long)]
        doc_id: Option<String>,

        /// Preferred plan difficulty (e.g. Beginner)
        #[arg(long)]
        difficulty: Option<String>,

        /// Preferred plan duration (e.g. "4 weeks")
        #[arg(long)]
        duration: Option<String>,

        /// Print the full outcome as JSON
        #[arg(long)]
        json: bool,
    },

    /// Refine a saved study plan
    Refine {
        /// Plan JSON file, as printed by `ask --json`
        #[arg(long)]
        plan: PathBuf,

        /// What to change
        request: String,
    },

    /// Show recent interactions
    Logs {
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::from_env()?;
    let _log_guard = init_logger(config.logging.log_dir.as_deref());

    let log_path = config
        .logging
        .interaction_log_path
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_PATH));
    let logger = InteractionLogger::new(log_path);

    match cli.command {
        Command::Ask {
            query,
            doc_id,
            difficulty,
            duration,
            json,
        } => {
            info!(provider = %config.llm.provider, model = %config.llm.model, "Configuration loaded");
            let conductor = Conductor::from_config(&config);

            let mut request = WorkflowRequest::new(query);
            if let Some(doc_id) = doc_id {
                request = request.with_doc_id(doc_id);
            }
            let preferences = PlanPreferences {
                difficulty,
                duration,
                style: None,
            };
            if !preferences.is_empty() {
                request = request.with_preferences(preferences);
            }

            let outcome = conductor.run_request(request).await;
            logger.log(&outcome).await;

            if json {
                println!("{}", serde_json::to_string_pretty(&outcome)?);
            } else {
                print_outcome(&outcome);
            }

            if !outcome.success {
                anyhow::bail!(
                    "workflow did not start: {}",
                    outcome.error.clone().unwrap_or_default()
                );
            }
        }

        Command::Refine { plan, request } => {
            let raw = tokio::fs::read_to_string(&plan)
                .await
                .with_context(|| format!("reading {}", plan.display()))?;
            let current = read_plan(&raw).with_context(|| format!("parsing {}", plan.display()))?;

            let llm = LLM::new(LLMProviderConfig::from_config(&config.llm), config.llm.model.clone())?
                .with_temperature(config.llm.planner_temperature)
                .with_max_tokens(config.llm.planner_max_tokens);
            let planner = PlannerAgent::new(std::sync::Arc::new(llm), config.workflow.context_limit);

            match planner.refine_plan(&current, &request).await {
                Ok(refined) => {
                    println!("{}", serde_json::to_string_pretty(&refined)?);
                    eprintln!("\n{}", render_plan(&refined));
                }
                Err(AppError::PlanParse { reason, .. }) => {
                    warn!(reason = %reason, "Refined plan was not valid JSON, keeping the original");
                    println!("{}", serde_json::to_string_pretty(&current)?);
                }
                Err(e) => return Err(e.into()),
            }
        }

        Command::Logs { limit } => {
            let entries = logger.recent(limit).await?;
            if entries.is_empty() {
                println!("No interactions logged yet ({})", logger.path().display());
            }
            for entry in entries {
                let intent = entry.intent.map(|i| i.as_str()).unwrap_or("-");
                println!(
                    "{}  [{}] {}  ({} steps)",
                    entry.timestamp.format("%Y-%m-%d %H:%M:%S"),
                    intent,
                    truncate_chars(&entry.query, 80),
                    entry.metadata.num_agent_steps
                );
            }
        }
    }

    Ok(())
}

/// Accept either a bare plan or a full `ask --json` outcome.
fn read_plan(raw: &str) -> anyhow::Result<StudyPlan> {
    let value: serde_json::Value = serde_json::from_str(raw)?;
    if value.get("run_id").is_some() {
        let plan = value.get("plan").cloned().context("outcome has no study plan")?;
        return Ok(serde_json::from_value(plan)?);
    }
    Ok(serde_json::from_value(value)?)
}

fn print_outcome(outcome: &WorkflowOutcome) {
    println!("{}\n", outcome.response);

    if !outcome.sources.is_empty() {
        println!("Sources:");
        for source in &outcome.sources {
            let page = source
                .page
                .map(|p| p.to_string())
                .unwrap_or_else(|| "N/A".to_string());
            println!("  [{}] {}, page {} (score {:.2})", source.id, source.source, page, source.score);
        }
        if let Some(confidence) = outcome.confidence {
            println!("  confidence: {:.1}%", confidence);
        }
        println!();
    }

    println!("Steps:");
    for step in &outcome.steps {
        let marker = match step.status {
            StepStatus::Completed if step.is_skipped() => "-",
            StepStatus::Completed => "✓",
            StepStatus::Error => "✗",
            StepStatus::Running => "…",
        };
        println!("  {} {:<18} {}", marker, step.step.as_str(), step.result);
    }

    if !outcome.degradations.is_empty() {
        let notes: Vec<_> = outcome.degradations.iter().map(|d| d.as_str()).collect();
        println!("\nDegraded: {}", notes.join(", "));
    }

    if let Some(error) = &outcome.error {
        println!("\nError: {}", error);
    }
}
