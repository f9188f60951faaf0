use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::json;

use crate::collaborators::Collaborators;
use crate::config::EngineConfig;
use crate::parser::OpKind;
use crate::service::{Engine, EngineReply, EngineRequest};

#[derive(Parser)]
#[command(name = "tempo")]
#[command(about = "Tempo - a resumable automation-script engine", long_about = None)]
pub struct Cli {
    /// Path to config file (overrides default search)
    #[arg(long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Parse and validate a script without running it
    Check {
        /// Script file to check
        script: PathBuf,
    },

    /// Print the parsed steps of a script
    Show {
        /// Script file to show
        script: PathBuf,
    },

    /// Run a script, answering input suspensions from stdin
    Run {
        /// Script file to run
        script: PathBuf,

        /// Initial input data as a JSON object
        #[arg(long)]
        input: Option<String>,
    },
}

pub async fn run_cli() -> Result<()> {
    let cli = Cli::parse();
    let config = EngineConfig::load(cli.config.as_deref()).unwrap_or_default();

    match cli.command {
        Commands::Check { script } => check(&script),
        Commands::Show { script } => show(&script),
        Commands::Run { script, input } => run(&config, &script, input).await,
    }
}

fn check(script: &PathBuf) -> Result<()> {
    let source = std::fs::read_to_string(script)
        .with_context(|| format!("failed to read {}", script.display()))?;

    match crate::parser::parse(&source) {
        Ok(program) => {
            println!("ok: {} steps", program.len());
            Ok(())
        }
        Err(e) => anyhow::bail!("{}", e),
    }
}

fn show(script: &PathBuf) -> Result<()> {
    let source = std::fs::read_to_string(script)
        .with_context(|| format!("failed to read {}", script.display()))?;
    let program = crate::parser::parse(&source).map_err(|e| anyhow::anyhow!("{}", e))?;

    for (index, step) in program.steps.iter().enumerate() {
        let target = step
            .result_var
            .as_deref()
            .map(|v| format!("{} = ", v))
            .unwrap_or_default();
        println!("{:>3}  {}{}(...)", index, target, step.op.name());
    }
    Ok(())
}

async fn run(config: &EngineConfig, script: &PathBuf, input: Option<String>) -> Result<()> {
    let source = std::fs::read_to_string(script)
        .with_context(|| format!("failed to read {}", script.display()))?;

    let engine = Engine::new(Collaborators::local());
    if let Some(dir) = &config.program_dir {
        engine.programs().load_dir(dir)?;
    }

    let name = script
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("main");
    engine
        .programs()
        .register(name, &source)
        .map_err(|e| anyhow::anyhow!("{}", e))?;

    let initial = input
        .map(|text| serde_json::from_str(&text).context("initial input is not valid JSON"))
        .transpose()?;

    let mut request = EngineRequest {
        execution_id: None,
        program: Some(name.to_string()),
        input_data: initial,
    };

    loop {
        let reply = engine.start_or_resume(request).await?;

        match reply {
            EngineReply::Paused {
                execution_id,
                pending_operation,
                ..
            } => {
                let answer = match pending_operation.as_ref().map(|p| p.op) {
                    Some(OpKind::UserInput) | None => {
                        let target = pending_operation
                            .as_ref()
                            .map(|p| p.target.as_str())
                            .unwrap_or("input");
                        prompt(&format!("{}> ", target))?
                    }
                    // A deferred app action; ask the operator for the
                    // action result the backend would have delivered.
                    Some(_) => prompt("action result> ")?,
                };

                request = EngineRequest {
                    execution_id: Some(execution_id),
                    program: None,
                    input_data: Some(json!({ "input": answer })),
                };
            }

            EngineReply::Completed {
                result,
                steps_completed,
                ..
            } => {
                println!("{}", serde_json::to_string_pretty(&result)?);
                eprintln!("completed in {} steps", steps_completed);
                return Ok(());
            }

            EngineReply::Failed { error, .. } => {
                anyhow::bail!("run failed: {}", error);
            }
        }
    }
}

fn prompt(label: &str) -> Result<String> {
    print!("{}", label);
    std::io::stdout().flush()?;

    let mut line = String::new();
    std::io::stdin().read_line(&mut line)?;
    Ok(line.trim_end().to_string())
}
