//! Tessera command-line runner.

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tessera_cli::{loader, script, Args, Command, Result};
use tessera_core::Database;

fn main() -> ExitCode {
    // Logs go to stderr; stdout carries JSON output.
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tessera=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();

    match run(args) {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(error = %e, "command failed");
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<ExitCode> {
    let command = args.command.clone();
    let config = args.into_config()?;
    let schema = loader::load_schema(&config)?;

    match command {
        Command::Lint => {
            let issues = schema.lint();
            for issue in &issues {
                println!("{}", serde_json::to_string(issue)?);
            }
            if issues.is_empty() {
                tracing::info!(version = schema.version, "schema is valid");
                Ok(ExitCode::SUCCESS)
            } else {
                tracing::warn!(issues = issues.len(), "schema has lint issues");
                Ok(ExitCode::FAILURE)
            }
        }
        Command::Run { script: path } => {
            let operations = script::load_script(&path)?;
            let database = Database::with_config(schema, config.store)?;
            tracing::info!(operations = operations.len(), "running script");

            let outcomes = script::run_script(&database, operations);
            let failed = outcomes.iter().filter(|o| !o.ok).count();
            for outcome in &outcomes {
                println!("{}", serde_json::to_string(outcome)?);
            }
            tracing::info!(total = outcomes.len(), failed, "script finished");
            Ok(ExitCode::SUCCESS)
        }
    }
}
