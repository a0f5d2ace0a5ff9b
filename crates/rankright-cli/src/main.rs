mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

use rankright_runtime::{AppError, GatewayError, RuntimeConfig};

use crate::cli::{Cli, Commands};

#[tokio::main]
async fn main() {
    init_tracing();

    if let Err(err) = run().await {
        error!(error = %err, "command failed");
        for cause in err.chain().skip(1) {
            error!(cause = %cause, "caused by");
        }
        if let Some(remediation) = remediation(&err) {
            eprintln!("\n{remediation}");
        }
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    let mut config = RuntimeConfig::load(&cli.config)?;
    if let Some(db) = cli.db {
        config.database_path = db;
    }

    match cli.command {
        Commands::Analyze(args) => commands::analyze(config, args).await,
        Commands::Show(args) => commands::show(&config, args),
        Commands::History(args) => commands::history(&config, args),
        Commands::Results(args) => commands::results(&config, args),
        Commands::Criteria => commands::criteria(),
        Commands::Stats(args) => commands::stats(&config, args),
        Commands::Clear(args) => commands::clear(&config, args),
        Commands::TestConnection => commands::test_connection(&config).await,
    }
}

/// Guidance for failures the user can fix outside the tool.
fn remediation(err: &anyhow::Error) -> Option<&'static str> {
    err.chain().find_map(|cause| {
        if let Some(AppError::Gateway(gateway)) = cause.downcast_ref::<AppError>() {
            return gateway.remediation();
        }
        cause
            .downcast_ref::<GatewayError>()
            .and_then(GatewayError::remediation)
    })
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
