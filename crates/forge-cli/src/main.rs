//! forge CLI

use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use forge_cli::cmd;
use forge_cli::{Cli, Commands};

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupted, cancelling pending publications");
            on_signal.cancel();
        }
    });

    match dispatch(cli, cancel).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            forge_cli::ui::error(&format!("{e:#}"));
            ExitCode::FAILURE
        }
    }
}

/// Run the selected command; `Ok(false)` means it ran but something failed.
async fn dispatch(cli: Cli, cancel: CancellationToken) -> Result<bool> {
    let quiet = cli.quiet;
    match cli.command {
        Commands::Resolve { variant, json } => {
            cmd::resolve::resolve(&cli.config, variant.as_deref(), json)?;
            Ok(true)
        }
        Commands::Assemble { output } => {
            cmd::assemble::assemble(&cli.config, &output, quiet).await?;
            Ok(true)
        }
        Commands::Publish {
            max_attempts,
            targets,
        } => cmd::publish::publish(&cli.config, max_attempts, &targets, quiet, cancel).await,
        Commands::Targets => {
            cmd::targets::targets();
            Ok(true)
        }
        Commands::Version {
            version,
            components,
        } => {
            cmd::version::version(&version, components)?;
            Ok(true)
        }
    }
}
