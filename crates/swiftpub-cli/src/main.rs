//! swiftpub - Swift package registry publishing CLI

use anyhow::Result;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use swiftpub_cli::cmd;
use swiftpub_cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    // stdout carries protocol JSON, so logs go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let dry_run = cli.dry_run;

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted; cancelling");
            trigger.cancel();
        }
    });

    match cli.command {
        Commands::Info => cmd::info::info(),
        Commands::Validate { config } => cmd::validate::validate(&config),
        Commands::Execute { request } => cmd::execute::execute(&request, dry_run, &cancel).await,
        Commands::Run {
            hook,
            version,
            config,
        } => cmd::execute::run(&hook, &version, config.as_deref(), dry_run, &cancel).await,
        Commands::Archive {
            path,
            version,
            output,
            exclude,
            list,
        } => cmd::archive::archive(&path, &version, &output, exclude, list, &cancel).await,
        Commands::Releases {
            scope,
            name,
            registry,
            token,
        } => cmd::releases::releases(&registry, &token, &scope, &name, &cancel).await,
        Commands::Checksum { files } => cmd::checksum::checksum(&files),
        Commands::Completions { shell } => {
            cmd::completions::completions(shell);
            Ok(())
        }
    }
}
