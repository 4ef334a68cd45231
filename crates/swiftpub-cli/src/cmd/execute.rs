//! Execute and run commands

use std::path::Path;

use anyhow::{Context, Result, bail};
use serde_json::Map;
use swiftpub_core::SwiftPmPlugin;
use swiftpub_schema::{ExecuteRequest, Hook, ReleaseContext};
use tokio_util::sync::CancellationToken;

use crate::config_file::{load_config, read_input};

/// Execute a JSON request from a file or stdin.
///
/// `--dry-run` on the command line is OR-ed with the request's own flag.
pub async fn execute(request: &Path, dry_run: bool, cancel: &CancellationToken) -> Result<()> {
    let text = read_input(request)?;
    let mut req: ExecuteRequest = serde_json::from_str(&text).context("Invalid execute request")?;
    req.dry_run |= dry_run;
    respond(&req, cancel).await
}

/// Build a request from command-line arguments and execute it.
pub async fn run(
    hook: &str,
    version: &str,
    config: Option<&Path>,
    dry_run: bool,
    cancel: &CancellationToken,
) -> Result<()> {
    let config = match config {
        Some(path) => load_config(path)?,
        None => Map::new(),
    };
    let req = ExecuteRequest {
        hook: Hook::from(hook),
        context: ReleaseContext {
            version: version.to_string(),
            ..ReleaseContext::default()
        },
        config,
        dry_run,
    };
    respond(&req, cancel).await
}

async fn respond(req: &ExecuteRequest, cancel: &CancellationToken) -> Result<()> {
    let response = SwiftPmPlugin::new().execute(req, cancel).await;
    println!("{}", serde_json::to_string_pretty(&response)?);

    if !response.success {
        bail!("{}", response.message);
    }
    Ok(())
}
