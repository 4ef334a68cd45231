//! Releases command

use anyhow::{Context, Result};
use swiftpub_core::RegistryClient;
use tokio_util::sync::CancellationToken;

/// List published versions of `scope/name`, newest first.
pub async fn releases(
    registry: &str,
    token: &str,
    scope: &str,
    name: &str,
    cancel: &CancellationToken,
) -> Result<()> {
    let client = RegistryClient::new(registry, token)?;
    let releases = client
        .list_releases(scope, name, cancel)
        .await
        .with_context(|| format!("Failed to list releases of {scope}/{name}"))?;

    if releases.is_empty() {
        eprintln!("No releases of {scope}/{name} in {}", client.base_url());
        return Ok(());
    }
    for release in releases {
        println!("{}", release.version);
    }
    Ok(())
}
