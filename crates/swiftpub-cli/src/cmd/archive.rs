//! Archive command

use std::path::Path;

use anyhow::{Context, Result};
use swiftpub_core::archive::{ArchiveBuilder, ArchiveOptions};
use tokio_util::sync::CancellationToken;

/// Build the source archive for `path` and write it to `output`.
pub async fn archive(
    path: &Path,
    version: &str,
    output: &Path,
    exclude: Vec<String>,
    list: bool,
    cancel: &CancellationToken,
) -> Result<()> {
    let mut options = ArchiveOptions::default();
    if !exclude.is_empty() {
        options.exclude = exclude;
    }

    let artifact = ArchiveBuilder::new(path, version, options)
        .build_async(cancel.clone())
        .await
        .with_context(|| format!("Failed to archive {}", path.display()))?;

    if list {
        for entry in artifact.entries() {
            println!("{entry}");
        }
    }
    let entries = artifact.entries().len();
    let size = artifact.size();

    let digest = artifact
        .persist(output)
        .with_context(|| format!("Failed to write {}", output.display()))?;

    println!("{digest}  {}", output.display());
    eprintln!("{entries} files, {size} bytes");
    Ok(())
}
