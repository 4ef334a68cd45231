//! Checksum command

use std::path::PathBuf;

use anyhow::{Context, Result};
use swiftpub_core::archive::file_checksum;

/// Print the SHA-256 of each file, `sha256sum` style
pub fn checksum(files: &[PathBuf]) -> Result<()> {
    for file in files {
        let (digest, _) = file_checksum(file)
            .with_context(|| format!("Failed to hash {}", file.display()))?;
        println!("{digest}  {}", file.display());
    }
    Ok(())
}
