//! Validate command

use std::path::Path;

use anyhow::{Result, bail};
use swiftpub_core::SwiftPmPlugin;

use crate::config_file::load_config;

/// Validate a configuration file and print the findings as JSON.
///
/// Fails (exit code 1) when the configuration has problems.
pub fn validate(config: &Path) -> Result<()> {
    let raw = load_config(config)?;
    let response = SwiftPmPlugin::new().validate(&raw);
    println!("{}", serde_json::to_string_pretty(&response)?);

    if !response.valid {
        bail!("{} configuration problem(s) in {}", response.errors.len(), config.display());
    }
    Ok(())
}
