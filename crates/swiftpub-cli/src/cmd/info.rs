//! Info command

use anyhow::Result;
use swiftpub_core::SwiftPmPlugin;

/// Print the plugin descriptor
pub fn info() -> Result<()> {
    let info = SwiftPmPlugin::new().info();
    println!("{}", serde_json::to_string_pretty(&info)?);
    Ok(())
}
