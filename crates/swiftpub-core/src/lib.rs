pub mod archive;
mod cancel;
pub mod config;
pub mod error;
pub mod exclude;
pub mod manifest;
pub mod plugin;
pub mod registry;
pub mod toolchain;
pub mod vcs;

pub use archive::{ArchiveArtifact, ArchiveBuilder, ArchiveError, ArchiveOptions};
pub use config::{ConfigErrors, PluginConfig};
pub use error::{PluginError, StepError};
pub use exclude::{ExcludeSet, should_exclude};
pub use plugin::{HostToolbox, SwiftPmPlugin, Toolbox};
pub use registry::{RegistryClient, RegistryError};
pub use toolchain::{PackageTool, SwiftCli, TestOptions, ToolError};
pub use vcs::{Git, VcsError, VersionControl};

/// User Agent string for registry requests
pub const USER_AGENT: &str = concat!("swiftpub/", env!("CARGO_PKG_VERSION"));
