//! Wrapper around the `swift` package tool.
//!
//! The hooks only need a handful of subcommands. They sit behind the
//! [`PackageTool`] trait so the orchestrator can be driven without a Swift
//! toolchain installed.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use swiftpub_schema::PackageDescription;
use thiserror::Error;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::cancel::or_cancel;

/// Default name of the toolchain driver.
pub const SWIFT: &str = "swift";

#[derive(Error, Debug)]
pub enum ToolError {
    #[error("'{0}' not found in PATH")]
    NotInstalled(String),

    #[error("Failed to run `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{}", failure_message(.command, *.code, .stderr))]
    Failed {
        command: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("{step}: {source}")]
    Step {
        step: &'static str,
        #[source]
        source: Box<ToolError>,
    },

    #[error("Failed to decode package description: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("`{0}` cancelled")]
    Cancelled(String),
}

impl ToolError {
    /// True if the command was interrupted by cancellation.
    pub fn is_cancelled(&self) -> bool {
        match self {
            Self::Cancelled(_) => true,
            Self::Step { source, .. } => source.is_cancelled(),
            _ => false,
        }
    }

    fn step(step: &'static str, source: ToolError) -> Self {
        Self::Step {
            step,
            source: Box::new(source),
        }
    }
}

fn failure_message(command: &str, code: Option<i32>, stderr: &str) -> String {
    let status = code.map_or_else(
        || "terminated by signal".to_string(),
        |c| format!("exit status {c}"),
    );
    if stderr.is_empty() {
        format!("`{command}` failed: {status}")
    } else {
        format!("{stderr} (`{command}`: {status})")
    }
}

/// Options for `swift test`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestOptions {
    /// Build configuration (`debug` or `release`); empty means the tool default.
    pub configuration: String,
    /// Pass `--enable-code-coverage`.
    pub coverage: bool,
    /// Pass `--parallel`.
    pub parallel: bool,
}

impl Default for TestOptions {
    fn default() -> Self {
        Self {
            configuration: "debug".to_string(),
            coverage: false,
            parallel: true,
        }
    }
}

impl TestOptions {
    /// Arguments for `swift test`.
    pub fn args(&self) -> Vec<String> {
        let mut args = vec!["test".to_string()];
        if !self.configuration.is_empty() {
            args.push("-c".to_string());
            args.push(self.configuration.clone());
        }
        if self.coverage {
            args.push("--enable-code-coverage".to_string());
        }
        if self.parallel {
            args.push("--parallel".to_string());
        }
        args
    }
}

/// Operations the hooks need from the package tool.
#[async_trait]
pub trait PackageTool: Send + Sync {
    /// Check manifest syntax and that dependencies resolve.
    async fn validate(&self, cancel: &CancellationToken) -> Result<(), ToolError>;

    /// Build the package, optionally in a named configuration.
    async fn build(
        &self,
        configuration: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<(), ToolError>;

    /// Run the test suite.
    async fn test(&self, options: &TestOptions, cancel: &CancellationToken)
    -> Result<(), ToolError>;

    /// Remove build artifacts.
    async fn clean(&self, cancel: &CancellationToken) -> Result<(), ToolError>;

    /// Toolchain version banner.
    async fn version(&self, cancel: &CancellationToken) -> Result<String, ToolError>;

    /// Machine-readable package description.
    async fn dump_package(&self, cancel: &CancellationToken)
    -> Result<PackageDescription, ToolError>;
}

/// Runs the real `swift` binary in a package directory.
#[derive(Debug, Clone)]
pub struct SwiftCli {
    program: OsString,
    work_dir: PathBuf,
}

impl SwiftCli {
    pub fn new(work_dir: impl Into<PathBuf>) -> Self {
        Self {
            program: OsString::from(SWIFT),
            work_dir: work_dir.into(),
        }
    }

    /// Use a different driver binary (a wrapper script, a pinned toolchain).
    pub fn with_program(mut self, program: impl Into<OsString>) -> Self {
        self.program = program.into();
        self
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    /// Whether the driver can be found on `PATH`.
    pub fn is_installed(&self) -> bool {
        which::which(&self.program).is_ok()
    }

    async fn run(&self, args: &[&str], cancel: &CancellationToken) -> Result<Vec<u8>, ToolError> {
        let command = format!("{} {}", self.program.to_string_lossy(), args.join(" "));
        debug!(%command, dir = %self.work_dir.display(), "Running");

        let child = Command::new(&self.program)
            .args(args)
            .current_dir(&self.work_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| {
                if source.kind() == std::io::ErrorKind::NotFound {
                    ToolError::NotInstalled(self.program.to_string_lossy().into_owned())
                } else {
                    ToolError::Spawn {
                        command: command.clone(),
                        source,
                    }
                }
            })?;

        let output = or_cancel(cancel, child.wait_with_output())
            .await
            .ok_or_else(|| ToolError::Cancelled(command.clone()))?
            .map_err(|source| ToolError::Spawn {
                command: command.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(ToolError::Failed {
                command,
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(output.stdout)
    }
}

/// Whether the default `swift` driver is on `PATH`.
pub fn swift_available() -> bool {
    which::which(SWIFT).is_ok()
}

#[async_trait]
impl PackageTool for SwiftCli {
    async fn validate(&self, cancel: &CancellationToken) -> Result<(), ToolError> {
        self.run(&["package", "dump-package"], cancel)
            .await
            .map_err(|e| ToolError::step("invalid Package.swift", e))?;
        self.run(&["package", "resolve"], cancel)
            .await
            .map_err(|e| ToolError::step("failed to resolve dependencies", e))?;
        Ok(())
    }

    async fn build(
        &self,
        configuration: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<(), ToolError> {
        let mut args = vec!["build"];
        if let Some(conf) = configuration.filter(|c| !c.is_empty()) {
            args.extend(["-c", conf]);
        }
        self.run(&args, cancel).await.map(drop)
    }

    async fn test(
        &self,
        options: &TestOptions,
        cancel: &CancellationToken,
    ) -> Result<(), ToolError> {
        let owned = options.args();
        let args: Vec<&str> = owned.iter().map(String::as_str).collect();
        self.run(&args, cancel).await.map(drop)
    }

    async fn clean(&self, cancel: &CancellationToken) -> Result<(), ToolError> {
        self.run(&["package", "clean"], cancel).await.map(drop)
    }

    async fn version(&self, cancel: &CancellationToken) -> Result<String, ToolError> {
        let out = self.run(&["--version"], cancel).await?;
        Ok(String::from_utf8_lossy(&out).trim().to_string())
    }

    async fn dump_package(
        &self,
        cancel: &CancellationToken,
    ) -> Result<PackageDescription, ToolError> {
        let out = self.run(&["package", "dump-package"], cancel).await?;
        Ok(serde_json::from_slice(&out)?)
    }
}
