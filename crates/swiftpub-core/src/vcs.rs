//! Version control side effects of a release.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use thiserror::Error;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::cancel::or_cancel;

#[derive(Error, Debug)]
pub enum VcsError {
    #[error("Failed to run git: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("git {command} failed: {output}")]
    Failed { command: String, output: String },

    #[error("git {0} cancelled")]
    Cancelled(String),
}

/// Tagging the released commit.
#[async_trait]
pub trait VersionControl: Send + Sync {
    /// Create a lightweight tag at `HEAD`.
    async fn create_tag(&self, tag: &str, cancel: &CancellationToken) -> Result<(), VcsError>;
}

/// The `git` CLI, run in the package directory.
#[derive(Debug, Clone)]
pub struct Git {
    program: OsString,
    work_dir: PathBuf,
}

impl Git {
    pub fn new(work_dir: impl Into<PathBuf>) -> Self {
        Self {
            program: OsString::from("git"),
            work_dir: work_dir.into(),
        }
    }

    pub fn with_program(mut self, program: impl Into<OsString>) -> Self {
        self.program = program.into();
        self
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    async fn run(&self, args: &[&str], cancel: &CancellationToken) -> Result<(), VcsError> {
        let command = args.join(" ");
        debug!(%command, dir = %self.work_dir.display(), "Running git");

        let child = Command::new(&self.program)
            .args(args)
            .current_dir(&self.work_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(VcsError::Spawn)?;

        let output = or_cancel(cancel, child.wait_with_output())
            .await
            .ok_or_else(|| VcsError::Cancelled(command.clone()))?
            .map_err(VcsError::Spawn)?;

        if !output.status.success() {
            // git splits diagnostics across both streams
            let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
            combined.push_str(&String::from_utf8_lossy(&output.stderr));
            return Err(VcsError::Failed {
                command,
                output: combined.trim().to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl VersionControl for Git {
    async fn create_tag(&self, tag: &str, cancel: &CancellationToken) -> Result<(), VcsError> {
        self.run(&["tag", "--", tag], cancel).await?;
        info!(tag, "Created git tag");
        Ok(())
    }
}
