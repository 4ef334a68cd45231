//! swiftpub - Swift package registry publishing
#![allow(missing_docs)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::doc_markdown)]
//!
//! Runs the `swift-pm` release plugin from the command line.
//!
//! # Overview
//!
//! A release host drives the plugin through [`Commands::Execute`]: it writes
//! an execute request as JSON to stdin and reads the response from stdout.
//! The remaining commands are for humans: check a configuration, build the
//! source archive locally, list what a registry already has.
//!
//! Logs go to stderr (filter with `RUST_LOG`), so stdout only ever carries
//! protocol JSON or command output.

pub mod cmd;
pub mod config_file;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "swiftpub")]
#[command(author, version, about = "swiftpub - publish Swift packages to a package registry")]
pub struct Cli {
    /// Skip every side effect (builds, uploads, tags, manifest edits)
    #[arg(long, global = true)]
    pub dry_run: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Print plugin metadata as JSON
    Info,
    /// Check a plugin configuration file (JSON or TOML)
    Validate {
        /// Configuration file
        #[arg(long, short)]
        config: PathBuf,
    },
    /// Execute a hook request read as JSON; the response is written to stdout
    Execute {
        /// Request file, or `-` for stdin
        #[arg(long, short, default_value = "-")]
        request: PathBuf,
    },
    /// Run one hook with a configuration file
    Run {
        /// Hook name (pre-publish, post-publish)
        hook: String,
        /// Version being released
        #[arg(long)]
        version: String,
        /// Configuration file (JSON or TOML)
        #[arg(long, short)]
        config: Option<PathBuf>,
    },
    /// Build the source archive without publishing it
    Archive {
        /// Package root
        #[arg(long, default_value = ".")]
        path: PathBuf,
        /// Version recorded for the archive
        #[arg(long, default_value = "0.0.0")]
        version: String,
        /// Where to write the archive
        #[arg(long, short)]
        output: PathBuf,
        /// Exclusion pattern (repeatable); replaces the default list
        #[arg(long = "exclude", short = 'x')]
        exclude: Vec<String>,
        /// Print every archived path
        #[arg(long)]
        list: bool,
    },
    /// List releases of a package in the registry
    Releases {
        /// Registry scope
        scope: String,
        /// Package name
        name: String,
        /// Registry base URL
        #[arg(
            long,
            env = "SWIFT_REGISTRY_URL",
            default_value = swiftpub_core::config::DEFAULT_REGISTRY
        )]
        registry: String,
        /// Registry token
        #[arg(long, env = "SWIFT_REGISTRY_TOKEN", hide_env_values = true, default_value = "")]
        token: String,
    },
    /// Compute SHA256 checksum of a file (as sent in the `Digest` header)
    #[command(hide = true)]
    Checksum {
        /// Files to hash
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: clap_complete::Shell,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn archive_excludes_are_repeatable() {
        let cli = Cli::parse_from([
            "swiftpub", "archive", "--output", "out.zip", "-x", "Docs/", "--exclude", "*.md",
        ]);
        match cli.command {
            Commands::Archive { exclude, path, .. } => {
                assert_eq!(exclude, vec!["Docs/", "*.md"]);
                assert_eq!(path, PathBuf::from("."));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn dry_run_is_global() {
        let cli = Cli::parse_from([
            "swiftpub",
            "run",
            "post-publish",
            "--version",
            "1.0.0",
            "--dry-run",
        ]);
        assert!(cli.dry_run);
    }
}
