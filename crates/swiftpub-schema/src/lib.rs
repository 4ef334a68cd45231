//! Shared types for swiftpub.
//!
//! Holds the data exchanged between the publishing core, the CLI and the
//! host pipeline: content digests, registry release records, the package
//! description dumped by the toolchain, and the plugin request/response
//! protocol.

pub mod hash;
pub mod package;
pub mod protocol;
pub mod release;

// Re-exports
pub use hash::*;
pub use package::{Dependency, PackageDescription, Platform, Product, Target};
pub use protocol::*;
pub use release::Release;

/// Media type of a source archive upload.
pub const ARCHIVE_CONTENT_TYPE: &str = "application/zip";

/// Conventional manifest filename.
pub const MANIFEST_FILE: &str = "Package.swift";
