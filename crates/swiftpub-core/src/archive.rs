//! Source archive creation.
//!
//! Walks the package root, applies the exclusion rules from [`crate::exclude`],
//! and writes a deflate-compressed zip to a temporary file. The SHA-256 is
//! computed over the finished file, re-read from disk, so the digest always
//! describes the exact bytes that will be uploaded.
//!
//! The returned [`ArchiveArtifact`] owns its temporary file: dropping it
//! deletes the archive, whether the publish succeeded, failed or was
//! cancelled.

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use swiftpub_schema::Sha256Digest;
use tempfile::TempPath;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipWriter};

use crate::exclude::ExcludeSet;

/// Patterns excluded when the configuration gives none.
pub const DEFAULT_EXCLUDES: [&str; 4] = [".git", ".build", "Tests", "*.xcodeproj"];

#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("IO error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to walk source tree: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("Failed to write archive: {0}")]
    Write(#[from] zip::result::ZipError),

    #[error("Path is not valid UTF-8: {}", .0.display())]
    NonUtf8Path(PathBuf),

    #[error("Archive creation cancelled")]
    Cancelled,

    #[error("Archive task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl ArchiveError {
    fn io(path: &Path, source: io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Archive options from the `archive` configuration block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveOptions {
    /// Accepted for compatibility; does not change the archive contents.
    pub include_docs: bool,
    /// Exclusion patterns, see [`crate::exclude`].
    pub exclude: Vec<String>,
}

impl Default for ArchiveOptions {
    fn default() -> Self {
        Self {
            include_docs: true,
            exclude: DEFAULT_EXCLUDES.iter().map(|s| (*s).to_string()).collect(),
        }
    }
}

/// A finished source archive and its digest.
#[derive(Debug)]
pub struct ArchiveArtifact {
    path: TempPath,
    digest: Sha256Digest,
    size: u64,
    entries: Vec<String>,
}

impl ArchiveArtifact {
    /// Location of the zip on disk.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Lowercase hex SHA-256 of the whole file.
    pub fn digest(&self) -> &Sha256Digest {
        &self.digest
    }

    /// File size in bytes.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Member names in the order they were written.
    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    /// Move the archive to `dest` instead of deleting it on drop.
    ///
    /// Falls back to copy when `dest` is on another filesystem.
    ///
    /// # Errors
    ///
    /// Returns an error if the file can be neither renamed nor copied.
    pub fn persist(self, dest: &Path) -> Result<Sha256Digest, ArchiveError> {
        let digest = self.digest;
        match self.path.persist(dest) {
            Ok(()) => Ok(digest),
            Err(e) => {
                // `e.path` still owns the temp file and removes it when dropped.
                std::fs::copy(&e.path, dest).map_err(|err| ArchiveError::io(dest, err))?;
                Ok(digest)
            }
        }
    }
}

/// Builds the source archive for one release.
#[derive(Debug, Clone)]
pub struct ArchiveBuilder {
    source_root: PathBuf,
    version: String,
    options: ArchiveOptions,
}

impl ArchiveBuilder {
    pub fn new(
        source_root: impl Into<PathBuf>,
        version: impl Into<String>,
        options: ArchiveOptions,
    ) -> Self {
        Self {
            source_root: source_root.into(),
            version: version.into(),
            options,
        }
    }

    /// Walk the tree, write the zip, and digest it.
    ///
    /// Blocking. `cancel` is checked before every entry; on any error the
    /// partial archive is removed.
    ///
    /// # Errors
    ///
    /// Returns [`ArchiveError`] on filesystem, traversal or zip failures, or
    /// [`ArchiveError::Cancelled`] if `cancel` fires.
    pub fn build(&self, cancel: &CancellationToken) -> Result<ArchiveArtifact, ArchiveError> {
        let root = self.source_root.as_path();
        let excludes = ExcludeSet::new(&self.options.exclude);

        debug!(
            root = %root.display(),
            version = %self.version,
            patterns = excludes.len(),
            include_docs = self.options.include_docs,
            "Creating source archive"
        );

        let tmp = tempfile::Builder::new()
            .prefix("swift-package-")
            .suffix(".zip")
            .tempfile()
            .map_err(|e| ArchiveError::io(&std::env::temp_dir(), e))?;
        let (file, path) = tmp.into_parts();

        let mut zip = ZipWriter::new(file);
        let mut entries = Vec::new();

        let walker = WalkDir::new(root)
            .min_depth(1)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| {
                let rel = relative_name(root, entry.path());
                let excluded = excludes.is_excluded(&rel);
                if excluded {
                    trace!(path = %rel, "excluded");
                }
                !excluded
            });

        for entry in walker {
            if cancel.is_cancelled() {
                return Err(ArchiveError::Cancelled);
            }

            let entry = entry?;
            let file_type = entry.file_type();
            if file_type.is_dir() {
                continue;
            }
            if !file_type.is_file() {
                warn!(path = %entry.path().display(), "Skipping non-regular file");
                continue;
            }

            let name = entry
                .path()
                .strip_prefix(root)
                .ok()
                .and_then(posix_name)
                .ok_or_else(|| ArchiveError::NonUtf8Path(entry.path().to_path_buf()))?;

            add_file(&mut zip, entry.path(), &name)?;
            entries.push(name);
        }

        let file = zip.finish()?;
        drop(file);

        let (digest, size) = digest_file(&path)?;

        info!(
            entries = entries.len(),
            size,
            checksum = %digest,
            "Archive created"
        );

        Ok(ArchiveArtifact {
            path,
            digest,
            size,
            entries,
        })
    }

    /// Run [`ArchiveBuilder::build`] on the blocking thread pool.
    ///
    /// # Errors
    ///
    /// Same as [`ArchiveBuilder::build`], plus [`ArchiveError::Task`] if the
    /// worker panics.
    pub async fn build_async(
        self,
        cancel: CancellationToken,
    ) -> Result<ArchiveArtifact, ArchiveError> {
        tokio::task::spawn_blocking(move || self.build(&cancel)).await?
    }
}

/// Size in bytes of an archive on disk.
///
/// # Errors
///
/// Returns the underlying IO error if the file cannot be stat'ed.
pub fn archive_size(path: &Path) -> io::Result<u64> {
    Ok(std::fs::metadata(path)?.len())
}

fn add_file(zip: &mut ZipWriter<File>, path: &Path, name: &str) -> Result<(), ArchiveError> {
    let mut src = File::open(path).map_err(|e| ArchiveError::io(path, e))?;
    let metadata = src.metadata().map_err(|e| ArchiveError::io(path, e))?;

    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .last_modified_time(DateTime::default())
        .unix_permissions(file_mode(&metadata));

    zip.start_file(name, options)?;
    io::copy(&mut src, zip).map_err(|e| ArchiveError::io(path, e))?;
    trace!(entry = name, bytes = metadata.len(), "added");
    Ok(())
}

/// Stream a file through SHA-256; returns the digest and the byte count.
///
/// # Errors
///
/// Returns the underlying IO error if the file cannot be read.
pub fn file_checksum(path: &Path) -> io::Result<(Sha256Digest, u64)> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let size = io::copy(&mut file, &mut hasher)?;
    Ok((Sha256Digest::from_hasher(hasher), size))
}

fn digest_file(path: &Path) -> Result<(Sha256Digest, u64), ArchiveError> {
    file_checksum(path).map_err(|e| ArchiveError::io(path, e))
}

#[cfg(unix)]
fn file_mode(metadata: &std::fs::Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & 0o7777
}

#[cfg(not(unix))]
fn file_mode(metadata: &std::fs::Metadata) -> u32 {
    if metadata.permissions().readonly() {
        0o444
    } else {
        0o644
    }
}

/// Relative path with `/` separators, lossy for matching only.
fn relative_name(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Archive member name: `/`-joined components, `None` for non-UTF-8 paths.
fn posix_name(rel: &Path) -> Option<String> {
    let parts = rel
        .components()
        .map(|c| c.as_os_str().to_str())
        .collect::<Option<Vec<_>>>()?;
    Some(parts.join("/"))
}
