//! Text-level edits to `Package.swift`.
//!
//! The manifest is Swift source, so it is never parsed structurally here.
//! Two anchored regex operations cover what publishing needs: rewriting a
//! version string constant, and reading the `swift-tools-version` directive.
//! Both work on raw bytes so everything outside the match survives untouched.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::bytes::{Captures, Regex};
use thiserror::Error;
use tracing::{debug, warn};

static TOOLS_VERSION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"//\s*swift-tools-version:\s*(\d+\.\d+(?:\.\d+)?)").expect("static regex")
});

#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("Failed to access {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{what} not found in {}", path.display())]
    NotFound { what: String, path: PathBuf },
}

impl ManifestError {
    fn io(path: &Path, source: io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Rewrite `let <constant> = "<old>"` (optionally `: String`) to `new_version`.
///
/// Every matching declaration is rewritten; more than one match is logged as
/// a warning because the manifest most likely shadows the constant. Returns
/// the number of declarations rewritten. The file is replaced via a sibling
/// temp file and rename; there is no protection against concurrent writers.
///
/// # Errors
///
/// Returns [`ManifestError::NotFound`] (leaving the file untouched) if no
/// declaration matches, or [`ManifestError::Io`] on read/write failure.
pub fn update_version_constant(
    path: &Path,
    constant: &str,
    new_version: &str,
) -> Result<usize, ManifestError> {
    let content = fs::read(path).map_err(|e| ManifestError::io(path, e))?;

    let (updated, count) = rewrite_version_constant(&content, constant, new_version);
    if count == 0 {
        return Err(ManifestError::NotFound {
            what: format!("version constant '{constant}'"),
            path: path.to_path_buf(),
        });
    }
    if count > 1 {
        warn!(
            constant,
            count,
            path = %path.display(),
            "Multiple declarations of version constant; rewriting all of them"
        );
    }

    write_replacing(path, &updated)?;
    debug!(constant, version = new_version, "Version constant updated");
    Ok(count)
}

/// Byte-level form of [`update_version_constant`]: returns the rewritten
/// content and the number of declarations that matched.
pub fn rewrite_version_constant(
    content: &[u8],
    constant: &str,
    new_version: &str,
) -> (Vec<u8>, usize) {
    let re = constant_pattern(constant);
    let count = re.find_iter(content).count();
    if count == 0 {
        return (content.to_vec(), 0);
    }

    let updated = re.replace_all(content, |caps: &Captures<'_>| {
        let mut out = caps[1].to_vec();
        out.extend_from_slice(new_version.as_bytes());
        out.extend_from_slice(&caps[3]);
        out
    });
    (updated.into_owned(), count)
}

/// Read the `// swift-tools-version:X.Y[.Z]` directive.
///
/// # Errors
///
/// Returns [`ManifestError::NotFound`] if the directive is absent, or
/// [`ManifestError::Io`] if the file cannot be read.
pub fn extract_tools_version(path: &Path) -> Result<String, ManifestError> {
    let content = fs::read(path).map_err(|e| ManifestError::io(path, e))?;
    find_tools_version(&content).ok_or_else(|| ManifestError::NotFound {
        what: "swift-tools-version".to_string(),
        path: path.to_path_buf(),
    })
}

/// Byte-level form of [`extract_tools_version`].
pub fn find_tools_version(content: &[u8]) -> Option<String> {
    TOOLS_VERSION
        .captures(content)
        .and_then(|caps| caps.get(1))
        .map(|m| String::from_utf8_lossy(m.as_bytes()).into_owned())
}

fn constant_pattern(constant: &str) -> Regex {
    let pattern = format!(
        r#"(let\s+{}\s*(?::\s*String\s*)?=\s*")([^"]+)(")"#,
        regex::escape(constant)
    );
    // The only variable part is escaped, so the pattern is always valid.
    Regex::new(&pattern).expect("escaped constant pattern")
}

fn write_replacing(path: &Path, content: &[u8]) -> Result<(), ManifestError> {
    // Replace the link target, not a symlinked Package.swift itself.
    let target = fs::canonicalize(path).map_err(|e| ManifestError::io(path, e))?;
    let permissions = fs::metadata(&target)
        .map_err(|e| ManifestError::io(path, e))?
        .permissions();

    let mut tmp_name = target.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp = PathBuf::from(tmp_name);

    let result = fs::write(&tmp, content)
        .and_then(|()| fs::set_permissions(&tmp, permissions))
        .and_then(|()| fs::rename(&tmp, &target));

    if let Err(e) = result {
        let _ = fs::remove_file(&tmp);
        return Err(ManifestError::io(path, e));
    }
    Ok(())
}
