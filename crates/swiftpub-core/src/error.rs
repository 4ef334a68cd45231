use thiserror::Error;

use crate::archive::ArchiveError;
use crate::config::ConfigErrors;
use crate::manifest::ManifestError;
use crate::registry::RegistryError;
use crate::toolchain::ToolError;
use crate::vcs::VcsError;

/// Anything that can stop a hook.
#[derive(Error, Debug)]
pub enum PluginError {
    #[error(transparent)]
    Config(#[from] ConfigErrors),

    #[error(transparent)]
    Tool(#[from] ToolError),

    #[error(transparent)]
    Vcs(#[from] VcsError),

    #[error(transparent)]
    Archive(#[from] ArchiveError),

    #[error(transparent)]
    Manifest(#[from] ManifestError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl PluginError {
    /// True if the failure was caused by cancellation rather than by the
    /// step itself.
    pub fn is_cancelled(&self) -> bool {
        match self {
            Self::Tool(e) => e.is_cancelled(),
            Self::Vcs(VcsError::Cancelled(_))
            | Self::Archive(ArchiveError::Cancelled)
            | Self::Registry(RegistryError::Cancelled) => true,
            _ => false,
        }
    }
}

/// A [`PluginError`] labelled with the hook step that produced it.
///
/// The display form is the message reported back to the host, e.g.
/// `Build failed: error: no such module 'Foo'`.
#[derive(Error, Debug)]
#[error("{step}: {source}")]
pub struct StepError {
    pub step: &'static str,
    #[source]
    pub source: PluginError,
}

pub(crate) trait StepContext<T> {
    fn step(self, step: &'static str) -> Result<T, StepError>;
}

impl<T, E: Into<PluginError>> StepContext<T> for Result<T, E> {
    fn step(self, step: &'static str) -> Result<T, StepError> {
        self.map_err(|e| StepError {
            step,
            source: e.into(),
        })
    }
}
