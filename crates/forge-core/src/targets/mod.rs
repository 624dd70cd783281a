//! Publication targets: where finished bundles go.
//!
//! A target performs one publication attempt per [`PublicationTarget::accepts`]
//! call and classifies the result as an [`Outcome`]. Retrying, backoff and
//! cancellation belong to the pipeline, never to the target.

pub mod filesystem;
pub mod image;
pub mod registry;
#[cfg(feature = "network")]
pub mod repository;

use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use forge_schema::ContentHash;
use serde::de::DeserializeOwned;
use tempfile::NamedTempFile;

use crate::bundle::{Bundle, BundleId};
use crate::config::TargetConfig;
use crate::error::ConfigError;

pub use filesystem::FilesystemTarget;
pub use image::ImageLayerTarget;
pub use registry::{TargetFactory, build_target, build_targets, registered_kinds};
#[cfg(feature = "network")]
pub use repository::RepositoryTarget;

/// Result of one publication attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The target now holds the bundle.
    Success,
    /// A transient failure; another attempt may succeed.
    Retryable(String),
    /// A permanent failure; retrying is pointless.
    Fatal(String),
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    /// Whether no further attempt should follow.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Retryable(_))
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::Success => None,
            Self::Retryable(reason) | Self::Fatal(reason) => Some(reason),
        }
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::Retryable(reason) => write!(f, "retryable: {reason}"),
            Self::Fatal(reason) => write!(f, "fatal: {reason}"),
        }
    }
}

/// A destination for finished bundles.
///
/// Implementations must tolerate concurrent calls for different bundles.
#[async_trait]
pub trait PublicationTarget: Send + Sync {
    /// Configured target name, unique within a run.
    fn name(&self) -> &str;

    /// Registry kind identifier (`filesystem`, `repository`, ...).
    fn kind(&self) -> &'static str;

    /// Make one attempt at publishing `bundle`.
    async fn accepts(&self, bundle: &Bundle) -> Outcome;

    /// Digest of what the target currently holds for `artifact`, if anything.
    ///
    /// Lookup failures are reported as `None`; the pipeline then simply
    /// publishes.
    async fn current_content_hash(&self, artifact: &BundleId) -> Option<ContentHash>;
}

/// Classify a local I/O failure: a misconfigured destination never fixes itself.
pub(crate) fn classify_io(context: &str, err: &std::io::Error) -> Outcome {
    use std::io::ErrorKind;

    let reason = format!("{context}: {err}");
    match err.kind() {
        ErrorKind::PermissionDenied
        | ErrorKind::NotADirectory
        | ErrorKind::IsADirectory
        | ErrorKind::AlreadyExists
        | ErrorKind::ReadOnlyFilesystem
        | ErrorKind::InvalidInput => Outcome::Fatal(reason),
        _ => Outcome::Retryable(reason),
    }
}

/// Write `data` to `dest` through a temporary file in the same directory.
pub(crate) fn write_atomic(dest: &Path, data: &[u8]) -> std::io::Result<()> {
    let dir = dest
        .parent()
        .ok_or_else(|| std::io::Error::other(format!("no parent for {}", dest.display())))?;
    std::fs::create_dir_all(dir)?;
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(data)?;
    tmp.as_file().sync_all()?;
    tmp.persist(dest).map_err(|e| e.error)?;
    Ok(())
}

/// The `.sha256` sidecar body: `<hex>  <file name>\n`.
pub(crate) fn checksum_line(digest: &ContentHash, file_name: &str) -> String {
    format!("{digest}  {file_name}\n")
}

/// Deserialize a target's settings table into its typed settings.
pub(crate) fn settings<T: DeserializeOwned>(config: &TargetConfig) -> Result<T, ConfigError> {
    toml::Value::Table(config.settings.clone())
        .try_into()
        .map_err(|e: toml::de::Error| ConfigError::target(&config.name, e.message()))
}

/// Resolve a configured path against the configuration file's directory.
pub(crate) fn resolve_path(config: &TargetConfig, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        config.base_dir.join(path)
    }
}
