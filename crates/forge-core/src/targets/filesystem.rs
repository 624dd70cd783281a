//! Local Maven-layout directory target.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use forge_schema::ContentHash;
use serde::Deserialize;
use tracing::{debug, warn};

use super::{Outcome, PublicationTarget, checksum_line, classify_io, resolve_path, settings, write_atomic};
use crate::bundle::{Bundle, BundleId};
use crate::config::TargetConfig;
use crate::error::ConfigError;

pub const KIND: &str = "filesystem";

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct FilesystemSettings {
    root: PathBuf,
}

/// Writes `<root>/<group path>/<artifactId>/<version>/<artifactId>-<version>.jar`
/// and a `.sha256` sidecar next to it.
#[derive(Debug, Clone)]
pub struct FilesystemTarget {
    name: String,
    root: PathBuf,
}

impl FilesystemTarget {
    pub fn new(name: &str, root: impl Into<PathBuf>) -> Self {
        Self {
            name: name.to_string(),
            root: root.into(),
        }
    }

    /// Build from a `[[targets]]` entry with `kind = "filesystem"`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidTarget`] if `root` is missing.
    pub fn from_config(config: &TargetConfig) -> Result<Self, ConfigError> {
        let settings: FilesystemSettings = settings(config)?;
        Ok(Self::new(&config.name, resolve_path(config, &settings.root)))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Where `artifact` lands under the root.
    pub fn path_for(&self, artifact: &BundleId) -> PathBuf {
        self.root
            .join(artifact.repository_dir())
            .join(artifact.file_name())
    }
}

#[derive(Debug)]
enum WriteError {
    Io(&'static str, std::io::Error),
    Mismatch { expected: ContentHash, actual: ContentHash },
}

fn write_verified(dest: &Path, archive: &Bytes, digest: &ContentHash) -> Result<(), WriteError> {
    write_atomic(dest, archive).map_err(|e| WriteError::Io("write archive", e))?;

    let written = std::fs::read(dest).map_err(|e| WriteError::Io("read back archive", e))?;
    let actual = ContentHash::compute(&written);
    if actual != *digest {
        return Err(WriteError::Mismatch {
            expected: digest.clone(),
            actual,
        });
    }

    let file_name = dest
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mut sidecar = dest.as_os_str().to_owned();
    sidecar.push(".sha256");
    write_atomic(Path::new(&sidecar), checksum_line(digest, &file_name).as_bytes())
        .map_err(|e| WriteError::Io("write checksum", e))?;
    Ok(())
}

#[async_trait]
impl PublicationTarget for FilesystemTarget {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> &'static str {
        KIND
    }

    async fn accepts(&self, bundle: &Bundle) -> Outcome {
        if let Err(e) = bundle.id().validate() {
            return Outcome::Fatal(e.to_string());
        }
        let dest = self.path_for(bundle.id());
        let archive = bundle.archive().clone();
        let digest = bundle.digest().clone();
        debug!(target = %self.name, path = %dest.display(), "writing bundle");

        let written =
            tokio::task::spawn_blocking(move || write_verified(&dest, &archive, &digest)).await;
        match written {
            Ok(Ok(())) => Outcome::Success,
            Ok(Err(WriteError::Io(context, e))) => classify_io(context, &e),
            Ok(Err(WriteError::Mismatch { expected, actual })) => Outcome::Fatal(format!(
                "written archive does not verify: expected {expected}, got {actual}"
            )),
            Err(e) => Outcome::Fatal(format!("writer task failed: {e}")),
        }
    }

    async fn current_content_hash(&self, artifact: &BundleId) -> Option<ContentHash> {
        artifact.validate().ok()?;
        let path = self.path_for(artifact);
        match tokio::fs::read(&path).await {
            Ok(data) => Some(ContentHash::compute(&data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => {
                warn!(target = %self.name, path = %path.display(), error = %e, "cannot read existing bundle");
                None
            }
        }
    }
}
