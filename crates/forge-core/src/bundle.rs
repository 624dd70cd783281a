//! Assembled bundles.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use forge_schema::{ContentHash, ResolvedManifest, VariantName};
use tempfile::NamedTempFile;
use thiserror::Error;

/// A coordinate that cannot be used as a repository path or URL segment.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid {field} '{value}': {reason}")]
pub struct CoordinateError {
    pub field: &'static str,
    pub value: String,
    pub reason: &'static str,
}

/// Maven coordinates of one bundle.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BundleId {
    pub group: Option<String>,
    pub artifact_id: String,
    pub version: String,
}

impl BundleId {
    pub fn new(group: Option<&str>, artifact_id: &str, version: &str) -> Self {
        Self {
            group: group.map(str::to_string),
            artifact_id: artifact_id.to_string(),
            version: version.to_string(),
        }
    }

    /// Check that every coordinate is a plain path segment.
    ///
    /// The group may contain `.` separators (each part becomes a directory);
    /// no field may contain path separators or `.`/`..` segments.
    ///
    /// # Errors
    ///
    /// Returns the first offending field as a [`CoordinateError`].
    pub fn validate(&self) -> Result<(), CoordinateError> {
        if let Some(group) = &self.group {
            for part in group.split('.') {
                check_segment("group", group, part)?;
            }
        }
        check_segment("artifactId", &self.artifact_id, &self.artifact_id)?;
        check_segment("version", &self.version, &self.version)
    }

    /// `<artifactId>-<version>.jar`
    pub fn file_name(&self) -> String {
        format!("{}-{}.jar", self.artifact_id, self.version)
    }

    /// Maven 2 layout directory: `<group path>/<artifactId>/<version>`.
    pub fn repository_dir(&self) -> String {
        match &self.group {
            Some(group) => format!(
                "{}/{}/{}",
                group.replace('.', "/"),
                self.artifact_id,
                self.version
            ),
            None => format!("{}/{}", self.artifact_id, self.version),
        }
    }
}

fn check_segment(field: &'static str, value: &str, segment: &str) -> Result<(), CoordinateError> {
    let reason = if segment.is_empty() {
        "empty segment"
    } else if segment == "." || segment == ".." {
        "relative path segment"
    } else if !segment
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '+'))
    {
        "use letters, digits, '-', '_', '.' or '+'"
    } else {
        return Ok(());
    };
    Err(CoordinateError {
        field,
        value: value.to_string(),
        reason,
    })
}

impl std::fmt::Display for BundleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.group {
            Some(group) => write!(f, "{group}:{}:{}", self.artifact_id, self.version),
            None => write!(f, "{}:{}", self.artifact_id, self.version),
        }
    }
}

/// A finished, immutable archive for one variant.
///
/// `contents` describes exactly what the archive holds (after transforms and
/// including the generated `META-INF/MANIFEST.MF`), and `digest` is the
/// SHA256 of the archive bytes.
#[derive(Debug, Clone)]
pub struct Bundle {
    id: BundleId,
    variant: VariantName,
    contents: Arc<ResolvedManifest>,
    archive: Bytes,
    digest: ContentHash,
    produced_at: DateTime<Utc>,
}

impl Bundle {
    pub(crate) fn new(
        id: BundleId,
        variant: VariantName,
        contents: ResolvedManifest,
        archive: Bytes,
    ) -> Self {
        let digest = ContentHash::compute(&archive);
        Self {
            id,
            variant,
            contents: Arc::new(contents),
            archive,
            digest,
            produced_at: Utc::now(),
        }
    }

    pub fn id(&self) -> &BundleId {
        &self.id
    }

    pub fn group(&self) -> Option<&str> {
        self.id.group.as_deref()
    }

    pub fn artifact_id(&self) -> &str {
        &self.id.artifact_id
    }

    pub fn version(&self) -> &str {
        &self.id.version
    }

    pub fn variant(&self) -> &VariantName {
        &self.variant
    }

    pub fn contents(&self) -> &ResolvedManifest {
        &self.contents
    }

    /// The archive bytes (cheap to clone).
    pub fn archive(&self) -> &Bytes {
        &self.archive
    }

    pub fn digest(&self) -> &ContentHash {
        &self.digest
    }

    pub fn produced_at(&self) -> DateTime<Utc> {
        self.produced_at
    }

    pub fn size(&self) -> u64 {
        self.archive.len() as u64
    }

    pub fn file_name(&self) -> String {
        self.id.file_name()
    }

    /// Write the archive into `dir` as [`Bundle::file_name`].
    ///
    /// The bytes go to a temporary file in `dir` first and are renamed into
    /// place, so a partially written archive is never visible.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the directory cannot be created or written.
    pub fn write_to(&self, dir: &Path) -> std::io::Result<PathBuf> {
        std::fs::create_dir_all(dir)?;
        let dest = dir.join(self.file_name());
        let mut tmp = NamedTempFile::new_in(dir)?;
        tmp.write_all(&self.archive)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&dest).map_err(|e| e.error)?;
        Ok(dest)
    }
}
