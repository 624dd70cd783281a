//! Resolved manifests: the ordered, checksummed file list of one variant.

use std::borrow::Cow;
use std::collections::{BTreeMap, HashSet};

use bytes::Bytes;

use crate::hash::ContentHash;
use crate::types::{ArtifactRef, EntryPath};

/// Where the bytes of an entry came from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Origin {
    /// Read from an input artifact.
    Artifact(ArtifactRef),
    /// Synthesized during resolution (e.g. `pom.properties`).
    Generated,
}

impl std::fmt::Display for Origin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Artifact(artifact) => write!(f, "{artifact}"),
            Self::Generated => write!(f, "<generated>"),
        }
    }
}

/// One contribution to an entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntrySource {
    /// Contributing artifact.
    pub origin: Origin,
    /// Raw bytes as contributed.
    pub data: Bytes,
}

impl EntrySource {
    /// Create a source from an origin and its bytes.
    pub fn new(origin: Origin, data: impl Into<Bytes>) -> Self {
        Self {
            origin,
            data: data.into(),
        }
    }
}

/// A file in a resolved manifest.
///
/// Plain entries have exactly one source. Mergeable entries (service
/// registration files and the like) carry one source per contributing artifact,
/// in manifest order, and render as their concatenation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    path: EntryPath,
    sources: Vec<EntrySource>,
}

impl ManifestEntry {
    /// Create an entry with a single source.
    pub fn new(path: EntryPath, source: EntrySource) -> Self {
        Self {
            path,
            sources: vec![source],
        }
    }

    /// Append another contribution (mergeable entries only).
    pub fn push_source(&mut self, source: EntrySource) {
        self.sources.push(source);
    }

    /// The entry's archive path.
    pub fn path(&self) -> &EntryPath {
        &self.path
    }

    /// All contributions in manifest order.
    pub fn sources(&self) -> &[EntrySource] {
        &self.sources
    }

    /// Whether more than one artifact contributed to this entry.
    pub fn is_merged(&self) -> bool {
        self.sources.len() > 1
    }

    /// Rendered content.
    ///
    /// A single source is returned as-is. Several sources are concatenated in
    /// order, each non-empty part terminated by a newline.
    pub fn content(&self) -> Cow<'_, [u8]> {
        match self.sources.as_slice() {
            [single] => Cow::Borrowed(&single.data),
            parts => {
                let mut out = Vec::with_capacity(parts.iter().map(|p| p.data.len() + 1).sum());
                for part in parts {
                    if part.data.is_empty() {
                        continue;
                    }
                    out.extend_from_slice(&part.data);
                    if !part.data.ends_with(b"\n") {
                        out.push(b'\n');
                    }
                }
                Cow::Owned(out)
            }
        }
    }

    /// SHA256 of the rendered content.
    pub fn hash(&self) -> ContentHash {
        ContentHash::compute(&self.content())
    }
}

/// Errors raised when a manifest's invariants do not hold.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ManifestError {
    /// Two entries share a path.
    #[error("Duplicate entry path in manifest: {0}")]
    DuplicatePath(EntryPath),
}

/// The deterministic, fully resolved contents of one variant.
///
/// Entry paths are unique, relocations are already applied, and
/// `checksums` covers exactly the entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedManifest {
    entries: Vec<ManifestEntry>,
    checksums: BTreeMap<EntryPath, ContentHash>,
    attributes: Vec<(String, String)>,
}

impl ResolvedManifest {
    /// Build a manifest, computing checksums and checking path uniqueness.
    ///
    /// # Errors
    ///
    /// Returns [`ManifestError::DuplicatePath`] if two entries share a path.
    pub fn new(
        entries: Vec<ManifestEntry>,
        attributes: Vec<(String, String)>,
    ) -> Result<Self, ManifestError> {
        let mut seen = HashSet::with_capacity(entries.len());
        for entry in &entries {
            if !seen.insert(entry.path()) {
                return Err(ManifestError::DuplicatePath(entry.path().clone()));
            }
        }

        let checksums = entries
            .iter()
            .map(|e| (e.path().clone(), e.hash()))
            .collect();

        Ok(Self {
            entries,
            checksums,
            attributes,
        })
    }

    /// Entries in manifest order.
    pub fn entries(&self) -> &[ManifestEntry] {
        &self.entries
    }

    /// Checksum per entry path.
    pub fn checksums(&self) -> &BTreeMap<EntryPath, ContentHash> {
        &self.checksums
    }

    /// Checksum of one entry.
    pub fn checksum(&self, path: &str) -> Option<&ContentHash> {
        self.checksums.get(path)
    }

    /// Resolved manifest headers, in rendering order.
    pub fn attributes(&self) -> &[(String, String)] {
        &self.attributes
    }

    /// Value of one header.
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Find an entry by path.
    pub fn get(&self, path: &str) -> Option<&ManifestEntry> {
        self.entries.iter().find(|e| e.path().as_str() == path)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the manifest has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total rendered size of all entries in bytes.
    pub fn total_size(&self) -> u64 {
        self.entries.iter().map(|e| e.content().len() as u64).sum()
    }

    /// Whether `checksums` covers exactly the entries and every digest matches.
    pub fn is_consistent(&self) -> bool {
        self.checksums.len() == self.entries.len()
            && self
                .entries
                .iter()
                .all(|e| self.checksums.get(e.path()) == Some(&e.hash()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(artifact: &str, data: &'static [u8]) -> EntrySource {
        EntrySource::new(Origin::Artifact(ArtifactRef::new(artifact)), data)
    }

    fn path(p: &str) -> EntryPath {
        EntryPath::new(p).unwrap()
    }

    #[test]
    fn merged_content_terminates_each_part() {
        let mut entry = ManifestEntry::new(
            path("META-INF/services/com.example.Spi"),
            source("a", b"com.a.Impl"),
        );
        entry.push_source(source("b", b"com.b.Impl\n"));
        entry.push_source(source("c", b""));

        assert!(entry.is_merged());
        assert_eq!(entry.content().as_ref(), b"com.a.Impl\ncom.b.Impl\n");
    }

    #[test]
    fn single_source_content_is_verbatim() {
        let entry = ManifestEntry::new(path("a.txt"), source("a", b"no newline"));
        assert_eq!(entry.content().as_ref(), b"no newline");
        assert_eq!(entry.hash(), ContentHash::compute(b"no newline"));
    }

    #[test]
    fn manifest_rejects_duplicates() {
        let entries = vec![
            ManifestEntry::new(path("a"), source("x", b"1")),
            ManifestEntry::new(path("a"), source("y", b"2")),
        ];
        assert_eq!(
            ResolvedManifest::new(entries, Vec::new()),
            Err(ManifestError::DuplicatePath(path("a")))
        );
    }

    #[test]
    fn checksums_cover_entries() {
        let entries = vec![
            ManifestEntry::new(path("a"), source("x", b"1")),
            ManifestEntry::new(path("b"), source("x", b"22")),
        ];
        let manifest = ResolvedManifest::new(
            entries,
            vec![("Manifest-Version".to_string(), "1.0".to_string())],
        )
        .unwrap();

        assert!(manifest.is_consistent());
        assert_eq!(manifest.len(), 2);
        assert_eq!(manifest.total_size(), 3);
        assert_eq!(manifest.checksum("b"), Some(&ContentHash::compute(b"22")));
        assert_eq!(manifest.attribute("Manifest-Version"), Some("1.0"));
    }
}
