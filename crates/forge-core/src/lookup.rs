//! Artifact lookup: turning an [`ArtifactRef`] into the files it contains.
//!
//! The host build normally resolves artifacts; this module defines the seam
//! ([`ArtifactLookup`]) and two implementations: [`DirectoryLookup`] for
//! artifacts laid out on disk (exploded directories or `.jar`/`.zip` files)
//! and [`MemoryLookup`] for embedding and tests.

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use forge_schema::ArtifactRef;
use thiserror::Error;
use tracing::debug;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum LookupError {
    #[error("artifact not found: {0}")]
    NotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("Directory walk failed: {0}")]
    Walk(#[from] walkdir::Error),
}

/// The files of one artifact, ordered by path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileSet {
    files: Vec<(String, Bytes)>,
}

impl FileSet {
    /// Build a file set; files are sorted by path so lookups are deterministic.
    pub fn from_files<I, P, B>(files: I) -> Self
    where
        I: IntoIterator<Item = (P, B)>,
        P: Into<String>,
        B: Into<Bytes>,
    {
        let mut files: Vec<(String, Bytes)> = files
            .into_iter()
            .map(|(p, b)| (p.into(), b.into()))
            .collect();
        files.sort_by(|a, b| a.0.cmp(&b.0));
        Self { files }
    }

    /// Files in path order.
    pub fn files(&self) -> &[(String, Bytes)] {
        &self.files
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// Resolves artifact references to file sets.
///
/// Implementations must be safe for concurrent reads.
pub trait ArtifactLookup: Send + Sync {
    /// Return the files of `artifact`.
    ///
    /// # Errors
    ///
    /// Returns [`LookupError::NotFound`] if the artifact does not exist, or an
    /// I/O or archive error if it exists but cannot be read.
    fn lookup(&self, artifact: &ArtifactRef) -> Result<FileSet, LookupError>;
}

impl<T: ArtifactLookup + ?Sized> ArtifactLookup for Arc<T> {
    fn lookup(&self, artifact: &ArtifactRef) -> Result<FileSet, LookupError> {
        (**self).lookup(artifact)
    }
}

/// In-memory artifact table.
#[derive(Debug, Clone, Default)]
pub struct MemoryLookup {
    artifacts: HashMap<ArtifactRef, FileSet>,
}

impl MemoryLookup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an artifact (builder style).
    pub fn with<I, P, B>(mut self, artifact: &str, files: I) -> Self
    where
        I: IntoIterator<Item = (P, B)>,
        P: Into<String>,
        B: Into<Bytes>,
    {
        self.insert(artifact, FileSet::from_files(files));
        self
    }

    /// Register an artifact.
    pub fn insert(&mut self, artifact: &str, files: FileSet) {
        self.artifacts.insert(ArtifactRef::new(artifact), files);
    }
}

impl ArtifactLookup for MemoryLookup {
    fn lookup(&self, artifact: &ArtifactRef) -> Result<FileSet, LookupError> {
        self.artifacts
            .get(artifact)
            .cloned()
            .ok_or_else(|| LookupError::NotFound(artifact.to_string()))
    }
}

/// Resolves artifacts from a directory of exploded artifacts and archives.
///
/// A plain reference `r` maps to `<root>/r`. Coordinates `group:name:version`
/// try `<root>/name-version.jar`, `<root>/name-version.zip`, `<root>/name.jar`,
/// `<root>/name` and finally the bare `<root>/group:name:version`, in that order.
#[derive(Debug, Clone)]
pub struct DirectoryLookup {
    root: PathBuf,
}

impl DirectoryLookup {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn candidates(&self, artifact: &ArtifactRef) -> Vec<PathBuf> {
        let mut candidates = Vec::new();
        match artifact.coordinates() {
            Some(coords) => {
                if let Some(version) = coords.version {
                    candidates.push(self.root.join(format!("{}-{version}.jar", coords.name)));
                    candidates.push(self.root.join(format!("{}-{version}.zip", coords.name)));
                }
                candidates.push(self.root.join(format!("{}.jar", coords.name)));
                candidates.push(self.root.join(coords.name));
                candidates.push(self.root.join(artifact.as_str()));
            }
            None => candidates.push(self.root.join(artifact.as_str())),
        }
        candidates
    }
}

impl ArtifactLookup for DirectoryLookup {
    fn lookup(&self, artifact: &ArtifactRef) -> Result<FileSet, LookupError> {
        for candidate in self.candidates(artifact) {
            if candidate.is_dir() {
                debug!(artifact = %artifact, path = %candidate.display(), "reading directory");
                return read_directory(&candidate);
            }
            if candidate.is_file() {
                debug!(artifact = %artifact, path = %candidate.display(), "reading file");
                return if is_archive(&candidate) {
                    read_archive(&candidate)
                } else {
                    read_single(&candidate)
                };
            }
        }
        Err(LookupError::NotFound(artifact.to_string()))
    }
}

fn is_archive(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("jar") || e.eq_ignore_ascii_case("zip"))
}

fn read_directory(dir: &Path) -> Result<FileSet, LookupError> {
    let mut files = Vec::new();
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = entry
            .path()
            .strip_prefix(dir)
            .map_err(|e| std::io::Error::other(e.to_string()))?;
        let name = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        let data = std::fs::read(entry.path())?;
        files.push((name, Bytes::from(data)));
    }
    Ok(FileSet::from_files(files))
}

fn read_archive(path: &Path) -> Result<FileSet, LookupError> {
    let file = File::open(path)?;
    let mut archive = zip::ZipArchive::new(file)?;
    let mut files = Vec::with_capacity(archive.len());
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        if entry.is_dir() {
            continue;
        }
        let name = entry.name().to_string();
        let mut data = Vec::with_capacity(entry.size() as usize);
        entry.read_to_end(&mut data)?;
        files.push((name, Bytes::from(data)));
    }
    Ok(FileSet::from_files(files))
}

fn read_single(path: &Path) -> Result<FileSet, LookupError> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| LookupError::NotFound(path.display().to_string()))?;
    let data = std::fs::read(path)?;
    Ok(FileSet::from_files([(name, Bytes::from(data))]))
}
