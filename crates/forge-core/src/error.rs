//! Domain-specific errors for configuration and whole-run failures

use std::path::PathBuf;

use forge_schema::{ArtifactRef, EntryPath, ManifestError, NameError, Origin, VersionError};
use thiserror::Error;

use crate::assembler::AssemblyError;
use crate::bundle::CoordinateError;
use crate::lookup::LookupError;

/// The caller's descriptor or configuration is invalid. Never retried.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Cannot resolve artifact '{artifact}': {source}")]
    UnresolvableArtifact {
        artifact: ArtifactRef,
        #[source]
        source: LookupError,
    },

    #[error("Conflicting entries for '{path}': content from {first} differs from {second}")]
    ConflictingEntries {
        path: EntryPath,
        first: Origin,
        second: Origin,
    },

    #[error("Invalid glob pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("Artifact '{artifact}' is blacklisted by '{pattern}'")]
    Blacklisted {
        artifact: ArtifactRef,
        pattern: String,
    },

    #[error("Invalid entry path in '{artifact}': {source}")]
    InvalidPath {
        artifact: ArtifactRef,
        #[source]
        source: NameError,
    },

    #[error("Invalid version: {0}")]
    InvalidVersion(#[from] VersionError),

    #[error(transparent)]
    InvalidCoordinate(#[from] CoordinateError),

    #[error("Variant '{0}' is declared more than once")]
    DuplicateVariant(String),

    #[error("Unknown variant: {0}")]
    UnknownVariant(String),

    #[error("Unknown target kind '{kind}' for target '{name}'")]
    UnknownTargetKind { name: String, kind: String },

    #[error("Invalid configuration for target '{name}': {reason}")]
    InvalidTarget { name: String, reason: String },

    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid manifest: {0}")]
    Manifest(#[from] ManifestError),
}

impl ConfigError {
    /// Create a target configuration error.
    pub fn target(name: &str, reason: impl std::fmt::Display) -> Self {
        Self::InvalidTarget {
            name: name.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Failures that abort a whole run before anything is published.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Assembly(#[from] AssemblyError),

    #[error("Worker task failed: {0}")]
    Worker(String),
}
