//! Validated identifier newtypes shared by descriptors and manifests.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;

/// Errors raised when validating the identifier newtypes in this module.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum NameError {
    /// The value is empty (or only whitespace).
    #[error("{0} must not be empty")]
    Empty(&'static str),

    /// An archive path is absolute or escapes the archive root.
    #[error("Invalid entry path '{0}': must be relative and must not contain '..'")]
    InvalidPath(String),

    /// A variant name contains characters unsuitable for file names.
    #[error("Invalid variant name '{0}': use letters, digits, '-', '_' or '.'")]
    InvalidVariant(String),
}

/// The name of a packaging flavor of a module (e.g. `default`, `ee`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct VariantName(String);

impl VariantName {
    /// Name of the variant whose artifact id is the bare module name.
    pub const DEFAULT: &'static str = "default";

    /// Create a validated variant name.
    ///
    /// # Errors
    ///
    /// Returns [`NameError`] if the name is empty or contains characters
    /// other than ASCII alphanumerics, `-`, `_` and `.`.
    pub fn new(name: &str) -> Result<Self, NameError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(NameError::Empty("variant name"));
        }
        if !name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        {
            return Err(NameError::InvalidVariant(name.to_string()));
        }
        Ok(Self(name.to_string()))
    }

    /// The `default` variant.
    pub fn default_variant() -> Self {
        Self(Self::DEFAULT.to_string())
    }

    /// Whether this is the `default` variant.
    pub fn is_default(&self) -> bool {
        self.0 == Self::DEFAULT
    }

    /// Return the name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for VariantName {
    type Error = NameError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(&value)
    }
}

impl From<VariantName> for String {
    fn from(value: VariantName) -> Self {
        value.0
    }
}

impl std::fmt::Display for VariantName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for VariantName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for VariantName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Maven-style coordinates parsed from an [`ArtifactRef`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Coordinates<'a> {
    /// Group id (e.g. `org.ehcache`).
    pub group: &'a str,
    /// Artifact name (e.g. `ehcache-core`).
    pub name: &'a str,
    /// Version, when present.
    pub version: Option<&'a str>,
}

/// A reference to an input artifact, resolved by an artifact lookup.
///
/// Either an opaque name/path (`libs/core`) or coordinates
/// (`group:name` / `group:name:version`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArtifactRef(String);

impl ArtifactRef {
    /// Create a reference from its string form (stored trimmed).
    pub fn new(s: &str) -> Self {
        Self(s.trim().to_string())
    }

    /// Return the reference as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Parse the reference as `group:name[:version]`, if it has that shape.
    pub fn coordinates(&self) -> Option<Coordinates<'_>> {
        let mut parts = self.0.split(':');
        let group = parts.next().filter(|s| !s.is_empty())?;
        let name = parts.next().filter(|s| !s.is_empty())?;
        let version = parts.next().filter(|s| !s.is_empty());
        if parts.next().is_some() {
            return None;
        }
        Some(Coordinates {
            group,
            name,
            version,
        })
    }
}

impl std::fmt::Display for ArtifactRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for ArtifactRef {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ArtifactRef {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for ArtifactRef {
    fn from(s: String) -> Self {
        Self::new(&s)
    }
}

/// A `/`-separated path of an entry inside an archive.
///
/// Always relative, never empty, never containing `.` or `..` components.
/// Backslashes are normalized to `/` on construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EntryPath(String);

impl EntryPath {
    /// Create a validated, normalized entry path.
    ///
    /// # Errors
    ///
    /// Returns [`NameError`] if the path is empty, absolute, or contains `..`.
    pub fn new(path: &str) -> Result<Self, NameError> {
        let normalized = path.replace('\\', "/");
        if normalized.starts_with('/') {
            return Err(NameError::InvalidPath(path.to_string()));
        }

        let mut components = Vec::new();
        for component in normalized.split('/') {
            match component {
                "" | "." => {}
                ".." => return Err(NameError::InvalidPath(path.to_string())),
                other => components.push(other),
            }
        }

        if components.is_empty() {
            return Err(NameError::Empty("entry path"));
        }

        Ok(Self(components.join("/")))
    }

    /// The jar manifest path, `META-INF/MANIFEST.MF`.
    pub fn jar_manifest() -> Self {
        Self(crate::MANIFEST_PATH.to_string())
    }

    /// Return the path as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Final path component.
    pub fn file_name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }

    /// Everything before the final component, without the trailing `/`.
    pub fn parent(&self) -> Option<&str> {
        self.0.rsplit_once('/').map(|(parent, _)| parent)
    }

    /// Whether the path starts with the given prefix (plain string match).
    pub fn starts_with(&self, prefix: &str) -> bool {
        self.0.starts_with(prefix)
    }
}

impl TryFrom<String> for EntryPath {
    type Error = NameError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(&value)
    }
}

impl From<EntryPath> for String {
    fn from(value: EntryPath) -> Self {
        value.0
    }
}

impl std::fmt::Display for EntryPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for EntryPath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for EntryPath {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// A path prefix used by relocation rules (e.g. `org/terracotta/statistics/`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct PackagePrefix(String);

impl PackagePrefix {
    /// Create a prefix. Dotted package names are converted to path form.
    pub fn new(prefix: &str) -> Self {
        let prefix = prefix.trim();
        if prefix.contains('/') {
            Self(prefix.to_string())
        } else {
            Self(prefix.replace('.', "/"))
        }
    }

    /// Return the prefix as a path-form string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The prefix in dotted class-name form (`org/foo/` becomes `org.foo.`).
    pub fn dotted(&self) -> String {
        self.0.replace('/', ".")
    }
}

impl std::fmt::Display for PackagePrefix {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for PackagePrefix {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for PackagePrefix {
    fn from(s: String) -> Self {
        Self::new(&s)
    }
}

impl From<PackagePrefix> for String {
    fn from(value: PackagePrefix) -> Self {
        value.0
    }
}
