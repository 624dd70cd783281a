//! Structured version strings.
//!
//! A version such as `3.10.8-SNAPSHOT` is split on `.` and `-` into the
//! components `3`, `10`, `8`, `SNAPSHOT`. The separators are kept so that a
//! prefix of the version (`3.10`) renders exactly as it was written.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

/// Errors produced when parsing a [`StructuredVersion`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum VersionError {
    /// The version is empty.
    #[error("version must not be empty")]
    Empty,

    /// The version begins with `.` or `-`.
    #[error("{0} starts with a separator: [.-]")]
    LeadingSeparator(String),

    /// A prefix of zero components was requested.
    #[error("Cannot return version with {0} components")]
    InvalidLength(usize),
}

/// A version split into separator-delimited components.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct StructuredVersion {
    raw: String,
    /// `(separator preceding the component, component)`; the first separator is empty.
    components: Vec<(char, String)>,
}

impl StructuredVersion {
    /// Parse a version string.
    ///
    /// Empty components (as in `1..2`) are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`VersionError`] if the version is empty or starts with a separator.
    pub fn parse(version: &str) -> Result<Self, VersionError> {
        let version = version.trim();
        if version.is_empty() {
            return Err(VersionError::Empty);
        }
        if version.starts_with(['.', '-']) {
            return Err(VersionError::LeadingSeparator(version.to_string()));
        }

        let mut components: Vec<(char, String)> = Vec::new();
        let mut separator = '\0';
        let mut current = String::new();
        for c in version.chars() {
            if c == '.' || c == '-' {
                if !current.is_empty() {
                    components.push((separator, std::mem::take(&mut current)));
                    separator = c;
                }
            } else {
                current.push(c);
            }
        }
        if !current.is_empty() {
            components.push((separator, current));
        }

        Ok(Self {
            raw: version.to_string(),
            components,
        })
    }

    /// The version exactly as written.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Number of components.
    pub fn len(&self) -> usize {
        self.components.len()
    }

    /// Whether the version has no components (never true for a parsed version).
    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// The component at `index`, if present.
    pub fn component(&self, index: usize) -> Option<&str> {
        self.components.get(index).map(|(_, c)| c.as_str())
    }

    /// Iterate over the components in order.
    pub fn components(&self) -> impl Iterator<Item = &str> {
        self.components.iter().map(|(_, c)| c.as_str())
    }

    /// The first `length` components joined by their original separators.
    ///
    /// Asking for more components than exist returns the whole version.
    ///
    /// # Errors
    ///
    /// Returns [`VersionError::InvalidLength`] when `length` is zero.
    pub fn prefix(&self, length: usize) -> Result<String, VersionError> {
        if length == 0 {
            return Err(VersionError::InvalidLength(length));
        }
        let mut out = String::new();
        for (i, (separator, component)) in self.components.iter().take(length).enumerate() {
            if i > 0 {
                out.push(*separator);
            }
            out.push_str(component);
        }
        Ok(out)
    }

    /// OSGi form `major.minor.micro[.qualifier]`.
    ///
    /// Leading numeric components (at most three) fill major/minor/micro, missing
    /// ones default to `0`; everything after them becomes the qualifier, joined by `-`.
    pub fn to_osgi(&self) -> String {
        let mut numeric = Vec::with_capacity(3);
        let mut rest = Vec::new();
        for component in self.components() {
            if rest.is_empty() && numeric.len() < 3 && is_numeric(component) {
                numeric.push(component.trim_start_matches('0'));
            } else {
                rest.push(component);
            }
        }

        let mut parts: Vec<String> = numeric
            .iter()
            .map(|n| if n.is_empty() { "0".to_string() } else { (*n).to_string() })
            .collect();
        while parts.len() < 3 {
            parts.push("0".to_string());
        }

        let mut out = parts.join(".");
        if !rest.is_empty() {
            let qualifier: String = rest
                .join("-")
                .chars()
                .map(|c| {
                    if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                        c
                    } else {
                        '_'
                    }
                })
                .collect();
            out.push('.');
            out.push_str(&qualifier);
        }
        out
    }
}

fn is_numeric(component: &str) -> bool {
    !component.is_empty() && component.chars().all(|c| c.is_ascii_digit())
}

fn compare_components(a: &str, b: &str) -> Ordering {
    match (is_numeric(a), is_numeric(b)) {
        (true, true) => {
            let a = a.trim_start_matches('0');
            let b = b.trim_start_matches('0');
            a.len().cmp(&b.len()).then_with(|| a.cmp(b))
        }
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (false, false) => a.cmp(b),
    }
}

impl Ord for StructuredVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        for (a, b) in self.components().zip(other.components()) {
            match compare_components(a, b) {
                Ordering::Equal => {}
                unequal => return unequal,
            }
        }
        self.len()
            .cmp(&other.len())
            .then_with(|| self.raw.cmp(&other.raw))
    }
}

impl PartialOrd for StructuredVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl TryFrom<String> for StructuredVersion {
    type Error = VersionError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<StructuredVersion> for String {
    fn from(value: StructuredVersion) -> Self {
        value.raw
    }
}

impl std::str::FromStr for StructuredVersion {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl std::fmt::Display for StructuredVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.raw)
    }
}
