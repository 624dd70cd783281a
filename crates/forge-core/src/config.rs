//! `forge.toml` parsing.
//!
//! A configuration file bundles the package descriptor, where input artifacts
//! live, how publication retries, and which targets receive the bundles.
//! Relative paths are resolved against the directory holding the file.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use forge_schema::PackageDescriptor;
use serde::Deserialize;

use crate::error::ConfigError;
use crate::pipeline::{Backoff, RetryPolicy};

/// Default configuration file name.
pub const CONFIG_FILE: &str = "forge.toml";

/// Environment variable overriding `publish.max_attempts`.
pub const MAX_ATTEMPTS_ENV: &str = "FORGE_MAX_ATTEMPTS";

/// Top-level configuration parsed from a `forge.toml` file.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ForgeConfig {
    /// What to package.
    pub package: PackageDescriptor,
    /// Where input artifacts are looked up.
    #[serde(default)]
    pub lookup: LookupConfig,
    /// Retry and concurrency settings.
    #[serde(default)]
    pub publish: PublishConfig,
    /// Publication targets in declaration order.
    #[serde(default)]
    pub targets: Vec<TargetConfig>,
    /// Directory relative paths are resolved against.
    #[serde(skip)]
    pub base_dir: PathBuf,
}

/// The `[lookup]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LookupConfig {
    #[serde(default = "default_lookup_root")]
    pub root: PathBuf,
}

impl Default for LookupConfig {
    fn default() -> Self {
        Self {
            root: default_lookup_root(),
        }
    }
}

fn default_lookup_root() -> PathBuf {
    PathBuf::from(".")
}

/// The `[publish]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PublishConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Concurrent target tasks; defaults to the CPU count.
    #[serde(default)]
    pub concurrency: Option<usize>,
    #[serde(default)]
    pub backoff: BackoffConfig,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            concurrency: None,
            backoff: BackoffConfig::default(),
        }
    }
}

fn default_max_attempts() -> u32 {
    3
}

/// The `[publish.backoff]` section, in milliseconds.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BackoffConfig {
    #[serde(default = "default_initial_ms")]
    pub initial_ms: u64,
    #[serde(default = "default_factor")]
    pub factor: u32,
    #[serde(default = "default_max_ms")]
    pub max_ms: u64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_ms: default_initial_ms(),
            factor: default_factor(),
            max_ms: default_max_ms(),
        }
    }
}

fn default_initial_ms() -> u64 {
    200
}

fn default_factor() -> u32 {
    2
}

fn default_max_ms() -> u64 {
    5000
}

/// One `[[targets]]` entry. Everything besides `name` and `kind` is handed
/// to the target factory as `settings`.
#[derive(Debug, Clone, Deserialize)]
pub struct TargetConfig {
    pub name: String,
    pub kind: String,
    #[serde(skip)]
    pub base_dir: PathBuf,
    #[serde(flatten)]
    pub settings: toml::Table,
}

impl TargetConfig {
    /// A target configuration with no settings, resolved against `base_dir`.
    pub fn new(name: &str, kind: &str, base_dir: impl Into<PathBuf>) -> Self {
        Self {
            name: name.to_string(),
            kind: kind.to_string(),
            base_dir: base_dir.into(),
            settings: toml::Table::new(),
        }
    }

    /// Add a setting (builder style).
    pub fn with(mut self, key: &str, value: impl Into<toml::Value>) -> Self {
        self.settings.insert(key.to_string(), value.into());
        self
    }
}

impl ForgeConfig {
    /// Read and parse a configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Read`] if the file cannot be read, and any
    /// parse or validation error from [`ForgeConfig::parse`].
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let base_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        Self::parse(&content, &base_dir)
    }

    /// Parse configuration text whose relative paths are anchored at `base_dir`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed TOML and
    /// [`ConfigError::InvalidTarget`] for invalid publish or target settings.
    pub fn parse(content: &str, base_dir: &Path) -> Result<Self, ConfigError> {
        let mut config: ForgeConfig = toml::from_str(content)?;
        config.base_dir = base_dir.to_path_buf();
        for target in &mut config.targets {
            target.base_dir = base_dir.to_path_buf();
        }
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.publish.max_attempts == 0 {
            return Err(ConfigError::target("publish", "max_attempts must be at least 1"));
        }
        if self.publish.concurrency == Some(0) {
            return Err(ConfigError::target("publish", "concurrency must be at least 1"));
        }
        if self.publish.backoff.factor == 0 {
            return Err(ConfigError::target("publish", "backoff factor must be at least 1"));
        }

        let mut names = HashSet::new();
        for target in &self.targets {
            if target.name.trim().is_empty() {
                return Err(ConfigError::MissingField("targets.name"));
            }
            if !names.insert(target.name.as_str()) {
                return Err(ConfigError::target(&target.name, "duplicate target name"));
            }
        }
        Ok(())
    }

    /// Apply environment overrides from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidTarget`] if an override is malformed.
    pub fn with_env_overrides(self) -> Result<Self, ConfigError> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply environment overrides read through `var`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidTarget`] if an override is malformed.
    pub fn with_overrides(
        mut self,
        var: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        if let Some(raw) = var(MAX_ATTEMPTS_ENV) {
            let attempts: u32 = raw.trim().parse().map_err(|_| {
                ConfigError::target("publish", format!("{MAX_ATTEMPTS_ENV}={raw} is not a number"))
            })?;
            if attempts == 0 {
                return Err(ConfigError::target(
                    "publish",
                    format!("{MAX_ATTEMPTS_ENV} must be at least 1"),
                ));
            }
            self.publish.max_attempts = attempts;
        }
        Ok(self)
    }

    /// Lookup root with relative paths resolved.
    pub fn lookup_root(&self) -> PathBuf {
        if self.lookup.root.is_absolute() {
            self.lookup.root.clone()
        } else {
            self.base_dir.join(&self.lookup.root)
        }
    }

    /// Retry policy for publication.
    pub fn retry_policy(&self) -> RetryPolicy {
        let backoff = &self.publish.backoff;
        RetryPolicy::new(
            self.publish.max_attempts,
            Backoff::new(
                Duration::from_millis(backoff.initial_ms),
                backoff.factor,
                Duration::from_millis(backoff.max_ms),
            ),
        )
    }

    /// Maximum concurrent target tasks.
    pub fn concurrency(&self) -> usize {
        self.publish.concurrency.unwrap_or_else(num_cpus::get).max(1)
    }

    /// Find a target by name.
    pub fn target(&self, name: &str) -> Option<&TargetConfig> {
        self.targets.iter().find(|t| t.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
        [package]
        module = "ehcache"
        version = "3.10.8"
        group = "org.ehcache"
        artifacts = ["org.ehcache:ehcache-core:3.10.8"]
        blacklist = ["javax.xml.bind:*"]

        [[package.relocations]]
        from = "org/terracotta/statistics/"
        to = "org/ehcache/shadow/org/terracotta/statistics/"

        [package.metadata]
        "Bundle-Vendor" = "Terracotta"

        [[package.variants]]
        name = "default"
        exclude = ["**/*.html"]

        [lookup]
        root = "build/libs"

        [publish]
        max_attempts = 4
        concurrency = 2

        [publish.backoff]
        initial_ms = 100
        factor = 3
        max_ms = 1000

        [[targets]]
        name = "local"
        kind = "filesystem"
        root = "build/repo"
    "#;

    #[test]
    fn parses_full_configuration() {
        let config = ForgeConfig::parse(SAMPLE, Path::new("/work")).unwrap();

        assert_eq!(config.package.module, "ehcache");
        assert_eq!(config.package.relocations.len(), 1);
        assert_eq!(config.lookup_root(), PathBuf::from("/work/build/libs"));
        assert_eq!(config.concurrency(), 2);

        let policy = config.retry_policy();
        assert_eq!(policy.max_attempts(), 4);
        assert_eq!(policy.backoff().delay(1), Duration::from_millis(100));
        assert_eq!(policy.backoff().delay(2), Duration::from_millis(300));

        let local = config.target("local").unwrap();
        assert_eq!(local.kind, "filesystem");
        assert_eq!(local.base_dir, PathBuf::from("/work"));
        assert_eq!(local.settings["root"].as_str(), Some("build/repo"));
    }

    #[test]
    fn defaults_apply() {
        let config =
            ForgeConfig::parse("[package]\nmodule = \"m\"\nversion = \"1\"", Path::new(".")).unwrap();
        assert_eq!(config.publish.max_attempts, 3);
        assert_eq!(config.publish.backoff.initial_ms, 200);
        assert!(config.targets.is_empty());
        assert!(config.concurrency() >= 1);
    }

    #[test]
    fn env_override_replaces_max_attempts() {
        let config = ForgeConfig::parse(SAMPLE, Path::new("/work"))
            .unwrap()
            .with_overrides(|key| (key == MAX_ATTEMPTS_ENV).then(|| "7".to_string()))
            .unwrap();
        assert_eq!(config.publish.max_attempts, 7);

        let err = ForgeConfig::parse(SAMPLE, Path::new("/work"))
            .unwrap()
            .with_overrides(|_| Some("lots".to_string()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidTarget { .. }));
    }

    #[test]
    fn duplicate_target_names_are_rejected() {
        let text = format!(
            "{SAMPLE}\n[[targets]]\nname = \"local\"\nkind = \"filesystem\"\nroot = \"x\"\n"
        );
        let err = ForgeConfig::parse(&text, Path::new("/work")).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidTarget { name, .. } if name == "local"));
    }

    #[test]
    fn unknown_sections_fail_to_parse() {
        let err = ForgeConfig::parse(
            "[package]\nmodule = \"m\"\nversion = \"1\"\n[publsh]\nmax_attempts = 1",
            Path::new("."),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn from_file_anchors_paths_at_the_file() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join(CONFIG_FILE);
        std::fs::write(&path, SAMPLE).unwrap();

        let config = ForgeConfig::from_file(&path).unwrap();
        assert_eq!(config.lookup_root(), tmp.path().join("build/libs"));

        let missing = ForgeConfig::from_file(&tmp.path().join("nope.toml")).unwrap_err();
        assert!(matches!(missing, ConfigError::Read { .. }));
    }
}
