//! Subcommand implementations.

pub mod assemble;
pub mod publish;
pub mod resolve;
pub mod targets;
pub mod version;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use forge_core::{DirectoryLookup, ForgeConfig, PublishPlan};

/// Load `forge.toml` and apply environment overrides.
pub fn load_config(path: &Path) -> Result<ForgeConfig> {
    ForgeConfig::from_file(path)
        .with_context(|| format!("Failed to load {}", path.display()))?
        .with_env_overrides()
        .context("Invalid environment override")
}

/// A plan with no targets, reading inputs from the configured lookup root.
pub fn plan(config: &ForgeConfig) -> PublishPlan {
    let lookup = DirectoryLookup::new(config.lookup_root());
    PublishPlan::new(config.package.clone(), Arc::new(lookup))
        .with_policy(config.retry_policy())
        .with_concurrency(config.concurrency())
}
