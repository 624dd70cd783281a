//! Publish command

use std::path::Path;

use anyhow::{Context, Result, bail};
use forge_core::Pipeline;
use forge_core::targets::build_targets;
use tokio_util::sync::CancellationToken;

use super::{load_config, plan};
use crate::ui::{ConsoleReporter, table};

/// Run the full pipeline. Returns `false` if any publication failed.
pub async fn publish(
    config_path: &Path,
    max_attempts: Option<u32>,
    only: &[String],
    quiet: bool,
    cancel: CancellationToken,
) -> Result<bool> {
    let config = load_config(config_path)?;

    for name in only {
        if config.target(name).is_none() {
            bail!("Unknown target '{name}'");
        }
    }
    let selected: Vec<_> = config
        .targets
        .iter()
        .filter(|t| only.is_empty() || only.contains(&t.name))
        .cloned()
        .collect();
    if selected.is_empty() {
        bail!("No publication targets configured in {}", config_path.display());
    }
    let targets = build_targets(&selected).context("Invalid target configuration")?;

    let mut policy = config.retry_policy();
    if let Some(n) = max_attempts {
        if n == 0 {
            bail!("--max-attempts must be at least 1");
        }
        policy = policy.with_max_attempts(n);
    }

    let plan = plan(&config).with_targets(targets).with_policy(policy);
    let pipeline = Pipeline::new(ConsoleReporter::new(quiet), cancel);
    let report = pipeline.run(&plan).await?;

    println!("{}", table::publications(&report));
    Ok(report.is_success())
}
