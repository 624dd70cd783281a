//! Assemble command

use std::path::Path;

use anyhow::{Context, Result};
use forge_core::Pipeline;
use tokio_util::sync::CancellationToken;

use super::{load_config, plan};
use crate::ui::{ConsoleReporter, format_size};

/// Resolve and assemble every variant, writing the jars to `output`.
pub async fn assemble(config_path: &Path, output: &Path, quiet: bool) -> Result<()> {
    let config = load_config(config_path)?;
    let plan = plan(&config);
    let pipeline = Pipeline::new(ConsoleReporter::new(quiet), CancellationToken::new());

    let resolution = pipeline.resolve(&plan).await?;
    let bundles = pipeline.assemble(&plan, &resolution).await?;

    for bundle in bundles {
        let path = bundle
            .write_to(output)
            .with_context(|| format!("Failed to write {} to {}", bundle.file_name(), output.display()))?;
        println!(
            "{}  {}  {}",
            path.display(),
            format_size(bundle.size()),
            bundle.digest()
        );
    }
    Ok(())
}
