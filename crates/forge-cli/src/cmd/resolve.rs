//! Resolve command

use std::path::Path;

use anyhow::{Context, Result, bail};
use forge_core::{DirectoryLookup, Resolution, Resolver};
use forge_schema::{ResolvedManifest, VariantName};
use serde::Serialize;

use super::load_config;
use crate::ui::table;

#[derive(Debug, Serialize)]
struct VariantJson<'a> {
    variant: &'a str,
    artifact_id: String,
    attributes: &'a [(String, String)],
    entries: Vec<EntryJson>,
}

#[derive(Debug, Serialize)]
struct EntryJson {
    path: String,
    size: usize,
    sha256: String,
    origins: Vec<String>,
}

fn variant_json<'a>(
    resolution: &Resolution,
    variant: &'a VariantName,
    manifest: &'a ResolvedManifest,
) -> VariantJson<'a> {
    VariantJson {
        variant: variant.as_str(),
        artifact_id: resolution.artifact_id(variant),
        attributes: manifest.attributes(),
        entries: manifest
            .entries()
            .iter()
            .map(|entry| EntryJson {
                path: entry.path().to_string(),
                size: entry.content().len(),
                sha256: entry.hash().to_string(),
                origins: entry.sources().iter().map(|s| s.origin.to_string()).collect(),
            })
            .collect(),
    }
}

/// Resolve the configured descriptor and print the result.
pub fn resolve(config_path: &Path, variant: Option<&str>, json: bool) -> Result<()> {
    let config = load_config(config_path)?;
    let lookup = DirectoryLookup::new(config.lookup_root());
    let resolution = Resolver::new(&lookup)
        .resolve(&config.package)
        .with_context(|| format!("Failed to resolve '{}'", config.package.module))?;

    let selected: Vec<_> = resolution
        .manifests()
        .iter()
        .filter(|(name, _)| variant.is_none_or(|v| name.as_str() == v))
        .collect();
    if let (Some(v), true) = (variant, selected.is_empty()) {
        bail!("Unknown variant '{v}'");
    }

    if json {
        let out: Vec<_> = selected
            .iter()
            .map(|(name, manifest)| variant_json(&resolution, name, manifest))
            .collect();
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    for (name, manifest) in selected {
        println!(
            "{} {} ({} entries)",
            resolution.artifact_id(name),
            resolution.version(),
            manifest.len()
        );
        println!("{}", table::entries(manifest));
    }
    Ok(())
}
