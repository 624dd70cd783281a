//! Maps a target `kind` to the constructor that builds it.

use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, LazyLock};

use super::{FilesystemTarget, ImageLayerTarget, PublicationTarget, filesystem, image};
#[cfg(feature = "network")]
use super::{RepositoryTarget, repository};
use crate::config::TargetConfig;
use crate::error::ConfigError;

/// Builds a target from its configuration.
pub type TargetFactory = fn(&TargetConfig) -> Result<Arc<dyn PublicationTarget>, ConfigError>;

fn filesystem_target(config: &TargetConfig) -> Result<Arc<dyn PublicationTarget>, ConfigError> {
    Ok(Arc::new(FilesystemTarget::from_config(config)?))
}

#[cfg(feature = "network")]
fn repository_target(config: &TargetConfig) -> Result<Arc<dyn PublicationTarget>, ConfigError> {
    Ok(Arc::new(RepositoryTarget::from_config(config)?))
}

fn image_target(config: &TargetConfig) -> Result<Arc<dyn PublicationTarget>, ConfigError> {
    Ok(Arc::new(ImageLayerTarget::from_config(config)?))
}

static FACTORIES: LazyLock<BTreeMap<&'static str, TargetFactory>> = LazyLock::new(|| {
    let mut factories: BTreeMap<&'static str, TargetFactory> = BTreeMap::new();
    factories.insert(filesystem::KIND, filesystem_target);
    #[cfg(feature = "network")]
    factories.insert(repository::KIND, repository_target);
    factories.insert(image::KIND, image_target);
    factories
});

/// Every kind [`build_target`] understands, sorted.
pub fn registered_kinds() -> Vec<&'static str> {
    FACTORIES.keys().copied().collect()
}

/// Build a single target.
///
/// # Errors
///
/// Returns [`ConfigError::UnknownTargetKind`] for an unregistered kind, or
/// whatever the target's own constructor rejects.
pub fn build_target(config: &TargetConfig) -> Result<Arc<dyn PublicationTarget>, ConfigError> {
    let factory = FACTORIES
        .get(config.kind.as_str())
        .ok_or_else(|| ConfigError::UnknownTargetKind {
            name: config.name.clone(),
            kind: config.kind.clone(),
        })?;
    factory(config)
}

/// Build every configured target, in order.
///
/// # Errors
///
/// Fails on the first target that cannot be built, or on a repeated name.
pub fn build_targets(configs: &[TargetConfig]) -> Result<Vec<Arc<dyn PublicationTarget>>, ConfigError> {
    let mut seen = HashSet::new();
    configs
        .iter()
        .map(|config| {
            if !seen.insert(config.name.as_str()) {
                return Err(ConfigError::target(&config.name, "duplicate target name"));
            }
            build_target(config)
        })
        .collect()
}
