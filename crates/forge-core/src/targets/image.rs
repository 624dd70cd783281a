//! Container image layer target.
//!
//! Each bundle becomes a gzip-compressed tar layer holding the jar at
//! `<prefix>/<file name>`, stored content-addressed under
//! `<root>/blobs/sha256/<digest>`. Every configured tag then gets a small
//! JSON record at `<root>/<image>/<tag>.json` pointing at the layer.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use flate2::Compression;
use flate2::write::GzEncoder;
use forge_schema::{ContentHash, StructuredVersion};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{Outcome, PublicationTarget, classify_io, resolve_path, settings, write_atomic};
use crate::bundle::{Bundle, BundleId};
use crate::config::TargetConfig;
use crate::error::ConfigError;

pub const KIND: &str = "image-layer";

const DEFAULT_IMAGE: &str = "${artifactId}";
const DEFAULT_TAG: &str = "${version}";
const DEFAULT_PREFIX: &str = "opt/app";

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ImageSettings {
    root: PathBuf,
    #[serde(default)]
    image: Option<String>,
    #[serde(default)]
    prefix: Option<String>,
    #[serde(default)]
    tags: Option<Vec<String>>,
    #[serde(default)]
    labels: BTreeMap<String, String>,
}

/// What a tag points at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagRecord {
    pub image: String,
    pub tag: String,
    /// OCI digest (`sha256:<hex>`) of the compressed layer.
    pub layer: String,
    /// Digest of the jar inside the layer.
    pub content_hash: ContentHash,
    pub labels: BTreeMap<String, String>,
}

/// Expands `${version}`, `${version.N}` and `${artifactId}` placeholders.
#[derive(Debug, Clone)]
struct Template {
    raw: String,
}

fn placeholder() -> Result<Regex, regex::Error> {
    Regex::new(r"\$\{([^}]*)\}")
}

impl Template {
    fn parse(raw: &str, pattern: &Regex) -> Result<Self, String> {
        for caps in pattern.captures_iter(raw) {
            let key = &caps[1];
            match key.strip_prefix("version.") {
                Some(n) => match n.parse::<usize>() {
                    Ok(0) | Err(_) => return Err(format!("invalid placeholder '${{{key}}}'")),
                    Ok(_) => {}
                },
                None if key == "version" || key == "artifactId" => {}
                None => return Err(format!("unknown placeholder '${{{key}}}'")),
            }
        }
        Ok(Self {
            raw: raw.to_string(),
        })
    }

    fn expand(&self, pattern: &Regex, id: &BundleId) -> Result<String, String> {
        let version = StructuredVersion::parse(&id.version).map_err(|e| e.to_string())?;
        let mut failure = None;
        let expanded = pattern.replace_all(&self.raw, |caps: &regex::Captures<'_>| {
            let key = &caps[1];
            match key {
                "version" => id.version.clone(),
                "artifactId" => id.artifact_id.clone(),
                _ => {
                    let n = key
                        .strip_prefix("version.")
                        .and_then(|n| n.parse::<usize>().ok())
                        .unwrap_or(0);
                    version.prefix(n).unwrap_or_else(|e| {
                        failure = Some(e.to_string());
                        String::new()
                    })
                }
            }
        });
        match failure {
            Some(reason) => Err(reason),
            None => Ok(expanded.into_owned()),
        }
    }
}

/// Writes deterministic image layers and tag records to a local directory.
#[derive(Debug, Clone)]
pub struct ImageLayerTarget {
    name: String,
    root: PathBuf,
    image: Template,
    prefix: String,
    tags: Vec<Template>,
    labels: BTreeMap<String, String>,
    pattern: Regex,
}

impl ImageLayerTarget {
    /// A target with the default image name, prefix and tag.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidTarget`] if a template is invalid.
    pub fn new(name: &str, root: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        Self::build(name, root.into(), None, None, None, BTreeMap::new())
    }

    fn build(
        name: &str,
        root: PathBuf,
        image: Option<&str>,
        prefix: Option<&str>,
        tags: Option<&[String]>,
        labels: BTreeMap<String, String>,
    ) -> Result<Self, ConfigError> {
        let pattern = placeholder().map_err(|e| ConfigError::target(name, e))?;
        let image = Template::parse(image.unwrap_or(DEFAULT_IMAGE), &pattern)
            .map_err(|e| ConfigError::target(name, e))?;
        let tags = match tags {
            Some([]) => return Err(ConfigError::target(name, "tags must not be empty")),
            Some(tags) => tags
                .iter()
                .map(|t| Template::parse(t, &pattern))
                .collect::<Result<Vec<_>, _>>(),
            None => Template::parse(DEFAULT_TAG, &pattern).map(|t| vec![t]),
        }
        .map_err(|e| ConfigError::target(name, e))?;

        Ok(Self {
            name: name.to_string(),
            root,
            image,
            prefix: prefix.unwrap_or(DEFAULT_PREFIX).trim_matches('/').to_string(),
            tags,
            labels,
            pattern,
        })
    }

    /// Build from a `[[targets]]` entry with `kind = "image-layer"`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidTarget`] for missing settings or
    /// invalid templates.
    pub fn from_config(config: &TargetConfig) -> Result<Self, ConfigError> {
        let settings: ImageSettings = settings(config)?;
        Self::build(
            &config.name,
            resolve_path(config, &settings.root),
            settings.image.as_deref(),
            settings.prefix.as_deref(),
            settings.tags.as_deref(),
            settings.labels,
        )
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Expanded tags for `artifact`, in configuration order.
    ///
    /// # Errors
    ///
    /// Returns a message if the version cannot be split into components.
    pub fn tags_for(&self, artifact: &BundleId) -> Result<Vec<String>, String> {
        self.tags
            .iter()
            .map(|t| t.expand(&self.pattern, artifact))
            .collect()
    }

    fn image_for(&self, artifact: &BundleId) -> Result<String, String> {
        self.image.expand(&self.pattern, artifact)
    }

    fn tag_path(&self, image: &str, tag: &str) -> PathBuf {
        self.root.join(image).join(format!("{tag}.json"))
    }

    fn blob_path(&self, digest: &ContentHash) -> PathBuf {
        self.root.join("blobs").join("sha256").join(digest.as_str())
    }

    fn labels_for(&self, bundle: &Bundle) -> BTreeMap<String, String> {
        let mut labels = self.labels.clone();
        labels.insert(
            "org.opencontainers.image.version".to_string(),
            bundle.version().to_string(),
        );
        labels.insert(
            "org.opencontainers.image.created".to_string(),
            bundle.produced_at().to_rfc3339(),
        );
        labels
    }
}

/// A single-file tar.gz layer with fixed metadata.
pub fn build_layer(path: &str, data: &[u8]) -> std::io::Result<Vec<u8>> {
    let encoder = GzEncoder::new(Vec::new(), Compression::default());
    let mut builder = tar::Builder::new(encoder);

    let mut header = tar::Header::new_gnu();
    header.set_size(data.len() as u64);
    header.set_mode(0o644);
    header.set_mtime(0);
    header.set_uid(0);
    header.set_gid(0);
    header.set_entry_type(tar::EntryType::Regular);
    builder.append_data(&mut header, path, data)?;

    let mut encoder = builder.into_inner()?;
    encoder.flush()?;
    encoder.finish()
}

struct Publication {
    blob: PathBuf,
    layer: Vec<u8>,
    records: Vec<(PathBuf, Vec<u8>)>,
}

fn write_publication(publication: &Publication) -> Result<(), (&'static str, std::io::Error)> {
    if !publication.blob.exists() {
        write_atomic(&publication.blob, &publication.layer).map_err(|e| ("write layer", e))?;
    }
    for (path, record) in &publication.records {
        write_atomic(path, record).map_err(|e| ("write tag", e))?;
    }
    Ok(())
}

#[async_trait]
impl PublicationTarget for ImageLayerTarget {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> &'static str {
        KIND
    }

    async fn accepts(&self, bundle: &Bundle) -> Outcome {
        let id = bundle.id();
        if let Err(e) = id.validate() {
            return Outcome::Fatal(e.to_string());
        }
        let (image, tags) = match (self.image_for(id), self.tags_for(id)) {
            (Ok(image), Ok(tags)) => (image, tags),
            (Err(reason), _) | (_, Err(reason)) => return Outcome::Fatal(reason),
        };

        let path = format!("{}/{}", self.prefix, bundle.file_name());
        let layer = match build_layer(path.trim_start_matches('/'), bundle.archive()) {
            Ok(layer) => layer,
            Err(e) => return Outcome::Fatal(format!("cannot build layer: {e}")),
        };
        let layer_digest = ContentHash::compute(&layer);
        let labels = self.labels_for(bundle);

        let mut records = Vec::with_capacity(tags.len());
        for tag in tags {
            let record = TagRecord {
                image: image.clone(),
                tag: tag.clone(),
                layer: layer_digest.to_oci(),
                content_hash: bundle.digest().clone(),
                labels: labels.clone(),
            };
            match serde_json::to_vec_pretty(&record) {
                Ok(json) => records.push((self.tag_path(&image, &tag), json)),
                Err(e) => return Outcome::Fatal(format!("cannot encode tag record: {e}")),
            }
        }

        debug!(target = %self.name, image = %image, layer = %layer_digest, "writing image layer");
        let publication = Publication {
            blob: self.blob_path(&layer_digest),
            layer,
            records,
        };
        match tokio::task::spawn_blocking(move || write_publication(&publication)).await {
            Ok(Ok(())) => Outcome::Success,
            Ok(Err((context, e))) => classify_io(context, &e),
            Err(e) => Outcome::Fatal(format!("writer task failed: {e}")),
        }
    }

    async fn current_content_hash(&self, artifact: &BundleId) -> Option<ContentHash> {
        artifact.validate().ok()?;
        let image = self.image_for(artifact).ok()?;
        let tags = self.tags_for(artifact).ok()?;

        let mut current: Option<ContentHash> = None;
        for tag in tags {
            let path = self.tag_path(&image, &tag);
            let data = match tokio::fs::read(&path).await {
                Ok(data) => data,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
                Err(e) => {
                    warn!(target = %self.name, path = %path.display(), error = %e, "cannot read tag");
                    return None;
                }
            };
            let record: TagRecord = match serde_json::from_slice(&data) {
                Ok(record) => record,
                Err(e) => {
                    warn!(target = %self.name, path = %path.display(), error = %e, "malformed tag record");
                    return None;
                }
            };
            // every tag must point at the same content
            match &current {
                Some(hash) if *hash != record.content_hash => return None,
                _ => current = Some(record.content_hash),
            }
        }
        current
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use forge_schema::{ResolvedManifest, VariantName};
    use std::io::Read;
    use tempfile::TempDir;

    fn bundle(version: &str) -> Bundle {
        Bundle::new(
            BundleId::new(Some("org.ehcache"), "ehcache", version),
            VariantName::default_variant(),
            ResolvedManifest::new(Vec::new(), Vec::new()).unwrap(),
            Bytes::from_static(b"jar bytes"),
        )
    }

    fn tags(templates: &[&str]) -> Vec<String> {
        templates.iter().map(|t| (*t).to_string()).collect()
    }

    #[test]
    fn tag_templates_expand_from_version_components() {
        let config = TargetConfig::new("img", KIND, "/work")
            .with("root", "images")
            .with("tags", vec!["${version}", "${version.2}", "${version.1}-latest"]);
        let target = ImageLayerTarget::from_config(&config).unwrap();
        assert_eq!(target.root(), Path::new("/work/images"));

        let id = BundleId::new(Some("org.ehcache"), "ehcache", "3.10.8-SNAPSHOT");
        assert_eq!(
            target.tags_for(&id).unwrap(),
            ["3.10.8-SNAPSHOT", "3.10", "3-latest"]
        );
    }

    #[test]
    fn invalid_templates_are_config_errors() {
        for bad in ["${version.0}", "${version.x}", "${branch}"] {
            let err = ImageLayerTarget::build(
                "img",
                PathBuf::from("/tmp"),
                None,
                None,
                Some(tags(&[bad]).as_slice()),
                BTreeMap::new(),
            )
            .unwrap_err();
            assert!(matches!(err, ConfigError::InvalidTarget { .. }), "{bad}");
        }
    }

    #[test]
    fn layers_are_deterministic() {
        let a = build_layer("opt/app/x.jar", b"data").unwrap();
        let b = build_layer("opt/app/x.jar", b"data").unwrap();
        assert_eq!(a, b);

        let mut archive = tar::Archive::new(flate2::read::GzDecoder::new(a.as_slice()));
        let mut entries = archive.entries().unwrap();
        let mut entry = entries.next().unwrap().unwrap();
        assert_eq!(entry.path().unwrap().to_str(), Some("opt/app/x.jar"));
        let mut content = Vec::new();
        entry.read_to_end(&mut content).unwrap();
        assert_eq!(content, b"data");
    }

    #[tokio::test]
    async fn publishes_layer_and_tags() {
        let tmp = TempDir::new().unwrap();
        let target = ImageLayerTarget::build(
            "img",
            tmp.path().to_path_buf(),
            Some("ehcache-image"),
            None,
            Some(tags(&["${version}", "${version.1}"]).as_slice()),
            BTreeMap::new(),
        )
        .unwrap();
        let bundle = bundle("3.10.8");

        assert_eq!(target.current_content_hash(bundle.id()).await, None);
        assert_eq!(target.accepts(&bundle).await, Outcome::Success);

        let record: TagRecord = serde_json::from_slice(
            &std::fs::read(tmp.path().join("ehcache-image/3.10.8.json")).unwrap(),
        )
        .unwrap();
        assert_eq!(&record.content_hash, bundle.digest());
        assert_eq!(
            record.labels.get("org.opencontainers.image.version").map(String::as_str),
            Some("3.10.8")
        );
        let blob = record.layer.strip_prefix("sha256:").unwrap();
        assert!(tmp.path().join("blobs/sha256").join(blob).is_file());
        assert!(tmp.path().join("ehcache-image/3.json").is_file());

        assert_eq!(
            target.current_content_hash(bundle.id()).await.as_ref(),
            Some(bundle.digest())
        );
    }

    #[tokio::test]
    async fn default_image_is_the_artifact_id() {
        let tmp = TempDir::new().unwrap();
        let target = ImageLayerTarget::new("img", tmp.path()).unwrap();
        assert!(target.accepts(&bundle("1.0")).await.is_success());
        assert!(tmp.path().join("ehcache/1.0.json").is_file());
    }
}
