//! Descriptor resolution.
//!
//! Turns a [`PackageDescriptor`] into one [`ResolvedManifest`] per variant:
//!
//! 1. validate the descriptor and reject blacklisted artifacts;
//! 2. look up every artifact of the variant (common ones first, then the
//!    variant's own), dropping jar signatures and manifests and applying the
//!    variant's include/exclude globs to the original entry paths;
//! 3. relocate every entry (first matching rule wins);
//! 4. fold duplicates: mergeable paths collect one source per artifact,
//!    identical duplicates are dropped, differing ones are a conflict;
//! 5. derive the manifest headers and generated metadata entries.
//!
//! Resolution is pure: the only input besides the descriptor is the artifact
//! lookup, and identical inputs always produce identical manifests.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use forge_schema::{
    ArtifactRef, EntryPath, EntrySource, ManifestEntry, Origin, PackageDescriptor,
    ResolvedManifest, SERVICES_DIR, StructuredVersion, VariantName, VariantSpec,
};
use glob::Pattern;
use tracing::{debug, info};

use crate::bundle::BundleId;
use crate::error::ConfigError;
use crate::lookup::{ArtifactLookup, FileSet};
use crate::pom::{self, PomDetails};
use crate::relocate::Relocator;

/// Decides which entry paths merge (concatenate) instead of conflicting.
pub trait MergeablePaths: Send + Sync {
    fn is_mergeable(&self, path: &EntryPath) -> bool;
}

impl<F> MergeablePaths for F
where
    F: Fn(&EntryPath) -> bool + Send + Sync,
{
    fn is_mergeable(&self, path: &EntryPath) -> bool {
        self(path)
    }
}

/// Service registration files (`META-INF/services/*`) are mergeable.
#[derive(Debug, Clone, Copy, Default)]
pub struct ServiceFiles;

impl MergeablePaths for ServiceFiles {
    fn is_mergeable(&self, path: &EntryPath) -> bool {
        path.as_str()
            .strip_prefix(SERVICES_DIR)
            .is_some_and(|rest| !rest.is_empty() && !rest.contains('/'))
    }
}

/// Resolved manifests for every variant of a descriptor, in declaration order.
#[derive(Debug, Clone)]
pub struct Resolution {
    module: String,
    version: String,
    group: Option<String>,
    manifests: Vec<(VariantName, Arc<ResolvedManifest>)>,
}

impl Resolution {
    pub fn module(&self) -> &str {
        &self.module
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn group(&self) -> Option<&str> {
        self.group.as_deref()
    }

    /// `(variant, manifest)` pairs in declaration order.
    pub fn manifests(&self) -> &[(VariantName, Arc<ResolvedManifest>)] {
        &self.manifests
    }

    pub fn manifest(&self, variant: &str) -> Option<&Arc<ResolvedManifest>> {
        self.manifests
            .iter()
            .find(|(v, _)| v.as_str() == variant)
            .map(|(_, m)| m)
    }

    /// Artifact id of a variant (the module name for `default`).
    pub fn artifact_id(&self, variant: &VariantName) -> String {
        if variant.is_default() {
            self.module.clone()
        } else {
            format!("{}-{variant}", self.module)
        }
    }

    /// Coordinates of the bundle built from `variant`.
    pub fn bundle_id(&self, variant: &VariantName) -> BundleId {
        BundleId::new(self.group(), &self.artifact_id(variant), &self.version)
    }
}

/// Resolves descriptors against an artifact lookup.
pub struct Resolver<'a> {
    lookup: &'a dyn ArtifactLookup,
    mergeable: &'a dyn MergeablePaths,
}

impl std::fmt::Debug for Resolver<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resolver").finish_non_exhaustive()
    }
}

impl<'a> Resolver<'a> {
    /// A resolver treating service registration files as mergeable.
    pub fn new(lookup: &'a dyn ArtifactLookup) -> Self {
        Self {
            lookup,
            mergeable: &ServiceFiles,
        }
    }

    /// Replace the mergeable-path predicate.
    pub fn with_mergeable(mut self, mergeable: &'a dyn MergeablePaths) -> Self {
        self.mergeable = mergeable;
        self
    }

    /// Resolve every variant of `descriptor`.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] for an invalid descriptor, an unresolvable or
    /// blacklisted artifact, a malformed glob, or conflicting entries. No
    /// partial result is returned.
    pub fn resolve(&self, descriptor: &PackageDescriptor) -> Result<Resolution, ConfigError> {
        validate(descriptor)?;
        let cache = self.load(descriptor, descriptor.variants.iter())?;

        let mut manifests = Vec::with_capacity(descriptor.variants.len());
        for variant in &descriptor.variants {
            let manifest = self.resolve_with(descriptor, variant, &cache)?;
            manifests.push((variant.name.clone(), Arc::new(manifest)));
        }

        Ok(Resolution {
            module: descriptor.module.clone(),
            version: descriptor.version.clone(),
            group: descriptor.group.clone(),
            manifests,
        })
    }

    /// Resolve a single variant of `descriptor`.
    ///
    /// # Errors
    ///
    /// As [`Resolver::resolve`], plus [`ConfigError::UnknownVariant`].
    pub fn resolve_variant(
        &self,
        descriptor: &PackageDescriptor,
        variant: &str,
    ) -> Result<ResolvedManifest, ConfigError> {
        validate(descriptor)?;
        let spec = descriptor
            .variant(variant)
            .ok_or_else(|| ConfigError::UnknownVariant(variant.to_string()))?;
        let cache = self.load(descriptor, std::iter::once(spec))?;
        self.resolve_with(descriptor, spec, &cache)
    }

    /// Look up each distinct artifact needed by `variants` exactly once.
    fn load<'d>(
        &self,
        descriptor: &'d PackageDescriptor,
        variants: impl Iterator<Item = &'d VariantSpec>,
    ) -> Result<HashMap<&'d ArtifactRef, FileSet>, ConfigError> {
        let variant_artifacts: Vec<&ArtifactRef> =
            variants.flat_map(|v| v.artifacts.iter()).collect();
        let wanted = descriptor.artifacts.iter().chain(variant_artifacts);

        let blacklist = compile_patterns(&descriptor.blacklist)?;
        let mut cache = HashMap::new();
        for artifact in wanted {
            if cache.contains_key(artifact) {
                continue;
            }
            if let Some(pattern) = blacklist.iter().find(|p| p.matches(artifact.as_str())) {
                return Err(ConfigError::Blacklisted {
                    artifact: artifact.clone(),
                    pattern: pattern.as_str().to_string(),
                });
            }
            let files = self.lookup.lookup(artifact).map_err(|source| {
                ConfigError::UnresolvableArtifact {
                    artifact: artifact.clone(),
                    source,
                }
            })?;
            debug!(artifact = %artifact, files = files.len(), "artifact resolved");
            cache.insert(artifact, files);
        }
        Ok(cache)
    }

    fn resolve_with(
        &self,
        descriptor: &PackageDescriptor,
        variant: &VariantSpec,
        cache: &HashMap<&ArtifactRef, FileSet>,
    ) -> Result<ResolvedManifest, ConfigError> {
        let include = compile_patterns(&variant.include)?;
        let exclude = compile_patterns(&variant.exclude)?;
        let relocator = Relocator::new(&descriptor.relocations);

        let mut entries: Vec<ManifestEntry> = Vec::new();
        let mut index: HashMap<EntryPath, usize> = HashMap::new();

        for artifact in descriptor.artifacts.iter().chain(&variant.artifacts) {
            let Some(files) = cache.get(artifact) else {
                return Err(ConfigError::UnresolvableArtifact {
                    artifact: artifact.clone(),
                    source: crate::lookup::LookupError::NotFound(artifact.to_string()),
                });
            };

            for (name, data) in files.files() {
                let original = EntryPath::new(name).map_err(|source| ConfigError::InvalidPath {
                    artifact: artifact.clone(),
                    source,
                })?;
                if is_stripped(&original) {
                    continue;
                }
                if !include.is_empty() && !include.iter().any(|p| p.matches(original.as_str())) {
                    continue;
                }
                if exclude.iter().any(|p| p.matches(original.as_str())) {
                    continue;
                }

                let (relocated, data) = relocator.relocate_entry(original.as_str(), data);
                let path = EntryPath::new(&relocated).map_err(|source| ConfigError::InvalidPath {
                    artifact: artifact.clone(),
                    source,
                })?;
                let source = EntrySource::new(Origin::Artifact(artifact.clone()), data);

                match index.get(&path) {
                    None => {
                        index.insert(path.clone(), entries.len());
                        entries.push(ManifestEntry::new(path, source));
                    }
                    Some(&at) => {
                        let existing = &mut entries[at];
                        if self.mergeable.is_mergeable(&path) {
                            debug!(path = %path, artifact = %artifact, "merging entry");
                            existing.push_source(source);
                        } else if existing.content().as_ref() == source.data.as_ref() {
                            debug!(path = %path, artifact = %artifact, "dropping identical duplicate");
                        } else {
                            return Err(ConfigError::ConflictingEntries {
                                path,
                                first: existing.sources()[0].origin.clone(),
                                second: source.origin,
                            });
                        }
                    }
                }
            }
        }

        let artifact_id = descriptor.artifact_id(&variant.name);
        let id = BundleId::new(descriptor.group.as_deref(), &artifact_id, &descriptor.version);
        if let Some(dir) = pom::embedded_dir(&id) {
            let generated = [
                ("pom.properties", pom::render_properties(&id)),
                ("pom.xml", pom::render_pom(&id, &PomDetails::from_descriptor(descriptor))),
            ];
            for (file, content) in generated {
                let path = EntryPath::new(&format!("{dir}/{file}")).map_err(|source| {
                    ConfigError::InvalidPath {
                        artifact: ArtifactRef::new(&artifact_id),
                        source,
                    }
                })?;
                let entry =
                    ManifestEntry::new(path.clone(), EntrySource::new(Origin::Generated, content));
                match index.get(&path) {
                    Some(&at) => entries[at] = entry,
                    None => entries.push(entry),
                }
            }
        }

        let attributes = attributes(descriptor, variant, &artifact_id, &entries)?;
        let manifest = ResolvedManifest::new(entries, attributes)?;
        info!(
            module = %descriptor.module,
            variant = %variant.name,
            entries = manifest.len(),
            "variant resolved"
        );
        Ok(manifest)
    }
}

/// Resolve every variant of `descriptor` with the default mergeable predicate.
///
/// # Errors
///
/// See [`Resolver::resolve`].
pub fn resolve(
    descriptor: &PackageDescriptor,
    lookup: &dyn ArtifactLookup,
) -> Result<Resolution, ConfigError> {
    Resolver::new(lookup).resolve(descriptor)
}

fn validate(descriptor: &PackageDescriptor) -> Result<(), ConfigError> {
    if descriptor.module.trim().is_empty() {
        return Err(ConfigError::MissingField("module"));
    }
    if descriptor.version.trim().is_empty() {
        return Err(ConfigError::MissingField("version"));
    }
    if descriptor.variants.is_empty() {
        return Err(ConfigError::MissingField("variants"));
    }
    StructuredVersion::parse(&descriptor.version)?;

    let group = descriptor.group.as_deref();
    BundleId::new(group, &descriptor.module, &descriptor.version).validate()?;

    let mut seen = HashSet::new();
    for variant in &descriptor.variants {
        if !seen.insert(variant.name.as_str()) {
            return Err(ConfigError::DuplicateVariant(variant.name.to_string()));
        }
        let artifact_id = descriptor.artifact_id(&variant.name);
        BundleId::new(group, &artifact_id, &descriptor.version).validate()?;
    }
    Ok(())
}

fn compile_patterns(patterns: &[String]) -> Result<Vec<Pattern>, ConfigError> {
    patterns
        .iter()
        .map(|p| {
            Pattern::new(p).map_err(|e| ConfigError::InvalidPattern {
                pattern: p.clone(),
                reason: e.msg.to_string(),
            })
        })
        .collect()
}

/// Jar manifests and signatures of input artifacts never carry over.
fn is_stripped(path: &EntryPath) -> bool {
    let p = path.as_str();
    if p.eq_ignore_ascii_case(forge_schema::MANIFEST_PATH) {
        return true;
    }
    match p.strip_prefix("META-INF/") {
        Some(rest) if !rest.contains('/') => {
            let upper = rest.to_ascii_uppercase();
            upper.ends_with(".SF") || upper.ends_with(".DSA") || upper.ends_with(".RSA")
        }
        _ => false,
    }
}

fn exported_packages(entries: &[ManifestEntry]) -> BTreeSet<String> {
    entries
        .iter()
        .filter(|e| e.path().as_str().ends_with(".class"))
        .filter(|e| !e.path().starts_with("META-INF/") && !e.path().starts_with("OSGI-INF/"))
        .filter_map(|e| e.path().parent())
        .map(|parent| parent.replace('/', "."))
        .collect()
}

fn attributes(
    descriptor: &PackageDescriptor,
    variant: &VariantSpec,
    artifact_id: &str,
    entries: &[ManifestEntry],
) -> Result<Vec<(String, String)>, ConfigError> {
    let version = StructuredVersion::parse(&descriptor.version)?;
    let osgi_version = version.to_osgi();
    let symbolic_name = match &descriptor.group {
        Some(group) => format!("{group}.{artifact_id}"),
        None => artifact_id.to_string(),
    };

    let mut attributes: Vec<(String, String)> = vec![
        ("Manifest-Version".into(), "1.0".into()),
        ("Bundle-ManifestVersion".into(), "2".into()),
        ("Bundle-SymbolicName".into(), symbolic_name),
        ("Bundle-Name".into(), artifact_id.to_string()),
        ("Bundle-Version".into(), osgi_version.clone()),
        ("Implementation-Title".into(), artifact_id.to_string()),
        ("Implementation-Version".into(), descriptor.version.clone()),
    ];

    let packages = exported_packages(entries);
    if !packages.is_empty() {
        let exports = packages
            .iter()
            .map(|p| format!("{p};version=\"{osgi_version}\""))
            .collect::<Vec<_>>()
            .join(",");
        attributes.push(("Export-Package".into(), exports));
    }

    for (key, value) in descriptor.metadata.iter().chain(&variant.metadata) {
        let position = attributes.iter().position(|(k, _)| k == key);
        match (position, value.is_empty()) {
            (Some(at), true) => {
                attributes.remove(at);
            }
            (Some(at), false) => attributes[at].1.clone_from(value),
            (None, true) => {}
            (None, false) => attributes.push((key.clone(), value.clone())),
        }
    }

    Ok(attributes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lookup::MemoryLookup;
    use crate::pom;
    use forge_schema::{ContentHash, Relocation};

    fn files(entries: &[(&str, &'static str)]) -> Vec<(String, &'static [u8])> {
        entries
            .iter()
            .map(|(p, d)| ((*p).to_string(), d.as_bytes()))
            .collect()
    }

    fn descriptor(artifacts: &[&str]) -> PackageDescriptor {
        let mut descriptor = PackageDescriptor::new("ehcache", "3.10.8");
        descriptor.artifacts = artifacts.iter().map(|a| ArtifactRef::new(a)).collect();
        descriptor
    }

    fn paths(manifest: &ResolvedManifest) -> Vec<&str> {
        manifest.entries().iter().map(|e| e.path().as_str()).collect()
    }

    #[test]
    fn resolve_is_deterministic() {
        let lookup = MemoryLookup::new()
            .with("core", files(&[("org/ehcache/Cache.class", "c"), ("org/ehcache/Impl.class", "i")]))
            .with("api", files(&[("org/ehcache/api/Api.class", "a")]));
        let descriptor = descriptor(&["core", "api"]);

        let first = resolve(&descriptor, &lookup).unwrap();
        let second = resolve(&descriptor, &lookup).unwrap();
        let a = first.manifest("default").unwrap();
        let b = second.manifest("default").unwrap();

        assert_eq!(paths(a), paths(b));
        assert_eq!(a.checksums(), b.checksums());
        assert!(a.is_consistent());
        assert_eq!(
            paths(a),
            ["org/ehcache/Cache.class", "org/ehcache/Impl.class", "org/ehcache/api/Api.class"]
        );
    }

    #[test]
    fn missing_fields_are_reported() {
        let lookup = MemoryLookup::new();
        let mut d = descriptor(&[]);
        d.module.clear();
        assert!(matches!(resolve(&d, &lookup), Err(ConfigError::MissingField("module"))));

        let mut d = descriptor(&[]);
        d.variants.clear();
        assert!(matches!(resolve(&d, &lookup), Err(ConfigError::MissingField("variants"))));
    }

    #[test]
    fn unresolvable_artifacts_fail() {
        let lookup = MemoryLookup::new();
        let d = descriptor(&["nowhere"]);
        assert!(matches!(
            resolve(&d, &lookup),
            Err(ConfigError::UnresolvableArtifact { .. })
        ));
    }

    #[test]
    fn relocation_uses_first_declared_rule() {
        let lookup = MemoryLookup::new().with("core", files(&[("com/old/sub/Foo.class", "foo")]));
        let mut d = descriptor(&["core"]);
        d.relocations = vec![
            Relocation::new("com/old/", "com/new/"),
            Relocation::new("com/old/sub/", "com/special/"),
        ];

        let manifest = Resolver::new(&lookup).resolve_variant(&d, "default").unwrap();
        assert_eq!(paths(&manifest), ["com/new/sub/Foo.class"]);
        assert!(manifest.entries().iter().all(|e| !e.path().starts_with("com/old/")));
    }

    #[test]
    fn identical_duplicates_are_deduplicated() {
        let lookup = MemoryLookup::new()
            .with("a", files(&[("LICENSE", "apache"), ("a/A.class", "a")]))
            .with("b", files(&[("LICENSE", "apache"), ("b/B.class", "b")]));
        let manifest = Resolver::new(&lookup)
            .resolve_variant(&descriptor(&["a", "b"]), "default")
            .unwrap();
        assert_eq!(paths(&manifest), ["LICENSE", "a/A.class", "b/B.class"]);
    }

    #[test]
    fn differing_duplicates_conflict() {
        let lookup = MemoryLookup::new()
            .with("a", files(&[("LICENSE", "apache")]))
            .with("b", files(&[("LICENSE", "mit")]));
        let err = resolve(&descriptor(&["a", "b"]), &lookup).unwrap_err();
        match err {
            ConfigError::ConflictingEntries { path, first, second } => {
                assert_eq!(path.as_str(), "LICENSE");
                assert_eq!(first, Origin::Artifact(ArtifactRef::new("a")));
                assert_eq!(second, Origin::Artifact(ArtifactRef::new("b")));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn service_files_merge_in_artifact_order() {
        let spi = "META-INF/services/org.example.Spi";
        let lookup = MemoryLookup::new()
            .with("a", files(&[(spi, "org.a.Impl\n")]))
            .with("b", files(&[(spi, "org.b.Impl\n")]));
        let manifest = Resolver::new(&lookup)
            .resolve_variant(&descriptor(&["a", "b"]), "default")
            .unwrap();

        let entry = manifest.get(spi).unwrap();
        assert!(entry.is_merged());
        assert_eq!(entry.content().as_ref(), b"org.a.Impl\norg.b.Impl\n");
        assert_eq!(
            manifest.checksum(spi),
            Some(&ContentHash::compute(b"org.a.Impl\norg.b.Impl\n"))
        );
    }

    #[test]
    fn custom_mergeable_predicate() {
        let lookup = MemoryLookup::new()
            .with("a", files(&[("NOTICE", "a")]))
            .with("b", files(&[("NOTICE", "b")]));
        let notices = |p: &EntryPath| p.as_str() == "NOTICE";
        let manifest = Resolver::new(&lookup)
            .with_mergeable(&notices)
            .resolve_variant(&descriptor(&["a", "b"]), "default")
            .unwrap();
        assert_eq!(manifest.get("NOTICE").unwrap().content().as_ref(), b"a\nb\n");
    }

    #[test]
    fn signatures_and_manifests_are_stripped() {
        let lookup = MemoryLookup::new().with(
            "signed",
            files(&[
                ("META-INF/MANIFEST.MF", "Manifest-Version: 1.0"),
                ("META-INF/SIGNER.SF", "sig"),
                ("META-INF/SIGNER.RSA", "sig"),
                ("a/A.class", "a"),
            ]),
        );
        let manifest = Resolver::new(&lookup)
            .resolve_variant(&descriptor(&["signed"]), "default")
            .unwrap();
        assert_eq!(paths(&manifest), ["a/A.class"]);
    }

    #[test]
    fn variant_filters_and_extra_artifacts() {
        let lookup = MemoryLookup::new()
            .with("core", files(&[("a/A.class", "a"), ("docs/index.html", "<html>")]))
            .with("ee", files(&[("ee/Enterprise.class", "e")]));
        let mut d = descriptor(&["core"]);
        let mut ee = VariantSpec::named(VariantName::new("ee").unwrap());
        ee.exclude = vec!["**/*.html".to_string()];
        ee.artifacts = vec![ArtifactRef::new("ee")];
        d.variants.push(ee);

        let resolution = resolve(&d, &lookup).unwrap();
        assert_eq!(
            paths(resolution.manifest("default").unwrap()),
            ["a/A.class", "docs/index.html"]
        );
        assert_eq!(
            paths(resolution.manifest("ee").unwrap()),
            ["a/A.class", "ee/Enterprise.class"]
        );
        assert_eq!(
            resolution.artifact_id(&VariantName::new("ee").unwrap()),
            "ehcache-ee"
        );
    }

    #[test]
    fn include_filters_keep_only_matches() {
        let lookup =
            MemoryLookup::new().with("core", files(&[("a/A.class", "a"), ("b/B.txt", "b")]));
        let mut d = descriptor(&["core"]);
        d.variants[0].include = vec!["*.class".to_string()];
        let manifest = Resolver::new(&lookup).resolve_variant(&d, "default").unwrap();
        assert_eq!(paths(&manifest), ["a/A.class"]);
    }

    #[test]
    fn invalid_globs_are_config_errors() {
        let lookup = MemoryLookup::new().with("core", files(&[("a", "a")]));
        let mut d = descriptor(&["core"]);
        d.variants[0].exclude = vec!["[".to_string()];
        assert!(matches!(
            resolve(&d, &lookup),
            Err(ConfigError::InvalidPattern { .. })
        ));
    }

    #[test]
    fn blacklisted_artifacts_are_rejected() {
        let lookup = MemoryLookup::new().with("javax.xml.bind:jaxb-api:2.3.1", files(&[("a", "a")]));
        let mut d = descriptor(&["javax.xml.bind:jaxb-api:2.3.1"]);
        d.blacklist = vec!["javax.xml.bind:*".to_string()];
        assert!(matches!(
            resolve(&d, &lookup),
            Err(ConfigError::Blacklisted { .. })
        ));
    }

    #[test]
    fn attributes_and_generated_pom_properties() {
        let lookup = MemoryLookup::new().with(
            "core",
            files(&[("org/ehcache/Cache.class", "c"), ("org/ehcache/core/Impl.class", "i")]),
        );
        let mut d = descriptor(&["core"]);
        d.version = "3.10.8-SNAPSHOT".to_string();
        d.group = Some("org.ehcache".to_string());
        d.metadata.insert("Bundle-Vendor".into(), "Terracotta".into());
        d.metadata.insert("Implementation-Title".into(), String::new());

        let manifest = Resolver::new(&lookup).resolve_variant(&d, "default").unwrap();
        assert_eq!(manifest.attribute("Manifest-Version"), Some("1.0"));
        assert_eq!(manifest.attribute("Bundle-SymbolicName"), Some("org.ehcache.ehcache"));
        assert_eq!(manifest.attribute("Bundle-Version"), Some("3.10.8.SNAPSHOT"));
        assert_eq!(
            manifest.attribute("Export-Package"),
            Some(
                "org.ehcache;version=\"3.10.8.SNAPSHOT\",org.ehcache.core;version=\"3.10.8.SNAPSHOT\""
            )
        );
        assert_eq!(manifest.attribute("Bundle-Vendor"), Some("Terracotta"));
        assert_eq!(manifest.attribute("Implementation-Title"), None);

        let pom = manifest
            .get("META-INF/maven/org.ehcache/ehcache/pom.properties")
            .unwrap();
        assert_eq!(
            pom.content().as_ref(),
            b"groupId=org.ehcache\nartifactId=ehcache\nversion=3.10.8-SNAPSHOT\n"
        );
        assert_eq!(pom.sources()[0].origin, Origin::Generated);
    }

    #[test]
    fn generated_pom_xml_carries_descriptor_details() {
        let lookup = MemoryLookup::new().with("core", files(&[("org/ehcache/Cache.class", "c")]));
        let mut d = descriptor(&["core"]);
        d.group = Some("org.ehcache".to_string());
        d.name = Some("Ehcache".to_string());
        d.description = Some("Ehcache single jar, containing all modules".to_string());
        d.variants.push(VariantSpec::named(VariantName::new("ee").unwrap()));

        let resolution = resolve(&d, &lookup).unwrap();
        let default = resolution.manifest("default").unwrap();
        assert_eq!(
            paths(default),
            [
                "org/ehcache/Cache.class",
                "META-INF/maven/org.ehcache/ehcache/pom.properties",
                "META-INF/maven/org.ehcache/ehcache/pom.xml",
            ]
        );

        let pom = default.get("META-INF/maven/org.ehcache/ehcache/pom.xml").unwrap();
        let text = String::from_utf8(pom.content().to_vec()).unwrap();
        assert_eq!(
            text,
            pom::render_pom(
                &resolution.bundle_id(&VariantName::default_variant()),
                &PomDetails::from_descriptor(&d)
            )
        );
        assert!(text.contains("<artifactId>ehcache</artifactId>"));
        assert!(text.contains("<name>Ehcache</name>"));
        assert!(text.contains("<description>Ehcache single jar, containing all modules</description>"));

        let ee = resolution.manifest("ee").unwrap();
        let ee_pom = ee.get("META-INF/maven/org.ehcache/ehcache-ee/pom.xml").unwrap();
        assert!(
            String::from_utf8(ee_pom.content().to_vec())
                .unwrap()
                .contains("<artifactId>ehcache-ee</artifactId>")
        );
    }

    #[test]
    fn no_maven_metadata_without_group() {
        let lookup = MemoryLookup::new().with("core", files(&[("a/A.class", "a")]));
        let manifest = Resolver::new(&lookup)
            .resolve_variant(&descriptor(&["core"]), "default")
            .unwrap();
        assert_eq!(paths(&manifest), ["a/A.class"]);
    }

    #[test]
    fn dotted_relocations_from_toml_move_entries() {
        let lookup = MemoryLookup::new().with(
            "core",
            files(&[
                ("org/terracotta/Stats.class", "stats"),
                ("META-INF/services/org.terracotta.Spi", "org.terracotta.Impl\n"),
            ]),
        );
        let d: PackageDescriptor = toml::from_str(
            r#"
            module = "ehcache"
            version = "3.10.8"
            artifacts = ["core"]

            [[relocations]]
            from = "org.terracotta."
            to = "shaded.org.terracotta."
            "#,
        )
        .unwrap();

        let manifest = Resolver::new(&lookup).resolve_variant(&d, "default").unwrap();
        assert_eq!(
            paths(&manifest),
            [
                "META-INF/services/shaded.org.terracotta.Spi",
                "shaded/org/terracotta/Stats.class",
            ]
        );
        let spi = manifest.get("META-INF/services/shaded.org.terracotta.Spi").unwrap();
        assert_eq!(spi.content().as_ref(), b"shaded.org.terracotta.Impl\n");
    }

    #[test]
    fn coordinates_that_escape_paths_are_rejected() {
        let lookup = MemoryLookup::new();
        let invalid = |d: &PackageDescriptor| match resolve(d, &lookup) {
            Err(ConfigError::InvalidCoordinate(e)) => e.field,
            other => panic!("expected InvalidCoordinate, got {:?}", other.map(|r| r.module().to_string())),
        };

        let mut d = descriptor(&[]);
        d.module = "../escaped".to_string();
        assert_eq!(invalid(&d), "artifactId");

        let mut d = descriptor(&[]);
        d.group = Some("org/../../etc".to_string());
        assert_eq!(invalid(&d), "group");

        let mut d = descriptor(&[]);
        d.group = Some("org..ehcache".to_string());
        assert_eq!(invalid(&d), "group");

        let mut d = descriptor(&[]);
        d.version = "1.0/../../x".to_string();
        assert!(resolve(&d, &lookup).is_err());

        let mut d = descriptor(&[]);
        d.version = "1.0+a/b".to_string();
        assert!(resolve(&d, &lookup).is_err());
    }

    #[test]
    fn duplicate_variants_are_rejected() {
        let lookup = MemoryLookup::new();
        let mut d = descriptor(&[]);
        d.variants.push(VariantSpec::named(VariantName::default_variant()));
        assert!(matches!(
            resolve(&d, &lookup),
            Err(ConfigError::DuplicateVariant(_))
        ));
    }
}
