//! Declarative packaging request.
//!
//! A [`PackageDescriptor`] is what the host build (or a `forge.toml` file)
//! hands to the resolver: which module to package, under which variants, from
//! which input artifacts, with which relocations and metadata.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::types::{ArtifactRef, PackagePrefix, VariantName};

/// One relocation rule: entries under `from` are moved under `to`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relocation {
    /// Prefix to match against entry paths.
    pub from: PackagePrefix,
    /// Replacement prefix.
    pub to: PackagePrefix,
}

impl Relocation {
    /// Create a rule from two prefixes.
    pub fn new(from: impl Into<PackagePrefix>, to: impl Into<PackagePrefix>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }
}

/// POM `<organization>` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Organization {
    /// Organization name.
    pub name: String,
    /// Organization home page.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// One POM `<developer>` entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Developer {
    /// Developer or team name.
    pub name: String,
    /// Contact address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Employing organization.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization: Option<String>,
}

/// A named packaging flavor and the filters that shape its contents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariantSpec {
    /// Variant name; also selects the artifact id suffix.
    pub name: VariantName,
    /// Glob patterns an entry path must match to be kept (empty keeps everything).
    #[serde(default)]
    pub include: Vec<String>,
    /// Glob patterns that drop matching entry paths.
    #[serde(default)]
    pub exclude: Vec<String>,
    /// Artifacts included only in this variant, after the common ones.
    #[serde(default)]
    pub artifacts: Vec<ArtifactRef>,
    /// Metadata overrides applied after the descriptor-wide ones.
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl VariantSpec {
    /// A variant with no filters and no extra artifacts.
    pub fn named(name: VariantName) -> Self {
        Self {
            name,
            include: Vec::new(),
            exclude: Vec::new(),
            artifacts: Vec::new(),
            metadata: BTreeMap::new(),
        }
    }
}

/// The packaging request for one module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageDescriptor {
    /// Module name; becomes the artifact id of the `default` variant.
    #[serde(default)]
    pub module: String,
    /// Module version.
    #[serde(default)]
    pub version: String,
    /// Maven group id, used for repository layout and `pom.properties`.
    #[serde(default)]
    pub group: Option<String>,
    /// Variants to produce. Defaults to a single `default` variant.
    #[serde(default = "default_variants")]
    pub variants: Vec<VariantSpec>,
    /// Artifacts included in every variant, in order.
    #[serde(default)]
    pub artifacts: Vec<ArtifactRef>,
    /// Relocation rules in declaration order; the first matching rule wins.
    #[serde(default)]
    pub relocations: Vec<Relocation>,
    /// Manifest header overrides applied to every variant.
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
    /// Glob patterns over artifact references that must never be packaged.
    #[serde(default)]
    pub blacklist: Vec<String>,
    /// Human-readable project name for the generated POM.
    #[serde(default)]
    pub name: Option<String>,
    /// Project description for the generated POM.
    #[serde(default)]
    pub description: Option<String>,
    /// Organization recorded in the generated POM.
    #[serde(default)]
    pub organization: Option<Organization>,
    /// Developers recorded in the generated POM.
    #[serde(default)]
    pub developers: Vec<Developer>,
}

fn default_variants() -> Vec<VariantSpec> {
    vec![VariantSpec::named(VariantName::default_variant())]
}

impl PackageDescriptor {
    /// A descriptor with a single `default` variant and no inputs.
    pub fn new(module: &str, version: &str) -> Self {
        Self {
            module: module.to_string(),
            version: version.to_string(),
            group: None,
            variants: default_variants(),
            artifacts: Vec::new(),
            relocations: Vec::new(),
            metadata: BTreeMap::new(),
            blacklist: Vec::new(),
            name: None,
            description: None,
            organization: None,
            developers: Vec::new(),
        }
    }

    /// Look up a variant by name.
    pub fn variant(&self, name: &str) -> Option<&VariantSpec> {
        self.variants.iter().find(|v| v.name.as_str() == name)
    }

    /// Artifact id for a variant: the module for `default`, `<module>-<variant>` otherwise.
    pub fn artifact_id(&self, variant: &VariantName) -> String {
        if variant.is_default() {
            self.module.clone()
        } else {
            format!("{}-{}", self.module, variant)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_from_toml() {
        let text = r#"
            module = "ehcache"
            version = "3.10.8"
            group = "org.ehcache"
            artifacts = ["org.ehcache:ehcache-core:3.10.8"]

            [[relocations]]
            from = "org.terracotta.statistics."
            to = "org/ehcache/shadow/org/terracotta/statistics/"

            [metadata]
            "Bundle-Vendor" = "Terracotta"

            [organization]
            name = "Terracotta Inc., a wholly-owned subsidiary of Software AG USA, Inc."
            url = "http://terracotta.org"

            [[developers]]
            name = "Terracotta Engineers"
            email = "tc-oss@softwareag.com"

            [[variants]]
            name = "default"

            [[variants]]
            name = "ee"
            exclude = ["**/*.html"]
            artifacts = ["libs/ee-extras"]
        "#;

        let descriptor: PackageDescriptor = toml::from_str(text).unwrap();
        assert_eq!(descriptor.module, "ehcache");
        assert_eq!(descriptor.variants.len(), 2);
        assert_eq!(
            descriptor.relocations[0].from.as_str(),
            "org/terracotta/statistics/"
        );
        assert_eq!(
            descriptor.organization.as_ref().and_then(|o| o.url.as_deref()),
            Some("http://terracotta.org")
        );
        assert_eq!(descriptor.developers[0].name, "Terracotta Engineers");
        assert_eq!(descriptor.name, None);
        let ee = descriptor.variant("ee").unwrap();
        assert_eq!(ee.exclude, vec!["**/*.html".to_string()]);
        assert_eq!(descriptor.artifact_id(&ee.name), "ehcache-ee");
        assert_eq!(
            descriptor.artifact_id(&VariantName::default_variant()),
            "ehcache"
        );
    }

    #[test]
    fn variants_default_to_single_default() {
        let descriptor: PackageDescriptor =
            toml::from_str("module = \"m\"\nversion = \"1\"").unwrap();
        assert_eq!(descriptor.variants.len(), 1);
        assert!(descriptor.variants[0].name.is_default());
    }

    #[test]
    fn invalid_variant_name_fails_to_parse() {
        let result: Result<PackageDescriptor, _> =
            toml::from_str("module = \"m\"\nversion = \"1\"\n[[variants]]\nname = \"a/b\"");
        assert!(result.is_err());
    }
}
