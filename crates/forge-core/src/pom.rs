//! Maven metadata embedded in bundles and uploaded next to them.
//!
//! Every bundle with a group carries
//! `META-INF/maven/<group>/<artifactId>/pom.properties` and `pom.xml`. The
//! repository target uploads that same `pom.xml` as `<artifactId>-<version>.pom`.

use std::fmt::Write;

use forge_schema::{Developer, Organization, PackageDescriptor};

use crate::bundle::BundleId;

/// Descriptive POM content beyond the coordinates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PomDetails {
    pub name: Option<String>,
    pub description: Option<String>,
    pub organization: Option<Organization>,
    pub developers: Vec<Developer>,
}

impl PomDetails {
    pub fn from_descriptor(descriptor: &PackageDescriptor) -> Self {
        Self {
            name: descriptor.name.clone(),
            description: descriptor.description.clone(),
            organization: descriptor.organization.clone(),
            developers: descriptor.developers.clone(),
        }
    }
}

/// `META-INF/maven/<group>/<artifactId>`, or `None` without a group.
pub fn embedded_dir(id: &BundleId) -> Option<String> {
    id.group
        .as_ref()
        .map(|group| format!("META-INF/maven/{group}/{}", id.artifact_id))
}

/// Path of the embedded `pom.xml`.
pub fn embedded_pom_path(id: &BundleId) -> Option<String> {
    embedded_dir(id).map(|dir| format!("{dir}/pom.xml"))
}

pub fn render_properties(id: &BundleId) -> String {
    format!(
        "groupId={}\nartifactId={}\nversion={}\n",
        id.group.as_deref().unwrap_or(&id.artifact_id),
        id.artifact_id,
        id.version
    )
}

fn xml_escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            other => out.push(other),
        }
    }
    out
}

fn element(out: &mut String, indent: &str, tag: &str, value: &str) {
    let _ = writeln!(out, "{indent}<{tag}>{}</{tag}>", xml_escape(value));
}

/// Minimal POM describing a jar.
pub fn render_pom(id: &BundleId, details: &PomDetails) -> String {
    let mut pom = String::from(concat!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n",
        "<project xmlns=\"http://maven.apache.org/POM/4.0.0\" ",
        "xmlns:xsi=\"http://www.w3.org/2001/XMLSchema-instance\" ",
        "xsi:schemaLocation=\"http://maven.apache.org/POM/4.0.0 ",
        "https://maven.apache.org/xsd/maven-4.0.0.xsd\">\n",
    ));
    element(&mut pom, "  ", "modelVersion", "4.0.0");
    element(&mut pom, "  ", "groupId", id.group.as_deref().unwrap_or(&id.artifact_id));
    element(&mut pom, "  ", "artifactId", &id.artifact_id);
    element(&mut pom, "  ", "version", &id.version);
    element(&mut pom, "  ", "packaging", "jar");
    if let Some(name) = &details.name {
        element(&mut pom, "  ", "name", name);
    }
    if let Some(description) = &details.description {
        element(&mut pom, "  ", "description", description);
    }

    if let Some(org) = &details.organization {
        pom.push_str("  <organization>\n");
        element(&mut pom, "    ", "name", &org.name);
        if let Some(url) = &org.url {
            element(&mut pom, "    ", "url", url);
        }
        pom.push_str("  </organization>\n");
    }

    if !details.developers.is_empty() {
        pom.push_str("  <developers>\n");
        for dev in &details.developers {
            pom.push_str("    <developer>\n");
            element(&mut pom, "      ", "name", &dev.name);
            if let Some(email) = &dev.email {
                element(&mut pom, "      ", "email", email);
            }
            if let Some(org) = &dev.organization {
                element(&mut pom, "      ", "organization", org);
            }
            pom.push_str("    </developer>\n");
        }
        pom.push_str("  </developers>\n");
    }

    pom.push_str("</project>\n");
    pom
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pom_carries_descriptive_sections() {
        let details = PomDetails {
            name: Some("Ehcache".into()),
            description: Some("Caching <core>".into()),
            organization: Some(Organization {
                name: "Terracotta & Co".into(),
                url: Some("http://terracotta.org".into()),
            }),
            developers: vec![Developer {
                name: "Terracotta Engineers".into(),
                email: Some("dev@example.com".into()),
                organization: None,
            }],
        };
        let pom = render_pom(&BundleId::new(Some("org.ehcache"), "ehcache", "3.10.8"), &details);

        assert!(pom.contains("  <groupId>org.ehcache</groupId>\n"));
        assert!(pom.contains("  <name>Ehcache</name>\n"));
        assert!(pom.contains("<description>Caching &lt;core&gt;</description>"));
        assert!(pom.contains("<name>Terracotta &amp; Co</name>"));
        assert!(pom.contains("<email>dev@example.com</email>"));
        assert!(!pom.contains("<organization>Terracotta"));
        assert!(pom.ends_with("</project>\n"));
    }

    #[test]
    fn minimal_pom_has_only_coordinates() {
        let pom = render_pom(&BundleId::new(None, "tool", "1.0"), &PomDetails::default());
        assert!(pom.contains("<groupId>tool</groupId>"));
        assert!(!pom.contains("<name>"));
        assert!(!pom.contains("<developers>"));
    }

    #[test]
    fn embedded_paths_need_a_group() {
        let id = BundleId::new(Some("org.ehcache"), "ehcache-ee", "3.10.8");
        assert_eq!(
            embedded_pom_path(&id).as_deref(),
            Some("META-INF/maven/org.ehcache/ehcache-ee/pom.xml")
        );
        assert_eq!(
            render_properties(&id),
            "groupId=org.ehcache\nartifactId=ehcache-ee\nversion=3.10.8\n"
        );
        assert_eq!(embedded_dir(&BundleId::new(None, "tool", "1.0")), None);
    }
}
