//! Package relocation (shading).
//!
//! Rules are evaluated in declaration order and the first rule whose prefix
//! matches wins. A later rule with a longer, more specific prefix is never
//! preferred over an earlier match.

use std::borrow::Cow;

use bytes::Bytes;
use forge_schema::{Relocation, SERVICES_DIR};

/// Applies an ordered list of relocation rules to entry paths and class names.
#[derive(Debug, Clone, Default)]
pub struct Relocator {
    rules: Vec<Relocation>,
}

impl Relocator {
    pub fn new(rules: &[Relocation]) -> Self {
        Self {
            rules: rules.to_vec(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Relocate a `/`-separated entry path.
    pub fn relocate_path<'a>(&self, path: &'a str) -> Cow<'a, str> {
        for rule in &self.rules {
            if let Some(rest) = path.strip_prefix(rule.from.as_str()) {
                return Cow::Owned(format!("{}{rest}", rule.to.as_str()));
            }
        }
        Cow::Borrowed(path)
    }

    /// Relocate a dotted class name (`org.foo.Bar`).
    pub fn relocate_class<'a>(&self, class: &'a str) -> Cow<'a, str> {
        for rule in &self.rules {
            if let Some(rest) = class.strip_prefix(&rule.from.dotted()) {
                return Cow::Owned(format!("{}{rest}", rule.to.dotted()));
            }
        }
        Cow::Borrowed(class)
    }

    /// Relocate an entry: its path, and for service registration files also
    /// the service interface in the file name and the implementations listed
    /// inside.
    pub fn relocate_entry(&self, path: &str, data: &Bytes) -> (String, Bytes) {
        if self.is_empty() {
            return (path.to_string(), data.clone());
        }

        match path.strip_prefix(SERVICES_DIR) {
            Some(service) if !service.contains('/') => {
                let path = format!("{SERVICES_DIR}{}", self.relocate_class(service));
                (path, self.relocate_service_lines(data))
            }
            _ => (self.relocate_path(path).into_owned(), data.clone()),
        }
    }

    fn relocate_service_lines(&self, data: &Bytes) -> Bytes {
        let Ok(text) = std::str::from_utf8(data) else {
            return data.clone();
        };

        let mut changed = false;
        let mut out = String::with_capacity(text.len());
        for line in text.split_inclusive('\n') {
            let (body, ending) = match line.strip_suffix('\n') {
                Some(body) => (body, "\n"),
                None => (line, ""),
            };
            let class = body.trim();
            if class.is_empty() || class.starts_with('#') {
                out.push_str(line);
                continue;
            }
            match self.relocate_class(class) {
                Cow::Owned(relocated) => {
                    changed = true;
                    out.push_str(&relocated);
                    out.push_str(ending);
                }
                Cow::Borrowed(_) => out.push_str(line),
            }
        }

        if changed {
            Bytes::from(out)
        } else {
            data.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn relocator(rules: &[(&str, &str)]) -> Relocator {
        let rules: Vec<Relocation> = rules.iter().map(|(f, t)| Relocation::new(*f, *t)).collect();
        Relocator::new(&rules)
    }

    #[test]
    fn first_declared_rule_wins_over_longer_prefix() {
        let r = relocator(&[("com/old/", "com/new/"), ("com/old/sub/", "com/special/")]);
        assert_eq!(r.relocate_path("com/old/sub/Foo.class"), "com/new/sub/Foo.class");
    }

    #[test]
    fn longer_prefix_wins_when_declared_first() {
        let r = relocator(&[("com/old/sub/", "com/special/"), ("com/old/", "com/new/")]);
        assert_eq!(r.relocate_path("com/old/sub/Foo.class"), "com/special/Foo.class");
        assert_eq!(r.relocate_path("com/old/Bar.class"), "com/new/Bar.class");
    }

    #[test]
    fn unmatched_paths_are_borrowed() {
        let r = relocator(&[("com/old/", "com/new/")]);
        assert!(matches!(r.relocate_path("org/other/A.class"), Cow::Borrowed(_)));
    }

    #[test]
    fn service_files_relocate_name_and_contents() {
        let r = relocator(&[("org/terracotta/", "org/ehcache/shadow/org/terracotta/")]);
        let data = Bytes::from_static(b"# comment\norg.terracotta.Impl\ncom.other.Impl\n");
        let (path, content) = r.relocate_entry("META-INF/services/org.terracotta.Spi", &data);

        assert_eq!(path, "META-INF/services/org.ehcache.shadow.org.terracotta.Spi");
        assert_eq!(
            content.as_ref(),
            b"# comment\norg.ehcache.shadow.org.terracotta.Impl\ncom.other.Impl\n"
        );
    }

    #[test]
    fn empty_relocator_is_identity() {
        let r = Relocator::default();
        let data = Bytes::from_static(b"x");
        let (path, content) = r.relocate_entry("a/b", &data);
        assert_eq!(path, "a/b");
        assert_eq!(content, data);
    }
}
