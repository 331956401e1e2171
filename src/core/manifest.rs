//! Bundle manifest parsing.
//!
//! A manifest is a flat list of `Name: value` attributes. Long values wrap
//! onto continuation lines that start with a single space. The dependency
//! headers (`Require-Bundle`, `Import-Package`, `Export-Package`,
//! `Fragment-Host`) are comma-separated clause lists where each clause is
//! `target;param=value;directive:=value`.

use std::collections::BTreeMap;

use crate::core::version::VersionRange;

pub const BUNDLE_SYMBOLIC_NAME: &str = "Bundle-SymbolicName";
pub const BUNDLE_VERSION: &str = "Bundle-Version";
pub const REQUIRE_BUNDLE: &str = "Require-Bundle";
pub const IMPORT_PACKAGE: &str = "Import-Package";
pub const EXPORT_PACKAGE: &str = "Export-Package";
pub const FRAGMENT_HOST: &str = "Fragment-Host";

/// Raw manifest attributes, keyed by attribute name.
pub type Attributes = BTreeMap<String, String>;

/// Parse the text of a manifest file into attributes.
///
/// Malformed lines (no `:` separator) are skipped. A repeated attribute keeps
/// the last value.
pub fn parse_manifest(text: &str) -> Attributes {
    let mut attrs = Attributes::new();
    let mut current: Option<(String, String)> = None;

    for line in text.lines() {
        let line = line.trim_end_matches('\r');
        if let Some(continuation) = line.strip_prefix(' ') {
            if let Some((_, value)) = current.as_mut() {
                value.push_str(continuation);
            }
            continue;
        }

        if let Some((name, value)) = current.take() {
            attrs.insert(name, value);
        }

        if line.is_empty() {
            continue;
        }

        match line.split_once(':') {
            Some((name, value)) => {
                current = Some((name.trim().to_string(), value.trim_start().to_string()));
            }
            None => tracing::debug!("skipping malformed manifest line: {}", line),
        }
    }

    if let Some((name, value)) = current {
        attrs.insert(name, value);
    }

    attrs
}

/// One clause of a header: the target names plus their shared parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Clause {
    /// Names the parameters apply to (`a;b;version=1` names both `a` and `b`)
    pub names: Vec<String>,
    /// Attributes (`key=value`) and directives (`key:=value`), unquoted
    pub params: BTreeMap<String, String>,
}

impl Clause {
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    pub fn version_range(&self) -> Option<VersionRange> {
        self.param("version")
            .or_else(|| self.param("bundle-version"))
            .map(VersionRange::parse)
    }
}

/// Split a header value on `sep`, ignoring separators inside quotes.
fn split_unquoted(value: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut in_quotes = false;
    let mut start = 0;

    for (i, c) in value.char_indices() {
        if c == '"' {
            in_quotes = !in_quotes;
        } else if c == sep && !in_quotes {
            parts.push(&value[start..i]);
            start = i + c.len_utf8();
        }
    }
    parts.push(&value[start..]);
    parts
}

/// Parse a clause-list header.
///
/// Parameters may appear in any order and quoted values may contain commas
/// and semicolons (`version="[1.0,2.0)"`).
pub fn parse_clauses(value: &str) -> Vec<Clause> {
    let mut clauses = Vec::new();

    for raw in split_unquoted(value, ',') {
        let raw = raw.trim();
        if raw.is_empty() {
            continue;
        }

        let mut names = Vec::new();
        let mut params = BTreeMap::new();

        for token in split_unquoted(raw, ';') {
            let token = token.trim();
            if token.is_empty() {
                continue;
            }
            let (key, val) = match token.find(":=") {
                Some(pos) => (&token[..pos], &token[pos + 2..]),
                None => match token.find('=') {
                    Some(pos) => (&token[..pos], &token[pos + 1..]),
                    None => {
                        names.push(token.to_string());
                        continue;
                    }
                },
            };
            params.insert(
                key.trim().to_string(),
                val.trim().trim_matches('"').to_string(),
            );
        }

        if !names.is_empty() {
            clauses.push(Clause { names, params });
        }
    }

    clauses
}

/// A `Require-Bundle` entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequiredBundle {
    pub id: String,
    pub reexport: bool,
}

/// Parse `Require-Bundle` entries.
pub fn required_bundles(attrs: &Attributes) -> Vec<RequiredBundle> {
    let Some(value) = attrs.get(REQUIRE_BUNDLE) else {
        return Vec::new();
    };

    parse_clauses(value)
        .into_iter()
        .flat_map(|clause| {
            let reexport = clause.param("visibility") == Some("reexport");
            clause
                .names
                .into_iter()
                .map(move |id| RequiredBundle { id, reexport })
        })
        .collect()
}

/// A package named by `Import-Package` or `Export-Package`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageRef {
    pub name: String,
    pub range: Option<VersionRange>,
}

fn package_refs(attrs: &Attributes, header: &str) -> Vec<PackageRef> {
    let Some(value) = attrs.get(header) else {
        return Vec::new();
    };

    parse_clauses(value)
        .into_iter()
        .flat_map(|clause| {
            let range = clause.version_range();
            clause.names.into_iter().map(move |name| PackageRef {
                name,
                range: range.clone(),
            })
        })
        .collect()
}

pub fn imported_packages(attrs: &Attributes) -> Vec<PackageRef> {
    package_refs(attrs, IMPORT_PACKAGE)
}

pub fn exported_packages(attrs: &Attributes) -> Vec<PackageRef> {
    package_refs(attrs, EXPORT_PACKAGE)
}

/// The host id of a fragment bundle.
pub fn fragment_host(attrs: &Attributes) -> Option<String> {
    attrs
        .get(FRAGMENT_HOST)
        .and_then(|v| parse_clauses(v).into_iter().next())
        .and_then(|c| c.names.into_iter().next())
}

/// The bundle id, without `;singleton:=true` and similar directives.
pub fn symbolic_name(attrs: &Attributes) -> Option<String> {
    attrs
        .get(BUNDLE_SYMBOLIC_NAME)
        .and_then(|v| parse_clauses(v).into_iter().next())
        .and_then(|c| c.names.into_iter().next())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_manifest_continuations() {
        let text = "Manifest-Version: 1.0\r\n\
                    Bundle-SymbolicName: org.example.core;singleton:=true\r\n\
                    Require-Bundle: org.example.base,\r\n org.example.util\r\n\
                    \r\n";
        let attrs = parse_manifest(text);
        assert_eq!(attrs["Manifest-Version"], "1.0");
        assert_eq!(attrs[REQUIRE_BUNDLE], "org.example.base,org.example.util");
        assert_eq!(symbolic_name(&attrs).as_deref(), Some("org.example.core"));
    }

    #[test]
    fn test_required_bundles_with_quoted_params() {
        let mut attrs = Attributes::new();
        attrs.insert(
            REQUIRE_BUNDLE.into(),
            "a.b;bundle-version=\"[1.0,2.0)\";visibility:=reexport,c.d;resolution:=optional,e"
                .into(),
        );
        let reqs = required_bundles(&attrs);
        assert_eq!(reqs.len(), 3);
        assert_eq!(reqs[0].id, "a.b");
        assert!(reqs[0].reexport);
        assert_eq!(reqs[1].id, "c.d");
        assert!(!reqs[1].reexport);
        assert!(!reqs[2].reexport);
    }

    #[test]
    fn test_packages_shared_params_any_order() {
        let mut attrs = Attributes::new();
        attrs.insert(
            IMPORT_PACKAGE.into(),
            "p.one;p.two;resolution:=optional;version=\"[1.1,2)\",p.three;version=\"2.0\"".into(),
        );
        let imports = imported_packages(&attrs);
        let names: Vec<_> = imports.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["p.one", "p.two", "p.three"]);
        assert_eq!(imports[1].range.as_ref().unwrap().to_string(), "[1.1.0,2.0.0)");
    }

    #[test]
    fn test_fragment_host() {
        let mut attrs = Attributes::new();
        attrs.insert(FRAGMENT_HOST.into(), "org.host;bundle-version=\"3.0.0\"".into());
        assert_eq!(fragment_host(&attrs).as_deref(), Some("org.host"));
    }
}
