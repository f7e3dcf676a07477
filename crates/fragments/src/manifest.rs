//! `fragments.toml` schema.
//!
//! ```toml
//! name = "lattices"
//! description = "extra lattices"
//!
//! [[geometries]]
//! name = "honeycomb"
//! source = "honeycomb.glsl"
//!
//! [[projections]]
//! name = "fisheye"
//! source = "fisheye.glsl"
//! ```

use std::collections::BTreeSet;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

pub const MANIFEST_FILE: &str = "fragments.toml";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FragmentManifest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub geometries: Vec<FragmentDecl>,
    #[serde(default)]
    pub projections: Vec<FragmentDecl>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FragmentDecl {
    pub name: String,
    /// Path relative to the pack root.
    pub source: PathBuf,
    #[serde(default)]
    pub description: Option<String>,
}

impl FragmentManifest {
    /// Returns every problem found; an empty list means the manifest is
    /// usable.
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();
        if self.name.trim().is_empty() {
            issues.push("pack name must not be empty".to_string());
        }
        if self.geometries.is_empty() && self.projections.is_empty() {
            issues.push("manifest must declare at least one geometry or projection".to_string());
        }
        check_decls("geometry", &self.geometries, &mut issues);
        check_decls("projection", &self.projections, &mut issues);
        issues
    }
}

fn check_decls(kind: &str, decls: &[FragmentDecl], issues: &mut Vec<String>) {
    let mut seen = BTreeSet::new();
    for decl in decls {
        if !is_valid_name(&decl.name) {
            issues.push(format!(
                "{kind} name '{}' must be non-empty lowercase ascii, digits, '-' or '_'",
                decl.name
            ));
        }
        if !seen.insert(decl.name.as_str()) {
            issues.push(format!("{kind} '{}' is declared more than once", decl.name));
        }
        if decl.source.as_os_str().is_empty() {
            issues.push(format!("{kind} '{}' has an empty source path", decl.name));
        } else if decl.source.is_absolute() {
            issues.push(format!(
                "{kind} '{}' source must be relative to the pack root",
                decl.name
            ));
        }
    }
}

fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decl(name: &str, source: &str) -> FragmentDecl {
        FragmentDecl {
            name: name.into(),
            source: PathBuf::from(source),
            description: None,
        }
    }

    #[test]
    fn parses_declarations() {
        let manifest: FragmentManifest = toml::from_str(
            r#"
name = "extra"

[[geometries]]
name = "honeycomb"
source = "honeycomb.glsl"
description = "hex cells"

[[projections]]
name = "fisheye"
source = "proj/fisheye.glsl"
"#,
        )
        .expect("parse manifest");
        assert_eq!(manifest.geometries[0].description.as_deref(), Some("hex cells"));
        assert_eq!(manifest.projections[0].source, PathBuf::from("proj/fisheye.glsl"));
        assert!(manifest.validate().is_empty());
    }

    #[test]
    fn flags_empty_and_duplicate_entries() {
        let manifest = FragmentManifest {
            name: " ".into(),
            description: None,
            geometries: vec![decl("twin", "a.glsl"), decl("twin", "b.glsl")],
            projections: vec![decl("Bad Name", "")],
        };
        let issues = manifest.validate();
        assert!(issues.iter().any(|issue| issue.contains("pack name")));
        assert!(issues.iter().any(|issue| issue.contains("more than once")));
        assert!(issues.iter().any(|issue| issue.contains("'Bad Name'")));
        assert!(issues.iter().any(|issue| issue.contains("empty source")));
    }

    #[test]
    fn requires_at_least_one_fragment() {
        let manifest = FragmentManifest {
            name: "hollow".into(),
            ..FragmentManifest::default()
        };
        assert_eq!(manifest.validate().len(), 1);
    }
}
