//! Loads a fragment pack directory into memory.
//!
//! Loading reads `fragments.toml`, validates it, then reads every GLSL
//! source it declares. A manifest that points at a missing file fails the
//! whole pack, as does a source that does not define the entry point its
//! kind requires.

use std::fs;
use std::path::{Path, PathBuf};

use renderer::FragmentKind;
use thiserror::Error;
use tracing::debug;

use crate::manifest::{FragmentDecl, FragmentManifest, MANIFEST_FILE};
use crate::{GEOMETRY_ENTRY_POINT, PROJECTION_ENTRY_POINT};

#[derive(Debug, Error)]
pub enum PackError {
    #[error("manifest not found at {0}")]
    ManifestMissing(PathBuf),

    #[error("failed to parse manifest: {0}")]
    ManifestParse(#[from] toml::de::Error),

    #[error("manifest validation failed: {0:?}")]
    ManifestValidation(Vec<String>),

    #[error("{kind} `{name}` does not define `{symbol}`")]
    MissingEntryPoint {
        kind: FragmentKind,
        name: String,
        symbol: &'static str,
    },

    #[error("unable to locate fragment pack '{requested}'. searched roots: {roots:?}")]
    NotFound {
        requested: PathBuf,
        roots: Vec<PathBuf>,
    },

    #[error("invalid pack path: {0}")]
    Path(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// A fragment read from a pack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackFragment {
    pub name: String,
    pub description: Option<String>,
    pub path: PathBuf,
    pub code: String,
}

#[derive(Debug, Clone)]
pub struct FragmentPack {
    root: PathBuf,
    manifest: FragmentManifest,
    geometries: Vec<PackFragment>,
    projections: Vec<PackFragment>,
}

impl FragmentPack {
    pub fn load(root: impl AsRef<Path>) -> Result<Self, PackError> {
        let root = root.as_ref().to_path_buf();
        let manifest_path = root.join(MANIFEST_FILE);
        if !manifest_path.is_file() {
            return Err(PackError::ManifestMissing(manifest_path));
        }

        let raw = fs::read_to_string(&manifest_path)?;
        let manifest: FragmentManifest = toml::from_str(&raw)?;
        let issues = manifest.validate();
        if !issues.is_empty() {
            return Err(PackError::ManifestValidation(issues));
        }

        let missing = missing_sources(&root, &manifest);
        if !missing.is_empty() {
            return Err(PackError::ManifestValidation(
                missing
                    .into_iter()
                    .map(|path| format!("missing fragment source: {}", path.display()))
                    .collect(),
            ));
        }

        let geometries = read_fragments(&root, &manifest.geometries, FragmentKind::Geometry)?;
        let projections =
            read_fragments(&root, &manifest.projections, FragmentKind::Projection)?;
        debug!(
            pack = %manifest.name,
            root = %root.display(),
            geometries = geometries.len(),
            projections = projections.len(),
            "loaded fragment pack"
        );

        Ok(Self {
            root,
            manifest,
            geometries,
            projections,
        })
    }

    pub fn name(&self) -> &str {
        &self.manifest.name
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn manifest(&self) -> &FragmentManifest {
        &self.manifest
    }

    pub fn geometries(&self) -> &[PackFragment] {
        &self.geometries
    }

    pub fn projections(&self) -> &[PackFragment] {
        &self.projections
    }
}

fn missing_sources(root: &Path, manifest: &FragmentManifest) -> Vec<PathBuf> {
    manifest
        .geometries
        .iter()
        .chain(&manifest.projections)
        .map(|decl| root.join(&decl.source))
        .filter(|path| !path.is_file())
        .collect()
}

fn read_fragments(
    root: &Path,
    decls: &[FragmentDecl],
    kind: FragmentKind,
) -> Result<Vec<PackFragment>, PackError> {
    let symbol = match kind {
        FragmentKind::Geometry => GEOMETRY_ENTRY_POINT,
        FragmentKind::Projection => PROJECTION_ENTRY_POINT,
    };
    decls
        .iter()
        .map(|decl| {
            let path = root.join(&decl.source);
            let code = fs::read_to_string(&path)?;
            if !code.contains(symbol) {
                return Err(PackError::MissingEntryPoint {
                    kind,
                    name: decl.name.clone(),
                    symbol,
                });
            }
            Ok(PackFragment {
                name: decl.name.clone(),
                description: decl.description.clone(),
                path,
                code,
            })
        })
        .collect()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) const RIPPLE: &str =
        "float geometryLattice(vec4 p, float density, float thickness) { return 0.0; }\n";
    pub(crate) const FLAT: &str = "vec3 project4D(vec4 p, float dimension) { return p.xyz; }\n";

    pub(crate) fn write_pack(dir: &Path, manifest: &str, files: &[(&str, &str)]) {
        fs::create_dir_all(dir).expect("create pack dir");
        fs::write(dir.join(MANIFEST_FILE), manifest).expect("write manifest");
        for (path, contents) in files {
            let full = dir.join(path);
            if let Some(parent) = full.parent() {
                fs::create_dir_all(parent).expect("create dirs");
            }
            fs::write(full, contents).expect("write file");
        }
    }

    pub(crate) const DEMO_MANIFEST: &str = r#"
name = "demo"

[[geometries]]
name = "ripple"
source = "ripple.glsl"

[[projections]]
name = "flat"
source = "proj/flat.glsl"
"#;

    #[test]
    fn loads_valid_pack() {
        let temp = tempfile::tempdir().expect("tempdir");
        write_pack(
            temp.path(),
            DEMO_MANIFEST,
            &[("ripple.glsl", RIPPLE), ("proj/flat.glsl", FLAT)],
        );

        let pack = FragmentPack::load(temp.path()).expect("load pack");
        assert_eq!(pack.name(), "demo");
        assert_eq!(pack.geometries()[0].code, RIPPLE);
        assert_eq!(pack.projections()[0].name, "flat");
    }

    #[test]
    fn rejects_manifest_with_missing_source() {
        let temp = tempfile::tempdir().expect("tempdir");
        write_pack(temp.path(), DEMO_MANIFEST, &[("ripple.glsl", RIPPLE)]);

        match FragmentPack::load(temp.path()) {
            Err(PackError::ManifestValidation(issues)) => {
                assert_eq!(issues.len(), 1);
                assert!(issues[0].contains("flat.glsl"));
            }
            other => panic!("expected validation failure, got {other:?}"),
        }
    }

    #[test]
    fn rejects_source_without_entry_point() {
        let temp = tempfile::tempdir().expect("tempdir");
        write_pack(
            temp.path(),
            DEMO_MANIFEST,
            &[("ripple.glsl", FLAT), ("proj/flat.glsl", FLAT)],
        );

        assert!(matches!(
            FragmentPack::load(temp.path()),
            Err(PackError::MissingEntryPoint {
                kind: FragmentKind::Geometry,
                ..
            })
        ));
    }

    #[test]
    fn missing_manifest_is_reported() {
        let temp = tempfile::tempdir().expect("tempdir");
        assert!(matches!(
            FragmentPack::load(temp.path()),
            Err(PackError::ManifestMissing(_))
        ));
    }
}
