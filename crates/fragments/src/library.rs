//! Provider implementation backed by built-in and pack fragments.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use renderer::{FragmentKind, GeometryProvider, ProjectionProvider, ShaderFragment};
use tracing::debug;

use crate::builtin;
use crate::pack::{FragmentPack, PackFragment};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FragmentOrigin {
    Builtin,
    Pack { name: String, path: PathBuf },
}

impl fmt::Display for FragmentOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Builtin => f.write_str("builtin"),
            Self::Pack { name, .. } => write!(f, "pack:{name}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryFragment {
    code: String,
    description: Option<String>,
    origin: FragmentOrigin,
}

impl LibraryFragment {
    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn origin(&self) -> &FragmentOrigin {
        &self.origin
    }
}

impl ShaderFragment for LibraryFragment {
    fn shader_code(&self) -> Option<String> {
        (!self.code.trim().is_empty()).then(|| self.code.clone())
    }
}

/// Row in a library listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FragmentEntry {
    pub kind: FragmentKind,
    pub name: String,
    pub description: Option<String>,
    pub origin: FragmentOrigin,
}

#[derive(Debug, Clone, Default)]
pub struct FragmentLibrary {
    geometries: BTreeMap<String, LibraryFragment>,
    projections: BTreeMap<String, LibraryFragment>,
}

impl FragmentLibrary {
    /// Library without any fragments.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Library holding the fragments compiled into the crate.
    pub fn builtin() -> Self {
        let mut library = Self::empty();
        for (name, description, code) in builtin::GEOMETRIES {
            library.geometries.insert(
                name.to_string(),
                builtin_fragment(description, code),
            );
        }
        for (name, description, code) in builtin::PROJECTIONS {
            library.projections.insert(
                name.to_string(),
                builtin_fragment(description, code),
            );
        }
        library
    }

    pub fn with_pack(mut self, pack: &FragmentPack) -> Self {
        self.add_pack(pack);
        self
    }

    /// Adds every fragment of `pack`, replacing entries with the same name.
    pub fn add_pack(&mut self, pack: &FragmentPack) {
        for fragment in pack.geometries() {
            insert_from_pack(&mut self.geometries, pack.name(), fragment, FragmentKind::Geometry);
        }
        for fragment in pack.projections() {
            insert_from_pack(
                &mut self.projections,
                pack.name(),
                fragment,
                FragmentKind::Projection,
            );
        }
    }

    pub fn get(&self, kind: FragmentKind, name: &str) -> Option<&LibraryFragment> {
        match kind {
            FragmentKind::Geometry => self.geometries.get(name),
            FragmentKind::Projection => self.projections.get(name),
        }
    }

    pub fn contains(&self, kind: FragmentKind, name: &str) -> bool {
        self.get(kind, name).is_some()
    }

    /// Geometries first, then projections, each sorted by name.
    pub fn entries(&self) -> Vec<FragmentEntry> {
        let geometries = self
            .geometries
            .iter()
            .map(|(name, fragment)| entry(FragmentKind::Geometry, name, fragment));
        let projections = self
            .projections
            .iter()
            .map(|(name, fragment)| entry(FragmentKind::Projection, name, fragment));
        geometries.chain(projections).collect()
    }
}

fn builtin_fragment(description: &str, code: &str) -> LibraryFragment {
    LibraryFragment {
        code: code.to_string(),
        description: Some(description.to_string()),
        origin: FragmentOrigin::Builtin,
    }
}

fn insert_from_pack(
    table: &mut BTreeMap<String, LibraryFragment>,
    pack: &str,
    fragment: &PackFragment,
    kind: FragmentKind,
) {
    let replaced = table.insert(
        fragment.name.clone(),
        LibraryFragment {
            code: fragment.code.clone(),
            description: fragment.description.clone(),
            origin: FragmentOrigin::Pack {
                name: pack.to_string(),
                path: fragment.path.clone(),
            },
        },
    );
    if let Some(previous) = replaced {
        debug!(
            %kind,
            name = %fragment.name,
            pack,
            replaced = %previous.origin,
            "pack fragment overrides existing entry"
        );
    }
}

fn entry(kind: FragmentKind, name: &str, fragment: &LibraryFragment) -> FragmentEntry {
    FragmentEntry {
        kind,
        name: name.to_string(),
        description: fragment.description.clone(),
        origin: fragment.origin.clone(),
    }
}

impl GeometryProvider for FragmentLibrary {
    fn geometry(&self, name: &str) -> Option<&dyn ShaderFragment> {
        self.geometries
            .get(name)
            .map(|fragment| fragment as &dyn ShaderFragment)
    }

    fn geometry_names(&self) -> Vec<String> {
        self.geometries.keys().cloned().collect()
    }
}

impl ProjectionProvider for FragmentLibrary {
    fn projection(&self, name: &str) -> Option<&dyn ShaderFragment> {
        self.projections
            .get(name)
            .map(|fragment| fragment as &dyn ShaderFragment)
    }

    fn projection_names(&self) -> Vec<String> {
        self.projections.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pack::tests::{write_pack, FLAT, RIPPLE};

    #[test]
    fn builtin_library_serves_default_fragments() {
        let library = FragmentLibrary::builtin();
        assert_eq!(
            library.geometry_names(),
            vec!["duocylinder", "hypercube", "hypersphere", "hypertetrahedron"]
        );
        assert_eq!(
            library.projection_names(),
            vec!["orthographic", "perspective", "stereographic"]
        );
        let code = library
            .geometry("hypercube")
            .and_then(|fragment| fragment.shader_code())
            .expect("hypercube code");
        assert!(code.contains("geometryLattice"));
        assert!(library.projection("fisheye").is_none());
    }

    #[test]
    fn pack_fragments_override_builtins() {
        let temp = tempfile::tempdir().expect("tempdir");
        write_pack(
            temp.path(),
            r#"
name = "local"

[[geometries]]
name = "hypercube"
source = "cube.glsl"

[[projections]]
name = "flat"
source = "flat.glsl"
"#,
            &[("cube.glsl", RIPPLE), ("flat.glsl", FLAT)],
        );
        let pack = FragmentPack::load(temp.path()).expect("load pack");
        let library = FragmentLibrary::builtin().with_pack(&pack);

        let cube = library
            .get(FragmentKind::Geometry, "hypercube")
            .expect("hypercube");
        assert_eq!(cube.code(), RIPPLE);
        assert!(matches!(cube.origin(), FragmentOrigin::Pack { name, .. } if name == "local"));
        assert!(library.contains(FragmentKind::Projection, "flat"));
        assert!(library.contains(FragmentKind::Projection, "perspective"));

        let entries = library.entries();
        assert_eq!(entries.len(), 8);
        assert_eq!(entries[0].kind, FragmentKind::Geometry);
        assert_eq!(entries.last().map(|entry| entry.name.as_str()), Some("stereographic"));
    }

    #[test]
    fn blank_code_counts_as_missing() {
        let fragment = LibraryFragment {
            code: "  \n".into(),
            description: None,
            origin: FragmentOrigin::Builtin,
        };
        assert!(fragment.shader_code().is_none());
    }
}
