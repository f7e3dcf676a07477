//! Fragment provider interfaces consumed by [`crate::ShaderManager`].

use std::collections::BTreeMap;
use std::rc::Rc;

/// A piece of GLSL injected into the fragment template.
pub trait ShaderFragment {
    /// Source code for the fragment, or `None` when the fragment cannot
    /// produce any (treated as a missing provider).
    fn shader_code(&self) -> Option<String>;
}

/// Resolves geometry names to fragments defining `geometryLattice`.
pub trait GeometryProvider {
    fn geometry(&self, name: &str) -> Option<&dyn ShaderFragment>;

    fn geometry_names(&self) -> Vec<String> {
        Vec::new()
    }
}

/// Resolves projection names to fragments defining `project4D`.
pub trait ProjectionProvider {
    fn projection(&self, name: &str) -> Option<&dyn ShaderFragment>;

    fn projection_names(&self) -> Vec<String> {
        Vec::new()
    }
}

impl<T: GeometryProvider + ?Sized> GeometryProvider for Rc<T> {
    fn geometry(&self, name: &str) -> Option<&dyn ShaderFragment> {
        (**self).geometry(name)
    }

    fn geometry_names(&self) -> Vec<String> {
        (**self).geometry_names()
    }
}

impl<T: ProjectionProvider + ?Sized> ProjectionProvider for Rc<T> {
    fn projection(&self, name: &str) -> Option<&dyn ShaderFragment> {
        (**self).projection(name)
    }

    fn projection_names(&self) -> Vec<String> {
        (**self).projection_names()
    }
}

/// Fragment backed by an in-memory string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceFragment {
    code: Option<String>,
}

impl SourceFragment {
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: Some(code.into()),
        }
    }

    /// Fragment that exists but yields no code.
    pub fn empty() -> Self {
        Self { code: None }
    }
}

impl ShaderFragment for SourceFragment {
    fn shader_code(&self) -> Option<String> {
        self.code.clone()
    }
}

/// In-memory provider for both fragment kinds, useful for hosts that
/// generate fragments at runtime.
#[derive(Debug, Clone, Default)]
pub struct FragmentTable {
    geometries: BTreeMap<String, SourceFragment>,
    projections: BTreeMap<String, SourceFragment>,
}

impl FragmentTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_geometry(mut self, name: impl Into<String>, fragment: SourceFragment) -> Self {
        self.insert_geometry(name, fragment);
        self
    }

    pub fn with_projection(mut self, name: impl Into<String>, fragment: SourceFragment) -> Self {
        self.insert_projection(name, fragment);
        self
    }

    pub fn insert_geometry(&mut self, name: impl Into<String>, fragment: SourceFragment) {
        self.geometries.insert(name.into(), fragment);
    }

    pub fn insert_projection(&mut self, name: impl Into<String>, fragment: SourceFragment) {
        self.projections.insert(name.into(), fragment);
    }
}

impl GeometryProvider for FragmentTable {
    fn geometry(&self, name: &str) -> Option<&dyn ShaderFragment> {
        self.geometries
            .get(name)
            .map(|fragment| fragment as &dyn ShaderFragment)
    }

    fn geometry_names(&self) -> Vec<String> {
        self.geometries.keys().cloned().collect()
    }
}

impl ProjectionProvider for FragmentTable {
    fn projection(&self, name: &str) -> Option<&dyn ShaderFragment> {
        self.projections
            .get(name)
            .map(|fragment| fragment as &dyn ShaderFragment)
    }

    fn projection_names(&self) -> Vec<String> {
        self.projections.keys().cloned().collect()
    }
}
