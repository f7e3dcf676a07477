//! Shader source registry, compiled-shader cache and named programs.
//!
//! The manager owns every shader and program object it creates, but not the
//! graphics context itself; each call that touches the backend borrows it.
//! Compiled shaders are cached by [`ShaderKey`] so a given geometry and
//! projection pair compiles exactly once for the life of the manager.

use std::collections::HashMap;
use std::fmt;

use crate::backend::{GraphicsContext, LocationLookup, ShaderStage};
use crate::compile::{
    annotate_source, ShaderTemplate, SlotFills, BASE_FRAGMENT, BASE_VERTEX, FRAGMENT_TEMPLATE,
    SLOT_GEOMETRY, SLOT_PROJECTION, VERTEX_SOURCE,
};
use crate::error::{FragmentKind, ShaderError};
use crate::provider::{GeometryProvider, ProjectionProvider};

/// Identity of a compiled shader object.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ShaderKey {
    pub stage: ShaderStage,
    pub source: String,
    pub geometry: Option<String>,
    pub projection: Option<String>,
}

impl ShaderKey {
    fn plain(stage: ShaderStage, source: &str) -> Self {
        Self {
            stage,
            source: source.to_string(),
            geometry: None,
            projection: None,
        }
    }

    fn dynamic(source: &str, geometry: &str, projection: &str) -> Self {
        Self {
            stage: ShaderStage::Fragment,
            source: source.to_string(),
            geometry: Some(geometry.to_string()),
            projection: Some(projection.to_string()),
        }
    }

    /// Stable label such as `fragment:base:hypercube+perspective`.
    pub fn label(&self) -> String {
        match (&self.geometry, &self.projection) {
            (Some(geometry), Some(projection)) => {
                format!("{}:{}:{geometry}+{projection}", self.stage, self.source)
            }
            _ => format!("{}:{}", self.stage, self.source),
        }
    }
}

impl fmt::Display for ShaderKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

/// Counters exposed for diagnostics and tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShaderStats {
    pub compiles: usize,
    pub cache_hits: usize,
    pub links: usize,
    pub programs: usize,
    pub cached_shaders: usize,
}

#[derive(Debug)]
struct SourceEntry {
    stage: ShaderStage,
    code: String,
    template: Option<ShaderTemplate>,
}

struct ProgramEntry<G: GraphicsContext> {
    program: G::Program,
    uniform_locations: HashMap<String, Option<G::UniformLocation>>,
    attribute_locations: HashMap<String, Option<u32>>,
}

impl<G: GraphicsContext> ProgramEntry<G> {
    fn new(program: G::Program) -> Self {
        Self {
            program,
            uniform_locations: HashMap::new(),
            attribute_locations: HashMap::new(),
        }
    }
}

pub struct ShaderManager<G: GraphicsContext> {
    geometry: Box<dyn GeometryProvider>,
    projection: Box<dyn ProjectionProvider>,
    sources: HashMap<String, SourceEntry>,
    shaders: HashMap<ShaderKey, G::Shader>,
    retired: Vec<G::Shader>,
    programs: HashMap<String, ProgramEntry<G>>,
    active: Option<String>,
    stats: ShaderStats,
    disposed: bool,
}

impl<G: GraphicsContext> fmt::Debug for ShaderManager<G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShaderManager")
            .field("sources", &self.sources.keys().collect::<Vec<_>>())
            .field("programs", &self.programs.keys().collect::<Vec<_>>())
            .field("active", &self.active)
            .field("stats", &self.stats)
            .field("disposed", &self.disposed)
            .finish()
    }
}

impl<G: GraphicsContext> ShaderManager<G> {
    /// Creates an empty manager without any registered sources.
    pub fn new(
        geometry: Box<dyn GeometryProvider>,
        projection: Box<dyn ProjectionProvider>,
    ) -> Self {
        Self {
            geometry,
            projection,
            sources: HashMap::new(),
            shaders: HashMap::new(),
            retired: Vec::new(),
            programs: HashMap::new(),
            active: None,
            stats: ShaderStats::default(),
            disposed: false,
        }
    }

    /// Creates a manager with the base vertex shader and fragment template
    /// registered under [`BASE_VERTEX`] and [`BASE_FRAGMENT`].
    pub fn with_base_sources(
        geometry: Box<dyn GeometryProvider>,
        projection: Box<dyn ProjectionProvider>,
    ) -> Result<Self, ShaderError> {
        let mut manager = Self::new(geometry, projection);
        manager.register_source(BASE_VERTEX, VERTEX_SOURCE, ShaderStage::Vertex)?;
        manager.register_source(BASE_FRAGMENT, FRAGMENT_TEMPLATE, ShaderStage::Fragment)?;
        Ok(manager)
    }

    /// Stores a named source. Registering identical code again does nothing;
    /// different code replaces the source and evicts every compiled shader
    /// derived from it.
    pub fn register_source(
        &mut self,
        name: &str,
        code: &str,
        stage: ShaderStage,
    ) -> Result<(), ShaderError> {
        if self.disposed {
            return Err(ShaderError::Disposed);
        }
        if let Some(existing) = self.sources.get(name) {
            if existing.code == code && existing.stage == stage {
                return Ok(());
            }
        }

        let template = ShaderTemplate::parse(code)?;
        let template = template.has_slots().then_some(template);
        let replaced = self
            .sources
            .insert(
                name.to_string(),
                SourceEntry {
                    stage,
                    code: code.to_string(),
                    template,
                },
            )
            .is_some();

        if replaced {
            let stale: Vec<ShaderKey> = self
                .shaders
                .keys()
                .filter(|key| key.source == name)
                .cloned()
                .collect();
            for key in stale {
                if let Some(shader) = self.shaders.remove(&key) {
                    self.retired.push(shader);
                }
            }
            tracing::debug!(source = name, %stage, "replaced shader source");
        }
        Ok(())
    }

    /// Links a program from two registered sources that have no slots.
    pub fn create_program(
        &mut self,
        gl: &mut G,
        name: &str,
        vertex_source: &str,
        fragment_source: &str,
    ) -> Result<G::Program, ShaderError> {
        self.ensure_live()?;
        self.flush_retired(gl);

        let vertex_key = self.plain_key(vertex_source, ShaderStage::Vertex)?;
        let fragment_key = self.plain_key(fragment_source, ShaderStage::Fragment)?;
        self.compile_cached(gl, &vertex_key, |manager| manager.plain_code(vertex_source))?;
        self.compile_cached(gl, &fragment_key, |manager| {
            manager.plain_code(fragment_source)
        })?;
        self.link_and_install(gl, name, &vertex_key, &fragment_key)
    }

    /// Builds `name` from the base template with the given geometry and
    /// projection fragments, replacing any program already under `name`.
    ///
    /// On failure a program previously installed under `name` stays alive.
    /// When that program was active and linking the replacement fails, the
    /// active program is cleared before the error is returned.
    pub fn create_dynamic_program(
        &mut self,
        gl: &mut G,
        name: &str,
        geometry: &str,
        projection: &str,
    ) -> Result<G::Program, ShaderError> {
        self.ensure_live()?;
        self.flush_retired(gl);

        let geometry_code = self
            .geometry
            .geometry(geometry)
            .and_then(|fragment| fragment.shader_code())
            .ok_or_else(|| ShaderError::ProviderMissing {
                kind: FragmentKind::Geometry,
                name: geometry.to_string(),
            })?;
        let projection_code = self
            .projection
            .projection(projection)
            .and_then(|fragment| fragment.shader_code())
            .ok_or_else(|| ShaderError::ProviderMissing {
                kind: FragmentKind::Projection,
                name: projection.to_string(),
            })?;

        let vertex_key = self.plain_key(BASE_VERTEX, ShaderStage::Vertex)?;
        self.compile_cached(gl, &vertex_key, |manager| manager.plain_code(BASE_VERTEX))?;

        let fragment_key = ShaderKey::dynamic(BASE_FRAGMENT, geometry, projection);
        self.compile_cached(gl, &fragment_key, |manager| {
            let entry = manager.source(BASE_FRAGMENT, ShaderStage::Fragment)?;
            let template = match &entry.template {
                Some(template) => template.clone(),
                None => ShaderTemplate::parse(&entry.code)?,
            };
            let mut fills = SlotFills::new();
            fills.fill(SLOT_GEOMETRY, geometry_code)?;
            fills.fill(SLOT_PROJECTION, projection_code)?;
            Ok(template.assemble(&fills)?)
        })?;

        self.link_and_install(gl, name, &vertex_key, &fragment_key)
    }

    /// Activates `name`, or clears the active program with `None`.
    ///
    /// The backend is only called when its current program differs. Returns
    /// `false` if `name` is unknown or the manager was disposed.
    pub fn use_program(&mut self, gl: &mut G, name: Option<&str>) -> bool {
        if self.disposed {
            return false;
        }
        match name {
            None => {
                if gl.current_program().is_some() {
                    gl.use_program(None);
                }
                self.active = None;
                true
            }
            Some(name) => {
                let Some(entry) = self.programs.get(name) else {
                    tracing::warn!(program = name, "cannot activate unknown program");
                    return false;
                };
                if gl.current_program().as_ref() != Some(&entry.program) {
                    gl.use_program(Some(&entry.program));
                }
                self.active = Some(name.to_string());
                true
            }
        }
    }

    /// Looks up a uniform on the active program. Found and missing answers are
    /// cached; pending answers are asked again next time.
    pub fn uniform_location(&mut self, gl: &mut G, name: &str) -> LocationLookup<G::UniformLocation> {
        let Some(entry) = self.active_entry_mut() else {
            return LocationLookup::Pending;
        };
        if let Some(cached) = entry.uniform_locations.get(name) {
            return match cached {
                Some(location) => LocationLookup::Found(location.clone()),
                None => LocationLookup::Missing,
            };
        }

        let lookup = gl.uniform_location(&entry.program, name);
        match &lookup {
            LocationLookup::Found(location) => {
                entry
                    .uniform_locations
                    .insert(name.to_string(), Some(location.clone()));
            }
            LocationLookup::Missing => {
                entry.uniform_locations.insert(name.to_string(), None);
            }
            LocationLookup::Pending => {}
        }
        lookup
    }

    pub fn attribute_location(&mut self, gl: &mut G, name: &str) -> LocationLookup<u32> {
        let Some(entry) = self.active_entry_mut() else {
            return LocationLookup::Pending;
        };
        if let Some(cached) = entry.attribute_locations.get(name) {
            return match cached {
                Some(location) => LocationLookup::Found(*location),
                None => LocationLookup::Missing,
            };
        }

        let lookup = gl.attribute_location(&entry.program, name);
        match lookup {
            LocationLookup::Found(location) => {
                entry
                    .attribute_locations
                    .insert(name.to_string(), Some(location));
            }
            LocationLookup::Missing => {
                entry.attribute_locations.insert(name.to_string(), None);
            }
            LocationLookup::Pending => {}
        }
        lookup
    }

    /// Deletes every shader and program and clears all caches. Safe to call
    /// more than once.
    pub fn dispose(&mut self, gl: &mut G) {
        if self.disposed {
            return;
        }
        if self.active.take().is_some() && gl.current_program().is_some() {
            gl.use_program(None);
        }
        for (_, entry) in self.programs.drain() {
            gl.delete_program(entry.program);
        }
        for (_, shader) in self.shaders.drain() {
            gl.delete_shader(shader);
        }
        for shader in self.retired.drain(..) {
            gl.delete_shader(shader);
        }
        self.sources.clear();
        self.disposed = true;
        tracing::debug!("shader manager disposed");
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    pub fn active_program(&self) -> Option<&str> {
        self.active.as_deref()
    }

    pub fn program(&self, name: &str) -> Option<&G::Program> {
        self.programs.get(name).map(|entry| &entry.program)
    }

    pub fn stats(&self) -> ShaderStats {
        ShaderStats {
            programs: self.programs.len(),
            cached_shaders: self.shaders.len(),
            ..self.stats
        }
    }

    pub fn geometry_names(&self) -> Vec<String> {
        self.geometry.geometry_names()
    }

    pub fn projection_names(&self) -> Vec<String> {
        self.projection.projection_names()
    }

    fn ensure_live(&self) -> Result<(), ShaderError> {
        if self.disposed {
            Err(ShaderError::Disposed)
        } else {
            Ok(())
        }
    }

    fn active_entry_mut(&mut self) -> Option<&mut ProgramEntry<G>> {
        let name = self.active.as_deref()?;
        self.programs.get_mut(name)
    }

    fn source(&self, name: &str, stage: ShaderStage) -> Result<&SourceEntry, ShaderError> {
        let entry = self
            .sources
            .get(name)
            .ok_or_else(|| ShaderError::UnknownSource(name.to_string()))?;
        if entry.stage != stage {
            return Err(ShaderError::StageMismatch {
                name: name.to_string(),
                expected: stage,
                actual: entry.stage,
            });
        }
        Ok(entry)
    }

    fn plain_key(&self, name: &str, stage: ShaderStage) -> Result<ShaderKey, ShaderError> {
        self.source(name, stage)?;
        Ok(ShaderKey::plain(stage, name))
    }

    fn plain_code(&self, name: &str) -> Result<String, ShaderError> {
        let entry = self
            .sources
            .get(name)
            .ok_or_else(|| ShaderError::UnknownSource(name.to_string()))?;
        match &entry.template {
            // Sources with slots are assembled with nothing, which reports
            // the first unfilled slot.
            Some(template) => Ok(template.assemble(&SlotFills::new())?),
            None => Ok(entry.code.clone()),
        }
    }

    fn compile_cached<F>(&mut self, gl: &mut G, key: &ShaderKey, source: F) -> Result<(), ShaderError>
    where
        F: FnOnce(&Self) -> Result<String, ShaderError>,
    {
        if self.shaders.contains_key(key) {
            self.stats.cache_hits += 1;
            tracing::debug!(shader = %key, "shader cache hit");
            return Ok(());
        }

        let code = source(self)?;
        match gl.compile_shader(key.stage, &code) {
            Ok(shader) => {
                self.stats.compiles += 1;
                tracing::debug!(shader = %key, "compiled shader");
                self.shaders.insert(key.clone(), shader);
                Ok(())
            }
            Err(diagnostic) => {
                tracing::error!(
                    shader = %key,
                    line = ?diagnostic.line,
                    error = %diagnostic.message,
                    "shader compilation failed\n{}",
                    annotate_source(&code, diagnostic.line)
                );
                Err(ShaderError::CompileFailed {
                    stage: key.stage,
                    label: key.label(),
                    diagnostic,
                })
            }
        }
    }

    fn link_and_install(
        &mut self,
        gl: &mut G,
        name: &str,
        vertex_key: &ShaderKey,
        fragment_key: &ShaderKey,
    ) -> Result<G::Program, ShaderError> {
        let (Some(vertex), Some(fragment)) =
            (self.shaders.get(vertex_key), self.shaders.get(fragment_key))
        else {
            return Err(ShaderError::UnknownSource(fragment_key.label()));
        };

        let was_active = self.active.as_deref() == Some(name);
        let program = match gl.link_program(vertex, fragment) {
            Ok(program) => program,
            Err(message) => {
                tracing::error!(
                    program = name,
                    vertex = %vertex_key,
                    fragment = %fragment_key,
                    error = %message,
                    "program link failed"
                );
                if was_active {
                    gl.use_program(None);
                    self.active = None;
                }
                return Err(ShaderError::LinkFailed {
                    program: name.to_string(),
                    message,
                });
            }
        };
        self.stats.links += 1;

        let handle = program.clone();
        if let Some(previous) = self.programs.insert(name.to_string(), ProgramEntry::new(program)) {
            if was_active {
                gl.use_program(Some(&handle));
            }
            gl.delete_program(previous.program);
            tracing::debug!(program = name, fragment = %fragment_key, "replaced program");
        } else {
            tracing::debug!(program = name, fragment = %fragment_key, "linked program");
        }
        Ok(handle)
    }

    fn flush_retired(&mut self, gl: &mut G) {
        for shader in self.retired.drain(..) {
            gl.delete_shader(shader);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;
    use crate::headless::HeadlessGraphics;
    use crate::provider::{FragmentTable, SourceFragment};

    fn manager() -> ShaderManager<HeadlessGraphics> {
        let table = std::rc::Rc::new(fixtures::fragment_table());
        ShaderManager::with_base_sources(Box::new(table.clone()), Box::new(table))
            .expect("base sources")
    }

    #[test]
    fn identical_pair_compiles_fragment_once() {
        let mut gl = HeadlessGraphics::new(64, 64);
        let mut shaders = manager();

        let first = shaders
            .create_dynamic_program(&mut gl, "a", "hypercube", "perspective")
            .expect("first program");
        let second = shaders
            .create_dynamic_program(&mut gl, "b", "hypercube", "perspective")
            .expect("second program");

        assert_ne!(first, second);
        assert_eq!(gl.stats().fragment_compiles, 1);
        assert_eq!(gl.stats().vertex_compiles, 1);
        assert_eq!(gl.stats().links, 2);
        assert_eq!(shaders.stats().cache_hits, 2);
        assert_eq!(shaders.stats().programs, 2);
    }

    #[test]
    fn replacing_active_program_activates_replacement() {
        let mut gl = HeadlessGraphics::new(64, 64);
        let mut shaders = manager();

        let old = shaders
            .create_dynamic_program(&mut gl, "field", "hypercube", "perspective")
            .expect("program");
        assert!(shaders.use_program(&mut gl, Some("field")));
        let new = shaders
            .create_dynamic_program(&mut gl, "field", "hypersphere", "perspective")
            .expect("replacement");

        assert_ne!(old, new);
        assert_eq!(gl.current_program(), Some(new));
        assert_eq!(gl.stats().programs_deleted, 1);
        assert_eq!(shaders.active_program(), Some("field"));
    }

    #[test]
    fn use_program_skips_redundant_switches() {
        let mut gl = HeadlessGraphics::new(64, 64);
        let mut shaders = manager();
        shaders
            .create_dynamic_program(&mut gl, "field", "hypercube", "perspective")
            .expect("program");

        assert!(shaders.use_program(&mut gl, Some("field")));
        assert!(shaders.use_program(&mut gl, Some("field")));
        assert_eq!(gl.stats().program_switches, 1);
        assert!(!shaders.use_program(&mut gl, Some("nope")));
        assert!(shaders.use_program(&mut gl, None));
        assert_eq!(gl.current_program(), None);
    }

    #[test]
    fn provider_without_code_leaves_active_program_untouched() {
        let mut gl = HeadlessGraphics::new(64, 64);
        let table = std::rc::Rc::new(
            fixtures::fragment_table().with_geometry("void", SourceFragment::empty()),
        );
        let mut shaders: ShaderManager<HeadlessGraphics> =
            ShaderManager::with_base_sources(Box::new(table.clone()), Box::new(table))
                .expect("base sources");
        let live = shaders
            .create_dynamic_program(&mut gl, "field", "hypercube", "perspective")
            .expect("program");
        shaders.use_program(&mut gl, Some("field"));

        let err = shaders
            .create_dynamic_program(&mut gl, "field", "void", "perspective")
            .expect_err("no code");
        assert_eq!(
            err,
            ShaderError::ProviderMissing {
                kind: FragmentKind::Geometry,
                name: "void".into()
            }
        );
        assert_eq!(shaders.program("field"), Some(&live));
        assert_eq!(shaders.active_program(), Some("field"));
        assert_eq!(gl.current_program(), Some(live));
    }

    #[test]
    fn link_failure_on_active_program_clears_active_state() {
        let mut gl = HeadlessGraphics::new(64, 64);
        let mut shaders = manager();
        let live = shaders
            .create_dynamic_program(&mut gl, "field", "hypercube", "perspective")
            .expect("program");
        shaders.use_program(&mut gl, Some("field"));

        gl.faults().fail_next_link();
        let err = shaders
            .create_dynamic_program(&mut gl, "field", "hypersphere", "perspective")
            .expect_err("link fails");
        assert!(matches!(err, ShaderError::LinkFailed { .. }));
        assert_eq!(shaders.program("field"), Some(&live));
        assert_eq!(shaders.active_program(), None);
        assert_eq!(gl.current_program(), None);
    }

    #[test]
    fn compile_failure_is_reported_with_line() {
        let mut gl = HeadlessGraphics::new(64, 64);
        let table = std::rc::Rc::new(
            FragmentTable::new()
                .with_geometry("broken", SourceFragment::new("#error not today"))
                .with_projection("flat", SourceFragment::new(fixtures::PROJECTION)),
        );
        let mut shaders: ShaderManager<HeadlessGraphics> =
            ShaderManager::with_base_sources(Box::new(table.clone()), Box::new(table))
                .expect("base sources");

        let err = shaders
            .create_dynamic_program(&mut gl, "field", "broken", "flat")
            .expect_err("compile fails");
        match err {
            ShaderError::CompileFailed {
                stage, diagnostic, label,
            } => {
                assert_eq!(stage, ShaderStage::Fragment);
                assert_eq!(label, "fragment:base:broken+flat");
                assert!(diagnostic.line.is_some());
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert!(shaders.program("field").is_none());
    }

    #[test]
    fn locations_cache_found_and_missing_but_not_pending() {
        let mut gl = HeadlessGraphics::new(64, 64);
        let mut shaders = manager();
        shaders
            .create_dynamic_program(&mut gl, "field", "hypercube", "perspective")
            .expect("program");

        assert_eq!(
            shaders.uniform_location(&mut gl, "u_time"),
            LocationLookup::Pending,
            "no active program yet"
        );
        shaders.use_program(&mut gl, Some("field"));
        gl.faults().set_location_latency(1);

        assert_eq!(shaders.uniform_location(&mut gl, "u_time"), LocationLookup::Pending);
        assert!(shaders.uniform_location(&mut gl, "u_time").found().is_some());
        assert!(shaders.uniform_location(&mut gl, "u_time").found().is_some());
        assert_eq!(shaders.uniform_location(&mut gl, "u_unused"), LocationLookup::Pending);
        assert_eq!(shaders.uniform_location(&mut gl, "u_unused"), LocationLookup::Missing);
        assert_eq!(shaders.uniform_location(&mut gl, "u_unused"), LocationLookup::Missing);
        assert_eq!(gl.stats().uniform_queries, 4);

        assert_eq!(shaders.attribute_location(&mut gl, "a_position"), LocationLookup::Pending);
        assert_eq!(shaders.attribute_location(&mut gl, "a_position"), LocationLookup::Found(0));
    }

    #[test]
    fn reregistering_source_evicts_derived_shaders() {
        let mut gl = HeadlessGraphics::new(64, 64);
        let mut shaders = manager();
        shaders
            .create_dynamic_program(&mut gl, "field", "hypercube", "perspective")
            .expect("program");

        shaders
            .register_source(BASE_FRAGMENT, FRAGMENT_TEMPLATE, ShaderStage::Fragment)
            .expect("identical source");
        assert_eq!(shaders.stats().cached_shaders, 2);

        let edited = FRAGMENT_TEMPLATE.replace("outColor = vec4(color, 1.0);", "outColor = vec4(color, 0.5);");
        shaders
            .register_source(BASE_FRAGMENT, &edited, ShaderStage::Fragment)
            .expect("edited source");
        assert_eq!(shaders.stats().cached_shaders, 1);

        shaders
            .create_dynamic_program(&mut gl, "field", "hypercube", "perspective")
            .expect("rebuilt program");
        assert_eq!(gl.stats().fragment_compiles, 2);
        assert_eq!(gl.stats().shaders_deleted, 1);
    }

    #[test]
    fn static_program_from_plain_sources() {
        let mut gl = HeadlessGraphics::new(64, 64);
        let mut shaders = manager();
        shaders
            .register_source("solid", fixtures::SOLID_FRAGMENT, ShaderStage::Fragment)
            .expect("register");
        shaders
            .create_program(&mut gl, "solid", BASE_VERTEX, "solid")
            .expect("static program");
        let err = shaders
            .create_program(&mut gl, "bad", BASE_VERTEX, BASE_FRAGMENT)
            .expect_err("template has slots");
        assert!(matches!(err, ShaderError::Template(_)));
        let err = shaders
            .create_program(&mut gl, "bad", "solid", "solid")
            .expect_err("stage mismatch");
        assert!(matches!(err, ShaderError::StageMismatch { .. }));
    }

    #[test]
    fn dispose_is_idempotent() {
        let mut gl = HeadlessGraphics::new(64, 64);
        let mut shaders = manager();
        shaders
            .create_dynamic_program(&mut gl, "field", "hypercube", "perspective")
            .expect("program");
        shaders.use_program(&mut gl, Some("field"));

        shaders.dispose(&mut gl);
        shaders.dispose(&mut gl);
        let stats = gl.stats();
        assert_eq!(stats.programs_deleted, 1);
        assert_eq!(stats.shaders_deleted, 2);
        assert_eq!(gl.current_program(), None);
        assert!(matches!(
            shaders.create_dynamic_program(&mut gl, "field", "hypercube", "perspective"),
            Err(ShaderError::Disposed)
        ));
        assert!(!shaders.use_program(&mut gl, Some("field")));
    }
}
