//! Recording graphics backend that needs no GPU.
//!
//! [`HeadlessGraphics`] validates sources with a handful of textual checks,
//! reflects uniforms and attributes from GLSL declarations and counts every
//! call in [`HeadlessStats`]. Faults such as link failures, draw failures,
//! lazily resolved locations and context loss can be injected through the
//! shared [`HeadlessFaults`] handle, even after the backend has been moved
//! into a render core.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use crate::backend::{
    CompileDiagnostic, GraphicsCapabilities, GraphicsContext, LocationLookup, RenderSurface,
    ShaderStage, UniformValue,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HeadlessShader(u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HeadlessProgram(u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HeadlessBuffer(u32);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeadlessUniform {
    program: u32,
    index: usize,
}

/// Call counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HeadlessStats {
    pub vertex_compiles: usize,
    pub fragment_compiles: usize,
    pub compile_failures: usize,
    pub links: usize,
    pub link_failures: usize,
    pub shaders_deleted: usize,
    pub programs_deleted: usize,
    pub program_switches: usize,
    pub uniform_queries: usize,
    pub attribute_queries: usize,
    pub uniform_uploads: usize,
    pub buffers_created: usize,
    pub buffers_deleted: usize,
    pub resizes: usize,
    pub viewport_updates: usize,
    pub clears: usize,
    pub draws: usize,
    pub presents: usize,
    pub context_loss_requests: usize,
}

#[derive(Debug, Default)]
struct FaultState {
    fail_next_link: bool,
    fail_draws: bool,
    location_latency: u32,
    lost: bool,
}

/// Shared fault injection handle for a [`HeadlessGraphics`].
#[derive(Debug, Clone, Default)]
pub struct HeadlessFaults {
    inner: Rc<RefCell<FaultState>>,
}

impl HeadlessFaults {
    /// The next `link_program` call fails.
    pub fn fail_next_link(&self) {
        self.inner.borrow_mut().fail_next_link = true;
    }

    pub fn fail_draws(&self, fail: bool) {
        self.inner.borrow_mut().fail_draws = fail;
    }

    /// Location queries answer `Pending` this many times per name before
    /// resolving.
    pub fn set_location_latency(&self, queries: u32) {
        self.inner.borrow_mut().location_latency = queries;
    }

    /// Simulates a driver reset.
    pub fn lose_context(&self) {
        self.inner.borrow_mut().lost = true;
    }

    fn take_link_failure(&self) -> bool {
        std::mem::take(&mut self.inner.borrow_mut().fail_next_link)
    }
}

#[derive(Debug)]
struct ShaderRecord {
    stage: ShaderStage,
    source: String,
}

#[derive(Debug, Default)]
struct ProgramRecord {
    uniforms: Vec<String>,
    attributes: Vec<(String, u32)>,
    values: HashMap<usize, UniformValue>,
}

pub struct HeadlessGraphics {
    size: (u32, u32),
    viewport: (u32, u32),
    clear_color: [f32; 4],
    depth_test: bool,
    blending: bool,
    next_id: u32,
    shaders: HashMap<u32, ShaderRecord>,
    programs: HashMap<u32, ProgramRecord>,
    current: Option<u32>,
    buffers: HashSet<u32>,
    enabled_attributes: Vec<(u32, u32, u32)>,
    location_queries: HashMap<(u32, String), u32>,
    capabilities: GraphicsCapabilities,
    faults: HeadlessFaults,
    stats: HeadlessStats,
}

impl HeadlessGraphics {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            size: (width, height),
            viewport: (width, height),
            clear_color: [0.0, 0.0, 0.0, 0.0],
            depth_test: true,
            blending: false,
            next_id: 1,
            shaders: HashMap::new(),
            programs: HashMap::new(),
            current: None,
            buffers: HashSet::new(),
            enabled_attributes: Vec::new(),
            location_queries: HashMap::new(),
            capabilities: GraphicsCapabilities {
                primary_api: true,
                secondary_api: true,
                max_texture_size: 4096,
                extensions: vec!["float32-filterable".to_string()],
                renderer: "headless".to_string(),
            },
            faults: HeadlessFaults::default(),
            stats: HeadlessStats::default(),
        }
    }

    pub fn with_capabilities(mut self, capabilities: GraphicsCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn faults(&self) -> HeadlessFaults {
        self.faults.clone()
    }

    pub fn stats(&self) -> HeadlessStats {
        self.stats
    }

    pub fn viewport(&self) -> (u32, u32) {
        self.viewport
    }

    pub fn clear_color(&self) -> [f32; 4] {
        self.clear_color
    }

    pub fn depth_test_enabled(&self) -> bool {
        self.depth_test
    }

    pub fn blending_enabled(&self) -> bool {
        self.blending
    }

    pub fn live_programs(&self) -> usize {
        self.programs.len()
    }

    pub fn live_shaders(&self) -> usize {
        self.shaders.len()
    }

    pub fn live_buffers(&self) -> usize {
        self.buffers.len()
    }

    /// Last value uploaded to `name` on the current program.
    pub fn uniform_value(&self, name: &str) -> Option<UniformValue> {
        let record = self.programs.get(&self.current?)?;
        let index = record.uniforms.iter().position(|uniform| uniform == name)?;
        record.values.get(&index).copied()
    }

    fn lost(&self) -> bool {
        self.faults.inner.borrow().lost
    }

    fn allocate(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Returns true once the query budget for `name` is exhausted.
    fn location_ready(&mut self, program: u32, name: &str) -> bool {
        let latency = self.faults.inner.borrow().location_latency;
        let seen = self
            .location_queries
            .entry((program, name.to_string()))
            .or_insert(0);
        *seen += 1;
        *seen > latency
    }
}

impl GraphicsContext for HeadlessGraphics {
    type Shader = HeadlessShader;
    type Program = HeadlessProgram;
    type Buffer = HeadlessBuffer;
    type UniformLocation = HeadlessUniform;

    fn is_context_lost(&self) -> bool {
        self.lost()
    }

    fn lose_context(&mut self) {
        self.stats.context_loss_requests += 1;
        self.faults.lose_context();
    }

    fn capabilities(&self) -> GraphicsCapabilities {
        self.capabilities.clone()
    }

    fn compile_shader(
        &mut self,
        stage: ShaderStage,
        source: &str,
    ) -> Result<HeadlessShader, CompileDiagnostic> {
        if self.lost() {
            return Err(CompileDiagnostic::new(None, "context lost"));
        }
        if let Err(diagnostic) = check_source(source) {
            self.stats.compile_failures += 1;
            return Err(diagnostic);
        }
        match stage {
            ShaderStage::Vertex => self.stats.vertex_compiles += 1,
            ShaderStage::Fragment => self.stats.fragment_compiles += 1,
        }
        let id = self.allocate();
        self.shaders.insert(
            id,
            ShaderRecord {
                stage,
                source: source.to_string(),
            },
        );
        Ok(HeadlessShader(id))
    }

    fn delete_shader(&mut self, shader: HeadlessShader) {
        if self.shaders.remove(&shader.0).is_some() {
            self.stats.shaders_deleted += 1;
        }
    }

    fn link_program(
        &mut self,
        vertex: &HeadlessShader,
        fragment: &HeadlessShader,
    ) -> Result<HeadlessProgram, String> {
        if self.lost() {
            return Err("context lost".to_string());
        }
        if self.faults.take_link_failure() {
            self.stats.link_failures += 1;
            return Err("forced link failure".to_string());
        }
        let (Some(vs), Some(fs)) = (self.shaders.get(&vertex.0), self.shaders.get(&fragment.0))
        else {
            self.stats.link_failures += 1;
            return Err("shader object was deleted".to_string());
        };
        if vs.stage != ShaderStage::Vertex || fs.stage != ShaderStage::Fragment {
            self.stats.link_failures += 1;
            return Err("expected a vertex and a fragment shader".to_string());
        }

        let mut uniforms = active_uniforms(&vs.source);
        for name in active_uniforms(&fs.source) {
            if !uniforms.contains(&name) {
                uniforms.push(name);
            }
        }
        let record = ProgramRecord {
            uniforms,
            attributes: active_attributes(&vs.source),
            values: HashMap::new(),
        };

        let id = self.allocate();
        self.programs.insert(id, record);
        self.stats.links += 1;
        Ok(HeadlessProgram(id))
    }

    fn delete_program(&mut self, program: HeadlessProgram) {
        if self.programs.remove(&program.0).is_some() {
            self.stats.programs_deleted += 1;
        }
        if self.current == Some(program.0) {
            self.current = None;
        }
    }

    fn use_program(&mut self, program: Option<&HeadlessProgram>) {
        self.stats.program_switches += 1;
        self.current = program.map(|program| program.0);
    }

    fn current_program(&self) -> Option<HeadlessProgram> {
        self.current.map(HeadlessProgram)
    }

    fn uniform_location(
        &mut self,
        program: &HeadlessProgram,
        name: &str,
    ) -> LocationLookup<HeadlessUniform> {
        self.stats.uniform_queries += 1;
        if self.lost() || !self.location_ready(program.0, name) {
            return LocationLookup::Pending;
        }
        let Some(record) = self.programs.get(&program.0) else {
            return LocationLookup::Missing;
        };
        match record.uniforms.iter().position(|uniform| uniform == name) {
            Some(index) => LocationLookup::Found(HeadlessUniform {
                program: program.0,
                index,
            }),
            None => LocationLookup::Missing,
        }
    }

    fn attribute_location(&mut self, program: &HeadlessProgram, name: &str) -> LocationLookup<u32> {
        self.stats.attribute_queries += 1;
        if self.lost() || !self.location_ready(program.0, name) {
            return LocationLookup::Pending;
        }
        self.programs
            .get(&program.0)
            .and_then(|record| {
                record
                    .attributes
                    .iter()
                    .find(|(attribute, _)| attribute == name)
                    .map(|(_, location)| *location)
            })
            .map_or(LocationLookup::Missing, LocationLookup::Found)
    }

    fn set_uniform(&mut self, location: &HeadlessUniform, value: UniformValue) {
        if self.lost() {
            return;
        }
        if let Some(record) = self.programs.get_mut(&location.program) {
            record.values.insert(location.index, value);
            self.stats.uniform_uploads += 1;
        }
    }

    fn create_vertex_buffer(&mut self, data: &[f32]) -> Option<HeadlessBuffer> {
        if self.lost() || data.is_empty() {
            return None;
        }
        let id = self.allocate();
        self.buffers.insert(id);
        self.stats.buffers_created += 1;
        Some(HeadlessBuffer(id))
    }

    fn delete_buffer(&mut self, buffer: HeadlessBuffer) {
        if self.buffers.remove(&buffer.0) {
            self.stats.buffers_deleted += 1;
        }
        self.enabled_attributes.retain(|(id, _, _)| *id != buffer.0);
    }

    fn enable_vertex_attribute(&mut self, buffer: &HeadlessBuffer, location: u32, components: u32) {
        self.enabled_attributes
            .retain(|(_, enabled, _)| *enabled != location);
        self.enabled_attributes.push((buffer.0, location, components));
    }

    fn drawing_buffer_size(&self) -> (u32, u32) {
        self.size
    }

    fn resize_drawing_buffer(&mut self, width: u32, height: u32) {
        self.stats.resizes += 1;
        self.size = (width, height);
    }

    fn set_viewport(&mut self, width: u32, height: u32) {
        self.stats.viewport_updates += 1;
        self.viewport = (width, height);
    }

    fn configure_pipeline_state(&mut self) {
        self.depth_test = false;
        self.blending = true;
    }

    fn set_clear_color(&mut self, rgba: [f32; 4]) {
        self.clear_color = rgba;
    }

    fn clear(&mut self) {
        self.stats.clears += 1;
    }

    fn draw_triangle_strip(&mut self, vertex_count: u32) -> Result<(), String> {
        if self.lost() {
            return Err("context lost".to_string());
        }
        if self.faults.inner.borrow().fail_draws {
            return Err("injected draw failure".to_string());
        }
        if self.current.is_none() {
            return Err("no program bound".to_string());
        }
        if self.enabled_attributes.is_empty() {
            return Err("no vertex attribute enabled".to_string());
        }
        if vertex_count < 3 {
            return Err(format!("triangle strip needs 3 vertices, got {vertex_count}"));
        }
        self.stats.draws += 1;
        Ok(())
    }

    fn present(&mut self) -> Result<(), String> {
        if self.lost() {
            return Err("context lost".to_string());
        }
        self.stats.presents += 1;
        Ok(())
    }
}

fn check_source(source: &str) -> Result<(), CompileDiagnostic> {
    let mut depth = 0i64;
    let mut last_line = 0u32;
    for (index, line) in source.lines().enumerate() {
        let number = index as u32 + 1;
        last_line = number;
        let trimmed = line.trim_start();
        if let Some(message) = trimmed.strip_prefix("#error") {
            return Err(CompileDiagnostic::new(Some(number), message.trim()));
        }
        if trimmed.starts_with("#pragma slot") {
            return Err(CompileDiagnostic::new(Some(number), "unresolved template slot"));
        }
        for ch in line.chars() {
            match ch {
                '{' => depth += 1,
                '}' => {
                    depth -= 1;
                    if depth < 0 {
                        return Err(CompileDiagnostic::new(Some(number), "unexpected `}`"));
                    }
                }
                _ => {}
            }
        }
    }
    if depth != 0 {
        return Err(CompileDiagnostic::new(Some(last_line), "unbalanced braces"));
    }
    if !source.contains("void main") {
        return Err(CompileDiagnostic::new(None, "missing entry point `main`"));
    }
    Ok(())
}

fn identifiers(source: &str) -> impl Iterator<Item = &str> {
    source
        .split(|ch: char| !(ch.is_ascii_alphanumeric() || ch == '_'))
        .filter(|token| !token.is_empty())
}

fn occurrences(source: &str, name: &str) -> usize {
    identifiers(source).filter(|token| *token == name).count()
}

/// Name declared by `type name;` or `type name[N];`.
fn declared_name(declaration: &str) -> Option<&str> {
    let declaration = declaration.trim().trim_end_matches(';');
    let name = declaration.split_whitespace().last()?;
    let name = name.split('[').next()?;
    (!name.is_empty()).then_some(name)
}

fn strip_layout(line: &str) -> (&str, Option<u32>) {
    let Some(rest) = line.strip_prefix("layout") else {
        return (line, None);
    };
    let Some(close) = rest.find(')') else {
        return (line, None);
    };
    let qualifiers = &rest[..close];
    let location = qualifiers
        .split(',')
        .filter_map(|part| part.split_once('='))
        .find(|(key, _)| key.trim().trim_start_matches('(') == "location")
        .and_then(|(_, value)| value.trim().parse().ok());
    (rest[close + 1..].trim_start(), location)
}

/// Uniforms declared in `source` that are referenced beyond their
/// declaration.
fn active_uniforms(source: &str) -> Vec<String> {
    let mut declared = Vec::new();
    let mut in_block = false;
    for line in source.lines() {
        let trimmed = line.trim();
        if in_block {
            if trimmed.starts_with('}') {
                in_block = false;
            } else if let Some(name) = declared_name(trimmed) {
                declared.push(name.to_string());
            }
            continue;
        }
        let (rest, _) = strip_layout(trimmed);
        let Some(declaration) = rest.strip_prefix("uniform ") else {
            continue;
        };
        if declaration.contains('{') {
            in_block = true;
        } else if let Some(name) = declared_name(declaration) {
            declared.push(name.to_string());
        }
    }
    declared
        .into_iter()
        .filter(|name| occurrences(source, name) > 1)
        .collect()
}

fn active_attributes(source: &str) -> Vec<(String, u32)> {
    let mut attributes = Vec::new();
    let mut next_location = 0u32;
    for line in source.lines() {
        let (rest, location) = strip_layout(line.trim());
        let Some(declaration) = rest.strip_prefix("in ") else {
            continue;
        };
        let Some(name) = declared_name(declaration) else {
            continue;
        };
        let location = location.unwrap_or(next_location);
        next_location = location + 1;
        if occurrences(source, name) > 1 {
            attributes.push((name.to_string(), location));
        }
    }
    attributes
}

/// Surface whose client size can be changed from the outside.
#[derive(Debug, Clone)]
pub struct HeadlessSurface {
    size: Rc<Cell<Option<(u32, u32)>>>,
}

impl HeadlessSurface {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            size: Rc::new(Cell::new(Some((width, height)))),
        }
    }

    /// Surface that was never attached to a layout.
    pub fn detached() -> Self {
        Self {
            size: Rc::new(Cell::new(None)),
        }
    }

    pub fn resize(&self, width: u32, height: u32) {
        self.size.set(Some((width, height)));
    }

    pub fn detach(&self) {
        self.size.set(None);
    }
}

impl RenderSurface for HeadlessSurface {
    fn client_size(&self) -> Option<(u32, u32)> {
        self.size.get().filter(|(width, height)| *width > 0 && *height > 0)
    }
}
