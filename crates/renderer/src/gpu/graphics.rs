use std::borrow::Cow;
use std::collections::HashMap;

use anyhow::Result;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use wgpu::util::DeviceExt;

use crate::backend::{
    CompileDiagnostic, GraphicsCapabilities, GraphicsContext, LocationLookup, ShaderStage,
    UniformValue,
};

use super::context::{GpuContext, PowerPreference};
use super::pipeline::{create_program_pipeline, ProgramPipeline};
use super::reflect::{reflect, StageReflection};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WgpuShader(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WgpuProgram(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WgpuBuffer(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WgpuUniform {
    program: u64,
    slot: usize,
}

struct CompiledShader {
    stage: ShaderStage,
    module: wgpu::ShaderModule,
    reflection: StageReflection,
}

struct LinkedProgram {
    pipeline: ProgramPipeline,
    staging: Vec<u8>,
    staging_dirty: bool,
}

/// Graphics backend that renders through wgpu into a window surface.
///
/// Programs become render pipelines with one uniform buffer each. Uniform
/// writes land in a CPU staging copy that is uploaded once per presented
/// frame; clear and draw calls are recorded and encoded into a single render
/// pass by [`GraphicsContext::present`].
pub struct WgpuGraphics {
    context: GpuContext,
    next_id: u64,
    shaders: HashMap<u64, CompiledShader>,
    programs: HashMap<u64, LinkedProgram>,
    buffers: HashMap<u64, wgpu::Buffer>,
    current: Option<u64>,
    vertex_binding: Option<(u64, u32)>,
    blending: bool,
    clear_color: wgpu::Color,
    viewport: (u32, u32),
    pending_clear: bool,
    pending_draw: Option<u32>,
}

impl WgpuGraphics {
    pub fn new<T>(target: &T, size: (u32, u32), power: PowerPreference) -> Result<Self>
    where
        T: HasDisplayHandle + HasWindowHandle,
    {
        let context = GpuContext::new(target, size, power)?;
        let viewport = context.size();
        Ok(Self {
            context,
            next_id: 1,
            shaders: HashMap::new(),
            programs: HashMap::new(),
            buffers: HashMap::new(),
            current: None,
            vertex_binding: None,
            blending: false,
            clear_color: wgpu::Color::BLACK,
            viewport,
            pending_clear: false,
            pending_draw: None,
        })
    }

    fn allocate(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn encode_frame(&mut self) -> Result<(), String> {
        let frame = match self.context.surface.get_current_texture() {
            Ok(frame) => frame,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                tracing::debug!("surface lost or outdated; reconfiguring");
                self.context.reconfigure();
                return Ok(());
            }
            Err(wgpu::SurfaceError::Timeout) => {
                tracing::warn!("surface timeout; skipping frame");
                return Ok(());
            }
            Err(other) => return Err(format!("surface error: {other}")),
        };
        let view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let draw = self.pending_draw.take();
        let program = self.current.and_then(|id| self.programs.get_mut(&id));
        if let Some(program) = program {
            if program.staging_dirty {
                if let Some(buffer) = &program.pipeline.uniform_buffer {
                    self.context.queue.write_buffer(buffer, 0, &program.staging);
                }
                program.staging_dirty = false;
            }
        }

        let mut encoder = self
            .context
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("hyperfield frame encoder"),
            });
        {
            let load = if std::mem::take(&mut self.pending_clear) {
                wgpu::LoadOp::Clear(self.clear_color)
            } else {
                wgpu::LoadOp::Load
            };
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("hyperfield pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load,
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            let bound = self
                .current
                .and_then(|id| self.programs.get(&id))
                .zip(self.vertex_binding.and_then(|(id, _)| self.buffers.get(&id)));
            if let (Some(vertex_count), Some((program, buffer))) = (draw, bound) {
                let (target_width, target_height) = self.context.size();
                let width = self.viewport.0.min(target_width).max(1);
                let height = self.viewport.1.min(target_height).max(1);
                pass.set_viewport(0.0, 0.0, width as f32, height as f32, 0.0, 1.0);
                pass.set_pipeline(&program.pipeline.pipeline);
                if let Some(bind_group) = &program.pipeline.bind_group {
                    pass.set_bind_group(0, bind_group, &[]);
                }
                pass.set_vertex_buffer(0, buffer.slice(..));
                pass.draw(0..vertex_count, 0..1);
            }
        }

        self.context.queue.submit(Some(encoder.finish()));
        frame.present();
        Ok(())
    }
}

impl GraphicsContext for WgpuGraphics {
    type Shader = WgpuShader;
    type Program = WgpuProgram;
    type Buffer = WgpuBuffer;
    type UniformLocation = WgpuUniform;

    fn is_context_lost(&self) -> bool {
        self.context.is_lost()
    }

    fn lose_context(&mut self) {
        self.programs.clear();
        self.shaders.clear();
        self.buffers.clear();
        self.current = None;
        self.context.destroy();
    }

    fn capabilities(&self) -> GraphicsCapabilities {
        self.context.capabilities.clone()
    }

    fn compile_shader(
        &mut self,
        stage: ShaderStage,
        source: &str,
    ) -> Result<WgpuShader, CompileDiagnostic> {
        if self.is_context_lost() {
            return Err(CompileDiagnostic::new(None, "graphics context lost"));
        }
        let reflection = reflect(stage, source)?;

        let naga_stage = match stage {
            ShaderStage::Vertex => wgpu::naga::ShaderStage::Vertex,
            ShaderStage::Fragment => wgpu::naga::ShaderStage::Fragment,
        };
        let device = &self.context.device;
        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(stage.as_str()),
            source: wgpu::ShaderSource::Glsl {
                shader: Cow::Owned(source.to_string()),
                stage: naga_stage,
                defines: &[],
            },
        });
        if let Some(err) = pollster::block_on(device.pop_error_scope()) {
            return Err(CompileDiagnostic::new(None, err.to_string()));
        }

        let id = self.allocate();
        self.shaders.insert(
            id,
            CompiledShader {
                stage,
                module,
                reflection,
            },
        );
        Ok(WgpuShader(id))
    }

    fn delete_shader(&mut self, shader: WgpuShader) {
        self.shaders.remove(&shader.0);
    }

    fn link_program(
        &mut self,
        vertex: &WgpuShader,
        fragment: &WgpuShader,
    ) -> Result<WgpuProgram, String> {
        if self.is_context_lost() {
            return Err("graphics context lost".to_string());
        }
        let (Some(vs), Some(fs)) = (self.shaders.get(&vertex.0), self.shaders.get(&fragment.0))
        else {
            return Err("shader object was deleted".to_string());
        };
        if vs.stage != ShaderStage::Vertex || fs.stage != ShaderStage::Fragment {
            return Err("expected a vertex and a fragment shader".to_string());
        }

        let pipeline = create_program_pipeline(
            &self.context.device,
            self.context.surface_format,
            &vs.module,
            &vs.reflection,
            &fs.module,
            &fs.reflection,
            self.blending,
        )?;
        let staging = vec![0u8; pipeline.uniform_size as usize];

        let id = self.allocate();
        self.programs.insert(
            id,
            LinkedProgram {
                pipeline,
                staging,
                staging_dirty: true,
            },
        );
        Ok(WgpuProgram(id))
    }

    fn delete_program(&mut self, program: WgpuProgram) {
        self.programs.remove(&program.0);
        if self.current == Some(program.0) {
            self.current = None;
        }
    }

    fn use_program(&mut self, program: Option<&WgpuProgram>) {
        self.current = program.map(|program| program.0);
    }

    fn current_program(&self) -> Option<WgpuProgram> {
        self.current.map(WgpuProgram)
    }

    fn uniform_location(&mut self, program: &WgpuProgram, name: &str) -> LocationLookup<WgpuUniform> {
        let Some(linked) = self.programs.get(&program.0) else {
            return LocationLookup::Missing;
        };
        match linked
            .pipeline
            .uniforms
            .iter()
            .position(|slot| slot.name == name)
        {
            Some(slot) => LocationLookup::Found(WgpuUniform {
                program: program.0,
                slot,
            }),
            None => LocationLookup::Missing,
        }
    }

    fn attribute_location(&mut self, program: &WgpuProgram, name: &str) -> LocationLookup<u32> {
        self.programs
            .get(&program.0)
            .and_then(|linked| {
                linked
                    .pipeline
                    .inputs
                    .iter()
                    .find(|input| input.name == name)
                    .map(|input| input.location)
            })
            .map_or(LocationLookup::Missing, LocationLookup::Found)
    }

    fn set_uniform(&mut self, location: &WgpuUniform, value: UniformValue) {
        let Some(linked) = self.programs.get_mut(&location.program) else {
            return;
        };
        let Some(slot) = linked.pipeline.uniforms.get(location.slot) else {
            return;
        };
        let components = value.as_slice();
        let count = components.len().min(slot.components as usize);
        let bytes: &[u8] = bytemuck::cast_slice(&components[..count]);
        let start = slot.offset as usize;
        let end = start + bytes.len();
        if let Some(target) = linked.staging.get_mut(start..end) {
            target.copy_from_slice(bytes);
            linked.staging_dirty = true;
        }
    }

    fn create_vertex_buffer(&mut self, data: &[f32]) -> Option<WgpuBuffer> {
        if self.is_context_lost() || data.is_empty() {
            return None;
        }
        let buffer = self
            .context
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("hyperfield quad"),
                contents: bytemuck::cast_slice(data),
                usage: wgpu::BufferUsages::VERTEX,
            });
        let id = self.allocate();
        self.buffers.insert(id, buffer);
        Some(WgpuBuffer(id))
    }

    fn delete_buffer(&mut self, buffer: WgpuBuffer) {
        if let Some(raw) = self.buffers.remove(&buffer.0) {
            raw.destroy();
        }
        if self.vertex_binding.map(|(id, _)| id) == Some(buffer.0) {
            self.vertex_binding = None;
        }
    }

    fn enable_vertex_attribute(&mut self, buffer: &WgpuBuffer, location: u32, _components: u32) {
        self.vertex_binding = Some((buffer.0, location));
    }

    fn drawing_buffer_size(&self) -> (u32, u32) {
        self.context.size()
    }

    fn resize_drawing_buffer(&mut self, width: u32, height: u32) {
        self.context.resize(width, height);
    }

    fn set_viewport(&mut self, width: u32, height: u32) {
        self.viewport = (width, height);
    }

    fn configure_pipeline_state(&mut self) {
        // Depth testing is never enabled: pipelines carry no depth attachment.
        self.blending = true;
    }

    fn set_clear_color(&mut self, [r, g, b, a]: [f32; 4]) {
        self.clear_color = wgpu::Color {
            r: f64::from(r),
            g: f64::from(g),
            b: f64::from(b),
            a: f64::from(a),
        };
    }

    fn clear(&mut self) {
        self.pending_clear = true;
    }

    fn draw_triangle_strip(&mut self, vertex_count: u32) -> Result<(), String> {
        if self.is_context_lost() {
            return Err("graphics context lost".to_string());
        }
        if self.current.is_none() {
            return Err("no program bound".to_string());
        }
        if self.vertex_binding.is_none() {
            return Err("no vertex attribute enabled".to_string());
        }
        self.pending_draw = Some(vertex_count);
        Ok(())
    }

    fn present(&mut self) -> Result<(), String> {
        if self.is_context_lost() {
            return Err("graphics context lost".to_string());
        }
        if !self.pending_clear && self.pending_draw.is_none() {
            return Ok(());
        }
        self.encode_frame()
    }
}
