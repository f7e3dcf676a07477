use crate::backend::CompileDiagnostic;

use super::reflect::{StageReflection, UniformSlot, VertexInput};

/// A linked program: render pipeline plus the uniform block it reads.
pub(crate) struct ProgramPipeline {
    pub pipeline: wgpu::RenderPipeline,
    pub uniform_buffer: Option<wgpu::Buffer>,
    pub bind_group: Option<wgpu::BindGroup>,
    pub uniform_size: u64,
    pub uniforms: Vec<UniformSlot>,
    pub inputs: Vec<VertexInput>,
}

fn vertex_format(components: u32) -> Option<wgpu::VertexFormat> {
    match components {
        1 => Some(wgpu::VertexFormat::Float32),
        2 => Some(wgpu::VertexFormat::Float32x2),
        3 => Some(wgpu::VertexFormat::Float32x3),
        4 => Some(wgpu::VertexFormat::Float32x4),
        _ => None,
    }
}

/// Merges the uniform members of both stages. The fragment block wins when a
/// member appears in both with a different offset.
fn merge_uniforms(vertex: &StageReflection, fragment: &StageReflection) -> (Vec<UniformSlot>, u32) {
    let mut uniforms = fragment.uniforms.clone();
    for slot in &vertex.uniforms {
        if !uniforms.iter().any(|existing| existing.name == slot.name) {
            uniforms.push(slot.clone());
        }
    }
    (uniforms, vertex.block_size.max(fragment.block_size))
}

pub(crate) fn create_program_pipeline(
    device: &wgpu::Device,
    surface_format: wgpu::TextureFormat,
    vertex_module: &wgpu::ShaderModule,
    vertex: &StageReflection,
    fragment_module: &wgpu::ShaderModule,
    fragment: &StageReflection,
    blending: bool,
) -> Result<ProgramPipeline, String> {
    let (uniforms, block_size) = merge_uniforms(vertex, fragment);
    // std140 blocks are padded to 16 bytes.
    let uniform_size = u64::from(block_size).div_ceil(16) * 16;

    let attributes: Vec<wgpu::VertexAttribute> = vertex
        .inputs
        .iter()
        .map(|input| {
            vertex_format(input.components)
                .map(|format| wgpu::VertexAttribute {
                    format,
                    offset: 0,
                    shader_location: input.location,
                })
                .ok_or_else(|| {
                    CompileDiagnostic::new(
                        None,
                        format!("unsupported vertex input `{}`", input.name),
                    )
                    .to_string()
                })
        })
        .collect::<Result<_, _>>()?;
    let stride = vertex
        .inputs
        .iter()
        .map(|input| u64::from(input.components) * 4)
        .max()
        .unwrap_or(0);

    let uniform_layout = (uniform_size > 0).then(|| {
        device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("field uniform layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        })
    });
    let bind_group_layouts: Vec<&wgpu::BindGroupLayout> = uniform_layout.iter().collect();

    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("field pipeline layout"),
        bind_group_layouts: &bind_group_layouts,
        push_constant_ranges: &[],
    });

    let vertex_buffers = [wgpu::VertexBufferLayout {
        array_stride: stride,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &attributes,
    }];
    let buffers: &[wgpu::VertexBufferLayout] = if attributes.is_empty() {
        &[]
    } else {
        &vertex_buffers
    };

    let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some("field pipeline"),
        layout: Some(&pipeline_layout),
        vertex: wgpu::VertexState {
            module: vertex_module,
            entry_point: Some("main"),
            buffers,
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        },
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleStrip,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: None,
            polygon_mode: wgpu::PolygonMode::Fill,
            unclipped_depth: false,
            conservative: false,
        },
        depth_stencil: None,
        multisample: wgpu::MultisampleState::default(),
        fragment: Some(wgpu::FragmentState {
            module: fragment_module,
            entry_point: Some("main"),
            targets: &[Some(wgpu::ColorTargetState {
                format: surface_format,
                blend: blending.then_some(wgpu::BlendState::ALPHA_BLENDING),
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        }),
        multiview: None,
        cache: None,
    });
    if let Some(err) = pollster::block_on(device.pop_error_scope()) {
        return Err(err.to_string());
    }

    let (uniform_buffer, bind_group) = match &uniform_layout {
        Some(layout) => {
            let buffer = device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("field uniforms"),
                size: uniform_size,
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            });
            let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("field uniform bind group"),
                layout,
                entries: &[wgpu::BindGroupEntry {
                    binding: 0,
                    resource: buffer.as_entire_binding(),
                }],
            });
            (Some(buffer), Some(bind_group))
        }
        None => (None, None),
    };

    tracing::debug!(
        uniforms = uniforms.len(),
        uniform_size,
        inputs = vertex.inputs.len(),
        blending,
        "linked field pipeline"
    );

    Ok(ProgramPipeline {
        pipeline,
        uniform_buffer,
        bind_group,
        uniform_size,
        uniforms,
        inputs: vertex.inputs.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slot(name: &str, offset: u32) -> UniformSlot {
        UniformSlot {
            name: name.to_string(),
            offset,
            components: 1,
        }
    }

    #[test]
    fn fragment_members_take_precedence() {
        let vertex = StageReflection {
            uniforms: vec![slot("u_time", 0), slot("u_scale", 4)],
            block_size: 8,
            inputs: Vec::new(),
        };
        let fragment = StageReflection {
            uniforms: vec![slot("u_time", 12)],
            block_size: 96,
            inputs: Vec::new(),
        };
        let (merged, size) = merge_uniforms(&vertex, &fragment);
        assert_eq!(size, 96);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].offset, 12);
        assert_eq!(merged[1].name, "u_scale");
    }

    #[test]
    fn vertex_formats_cover_float_vectors() {
        assert_eq!(vertex_format(2), Some(wgpu::VertexFormat::Float32x2));
        assert_eq!(vertex_format(5), None);
    }
}
