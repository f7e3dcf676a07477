//! GLSL validation and interface reflection through naga.

use wgpu::naga;

use crate::backend::{CompileDiagnostic, ShaderStage};

/// One member of the uniform block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct UniformSlot {
    pub name: String,
    pub offset: u32,
    pub components: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct VertexInput {
    pub name: String,
    pub location: u32,
    pub components: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct StageReflection {
    pub uniforms: Vec<UniformSlot>,
    /// Size of the uniform block in bytes, zero without a block.
    pub block_size: u32,
    pub inputs: Vec<VertexInput>,
}

fn naga_stage(stage: ShaderStage) -> naga::ShaderStage {
    match stage {
        ShaderStage::Vertex => naga::ShaderStage::Vertex,
        ShaderStage::Fragment => naga::ShaderStage::Fragment,
    }
}

/// Parses and validates `source`, returning its uniform block layout and
/// vertex inputs.
pub(crate) fn reflect(stage: ShaderStage, source: &str) -> Result<StageReflection, CompileDiagnostic> {
    let mut frontend = naga::front::glsl::Frontend::default();
    let options = naga::front::glsl::Options::from(naga_stage(stage));
    let module = frontend.parse(&options, source).map_err(|errors| {
        let first = errors.errors.first();
        let line = first.map(|error| error.meta.location(source).line_number);
        let message = first
            .map(|error| error.kind.to_string())
            .unwrap_or_else(|| "unknown GLSL parse error".to_string());
        CompileDiagnostic::new(line, message)
    })?;

    let mut validator = naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::all(),
    );
    validator.validate(&module).map_err(|err| {
        let line = err
            .spans()
            .next()
            .map(|(span, _)| span.location(source).line_number);
        CompileDiagnostic::new(line, err.as_inner().to_string())
    })?;

    let mut reflection = StageReflection::default();
    for (_, variable) in module.global_variables.iter() {
        if variable.space != naga::AddressSpace::Uniform {
            continue;
        }
        if let naga::TypeInner::Struct { members, span } = &module.types[variable.ty].inner {
            reflection.block_size = *span;
            reflection.uniforms = members
                .iter()
                .filter_map(|member| {
                    Some(UniformSlot {
                        name: member.name.clone()?,
                        offset: member.offset,
                        components: components(&module.types[member.ty].inner)?,
                    })
                })
                .collect();
        }
    }

    if stage == ShaderStage::Vertex {
        for entry in module.entry_points.iter() {
            for argument in &entry.function.arguments {
                let Some(naga::Binding::Location { location, .. }) = argument.binding else {
                    continue;
                };
                let (Some(name), Some(components)) = (
                    argument.name.clone(),
                    components(&module.types[argument.ty].inner),
                ) else {
                    continue;
                };
                reflection.inputs.push(VertexInput {
                    name,
                    location,
                    components,
                });
            }
        }
    }

    Ok(reflection)
}

fn components(inner: &naga::TypeInner) -> Option<u32> {
    match inner {
        naga::TypeInner::Scalar(_) => Some(1),
        naga::TypeInner::Vector { size, .. } => Some(*size as u32),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile::{ShaderTemplate, SlotFills, FRAGMENT_TEMPLATE, VERTEX_SOURCE};
    use crate::fixtures;

    #[test]
    fn vertex_source_exposes_position_input() {
        let reflection = reflect(ShaderStage::Vertex, VERTEX_SOURCE).expect("vertex source");
        assert_eq!(reflection.inputs.len(), 1);
        assert_eq!(reflection.inputs[0].location, 0);
        assert_eq!(reflection.inputs[0].components, 2);
    }

    #[test]
    fn fragment_block_members_are_reflected() {
        let template = ShaderTemplate::parse(FRAGMENT_TEMPLATE).expect("template");
        let mut fills = SlotFills::new();
        fills.fill("geometry", fixtures::CUBE).expect("geometry");
        fills.fill("projection", fixtures::PROJECTION).expect("projection");
        let source = template.assemble(&fills).expect("assemble");

        let reflection = reflect(ShaderStage::Fragment, &source).expect("fragment source");
        let time = reflection
            .uniforms
            .iter()
            .find(|slot| slot.name == "u_time")
            .expect("u_time member");
        assert_eq!(time.offset, 12);
        assert_eq!(time.components, 1);
        assert!(reflection.block_size >= 16 * 4);
    }

    #[test]
    fn parse_errors_carry_a_line() {
        let err = reflect(ShaderStage::Fragment, "#version 450\nvoid main() {\n  nope;\n}\n")
            .expect_err("undefined identifier");
        assert_eq!(err.line, Some(3));
    }
}
