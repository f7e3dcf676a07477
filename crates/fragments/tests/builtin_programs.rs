use std::rc::Rc;

use fragments::{builtin, FragmentLibrary};
use renderer::compile::{FRAGMENT_TEMPLATE, SLOT_GEOMETRY, SLOT_PROJECTION};
use renderer::gpu::validate_glsl;
use renderer::headless::HeadlessGraphics;
use renderer::{ShaderManager, ShaderStage, ShaderTemplate, SlotFills};

#[test]
fn every_builtin_pair_builds_once() {
    let library = Rc::new(FragmentLibrary::builtin());
    let mut gl = HeadlessGraphics::new(64, 64);
    let mut shaders: ShaderManager<HeadlessGraphics> =
        ShaderManager::with_base_sources(Box::new(Rc::clone(&library)), Box::new(library))
            .expect("base sources");

    for (geometry, _, _) in builtin::GEOMETRIES {
        for (projection, _, _) in builtin::PROJECTIONS {
            let name = format!("{geometry}/{projection}");
            shaders
                .create_dynamic_program(&mut gl, &name, geometry, projection)
                .unwrap_or_else(|err| panic!("{name}: {err}"));
        }
    }
    // rebuilding a known pair must hit the shader cache
    shaders
        .create_dynamic_program(&mut gl, "again", "hypercube", "perspective")
        .expect("cached pair");

    let stats = gl.stats();
    assert_eq!(stats.vertex_compiles, 1);
    assert_eq!(stats.fragment_compiles, 12);
    assert_eq!(stats.links, 13);
}

#[test]
fn builtin_fragments_are_valid_glsl() {
    let template = ShaderTemplate::parse(FRAGMENT_TEMPLATE).expect("template");
    for (geometry, _, geometry_code) in builtin::GEOMETRIES {
        for (projection, _, projection_code) in builtin::PROJECTIONS {
            let mut fills = SlotFills::new();
            fills.fill(SLOT_GEOMETRY, geometry_code).expect("geometry");
            fills.fill(SLOT_PROJECTION, projection_code).expect("projection");
            let source = template.assemble(&fills).expect("assemble");
            if let Err(diagnostic) = validate_glsl(ShaderStage::Fragment, &source) {
                panic!("{geometry}/{projection}: {diagnostic}");
            }
        }
    }
}
